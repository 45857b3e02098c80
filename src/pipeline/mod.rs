//! Sequential junction validation pipeline.
//!
//! Stages run strictly in order: input preparation, read extraction,
//! pseudo-reference construction, assembly and realignment, overlap
//! scoring. Each stage declares the files it produces; a stage whose files
//! are already present (and match the manifest) is skipped, and once one
//! stage actually runs every later stage runs too.

pub mod assembly;
pub mod context;
pub mod conversion;
pub mod extract;
pub mod manifest;
pub mod overlap;
pub mod prepare;
pub mod pseudoref;

pub use context::RunContext;

use crate::error::{Result, ValidationError};
use crate::export::summary::ValidationSummary;
use crate::utils::artifacts::{await_artifacts, Artifact};
use crate::utils::external_tools::{ToolInvocation, ToolRunner};
use crate::utils::progress_bar_builder::ProgressBarBuilder;
use indicatif::ProgressBar;
use manifest::{StageManifest, StageStatus};
use std::fs;
use std::time::Duration;

pub struct Pipeline<'a> {
    ctx: &'a RunContext,
    runner: &'a mut dyn ToolRunner,
    manifest: StageManifest,
    progress: ProgressBar,
    /// Set once any stage has executed; later stages then never skip.
    dirty: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(ctx: &'a RunContext, runner: &'a mut dyn ToolRunner) -> Result<Self> {
        fs::create_dir_all(&ctx.work_dir).map_err(|e| ValidationError::io(e, &ctx.work_dir))?;
        let manifest = StageManifest::open(&ctx.work_dir, ctx.config.manifest_checksums)?;
        let progress = ProgressBarBuilder::new(format!("Validating {}", ctx.coordinate))
            .hidden(true)
            .build()
            .map_err(|e| ValidationError::Config(e.to_string()))?;

        Ok(Self {
            ctx,
            runner,
            manifest,
            progress,
            dirty: false,
        })
    }

    /// Shows a spinner while stages run. Only sensible when logs are not on the terminal.
    pub fn with_progress(mut self) -> Self {
        if let Ok(progress) = ProgressBarBuilder::new(format!("Validating {}", self.ctx.coordinate))
            .with_tick()
            .build()
        {
            self.progress = progress;
        }
        self
    }

    pub fn context(&self) -> &RunContext {
        self.ctx
    }

    pub fn run(mut self) -> Result<ValidationSummary> {
        let ctx = self.ctx;
        log::info!("Infile is: {}", ctx.sample_file(".sam").display());
        log::info!("Coordinates: {}", ctx.coordinate);
        log::info!(
            "Flanks: {} and {}",
            ctx.coordinate.upstream_flank(),
            ctx.coordinate.downstream_flank()
        );

        prepare::stage_inputs(ctx)?;
        let sorted_bam = conversion::sam_to_sorted_bam(&mut self, &ctx.work_dir, &ctx.sample, "input")?;

        fs::create_dir_all(&ctx.coord_dir).map_err(|e| ValidationError::io(e, &ctx.coord_dir))?;
        let reads = extract::extract_region_reads(&mut self, &sorted_bam)?;
        let junction = pseudoref::build_pseudo_reference(&mut self)?;
        let contigs_sam = assembly::assemble_and_realign(&mut self, &reads)?;
        let summary = overlap::score_stage(&mut self, &junction, &contigs_sam)?;

        self.progress
            .finish_with_message(format!("Validated {}", ctx.coordinate));
        Ok(summary)
    }

    /// True when a stage with these outputs would be skipped right now.
    pub(crate) fn is_complete(&self, key: &str, outputs: &[Artifact]) -> bool {
        !self.dirty && self.manifest.status(key, outputs) == StageStatus::Complete
    }

    /// Runs `body` unless `outputs` are already complete, then waits for the
    /// outputs to appear and records the stage.
    pub(crate) fn stage<F>(&mut self, key: &str, outputs: &[Artifact], body: F) -> Result<bool>
    where
        F: FnOnce(&mut dyn ToolRunner) -> Result<()>,
    {
        if !self.dirty {
            match self.manifest.status(key, outputs) {
                StageStatus::Complete => {
                    log::info!("{}: outputs present, moving on", key);
                    if !self.manifest.is_recorded(key) {
                        self.manifest.record(key, outputs)?;
                    }
                    return Ok(false);
                }
                StageStatus::Stale => log::info!("{}: recorded outputs changed, re-running", key),
                StageStatus::Pending => {}
            }
        }

        self.progress.set_message(format!("{} ({})", key, self.ctx.coordinate));
        log::info!("{}: running", key);
        body(&mut *self.runner)?;
        await_artifacts(
            outputs,
            Duration::from_secs(self.ctx.config.artifact_timeout_secs),
        )?;
        self.manifest.record(key, outputs)?;
        self.dirty = true;
        Ok(true)
    }

    /// A stage consisting of a single external command.
    pub(crate) fn tool_stage(
        &mut self,
        key: &str,
        outputs: &[Artifact],
        invocation: ToolInvocation,
    ) -> Result<bool> {
        self.stage(key, outputs, |runner| runner.run(&invocation))
    }
}
