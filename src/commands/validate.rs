use crate::cli::Args;
use crate::config::Config;
use crate::error::ValidationError;
use crate::export::summary::ValidationSummary;
use crate::pipeline::{Pipeline, RunContext};
use crate::types::JunctionCoordinate;
use crate::utils::external_tools::{check_tools, SystemRunner};
use anyhow::{Context, Result};

pub fn run(args: &Args) -> Result<ValidationSummary> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load(),
    };
    args.apply_overrides(&mut config);

    let coordinate = JunctionCoordinate::parse(&args.coordinate, args.window)?;
    check_tools(&config.tools)?;

    let ctx = RunContext::new(&args.infile, coordinate, config);
    let mut runner = SystemRunner;
    let mut pipeline = Pipeline::new(&ctx, &mut runner)?;
    if args.log_filename.is_some() {
        pipeline = pipeline.with_progress();
    }

    let summary = pipeline
        .run()
        .with_context(|| format!("Validation of {} failed", ctx.coordinate))?;

    if summary.validated {
        log::info!("{}: assembled contigs span the junction", ctx.coordinate);
    } else {
        log::info!("{}: no assembled contig spans the junction", ctx.coordinate);
    }
    log::info!("Results written to {}", ctx.coord_dir.display());

    Ok(summary)
}

/// Process exit status for a failed run: a failing tool's own status when
/// there is one, 1 otherwise.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| match cause.downcast_ref::<ValidationError>() {
            Some(ValidationError::ToolFailure { status, .. }) => status.code(),
            _ => None,
        })
        .filter(|&code| code != 0)
        .unwrap_or(1)
}
