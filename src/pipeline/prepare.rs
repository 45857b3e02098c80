use super::RunContext;
use crate::error::{Result, ValidationError};
use std::fs;
use std::io;
use std::path::Path;

/// Input files that may sit beside the working directory and are moved into it.
pub const INPUT_SUFFIXES: [&str; 4] = [".sam", ".bam", ".sorted.bam", ".sorted.bam.bai"];

/// Moves the input alignment (and any earlier conversions of it) into the
/// working directory, then checks that something to work from is present.
pub fn stage_inputs(ctx: &RunContext) -> Result<()> {
    fs::create_dir_all(&ctx.work_dir).map_err(|e| ValidationError::io(e, &ctx.work_dir))?;

    for suffix in INPUT_SUFFIXES {
        let target = ctx.sample_file(suffix);
        if target.exists() {
            continue;
        }
        let source = ctx.input_dir.join(format!("{}{}", ctx.sample, suffix));
        if source.is_file() {
            log::info!("Moving {} to {}", source.display(), target.display());
            move_file(&source, &target).map_err(|e| ValidationError::io(e, &source))?;
        }
    }

    let usable = [".sam", ".bam", ".sorted.bam"]
        .iter()
        .any(|suffix| ctx.sample_file(suffix).is_file());
    if !usable {
        return Err(ValidationError::MissingInput(ctx.input_dir.join(format!("{}.sam", ctx.sample))));
    }
    Ok(())
}

/// `rename`, falling back to copy-and-delete across filesystems.
fn move_file(source: &Path, target: &Path) -> io::Result<()> {
    match fs::rename(source, target) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(source, target)?;
            fs::remove_file(source)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::types::JunctionCoordinate;
    use tempfile::TempDir;

    fn context(dir: &Path) -> RunContext {
        let coord = JunctionCoordinate::parse("chr1:1000-5000", 50).unwrap();
        RunContext::new(&dir.join("sample"), coord, Config::default())
    }

    #[test]
    fn test_inputs_are_moved_once() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("sample.sam"), "@HD\tVN:1.6\n").unwrap();
        fs::write(dir.path().join("sample.sorted.bam"), "bam").unwrap();
        let ctx = context(dir.path());

        stage_inputs(&ctx).unwrap();
        assert!(ctx.sample_file(".sam").is_file());
        assert!(ctx.sample_file(".sorted.bam").is_file());
        assert!(!dir.path().join("sample.sam").exists());

        // A second copy beside the working directory is left alone.
        fs::write(dir.path().join("sample.sam"), "other").unwrap();
        stage_inputs(&ctx).unwrap();
        assert_eq!(fs::read_to_string(ctx.sample_file(".sam")).unwrap(), "@HD\tVN:1.6\n");
        assert!(dir.path().join("sample.sam").exists());
    }

    #[test]
    fn test_missing_input() {
        let dir = TempDir::new().unwrap();
        let err = stage_inputs(&context(dir.path())).unwrap_err();
        assert!(matches!(err, ValidationError::MissingInput(_)));
    }
}
