use crate::config::ToolPaths;
use crate::error::{Result, ValidationError};
use anyhow::Context;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::NamedTempFile;

// Keep failure messages readable when a tool dumps a long usage text.
const STDERR_TAIL_BYTES: usize = 4096;

/// One external program call: executable, argument vector, working
/// directory and an optional file receiving stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub tool: String,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub current_dir: Option<PathBuf>,
    pub stdout: Option<PathBuf>,
}

impl ToolInvocation {
    pub fn new(tool: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            stdout: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Redirect stdout to `path`, truncating it. Relative paths resolve
    /// against the invocation's working directory.
    pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }

    fn stdout_path(&self) -> Option<PathBuf> {
        self.stdout.as_ref().map(|p| match &self.current_dir {
            Some(dir) if p.is_relative() => dir.join(p),
            _ => p.clone(),
        })
    }

    /// Human readable command line, for logs only; never handed to a shell.
    pub fn command_line(&self) -> String {
        let mut line = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        if let Some(out) = &self.stdout {
            line.push_str(" > ");
            line.push_str(&out.to_string_lossy());
        }
        line
    }
}

/// Executes tool invocations. The pipeline only talks to this trait so a
/// run can be driven without the real binaries.
pub trait ToolRunner {
    fn run(&mut self, invocation: &ToolInvocation) -> Result<()>;
}

/// Runs invocations as blocking child processes.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&mut self, invocation: &ToolInvocation) -> Result<()> {
        log::info!("{}", invocation.command_line());

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args).stdin(Stdio::null());
        if let Some(dir) = &invocation.current_dir {
            command.current_dir(dir);
        }
        // Captured stdout only takes the target name once the tool succeeds.
        let capture = match invocation.stdout_path() {
            Some(path) => {
                let dir = match path.parent() {
                    Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
                    _ => PathBuf::from("."),
                };
                let tmp = NamedTempFile::new_in(&dir).map_err(|e| ValidationError::io(e, &dir))?;
                let file = tmp.reopen().map_err(|e| ValidationError::io(e, tmp.path()))?;
                command.stdout(Stdio::from(file));
                Some((tmp, path))
            }
            None => {
                command.stdout(Stdio::piped());
                None
            }
        };

        let output = command.output().map_err(|source| ValidationError::ToolLaunch {
            tool: invocation.tool.clone(),
            source,
        })?;

        if !output.stdout.is_empty() {
            log::debug!("{} stdout:\n{}", invocation.tool, String::from_utf8_lossy(&output.stdout));
        }
        let stderr = stderr_tail(&output.stderr);
        if !output.status.success() {
            return Err(ValidationError::ToolFailure {
                tool: invocation.tool.clone(),
                status: output.status,
                stderr,
            });
        }
        if !stderr.is_empty() {
            log::debug!("{} stderr:\n{}", invocation.tool, stderr);
        }
        if let Some((tmp, path)) = capture {
            tmp.persist(&path)
                .map_err(|e| ValidationError::io(e.error, &path))?;
        }

        Ok(())
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}

/// Makes sure every configured executable can be launched before any work starts.
pub fn check_tools(tools: &ToolPaths) -> anyhow::Result<()> {
    for (name, program, homepage) in [
        ("samtools", &tools.samtools, "http://www.htslib.org/"),
        ("bwa", &tools.bwa, "https://github.com/lh3/bwa"),
        ("bamToFastq", &tools.bam_to_fastq, "https://bedtools.readthedocs.io/"),
        ("Trinity", &tools.trinity, "https://github.com/trinityrnaseq/trinityrnaseq"),
    ] {
        check_tool(program).with_context(|| {
            format!(
                "{} not found at '{}'. Please install {} ({}) and ensure it's in your PATH or set in the config file",
                name,
                program.display(),
                name,
                homepage
            )
        })?;
    }
    Ok(())
}

fn check_tool(program: &Path) -> std::io::Result<()> {
    Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_command_line_rendering() {
        let invocation = ToolInvocation::new("bwa", "/opt/bwa")
            .args(["mem", "-T", "19", "ref.fa", "contigs.fa"])
            .stdout_to("out.sam");
        assert_eq!(
            invocation.command_line(),
            "/opt/bwa mem -T 19 ref.fa contigs.fa > out.sam"
        );
    }

    #[test]
    fn test_stdout_capture_and_failure() {
        let dir = TempDir::new().unwrap();
        let mut runner = SystemRunner;

        let echo = ToolInvocation::new("echo", "echo")
            .arg("hello")
            .in_dir(dir.path())
            .stdout_to("hello.txt");
        runner.run(&echo).unwrap();
        let written = std::fs::read_to_string(dir.path().join("hello.txt")).unwrap();
        assert_eq!(written, "hello\n");

        let failing = ToolInvocation::new("false", "false");
        assert!(matches!(
            runner.run(&failing),
            Err(ValidationError::ToolFailure { .. })
        ));

        // A tool that dies after printing something leaves no output behind.
        let partial = ToolInvocation::new("bwa mem", "sh")
            .args(["-c", "echo '@SQ\tSN:chr1:1-9\tLN:20'; exit 3"])
            .in_dir(dir.path())
            .stdout_to("Trinity_bwa_chr1:1-9.sam");
        match runner.run(&partial) {
            Err(ValidationError::ToolFailure { status, .. }) => assert_eq!(status.code(), Some(3)),
            other => panic!("expected a tool failure, got {:?}", other),
        }
        assert!(!dir.path().join("Trinity_bwa_chr1:1-9.sam").exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        let missing = ToolInvocation::new("nope", "/nonexistent/definitely-not-a-tool");
        assert!(matches!(
            runner.run(&missing),
            Err(ValidationError::ToolLaunch { .. })
        ));
    }
}
