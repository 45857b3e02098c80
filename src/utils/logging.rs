use crate::error::ValidationError;
use chrono::Local;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

pub const DEFAULT_LOG_FORMAT: &str = "[{timestamp}] {level} [{target}] {message}";

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub filename: Option<PathBuf>,
    pub filemode: String,
    pub format: String,
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filename: None,
            filemode: "a".to_string(),
            format: DEFAULT_LOG_FORMAT.to_string(),
            level: "INFO".to_string(),
        }
    }
}

/// Accepts both Rust (`warn`, `trace`) and Python logging names (`WARNING`, `CRITICAL`).
pub fn parse_level(level: &str) -> Result<LevelFilter, ValidationError> {
    match level.to_ascii_uppercase().as_str() {
        "TRACE" => Ok(LevelFilter::Trace),
        "DEBUG" => Ok(LevelFilter::Debug),
        "INFO" => Ok(LevelFilter::Info),
        "WARN" | "WARNING" => Ok(LevelFilter::Warn),
        "ERROR" | "CRITICAL" | "FATAL" => Ok(LevelFilter::Error),
        "OFF" => Ok(LevelFilter::Off),
        other => Err(ValidationError::Config(format!("unknown log level '{}'", other))),
    }
}

/// Expands the `{timestamp}`, `{level}`, `{target}` and `{message}` placeholders.
pub fn render(template: &str, timestamp: &str, level: &str, target: &str, message: &str) -> String {
    template
        .replace("{timestamp}", timestamp)
        .replace("{level}", level)
        .replace("{target}", target)
        .replace("{message}", message)
}

pub fn init(settings: &LogSettings) -> Result<(), ValidationError> {
    let level = parse_level(&settings.level)?;
    let template = settings.format.clone();

    let mut builder = Builder::new();
    builder.filter_level(level).format(move |buf, record| {
        let line = render(
            &template,
            &Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            record.level().as_str(),
            record.target(),
            &record.args().to_string(),
        );
        writeln!(buf, "{}", line)
    });

    if let Some(path) = &settings.filename {
        let mut options = OpenOptions::new();
        match settings.filemode.as_str() {
            "a" => options.create(true).append(true),
            "w" => options.create(true).write(true).truncate(true),
            other => {
                return Err(ValidationError::Config(format!(
                    "log file mode must be 'a' or 'w', got '{}'",
                    other
                )))
            }
        };
        let file = options.open(path).map_err(|e| ValidationError::io(e, path))?;
        builder.target(Target::Pipe(Box::new(file)));
    } else {
        builder.target(Target::Stderr);
    }

    builder
        .try_init()
        .map_err(|e| ValidationError::Config(format!("logger already initialised: {}", e)))
}
