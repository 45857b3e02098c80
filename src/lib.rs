pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod types;
pub mod utils;

pub use error::{Result, ValidationError};
pub use pipeline::{Pipeline, RunContext};
pub use types::{JunctionCoordinate, Stringency};
