pub mod artifacts;
pub mod external_tools;
pub mod logging;
pub mod progress_bar_builder;
