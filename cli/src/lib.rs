pub mod commands;
pub mod results;
pub mod settings;

pub use results::{expand_patterns, overall_status, read_results, ResultRecord, StepRecord};
pub use settings::{CliError, FileSettings};
