pub mod cli;
pub mod config;
pub mod study;

pub use cli::{build_cli_command, Cli, Commands, ModelFormat, ResultFormat};
pub use config::{load_config, NetsimConfig};
pub use study::{load_model, load_study, LoadedModel, Study};
