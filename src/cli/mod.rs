//! CLI command handling module
//!
//! Handles all CLI subcommands and logging setup.

mod commands;
mod logging;
mod version;

pub use commands::{
    ConfigSubcommand, handle_config_command, handle_health, handle_promote, read_freight,
    read_stage,
};
pub use logging::init_logging;
pub use version::display_version;
