pub mod commands;
pub mod handlers;

pub use commands::{CLAP_STYLING, command_argument_builder};

// Re-export the pipeline entry points from pourscan-core
pub use pourscan_core::{ScanConfig, ScanOptions, ScanReport, execute_scan};
