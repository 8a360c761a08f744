use colored::Colorize;

pub mod categorize;
pub mod config;
pub mod data;
pub mod error;
pub mod report;
pub mod scan;
pub mod summary;

pub use config::ScanConfig;
pub use error::CoreError;
pub use report::ScanReport;
pub use scan::{ScanOptions, execute_scan};
pub use summary::Summary;

const BANNER: &str = r#"

  ._  _      ._ _  _  _. ._
  |_)(_)|_|| _> (_ (_| | |
  |
"#;

pub fn print_banner() {
    println!("{}", BANNER.bright_cyan().bold());
    println!(
        "  {} {}\n",
        "accessibility scanner".bright_white(),
        concat!("v", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
