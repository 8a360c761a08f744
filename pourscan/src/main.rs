use colored::Colorize;
use pourscan::command_argument_builder;
use pourscan::handlers::{handle_crawl, handle_history, handle_init, handle_report, handle_scan};
use pourscan_core::print_banner;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    let outcome = match chosen_command.subcommand() {
        None => return,
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("scan", primary_command)) => handle_scan(primary_command).await,
        Some(("crawl", primary_command)) => handle_crawl(primary_command).await,
        Some(("report", primary_command)) => handle_report(primary_command),
        Some(("history", primary_command)) => handle_history(primary_command),
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = outcome {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
