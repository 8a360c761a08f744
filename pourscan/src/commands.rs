use clap::{arg, command};

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub const DEFAULT_CONFIG_DIR: &str = "~/.config/pourscan/";
pub const DEFAULT_DB_PATH: &str = "~/.config/pourscan/pourscan.db";

fn db_arg() -> clap::Arg {
    arg!(--"db" <PATH>)
        .required(false)
        .help("Location of the pourscan database")
        .default_value(DEFAULT_DB_PATH)
}

fn format_arg() -> clap::Arg {
    arg!(-f --"format" <FORMAT>)
        .required(false)
        .help("Output format for the report")
        .value_parser(["text", "json", "markdown", "md"])
        .default_value("text")
}

fn url_arg() -> clap::Arg {
    arg!(-u --"url" <URL>)
        .required(false)
        .help("The start URL; only pages reachable from it are scanned")
}

fn scope_args() -> [clap::Arg; 5] {
    [
        arg!(-m --"max-pages" <N>)
            .required(false)
            .help("Maximum number of pages to discover [default: 50]")
            .value_parser(clap::value_parser!(usize)),
        arg!(--"include" <PATTERN>)
            .required(false)
            .help("Only follow URLs matching this wildcard pattern, e.g. '*/docs/*'"),
        arg!(--"exclude" <PATTERN>)
            .required(false)
            .help("Never follow URLs matching this wildcard pattern"),
        arg!(--"cross-origin" "Follow links to other origins").required(false),
        arg!(--"no-robots" "Ignore the site's robots.txt").required(false),
    ]
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("pourscan")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("pourscan")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Log debug output to stderr")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Initializes the pourscan database on your filesystem")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location to store the pourscan database")
                        .default_value(DEFAULT_CONFIG_DIR),
                )
                .arg(
                    arg!(--"force")
                        .help(
                            "Forces the overwriting of any existing database at the specified \
                        location.",
                        )
                        .required(false),
                ),
        )
        .subcommand(
            command!("scan")
                .about("Crawl a site and run an accessibility audit on every discovered page")
                .arg(url_arg())
                .arg(
                    arg!(--"config" <FILE>)
                        .required(false)
                        .help("JSON scan configuration; flags given alongside override it"),
                )
                .args(scope_args())
                .arg(
                    arg!(-c --"concurrency" <N>)
                        .required(false)
                        .help("Number of pages audited in parallel [default: 2]")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"delay" <MS>)
                        .required(false)
                        .help("Pause between pages per worker, at least 250 ms [default: 800]")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"wait-until" <EVENT>)
                        .required(false)
                        .help("When a page counts as loaded")
                        .value_parser(["load", "domcontentloaded", "networkidle0", "networkidle2"]),
                )
                .arg(
                    arg!(--"wait-ms" <MS>)
                        .required(false)
                        .help("Extra settle time after load")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"timeout" <MS>)
                        .required(false)
                        .help("Per-page render and audit timeout [default: 30000]")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(arg!(--"no-incomplete" "Leave out findings that need manual review").required(false))
                .arg(
                    arg!(--"rules" <IDS>)
                        .required(false)
                        .help("Comma separated rule ids to run exclusively"),
                )
                .arg(
                    arg!(--"disable-rules" <IDS>)
                        .required(false)
                        .help("Comma separated rule ids to skip"),
                )
                .arg(
                    arg!(--"impacts" <LEVELS>)
                        .required(false)
                        .help("Comma separated impacts to keep: critical, serious, moderate, minor"),
                )
                .arg(
                    arg!(--"audit-endpoint" <URL>)
                        .required(false)
                        .help("Audit service that accepts page HTML and answers with axe results"),
                )
                .arg(
                    arg!(-o --"output-dir" <DIR>)
                        .required(false)
                        .help("Write <id>.report.json and <id>.summary.json into this directory"),
                )
                .arg(
                    arg!(--"report-id" <ID>)
                        .required(false)
                        .help("Use this id instead of a generated one"),
                )
                .arg(format_arg())
                .arg(db_arg())
                .arg(arg!(--"no-store" "Do not save the report to the database").required(false)),
        )
        .subcommand(
            command!("crawl")
                .about("Discover in-scope pages without auditing them")
                .arg(url_arg())
                .args(scope_args())
                .arg(
                    arg!(--"timeout" <MS>)
                        .required(false)
                        .help("Per-page fetch timeout [default: 30000]")
                        .value_parser(clap::value_parser!(u64)),
                ),
        )
        .subcommand(
            command!("report")
                .about("Show a stored report")
                .arg(arg!(<ID>).help("The report id, as listed by 'pourscan history'"))
                .arg(format_arg())
                .arg(db_arg()),
        )
        .subcommand(
            command!("history")
                .about("List stored reports, newest first")
                .arg(db_arg()),
        )
}
