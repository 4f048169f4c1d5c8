use crate::CLAP_STYLING;
use clap::{ArgAction, Command, arg, command};
use trackscope_core::config::DEFAULT_OUTPUT_DIR;

/// Flags shared by every subcommand that loads pages.
fn target_args(cmd: Command) -> Command {
    cmd.arg(
        arg!(-u --"url" <URL>)
            .required(true)
            .help("The site to audit. A bare host gets http:// prepended"),
    )
    .arg(
        arg!(--"headed")
            .required(false)
            .help("Show the browser window instead of running headless"),
    )
    .arg(
        arg!(-o --"output-dir" <PATH>)
            .required(false)
            .help("Directory for JSON results")
            .default_value(DEFAULT_OUTPUT_DIR),
    )
}

fn crawl_args(cmd: Command) -> Command {
    target_args(cmd)
        .arg(
            arg!(-d --"max-depth" <DEPTH>)
                .required(false)
                .help("Maximum link depth from the start URL")
                .value_parser(clap::value_parser!(usize))
                .default_value("3"),
        )
        .arg(
            arg!(-p --"max-pages" <PAGES>)
                .required(false)
                .help("Stop after this many pages have been crawled")
                .value_parser(clap::value_parser!(usize))
                .default_value("50"),
        )
        .arg(
            arg!(--"delay" <MS>)
                .required(false)
                .help("Delay between page loads in milliseconds")
                .value_parser(clap::value_parser!(u64))
                .default_value("1000"),
        )
}

pub fn command_argument_builder() -> Command {
    Command::new("trackscope")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("trackscope")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and progress output").required(false))
        .arg(
            arg!(-v --"verbose" "Increase log verbosity (-v info, -vv debug)")
                .required(false)
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            crawl_args(command!("crawl"))
                .about("Crawl a site breadth-first and record its pages and links"),
        )
        .subcommand(
            target_args(command!("consent")).about(
                "Load a page three times (no interaction, accept all, reject all) and compare \
                the cookies, scripts and requests each consent choice produces",
            ),
        )
        .subcommand(
            crawl_args(command!("scan"))
                .about("Crawl a site, capture every page, and classify all cookies found")
                .arg(
                    arg!(-f --"framework" <NAME>)
                        .required(false)
                        .help("Compliance framework to tag the results with (repeatable)")
                        .action(ArgAction::Append),
                ),
        )
}
