use colored::Colorize;
use trackscope::command_argument_builder;
use trackscope::handlers::{handle_consent, handle_crawl, handle_scan, init_tracing};
use trackscope_core::print_banner;

#[tokio::main]
async fn main() {
    let chosen_command = command_argument_builder().get_matches();
    let quiet = chosen_command.get_flag("quiet");
    init_tracing(chosen_command.get_count("verbose"));

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    let result = match chosen_command.subcommand() {
        Some(("crawl", args)) => handle_crawl(args, quiet).await,
        Some(("consent", args)) => handle_consent(args, quiet).await,
        Some(("scan", args)) => handle_scan(args, quiet).await,
        // No subcommand provided, just show the banner
        None => Ok(()),
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
