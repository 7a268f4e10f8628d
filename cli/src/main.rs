//! hoist - push-style application deploys

use clap::Parser;
use hoist_cli::cli::Cli;
use hoist_cli::output::{OutputContext, json};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    hoist_cli::logging::init(cli.verbose);
    let (json_mode, no_color) = (cli.json, cli.no_color);

    match cli.run().await {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            if json_mode {
                match json::format_error(&format!("{e:#}"), json::error_code(&e)) {
                    Ok(doc) => println!("{doc}"),
                    Err(_) => eprintln!("Error: {e:#}"),
                }
            } else {
                OutputContext::new(no_color, false).error(&format!("{e:#}"));
            }
            std::process::exit(1);
        }
    }
}
