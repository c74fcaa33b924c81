mod cli;

use std::process::ExitCode;

use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> ExitCode {
    let filter = EnvFilter::from_default_env()
        .add_directive("resource_synth=info".parse().expect("valid directive"))
        .add_directive("warn".parse().expect("valid directive"));
    // logs go to stderr so the synthesized document can be piped
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    let command_line_interface = cli::CommandLineInterface::load();
    match command_line_interface.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{} {error:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
