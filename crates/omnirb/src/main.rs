//! `omnirb` binary: validate and inspect omnibus `gitlab.rb` settings.

use clap::Parser;
use omnirb::cli::{Cli, run};
use std::process::ExitCode;

fn main() -> ExitCode {
    omnirb::init_logging();
    let cli = Cli::parse();
    match run(cli) {
        Ok(report) => {
            println!("{}", report.output);
            if report.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}
