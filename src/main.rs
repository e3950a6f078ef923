use clap::Parser;
use macrocycle::cli::{Cli, run};
use macrocycle::logging::init_logging;

fn main() -> std::process::ExitCode {
    init_logging();
    run(Cli::parse())
}
