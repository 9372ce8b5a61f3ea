use clap::Parser;
use stratfolio::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    stratfolio::logging::init(cli.verbose());
    run(cli)
}
