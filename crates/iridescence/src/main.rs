mod cli;
mod paths;
mod run;
mod simulate;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Simulate(args)) => run::simulate(&cli.run, args),
        Some(Command::PrintConfig) => run::print_config(&cli.run),
        Some(Command::Where) => run::print_where(&cli.run),
        None => run::run(cli.run),
    }
}
