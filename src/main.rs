use anyhow::Result;
use clap::Parser;

use solubility_predict::cli::Cli;
use solubility_predict::infra::logging;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.logging());
    cli.run()
}
