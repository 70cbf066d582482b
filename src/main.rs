//! nrdiag CLI entry point.

use clap::Parser;

use nrdiag::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => nrdiag::cli::commands::run::execute(args, cli.json).await,
        Commands::List(args) => nrdiag::cli::commands::list::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        nrdiag::cli::handle_error(err, cli.json);
    }
}
