//! `shineview`: preview a scene in a window, export a still frame, or list the effect catalog.

mod cli;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Command::Preview(args) => run::preview(args),
        Command::Export(args) => run::export(args),
        Command::Effects(args) => run::effects(args),
    }
}
