mod cli;
mod looks;
mod paths;
mod run;
mod source;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    let config = cli.config.as_deref();
    match cli.command {
        Command::Render(args) => run::render(config, args),
        Command::Preview(args) => run::preview(config, args),
        Command::Looks(args) => run::looks(config, args),
    }
}
