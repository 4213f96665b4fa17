mod cli;
mod commands;

use abix_core::AbixError;
use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    abix_core::observability::init_tracing();
    let cli = Cli::parse();

    let result = dispatch(&cli);
    if let Err(ref e) = result {
        if e.downcast_ref::<AbixError>().is_some_and(AbixError::is_security) {
            tracing::error!("refusing to continue: an artifact failed integrity verification");
        }
    }
    let code = result?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn dispatch(cli: &Cli) -> Result<i32> {
    let root = cli.root.as_deref();
    let project = cli.project.as_path();
    match &cli.command {
        Commands::Init { runtimes, force } => {
            commands::init::cmd_init(project, runtimes, *force)?;
            Ok(0)
        }
        Commands::Run { args } => commands::run::cmd_run(root, project, args),
        Commands::Shell => commands::run::cmd_shell(root, project),
        Commands::Check => {
            commands::check::cmd_check(root, project)?;
            Ok(0)
        }
        Commands::Clean => {
            commands::clean::cmd_clean(project)?;
            Ok(0)
        }
        Commands::CleanGlobal { force } => {
            commands::clean::cmd_clean_global(root, *force)?;
            Ok(0)
        }
    }
}
