//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`], [`init`], or [`validate`]. Each handler
//! lives in its own submodule.

pub mod init;
pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::RoutemuxError;

pub async fn dispatch(cli: Cli) -> Result<(), RoutemuxError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args).await,
        Some(Commands::Init(ref args)) => init::execute(args),
        Some(Commands::Validate(ref args)) => validate::execute(args),
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  routemux v{version} - path-prefix reverse proxy\n\n  \
         No command provided. To get started:\n\n    \
         routemux init                  Generate a starter config\n    \
         routemux run                   Start the proxy (auto-detects ./routemux.yaml)\n    \
         routemux run -c routes.yaml    Start with a specific config file\n    \
         routemux --help                See all commands and options\n"
    );
}
