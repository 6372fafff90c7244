//! CLI entry point - the composition root.
//!
//! Loads `.env`, parses arguments, bootstraps the adapters and dispatches.
//! Every supervised child, session and stream is shut down before exit.

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use ogpt_cli::{Cli, CliError, Commands, bootstrap, handlers, resolve_settings};
use ogpt_cli::presentation::spawn_event_trace;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command.as_ref() else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let settings = resolve_settings(&cli)?;
    let ctx = bootstrap(settings)?;
    let trace = spawn_event_trace(&ctx.events);

    let result = match command {
        Commands::Compile => handlers::compile::execute(&ctx).await,
        Commands::Serve => handlers::serve::execute(&ctx).await,
        Commands::List { via_api } => handlers::list::execute(&ctx, *via_api).await,
        Commands::Pull { name, no_http } => handlers::pull::execute(&ctx, name, *no_http).await,
        Commands::Generate { model, prompt, raw } => {
            handlers::generate::execute(&ctx, model, prompt, *raw).await
        }
        Commands::Run { model } => handlers::run::execute(&ctx, model).await,
        Commands::RunBinary => handlers::run_binary::execute(&ctx).await,
        Commands::Settings => handlers::settings::execute(&ctx),
    };

    ctx.shutdown().await;
    trace.abort();
    Ok(result?)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(err.downcast_ref::<CliError>().map_or(1, CliError::exit_code))
        }
    }
}
