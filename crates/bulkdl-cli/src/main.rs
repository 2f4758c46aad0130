//! CLI entry point - the composition root.

use clap::{CommandFactory, Parser};

use bulkdl_cli::{Cli, CliConfig, CliError, Commands, bootstrap, handlers, init_logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = dispatch(cli).await {
        eprintln!("Error: {e:#}");
        let code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
        std::process::exit(code);
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    if let Commands::Run(args) = &command {
        let ctx = bootstrap(CliConfig::for_run(cli.db, args)?).await?;
        return handlers::run::execute(&ctx, &args.urls).await;
    }

    let ctx = bootstrap(CliConfig::offline(cli.db)?).await?;
    match command {
        Commands::Add { urls, title, again } => {
            handlers::add::execute(&ctx, &urls, title.as_deref(), again).await
        }
        Commands::List => handlers::list::execute(&ctx).await,
        Commands::Retry { id, all: _ } => handlers::control::retry(&ctx, id.as_deref()).await,
        Commands::Pause => handlers::control::pause(&ctx).await,
        Commands::Resume => handlers::control::resume(&ctx).await,
        Commands::Remove { id } => handlers::control::remove(&ctx, &id).await,
        Commands::Clear => handlers::control::clear(&ctx).await,
        Commands::ClearCompleted => handlers::control::clear_completed(&ctx).await,
        Commands::Open { id } => handlers::control::open(&ctx, &id).await,
        Commands::Run(_) => Ok(()),
    }
}
