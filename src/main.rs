use arca::cli::{Cli, Commands, KeyAction};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Init => arca::cli::commands::init::execute(&cli),
        Commands::Add {
            key,
            value,
            description,
        } => arca::cli::commands::set::add(&cli, key, value.as_deref(), description.as_deref()),
        Commands::Update {
            key,
            value,
            description,
        } => arca::cli::commands::set::update(&cli, key, value.as_deref(), description.as_deref()),
        Commands::Get { key } => arca::cli::commands::get::execute(&cli, key),
        Commands::List { filter } => arca::cli::commands::list::execute(&cli, filter.as_deref()),
        Commands::Delete { key, force } => arca::cli::commands::delete::execute(&cli, key, *force),
        Commands::Key { action } => match action {
            KeyAction::Generate {
                name,
                full,
                allowed_secrets,
                allowed_prefixes,
                can_list,
            } => arca::cli::commands::key::generate(
                &cli,
                name,
                *full,
                allowed_secrets.clone(),
                allowed_prefixes.clone(),
                *can_list,
            ),
            KeyAction::Revoke { id } => arca::cli::commands::key::revoke(&cli, *id),
            KeyAction::List => arca::cli::commands::key::list(&cli),
        },
        Commands::Serve => arca::cli::commands::serve::execute(&cli),
        Commands::Export { output } => arca::cli::commands::export::execute(&cli, output),
        Commands::Import { file, overwrite } => {
            arca::cli::commands::import_cmd::execute(&cli, file, *overwrite)
        }
        Commands::Audit { last, stats } => {
            arca::cli::commands::audit_cmd::execute(&cli, *last, *stats)
        }
    };

    if let Err(e) = result {
        arca::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}
