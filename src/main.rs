use clap::Parser;
use repokey::cli::{commands, Cli, Commands, IdentityAction, KeysAction};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { ref recipient } => commands::init::execute(&cli, recipient.as_deref()),
        Commands::Keys { ref action } => match action {
            KeysAction::Add { ref recipient } => {
                commands::keys::execute_add(&cli, recipient.as_deref())
            }
            KeysAction::Rm {
                ref recipient,
                index,
            } => commands::keys::execute_rm(&cli, recipient.as_deref(), *index),
            KeysAction::List => commands::keys::execute_list(&cli),
            KeysAction::Test => commands::keys::execute_test(&cli),
        },
        Commands::Upgrade => commands::upgrade::execute(&cli),
        Commands::Identity { ref action } => match action {
            IdentityAction::New => commands::identity::execute_new(&cli),
        },
        Commands::Audit { last } => commands::audit_cmd::execute(&cli, last),
    };

    if let Err(e) = result {
        tracing::debug!(kind = e.kind().as_str(), "command failed");
        repokey::cli::output::error(&format!("{}: {e}", e.user_message()));
        std::process::exit(1);
    }
}
