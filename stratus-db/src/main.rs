use std::path::PathBuf;

use clap::{Parser, Subcommand, Args};

mod error;
mod conn;
mod run;

use conn::DbArgs;

/// database administration for stratus
#[derive(Debug, Parser)]
#[command(name = "stratus-db", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// creates the database tables from scratch
    Setup(SetupArgs),

    /// storage owner operations
    #[command(subcommand)]
    Owner(OwnerCommand),
}

#[derive(Debug, Args)]
pub struct SetupArgs {
    /// rollback changes made to the database
    #[arg(long)]
    rollback: bool,

    /// directory holding the setup sql files
    #[arg(long, default_value = "stratus-db/setup/postgres")]
    dir: PathBuf,

    #[command(flatten)]
    db: DbArgs,
}

#[derive(Debug, Subcommand)]
enum OwnerCommand {
    /// registers an owner with a storage quota
    Create(CreateOwnerArgs),

    /// changes the quota of an existing owner
    Quota(QuotaArgs),

    /// stops an owner from making further requests
    Deactivate(OwnerArgs),
}

#[derive(Debug, Args)]
pub struct CreateOwnerArgs {
    /// id of the owner as given by the authentication proxy
    id: String,

    /// maximum bytes the owner may store
    #[arg(short, long, default_value_t = 10_737_418_240)]
    quota: u64,

    #[command(flatten)]
    db: DbArgs,
}

#[derive(Debug, Args)]
pub struct QuotaArgs {
    id: String,

    bytes: u64,

    #[command(flatten)]
    db: DbArgs,
}

#[derive(Debug, Args)]
pub struct OwnerArgs {
    id: String,

    #[command(flatten)]
    db: DbArgs,
}

fn main() {
    use tokio::runtime::Builder;
    use tracing_subscriber::{FmtSubscriber, EnvFilter};

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("failed to initialize global tracing subscriber");

    let cli = Cli::parse();

    let rt = match Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build() {
        Ok(rt) => rt,
        Err(err) => panic!("failed to start tokio runtime, {:#}", err)
    };

    if let Err(err) = rt.block_on(exec(cli.command)) {
        eprintln!("{err}");

        std::process::exit(1);
    }
}

async fn exec(command: Command) -> error::Result<()> {
    match command {
        Command::Setup(args) => run::setup::run(&args).await,
        Command::Owner(OwnerCommand::Create(args)) => run::owner::create(&args).await,
        Command::Owner(OwnerCommand::Quota(args)) => run::owner::quota(&args).await,
        Command::Owner(OwnerCommand::Deactivate(args)) => run::owner::deactivate(&args).await,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use clap::CommandFactory;

    #[test]
    fn command_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn owner_create_args() {
        let cli = Cli::try_parse_from([
            "stratus-db", "owner", "create", "alice", "--quota", "1024", "--dbname", "testing"
        ]).unwrap();

        let Command::Owner(OwnerCommand::Create(args)) = cli.command else {
            panic!("expected owner create");
        };

        assert_eq!(args.id, "alice");
        assert_eq!(args.quota, 1024);
    }

    #[test]
    fn connect_conflicts_with_parts() {
        let result = Cli::try_parse_from([
            "stratus-db", "setup", "--connect", "postgres://localhost/stratus", "--host", "db"
        ]);

        assert!(result.is_err());
    }
}
