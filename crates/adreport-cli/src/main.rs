mod reports;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "adreport-cli")]
#[command(about = "Adzerk usage reporting command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance.
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Report dispatch and consumption.
    Reports {
        #[command(subcommand)]
        command: ReportsCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity.
    Ping,
    /// Apply pending migrations.
    Migrate,
}

#[derive(Debug, Subcommand)]
enum ReportsCommands {
    /// Queue report tasks for everything serving yesterday or today.
    Dispatch {
        /// Print the task groups without queueing them.
        #[arg(long)]
        dry_run: bool,
    },
    /// Consume report tasks from the queue.
    Consume {
        /// Stop once the queue is empty instead of polling.
        #[arg(long)]
        once: bool,
    },
    /// Show queue message counts by status.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("adreport-cli: no command given; see --help");
        return Ok(());
    };

    let config = adreport_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = adreport_db::PoolConfig::from_app_config(&config);
    let pool = adreport_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            adreport_db::ping(&pool).await?;
            println!("database ok");
        }
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            let applied = adreport_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        Commands::Reports {
            command: ReportsCommands::Dispatch { dry_run },
        } => reports::run_dispatch(&pool, &config, dry_run).await?,
        Commands::Reports {
            command: ReportsCommands::Consume { once },
        } => reports::run_consume(&pool, &config, once).await?,
        Commands::Reports {
            command: ReportsCommands::Status,
        } => reports::run_status(&pool).await?,
    }

    Ok(())
}
