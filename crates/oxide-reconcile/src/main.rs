//! oxide-reconcile CLI
//!
//! Inspects and resets a live schema through the reconciliation engine.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_reconcile::prelude::*;
use oxide_reconcile::schema::split_qualified;

/// Dialect-aware schema reconciliation for PostgreSQL and MySQL.
#[derive(Parser)]
#[command(name = "oxide-reconcile")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (`postgres://`, `postgresql://`, `mysql://` or `mariadb://`).
    #[arg(short, long, env = "DATABASE_URL")]
    database_url: String,

    /// Schema (Postgres) or database (MySQL) unqualified names resolve into.
    #[arg(long, env = "RECONCILE_SCHEMA")]
    schema: Option<String>,

    /// Table that records view definitions.
    #[arg(long, env = "RECONCILE_METADATA_TABLE", default_value = "oxide_metadata")]
    metadata_table: String,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load tables and print them as JSON.
    Inspect {
        /// Table names, optionally qualified.
        #[arg(required = true)]
        tables: Vec<String>,
    },

    /// Load registered views and print them as JSON.
    Views {
        /// View names; all registered views when empty.
        views: Vec<String>,
    },

    /// Print the CREATE TABLE statement for each table.
    Ddl {
        /// Table names, optionally qualified.
        #[arg(required = true)]
        tables: Vec<String>,
    },

    /// Create the view registry table.
    Init,

    /// Drop every view, table and enum type in a namespace.
    Clear {
        /// Namespace to clear (the current one if not specified).
        #[arg(short, long)]
        namespace: Option<String>,

        /// Confirm the teardown.
        #[arg(long)]
        yes: bool,
    },
}

/// Database system selected by the URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Postgres,
    MySql,
}

impl Backend {
    fn from_url(url: &str) -> anyhow::Result<Self> {
        let scheme = url.split_once("://").map(|(scheme, _)| scheme).unwrap_or_default();
        match scheme {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySql),
            other => bail!("unsupported database URL scheme '{}'", other),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = EngineConfig::new().metadata_table(&cli.metadata_table);
    match Backend::from_url(&cli.database_url)? {
        Backend::Postgres => {
            if let Some(schema) = &cli.schema {
                config = config.schema(schema);
            }
            let executor = PgExecutor::connect(&cli.database_url)
                .await
                .context("connecting to PostgreSQL")?;
            let dialect = PostgresDialect::new(config.schema.clone());
            run(SchemaEngine::new(dialect, executor, config), cli.command).await
        }
        Backend::MySql => {
            if let Some(database) = &cli.schema {
                config = config.database(database);
            }
            let executor = MySqlExecutor::connect(&cli.database_url)
                .await
                .context("connecting to MySQL")?;
            let dialect = MySqlDialect::new(config.database.clone());
            run(SchemaEngine::new(dialect, executor, config), cli.command).await
        }
    }
}

async fn run<D, E>(engine: SchemaEngine<D, E>, command: Commands) -> anyhow::Result<()>
where
    D: Dialect,
    E: QueryExecutor,
{
    match command {
        Commands::Inspect { tables } => {
            let loaded = engine.load_tables(&tables).await?;
            for name in &tables {
                let (_, bare) = split_qualified(name);
                if !loaded.iter().any(|t| t.bare_name() == bare) {
                    warn!("Table not found: {}", name);
                }
            }
            println!("{}", serde_json::to_string_pretty(&loaded)?);
        }

        Commands::Views { views } => {
            let loaded = engine.load_views(&views).await?;
            println!("{}", serde_json::to_string_pretty(&loaded)?);
        }

        Commands::Ddl { tables } => {
            for name in &tables {
                let ddl = engine.table_ddl(TableRef::Name(name)).await?;
                println!("{};", ddl);
            }
        }

        Commands::Init => {
            info!("Creating view registry '{}'...", engine.config().metadata_table);
            engine.ensure_metadata_table().await?;
            info!("View registry ready.");
        }

        Commands::Clear { namespace, yes } => {
            if !yes {
                bail!("refusing to clear the database without --yes");
            }
            engine.clear_database(namespace.as_deref()).await?;
            info!("Database cleared.");
        }
    }

    Ok(())
}
