use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "nf")]
#[command(about = "News-feed pipeline CLI", long_about = None)]
struct Cli {
    /// Base URL of a running nf-daemon, for feed/stats commands.
    #[arg(long, global = true, default_value = "http://127.0.0.1:8787")]
    daemon_url: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> local overrides)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Feed (source) management, talking to a running nf-daemon
    Feeds {
        #[command(subcommand)]
        cmd: FeedsCmd,
    },

    /// Print pipeline stats from a running nf-daemon
    Stats,
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    Migrate,
}

#[derive(Subcommand)]
enum FeedsCmd {
    List,
    Add {
        url: String,
        #[arg(long)]
        name: Option<String>,
    },
    Remove {
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = nf_store::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    nf_store::migrate(&pool).await?;
                    println!("db_ok=true");
                }
                DbCmd::Migrate => {
                    nf_store::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = nf_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Feeds { cmd } => run_feeds_cmd(&cli.daemon_url, cmd).await?,

        Commands::Stats => {
            let client = reqwest::Client::new();
            let body: serde_json::Value = client
                .get(format!("{}/v1/stats", cli.daemon_url))
                .send()
                .await
                .context("request to nf-daemon failed")?
                .json()
                .await
                .context("failed to parse stats response")?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}

async fn run_feeds_cmd(daemon_url: &str, cmd: FeedsCmd) -> Result<()> {
    let client = reqwest::Client::new();

    match cmd {
        FeedsCmd::List => {
            let body: serde_json::Value = client
                .get(format!("{daemon_url}/v1/feeds"))
                .send()
                .await
                .context("request to nf-daemon failed")?
                .json()
                .await
                .context("failed to parse feeds response")?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        FeedsCmd::Add { url, name } => {
            let body: serde_json::Value = client
                .post(format!("{daemon_url}/v1/feeds"))
                .json(&serde_json::json!({ "url": url, "name": name }))
                .send()
                .await
                .context("request to nf-daemon failed")?
                .json()
                .await
                .context("failed to parse add-feed response")?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        FeedsCmd::Remove { id } => {
            let status = client
                .delete(format!("{daemon_url}/v1/feeds/{id}"))
                .send()
                .await
                .context("request to nf-daemon failed")?
                .status();
            println!("status={status}");
        }
    }

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .try_init();
}
