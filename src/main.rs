use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use ledgerimport::config::Config;
use ledgerimport::repo::postgres::PostgresRepo;
use ledgerimport::repo::Repo;
use ledgerimport::server::{build_router, ServerState};

#[derive(Debug, Parser)]
#[command(name = "ledgerimport", version, about = "Import & Ledger Pipeline service")]
struct Cli {
    /// Socket address to bind, overriding LEDGERIMPORT_BIND_ADDR.
    #[arg(long)]
    bind_addr: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "ledgerimport=info,info".to_string()))
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(bind_addr) = cli.bind_addr {
        config.bind_addr = bind_addr;
    }

    if let Err(err) = run(config).await {
        tracing::error!(error = %err, "ledgerimport exited with an error");
        std::process::exit(1);
    }

    Ok(())
}

async fn run(config: Config) -> anyhow::Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    let repo: Arc<dyn Repo> = Arc::new(PostgresRepo::new(pool));
    let config = Arc::new(config);
    let state = ServerState {
        repo,
        config: config.clone(),
    };

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "ledgerimport listening");

    axum::serve(listener, app).await?;
    Ok(())
}
