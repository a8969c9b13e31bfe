//! Governance document graph node.
//!
//! ```bash
//! docgraph --config docgraph.toml
//! docgraph --data-dir /var/lib/docgraph --listen 0.0.0.0:8080
//! ```

mod config;

use clap::Parser;
use config::NodeConfig;
use docgraph_database::basic_db::{InnerDatabase, SafeDatabase};
use docgraph_service::external::{MemoryLedger, SystemClock};
use docgraph_service::{Collaborators, Dao};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "docgraph")]
#[command(about = "Governance document graph node")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "DOCGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// libmdbx data directory
    #[arg(long, env = "DOCGRAPH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// HTTP listen address
    #[arg(long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("docgraph=info".parse()?)
                .add_directive("docgraph_service=info".parse()?)
                .add_directive("docgraph_net=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(addr) = args.listen {
        config.listen_addr = addr;
    }

    info!(
        data_dir = %config.data_dir.display(),
        listen_addr = %config.listen_addr,
        dao = %config.dao.dao_account,
        "Starting docgraph"
    );

    std::fs::create_dir_all(&config.data_dir)?;
    let db = InnerDatabase::new(&config.data_dir)?;

    let ledger = Arc::new(MemoryLedger::new(&config.dao.voting_symbol, config.dao.voting_precision));
    for token in &config.tokens {
        ledger.register(&token.symbol, token.precision);
    }
    for entry in &config.genesis {
        ledger.set_balance(&entry.account, entry.amount.clone());
    }

    let dao = Dao::open(
        db,
        config.dao.clone(),
        Collaborators {
            clock: Arc::new(SystemClock::new()),
            voting_power: ledger.clone(),
            treasury: ledger,
        },
    )?;
    for entry in &config.genesis {
        dao.enroll(&entry.account)?;
    }

    docgraph_net::server::build_server(Arc::new(dao), config.listen_addr).await?;
    Ok(())
}
