use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use pulsemetrics::api::{self, AppState};
use pulsemetrics::db::Database;
use pulsemetrics::logging::configure_logging;
use pulsemetrics::taxonomy::SignalTaxonomy;

#[derive(Parser)]
#[clap(name = "pulsemetrics", about = "Engagement metrics reporting service")]
struct Args {
    /// Path to the SQLite database file
    #[clap(short, long, env = "DATABASE_PATH", default_value = "pulsemetrics.db")]
    database: String,

    /// Port to listen on
    #[clap(short, long, env = "PORT", default_value = "8080")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    configure_logging();

    let db = Database::new(&args.database).await?;
    let state = AppState {
        db,
        taxonomy: Arc::new(SignalTaxonomy::default()),
    };

    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
