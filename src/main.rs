use std::sync::Arc;

use accident_area::api::{self, AppState};
use accident_area::map::{ClickOutcome, MapHost, templates};
use accident_area::overpass::OverpassClient;
use accident_area::{Config, LatLon};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the accident area API and serve the map page.
    Serve,
    /// Click a point on the map headlessly and print what the map would show.
    Locate {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Also press "Confirm accident" when the point resolves to a way.
        #[arg(long)]
        confirm: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("accident_area=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    match args.command {
        Command::Serve => serve(config).await,
        Command::Locate { lat, lon, confirm } => locate(config, LatLon::new(lat, lon), confirm).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let ways = OverpassClient::new(&config.overpass_url)?;
    let state = Arc::new(AppState {
        ways: Arc::new(ways),
        map_page: templates::render_map_page(&config),
    });
    let app = api::router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, api_base = %config.api_base, "API server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn locate(config: Config, point: LatLon, confirm: bool) -> anyhow::Result<()> {
    let host = MapHost::new(&config)?;
    let marker = host.marker();

    if marker.on_click(point).await == ClickOutcome::Located && confirm {
        let outcome = marker.confirm().await;
        info!(?outcome, "Confirm accident");
    }

    print!("{}", host.render());
    Ok(())
}
