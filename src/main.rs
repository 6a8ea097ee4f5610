use log::info;

use wifi_analyzer::analytics::{self, MAX_SERIES_POINTS};
use wifi_analyzer::config::{AppConfig, Backend};
use wifi_analyzer::data_provider::{DataProvider, ScanSource};
use wifi_analyzer::error::Result;
use wifi_analyzer::local_store::{DiskBasedDb, LocalStore};
use wifi_analyzer::model::Network;
use wifi_analyzer::remote_store::{RemoteStore, RestClient};

/// Loads the provider over `source` and logs the dashboard figures.
async fn run_dashboard<S: ScanSource>(source: S) -> Result<()> {
    let provider = DataProvider::activate(source).await?;

    let summary = provider.dashboard();
    info!(
        "{} scans, {} networks, {} open issues of {}",
        summary.total_scans,
        summary.total_networks,
        summary.open_issues,
        summary.total_issues
    );
    match summary.signal {
        Some(signal) => info!(
            "Overall signal {:?}, estimated coverage {}%",
            signal, summary.coverage_percent
        ),
        None => info!("No networks recorded yet"),
    }

    for scan in provider.recent_scans(5) {
        info!(
            "  [{}] {} at {} ({:?}, {})",
            scan.id,
            scan.name,
            scan.location,
            scan.status,
            scan.created_at.format("%Y-%m-%d %H:%M")
        );
    }

    let networks: Vec<Network> = provider
        .complete_scans()
        .into_iter()
        .flat_map(|detail| detail.networks)
        .collect();
    for usage in analytics::channel_utilization(&networks) {
        info!("  channel {:>2}: {}", usage.channel, usage.networks);
    }

    for point in provider.time_series(MAX_SERIES_POINTS) {
        info!(
            "  {} signal {:.0}% interference {:.0}% clients {}",
            point.timestamp.format("%Y-%m-%d %H:%M"),
            point.signal,
            point.interference,
            point.clients
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    info!("Starting wifi analyzer");

    let config = AppConfig::from_env()?;

    match config.backend {
        Backend::Local { data_dir } => {
            let db = DiskBasedDb::open_from(&data_dir)?;
            run_dashboard(LocalStore::new(db)?).await?;
        }
        Backend::Remote(remote) => {
            let client = RestClient::new(&remote)?;
            run_dashboard(RemoteStore::new(client)).await?;
        }
    }

    info!("wifi analyzer stopped");

    Ok(())
}
