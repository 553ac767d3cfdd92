use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use market::coingecko::CoinGeckoClient;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracker::{
    AppConfig, ChartRange, RefreshInterval, TerminalPresentation, Tracker, TrackerCommand,
    config::parse_asset_list, logger::init_tracing, time::SystemClock,
};

#[derive(Debug, Parser)]
#[clap(name = "tracker", version)]
struct Cli {
    /// Emit logs as JSON (stderr)
    #[clap(long)]
    json_logs: bool,

    /// Auto-refresh interval: 30s, 1m, 5m or 10m
    #[clap(long)]
    refresh: Option<RefreshInterval>,

    /// Default chart range in days: 7, 30, 90 or 365
    #[clap(long)]
    chart_range: Option<ChartRange>,

    /// Comma-separated provider asset ids
    #[clap(long)]
    assets: Option<String>,

    #[clap(long)]
    api_url: Option<String>,

    #[clap(long)]
    vs_currency: Option<String>,
}

impl Cli {
    fn apply(self, mut cfg: AppConfig) -> AppConfig {
        if let Some(r) = self.refresh {
            cfg.refresh = r;
        }
        if let Some(r) = self.chart_range {
            cfg.chart_range = r;
        }
        if let Some(ids) = self.assets.as_deref().map(parse_asset_list) {
            if !ids.is_empty() {
                cfg.assets = ids;
            }
        }
        if let Some(url) = self.api_url {
            cfg.api_url = url;
        }
        if let Some(vs) = self.vs_currency {
            cfg.vs_currency = vs;
        }
        cfg
    }
}

const HELP: &str = "commands: refresh | interval <30s|1m|5m|10m> | chart <asset-id> [days] | \
row <n> [days] | sort <column> [asc|desc] | filter [text] | quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let cfg = cli.apply(AppConfig::from_env());
    tracing::info!(api = %cfg.api_url, assets = cfg.assets.len(), "starting tracker");

    let client = Arc::new(
        CoinGeckoClient::new(
            cfg.api_url.clone(),
            cfg.vs_currency.clone(),
            cfg.timeouts.market,
            cfg.timeouts.icon,
        )
        .context("failed to build market data client")?,
    );

    let default_range = cfg.chart_range;
    let (tracker, handle) = Tracker::new(
        cfg,
        client.clone(),
        client,
        Box::new(TerminalPresentation::stdout()),
        Arc::new(SystemClock),
    );
    let foreground = tokio::spawn(tracker.run());

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match TrackerCommand::parse(&line, default_range) {
                    Ok(Some(TrackerCommand::Shutdown)) => break,
                    Ok(Some(cmd)) => {
                        if handle.send(cmd).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => eprintln!("{e}\n{HELP}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    // Already stopped is fine.
    let _ = handle.shutdown();
    foreground.await.context("tracker task failed")?;

    Ok(())
}
