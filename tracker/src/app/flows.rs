//! Snapshot, chart and icon flows, run on the foreground loop.
//!
//! Job builders return self-contained futures: they own everything they
//! need and only produce a value. Validation happens inside the job, so a
//! malformed payload settles as a failure before anything is cached.

use std::future::Future;
use std::sync::Arc;

use market::{
    AssetId, AssetSnapshot, FetchError, IconImage, IconTransport, MarketDataProvider, OhlcSeries,
};
use tracing::{debug, info, warn};

use super::Tracker;
use crate::config::ChartRange;
use crate::error::TrackerError;
use crate::jobs::{JobEvent, JobKey, JobOutcome, JobValue};
use crate::scheduler::RefreshReason;

pub(crate) fn snapshot_job(
    provider: Arc<dyn MarketDataProvider>,
    ids: Vec<AssetId>,
) -> impl Future<Output = JobOutcome> + Send + 'static {
    async move {
        let snapshots = provider.fetch_snapshot(&ids).await?;
        if snapshots.is_empty() {
            return Err(FetchError::data_shape("no market data returned"));
        }
        Ok(JobValue::Snapshot(Arc::new(snapshots)))
    }
}

pub(crate) fn ohlc_job(
    provider: Arc<dyn MarketDataProvider>,
    asset_id: AssetId,
    range: ChartRange,
) -> impl Future<Output = JobOutcome> + Send + 'static {
    async move {
        let rows = provider.fetch_ohlc(&asset_id, range.days()).await?;
        let series = OhlcSeries::from_rows(&rows)?;
        Ok(JobValue::Ohlc(Arc::new(series)))
    }
}

pub(crate) fn icon_job(
    icons: Arc<dyn IconTransport>,
    asset_id: AssetId,
    url: String,
) -> impl Future<Output = JobOutcome> + Send + 'static {
    async move {
        let bytes = icons.fetch_bytes(&url).await?;
        if bytes.is_empty() {
            return Err(FetchError::data_shape("empty icon body"));
        }
        Ok(JobValue::Icon(Arc::new(IconImage { asset_id, bytes })))
    }
}

impl Tracker {
    pub(super) fn request_snapshot(&mut self, reason: RefreshReason) {
        info!(?reason, assets = self.cfg.assets.len(), "refreshing market data");
        self.presentation.set_status("Fetching market data...");

        let work = snapshot_job(Arc::clone(&self.provider), self.cfg.assets.clone());
        let handle = self.dispatcher.submit(JobKey::Snapshot, work);
        if handle.is_attached() {
            debug!("snapshot already in flight; joined it");
        }
    }

    /// Chart for `asset_id`. The id is captured here and travels in the job
    /// key, so the result renders for this asset whatever is selected later.
    pub(super) fn request_chart(&mut self, asset_id: AssetId, range: ChartRange) {
        let key = JobKey::ohlc(asset_id.clone(), range, self.clock.today_utc());

        if let Some(JobValue::Ohlc(series)) = self.dispatcher.lookup(&key) {
            debug!(key = %key, "chart served from cache");
            let series = Arc::clone(series);
            self.show_chart(&asset_id, range, &series);
            return;
        }

        let name = self.display_name(&asset_id);
        self.presentation
            .set_status(&format!("Fetching {name} {} chart...", range));

        let work = ohlc_job(Arc::clone(&self.provider), asset_id, range);
        // The outcome arrives through `on_event`.
        self.dispatcher.submit(key, work);
    }

    pub(super) fn chart_for_row(&mut self, row: usize, range: ChartRange) {
        match self.registry.asset_at_row(row).cloned() {
            Some(asset_id) => self.request_chart(asset_id, range),
            None => self.report(TrackerError::UnknownRow { row }),
        }
    }

    pub(super) fn on_event(&mut self, event: JobEvent) {
        match event {
            JobEvent::Completed {
                key: JobKey::Snapshot,
                value: JobValue::Snapshot(snapshots),
            } => self.apply_snapshot(&snapshots),

            JobEvent::Completed {
                key: JobKey::Ohlc {
                    asset_id, range, ..
                },
                value: JobValue::Ohlc(series),
            } => self.show_chart(&asset_id, range, &series),

            JobEvent::Completed {
                key: JobKey::Icon { asset_id },
                value: JobValue::Icon(icon),
            } => self.route_icon(&asset_id, &icon),

            JobEvent::Completed { key, value } => {
                warn!(key = %key, value = value.kind(), "completion of unexpected kind ignored");
            }

            JobEvent::Failed { key, error } => self.on_failure(key, error),
        }
    }

    fn apply_snapshot(&mut self, snapshots: &[AssetSnapshot]) {
        self.registry.upsert_all(snapshots);

        let rows = self.registry.visible();
        self.presentation.render_snapshot_table(&rows);
        self.presentation.set_status(&format!(
            "Market data updated ({} assets)",
            self.registry.len()
        ));
        info!(
            assets = self.registry.len(),
            generation = self.registry.generation(),
            "snapshot applied"
        );

        self.request_icons(snapshots);
    }

    /// One independent best-effort job per asset. Cached icons are pushed
    /// straight away.
    fn request_icons(&mut self, snapshots: &[AssetSnapshot]) {
        for snap in snapshots {
            let Some(url) = snap.icon_url.clone() else {
                continue;
            };

            let key = JobKey::icon(snap.id.clone());
            if let Some(JobValue::Icon(icon)) = self.dispatcher.lookup(&key) {
                self.presentation.update_icon(&snap.id, &icon.bytes);
                continue;
            }

            let work = icon_job(Arc::clone(&self.icons), snap.id.clone(), url);
            self.dispatcher.submit(key, work);
        }
    }

    fn show_chart(&mut self, asset_id: &AssetId, range: ChartRange, series: &OhlcSeries) {
        let Some(handle) = self.registry.resolve(asset_id) else {
            self.report(TrackerError::RoutingMiss {
                asset_id: asset_id.clone(),
            });
            return;
        };

        self.presentation.render_chart(series, &handle.name, range);
        self.presentation
            .set_status(&format!("Showing chart for {}", handle.name));
    }

    fn route_icon(&mut self, asset_id: &AssetId, icon: &IconImage) {
        if self.registry.resolve(asset_id).is_some() {
            self.presentation.update_icon(asset_id, &icon.bytes);
        } else {
            debug!(asset_id = %asset_id, "icon arrived for asset no longer shown; dropped");
        }
    }

    fn on_failure(&mut self, key: JobKey, error: FetchError) {
        match &key {
            JobKey::Icon { asset_id } => {
                debug!(asset_id = %asset_id, error = %error, "icon fetch failed; ignored");
            }
            JobKey::Snapshot => {
                warn!(error = %error, "market data fetch failed");
                self.presentation
                    .report_error(&format!("Failed to fetch market data: {error}"));
                self.presentation.set_status("Fetch error");
            }
            JobKey::Ohlc {
                asset_id, range, ..
            } => {
                warn!(key = %key, error = %error, "chart fetch failed");
                let name = self.display_name(asset_id);
                self.presentation
                    .report_error(&format!("Failed to load {name} {range} chart: {error}"));
                self.presentation.set_status("Fetch error");
            }
        }
    }

    pub(super) fn report(&mut self, error: TrackerError) {
        warn!(error = %error, "request failed");
        self.presentation.report_error(&error.to_string());
    }

    fn display_name(&self, asset_id: &AssetId) -> String {
        self.registry
            .resolve(asset_id)
            .map_or_else(|| asset_id.to_string(), |h| h.name)
    }
}
