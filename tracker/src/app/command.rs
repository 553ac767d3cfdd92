use market::AssetId;

use crate::config::{ChartRange, RefreshInterval};
use crate::error::TrackerError;
use crate::registry::{SortKey, SortSpec};

/// Requests sent to the foreground loop.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerCommand {
    /// Snapshot now, without moving the timer phase.
    RefreshNow,
    SetInterval(RefreshInterval),
    ShowChart {
        asset_id: AssetId,
        range: ChartRange,
    },
    /// Chart for whatever asset is shown at visible `row` right now.
    ChartForRow {
        row: usize,
        range: ChartRange,
    },
    Sort(SortSpec),
    Filter(String),
    Shutdown,
}

impl TrackerCommand {
    /// Parse one terminal line. Blank lines yield `Ok(None)`.
    ///
    /// ```text
    /// refresh
    /// interval <30s|1m|5m|10m>
    /// chart <asset-id> [days]
    /// row <n> [days]
    /// sort <column> [asc|desc]
    /// filter [text]
    /// quit
    /// ```
    pub fn parse(line: &str, default_range: ChartRange) -> Result<Option<Self>, TrackerError> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };

        let range_arg = |arg: Option<&str>| -> Result<ChartRange, TrackerError> {
            match arg {
                Some(a) => Ok(a.parse()?),
                None => Ok(default_range),
            }
        };

        let cmd = match verb.to_lowercase().as_str() {
            "refresh" | "r" => Self::RefreshNow,
            "interval" => {
                let label = words.next().ok_or_else(|| missing("interval", "<30s|1m|5m|10m>"))?;
                Self::SetInterval(label.parse()?)
            }
            "chart" => {
                let id = words.next().ok_or_else(|| missing("chart", "<asset-id>"))?;
                Self::ShowChart {
                    asset_id: AssetId::from(id),
                    range: range_arg(words.next())?,
                }
            }
            "row" => {
                let raw = words.next().ok_or_else(|| missing("row", "<n>"))?;
                let row = raw
                    .parse()
                    .map_err(|_| TrackerError::InvalidCommand(format!("bad row number {raw:?}")))?;
                Self::ChartForRow {
                    row,
                    range: range_arg(words.next())?,
                }
            }
            "sort" => {
                let key: SortKey = words.next().ok_or_else(|| missing("sort", "<column>"))?.parse()?;
                let descending = match words.next() {
                    None | Some("asc") => false,
                    Some("desc") => true,
                    Some(other) => {
                        return Err(TrackerError::InvalidCommand(format!(
                            "sort direction must be asc or desc, got {other:?}"
                        )));
                    }
                };
                Self::Sort(SortSpec { key, descending })
            }
            "filter" => Self::Filter(words.collect::<Vec<_>>().join(" ")),
            "quit" | "exit" | "q" => Self::Shutdown,
            other => {
                return Err(TrackerError::InvalidCommand(format!(
                    "unknown command {other:?}"
                )));
            }
        };

        Ok(Some(cmd))
    }
}

fn missing(verb: &str, usage: &str) -> TrackerError {
    TrackerError::InvalidCommand(format!("usage: {verb} {usage}"))
}
