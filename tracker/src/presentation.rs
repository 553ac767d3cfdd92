//! Presentation adapter interface and a plain-text terminal adapter.
//!
//! The core only ever pushes into a [`Presentation`]; it never reads
//! display state back except through the entity registry.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::io::{self, Stdout, Write};

use market::{AssetId, AssetSnapshot, OhlcSeries};
use tracing::warn;

use crate::config::ChartRange;

pub trait Presentation: Send {
    /// Replace the table with `rows`, already in display order.
    fn render_snapshot_table(&mut self, rows: &[AssetSnapshot]);

    fn render_chart(&mut self, series: &OhlcSeries, asset_name: &str, range: ChartRange);

    fn update_icon(&mut self, asset_id: &AssetId, bytes: &[u8]);

    /// Non-fatal, user-visible failure.
    fn report_error(&mut self, message: &str);

    fn set_status(&mut self, text: &str);
}

const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Writes tables, charts and status lines as text.
pub struct TerminalPresentation<W: Write + Send = Stdout> {
    out: W,
    /// Assets whose icon has arrived; marked in the table.
    icons: HashSet<AssetId>,
}

impl TerminalPresentation<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalPresentation<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            icons: HashSet::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            warn!(error = %e, "terminal write failed");
        }
    }
}

impl<W: Write + Send> Presentation for TerminalPresentation<W> {
    fn render_snapshot_table(&mut self, rows: &[AssetSnapshot]) {
        let mut text = String::new();
        let _ = writeln!(
            text,
            "{:>3}  {:<24} {:>14} {:>18} {:>9} {:>9} {:>18} {:>18} {:>18}",
            "#", "Coin", "Price", "Market Cap", "24h %", "7d %", "Volume", "Circulating", "Total"
        );
        for (row, s) in rows.iter().enumerate() {
            let marker = if self.icons.contains(&s.id) { '*' } else { ' ' };
            let coin = format!("{marker}{} ({})", s.name, s.symbol.to_uppercase());
            let _ = writeln!(
                text,
                "{:>3}  {:<24} {:>14} {:>18} {:>9} {:>9} {:>18} {:>18} {:>18}",
                row,
                coin,
                format!("${}", group_thousands(s.price, 2)),
                format!("${}", group_thousands(s.market_cap, 0)),
                signed_pct(s.change_24h_pct),
                signed_pct(s.change_7d_pct),
                format!("${}", group_thousands(s.volume_24h, 0)),
                group_thousands(s.circulating_supply, 0),
                s.total_supply
                    .map_or_else(|| "∞".to_string(), |t| group_thousands(t, 0)),
            );
        }
        self.emit(&text);
    }

    fn render_chart(&mut self, series: &OhlcSeries, asset_name: &str, range: ChartRange) {
        let mut text = format!("{asset_name} · {} days candlestick\n", range.days());

        if let (Some(first), Some(last), Some((low, high))) =
            (series.first(), series.last(), series.price_range())
        {
            let _ = writeln!(text, "  {}", sparkline(series, low, high));
            let _ = writeln!(
                text,
                "  {} → {}  open {:.2}  close {:.2}  low {:.2}  high {:.2}  ({} candles)",
                first.ts.format("%m-%d"),
                last.ts.format("%m-%d"),
                first.open,
                last.close,
                low,
                high,
                series.len()
            );
        }
        self.emit(&text);
    }

    fn update_icon(&mut self, asset_id: &AssetId, _bytes: &[u8]) {
        self.icons.insert(asset_id.clone());
    }

    fn report_error(&mut self, message: &str) {
        self.emit(&format!("error: {message}\n"));
    }

    fn set_status(&mut self, text: &str) {
        self.emit(&format!("[{text}]\n"));
    }
}

fn sparkline(series: &OhlcSeries, low: f64, high: f64) -> String {
    let span = high - low;
    series
        .candles()
        .iter()
        .map(|c| {
            if span <= 0.0 {
                return SPARK[SPARK.len() / 2];
            }
            let idx = ((c.close - low) / span * (SPARK.len() - 1) as f64).round() as usize;
            SPARK[idx.min(SPARK.len() - 1)]
        })
        .collect()
}

/// `1234567.891` with 2 decimals → `1,234,567.89`.
pub fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && formatted.chars().any(|c| c != '0' && c != '.') {
        "-"
    } else {
        ""
    };
    match frac_part {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

fn signed_pct(v: f64) -> String {
    format!("{v:+.2}%")
}
