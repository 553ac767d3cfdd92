//! Asset id ↔ display element mapping.
//!
//! The table is rebuilt wholesale from each snapshot. Sorting and filtering
//! only permute or hide rows; the id → entity association used for routing
//! results is never touched by them.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use market::{AssetId, AssetSnapshot};

use crate::error::TrackerError;

/// Table column the display can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Price,
    MarketCap,
    Change24h,
    Change7d,
    Volume,
    CirculatingSupply,
    TotalSupply,
}

impl SortKey {
    fn compare(self, a: &AssetSnapshot, b: &AssetSnapshot) -> Ordering {
        match self {
            Self::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            Self::Price => a.price.total_cmp(&b.price),
            Self::MarketCap => a.market_cap.total_cmp(&b.market_cap),
            Self::Change24h => a.change_24h_pct.total_cmp(&b.change_24h_pct),
            Self::Change7d => a.change_7d_pct.total_cmp(&b.change_7d_pct),
            Self::Volume => a.volume_24h.total_cmp(&b.volume_24h),
            Self::CirculatingSupply => a.circulating_supply.total_cmp(&b.circulating_supply),
            // Uncapped supply sorts as zero.
            Self::TotalSupply => a
                .total_supply
                .unwrap_or(0.0)
                .total_cmp(&b.total_supply.unwrap_or(0.0)),
        }
    }
}

impl FromStr for SortKey {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "name" | "coin" => Ok(Self::Name),
            "price" => Ok(Self::Price),
            "mcap" | "market_cap" | "marketcap" => Ok(Self::MarketCap),
            "24h" | "change_24h" => Ok(Self::Change24h),
            "7d" | "change_7d" => Ok(Self::Change7d),
            "volume" | "vol" => Ok(Self::Volume),
            "circulating" | "circulating_supply" => Ok(Self::CirculatingSupply),
            "total" | "total_supply" => Ok(Self::TotalSupply),
            other => Err(TrackerError::InvalidCommand(format!(
                "unknown sort column {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub key: SortKey,
    pub descending: bool,
}

impl SortSpec {
    pub fn ascending(key: SortKey) -> Self {
        Self {
            key,
            descending: false,
        }
    }

    pub fn descending(key: SortKey) -> Self {
        Self {
            key,
            descending: true,
        }
    }
}

/// Resolved identity of a display element.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayHandle {
    pub asset_id: AssetId,
    pub name: String,
    pub symbol: String,
    /// Position in the snapshot that produced this entity.
    pub slot: usize,
    /// Current visible row, `None` while filtered out.
    pub row: Option<usize>,
    /// Snapshot generation the entity belongs to.
    pub generation: u64,
}

impl fmt::Display for DisplayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.symbol.to_uppercase())
    }
}

struct Entity {
    snapshot: AssetSnapshot,
    slot: usize,
}

#[derive(Default)]
pub struct EntityRegistry {
    entities: HashMap<AssetId, Entity>,
    /// All ids in display order.
    order: Vec<AssetId>,
    /// `order` with the filter applied.
    visible: Vec<AssetId>,
    sort: Option<SortSpec>,
    /// Lower-cased search text; empty shows everything.
    filter: String,
    generation: u64,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replace the whole table with `snapshots`.
    ///
    /// If an id repeats, the later record wins but keeps the slot of the
    /// first. The current sort and filter are re-applied.
    pub fn upsert_all(&mut self, snapshots: &[AssetSnapshot]) {
        let mut entities: HashMap<AssetId, Entity> = HashMap::with_capacity(snapshots.len());
        let mut slots: Vec<AssetId> = Vec::with_capacity(snapshots.len());

        for snap in snapshots {
            match entities.get_mut(&snap.id) {
                Some(existing) => existing.snapshot = snap.clone(),
                None => {
                    entities.insert(
                        snap.id.clone(),
                        Entity {
                            snapshot: snap.clone(),
                            slot: slots.len(),
                        },
                    );
                    slots.push(snap.id.clone());
                }
            }
        }

        self.entities = entities;
        self.order = slots;
        self.generation += 1;
        self.rebuild();
    }

    pub fn get(&self, asset_id: &AssetId) -> Option<&AssetSnapshot> {
        self.entities.get(asset_id).map(|e| &e.snapshot)
    }

    /// Look up the display element for `asset_id`, independent of the
    /// current sort and filter.
    pub fn resolve(&self, asset_id: &AssetId) -> Option<DisplayHandle> {
        let entity = self.entities.get(asset_id)?;
        Some(DisplayHandle {
            asset_id: asset_id.clone(),
            name: entity.snapshot.name.clone(),
            symbol: entity.snapshot.symbol.clone(),
            slot: entity.slot,
            row: self.visible.iter().position(|id| id == asset_id),
            generation: self.generation,
        })
    }

    /// Asset shown at visible `row`.
    pub fn asset_at_row(&self, row: usize) -> Option<&AssetId> {
        self.visible.get(row)
    }

    /// Visible rows in display order.
    pub fn visible(&self) -> Vec<AssetSnapshot> {
        self.visible
            .iter()
            .filter_map(|id| self.get(id).cloned())
            .collect()
    }

    pub fn sort_by(&mut self, spec: SortSpec) {
        self.sort = Some(spec);
        self.rebuild();
    }

    /// Back to snapshot order.
    pub fn clear_sort(&mut self) {
        self.sort = None;
        self.rebuild();
    }

    /// Show only rows whose name or symbol contains `text`
    /// (case-insensitive). Empty text shows everything.
    pub fn set_filter(&mut self, text: &str) {
        self.filter = text.trim().to_lowercase();
        self.rebuild();
    }

    fn rebuild(&mut self) {
        self.order
            .sort_by_key(|id| self.entities.get(id).map_or(usize::MAX, |e| e.slot));

        if let Some(spec) = self.sort {
            let entities = &self.entities;
            self.order.sort_by(|a, b| {
                let (Some(ea), Some(eb)) = (entities.get(a), entities.get(b)) else {
                    return Ordering::Equal;
                };
                let ord = spec.key.compare(&ea.snapshot, &eb.snapshot);
                if spec.descending { ord.reverse() } else { ord }
            });
        }

        let filter = &self.filter;
        let entities = &self.entities;
        self.visible = self
            .order
            .iter()
            .filter(|id| {
                filter.is_empty()
                    || entities.get(*id).is_some_and(|e| {
                        e.snapshot.name.to_lowercase().contains(filter.as_str())
                            || e.snapshot.symbol.to_lowercase().contains(filter.as_str())
                    })
            })
            .cloned()
            .collect();
    }
}
