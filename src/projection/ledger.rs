//! Harvest ledger reconciliation.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::config::ProjectionConfig;
use crate::model::{sanitize_quantity, ProductionEntry, UnitDay, UnitKey};

/// Production already recorded, summed per unit and local day.
#[derive(Debug, Clone, Default)]
pub struct ProductionLedger {
    totals: HashMap<UnitDay, f64>,
}

impl ProductionLedger {
    pub fn new(entries: &[ProductionEntry], config: &ProjectionConfig) -> Self {
        let mut totals: HashMap<UnitDay, f64> = HashMap::with_capacity(entries.len());
        for entry in entries {
            let Some(unit) =
                UnitKey::from_parts(Some(entry.block_id.as_str()), Some(entry.variety_id.as_str()))
            else {
                continue;
            };
            let key = UnitDay::new(unit, config.local_date(entry.produced_at));
            *totals.entry(key).or_insert(0.0) += sanitize_quantity(entry.quantity);
        }
        Self { totals }
    }

    /// Quantity produced for `unit` on `date`; zero when nothing was recorded.
    pub fn produced(&self, unit: &UnitKey, date: NaiveDate) -> f64 {
        self.totals
            .get(&UnitDay::new(unit.clone(), date))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}

/// Net harvestable quantity. Never negative.
pub fn available(raw_harvest: f64, produced: f64) -> f64 {
    (raw_harvest - produced).max(0.0)
}
