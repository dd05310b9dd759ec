use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::projection::stage::Stage;

// ============================================================================
// Keys
// ============================================================================

/// A planting unit: one variety grown in one block.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitKey {
    pub block_id: String,
    pub variety_id: String,
}

impl UnitKey {
    pub fn new(block_id: impl Into<String>, variety_id: impl Into<String>) -> Self {
        Self {
            block_id: block_id.into(),
            variety_id: variety_id.into(),
        }
    }

    /// Builds a key only when both ids are present and non-blank.
    pub fn from_parts(block_id: Option<&str>, variety_id: Option<&str>) -> Option<Self> {
        let block = block_id.map(str::trim).filter(|s| !s.is_empty())?;
        let variety = variety_id.map(str::trim).filter(|s| !s.is_empty())?;
        Some(Self::new(block, variety))
    }
}

/// Production ledger key: one unit on one local calendar day.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitDay {
    pub unit: UnitKey,
    pub date: NaiveDate,
}

impl UnitDay {
    pub fn new(unit: UnitKey, date: NaiveDate) -> Self {
        Self { unit, date }
    }
}

// ============================================================================
// Input records
// ============================================================================

/// A field observation: `quantity` stems seen at `stage` in bed `bed_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationEvent {
    pub id: String,
    pub observed_at: DateTime<Utc>,
    pub bed_id: Option<String>,
    /// Stage name as reported by the observer (free text).
    pub stage: Option<String>,
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub quantity: f64,
}

/// A pinch record. Resolves to a unit through `bed_id`, or directly through
/// `block_id` + `variety_id` when no bed is given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinchEvent {
    pub id: String,
    pub pinched_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub quantity: f64,
    pub bed_id: Option<String>,
    pub block_id: Option<String>,
    pub variety_id: Option<String>,
    /// Ignored by the projection: pinched stems always restart at the first stage.
    pub stage: Option<String>,
}

/// Per-unit stage durations. `None` or `0` means "use the global default".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDurationConfig {
    pub block_id: String,
    pub variety_id: String,
    #[serde(default)]
    pub durations: BTreeMap<Stage, Option<u32>>,
}

/// One production (harvest) ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionEntry {
    pub produced_at: DateTime<Utc>,
    pub block_id: String,
    pub variety_id: String,
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub quantity: f64,
}

/// Bed directory entry resolving a bed to its unit and display names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BedInfo {
    pub bed_id: String,
    pub block_id: String,
    pub variety_id: String,
    #[serde(default)]
    pub farm_name: String,
    #[serde(default)]
    pub block_name: String,
    #[serde(default)]
    pub variety_name: String,
}

/// Everything one projection run consumes, fully materialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectionInput {
    #[serde(default)]
    pub observations: Vec<ObservationEvent>,
    #[serde(default)]
    pub pinches: Vec<PinchEvent>,
    #[serde(default)]
    pub stage_configs: Vec<StageDurationConfig>,
    #[serde(default)]
    pub production: Vec<ProductionEntry>,
    #[serde(default)]
    pub beds: Vec<BedInfo>,
}

/// Coerces a quantity to a finite number, mapping anything else to zero.
pub fn sanitize_quantity(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Accepts numbers, numeric strings and null; anything else becomes `0.0`.
fn lenient_quantity<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    let value = match raw {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(sanitize_quantity(value))
}

// ============================================================================
// Output records
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Observation,
    Pinch,
}

/// Audit entry: which event put how many stems into which stage on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub kind: SourceKind,
    pub id: String,
    /// Local calendar day of the originating event.
    pub date: NaiveDate,
    pub bed: Option<String>,
    pub original_stage: Stage,
    pub current_stage: Stage,
    pub quantity: f64,
}

/// One projected day for one planting unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineRow {
    pub date: NaiveDate,
    pub is_past: bool,
    pub stage_quantities: BTreeMap<Stage, f64>,
    /// Stems at the harvest stage before subtracting production.
    pub raw_harvest: f64,
    /// Production recorded for this unit on this day.
    pub produced: f64,
    /// `max(0, raw_harvest - produced)`.
    pub harvest_available: f64,
    pub sources: Vec<SourceInfo>,
}

impl TimelineRow {
    pub fn total_in_stages(&self) -> f64 {
        self.stage_quantities.values().sum()
    }

    /// Whether any stage bucket is positive or stems are available to harvest.
    pub fn is_active(&self) -> bool {
        self.harvest_available > 0.0 || self.stage_quantities.values().any(|q| *q > 0.0)
    }
}

/// One active (date, unit) pair, carrying the unit's whole timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionRow {
    pub date: NaiveDate,
    pub evaluated_on: NaiveDate,
    pub is_past: bool,
    pub unit: UnitKey,
    pub farm_name: String,
    pub block_name: String,
    pub variety_name: String,
    pub stage_quantities: BTreeMap<Stage, f64>,
    pub raw_harvest: f64,
    pub produced: f64,
    pub harvest_available: f64,
    pub sources: Vec<SourceInfo>,
    /// Full timeline of the unit, shared by every row of that unit.
    pub timeline: Arc<[TimelineRow]>,
}

/// Counters describing one projection run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionStats {
    pub cohorts: usize,
    pub observations_dropped: usize,
    pub pinches_dropped: usize,
    pub units: usize,
    pub timeline_days: usize,
    pub rows: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectionOutput {
    pub rows: Vec<ProjectionRow>,
    pub stats: ProjectionStats,
}
