//! Stage catalog: the fixed phenological sequence and duration resolution.
//!
//! Stages form a closed, totally ordered cycle. Advancing past
//! [`Stage::Cosecha`] wraps back to [`Stage::Brotacion`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::config::ProjectionConfig;
use crate::model::{StageDurationConfig, UnitKey};

// ============================================================================
// Stage
// ============================================================================

/// One step in the growth sequence, from sprouting to harvest-ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Sprouting after pinch. Not reported by observers.
    Brotacion,
    PrimeraHoja,
    Espiga,
    Arroz,
    Arveja,
    Garbanzo,
    Uva,
    RayandoColor,
    SepalosAbiertos,
    /// Harvest-ready. Terminal stage of one cycle.
    Cosecha,
}

impl Stage {
    /// Every stage, in growth order.
    pub const ALL: [Stage; 10] = [
        Stage::Brotacion,
        Stage::PrimeraHoja,
        Stage::Espiga,
        Stage::Arroz,
        Stage::Arveja,
        Stage::Garbanzo,
        Stage::Uva,
        Stage::RayandoColor,
        Stage::SepalosAbiertos,
        Stage::Cosecha,
    ];

    /// Stages an observer can report directly.
    pub const OBSERVABLE: [Stage; 8] = [
        Stage::PrimeraHoja,
        Stage::Espiga,
        Stage::Arroz,
        Stage::Arveja,
        Stage::Garbanzo,
        Stage::Uva,
        Stage::RayandoColor,
        Stage::SepalosAbiertos,
    ];

    pub const FIRST: Stage = Stage::Brotacion;
    pub const HARVEST: Stage = Stage::Cosecha;

    /// Canonical snake_case name, matching the serde representation.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Brotacion => "brotacion",
            Stage::PrimeraHoja => "primera_hoja",
            Stage::Espiga => "espiga",
            Stage::Arroz => "arroz",
            Stage::Arveja => "arveja",
            Stage::Garbanzo => "garbanzo",
            Stage::Uva => "uva",
            Stage::RayandoColor => "rayando_color",
            Stage::SepalosAbiertos => "sepalos_abiertos",
            Stage::Cosecha => "cosecha",
        }
    }

    /// Built-in global duration in days.
    pub fn default_days(self) -> u32 {
        match self {
            Stage::Brotacion => 14,
            Stage::RayandoColor => 5,
            Stage::SepalosAbiertos => 3,
            Stage::Cosecha => 1,
            _ => 7,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// The following stage, wrapping from the terminal stage to the first.
    pub fn next(self) -> Stage {
        Stage::ALL[(self.index() + 1) % Stage::ALL.len()]
    }

    pub fn is_observable(self) -> bool {
        !matches!(self, Stage::Brotacion | Stage::Cosecha)
    }

    pub fn is_harvest(self) -> bool {
        self == Stage::HARVEST
    }

    /// Resolves a free-form stage name to a stage.
    ///
    /// Matching ignores case and accents, and treats spaces, hyphens and
    /// underscores alike, so `"Rayando color"` and `"sépalos-abiertos"` both
    /// resolve.
    pub fn parse(raw: &str) -> Option<Stage> {
        let wanted = normalize_name(raw);
        if wanted.is_empty() {
            return None;
        }
        Stage::ALL.into_iter().find(|s| s.name() == wanted)
    }

    /// Resolves a name only if it is one of the [`Stage::OBSERVABLE`] stages.
    pub fn parse_observable(raw: &str) -> Option<Stage> {
        Stage::parse(raw).filter(|s| s.is_observable())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lowercases `ch` and strips the accents used in Spanish names.
pub(crate) fn fold_char(ch: char) -> char {
    match ch {
        'á' | 'à' | 'ä' | 'â' | 'Á' | 'À' | 'Ä' | 'Â' => 'a',
        'é' | 'è' | 'ë' | 'ê' | 'É' | 'È' | 'Ë' | 'Ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' | 'Í' | 'Ì' | 'Ï' | 'Î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'Ó' | 'Ò' | 'Ö' | 'Ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' | 'Ú' | 'Ù' | 'Ü' | 'Û' => 'u',
        'ñ' | 'Ñ' => 'n',
        other => other.to_lowercase().next().unwrap_or(other),
    }
}

fn normalize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.trim().chars() {
        if matches!(ch, ' ' | '-' | '_') {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.push(fold_char(ch));
    }
    out
}

// ============================================================================
// Catalog
// ============================================================================

/// Longest duration any single stage may resolve to. Larger configured values
/// are clamped.
pub const MAX_STAGE_DAYS: u32 = 3650;

/// Resolved stage durations for every known planting unit.
///
/// Resolution order for one `(unit, stage)`:
/// 1. the unit's configured value, when present and non-zero
/// 2. the global default for the stage, when non-zero
/// 3. the last-resort constant
///
/// Every lookup yields between one and [`MAX_STAGE_DAYS`] days.
#[derive(Debug, Clone)]
pub struct StageCatalog {
    defaults: [u32; 10],
    per_unit: HashMap<UnitKey, [u32; 10]>,
}

impl StageCatalog {
    pub fn new(config: &ProjectionConfig, unit_configs: &[StageDurationConfig]) -> Self {
        let defaults = resolve_defaults(&config.default_durations, config.fallback_days);

        let mut per_unit = HashMap::with_capacity(unit_configs.len());
        for cfg in unit_configs {
            let key = UnitKey::new(cfg.block_id.trim(), cfg.variety_id.trim());
            // Repeated entries for a unit overlay earlier ones stage by stage.
            let resolved = per_unit.entry(key).or_insert(defaults);
            for (stage, days) in &cfg.durations {
                if let Some(days) = days.filter(|d| *d > 0) {
                    resolved[stage.index()] = days.min(MAX_STAGE_DAYS);
                }
            }
        }

        Self { defaults, per_unit }
    }

    /// Duration of `stage` for `unit`, in days. Always positive.
    pub fn duration_of(&self, unit: &UnitKey, stage: Stage) -> u32 {
        self.durations_for(unit)[stage.index()]
    }

    /// Sum of every stage duration for `unit`.
    pub fn cycle_length(&self, unit: &UnitKey) -> u32 {
        let total = self
            .durations_for(unit)
            .iter()
            .fold(0u64, |acc, d| acc.saturating_add(u64::from(*d)));
        u32::try_from(total).unwrap_or(u32::MAX)
    }

    /// Duration table for `unit`, indexed by [`Stage::index`].
    pub fn durations_for(&self, unit: &UnitKey) -> &[u32; 10] {
        self.per_unit.get(unit).unwrap_or(&self.defaults)
    }

    pub fn has_unit_config(&self, unit: &UnitKey) -> bool {
        self.per_unit.contains_key(unit)
    }
}

fn resolve_defaults(overrides: &BTreeMap<Stage, u32>, fallback_days: u32) -> [u32; 10] {
    let fallback = fallback_days.clamp(1, MAX_STAGE_DAYS);
    let mut out = [fallback; 10];
    for stage in Stage::ALL {
        let days = overrides
            .get(&stage)
            .copied()
            .unwrap_or_else(|| stage.default_days());
        if days > 0 {
            out[stage.index()] = days.min(MAX_STAGE_DAYS);
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
