//! Cohort extraction: raw observation and pinch events become normalized
//! cohorts tied to a planting unit.
//!
//! Events that cannot be tied to a unit are dropped one by one; extraction
//! itself never fails.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::config::ProjectionConfig;
use crate::model::{
    sanitize_quantity, BedInfo, ObservationEvent, PinchEvent, SourceKind, UnitKey,
};
use crate::projection::stage::Stage;

// ============================================================================
// Bed directory
// ============================================================================

/// Display names of a planting unit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnitNames {
    pub farm_name: String,
    pub block_name: String,
    pub variety_name: String,
}

/// Bed → unit resolution table, plus display names per unit.
#[derive(Debug, Clone, Default)]
pub struct BedDirectory {
    beds: HashMap<String, UnitKey>,
    names: BTreeMap<UnitKey, UnitNames>,
}

impl BedDirectory {
    pub fn new(beds: &[BedInfo]) -> Self {
        let mut directory = Self::default();
        for bed in beds {
            let Some(unit) =
                UnitKey::from_parts(Some(bed.block_id.as_str()), Some(bed.variety_id.as_str()))
            else {
                debug!(bed = %bed.bed_id, "Bed without block or variety ignored");
                continue;
            };
            // First bed seen for a unit supplies its names.
            directory
                .names
                .entry(unit.clone())
                .or_insert_with(|| UnitNames {
                    farm_name: bed.farm_name.clone(),
                    block_name: bed.block_name.clone(),
                    variety_name: bed.variety_name.clone(),
                });
            directory.beds.insert(bed.bed_id.trim().to_string(), unit);
        }
        directory
    }

    pub fn resolve(&self, bed_id: &str) -> Option<&UnitKey> {
        self.beds.get(bed_id.trim())
    }

    /// Names for `unit`, falling back to its ids when no bed describes it.
    pub fn names_for(&self, unit: &UnitKey) -> UnitNames {
        self.names.get(unit).cloned().unwrap_or_else(|| UnitNames {
            farm_name: String::new(),
            block_name: unit.block_id.clone(),
            variety_name: unit.variety_id.clone(),
        })
    }
}

// ============================================================================
// Cohorts
// ============================================================================

/// Back-reference from a cohort to the event that created it.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortSource {
    pub kind: SourceKind,
    pub id: String,
    pub original_stage: Stage,
    pub bed: Option<String>,
}

/// A batch of stems tracked through the stage sequence from one event.
#[derive(Debug, Clone, PartialEq)]
pub struct Cohort {
    pub unit: UnitKey,
    /// Local calendar day of the originating event.
    pub observed_on: NaiveDate,
    pub start_stage: Stage,
    pub quantity: f64,
    pub source: CohortSource,
}

/// Result of one extraction pass.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub cohorts: Vec<Cohort>,
    pub observations_dropped: usize,
    pub pinches_dropped: usize,
}

impl Extraction {
    /// Cohorts grouped by unit, in unit order and original event order within a unit.
    pub fn by_unit(self) -> BTreeMap<UnitKey, Vec<Cohort>> {
        let mut grouped: BTreeMap<UnitKey, Vec<Cohort>> = BTreeMap::new();
        for cohort in self.cohorts {
            grouped.entry(cohort.unit.clone()).or_default().push(cohort);
        }
        grouped
    }
}

/// Converts every resolvable event into a cohort.
pub fn extract_cohorts(
    observations: &[ObservationEvent],
    pinches: &[PinchEvent],
    directory: &BedDirectory,
    config: &ProjectionConfig,
) -> Extraction {
    let mut out = Extraction {
        cohorts: Vec::with_capacity(observations.len() + pinches.len()),
        ..Extraction::default()
    };

    for event in observations {
        match observation_cohort(event, directory, config) {
            Some(cohort) => out.cohorts.push(cohort),
            None => out.observations_dropped += 1,
        }
    }

    for event in pinches {
        match pinch_cohort(event, directory, config) {
            Some(cohort) => out.cohorts.push(cohort),
            None => out.pinches_dropped += 1,
        }
    }

    out
}

fn observation_cohort(
    event: &ObservationEvent,
    directory: &BedDirectory,
    config: &ProjectionConfig,
) -> Option<Cohort> {
    let Some(unit) = event.bed_id.as_deref().and_then(|b| directory.resolve(b)) else {
        debug!(id = %event.id, bed = ?event.bed_id, "Observation dropped: unknown bed");
        return None;
    };
    let Some(stage) = event.stage.as_deref().and_then(Stage::parse_observable) else {
        debug!(id = %event.id, stage = ?event.stage, "Observation dropped: stage not observable");
        return None;
    };

    Some(Cohort {
        unit: unit.clone(),
        observed_on: config.local_date(event.observed_at),
        start_stage: stage,
        quantity: sanitize_quantity(event.quantity),
        source: CohortSource {
            kind: SourceKind::Observation,
            id: event.id.clone(),
            original_stage: stage,
            bed: event.bed_id.clone(),
        },
    })
}

fn pinch_cohort(
    event: &PinchEvent,
    directory: &BedDirectory,
    config: &ProjectionConfig,
) -> Option<Cohort> {
    let unit = event
        .bed_id
        .as_deref()
        .and_then(|b| directory.resolve(b))
        .cloned()
        .or_else(|| UnitKey::from_parts(event.block_id.as_deref(), event.variety_id.as_deref()));

    let Some(unit) = unit else {
        debug!(id = %event.id, bed = ?event.bed_id, "Pinch dropped: no unit reference");
        return None;
    };

    Some(Cohort {
        unit,
        observed_on: config.local_date(event.pinched_at),
        start_stage: Stage::FIRST,
        quantity: sanitize_quantity(event.quantity),
        source: CohortSource {
            kind: SourceKind::Pinch,
            id: event.id.clone(),
            original_stage: Stage::FIRST,
            bed: event.bed_id.clone(),
        },
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bed(id: &str, block: &str, variety: &str) -> BedInfo {
        BedInfo {
            bed_id: id.to_string(),
            block_id: block.to_string(),
            variety_id: variety.to_string(),
            farm_name: "Finca Norte".to_string(),
            block_name: format!("Bloque {block}"),
            variety_name: format!("Variedad {variety}"),
        }
    }

    fn observation(id: &str, bed: Option<&str>, stage: Option<&str>, qty: f64) -> ObservationEvent {
        ObservationEvent {
            id: id.to_string(),
            observed_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
            bed_id: bed.map(str::to_string),
            stage: stage.map(str::to_string),
            quantity: qty,
        }
    }

    fn pinch(
        id: &str,
        bed: Option<&str>,
        block: Option<&str>,
        variety: Option<&str>,
    ) -> PinchEvent {
        PinchEvent {
            id: id.to_string(),
            pinched_at: Utc.with_ymd_and_hms(2024, 4, 20, 7, 0, 0).unwrap(),
            quantity: 20.0,
            bed_id: bed.map(str::to_string),
            block_id: block.map(str::to_string),
            variety_id: variety.map(str::to_string),
            stage: Some("uva".to_string()),
        }
    }

    fn directory() -> BedDirectory {
        BedDirectory::new(&[bed("c1", "B1", "V1"), bed("c2", "B1", "V1"), bed("c3", "B2", "V9")])
    }

    #[test]
    fn test_observation_becomes_cohort_at_observed_stage() {
        let ex = extract_cohorts(
            &[observation("o1", Some("c1"), Some("Arroz"), 10.0)],
            &[],
            &directory(),
            &ProjectionConfig::default(),
        );
        assert_eq!(ex.cohorts.len(), 1);
        let cohort = &ex.cohorts[0];
        assert_eq!(cohort.unit, UnitKey::new("B1", "V1"));
        assert_eq!(cohort.start_stage, Stage::Arroz);
        assert_eq!(cohort.observed_on, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(cohort.source.kind, SourceKind::Observation);
        assert_eq!(cohort.source.bed.as_deref(), Some("c1"));
    }

    #[test]
    fn test_observation_dropped_for_unknown_bed_or_stage() {
        let ex = extract_cohorts(
            &[
                observation("o1", Some("missing"), Some("arroz"), 1.0),
                observation("o2", None, Some("arroz"), 1.0),
                observation("o3", Some("c1"), Some("cosecha"), 1.0),
                observation("o4", Some("c1"), Some("brotacion"), 1.0),
                observation("o5", Some("c1"), Some("girasol"), 1.0),
                observation("o6", Some("c1"), None, 1.0),
            ],
            &[],
            &directory(),
            &ProjectionConfig::default(),
        );
        assert!(ex.cohorts.is_empty());
        assert_eq!(ex.observations_dropped, 6);
    }

    #[test]
    fn test_pinch_always_starts_at_first_stage() {
        let ex = extract_cohorts(
            &[],
            &[pinch("p1", Some("c3"), None, None)],
            &directory(),
            &ProjectionConfig::default(),
        );
        assert_eq!(ex.cohorts[0].start_stage, Stage::Brotacion);
        assert_eq!(ex.cohorts[0].source.original_stage, Stage::Brotacion);
        assert_eq!(ex.cohorts[0].unit, UnitKey::new("B2", "V9"));
    }

    #[test]
    fn test_pinch_resolves_via_direct_unit_reference() {
        let ex = extract_cohorts(
            &[],
            &[
                pinch("p1", None, Some("B7"), Some("V7")),
                pinch("p2", Some("unknown"), Some("B8"), Some("V8")),
                pinch("p3", None, Some("B9"), None),
            ],
            &directory(),
            &ProjectionConfig::default(),
        );
        let units: Vec<_> = ex.cohorts.iter().map(|c| c.unit.clone()).collect();
        assert_eq!(units, vec![UnitKey::new("B7", "V7"), UnitKey::new("B8", "V8")]);
        assert_eq!(ex.pinches_dropped, 1);
    }

    #[test]
    fn test_non_positive_quantities_are_kept() {
        let ex = extract_cohorts(
            &[
                observation("o1", Some("c1"), Some("uva"), 0.0),
                observation("o2", Some("c1"), Some("uva"), f64::NAN),
            ],
            &[],
            &directory(),
            &ProjectionConfig::default(),
        );
        assert_eq!(ex.cohorts.len(), 2);
        assert!(ex.cohorts.iter().all(|c| c.quantity == 0.0));
    }

    #[test]
    fn test_by_unit_groups_in_key_order() {
        let ex = extract_cohorts(
            &[
                observation("o1", Some("c3"), Some("uva"), 1.0),
                observation("o2", Some("c1"), Some("uva"), 1.0),
                observation("o3", Some("c2"), Some("arroz"), 1.0),
            ],
            &[],
            &directory(),
            &ProjectionConfig::default(),
        );
        let grouped = ex.by_unit();
        let keys: Vec<_> = grouped.keys().cloned().collect();
        assert_eq!(keys, vec![UnitKey::new("B1", "V1"), UnitKey::new("B2", "V9")]);
        let ids: Vec<_> = grouped[&UnitKey::new("B1", "V1")]
            .iter()
            .map(|c| c.source.id.as_str())
            .collect();
        assert_eq!(ids, vec!["o2", "o3"]);
    }

    #[test]
    fn test_names_fall_back_to_ids() {
        let dir = directory();
        let known = dir.names_for(&UnitKey::new("B1", "V1"));
        assert_eq!(known.farm_name, "Finca Norte");
        assert_eq!(known.block_name, "Bloque B1");
        let unknown = dir.names_for(&UnitKey::new("B7", "V7"));
        assert_eq!(unknown.farm_name, "");
        assert_eq!(unknown.block_name, "B7");
        assert_eq!(unknown.variety_name, "V7");
    }
}
