//! Stage resolution: where in its growth cycle a cohort sits on a given day.
//!
//! The position is reconstructed from the days elapsed since the cohort's
//! event and the unit's stage durations. No intermediate state is stored.

use chrono::NaiveDate;

use crate::projection::cohort::Cohort;
use crate::projection::stage::{Stage, StageCatalog};

/// Stage occupied by `cohort` on `target`, or `None` before the cohort's event.
pub fn stage_on(cohort: &Cohort, target: NaiveDate, catalog: &StageCatalog) -> Option<Stage> {
    let elapsed = (target - cohort.observed_on).num_days();
    if elapsed < 0 {
        return None;
    }
    Some(walk(
        cohort.start_stage,
        elapsed.unsigned_abs(),
        catalog.durations_for(&cohort.unit),
    ))
}

/// Walks forward from `start`, consuming `elapsed` days, wrapping after the
/// harvest stage.
///
/// Every duration must be at least one day.
pub fn walk(start: Stage, elapsed: u64, durations: &[u32; 10]) -> Stage {
    let cycle: u64 = durations.iter().map(|d| u64::from(*d)).sum();
    // A full lap returns to `start`, so whole laps can be skipped.
    let mut remaining = if cycle > 0 { elapsed % cycle } else { 0 };
    let mut stage = start;
    loop {
        let days = u64::from(durations[stage.index()]).max(1);
        if remaining < days {
            return stage;
        }
        remaining -= days;
        stage = stage.next();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectionConfig;
    use crate::model::{SourceKind, StageDurationConfig, UnitKey};
    use crate::projection::cohort::CohortSource;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn cohort(start: Stage, observed_on: NaiveDate) -> Cohort {
        Cohort {
            unit: UnitKey::new("B1", "V1"),
            observed_on,
            start_stage: start,
            quantity: 10.0,
            source: CohortSource {
                kind: SourceKind::Observation,
                id: "o1".to_string(),
                original_stage: start,
                bed: None,
            },
        }
    }

    fn catalog() -> StageCatalog {
        StageCatalog::new(
            &ProjectionConfig::default(),
            &[StageDurationConfig {
                block_id: "B1".to_string(),
                variety_id: "V1".to_string(),
                durations: [
                    (Stage::Brotacion, Some(14)),
                    (Stage::Arroz, Some(7)),
                    (Stage::Cosecha, Some(1)),
                ]
                .into_iter()
                .collect(),
            }],
        )
    }

    /// Reference walk without lap skipping.
    fn naive_walk(start: Stage, mut elapsed: u64, durations: &[u32; 10]) -> Stage {
        let mut stage = start;
        while elapsed >= u64::from(durations[stage.index()]) {
            elapsed -= u64::from(durations[stage.index()]);
            stage = stage.next();
        }
        stage
    }

    #[test]
    fn test_before_event_is_absent() {
        let c = cohort(Stage::Arroz, day(2024, 5, 10));
        assert_eq!(stage_on(&c, day(2024, 5, 9), &catalog()), None);
    }

    #[test]
    fn test_on_event_day_is_start_stage() {
        let c = cohort(Stage::Uva, day(2024, 5, 10));
        assert_eq!(stage_on(&c, day(2024, 5, 10), &catalog()), Some(Stage::Uva));
    }

    #[test]
    fn test_arroz_observed_five_days_ago() {
        let today = day(2024, 5, 10);
        let c = cohort(Stage::Arroz, day(2024, 5, 5));
        assert_eq!(stage_on(&c, today, &catalog()), Some(Stage::Arroz));
        // 8 days elapsed: arroz (7) is spent, one day into the next stage.
        assert_eq!(stage_on(&c, day(2024, 5, 13), &catalog()), Some(Stage::Arveja));
    }

    #[test]
    fn test_pinch_today_is_brotacion() {
        let today = day(2024, 5, 10);
        let c = cohort(Stage::Brotacion, today);
        assert_eq!(stage_on(&c, today, &catalog()), Some(Stage::Brotacion));
        assert_eq!(stage_on(&c, day(2024, 5, 23), &catalog()), Some(Stage::Brotacion));
        assert_eq!(stage_on(&c, day(2024, 5, 24), &catalog()), Some(Stage::PrimeraHoja));
    }

    #[test]
    fn test_reaches_harvest_on_last_day_of_cycle() {
        let cat = catalog();
        let unit = UnitKey::new("B1", "V1");
        let cycle = i64::from(cat.cycle_length(&unit));
        let start = day(2024, 1, 1);
        let c = cohort(Stage::Brotacion, start);
        let last = start + chrono::Duration::days(cycle - 1);
        assert_eq!(stage_on(&c, last, &cat), Some(Stage::Cosecha));
    }

    #[test]
    fn test_wraps_to_first_stage_after_harvest() {
        let cat = catalog();
        let unit = UnitKey::new("B1", "V1");
        let cycle = i64::from(cat.cycle_length(&unit));
        let start = day(2024, 1, 1);
        let c = cohort(Stage::Brotacion, start);
        let next_lap = start + chrono::Duration::days(cycle);
        assert_eq!(stage_on(&c, next_lap, &cat), Some(Stage::Brotacion));
    }

    #[test]
    fn test_lap_skip_matches_naive_walk() {
        let durations = [3, 1, 2, 5, 1, 1, 4, 2, 1, 1];
        for start in Stage::ALL {
            for elapsed in 0..200 {
                assert_eq!(
                    walk(start, elapsed, &durations),
                    naive_walk(start, elapsed, &durations),
                    "start={start} elapsed={elapsed}"
                );
            }
        }
    }

    #[test]
    fn test_resolution_is_total_after_event() {
        let cat = catalog();
        let start = day(2024, 1, 1);
        for stage in Stage::ALL {
            let c = cohort(stage, start);
            for offset in 0..400 {
                let target = start + chrono::Duration::days(offset);
                assert!(stage_on(&c, target, &cat).is_some());
            }
        }
    }
}
