//! Row materialization: active timeline days become output rows.

use chrono::NaiveDate;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::model::{ProjectionRow, TimelineRow, UnitKey};
use crate::projection::cohort::UnitNames;
use crate::projection::stage::fold_char;

/// Emits one row per active day of `timeline`.
///
/// Every emitted row shares the same `Arc` of the complete timeline, inactive
/// days included.
pub fn materialize(
    unit: &UnitKey,
    names: &UnitNames,
    timeline: Vec<TimelineRow>,
    evaluated_on: NaiveDate,
) -> Vec<ProjectionRow> {
    let timeline: Arc<[TimelineRow]> = timeline.into();
    timeline
        .iter()
        .filter(|day| day.is_active())
        .map(|day| ProjectionRow {
            date: day.date,
            evaluated_on,
            is_past: day.is_past,
            unit: unit.clone(),
            farm_name: names.farm_name.clone(),
            block_name: names.block_name.clone(),
            variety_name: names.variety_name.clone(),
            stage_quantities: day.stage_quantities.clone(),
            raw_harvest: day.raw_harvest,
            produced: day.produced,
            harvest_available: day.harvest_available,
            sources: day.sources.clone(),
            timeline: Arc::clone(&timeline),
        })
        .collect()
}

/// Sorts by date, then farm, block and variety name.
///
/// Names compare case- and accent-insensitively first; the unit key breaks
/// any remaining tie so the order is total.
pub fn sort_rows(rows: &mut [ProjectionRow]) {
    rows.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| collate(&a.farm_name, &b.farm_name))
            .then_with(|| collate(&a.block_name, &b.block_name))
            .then_with(|| collate(&a.variety_name, &b.variety_name))
            .then_with(|| a.unit.cmp(&b.unit))
    });
}

/// Dictionary-style comparison: folded text first, raw text as tie-breaker.
pub fn collate(a: &str, b: &str) -> Ordering {
    a.chars()
        .map(fold_char)
        .cmp(b.chars().map(fold_char))
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::stage::Stage;
    use std::collections::BTreeMap;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn timeline_row(d: u32, stage_qty: Option<(Stage, f64)>, available: f64) -> TimelineRow {
        TimelineRow {
            date: day(d),
            is_past: false,
            stage_quantities: stage_qty.into_iter().collect::<BTreeMap<_, _>>(),
            raw_harvest: available,
            produced: 0.0,
            harvest_available: available,
            sources: vec![],
        }
    }

    fn names(farm: &str, block: &str, variety: &str) -> UnitNames {
        UnitNames {
            farm_name: farm.to_string(),
            block_name: block.to_string(),
            variety_name: variety.to_string(),
        }
    }

    #[test]
    fn test_only_active_days_are_emitted() {
        let timeline = vec![
            timeline_row(1, None, 0.0),
            timeline_row(2, Some((Stage::Uva, 5.0)), 0.0),
            timeline_row(3, Some((Stage::Uva, 0.0)), 0.0),
            timeline_row(4, None, 2.0),
        ];
        let rows = materialize(&UnitKey::new("B1", "V1"), &names("F", "B", "V"), timeline, day(1));
        let dates: Vec<_> = rows.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(2), day(4)]);
        assert!(rows.iter().all(|r| r.evaluated_on == day(1)));
    }

    #[test]
    fn test_rows_share_the_full_timeline() {
        let timeline = vec![
            timeline_row(1, None, 0.0),
            timeline_row(2, Some((Stage::Arroz, 1.0)), 0.0),
            timeline_row(3, Some((Stage::Arroz, 1.0)), 0.0),
        ];
        let rows = materialize(&UnitKey::new("B1", "V1"), &names("F", "B", "V"), timeline, day(1));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].timeline.len(), 3);
        assert!(Arc::ptr_eq(&rows[0].timeline, &rows[1].timeline));
    }

    #[test]
    fn test_collate_ignores_case_and_accents() {
        assert_eq!(collate("Agata", "agata"), Ordering::Less);
        assert_ne!(collate("Ágata", "agata"), Ordering::Equal);
        assert_eq!(collate("ángel", "Zafiro"), Ordering::Less);
        assert_eq!(collate("bloque 2", "Bloque 10"), Ordering::Greater);
        assert_eq!(collate("same", "same"), Ordering::Equal);
    }

    #[test]
    fn test_sort_by_date_then_names() {
        let mk = |d: u32, farm: &str, block: &str, variety: &str| {
            materialize(
                &UnitKey::new(block, variety),
                &names(farm, block, variety),
                vec![timeline_row(d, Some((Stage::Espiga, 1.0)), 0.0)],
                day(1),
            )
        };
        let mut rows: Vec<_> = [
            mk(3, "Alfa", "B1", "Rosa"),
            mk(2, "Beta", "B1", "Rosa"),
            mk(2, "alfa", "B2", "Clavel"),
            mk(2, "Alfa", "B2", "ámbar"),
            mk(2, "Alfa", "B1", "Rosa"),
        ]
        .into_iter()
        .flatten()
        .collect();
        sort_rows(&mut rows);
        let order: Vec<_> = rows
            .iter()
            .map(|r| (r.date, r.farm_name.as_str(), r.block_name.as_str(), r.variety_name.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                (day(2), "Alfa", "B1", "Rosa"),
                (day(2), "Alfa", "B2", "ámbar"),
                (day(2), "alfa", "B2", "Clavel"),
                (day(2), "Beta", "B1", "Rosa"),
                (day(3), "Alfa", "B1", "Rosa"),
            ]
        );
    }
}
