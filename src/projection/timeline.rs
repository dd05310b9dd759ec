//! Timeline building: one row per day for one planting unit.
//!
//! Each day places every cohort with the stage resolver and sums quantities
//! per stage. Harvest-stage quantities are reconciled against the production
//! ledger.

use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

use crate::config::MAX_LOOKBACK_DAYS;
use crate::model::{SourceInfo, TimelineRow, UnitKey};
use crate::projection::cohort::Cohort;
use crate::projection::ledger::{self, ProductionLedger};
use crate::projection::resolver::stage_on;
use crate::projection::stage::StageCatalog;

/// Read-only collaborators shared by every unit's timeline.
#[derive(Debug, Clone, Copy)]
pub struct TimelineContext<'a> {
    pub catalog: &'a StageCatalog,
    pub ledger: &'a ProductionLedger,
    pub today: NaiveDate,
    pub lookback_days: u32,
}

impl TimelineContext<'_> {
    /// Days covered for `unit`: `lookback_days` before today through
    /// `today + cycle_length`, inclusive.
    ///
    /// The look-back is capped at [`MAX_LOOKBACK_DAYS`]. Days outside the
    /// representable calendar are skipped.
    pub fn days_for(&self, unit: &UnitKey) -> impl Iterator<Item = NaiveDate> {
        let today = self.today;
        let lookback = i64::from(self.lookback_days.min(MAX_LOOKBACK_DAYS));
        let horizon = i64::from(self.catalog.cycle_length(unit));
        (-lookback..=horizon)
            .filter_map(move |offset| today.checked_add_signed(Duration::days(offset)))
    }
}

/// Builds the full timeline of `unit` from its cohorts.
pub fn build_timeline(
    unit: &UnitKey,
    cohorts: &[Cohort],
    ctx: &TimelineContext<'_>,
) -> Vec<TimelineRow> {
    ctx.days_for(unit)
        .map(|date| build_day(unit, cohorts, date, ctx))
        .collect()
}

fn build_day(
    unit: &UnitKey,
    cohorts: &[Cohort],
    date: NaiveDate,
    ctx: &TimelineContext<'_>,
) -> TimelineRow {
    let mut stage_quantities = BTreeMap::new();
    let mut raw_harvest = 0.0;
    let mut sources = Vec::new();

    for cohort in cohorts {
        let Some(stage) = stage_on(cohort, date, ctx.catalog) else {
            continue;
        };

        if stage.is_harvest() {
            raw_harvest += cohort.quantity;
        } else if stage.is_observable() {
            *stage_quantities.entry(stage).or_insert(0.0) += cohort.quantity;
        } else {
            // Sprouting stems are alive but not reported.
            continue;
        }

        sources.push(SourceInfo {
            kind: cohort.source.kind,
            id: cohort.source.id.clone(),
            date: cohort.observed_on,
            bed: cohort.source.bed.clone(),
            original_stage: cohort.source.original_stage,
            current_stage: stage,
            quantity: cohort.quantity,
        });
    }

    let produced = ctx.ledger.produced(unit, date);

    TimelineRow {
        date,
        is_past: date < ctx.today,
        stage_quantities,
        raw_harvest,
        produced,
        harvest_available: ledger::available(raw_harvest, produced),
        sources,
    }
}
