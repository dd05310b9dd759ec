//! Pure projection entry point.
//!
//! `(events, configs, production ledger, today) -> rows`, with no I/O and no
//! clock access. The same inputs and the same `today` always give the same
//! rows.

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::config::ProjectionConfig;
use crate::model::{ProjectionInput, ProjectionOutput, ProjectionRow, ProjectionStats, UnitKey};
use crate::projection::cohort::{extract_cohorts, BedDirectory, Cohort};
use crate::projection::ledger::ProductionLedger;
use crate::projection::rows::{materialize, sort_rows};
use crate::projection::stage::StageCatalog;
use crate::projection::timeline::{build_timeline, TimelineContext};

/// Rows produced for a single unit.
#[derive(Debug, Clone, Default)]
pub struct UnitProjection {
    pub rows: Vec<ProjectionRow>,
    pub timeline_days: usize,
}

/// Everything needed to project each unit independently.
///
/// Units share no mutable state, so [`ProjectionPlan::project_index`] may run
/// for different indices in parallel.
#[derive(Debug, Clone)]
pub struct ProjectionPlan {
    today: NaiveDate,
    lookback_days: u32,
    catalog: StageCatalog,
    ledger: ProductionLedger,
    directory: BedDirectory,
    units: Vec<(UnitKey, Vec<Cohort>)>,
    cohorts: usize,
    observations_dropped: usize,
    pinches_dropped: usize,
}

impl ProjectionPlan {
    pub fn new(input: &ProjectionInput, config: &ProjectionConfig, today: NaiveDate) -> Self {
        let directory = BedDirectory::new(&input.beds);
        let extraction = extract_cohorts(&input.observations, &input.pinches, &directory, config);

        if extraction.observations_dropped > 0 || extraction.pinches_dropped > 0 {
            debug!(
                observations = extraction.observations_dropped,
                pinches = extraction.pinches_dropped,
                "Dropped events without a resolvable unit or stage"
            );
        }

        let cohorts = extraction.cohorts.len();
        let observations_dropped = extraction.observations_dropped;
        let pinches_dropped = extraction.pinches_dropped;

        Self {
            today,
            lookback_days: config.lookback_days,
            catalog: StageCatalog::new(config, &input.stage_configs),
            ledger: ProductionLedger::new(&input.production, config),
            directory,
            units: extraction.by_unit().into_iter().collect(),
            cohorts,
            observations_dropped,
            pinches_dropped,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn catalog(&self) -> &StageCatalog {
        &self.catalog
    }

    /// Units with at least one cohort, in key order.
    pub fn units(&self) -> &[(UnitKey, Vec<Cohort>)] {
        &self.units
    }

    /// Projects the unit at `index`; an out-of-range index yields nothing.
    pub fn project_index(&self, index: usize) -> UnitProjection {
        match self.units.get(index) {
            Some((unit, cohorts)) => self.project_unit(unit, cohorts),
            None => UnitProjection::default(),
        }
    }

    pub fn project_unit(&self, unit: &UnitKey, cohorts: &[Cohort]) -> UnitProjection {
        let ctx = TimelineContext {
            catalog: &self.catalog,
            ledger: &self.ledger,
            today: self.today,
            lookback_days: self.lookback_days,
        };
        let timeline = build_timeline(unit, cohorts, &ctx);
        let timeline_days = timeline.len();
        let names = self.directory.names_for(unit);
        UnitProjection {
            rows: materialize(unit, &names, timeline, self.today),
            timeline_days,
        }
    }

    /// Merges per-unit results into the final sorted output.
    pub fn finish(&self, per_unit: Vec<UnitProjection>) -> ProjectionOutput {
        let timeline_days = per_unit.iter().map(|u| u.timeline_days).sum();
        let mut rows: Vec<ProjectionRow> = per_unit.into_iter().flat_map(|u| u.rows).collect();
        sort_rows(&mut rows);

        let stats = ProjectionStats {
            cohorts: self.cohorts,
            observations_dropped: self.observations_dropped,
            pinches_dropped: self.pinches_dropped,
            units: self.units.len(),
            timeline_days,
            rows: rows.len(),
        };

        info!(
            today = %self.today,
            units = stats.units,
            cohorts = stats.cohorts,
            rows = stats.rows,
            "Projection completed"
        );

        ProjectionOutput { rows, stats }
    }
}

/// Runs the whole projection on the current thread.
pub fn project(
    input: &ProjectionInput,
    config: &ProjectionConfig,
    today: NaiveDate,
) -> ProjectionOutput {
    let plan = ProjectionPlan::new(input, config, today);
    let per_unit = (0..plan.units().len()).map(|i| plan.project_index(i)).collect();
    plan.finish(per_unit)
}

// ============================================================================
// Tests
// ============================================================================
