//! Projection module - cohort-based stage and harvest forecasting.
//!
//! Data flows one way through these parts:
//! - **Stage catalog**: stage order and per-unit durations via [`StageCatalog`]
//! - **Cohorts**: observation and pinch events normalized by [`extract_cohorts`]
//! - **Resolver**: a cohort's stage on any day via [`stage_on`]
//! - **Timeline**: per-day stage totals for one unit via [`build_timeline`]
//! - **Ledger**: harvest net of recorded production via [`ProductionLedger`]
//! - **Rows**: active days as output rows via [`materialize`]
//!
//! [`project`] runs all of it synchronously; [`pipeline::ProjectionPipeline`]
//! adds fetching and per-unit parallelism.

pub mod cohort;
pub mod engine;
pub mod ledger;
pub mod pipeline;
pub mod resolver;
pub mod rows;
pub mod stage;
pub mod timeline;

// Re-export commonly used types
pub use cohort::{extract_cohorts, BedDirectory, Cohort, CohortSource, Extraction, UnitNames};
pub use engine::{project, ProjectionPlan, UnitProjection};
pub use ledger::ProductionLedger;
pub use pipeline::{PipelineError, PipelineTimings, ProjectionPipeline, ProjectionResult};
pub use resolver::stage_on;
pub use rows::{materialize, sort_rows};
pub use stage::{Stage, StageCatalog, MAX_STAGE_DAYS};
pub use timeline::{build_timeline, TimelineContext};
