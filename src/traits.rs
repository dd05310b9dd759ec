use crate::model::{BedInfo, ObservationEvent, PinchEvent, ProductionEntry, StageDurationConfig};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Record store unavailable: {0}")]
    Unavailable(String),
    #[error("Malformed records: {0}")]
    Malformed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read-only access to the record store feeding a projection.
///
/// Each collection is fetched independently; the pipeline may request them
/// concurrently.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Identifies the store in logs (e.g., "field-db", "snapshot").
    fn source_id(&self) -> &str;

    async fn observations(&self) -> Result<Vec<ObservationEvent>, SourceError>;

    async fn pinches(&self) -> Result<Vec<PinchEvent>, SourceError>;

    /// Per-unit stage duration overrides.
    async fn stage_configs(&self) -> Result<Vec<StageDurationConfig>, SourceError>;

    /// Production (harvest) ledger entries.
    async fn production(&self) -> Result<Vec<ProductionEntry>, SourceError>;

    /// Bed → unit resolution table.
    async fn beds(&self) -> Result<Vec<BedInfo>, SourceError>;
}
