//! In-memory record source.

use async_trait::async_trait;

use crate::model::{
    BedInfo, ObservationEvent, PinchEvent, ProductionEntry, ProjectionInput, StageDurationConfig,
};
use crate::traits::{RecordSource, SourceError};

/// A [`RecordSource`] over collections already held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    id: String,
    input: ProjectionInput,
}

impl InMemorySource {
    pub fn new(input: ProjectionInput) -> Self {
        Self {
            id: "memory".to_string(),
            input,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Loads a JSON snapshot shaped like [`ProjectionInput`].
    pub fn from_json_str(raw: &str) -> Result<Self, SourceError> {
        let input: ProjectionInput =
            serde_json::from_str(raw).map_err(|e| SourceError::Malformed(e.to_string()))?;
        Ok(Self::new(input))
    }
}

impl From<ProjectionInput> for InMemorySource {
    fn from(input: ProjectionInput) -> Self {
        Self::new(input)
    }
}

#[async_trait]
impl RecordSource for InMemorySource {
    fn source_id(&self) -> &str {
        &self.id
    }

    async fn observations(&self) -> Result<Vec<ObservationEvent>, SourceError> {
        Ok(self.input.observations.clone())
    }

    async fn pinches(&self) -> Result<Vec<PinchEvent>, SourceError> {
        Ok(self.input.pinches.clone())
    }

    async fn stage_configs(&self) -> Result<Vec<StageDurationConfig>, SourceError> {
        Ok(self.input.stage_configs.clone())
    }

    async fn production(&self) -> Result<Vec<ProductionEntry>, SourceError> {
        Ok(self.input.production.clone())
    }

    async fn beds(&self) -> Result<Vec<BedInfo>, SourceError> {
        Ok(self.input.beds.clone())
    }
}
