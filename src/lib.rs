pub mod config;
pub mod executor;
pub mod model;
pub mod observability;
pub mod projection;
pub mod source;
pub mod traits;

// Re-export common types for convenience
pub use config::*;
pub use executor::*;
pub use model::*;
pub use projection::{project, PipelineError, ProjectionPipeline, ProjectionResult, Stage};
pub use source::*;
pub use traits::*;
