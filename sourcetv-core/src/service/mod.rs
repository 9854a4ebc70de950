pub mod health;
pub mod resolution;

pub use health::{HealthReport, HealthService};
pub use resolution::{ResolutionConfig, SourceResolutionService};
