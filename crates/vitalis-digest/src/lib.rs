pub mod types;
pub mod error;
pub mod aggregate;
pub mod narrative;
pub mod generator;

pub use types::{
    Digest, DigestMode, DigestRequest, Direction, GoalProgress, MetricTrend, Narrative,
    NarrativeSource,
};
pub use error::{DigestError, Result};
pub use aggregate::{aggregate, Aggregates};
pub use narrative::{fallback_narrative, parse_narrative};
pub use generator::DigestGenerator;
