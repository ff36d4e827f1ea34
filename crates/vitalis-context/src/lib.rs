pub mod metrics;
pub mod alerts;
pub mod assembler;
pub mod prompt;
pub mod templates;

pub use metrics::{classify_trend, MetricKind, MetricStats, Trend, TRACKED_METRICS};
pub use alerts::{detect_alerts, Alert};
pub use assembler::{ContextAssembler, ContextLimits, ContextProvider, UserContext, UserContextBlock};
pub use prompt::{ChatMode, PromptBuilder};
pub use templates::{DEFAULT_SYSTEM_PROMPT, FOCUS_MODE_PROMPT, NO_DATA_AVAILABLE};
