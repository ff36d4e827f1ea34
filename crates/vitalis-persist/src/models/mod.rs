mod metric;
mod protocol;
mod check_in;
mod insight;
mod goal;
mod digest;

pub use metric::MetricReading;
pub use protocol::{Assessment, Device, Protocol};
pub use check_in::CheckIn;
pub use insight::{Forecast, Insight};
pub use goal::Goal;
pub use digest::DigestRecord;
