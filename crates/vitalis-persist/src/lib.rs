pub mod models;
pub mod store;
pub mod rest;
pub mod memory;
pub mod identity;
pub mod error;
pub mod builder;

pub use models::{
    Assessment, CheckIn, Device, DigestRecord, Forecast, Goal, Insight, MetricReading, Protocol,
};
pub use store::{tables, WellnessStore};
pub use rest::RestStore;
pub use memory::MemoryStore;
pub use identity::{IdentityResolver, RestIdentityResolver};
pub use error::{PersistError, Result};
pub use builder::BackendConfig;
