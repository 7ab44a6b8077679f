pub mod config;
pub mod error;
pub mod invoker;
pub mod models;
pub mod payload;
pub mod report;
pub mod scenarios;

pub use config::{load_config, Overrides, ProbeConfig};
pub use error::{ProbeError, Result};
pub use invoker::{Invoker, ResponseRecord};
pub use models::{ApiResponse, DeviceInfo, EventKind, EventPayload};
pub use payload::PayloadBuilder;
pub use report::{SuiteOutcome, SuiteReport, Tally};
pub use scenarios::{Probe, SendOptions, Suite};
