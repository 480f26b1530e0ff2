pub mod config;
pub mod error;
pub mod state_key;
pub mod traits;
pub mod types;

pub use config::{RunPolicy, RunMode, SentinelConfig, TargetSpec};
pub use error::SentinelError;
pub use state_key::StateKeyInputs;
pub use traits::{Fetcher, StateStore};
pub use types::*;
