//! # droidpilot-engine - Observation & Interaction Engine
//!
//! The engine turns the raw device bridge into reliable observations and
//! interactions:
//!
//! - [`observe`](observe::observe) - degraded-but-never-failing UI
//!   snapshots, with the perceptual-hash hierarchy cache behind them
//! - [`stability`] - touch idle, rotation settle, and frame quiescence
//!   detectors that gate every action
//! - [`InteractionLoop`] - observe-act-observe rounds with screen-change
//!   assertion
//! - [`SessionRegistry`] - exclusive per-device sessions
//! - [`execute_plan`] - replayable plans with bounded retries and resume

pub mod actions;
pub mod cache;
pub mod config;
pub mod executor;
pub mod interaction;
pub mod observe;
pub mod session;
pub mod stability;

#[cfg(test)]
pub(crate) mod testing;

pub use actions::{Action, Target};
pub use cache::{CacheOutcome, HierarchyCache};
pub use config::{CacheConfig, EngineConfig, ExecutorConfig, StabilityConfig};
pub use executor::execute_plan;
pub use interaction::{InteractionLoop, RoundResult};
pub use observe::ObserveOptions;
pub use session::{AcquireMode, DeviceSelector, SessionGuard, SessionRegistry};
pub use stability::StabilityReport;
