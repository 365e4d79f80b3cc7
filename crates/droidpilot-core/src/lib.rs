//! # droidpilot-core - Core Domain Types
//!
//! Foundation crate for droidpilot. Provides the observation data model,
//! UI element tree, plan/result records, frame metric types, error handling,
//! and logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on
//! external crates (serde, chrono, thiserror, tracing).
//!
//! ## Public API
//!
//! ### Observations (`observation`, `element`)
//! - [`Observation`] - a point-in-time snapshot of device UI state
//! - [`UiElement`] / [`Bounds`] - the observed view hierarchy
//! - [`Rotation`], [`ScreenSize`], [`Insets`], [`ActiveWindow`]
//!
//! ### Plans (`plan`)
//! - [`Plan`] / [`Step`] - a named, replayable sequence of device actions
//! - [`ActionResult`] / [`PlanResult`] - per-step and per-run outcomes
//!
//! ### Frame Metrics (`gfx`)
//! - [`GfxStats`], [`GfxCounters`], [`GfxPercentiles`] - parsed
//!   `dumpsys gfxinfo` snapshots and the delta helpers the UI stability
//!   detector is built on
//!
//! ### Error Handling (`error`)
//! - [`Error`] - error enum with `fatal` vs `retryable` classification
//! - [`Result`] - type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - extension trait for adding error context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use droidpilot_core::prelude::*;
//! ```

pub mod element;
pub mod error;
pub mod gfx;
pub mod logging;
pub mod observation;
pub mod plan;

/// Prelude for common imports used throughout all droidpilot crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

// Re-export commonly used types at crate root for convenience
pub use element::{Bounds, RangeInfo, UiElement};
pub use error::{Error, Result, ResultExt};
pub use gfx::{
    GfxCounters, GfxPercentiles, GfxStats, P50_P90_CEILING_MS, P95_CEILING_MS,
};
pub use observation::{ActiveWindow, Insets, Observation, Rotation, ScreenSize};
pub use plan::{ActionResult, Plan, PlanResult, PlanStatus, Step};
