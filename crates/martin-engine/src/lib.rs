//! Trading orchestrator and dual-loop runtime.
//!
//! The engine owns the per-tick trade driver: discovery, signal
//! acceptance, confirm and cap gates, the approval/decision flow,
//! execution and settlement. All state lives in the ledger; all timing
//! flows through explicit `now` parameters so the whole engine is
//! drivable from tests.

pub mod cap;
pub mod config;
pub mod error;
pub mod locks;
pub mod orchestrator;
pub mod runtime;

pub use cap::{evaluate_cap, CapOutcome, CapParams};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use locks::TradeLocks;
pub use orchestrator::{Collaborators, CycleReport, Orchestrator};
pub use runtime::run;
