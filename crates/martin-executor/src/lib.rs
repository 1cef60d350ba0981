//! Paper and live order executors.
//!
//! `place` is idempotent per trade id in both modes. Paper mode fills
//! instantly at a configured price with no I/O; live mode submits one
//! HMAC-signed limit order and polls its status with a bounded timeout.
//! Settlement math lives in `settle`.

pub mod error;
pub mod executor;
pub mod settle;
pub mod signer;

pub use error::{ExecutorError, ExecutorResult};
pub use executor::{
    Executor, LiveExecutor, LiveExecutorConfig, PaperExecutor, PlacedOrder, PlacementRequest,
};
pub use settle::{settle, Settlement};
pub use signer::HmacSigner;
