//! Core domain types for the MARTIN trading assistant.
//!
//! This crate provides the fundamental types used throughout the system:
//! - `Asset`, `Direction`, `MarketWindow`: hourly up/down market identities
//! - `Candle`, `PriceTick`: market data primitives
//! - `Trade`, `TradeStatus`, `CapCheck`, `Stats`: lifecycle records
//! - the pure trade state machine (`transition`)
//! - day/night time-mode classification

pub mod error;
pub mod state;
pub mod time_mode;
pub mod trade;
pub mod types;

pub use error::{CoreError, Result};
pub use state::{transition, StateError, Step, TradeEvent};
pub use time_mode::{time_mode_at, DayWindow};
pub use trade::{
    CancelReason, CapCheck, CapCheckStatus, Decision, FillStatus, NightSessionMode, PolicyMode,
    Stats, TimeMode, Trade, TradeStatus,
};
pub use types::{
    Asset, Candle, CandleInterval, Direction, MarketWindow, PriceTick, TaSignal, WindowId,
};
