//! Trade lifecycle records.
//!
//! Contains the trade status enum, terminal-state handling, decision and
//! fill enums, the cap-check record, and the singleton stats row.

use crate::error::CoreError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Trade lifecycle status.
///
/// `Settled`, `Cancelled` and `Error` are terminal: no event may move a
/// trade out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStatus {
    New,
    SearchingSignal,
    Signalled,
    WaitingConfirm,
    WaitingCap,
    Ready,
    OrderPlaced,
    Settled,
    Cancelled,
    Error,
}

impl TradeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled | Self::Cancelled | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::SearchingSignal => "SEARCHING_SIGNAL",
            Self::Signalled => "SIGNALLED",
            Self::WaitingConfirm => "WAITING_CONFIRM",
            Self::WaitingCap => "WAITING_CAP",
            Self::Ready => "READY",
            Self::OrderPlaced => "ORDER_PLACED",
            Self::Settled => "SETTLED",
            Self::Cancelled => "CANCELLED",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TradeStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "SEARCHING_SIGNAL" => Ok(Self::SearchingSignal),
            "SIGNALLED" => Ok(Self::Signalled),
            "WAITING_CONFIRM" => Ok(Self::WaitingConfirm),
            "WAITING_CAP" => Ok(Self::WaitingCap),
            "READY" => Ok(Self::Ready),
            "ORDER_PLACED" => Ok(Self::OrderPlaced),
            "SETTLED" => Ok(Self::Settled),
            "CANCELLED" => Ok(Self::Cancelled),
            "ERROR" => Ok(Self::Error),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// Reason a trade was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelReason {
    NoSignal,
    Expired,
    Paused,
    Late,
    LowQuality,
    CapFail,
    Skip,
    NightDisabled,
}

impl CancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoSignal => "NO_SIGNAL",
            Self::Expired => "EXPIRED",
            Self::Paused => "PAUSED",
            Self::Late => "LATE",
            Self::LowQuality => "LOW_QUALITY",
            Self::CapFail => "CAP_FAIL",
            Self::Skip => "SKIP",
            Self::NightDisabled => "NIGHT_DISABLED",
        }
    }
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CancelReason {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NO_SIGNAL" => Ok(Self::NoSignal),
            "EXPIRED" => Ok(Self::Expired),
            "PAUSED" => Ok(Self::Paused),
            "LATE" => Ok(Self::Late),
            "LOW_QUALITY" => Ok(Self::LowQuality),
            "CAP_FAIL" => Ok(Self::CapFail),
            "SKIP" => Ok(Self::Skip),
            "NIGHT_DISABLED" => Ok(Self::NightDisabled),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// User / policy decision on a READY trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    #[default]
    Pending,
    Ok,
    AutoOk,
    Skip,
    AutoSkip,
}

impl Decision {
    /// Whether the trade was actually taken (user or policy approved).
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Ok | Self::AutoOk)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Ok => "OK",
            Self::AutoOk => "AUTO_OK",
            Self::Skip => "SKIP",
            Self::AutoSkip => "AUTO_SKIP",
        }
    }
}

impl FromStr for Decision {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "OK" => Ok(Self::Ok),
            "AUTO_OK" => Ok(Self::AutoOk),
            "SKIP" => Ok(Self::Skip),
            "AUTO_SKIP" => Ok(Self::AutoSkip),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// Order fill status reported by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FillStatus {
    #[default]
    Pending,
    Filled,
    Partial,
    Rejected,
    Cancelled,
}

impl FillStatus {
    /// Whether the order counts as filled for settlement and stats.
    ///
    /// Partial fills count as filled; stake adjustment is out of scope.
    pub fn counts_as_filled(&self) -> bool {
        matches!(self, Self::Filled | Self::Partial)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Filled => "FILLED",
            Self::Partial => "PARTIAL",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for FillStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "FILLED" => Ok(Self::Filled),
            "PARTIAL" => Ok(Self::Partial),
            "REJECTED" => Ok(Self::Rejected),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// Day or night operating mode at a given wall-clock instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeMode {
    Day,
    Night,
}

impl TimeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "DAY",
            Self::Night => "NIGHT",
        }
    }
}

impl std::fmt::Display for TimeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TimeMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DAY" => Ok(Self::Day),
            "NIGHT" => Ok(Self::Night),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// Signal acceptance regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyMode {
    #[default]
    Base,
    Strict,
}

impl PolicyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "BASE",
            Self::Strict => "STRICT",
        }
    }
}

impl FromStr for PolicyMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BASE" => Ok(Self::Base),
            "STRICT" => Ok(Self::Strict),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// Night-session reset behaviour when the night win streak caps out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NightSessionMode {
    /// Night trading never attempted.
    Off,
    /// Reset night streak and policy mode only.
    #[default]
    Soft,
    /// Also reset the trade-level streak.
    Hard,
}

/// The lifecycle record for (at most) one trade per window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: i64,
    pub window_id: i64,
    pub signal_id: Option<i64>,
    pub status: TradeStatus,
    pub time_mode: Option<TimeMode>,
    pub policy_mode: PolicyMode,
    pub decision: Decision,
    pub cancel_reason: Option<CancelReason>,
    pub token_id: Option<String>,
    pub order_id: Option<String>,
    pub fill_status: FillStatus,
    pub fill_price: Option<Decimal>,
    pub stake_amount: Decimal,
    pub pnl: Option<Decimal>,
    pub is_win: Option<bool>,
    /// Trade-level win streak snapshot at order time.
    pub trade_level_streak_at_trade: u32,
    /// Night win streak snapshot at order time.
    pub night_streak_at_trade: u32,
    /// When the approval card was first emitted (Unix seconds), if any.
    pub approval_emitted_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Trade {
    /// Whether this trade moves streaks: approved and actually filled.
    pub fn taken_and_filled(&self) -> bool {
        self.decision.is_approved() && self.fill_status.counts_as_filled()
    }
}

/// Cap-check verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapCheckStatus {
    Pending,
    Pass,
    Fail,
    Late,
}

impl CapCheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Late => "LATE",
        }
    }
}

impl std::fmt::Display for CapCheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CapCheckStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PASS" => Ok(Self::Pass),
            "FAIL" => Ok(Self::Fail),
            "LATE" => Ok(Self::Late),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// One entry-price cap evaluation record per trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapCheck {
    pub id: i64,
    pub trade_id: i64,
    pub token_id: String,
    pub confirm_ts: i64,
    pub end_ts: i64,
    pub status: CapCheckStatus,
    pub consecutive_ticks: u32,
    pub first_pass_ts: Option<i64>,
    pub price_at_pass: Option<Decimal>,
}

impl CapCheck {
    /// Validate the record invariants.
    ///
    /// PASS requires a first-pass timestamp; LATE requires the confirm
    /// time to be at or past the window end.
    pub fn validate(&self) -> crate::Result<()> {
        if self.status == CapCheckStatus::Pass && self.first_pass_ts.is_none() {
            return Err(CoreError::InvalidStatus(format!(
                "cap check for trade {} is PASS without first_pass_ts",
                self.trade_id
            )));
        }
        if self.status == CapCheckStatus::Late && self.confirm_ts < self.end_ts {
            return Err(CoreError::InvalidStatus(format!(
                "cap check for trade {} is LATE with confirm_ts {} < end_ts {}",
                self.trade_id, self.confirm_ts, self.end_ts
            )));
        }
        Ok(())
    }
}

/// Global counters and policy state (singleton ledger row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub trade_level_streak: u32,
    pub night_streak: u32,
    pub policy_mode: PolicyMode,
    pub total_trades: u32,
    pub total_wins: u32,
    pub total_losses: u32,
    pub last_strict_day_threshold: Option<f64>,
    pub last_strict_night_threshold: Option<f64>,
    pub last_quantile_update_ts: Option<i64>,
    pub is_paused: bool,
    pub day_only: bool,
    pub night_only: bool,
    pub updated_at: i64,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            trade_level_streak: 0,
            night_streak: 0,
            policy_mode: PolicyMode::Base,
            total_trades: 0,
            total_wins: 0,
            total_losses: 0,
            last_strict_day_threshold: None,
            last_strict_night_threshold: None,
            last_quantile_update_ts: None,
            is_paused: false,
            day_only: false,
            night_only: false,
            updated_at: 0,
        }
    }
}

impl Stats {
    /// Check the totals invariant.
    pub fn totals_consistent(&self) -> bool {
        self.total_trades == self.total_wins + self.total_losses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(TradeStatus::Settled.is_terminal());
        assert!(TradeStatus::Cancelled.is_terminal());
        assert!(TradeStatus::Error.is_terminal());
        assert!(!TradeStatus::New.is_terminal());
        assert!(!TradeStatus::Ready.is_terminal());
        assert!(!TradeStatus::OrderPlaced.is_terminal());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            TradeStatus::New,
            TradeStatus::SearchingSignal,
            TradeStatus::Signalled,
            TradeStatus::WaitingConfirm,
            TradeStatus::WaitingCap,
            TradeStatus::Ready,
            TradeStatus::OrderPlaced,
            TradeStatus::Settled,
            TradeStatus::Cancelled,
            TradeStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<TradeStatus>().unwrap(), status);
        }
        assert!("HALF_SETTLED".parse::<TradeStatus>().is_err());
    }

    #[test]
    fn test_decision_approved() {
        assert!(Decision::Ok.is_approved());
        assert!(Decision::AutoOk.is_approved());
        assert!(!Decision::Pending.is_approved());
        assert!(!Decision::Skip.is_approved());
        assert!(!Decision::AutoSkip.is_approved());
    }

    #[test]
    fn test_fill_counts_as_filled() {
        assert!(FillStatus::Filled.counts_as_filled());
        assert!(FillStatus::Partial.counts_as_filled());
        assert!(!FillStatus::Pending.counts_as_filled());
        assert!(!FillStatus::Rejected.counts_as_filled());
        assert!(!FillStatus::Cancelled.counts_as_filled());
    }

    #[test]
    fn test_cap_check_validate() {
        let mut check = CapCheck {
            id: 1,
            trade_id: 7,
            token_id: "tok".to_string(),
            confirm_ts: 1_000_420,
            end_ts: 1_003_600,
            status: CapCheckStatus::Pass,
            consecutive_ticks: 3,
            first_pass_ts: Some(1_000_441),
            price_at_pass: None,
        };
        assert!(check.validate().is_ok());

        check.first_pass_ts = None;
        assert!(check.validate().is_err());

        check.status = CapCheckStatus::Late;
        assert!(check.validate().is_err());
        check.confirm_ts = check.end_ts;
        assert!(check.validate().is_ok());
    }

    #[test]
    fn test_stats_totals() {
        let mut stats = Stats::default();
        assert!(stats.totals_consistent());
        stats.total_trades = 3;
        stats.total_wins = 2;
        stats.total_losses = 1;
        assert!(stats.totals_consistent());
        stats.total_losses = 2;
        assert!(!stats.totals_consistent());
    }
}
