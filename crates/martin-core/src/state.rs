//! The pure trade state machine.
//!
//! `transition` is the single authority on which status changes are
//! legal. Every ledger write that moves a trade's status goes through
//! it; an illegal `(status, event)` pair is rejected without mutating
//! anything.

use crate::trade::{CancelReason, TradeStatus};
use thiserror::Error;

/// Domain events that drive a trade through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeEvent {
    /// Discovery created the trade; begin signal search.
    StartSearch,
    /// The window passed its close time.
    WindowExpired,
    /// Trading was paused before the trade got moving.
    Paused,
    /// A qualifying TA signal was accepted and persisted.
    SignalAccepted,
    /// The signal's confirm time is at or past the window end.
    ConfirmLate,
    /// The signal's quality fell below the strict threshold.
    QualityBelowStrict,
    /// Wall clock reached the signal's confirm time.
    ConfirmReached,
    /// Entry-price cap check passed.
    CapPass,
    /// Entry-price cap check failed.
    CapFail,
    /// Cap check window never opened (confirm at/after end).
    CapLate,
    /// User approved the trade.
    UserApproved,
    /// User skipped the trade.
    UserSkipped,
    /// No decision arrived within the response deadline.
    DecisionTimeout,
    /// Night policy auto-approved the trade.
    AutoApproved,
    /// Night trading is disabled or capped out.
    NightDisabled,
    /// Order filled and the window resolved.
    Filled,
    /// Order rejected by the venue.
    Rejected,
}

impl TradeEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartSearch => "start_search",
            Self::WindowExpired => "window_expired",
            Self::Paused => "paused",
            Self::SignalAccepted => "signal_accepted",
            Self::ConfirmLate => "confirm_late",
            Self::QualityBelowStrict => "quality_below_strict",
            Self::ConfirmReached => "confirm_reached",
            Self::CapPass => "cap_pass",
            Self::CapFail => "cap_fail",
            Self::CapLate => "cap_late",
            Self::UserApproved => "user_approved",
            Self::UserSkipped => "user_skipped",
            Self::DecisionTimeout => "decision_timeout",
            Self::AutoApproved => "auto_approved",
            Self::NightDisabled => "night_disabled",
            Self::Filled => "filled",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for TradeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One legal step of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub next: TradeStatus,
    pub cancel_reason: Option<CancelReason>,
}

impl Step {
    fn to(next: TradeStatus) -> Self {
        Self {
            next,
            cancel_reason: None,
        }
    }

    fn cancelled(reason: CancelReason) -> Self {
        Self {
            next: TradeStatus::Cancelled,
            cancel_reason: Some(reason),
        }
    }
}

/// State machine errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("Illegal transition: {from} on {event}")]
    IllegalTransition {
        from: TradeStatus,
        event: TradeEvent,
    },

    #[error("Trade is terminal in {0}, no transitions accepted")]
    Terminal(TradeStatus),
}

/// Compute the next status for `(from, event)`.
///
/// Returns an error for any pair not in the legal-transition table.
/// Terminal states reject every event.
pub fn transition(from: TradeStatus, event: TradeEvent) -> Result<Step, StateError> {
    use TradeEvent as E;
    use TradeStatus as S;

    if from.is_terminal() {
        return Err(StateError::Terminal(from));
    }

    let step = match (from, event) {
        (S::New, E::StartSearch) => Step::to(S::SearchingSignal),
        (S::New, E::WindowExpired) => Step::cancelled(CancelReason::Expired),
        (S::New, E::Paused) => Step::cancelled(CancelReason::Paused),

        (S::SearchingSignal, E::SignalAccepted) => Step::to(S::Signalled),
        (S::SearchingSignal, E::WindowExpired) => Step::cancelled(CancelReason::NoSignal),

        (S::Signalled, E::ConfirmLate) => Step::cancelled(CancelReason::Late),
        (S::Signalled, E::QualityBelowStrict) => Step::cancelled(CancelReason::LowQuality),
        (S::Signalled, E::ConfirmReached) => Step::to(S::WaitingConfirm),

        (S::WaitingConfirm, E::ConfirmReached) => Step::to(S::WaitingCap),
        (S::WaitingConfirm, E::WindowExpired) => Step::cancelled(CancelReason::Expired),
        (S::WaitingConfirm, E::Paused) => Step::cancelled(CancelReason::Paused),

        (S::WaitingCap, E::CapPass) => Step::to(S::Ready),
        (S::WaitingCap, E::CapFail) => Step::cancelled(CancelReason::CapFail),
        (S::WaitingCap, E::CapLate) => Step::cancelled(CancelReason::Late),
        // Still pending at window close counts as a cap failure.
        (S::WaitingCap, E::WindowExpired) => Step::cancelled(CancelReason::CapFail),

        (S::Ready, E::UserApproved) => Step::to(S::OrderPlaced),
        (S::Ready, E::AutoApproved) => Step::to(S::OrderPlaced),
        (S::Ready, E::UserSkipped) => Step::cancelled(CancelReason::Skip),
        (S::Ready, E::DecisionTimeout) => Step::cancelled(CancelReason::Expired),
        (S::Ready, E::NightDisabled) => Step::cancelled(CancelReason::NightDisabled),

        (S::OrderPlaced, E::Filled) => Step::to(S::Settled),
        (S::OrderPlaced, E::Rejected) => Step::to(S::Error),

        (from, event) => return Err(StateError::IllegalTransition { from, event }),
    };

    Ok(step)
}
