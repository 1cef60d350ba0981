//! Approval notifier and user-decision plumbing.
//!
//! The orchestrator emits approval cards through a `Notifier` and
//! receives decisions back over an mpsc channel. `LogNotifier` only
//! logs (paper mode, tests); `WebhookNotifier` POSTs JSON cards to a
//! configured URL, where the chat-side integration picks them up.

use async_trait::async_trait;
use martin_core::{Direction, TimeMode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

/// Notifier error types.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Webhook delivery failed: {0}")]
    Webhook(String),
}

/// Result type alias for notifier operations.
pub type NotifyResult<T> = std::result::Result<T, NotifyError>;

/// An approval request for a READY trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalCard {
    pub trade_id: i64,
    pub asset: String,
    pub slug: String,
    pub direction: Direction,
    pub quality: f64,
    pub entry_price: Decimal,
    pub stake: Decimal,
    pub time_mode: TimeMode,
    /// Seconds the user has before the trade auto-skips.
    pub response_window_secs: i64,
}

/// A user's verdict on an approval card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Ok,
    Skip,
}

/// One decision delivered back from the user channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDecision {
    pub trade_id: i64,
    pub verdict: Verdict,
    pub user_id: String,
}

/// Sender half handed to the chat-side integration.
pub type DecisionSender = mpsc::Sender<UserDecision>;
/// Receiver half consumed by the orchestrator.
pub type DecisionReceiver = mpsc::Receiver<UserDecision>;

/// Create the decision channel.
pub fn decision_channel(capacity: usize) -> (DecisionSender, DecisionReceiver) {
    mpsc::channel(capacity)
}

/// Outbound notification surface.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver an approval card for a READY trade.
    async fn emit_approval(&self, card: &ApprovalCard) -> NotifyResult<()>;

    /// Deliver a free-form status line (settlements, cancellations).
    async fn emit_status(&self, text: &str) -> NotifyResult<()>;
}

/// Notifier that only writes to the log. Used by paper mode and tests.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn emit_approval(&self, card: &ApprovalCard) -> NotifyResult<()> {
        info!(
            trade_id = card.trade_id,
            asset = %card.asset,
            direction = %card.direction,
            quality = card.quality,
            entry_price = %card.entry_price,
            response_window_secs = card.response_window_secs,
            "Approval requested"
        );
        Ok(())
    }

    async fn emit_status(&self, text: &str) -> NotifyResult<()> {
        info!(status = text, "Status update");
        Ok(())
    }
}

/// Notifier that POSTs JSON payloads to a webhook URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> NotifyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::Webhook(format!("client build failed: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn post(&self, payload: &serde_json::Value) -> NotifyResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| NotifyError::Webhook(e.to_string()))?;
        if !response.status().is_success() {
            return Err(NotifyError::Webhook(format!(
                "webhook returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn emit_approval(&self, card: &ApprovalCard) -> NotifyResult<()> {
        self.post(&serde_json::json!({ "type": "approval", "card": card }))
            .await
    }

    async fn emit_status(&self, text: &str) -> NotifyResult<()> {
        self.post(&serde_json::json!({ "type": "status", "text": text }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn card() -> ApprovalCard {
        ApprovalCard {
            trade_id: 7,
            asset: "BTC".to_string(),
            slug: "btc-up-or-down-1000000".to_string(),
            direction: Direction::Up,
            quality: 50.0,
            entry_price: dec!(0.55),
            stake: dec!(10),
            time_mode: TimeMode::Day,
            response_window_secs: 300,
        }
    }

    #[tokio::test]
    async fn test_log_notifier_accepts_everything() {
        let notifier = LogNotifier;
        notifier.emit_approval(&card()).await.unwrap();
        notifier.emit_status("settled trade 7").await.unwrap();
    }

    #[tokio::test]
    async fn test_decision_channel_round_trip() {
        let (tx, mut rx) = decision_channel(8);
        tx.send(UserDecision {
            trade_id: 7,
            verdict: Verdict::Ok,
            user_id: "user-1".to_string(),
        })
        .await
        .unwrap();

        let decision = rx.recv().await.unwrap();
        assert_eq!(decision.trade_id, 7);
        assert_eq!(decision.verdict, Verdict::Ok);
    }

    #[test]
    fn test_card_serializes() {
        let json = serde_json::to_value(card()).unwrap();
        assert_eq!(json["trade_id"], 7);
        assert_eq!(json["direction"], "UP");
    }
}
