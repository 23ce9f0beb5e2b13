//! Outbound channel abstraction.

use async_trait::async_trait;

/// Transport-level result of one outbound send.
///
/// Observational only: callers log it and move on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOutcome {
    /// Remote answered 2xx.
    Delivered { status: u16, body: String },
    /// Remote answered with a non-2xx status.
    Rejected { status: u16, body: String },
    /// No HTTP response (connect error, timeout, ...).
    Failed { reason: String },
}

impl TransportOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    /// HTTP status, if a response arrived.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Delivered { status, .. } | Self::Rejected { status, .. } => Some(*status),
            Self::Failed { .. } => None,
        }
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Delivered { .. } => "delivered",
            Self::Rejected { .. } => "rejected",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Sends a text reply to a platform user.
///
/// One attempt, no queueing. Implementations never return an error; the
/// outcome describes what happened on the wire.
#[async_trait]
pub trait ReplySender: Send + Sync {
    /// Channel name (e.g. "whatsapp").
    fn name(&self) -> &str;

    async fn send_text(&self, destination: &str, text: &str) -> TransportOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_status_and_labels() {
        let ok = TransportOutcome::Delivered {
            status: 200,
            body: "{}".into(),
        };
        let rejected = TransportOutcome::Rejected {
            status: 401,
            body: "bad token".into(),
        };
        let failed = TransportOutcome::Failed {
            reason: "dns".into(),
        };

        assert!(ok.is_delivered());
        assert!(!rejected.is_delivered());
        assert_eq!(ok.status(), Some(200));
        assert_eq!(rejected.status(), Some(401));
        assert_eq!(failed.status(), None);
        assert_eq!(failed.label(), "failed");
    }
}
