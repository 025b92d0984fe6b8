//! Order-status gate
//!
//! Before a recording may start, the external order-status collaborator is
//! asked whether the scanned barcode belongs to a posting that is currently
//! allowed to be packed. Only the most recent scan is meaningful: each new
//! lookup supersedes any in-flight one, and a superseded result is discarded
//! silently so a slow response can never act on behalf of an old scan.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::StationError;

/// Raw lookup result from the order-status collaborator.
///
/// The vendor wire protocol is out of scope; implementations adapt whatever
/// API they talk to into this shape.
#[derive(Debug, Clone)]
pub struct PostingLookup {
    pub posting_id: String,
    pub status: String,
    pub image_urls: Vec<String>,
}

/// External order-status collaborator.
#[async_trait]
pub trait OrderStatusClient: Send + Sync {
    async fn lookup(&self, barcode: &str) -> Result<PostingLookup, StationError>;
}

/// Result of one gate query. Ephemeral: superseded by any later query.
#[derive(Debug, Clone)]
pub struct GateDecision {
    /// Whether packaging (and thus recording) may proceed
    pub allowed: bool,
    pub posting_id: Option<String>,
    /// Raw status as reported by the collaborator
    pub status: Option<String>,
    /// Operator-facing label derived from the status
    pub label: String,
    /// Distinct visual/audio alert (cancelled orders must not be packed)
    pub alert: bool,
    /// Product image URLs for the display layer
    pub item_images: Vec<String>,
    /// Present when the lookup itself failed
    pub diagnostic: Option<String>,
}

/// Outcome of [`OrderGate::check`].
#[derive(Debug, Clone)]
pub enum GateOutcome {
    Decision(GateDecision),
    /// A newer scan superseded this lookup while it was in flight.
    /// The result was discarded; no state may be mutated from it.
    Superseded,
}

/// Cancellable permission check over an [`OrderStatusClient`].
///
/// Cancellation uses a monotonically increasing generation counter: every
/// new query bumps the generation before issuing its lookup, and re-checks
/// it after the suspension point. Shutdown bumps it once more so nothing in
/// flight can complete into a dying process.
pub struct OrderGate {
    client: Arc<dyn OrderStatusClient>,
    generation: AtomicU64,
}

impl OrderGate {
    pub fn new(client: Arc<dyn OrderStatusClient>) -> Self {
        Self {
            client,
            generation: AtomicU64::new(0),
        }
    }

    /// Invalidate any in-flight lookup. Returns the new generation.
    pub fn supersede(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Ask whether packaging is allowed for `barcode`.
    ///
    /// Cancels any previous in-flight lookup before issuing this one.
    pub async fn check(&self, barcode: &str) -> GateOutcome {
        let my_generation = self.supersede();

        let result = self.client.lookup(barcode).await;

        // Observed-before-mutation: a stale result is dropped here, before
        // anything downstream can act on it.
        if self.generation.load(Ordering::SeqCst) != my_generation {
            log::debug!("Gate lookup for {barcode} superseded, discarding result");
            return GateOutcome::Superseded;
        }

        match result {
            Ok(lookup) => GateOutcome::Decision(decision_for_lookup(lookup)),
            Err(e) => {
                log::warn!("Gate lookup failed for {barcode}: {e}");
                GateOutcome::Decision(GateDecision {
                    allowed: false,
                    posting_id: None,
                    status: None,
                    label: "GATE LOOKUP FAILED".to_string(),
                    alert: false,
                    item_images: Vec::new(),
                    diagnostic: Some(e.to_string()),
                })
            }
        }
    }
}

/// Map a successful lookup onto a permission decision.
pub fn decision_for_lookup(lookup: PostingLookup) -> GateDecision {
    let status = lookup.status.trim().to_string();
    let lowered = status.to_lowercase();

    let awaiting = lowered.starts_with("awaiting_") || lowered == "ожидает";

    let (allowed, label, alert) = if awaiting {
        (true, "READY TO PACK".to_string(), false)
    } else if lowered == "cancelled" {
        (false, "CANCELLED — DO NOT PACK".to_string(), true)
    } else if status.is_empty() {
        (false, "UNKNOWN".to_string(), false)
    } else {
        (false, status.replace('_', " ").to_uppercase(), false)
    };

    GateDecision {
        allowed,
        posting_id: Some(lookup.posting_id),
        status: if status.is_empty() { None } else { Some(status) },
        label,
        alert,
        item_images: lookup.image_urls,
        diagnostic: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticStatusClient;

    fn lookup_with_status(status: &str) -> PostingLookup {
        PostingLookup {
            posting_id: "12345-0001-1".to_string(),
            status: status.to_string(),
            image_urls: vec![],
        }
    }

    #[test]
    fn test_awaiting_statuses_allow_packing() {
        for status in ["awaiting_packaging", "AWAITING_DELIVER", "ожидает"] {
            let d = decision_for_lookup(lookup_with_status(status));
            assert!(d.allowed, "{status} should allow packing");
            assert_eq!(d.label, "READY TO PACK");
            assert!(!d.alert);
        }
    }

    #[test]
    fn test_cancelled_is_blocked_with_alert() {
        let d = decision_for_lookup(lookup_with_status("cancelled"));
        assert!(!d.allowed);
        assert_eq!(d.label, "CANCELLED — DO NOT PACK");
        assert!(d.alert);
    }

    #[test]
    fn test_other_status_blocked_and_prettified() {
        let d = decision_for_lookup(lookup_with_status("driver_pickup"));
        assert!(!d.allowed);
        assert_eq!(d.label, "DRIVER PICKUP");
        assert!(!d.alert);
    }

    #[test]
    fn test_empty_status_blocked() {
        let d = decision_for_lookup(lookup_with_status("  "));
        assert!(!d.allowed);
        assert_eq!(d.label, "UNKNOWN");
        assert_eq!(d.status, None);
    }

    #[tokio::test]
    async fn test_lookup_failure_blocks_with_diagnostic() {
        let gate = OrderGate::new(Arc::new(StaticStatusClient::failing("connection refused")));
        match gate.check("4607001234").await {
            GateOutcome::Decision(d) => {
                assert!(!d.allowed);
                assert!(d.diagnostic.unwrap().contains("connection refused"));
            }
            GateOutcome::Superseded => panic!("not superseded"),
        }
    }

    #[tokio::test]
    async fn test_superseded_lookup_is_discarded() {
        let client = Arc::new(StaticStatusClient::blocking(lookup_with_status(
            "awaiting_packaging",
        )));
        let gate = Arc::new(OrderGate::new(client.clone()));

        let g = gate.clone();
        let pending = tokio::spawn(async move { g.check("OLD-CODE").await });

        // Wait for the first lookup to be parked inside the client,
        // then supersede it as a newer scan would.
        client.wait_until_blocked().await;
        gate.supersede();
        client.release();

        match pending.await.unwrap() {
            GateOutcome::Superseded => {}
            GateOutcome::Decision(_) => panic!("stale lookup must be discarded"),
        }
    }
}
