//! The repair queue: broken fragments waiting to be regenerated.
//!
//! Render failures (unknown kind, missing required attribute, render panic
//! caught by the host) enqueue a [`RepairRequest`] instead of failing the
//! frame. A single consumer drains the queue in FIFO order, regenerating
//! each broken node at Minimal tier and replacing it in place. Repairs
//! deliberately bypass the cache: an error context describes a failure, not
//! a reusable interaction.

use tokio::sync::mpsc;

use burgeon_types::NodeId;

/// One broken node awaiting regeneration.
#[derive(Clone, Debug, PartialEq)]
pub struct RepairRequest {
    pub node_id: NodeId,
    /// The kind of the broken element, for the Minimal-tier capture.
    pub element_kind: String,
    /// What went wrong rendering it.
    pub error_message: String,
}

impl RepairRequest {
    pub fn new(
        node_id: impl Into<NodeId>,
        element_kind: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            element_kind: element_kind.into(),
            error_message: error_message.into(),
        }
    }
}

/// Producer side of the repair queue. Cheap to clone, safe to call from
/// render threads.
#[derive(Clone)]
pub struct RepairQueue {
    tx: mpsc::UnboundedSender<RepairRequest>,
}

impl RepairQueue {
    /// Enqueue a repair. Returns false if the consumer is gone.
    pub fn enqueue(&self, request: RepairRequest) -> bool {
        if let Err(e) = self.tx.send(request) {
            tracing::warn!(node_id = %e.0.node_id, "repair queue closed, dropping request");
            return false;
        }
        true
    }
}

/// Build the queue. The receiver goes to whichever task drains repairs;
/// there is exactly one consumer by construction.
pub fn repair_channel() -> (RepairQueue, mpsc::UnboundedReceiver<RepairRequest>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RepairQueue { tx }, rx)
}

/// What happened to one drained repair.
#[derive(Clone, Debug, PartialEq)]
pub struct RepairOutcome {
    pub node_id: NodeId,
    /// Whether the broken node was actually replaced in the tree.
    pub replaced: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_is_fifo() {
        let (queue, mut rx) = repair_channel();
        assert!(queue.enqueue(RepairRequest::new("n1", "card", "bad kind")));
        assert!(queue.enqueue(RepairRequest::new("n2", "chart", "no data")));

        assert_eq!(rx.recv().await.unwrap().node_id.as_str(), "n1");
        assert_eq!(rx.recv().await.unwrap().node_id.as_str(), "n2");
    }

    #[tokio::test]
    async fn test_enqueue_after_consumer_drop() {
        let (queue, rx) = repair_channel();
        drop(rx);
        assert!(!queue.enqueue(RepairRequest::new("n1", "card", "boom")));
    }
}
