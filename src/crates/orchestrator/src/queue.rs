//! Priority-ordered, bounded-concurrency scheduler.
//!
//! Work items are admitted to the engine in priority order
//! (`Critical > High > Medium > Low`); ties drain oldest-first, though
//! callers must not rely on intra-priority ordering. A semaphore bounds
//! concurrent `process` calls at the configured worker budget.

use crate::engine::OrchestrationEngine;
use crate::request::Priority;
use domain::MetricsSink;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueuedItem {
    priority: Priority,
    /// Admission sequence; lower = enqueued earlier.
    seq: u64,
    request_id: Uuid,
}

impl Ord for QueuedItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority first, then earlier admission.
        self.priority
            .cmp(&other.priority)
            .then(other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct QueueState {
    heap: Mutex<BinaryHeap<QueuedItem>>,
    notify: Notify,
    seq: AtomicU64,
}

/// Bounded-concurrency executor feeding the orchestration engine.
pub struct PriorityQueue {
    state: Arc<QueueState>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl PriorityQueue {
    /// Create the queue and start its dispatcher.
    pub fn start(
        engine: Arc<OrchestrationEngine>,
        concurrency: usize,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let state = Arc::new(QueueState {
            heap: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            seq: AtomicU64::new(0),
        });
        let dispatcher = tokio::spawn(dispatch_loop(
            Arc::clone(&state),
            engine,
            concurrency.max(1),
            metrics,
        ));
        info!(concurrency, "priority queue started");
        Self {
            state,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Admit a request id; returns immediately. Completion is observed
    /// out-of-band via `get_response`.
    pub fn enqueue(&self, request_id: Uuid, priority: Priority) -> Uuid {
        let seq = self.state.seq.fetch_add(1, AtomicOrdering::Relaxed);
        self.state.heap.lock().push(QueuedItem {
            priority,
            seq,
            request_id,
        });
        debug!(request_id = %request_id, priority = %priority, "request enqueued");
        self.state.notify.notify_one();
        request_id
    }

    /// Items waiting for admission (excludes in-flight work).
    pub fn pending_len(&self) -> usize {
        self.state.heap.lock().len()
    }

    /// Stop admitting work. In-flight processing runs to completion.
    pub fn shutdown(&self) {
        if let Some(handle) = self.dispatcher.lock().take() {
            handle.abort();
            info!("priority queue dispatcher stopped");
        }
    }
}

impl Drop for PriorityQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn dispatch_loop(
    state: Arc<QueueState>,
    engine: Arc<OrchestrationEngine>,
    concurrency: usize,
    metrics: Arc<dyn MetricsSink>,
) {
    let semaphore = Arc::new(Semaphore::new(concurrency));
    loop {
        // Hold a permit before popping so the highest-priority item at
        // dispatch time wins the next free worker slot.
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        let item = loop {
            let popped = state.heap.lock().pop();
            match popped {
                Some(item) => break item,
                None => state.notify.notified().await,
            }
        };

        let engine = Arc::clone(&engine);
        let metrics = Arc::clone(&metrics);
        tokio::spawn(async move {
            let _permit = permit;

            // Requests cancelled while queued are skipped, not errors.
            match engine.is_pending(item.request_id).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(request_id = %item.request_id, "skipping non-pending request");
                    metrics.incr_counter("queue_skipped", &[]);
                    return;
                }
                Err(err) => {
                    warn!(request_id = %item.request_id, error = %err, "dropping unknown request");
                    return;
                }
            }

            metrics.incr_counter("queue_dispatched", &[("priority", priority_label(item.priority))]);
            if let Err(err) = engine.process(item.request_id).await {
                // The failure is already recorded on the persisted
                // response; the queue only reports it.
                error!(
                    request_id = %item.request_id,
                    error = %err,
                    "queued request failed"
                );
            }
        });
    }
}

fn priority_label(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "low",
        Priority::Medium => "medium",
        Priority::High => "high",
        Priority::Critical => "critical",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_item_ordering() {
        let mut heap = BinaryHeap::new();
        heap.push(QueuedItem {
            priority: Priority::Low,
            seq: 0,
            request_id: Uuid::new_v4(),
        });
        let critical = Uuid::new_v4();
        heap.push(QueuedItem {
            priority: Priority::Critical,
            seq: 1,
            request_id: critical,
        });
        let medium = Uuid::new_v4();
        heap.push(QueuedItem {
            priority: Priority::Medium,
            seq: 2,
            request_id: medium,
        });

        assert_eq!(heap.pop().unwrap().request_id, critical);
        assert_eq!(heap.pop().unwrap().request_id, medium);
        assert_eq!(heap.pop().unwrap().priority, Priority::Low);
    }

    #[test]
    fn test_same_priority_drains_oldest_first() {
        let mut heap = BinaryHeap::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        heap.push(QueuedItem {
            priority: Priority::High,
            seq: 0,
            request_id: first,
        });
        heap.push(QueuedItem {
            priority: Priority::High,
            seq: 1,
            request_id: second,
        });
        assert_eq!(heap.pop().unwrap().request_id, first);
        assert_eq!(heap.pop().unwrap().request_id, second);
    }
}
