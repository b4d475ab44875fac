//! Bounded FIFO of work items between the poller and the executor pool.
//!
//! One producer, many consumers. `push` never blocks: a full queue is
//! backpressure and the caller decides what to drop. `pop` parks on a
//! [`Notify`] and re-checks under the lock, so every pushed item is handed
//! to exactly one consumer and `None` is only returned once the queue is
//! closed and drained.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::api::Job;

/// A job plus its coordinator-assigned id, owned as a unit.
///
/// Ownership moves poller -> queue -> executor; the executor drops all
/// buffers after the result is reported.
#[derive(Debug)]
pub(crate) struct WorkItem {
    pub(crate) job_id: String,
    pub(crate) job: Job,
}

#[derive(Debug)]
pub(crate) enum PushError {
    /// Queue at capacity; the item is handed back to the caller.
    Full(WorkItem),
    /// Queue closed; no new items are accepted.
    Closed(WorkItem),
}

pub(crate) struct JobQueue {
    capacity: usize,
    state: Mutex<QueueState>,
    available: Notify,
}

struct QueueState {
    items: VecDeque<WorkItem>,
    closed: bool,
}

impl JobQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            available: Notify::new(),
        }
    }

    /// Append an item and wake one waiting consumer. Fails without blocking
    /// when the queue is full or closed.
    pub(crate) fn push(&self, item: WorkItem) -> Result<(), PushError> {
        {
            let mut state = self.state.lock().unwrap();
            if state.closed {
                return Err(PushError::Closed(item));
            }
            if state.items.len() >= self.capacity {
                return Err(PushError::Full(item));
            }
            state.items.push_back(item);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Take the oldest item, waiting if the queue is empty. Returns `None`
    /// only after [`close`](Self::close), once every queued item has been
    /// handed out.
    pub(crate) async fn pop(&self) -> Option<WorkItem> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut state = self.state.lock().unwrap();
                if let Some(item) = state.items.pop_front() {
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    /// Stop accepting new items and wake every waiting consumer. Idempotent.
    pub(crate) fn close(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.closed = true;
        }
        self.available.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::api::{HttpMethod, Job};

    fn item(id: &str) -> WorkItem {
        WorkItem {
            job_id: id.to_string(),
            job: Job {
                target_url: format!("http://t.example/{id}"),
                method: HttpMethod::Get,
                headers: Vec::new(),
                body: None,
                timeout_ms: 30_000,
            },
        }
    }

    #[tokio::test]
    async fn delivers_in_fifo_order() {
        let queue = JobQueue::new(8);
        for id in ["a", "b", "c"] {
            queue.push(item(id)).unwrap();
        }
        assert_eq!(queue.len(), 3);
        for id in ["a", "b", "c"] {
            assert_eq!(queue.pop().await.unwrap().job_id, id);
        }
    }

    #[tokio::test]
    async fn preserves_every_field_through_push_and_pop() {
        let queue = JobQueue::new(1);
        let job = Job {
            target_url: "http://t.example/hook".to_string(),
            method: HttpMethod::Post,
            headers: vec![("x-trace".to_string(), "abc".to_string())],
            body: Some(vec![0u8, 159, 146, 150]),
            timeout_ms: 1_234,
        };
        queue
            .push(WorkItem {
                job_id: "j1".to_string(),
                job: job.clone(),
            })
            .unwrap();

        let popped = queue.pop().await.unwrap();
        assert_eq!(popped.job_id, "j1");
        assert_eq!(popped.job, job);
    }

    #[tokio::test]
    async fn rejects_push_when_full() {
        let queue = JobQueue::new(2);
        queue.push(item("a")).unwrap();
        queue.push(item("b")).unwrap();
        match queue.push(item("c")) {
            Err(PushError::Full(rejected)) => assert_eq!(rejected.job_id, "c"),
            other => panic!("expected Full, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_push_after_close() {
        let queue = JobQueue::new(2);
        queue.close();
        match queue.push(item("a")) {
            Err(PushError::Closed(rejected)) => assert_eq!(rejected.job_id, "a"),
            other => panic!("expected Closed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_wakes_blocked_pop() {
        let queue = Arc::new(JobQueue::new(2));
        let waiter = tokio::spawn({
            let queue = queue.clone();
            async move { queue.pop().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();
        let popped = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("pop did not wake on close")
            .unwrap();
        assert!(popped.is_none());
    }

    #[tokio::test]
    async fn drains_remaining_items_after_close() {
        let queue = JobQueue::new(2);
        queue.push(item("a")).unwrap();
        queue.close();
        assert_eq!(queue.pop().await.unwrap().job_id, "a");
        assert!(queue.pop().await.is_none());
    }

    #[tokio::test]
    async fn each_item_is_delivered_to_exactly_one_consumer() {
        let queue = Arc::new(JobQueue::new(8));
        let consumers: Vec<_> = (0..2)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move {
                    let mut ids = Vec::new();
                    while let Some(item) = queue.pop().await {
                        ids.push(item.job_id);
                    }
                    ids
                })
            })
            .collect();

        for id in ["a", "b", "c", "d"] {
            queue.push(item(id)).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        queue.close();

        let mut seen = Vec::new();
        for consumer in consumers {
            seen.extend(consumer.await.unwrap());
        }
        seen.sort();
        assert_eq!(seen, ["a", "b", "c", "d"]);
    }
}
