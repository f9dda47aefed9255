//! In-memory topic broker.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::bus::{Consumer, MessageBus};
use crate::error::TransportError;

/// Default number of redeliveries before a delivery is dead-lettered.
pub const DEFAULT_MAX_REDELIVERIES: u32 = 3;

#[derive(Debug, Clone)]
struct Delivery {
    payload: Value,
    attempts: u32,
}

#[derive(Debug, Default)]
struct BrokerState {
    /// Exact-match routing key → queue name.
    bindings: HashMap<String, String>,
    /// FIFO queues, ordered by name so the pump is deterministic.
    queues: BTreeMap<String, VecDeque<Delivery>>,
}

/// In-memory topic exchange with at-least-once delivery.
///
/// Queues are FIFO; a consumer error requeues the delivery until
/// [`DEFAULT_MAX_REDELIVERIES`] is exhausted, after which the payload
/// is shunted to the configured dead-letter queue (or dropped with an
/// error log when none is set). Publishing to an unbound routing key
/// is a warning, not an error, matching topic-exchange drop semantics.
#[derive(Clone)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    consumers: Arc<RwLock<HashMap<String, Arc<dyn Consumer>>>>,
    max_redeliveries: u32,
    dead_letter_queue: Option<String>,
}

impl InMemoryBroker {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState::default())),
            consumers: Arc::new(RwLock::new(HashMap::new())),
            max_redeliveries: DEFAULT_MAX_REDELIVERIES,
            dead_letter_queue: None,
        }
    }

    /// Overrides the redelivery budget.
    pub fn with_max_redeliveries(mut self, max: u32) -> Self {
        self.max_redeliveries = max;
        self
    }

    /// Sets the queue that receives deliveries whose redelivery budget
    /// is exhausted. The queue must still be declared before use.
    pub fn with_dead_letter_queue(mut self, queue: &str) -> Self {
        self.dead_letter_queue = Some(queue.to_string());
        self
    }

    /// Declares a queue. Declaring an existing queue is a no-op.
    pub fn declare_queue(&self, queue: &str) {
        let mut state = self.state.lock().unwrap();
        state.queues.entry(queue.to_string()).or_default();
    }

    /// Binds a routing key to a declared queue.
    pub fn bind(&self, routing_key: &str, queue: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if !state.queues.contains_key(queue) {
            return Err(TransportError::UnknownQueue(queue.to_string()));
        }
        state
            .bindings
            .insert(routing_key.to_string(), queue.to_string());
        Ok(())
    }

    /// Registers the consumer for a queue, replacing any previous one.
    pub fn subscribe(&self, queue: &str, consumer: Arc<dyn Consumer>) -> Result<(), TransportError> {
        if !self.state.lock().unwrap().queues.contains_key(queue) {
            return Err(TransportError::UnknownQueue(queue.to_string()));
        }
        self.consumers
            .write()
            .unwrap()
            .insert(queue.to_string(), consumer);
        Ok(())
    }

    /// Number of messages waiting on a queue.
    pub fn queue_len(&self, queue: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .queues
            .get(queue)
            .map_or(0, VecDeque::len)
    }

    /// Removes and returns all messages waiting on a queue.
    pub fn drain_queue(&self, queue: &str) -> Vec<Value> {
        let mut state = self.state.lock().unwrap();
        state
            .queues
            .get_mut(queue)
            .map(|q| q.drain(..).map(|d| d.payload).collect())
            .unwrap_or_default()
    }

    /// Re-enqueues a payload on a queue directly, bypassing routing.
    ///
    /// Test hook for simulating broker redelivery of an already
    /// processed message.
    pub fn redeliver(&self, queue: &str, payload: Value) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        match state.queues.get_mut(queue) {
            Some(q) => {
                q.push_back(Delivery {
                    payload,
                    attempts: 0,
                });
                Ok(())
            }
            None => Err(TransportError::UnknownQueue(queue.to_string())),
        }
    }

    /// Pops the next delivery from the first non-empty queue that has
    /// a consumer registered.
    fn next_delivery(&self) -> Option<(String, Arc<dyn Consumer>, Delivery)> {
        let consumers = self.consumers.read().unwrap();
        let mut state = self.state.lock().unwrap();
        for (queue, deliveries) in state.queues.iter_mut() {
            if deliveries.is_empty() {
                continue;
            }
            if let Some(consumer) = consumers.get(queue) {
                let delivery = deliveries.pop_front().unwrap();
                return Some((queue.clone(), Arc::clone(consumer), delivery));
            }
        }
        None
    }

    /// Routes a delivery whose redelivery budget ran out to the
    /// dead-letter queue, when one is configured and declared. A
    /// failure on the dead-letter queue itself is dropped rather than
    /// requeued.
    fn exhaust(&self, queue: &str, err: &TransportError, payload: Value) {
        let mut state = self.state.lock().unwrap();
        let target = self
            .dead_letter_queue
            .as_deref()
            .filter(|dlq| *dlq != queue)
            .filter(|dlq| state.queues.contains_key(*dlq));
        match target {
            Some(dlq) => {
                metrics::counter!("transport_dead_lettered_total").increment(1);
                tracing::error!(%queue, %err, %dlq, "redelivery budget exhausted, dead-lettering");
                let dlq = dlq.to_string();
                state.queues.get_mut(&dlq).unwrap().push_back(Delivery {
                    payload,
                    attempts: 0,
                });
            }
            None => {
                metrics::counter!("transport_dropped_total").increment(1);
                tracing::error!(%queue, %err, "delivery dropped after redelivery budget");
            }
        }
    }

    /// Dispatches queued deliveries until every consumed queue is empty.
    ///
    /// Queues without a consumer (e.g. a dead-letter sink under manual
    /// inspection) are left untouched. Messages published during
    /// dispatch are picked up in the same run, so one call drives a
    /// saga instance to its terminal state.
    pub async fn run_until_idle(&self) {
        while let Some((queue, consumer, mut delivery)) = self.next_delivery() {
            match consumer.consume(delivery.payload.clone()).await {
                Ok(()) => {}
                Err(err) => {
                    delivery.attempts += 1;
                    if delivery.attempts > self.max_redeliveries {
                        self.exhaust(&queue, &err, delivery.payload);
                    } else {
                        tracing::warn!(%queue, %err, attempts = delivery.attempts, "requeueing delivery");
                        let mut state = self.state.lock().unwrap();
                        if let Some(q) = state.queues.get_mut(&queue) {
                            q.push_back(delivery);
                        }
                    }
                }
            }
        }
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for InMemoryBroker {
    async fn publish(&self, routing_key: &str, payload: Value) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        let Some(queue) = state.bindings.get(routing_key).cloned() else {
            metrics::counter!("transport_unroutable_total").increment(1);
            tracing::warn!(%routing_key, "no binding for routing key, dropping message");
            return Ok(());
        };
        let deliveries = state
            .queues
            .get_mut(&queue)
            .ok_or_else(|| TransportError::UnknownQueue(queue.clone()))?;
        deliveries.push_back(Delivery {
            payload,
            attempts: 0,
        });
        metrics::counter!("transport_published_total").increment(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Recorder {
        seen: Arc<Mutex<Vec<Value>>>,
        fail_first: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl Consumer for Recorder {
        async fn consume(&self, payload: Value) -> Result<(), TransportError> {
            let mut fail = self.fail_first.lock().unwrap();
            if *fail {
                *fail = false;
                return Err(TransportError::Consumer("induced".to_string()));
            }
            self.seen.lock().unwrap().push(payload);
            Ok(())
        }
    }

    fn recorder() -> (Arc<Recorder>, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let consumer = Arc::new(Recorder {
            seen: Arc::clone(&seen),
            fail_first: Arc::new(Mutex::new(false)),
        });
        (consumer, seen)
    }

    #[tokio::test]
    async fn test_publish_routes_to_bound_queue() {
        let broker = InMemoryBroker::new();
        broker.declare_queue("q1");
        broker.bind("key.a", "q1").unwrap();

        broker.publish("key.a", json!({"n": 1})).await.unwrap();
        assert_eq!(broker.queue_len("q1"), 1);
    }

    #[tokio::test]
    async fn test_unbound_key_drops_silently() {
        let broker = InMemoryBroker::new();
        broker.declare_queue("q1");

        broker.publish("missing.key", json!({})).await.unwrap();
        assert_eq!(broker.queue_len("q1"), 0);
    }

    #[tokio::test]
    async fn test_bind_unknown_queue_fails() {
        let broker = InMemoryBroker::new();
        assert!(matches!(
            broker.bind("key.a", "nope"),
            Err(TransportError::UnknownQueue(_))
        ));
    }

    #[tokio::test]
    async fn test_run_until_idle_dispatches_in_order() {
        let broker = InMemoryBroker::new();
        broker.declare_queue("q1");
        broker.bind("key.a", "q1").unwrap();
        let (consumer, seen) = recorder();
        broker.subscribe("q1", consumer).unwrap();

        broker.publish("key.a", json!({"n": 1})).await.unwrap();
        broker.publish("key.a", json!({"n": 2})).await.unwrap();
        broker.run_until_idle().await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[json!({"n": 1}), json!({"n": 2})]);
        assert_eq!(broker.queue_len("q1"), 0);
    }

    #[tokio::test]
    async fn test_consumer_error_redelivers() {
        let broker = InMemoryBroker::new();
        broker.declare_queue("q1");
        broker.bind("key.a", "q1").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let consumer = Arc::new(Recorder {
            seen: Arc::clone(&seen),
            fail_first: Arc::new(Mutex::new(true)),
        });
        broker.subscribe("q1", consumer).unwrap();

        broker.publish("key.a", json!({"n": 1})).await.unwrap();
        broker.run_until_idle().await;

        // First attempt failed, redelivery succeeded.
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    struct AlwaysFailing;

    #[async_trait]
    impl Consumer for AlwaysFailing {
        async fn consume(&self, _payload: Value) -> Result<(), TransportError> {
            Err(TransportError::Consumer("induced".to_string()))
        }
    }

    #[tokio::test]
    async fn test_exhausted_redelivery_shunts_to_dead_letter_queue() {
        let broker = InMemoryBroker::new()
            .with_max_redeliveries(2)
            .with_dead_letter_queue("dead");
        broker.declare_queue("q1");
        broker.declare_queue("dead");
        broker.bind("key.a", "q1").unwrap();
        broker.subscribe("q1", Arc::new(AlwaysFailing)).unwrap();

        broker.publish("key.a", json!({"n": 1})).await.unwrap();
        broker.run_until_idle().await;

        assert_eq!(broker.queue_len("q1"), 0);
        assert_eq!(broker.drain_queue("dead"), vec![json!({"n": 1})]);
    }

    #[tokio::test]
    async fn test_exhausted_redelivery_without_dead_letter_is_dropped() {
        let broker = InMemoryBroker::new().with_max_redeliveries(1);
        broker.declare_queue("q1");
        broker.bind("key.a", "q1").unwrap();
        broker.subscribe("q1", Arc::new(AlwaysFailing)).unwrap();

        broker.publish("key.a", json!({"n": 1})).await.unwrap();
        broker.run_until_idle().await;

        assert_eq!(broker.queue_len("q1"), 0);
    }

    #[tokio::test]
    async fn test_failure_on_dead_letter_queue_does_not_cycle() {
        let broker = InMemoryBroker::new()
            .with_max_redeliveries(1)
            .with_dead_letter_queue("dead");
        broker.declare_queue("dead");
        broker.bind("dead.key", "dead").unwrap();
        broker.subscribe("dead", Arc::new(AlwaysFailing)).unwrap();

        broker.publish("dead.key", json!({"n": 1})).await.unwrap();
        broker.run_until_idle().await;

        assert_eq!(broker.queue_len("dead"), 0);
    }

    #[tokio::test]
    async fn test_queue_without_consumer_is_left_alone() {
        let broker = InMemoryBroker::new();
        broker.declare_queue("dead");
        broker.bind("dead.key", "dead").unwrap();

        broker.publish("dead.key", json!({"n": 1})).await.unwrap();
        broker.run_until_idle().await;

        assert_eq!(broker.queue_len("dead"), 1);
        assert_eq!(broker.drain_queue("dead"), vec![json!({"n": 1})]);
    }
}
