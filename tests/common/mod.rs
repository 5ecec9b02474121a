//! Shared fakes and fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use resilience_profile::admission::{AdmissionError, BulkheadPool, Permit, RejectReason};

/// A profile with two pools, three pipelines and a database binding.
pub const SAMPLE_CONFIG: &str = r#"
default_profile = "prod"

[profiles.prod.pools.db]
global_max = 40
mode = "weighted"
lanes = { reads = { weight = 1 }, writes = { weight = 3 } }

[profiles.prod.pools.api]
global_max = 100
mode = "percent"
soft_borrow_utilization_threshold = 0.8
lanes = { checkout = { percent = 0.25 } }

[[profiles.prod.pipelines.orders.stages]]
type = "bulkhead"
pool = "db"

[[profiles.prod.pipelines.orders.stages]]
type = "circuit_breaker"

[[profiles.prod.pipelines.orders.stages]]
type = "retry"
retry = "rtry:attempts=5;delay=20ms"

[[profiles.prod.pipelines.db_connect.stages]]
type = "retry"
retry = { max_attempts = 2, base_delay_ms = 10, max_delay_ms = 100, jitter = false }

[[profiles.prod.pipelines.db_query.stages]]
type = "bulkhead"
pool = "db"

[profiles.prod.database]
enabled = true
connect_pipeline = "db_connect"
query_pipeline = "db_query"

[profiles.dev.pools.db]
global_max = 10
lanes = { reads = { max_concurrent = 3 } }
"#;

/// Acquire/release event recorded by [`CountingPool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Acquired { pool: String, lane: String },
    Released { pool: String, lane: String },
}

/// Pool fake that records every acquire and release in a shared log.
#[derive(Debug)]
pub struct CountingPool {
    id: String,
    events: Arc<Mutex<Vec<Event>>>,
    held: Arc<AtomicUsize>,
    reject: Option<RejectReason>,
    delay: Option<Duration>,
}

impl CountingPool {
    pub fn new(id: &str, events: Arc<Mutex<Vec<Event>>>) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            events,
            held: Arc::new(AtomicUsize::new(0)),
            reject: None,
            delay: None,
        })
    }

    /// A pool that refuses every acquisition.
    pub fn rejecting(id: &str, reason: RejectReason, events: Arc<Mutex<Vec<Event>>>) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            events,
            held: Arc::new(AtomicUsize::new(0)),
            reject: Some(reason),
            delay: None,
        })
    }

    /// A pool whose acquisitions take `delay` before succeeding.
    pub fn slow(id: &str, delay: Duration, events: Arc<Mutex<Vec<Event>>>) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            events,
            held: Arc::new(AtomicUsize::new(0)),
            reject: None,
            delay: Some(delay),
        })
    }

    /// Permits currently outstanding.
    pub fn held(&self) -> usize {
        self.held.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BulkheadPool for CountingPool {
    fn id(&self) -> &str {
        &self.id
    }

    async fn acquire(
        &self,
        lane: &str,
        _timeout: Option<Duration>,
    ) -> Result<Box<dyn Permit>, AdmissionError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = self.reject {
            return Err(AdmissionError::rejected(&self.id, lane, reason));
        }

        self.held.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(Event::Acquired {
            pool: self.id.clone(),
            lane: lane.to_string(),
        });

        Ok(Box::new(CountingPermit {
            pool: self.id.clone(),
            lane: lane.to_string(),
            events: self.events.clone(),
            held: self.held.clone(),
        }))
    }
}

#[derive(Debug)]
pub struct CountingPermit {
    pool: String,
    lane: String,
    events: Arc<Mutex<Vec<Event>>>,
    held: Arc<AtomicUsize>,
}

impl Permit for CountingPermit {
    fn id(&self) -> &str {
        "counting"
    }

    fn pool(&self) -> &str {
        &self.pool
    }

    fn lane(&self) -> &str {
        &self.lane
    }

    fn release(self: Box<Self>) {
        self.held.fetch_sub(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(Event::Released {
            pool: self.pool.clone(),
            lane: self.lane.clone(),
        });
    }
}

pub fn acquired(pool: &str, lane: &str) -> Event {
    Event::Acquired { pool: pool.into(), lane: lane.into() }
}

pub fn released(pool: &str, lane: &str) -> Event {
    Event::Released { pool: pool.into(), lane: lane.into() }
}
