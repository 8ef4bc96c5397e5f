//! Append-only audit trail with an observable, bounded retry queue.
//!
//! Decision points enqueue records synchronously; a background worker writes
//! them to the `audit_log` table, retrying failures with exponential backoff
//! and jitter. Queue overflow and exhausted writes are counted on an
//! observable `dropped` counter and logged, never silently discarded.
//! Enqueueing never blocks the caller, so a cancelled request still gets its
//! audit write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::PgPool;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::Duration;
use tokio::{sync::mpsc, time::sleep};
use tracing::{Instrument, error, info_span};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

/// One append-only record per decision point; never updated or deleted.
#[derive(Clone, Debug)]
pub struct AuditRecord {
    pub user_id: Option<Uuid>,
    pub action: String,
    pub details: serde_json::Value,
    pub ip_address: Option<String>,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    #[must_use]
    pub fn new(action: &str, severity: Severity) -> Self {
        Self {
            user_id: None,
            action: action.to_string(),
            details: serde_json::Value::Null,
            ip_address: None,
            severity,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    #[must_use]
    pub fn with_ip(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Fire-and-forget audit recording; implementations must not block.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);
    /// Records lost to overflow or exhausted retries since startup.
    fn dropped(&self) -> u64;
}

/// Storage backend for the queue worker.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, record: &AuditRecord) -> anyhow::Result<()>;
}

/// Production store writing to the `audit_log` table.
#[derive(Debug, Clone)]
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn append(&self, record: &AuditRecord) -> anyhow::Result<()> {
        let query = "INSERT INTO audit_log (user_id, action, details, ip_address, severity, created_at) VALUES ($1, $2, $3, $4::inet, $5, $6)";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT"
        );
        sqlx::query(query)
            .bind(record.user_id)
            .bind(&record.action)
            .bind(record.details.to_string())
            .bind(record.ip_address.as_deref())
            .bind(record.severity.as_str())
            .bind(record.timestamp)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct AuditWorkerConfig {
    queue_capacity: usize,
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl AuditWorkerConfig {
    /// Default worker config: 1024-record queue, 5 write attempts,
    /// 1s->30s exponential backoff with jitter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue_capacity: 1024,
            max_attempts: 5,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    #[must_use]
    pub fn with_backoff_max(mut self, max: Duration) -> Self {
        self.backoff_max = max;
        self
    }

    #[must_use]
    pub fn normalize(self) -> Self {
        Self {
            queue_capacity: self.queue_capacity.max(1),
            max_attempts: self.max_attempts.max(1),
            backoff_base: if self.backoff_base.is_zero() {
                Duration::from_millis(100)
            } else {
                self.backoff_base
            },
            backoff_max: if self.backoff_max < self.backoff_base {
                self.backoff_base
            } else {
                self.backoff_max
            },
        }
    }
}

impl Default for AuditWorkerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Sink backed by a bounded queue and a background writer task.
pub struct QueuedAuditSink {
    tx: mpsc::Sender<AuditRecord>,
    dropped: Arc<AtomicU64>,
}

impl QueuedAuditSink {
    /// Spawn the writer worker and return the sink.
    pub fn spawn(
        store: Arc<dyn AuditStore>,
        config: AuditWorkerConfig,
    ) -> (Arc<Self>, tokio::task::JoinHandle<()>) {
        let config = config.normalize();
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        let handle = tokio::spawn(run_writer(rx, store, config, dropped.clone()));
        (Arc::new(Self { tx, dropped }), handle)
    }
}

impl AuditSink for QueuedAuditSink {
    fn record(&self, record: AuditRecord) {
        if let Err(err) = self.tx.try_send(record) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            error!("audit queue overflow, record dropped: {err}");
        }
    }

    fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

async fn run_writer(
    mut rx: mpsc::Receiver<AuditRecord>,
    store: Arc<dyn AuditStore>,
    config: AuditWorkerConfig,
    dropped: Arc<AtomicU64>,
) {
    while let Some(record) = rx.recv().await {
        let mut attempt = 0u32;
        loop {
            match store.append(&record).await {
                Ok(()) => break,
                Err(err) => {
                    attempt += 1;
                    if attempt >= config.max_attempts {
                        dropped.fetch_add(1, Ordering::Relaxed);
                        error!(
                            action = %record.action,
                            "audit write failed after {attempt} attempts: {err}"
                        );
                        break;
                    }
                    sleep(backoff_delay(
                        attempt,
                        config.backoff_base,
                        config.backoff_max,
                    ))
                    .await;
                }
            }
        }
    }
}

fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let shift = attempt.saturating_sub(1).min(31);
    let factor = 1u32 << shift;
    let delay = base.checked_mul(factor).unwrap_or(max);
    let capped = if delay > max { max } else { delay };
    jitter_delay(capped)
}

fn jitter_delay(delay: Duration) -> Duration {
    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    if delay_ms < 2 {
        return delay;
    }
    let half = delay_ms / 2;
    let jitter = rand::thread_rng().gen_range(0..=half);
    Duration::from_millis(half + jitter)
}

/// In-memory sink for tests and local development. Records synchronously so
/// assertions can inspect what each decision path wrote.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: std::sync::Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn actions(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .map(|record| record.action)
            .collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: AuditRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }

    fn dropped(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{Duration, advance};

    struct FailingStore;

    #[async_trait]
    impl AuditStore for FailingStore {
        async fn append(&self, _record: &AuditRecord) -> anyhow::Result<()> {
            anyhow::bail!("store down")
        }
    }

    struct OkStore {
        appended: Arc<AtomicU64>,
    }

    #[async_trait]
    impl AuditStore for OkStore {
        async fn append(&self, _record: &AuditRecord) -> anyhow::Result<()> {
            self.appended.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn memory_sink_collects_records() {
        let sink = MemoryAuditSink::new();
        sink.record(AuditRecord::new("admin_access_check", Severity::Info));
        sink.record(
            AuditRecord::new("admin_access_blocked", Severity::Critical)
                .with_ip(Some("10.0.0.1".to_string())),
        );
        assert_eq!(
            sink.actions(),
            vec!["admin_access_check", "admin_access_blocked"]
        );
        assert_eq!(sink.dropped(), 0);
    }

    #[test]
    fn record_builder_sets_fields() {
        let user_id = Uuid::new_v4();
        let record = AuditRecord::new("registration_attempt", Severity::Info)
            .with_user(user_id)
            .with_ip(Some("1.2.3.4".to_string()))
            .with_details(serde_json::json!({"handle": "vitor.souza"}));
        assert_eq!(record.user_id, Some(user_id));
        assert_eq!(record.ip_address.as_deref(), Some("1.2.3.4"));
        assert_eq!(record.severity, Severity::Info);
        assert_eq!(record.details["handle"], "vitor.souza");
    }

    #[test]
    fn backoff_delay_is_capped() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(30);
        for attempt in 1..=10 {
            assert!(backoff_delay(attempt, base, max) <= max);
        }
    }

    #[test]
    fn config_normalize_bounds_values() {
        let config = AuditWorkerConfig::new()
            .with_queue_capacity(0)
            .with_max_attempts(0)
            .with_backoff_base(Duration::ZERO)
            .with_backoff_max(Duration::ZERO)
            .normalize();
        assert_eq!(config.queue_capacity, 1);
        assert_eq!(config.max_attempts, 1);
        assert!(!config.backoff_base.is_zero());
        assert!(config.backoff_max >= config.backoff_base);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_writes_count_as_dropped() {
        let config = AuditWorkerConfig::new()
            .with_max_attempts(2)
            .with_backoff_base(Duration::from_millis(10))
            .with_backoff_max(Duration::from_millis(20));
        let (sink, _worker) = QueuedAuditSink::spawn(Arc::new(FailingStore), config);

        sink.record(AuditRecord::new("admin_access_check", Severity::Info));

        // Let the retry backoff elapse under paused time.
        for _ in 0..10 {
            advance(Duration::from_millis(50)).await;
            tokio::task::yield_now().await;
        }
        assert_eq!(sink.dropped(), 1);
    }

    #[tokio::test]
    async fn writer_appends_to_store() {
        let appended = Arc::new(AtomicU64::new(0));
        let store = Arc::new(OkStore {
            appended: appended.clone(),
        });
        let (sink, _worker) = QueuedAuditSink::spawn(store, AuditWorkerConfig::new());

        sink.record(AuditRecord::new("admin_access_granted", Severity::Info));
        sink.record(AuditRecord::new("registration_attempt", Severity::Info));

        for _ in 0..50 {
            if appended.load(Ordering::SeqCst) == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(appended.load(Ordering::SeqCst), 2);
        assert_eq!(sink.dropped(), 0);
    }
}
