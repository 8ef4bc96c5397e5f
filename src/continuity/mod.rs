//! Session continuity watchdog for the long-lived identity credential.
//!
//! Flow Overview:
//! 1) A sign-in event moves the machine from `Idle` to `Monitoring`.
//! 2) While `Monitoring`, a heartbeat confirms the session oracle still
//!    reports a live session and proactively refreshes the credential.
//! 3) An unexpected sign-out (or a dead heartbeat) enters `Recovering`:
//!    debounce, refresh, then re-hydrate from persisted session material.
//! 4) Total recovery failure is `Failed`: one `RecoveryExhausted` signal is
//!    emitted and nothing retries until the next sign-in event.
//!
//! The machine only activates for client classes known to silently drop
//! background sessions; reliable clients stay permanently `Idle`.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::{
    sync::mpsc,
    time::{interval, sleep},
};
use tracing::{debug, error, warn};

const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(4 * 60);
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);

/// Network reliability class of the process hosting the credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientClass {
    Reliable,
    UnstableMobile,
}

impl ClientClass {
    /// Parse a CLI/header value; anything unrecognized is treated as reliable.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "unstable-mobile" => Self::UnstableMobile,
            _ => Self::Reliable,
        }
    }

    #[must_use]
    pub fn is_unstable(self) -> bool {
        matches!(self, Self::UnstableMobile)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ContinuityConfig {
    client_class: ClientClass,
    heartbeat: Duration,
    debounce: Duration,
}

impl ContinuityConfig {
    #[must_use]
    pub fn new(client_class: ClientClass) -> Self {
        Self {
            client_class,
            heartbeat: DEFAULT_HEARTBEAT,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    #[must_use]
    pub fn with_heartbeat_seconds(mut self, seconds: u64) -> Self {
        self.heartbeat = Duration::from_secs(seconds.max(1));
        self
    }

    #[must_use]
    pub fn with_debounce_millis(mut self, millis: u64) -> Self {
        self.debounce = Duration::from_millis(millis);
        self
    }

    #[must_use]
    pub fn client_class(&self) -> ClientClass {
        self.client_class
    }
}

/// Events fed into the state machine. Foreground auth flows emit these so the
/// watchdog never races them by polling ambient state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContinuityEvent {
    SignedIn,
    SignedOut,
}

/// Upward-facing signals; currently only recovery exhaustion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContinuitySignal {
    RecoveryExhausted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Monitoring,
    Recovering,
    Failed,
}

/// Credential operations the watchdog drives. The source owns the credential;
/// the watchdog only sequences refresh and restore attempts.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Renew the held credential in place.
    async fn refresh(&self) -> anyhow::Result<()>;
    /// Re-hydrate the credential from locally persisted session material.
    async fn restore_persisted(&self) -> anyhow::Result<()>;
    /// Whether the session oracle still reports a live session.
    async fn session_alive(&self) -> anyhow::Result<bool>;
}

/// Handle for feeding sign-in/sign-out events to a spawned watchdog.
#[derive(Clone, Debug)]
pub struct ContinuityHandle {
    events: mpsc::UnboundedSender<ContinuityEvent>,
}

impl ContinuityHandle {
    pub fn signed_in(&self) {
        let _ = self.events.send(ContinuityEvent::SignedIn);
    }

    pub fn signed_out(&self) {
        let _ = self.events.send(ContinuityEvent::SignedOut);
    }
}

/// Spawn the watchdog task.
///
/// Returns the event handle and the signal channel surfacing
/// `RecoveryExhausted` to whoever owns the re-authentication UX.
#[must_use]
pub fn spawn(
    config: ContinuityConfig,
    source: Arc<dyn CredentialSource>,
) -> (ContinuityHandle, mpsc::UnboundedReceiver<ContinuitySignal>) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (signal_tx, signal_rx) = mpsc::unbounded_channel();

    tokio::spawn(run(config, source, event_rx, signal_tx));

    (ContinuityHandle { events: event_tx }, signal_rx)
}

async fn run(
    config: ContinuityConfig,
    source: Arc<dyn CredentialSource>,
    mut events: mpsc::UnboundedReceiver<ContinuityEvent>,
    signals: mpsc::UnboundedSender<ContinuitySignal>,
) {
    if !config.client_class().is_unstable() {
        debug!("continuity watchdog idle: reliable client class");
        // Drain events so senders stay infallible; nothing is monitored.
        while events.recv().await.is_some() {}
        return;
    }

    let mut state = State::Idle;
    let mut heartbeat = interval(config.heartbeat);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick of a tokio interval fires immediately; consume it so the
    // heartbeat starts one full period after sign-in.
    heartbeat.tick().await;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                None => break,
                Some(ContinuityEvent::SignedIn) => {
                    debug!("continuity: signed in, monitoring");
                    state = State::Monitoring;
                    heartbeat.reset();
                }
                Some(ContinuityEvent::SignedOut) => {
                    if state == State::Monitoring {
                        state = State::Recovering;
                    }
                }
            },
            _ = heartbeat.tick(), if state == State::Monitoring => {
                match source.session_alive().await {
                    Ok(true) => {
                        if let Err(err) = source.refresh().await {
                            warn!("continuity: heartbeat refresh failed: {err}");
                        }
                    }
                    Ok(false) => {
                        debug!("continuity: session oracle reports no session");
                        state = State::Recovering;
                    }
                    Err(err) => {
                        // Transient oracle failure; keep monitoring.
                        warn!("continuity: session liveness probe failed: {err}");
                    }
                }
            }
        }

        if state == State::Recovering {
            state = recover(&config, source.as_ref(), &signals).await;
        }
    }
}

/// Bounded recovery: debounce, refresh, then restore. Returns the next state.
async fn recover(
    config: &ContinuityConfig,
    source: &dyn CredentialSource,
    signals: &mpsc::UnboundedSender<ContinuitySignal>,
) -> State {
    // Absorb rapid sign-out/sign-in thrash before reacting.
    sleep(config.debounce).await;

    if source.refresh().await.is_ok() {
        debug!("continuity: recovered via refresh");
        return State::Monitoring;
    }

    if source.restore_persisted().await.is_ok() {
        debug!("continuity: recovered from persisted session material");
        return State::Monitoring;
    }

    error!("continuity: recovery exhausted, manual re-authentication required");
    let _ = signals.send(ContinuitySignal::RecoveryExhausted);
    State::Failed
}
