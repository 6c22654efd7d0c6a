//! Payment-status polling.
//!
//! [`start_polling`] spawns two tasks per QR: a lookup loop on a fixed
//! interval and an expiry timer. The timer only signals the deadline; the
//! loop resolves the session, and never while a lookup is in flight, so a
//! payment confirmed by a lookup that straddles the deadline still wins.
//! Resolution is a single `compare_exchange` on the status byte, so a
//! session ends `Paid` or `Expired` exactly once. The result is delivered
//! through a oneshot channel held by [`PaymentSession`].

use crate::config::PollingConfig;
use crate::credentials::BearerToken;
use crate::error::{KhqrError, Result};
use crate::khqr::Fingerprint;
use crate::settlement::{SettlementClient, SettlementStatus};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum PaymentStatus {
    Waiting = 0,
    Paid = 1,
    Expired = 2,
}

impl PaymentStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Paid,
            2 => Self::Expired,
            _ => Self::Waiting,
        }
    }

    pub fn is_terminal(self) -> bool {
        self != Self::Waiting
    }
}

/// What the session's one-shot notification carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Paid,
    Expired,
    /// Non-retryable failure (bad or rejected credential). Polling has
    /// stopped but the status is still `Waiting`.
    Failed(KhqrError),
}

/// Counters for a running or finished session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDiagnostics {
    pub lookups: u64,
    pub retryable_failures: u64,
    pub last_error: Option<String>,
}

// ---------------------------------------------------------------------------
// Shared session state
// ---------------------------------------------------------------------------

struct SessionState {
    fingerprint: Fingerprint,
    status: AtomicU8,
    notifier: Mutex<Option<oneshot::Sender<SessionOutcome>>>,
    /// Caller-facing token; cancelling it suppresses the notification.
    cancel: CancellationToken,
    /// Child of `cancel`, also fired internally once the session is terminal
    /// or has failed.
    stop: CancellationToken,
    /// Fired by the expiry timer when the validity window has elapsed.
    expiry_due: CancellationToken,
    lookups: AtomicU64,
    retryable_failures: AtomicU64,
    last_error: Mutex<Option<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionState {
    fn new(fingerprint: Fingerprint, notifier: oneshot::Sender<SessionOutcome>) -> Self {
        let cancel = CancellationToken::new();
        let stop = cancel.child_token();
        Self {
            fingerprint,
            status: AtomicU8::new(PaymentStatus::Waiting as u8),
            notifier: Mutex::new(Some(notifier)),
            cancel,
            stop,
            expiry_due: CancellationToken::new(),
            lookups: AtomicU64::new(0),
            retryable_failures: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }

    fn status(&self) -> PaymentStatus {
        PaymentStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Move `Waiting` to `to`. Returns `false` when the session was already
    /// terminal.
    fn try_transition(&self, to: PaymentStatus) -> bool {
        self.status
            .compare_exchange(
                PaymentStatus::Waiting as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Deliver the outcome unless it was already delivered or the caller
    /// cancelled.
    /// The notifier lock is held across the check and the send, so this
    /// cannot interleave with [`close`](Self::close).
    fn notify(&self, outcome: SessionOutcome) {
        let mut notifier = lock(&self.notifier);
        if self.cancel.is_cancelled() {
            notifier.take();
            return;
        }
        if let Some(tx) = notifier.take() {
            // Receiver gone means nobody is listening any more.
            let _ = tx.send(outcome);
        }
    }

    /// Cancel the session and discard the notifier.
    fn close(&self) {
        let mut notifier = lock(&self.notifier);
        self.cancel.cancel();
        notifier.take();
    }

    fn finish(&self, to: PaymentStatus) -> bool {
        if !self.try_transition(to) {
            return false;
        }
        info!(fingerprint = %self.fingerprint, status = ?to, "payment session resolved");
        let outcome = match to {
            PaymentStatus::Paid => SessionOutcome::Paid,
            _ => SessionOutcome::Expired,
        };
        self.notify(outcome);
        self.stop.cancel();
        true
    }

    fn record_failure(&self, err: &KhqrError) {
        *lock(&self.last_error) = Some(err.to_string());
    }

    fn diagnostics(&self) -> SessionDiagnostics {
        SessionDiagnostics {
            lookups: self.lookups.load(Ordering::Relaxed),
            retryable_failures: self.retryable_failures.load(Ordering::Relaxed),
            last_error: lock(&self.last_error).clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session handle
// ---------------------------------------------------------------------------

/// Handle to a running poll. Dropping it stops the background tasks.
pub struct PaymentSession {
    state: Arc<SessionState>,
    outcome: Option<oneshot::Receiver<SessionOutcome>>,
}

impl PaymentSession {
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.state.fingerprint
    }

    pub fn status(&self) -> PaymentStatus {
        self.state.status()
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        self.state.diagnostics()
    }

    /// Token that cancels this session when fired. Useful when the caller
    /// needs to cancel while awaiting [`outcome`](Self::outcome).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.state.cancel.clone()
    }

    /// Stop polling. No notification is delivered after this returns.
    pub fn cancel(&self) {
        self.state.close();
        debug!(fingerprint = %self.state.fingerprint, "payment session cancelled");
    }

    /// Wait for the one-shot notification. `None` once cancelled, or when
    /// the outcome was already taken.
    pub async fn outcome(&mut self) -> Option<SessionOutcome> {
        let rx = self.outcome.take()?;
        rx.await.ok()
    }
}

impl Drop for PaymentSession {
    fn drop(&mut self) {
        self.state.stop.cancel();
    }
}

impl std::fmt::Debug for PaymentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentSession")
            .field("fingerprint", &self.state.fingerprint)
            .field("status", &self.status())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Begin polling `fingerprint` until it is paid or `config.validity` runs
/// out. Must be called from within a tokio runtime.
pub fn start_polling(
    client: Arc<dyn SettlementClient>,
    fingerprint: Fingerprint,
    config: PollingConfig,
    token: BearerToken,
) -> Result<PaymentSession> {
    config.validate()?;

    let (tx, rx) = oneshot::channel();
    let state = Arc::new(SessionState::new(fingerprint, tx));
    let deadline = Instant::now() + config.validity;

    info!(
        fingerprint = %state.fingerprint,
        interval_ms = config.poll_interval.as_millis() as u64,
        validity_secs = config.validity.as_secs(),
        "payment polling started"
    );

    tokio::spawn(expiry_timer(state.clone(), deadline));
    tokio::spawn(poll_loop(state.clone(), client, token, config, deadline));

    Ok(PaymentSession {
        state,
        outcome: Some(rx),
    })
}

async fn expiry_timer(state: Arc<SessionState>, deadline: Instant) {
    tokio::select! {
        _ = state.stop.cancelled() => {}
        _ = tokio::time::sleep_until(deadline) => {
            debug!(fingerprint = %state.fingerprint, "validity window elapsed");
            state.expiry_due.cancel();
        }
    }
}

async fn poll_loop(
    state: Arc<SessionState>,
    client: Arc<dyn SettlementClient>,
    token: BearerToken,
    config: PollingConfig,
    deadline: Instant,
) {
    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = state.stop.cancelled() => break,
            _ = state.expiry_due.cancelled() => {
                state.finish(PaymentStatus::Expired);
                break;
            }
            _ = ticker.tick() => {}
        }

        if Instant::now() >= deadline {
            state.finish(PaymentStatus::Expired);
            break;
        }

        // Expiry is not watched here: a lookup already sent gets to report.
        state.lookups.fetch_add(1, Ordering::Relaxed);
        let result = tokio::select! {
            _ = state.stop.cancelled() => break,
            result = client.check_status(&state.fingerprint, &token) => result,
        };

        match result {
            Ok(SettlementStatus::Paid) => {
                state.finish(PaymentStatus::Paid);
                break;
            }
            Ok(SettlementStatus::Unpaid) => {
                debug!(fingerprint = %state.fingerprint, "not paid yet");
            }
            Err(e) if e.is_retryable() => {
                state.retryable_failures.fetch_add(1, Ordering::Relaxed);
                state.record_failure(&e);
                warn!(fingerprint = %state.fingerprint, error = %e, "status lookup failed; retrying");
            }
            Err(e) => {
                state.record_failure(&e);
                warn!(fingerprint = %state.fingerprint, error = %e, "status lookup failed; polling stopped");
                state.notify(SessionOutcome::Failed(e));
                state.stop.cancel();
                break;
            }
        }
    }
    if state.cancel.is_cancelled() {
        drop(lock(&state.notifier).take());
    }
    debug!(fingerprint = %state.fingerprint, "poll loop exited");
}
