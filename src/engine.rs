//! Notification engine
//!
//! Ties classification, admission control, statistics and dispatch together.
//! Classification, admission and bookkeeping run synchronously under one
//! lock; only channel I/O is asynchronous. Statistics for a notification are
//! therefore recorded before any of its channels are attempted.

use crate::alerts::dispatcher::{DispatchReport, Dispatcher};
use crate::alerts::rate_limiter::{RateLimitKey, RateLimiter};
use crate::alerts::stats::{NotificationStats, StatsTracker};
use crate::alerts::transport::{HttpTransport, Transport};
use crate::config::{Config, ConfigUpdate, PublicConfig};
use crate::error::{ConfigError, DeliveryError, InterceptError};
use crate::events::{Notification, NotificationKind, Severity, Timestamp, UndeliveredReason};
use crate::sink::{InterceptedSink, Sink};
use crate::triggers::KeywordClassifier;
use chrono::{Duration, Utc};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Callback invoked for every dispatch decision: kind, message, admitted
pub type NotificationObserver = Arc<dyn Fn(&NotificationKind, &str, bool) + Send + Sync>;

/// Result of an admission decision
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// Admitted and recorded as sent
    Admitted(Notification),
    /// Denied by the rate limiter and recorded as undelivered
    RateLimited(Notification),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted(_))
    }

    pub fn notification(&self) -> &Notification {
        match self {
            Admission::Admitted(n) | Admission::RateLimited(n) => n,
        }
    }
}

/// State guarded by the engine lock
struct EngineState {
    config: Config,
    classifier: KeywordClassifier,
    limiter: RateLimiter,
    stats: StatsTracker,
}

impl EngineState {
    fn new(config: Config) -> Self {
        let classifier = KeywordClassifier::new(&config.critical_keywords);
        let limiter = RateLimiter::new(config.rate_limit_max, window_of(&config));
        Self {
            config,
            classifier,
            limiter,
            stats: StatsTracker::new(),
        }
    }
}

fn window_of(config: &Config) -> Duration {
    Duration::from_std(config.rate_limit_window()).unwrap_or(Duration::milliseconds(i64::MAX))
}

/// In-process alerting relay
///
/// Owns its configuration, rate-limit history and delivery records; nothing
/// is shared between engine instances. All state sits behind a mutex, so an
/// engine may be shared across threads, but only one `InterceptedSink` may
/// exist per engine at a time.
pub struct NotificationEngine {
    state: Mutex<EngineState>,
    dispatcher: Arc<Dispatcher>,
    observers: RwLock<Vec<NotificationObserver>>,
    pending: Mutex<Vec<JoinHandle<DispatchReport>>>,
    runtime: Option<Handle>,
    /// Original sink, handed back on release and used for channel diagnostics
    original: Arc<dyn Sink>,
    intercepting: AtomicBool,
}

impl NotificationEngine {
    /// Create an engine
    ///
    /// Background dispatch uses the Tokio runtime current at construction
    /// time, falling back to the one current at submit time.
    ///
    /// # Arguments
    ///
    /// * `config` - Relay configuration
    /// * `original` - The host's diagnostic sink
    /// * `transport` - Network layer for the delivery channels
    pub fn new(config: Config, original: Arc<dyn Sink>, transport: Arc<dyn Transport>) -> Arc<Self> {
        Self::build(config, original, transport, Handle::try_current().ok())
    }

    /// Create an engine delivering over HTTP
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Transport` if the HTTP client cannot be built.
    pub fn with_http(config: Config, original: Arc<dyn Sink>) -> Result<Arc<Self>, DeliveryError> {
        let transport = HttpTransport::new(config.request_timeout())?;
        Ok(Self::new(config, original, Arc::new(transport)))
    }

    fn build(
        config: Config,
        original: Arc<dyn Sink>,
        transport: Arc<dyn Transport>,
        runtime: Option<Handle>,
    ) -> Arc<Self> {
        debug!(
            "Creating notification engine: {} keywords, {} per {}ms",
            config.critical_keywords.len(),
            config.rate_limit_max,
            config.rate_limit_window_ms
        );
        Arc::new(Self {
            state: Mutex::new(EngineState::new(config)),
            dispatcher: Arc::new(Dispatcher::new(transport, Arc::clone(&original))),
            observers: RwLock::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            runtime,
            original,
            intercepting: AtomicBool::new(false),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Decorate the original sink
    ///
    /// # Errors
    ///
    /// Returns `InterceptError::AlreadyIntercepted` while a previously
    /// returned `InterceptedSink` is still alive.
    pub fn intercept(self: &Arc<Self>) -> Result<InterceptedSink, InterceptError> {
        if self
            .intercepting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(InterceptError::AlreadyIntercepted);
        }
        Ok(InterceptedSink::new(Arc::clone(self), Arc::clone(&self.original)))
    }

    pub(crate) fn release_interception(&self) {
        self.intercepting.store(false, Ordering::Release);
    }

    pub fn is_intercepting(&self) -> bool {
        self.intercepting.load(Ordering::Acquire)
    }

    /// Offer an observed write for classification
    ///
    /// Escalating writes are submitted as `critical` notifications.
    pub fn observe(&self, severity: Severity, message: &str) -> Option<Admission> {
        let kind = self.lock_state().classifier.classify(severity, message)?;
        Some(self.submit(kind, message))
    }

    /// Admit, record and dispatch in the background
    ///
    /// Returns once the admission decision is recorded. Channel delivery
    /// runs on the engine's runtime; use `flush` to wait for it.
    pub fn submit(&self, kind: NotificationKind, message: &str) -> Admission {
        let (admission, config) = self.admit(kind, message, Utc::now());

        if let (Admission::Admitted(notification), Some(config)) = (&admission, config) {
            let runtime = self.runtime.clone().or_else(|| Handle::try_current().ok());
            match runtime {
                Some(runtime) => {
                    let dispatcher = Arc::clone(&self.dispatcher);
                    let notification = notification.clone();
                    let handle = runtime
                        .spawn(async move { dispatcher.dispatch(&notification, &config).await });
                    let mut pending = self.lock_pending();
                    pending.retain(|h| !h.is_finished());
                    pending.push(handle);
                }
                None => warn!(
                    "No async runtime available; channel dispatch skipped for notification {}",
                    notification.id
                ),
            }
        }

        admission
    }

    /// Admit, record and dispatch, waiting for every channel attempt
    ///
    /// # Returns
    ///
    /// The dispatch report, or `None` if the notification was rate limited
    pub async fn send_notification(
        &self,
        kind: NotificationKind,
        message: &str,
    ) -> Option<DispatchReport> {
        let (admission, config) = self.admit(kind, message, Utc::now());
        match (admission, config) {
            (Admission::Admitted(notification), Some(config)) => {
                Some(self.dispatcher.dispatch(&notification, &config).await)
            }
            _ => None,
        }
    }

    /// Admission decision and bookkeeping at `now`
    ///
    /// On admission also returns the configuration snapshot to dispatch with.
    fn admit(
        &self,
        kind: NotificationKind,
        message: &str,
        now: Timestamp,
    ) -> (Admission, Option<Config>) {
        let notification = Notification::new(kind, message, now);

        let (admission, config) = {
            let mut state = self.lock_state();
            let key = RateLimitKey::new(
                notification.kind.clone(),
                state.config.phone_number.as_deref(),
            );

            if state.limiter.try_admit_at(&key, now) {
                state.stats.record_sent(notification.clone());
                (
                    Admission::Admitted(notification),
                    Some(state.config.clone()),
                )
            } else {
                state.stats.record_undelivered(
                    notification.clone(),
                    UndeliveredReason::RateLimited,
                    now,
                );
                (Admission::RateLimited(notification), None)
            }
        };

        let n = admission.notification();
        debug!(
            "Notification {} ({}) {}",
            n.id,
            n.kind,
            if admission.is_admitted() {
                "admitted"
            } else {
                "rate limited"
            }
        );
        self.notify_observers(&n.kind, &n.message, admission.is_admitted());

        (admission, config)
    }

    fn notify_observers(&self, kind: &NotificationKind, message: &str, delivered: bool) {
        let observers = self
            .observers
            .read()
            .map(|o| o.clone())
            .unwrap_or_default();
        for observer in observers {
            observer(kind, message, delivered);
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, Vec<JoinHandle<DispatchReport>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Wait for every background dispatch still in flight
    ///
    /// Completed dispatches are pruned whenever a new one starts, so the
    /// returned reports may not cover every notification. Dispatches that
    /// panicked are logged and left out.
    pub async fn flush(&self) -> Vec<DispatchReport> {
        let handles: Vec<_> = std::mem::take(&mut *self.lock_pending());
        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => warn!("Dispatch task failed: {}", e),
            }
        }
        reports
    }

    /// Number of background dispatches not yet collected by `flush`
    pub fn pending_dispatches(&self) -> usize {
        self.lock_pending().len()
    }

    /// Register an observer for every dispatch decision
    ///
    /// Observers run synchronously after the decision is recorded and cannot
    /// influence it.
    pub fn on_notification<F>(&self, observer: F)
    where
        F: Fn(&NotificationKind, &str, bool) + Send + Sync + 'static,
    {
        if let Ok(mut observers) = self.observers.write() {
            observers.push(Arc::new(observer));
        }
    }

    /// Counts and copies of both record lists
    pub fn stats(&self) -> NotificationStats {
        self.lock_state().stats.snapshot()
    }

    /// Reset statistics and rate-limit history
    ///
    /// The only path that touches rate-limit state from outside admission
    /// checks. Intended for tests and operator resets.
    pub fn clear_stats(&self) {
        let mut state = self.lock_state();
        state.stats.clear();
        state.limiter.clear();
    }

    /// Current configuration
    pub fn config(&self) -> Config {
        self.lock_state().config.clone()
    }

    /// Dashboard-safe view of the configuration
    pub fn public_config(&self) -> PublicConfig {
        PublicConfig::from(&self.lock_state().config)
    }

    /// Apply a partial configuration replacement
    ///
    /// Takes effect for the next notification. Dispatches already admitted
    /// keep the configuration they were admitted with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` and leaves the configuration
    /// untouched if the result would be invalid.
    pub fn update_config(&self, update: ConfigUpdate) -> Result<(), ConfigError> {
        let mut state = self.lock_state();
        let mut next = state.config.clone();
        update.apply_to(&mut next);
        next.validate()?;

        state.classifier = KeywordClassifier::new(&next.critical_keywords);
        state
            .limiter
            .set_limits(next.rate_limit_max, window_of(&next));
        state.config = next;
        debug!("Configuration updated");
        Ok(())
    }
}

impl std::fmt::Debug for NotificationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationEngine")
            .field("intercepting", &self.is_intercepting())
            .finish_non_exhaustive()
    }
}
