//! Position session orchestrator
//!
//! A running session owns one worker task. The worker asks the source for a
//! quick fix, then opens a continuous subscription and feeds every fix through
//! validation, classification, the stabilizer and the lock controller.
//!
//! All session state lives behind one mutex. Notifications are collected while
//! it is held and delivered after it is released, one batch at a time under a
//! separate delivery lock. Every `start()` and every stop (explicit, `lock()` or
//! accuracy-triggered) bumps the session generation; a batch whose generation
//! is no longer current is dropped, so nothing is delivered once `stop()` has
//! returned.
//!
//! Callbacks run on the worker task, except the unavailable-source fallback
//! which `start()` delivers on the caller's thread before returning. Callbacks
//! may call back into the session.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::types::{ErrorKind, FallbackCause, SessionError, SessionOptions};
use crate::core::{now_millis, FilteredPosition, RawFix};
use crate::processing::{build_stabilizer, LockController, LockState, Stabilizer};
use crate::source::{FixRequest, FixSource, RecoveryStrategy, SourceError, SubscriptionId};
use crate::utils::config::{ConfigError, PositioningConfig};
use crate::validation::{FixValidator, Rejection, SampleClassifier, Verdict};

thread_local! {
    /// Session whose callbacks are running on this thread
    static DELIVERING: Cell<Option<usize>> = const { Cell::new(None) };
}

enum Notification {
    Update(FilteredPosition),
    AccuracyReached(FilteredPosition),
    Error(ErrorKind),
}

/// Notifications produced by one step, plus a subscription to cancel
struct Batch {
    generation: u64,
    notifications: Vec<Notification>,
    cancel: Option<SubscriptionId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    FastFix,
    Continuous,
}

struct RunHandle {
    generation: u64,
    cancel: CancellationToken,
    subscription: Option<SubscriptionId>,
    lock_accuracy_meters: f64,
}

struct SessionState {
    stabilizer: Box<dyn Stabilizer>,
    lock: LockController,
    last_accepted: Option<RawFix>,
    current: Option<FilteredPosition>,
    /// `current` came from a fast fix coarser than the stream limit
    provisional: bool,
    consecutive_rejections: u32,
    fallback_delivered: bool,
    run: Option<RunHandle>,
}

struct Inner {
    source: Arc<dyn FixSource>,
    config: PositioningConfig,
    classifier: SampleClassifier,
    fast_classifier: SampleClassifier,
    validator: FixValidator,
    state: Mutex<SessionState>,
    delivery: Mutex<()>,
    generation: AtomicU64,
}

/// Releases the delivery lock and restores the thread marker on drop
struct DeliveryScope<'a> {
    _guard: Option<MutexGuard<'a, ()>>,
    previous: Option<usize>,
}

impl<'a> DeliveryScope<'a> {
    fn enter(inner: &'a Inner) -> Self {
        let key = inner.key();
        let previous = DELIVERING.with(|d| d.replace(Some(key)));
        // Re-entrant delivery from one of our own callbacks already holds the lock
        let guard = if previous == Some(key) {
            None
        } else {
            Some(inner.delivery.lock().unwrap_or_else(PoisonError::into_inner))
        };
        Self { _guard: guard, previous }
    }
}

impl Drop for DeliveryScope<'_> {
    fn drop(&mut self) {
        DELIVERING.with(|d| d.set(self.previous));
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key(&self) -> usize {
        self as *const Inner as usize
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Invalidate the running generation; caller holds the state lock
    fn halt(&self, state: &mut SessionState) -> Option<SubscriptionId> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        state.run.take().and_then(|run| {
            run.cancel.cancel();
            run.subscription
        })
    }

    fn cancel_subscription(&self, subscription: Option<SubscriptionId>) {
        if let Some(id) = subscription {
            self.source.cancel(id);
        }
    }

    fn default_position(&self) -> FilteredPosition {
        FilteredPosition::fallback(
            self.config.default_position,
            self.config.default_accuracy_meters,
            now_millis(),
        )
    }

    /// Default position (always when `force`, else only without a position) and soft error
    fn fallback(&self, state: &mut SessionState, cause: FallbackCause, force: bool) -> Vec<Notification> {
        let mut notifications = Vec::with_capacity(2);
        if force || state.current.is_none() {
            info!(
                latitude = self.config.default_position.latitude,
                longitude = self.config.default_position.longitude,
                %cause,
                "delivering default position"
            );
            state.fallback_delivered = true;
            notifications.push(Notification::Update(self.default_position()));
        }
        notifications.push(Notification::Error(ErrorKind::FallbackToDefault { cause }));
        notifications
    }

    fn process_fix(&self, generation: u64, fix: RawFix, phase: Phase) -> Option<Batch> {
        let mut state = self.state();
        if !self.is_current(generation) {
            return None;
        }
        if state.lock.is_locked() {
            debug!(timestamp_ms = fix.timestamp_ms, "locked, ignoring fix");
            return None;
        }

        let classifier = match phase {
            Phase::FastFix => &self.fast_classifier,
            Phase::Continuous => &self.classifier,
        };
        let verdict = match self.validator.validate(&fix) {
            Ok(()) => {
                let last = state.last_accepted.as_ref();
                classifier.classify(&fix, last, last.map(|f| f.timestamp_ms))
            }
            Err(invalid) => {
                warn!(error = %invalid, "dropping malformed fix");
                Verdict::Reject(Rejection::from(invalid))
            }
        };

        let mut notifications = Vec::new();
        match verdict {
            Verdict::Reject(rejection) => {
                debug!(
                    reason = rejection.label(),
                    accuracy_m = fix.accuracy_meters,
                    timestamp_ms = fix.timestamp_ms,
                    ?phase,
                    "fix rejected: {}",
                    rejection
                );
                state.consecutive_rejections = state.consecutive_rejections.saturating_add(1);
                let rejected = state.consecutive_rejections;
                if state.current.is_none()
                    && !state.fallback_delivered
                    && rejected >= self.config.fallback_after_rejections
                {
                    notifications = self.fallback(&mut state, FallbackCause::Rejected { rejected }, false);
                }
            }
            Verdict::Accept => {
                state.consecutive_rejections = 0;
                if state.provisional {
                    debug!("replacing provisional fast fix");
                    state.stabilizer.reset();
                    state.provisional = false;
                }
                let filtered = state.stabilizer.apply(&fix);
                // A coarse fast fix is shown but never anchors the interval and jump checks
                if phase == Phase::FastFix && fix.accuracy_meters > self.config.min_accuracy_meters {
                    state.provisional = true;
                } else {
                    state.last_accepted = Some(fix);
                }
                state.current = Some(filtered.clone());

                let transition = state.lock.observe(&filtered);
                if transition.changed() {
                    debug!(from = ?transition.from, to = ?transition.to, "lock state changed");
                }
                notifications.push(Notification::Update(filtered.clone()));

                let target = state
                    .run
                    .as_ref()
                    .map(|run| run.lock_accuracy_meters)
                    .unwrap_or(self.config.target_accuracy_meters);
                if state.lock.try_lock(&filtered, target) {
                    info!(
                        latitude = filtered.latitude,
                        longitude = filtered.longitude,
                        accuracy_m = filtered.accuracy_meters,
                        "accuracy reached, position locked"
                    );
                    notifications.push(Notification::AccuracyReached(filtered));
                    let cancel = self.halt(&mut state);
                    // The lock notifications belong to the post-lock generation
                    return Some(Batch {
                        generation: self.generation.load(Ordering::SeqCst),
                        notifications,
                        cancel,
                    });
                }
            }
        }

        Some(Batch {
            generation,
            notifications,
            cancel: None,
        })
    }

    /// Permission-type failure after start: fall back and end the run
    fn source_denied(&self, generation: u64, error: SourceError) -> Option<Batch> {
        let mut state = self.state();
        if !self.is_current(generation) {
            return None;
        }
        let notifications = self.fallback(&mut state, FallbackCause::Source(error), false);
        Some(Batch {
            generation,
            notifications,
            cancel: None,
        })
    }

    fn fast_fix_timed_out(&self, generation: u64) -> Option<Batch> {
        let mut state = self.state();
        if !self.is_current(generation) {
            return None;
        }
        let mut notifications = Vec::with_capacity(2);
        if state.current.is_none() && !state.fallback_delivered {
            state.fallback_delivered = true;
            notifications.push(Notification::Update(self.default_position()));
        }
        notifications.push(Notification::Error(ErrorKind::Timeout));
        Some(Batch {
            generation,
            notifications,
            cancel: None,
        })
    }

    fn report(&self, generation: u64, kind: ErrorKind) -> Option<Batch> {
        let _state = self.state();
        if !self.is_current(generation) {
            return None;
        }
        Some(Batch {
            generation,
            notifications: vec![Notification::Error(kind)],
            cancel: None,
        })
    }

    /// Attach the subscription to the run; false if the run is already gone
    fn register_subscription(&self, generation: u64, id: SubscriptionId) -> bool {
        let mut state = self.state();
        match state.run.as_mut() {
            Some(run) if run.generation == generation && self.is_current(generation) => {
                run.subscription = Some(id);
                true
            }
            _ => false,
        }
    }

    /// Worker exit; clears the run if it still belongs to `generation`
    fn finish(&self, generation: u64) -> Option<SubscriptionId> {
        let mut state = self.state();
        let owned = state.run.as_ref().is_some_and(|run| run.generation == generation);
        if owned {
            state.run.take().and_then(|run| run.subscription)
        } else {
            None
        }
    }

    fn deliver(&self, options: &SessionOptions, batch: Batch) {
        if batch.notifications.is_empty() {
            return;
        }

        let _scope = DeliveryScope::enter(self);
        for notification in batch.notifications {
            if !self.is_current(batch.generation) {
                debug!(generation = batch.generation, "session restarted or stopped, dropping notifications");
                break;
            }
            match notification {
                Notification::Update(position) => (options.on_update)(position),
                Notification::AccuracyReached(position) => {
                    if let Some(callback) = &options.on_accuracy_reached {
                        callback(position);
                    }
                }
                Notification::Error(kind) => {
                    if let Some(callback) = &options.on_error {
                        callback(kind);
                    }
                }
            }
        }
    }

    /// Wait for an in-flight delivery unless we are inside one of our callbacks
    fn wait_for_delivery(&self) {
        let in_callback = DELIVERING.with(|d| d.get() == Some(self.key()));
        if !in_callback {
            drop(self.delivery.lock().unwrap_or_else(PoisonError::into_inner));
        }
    }
}

struct Worker {
    inner: Arc<Inner>,
    generation: u64,
    cancel: CancellationToken,
    options: SessionOptions,
}

impl Worker {
    async fn run(self) {
        if self.fast_fix().await {
            self.watch().await;
        }
        let subscription = self.inner.finish(self.generation);
        self.inner.cancel_subscription(subscription);
        debug!(generation = self.generation, "session worker finished");
    }

    fn deliver(&self, batch: Option<Batch>) {
        if let Some(batch) = batch {
            self.inner.cancel_subscription(batch.cancel);
            self.inner.deliver(&self.options, batch);
        }
    }

    /// One quick low-accuracy fix, retried once on timeout; false ends the run
    async fn fast_fix(&self) -> bool {
        let request = FixRequest::fast(self.inner.config.fast_fix_timeout_ms);
        let mut retried = false;

        loop {
            let attempt = tokio::time::timeout(
                Duration::from_millis(request.timeout_ms),
                self.inner.source.get_one_fix(request),
            );
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                result = attempt => result.unwrap_or(Err(SourceError::Timeout)),
            };

            match result {
                Ok(fix) => {
                    debug!(accuracy_m = fix.accuracy_meters, "fast fix received");
                    self.deliver(self.inner.process_fix(self.generation, fix, Phase::FastFix));
                }
                Err(error) => match error.recovery_strategy() {
                    RecoveryStrategy::RetryOnce if !retried => {
                        debug!("fast fix timed out, retrying once");
                        retried = true;
                        continue;
                    }
                    RecoveryStrategy::RetryOnce => {
                        warn!("fast fix timed out twice, continuing with subscription");
                        self.deliver(self.inner.fast_fix_timed_out(self.generation));
                    }
                    RecoveryStrategy::FallbackToDefault => {
                        warn!(%error, "location refused, falling back to default position");
                        self.deliver(self.inner.source_denied(self.generation, error));
                        return false;
                    }
                    RecoveryStrategy::Report => {
                        warn!(%error, "fast fix failed");
                        self.deliver(self.inner.report(self.generation, ErrorKind::Source(error)));
                    }
                },
            }

            return self.inner.is_current(self.generation);
        }
    }

    async fn watch(&self) {
        let config = &self.inner.config;
        let request = FixRequest::watch(config.high_accuracy, config.watch_timeout_ms, config.max_age_ms);
        let mut subscription = match self.inner.source.subscribe(request) {
            Ok(subscription) => subscription,
            Err(error) => {
                self.handle_stream_error(error);
                return;
            }
        };

        let id = subscription.id();
        if !self.inner.register_subscription(self.generation, id) {
            self.inner.source.cancel(id);
            return;
        }
        debug!(subscription = id.id(), high_accuracy = request.high_accuracy, "subscription open");

        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                event = subscription.next() => event,
            };

            match event {
                Some(Ok(fix)) => {
                    self.deliver(self.inner.process_fix(self.generation, fix, Phase::Continuous));
                }
                Some(Err(error)) => {
                    if !self.handle_stream_error(error) {
                        break;
                    }
                }
                None => {
                    debug!(subscription = id.id(), "subscription closed by source");
                    break;
                }
            }

            if !self.inner.is_current(self.generation) {
                break;
            }
        }
    }

    /// Report a stream error; false when the stream must be abandoned
    fn handle_stream_error(&self, error: SourceError) -> bool {
        match error.recovery_strategy() {
            RecoveryStrategy::FallbackToDefault => {
                warn!(%error, "location refused, falling back to default position");
                self.deliver(self.inner.source_denied(self.generation, error));
                false
            }
            RecoveryStrategy::RetryOnce => {
                warn!("continuous fix timed out");
                self.deliver(self.inner.report(self.generation, ErrorKind::Timeout));
                true
            }
            RecoveryStrategy::Report => {
                warn!(%error, "location source error");
                self.deliver(self.inner.report(self.generation, ErrorKind::Source(error)));
                true
            }
        }
    }
}

/// Stabilized position tracking over one fix source
///
/// Dropping the session stops it.
pub struct PositionSession {
    inner: Arc<Inner>,
}

impl PositionSession {
    /// Build a session; invalid configuration is rejected here
    pub fn new(source: Arc<dyn FixSource>, config: PositioningConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let classifier = SampleClassifier::new(config.classifier_thresholds());
        // The fast fix is never judged more strictly than the stream
        let fast_classifier =
            classifier.with_accuracy_limit(config.fast_fix_accuracy_meters.max(config.min_accuracy_meters));
        let state = SessionState {
            stabilizer: build_stabilizer(config.stabilizer, config.process_noise, config.smoothing_factor),
            lock: LockController::new(config.movement_threshold_meters, config.stable_threshold),
            last_accepted: None,
            current: None,
            provisional: false,
            consecutive_rejections: 0,
            fallback_delivered: false,
            run: None,
        };

        Ok(Self {
            inner: Arc::new(Inner {
                source,
                config,
                classifier,
                fast_classifier,
                validator: FixValidator::new(),
                state: Mutex::new(state),
                delivery: Mutex::new(()),
                generation: AtomicU64::new(0),
            }),
        })
    }

    /// Begin consuming fixes
    ///
    /// A refused or absent location capability is not an error: the default
    /// position and a soft error are delivered before this returns, and no
    /// worker is started.
    pub fn start(&self, options: SessionOptions) -> Result<(), SessionError> {
        if let Some(meters) = options.lock_on_accuracy_meters() {
            if !meters.is_finite() || meters <= 0.0 {
                return Err(SessionError::InvalidOption {
                    option: "lock_on_accuracy",
                    reason: format!("{} is not a positive number of meters", meters),
                });
            }
        }

        let inner = &self.inner;
        let mut state = inner.state();
        if state.run.is_some() {
            return Err(SessionError::AlreadyRunning);
        }
        if state.lock.is_locked() {
            return Err(SessionError::Locked);
        }
        state.consecutive_rejections = 0;
        state.fallback_delivered = false;

        if let Err(error) = inner.source.availability() {
            if error.is_denial() {
                warn!(%error, "location unavailable, using default position");
                let notifications = inner.fallback(&mut state, FallbackCause::Source(error), true);
                let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
                drop(state);

                inner.deliver(
                    &options,
                    Batch {
                        generation,
                        notifications,
                        cancel: None,
                    },
                );
                return Ok(());
            }
            debug!(%error, "availability check inconclusive, starting anyway");
        }

        let handle = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        let lock_accuracy_meters = options
            .lock_on_accuracy_meters()
            .unwrap_or(inner.config.target_accuracy_meters);
        state.run = Some(RunHandle {
            generation,
            cancel: cancel.clone(),
            subscription: None,
            lock_accuracy_meters,
        });
        drop(state);

        info!(generation, stabilizer = ?inner.config.stabilizer, lock_accuracy_meters, "position session started");
        let worker = Worker {
            inner: Arc::clone(inner),
            generation,
            cancel,
            options,
        };
        handle.spawn(worker.run());
        Ok(())
    }

    /// Stop consuming fixes; idempotent
    ///
    /// No callback of this session runs after `stop()` returns.
    pub fn stop(&self) {
        let subscription = {
            let mut state = self.inner.state();
            if state.run.is_some() {
                info!("position session stopped");
            }
            self.inner.halt(&mut state)
        };
        self.inner.cancel_subscription(subscription);
        self.inner.wait_for_delivery();
    }

    /// Lock at the last filtered position and stop
    pub fn lock(&self) -> Result<FilteredPosition, SessionError> {
        let (position, subscription) = {
            let mut state = self.inner.state();
            if let Some(locked) = state.lock.locked_position() {
                return Ok(locked.clone());
            }
            let position = state.current.clone().ok_or(SessionError::NoPosition)?;
            state.lock.force_lock(position.clone());
            info!(
                latitude = position.latitude,
                longitude = position.longitude,
                accuracy_m = position.accuracy_meters,
                "position locked on request"
            );
            (position, self.inner.halt(&mut state))
        };
        self.inner.cancel_subscription(subscription);
        self.inner.wait_for_delivery();
        Ok(position)
    }

    /// Return to tracking and reset the stabilizer
    ///
    /// Returns false if the session was not locked. Consumption resumes only
    /// after another `start()`.
    pub fn unlock(&self) -> bool {
        let mut state = self.inner.state();
        if !state.lock.unlock() {
            return false;
        }
        state.stabilizer.reset();
        state.last_accepted = None;
        state.provisional = false;
        state.consecutive_rejections = 0;
        info!("position unlocked, stabilizer reset");
        true
    }

    /// Locked position, else the last filtered position
    pub fn current_position(&self) -> Option<FilteredPosition> {
        let state = self.inner.state();
        state
            .lock
            .locked_position()
            .cloned()
            .or_else(|| state.current.clone())
    }

    pub fn lock_state(&self) -> LockState {
        self.inner.state().lock.state()
    }

    pub fn is_running(&self) -> bool {
        self.inner.state().run.is_some()
    }

    pub fn config(&self) -> &PositioningConfig {
        &self.inner.config
    }
}

impl Drop for PositionSession {
    fn drop(&mut self) {
        self.stop();
    }
}
