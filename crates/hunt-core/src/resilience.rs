//! Error resilience: classification, bounded automatic recovery, degradation
//! menus, and a capped rolling error log.
//!
//! Per error kind the manager runs a tiny state machine driven by an attempt
//! counter. `handle` always records the error; if the kind is recoverable and
//! the counter is below the cap, the counter is bumped and the kind's
//! recovery action is spawned on the ambient tokio runtime under a timeout.
//! Attempts are consumed whatever the outcome.
//!
//! In-flight recoveries are tagged with the manager's epoch. Clearing the
//! current error (or ending the session) advances the epoch, so a recovery
//! that finishes afterwards is reported as discarded and changes nothing.
//! Dropping the manager detaches its tasks: they run to completion and their
//! results go nowhere.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::config::ResiliencePolicy;
use crate::error::{
    DegradationOption, ErrorCode, FallbackMechanism, GameError, RecoveryAction, RecoveryError,
    Severity,
};
use crate::time::now_unix_millis;

/// Free-form key/value context attached to a recorded error.
pub type ErrorContext = BTreeMap<String, String>;

/// Immutable log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub error: GameError,
    /// Unix milliseconds.
    pub recorded_at: u64,
    pub context: ErrorContext,
    pub recovery_attempted: bool,
}

/// Fixed-capacity FIFO of error records; the oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct ErrorHistory {
    records: VecDeque<ErrorRecord>,
    capacity: usize,
}

impl ErrorHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, record: ErrorRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ErrorRecord> + ExactSizeIterator {
        self.records.iter()
    }

    pub fn latest(&self) -> Option<&ErrorRecord> {
        self.records.back()
    }
}

/// Counts derived from the current history window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorStatistics {
    pub total: usize,
    pub by_code: BTreeMap<ErrorCode, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
    pub recovery_attempts: usize,
}

impl ErrorStatistics {
    pub fn from_history(history: &ErrorHistory) -> Self {
        let mut stats = ErrorStatistics::default();
        for record in history.iter() {
            stats.total += 1;
            *stats.by_code.entry(record.error.code()).or_default() += 1;
            *stats.by_severity.entry(record.error.severity()).or_default() += 1;
            if record.recovery_attempted {
                stats.recovery_attempts += 1;
            }
        }
        stats
    }
}

/// Host-side implementation of the recovery actions (re-probe GPS, reload
/// map data, reinitialize drivers, purge corrupted data).
#[async_trait]
pub trait RecoveryHandler: Send + Sync {
    async fn perform(&self, action: RecoveryAction) -> Result<(), RecoveryError>;
}

/// Recovery handler that succeeds immediately without doing anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecovery;

#[async_trait]
impl RecoveryHandler for NoopRecovery {
    async fn perform(&self, _action: RecoveryAction) -> Result<(), RecoveryError> {
        Ok(())
    }
}

/// What `handle` did with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Recovery spawned; `attempt` is the 1-based attempt number.
    RecoveryScheduled { action: RecoveryAction, attempt: u32 },
    /// The attempt was consumed but could not be spawned (no runtime).
    RecoveryNotScheduled { action: RecoveryAction, attempt: u32 },
    /// Recoverable kind whose attempts are used up.
    RetriesExhausted,
    /// Kind has no automatic recovery.
    NotRecoverable,
}

/// Result of one finished recovery attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryReport {
    pub code: ErrorCode,
    pub action: RecoveryAction,
    pub attempt: u32,
    pub result: Result<(), RecoveryError>,
    /// The error was cleared or the session ended while this ran.
    pub discarded: bool,
}

impl RecoveryReport {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok() && !self.discarded
    }
}

struct PendingRecovery {
    code: ErrorCode,
    action: RecoveryAction,
    attempt: u32,
    epoch: u64,
    handle: JoinHandle<Result<(), RecoveryError>>,
}

pub struct ErrorResilienceManager {
    policy: ResiliencePolicy,
    handler: Arc<dyn RecoveryHandler>,
    history: ErrorHistory,
    attempts: HashMap<ErrorCode, u32>,
    current: Option<GameError>,
    epoch: u64,
    pending: Vec<PendingRecovery>,
    unscheduled: Vec<RecoveryReport>,
}

impl ErrorResilienceManager {
    pub fn new(policy: ResiliencePolicy, handler: Arc<dyn RecoveryHandler>) -> Self {
        Self {
            history: ErrorHistory::with_capacity(policy.history_capacity),
            policy,
            handler,
            attempts: HashMap::new(),
            current: None,
            epoch: 0,
            pending: Vec::new(),
            unscheduled: Vec::new(),
        }
    }

    /// Default policy with the no-op recovery handler.
    pub fn with_defaults() -> Self {
        Self::new(ResiliencePolicy::default(), Arc::new(NoopRecovery))
    }

    pub fn policy(&self) -> &ResiliencePolicy {
        &self.policy
    }

    /// Record `error`, make it current, and start a recovery attempt if the
    /// kind allows one. Never fails and never blocks.
    pub fn handle(&mut self, error: GameError, context: ErrorContext) -> HandleOutcome {
        let code = error.code();
        let action = error.recovery_action();
        let used = self.attempts(code);
        let attempt_recovery = action.is_some() && used < self.policy.max_attempts;

        tracing::warn!(
            code = %code,
            severity = ?error.severity(),
            attempts = used,
            "handling error: {error}"
        );

        self.history.push(ErrorRecord {
            error: error.clone(),
            recorded_at: now_unix_millis(),
            context,
            recovery_attempted: attempt_recovery,
        });
        self.current = Some(error);

        let Some(action) = action else {
            return HandleOutcome::NotRecoverable;
        };
        if !attempt_recovery {
            tracing::debug!(code = %code, "recovery attempts exhausted");
            return HandleOutcome::RetriesExhausted;
        }

        let attempt = used + 1;
        self.attempts.insert(code, attempt);
        self.spawn_recovery(code, action, attempt)
    }

    /// `handle` with no extra context.
    pub fn report(&mut self, error: GameError) -> HandleOutcome {
        self.handle(error, ErrorContext::new())
    }

    fn spawn_recovery(
        &mut self,
        code: ErrorCode,
        action: RecoveryAction,
        attempt: u32,
    ) -> HandleOutcome {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(rt) => rt,
            Err(_) => {
                tracing::warn!(code = %code, ?action, "no runtime; recovery attempt counted as failed");
                self.unscheduled.push(RecoveryReport {
                    code,
                    action,
                    attempt,
                    result: Err(RecoveryError::NoRuntime),
                    discarded: false,
                });
                return HandleOutcome::RecoveryNotScheduled { action, attempt };
            }
        };

        let handler = Arc::clone(&self.handler);
        let timeout = self.policy.timeout(action);
        let handle = runtime.spawn(async move {
            match tokio::time::timeout(timeout, handler.perform(action)).await {
                Ok(result) => result,
                Err(_) => Err(RecoveryError::TimedOut(timeout)),
            }
        });

        tracing::debug!(code = %code, ?action, attempt, ?timeout, "recovery scheduled");
        self.pending.push(PendingRecovery {
            code,
            action,
            attempt,
            epoch: self.epoch,
            handle,
        });
        HandleOutcome::RecoveryScheduled { action, attempt }
    }

    /// Wait for every in-flight recovery and apply the results.
    ///
    /// A successful recovery whose epoch is still current clears the current
    /// error if it is of the same kind. Stale results are reported with
    /// `discarded = true` and change nothing.
    pub async fn settle(&mut self) -> Vec<RecoveryReport> {
        let mut reports = std::mem::take(&mut self.unscheduled);

        for pending in std::mem::take(&mut self.pending) {
            let result = match pending.handle.await {
                Ok(result) => result,
                Err(join_err) => {
                    tracing::warn!(code = %pending.code, "recovery task aborted: {join_err}");
                    Err(RecoveryError::Aborted)
                }
            };
            let discarded = pending.epoch != self.epoch;

            match (&result, discarded) {
                (_, true) => {
                    tracing::debug!(code = %pending.code, "discarding stale recovery result");
                }
                (Ok(()), false) => {
                    tracing::info!(code = %pending.code, attempt = pending.attempt, "recovered");
                    if self.current.as_ref().map(GameError::code) == Some(pending.code) {
                        self.current = None;
                    }
                }
                (Err(e), false) => {
                    tracing::warn!(code = %pending.code, attempt = pending.attempt, "{e}");
                }
            }

            reports.push(RecoveryReport {
                code: pending.code,
                action: pending.action,
                attempt: pending.attempt,
                result,
                discarded,
            });
        }
        reports
    }

    /// Number of recoveries still running (or finished but not yet settled).
    pub fn pending_recoveries(&self) -> usize {
        self.pending.len()
    }

    pub fn attempts(&self, code: ErrorCode) -> u32 {
        self.attempts.get(&code).copied().unwrap_or(0)
    }

    pub fn has_exceeded_max_retries(&self, code: ErrorCode) -> bool {
        self.attempts(code) >= self.policy.max_attempts
    }

    /// Explicit caller action, e.g. the player pressing "retry".
    pub fn reset_recovery_attempts(&mut self, code: ErrorCode) {
        self.attempts.remove(&code);
    }

    pub fn current_error(&self) -> Option<&GameError> {
        self.current.as_ref()
    }

    /// Clear the observable error. Counters and history are untouched;
    /// in-flight recoveries become stale.
    pub fn clear_error(&mut self) {
        self.current = None;
        self.invalidate_pending();
    }

    /// Mark every in-flight recovery stale without touching the current error.
    pub fn invalidate_pending(&mut self) {
        self.epoch += 1;
    }

    /// Non-recoverable kinds, and recoverable kinds that ran out of retries,
    /// must be acknowledged by the player.
    pub fn requires_acknowledgement(&self, error: &GameError) -> bool {
        !error.is_recoverable() || self.has_exceeded_max_retries(error.code())
    }

    pub fn degradation_options(&self, error: &GameError) -> &'static [DegradationOption] {
        error.degradation_options()
    }

    pub fn fallback_mechanism(&self, error: &GameError) -> Option<FallbackMechanism> {
        error.fallback_mechanism()
    }

    pub fn history(&self) -> &ErrorHistory {
        &self.history
    }

    pub fn statistics(&self) -> ErrorStatistics {
        ErrorStatistics::from_history(&self.history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingRecovery {
        calls: AtomicUsize,
        fail: bool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl RecoveryHandler for CountingRecovery {
        async fn perform(&self, _action: RecoveryAction) -> Result<(), RecoveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            if self.fail {
                Err(RecoveryError::Failed("device busy".into()))
            } else {
                Ok(())
            }
        }
    }

    struct PanickingRecovery;

    #[async_trait]
    impl RecoveryHandler for PanickingRecovery {
        async fn perform(&self, _action: RecoveryAction) -> Result<(), RecoveryError> {
            panic!("driver exploded");
        }
    }

    fn manager_with(handler: Arc<dyn RecoveryHandler>) -> ErrorResilienceManager {
        ErrorResilienceManager::new(ResiliencePolicy::default(), handler)
    }

    fn ctx(seq: usize) -> ErrorContext {
        [("seq".to_string(), seq.to_string())].into()
    }

    #[tokio::test]
    async fn test_retry_cap_after_five_handles() {
        let handler = Arc::new(CountingRecovery::default());
        let mut mgr = manager_with(handler.clone());

        let mut outcomes = Vec::new();
        for _ in 0..5 {
            outcomes.push(mgr.report(GameError::GpsSignalWeak));
        }
        let reports = mgr.settle().await;

        assert_eq!(mgr.attempts(ErrorCode::GpsSignalWeak), 3);
        assert!(mgr.has_exceeded_max_retries(ErrorCode::GpsSignalWeak));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        assert_eq!(reports.len(), 3);
        assert_eq!(
            outcomes[2],
            HandleOutcome::RecoveryScheduled {
                action: RecoveryAction::ReprobeLocation,
                attempt: 3
            }
        );
        assert_eq!(outcomes[3], HandleOutcome::RetriesExhausted);
        assert_eq!(outcomes[4], HandleOutcome::RetriesExhausted);

        // History keeps logging after exhaustion
        assert_eq!(mgr.history().len(), 5);
        let attempted: Vec<bool> = mgr.history().iter().map(|r| r.recovery_attempted).collect();
        assert_eq!(attempted, vec![true, true, true, false, false]);
    }

    #[tokio::test]
    async fn test_non_recoverable_never_retries() {
        let handler = Arc::new(CountingRecovery::default());
        let mut mgr = manager_with(handler.clone());

        assert_eq!(
            mgr.report(GameError::LocationPermissionDenied),
            HandleOutcome::NotRecoverable
        );
        mgr.settle().await;
        assert_eq!(mgr.attempts(ErrorCode::LocationPermissionDenied), 0);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert!(mgr.requires_acknowledgement(&GameError::LocationPermissionDenied));
        assert_eq!(
            mgr.current_error(),
            Some(&GameError::LocationPermissionDenied)
        );
    }

    #[tokio::test]
    async fn test_successful_recovery_clears_current_error() {
        let mut mgr = manager_with(Arc::new(CountingRecovery::default()));
        mgr.report(GameError::AudioServiceUnavailable);
        assert!(mgr.current_error().is_some());

        let reports = mgr.settle().await;
        assert!(reports[0].succeeded());
        assert!(mgr.current_error().is_none());
    }

    #[tokio::test]
    async fn test_recovery_does_not_clear_a_different_current_error() {
        let mut mgr = manager_with(Arc::new(CountingRecovery::default()));
        mgr.report(GameError::AudioServiceUnavailable);
        mgr.report(GameError::NetworkUnavailable);
        mgr.settle().await;
        assert_eq!(mgr.current_error(), Some(&GameError::NetworkUnavailable));
    }

    #[tokio::test]
    async fn test_failed_recovery_still_consumes_attempt() {
        let handler = Arc::new(CountingRecovery {
            fail: true,
            ..Default::default()
        });
        let mut mgr = manager_with(handler);
        mgr.report(GameError::HapticServiceUnavailable);
        let reports = mgr.settle().await;

        assert_eq!(mgr.attempts(ErrorCode::HapticServiceUnavailable), 1);
        assert!(matches!(reports[0].result, Err(RecoveryError::Failed(_))));
        assert_eq!(
            mgr.current_error(),
            Some(&GameError::HapticServiceUnavailable)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let handler = Arc::new(CountingRecovery {
            delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let mut mgr = manager_with(handler);
        mgr.report(GameError::HapticServiceUnavailable);
        let reports = mgr.settle().await;

        assert_eq!(
            reports[0].result,
            Err(RecoveryError::TimedOut(Duration::from_millis(500)))
        );
        assert_eq!(mgr.attempts(ErrorCode::HapticServiceUnavailable), 1);
    }

    #[tokio::test]
    async fn test_panicking_handler_is_contained() {
        let mut mgr = manager_with(Arc::new(PanickingRecovery));
        mgr.report(GameError::DataCorruption("bad row".into()));
        let reports = mgr.settle().await;
        assert_eq!(reports[0].result, Err(RecoveryError::Aborted));
        assert_eq!(mgr.attempts(ErrorCode::DataCorruption), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_error_discards_in_flight_result() {
        let handler = Arc::new(CountingRecovery {
            delay: Some(Duration::from_millis(100)),
            ..Default::default()
        });
        let mut mgr = manager_with(handler);

        mgr.report(GameError::GpsSignalWeak);
        mgr.clear_error();
        mgr.report(GameError::GpsSignalWeak);

        let reports = mgr.settle().await;
        assert_eq!(reports.len(), 2);
        assert!(reports[0].discarded);
        assert!(!reports[1].discarded);
        assert!(reports[1].succeeded());
        assert!(mgr.current_error().is_none());
        // Clearing never touches counters
        assert_eq!(mgr.attempts(ErrorCode::GpsSignalWeak), 2);
    }

    #[tokio::test]
    async fn test_invalidate_keeps_current_error() {
        let mut mgr = manager_with(Arc::new(CountingRecovery::default()));
        mgr.report(GameError::MapDataCorrupted);
        mgr.invalidate_pending();
        let reports = mgr.settle().await;
        assert!(reports[0].discarded);
        assert_eq!(mgr.current_error(), Some(&GameError::MapDataCorrupted));
    }

    #[test]
    fn test_without_runtime_attempt_is_consumed() {
        let mut mgr = ErrorResilienceManager::with_defaults();
        let outcome = mgr.report(GameError::GpsSignalWeak);
        assert_eq!(
            outcome,
            HandleOutcome::RecoveryNotScheduled {
                action: RecoveryAction::ReprobeLocation,
                attempt: 1
            }
        );
        assert_eq!(mgr.attempts(ErrorCode::GpsSignalWeak), 1);
        assert_eq!(mgr.pending_recoveries(), 0);
    }

    #[test]
    fn test_reset_recovery_attempts() {
        let mut mgr = ErrorResilienceManager::with_defaults();
        for _ in 0..4 {
            mgr.report(GameError::GpsSignalWeak);
        }
        assert!(mgr.requires_acknowledgement(&GameError::GpsSignalWeak));

        mgr.reset_recovery_attempts(ErrorCode::GpsSignalWeak);
        assert_eq!(mgr.attempts(ErrorCode::GpsSignalWeak), 0);
        assert!(!mgr.has_exceeded_max_retries(ErrorCode::GpsSignalWeak));
        assert!(!mgr.requires_acknowledgement(&GameError::GpsSignalWeak));
    }

    #[test]
    fn test_counters_are_per_kind() {
        let mut mgr = ErrorResilienceManager::with_defaults();
        for _ in 0..3 {
            mgr.report(GameError::GpsSignalWeak);
        }
        mgr.report(GameError::DataCorruption("a".into()));
        mgr.report(GameError::DataCorruption("b".into()));
        assert_eq!(mgr.attempts(ErrorCode::GpsSignalWeak), 3);
        assert_eq!(mgr.attempts(ErrorCode::DataCorruption), 2);
        assert_eq!(mgr.attempts(ErrorCode::AudioServiceUnavailable), 0);
    }

    #[test]
    fn test_history_bound_keeps_most_recent() {
        let mut mgr = ErrorResilienceManager::with_defaults();
        for i in 0..150 {
            mgr.handle(GameError::NetworkUnavailable, ctx(i));
        }
        let history = mgr.history();
        assert_eq!(history.len(), 100);
        let seqs: Vec<usize> = history
            .iter()
            .map(|r| r.context["seq"].parse().unwrap())
            .collect();
        assert_eq!(seqs, (50..150).collect::<Vec<_>>());
        assert_eq!(history.latest().unwrap().context["seq"], "149");
    }

    #[test]
    fn test_clear_error_keeps_history_and_counters() {
        let mut mgr = ErrorResilienceManager::with_defaults();
        mgr.report(GameError::GpsSignalWeak);
        mgr.clear_error();
        assert!(mgr.current_error().is_none());
        assert_eq!(mgr.history().len(), 1);
        assert_eq!(mgr.attempts(ErrorCode::GpsSignalWeak), 1);
    }

    #[test]
    fn test_statistics_derived_from_window() {
        let mut mgr = ErrorResilienceManager::with_defaults();
        mgr.report(GameError::GpsSignalWeak);
        mgr.report(GameError::GpsSignalWeak);
        mgr.report(GameError::LocationPermissionDenied);
        mgr.report(GameError::AudioServiceUnavailable);

        let stats = mgr.statistics();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_code[&ErrorCode::GpsSignalWeak], 2);
        assert_eq!(stats.by_severity[&Severity::Critical], 1);
        assert_eq!(stats.by_severity[&Severity::Warning], 2);
        assert_eq!(stats.by_severity[&Severity::Minor], 1);
        assert_eq!(stats.recovery_attempts, 3);
    }

    #[test]
    fn test_history_capacity_from_policy() {
        let policy = ResiliencePolicy {
            history_capacity: 2,
            ..Default::default()
        };
        let mut mgr = ErrorResilienceManager::new(policy, Arc::new(NoopRecovery));
        for i in 0..5 {
            mgr.handle(GameError::NetworkUnavailable, ctx(i));
        }
        assert_eq!(mgr.history().len(), 2);
        assert_eq!(mgr.history().capacity(), 2);
        assert_eq!(mgr.statistics().total, 2);
    }

    #[test]
    fn test_degradation_delegates_to_kind() {
        let mgr = ErrorResilienceManager::with_defaults();
        assert!(mgr
            .degradation_options(&GameError::LocationPermissionDenied)
            .is_empty());
        assert_eq!(
            mgr.fallback_mechanism(&GameError::GpsSignalWeak),
            Some(FallbackMechanism::UseLastKnownLocation)
        );
    }
}
