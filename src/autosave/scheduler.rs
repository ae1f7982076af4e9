//! Debounced auto-save scheduler.
//!
//! Each identity owns at most one timer. Scheduling again replaces the timer
//! (and the payload it carries), so a burst of edits turns into a single
//! save with the last edit's contents. While a save for an identity is in
//! flight, new schedules for it are ignored; the next edit after it lands
//! reschedules normally.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;

use super::executor::{SaveExecutor, SaveOutcome};
use super::state::{PendingSave, SaveRegistry};
use crate::classifier::{AcceptAll, FieldValidator};
use crate::errors::SaveError;
use crate::field::{EditableField, Identity, PersistedField};
use crate::gateway::PersistenceGateway;

/// Timing configuration for the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoSaveConfig {
    /// Idle window after the last edit of a persisted field
    pub base_delay: Duration,
    /// Lower bound for the idle window of a new draft
    pub min_new_field_delay: Duration,
    /// Capacity of the event channel
    pub event_capacity: usize,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(800),
            min_new_field_delay: Duration::from_millis(2000),
            event_capacity: 256,
        }
    }
}

impl AutoSaveConfig {
    /// Set the idle window for persisted fields.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the floor of the idle window for new drafts.
    pub fn with_min_new_field_delay(mut self, delay: Duration) -> Self {
        self.min_new_field_delay = delay;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Idle window for a field with this identity.
    ///
    /// Drafts wait at least twice as long as persisted fields, and never less
    /// than `min_new_field_delay`.
    pub fn delay_for(&self, identity: &Identity) -> Duration {
        match identity {
            Identity::Durable(_) => self.base_delay,
            Identity::Placeholder(_) => (self.base_delay * 2).max(self.min_new_field_delay),
        }
    }
}

/// Provides the current list of fields on screen, for sibling checks.
///
/// Called once per save attempt, at the moment the attempt runs.
pub trait FieldSource: Send + Sync {
    fn snapshot(&self) -> Vec<EditableField>;
}

impl<F> FieldSource for F
where
    F: Fn() -> Vec<EditableField> + Send + Sync,
{
    fn snapshot(&self) -> Vec<EditableField> {
        self()
    }
}

/// Source with no siblings.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSiblings;

impl FieldSource for NoSiblings {
    fn snapshot(&self) -> Vec<EditableField> {
        Vec::new()
    }
}

/// What `schedule` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A timer was (re)started
    Scheduled { delay: Duration },
    /// A save for this identity is in flight; nothing was scheduled
    InFlight,
    /// The scheduler has been shut down
    Closed,
}

/// Published after every save attempt that should be visible to the UI.
#[derive(Debug, Clone)]
pub enum SaveEvent {
    Saved {
        /// Identity the save was scheduled under
        identity: Identity,
        field: PersistedField,
        /// Set when a colliding create was redirected to this existing field
        resolved_conflict: Option<i64>,
    },
    Failed {
        identity: Identity,
        error: SaveError,
    },
}

impl SaveEvent {
    pub fn identity(&self) -> &Identity {
        match self {
            Self::Saved { identity, .. } | Self::Failed { identity, .. } => identity,
        }
    }
}

struct Inner<G: PersistenceGateway> {
    gateway: Arc<G>,
    collection: String,
    config: AutoSaveConfig,
    validator: Arc<dyn FieldValidator>,
    source: Arc<dyn FieldSource>,
    registry: Mutex<SaveRegistry>,
    events: broadcast::Sender<SaveEvent>,
    next_generation: AtomicU64,
}

/// Removes the identity from the in-flight set when the save ends, however it ends.
struct InFlightGuard<'a, G: PersistenceGateway> {
    inner: &'a Inner<G>,
    identity: Identity,
}

impl<G: PersistenceGateway> Drop for InFlightGuard<'_, G> {
    fn drop(&mut self) {
        self.inner.registry().finish(&self.identity);
    }
}

impl<G: PersistenceGateway> Inner<G> {
    fn registry(&self) -> MutexGuard<'_, SaveRegistry> {
        self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<G: PersistenceGateway + 'static> Inner<G> {
    /// Run one attempt for a field already marked in flight.
    async fn persist(&self, field: EditableField) -> Result<SaveOutcome, SaveError> {
        let _guard = InFlightGuard {
            inner: self,
            identity: field.identity.clone(),
        };
        let siblings = self.source.snapshot();
        let executor = SaveExecutor::new(self.gateway.as_ref(), &self.collection, self.validator.as_ref());
        let result = executor.run(&field, &siblings).await;

        if let Ok(outcome) = &result
            && let Identity::Placeholder(tmp) = &field.identity
        {
            self.registry().promote(tmp.clone(), outcome.field.id);
        }
        result
    }

    /// Log the result and publish it unless it is noise or we are shut down.
    fn publish(&self, identity: &Identity, result: &Result<SaveOutcome, SaveError>) {
        match result {
            Ok(outcome) => {
                tracing::info!(
                    %identity,
                    id = outcome.field.id,
                    operation = ?outcome.operation,
                    resolved_conflict = ?outcome.resolved_conflict,
                    "Field saved"
                );
                self.send(SaveEvent::Saved {
                    identity: identity.clone(),
                    field: outcome.field.clone(),
                    resolved_conflict: outcome.resolved_conflict,
                });
            }
            Err(SaveError::NotEligible(reason)) => {
                tracing::debug!(%identity, %reason, "Skipping save; field not eligible");
            }
            Err(err) if err.is_user_visible(identity) => {
                tracing::error!(%identity, error = %err, "Field save failed");
                self.send(SaveEvent::Failed {
                    identity: identity.clone(),
                    error: err.clone(),
                });
            }
            Err(err) => {
                tracing::warn!(%identity, error = %err, "Draft save rejected; not reported");
            }
        }
    }

    fn send(&self, event: SaveEvent) {
        if self.registry().is_closed() {
            tracing::debug!(identity = %event.identity(), "Scheduler closed; dropping save event");
            return;
        }
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn fire(self: Arc<Self>, field: EditableField, generation: u64, delay: Duration) {
        tokio::time::sleep(delay).await;

        if !self.registry().claim_fired(&field.identity, generation) {
            return;
        }
        let identity = field.identity.clone();
        let result = self.persist(field).await;
        self.publish(&identity, &result);
    }
}

/// Builder for [`AutoSaveScheduler`].
pub struct AutoSaveSchedulerBuilder<G: PersistenceGateway> {
    gateway: Arc<G>,
    collection: String,
    config: AutoSaveConfig,
    validator: Arc<dyn FieldValidator>,
    source: Arc<dyn FieldSource>,
}

impl<G: PersistenceGateway + 'static> AutoSaveSchedulerBuilder<G> {
    pub fn config(mut self, config: AutoSaveConfig) -> Self {
        self.config = config;
        self
    }

    pub fn validator(mut self, validator: Arc<dyn FieldValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn source(mut self, source: Arc<dyn FieldSource>) -> Self {
        self.source = source;
        self
    }

    pub fn build(self) -> AutoSaveScheduler<G> {
        let (events, _) = broadcast::channel(self.config.event_capacity.max(1));
        AutoSaveScheduler {
            inner: Arc::new(Inner {
                gateway: self.gateway,
                collection: self.collection,
                config: self.config,
                validator: self.validator,
                source: self.source,
                registry: Mutex::new(SaveRegistry::default()),
                events,
                next_generation: AtomicU64::new(1),
            }),
        }
    }
}

/// Debounces field edits into saves against one collection.
///
/// Must be used from within a tokio runtime. Dropping the scheduler cancels
/// every pending timer; saves already in flight finish but their results are
/// not published.
pub struct AutoSaveScheduler<G: PersistenceGateway + 'static> {
    inner: Arc<Inner<G>>,
}

impl<G: PersistenceGateway + 'static> AutoSaveScheduler<G> {
    pub fn builder(gateway: Arc<G>, collection: impl Into<String>) -> AutoSaveSchedulerBuilder<G> {
        AutoSaveSchedulerBuilder {
            gateway,
            collection: collection.into(),
            config: AutoSaveConfig::default(),
            validator: Arc::new(AcceptAll),
            source: Arc::new(NoSiblings),
        }
    }

    /// Scheduler with default validator, no siblings and the given timing.
    pub fn new(gateway: Arc<G>, collection: impl Into<String>, config: AutoSaveConfig) -> Self {
        Self::builder(gateway, collection).config(config).build()
    }

    pub fn config(&self) -> &AutoSaveConfig {
        &self.inner.config
    }

    pub fn collection(&self) -> &str {
        &self.inner.collection
    }

    /// Receive `Saved` and `Failed` events.
    pub fn subscribe(&self) -> broadcast::Receiver<SaveEvent> {
        self.inner.events.subscribe()
    }

    /// (Re)start the debounce timer for `field`.
    pub fn schedule(&self, field: EditableField) -> ScheduleOutcome {
        let mut registry = self.inner.registry();
        if registry.is_closed() {
            return ScheduleOutcome::Closed;
        }
        let field = registry.resolve_field(field);
        if registry.is_in_flight(&field.identity) {
            tracing::debug!(identity = %field.identity, "Save in flight; ignoring edit");
            return ScheduleOutcome::InFlight;
        }

        let delay = self.inner.config.delay_for(&field.identity);
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let identity = field.identity.clone();
        let handle = tokio::spawn(Arc::clone(&self.inner).fire(field, generation, delay));
        registry.replace_pending(identity.clone(), PendingSave { generation, handle });

        tracing::debug!(%identity, delay_ms = delay.as_millis() as u64, "Save scheduled");
        ScheduleOutcome::Scheduled { delay }
    }

    /// Drop the pending timer for `identity` without saving.
    ///
    /// Returns whether a timer was pending. Calling it again, or when nothing
    /// is pending, does nothing.
    pub fn cancel(&self, identity: &Identity) -> bool {
        let mut registry = self.inner.registry();
        let identity = registry.resolve_identity(identity);
        registry.cancel(&identity)
    }

    /// Drop every pending timer. In-flight saves are left alone.
    pub fn cancel_all(&self) -> usize {
        self.inner.registry().cancel_all()
    }

    /// Save `field` now, skipping the idle window and replacing any pending timer.
    pub async fn flush_now(&self, field: EditableField) -> Result<SaveOutcome, SaveError> {
        let field = {
            let mut registry = self.inner.registry();
            if registry.is_closed() {
                return Err(SaveError::Closed);
            }
            let field = registry.resolve_field(field);
            if !registry.claim_now(&field.identity) {
                return Err(SaveError::AlreadyInFlight(field.identity.to_string()));
            }
            field
        };

        let identity = field.identity.clone();
        let result = self.inner.persist(field).await;
        self.inner.publish(&identity, &result);
        result
    }

    /// Unmount: cancel all timers and stop publishing events.
    pub fn shutdown(&self) -> usize {
        let cancelled = self.inner.registry().close();
        if cancelled > 0 {
            tracing::debug!(cancelled, "Auto-save scheduler shut down with pending saves");
        }
        cancelled
    }

    pub fn is_closed(&self) -> bool {
        self.inner.registry().is_closed()
    }

    pub fn is_pending(&self, identity: &Identity) -> bool {
        let registry = self.inner.registry();
        registry.is_pending(&registry.resolve_identity(identity))
    }

    pub fn is_in_flight(&self, identity: &Identity) -> bool {
        let registry = self.inner.registry();
        registry.is_in_flight(&registry.resolve_identity(identity))
    }

    pub fn pending_count(&self) -> usize {
        self.inner.registry().pending_count()
    }

    /// Durable identity a draft was promoted to, if it has been created.
    pub fn promoted_identity(&self, identity: &Identity) -> Identity {
        self.inner.registry().resolve_identity(identity)
    }
}

impl<G: PersistenceGateway + 'static> Drop for AutoSaveScheduler<G> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
