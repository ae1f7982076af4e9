//! Debounced auto-save for editable fields.
//!
//! Edits are coalesced per field identity: every `schedule` call restarts that
//! identity's idle timer, and only when the timer expires is the field
//! classified and sent to the backend.
//!
//! ## Architecture
//!
//! 1. **State** - per-identity timers, in-flight set and placeholder promotions
//! 2. **Executor** - one save attempt: classify, create or update, resolve name collisions
//! 3. **Scheduler** - owns the timers, runs the executor and publishes [`SaveEvent`]s
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fieldsync::autosave::{AutoSaveConfig, AutoSaveScheduler, SaveEvent};
//! use fieldsync::config::GatewaySettings;
//! use fieldsync::field::{EditableField, FieldKind};
//! use fieldsync::gateway::HttpGateway;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let gateway = Arc::new(HttpGateway::new(&GatewaySettings::new("https://crm.example.com/api"))?);
//! let scheduler = AutoSaveScheduler::new(gateway, "pipeline-7", AutoSaveConfig::default());
//! let mut events = scheduler.subscribe();
//!
//! scheduler.schedule(EditableField::draft("Revenue", Some(FieldKind::Number)));
//!
//! if let SaveEvent::Failed { error, .. } = events.recv().await? {
//!     eprintln!("save failed: {error}");
//! }
//! # Ok(())
//! # }
//! ```

mod executor;
mod scheduler;
mod state;

pub use executor::{SaveExecutor, SaveOperation, SaveOutcome};
pub use scheduler::{
    AutoSaveConfig, AutoSaveScheduler, AutoSaveSchedulerBuilder, FieldSource, NoSiblings,
    SaveEvent, ScheduleOutcome,
};
