//! In-memory gateway double shared by unit tests.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

use crate::errors::SaveError;
use crate::field::PersistedField;
use crate::gateway::{FieldTypeDefinition, PersistenceGateway};

#[derive(Default)]
struct MockState {
    stored: Vec<PersistedField>,
    creates: Vec<(String, Value)>,
    updates: Vec<(i64, Value)>,
    create_failure: Option<SaveError>,
    update_failure: Option<SaveError>,
    list_failure: Option<SaveError>,
    field_types: Vec<FieldTypeDefinition>,
    next_id: i64,
}

/// Records every call and answers from an in-memory store.
///
/// Creates and updates can be held open with [`MockGateway::hold`] to keep a
/// save in flight until [`MockGateway::release`] is called.
pub struct MockGateway {
    state: Mutex<MockState>,
    list_calls: AtomicUsize,
    type_calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    gate: Option<Semaphore>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_id: 100,
                ..Default::default()
            }),
            list_calls: AtomicUsize::new(0),
            type_calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// A gateway whose writes block until released.
    pub fn hold() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    /// Let one blocked write complete.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn persisted(id: i64, name: &str) -> PersistedField {
        PersistedField {
            id,
            name: name.to_string(),
            display_name: None,
            label: None,
            field_type: Some("text".into()),
            field_config: Default::default(),
            field_group: None,
            updated_at: None,
        }
    }

    pub fn seed(&self, field: PersistedField) {
        self.state.lock().unwrap().stored.push(field);
    }

    pub fn seed_types(&self, types: Vec<FieldTypeDefinition>) {
        self.state.lock().unwrap().field_types = types;
    }

    pub fn fail_creates_with(&self, err: SaveError) {
        self.state.lock().unwrap().create_failure = Some(err);
    }

    pub fn fail_updates_with(&self, err: SaveError) {
        self.state.lock().unwrap().update_failure = Some(err);
    }

    pub fn fail_lists_with(&self, err: SaveError) {
        self.state.lock().unwrap().list_failure = Some(err);
    }

    pub fn creates(&self) -> Vec<(String, Value)> {
        self.state.lock().unwrap().creates.clone()
    }

    pub fn updates(&self) -> Vec<(i64, Value)> {
        self.state.lock().unwrap().updates.clone()
    }

    /// Creates plus updates.
    pub fn write_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.creates.len() + state.updates.len()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn type_calls(&self) -> usize {
        self.type_calls.load(Ordering::SeqCst)
    }

    /// Highest number of writes that were ever running at once.
    pub fn max_concurrent_writes(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

fn field_from_payload(id: i64, payload: &Value) -> PersistedField {
    let mut field = MockGateway::persisted(id, payload["name"].as_str().unwrap_or_default());
    field.field_type = payload["field_type"].as_str().map(str::to_string);
    if let Some(config) = payload["field_config"].as_object() {
        field.field_config = config.clone();
    }
    field
}

#[async_trait]
impl PersistenceGateway for MockGateway {
    async fn create(&self, collection: &str, payload: &Value) -> Result<PersistedField, SaveError> {
        self.enter().await;
        let result = {
            let mut state = self.state.lock().unwrap();
            state.creates.push((collection.to_string(), payload.clone()));
            match state.create_failure.clone() {
                Some(err) => Err(err),
                None => {
                    let id = state.next_id;
                    state.next_id += 1;
                    let field = field_from_payload(id, payload);
                    state.stored.push(field.clone());
                    Ok(field)
                }
            }
        };
        self.leave();
        result
    }

    async fn update(&self, id: i64, payload: &Value) -> Result<PersistedField, SaveError> {
        self.enter().await;
        let result = {
            let mut state = self.state.lock().unwrap();
            state.updates.push((id, payload.clone()));
            match state.update_failure.clone() {
                Some(err) => Err(err),
                None => Ok(field_from_payload(id, payload)),
            }
        };
        self.leave();
        result
    }

    async fn list(&self, _collection: &str) -> Result<Vec<PersistedField>, SaveError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        match state.list_failure.clone() {
            Some(err) => Err(err),
            None => Ok(state.stored.clone()),
        }
    }

    async fn field_types(&self) -> Result<Vec<FieldTypeDefinition>, SaveError> {
        self.type_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().field_types.clone())
    }
}
