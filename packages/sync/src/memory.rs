//! In-memory backend with scriptable failures

use crate::backend::{AuthInfo, Backend, BackendError, Fetched, StoredRecord};
use async_trait::async_trait;
use bindery_common::{Action, PermissionGate};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Default)]
struct MemoryState {
    record: Option<Fetched>,
    user: Option<String>,
    logged_in: bool,
    get_failures: VecDeque<BackendError>,
    put_failures: VecDeque<BackendError>,
    login_failures: VecDeque<BackendError>,
    gets: usize,
    puts: usize,
    logins: usize,
}

/// Backend holding a single record in memory.
///
/// Grants `read`, `edit`, `add`, `delete` and `save`. A backend created
/// `with_user` also grants `login` until someone logs in.
#[derive(Debug)]
pub struct MemoryBackend {
    id: String,
    permissions: PermissionGate,
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new(id: impl Into<String>) -> Self {
        let permissions = PermissionGate::new();
        permissions.on(&[
            Action::Read,
            Action::Edit,
            Action::Add,
            Action::Delete,
            Action::Save,
        ]);

        Self {
            id: id.into(),
            permissions,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// A backend that only grants `read`, like a static data source
    pub fn read_only(id: impl Into<String>) -> Self {
        let backend = Self::new(id);
        backend
            .permissions
            .off(&[Action::Edit, Action::Add, Action::Delete, Action::Save]);
        backend
    }

    pub fn with_data(self, data: Value) -> Self {
        self.state().record = Some(Fetched::Data(data));
        self
    }

    /// Serve `text` verbatim from `get`
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.state().record = Some(Fetched::Text(text.into()));
        self
    }

    /// Require a login as `name`
    pub fn with_user(self, name: impl Into<String>) -> Self {
        self.state().user = Some(name.into());
        self.permissions.set(Action::Login, true);
        self
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn fail_next_get(&self, error: BackendError) {
        self.state().get_failures.push_back(error);
    }

    pub fn fail_next_put(&self, error: BackendError) {
        self.state().put_failures.push_back(error);
    }

    pub fn fail_next_login(&self, error: BackendError) {
        self.state().login_failures.push_back(error);
    }

    /// Currently stored structured data, if any
    pub fn data(&self) -> Option<Value> {
        match &self.state().record {
            Some(Fetched::Data(data)) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn get_count(&self) -> usize {
        self.state().gets
    }

    pub fn put_count(&self) -> usize {
        self.state().puts
    }

    pub fn login_count(&self) -> usize {
        self.state().logins
    }

    pub fn is_logged_in(&self) -> bool {
        self.state().logged_in
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn permissions(&self) -> &PermissionGate {
        &self.permissions
    }

    async fn ready(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn get(&self) -> Result<Fetched, BackendError> {
        let mut state = self.state();
        state.gets += 1;

        if let Some(error) = state.get_failures.pop_front() {
            return Err(error);
        }
        state
            .record
            .clone()
            .ok_or_else(|| BackendError::not_found(format!("{} holds no data", self.id)))
    }

    async fn put(&self, record: StoredRecord) -> Result<StoredRecord, BackendError> {
        let mut state = self.state();
        state.puts += 1;

        if let Some(error) = state.put_failures.pop_front() {
            return Err(error);
        }
        state.record = Some(Fetched::Data(record.data.clone()));

        debug!(backend = %self.id, bytes = record.data_string.len(), "Record stored");
        Ok(record)
    }

    async fn login(&self) -> Result<Option<AuthInfo>, BackendError> {
        let name = {
            let mut state = self.state();
            state.logins += 1;

            if let Some(error) = state.login_failures.pop_front() {
                return Err(error);
            }
            let Some(name) = state.user.clone() else {
                return Ok(None);
            };
            state.logged_in = true;
            name
        };

        self.permissions.set(Action::Login, false);
        Ok(Some(AuthInfo { name }))
    }

    fn logout(&self) {
        let has_user = {
            let mut state = self.state();
            state.logged_in = false;
            state.user.is_some()
        };
        if has_user {
            self.permissions.set(Action::Login, true);
        }
    }
}
