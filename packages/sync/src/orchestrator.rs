//! # Sync Orchestrator
//!
//! Drives an `EditSession` against a storage backend and an optional
//! read-only source backend.
//!
//! ## Permission wiring
//!
//! Permission reactions run synchronously inside `PermissionGate::set`, so
//! they only enqueue a `Signal`. `process_signals` drains the queue and does
//! the actual work (loading, toggling edit mode, exposing affordances):
//!
//! ```text
//! gate.set(..) ──reaction──→ mpsc ──process_signals──→ load / edit / done
//!                                                     affordances
//! debouncer ──fire──────────→ mpsc ──process_signals──→ save
//! ```
//!
//! ## Ordering
//!
//! `save` folds soft deletions into the payload (they are excluded from
//! `get_data`), waits for the backend to confirm, and only then commits the
//! tree. A rejected write leaves every dirty flag as it was.

use crate::backend::{Backend, BackendError, Fetched, StoredRecord};
use crate::config::AppConfig;
use crate::debounce::Debouncer;
use crate::errors::{LoadOutcome, SyncError};
use crate::notices::Notices;
use bindery_common::{Action, PermissionGate};
use bindery_editor::{parse_data_string, EditSession, Schema, Surface, Tree};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, instrument, warn};

const CLEAR_PROMPT: &str = "This will delete all your data. Are you sure?";

/// Backend operation currently in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Loading,
    Saving,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Loading => "Loading",
            Status::Saving => "Saving",
        }
    }
}

/// Notifications published to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Loaded,
    Saved { data: Value, data_string: String },
    Login { backend: String, name: String },
    Logout { backend: String },
    DataChange { path: String },
}

/// Which user-facing actions are currently offered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Affordances {
    pub edit: bool,
    pub save: bool,
    pub revert: bool,
    pub clear: bool,
    pub login: bool,
    pub logout: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Load,
    LoadComplete,
    Editable(bool),
    Savable(bool),
    Clearable(bool),
    Loginable(bool),
    PermissionChanged,
    AutoSaveAllowed(bool),
    AutoSaveDue,
}

fn emit_signal(tx: &mpsc::UnboundedSender<Signal>, signal: Signal) -> impl Fn() + Send + Sync {
    let tx = tx.clone();
    move || {
        let _ = tx.send(signal);
    }
}

#[derive(Debug)]
pub struct SyncOrchestrator {
    config: AppConfig,
    session: EditSession,
    storage: Option<Arc<dyn Backend>>,
    source: Option<Arc<dyn Backend>>,
    permissions: PermissionGate,
    signal_tx: mpsc::UnboundedSender<Signal>,
    signal_rx: mpsc::UnboundedReceiver<Signal>,
    events: broadcast::Sender<SyncEvent>,
    notices: Notices,
    status: Option<Status>,
    affordances: Affordances,
    permission_summary: String,
    needs_edit: bool,
    login: Option<(String, String)>,
    autosave: Option<Debouncer>,
    autosave_allowed: bool,
    last_saved: Option<DateTime<Utc>>,
}

impl SyncOrchestrator {
    /// Wire `session` to its backends. Reactions that hold immediately are
    /// queued; call `process_signals` to act on them.
    pub fn new(
        config: AppConfig,
        session: EditSession,
        storage: Option<Arc<dyn Backend>>,
        source: Option<Arc<dyn Backend>>,
    ) -> Self {
        let permissions = storage
            .as_ref()
            .map(|backend| backend.permissions().clone())
            .unwrap_or_default();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(64);
        let needs_edit = session.needs_edit();
        let notices = Notices::new(config.notice_timeout());

        let mut orchestrator = Self {
            config,
            session,
            storage,
            source,
            permissions,
            signal_tx,
            signal_rx,
            events,
            notices,
            status: None,
            affordances: Affordances::default(),
            permission_summary: String::new(),
            needs_edit,
            login: None,
            autosave: None,
            autosave_allowed: false,
            last_saved: None,
        };
        orchestrator.wire();
        orchestrator
    }

    /// Build the tree from `schema` and the backends named in `config`
    pub fn open(config: AppConfig, schema: &Schema, dir: &Path) -> Result<Self, SyncError> {
        let tree = Tree::build(schema, Surface::new(config.fade()))?;
        let storage = config.storage_spec().build(dir);
        let source = config.source_spec().build(dir);
        Ok(Self::new(config, EditSession::new(tree), storage, source))
    }

    fn wire(&mut self) {
        let gate = self.permissions.clone();
        let tx = &self.signal_tx;

        self.permission_summary = gate.summary();
        let changed = emit_signal(tx, Signal::PermissionChanged);
        gate.on_change(move |_, _| changed());

        gate.can_or(
            &[Action::Edit, Action::Add, Action::Delete],
            emit_signal(tx, Signal::Editable(true)),
            emit_signal(tx, Signal::Editable(false)),
        );

        if self.needs_edit {
            gate.can_or(
                &[Action::Save],
                emit_signal(tx, Signal::Savable(true)),
                emit_signal(tx, Signal::Savable(false)),
            );
        }

        gate.can(&[Action::Delete], emit_signal(tx, Signal::Clearable(true)));
        gate.cannot(
            &[Action::Delete, Action::Edit],
            emit_signal(tx, Signal::Clearable(false)),
        );

        gate.can_or(
            &[Action::Login],
            emit_signal(tx, Signal::Loginable(true)),
            emit_signal(tx, Signal::Loginable(false)),
        );

        if self.storage.is_some() || self.source.is_some() {
            if let (None, Some(source)) = (&self.storage, &self.source) {
                let mirror = gate.clone();
                source
                    .permissions()
                    .can(&[Action::Read], move || mirror.set(Action::Read, true));
            }
            gate.can(&[Action::Read], emit_signal(tx, Signal::Load));
        } else {
            gate.on(&[Action::Read, Action::Edit]);
            let _ = self.signal_tx.send(Signal::LoadComplete);
        }
    }

    /// Act on every queued permission or timer signal
    pub async fn process_signals(&mut self) -> Result<(), SyncError> {
        while let Ok(signal) = self.signal_rx.try_recv() {
            self.handle(signal).await?;
        }
        Ok(())
    }

    /// Wait for the next signal, then drain the queue
    pub async fn next_signal(&mut self) -> Result<(), SyncError> {
        if let Some(signal) = self.signal_rx.recv().await {
            self.handle(signal).await?;
        }
        self.process_signals().await
    }

    async fn handle(&mut self, signal: Signal) -> Result<(), SyncError> {
        debug!(?signal, "Handling signal");

        match signal {
            Signal::Load => {
                if let Err(e) = self.load().await {
                    warn!(error = %e, "Load skipped");
                }
            }
            Signal::LoadComplete => {
                self.emit(SyncEvent::Loaded);
                self.after_load();
            }
            Signal::Editable(true) => {
                self.affordances.edit = true;
                if self.config.auto_edit && !self.session.is_editing() {
                    self.session.edit()?;
                }
            }
            Signal::Editable(false) => {
                self.affordances.edit = false;
                if self.session.is_editing() {
                    self.session.done()?;
                }
            }
            Signal::Savable(value) => {
                self.affordances.save = value;
                self.affordances.revert = value;
            }
            Signal::Clearable(value) => self.affordances.clear = value,
            Signal::Loginable(value) => self.affordances.login = value,
            Signal::PermissionChanged => self.permission_summary = self.permissions.summary(),
            Signal::AutoSaveAllowed(value) => {
                self.autosave_allowed = value;
                if !value {
                    if let Some(debouncer) = &self.autosave {
                        debouncer.cancel();
                    }
                }
            }
            Signal::AutoSaveDue => {
                if self.autosave_allowed {
                    if let Err(e) = self.save().await {
                        warn!(error = %e, "Auto-save failed");
                    }
                }
            }
        }
        Ok(())
    }

    /// Without an edit affordance, changes are saved after a quiet window
    fn after_load(&mut self) {
        if self.needs_edit || self.autosave.is_some() {
            return;
        }

        let tx = self.signal_tx.clone();
        self.autosave = Some(Debouncer::spawn(self.config.autosave_delay(), move || {
            let _ = tx.send(Signal::AutoSaveDue);
        }));

        self.permissions.can_or(
            &[Action::Save],
            emit_signal(&self.signal_tx, Signal::AutoSaveAllowed(true)),
            emit_signal(&self.signal_tx, Signal::AutoSaveAllowed(false)),
        );
        debug!(delay_ms = self.config.autosave_delay_ms, "Auto-save armed");
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.events.send(event);
    }

    fn begin(&mut self, status: Status) -> Result<(), SyncError> {
        if let Some(current) = self.status {
            return Err(SyncError::InProgress(current.as_str()));
        }
        self.status = Some(status);
        Ok(())
    }

    /// Fetch and render data from storage, falling back to the source
    #[instrument(skip(self), fields(id = %self.config.id))]
    pub async fn load(&mut self) -> Result<LoadOutcome, SyncError> {
        self.begin(Status::Loading)?;
        let outcome = self.fetch_and_render().await;
        self.status = None;

        self.emit(SyncEvent::Loaded);
        self.after_load();

        if let Ok(outcome) = &outcome {
            info!(?outcome, "Load finished");
        }
        outcome
    }

    async fn fetch_and_render(&mut self) -> Result<LoadOutcome, SyncError> {
        let Some(primary) = self.storage.clone().or_else(|| self.source.clone()) else {
            return Ok(LoadOutcome::Empty);
        };

        let mut response = fetch(primary.as_ref()).await;
        if let Err(e) = &response {
            if let Some(source) = self
                .source
                .clone()
                .filter(|source| !Arc::ptr_eq(source, &primary))
            {
                debug!(error = %e, source = source.id(), "Retrying with source");
                response = fetch(source.as_ref()).await;
            }
        }

        let text = match response {
            Ok(Fetched::Text(text)) | Ok(Fetched::Data(Value::String(text))) => text,
            Ok(Fetched::Data(data)) => {
                self.session.render(Some(&data))?;
                return Ok(LoadOutcome::Loaded);
            }
            Err(e) if e.is_not_found() => {
                self.session.render(None)?;
                return Ok(LoadOutcome::Empty);
            }
            Err(e) => {
                let error = SyncError::from_backend(e.clone(), "The data could not be loaded.");
                self.notices
                    .error("The data could not be loaded.", &e.to_string());
                return Ok(LoadOutcome::Failed(error));
            }
        };

        match parse_data_string(&text) {
            Ok(Some(data)) => {
                self.session.render(Some(&data))?;
                Ok(LoadOutcome::Loaded)
            }
            Ok(None) => {
                self.session.render(None)?;
                Ok(LoadOutcome::Empty)
            }
            Err(e) => {
                self.notices.error(
                    SyncError::DataCorrupted(e.to_string()).to_string(),
                    &e.to_string(),
                );
                self.session.render(None)?;
                Ok(LoadOutcome::Corrupted)
            }
        }
    }

    /// Write the current data to storage. `None` when there is no storage.
    pub async fn store(&mut self) -> Result<Option<StoredRecord>, SyncError> {
        let (data, data_string) = self.session.snapshot()?;
        self.store_record(StoredRecord { data, data_string }).await
    }

    #[instrument(skip(self, record), fields(id = %self.config.id))]
    async fn store_record(&mut self, record: StoredRecord) -> Result<Option<StoredRecord>, SyncError> {
        let Some(storage) = self.storage.clone() else {
            return Ok(None);
        };
        self.begin(Status::Saving)?;

        let result = match self.authenticate(storage.as_ref()).await {
            Ok(()) => storage.put(record).await,
            Err(e) => Err(e),
        };
        self.status = None;

        match result {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                let error = SyncError::transport(e.clone(), "Problem saving data");
                self.notices.error(error.to_string(), &e.to_string());
                Err(error)
            }
        }
    }

    /// Store, then commit the tree once the backend has confirmed
    pub async fn save(&mut self) -> Result<Option<StoredRecord>, SyncError> {
        let previous = self.session.begin_save();

        let stored = match self.store().await {
            Ok(Some(record)) => record,
            Ok(None) => {
                self.session.abort_save(previous);
                return Ok(None);
            }
            Err(e) => {
                self.session.abort_save(previous);
                return Err(e);
            }
        };

        self.emit(SyncEvent::Saved {
            data: stored.data.clone(),
            data_string: stored.data_string.clone(),
        });
        self.last_saved = Some(Utc::now());
        self.session.commit()?;

        info!(bytes = stored.data_string.len(), "Saved");
        Ok(Some(stored))
    }

    /// Discard local edits. Never touches a backend.
    pub fn revert(&mut self) -> Result<(), SyncError> {
        Ok(self.session.revert()?)
    }

    /// Store an empty record, then empty the tree. Requires `delete`.
    pub async fn clear<F>(&mut self, confirm: F) -> Result<bool, SyncError>
    where
        F: FnOnce(&str) -> bool,
    {
        if !self.permissions.is(Action::Delete) || !confirm(CLEAR_PROMPT) {
            return Ok(false);
        }

        self.store_record(StoredRecord {
            data: Value::Null,
            data_string: "null".to_string(),
        })
        .await?;
        self.session.clear()?;
        Ok(true)
    }

    /// Enter edit mode if editing is offered
    pub fn edit(&mut self) -> Result<bool, SyncError> {
        if !self.affordances.edit {
            return Ok(false);
        }
        self.session.edit()?;
        Ok(true)
    }

    pub fn done(&mut self) -> Result<(), SyncError> {
        Ok(self.session.done()?)
    }

    /// Set a primitive by path, scheduling an auto-save when one is armed
    pub fn set_value(&mut self, path: &str, value: Value) -> Result<bool, SyncError> {
        let changed = self.session.set_value(path, value)?;
        if !changed {
            return Ok(false);
        }

        self.emit(SyncEvent::DataChange {
            path: path.to_string(),
        });

        let node = self.session.tree().resolve(path)?;
        if self.autosave_allowed && !self.session.in_editing_branch(node) {
            if let Some(debouncer) = &self.autosave {
                debouncer.poke();
            }
        }
        Ok(true)
    }

    async fn authenticate(&mut self, storage: &dyn Backend) -> Result<(), BackendError> {
        if let Some(info) = storage.login().await? {
            let backend = storage.id().to_string();
            let already = self
                .login
                .as_ref()
                .map_or(false, |(b, name)| *b == backend && *name == info.name);

            if !already {
                self.login = Some((backend.clone(), info.name.clone()));
                self.affordances.logout = true;
                self.affordances.login = self.permissions.is(Action::Login);
                info!(backend = %backend, name = %info.name, "Logged in");
                self.emit(SyncEvent::Login {
                    backend,
                    name: info.name,
                });
            }
        }
        Ok(())
    }

    /// Log in to storage. Returns whether a user is now logged in.
    pub async fn login(&mut self) -> Result<bool, SyncError> {
        let Some(storage) = self.storage.clone() else {
            return Ok(false);
        };

        if let Err(e) = self.authenticate(storage.as_ref()).await {
            let error = SyncError::transport(e.clone(), "Problem logging in");
            self.notices.error(error.to_string(), &e.to_string());
            return Err(error);
        }
        self.process_signals().await?;
        Ok(self.login.is_some())
    }

    pub async fn logout(&mut self) -> Result<(), SyncError> {
        let Some(storage) = self.storage.clone() else {
            return Ok(());
        };

        storage.logout();
        self.login = None;
        self.affordances.logout = false;
        self.emit(SyncEvent::Logout {
            backend: storage.id().to_string(),
        });
        self.process_signals().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut EditSession {
        &mut self.session
    }

    pub fn permissions(&self) -> &PermissionGate {
        &self.permissions
    }

    /// Space-separated granted permissions, updated as signals are processed
    pub fn permission_summary(&self) -> &str {
        &self.permission_summary
    }

    pub fn affordances(&self) -> Affordances {
        self.affordances
    }

    pub fn status(&self) -> Option<Status> {
        self.status
    }

    /// "Logged in to <backend> as <name>", while logged in
    pub fn status_line(&self) -> Option<String> {
        self.login
            .as_ref()
            .map(|(backend, name)| format!("Logged in to {} as {}", backend, name))
    }

    pub fn needs_edit(&self) -> bool {
        self.needs_edit
    }

    pub fn unsaved_changes(&self) -> bool {
        self.session.unsaved_changes()
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    pub fn notices(&mut self) -> &mut Notices {
        &mut self.notices
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

async fn fetch(backend: &dyn Backend) -> Result<Fetched, BackendError> {
    backend.ready().await?;
    backend.get().await
}
