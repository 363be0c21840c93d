//! # Backend Contract
//!
//! A backend is a capability-gated resource that stores one record. It
//! owns a `PermissionGate` describing what the current user may do with
//! it, and exposes async `get`/`put`/`login` plus a synchronous `logout`.
//!
//! Failures carry optional HTTP-flavoured `status`/`status_text` so the
//! orchestrator can report them and recognise "not found".

use async_trait::async_trait;
use bindery_common::PermissionGate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Rejection from a backend operation
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct BackendError {
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            status_text: None,
            message: message.into(),
        }
    }

    pub fn http(status: u16, status_text: impl Into<String>) -> Self {
        let status_text = status_text.into();
        Self {
            status: Some(status),
            message: format!("HTTP {}: {}", status, status_text),
            status_text: Some(status_text),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: Some(404),
            status_text: Some("Not Found".to_string()),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

/// Raw response of `get`: either text to be parsed or structured data
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    Text(String),
    Data(Value),
}

/// What `put` writes and returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub data: Value,
    pub data_string: String,
}

/// Identity established by `login`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthInfo {
    pub name: String,
}

#[async_trait]
pub trait Backend: Send + Sync + fmt::Debug {
    /// Human readable identifier, used in status messages
    fn id(&self) -> &str;

    fn permissions(&self) -> &PermissionGate;

    /// Resolves once the backend can serve requests
    async fn ready(&self) -> Result<(), BackendError>;

    async fn get(&self) -> Result<Fetched, BackendError>;

    async fn put(&self, record: StoredRecord) -> Result<StoredRecord, BackendError>;

    /// Authenticate if needed. `None` means no identity is involved.
    async fn login(&self) -> Result<Option<AuthInfo>, BackendError>;

    fn logout(&self);
}
