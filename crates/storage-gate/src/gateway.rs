//! Permission-checking façade in front of an opaque storage engine.

use std::sync::Arc;

use driftbrowser_core_types::{DriftError, SecurityOrigin};

use crate::{PermissionAuthority, StorageContext, StorageGate};

/// Message reported to callbacks when a permission check denies access.
pub const PERMISSION_DENIED_MESSAGE: &str = "The user denied permission to access the database.";

/// Subject name used when enumerating databases rather than opening one.
pub const DATABASE_LISTING_SUBJECT: &str = "Database Listing";

/// The engine behind the gateway. Opaque: the gateway only decides whether a
/// call may reach it.
pub trait StorageBackend: Send + Sync {
    fn open(&self, name: &str, origin: &SecurityOrigin) -> Result<(), DriftError>;
    fn delete(&self, name: &str, origin: &SecurityOrigin) -> Result<(), DriftError>;
    fn database_names(&self, origin: &SecurityOrigin) -> Result<Vec<String>, DriftError>;
}

/// Receives the outcome of a gateway call.
pub trait StorageCallbacks {
    /// The gated call reached the engine and completed.
    fn on_success(&self);
    /// Result of a gated `database_names` call.
    fn on_names(&self, names: Vec<String>);
    /// Permission was denied before the engine was consulted.
    fn on_denied(&self, message: &str);
    /// The engine failed after the permission check passed.
    fn on_error(&self, error: DriftError);
}

/// Storage access front door.
///
/// Calls arriving on the main thread consult the authority directly; calls
/// arriving on a worker thread cross to the main thread through the gate and
/// park until it answers.
pub struct StorageGateway {
    gate: StorageGate,
    backend: Arc<dyn StorageBackend>,
    authority: Option<Arc<dyn PermissionAuthority>>,
}

impl StorageGateway {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        authority: Option<Arc<dyn PermissionAuthority>>,
    ) -> Self {
        Self {
            gate: StorageGate::new(),
            backend,
            authority,
        }
    }

    pub fn gate(&self) -> &StorageGate {
        &self.gate
    }

    /// Main-thread open. Denies only when an authority exists and says no.
    pub fn open(&self, name: &str, origin: &SecurityOrigin, callbacks: &dyn StorageCallbacks) {
        if !self.allowed_here(name) {
            callbacks.on_denied(PERMISSION_DENIED_MESSAGE);
            return;
        }
        match self.backend.open(name, origin) {
            Ok(()) => callbacks.on_success(),
            Err(err) => callbacks.on_error(err),
        }
    }

    /// Main-thread delete.
    pub fn delete(&self, name: &str, origin: &SecurityOrigin, callbacks: &dyn StorageCallbacks) {
        if !self.allowed_here(name) {
            callbacks.on_denied(PERMISSION_DENIED_MESSAGE);
            return;
        }
        match self.backend.delete(name, origin) {
            Ok(()) => callbacks.on_success(),
            Err(err) => callbacks.on_error(err),
        }
    }

    /// Main-thread database enumeration, gated under the fixed listing
    /// subject.
    pub fn database_names(&self, origin: &SecurityOrigin, callbacks: &dyn StorageCallbacks) {
        if !self.allowed_here(DATABASE_LISTING_SUBJECT) {
            callbacks.on_denied(PERMISSION_DENIED_MESSAGE);
            return;
        }
        match self.backend.database_names(origin) {
            Ok(names) => callbacks.on_names(names),
            Err(err) => callbacks.on_error(err),
        }
    }

    /// Worker-thread open: parks the calling worker on its wait channel until
    /// the main thread answers.
    pub fn open_from_worker(
        &self,
        cx: &StorageContext,
        name: &str,
        origin: &SecurityOrigin,
        callbacks: &dyn StorageCallbacks,
    ) {
        if !self.gate.check(cx, name, origin) {
            callbacks.on_denied(PERMISSION_DENIED_MESSAGE);
            return;
        }
        match self.backend.open(name, origin) {
            Ok(()) => callbacks.on_success(),
            Err(err) => callbacks.on_error(err),
        }
    }

    /// Worker-thread delete.
    pub fn delete_from_worker(
        &self,
        cx: &StorageContext,
        name: &str,
        origin: &SecurityOrigin,
        callbacks: &dyn StorageCallbacks,
    ) {
        if !self.gate.check(cx, name, origin) {
            callbacks.on_denied(PERMISSION_DENIED_MESSAGE);
            return;
        }
        match self.backend.delete(name, origin) {
            Ok(()) => callbacks.on_success(),
            Err(err) => callbacks.on_error(err),
        }
    }

    fn allowed_here(&self, subject: &str) -> bool {
        match &self.authority {
            Some(authority) => authority.allow_storage(subject),
            None => true,
        }
    }
}
