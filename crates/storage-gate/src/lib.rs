mod bridge;
pub mod config;
pub mod gateway;

pub use crate::config::{
    default_policy_file, load_policy_from_path, load_policy_from_reader, parse_policy_str,
    ConfigError, OriginPolicy, StoragePolicyFile, StoragePolicyTemplate,
};
pub use bridge::CompletionBridge;
pub use gateway::{
    StorageBackend, StorageCallbacks, StorageGateway, DATABASE_LISTING_SUBJECT,
    PERMISSION_DENIED_MESSAGE,
};

use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::broadcast;
use tracing::warn;

use driftbrowser_core_types::SecurityOrigin;
use driftbrowser_worker_loop::{RunOutcome, TaskDispatcher, WorkerRunLoop};

/// Base tag for wait-channel ids; a loop-unique counter is appended per call.
const ALLOW_STORAGE_CHANNEL: &str = "allow-storage-";

/// Predicate deciding whether a named storage subject may be accessed.
///
/// Implementations are consulted on the main thread only.
pub trait PermissionAuthority: Send + Sync {
    fn allow_storage(&self, subject: &str) -> bool;
}

/// The gate's view of the worker that is asking: its run loop, a way onto
/// the main thread, and the (optional) authority of its owning context.
#[derive(Clone)]
pub struct StorageContext {
    run_loop: Arc<WorkerRunLoop>,
    main_thread: Arc<dyn TaskDispatcher>,
    authority: Option<Arc<dyn PermissionAuthority>>,
}

impl StorageContext {
    pub fn new(
        run_loop: Arc<WorkerRunLoop>,
        main_thread: Arc<dyn TaskDispatcher>,
        authority: Option<Arc<dyn PermissionAuthority>>,
    ) -> Self {
        Self {
            run_loop,
            main_thread,
            authority,
        }
    }

    pub fn run_loop(&self) -> Arc<WorkerRunLoop> {
        Arc::clone(&self.run_loop)
    }

    pub fn authority(&self) -> Option<&Arc<dyn PermissionAuthority>> {
        self.authority.as_ref()
    }
}

/// How a decision was reached.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DecisionSource {
    /// The authority answered on the main thread.
    Authority,
    /// The owning context exposes no authority.
    AuthorityAbsent,
    /// The worker loop was torn down before an answer arrived.
    LoopTerminated,
}

/// Event emitted for every decision the gate hands back.
#[derive(Clone, Debug)]
pub struct AuditEvent {
    pub subject: String,
    pub origin: SecurityOrigin,
    pub allowed: bool,
    pub source: DecisionSource,
    pub timestamp: SystemTime,
}

/// Synchronous storage permission gate for worker threads.
///
/// `check` blocks the calling worker inside a restricted-mode run of its own
/// loop until the main thread answers or the loop is torn down, and collapses
/// every failure mode into a plain denial.
pub struct StorageGate {
    events: broadcast::Sender<AuditEvent>,
}

impl StorageGate {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(128);
        Self { events: tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.events.subscribe()
    }

    /// Asks the owning context's authority whether `subject` may be opened.
    ///
    /// Returns `true` only on an affirmative grant. Absence of an authority
    /// and loop teardown both surface as `false`, never as an error. Exactly
    /// one authority round trip; no timeout and no retry.
    pub fn check(&self, cx: &StorageContext, subject: &str, origin: &SecurityOrigin) -> bool {
        let Some(authority) = cx.authority.as_ref() else {
            self.publish(subject, origin, false, DecisionSource::AuthorityAbsent);
            return false;
        };

        let channel = cx.run_loop.next_channel_id(ALLOW_STORAGE_CHANNEL);
        let bridge = CompletionBridge::submit(
            Arc::downgrade(authority),
            cx.main_thread.as_ref(),
            cx.run_loop(),
            subject,
            &channel,
        );

        // Either the bridge wakes this channel, or the queue gets torn down.
        match cx.run_loop.run_restricted(&channel) {
            RunOutcome::Terminated => {
                bridge.cancel();
                self.publish(subject, origin, false, DecisionSource::LoopTerminated);
                false
            }
            RunOutcome::TaskRun => {
                let allowed = bridge.result();
                self.publish(subject, origin, allowed, DecisionSource::Authority);
                allowed
            }
        }
    }

    fn publish(
        &self,
        subject: &str,
        origin: &SecurityOrigin,
        allowed: bool,
        source: DecisionSource,
    ) {
        let event = AuditEvent {
            subject: subject.to_string(),
            origin: origin.clone(),
            allowed,
            source,
            timestamp: SystemTime::now(),
        };
        if let Err(err) = self.events.send(event) {
            warn!(target: "storage_gate", "failed to publish audit event: {err}");
        }
    }
}

impl Default for StorageGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Authority resolved from a declarative policy file for one origin.
///
/// The origin rule with the longest matching pattern overrides the defaults;
/// deny patterns win over allow patterns.
pub struct PolicyAuthority {
    allow: Vec<String>,
    deny: Vec<String>,
}

impl PolicyAuthority {
    pub fn for_origin(file: &StoragePolicyFile, origin: &SecurityOrigin) -> Self {
        let mut template = file.defaults.clone();
        let mut best_match_len = 0usize;

        for rule in &file.origins {
            if pattern_matches(&rule.match_pattern, origin.as_str())
                && rule.match_pattern.len() >= best_match_len
            {
                best_match_len = rule.match_pattern.len();
                if let Some(allow) = &rule.allow {
                    template.allow = allow.clone();
                }
                if let Some(deny) = &rule.deny {
                    template.deny = deny.clone();
                }
            }
        }

        Self {
            allow: template.allow,
            deny: template.deny,
        }
    }
}

impl PermissionAuthority for PolicyAuthority {
    fn allow_storage(&self, subject: &str) -> bool {
        if self
            .deny
            .iter()
            .any(|pattern| pattern_matches(pattern, subject))
        {
            return false;
        }
        self.allow
            .iter()
            .any(|pattern| pattern_matches(pattern, subject))
    }
}

fn pattern_matches(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if pattern.contains('*') {
        let parts: Vec<&str> = pattern.split('*').collect();
        if parts.len() == 2 {
            let prefix = parts[0];
            let suffix = parts[1];
            return value.starts_with(prefix) && value.ends_with(suffix);
        }
    }
    value == pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_pattern_matching() {
        assert!(pattern_matches("*", "anything"));
        assert!(pattern_matches("https://*.example.com", "https://pay.example.com"));
        assert!(!pattern_matches("https://*.example.com", "https://example.org"));
        assert!(pattern_matches("inbox", "inbox"));
        assert!(!pattern_matches("inbox", "inbox-2"));
    }
}
