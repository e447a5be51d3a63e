//! Sessions
//!
//! A session is the explicit owner of every link group used by one
//! interactive client. Groups are created on first reference by name and
//! live until the session closes. There is no process-wide registry: two
//! sessions using the same group name never see each other's state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::config::LinkConfig;
use crate::data::{DataSource, SharedDataset};
use crate::error::{Error, Result};
use crate::group::LinkGroup;
use crate::key::KeyRule;

/// Owner of the link groups of one interactive session.
#[derive(Debug)]
pub struct Session {
    config: LinkConfig,
    groups: DashMap<String, Arc<LinkGroup>>,
    wake: Arc<Notify>,
    closed: AtomicBool,
}

impl Session {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            groups: DashMap::new(),
            wake: Arc::new(Notify::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// The group named `name`, created if this is the first reference.
    pub fn group(&self, name: &str) -> Result<Arc<LinkGroup>> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }
        let group = self
            .groups
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(group = name, "link group created");
                Arc::new(LinkGroup::with_wake(name, &self.config, Arc::clone(&self.wake)))
            })
            .value()
            .clone();
        Ok(group)
    }

    /// The group named `name`, if it already exists.
    pub fn get_group(&self, name: &str) -> Option<Arc<LinkGroup>> {
        self.groups.get(name).map(|g| Arc::clone(g.value()))
    }

    pub fn groups(&self) -> Vec<Arc<LinkGroup>> {
        self.groups.iter().map(|g| Arc::clone(g.value())).collect()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Build a dataset bound to the group named `group`.
    pub fn shared_dataset(
        &self,
        group: &str,
        source: DataSource,
        rule: Option<KeyRule>,
    ) -> Result<SharedDataset> {
        SharedDataset::new(source, rule, self.group(group)?)
    }

    /// Signalled whenever any group queues a delivery, and on close.
    pub fn wake(&self) -> Arc<Notify> {
        Arc::clone(&self.wake)
    }

    /// Deliver everything due at `now` across all groups.
    pub fn flush(&self, now: Instant) -> usize {
        self.groups().iter().map(|g| g.flush(now)).sum()
    }

    /// Earliest pending delivery across all groups.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.groups().iter().filter_map(|g| g.next_deadline()).min()
    }

    /// End the session, closing every group.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        for group in self.groups() {
            group.close();
        }
        self.groups.clear();
        self.wake.notify_one();
        tracing::debug!("session closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(LinkConfig::default())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
