//! Caller-supplied lifecycle callbacks.

use crate::record::{DataNode, Record};
use std::fmt;
use std::ops::ControlFlow;

type BeforeFn<'h> = Box<dyn FnMut(&str, DataNode) -> DataNode + 'h>;
type AfterFn<'h> = Box<dyn FnMut(&Record, &DataNode) + 'h>;
type SyncingFn<'h> = Box<dyn FnMut(&Record, &DataNode) -> ControlFlow<()> + 'h>;
type SyncedFn<'h> = Box<dyn FnMut(&Record) + 'h>;

/// Callbacks invoked by one `save_and_sync_with` call.
///
/// `on_before_sync` and `on_after_sync` run for every node, after the
/// entity type's own hooks. `on_syncing` and `on_synced` run once, for the
/// root; returning [`ControlFlow::Break`] from `on_syncing` cancels the call
/// before anything is written.
#[derive(Default)]
pub struct SyncHooks<'h> {
    before_sync: Option<BeforeFn<'h>>,
    after_sync: Option<AfterFn<'h>>,
    syncing: Option<SyncingFn<'h>>,
    synced: Option<SyncedFn<'h>>,
}

impl<'h> SyncHooks<'h> {
    /// Creates an empty hook set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transforms each node before it is applied; receives the entity type.
    #[must_use]
    pub fn on_before_sync(mut self, f: impl FnMut(&str, DataNode) -> DataNode + 'h) -> Self {
        self.before_sync = Some(Box::new(f));
        self
    }

    /// Observes each node after its record is saved.
    #[must_use]
    pub fn on_after_sync(mut self, f: impl FnMut(&Record, &DataNode) + 'h) -> Self {
        self.after_sync = Some(Box::new(f));
        self
    }

    /// Decides whether the call proceeds.
    #[must_use]
    pub fn on_syncing(mut self, f: impl FnMut(&Record, &DataNode) -> ControlFlow<()> + 'h) -> Self {
        self.syncing = Some(Box::new(f));
        self
    }

    /// Observes the root once all relations are synced.
    #[must_use]
    pub fn on_synced(mut self, f: impl FnMut(&Record) + 'h) -> Self {
        self.synced = Some(Box::new(f));
        self
    }

    pub(crate) fn before_sync(&mut self, entity_type: &str, data: DataNode) -> DataNode {
        match &mut self.before_sync {
            Some(f) => f(entity_type, data),
            None => data,
        }
    }

    pub(crate) fn after_sync(&mut self, record: &Record, data: &DataNode) {
        if let Some(f) = &mut self.after_sync {
            f(record, data);
        }
    }

    pub(crate) fn syncing(&mut self, record: &Record, data: &DataNode) -> ControlFlow<()> {
        match &mut self.syncing {
            Some(f) => f(record, data),
            None => ControlFlow::Continue(()),
        }
    }

    pub(crate) fn synced(&mut self, record: &Record) {
        if let Some(f) = &mut self.synced {
            f(record);
        }
    }
}

impl fmt::Debug for SyncHooks<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncHooks")
            .field("before_sync", &self.before_sync.is_some())
            .field("after_sync", &self.after_sync.is_some())
            .field("syncing", &self.syncing.is_some())
            .field("synced", &self.synced.is_some())
            .finish()
    }
}
