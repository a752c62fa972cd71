//! Scoped access to one user's records within one flow.
//!
//! [`FlowRecords`] is the only writer of screen records and plans. Every
//! write goes through [`FlowRecords::mutate`], which deletes the cached
//! navigation state after the write, so a new mutation path cannot forget
//! to invalidate.

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::FlowError;
use crate::keys::{Flow, FlowKeys};
use crate::migrate::{MigrationContext, RecordKind, read_upgraded};
use crate::model::{
    CompletionRecord, EvaluationPlan, InProgressRecord, NAVIGATION_STATE_VERSION, NavigationState,
};
use crate::store::{Decoded, RecordStore, get_json, put_json};

/// Result of loading a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPlan {
    pub plan: EvaluationPlan,
    /// The stored plan was upgraded (and written back) during this load.
    pub migrated: bool,
}

pub struct FlowRecords<'a, S: RecordStore> {
    store: &'a S,
    keys: FlowKeys,
    flow: Flow,
    ctx: &'a MigrationContext,
}

impl<'a, S: RecordStore> FlowRecords<'a, S> {
    /// Scope record access to `user_id` within `flow`.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidInput`] for an empty user id or target.
    pub fn new(
        store: &'a S,
        user_id: &str,
        flow: &Flow,
        ctx: &'a MigrationContext,
    ) -> Result<Self, FlowError> {
        Ok(Self {
            store,
            keys: FlowKeys::new(user_id, flow)?,
            flow: flow.clone(),
            ctx,
        })
    }

    #[must_use]
    pub const fn keys(&self) -> &FlowKeys {
        &self.keys
    }

    #[must_use]
    pub const fn flow(&self) -> &Flow {
        &self.flow
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Load and migrate the plan.
    ///
    /// # Errors
    ///
    /// [`FlowError::NotFound`] when no plan exists, [`FlowError::CorruptRecord`]
    /// when it cannot be decoded, store failures otherwise.
    pub fn load_plan(&self) -> Result<LoadedPlan, FlowError> {
        let key = self.keys.plan();
        let Some(migrated) = read_upgraded(self.store, &key, RecordKind::Plan, self.ctx)? else {
            return Err(FlowError::NotFound {
                flow: self.flow.namespace(),
            });
        };
        if migrated.changed {
            self.invalidate();
        }
        let plan = serde_json::from_value(migrated.value)
            .map_err(|source| FlowError::CorruptRecord { key, source })?;
        Ok(LoadedPlan {
            plan,
            migrated: migrated.changed,
        })
    }

    /// Completion record for `screen_id`, migrated to the current schema.
    ///
    /// A record that exists but cannot be decoded still means "resolved":
    /// it is reported as a plain completion.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub fn completion(&self, screen_id: &str) -> Result<Option<CompletionRecord>, FlowError> {
        let key = self.keys.completed(screen_id);
        let migrated = match read_upgraded(self.store, &key, RecordKind::Completion, self.ctx) {
            Ok(Some(migrated)) => migrated,
            Ok(None) => return Ok(None),
            Err(FlowError::StoreUnavailable(err)) => return Err(err.into()),
            Err(err) => {
                warn!(key = %key, "unreadable completion record treated as completed: {err}");
                return Ok(Some(CompletionRecord::new(false, Value::Null)));
            }
        };
        match serde_json::from_value::<CompletionRecord>(migrated.value) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                warn!(key = %key, "undecodable completion record treated as completed: {err}");
                Ok(Some(CompletionRecord::new(false, Value::Null)))
            }
        }
    }

    /// Whether an in-progress marker exists for `screen_id`.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub fn has_in_progress(&self, screen_id: &str) -> Result<bool, FlowError> {
        Ok(self.store.get(&self.keys.in_progress(screen_id))?.is_some())
    }

    /// Cached navigation state, if present and written by this format
    /// version. Anything else is a miss.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub fn cached_state(&self) -> Result<Option<NavigationState>, FlowError> {
        let key = self.keys.navigation_state();
        match get_json::<NavigationState>(self.store, &key)? {
            Decoded::Found(state) if state.version == NAVIGATION_STATE_VERSION => {
                debug!(key = %key, "navigation state cache hit");
                Ok(Some(state))
            }
            Decoded::Found(state) => {
                debug!(key = %key, version = state.version, "stale navigation state format");
                Ok(None)
            }
            Decoded::Corrupt(err) => {
                warn!(key = %key, "corrupt navigation state cache ignored: {err}");
                Ok(None)
            }
            Decoded::Missing => {
                debug!(key = %key, "navigation state cache miss");
                Ok(None)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Run `write`, then invalidate the cached navigation state.
    ///
    /// Invalidation failures are logged, not returned: the write already
    /// happened and the next derivation overwrites the cache anyway.
    fn mutate<T>(&self, write: impl FnOnce(&S, &FlowKeys) -> Result<T, FlowError>) -> Result<T, FlowError> {
        let value = write(self.store, &self.keys)?;
        self.invalidate();
        Ok(value)
    }

    fn invalidate(&self) {
        let key = self.keys.navigation_state();
        if let Err(err) = self.store.delete(&key) {
            warn!(key = %key, "failed to invalidate navigation state: {err}");
        }
    }

    /// Record that `screen_id` was visited.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub fn mark_in_progress(&self, screen_id: &str) -> Result<(), FlowError> {
        self.mutate(|store, keys| {
            put_json(store, &keys.in_progress(screen_id), &InProgressRecord::now())?;
            Ok(())
        })
    }

    /// Write the completion record for `screen_id` and drop its in-progress
    /// marker.
    ///
    /// The completion write is the durable step; a failed marker delete is
    /// logged because the resolver lets completion win regardless.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion write fails.
    pub fn write_completion(&self, screen_id: &str, record: &CompletionRecord) -> Result<(), FlowError> {
        self.mutate(|store, keys| {
            put_json(store, &keys.completed(screen_id), record)?;
            let marker = keys.in_progress(screen_id);
            if let Err(err) = store.delete(&marker) {
                warn!(key = %marker, "failed to clear in-progress marker: {err}");
            }
            Ok(())
        })
    }

    /// Persist `plan`.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub fn write_plan(&self, plan: &EvaluationPlan) -> Result<(), FlowError> {
        self.mutate(|store, keys| {
            put_json(store, &keys.plan(), plan)?;
            Ok(())
        })
    }

    /// Copy the stored plan, as raw text, to the backup key.
    ///
    /// Called before an unreadable plan is replaced by a regenerated one.
    /// Returns whether there was anything to preserve.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub fn backup_plan(&self) -> Result<bool, FlowError> {
        let Some(raw) = self.store.get(&self.keys.plan())? else {
            return Ok(false);
        };
        let backup = self.keys.plan_backup();
        self.store.put(&backup, &raw)?;
        warn!(key = %backup, "preserved unreadable plan before regenerating");
        Ok(true)
    }

    /// Cache a derived state. Best-effort: failures are logged.
    pub fn cache_state(&self, state: &NavigationState) {
        let key = self.keys.navigation_state();
        let mut cached = state.clone();
        cached.focused_screen = None;
        if let Err(err) = put_json(self.store, &key, &cached) {
            warn!(key = %key, "failed to cache navigation state: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn records<'a>(store: &'a MemoryStore, ctx: &'a MigrationContext) -> FlowRecords<'a, MemoryStore> {
        FlowRecords::new(store, "u1", &Flow::Level2, ctx).expect("records")
    }

    fn state() -> NavigationState {
        NavigationState {
            version: NAVIGATION_STATE_VERSION,
            navigation_items: vec![],
            current_screen: "selection".into(),
            plan: None,
            focused_screen: Some("selection".into()),
        }
    }

    #[test]
    fn every_write_invalidates_cache() {
        let store = MemoryStore::new();
        let ctx = MigrationContext::default();
        let records = records(&store, &ctx);

        records.cache_state(&state());
        records.mark_in_progress("intro").expect("mark");
        assert!(records.cached_state().expect("read").is_none());

        records.cache_state(&state());
        records
            .write_completion("intro", &CompletionRecord::new(false, Value::Null))
            .expect("complete");
        assert!(records.cached_state().expect("read").is_none());

        records.cache_state(&state());
        records
            .write_plan(&EvaluationPlan::new(vec![], vec![], vec![]))
            .expect("plan");
        assert!(records.cached_state().expect("read").is_none());
    }

    #[test]
    fn completion_clears_in_progress_marker() {
        let store = MemoryStore::new();
        let ctx = MigrationContext::default();
        let records = records(&store, &ctx);
        records.mark_in_progress("s").expect("mark");
        assert!(records.has_in_progress("s").expect("read"));
        records
            .write_completion("s", &CompletionRecord::new(true, Value::Null))
            .expect("complete");
        assert!(!records.has_in_progress("s").expect("read"));
        assert!(records.completion("s").expect("read").expect("present").was_skipped);
    }

    #[test]
    fn cache_drops_focus_and_rejects_other_versions() {
        let store = MemoryStore::new();
        let ctx = MigrationContext::default();
        let records = records(&store, &ctx);
        records.cache_state(&state());
        let cached = records.cached_state().expect("read").expect("hit");
        assert_eq!(cached.focused_screen, None);

        store
            .put(
                &records.keys().navigation_state(),
                &json!({"navigationItems": [], "currentScreen": "x"}).to_string(),
            )
            .expect("put legacy");
        assert!(records.cached_state().expect("read").is_none());

        store
            .put(&records.keys().navigation_state(), "garbage")
            .expect("put corrupt");
        assert!(records.cached_state().expect("read").is_none());
    }

    #[test]
    fn missing_plan_is_not_found() {
        let store = MemoryStore::new();
        let ctx = MigrationContext::default();
        let err = records(&store, &ctx).load_plan().expect_err("no plan");
        assert!(matches!(err, FlowError::NotFound { .. }));
    }

    #[test]
    fn legacy_plan_load_migrates_and_invalidates() {
        let store = MemoryStore::new();
        let ctx = MigrationContext::default();
        let records = records(&store, &ctx);
        records.cache_state(&state());
        store
            .put(
                &records.keys().plan(),
                &json!({"selectedItems": [{"id": "a", "weight": 2.0}], "comparisons": []}).to_string(),
            )
            .expect("put legacy plan");

        let loaded = records.load_plan().expect("load");
        assert!(loaded.migrated);
        assert_eq!(loaded.plan.assessments.len(), 1);
        assert!(records.cached_state().expect("read").is_none());
        assert!(!records.load_plan().expect("reload").migrated);
    }

    #[test]
    fn unreadable_completion_still_counts_as_resolved() {
        let store = MemoryStore::new();
        let ctx = MigrationContext::default();
        let records = records(&store, &ctx);
        store
            .put(&records.keys().completed("s"), "[1,2,3]")
            .expect("put");
        let record = records.completion("s").expect("read").expect("present");
        assert!(!record.was_skipped);
    }

    #[test]
    fn backup_preserves_raw_plan_text() {
        let store = MemoryStore::new();
        let ctx = MigrationContext::default();
        let records = records(&store, &ctx);
        assert!(!records.backup_plan().expect("nothing to back up"));

        store.put(&records.keys().plan(), "{{{").expect("put");
        assert!(records.backup_plan().expect("backup"));
        assert_eq!(
            store.get(&records.keys().plan_backup()).expect("get").as_deref(),
            Some("{{{")
        );
    }
}
