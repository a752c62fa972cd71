//! Flow service: the entry points collaborators call.
//!
//! [`FlowService`] owns the cache contract. Reads go cache-then-derive;
//! every mutation writes through [`FlowRecords`] (which invalidates the
//! cache), then re-derives and re-caches. Cache writes are best-effort: a
//! failure there never fails the mutation that preceded it.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::catalog::prerequisite_screen;
use crate::config::EvalConfig;
use crate::dataset::{Dataset, rank_by_weight};
use crate::error::FlowError;
use crate::keys::Flow;
use crate::migrate::{MigrationContext, pick_assessment_items};
use crate::model::{
    Assessment, ComparisonPair, CompletionRecord, EvaluationPlan, NavigationState, ScreenStatus,
    WeightedItem,
};
use crate::navigation::{check_navigation, count_progress, derive_state, pre_plan_state};
use crate::records::FlowRecords;
use crate::resolve::resolve;
use crate::store::RecordStore;

/// Source of comparison pairs for plan generation.
///
/// `items` is ranked by descending weight. Implementations must not return
/// a pair already present in `existing` (in either orientation).
pub trait PairGenerator {
    fn generate(
        &mut self,
        items: &[WeightedItem],
        target_count: usize,
        existing: &[ComparisonPair],
    ) -> Vec<ComparisonPair>;
}

/// What a caller submits when resolving a screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionPayload {
    /// Screen answer, stored verbatim.
    pub data: Value,
    /// Explicit skip flag. `None` keeps whatever flag the screen already
    /// has (or `false` for a first completion).
    pub was_skipped: Option<bool>,
}

impl CompletionPayload {
    #[must_use]
    pub const fn answer(data: Value) -> Self {
        Self {
            data,
            was_skipped: None,
        }
    }

    #[must_use]
    pub const fn skip() -> Self {
        Self {
            data: Value::Null,
            was_skipped: Some(true),
        }
    }
}

pub struct FlowService<S: RecordStore, G: PairGenerator> {
    store: S,
    generator: G,
    dataset: Dataset,
    config: EvalConfig,
    ctx: MigrationContext,
}

fn scoped<'a, S: RecordStore>(
    store: &'a S,
    ctx: &'a MigrationContext,
    user_id: &str,
    flow: &Flow,
) -> Result<FlowRecords<'a, S>, FlowError> {
    FlowRecords::new(store, user_id, flow, ctx)
}

impl<S: RecordStore, G: PairGenerator> FlowService<S, G> {
    pub fn new(store: S, generator: G, dataset: Dataset, config: EvalConfig) -> Self {
        let ctx = MigrationContext {
            assessments_per_plan: config.assessments.per_plan,
        };
        Self {
            store,
            generator,
            dataset,
            config,
            ctx,
        }
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Current navigation state, from cache when possible.
    ///
    /// With no plan yet, or a plan that cannot be decoded, returns the
    /// single-screen pre-plan state instead of failing.
    ///
    /// # Errors
    ///
    /// Store failures and invalid user/flow ids.
    pub fn get_navigation_state(
        &self,
        user_id: &str,
        flow: &Flow,
    ) -> Result<NavigationState, FlowError> {
        let records = scoped(&self.store, &self.ctx, user_id, flow)?;
        if let Some(state) = records.cached_state()? {
            return Ok(state);
        }

        let Some(plan) = stored_plan(&records)? else {
            return Ok(pre_plan_state(flow));
        };
        refresh(&records, plan)
    }

    /// Migration-aware plan read.
    ///
    /// # Errors
    ///
    /// [`FlowError::NotFound`] when no plan exists.
    pub fn load_plan(&self, user_id: &str, flow: &Flow) -> Result<EvaluationPlan, FlowError> {
        let records = scoped(&self.store, &self.ctx, user_id, flow)?;
        Ok(records.load_plan()?.plan)
    }

    /// Resolve `screen_id` with `payload` and return the fresh state.
    ///
    /// Completing the prerequisite selection screen while no usable plan
    /// exists generates the plan from `payload.data.selectedItems` (all
    /// candidates when absent). An unreadable plan is copied to the backup
    /// key before the new one replaces it.
    ///
    /// # Errors
    ///
    /// [`FlowError::OrderingViolation`] for a screen ahead of the current
    /// one, [`FlowError::UnknownScreen`], [`FlowError::InvalidInput`] for a
    /// bad selection, and store failures.
    pub fn complete_screen(
        &mut self,
        user_id: &str,
        flow: &Flow,
        screen_id: &str,
        payload: CompletionPayload,
    ) -> Result<NavigationState, FlowError> {
        let records = scoped(&self.store, &self.ctx, user_id, flow)?;
        let (mut plan, state) = fresh_state(&records)?;
        check_navigation(&state, screen_id)?;

        let previous_skip = records
            .completion(screen_id)?
            .map(|record| record.was_skipped);
        let was_skipped = payload.was_skipped.or(previous_skip).unwrap_or(false);

        if plan.is_none() && screen_id == prerequisite_screen(flow) {
            let ids = selected_ids(&payload.data)?;
            let generated = generate_plan(
                &mut self.generator,
                &self.dataset,
                &self.config,
                flow,
                &ids,
            )?;
            records.backup_plan()?;
            records.write_plan(&generated)?;
            plan = Some(generated);
        }

        records.write_completion(screen_id, &CompletionRecord::new(was_skipped, payload.data))?;
        info!(%flow, screen = screen_id, was_skipped, "screen resolved");

        match plan {
            Some(plan) => refresh(&records, plan),
            None => Ok(pre_plan_state(flow)),
        }
    }

    /// Explicitly skip `screen_id`.
    ///
    /// # Errors
    ///
    /// Same as [`FlowService::complete_screen`].
    pub fn skip_screen(
        &mut self,
        user_id: &str,
        flow: &Flow,
        screen_id: &str,
    ) -> Result<NavigationState, FlowError> {
        self.complete_screen(user_id, flow, screen_id, CompletionPayload::skip())
    }

    /// Move the user's focus to `screen_id`.
    ///
    /// The returned state has `focused_screen` set to the target; the
    /// derived current screen is unchanged.
    ///
    /// # Errors
    ///
    /// [`FlowError::OrderingViolation`] for pending screens,
    /// [`FlowError::UnknownScreen`], and store failures.
    pub fn navigate_to(
        &self,
        user_id: &str,
        flow: &Flow,
        screen_id: &str,
    ) -> Result<NavigationState, FlowError> {
        let records = scoped(&self.store, &self.ctx, user_id, flow)?;
        let (plan, state) = fresh_state(&records)?;
        check_navigation(&state, screen_id)?;

        if resolve(&records, screen_id)? == ScreenStatus::Pending {
            records.mark_in_progress(screen_id)?;
        }

        let mut state = match plan {
            Some(plan) => refresh(&records, plan)?,
            None => state,
        };
        state.focused_screen = Some(screen_id.to_string());
        Ok(state)
    }

    /// Append up to `count` new comparisons to an existing plan.
    ///
    /// Existing pairs are passed to the generator so nothing is duplicated;
    /// existing screen ids are untouched. Selected items without a usable
    /// weight (plans migrated from bare ids) are first filled in from the
    /// dataset.
    ///
    /// # Errors
    ///
    /// [`FlowError::NotFound`] without a plan, and store failures.
    pub fn extend_comparisons(
        &mut self,
        user_id: &str,
        flow: &Flow,
        count: usize,
    ) -> Result<NavigationState, FlowError> {
        let records = scoped(&self.store, &self.ctx, user_id, flow)?;
        let mut plan = records.load_plan()?.plan;

        let backfilled = self.dataset.backfill_weights(flow, &mut plan.selected_items);
        if backfilled > 0 {
            info!(%flow, backfilled, "filled missing item weights from dataset");
            rank_by_weight(&mut plan.selected_items);
        }

        let pairs = self
            .generator
            .generate(&plan.selected_items, count, &plan.comparisons);
        let added = plan.append_comparisons(pairs);
        info!(%flow, requested = count, added, "extended comparisons");
        if added > 0 || backfilled > 0 {
            records.write_plan(&plan)?;
        }
        refresh(&records, plan)
    }
}

/// The stored plan, or `None` when there is no usable one.
///
/// A plan that cannot be decoded or migrated is treated like a missing one,
/// so the user lands back on the prerequisite screen and can regenerate.
fn stored_plan<S: RecordStore>(
    records: &FlowRecords<'_, S>,
) -> Result<Option<EvaluationPlan>, FlowError> {
    match records.load_plan() {
        Ok(loaded) => Ok(Some(loaded.plan)),
        Err(FlowError::NotFound { .. }) => {
            debug!(flow = %records.flow(), "no plan yet; serving pre-plan state");
            Ok(None)
        }
        Err(err @ (FlowError::CorruptRecord { .. } | FlowError::MigrationAmbiguity { .. })) => {
            warn!(flow = %records.flow(), "unusable plan; serving pre-plan state: {err}");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Plan (if any) plus a freshly derived state, bypassing the cache.
fn fresh_state<S: RecordStore>(
    records: &FlowRecords<'_, S>,
) -> Result<(Option<EvaluationPlan>, NavigationState), FlowError> {
    match stored_plan(records)? {
        Some(plan) => {
            let state = derive_state(records, &plan)?;
            Ok((Some(plan), state))
        }
        None => Ok((None, pre_plan_state(records.flow()))),
    }
}

/// Derive, write back drifted counters, and cache.
fn refresh<S: RecordStore>(
    records: &FlowRecords<'_, S>,
    mut plan: EvaluationPlan,
) -> Result<NavigationState, FlowError> {
    let mut state = derive_state(records, &plan)?;
    let (completed, skipped) = count_progress(&state);
    if (completed, skipped) != (plan.completed_count, plan.skipped_count) {
        plan.completed_count = completed;
        plan.skipped_count = skipped;
        if let Err(err) = records.write_plan(&plan) {
            warn!(flow = %records.flow(), "failed to write back plan counters: {err}");
        }
        state.plan = Some(plan);
    }
    records.cache_state(&state);
    Ok(state)
}

fn generate_plan<G: PairGenerator>(
    generator: &mut G,
    dataset: &Dataset,
    config: &EvalConfig,
    flow: &Flow,
    ids: &[String],
) -> Result<EvaluationPlan, FlowError> {
    let items = dataset.select(flow, ids)?;
    if items.is_empty() {
        return Err(FlowError::InvalidInput(format!(
            "no items available to evaluate in {flow}"
        )));
    }

    let comparisons = generator.generate(&items, config.generator.comparisons_per_plan, &[]);
    let ranked_ids: Vec<String> = items.iter().map(|item| item.id.clone()).collect();
    let assessments = pick_assessment_items(&ranked_ids, config.assessments.per_plan)
        .into_iter()
        .map(|item_id| Assessment { item_id })
        .collect();

    let plan = EvaluationPlan::new(items, comparisons, assessments);
    info!(
        %flow,
        items = plan.selected_items.len(),
        comparisons = plan.comparisons.len(),
        assessments = plan.assessments.len(),
        "generated evaluation plan"
    );
    Ok(plan)
}

/// `selectedItems` ids from a selection payload. Absent or null means all.
fn selected_ids(data: &Value) -> Result<Vec<String>, FlowError> {
    match data.get("selectedItems") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(values)) => values
            .iter()
            .map(|value| {
                value.as_str().map(str::to_string).ok_or_else(|| {
                    FlowError::InvalidInput("selectedItems must contain item ids".into())
                })
            })
            .collect(),
        Some(_) => Err(FlowError::InvalidInput(
            "selectedItems must be an array of item ids".into(),
        )),
    }
}
