//! Navigation state derivation.
//!
//! Turns a plan plus the sparse per-screen records into the ordered list of
//! annotated screens and picks the current one:
//!
//! 1. Build the catalog and resolve every screen's status.
//! 2. Current = first non-terminal screen that is neither completed nor
//!    skipped; the terminal screen once everything else is resolved.
//! 3. A pending current screen gets an in-progress marker.
//! 4. Items carry their resolved status, except the current item which is
//!    always labeled `current`.
//!
//! Derivation never reads the navigation state cache; callers check the
//! cache first and call in here only on a miss.

use tracing::debug;

use crate::catalog::{ScreenSpec, build_catalog, pre_plan_catalog};
use crate::error::FlowError;
use crate::keys::Flow;
use crate::model::{
    EvaluationPlan, NAVIGATION_STATE_VERSION, NavStatus, NavigationItem, NavigationState,
    ScreenStatus,
};
use crate::records::FlowRecords;
use crate::resolve::resolve;
use crate::store::RecordStore;

/// Index of the current screen.
///
/// `statuses` is parallel to `catalog`. Returns 0 for an empty catalog.
#[must_use]
pub fn choose_current(catalog: &[ScreenSpec], statuses: &[ScreenStatus]) -> usize {
    let first_open = catalog
        .iter()
        .zip(statuses)
        .position(|(screen, status)| !screen.is_terminal() && !status.is_resolved());
    if let Some(index) = first_open {
        return index;
    }
    catalog
        .iter()
        .position(ScreenSpec::is_terminal)
        .unwrap_or_else(|| catalog.len().saturating_sub(1))
}

/// Derive the navigation state for `plan`.
///
/// Idempotent: a second call with no intervening mutation yields the same
/// items and current screen. The only side effect is the in-progress marker
/// written for a pending current screen.
///
/// # Errors
///
/// Store failures only.
pub fn derive_state<S: RecordStore>(
    records: &FlowRecords<'_, S>,
    plan: &EvaluationPlan,
) -> Result<NavigationState, FlowError> {
    let catalog = build_catalog(records.flow(), plan);
    let mut state = derive_from_catalog(records, &catalog)?;
    state.plan = Some(plan.clone());
    Ok(state)
}

fn derive_from_catalog<S: RecordStore>(
    records: &FlowRecords<'_, S>,
    catalog: &[ScreenSpec],
) -> Result<NavigationState, FlowError> {
    let statuses = catalog
        .iter()
        .map(|screen| resolve(records, &screen.id))
        .collect::<Result<Vec<_>, _>>()?;

    let current = choose_current(catalog, &statuses);
    if let Some(screen) = catalog.get(current) {
        if statuses[current] == ScreenStatus::Pending {
            debug!(screen = %screen.id, "marking current screen in progress");
            records.mark_in_progress(&screen.id)?;
        }
    }

    Ok(assemble(catalog, &statuses, current))
}

fn assemble(catalog: &[ScreenSpec], statuses: &[ScreenStatus], current: usize) -> NavigationState {
    let navigation_items = catalog
        .iter()
        .zip(statuses)
        .enumerate()
        .map(|(index, (screen, status))| NavigationItem {
            id: screen.id.clone(),
            screen_type: screen.screen_type,
            display_text: screen.display_text.clone(),
            status: if index == current {
                NavStatus::Current
            } else {
                NavStatus::from(*status)
            },
            data: screen.data.clone(),
        })
        .collect();

    NavigationState {
        version: NAVIGATION_STATE_VERSION,
        navigation_items,
        current_screen: catalog
            .get(current)
            .map(|screen| screen.id.clone())
            .unwrap_or_default(),
        plan: None,
        focused_screen: None,
    }
}

/// Minimal state for a flow with no usable plan: the prerequisite screen
/// alone, marked current. Writes nothing.
#[must_use]
pub fn pre_plan_state(flow: &Flow) -> NavigationState {
    let catalog = pre_plan_catalog(flow);
    let statuses = vec![ScreenStatus::Pending; catalog.len()];
    assemble(&catalog, &statuses, 0)
}

/// Enforce the navigation permission rule.
///
/// Completed, skipped, and in-progress screens are reachable, as is the
/// current screen. Anything pending is ahead of the user.
///
/// # Errors
///
/// [`FlowError::UnknownScreen`] for ids outside the state,
/// [`FlowError::OrderingViolation`] for pending screens.
pub fn check_navigation(state: &NavigationState, screen_id: &str) -> Result<(), FlowError> {
    let item = state
        .item(screen_id)
        .ok_or_else(|| FlowError::UnknownScreen(screen_id.to_string()))?;
    match item.status {
        NavStatus::Pending => Err(FlowError::OrderingViolation {
            screen: screen_id.to_string(),
            current: state.current_screen.clone(),
        }),
        NavStatus::InProgress | NavStatus::Current | NavStatus::Completed | NavStatus::Skipped => {
            Ok(())
        }
    }
}

/// `(completed, skipped)` over all non-terminal screens.
#[must_use]
pub fn count_progress(state: &NavigationState) -> (usize, usize) {
    state
        .navigation_items
        .iter()
        .filter(|item| item.screen_type != crate::model::ScreenType::Completion)
        .fold((0, 0), |(completed, skipped), item| match item.status {
            NavStatus::Completed => (completed + 1, skipped),
            NavStatus::Skipped => (completed, skipped + 1),
            _ => (completed, skipped),
        })
}
