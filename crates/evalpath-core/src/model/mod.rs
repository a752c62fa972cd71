//! Persisted and derived record types.
//!
//! Persisted shapes use camelCase field names on the wire so records written
//! by earlier clients keep decoding.

pub mod plan;
pub mod record;
pub mod screen;

pub use plan::{Assessment, ComparisonPair, EvaluationPlan, PLAN_VERSION, WeightedItem, pair_key};
pub use record::{COMPLETION_VERSION, CompletionRecord, InProgressRecord};
pub use screen::{
    NAVIGATION_STATE_VERSION, NavStatus, NavigationItem, NavigationState, ScreenStatus, ScreenType,
};
