//! Lazy schema migration for persisted records.
//!
//! Records carry an explicit `version` field (absent means 0). On every read
//! the raw JSON object runs through an ordered list of [`Migration`] steps
//! until it reaches the current version; the upgraded record is written back
//! so each record pays the migration cost once.
//!
//! Every step fills missing fields with a documented default instead of
//! failing:
//!
//! | Record | Field | Default |
//! |--------|-------|---------|
//! | plan | `selectedItems`, `comparisons` | `[]` |
//! | plan | bare id in `selectedItems` | `{id, weight: 0}` |
//! | plan | non-numeric item `weight` | `0` |
//! | plan | item or comparison without a string id | dropped |
//! | plan | comparison `multiplier` | heavier / lighter selected weight, else `1` |
//! | plan | `completedCount`, `skippedCount` | `0` |
//! | plan | `assessments` | seeded pick from `selectedItems` |
//! | completion | `wasSkipped` | `false` (records predate skipping) |
//! | completion | `completed` | `true` (presence implies resolved) |
//! | completion | `timestamp` | Unix epoch; numeric millis are converted |
//! | completion | `data` | `null` |

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::error::FlowError;
use crate::model::{COMPLETION_VERSION, PLAN_VERSION};
use crate::store::RecordStore;

/// Which schema a raw record follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Plan,
    Completion,
}

impl RecordKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Completion => "completion",
        }
    }

    #[must_use]
    pub const fn current_version(self) -> u32 {
        match self {
            Self::Plan => PLAN_VERSION,
            Self::Completion => COMPLETION_VERSION,
        }
    }

    const fn steps(self) -> &'static [Migration] {
        match self {
            Self::Plan => PLAN_MIGRATIONS,
            Self::Completion => COMPLETION_MIGRATIONS,
        }
    }
}

/// Inputs a migration step may need beyond the record itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationContext {
    /// Cap on generated assessment screens.
    pub assessments_per_plan: usize,
}

impl Default for MigrationContext {
    fn default() -> Self {
        Self {
            assessments_per_plan: crate::config::AssessmentConfig::default().per_plan,
        }
    }
}

/// One upgrade step from `from_version` to `from_version + 1`.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub from_version: u32,
    pub apply: fn(&mut Map<String, Value>, &MigrationContext),
}

const PLAN_MIGRATIONS: &[Migration] = &[Migration {
    from_version: 0,
    apply: plan_v0_to_v1,
}];

const COMPLETION_MIGRATIONS: &[Migration] = &[Migration {
    from_version: 0,
    apply: completion_v0_to_v1,
}];

/// A record after migration.
#[derive(Debug, Clone, PartialEq)]
pub struct Migrated {
    pub value: Value,
    /// True when at least one step ran.
    pub changed: bool,
}

/// Upgrade `value` to the current version of `kind`.
///
/// Already-current records (and records from a newer schema) come back
/// untouched with `changed = false`.
///
/// # Errors
///
/// Returns [`FlowError::MigrationAmbiguity`] if the record is not a JSON
/// object or no step exists for its version.
pub fn migrate(value: Value, kind: RecordKind, ctx: &MigrationContext) -> Result<Migrated, FlowError> {
    let Value::Object(mut map) = value else {
        return Err(FlowError::MigrationAmbiguity {
            kind: kind.name(),
            reason: "record is not a JSON object".into(),
        });
    };

    let current = kind.current_version();
    let mut version = record_version(&map);
    if version > current {
        warn!(
            kind = kind.name(),
            version, current, "record written by a newer schema; leaving as-is"
        );
        return Ok(Migrated {
            value: Value::Object(map),
            changed: false,
        });
    }

    let mut changed = false;
    while version < current {
        let step = kind
            .steps()
            .iter()
            .find(|step| step.from_version == version)
            .ok_or_else(|| FlowError::MigrationAmbiguity {
                kind: kind.name(),
                reason: format!("no migration from version {version}"),
            })?;
        (step.apply)(&mut map, ctx);
        version += 1;
        map.insert("version".into(), json!(version));
        changed = true;
        debug!(kind = kind.name(), to = version, "migrated record");
    }

    Ok(Migrated {
        value: Value::Object(map),
        changed,
    })
}

/// Read `key`, migrate it, and write the upgraded form back.
///
/// A failed write-back is logged and otherwise ignored: the read still
/// succeeds and the next read migrates again.
///
/// # Errors
///
/// Returns [`FlowError::StoreUnavailable`] if the read fails,
/// [`FlowError::CorruptRecord`] if the value is not JSON, and
/// [`FlowError::MigrationAmbiguity`] per [`migrate`].
pub fn read_upgraded(
    store: &impl RecordStore,
    key: &str,
    kind: RecordKind,
    ctx: &MigrationContext,
) -> Result<Option<Migrated>, FlowError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    let value: Value = serde_json::from_str(&raw).map_err(|source| FlowError::CorruptRecord {
        key: key.to_string(),
        source,
    })?;
    let migrated = migrate(value, kind, ctx)?;
    if migrated.changed {
        match serde_json::to_string(&migrated.value) {
            Ok(encoded) => {
                if let Err(err) = store.put(key, &encoded) {
                    warn!(key = %key, "failed to write back migrated record: {err}");
                }
            }
            Err(err) => warn!(key = %key, "failed to encode migrated record: {err}"),
        }
    }
    Ok(Some(migrated))
}

fn record_version(map: &Map<String, Value>) -> u32 {
    map.get("version")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0)
}

fn ensure(map: &mut Map<String, Value>, field: &str, default: Value) {
    let missing = map.get(field).is_none_or(Value::is_null);
    if missing {
        map.insert(field.to_string(), default);
    }
}

fn plan_v0_to_v1(map: &mut Map<String, Value>, ctx: &MigrationContext) {
    ensure(map, "selectedItems", json!([]));
    ensure(map, "comparisons", json!([]));
    ensure(map, "completedCount", json!(0));
    ensure(map, "skippedCount", json!(0));

    if let Some(Value::Array(items)) = map.get_mut("selectedItems") {
        *items = std::mem::take(items)
            .into_iter()
            .filter_map(normalize_item)
            .collect();
    }

    let weights: HashMap<String, f64> = map
        .get("selectedItems")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| {
            let id = item.get("id")?.as_str()?;
            Some((id.to_string(), item.get("weight")?.as_f64()?))
        })
        .collect();
    if let Some(Value::Array(pairs)) = map.get_mut("comparisons") {
        *pairs = std::mem::take(pairs)
            .into_iter()
            .filter_map(|pair| normalize_pair(pair, &weights))
            .collect();
    }

    if map.get("assessments").is_none_or(|v| !v.is_array()) {
        let ids = selected_item_ids(map);
        let assessments: Vec<Value> = pick_assessment_items(&ids, ctx.assessments_per_plan)
            .into_iter()
            .map(|id| json!({ "itemId": id }))
            .collect();
        map.insert("assessments".into(), Value::Array(assessments));
    }
}

/// Bare ids become `{id, weight: 0}`; entries without a string id are dropped.
fn normalize_item(item: Value) -> Option<Value> {
    let mut obj = match item {
        Value::String(id) => return Some(json!({ "id": id, "weight": 0.0 })),
        Value::Object(obj) => obj,
        other => {
            warn!(entry = %other, "dropping selected item that is not an id or object");
            return None;
        }
    };
    if !obj.get("id").is_some_and(Value::is_string) {
        warn!("dropping selected item without an id");
        return None;
    }
    let weight = obj
        .get("weight")
        .and_then(Value::as_f64)
        .filter(|w| w.is_finite())
        .unwrap_or(0.0);
    obj.insert("weight".into(), json!(weight));
    if obj.get("label").is_some_and(|label| !label.is_string()) {
        obj.remove("label");
    }
    Some(Value::Object(obj))
}

fn normalize_pair(pair: Value, weights: &HashMap<String, f64>) -> Option<Value> {
    let Value::Object(mut obj) = pair else {
        warn!("dropping comparison that is not an object");
        return None;
    };
    let ids = (
        obj.get("itemA").and_then(Value::as_str),
        obj.get("itemB").and_then(Value::as_str),
    );
    let (Some(a), Some(b)) = ids else {
        warn!("dropping comparison without item ids");
        return None;
    };
    let (a, b) = (a.to_string(), b.to_string());
    if !obj.get("multiplier").is_some_and(Value::is_number) {
        obj.insert("multiplier".into(), json!(weight_ratio(weights, &a, &b)));
    }
    Some(Value::Object(obj))
}

/// Heavier over lighter weight, one decimal, never below 1. Unknown or
/// non-positive weights give 1.
fn weight_ratio(weights: &HashMap<String, f64>, a: &str, b: &str) -> f64 {
    let (Some(&wa), Some(&wb)) = (weights.get(a), weights.get(b)) else {
        return 1.0;
    };
    if wa <= 0.0 || wb <= 0.0 {
        return 1.0;
    }
    ((wa.max(wb) / wa.min(wb)) * 10.0).round().max(10.0) / 10.0
}

fn completion_v0_to_v1(map: &mut Map<String, Value>, _ctx: &MigrationContext) {
    ensure(map, "wasSkipped", json!(false));
    ensure(map, "completed", json!(true));
    ensure(map, "data", Value::Null);

    let timestamp = match map.get("timestamp") {
        Some(Value::String(raw)) if DateTime::parse_from_rfc3339(raw).is_ok() => None,
        Some(Value::Number(n)) => Some(
            n.as_i64()
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        ),
        _ => Some(DateTime::<Utc>::UNIX_EPOCH),
    };
    if let Some(ts) = timestamp {
        map.insert("timestamp".into(), json!(ts.to_rfc3339()));
    }
}

fn selected_item_ids(map: &Map<String, Value>) -> Vec<String> {
    map.get("selectedItems")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(id) => Some(id.clone()),
                    Value::Object(obj) => obj.get("id").and_then(Value::as_str).map(str::to_string),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Choose up to `limit` ids for assessment screens.
///
/// Seeded from the ids themselves, so equal selections always produce equal
/// picks. The result keeps the input (rank) order.
#[must_use]
pub fn pick_assessment_items(ids: &[String], limit: usize) -> Vec<String> {
    let mut hasher = blake3::Hasher::new();
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update(b"\n");
    }
    let digest = hasher.finalize();
    let mut seed = [0_u8; 8];
    seed.copy_from_slice(&digest.as_bytes()[..8]);
    let mut rng = StdRng::seed_from_u64(u64::from_le_bytes(seed));

    let mut positions: Vec<usize> = (0..ids.len()).collect();
    positions.shuffle(&mut rng);
    positions.truncate(limit);
    positions.sort_unstable();
    positions.into_iter().map(|pos| ids[pos].clone()).collect()
}
