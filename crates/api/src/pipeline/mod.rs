//! Aggregation stage engine.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s applied to the documents
//! of one collection. Each stage consumes the previous stage's output, so
//! later stages see grouped rows (`{_id, <accumulators>}`) rather than raw
//! documents.
//!
//! # Stages
//!
//! | Stage                | Effect                                              |
//! |----------------------|-----------------------------------------------------|
//! | `NormalizeTimestamp` | Rewrite a field as a canonical UTC RFC 3339 string  |
//! | `Group`              | Group by a key expression, reduce with accumulators |
//! | `Match`              | Keep documents satisfying a predicate               |
//! | `Sort`               | Stable sort by a field                              |
//! | `Bucket`             | Group a numeric expression into fixed ranges        |
//!
//! The engine is pure: it never touches the store, so every record source
//! shares it and it can be tested on literal documents.

pub mod expr;
pub mod value;

use std::collections::HashMap;

use chrono::SecondsFormat;
use rq_analytics_core::{BucketKey, CoercionError, CoercionPolicy, parse_timestamp};
use serde_json::{Map, Value};
use thiserror::Error;

pub use expr::{CoercionStats, Expr};
use value::{Sum, compare_values, get_path, same_type, set_path};

/// Errors raised while executing a pipeline.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A value failed coercion under the strict policy.
    #[error(transparent)]
    Coercion(#[from] CoercionError),

    /// A stage definition is unusable.
    #[error("invalid stage: {0}")]
    InvalidStage(String),
}

/// A reducer applied to every document of a group.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// Sum an expression; non-numeric values are ignored.
    Sum(Expr),
    /// Count documents.
    Count,
}

/// A document predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Field equals the value.
    Eq(String, Value),
    /// Field is greater than the value (same type bracket only).
    Gt(String, Value),
    /// Field is greater than or equal to the value (same type bracket only).
    Gte(String, Value),
    /// Field is less than the value (same type bracket only).
    Lt(String, Value),
    /// Field is present and not null.
    Exists(String),
    /// All predicates hold.
    And(Vec<Predicate>),
}

impl Predicate {
    /// Whether a document satisfies this predicate.
    #[must_use]
    pub fn matches(&self, doc: &Value) -> bool {
        use std::cmp::Ordering;

        let compare = |path: &str, expected: &Value| {
            get_path(doc, path)
                .filter(|actual| same_type(actual, expected))
                .map(|actual| compare_values(actual, expected))
        };

        match self {
            Self::Eq(path, expected) => get_path(doc, path).unwrap_or(&Value::Null) == expected,
            Self::Gt(path, expected) => compare(path, expected) == Some(Ordering::Greater),
            Self::Gte(path, expected) => {
                matches!(compare(path, expected), Some(Ordering::Greater | Ordering::Equal))
            }
            Self::Lt(path, expected) => compare(path, expected) == Some(Ordering::Less),
            Self::Exists(path) => get_path(doc, path).is_some_and(|v| !v.is_null()),
            Self::And(predicates) => predicates.iter().all(|p| p.matches(doc)),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// A single pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Rewrite a timestamp field in canonical UTC form.
    ///
    /// Under the lenient policy unparsable values become null and missing
    /// fields are left alone; under the strict policy either fails.
    NormalizeTimestamp { field: String },
    /// Group by `key`, producing `{_id: key, <name>: <accumulated>}` rows in
    /// first-seen key order. Documents whose key has no value are dropped.
    Group {
        key: Expr,
        accumulators: Vec<(String, Accumulator)>,
    },
    /// Keep documents matching the predicate.
    Match(Predicate),
    /// Stable sort by a field.
    Sort {
        field: String,
        direction: SortDirection,
    },
    /// Group a numeric expression into ranges `[boundaries[i], boundaries[i + 1])`.
    ///
    /// Each range's `_id` is its lower boundary. Values outside every range,
    /// and non-numeric values, fall into `default`. Empty ranges are not
    /// emitted; ranges come out in boundary order with `default` last.
    Bucket {
        group_by: Expr,
        boundaries: Vec<i64>,
        default: Value,
        output: Vec<(String, Accumulator)>,
    },
}

impl Stage {
    /// Shorthand for [`Stage::NormalizeTimestamp`].
    #[must_use]
    pub fn normalize_timestamp(field: impl Into<String>) -> Self {
        Self::NormalizeTimestamp {
            field: field.into(),
        }
    }

    /// Shorthand for a [`Stage::Group`] with named accumulators.
    #[must_use]
    pub fn group(key: Expr, accumulators: &[(&str, Accumulator)]) -> Self {
        Self::Group {
            key,
            accumulators: named(accumulators),
        }
    }

    /// Shorthand for an ascending [`Stage::Sort`].
    #[must_use]
    pub fn sort_ascending(field: impl Into<String>) -> Self {
        Self::Sort {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NormalizeTimestamp { .. } => "normalize_timestamp",
            Self::Group { .. } => "group",
            Self::Match(_) => "match",
            Self::Sort { .. } => "sort",
            Self::Bucket { .. } => "bucket",
        }
    }
}

fn named(accumulators: &[(&str, Accumulator)]) -> Vec<(String, Accumulator)> {
    accumulators
        .iter()
        .map(|(name, acc)| ((*name).to_string(), acc.clone()))
        .collect()
}

/// An ordered list of stages plus the coercion policy to run them under.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
    pub policy: CoercionPolicy,
}

impl Pipeline {
    /// Create a pipeline from stages.
    #[must_use]
    pub const fn new(stages: Vec<Stage>, policy: CoercionPolicy) -> Self {
        Self { stages, policy }
    }

    /// Run the pipeline over a set of documents.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Coercion`] when a value fails coercion under the
    /// strict policy, and [`EngineError::InvalidStage`] for malformed stages.
    pub fn execute(&self, documents: Vec<Value>) -> Result<Output, EngineError> {
        let mut stats = CoercionStats::default();
        let mut docs = documents;

        for stage in &self.stages {
            docs = run_stage(stage, docs, self.policy, &mut stats)?;
            tracing::trace!(stage = stage.name(), rows = docs.len(), "Stage complete");
        }

        Ok(Output { rows: docs, stats })
    }
}

/// Pipeline result rows plus coercion bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub rows: Vec<Value>,
    pub stats: CoercionStats,
}

fn run_stage(
    stage: &Stage,
    docs: Vec<Value>,
    policy: CoercionPolicy,
    stats: &mut CoercionStats,
) -> Result<Vec<Value>, EngineError> {
    match stage {
        Stage::NormalizeTimestamp { field } => normalize_timestamps(docs, field, policy),
        Stage::Group { key, accumulators } => group(docs, key, accumulators, policy, stats),
        Stage::Match(predicate) => Ok(docs.into_iter().filter(|d| predicate.matches(d)).collect()),
        Stage::Sort { field, direction } => {
            let mut docs = docs;
            docs.sort_by(|a, b| {
                let a = get_path(a, field).unwrap_or(&Value::Null);
                let b = get_path(b, field).unwrap_or(&Value::Null);
                match direction {
                    SortDirection::Ascending => compare_values(a, b),
                    SortDirection::Descending => compare_values(b, a),
                }
            });
            Ok(docs)
        }
        Stage::Bucket {
            group_by,
            boundaries,
            default,
            output,
        } => bucket(docs, group_by, boundaries, default, output, policy, stats),
    }
}

fn normalize_timestamps(
    mut docs: Vec<Value>,
    field: &str,
    policy: CoercionPolicy,
) -> Result<Vec<Value>, EngineError> {
    for doc in &mut docs {
        let raw = get_path(doc, field).unwrap_or(&Value::Null);
        let normalized = match parse_timestamp(raw) {
            Ok(ts) => Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Err(err) if policy.is_strict() => return Err(err.into()),
            // Bucket keys over this field count the exclusion
            Err(_) if raw.is_null() => continue,
            Err(_) => Value::Null,
        };
        set_path(doc, field, normalized);
    }
    Ok(docs)
}

/// Per-group accumulator state.
#[derive(Debug, Clone, Copy)]
enum AccState {
    Sum(Sum),
    Count(i64),
}

impl AccState {
    const fn new(acc: &Accumulator) -> Self {
        match acc {
            Accumulator::Sum(_) => Self::Sum(Sum::Int(0)),
            Accumulator::Count => Self::Count(0),
        }
    }

    fn into_value(self) -> Value {
        match self {
            Self::Sum(sum) => sum.into_value(),
            Self::Count(n) => Value::from(n),
        }
    }
}

/// Groups in first-seen order, keyed by the canonical JSON of their `_id`.
struct Groups<'a> {
    accumulators: &'a [(String, Accumulator)],
    index: HashMap<String, usize>,
    entries: Vec<(Value, Vec<AccState>)>,
}

impl<'a> Groups<'a> {
    fn new(accumulators: &'a [(String, Accumulator)]) -> Self {
        Self {
            accumulators,
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    fn add(
        &mut self,
        key: Value,
        doc: &Value,
        policy: CoercionPolicy,
        stats: &mut CoercionStats,
    ) -> Result<(), EngineError> {
        let slot = key.to_string();
        let position = match self.index.get(&slot) {
            Some(&position) => position,
            None => {
                let states = self.accumulators.iter().map(|(_, acc)| AccState::new(acc)).collect();
                self.entries.push((key, states));
                self.index.insert(slot, self.entries.len() - 1);
                self.entries.len() - 1
            }
        };

        let Some((_, states)) = self.entries.get_mut(position) else {
            return Ok(());
        };
        for ((_, acc), state) in self.accumulators.iter().zip(states.iter_mut()) {
            match (acc, state) {
                (Accumulator::Sum(expr), AccState::Sum(sum)) => {
                    if let Some(value) = expr.eval(doc, policy, stats)? {
                        sum.add(&value);
                    }
                }
                (Accumulator::Count, AccState::Count(n)) => *n += 1,
                _ => {}
            }
        }
        Ok(())
    }

    fn into_rows(self) -> impl Iterator<Item = Value> {
        let names: Vec<String> = self.accumulators.iter().map(|(name, _)| name.clone()).collect();
        self.entries.into_iter().map(move |(key, states)| {
            let mut row = Map::with_capacity(states.len() + 1);
            row.insert("_id".to_string(), key);
            for (name, state) in names.iter().zip(states) {
                row.insert(name.clone(), state.into_value());
            }
            Value::Object(row)
        })
    }
}

fn group(
    docs: Vec<Value>,
    key: &Expr,
    accumulators: &[(String, Accumulator)],
    policy: CoercionPolicy,
    stats: &mut CoercionStats,
) -> Result<Vec<Value>, EngineError> {
    let mut groups = Groups::new(accumulators);
    for doc in &docs {
        if let Some(key) = key.eval(doc, policy, stats)? {
            groups.add(key, doc, policy, stats)?;
        }
    }
    Ok(groups.into_rows().collect())
}

fn bucket(
    docs: Vec<Value>,
    group_by: &Expr,
    boundaries: &[i64],
    default: &Value,
    output: &[(String, Accumulator)],
    policy: CoercionPolicy,
    stats: &mut CoercionStats,
) -> Result<Vec<Value>, EngineError> {
    if boundaries.len() < 2 {
        return Err(EngineError::InvalidStage(
            "bucket needs at least two boundaries".to_string(),
        ));
    }
    if boundaries.windows(2).any(|pair| matches!(pair, [a, b] if a >= b)) {
        return Err(EngineError::InvalidStage(
            "bucket boundaries must be strictly ascending".to_string(),
        ));
    }

    // Route each document to a range slot (0..n-1) or the default slot (n-1).
    let ranges = boundaries.len() - 1;
    let mut slots: Vec<Vec<&Value>> = vec![Vec::new(); ranges + 1];
    for doc in &docs {
        let value = group_by.eval(doc, policy, stats)?.unwrap_or(Value::Null);
        let slot = value
            .as_f64()
            .and_then(|v| range_index(boundaries, v))
            .unwrap_or(ranges);
        if let Some(members) = slots.get_mut(slot) {
            members.push(doc);
        }
    }

    let mut rows = Vec::new();
    for (slot, members) in slots.into_iter().enumerate() {
        if members.is_empty() {
            continue;
        }
        let key = boundaries
            .get(slot)
            .filter(|_| slot < ranges)
            .map_or_else(|| default.clone(), |&lower| Value::from(lower));

        let mut groups = Groups::new(output);
        for doc in members {
            groups.add(key.clone(), doc, policy, stats)?;
        }
        rows.extend(groups.into_rows());
    }
    Ok(rows)
}

/// Index of the range `[boundaries[i], boundaries[i + 1])` containing `value`.
#[allow(clippy::cast_precision_loss)] // Boundaries are small integers
fn range_index(boundaries: &[i64], value: f64) -> Option<usize> {
    boundaries
        .windows(2)
        .position(|pair| matches!(pair, [lower, upper] if value >= *lower as f64 && value < *upper as f64))
}

/// Decode pipeline rows into typed records.
///
/// # Errors
///
/// Returns the `serde_json` error for the first row that does not match `T`.
pub fn decode_rows<T: serde::de::DeserializeOwned>(rows: Vec<Value>) -> serde_json::Result<Vec<T>> {
    rows.into_iter().map(serde_json::from_value).collect()
}

/// The literal `"Other"` default used by range bucketing.
#[must_use]
pub fn other_bucket() -> Value {
    Value::String(BucketKey::OTHER.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use rq_analytics_core::Interval;
    use serde_json::json;

    use super::*;

    fn run(stages: Vec<Stage>, docs: Vec<Value>) -> Vec<Value> {
        Pipeline::new(stages, CoercionPolicy::Lenient)
            .execute(docs)
            .unwrap()
            .rows
    }

    #[test]
    fn test_normalize_timestamp_canonicalizes_and_nulls_garbage() {
        let output = Pipeline::new(
            vec![Stage::normalize_timestamp("created_at")],
            CoercionPolicy::Lenient,
        )
        .execute(vec![
            json!({"created_at": "2024-03-31T22:30:00-04:00"}),
            json!({"created_at": "garbage"}),
            json!({}),
        ])
        .unwrap();

        assert_eq!(output.rows[0]["created_at"], "2024-04-01T02:30:00.000Z");
        assert_eq!(output.rows[1]["created_at"], Value::Null);
        assert_eq!(output.rows[2], json!({}));
        // Exclusions are counted when a bucket key is computed
        assert!(output.stats.is_clean());
    }

    #[test]
    fn test_normalize_timestamp_strict_fails() {
        let result = Pipeline::new(
            vec![Stage::normalize_timestamp("created_at")],
            CoercionPolicy::Strict,
        )
        .execute(vec![json!({"created_at": "garbage"})]);

        assert!(matches!(result, Err(EngineError::Coercion(_))));
    }

    #[test]
    fn test_strict_rejects_null_and_missing_timestamps() {
        for doc in [json!({"created_at": null}), json!({"id": 1})] {
            let result = Pipeline::new(
                vec![Stage::normalize_timestamp("created_at")],
                CoercionPolicy::Strict,
            )
            .execute(vec![json!({"created_at": "2024-05-02T00:00:00Z"}), doc]);

            assert!(matches!(
                result,
                Err(EngineError::Coercion(CoercionError::Timestamp(_)))
            ));
        }
    }

    #[test]
    fn test_lenient_counts_each_excluded_timestamp_once() {
        let output = Pipeline::new(
            vec![
                Stage::normalize_timestamp("created_at"),
                Stage::group(
                    Expr::bucket(Interval::Monthly, "created_at"),
                    &[("count", Accumulator::Count)],
                ),
            ],
            CoercionPolicy::Lenient,
        )
        .execute(vec![
            json!({"created_at": "2024-05-02T00:00:00Z"}),
            json!({"created_at": "garbage"}),
            json!({"created_at": null}),
            json!({}),
        ])
        .unwrap();

        assert_eq!(output.rows, vec![json!({"_id": 5, "count": 1})]);
        assert_eq!(output.stats.invalid_timestamps, 3);
    }

    #[test]
    fn test_group_sum_and_count_in_first_seen_order() {
        let rows = run(
            vec![Stage::group(
                Expr::field("k"),
                &[
                    ("total", Accumulator::Sum(Expr::field("v"))),
                    ("n", Accumulator::Count),
                ],
            )],
            vec![
                json!({"k": "b", "v": 1}),
                json!({"k": "a", "v": 2}),
                json!({"k": "b", "v": 3}),
            ],
        );

        assert_eq!(
            rows,
            vec![
                json!({"_id": "b", "total": 4, "n": 2}),
                json!({"_id": "a", "total": 2, "n": 1}),
            ]
        );
    }

    #[test]
    fn test_group_drops_documents_without_key() {
        let rows = run(
            vec![
                Stage::normalize_timestamp("created_at"),
                Stage::group(
                    Expr::bucket(Interval::Monthly, "created_at"),
                    &[("count", Accumulator::Count)],
                ),
            ],
            vec![
                json!({"created_at": "2024-05-02T00:00:00Z"}),
                json!({"created_at": "not a date"}),
            ],
        );

        assert_eq!(rows, vec![json!({"_id": 5, "count": 1})]);
    }

    #[test]
    fn test_match_gt_respects_type_bracket() {
        let rows = run(
            vec![Stage::Match(Predicate::Gt("n".to_string(), json!(1)))],
            vec![json!({"n": 2}), json!({"n": 1}), json!({"n": "9"}), json!({})],
        );
        assert_eq!(rows, vec![json!({"n": 2})]);
    }

    #[test]
    fn test_match_range_predicates() {
        let docs = vec![json!({"n": 1}), json!({"n": 2}), json!({"n": 3}), json!({"n": "2"})];

        let rows = run(
            vec![Stage::Match(Predicate::Gte("n".to_string(), json!(2)))],
            docs.clone(),
        );
        assert_eq!(rows, vec![json!({"n": 2}), json!({"n": 3})]);

        let rows = run(
            vec![Stage::Match(Predicate::And(vec![
                Predicate::Gte("n".to_string(), json!(1)),
                Predicate::Lt("n".to_string(), json!(3)),
            ]))],
            docs,
        );
        assert_eq!(rows, vec![json!({"n": 1}), json!({"n": 2})]);
    }

    #[test]
    fn test_group_by_literal_key_totals_everything() {
        let rows = run(
            vec![Stage::group(
                Expr::Literal(Value::Null),
                &[("total", Accumulator::Sum(Expr::field("v")))],
            )],
            vec![json!({"v": 1}), json!({"v": 2.5}), json!({})],
        );
        assert_eq!(rows, vec![json!({"_id": null, "total": 3.5})]);
    }

    #[test]
    fn test_match_exists_and_eq() {
        let docs = vec![
            json!({"customer_id": 1, "s": "x"}),
            json!({"customer_id": null, "s": "x"}),
            json!({"s": "y"}),
        ];
        let rows = run(
            vec![Stage::Match(Predicate::And(vec![
                Predicate::Exists("customer_id".to_string()),
                Predicate::Eq("s".to_string(), json!("x")),
            ]))],
            docs,
        );
        assert_eq!(rows, vec![json!({"customer_id": 1, "s": "x"})]);
    }

    #[test]
    fn test_sort_is_stable_and_ordered() {
        let rows = run(
            vec![Stage::sort_ascending("_id")],
            vec![
                json!({"_id": 12, "tag": "a"}),
                json!({"_id": null}),
                json!({"_id": 2}),
                json!({"_id": 12, "tag": "b"}),
            ],
        );
        let ids: Vec<&Value> = rows.iter().map(|r| &r["_id"]).collect();
        assert_eq!(ids, vec![&json!(null), &json!(2), &json!(12), &json!(12)]);
        assert_eq!(rows[2]["tag"], "a");
        assert_eq!(rows[3]["tag"], "b");
    }

    #[test]
    fn test_sort_descending() {
        let rows = run(
            vec![Stage::Sort {
                field: "n".to_string(),
                direction: SortDirection::Descending,
            }],
            vec![json!({"n": 1}), json!({"n": 3}), json!({"n": 2})],
        );
        assert_eq!(rows, vec![json!({"n": 3}), json!({"n": 2}), json!({"n": 1})]);
    }

    #[test]
    fn test_bucket_ranges_and_default() {
        let rows = run(
            vec![Stage::Bucket {
                group_by: Expr::field("_id"),
                boundaries: vec![0, 1, 2, 3, 4],
                default: other_bucket(),
                output: named(&[("total", Accumulator::Sum(Expr::field("v")))]),
            }],
            vec![
                json!({"_id": 12, "v": 1.0}),
                json!({"_id": 1, "v": 2.0}),
                json!({"_id": 5, "v": 4.0}),
                json!({"_id": 2, "v": 8.0}),
                json!({"_id": "x", "v": 16.0}),
            ],
        );

        assert_eq!(
            rows,
            vec![
                json!({"_id": 1, "total": 2.0}),
                json!({"_id": 2, "total": 8.0}),
                json!({"_id": "Other", "total": 21.0}),
            ]
        );
    }

    #[test]
    fn test_bucket_upper_boundary_is_exclusive() {
        let rows = run(
            vec![Stage::Bucket {
                group_by: Expr::field("_id"),
                boundaries: vec![0, 1, 2, 3, 4],
                default: other_bucket(),
                output: named(&[("n", Accumulator::Count)]),
            }],
            vec![json!({"_id": 0}), json!({"_id": 3.5}), json!({"_id": 4})],
        );
        assert_eq!(
            rows,
            vec![
                json!({"_id": 0, "n": 1}),
                json!({"_id": 3, "n": 1}),
                json!({"_id": "Other", "n": 1}),
            ]
        );
    }

    #[test]
    fn test_bucket_rejects_bad_boundaries() {
        for boundaries in [vec![1], vec![0, 2, 2], vec![3, 1]] {
            let result = Pipeline::new(
                vec![Stage::Bucket {
                    group_by: Expr::field("_id"),
                    boundaries,
                    default: other_bucket(),
                    output: Vec::new(),
                }],
                CoercionPolicy::Lenient,
            )
            .execute(vec![json!({"_id": 1})]);
            assert!(matches!(result, Err(EngineError::InvalidStage(_))));
        }
    }

    #[test]
    fn test_empty_input_produces_no_rows() {
        let rows = run(
            vec![Stage::group(Expr::field("k"), &[("n", Accumulator::Count)])],
            Vec::new(),
        );
        assert!(rows.is_empty());
    }
}
