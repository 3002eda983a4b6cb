//! Adapter-set aggregation
//!
//! Checks that every required adapter reported exactly one status for a
//! parent resource and that each report is complete, current and healthy.
//! Missing or duplicated adapters fail fast. Field-level problems are
//! collected across all adapters so one failure shows everything wrong.

use std::fmt;

use tracing::debug;

use crate::condition::{
    adapter_condition_type, find_condition, has_condition, is_zero_time, ADAPTER_CONDITION_TYPES,
};
use crate::model::{AdapterStatus, Condition, ConditionStatus};

/// One field-level problem with one adapter's report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub adapter: String,
    pub detail: String,
}

impl Violation {
    fn new(adapter: &str, detail: impl Into<String>) -> Self {
        Self {
            adapter: adapter.to_string(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.adapter, self.detail)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("required adapter '{0}' has not reported a status")]
    Missing(String),

    #[error("expected exactly one status for adapter '{adapter}', found {count}")]
    Duplicate { adapter: String, count: usize },

    #[error("adapter statuses failed validation with {} violation(s):\n{}", .0.len(), render_violations(.0))]
    Invalid(Vec<Violation>),

    #[error("parent condition {condition} is not True (observed: {observed})")]
    NotReflected { condition: String, observed: String },
}

fn render_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Verify every adapter in `required` reported a complete status at `generation`
///
/// Adapters not listed in `required` are ignored. For each required adapter:
/// exactly one report exists, created/last-report timestamps are set,
/// `observed_generation` equals `generation`, Applied/Available/Health are
/// True, and every condition carries a reason, message and transition time.
pub fn verify_required_adapters(
    statuses: &[AdapterStatus],
    required: &[String],
    generation: i64,
) -> Result<(), AdapterError> {
    let mut reports = Vec::with_capacity(required.len());
    for name in required {
        let mut matching = statuses.iter().filter(|s| &s.adapter == name);
        let Some(first) = matching.next() else {
            return Err(AdapterError::Missing(name.clone()));
        };
        let extra = matching.count();
        if extra > 0 {
            return Err(AdapterError::Duplicate {
                adapter: name.clone(),
                count: extra + 1,
            });
        }
        reports.push(first);
    }

    let violations: Vec<Violation> = reports
        .into_iter()
        .flat_map(|s| check_adapter(s, generation))
        .collect();

    if violations.is_empty() {
        debug!(adapters = required.len(), generation = generation, "Required adapters verified");
        Ok(())
    } else {
        Err(AdapterError::Invalid(violations))
    }
}

fn check_adapter(status: &AdapterStatus, generation: i64) -> Vec<Violation> {
    let name = status.adapter.as_str();
    let mut violations = Vec::new();

    if is_zero_time(status.created_time.as_ref()) {
        violations.push(Violation::new(name, "createdTime is not set"));
    }
    if is_zero_time(status.last_report_time.as_ref()) {
        violations.push(Violation::new(name, "lastReportTime is not set"));
    }
    if status.observed_generation != generation {
        violations.push(Violation::new(
            name,
            format!(
                "observedGeneration is {}, expected {}",
                status.observed_generation, generation
            ),
        ));
    }

    for type_ in ADAPTER_CONDITION_TYPES {
        if !has_condition(&status.conditions, type_, ConditionStatus::True) {
            violations.push(Violation::new(
                name,
                describe_unmet(&status.conditions, type_),
            ));
        }
    }

    let extra = extra_condition_types(&status.conditions);
    if !extra.is_empty() {
        debug!(adapter = %name, types = ?extra, "Adapter reports conditions outside Applied/Available/Health");
    }

    for condition in &status.conditions {
        violations.extend(check_condition_fields(name, condition));
    }

    violations
}

/// Condition types beyond Applied/Available/Health
///
/// Tolerated, but still held to the reason, message and transition time rules.
fn extra_condition_types(conditions: &[Condition]) -> Vec<&str> {
    conditions
        .iter()
        .map(|c| c.type_.as_str())
        .filter(|t| !ADAPTER_CONDITION_TYPES.contains(t))
        .collect()
}

fn describe_unmet(conditions: &[Condition], type_: &str) -> String {
    match find_condition(conditions, type_) {
        None => format!("condition {type_} is missing"),
        Some(c) => match c.reason.as_deref().filter(|r| !r.is_empty()) {
            Some(reason) => format!("condition {type_} is {} (reason: {reason})", c.status),
            None => format!("condition {type_} is {}", c.status),
        },
    }
}

fn check_condition_fields(adapter: &str, condition: &Condition) -> Vec<Violation> {
    let mut violations = Vec::new();
    let type_ = &condition.type_;

    if condition.reason.as_deref().map_or(true, str::is_empty) {
        violations.push(Violation::new(adapter, format!("condition {type_} has an empty reason")));
    }
    if condition.message.as_deref().map_or(true, str::is_empty) {
        violations.push(Violation::new(adapter, format!("condition {type_} has an empty message")));
    }
    if is_zero_time(condition.last_transition_time.as_ref()) {
        violations.push(Violation::new(
            adapter,
            format!("condition {type_} has no lastTransitionTime"),
        ));
    }
    violations
}

/// Verify a parent resource mirrors every adapter's success
///
/// For each adapter the parent must carry `<PascalAdapter>Successful=True`.
pub fn verify_parent_reflects_adapters(
    parent_conditions: &[Condition],
    adapters: &[String],
) -> Result<(), AdapterError> {
    for adapter in adapters {
        let condition = adapter_condition_type(adapter);
        if !has_condition(parent_conditions, &condition, ConditionStatus::True) {
            let observed = find_condition(parent_conditions, &condition)
                .map_or_else(|| "missing".to_string(), |c| c.status.to_string());
            return Err(AdapterError::NotReflected {
                condition,
                observed,
            });
        }
    }
    Ok(())
}
