//! Condition predicates
//!
//! Pure helpers over condition lists. Every waiter and verifier in the
//! crate decides convergence through these functions.

use chrono::{DateTime, Utc};

use crate::model::{Condition, ConditionStatus};

pub const APPLIED: &str = "Applied";
pub const AVAILABLE: &str = "Available";
pub const HEALTH: &str = "Health";
pub const READY: &str = "Ready";

/// Condition types every adapter must report as True once it has converged
pub const ADAPTER_CONDITION_TYPES: [&str; 3] = [APPLIED, AVAILABLE, HEALTH];

/// Returns true iff some condition has the given type and status
pub fn has_condition(conditions: &[Condition], type_: &str, status: ConditionStatus) -> bool {
    conditions
        .iter()
        .any(|c| c.type_ == type_ && c.status == status)
}

/// First condition of the given type, if any
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Returns true iff both reason and message are present and non-empty
pub fn has_non_empty_reason_and_message(condition: &Condition) -> bool {
    let non_empty = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
    non_empty(&condition.reason) && non_empty(&condition.message)
}

/// Returns true iff every listed type is present with status True
pub fn all_conditions_true(conditions: &[Condition], types: &[&str]) -> bool {
    types
        .iter()
        .all(|t| has_condition(conditions, t, ConditionStatus::True))
}

/// Returns true iff any listed type is present with status False
pub fn any_condition_false(conditions: &[Condition], types: &[&str]) -> bool {
    types
        .iter()
        .any(|t| has_condition(conditions, t, ConditionStatus::False))
}

/// Parent-level condition type that mirrors an adapter's success
///
/// `clusters-namespace` maps to `ClustersNamespaceSuccessful`. Empty
/// hyphen segments are dropped.
pub fn adapter_condition_type(adapter: &str) -> String {
    let mut out = String::with_capacity(adapter.len() + "Successful".len());
    for segment in adapter.split('-').filter(|s| !s.is_empty()) {
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out.push_str("Successful");
    out
}

/// Compact `Type=Status` rendering used in diagnostics
pub fn describe_conditions(conditions: &[Condition]) -> String {
    if conditions.is_empty() {
        return "none".to_string();
    }
    conditions
        .iter()
        .map(|c| format!("{}={}", c.type_, c.status))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Absent timestamps and anything at or before the Unix epoch count as unset
pub(crate) fn is_zero_time(time: Option<&DateTime<Utc>>) -> bool {
    time.map_or(true, |t| t.timestamp() <= 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conds() -> Vec<Condition> {
        vec![
            Condition::new(APPLIED, ConditionStatus::True),
            Condition::new(AVAILABLE, ConditionStatus::False),
            Condition::new(HEALTH, ConditionStatus::Unknown),
        ]
    }

    #[test]
    fn test_has_condition_matches_type_and_status() {
        let c = conds();
        assert!(has_condition(&c, APPLIED, ConditionStatus::True));
        assert!(!has_condition(&c, APPLIED, ConditionStatus::False));
        assert!(has_condition(&c, HEALTH, ConditionStatus::Unknown));
    }

    #[test]
    fn test_has_condition_missing_type_is_false() {
        assert!(!has_condition(&conds(), READY, ConditionStatus::True));
        assert!(!has_condition(&[], READY, ConditionStatus::False));
    }

    #[test]
    fn test_reason_and_message_must_both_be_non_empty() {
        let full = Condition::new(READY, ConditionStatus::True)
            .reason("AllGood")
            .message("ready");
        assert!(has_non_empty_reason_and_message(&full));

        let empty_message = Condition::new(READY, ConditionStatus::True)
            .reason("AllGood")
            .message("");
        assert!(!has_non_empty_reason_and_message(&empty_message));

        let no_reason = Condition::new(READY, ConditionStatus::True).message("ready");
        assert!(!has_non_empty_reason_and_message(&no_reason));
    }

    #[test]
    fn test_all_true_and_any_false() {
        let c = conds();
        assert!(all_conditions_true(&c, &[APPLIED]));
        assert!(!all_conditions_true(&c, &ADAPTER_CONDITION_TYPES));
        assert!(any_condition_false(&c, &ADAPTER_CONDITION_TYPES));
        assert!(!any_condition_false(&c, &[APPLIED, HEALTH]));
        assert!(all_conditions_true(&c, &[]));
    }

    #[test]
    fn test_adapter_condition_type() {
        assert_eq!(
            adapter_condition_type("clusters-namespace"),
            "ClustersNamespaceSuccessful"
        );
        assert_eq!(adapter_condition_type("cl-job"), "ClJobSuccessful");
        assert_eq!(
            adapter_condition_type("nodepools--configmap-"),
            "NodepoolsConfigmapSuccessful"
        );
    }

    #[test]
    fn test_zero_time() {
        assert!(is_zero_time(None));
        assert!(is_zero_time(DateTime::from_timestamp(0, 0).as_ref()));
        assert!(!is_zero_time(Some(&Utc::now())));
    }

    #[test]
    fn test_describe_conditions() {
        assert_eq!(describe_conditions(&[]), "none");
        assert_eq!(
            describe_conditions(&conds()),
            "Applied=True Available=False Health=Unknown"
        );
    }
}
