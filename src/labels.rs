//! Scenario labels and label filters
//!
//! Every registered scenario carries labels along five dimensions. Three of
//! them (priority, stability, scenario type) are mandatory so that CI can
//! always select by them.
//!
//! Filters use a small boolean syntax: `,` or `||` is OR, `&&` is AND and a
//! leading `!` negates a label. AND binds tighter than OR, so
//! `tier0 && !slow, informing` selects tier0 scenarios that are not slow,
//! plus every informing scenario.

pub const TIER0: &str = "tier0";
pub const TIER1: &str = "tier1";
pub const TIER2: &str = "tier2";

pub const STABLE: &str = "stable";
pub const INFORMING: &str = "informing";
pub const FLAKY: &str = "flaky";

pub const HAPPY_PATH: &str = "happy-path";
pub const NEGATIVE: &str = "negative";
pub const SCALE: &str = "scale";

pub const LIFECYCLE: &str = "lifecycle";
pub const UPGRADE: &str = "upgrade";

pub const SERIAL: &str = "serial";
pub const DISRUPTIVE: &str = "disruptive";
pub const SLOW: &str = "slow";

pub const PRIORITY_LABELS: &[&str] = &[TIER0, TIER1, TIER2];
pub const STABILITY_LABELS: &[&str] = &[STABLE, INFORMING, FLAKY];
pub const SCENARIO_LABELS: &[&str] = &[HAPPY_PATH, NEGATIVE, SCALE];
pub const FUNCTIONALITY_LABELS: &[&str] = &[LIFECYCLE, UPGRADE];
pub const CONSTRAINT_LABELS: &[&str] = &[SERIAL, DISRUPTIVE, SLOW];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabelError {
    #[error("missing required {dimension} label (one of: {})", .allowed.join(", "))]
    MissingDimension {
        dimension: &'static str,
        allowed: &'static [&'static str],
    },

    #[error("unknown label '{0}'")]
    Unknown(String),

    #[error("invalid label filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },
}

/// Check that `labels` are all known and cover the required dimensions
///
/// Reports the first problem found: unknown labels first, then the missing
/// dimension in priority, stability, scenario order.
pub fn validate_labels(labels: &[&str]) -> Result<(), LabelError> {
    let known = [
        PRIORITY_LABELS,
        STABILITY_LABELS,
        SCENARIO_LABELS,
        FUNCTIONALITY_LABELS,
        CONSTRAINT_LABELS,
    ];
    if let Some(unknown) = labels
        .iter()
        .find(|l| !known.iter().any(|dim| dim.contains(*l)))
    {
        return Err(LabelError::Unknown((*unknown).to_string()));
    }

    let required = [
        ("priority", PRIORITY_LABELS),
        ("stability", STABILITY_LABELS),
        ("scenario", SCENARIO_LABELS),
    ];
    for (dimension, allowed) in required {
        if !labels.iter().any(|l| allowed.contains(l)) {
            return Err(LabelError::MissingDimension { dimension, allowed });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Term {
    label: String,
    negated: bool,
}

/// Parsed label filter in disjunctive normal form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelFilter {
    any_of: Vec<Vec<Term>>,
}

impl LabelFilter {
    /// Parse a filter expression; an empty expression matches everything
    pub fn parse(expr: &str) -> Result<Self, LabelError> {
        let invalid = |reason: &str| LabelError::InvalidFilter {
            filter: expr.to_string(),
            reason: reason.to_string(),
        };

        if expr.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut any_of = Vec::new();
        for clause in expr.split(',').flat_map(|c| c.split("||")) {
            let mut all_of = Vec::new();
            for raw in clause.split("&&") {
                let raw = raw.trim();
                let (negated, label) = match raw.strip_prefix('!') {
                    Some(rest) => (true, rest.trim()),
                    None => (false, raw),
                };
                if label.is_empty() {
                    return Err(invalid("empty label"));
                }
                if label.contains(|c: char| c.is_whitespace() || "!()&|".contains(c)) {
                    return Err(invalid("unsupported syntax"));
                }
                all_of.push(Term {
                    label: label.to_string(),
                    negated,
                });
            }
            any_of.push(all_of);
        }
        Ok(Self { any_of })
    }

    pub fn is_empty(&self) -> bool {
        self.any_of.is_empty()
    }

    pub fn matches(&self, labels: &[&str]) -> bool {
        if self.any_of.is_empty() {
            return true;
        }
        self.any_of.iter().any(|all_of| {
            all_of
                .iter()
                .all(|t| labels.contains(&t.label.as_str()) != t.negated)
        })
    }
}
