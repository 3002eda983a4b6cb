//! Label selector and object name validation
//!
//! Inputs are checked before any call to the cluster API so a malformed
//! selector or namespace fails fast instead of matching something
//! unexpected.

use std::collections::BTreeMap;

use super::ResourceError;

const MAX_LABEL_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

/// Render labels as an equality selector, keys sorted
///
/// `{"b": "2", "a": "1"}` becomes `a=1,b=2`.
pub fn build_label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Validate a namespace name as an RFC 1123 DNS label
pub fn validate_namespace_name(name: &str) -> Result<(), ResourceError> {
    let invalid = |reason: &str| ResourceError::InvalidName {
        value: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.len() > MAX_LABEL_LEN {
        return Err(invalid("must be no more than 63 characters"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid(
            "must consist of lower case alphanumeric characters or '-'",
        ));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(invalid("must start and end with an alphanumeric character"));
    }
    Ok(())
}

/// Validate an equality-based label selector (`k=v[,k=v...]`)
///
/// Empty selectors are rejected since they would match every object.
pub fn validate_label_selector(selector: &str) -> Result<(), ResourceError> {
    let invalid = |reason: String| ResourceError::InvalidSelector {
        value: selector.to_string(),
        reason,
    };

    if selector.trim().is_empty() {
        return Err(invalid("must not be empty".to_string()));
    }

    for term in selector.split(',') {
        let Some((key, value)) = term.split_once('=') else {
            return Err(invalid(format!("term '{term}' is not of the form key=value")));
        };
        validate_key(key).map_err(|reason| invalid(format!("key '{key}' {reason}")))?;
        validate_value(value).map_err(|reason| invalid(format!("value '{value}' {reason}")))?;
    }
    Ok(())
}

fn validate_key(key: &str) -> Result<(), &'static str> {
    let name = match key.split_once('/') {
        Some((prefix, name)) => {
            if prefix.is_empty() || prefix.len() > MAX_PREFIX_LEN {
                return Err("has an invalid prefix length");
            }
            if !prefix.split('.').all(is_dns_label) {
                return Err("has a prefix that is not a DNS subdomain");
            }
            name
        }
        None => key,
    };

    if name.is_empty() {
        return Err("must have a non-empty name");
    }
    validate_name_segment(name)
}

fn validate_value(value: &str) -> Result<(), &'static str> {
    if value.is_empty() {
        return Ok(());
    }
    validate_name_segment(value)
}

fn validate_name_segment(s: &str) -> Result<(), &'static str> {
    if s.len() > MAX_LABEL_LEN {
        return Err("must be no more than 63 characters");
    }
    if !s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err("contains characters other than alphanumerics, '-', '_' or '.'");
    }
    let bounded = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    if !bounded(s.chars().next()) || !bounded(s.chars().last()) {
        return Err("must start and end with an alphanumeric character");
    }
    Ok(())
}

fn is_dns_label(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_LABEL_LEN
        && s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !s.starts_with('-')
        && !s.ends_with('-')
}
