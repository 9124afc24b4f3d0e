//! Topic names and topic filters.
//!
//! # Wildcard semantics
//!
//! - `+` (single-level): matches exactly one topic level
//! - `#` (multi-level): matches zero or more remaining levels, only as the
//!   last level of a filter

use crate::utils::error::{Error, Result};

/// Checks a subscription filter: non-empty, `#` only as the last level and
/// wildcards only as whole levels.
pub fn validate_filter(filter: &str) -> Result<()> {
    if filter.is_empty() {
        return Err(Error::Configuration("empty topic filter".into()));
    }
    let levels: Vec<&str> = filter.split('/').collect();
    for (i, level) in levels.iter().enumerate() {
        if level.contains('#') && (*level != "#" || i != levels.len() - 1) {
            return Err(Error::Configuration(format!(
                "'#' must be the last level of topic filter '{filter}'"
            )));
        }
        if level.contains('+') && *level != "+" {
            return Err(Error::Configuration(format!(
                "'+' must occupy a whole level of topic filter '{filter}'"
            )));
        }
    }
    Ok(())
}

/// Checks a topic a message is published to: non-empty, no wildcards.
pub fn validate_topic_name(topic: &str) -> Result<()> {
    if topic.is_empty() {
        return Err(Error::Configuration("empty topic name".into()));
    }
    if topic.contains(['+', '#']) {
        return Err(Error::Configuration(format!(
            "topic name '{topic}' must not contain wildcards"
        )));
    }
    Ok(())
}

/// Whether `topic` matches `filter`.
pub fn matches(filter: &str, topic: &str) -> bool {
    let mut topic_levels = topic.split('/');
    let mut filter_levels = filter.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            // "a/#" also matches the parent level "a"
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => continue,
            (Some(f), Some(t)) if f == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}
