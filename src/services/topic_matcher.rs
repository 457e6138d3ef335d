//! Topic matching. Pure functions,
//! no state: the broker owns the subscription table, this module only
//! answers "does this pattern match this topic".
//!
//! Patterns are dot-delimited segments. `*` matches exactly one segment.
//! `**` matches zero or more trailing segments and is only legal as the
//! final segment of a pattern.

use crate::domain::errors::{MeshError, MeshResult};

/// Validate a subscription pattern: non-empty, no empty segments, and
/// `**` only appears as the last segment.
pub fn validate_pattern(pattern: &str) -> MeshResult<()> {
    if pattern.trim().is_empty() {
        return Err(MeshError::InvalidPattern("pattern must not be empty".into()));
    }
    let segments: Vec<&str> = pattern.split('.').collect();
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return Err(MeshError::InvalidPattern(format!(
                "pattern {pattern:?} has an empty segment"
            )));
        }
        if *segment == "**" && i != segments.len() - 1 {
            return Err(MeshError::InvalidPattern(format!(
                "pattern {pattern:?}: `**` is only valid as the final segment"
            )));
        }
    }
    Ok(())
}

/// Whether `topic` matches `pattern`. Assumes `pattern` has
/// already passed [`validate_pattern`]; an invalid pattern simply never
/// matches.
pub fn matches(pattern: &str, topic: &str) -> bool {
    let pattern_segments: Vec<&str> = pattern.split('.').collect();
    let topic_segments: Vec<&str> = topic.split('.').collect();
    matches_segments(&pattern_segments, &topic_segments)
}

fn matches_segments(pattern: &[&str], topic: &[&str]) -> bool {
    match pattern.first() {
        None => topic.is_empty(),
        Some(&"**") => true, // only legal at the end; matches everything remaining
        Some(&"*") => {
            !topic.is_empty() && matches_segments(&pattern[1..], &topic[1..])
        }
        Some(literal) => {
            topic.first() == Some(literal) && matches_segments(&pattern[1..], &topic[1..])
        }
    }
}
