//! Index name classification against a compiled policy.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};

use crate::period::Period;
use crate::policy::Policy;

/// Lifecycle action for an index under one policy.
///
/// Driven purely by elapsed age, an index moves forward through
/// `Keep → Close → Delete` and never back; each cycle recomputes the
/// classification from scratch, so missed cycles are harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionAction {
    /// Younger than both thresholds; leave the index alone.
    Keep,
    /// Past the close threshold but not the delete threshold.
    Close,
    /// Past the delete threshold. Deletion subsumes closing.
    Delete,
}

impl fmt::Display for RetentionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RetentionAction::Keep => "keep",
            RetentionAction::Close => "close",
            RetentionAction::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Classifies an index name against one policy at instant `now`.
///
/// Returns `None` when the name is not a member of the policy's family:
/// either the literal shape does not match, or the captured timestamp
/// segment does not parse. A malformed timestamp is deliberately not an
/// error; it must never abort a cleanup cycle.
///
/// Pure function over its inputs; no side effects.
pub fn classify(policy: &Policy, index_name: &str, now: DateTime<Utc>) -> Option<RetentionAction> {
    let captures = policy.name_pattern.captures(index_name)?;
    let timestamp = policy.date_format.parse(captures.get(1)?.as_str())?;
    let age = now - timestamp;

    // Both thresholds are anchored at the index's own timestamp so that
    // month/year lengths resolve against the correct historical date.
    // Delete is checked first: an index old enough for both is deleted.
    if exceeds(policy.delete_period, timestamp, age) {
        return Some(RetentionAction::Delete);
    }
    if exceeds(policy.close_period, timestamp, age) {
        return Some(RetentionAction::Close);
    }
    Some(RetentionAction::Keep)
}

/// A threshold that fails to project is unreachably far away, so it is
/// never considered exceeded.
fn exceeds(period: Period, anchor: DateTime<Utc>, age: TimeDelta) -> bool {
    period
        .project_from(anchor)
        .is_ok_and(|threshold| age >= threshold)
}
