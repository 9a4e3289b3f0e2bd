//! Compiled retention policies and the validated policy set.

use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;
use thiserror::Error;
use tracing::{error, info};

use common::config::RetentionRule;

use crate::period::{Period, PeriodError};
use crate::template::{self, DateFormat, TemplateError};

/// A compiled retention policy for one family of time-partitioned indices.
///
/// Immutable once compiled; configuration reloads build a fresh policy set
/// rather than mutating policies in place.
#[derive(Debug, Clone)]
pub struct Policy {
    /// Diagnostic label from the configuration.
    pub name: String,
    /// Raw name template as declared.
    pub template: String,
    /// Raw close threshold as declared.
    pub close_after: String,
    /// Raw delete threshold as declared.
    pub delete_after: String,
    /// Compiled close threshold.
    pub close_period: Period,
    /// Compiled delete threshold.
    pub delete_period: Period,
    /// Parser/renderer for the timestamp segment of matching names.
    pub date_format: DateFormat,
    /// Anchored pattern whose capture group 1 is the timestamp segment.
    pub name_pattern: Regex,
}

impl Policy {
    /// Compiles one raw configuration entry into a policy.
    ///
    /// The close/delete ordering is deliberately not validated: both
    /// thresholds are evaluated independently at classification time.
    pub fn compile(rule: &RetentionRule) -> Result<Self, PolicyError> {
        let close_period =
            Period::parse(&rule.close).map_err(|source| PolicyError::InvalidDuration {
                policy: rule.name.clone(),
                field: "close",
                source,
            })?;
        let delete_period =
            Period::parse(&rule.delete).map_err(|source| PolicyError::InvalidDuration {
                policy: rule.name.clone(),
                field: "delete",
                source,
            })?;
        let compiled =
            template::compile(&rule.pattern).map_err(|source| PolicyError::InvalidTemplate {
                policy: rule.name.clone(),
                source,
            })?;

        Ok(Self {
            name: rule.name.clone(),
            template: rule.pattern.clone(),
            close_after: rule.close.clone(),
            delete_after: rule.delete.clone(),
            close_period,
            delete_period,
            date_format: compiled.date_format,
            name_pattern: compiled.name_pattern,
        })
    }
}

/// Immutable snapshot of all valid policies from one configuration load.
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    policies: Vec<Policy>,
    smallest_period: Option<Period>,
}

impl PolicySet {
    /// Compiles every rule into the set, in declaration order.
    ///
    /// A rule that fails compilation is reported once (name and reason) and
    /// excluded; remaining rules are still processed. One malformed family
    /// must never block housekeeping for well-formed families.
    ///
    /// `reference` anchors the projection used to pick `smallest_period`,
    /// since calendar periods have no fixed length to compare by.
    pub fn build(rules: &[RetentionRule], reference: DateTime<Utc>) -> Self {
        let mut policies = Vec::with_capacity(rules.len());

        for rule in rules {
            match Policy::compile(rule) {
                Ok(policy) => {
                    info!(
                        policy = %policy.name,
                        pattern = %policy.template,
                        timestamp_format = %policy.date_format.token(),
                        close_after = %policy.close_period,
                        delete_after = %policy.delete_period,
                        "Retention policy compiled"
                    );
                    policies.push(policy);
                }
                Err(e) => {
                    error!(policy = %rule.name, error = %e, "Invalid retention policy, this entry will be ignored");
                }
            }
        }

        let smallest_period = smallest_period(&policies, reference);
        Self {
            policies,
            smallest_period,
        }
    }

    /// Valid policies, in declaration order.
    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    /// The shortest close/delete period across all valid policies, projected
    /// from the build-time reference instant. `None` for an empty set.
    ///
    /// This is a scheduling hint: polling slower than the smallest period
    /// lets indices outlive their thresholds between cycles. Nothing is
    /// enforced from it.
    pub fn smallest_period(&self) -> Option<Period> {
        self.smallest_period
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }
}

/// Minimum of all close/delete periods by projected duration, first-seen
/// period winning ties.
fn smallest_period(policies: &[Policy], reference: DateTime<Utc>) -> Option<Period> {
    let mut smallest: Option<(Period, TimeDelta)> = None;

    for policy in policies {
        for period in [policy.close_period, policy.delete_period] {
            let Ok(duration) = period.project_from(reference) else {
                continue;
            };
            match smallest {
                Some((_, best)) if duration >= best => {}
                _ => smallest = Some((period, duration)),
            }
        }
    }

    smallest.map(|(period, _)| period)
}

/// A configuration entry that cannot be compiled into a policy.
#[derive(Error, Debug)]
pub enum PolicyError {
    /// A close/delete duration expression does not parse.
    #[error("[{policy}] invalid '{field}' duration: {source}")]
    InvalidDuration {
        policy: String,
        field: &'static str,
        source: PeriodError,
    },

    /// The name template does not compile.
    #[error("[{policy}] {source}")]
    InvalidTemplate {
        policy: String,
        source: TemplateError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn rule(name: &str, pattern: &str, close: &str, delete: &str) -> RetentionRule {
        RetentionRule {
            name: name.to_string(),
            pattern: pattern.to_string(),
            close: close.to_string(),
            delete: delete.to_string(),
        }
    }

    #[test]
    fn test_compile_valid_rule() {
        let policy =
            Policy::compile(&rule("logstash", "logstash-%{YYYY.MM.dd}", "3 days", "7 days"))
                .unwrap();

        assert_eq!(policy.name, "logstash");
        assert_eq!(policy.close_period, Period::parse("3 days").unwrap());
        assert_eq!(policy.delete_period, Period::parse("7 days").unwrap());
        assert!(policy.name_pattern.is_match("logstash-2024.01.09"));
    }

    #[test]
    fn test_compile_rejects_bad_duration() {
        let err = Policy::compile(&rule("bad", "logs-%{YYYY.MM.dd}", "soon", "7 days"))
            .unwrap_err();
        assert!(matches!(
            err,
            PolicyError::InvalidDuration { field: "close", .. }
        ));
        assert!(err.to_string().contains("[bad]"));
    }

    #[test]
    fn test_compile_rejects_missing_placeholder() {
        let err = Policy::compile(&rule("static", "logs-static", "3 days", "7 days")).unwrap_err();
        assert!(matches!(err, PolicyError::InvalidTemplate { .. }));
    }

    #[test]
    fn test_delete_shorter_than_close_is_permitted() {
        // Ordering between the thresholds is not validated
        assert!(Policy::compile(&rule("odd", "logs-%{YYYY.MM.dd}", "7 days", "3 days")).is_ok());
    }

    #[test]
    fn test_build_drops_invalid_entries_and_keeps_the_rest() {
        let rules = vec![
            rule("good-1", "logs-%{YYYY.MM.dd}", "3 days", "7 days"),
            rule("bad-duration", "audit-%{YYYY.MM.dd}", "not a period", "7 days"),
            rule("bad-template", "metrics-daily", "3 days", "7 days"),
            rule("good-2", "metrics-%{YYYY.MM}", "1 month", "6 months"),
        ];

        let set = PolicySet::build(&rules, utc("2024-01-10T00:00:00Z"));

        assert_eq!(set.len(), 2);
        assert_eq!(set.policies()[0].name, "good-1");
        assert_eq!(set.policies()[1].name, "good-2");
    }

    #[test]
    fn test_empty_set_has_no_smallest_period() {
        let set = PolicySet::build(&[], utc("2024-01-10T00:00:00Z"));
        assert!(set.is_empty());
        assert!(set.smallest_period().is_none());

        let all_invalid = vec![rule("bad", "logs-static", "3 days", "7 days")];
        let set = PolicySet::build(&all_invalid, utc("2024-01-10T00:00:00Z"));
        assert!(set.smallest_period().is_none());
    }

    #[test]
    fn test_smallest_period_spans_close_and_delete() {
        let rules = vec![
            rule("weekly", "a-%{YYYY.MM.dd}", "2 weeks", "1 month"),
            rule("fast", "b-%{YYYY.MM.dd}", "12 hours", "3 days"),
        ];

        let set = PolicySet::build(&rules, utc("2024-01-10T00:00:00Z"));
        assert_eq!(set.smallest_period(), Some(Period::parse("12 hours").unwrap()));
    }

    #[test]
    fn test_smallest_period_tie_keeps_first_seen() {
        // "1 week" and "7 days" project to the same duration; the earlier
        // declaration must win.
        let rules = vec![
            rule("first", "a-%{YYYY.MM.dd}", "1 week", "1 month"),
            rule("second", "b-%{YYYY.MM.dd}", "7 days", "1 month"),
        ];

        let set = PolicySet::build(&rules, utc("2024-01-10T00:00:00Z"));
        assert_eq!(set.smallest_period(), Some(Period::parse("1 week").unwrap()));
    }
}
