//! Cleanup cycle execution.
//!
//! One cycle snapshots the live index names, classifies each against the
//! policy set, and executes (or, in dry-run, logs) the resulting close and
//! delete actions. Classification is pure; everything effectful goes through
//! the [`IndexStore`] boundary.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::cluster::{ClusterError, IndexStore};
use crate::matcher::{self, RetentionAction};
use crate::metrics::CuratorMetrics;
use crate::policy::{Policy, PolicySet};

/// Shared, atomically swappable policy snapshot.
///
/// Cycles clone the inner `Arc` once at cycle start; a configuration reload
/// publishes a fresh set by replacing the inner `Arc`, never by mutating the
/// set a running cycle holds.
pub type SharedPolicySet = Arc<RwLock<Arc<PolicySet>>>;

/// Outcome of one cleanup cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleResult {
    /// Index names in the cluster snapshot.
    pub indices_evaluated: usize,
    /// Names matched by some policy (including those classified Keep).
    pub indices_matched: usize,
    /// Close actions taken, or that would be taken in dry-run.
    pub indices_closed: usize,
    /// Delete actions taken, or that would be taken in dry-run.
    pub indices_deleted: usize,
    /// Failed cluster operations; never fatal to the cycle.
    pub errors: Vec<String>,
}

pub struct CuratorService {
    policies: SharedPolicySet,
    store: Arc<dyn IndexStore>,
    metrics: CuratorMetrics,
    dry_run: bool,
}

impl CuratorService {
    pub fn new(
        policies: SharedPolicySet,
        store: Arc<dyn IndexStore>,
        metrics: CuratorMetrics,
        dry_run: bool,
    ) -> Self {
        Self {
            policies,
            store,
            metrics,
            dry_run,
        }
    }

    /// Runs one cleanup cycle anchored at the current instant.
    pub async fn run_cycle(&self) -> Result<CycleResult, ClusterError> {
        self.cycle_at(Utc::now()).await
    }

    /// Runs one cleanup cycle anchored at `now`.
    ///
    /// The index list is snapshotted once per cycle. Each index is classified
    /// against the policies in declaration order; the first policy whose
    /// family the name belongs to decides its action. A failed close/delete
    /// is recorded and the cycle continues; only a failure to list indices
    /// aborts the cycle.
    pub async fn cycle_at(&self, now: DateTime<Utc>) -> Result<CycleResult, ClusterError> {
        let policies = self.policies.read().await.clone();

        let indices = match self.store.list_indices().await {
            Ok(indices) => indices,
            Err(e) => {
                self.metrics.record_transport_error();
                return Err(e);
            }
        };

        info!(
            indices = indices.len(),
            policies = policies.len(),
            dry_run = self.dry_run,
            "Starting cleanup cycle"
        );

        let mut result = CycleResult {
            indices_evaluated: indices.len(),
            ..Default::default()
        };
        self.metrics.record_indices_evaluated(indices.len());

        for index in &indices {
            let Some((policy, action)) = classify_first(&policies, index, now) else {
                continue;
            };

            result.indices_matched += 1;
            self.metrics.record_index_matched();

            match action {
                RetentionAction::Keep => {}
                RetentionAction::Close => {
                    self.close(policy, index, &mut result).await;
                }
                RetentionAction::Delete => {
                    self.delete(policy, index, &mut result).await;
                }
            }
        }

        self.metrics.record_cycle_completed();
        info!(
            evaluated = result.indices_evaluated,
            matched = result.indices_matched,
            closed = result.indices_closed,
            deleted = result.indices_deleted,
            errors = result.errors.len(),
            "Cleanup cycle completed"
        );

        Ok(result)
    }

    async fn close(&self, policy: &Policy, index: &str, result: &mut CycleResult) {
        if self.dry_run {
            info!(policy = %policy.name, index = %index, "[DRY RUN] Would close index");
            result.indices_closed += 1;
            self.metrics.record_index_closed();
            return;
        }

        match self.store.close_index(index).await {
            Ok(()) => {
                info!(policy = %policy.name, index = %index, "Index closed");
                result.indices_closed += 1;
                self.metrics.record_index_closed();
            }
            Err(e) => {
                warn!(policy = %policy.name, index = %index, error = %e, "Failed to close index");
                self.metrics.record_transport_error();
                result.errors.push(format!("failed to close {index}: {e}"));
            }
        }
    }

    async fn delete(&self, policy: &Policy, index: &str, result: &mut CycleResult) {
        if self.dry_run {
            info!(policy = %policy.name, index = %index, "[DRY RUN] Would delete index");
            result.indices_deleted += 1;
            self.metrics.record_index_deleted();
            return;
        }

        match self.store.delete_index(index).await {
            Ok(()) => {
                info!(policy = %policy.name, index = %index, "Index deleted");
                result.indices_deleted += 1;
                self.metrics.record_index_deleted();
            }
            Err(e) => {
                warn!(policy = %policy.name, index = %index, error = %e, "Failed to delete index");
                self.metrics.record_transport_error();
                result
                    .errors
                    .push(format!("failed to delete {index}: {e}"));
            }
        }
    }
}

/// First matching policy in declaration order, with its classification.
fn classify_first<'a>(
    policies: &'a PolicySet,
    index: &str,
    now: DateTime<Utc>,
) -> Option<(&'a Policy, RetentionAction)> {
    policies
        .policies()
        .iter()
        .find_map(|policy| matcher::classify(policy, index, now).map(|action| (policy, action)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MockIndexStore;
    use common::config::RetentionRule;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn shared_policies(rules: &[RetentionRule]) -> SharedPolicySet {
        let set = PolicySet::build(rules, utc("2024-01-10T00:00:00Z"));
        Arc::new(RwLock::new(Arc::new(set)))
    }

    fn logs_rule() -> RetentionRule {
        RetentionRule {
            name: "logs".to_string(),
            pattern: "logs-%{YYYY.MM.dd}".to_string(),
            close: "3 days".to_string(),
            delete: "7 days".to_string(),
        }
    }

    fn service(store: MockIndexStore, dry_run: bool) -> CuratorService {
        CuratorService::new(
            shared_policies(&[logs_rule()]),
            Arc::new(store),
            CuratorMetrics::new(),
            dry_run,
        )
    }

    #[tokio::test]
    async fn test_cycle_closes_and_deletes() {
        let mut store = MockIndexStore::new();
        store.expect_list_indices().returning(|| {
            Ok(vec![
                "logs-2024.01.09".to_string(),
                "logs-2024.01.05".to_string(),
                "logs-2023.12.31".to_string(),
                "metrics-2024.01.01".to_string(),
            ])
        });
        store
            .expect_close_index()
            .withf(|name| name == "logs-2024.01.05")
            .times(1)
            .returning(|_| Ok(()));
        store
            .expect_delete_index()
            .withf(|name| name == "logs-2023.12.31")
            .times(1)
            .returning(|_| Ok(()));

        let service = service(store, false);
        let result = service.cycle_at(utc("2024-01-10T00:00:00Z")).await.unwrap();

        assert_eq!(result.indices_evaluated, 4);
        assert_eq!(result.indices_matched, 3);
        assert_eq!(result.indices_closed, 1);
        assert_eq!(result.indices_deleted, 1);
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let mut store = MockIndexStore::new();
        store.expect_list_indices().returning(|| {
            Ok(vec![
                "logs-2024.01.05".to_string(),
                "logs-2023.12.31".to_string(),
            ])
        });
        // No close/delete expectations: any call would fail the test

        let service = service(store, true);
        let result = service.cycle_at(utc("2024-01-10T00:00:00Z")).await.unwrap();

        assert_eq!(result.indices_closed, 1);
        assert_eq!(result.indices_deleted, 1);
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn test_action_failure_does_not_abort_cycle() {
        let mut store = MockIndexStore::new();
        store.expect_list_indices().returning(|| {
            Ok(vec![
                "logs-2023.12.30".to_string(),
                "logs-2023.12.31".to_string(),
            ])
        });
        store
            .expect_delete_index()
            .withf(|name| name == "logs-2023.12.30")
            .times(1)
            .returning(|_| {
                Err(ClusterError::UnexpectedStatus {
                    operation: "delete index".to_string(),
                    status: 503,
                    body: "cluster busy".to_string(),
                })
            });
        store
            .expect_delete_index()
            .withf(|name| name == "logs-2023.12.31")
            .times(1)
            .returning(|_| Ok(()));

        let service = service(store, false);
        let result = service.cycle_at(utc("2024-01-10T00:00:00Z")).await.unwrap();

        assert_eq!(result.indices_deleted, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("logs-2023.12.30"));
    }

    #[tokio::test]
    async fn test_list_failure_aborts_cycle() {
        let mut store = MockIndexStore::new();
        store.expect_list_indices().returning(|| {
            Err(ClusterError::UnexpectedStatus {
                operation: "list indices".to_string(),
                status: 502,
                body: String::new(),
            })
        });

        let service = service(store, false);
        assert!(service.cycle_at(utc("2024-01-10T00:00:00Z")).await.is_err());
    }

    #[tokio::test]
    async fn test_first_matching_policy_wins() {
        // Both policies match the same names; the first one declared decides,
        // so the stricter second policy never deletes anything.
        let rules = vec![
            logs_rule(),
            RetentionRule {
                name: "logs-aggressive".to_string(),
                pattern: "logs-%{YYYY.MM.dd}".to_string(),
                close: "1 day".to_string(),
                delete: "2 days".to_string(),
            },
        ];

        let mut store = MockIndexStore::new();
        store
            .expect_list_indices()
            .returning(|| Ok(vec!["logs-2024.01.07".to_string()]));
        store
            .expect_close_index()
            .withf(|name| name == "logs-2024.01.07")
            .times(1)
            .returning(|_| Ok(()));

        let service = CuratorService::new(
            shared_policies(&rules),
            Arc::new(store),
            CuratorMetrics::new(),
            false,
        );
        let result = service.cycle_at(utc("2024-01-10T00:00:00Z")).await.unwrap();

        assert_eq!(result.indices_closed, 1);
        assert_eq!(result.indices_deleted, 0);
    }

    #[tokio::test]
    async fn test_metrics_reflect_cycle() {
        let mut store = MockIndexStore::new();
        store.expect_list_indices().returning(|| {
            Ok(vec![
                "logs-2024.01.09".to_string(),
                "logs-2023.12.31".to_string(),
            ])
        });
        store.expect_delete_index().returning(|_| Ok(()));

        let metrics = CuratorMetrics::new();
        let service = CuratorService::new(
            shared_policies(&[logs_rule()]),
            Arc::new(store),
            metrics.clone(),
            false,
        );
        service.cycle_at(utc("2024-01-10T00:00:00Z")).await.unwrap();

        assert_eq!(metrics.cycles_completed(), 1);
        assert_eq!(metrics.indices_evaluated(), 2);
        assert_eq!(metrics.indices_matched(), 2);
        assert_eq!(metrics.indices_deleted(), 1);
        assert_eq!(metrics.transport_errors(), 0);
    }
}
