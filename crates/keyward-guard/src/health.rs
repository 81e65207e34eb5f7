// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Weighted health score.
//!
//! | component        | weight | measures                                        |
//! |------------------|--------|-------------------------------------------------|
//! | integrity        | 40     | share of vault entries that decrypt             |
//! | consistency      | 30     | share of registry beliefs matching the vault    |
//! | decryptability   | 30     | share of expected secrets that decrypt          |

use std::collections::BTreeSet;

use keyward_core::{CredentialBelief, HealthStatus};
use keyward_vault::{IntegrityReport, IssueKind};
use serde::Serialize;
use strum::Display;

const INTEGRITY_WEIGHT: f64 = 40.0;
const CONSISTENCY_WEIGHT: f64 = 30.0;
const DECRYPTABILITY_WEIGHT: f64 = 30.0;

const HEALTHY_THRESHOLD: u8 = 80;
const DEGRADED_THRESHOLD: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Critical,
}

impl HealthLevel {
    pub fn from_score(score: u8) -> Self {
        if score >= HEALTHY_THRESHOLD {
            HealthLevel::Healthy
        } else if score >= DEGRADED_THRESHOLD {
            HealthLevel::Degraded
        } else {
            HealthLevel::Critical
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthLevel,
    /// 0 to 100.
    pub score: u8,
    pub integrity: f64,
    pub consistency: f64,
    pub decryptability: f64,
    pub issues: Vec<String>,
}

impl HealthReport {
    fn summary(&self) -> String {
        if self.issues.is_empty() {
            format!("score {}", self.score)
        } else {
            format!("score {}: {}", self.score, self.issues.join("; "))
        }
    }
}

impl From<&HealthReport> for HealthStatus {
    fn from(report: &HealthReport) -> Self {
        match report.status {
            HealthLevel::Healthy => HealthStatus::Healthy,
            HealthLevel::Degraded => HealthStatus::Degraded(report.summary()),
            HealthLevel::Critical => HealthStatus::Unhealthy(report.summary()),
        }
    }
}

impl From<HealthReport> for HealthStatus {
    fn from(report: HealthReport) -> Self {
        HealthStatus::from(&report)
    }
}

/// Score a vault sweep against the registry's beliefs.
pub fn score(report: &IntegrityReport, beliefs: &[(String, CredentialBelief)]) -> HealthReport {
    let mut issues: Vec<String> = report
        .issues
        .iter()
        .map(|issue| match &issue.owner {
            Some(owner) => format!("{owner}: {}", issue.kind),
            None => issue.kind.to_string(),
        })
        .collect();

    let container_unreadable = report.issues.iter().any(|issue| {
        matches!(
            issue.kind,
            IssueKind::StorageUnavailable | IssueKind::ContainerMalformed
        )
    });
    let verified: BTreeSet<&str> = report.owners.iter().map(String::as_str).collect();
    let stored: BTreeSet<&str> = verified
        .iter()
        .copied()
        .chain(report.issues.iter().filter_map(|issue| issue.owner.as_deref()))
        .collect();

    let integrity = if container_unreadable {
        0.0
    } else {
        ratio(verified.len(), stored.len())
    };

    let consistent = beliefs
        .iter()
        .filter(|(owner, belief)| belief.expects_secret() == stored.contains(owner.as_str()))
        .count();
    let consistency = ratio(consistent, beliefs.len());
    for (owner, belief) in beliefs {
        if belief.expects_secret() && !stored.contains(owner.as_str()) {
            issues.push(format!("{owner}: expected secret missing from vault"));
        }
    }

    let expected: Vec<&str> = beliefs
        .iter()
        .filter(|(_, belief)| belief.expects_secret())
        .map(|(owner, _)| owner.as_str())
        .collect();
    let decryptable = expected.iter().filter(|owner| verified.contains(*owner)).count();
    let decryptability = ratio(decryptable, expected.len());

    let raw = INTEGRITY_WEIGHT * integrity
        + CONSISTENCY_WEIGHT * consistency
        + DECRYPTABILITY_WEIGHT * decryptability;
    let score = raw.round().clamp(0.0, 100.0) as u8;

    HealthReport {
        status: HealthLevel::from_score(score),
        score,
        integrity,
        consistency,
        decryptability,
        issues,
    }
}

/// `part / whole`, with an empty whole counting as fully healthy.
fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        1.0
    } else {
        part as f64 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use keyward_config::model::KeywardConfig;
    use keyward_core::{CredentialRegistry, DocumentStore};
    use keyward_storage::MemoryDocumentStore;
    use keyward_vault::{CryptoEngine, IntegrityIssue, VaultContainer};
    use secrecy::SecretString;
    use serde_json::json;

    use super::*;
    use crate::{ConsistencyGuard, ProviderRegistry};

    const EXPECTS: CredentialBelief = CredentialBelief {
        has_secret: true,
        authenticated: false,
    };

    fn sweep(owners: &[&str], broken: &[&str]) -> IntegrityReport {
        IntegrityReport {
            success: broken.is_empty(),
            owners: owners.iter().map(|o| o.to_string()).collect(),
            issues: broken
                .iter()
                .map(|o| IntegrityIssue {
                    owner: Some(o.to_string()),
                    kind: IssueKind::DecryptFailure,
                    message: "tag mismatch".to_string(),
                })
                .collect(),
            recommendations: Vec::new(),
        }
    }

    fn beliefs(owners: &[&str]) -> Vec<(String, CredentialBelief)> {
        owners.iter().map(|o| (o.to_string(), EXPECTS)).collect()
    }

    #[test]
    fn thresholds() {
        assert_eq!(HealthLevel::from_score(100), HealthLevel::Healthy);
        assert_eq!(HealthLevel::from_score(80), HealthLevel::Healthy);
        assert_eq!(HealthLevel::from_score(79), HealthLevel::Degraded);
        assert_eq!(HealthLevel::from_score(50), HealthLevel::Degraded);
        assert_eq!(HealthLevel::from_score(49), HealthLevel::Critical);
    }

    #[test]
    fn empty_vault_and_registry_is_healthy() {
        let report = score(&sweep(&[], &[]), &[]);
        assert_eq!(report.score, 100);
        assert_eq!(report.status, HealthLevel::Healthy);
        assert_eq!(HealthStatus::from(&report), HealthStatus::Healthy);
    }

    #[test]
    fn one_corrupted_of_two_expected_is_degraded() {
        // integrity 1/2, consistency 2/2, decryptability 1/2 -> 20 + 30 + 15
        let report = score(&sweep(&["a"], &["b"]), &beliefs(&["a", "b"]));
        assert_eq!(report.score, 65);
        assert_eq!(report.status, HealthLevel::Degraded);
        assert!(matches!(HealthStatus::from(&report), HealthStatus::Degraded(_)));
    }

    #[test]
    fn missing_expected_secrets_are_critical() {
        // integrity 1 (nothing stored), consistency 0, decryptability 0
        let report = score(&sweep(&[], &[]), &beliefs(&["a", "b"]));
        assert_eq!(report.score, 40);
        assert_eq!(report.status, HealthLevel::Critical);
        assert_eq!(report.issues.len(), 2);
        assert!(matches!(HealthStatus::from(report), HealthStatus::Unhealthy(_)));
    }

    #[test]
    fn unreadable_container_zeroes_integrity() {
        let report = IntegrityReport {
            success: false,
            issues: vec![IntegrityIssue {
                owner: None,
                kind: IssueKind::StorageUnavailable,
                message: "down".to_string(),
            }],
            ..IntegrityReport::default()
        };
        let health = score(&report, &[]);
        assert_eq!(health.integrity, 0.0);
        assert_eq!(health.score, 60);
    }

    #[tokio::test(start_paused = true)]
    async fn guard_aggregates_live_state() {
        let store = MemoryDocumentStore::new();
        let config = KeywardConfig::default();
        let vault = Arc::new(VaultContainer::new(
            Arc::new(CryptoEngine::new(SecretString::from("health".to_string()))),
            Arc::new(store.clone()),
            &config,
        ));
        let registry = Arc::new(ProviderRegistry::new());
        let guard = ConsistencyGuard::new(vault.clone(), registry.clone(), None, &config);

        vault.store_key("openai", "sk-openai-123456").await.unwrap();
        registry.record_secret("openai", SecretString::from("sk-openai-123456".to_string()));
        assert_eq!(guard.aggregate_health().await.score, 100);

        let mut document = store.load().await.unwrap().unwrap();
        document["keyward_vault"]["entries"]["openai"]["ciphertext"] = json!("AAAA");
        store.replace(Some(document)).await;

        // integrity 0, consistency 1, decryptability 0
        let health = guard.aggregate_health().await;
        assert_eq!(health.score, 30);
        assert_eq!(health.status, HealthLevel::Critical);
    }
}
