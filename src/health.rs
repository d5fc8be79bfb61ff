//! Dependency health
//!
//! The `/health` handler only serializes whatever a [`HealthCheck`]
//! reports. Unhealthy dependencies are described in the body; they never
//! change the HTTP status.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
}

/// State of one downstream dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DependencyHealth {
    pub fn up() -> Self {
        Self {
            status: HealthStatus::Up,
            error: None,
        }
    }

    pub fn down(error: AppError) -> Self {
        Self {
            status: HealthStatus::Down,
            error: Some(error.to_string()),
        }
    }
}

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub checks: BTreeMap<String, DependencyHealth>,
}

impl HealthReport {
    /// Aggregate dependency results; any failure marks the whole report down
    pub fn from_checks(checks: BTreeMap<String, DependencyHealth>) -> Self {
        let failing: Vec<&str> = checks
            .iter()
            .filter(|(_, check)| check.status == HealthStatus::Down)
            .map(|(name, _)| name.as_str())
            .collect();

        if failing.is_empty() {
            Self {
                status: HealthStatus::Up,
                message: "It's healthy".to_string(),
                checks,
            }
        } else {
            Self {
                status: HealthStatus::Down,
                message: format!("Unhealthy dependencies: {}", failing.join(", ")),
                checks,
            }
        }
    }
}

/// Reports on downstream dependencies
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self) -> HealthReport;
}

/// Default health collaborator
///
/// With probing disabled the process reports itself up. With probing
/// enabled every provider's token endpoint must answer within the
/// timeout; any HTTP status counts as reachable.
pub struct UpstreamHealth {
    targets: Vec<(String, String)>,
    http_client: Option<reqwest::Client>,
}

impl UpstreamHealth {
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        if !config.health.probe_upstream {
            return Ok(Self {
                targets: Vec::new(),
                http_client: None,
            });
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.health.timeout_seconds))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {e}")))?;

        let google_token_url = config
            .providers
            .google
            .token_url
            .clone()
            .unwrap_or_else(|| crate::auth::google::GOOGLE_TOKEN_URL.to_string());

        Ok(Self {
            targets: vec![("google".to_string(), google_token_url)],
            http_client: Some(http_client),
        })
    }

    async fn probe(client: &reqwest::Client, url: &str) -> DependencyHealth {
        match client.get(url).send().await {
            Ok(_) => DependencyHealth::up(),
            Err(error) if error.is_timeout() => DependencyHealth::down(
                AppError::DependencyUnhealthy(format!("{url} timed out")),
            ),
            Err(error) => DependencyHealth::down(AppError::DependencyUnhealthy(format!(
                "{url} unreachable: {error}"
            ))),
        }
    }
}

#[async_trait]
impl HealthCheck for UpstreamHealth {
    async fn check(&self) -> HealthReport {
        let mut checks = BTreeMap::new();

        if let Some(client) = &self.http_client {
            for (name, url) in &self.targets {
                let result = Self::probe(client, url).await;
                if result.status == HealthStatus::Down {
                    tracing::warn!(dependency = %name, error = ?result.error, "Dependency unhealthy");
                }
                checks.insert(name.clone(), result);
            }
        }

        HealthReport::from_checks(checks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_is_down_when_any_dependency_is_down() {
        let mut checks = BTreeMap::new();
        checks.insert("cache".to_string(), DependencyHealth::up());
        checks.insert(
            "database".to_string(),
            DependencyHealth::down(AppError::DependencyUnhealthy("connection refused".into())),
        );

        let report = HealthReport::from_checks(checks);
        assert_eq!(report.status, HealthStatus::Down);
        assert!(report.message.contains("database"));
        assert!(!report.message.contains("cache"));
    }

    #[test]
    fn report_serializes_lowercase_status() {
        let report = HealthReport::from_checks(BTreeMap::new());
        let json = serde_json::to_value(&report).expect("serializes");
        assert_eq!(json["status"], "up");
        assert_eq!(json["message"], "It's healthy");
        assert!(json.get("checks").is_none());
    }

    #[tokio::test]
    async fn unreachable_upstream_is_reported_down() {
        let health = UpstreamHealth {
            targets: vec![("google".to_string(), "http://127.0.0.1:1/token".to_string())],
            http_client: Some(
                reqwest::Client::builder()
                    .timeout(Duration::from_secs(2))
                    .build()
                    .expect("client"),
            ),
        };

        let report = health.check().await;
        assert_eq!(report.status, HealthStatus::Down);
        assert_eq!(report.checks["google"].status, HealthStatus::Down);
    }
}
