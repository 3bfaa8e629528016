use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::app::AppContext;
use crate::email::PaymentNotifier;
use crate::reconcile::PaymentStore;
use crate::webhooks::{VerificationMode, WebhookVerifier};

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health check result for a single component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Overall health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: Vec<ComponentHealth>,
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        let status_code = match self.status {
            HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        };

        (status_code, Json(self)).into_response()
    }
}

/// A component that can report its health
pub trait HealthCheck: Send + Sync {
    fn check(&self) -> ComponentHealth;
}

/// Payment store reachability
pub struct StoreHealthCheck(pub Arc<dyn PaymentStore>);

impl HealthCheck for StoreHealthCheck {
    fn check(&self) -> ComponentHealth {
        let healthy = self.0.is_healthy();
        ComponentHealth {
            name: "store".to_string(),
            status: if healthy {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            },
            message: Some(format!("backend: {}", self.0.backend_name())),
        }
    }
}

/// Confirmation delivery
pub struct NotifierHealthCheck(pub Arc<dyn PaymentNotifier>);

impl HealthCheck for NotifierHealthCheck {
    fn check(&self) -> ComponentHealth {
        // Payments are still recorded without mail, so this only degrades
        let status = if self.0.is_healthy() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };
        ComponentHealth {
            name: "notifier".to_string(),
            status,
            message: None,
        }
    }
}

/// Signature verification; degraded when running unverified
pub struct VerificationHealthCheck(pub Arc<dyn WebhookVerifier>);

impl HealthCheck for VerificationHealthCheck {
    fn check(&self) -> ComponentHealth {
        match self.0.mode() {
            VerificationMode::Signed => ComponentHealth {
                name: "verification".to_string(),
                status: HealthStatus::Healthy,
                message: None,
            },
            VerificationMode::Unverified => ComponentHealth {
                name: "verification".to_string(),
                status: HealthStatus::Degraded,
                message: Some("no signing secret configured".to_string()),
            },
        }
    }
}

/// Runs a set of checks and folds them into one status
pub struct HealthChecker {
    checks: Vec<Box<dyn HealthCheck>>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    /// Checks for every collaborator in the context
    pub fn for_context(ctx: &AppContext) -> Self {
        Self::new()
            .with_check(Box::new(StoreHealthCheck(ctx.store.clone())))
            .with_check(Box::new(NotifierHealthCheck(ctx.notifier.clone())))
            .with_check(Box::new(VerificationHealthCheck(ctx.verifier.clone())))
    }

    pub fn with_check(mut self, check: Box<dyn HealthCheck>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn check_health(&self) -> HealthResponse {
        let checks: Vec<ComponentHealth> = self.checks.iter().map(|c| c.check()).collect();

        let status = if checks.iter().any(|c| c.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if checks.iter().any(|c| c.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthResponse { status, checks }
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Handler for the health endpoint
pub async fn health_handler(State(ctx): State<AppContext>) -> HealthResponse {
    HealthChecker::for_context(&ctx).check_health()
}
