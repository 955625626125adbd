use crate::domain::HealthStatus;
use async_trait::async_trait;

/// Determines the health reported in reply to probes
#[async_trait]
pub trait HealthCheck {
    /// Evaluates the current status
    async fn status(&self) -> HealthStatus;
}

/// Reports healthy as long as the process is able to answer
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysHealthy;

#[async_trait]
impl HealthCheck for AlwaysHealthy {
    async fn status(&self) -> HealthStatus {
        HealthStatus::Healthy
    }
}
