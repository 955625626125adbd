use super::{DeathReason, Heart};
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use futures::lock::Mutex;
use jatsl::{JobScheduler, State, StatusServer};
use std::any::type_name;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

/// Executable module bundling a set of jobs
#[async_trait]
pub trait Module {
    /// Executed before running the core loop, e.g. to verify that collaborators are reachable
    async fn pre_startup(&mut self) -> EmptyResult {
        Ok(())
    }

    /// Schedules the jobs of the module
    ///
    /// When the function returns `Some(_)` the death of the returned [`Heart`] is awaited before
    /// terminating all jobs. Returning `None` shuts the module down right away.
    async fn run(&mut self, scheduler: &JobScheduler) -> Result<Option<Heart>, BoxedError>;

    /// Shutdown hook executed after all jobs of the module have terminated
    async fn post_shutdown(&mut self, _termination_reason: &ModuleTerminationReason) {}
}

/// Reason why a module has terminated
#[derive(Error, Debug)]
pub enum ModuleTerminationReason {
    /// Startup routine threw an error
    #[error("startup routine threw an error")]
    StartupFailed(#[source] BoxedError),
    /// Core run loop threw an error
    #[error("error during operation")]
    OperationalError(#[source] BoxedError),
    /// [`Heart`] provided by module died
    #[error("heart provided by module died: {0}")]
    HeartDied(DeathReason),
    /// Run loop exited cleanly
    #[error("run loop exited cleanly")]
    ExitedNormally,
    /// Startup took longer than permitted
    #[error("timeout during startup")]
    Timeout,
}

impl ModuleTerminationReason {
    /// Whether the module stopped without encountering an error
    pub fn is_graceful(&self) -> bool {
        matches!(
            self,
            ModuleTerminationReason::HeartDied(_) | ModuleTerminationReason::ExitedNormally
        )
    }
}

/// Runner for [`Module`] implementations
pub struct ModuleRunner {
    startup_timeout: Duration,
    shutdown_timeout: Duration,
    status_server_port: Option<u16>,
}

impl Default for ModuleRunner {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(30),
            status_server_port: None,
        }
    }
}

impl ModuleRunner {
    /// Creates a new runner which additionally exposes the job status on the given port
    pub fn with_status_server(status_server_port: Option<u16>) -> Self {
        Self {
            status_server_port,
            ..Default::default()
        }
    }

    /// Executes a [`Module`] by calling its lifecycle functions in order
    /// and returns the reason why it terminated.
    #[instrument(skip(self, module), fields(module = type_name::<M>()))]
    pub async fn run<M: Module + Send + Sync>(&self, mut module: M) -> ModuleTerminationReason {
        let scheduler = JobScheduler::default();

        let status_state = match self.status_server_port {
            Some(port) => {
                info!(port, "Spawning status server");
                let (state, status_server) = StatusServer::new(&scheduler, port);
                scheduler.spawn_job(status_server).await;
                Some(state)
            }
            None => None,
        };

        info!("Commencing module startup sequence");
        let termination_reason = match timeout(self.startup_timeout, module.pre_startup()).await {
            Ok(Ok(())) => {
                self.run_loop(&mut module, &scheduler, status_state.as_ref())
                    .await
            }
            Ok(Err(error)) => {
                error!(%error, "Module startup sequence encountered an error");
                ModuleTerminationReason::StartupFailed(error)
            }
            Err(_) => {
                error!("Module startup sequence timed out");
                ModuleTerminationReason::Timeout
            }
        };

        if let Some(state) = &status_state {
            *state.lock().await = State::Shutdown;
        }

        info!("Terminating remaining jobs");
        scheduler.terminate_jobs(self.shutdown_timeout).await;

        if timeout(self.shutdown_timeout, module.post_shutdown(&termination_reason))
            .await
            .is_err()
        {
            warn!("Module shutdown sequence timed out");
        }

        if termination_reason.is_graceful() {
            info!(reason = %termination_reason, "Module exited normally");
        } else {
            error!(reason = %termination_reason, "Module terminated with an error");
        }

        termination_reason
    }

    async fn run_loop<M: Module + Send + Sync>(
        &self,
        module: &mut M,
        scheduler: &JobScheduler,
        status_state: Option<&Arc<Mutex<State>>>,
    ) -> ModuleTerminationReason {
        match module.run(scheduler).await {
            Ok(None) => {
                debug!("Module run procedure completed");
                ModuleTerminationReason::ExitedNormally
            }
            Ok(Some(mut heart)) => {
                if let Some(state) = status_state {
                    *state.lock().await = State::Running;
                }

                debug!("Module jobs scheduled, waiting for heart to die");
                let death_reason = heart.death().await;
                info!(%death_reason, "Heart provided by module died");
                ModuleTerminationReason::HeartDied(death_reason)
            }
            Err(error) => {
                error!(%error, "Module run procedure encountered an error");
                ModuleTerminationReason::OperationalError(error)
            }
        }
    }
}
