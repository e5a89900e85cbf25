//! One-time system prime before the poll loop: cleanup, then admin seeding.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use casewise_core::defaults::{
    CLEANUP_ATTEMPTS, CLEANUP_RETRY_DELAY_MS, SEED_ATTEMPTS, SEED_RETRY_DELAY_MS,
};
use casewise_core::{AdminAccount, Error, Result, SystemGateway};

use crate::worker::{IntakeWorker, WorkerHandle};

/// Retry budget for the startup steps.
#[derive(Debug, Clone)]
pub struct StartupConfig {
    pub cleanup_attempts: u32,
    pub cleanup_retry_delay_ms: u64,
    pub seed_attempts: u32,
    pub seed_retry_delay_ms: u64,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            cleanup_attempts: CLEANUP_ATTEMPTS,
            cleanup_retry_delay_ms: CLEANUP_RETRY_DELAY_MS,
            seed_attempts: SEED_ATTEMPTS,
            seed_retry_delay_ms: SEED_RETRY_DELAY_MS,
        }
    }
}

impl StartupConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `CLEANUP_ATTEMPTS` | `3` | Cleanup attempts (non-fatal) |
    /// | `CLEANUP_RETRY_DELAY_MS` | `5000` | Delay between cleanup attempts |
    /// | `SEED_ATTEMPTS` | `5` | Seeding attempts before startup fails |
    /// | `SEED_RETRY_DELAY_MS` | `2000` | Delay between seeding attempts |
    pub fn from_env() -> Self {
        fn parse<T: std::str::FromStr>(name: &str) -> Option<T> {
            std::env::var(name).ok().and_then(|v| v.parse::<T>().ok())
        }

        Self {
            cleanup_attempts: parse("CLEANUP_ATTEMPTS").unwrap_or(CLEANUP_ATTEMPTS).max(1),
            cleanup_retry_delay_ms: parse("CLEANUP_RETRY_DELAY_MS")
                .unwrap_or(CLEANUP_RETRY_DELAY_MS),
            seed_attempts: parse("SEED_ATTEMPTS").unwrap_or(SEED_ATTEMPTS).max(1),
            seed_retry_delay_ms: parse("SEED_RETRY_DELAY_MS").unwrap_or(SEED_RETRY_DELAY_MS),
        }
    }

    pub fn with_cleanup(mut self, attempts: u32, delay_ms: u64) -> Self {
        self.cleanup_attempts = attempts;
        self.cleanup_retry_delay_ms = delay_ms;
        self
    }

    pub fn with_seed(mut self, attempts: u32, delay_ms: u64) -> Self {
        self.seed_attempts = attempts;
        self.seed_retry_delay_ms = delay_ms;
        self
    }
}

/// What the startup steps achieved.
#[derive(Debug, Clone)]
pub struct StartupReport {
    /// Cleanup message, `None` when every cleanup attempt failed.
    pub cleanup_message: Option<String>,
    pub admin: AdminAccount,
    pub seed_attempts_used: u32,
}

/// Call `op` up to `attempts` times with `delay` between failures.
///
/// Returns the first success with its attempt number, or the last error.
async fn retry<T, F, Fut>(
    step: &str,
    attempts: u32,
    delay: Duration,
    mut op: F,
) -> Result<(T, u32)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok((value, attempt)),
            Err(e) if attempt < attempts => {
                warn!(
                    step,
                    attempt,
                    attempts,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "Startup step failed, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(step, attempt, attempts, error = %e, "Startup step failed, no attempts left");
                return Err(e);
            }
        }
    }
}

/// Runs cleanup, then admin seeding, before the worker starts.
///
/// Cleanup is best-effort. Seeding must succeed within its attempt budget;
/// otherwise startup fails with [`Error::FatalStartup`] and the worker must
/// not start.
pub struct StartupSequencer {
    system: Arc<dyn SystemGateway>,
    config: StartupConfig,
}

impl StartupSequencer {
    pub fn new(system: Arc<dyn SystemGateway>, config: StartupConfig) -> Self {
        Self { system, config }
    }

    pub async fn run(&self) -> Result<StartupReport> {
        let cleanup = retry(
            "cleanup",
            self.config.cleanup_attempts,
            Duration::from_millis(self.config.cleanup_retry_delay_ms),
            || self.system.cleanup(),
        )
        .await;

        let cleanup_message = match cleanup {
            Ok((message, _)) => {
                info!(message = %message, "Stale upload cleanup completed");
                Some(message)
            }
            Err(e) => {
                warn!(error = %e, "Stale upload cleanup failed, continuing without it");
                None
            }
        };

        let (admin, seed_attempts_used) = retry(
            "seed_admin",
            self.config.seed_attempts,
            Duration::from_millis(self.config.seed_retry_delay_ms),
            || self.system.seed_admin(),
        )
        .await
        .map_err(|e| {
            Error::FatalStartup(format!(
                "Admin seeding failed after {} attempts: {}",
                self.config.seed_attempts.max(1),
                e
            ))
        })?;

        let email = admin.credentials.as_ref().map_or("-", |c| c.email.as_str());
        info!(
            email,
            message = admin.message.as_deref().unwrap_or(""),
            attempts = seed_attempts_used,
            "Admin account ready"
        );

        Ok(StartupReport {
            cleanup_message,
            admin,
            seed_attempts_used,
        })
    }

    /// Run the startup steps, then start `worker`. The worker is dropped
    /// unstarted when startup fails.
    pub async fn launch(&self, worker: IntakeWorker) -> Result<(StartupReport, WorkerHandle)> {
        let report = self.run().await?;
        Ok((report, worker.start()))
    }
}
