//! Target server readiness.
//!
//! Before any stage runs the app server must answer its health URL. Polling
//! runs at a fixed interval for a fixed number of attempts; if the first poll
//! fails the launcher is started exactly once and polling continues within the
//! same budget. Exhausting the budget is the one fatal condition of a run.

use crate::config::ServerConfig;
use crate::result::{PreflightError, PreflightResult};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Opaque readiness probe
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// URL being probed, for diagnostics
    fn url(&self) -> &str;

    /// Whether the server answered successfully
    async fn is_healthy(&self) -> bool;
}

/// HTTP GET probe; any 2xx is healthy
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    url: String,
    client: reqwest::Client,
}

impl HttpHealthProbe {
    /// Create a probe with a per-request timeout
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(url: impl Into<String>, timeout: Duration) -> PreflightResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PreflightError::ConfigError {
                message: format!("HTTP client: {e}"),
            })?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    fn url(&self) -> &str {
        &self.url
    }

    async fn is_healthy(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(url = %self.url, error = %e, "health probe failed");
                false
            }
        }
    }
}

/// Starts the app server
#[async_trait]
pub trait ServerLauncher: Send + Sync {
    /// Start the server in the background
    async fn launch(&self) -> PreflightResult<()>;
}

/// Spawns the configured command as a child process, killed when the launcher
/// is dropped
#[derive(Debug)]
pub struct CommandLauncher {
    command: Vec<String>,
    working_dir: Option<std::path::PathBuf>,
    child: Mutex<Option<tokio::process::Child>>,
}

impl CommandLauncher {
    /// Launcher for `config.command`
    #[must_use]
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            command: config.command.clone(),
            working_dir: config.working_dir.clone(),
            child: Mutex::new(None),
        }
    }

    /// Whether a child process was spawned
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.child.lock().map(|c| c.is_some()).unwrap_or(false)
    }
}

#[async_trait]
impl ServerLauncher for CommandLauncher {
    async fn launch(&self) -> PreflightResult<()> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| PreflightError::ServerLaunchError {
                message: "no server command configured".to_string(),
            })?;

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        let child = cmd.spawn().map_err(|e| PreflightError::ServerLaunchError {
            message: format!("{}: {e}", self.command.join(" ")),
        })?;
        info!(command = %self.command.join(" "), pid = ?child.id(), "server process started");

        if let Ok(mut slot) = self.child.lock() {
            *slot = Some(child);
        }
        Ok(())
    }
}

/// How readiness was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerStatus {
    /// Polls made, including the successful one
    pub attempts: u32,
    /// Whether the launcher was started
    pub launched: bool,
}

/// Poll until healthy, launching the server once after the first failed poll.
///
/// # Errors
///
/// Returns [`PreflightError::ServerUnavailable`] once `max_attempts` polls
/// have failed
pub async fn wait_for_server(
    probe: &dyn HealthProbe,
    launcher: Option<&dyn ServerLauncher>,
    config: &ServerConfig,
) -> PreflightResult<ServerStatus> {
    let mut launched = false;
    for attempt in 1..=config.max_attempts {
        if probe.is_healthy().await {
            info!(url = probe.url(), attempt, "server ready");
            return Ok(ServerStatus {
                attempts: attempt,
                launched,
            });
        }

        if attempt == 1 && config.auto_start {
            if let Some(launcher) = launcher {
                info!(url = probe.url(), "server not responding, starting it");
                match launcher.launch().await {
                    Ok(()) => launched = true,
                    Err(e) => warn!(error = %e, "server launch failed, still polling"),
                }
            }
        }

        debug!(url = probe.url(), attempt, max = config.max_attempts, "waiting for server");
        if attempt < config.max_attempts {
            tokio::time::sleep(config.poll_interval()).await;
        }
    }

    Err(PreflightError::ServerUnavailable {
        url: probe.url().to_string(),
        attempts: config.max_attempts,
    })
}
