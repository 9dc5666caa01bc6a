//! Runtime host that runs each model in a launched inference server process.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::catalog::LauncherConfig;
use super::host::{HostError, ModelHost};
use super::profile::LaunchProfile;
use super::registry::ModelDescriptor;

const READY_PROBE_INTERVAL: Duration = Duration::from_millis(500);

struct RunningModel {
    name: String,
    child: Child,
}

/// Launches one inference server per loaded model.
///
/// `load` returns once the server port accepts connections. The overall
/// wait is bounded by the caller; dropping an unfinished `load` kills the
/// half-started process.
pub struct ProcessHost {
    launcher: LauncherConfig,
    running: Mutex<Option<RunningModel>>,
}

impl ProcessHost {
    pub fn new(launcher: LauncherConfig) -> Self {
        Self {
            launcher,
            running: Mutex::new(None),
        }
    }

    /// Full argument list for `descriptor`: launcher args, then profile flags.
    pub fn command_args(&self, descriptor: &ModelDescriptor) -> Vec<String> {
        let port = self.launcher.port.to_string();
        let mut args: Vec<String> = self
            .launcher
            .args
            .iter()
            .map(|arg| {
                arg.replace("{model}", &descriptor.name)
                    .replace("{host}", &self.launcher.host)
                    .replace("{port}", &port)
            })
            .collect();
        args.extend(LaunchProfile::for_model(descriptor).to_args());
        args
    }

    async fn wait_until_ready(&self, child: &mut Child, model: &str) -> Result<(), HostError> {
        let addr = format!("{}:{}", self.launcher.host, self.launcher.port);
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    return Err(HostError::LoadFailed {
                        model: model.to_string(),
                        reason: format!("engine exited during startup ({})", status),
                    });
                }
                Ok(None) => {}
                Err(e) => return Err(HostError::Unreachable(e.to_string())),
            }

            if TcpStream::connect(&addr).await.is_ok() {
                return Ok(());
            }
            debug!(model, addr = %addr, "engine not accepting connections yet");
            tokio::time::sleep(READY_PROBE_INTERVAL).await;
        }
    }
}

#[async_trait]
impl ModelHost for ProcessHost {
    async fn unload_current(&self) -> Result<(), HostError> {
        let mut running = self.running.lock().await;
        let Some(mut model) = running.take() else {
            return Ok(());
        };

        info!(model = %model.name, "stopping inference engine");
        if let Err(e) = model.child.kill().await {
            warn!(model = %model.name, error = %e, "failed to stop inference engine");
            let reason = format!("could not stop engine for '{}': {}", model.name, e);
            *running = Some(model);
            return Err(HostError::UnloadFailed(reason));
        }
        Ok(())
    }

    async fn load(&self, descriptor: &ModelDescriptor) -> Result<(), HostError> {
        let mut running = self.running.lock().await;
        if let Some(current) = running.as_ref() {
            return Err(HostError::LoadFailed {
                model: descriptor.name.clone(),
                reason: format!("'{}' is still loaded", current.name),
            });
        }

        let args = self.command_args(descriptor);
        info!(
            model = %descriptor.name,
            program = %self.launcher.program,
            args = ?args,
            "starting inference engine"
        );

        let mut child = Command::new(&self.launcher.program)
            .args(&args)
            .envs(&self.launcher.env)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HostError::LoadFailed {
                model: descriptor.name.clone(),
                reason: format!("spawn '{}': {}", self.launcher.program, e),
            })?;

        self.wait_until_ready(&mut child, &descriptor.name).await?;

        *running = Some(RunningModel {
            name: descriptor.name.clone(),
            child,
        });
        Ok(())
    }

    async fn health_check(&self) -> bool {
        // A load in progress holds the lock; the host is busy, not dead.
        let Ok(mut running) = self.running.try_lock() else {
            return true;
        };
        match running.as_mut() {
            None => true,
            Some(model) => matches!(model.child.try_wait(), Ok(None)),
        }
    }
}
