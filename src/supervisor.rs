//! Lifecycle management for the external command server process.
//!
//! The supervisor exclusively owns the child process handle: no other
//! component may spawn or kill it. Everything else observes it through
//! `status()` or drives it through `start()`/`stop()`/`restart()`.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

use crate::model::ServerStatus;

/// Poll interval and attempt budget for the post-spawn health check
/// (60 × 500 ms ≈ 30 s).
const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(500);
const HEALTH_POLL_ATTEMPTS: u32 = 60;

/// Bounded wait for the child to exit after a stop signal.
const STOP_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Stopped,
    Starting,
    Running,
    Failed,
}

struct Inner {
    state: ProcessState,
    child: Option<Child>,
    process_id: Option<u32>,
    started_at: Option<DateTime<Local>>,
}

pub struct ProcessSupervisor {
    executable: PathBuf,
    port: u16,
    client: reqwest::Client,
    // Async mutex: held across the health-poll awaits, which also serializes
    // concurrent start/stop callers.
    inner: tokio::sync::Mutex<Inner>,
}

impl ProcessSupervisor {
    pub fn new(executable: PathBuf, port: u16) -> Self {
        Self {
            executable,
            port,
            client: reqwest::Client::new(),
            inner: tokio::sync::Mutex::new(Inner {
                state: ProcessState::Stopped,
                child: None,
                process_id: None,
                started_at: None,
            }),
        }
    }

    pub fn server_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Start the command server and wait until it answers HTTP.
    ///
    /// No-op returning true if already running. On health-check timeout the
    /// spawned child is killed and false is returned; callers may retry later.
    pub async fn start(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state == ProcessState::Running {
            return true;
        }
        inner.state = ProcessState::Starting;

        log::info!(
            "starting command server: {} --port {}",
            self.executable.display(),
            self.port
        );

        let spawned = Command::new(&self.executable)
            .arg("--port")
            .arg(self.port.to_string())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                log::error!("failed to spawn command server: {e}");
                inner.state = ProcessState::Failed;
                return false;
            }
        };

        // Drain stderr in the background so the child never blocks on a full
        // pipe, and its output lands in our log.
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    log::info!("[command-server] {line}");
                }
            });
        }

        let health_url = self.server_url();
        let mut attempts = 0;
        loop {
            if attempts >= HEALTH_POLL_ATTEMPTS {
                log::error!("command server did not answer within the start timeout; killing it");
                let _ = child.kill().await;
                inner.state = ProcessState::Failed;
                return false;
            }

            // A child that exited already will never answer
            if let Ok(Some(exit_status)) = child.try_wait() {
                log::error!("command server exited immediately with status {exit_status}");
                inner.state = ProcessState::Failed;
                return false;
            }

            // Any HTTP response at all means the server is listening
            match self
                .client
                .get(&health_url)
                .timeout(Duration::from_secs(2))
                .send()
                .await
            {
                Ok(_) => break,
                Err(_) => {
                    tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
                    attempts += 1;
                }
            }
        }

        inner.process_id = child.id();
        inner.started_at = Some(Local::now());
        inner.child = Some(child);
        inner.state = ProcessState::Running;
        log::info!(
            "command server running at {} (pid {:?})",
            health_url,
            inner.process_id
        );
        true
    }

    /// Stop the command server. Idempotent; returns true even when nothing
    /// was running.
    pub async fn stop(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state != ProcessState::Running {
            inner.state = ProcessState::Stopped;
            return true;
        }

        if let Some(mut child) = inner.child.take() {
            let _ = child.start_kill();
            // Bounded wait for the child to be reaped; force-kill on timeout
            if tokio::time::timeout(STOP_WAIT, child.wait()).await.is_err() {
                let _ = child.kill().await;
            }
        }

        inner.child = None;
        inner.process_id = None;
        inner.started_at = None;
        inner.state = ProcessState::Stopped;
        log::info!("command server stopped");
        true
    }

    /// Stop-then-start, used after a transport failure suggests the server
    /// died underneath us.
    pub async fn restart(&self) -> bool {
        self.stop().await;
        self.start().await
    }

    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.state == ProcessState::Running
    }

    pub async fn status(&self) -> ServerStatus {
        let inner = self.inner.lock().await;
        let is_running = inner.state == ProcessState::Running;
        ServerStatus {
            is_running,
            process_id: inner.process_id,
            server_url: is_running.then(|| self.server_url()),
            started_at: inner.started_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_when_not_running_is_ok() {
        let supervisor = ProcessSupervisor::new(PathBuf::from("/does/not/exist"), 39131);
        assert!(supervisor.stop().await);
        assert!(supervisor.stop().await);
        assert!(!supervisor.is_running().await);
    }

    #[tokio::test]
    async fn start_with_missing_executable_fails_cleanly() {
        let supervisor = ProcessSupervisor::new(PathBuf::from("/does/not/exist"), 39132);
        assert!(!supervisor.start().await);
        let status = supervisor.status().await;
        assert!(!status.is_running);
        assert!(status.process_id.is_none());
        assert!(status.started_at.is_none());
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Writes a do-nothing long-running script the supervisor can spawn,
        /// and answers HTTP on `port` so the health check passes.
        async fn start_rig(dir: &std::path::Path, port: u16) -> PathBuf {
            let script = dir.join("fake-server.sh");
            std::fs::write(&script, "#!/bin/sh\nsleep 60\n").unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

            let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
                .await
                .unwrap();
            tokio::spawn(async move {
                loop {
                    let Ok((mut socket, _)) = listener.accept().await else {
                        break;
                    };
                    tokio::spawn(async move {
                        use tokio::io::{AsyncReadExt, AsyncWriteExt};
                        let mut buf = [0u8; 1024];
                        let _ = socket.read(&mut buf).await;
                        let _ = socket
                            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n")
                            .await;
                    });
                }
            });
            script
        }

        #[tokio::test]
        async fn start_is_idempotent_while_running() {
            let dir = tempfile::tempdir().unwrap();
            let port = 39133;
            let script = start_rig(dir.path(), port).await;

            let supervisor = ProcessSupervisor::new(script, port);
            assert!(supervisor.start().await);

            let first = supervisor.status().await;
            assert!(first.is_running);
            assert!(first.process_id.is_some());
            assert_eq!(first.server_url.as_deref(), Some("http://127.0.0.1:39133"));

            // Second start must not spawn a new process or touch timestamps
            assert!(supervisor.start().await);
            let second = supervisor.status().await;
            assert_eq!(second.process_id, first.process_id);
            assert_eq!(second.started_at, first.started_at);

            assert!(supervisor.stop().await);
            assert!(!supervisor.is_running().await);
        }
    }
}
