//! Command execution pipeline.
//!
//! `CommandService` sits between the API and the wire: it makes sure the
//! command server is running, resolves the target speaker against the
//! discovery cache, dispatches over the transport, and applies the
//! restart-and-retry policy. It never returns `Err` — every failure is
//! folded into a `CommandResult` with a negative exit code so callers and
//! macro steps handle one shape.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::client::CommandTransport;
use crate::discovery::DiscoveryCache;
use crate::error::AppError;
use crate::model::{CommandRequest, CommandResult};
use crate::supervisor::ProcessSupervisor;

/// Narrow seam for "run one command". The macro engine depends on this
/// rather than the full service so its tests can script step outcomes.
#[async_trait]
pub trait RunCommand: Send + Sync {
    async fn run(&self, speaker: &str, action: &str, args: &[String]) -> CommandResult;
}

pub struct CommandService {
    supervisor: Arc<ProcessSupervisor>,
    transport: Arc<dyn CommandTransport>,
    discovery: Arc<DiscoveryCache>,
    default_timeout: Duration,
}

impl CommandService {
    pub fn new(
        supervisor: Arc<ProcessSupervisor>,
        transport: Arc<dyn CommandTransport>,
        discovery: Arc<DiscoveryCache>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            supervisor,
            transport,
            discovery,
            default_timeout,
        }
    }

    pub async fn execute(&self, request: CommandRequest) -> CommandResult {
        self.execute_with_timeout(request, self.default_timeout)
            .await
    }

    /// Run one command end to end.
    ///
    /// At most two network attempts ever happen: the first dispatch, and one
    /// retry after a server restart when the first attempt could not reach
    /// the server at all. A server that answers — even with garbage or a
    /// failing exit code — consumes the only attempt.
    pub async fn execute_with_timeout(
        &self,
        request: CommandRequest,
        timeout: Duration,
    ) -> CommandResult {
        if !self.supervisor.is_running().await && !self.supervisor.start().await {
            return CommandResult::synthetic_failure(
                &request,
                "command server is not running and could not be started",
            );
        }

        if let Err(e) = self.resolve_speaker(&request.speaker).await {
            return CommandResult::synthetic_failure(&request, e.to_string());
        }

        match self.transport.send(&request, timeout).await {
            Ok(result) => result,
            Err(AppError::Transport { message }) => {
                // Unreachable server: assume it died, restart it, retry once.
                log::warn!(
                    "command '{}' failed to reach the server ({message}); restarting and retrying",
                    request.action
                );
                if !self.supervisor.restart().await {
                    return CommandResult::synthetic_failure(
                        &request,
                        format!("command server restart failed after: {message}"),
                    );
                }
                match self.transport.send(&request, timeout).await {
                    Ok(result) => result,
                    Err(e) => CommandResult::synthetic_failure(&request, e.to_string()),
                }
            }
            // The server answered, just not with a command result. Retrying
            // would send a duplicate command, so don't.
            Err(e) => CommandResult::synthetic_failure(&request, e.to_string()),
        }
    }

    /// Exact-name lookup against the discovery cache, with one forced
    /// rediscovery when the name is unknown (covers speakers added since the
    /// last scan).
    async fn resolve_speaker(&self, name: &str) -> Result<(), AppError> {
        let known = self.discovery.discover(false).await?;
        if known.iter().any(|s| s == name) {
            return Ok(());
        }

        let known = self.discovery.discover(true).await?;
        if known.iter().any(|s| s == name) {
            return Ok(());
        }

        Err(AppError::SpeakerNotFound {
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl RunCommand for CommandService {
    async fn run(&self, speaker: &str, action: &str, args: &[String]) -> CommandResult {
        self.execute(CommandRequest::new(speaker, action, args))
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::test_support::FakeDevice;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Transport that replays scripted outcomes and counts attempts.
    #[derive(Default)]
    struct FakeTransport {
        outcomes: Mutex<VecDeque<Result<CommandResult, AppError>>>,
        send_calls: AtomicUsize,
    }

    impl FakeTransport {
        fn scripted(outcomes: Vec<Result<CommandResult, AppError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                send_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CommandTransport for FakeTransport {
        async fn send(
            &self,
            request: &CommandRequest,
            _timeout: Duration,
        ) -> Result<CommandResult, AppError> {
            self.send_calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes.lock().pop_front().unwrap_or_else(|| {
                Ok(CommandResult {
                    speaker: request.speaker.clone(),
                    action: request.action.clone(),
                    args: request.args.clone(),
                    exit_code: 0,
                    result: String::new(),
                    error_msg: String::new(),
                })
            })
        }
    }

    fn service_with(
        supervisor: ProcessSupervisor,
        transport: Arc<FakeTransport>,
        speakers: Vec<String>,
    ) -> CommandService {
        let device = Arc::new(FakeDevice::with_discovery(vec![speakers]));
        CommandService::new(
            Arc::new(supervisor),
            transport,
            Arc::new(DiscoveryCache::new(device)),
            Duration::from_secs(10),
        )
    }

    #[tokio::test]
    async fn failed_start_short_circuits_without_network() {
        let transport = Arc::new(FakeTransport::default());
        let service = service_with(
            ProcessSupervisor::new(PathBuf::from("/does/not/exist"), 39140),
            transport.clone(),
            vec!["Kitchen".to_string()],
        );

        let result = service
            .execute(CommandRequest::new("Kitchen", "play", &[]))
            .await;

        assert_eq!(result.exit_code, -1);
        assert!(result.error_msg.contains("could not be started"));
        assert_eq!(transport.send_calls.load(Ordering::SeqCst), 0);
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Same rig as the supervisor tests: a sleeping script child plus an
        /// in-test listener that satisfies the health check.
        async fn running_supervisor(dir: &std::path::Path, port: u16) -> ProcessSupervisor {
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

            let supervisor = ProcessSupervisor::new(script, port);
            assert!(supervisor.start().await);
            supervisor
        }

        #[tokio::test]
        async fn transport_failure_restarts_and_retries_once() {
            let dir = tempfile::tempdir().unwrap();
            let supervisor = running_supervisor(dir.path(), 39142).await;

            let ok = CommandResult {
                speaker: "Kitchen".to_string(),
                action: "play".to_string(),
                args: vec![],
                exit_code: 0,
                result: "ok".to_string(),
                error_msg: String::new(),
            };
            let transport = Arc::new(FakeTransport::scripted(vec![
                Err(AppError::Transport {
                    message: "connection refused".to_string(),
                }),
                Ok(ok.clone()),
            ]));
            let service = service_with(supervisor, transport.clone(), vec!["Kitchen".to_string()]);

            let result = service
                .execute(CommandRequest::new("Kitchen", "play", &[]))
                .await;

            assert_eq!(result, ok);
            assert_eq!(transport.send_calls.load(Ordering::SeqCst), 2);
        }

        #[tokio::test]
        async fn two_transport_failures_never_take_a_third_attempt() {
            let dir = tempfile::tempdir().unwrap();
            let supervisor = running_supervisor(dir.path(), 39143).await;

            let transport = Arc::new(FakeTransport::scripted(vec![
                Err(AppError::Transport {
                    message: "connection refused".to_string(),
                }),
                Err(AppError::Transport {
                    message: "connection refused".to_string(),
                }),
            ]));
            let service = service_with(supervisor, transport.clone(), vec!["Kitchen".to_string()]);

            let result = service
                .execute(CommandRequest::new("Kitchen", "play", &[]))
                .await;

            assert_eq!(result.exit_code, -1);
            assert_eq!(transport.send_calls.load(Ordering::SeqCst), 2);
        }

        #[tokio::test]
        async fn protocol_error_does_not_retry() {
            let dir = tempfile::tempdir().unwrap();
            let supervisor = running_supervisor(dir.path(), 39146).await;

            let transport = Arc::new(FakeTransport::scripted(vec![Err(AppError::Protocol {
                message: "unparsable command response".to_string(),
            })]));
            let service = service_with(supervisor, transport.clone(), vec!["Kitchen".to_string()]);

            let result = service
                .execute(CommandRequest::new("Kitchen", "play", &[]))
                .await;

            assert_eq!(result.exit_code, -1);
            assert!(result.error_msg.contains("unparsable"));
            assert_eq!(transport.send_calls.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn domain_failure_passes_through_unchanged() {
            let dir = tempfile::tempdir().unwrap();
            let supervisor = running_supervisor(dir.path(), 39144).await;

            let failed = CommandResult {
                speaker: "Kitchen".to_string(),
                action: "play_favourite".to_string(),
                args: vec!["No Such".to_string()],
                exit_code: 1,
                result: String::new(),
                error_msg: "favourite not found".to_string(),
            };
            let transport = Arc::new(FakeTransport::scripted(vec![Ok(failed.clone())]));
            let service = service_with(supervisor, transport.clone(), vec!["Kitchen".to_string()]);

            let result = service
                .execute(CommandRequest::new(
                    "Kitchen",
                    "play_favourite",
                    &["No Such".to_string()],
                ))
                .await;

            // Non-zero exit from the server is a domain answer, not a
            // transport problem: no retry, no rewriting.
            assert_eq!(result, failed);
            assert_eq!(transport.send_calls.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn unknown_speaker_forces_one_rediscovery_then_fails() {
            let dir = tempfile::tempdir().unwrap();
            let supervisor = running_supervisor(dir.path(), 39145).await;

            let transport = Arc::new(FakeTransport::default());
            let device = Arc::new(FakeDevice::with_discovery(vec![vec![
                "Kitchen".to_string()
            ]]));
            let service = CommandService::new(
                Arc::new(supervisor),
                transport.clone(),
                Arc::new(DiscoveryCache::new(device.clone())),
                Duration::from_secs(10),
            );

            let result = service
                .execute(CommandRequest::new("Attic", "play", &[]))
                .await;

            assert_eq!(result.exit_code, -1);
            assert!(result.error_msg.contains("Attic"));
            // Initial scan (cold cache) plus the one forced rediscovery
            assert_eq!(device.discover_calls.load(Ordering::SeqCst), 2);
            assert_eq!(transport.send_calls.load(Ordering::SeqCst), 0);
        }
    }
}
