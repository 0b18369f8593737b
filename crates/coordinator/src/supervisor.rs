//! Lifecycle of the long-running development server
//!
//! The child handle lives inside a monitor task; the supervisor only keeps a
//! stop channel and the pid. Natural exits are reported on an mpsc channel
//! tagged with the generation of the process that exited.

use devloop_core::{
    error::{Error, Result},
    ServerConfig,
};
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const EXIT_CHANNEL_CAPACITY: usize = 8;

/// Lifecycle state of the supervised server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// A server process exited without being asked to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerExit {
    /// Generation of the process that exited
    pub generation: u64,
    /// Exit code; `None` when terminated by a signal
    pub code: Option<i32>,
}

impl ServerExit {
    /// Exit code to propagate, treating signal deaths as 0
    pub fn exit_code(&self) -> i32 {
        self.code.unwrap_or(0)
    }
}

struct StopRequest {
    grace: Option<Duration>,
    ack: oneshot::Sender<Option<i32>>,
}

/// Owns the single supervised server process
pub struct ProcessSupervisor {
    config: ServerConfig,
    state: ServerState,
    generation: u64,
    restarting: bool,
    pid: Option<u32>,
    stop_tx: Option<oneshot::Sender<StopRequest>>,
    monitor: Option<JoinHandle<()>>,
    exits: mpsc::Sender<ServerExit>,
}

impl ProcessSupervisor {
    /// Create a supervisor and the receiver of its unexpected-exit notifications
    pub fn new(config: &ServerConfig) -> (Self, mpsc::Receiver<ServerExit>) {
        let (exits, exit_rx) = mpsc::channel(EXIT_CHANNEL_CAPACITY);
        let supervisor = Self {
            config: config.clone(),
            state: ServerState::Stopped,
            generation: 0,
            restarting: false,
            pid: None,
            stop_tx: None,
            monitor: None,
            exits,
        };
        (supervisor, exit_rx)
    }

    /// Spawn the server
    ///
    /// Returns the generation of the new process.
    pub fn start(&mut self) -> Result<u64> {
        if self.stop_tx.is_some() {
            return Err(Error::process_management(format!(
                "Server is already {}",
                self.state
            )));
        }

        self.state = ServerState::Starting;
        let child = Command::new(&self.config.program)
            .args(&self.config.args)
            .current_dir(&self.config.working_dir)
            .stdin(Stdio::null())
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => {
                self.state = ServerState::Stopped;
                return Err(Error::spawn(self.config.command_line(), e));
            }
        };

        self.generation += 1;
        self.pid = child.id();
        let (stop_tx, stop_rx) = oneshot::channel();
        self.monitor = Some(tokio::spawn(monitor(
            child,
            self.generation,
            stop_rx,
            self.exits.clone(),
        )));
        self.stop_tx = Some(stop_tx);
        self.state = ServerState::Running;

        info!(
            pid = ?self.pid,
            generation = self.generation,
            "Server started: {}",
            self.config.command_line()
        );
        Ok(self.generation)
    }

    /// Interrupt the server and wait for it to exit
    ///
    /// With a stop timeout configured the server is killed once the timeout
    /// elapses. Returns the exit code, `None` if there was nothing to stop or
    /// the process died from a signal.
    pub async fn stop(&mut self) -> Result<Option<i32>> {
        let Some(stop_tx) = self.stop_tx.take() else {
            self.state = ServerState::Stopped;
            return Ok(None);
        };

        self.state = ServerState::Stopping;
        info!(pid = ?self.pid, "Stopping server");

        let (ack, ack_rx) = oneshot::channel();
        let request = StopRequest {
            grace: self.config.stop_timeout(),
            ack,
        };
        let code = if stop_tx.send(request).is_err() {
            warn!(pid = ?self.pid, "Server exited before it could be stopped");
            None
        } else {
            ack_rx.await.unwrap_or(None)
        };

        let monitor = self.monitor.take();
        self.pid = None;
        if !self.restarting {
            self.state = ServerState::Stopped;
        }
        if let Some(monitor) = monitor {
            monitor.await.map_err(|e| {
                Error::process_management(format!("Server monitor ended abnormally: {e}"))
            })?;
        }

        debug!(?code, "Server stopped");
        Ok(code)
    }

    /// Stop the current server and start a replacement
    ///
    /// The old process has exited before the new one is spawned.
    pub async fn restart(&mut self) -> Result<u64> {
        if self.restarting {
            return Err(Error::process_management("Restart already in progress"));
        }

        self.restarting = true;
        let result = self.replace().await;
        self.restarting = false;
        result
    }

    async fn replace(&mut self) -> Result<u64> {
        self.stop().await?;
        self.start()
    }

    /// Send SIGINT to the server without waiting for it to exit
    pub fn interrupt(&mut self) -> Result<()> {
        if self.stop_tx.is_none() {
            return Ok(());
        }
        info!(pid = ?self.pid, "Interrupting server");
        self.state = ServerState::Stopping;

        #[cfg(unix)]
        if let Some(pid) = self.pid {
            send_sigint(pid)?;
        }

        #[cfg(not(unix))]
        if let Some(stop_tx) = self.stop_tx.take() {
            let (ack, _) = oneshot::channel();
            if stop_tx
                .send(StopRequest {
                    grace: self.config.stop_timeout(),
                    ack,
                })
                .is_err()
            {
                debug!("Server had already exited");
            }
        }

        Ok(())
    }

    /// Account for an exit notification
    ///
    /// Returns `true` when the current server exited on its own, outside a
    /// restart. Exits of replaced generations return `false`.
    pub fn handle_exit(&mut self, exit: &ServerExit) -> bool {
        if self.restarting || !self.is_current(exit.generation) {
            debug!(
                generation = exit.generation,
                current = self.generation,
                "Ignoring exit of replaced server"
            );
            return false;
        }

        self.state = ServerState::Stopped;
        self.pid = None;
        self.stop_tx = None;
        self.monitor = None;
        true
    }

    /// Whether `generation` is the most recently spawned server
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    /// Current lifecycle state
    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Generation of the most recently spawned server, 0 before the first start
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Pid of the running server
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }
}

/// Owns the child until it exits or a stop is requested
async fn monitor(
    mut child: Child,
    generation: u64,
    stop_rx: oneshot::Receiver<StopRequest>,
    exits: mpsc::Sender<ServerExit>,
) {
    tokio::select! {
        status = child.wait() => {
            let code = match status {
                Ok(status) => status.code(),
                Err(e) => {
                    warn!("Failed to wait for server: {}", e);
                    None
                }
            };
            info!(generation, ?code, "Server exited");
            report_exit(&exits, ServerExit { generation, code }).await;
        }
        request = stop_rx => match request {
            Ok(request) => {
                let code = terminate(&mut child, request.grace).await;
                if request.ack.send(code).is_err() {
                    debug!("Stop requester went away");
                }
            }
            Err(_) => {
                // Supervisor dropped: keep reporting the natural exit
                let code = child.wait().await.ok().and_then(|s| s.code());
                report_exit(&exits, ServerExit { generation, code }).await;
            }
        },
    }
}

async fn report_exit(exits: &mpsc::Sender<ServerExit>, exit: ServerExit) {
    if exits.send(exit).await.is_err() {
        debug!("No receiver for server exit {:?}", exit);
    }
}

/// Interrupt, wait up to `grace`, then kill
async fn terminate(child: &mut Child, grace: Option<Duration>) -> Option<i32> {
    if let Err(e) = interrupt_child(child) {
        warn!("{}", e);
    }

    let waited = match grace {
        Some(grace) => tokio::time::timeout(grace, child.wait()).await.ok(),
        None => Some(child.wait().await),
    };

    let status = match waited {
        Some(status) => status,
        None => {
            warn!("Server did not exit within {:?}, killing it", grace);
            if let Err(e) = child.kill().await {
                warn!("Failed to kill server: {}", e);
            }
            child.wait().await
        }
    };

    match status {
        Ok(status) => status.code(),
        Err(e) => {
            warn!("Failed to wait for server: {}", e);
            None
        }
    }
}

#[cfg(unix)]
fn interrupt_child(child: &mut Child) -> Result<()> {
    match child.id() {
        Some(pid) => send_sigint(pid),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn interrupt_child(child: &mut Child) -> Result<()> {
    child
        .start_kill()
        .map_err(|e| Error::process_management(format!("Failed to stop server: {e}")))
}

#[cfg(unix)]
fn send_sigint(pid: u32) -> Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid)
        .map_err(|_| Error::process_management(format!("Pid {pid} out of range")))?;
    kill(Pid::from_raw(raw), Signal::SIGINT).map_err(|e| {
        Error::process_management(format!("Failed to send SIGINT to {pid}: {e}"))
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn server(program: &str, args: &[&str], stop_timeout_ms: Option<u64>) -> ServerConfig {
        ServerConfig {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            working_dir: std::env::temp_dir(),
            stop_timeout_ms,
        }
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let (mut supervisor, _exits) = ProcessSupervisor::new(&server("sleep", &["30"], Some(5000)));
        assert_eq!(supervisor.state(), ServerState::Stopped);

        let generation = supervisor.start().expect("spawn sleep");
        assert_eq!(generation, 1);
        assert_eq!(supervisor.state(), ServerState::Running);
        assert!(supervisor.pid().is_some());

        // sleep dies from SIGINT, so there is no exit code
        let code = supervisor.stop().await.expect("stop");
        assert_eq!(code, None);
        assert_eq!(supervisor.state(), ServerState::Stopped);
        assert!(supervisor.pid().is_none());
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let (mut supervisor, _exits) = ProcessSupervisor::new(&server("sleep", &["30"], Some(5000)));
        supervisor.start().expect("spawn sleep");
        assert!(supervisor.start().is_err());
        supervisor.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn test_spawn_failure_leaves_stopped() {
        let (mut supervisor, _exits) =
            ProcessSupervisor::new(&server("devloop-definitely-not-a-command", &[], None));
        let err = supervisor.start().unwrap_err();
        assert!(err.is_spawn());
        assert_eq!(supervisor.state(), ServerState::Stopped);
        assert_eq!(supervisor.generation(), 0);
    }

    #[tokio::test]
    async fn test_natural_exit_is_reported() {
        let (mut supervisor, mut exits) =
            ProcessSupervisor::new(&server("sh", &["-c", "exit 3"], Some(5000)));
        supervisor.start().expect("spawn sh");

        let exit = exits.recv().await.expect("exit notification");
        assert_eq!(exit, ServerExit { generation: 1, code: Some(3) });
        assert_eq!(exit.exit_code(), 3);
        assert!(supervisor.handle_exit(&exit));
        assert_eq!(supervisor.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_restart_replaces_process() {
        let (mut supervisor, mut exits) =
            ProcessSupervisor::new(&server("sleep", &["30"], Some(5000)));
        supervisor.start().expect("spawn sleep");
        let first_pid = supervisor.pid();

        let generation = supervisor.restart().await.expect("restart");
        assert_eq!(generation, 2);
        assert_eq!(supervisor.state(), ServerState::Running);
        assert_ne!(supervisor.pid(), first_pid);

        // A stale exit from the first generation is never treated as unexpected
        assert!(!supervisor.handle_exit(&ServerExit {
            generation: 1,
            code: Some(0)
        }));

        supervisor.stop().await.expect("stop");
        assert!(exits.try_recv().is_err());
    }

    /// Holds `server.lock` while alive and logs a collision if it finds one
    const LOCKING_SERVER: &str = "trap 'rm -f server.lock; exit 0' INT
if [ -e server.lock ]; then echo collision >> collisions.log; exit 1; fi
echo $$ > server.lock
while true; do sleep 0.05; done";

    async fn wait_for_lock_holder(dir: &std::path::Path, pid: u32) {
        let lock = dir.join("server.lock");
        for _ in 0..200 {
            let holder = std::fs::read_to_string(&lock).unwrap_or_default();
            if holder.trim() == pid.to_string() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("server {pid} never took the lock");
    }

    #[tokio::test]
    async fn test_restart_never_overlaps_processes() {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let dir = tempfile::tempdir().expect("test setup failed");
        let config = ServerConfig {
            working_dir: dir.path().to_path_buf(),
            ..server("sh", &["-c", LOCKING_SERVER], Some(5000))
        };
        let (mut supervisor, _exits) = ProcessSupervisor::new(&config);

        supervisor.start().expect("spawn sh");
        let first_pid = supervisor.pid().expect("running");
        wait_for_lock_holder(dir.path(), first_pid).await;

        assert_eq!(supervisor.restart().await.expect("restart"), 2);

        // The first process is reaped before the replacement is spawned
        assert!(kill(Pid::from_raw(first_pid as i32), None).is_err());

        let second_pid = supervisor.pid().expect("running");
        assert_ne!(second_pid, first_pid);
        wait_for_lock_holder(dir.path(), second_pid).await;
        assert!(!dir.path().join("collisions.log").exists());

        supervisor.stop().await.expect("stop");
        assert!(!dir.path().join("server.lock").exists());
    }

    #[tokio::test]
    async fn test_stop_after_unhandled_exit_reports_nothing() {
        let (mut supervisor, mut exits) =
            ProcessSupervisor::new(&server("sh", &["-c", "exit 3"], Some(5000)));
        supervisor.start().expect("spawn sh");

        // The exit is received but never handed to handle_exit
        let exit = exits.recv().await.expect("exit notification");
        assert_eq!(exit.generation, 1);

        assert_eq!(supervisor.stop().await.expect("stop"), None);
        assert_eq!(supervisor.state(), ServerState::Stopped);
        assert!(supervisor.pid().is_none());

        // Nothing is left to stop, and a fresh start is allowed
        assert_eq!(supervisor.stop().await.expect("stop"), None);
        assert_eq!(supervisor.start().expect("respawn"), 2);
    }

    #[tokio::test]
    async fn test_stop_kills_after_timeout() {
        // The ignored disposition survives exec, so sleep ignores SIGINT too
        let (mut supervisor, _exits) = ProcessSupervisor::new(&server(
            "sh",
            &["-c", "trap '' INT; exec sleep 30"],
            Some(200),
        ));
        supervisor.start().expect("spawn sh");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = std::time::Instant::now();
        let code = supervisor.stop().await.expect("stop");
        assert_eq!(code, None);
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(supervisor.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_interrupt_does_not_wait() {
        let (mut supervisor, mut exits) =
            ProcessSupervisor::new(&server("sleep", &["30"], Some(5000)));
        supervisor.start().expect("spawn sleep");

        supervisor.interrupt().expect("interrupt");
        assert_eq!(supervisor.state(), ServerState::Stopping);

        let exit = exits.recv().await.expect("exit notification");
        assert_eq!(exit.generation, 1);
        assert_eq!(exit.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_stop_without_server_is_noop() {
        let (mut supervisor, _exits) = ProcessSupervisor::new(&server("sleep", &["30"], None));
        assert_eq!(supervisor.stop().await.expect("stop"), None);
        supervisor.interrupt().expect("interrupt");
    }
}
