use std::io;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::process::{Child, Command};

use crate::endpoint::ExecPrefix;
use crate::error::ProbeError;

/// A background process that can be asked to stop.
pub trait ReceiverProcess: Send {
    /// Signals the process to stop. Must not block waiting for it to exit.
    fn terminate(&mut self);
}

impl ReceiverProcess for Child {
    fn terminate(&mut self) {
        if let Err(e) = self.start_kill() {
            debug!("receiver already gone: {}", e);
        }
    }
}

/// Owns a running receiver and stops it when dropped.
///
/// `terminate` may be called any number of times; only the first call signals the process.
pub struct ReceiverGuard {
    label: String,
    process: Option<Box<dyn ReceiverProcess>>,
}

impl ReceiverGuard {
    pub fn new(label: impl Into<String>, process: impl ReceiverProcess + 'static) -> Self {
        Self {
            label: label.into(),
            process: Some(Box::new(process)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_running(&self) -> bool {
        self.process.is_some()
    }

    pub fn terminate(&mut self) {
        if let Some(mut process) = self.process.take() {
            process.terminate();
            debug!("stopped receiver `{}`", self.label);
        }
    }
}

impl Drop for ReceiverGuard {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Runs the external measurement tools on simulated hosts.
#[async_trait]
pub trait ProbeRunner: Send + Sync {
    /// Starts a long-running receiver (e.g. `iperf -s`) on `host`.
    fn spawn_receiver(&self, host: &str, argv: &[String]) -> Result<ReceiverGuard, ProbeError>;

    /// Runs `argv` on `host` to completion and returns its combined output. Gives up after
    /// `timeout`.
    async fn run(&self, host: &str, argv: &[String], timeout: Duration) -> Result<String, ProbeError>;
}

#[async_trait]
impl<T: ProbeRunner + ?Sized> ProbeRunner for &T {
    fn spawn_receiver(&self, host: &str, argv: &[String]) -> Result<ReceiverGuard, ProbeError> {
        (**self).spawn_receiver(host, argv)
    }

    async fn run(&self, host: &str, argv: &[String], timeout: Duration) -> Result<String, ProbeError> {
        (**self).run(host, argv, timeout).await
    }
}

/// Runs probes as local child processes wrapped in an [`ExecPrefix`].
#[derive(Debug, Clone, Default)]
pub struct CommandProbeRunner {
    prefix: ExecPrefix,
}

impl CommandProbeRunner {
    pub fn new(prefix: ExecPrefix) -> Self {
        Self { prefix }
    }

    fn command(&self, host: &str, argv: &[String]) -> Result<(Command, String), ProbeError> {
        let full = self.prefix.argv(host, argv);
        let label = full.join(" ");
        let Some((program, args)) = full.split_first() else {
            return Err(ProbeError::Spawn {
                command: label,
                source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
            });
        };
        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::null()).kill_on_drop(true);
        Ok((command, label))
    }
}

#[async_trait]
impl ProbeRunner for CommandProbeRunner {
    fn spawn_receiver(&self, host: &str, argv: &[String]) -> Result<ReceiverGuard, ProbeError> {
        let (mut command, label) = self.command(host, argv)?;
        let child = command
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ProbeError::Spawn {
                command: label.clone(),
                source,
            })?;
        debug!("started receiver `{}` (pid {:?})", label, child.id());
        Ok(ReceiverGuard::new(label, child))
    }

    async fn run(&self, host: &str, argv: &[String], timeout: Duration) -> Result<String, ProbeError> {
        let (mut command, label) = self.command(host, argv)?;
        debug!("running `{}`", label);

        // dropping the pending future on timeout drops the child, which kills it
        let output = match tokio::time::timeout(timeout, command.output()).await {
            Err(_) => {
                return Err(ProbeError::Timeout {
                    command: label,
                    after: timeout,
                });
            }
            Ok(Err(source)) => return Err(ProbeError::Spawn { command: label, source }),
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            debug!("`{}` exited with {}", label, output.status);
        }
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(text)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProcess(Arc<AtomicUsize>);

    impl ReceiverProcess for CountingProcess {
        fn terminate(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn terminate_is_idempotent() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut guard = ReceiverGuard::new("iperf -s", CountingProcess(count.clone()));
        assert!(guard.is_running());
        guard.terminate();
        guard.terminate();
        assert!(!guard.is_running());
        drop(guard);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_terminates() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let _guard = ReceiverGuard::new("iperf -s -u", CountingProcess(count.clone()));
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn local_command_output_is_captured() {
        let runner = CommandProbeRunner::new(ExecPrefix::local());
        let output = runner
            .run("h1", &argv(&["sh", "-c", "echo 9.41 Mbits/sec; echo oops >&2"]), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(output.contains("9.41 Mbits/sec"));
        assert!(output.contains("oops"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_command_times_out() {
        let runner = CommandProbeRunner::new(ExecPrefix::local());
        let result = runner
            .run("h1", &argv(&["sleep", "5"]), Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(ProbeError::Timeout { .. })));
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let runner = CommandProbeRunner::new(ExecPrefix::local());
        let result = runner
            .run("h1", &argv(&["/nonexistent/qos-routing-lab-probe"]), Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(ProbeError::Spawn { .. })));
        assert!(runner.spawn_receiver("h2", &argv(&["/nonexistent/qos-routing-lab-probe"])).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn receiver_is_killed_without_waiting() {
        let runner = CommandProbeRunner::new(ExecPrefix::local());
        let mut guard = runner.spawn_receiver("h2", &argv(&["sleep", "30"])).unwrap();
        let started = std::time::Instant::now();
        guard.terminate();
        guard.terminate();
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
