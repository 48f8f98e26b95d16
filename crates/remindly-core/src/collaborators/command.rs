use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

use super::{CommandOutcome, CommandOutput, CommandRunner};

/// How long pipe output is awaited once the shell itself has exited.
const DRAIN_GRACE: Duration = Duration::from_millis(100);

/// Runs commands through the platform shell, killing them on timeout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellCommandRunner;

impl ShellCommandRunner {
    pub fn new() -> Self {
        Self
    }

    fn shell(command: &str) -> Command {
        #[cfg(windows)]
        {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", command]);
            cmd
        }
        #[cfg(not(windows))]
        {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", command]);
            cmd
        }
    }
}

/// Reads a pipe to the end on its own thread. Processes forked by the shell
/// may keep the pipe open after the shell is gone, so readers wait on the
/// channel with a deadline instead of joining the thread.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        let _ = tx.send(buf);
    });
    rx
}

fn collect(rx: &Receiver<String>, deadline: Instant) -> String {
    let wait = deadline
        .saturating_duration_since(Instant::now())
        .max(DRAIN_GRACE);
    rx.recv_timeout(wait).unwrap_or_default()
}

impl CommandRunner for ShellCommandRunner {
    fn run(&self, command: &str, timeout: Duration) -> CommandOutput {
        let mut child = match Self::shell(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return CommandOutput::failed(format!("could not start: {e}")),
        };

        let deadline = Instant::now() + timeout;
        let stdout_rx = drain(child.stdout.take());
        let stderr_rx = drain(child.stderr.take());

        let status = child.wait_timeout(timeout);
        let (stdout, stderr) = if matches!(status, Ok(Some(_))) {
            (collect(&stdout_rx, deadline), collect(&stderr_rx, deadline))
        } else {
            tracing::warn!(command, timeout_secs = timeout.as_secs(), "killing command");
            let _ = child.kill();
            let _ = child.wait();
            // Only readers that already hit EOF; a forked process that
            // outlives the shell must not hold up the caller.
            (
                stdout_rx.try_recv().unwrap_or_default(),
                stderr_rx.try_recv().unwrap_or_default(),
            )
        };

        let outcome = match status {
            Ok(Some(status)) if status.success() => CommandOutcome::Success,
            Ok(Some(status)) => {
                let message = stderr.trim();
                if message.is_empty() {
                    CommandOutcome::Error(format!("exited with {status}"))
                } else {
                    CommandOutcome::Error(message.to_string())
                }
            }
            Ok(None) => CommandOutcome::Timeout(timeout.as_secs()),
            Err(e) => CommandOutcome::Error(e.to_string()),
        };

        tracing::debug!(command, ?outcome, "command finished");
        CommandOutput {
            stdout,
            stderr,
            outcome,
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout() {
        let out = ShellCommandRunner::new().run("echo hello", Duration::from_secs(5));
        assert_eq!(out.outcome, CommandOutcome::Success);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn nonzero_exit_uses_stderr() {
        let out = ShellCommandRunner::new().run("echo broken >&2; exit 3", Duration::from_secs(5));
        assert_eq!(out.outcome, CommandOutcome::Error("broken".into()));
    }

    #[test]
    fn slow_command_times_out() {
        let out = ShellCommandRunner::new().run("sleep 5", Duration::from_millis(100));
        assert_eq!(out.outcome, CommandOutcome::Timeout(0));
    }

    #[test]
    fn timeout_bounds_compound_commands() {
        let started = Instant::now();
        let out = ShellCommandRunner::new().run("sleep 3; echo done", Duration::from_millis(200));
        assert_eq!(out.outcome, CommandOutcome::Timeout(0));
        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
        assert!(!out.stdout.contains("done"));
    }

    #[test]
    fn background_process_does_not_hold_up_success() {
        let started = Instant::now();
        let out = ShellCommandRunner::new().run("sleep 3 & echo quick", Duration::from_secs(1));
        assert_eq!(out.outcome, CommandOutcome::Success);
        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    }
}
