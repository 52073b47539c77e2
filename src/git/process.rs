use crate::cancel::CancellationToken;
use crate::error::ExtractionError;
use std::ffi::OsStr;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

/// Runs `git -C <repo> <args>` and waits for it, killing the child when
/// `timeout` elapses or `cancel` fires. Pipes are drained on helper threads
/// so large logs cannot stall the child.
pub fn run_git<I, S>(
    program: &str,
    repo: &Path,
    args: I,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<ProcessOutput, ExtractionError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    if cancel.is_cancelled() {
        return Err(ExtractionError::Cancelled);
    }

    let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
    let command_line = describe(&args);
    debug!("running git {} in {}", command_line, repo.display());

    let mut command = Command::new(program);
    command
        .arg("--no-pager")
        .arg("-C")
        .arg(repo)
        .args(&args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|source| ExtractionError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = wait(&mut child, timeout, cancel).map_err(|err| match err {
        WaitError::TimedOut => {
            warn!("git {} timed out after {:?} in {}", command_line, timeout, repo.display());
            ExtractionError::TimedOut {
                command: command_line.clone(),
                timeout,
            }
        }
        WaitError::Cancelled => ExtractionError::Cancelled,
        WaitError::Io(source) => ExtractionError::Spawn {
            program: program.to_string(),
            source,
        },
    })?;

    Ok(ProcessOutput {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: String::from_utf8_lossy(&stderr.join().unwrap_or_default())
            .trim()
            .to_string(),
    })
}

impl ProcessOutput {
    /// Stdout of a successful run, or `Exited` carrying stderr. A failed
    /// exit after `cancel` fired is `Cancelled`: an interrupt reaches git too.
    pub fn into_success(
        self,
        command: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ExtractionError> {
        if self.status.success() {
            Ok(self.stdout)
        } else if cancel.is_cancelled() {
            Err(ExtractionError::Cancelled)
        } else {
            Err(ExtractionError::Exited {
                command: command.to_string(),
                code: self.status.code().unwrap_or(-1),
                stderr: self.stderr,
            })
        }
    }
}

enum WaitError {
    TimedOut,
    Cancelled,
    Io(std::io::Error),
}

fn wait(
    child: &mut Child,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<ExitStatus, WaitError> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                let reason = if cancel.is_cancelled() {
                    Some(WaitError::Cancelled)
                } else if start.elapsed() > timeout {
                    Some(WaitError::TimedOut)
                } else {
                    None
                };
                if let Some(reason) = reason {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(reason);
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                let _ = child.kill();
                return Err(WaitError::Io(e));
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn describe(args: &[std::ffi::OsString]) -> String {
    args.iter()
        .take(2)
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}
