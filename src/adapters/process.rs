use anyhow::{anyhow, Context, Result};
use std::io::{self, Read};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// What a bounded subprocess run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when killed by a signal, including our own timeout kill.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Drain a pipe on its own thread so the child never blocks on a full buffer.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn collect(reader: JoinHandle<io::Result<Vec<u8>>>, program: &str) -> Result<String> {
    let bytes = reader
        .join()
        .map_err(|_| anyhow!("Output reader for {} panicked", program))?
        .with_context(|| format!("Failed to read output of {}", program))?;
    Ok(String::from_utf8_lossy(&bytes).to_string())
}

/// Run `command` to completion or until `timeout`, whichever comes first.
/// A child still running at the deadline is killed and reaped.
///
/// `Err` only when the process cannot be spawned or waited on.
pub fn run_with_timeout(mut command: Command, timeout: Duration) -> Result<CommandOutput> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let program = command.get_program().to_string_lossy().to_string();
    let mut child = command
        .spawn()
        .with_context(|| format!("Failed to spawn {}", program))?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() >= timeout => {
                let _ = child.kill();
                child
                    .wait()
                    .with_context(|| format!("Failed to reap {}", program))?;
                // Grandchildren may still hold the pipes; leave the readers detached
                return Ok(CommandOutput {
                    exit_code: None,
                    stdout: String::new(),
                    stderr: String::new(),
                    timed_out: true,
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e).with_context(|| format!("Failed to wait for {}", program));
            }
        }
    };

    Ok(CommandOutput {
        exit_code: status.code(),
        stdout: collect(stdout, &program)?,
        stderr: collect(stderr, &program)?,
        timed_out: false,
    })
}
