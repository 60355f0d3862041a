use gitbar_core::ports::AuthProbe;
use std::process::Command;
use std::time::Duration;
use tracing::debug;

use super::process::run_with_timeout;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Probes the local SSH agent and the GitHub CLI by running them.
#[derive(Debug, Clone)]
pub struct SystemAuthProbe {
    timeout: Duration,
}

impl SystemAuthProbe {
    pub fn new() -> Self {
        Self {
            timeout: PROBE_TIMEOUT,
        }
    }

    /// Exit code of `program args..`, or `None` if it could not run or timed out.
    fn exit_code(&self, program: &str, args: &[&str]) -> Option<i32> {
        let mut command = Command::new(program);
        command.args(args);
        match run_with_timeout(command, self.timeout) {
            Ok(output) if output.timed_out => {
                debug!("{} timed out after {:?}", program, self.timeout);
                None
            }
            Ok(output) => output.exit_code,
            Err(e) => {
                debug!("{} unavailable: {:#}", program, e);
                None
            }
        }
    }
}

impl Default for SystemAuthProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthProbe for SystemAuthProbe {
    fn ssh_agent(&self) -> bool {
        // 0: keys loaded, 1: agent running without keys, 2: no agent
        let available = matches!(self.exit_code("ssh-add", &["-l"]), Some(0) | Some(1));
        debug!("SSH agent available: {}", available);
        available
    }

    fn cli_auth(&self) -> bool {
        let available = self.exit_code("gh", &["auth", "status"]) == Some(0);
        debug!("GitHub CLI authenticated: {}", available);
        available
    }
}
