//! Authentication availability and fetch-method selection.

use crate::ports::AuthProbe;
use std::fmt;
use std::sync::OnceLock;
use tracing::debug;

/// Hosting domain for which the provider CLI is preferred.
pub const KNOWN_HOST: &str = "github.com";

/// Which mechanisms may be used at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthSettings {
    pub use_cli_auth: bool,
    pub use_ssh_agent: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            use_cli_auth: true,
            use_ssh_agent: true,
        }
    }
}

/// How a fetch will authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMethod {
    CliAuth,
    SshAgent,
    Http,
}

impl fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchMethod::CliAuth => f.write_str("cli-auth"),
            FetchMethod::SshAgent => f.write_str("ssh-agent"),
            FetchMethod::Http => f.write_str("http"),
        }
    }
}

/// Process-lifetime memo over an [`AuthProbe`].
///
/// Each helper is probed at most once, on first use, no matter how many
/// repositories or cycles ask. Disabled mechanisms are never probed.
pub struct AuthAvailability<P> {
    probe: P,
    settings: AuthSettings,
    ssh_agent: OnceLock<bool>,
    cli_auth: OnceLock<bool>,
}

impl<P: AuthProbe> AuthAvailability<P> {
    pub fn new(probe: P, settings: AuthSettings) -> Self {
        Self {
            probe,
            settings,
            ssh_agent: OnceLock::new(),
            cli_auth: OnceLock::new(),
        }
    }

    pub fn ssh_agent_available(&self) -> bool {
        if !self.settings.use_ssh_agent {
            return false;
        }
        *self.ssh_agent.get_or_init(|| {
            let available = self.probe.ssh_agent();
            debug!("SSH agent available: {}", available);
            available
        })
    }

    pub fn cli_auth_available(&self) -> bool {
        if !self.settings.use_cli_auth {
            return false;
        }
        *self.cli_auth.get_or_init(|| {
            let available = self.probe.cli_auth();
            debug!("CLI auth available: {}", available);
            available
        })
    }

    /// Pick a fetch method for a remote URL, or `None` to skip the fetch.
    pub fn select_fetch_method(&self, remote_url: &str) -> Option<FetchMethod> {
        if remote_url.contains(KNOWN_HOST) {
            if self.cli_auth_available() {
                return Some(FetchMethod::CliAuth);
            }
            if self.ssh_agent_available() {
                return Some(FetchMethod::SshAgent);
            }
            debug!("No authentication available for {} remote", KNOWN_HOST);
            return None;
        }

        if is_ssh_url(remote_url) {
            return self.ssh_agent_available().then_some(FetchMethod::SshAgent);
        }

        if is_http_url(remote_url) {
            // Stored credentials may apply
            return Some(FetchMethod::Http);
        }

        None
    }
}

fn is_ssh_url(url: &str) -> bool {
    url.starts_with("ssh://") || url.contains("git@")
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
