//! Remote command runner seam.
//!
//! Tasks render their commands and hand them to a [`RemoteRunner`] one host
//! at a time. Production code uses [`SshRunner`]; tests substitute a runner
//! that records what would have been executed.

use crate::error::Result;
use crate::role::HostSpec;
use crate::ssh::{CommandOutput, PromptResponder, SshClient};

pub trait RemoteRunner {
    /// Execute one rendered command line on `host`.
    ///
    /// `Err` means the command could not be issued at all; a command that ran
    /// and exited non-zero is reported through `CommandOutput::success`.
    fn execute(&self, host: &HostSpec, command: &str) -> Result<CommandOutput>;

    /// Execute a command that may prompt, answering through `responder`.
    fn execute_with_responder(
        &self,
        host: &HostSpec,
        command: &str,
        responder: &mut PromptResponder,
    ) -> Result<CommandOutput>;
}

/// Runs commands through the system `ssh` client.
pub struct SshRunner {
    default_user: String,
}

impl SshRunner {
    pub fn new(default_user: impl Into<String>) -> Self {
        Self {
            default_user: default_user.into(),
        }
    }
}

impl RemoteRunner for SshRunner {
    fn execute(&self, host: &HostSpec, command: &str) -> Result<CommandOutput> {
        let client = SshClient::from_host(host, &self.default_user)?;
        Ok(client.execute(command))
    }

    fn execute_with_responder(
        &self,
        host: &HostSpec,
        command: &str,
        responder: &mut PromptResponder,
    ) -> Result<CommandOutput> {
        let client = SshClient::from_host(host, &self.default_user)?;
        Ok(client.execute_with_responder(command, responder))
    }
}
