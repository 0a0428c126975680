use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::role::HostSpec;
use crate::ssh::prompt::{PromptResponder, PromptState};

/// A prompting session that goes this long without output is killed.
pub const PROMPT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

pub struct SshClient {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub identity_file: Option<String>,
    /// When true, all commands run locally instead of over SSH.
    /// Set automatically when the host is localhost/127.0.0.1/::1.
    pub is_local: bool,
    pub prompt_idle_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
            exit_code: 0,
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
            exit_code,
        }
    }
}

impl SshClient {
    pub fn from_host(host: &HostSpec, default_user: &str) -> Result<Self> {
        let identity_file = match &host.identity_file {
            Some(path) if !path.is_empty() => {
                let expanded = shellexpand::tilde(path).to_string();
                if !std::path::Path::new(&expanded).exists() {
                    return Err(Error::ssh_identity_file_not_found(
                        host.host.clone(),
                        expanded,
                    ));
                }
                Some(expanded)
            }
            _ => None,
        };

        let is_local = is_local_host(&host.host);
        if is_local {
            log_status!("ssh", "Host '{}' is localhost, using local execution", host.host);
        }

        Ok(Self {
            host: host.host.clone(),
            user: host.user.clone().unwrap_or_else(|| default_user.to_string()),
            port: host.port,
            identity_file,
            is_local,
            prompt_idle_timeout: PROMPT_IDLE_TIMEOUT,
        })
    }

    pub fn with_prompt_idle_timeout(mut self, timeout: Duration) -> Self {
        self.prompt_idle_timeout = timeout;
        self
    }

    fn build_ssh_args(&self, command: &str, allocate_tty: bool) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(identity_file) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity_file.clone());
        }

        if self.port != 22 {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }

        // Prompts such as `mysql -p` read from a terminal, not stdin.
        if allocate_tty {
            args.push("-tt".to_string());
        }

        // Timeout and keepalive options prevent hangs on stalled connections.
        args.extend([
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
            "-o".to_string(),
            "ServerAliveInterval=15".to_string(),
            "-o".to_string(),
            "ServerAliveCountMax=3".to_string(),
        ]);

        args.push(format!("{}@{}", self.user, self.host));
        args.push(command.to_string());

        args
    }

    pub fn execute(&self, command: &str) -> CommandOutput {
        self.execute_with_retry(command, 3)
    }

    fn execute_with_retry(&self, command: &str, max_attempts: u32) -> CommandOutput {
        let backoff_secs = [0, 2, 5]; // delays before retry 1, 2, 3
        let mut result = self.execute_once(command);

        for attempt in 1..max_attempts {
            // Only retry on transient connection errors, not command failures
            if result.success || !is_transient_ssh_error(&result) {
                break;
            }

            let delay = backoff_secs.get(attempt as usize).copied().unwrap_or(5);
            tracing::warn!(
                host = %self.host,
                attempt,
                max_attempts,
                "ssh connection failed, retrying in {}s",
                delay
            );
            log_status!(
                "ssh",
                "Connection to {} failed (attempt {}/{}), retrying in {}s...",
                self.host,
                attempt,
                max_attempts,
                delay
            );
            std::thread::sleep(Duration::from_secs(delay));
            result = self.execute_once(command);
        }

        result
    }

    fn execute_once(&self, command: &str) -> CommandOutput {
        if self.is_local {
            return execute_local_command(command);
        }

        let args = self.build_ssh_args(command, false);
        match Command::new("ssh").args(&args).output() {
            Ok(out) => CommandOutput {
                stdout: String::from_utf8_lossy(&out.stdout).to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).to_string(),
                success: out.status.success(),
                exit_code: out.status.code().unwrap_or(-1),
            },
            Err(e) => CommandOutput::failed(-1, format!("SSH error: {}", e)),
        }
    }

    /// Run a command whose output may ask for input, answering through `responder`.
    ///
    /// stdout is streamed through the responder; stderr is collected on a
    /// helper thread so neither pipe can fill up and stall the session. A
    /// session silent for `prompt_idle_timeout` is killed and reported failed.
    pub fn execute_with_responder(
        &self,
        command: &str,
        responder: &mut PromptResponder,
    ) -> CommandOutput {
        let mut cmd = if self.is_local {
            local_shell(command)
        } else {
            let mut cmd = Command::new("ssh");
            cmd.args(self.build_ssh_args(command, true));
            cmd
        };

        let child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let output = match child {
            Ok(child) => stream_with_responder(child, responder, self.prompt_idle_timeout),
            Err(e) => CommandOutput::failed(-1, format!("SSH error: {}", e)),
        };

        responder.finish();
        output
    }
}

fn stream_with_responder(
    mut child: Child,
    responder: &mut PromptResponder,
    idle_timeout: Duration,
) -> CommandOutput {
    let stderr_reader = child.stderr.take().map(|mut stderr| {
        std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf);
            buf
        })
    });

    let (tx, rx) = mpsc::channel::<Vec<u8>>();
    let stdout = child.stdout.take();
    std::thread::spawn(move || {
        let Some(mut stdout) = stdout else { return };
        let mut chunk = [0u8; 1024];
        loop {
            match stdout.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(chunk[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut stdin = child.stdin.take();
    let mut stdout_text = String::new();

    loop {
        let bytes = match rx.recv_timeout(idle_timeout) {
            Ok(bytes) => bytes,
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                return kill_idle_session(child, stdout_text, responder.state(), idle_timeout);
            }
        };
        let text = String::from_utf8_lossy(&bytes).to_string();
        stdout_text.push_str(&text);

        if let Some(reply) = responder.feed(&text) {
            tracing::debug!("prompt detected, sending reply");
            if let Some(pipe) = stdin.as_mut() {
                let _ = pipe.write_all(reply.as_bytes());
                let _ = pipe.flush();
            }
        }
    }

    // Closing stdin lets commands that wait for more input exit.
    drop(stdin);

    let stderr_text = stderr_reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    match child.wait() {
        Ok(status) => CommandOutput {
            stdout: stdout_text,
            stderr: stderr_text,
            success: status.success(),
            exit_code: status.code().unwrap_or(-1),
        },
        Err(e) => CommandOutput::failed(-1, format!("Command error: {}", e)),
    }
}

fn kill_idle_session(
    mut child: Child,
    stdout: String,
    state: PromptState,
    idle_timeout: Duration,
) -> CommandOutput {
    let _ = child.kill();
    let _ = child.wait();

    let reason = match state {
        PromptState::AwaitingPrompt => "prompt never appeared",
        PromptState::Responded | PromptState::Done => "session stalled after reply",
    };
    tracing::warn!(secs = idle_timeout.as_secs(), reason, "killing silent session");

    CommandOutput {
        stdout,
        ..CommandOutput::failed(
            -1,
            format!(
                "No output for {}s ({}); session killed",
                idle_timeout.as_secs(),
                reason
            ),
        )
    }
}

fn local_shell(command: &str) -> Command {
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

pub fn execute_local_command(command: &str) -> CommandOutput {
    match local_shell(command).output() {
        Ok(out) => CommandOutput {
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
            success: out.status.success(),
            exit_code: out.status.code().unwrap_or(-1),
        },
        Err(e) => CommandOutput::failed(-1, format!("Command error: {}", e)),
    }
}

/// Check if a host address refers to the local machine.
pub fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

/// Check if an SSH failure is a transient connection error worth retrying.
fn is_transient_ssh_error(output: &CommandOutput) -> bool {
    let stderr = output.stderr.to_lowercase();
    // SSH exit code 255 = connection error (not a remote command failure)
    let is_connection_exit = output.exit_code == 255;

    let transient_patterns = [
        "connection refused",
        "connection reset",
        "connection timed out",
        "no route to host",
        "network is unreachable",
        "temporary failure in name resolution",
        "could not resolve hostname",
        "broken pipe",
        "ssh_exchange_identification",
        "connection closed by remote host",
    ];

    is_connection_exit || transient_patterns.iter().any(|p| stderr.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;

    fn client(port: u16) -> SshClient {
        let mut host = HostSpec::new("app1.example", &[Role::App]);
        host.port = port;
        SshClient::from_host(&host, "rails").unwrap()
    }

    #[test]
    fn from_host_uses_default_user() {
        let c = client(22);
        assert_eq!(c.user, "rails");
        assert!(!c.is_local);
    }

    #[test]
    fn from_host_rejects_missing_identity_file() {
        let mut host = HostSpec::new("app1.example", &[Role::App]);
        host.identity_file = Some("/nonexistent/capstan_test_key".to_string());
        let err = SshClient::from_host(&host, "rails").err().unwrap();
        assert_eq!(err.code.as_str(), "ssh.identity_file_not_found");
    }

    #[test]
    fn ssh_args_include_port_and_batch_options() {
        let args = client(2222).build_ssh_args("uptime", false);
        assert_eq!(&args[..2], &["-p".to_string(), "2222".to_string()]);
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(!args.contains(&"-tt".to_string()));
        assert_eq!(args[args.len() - 2], "rails@app1.example");
        assert_eq!(args[args.len() - 1], "uptime");
    }

    #[test]
    fn ssh_args_allocate_tty_for_prompts() {
        let args = client(22).build_ssh_args("mysql -p", true);
        assert_eq!(args[0], "-tt");
    }

    #[test]
    fn local_host_detection() {
        assert!(is_local_host("localhost"));
        assert!(is_local_host("::1"));
        assert!(!is_local_host("sqlreadwrite-1"));
    }

    #[test]
    fn transient_errors_are_detected() {
        assert!(is_transient_ssh_error(&CommandOutput::failed(255, "")));
        assert!(is_transient_ssh_error(&CommandOutput::failed(
            1,
            "ssh: connect to host x port 22: Connection refused"
        )));
        assert!(!is_transient_ssh_error(&CommandOutput::failed(
            1,
            "rake aborted!"
        )));
    }

    #[test]
    fn local_command_captures_output() {
        let out = execute_local_command("echo hello");
        assert!(out.success);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[cfg(not(windows))]
    #[test]
    fn responder_answers_local_prompt() {
        let host = HostSpec::new("localhost", &[Role::Db]);
        let client = SshClient::from_host(&host, "rails").unwrap();
        let mut responder = PromptResponder::mysql_password("hunter2").unwrap();

        let out = client.execute_with_responder(
            "printf 'Enter password:'; read pw; echo \"got $pw\"",
            &mut responder,
        );

        assert!(out.success);
        assert!(out.stdout.contains("got hunter2"));
        assert_eq!(responder.state(), crate::ssh::PromptState::Done);
    }

    #[cfg(not(windows))]
    #[test]
    fn silent_prompt_session_is_killed() {
        let host = HostSpec::new("localhost", &[Role::Db]);
        let client = SshClient::from_host(&host, "rails")
            .unwrap()
            .with_prompt_idle_timeout(Duration::from_millis(300));
        let mut responder = PromptResponder::mysql_password("hunter2").unwrap();

        let out = client.execute_with_responder("read pw; echo \"got $pw\"", &mut responder);

        assert!(!out.success);
        assert!(out.stderr.contains("prompt never appeared"));
        assert!(!out.stdout.contains("got"));
        assert_eq!(responder.state(), crate::ssh::PromptState::Done);
    }
}
