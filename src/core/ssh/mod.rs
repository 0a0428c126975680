mod client;
pub mod prompt;

pub use client::{execute_local_command, is_local_host, CommandOutput, SshClient};
pub use prompt::{PromptResponder, PromptState};
