//! Answering interactive prompts in a remote session's output.
//!
//! A [`PromptResponder`] watches the output stream of one command. When a
//! line matching its pattern appears it hands back the reply to write to the
//! session's stdin, exactly once.

use regex::Regex;

use crate::error::{Error, Result};

/// Pattern printed by `mysql -p` before it reads the password.
pub const MYSQL_PASSWORD_PROMPT: &str = r"(?m)^Enter password:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptState {
    /// Watching output for the prompt.
    AwaitingPrompt,
    /// Reply sent; remaining output is passed over.
    Responded,
    /// Session ended.
    Done,
}

#[derive(Debug)]
pub struct PromptResponder {
    pattern: Regex,
    reply: String,
    state: PromptState,
    /// Output since the last newline, so a prompt split across reads still matches.
    pending: String,
}

impl PromptResponder {
    pub fn new(pattern: &str, reply: impl Into<String>) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| {
            Error::internal_unexpected(format!("Invalid prompt pattern '{}': {}", pattern, e))
        })?;

        Ok(Self {
            pattern,
            reply: reply.into(),
            state: PromptState::AwaitingPrompt,
            pending: String::new(),
        })
    }

    pub fn mysql_password(password: impl Into<String>) -> Result<Self> {
        Self::new(MYSQL_PASSWORD_PROMPT, password)
    }

    pub fn state(&self) -> PromptState {
        self.state
    }

    /// Feed a chunk of output. Returns the line to send when the prompt is seen.
    pub fn feed(&mut self, chunk: &str) -> Option<String> {
        match self.state {
            PromptState::AwaitingPrompt => {}
            PromptState::Responded | PromptState::Done => return None,
        }

        self.pending.push_str(chunk);

        if self.pattern.is_match(&self.pending) {
            self.pending.clear();
            self.state = PromptState::Responded;
            return Some(format!("{}\n", self.reply));
        }

        if let Some(idx) = self.pending.rfind('\n') {
            self.pending.drain(..=idx);
        }

        None
    }

    /// Mark the session finished.
    pub fn finish(&mut self) {
        self.pending.clear();
        self.state = PromptState::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn responds_once_to_prompt() {
        let mut responder = PromptResponder::mysql_password("s3cret").unwrap();
        assert_eq!(responder.state(), PromptState::AwaitingPrompt);

        assert_eq!(responder.feed("Enter password: "), Some("s3cret\n".to_string()));
        assert_eq!(responder.state(), PromptState::Responded);

        assert_eq!(responder.feed("Enter password: "), None);
    }

    #[test]
    fn matches_prompt_split_across_chunks() {
        let mut responder = PromptResponder::mysql_password("pw").unwrap();
        assert_eq!(responder.feed("Warning: something\nEnter pass"), None);
        assert_eq!(responder.feed("word:"), Some("pw\n".to_string()));
    }

    #[test]
    fn ignores_prompt_text_not_at_line_start() {
        let mut responder = PromptResponder::mysql_password("pw").unwrap();
        assert_eq!(responder.feed("please Enter password: later\n"), None);
        assert_eq!(responder.state(), PromptState::AwaitingPrompt);
    }

    #[test]
    fn finish_stops_responding() {
        let mut responder = PromptResponder::mysql_password("pw").unwrap();
        responder.finish();
        assert_eq!(responder.state(), PromptState::Done);
        assert_eq!(responder.feed("Enter password:"), None);
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(PromptResponder::new("(unclosed", "x").is_err());
    }
}
