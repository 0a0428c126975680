//! The JSON document every capstan command writes to stdout.
//!
//! Success carries the command's output under `data`. Failure carries the
//! error code, message, structured details and the process exit status the
//! error maps to, so scripts can branch on either.

use std::io::{self, Write};

use capstan::error::Hint;
use capstan::{Error, ErrorCode, Result};
use serde::Serialize;
use serde_json::Value;

/// A finished command: its JSON output or error, plus the exit status.
pub struct Outcome {
    pub result: Result<Value>,
    pub exit_code: i32,
}

#[derive(Serialize)]
struct Envelope<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    code: &'static str,
    message: &'a str,
    details: &'a Value,
    #[serde(skip_serializing_if = "no_hints")]
    hints: &'a [Hint],
    #[serde(skip_serializing_if = "Option::is_none")]
    retryable: Option<bool>,
    exit_code: i32,
}

fn no_hints(hints: &&[Hint]) -> bool {
    hints.is_empty()
}

impl Outcome {
    /// Serialize a handler's output; errors pick their exit status by code.
    pub fn from_cmd<T: Serialize>(result: Result<(T, i32)>) -> Self {
        match result {
            Ok((data, exit_code)) => match serde_json::to_value(data) {
                Ok(value) => Self {
                    result: Ok(value),
                    exit_code,
                },
                Err(e) => Self::failed(Error::internal_json(
                    e.to_string(),
                    Some("serialize command output".to_string()),
                )),
            },
            Err(err) => Self::failed(err),
        }
    }

    fn failed(err: Error) -> Self {
        Self {
            exit_code: exit_code_for_error(err.code),
            result: Err(err),
        }
    }

    fn envelope(&self) -> Envelope<'_> {
        match &self.result {
            Ok(data) => Envelope {
                success: true,
                data: Some(data),
                error: None,
            },
            Err(err) => Envelope {
                success: false,
                data: None,
                error: Some(ErrorBody {
                    code: err.code.as_str(),
                    message: &err.message,
                    details: &err.details,
                    hints: &err.hints,
                    retryable: err.retryable,
                    exit_code: self.exit_code,
                }),
            },
        }
    }

    /// Write the envelope to stdout. A closed pipe is not an error.
    pub fn print(&self) -> Result<()> {
        let payload = serde_json::to_string_pretty(&self.envelope()).map_err(|e| {
            Error::internal_json(e.to_string(), Some("serialize envelope".to_string()))
        })?;

        let stdout = io::stdout();
        let mut handle = stdout.lock();
        match writeln!(handle, "{}", payload) {
            Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(Error::internal_io(
                e.to_string(),
                Some("write stdout".to_string()),
            )),
            _ => Ok(()),
        }
    }
}

fn exit_code_for_error(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::ConfigMissingKey
        | ErrorCode::ConfigInvalidJson
        | ErrorCode::ConfigInvalidYaml
        | ErrorCode::ConfigInvalidValue
        | ErrorCode::ValidationInvalidArgument => 2,

        ErrorCode::SshIdentityFileNotFound => 10,

        ErrorCode::RemoteCommandFailed
        | ErrorCode::DeployNoMatchingHosts
        | ErrorCode::DeployDatabaseAlreadyExists
        | ErrorCode::DeployPreflightFailed => 20,

        ErrorCode::InternalIoError
        | ErrorCode::InternalJsonError
        | ErrorCode::InternalUnexpected => 1,
    }
}
