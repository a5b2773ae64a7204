//! Typed error contract for konfigure.
//!
//! Every fallible operation returns `Result<T>` with a structured `Error`
//! carrying a stable code, a human message, JSON details, and optional hints.
//! Command exit statuses are ordinary data, never errors; only konfigure's
//! own failures travel through this type.

use serde::Serialize;
use serde_json::{json, Value};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    KonfigNotFound,
    KonfigInvalidValue,
    ValidationInvalidArgument,
    ValidationMissingArgument,
    SessionSpawnFailed,
    SessionClosed,
    SessionBusy,
    SessionProtocol,
    SessionKilled,
    HelmCommandFailed,
    AuthCheckFailed,
    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::KonfigNotFound => "konfig.not_found",
            ErrorCode::KonfigInvalidValue => "konfig.invalid_value",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",
            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::SessionSpawnFailed => "session.spawn_failed",
            ErrorCode::SessionClosed => "session.closed",
            ErrorCode::SessionBusy => "session.busy",
            ErrorCode::SessionProtocol => "session.protocol_violation",
            ErrorCode::SessionKilled => "session.killed",
            ErrorCode::HelmCommandFailed => "helm.command_failed",
            ErrorCode::AuthCheckFailed => "auth.check_failed",
            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

/// A human-oriented follow-up suggestion attached to an error.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct Hint(pub String);

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(Hint(hint.into()));
        self
    }

    // === Konfiguration ===

    pub fn konfig_not_found(env_name: &str, searched_dir: &str) -> Self {
        Self::new(
            ErrorCode::KonfigNotFound,
            format!("No konfiguration file found for the '{}' environment", env_name),
            json!({ "environment": env_name, "searchedDir": searched_dir }),
        )
        .with_hint(format!(
            "Expected one of konfig.yaml, config.yaml, konfig.json, config.json in {}",
            searched_dir
        ))
    }

    pub fn konfig_invalid_value(field: &str, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::KonfigInvalidValue,
            message,
            json!({ "field": field }),
        )
    }

    // === Validation ===

    pub fn validation_invalid_argument(
        field: &str,
        message: impl Into<String>,
        value: Option<String>,
        hints: Option<Vec<String>>,
    ) -> Self {
        let mut err = Self::new(
            ErrorCode::ValidationInvalidArgument,
            message,
            json!({ "field": field, "value": value }),
        );
        if let Some(hints) = hints {
            for hint in hints {
                err = err.with_hint(hint);
            }
        }
        err
    }

    pub fn validation_missing_argument(fields: Vec<String>) -> Self {
        Self::new(
            ErrorCode::ValidationMissingArgument,
            format!("Missing required argument(s): {}", fields.join(", ")),
            json!({ "fields": fields }),
        )
    }

    // === Shell session ===

    pub fn session_spawn_failed(program: &str, source: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::SessionSpawnFailed,
            format!("Failed to spawn '{}': {}", program, source.into()),
            json!({ "program": program }),
        )
    }

    pub fn session_closed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SessionClosed, message, Value::Null)
    }

    pub fn session_busy() -> Self {
        Self::new(
            ErrorCode::SessionBusy,
            "A command is already in flight on this session",
            Value::Null,
        )
    }

    pub fn session_protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SessionProtocol, message, Value::Null)
    }

    pub fn session_killed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SessionKilled, message, Value::Null)
    }

    // === External tools ===

    pub fn helm_command_failed(command: &str, exit_code: i32) -> Self {
        Self::new(
            ErrorCode::HelmCommandFailed,
            format!("Helm command failed with error code {}", exit_code),
            json!({ "command": command, "exitCode": exit_code }),
        )
    }

    pub fn auth_check_failed(account: &str, exit_code: i32) -> Self {
        Self::new(
            ErrorCode::AuthCheckFailed,
            format!("Authentication check for account '{}' failed", account),
            json!({ "account": account, "exitCode": exit_code }),
        )
        .with_hint("Run with --auth to authenticate automatically")
    }

    // === Internal ===

    pub fn internal_io(message: impl Into<String>, operation: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalIoError,
            message,
            json!({ "operation": operation }),
        )
    }

    pub fn internal_json(message: impl Into<String>, operation: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalJsonError,
            message,
            json!({ "operation": operation }),
        )
    }

    pub fn internal_unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalUnexpected, message, Value::Null)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_strings() {
        assert_eq!(ErrorCode::SessionSpawnFailed.as_str(), "session.spawn_failed");
        assert_eq!(ErrorCode::InternalIoError.as_str(), "internal.io_error");
    }

    #[test]
    fn with_hint_accumulates() {
        let err = Error::internal_unexpected("boom")
            .with_hint("first")
            .with_hint("second");
        assert_eq!(err.hints.len(), 2);
        assert_eq!(err.hints[0].0, "first");
    }

    #[test]
    fn konfig_not_found_carries_environment() {
        let err = Error::konfig_not_found("staging", "/tmp/env/staging");
        assert_eq!(err.code, ErrorCode::KonfigNotFound);
        assert_eq!(err.details["environment"], "staging");
    }
}
