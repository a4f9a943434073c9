//! Typed errors callers match on.
//!
//! Everything else travels as `anyhow::Error` with context attached at the
//! failure site.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure of an external filter command run through the sandbox.
///
/// Always recoverable: the caller falls back to plain rendering.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("failed to prepare sandbox for '{command}': {source}")]
    Sandbox {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command '{env}{command}' failed with {status}\n{stderr}")]
    Exit {
        env: String,
        command: String,
        status: String,
        stderr: String,
    },

    #[error("command '{command}' timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("failed to forward output of '{command}': {source}")]
    Output {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Two refs whose names escape to the same output directory.
#[derive(Debug, Error)]
#[error("{kind} '{name}' skipped: directory '{dir}' already belongs to '{taken_by}'")]
pub struct RefCollision {
    pub kind: &'static str,
    pub name: String,
    pub dir: String,
    pub taken_by: String,
}

/// Independent failures collected over one run.
#[derive(Debug, Default)]
pub struct RenderErrors {
    errors: Vec<anyhow::Error>,
}

impl RenderErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: anyhow::Error) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, other: RenderErrors) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[anyhow::Error] {
        &self.errors
    }

    /// Returns `Ok(())` when nothing was collected, otherwise the aggregate.
    pub fn into_result(self) -> Result<(), RenderErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for RenderErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{:#}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for RenderErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_errors_join_lines() {
        // Arrange
        let mut errors = RenderErrors::new();
        errors.push(anyhow::anyhow!("first"));
        errors.push(anyhow::anyhow!("inner").context("second"));

        // Act
        let message = errors.to_string();

        // Assert
        assert_eq!(errors.len(), 2);
        assert_eq!(message, "first\nsecond: inner");
    }

    #[test]
    fn test_empty_render_errors_is_ok() {
        assert!(RenderErrors::new().into_result().is_ok());
    }

    #[test]
    fn test_filter_exit_message_carries_stderr() {
        // Arrange
        let error = FilterError::Exit {
            env: "type=rs ".to_string(),
            command: "false".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "boom".to_string(),
        };

        // Act
        let message = error.to_string();

        // Assert
        assert_eq!(message, "command 'type=rs false' failed with exit status: 1\nboom");
    }
}
