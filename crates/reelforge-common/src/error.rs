//! Unified error type for reelforge.
//!
//! All library crates funnel their failures into [`Error`]. Each variant is
//! one failure kind the pipeline can surface; none of them is retried by the
//! core.

use std::fmt;
use std::path::PathBuf;

/// Error kinds produced by crawlers, templates, tasks and dispatchers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An unregistered crawler/task/wrapper/dispatcher/function/plugin name.
    #[error("{kind} type not found: {name}")]
    TypeNotFound {
        /// Registry the lookup went to (e.g. "crawler", "task").
        kind: String,
        /// The requested name.
        name: String,
    },

    /// A variable was queried on a crawler or holder that does not have it.
    #[error("Invalid variable: {0}")]
    InvalidVar(String),

    /// A tag was queried on a crawler that does not have it.
    #[error("Invalid tag: {0}")]
    InvalidTag(String),

    /// A template referenced a variable that was not supplied.
    #[error("Variable not found: {name} (template: {template})")]
    VariableNotFound {
        /// The missing variable.
        name: String,
        /// The raw template input.
        template: String,
    },

    /// A `/!` segment of a template resolved to a path that does not exist.
    #[error("Required path not found: {}", path.display())]
    RequiredPathNotFound {
        /// The accumulated path that was checked.
        path: PathBuf,
    },

    /// The template input could not be tokenized.
    #[error("Template syntax error: {0}")]
    TemplateSyntax(String),

    /// A template function failed.
    #[error("Template function error [{function}]: {message}")]
    TemplateFunction {
        /// Function name.
        function: String,
        /// Human-readable error description.
        message: String,
    },

    /// A registered crawler type's predicate failed.
    #[error("Error testing crawler type {type_name} for {input}: {message}")]
    TestCrawler {
        /// Registered type name.
        type_name: String,
        /// Description of the input that was tested.
        input: String,
        /// Underlying error.
        message: String,
    },

    /// A registered crawler type's constructor failed.
    #[error("Error creating crawler type {type_name} for {input}: {message}")]
    CreateCrawler {
        /// Registered type name.
        type_name: String,
        /// Description of the input.
        input: String,
        /// Underlying error.
        message: String,
    },

    /// No registered crawler type accepted the input.
    #[error("Don't know how to create a crawler for: {input}")]
    NoCrawlerType {
        /// Description of the input.
        input: String,
    },

    /// A written file does not match its source.
    #[error("Checksum mismatch: {} -> {}", source_path.display(), target.display())]
    ChecksumMatch {
        /// The source file.
        source_path: PathBuf,
        /// The target file.
        target: PathBuf,
    },

    /// An external command exited with a failure status.
    #[error("Command failed [{program}] (exit code {code:?}): {output}")]
    Command {
        /// Program that was executed.
        program: String,
        /// Exit code if the process terminated normally.
        code: Option<i32>,
        /// Captured output.
        output: String,
    },

    /// A dispatch (local hand-off or farm submission) failed.
    #[error("Dispatch error: {message}\n{output}")]
    Dispatch {
        /// Human-readable error description.
        message: String,
        /// Raw output of the command that failed.
        output: String,
    },

    /// An option or configuration value is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Convenience constructor for [`Error::TypeNotFound`].
    pub fn type_not_found(kind: impl Into<String>, name: impl fmt::Display) -> Self {
        Error::TypeNotFound {
            kind: kind.into(),
            name: name.to_string(),
        }
    }

    /// Convenience constructor for [`Error::VariableNotFound`].
    pub fn variable_not_found(name: impl Into<String>, template: impl Into<String>) -> Self {
        Error::VariableNotFound {
            name: name.into(),
            template: template.into(),
        }
    }

    /// Convenience constructor for [`Error::TemplateFunction`].
    pub fn template_function(function: impl Into<String>, message: impl Into<String>) -> Self {
        Error::TemplateFunction {
            function: function.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Command`].
    pub fn command(program: impl Into<String>, code: Option<i32>, output: impl Into<String>) -> Self {
        Error::Command {
            program: program.into(),
            code,
            output: output.into(),
        }
    }

    /// Convenience constructor for [`Error::Dispatch`].
    pub fn dispatch(message: impl Into<String>, output: impl Into<String>) -> Self {
        Error::Dispatch {
            message: message.into(),
            output: output.into(),
        }
    }

    /// Convenience constructor for [`Error::Config`].
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_not_found_display() {
        let err = Error::type_not_found("crawler", "exrPlate");
        assert_eq!(err.to_string(), "crawler type not found: exrPlate");
    }

    #[test]
    fn variable_not_found_display() {
        let err = Error::variable_not_found("shot", "{shot}/plate");
        assert_eq!(
            err.to_string(),
            "Variable not found: shot (template: {shot}/plate)"
        );
    }

    #[test]
    fn required_path_display() {
        let err = Error::RequiredPathNotFound {
            path: PathBuf::from("/tmp/missing"),
        };
        assert_eq!(err.to_string(), "Required path not found: /tmp/missing");
    }

    #[test]
    fn command_display() {
        let err = Error::command("oiiotool", Some(1), "bad input");
        assert_eq!(
            err.to_string(),
            "Command failed [oiiotool] (exit code Some(1)): bad input"
        );
    }

    #[test]
    fn dispatch_keeps_raw_output() {
        let err = Error::dispatch("submission failed", "Error: pool not found");
        match err {
            Error::Dispatch { output, .. } => assert_eq!(output, "Error: pool not found"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn result_alias() {
        fn ok_fn() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(ok_fn().unwrap(), 42);

        fn err_fn() -> Result<i32> {
            Err(Error::InvalidVar("frame".into()))
        }
        assert!(err_fn().is_err());
    }
}
