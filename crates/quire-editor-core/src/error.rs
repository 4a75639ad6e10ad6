//! Error types for the editor core.

use thiserror::Error;

/// Errors surfaced by the editor core.
///
/// Configuration mistakes and content-integrity violations fail fast through
/// this type. Positions that cannot be represented in the DOM are not errors;
/// the mapper and selection bridge return `None` for those instead.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EditorError {
    /// A type definition was registered without a name.
    #[error("type definition is missing a name")]
    MissingTypeName,

    /// A type definition was registered without a selector.
    #[error("type definition `{0}` is missing a selector")]
    MissingTypeSelector(String),

    /// A selector string could not be parsed.
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// A history command was built or executed with arguments that do not
    /// fit the document.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// A decorator produced an operation that would alter content.
    #[error("decoration `{name}` would alter the document: {reason}")]
    DecorationViolation { name: String, reason: String },

    /// `start_transaction` was called while a transaction was already open.
    #[error("a transaction is already open")]
    TransactionOpen,

    /// `commit`, `exec` or `abort` was called with no open transaction.
    #[error("no transaction is open")]
    NoTransaction,

    /// A change retains or deletes past the end of the document.
    #[error("change spans {span} characters but the document has {length}")]
    ChangeOutOfBounds { span: usize, length: usize },

    /// `pause` was called on a selection bridge that is already paused.
    #[error("selection is already paused")]
    SelectionPaused,

    /// `resume` was called on a selection bridge that is not paused.
    #[error("selection is not paused")]
    SelectionNotPaused,

    /// Editor configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EditorError {
    pub(crate) fn invalid_selector(selector: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn decoration(name: &str, reason: impl Into<String>) -> Self {
        Self::DecorationViolation {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for EditorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T, E = EditorError> = std::result::Result<T, E>;
