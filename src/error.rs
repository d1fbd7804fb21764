//! Error handling for the Graphs project engine
//!
//! This module defines the crate-wide error type and a Result alias. Every
//! fallible operation at a module boundary returns [`Result`], and the
//! [`ProjectEngine`](crate::engine::ProjectEngine) converts failures into
//! notifications without leaving partial state behind.

use thiserror::Error;
use uuid::Uuid;

/// Main error type for Graphs operations
#[derive(Error, Debug)]
pub enum GraphsError {
    /// A parser could not make sense of its input
    #[error("{0}")]
    Parse(String),

    /// An expression is syntactically or semantically invalid
    #[error("Invalid equation: {0}")]
    InvalidEquation(String),

    /// A numeric entry could not be evaluated
    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    /// The project was written by a newer version
    #[error("Project version {0} is not supported by this version of Graphs")]
    ProjectIncompatible(u64),

    /// The project dictionary is missing keys or is inconsistent
    #[error("Could not read project: {0}")]
    ProjectParse(String),

    /// A symbolic transform cannot be performed on the given expression
    #[error("Operation not supported: {0}")]
    OperationUnsupported(String),

    /// A value was rejected at a setter boundary
    #[error("Validation error: {0}")]
    Validation(String),

    /// An item uuid is not part of the project
    #[error("Unknown item {0}")]
    UnknownItem(Uuid),

    /// A property name does not exist on the target
    #[error("Unknown property '{0}'")]
    UnknownProperty(String),

    /// Errors related to preference loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<GraphsError>,
    },
}

impl GraphsError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        GraphsError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any context wrappers
    pub fn root(&self) -> &GraphsError {
        match self {
            GraphsError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Get a user-friendly error message suitable for a toast
    pub fn user_message(&self) -> String {
        match self {
            GraphsError::Parse(msg) => msg.clone(),
            GraphsError::InvalidEquation(msg) => format!("Invalid equation: {}", msg),
            GraphsError::InvalidNumber(msg) => format!("'{}' is not a valid number", msg),
            GraphsError::ProjectIncompatible(version) => format!(
                "The project uses format version {}, which is newer than this version of Graphs",
                version
            ),
            GraphsError::ProjectParse(msg) => format!("Could not open project: {}", msg),
            GraphsError::OperationUnsupported(msg) => msg.clone(),
            GraphsError::Validation(msg) => msg.clone(),
            GraphsError::UnknownItem(uuid) => format!("Item {} no longer exists", uuid),
            GraphsError::UnknownProperty(name) => format!("Unknown property '{}'", name),
            GraphsError::Config(msg) => format!("Config error: {}", msg),
            GraphsError::Io(e) => format!("File error: {}", e),
            GraphsError::Json(e) => format!("JSON error: {}", e),
            GraphsError::WithContext { context, source } => {
                format!("{}: {}", context, source.user_message())
            }
        }
    }

    /// Get a short title for the error (for toast notifications)
    pub fn title(&self) -> &'static str {
        match self.root() {
            GraphsError::Parse(_) => "Import Failed",
            GraphsError::InvalidEquation(_) => "Invalid Equation",
            GraphsError::InvalidNumber(_) => "Invalid Number",
            GraphsError::ProjectIncompatible(_) => "Incompatible Project",
            GraphsError::ProjectParse(_) => "Project Error",
            GraphsError::OperationUnsupported(_) => "Unsupported Operation",
            GraphsError::Validation(_) => "Validation Error",
            GraphsError::UnknownItem(_) | GraphsError::UnknownProperty(_) => "Error",
            GraphsError::Config(_) => "Configuration Error",
            GraphsError::Io(_) => "File Error",
            GraphsError::Json(_) => "JSON Error",
            GraphsError::WithContext { .. } => "Error",
        }
    }
}

/// Result type alias for Graphs operations
pub type Result<T> = std::result::Result<T, GraphsError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<GraphsError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphsError::InvalidEquation("unbalanced parenthesis".to_string());
        assert_eq!(err.to_string(), "Invalid equation: unbalanced parenthesis");
    }

    #[test]
    fn test_error_with_context() {
        let err = GraphsError::Parse("Unable to import from file".to_string());
        let with_ctx = err.with_context("data.txt");
        assert!(with_ctx.to_string().contains("data.txt"));
        assert!(matches!(with_ctx.root(), GraphsError::Parse(_)));
        assert_eq!(with_ctx.title(), "Import Failed");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GraphsError = io_err.into();
        assert!(matches!(err, GraphsError::Io(_)));

        let res: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let wrapped = res.context("Saving project");
        assert!(wrapped.unwrap_err().to_string().starts_with("Saving project"));
    }

    #[test]
    fn test_incompatible_message() {
        let err = GraphsError::ProjectIncompatible(7);
        assert!(err.user_message().contains('7'));
        assert_eq!(err.title(), "Incompatible Project");
    }
}
