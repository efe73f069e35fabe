//! Error types for card repository operations

use std::error::Error;
use std::fmt;

/// Boxed error type for error sources
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Result type alias for repository operations
pub type Result<T> = std::result::Result<T, CardError>;

/// Repository operation error with rich diagnostics
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub struct CardError {
    kind: CardErrorKind,
    #[source]
    source: Option<BoxError>,
    #[help]
    help: Option<String>,
    context: Option<String>,
}

/// Error categories for card repository operations
///
/// The categories map one-to-one onto the HTTP statuses the entry points
/// answer with: invalid input (400), not found (404), conflict (409), and
/// everything else (500).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardErrorKind {
    /// Caller supplied a malformed or incomplete request
    InvalidInput,
    /// Resource not found
    NotFound,
    /// Conditional write rejected: stored version token no longer matches
    Conflict,
    /// Underlying blob store failed for a non-conflict reason
    Storage,
    /// Serialization/deserialization failed
    Serialization,
    /// I/O error
    Io,
}

impl CardError {
    /// Create a new error with the given kind and optional source
    pub fn new(kind: CardErrorKind, source: Option<BoxError>) -> Self {
        Self {
            kind,
            source,
            help: None,
            context: None,
        }
    }

    /// Add a help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Add context information to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> &CardErrorKind {
        &self.kind
    }

    /// Whether this is a version-token conflict
    ///
    /// The retry loop absorbs these; everything else propagates immediately.
    pub fn is_conflict(&self) -> bool {
        self.kind == CardErrorKind::Conflict
    }

    // Constructors for different error kinds

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(CardErrorKind::InvalidInput, Some(msg.into().into()))
    }

    /// Create an invalid key error
    pub fn invalid_key(key: impl Into<String>) -> Self {
        Self::new(CardErrorKind::InvalidInput, None)
            .with_help("keys are non-empty /-separated segments, no dot segments")
            .with_context(format!("key: {}", key.into()))
    }

    /// Create a not found error
    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        Self::new(CardErrorKind::NotFound, None)
            .with_context(format!("{} not found: {}", resource, id))
    }

    /// Create a conflict error for a rejected conditional write
    pub fn conflict(key: impl fmt::Display) -> Self {
        Self::new(CardErrorKind::Conflict, None)
            .with_context(format!("version token mismatch for {}", key))
    }

    /// Create a conflict error for an exhausted retry budget
    pub fn busy(key: impl fmt::Display, attempts: u32) -> Self {
        Self::new(CardErrorKind::Conflict, None)
            .with_context(format!("gave up on {} after {} attempts", key, attempts))
            .with_help("store is busy, retry the request")
    }

    /// Create a storage error
    pub fn storage(source: impl Error + Send + Sync + 'static) -> Self {
        Self::new(CardErrorKind::Storage, Some(Box::new(source)))
    }

    /// Create a serialization error
    pub fn serialization(source: impl Error + Send + Sync + 'static) -> Self {
        Self::new(CardErrorKind::Serialization, Some(Box::new(source)))
    }

    /// Create an I/O error
    pub fn io(source: impl Error + Send + Sync + 'static) -> Self {
        Self::new(CardErrorKind::Io, Some(Box::new(source)))
    }
}

impl fmt::Display for CardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;

        if let Some(ctx) = &self.context {
            write!(f, ": {}", ctx)?;
        }

        if let Some(src) = &self.source {
            write!(f, ": {}", src)?;
        }

        Ok(())
    }
}
