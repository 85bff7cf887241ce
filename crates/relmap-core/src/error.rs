//! Error types for relmap operations.

use crate::metadata::CascadeOperation;
use std::fmt;

/// The primary error type for all relmap operations.
#[derive(Debug)]
pub enum Error {
    /// Metadata registration, build or lookup errors
    Metadata(MetadataError),
    /// Malformed alias maps
    Alias(AliasError),
    /// Hydration invariant violations (misconfigured entities)
    Hydration(HydrationError),
    /// A cascade operation was required on a relation that does not grant it
    Cascade(CascadeError),
    /// A lifecycle subscriber rejected an event
    Subscriber(SubscriberError),
    /// Configuration errors
    Config(ConfigError),
    /// Errors reported by a persistence executor
    Execution(ExecutionError),
    /// Custom error with message
    Custom(String),
}

/// Metadata registration, build or lookup failure.
#[derive(Debug, Clone)]
pub struct MetadataError {
    pub kind: MetadataErrorKind,
    /// Entity (or table) name the error refers to
    pub entity: String,
    /// Property name, when the error concerns a single column or relation
    pub property: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataErrorKind {
    /// Property declared twice, entity registered twice, or table name collision
    Duplicate,
    /// Unknown entity type or table name
    NotFound,
    /// Declarations that violate a metadata invariant
    Invalid,
}

#[derive(Debug, Clone)]
pub struct AliasError {
    pub alias: String,
    pub message: String,
}

/// A primary-key group could not be formed for an alias.
#[derive(Debug, Clone)]
pub struct HydrationError {
    pub alias: String,
    pub entity: String,
    pub message: String,
}

/// Cascade permission missing for an operation the diff requires.
#[derive(Debug, Clone)]
pub struct CascadeError {
    /// Entity that declares the relation
    pub entity: String,
    /// Relation property name
    pub relation: String,
    pub operation: CascadeOperation,
}

#[derive(Debug)]
pub struct SubscriberError {
    /// Lifecycle phase during which the subscriber failed
    pub phase: &'static str,
    pub entity: String,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug)]
pub struct ExecutionError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl MetadataError {
    pub fn duplicate(
        entity: impl Into<String>,
        property: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: MetadataErrorKind::Duplicate,
            entity: entity.into(),
            property: property.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        let entity = entity.into();
        Self {
            kind: MetadataErrorKind::NotFound,
            message: format!("no metadata registered for entity or table '{}'", entity),
            entity,
            property: None,
        }
    }

    pub fn invalid(
        entity: impl Into<String>,
        property: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: MetadataErrorKind::Invalid,
            entity: entity.into(),
            property: property.map(str::to_string),
            message: message.into(),
        }
    }
}

impl SubscriberError {
    pub fn new(phase: &'static str, entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            phase,
            entity: entity.into(),
            message: message.into(),
            source: None,
        }
    }
}

impl Error {
    /// Is this a DuplicateMetadata error?
    pub fn is_duplicate_metadata(&self) -> bool {
        matches!(self, Error::Metadata(m) if m.kind == MetadataErrorKind::Duplicate)
    }

    /// Is this an EntityMetadataNotFound error?
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Metadata(m) if m.kind == MetadataErrorKind::NotFound)
    }

    /// Is this a CascadeNotAllowed error (for any operation)?
    pub fn is_cascade_not_allowed(&self) -> bool {
        matches!(self, Error::Cascade(_))
    }

    /// The cascade operation that was refused, if this is a cascade error.
    pub fn cascade_operation(&self) -> Option<CascadeOperation> {
        match self {
            Error::Cascade(c) => Some(c.operation),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Metadata(e) => write!(f, "Metadata error: {}", e),
            Error::Alias(e) => write!(f, "Alias error: {}", e),
            Error::Hydration(e) => write!(f, "Hydration error: {}", e),
            Error::Cascade(e) => write!(f, "Cascade error: {}", e),
            Error::Subscriber(e) => write!(f, "Subscriber error: {}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Execution(e) => write!(f, "Execution error: {}", e.message),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Subscriber(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Execution(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prop) = &self.property {
            write!(f, "{}.{}: {}", self.entity, prop, self.message)
        } else {
            write!(f, "{}: {}", self.entity, self.message)
        }
    }
}

impl fmt::Display for AliasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alias '{}': {}", self.alias, self.message)
    }
}

impl fmt::Display for HydrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alias '{}' ({}): {}", self.alias, self.entity, self.message)
    }
}

impl fmt::Display for CascadeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cascade {} is not allowed on relation {}.{}",
            self.operation, self.entity, self.relation
        )
    }
}

impl fmt::Display for SubscriberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}: {}", self.phase, self.entity, self.message)
    }
}

impl From<MetadataError> for Error {
    fn from(err: MetadataError) -> Self {
        Error::Metadata(err)
    }
}

impl From<AliasError> for Error {
    fn from(err: AliasError) -> Self {
        Error::Alias(err)
    }
}

impl From<HydrationError> for Error {
    fn from(err: HydrationError) -> Self {
        Error::Hydration(err)
    }
}

impl From<CascadeError> for Error {
    fn from(err: CascadeError) -> Self {
        Error::Cascade(err)
    }
}

impl From<SubscriberError> for Error {
    fn from(err: SubscriberError) -> Self {
        Error::Subscriber(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<ExecutionError> for Error {
    fn from(err: ExecutionError) -> Self {
        Error::Execution(err)
    }
}

/// Result type alias for relmap operations.
pub type Result<T> = std::result::Result<T, Error>;
