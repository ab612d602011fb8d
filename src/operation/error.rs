use std::fmt;

use serde_json::Value;

/// Errors surfaced by building or calling an [`Operation`](super::Operation)
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The caller supplied input the operation cannot work with
    ///
    /// Match on this variant to handle every kind of bad input at once, or on the inner
    /// [`InputError`] to tell them apart.
    #[error(transparent)]
    Input(#[from] InputError),

    /// Discards the writes of the surrounding transaction
    ///
    /// Raised by core logic on purpose. A transactional `call()` intercepts it and returns
    /// `Ok(None)`; outside a transaction it propagates like any other error.
    #[error("operation rolled back")]
    Rollback,

    /// Any error raised by a collaborator (storage, delivery, ...)
    ///
    /// The original error is kept as is and can be recovered with `downcast_ref`.
    #[error(transparent)]
    Collaborator(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Shortcut for the `invalid(field: message)` pattern inside core logic
    pub fn invalid<K, M>(errors: impl IntoIterator<Item = (K, M)>) -> Self
    where
        K: Into<String>,
        M: Into<String>,
    {
        ValidationError::from_fields(errors).into()
    }

    pub fn collaborator(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Collaborator(Box::new(err))
    }

    pub fn is_bad_input(&self) -> bool {
        matches!(self, Self::Input(_))
    }

    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Input(InputError::Validation(err)) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Self::Input(InputError::Validation(err))
    }
}

impl From<MissingParameterError> for Error {
    fn from(err: MissingParameterError) -> Self {
        Self::Input(InputError::MissingParameter(err))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// The declared subject is absent or null
    #[error("{name} is missing")]
    MissingSubject { name: String },

    #[error(transparent)]
    MissingParameter(#[from] MissingParameterError),

    /// A supplied value was rejected by its converter or has the wrong shape
    #[error("parameter {name} is invalid: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// A parameter without a default was not supplied
///
/// Only raised while building an operation, never once an instance exists.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("operation parameter {name} missing, passed params: {supplied:?}")]
pub struct MissingParameterError {
    pub name: String,
    /// Keys present in the input, to ease debugging typos
    pub supplied: Vec<String>,
}

/// Business-rule failure with one message per offending field
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationError {
    subject: Option<Value>,
    errors: Vec<(String, String)>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields<K, M>(errors: impl IntoIterator<Item = (K, M)>) -> Self
    where
        K: Into<String>,
        M: Into<String>,
    {
        errors
            .into_iter()
            .fold(Self::new(), |acc, (field, message)| acc.field(field, message))
    }

    pub fn with_subject(mut self, subject: impl Into<Value>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Add a message for `field`, replacing an earlier one for the same field
    pub fn field(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let message = message.into();
        match self.errors.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = message,
            None => self.errors.push((field, message)),
        }
        self
    }

    pub fn subject(&self) -> Option<&Value> {
        self.subject.as_ref()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, message)| message.as_str())
    }

    /// Field errors in the order they were reported
    pub fn errors(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors
            .iter()
            .map(|(name, message)| (name.as_str(), message.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.errors.iter().map(|(_, m)| m.as_str()).collect();
        f.write_str(&messages.join(". "))
    }
}

impl std::error::Error for ValidationError {}
