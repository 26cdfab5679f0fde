use thiserror::Error;

/// Errors produced by model constructors and validation routines.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("invalid hotkey combo '{0}'")]
    InvalidCombo(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
