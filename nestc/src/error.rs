use std::path::PathBuf;

use thiserror::Error;

use crate::span::Location;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("{location}: syntax error: {message}")]
    Syntax { location: Location, message: String },

    #[error("{location}: {message}")]
    Lexer { location: Location, message: String },

    #[error("{location}: symbol {name} already declared")]
    DuplicateDeclaration { name: String, location: Location },

    #[error("{location}: symbol {name} not found")]
    UnresolvedSymbol { name: String, location: Location },

    #[error("{location}: {name} is a {found}, expected a {expected}")]
    KindMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
        location: Location,
    },

    #[error("{location}: literal {name} has non-numeric value '{value}'")]
    InvalidLiteral {
        name: String,
        value: String,
        location: Location,
    },

    #[error("verification of {function} failed: {message}")]
    Verification { function: String, message: String },

    #[error("internal compiler error: {message}")]
    Internal { message: String },

    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CompileError {
    /// Source position the error was raised at, when it has one.
    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::Syntax { location, .. }
            | Self::Lexer { location, .. }
            | Self::DuplicateDeclaration { location, .. }
            | Self::UnresolvedSymbol { location, .. }
            | Self::KindMismatch { location, .. }
            | Self::InvalidLiteral { location, .. } => Some(location),
            Self::Verification { .. } | Self::Internal { .. } | Self::Io { .. } => None,
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
