//! Structured error kinds for the kernel and its derived facilities.
//!
//! Every variant carries a human message and, where it makes sense, an optional
//! path/name for diagnostics, per the error handling design.

use thiserror::Error;

fn at(path: &Option<String>) -> String {
    match path {
        Some(p) => format!(" (at {p})"),
        None => String::new(),
    }
}

#[derive(Debug, Error)]
pub enum DdslError {
    #[error("malformed declaration: {message}{}", at(path))]
    MalformedDecl { message: String, path: Option<String> },

    #[error("duplicate name {name:?}{}", at(path))]
    DuplicateName { name: String, path: Option<String> },

    #[error("unresolved name {name:?}{}", at(path))]
    UnresolvedName { name: String, path: Option<String> },

    #[error("kind mismatch: {message}{}", at(path))]
    KindMismatch { message: String, path: Option<String> },

    #[error("invalid dimension: {message}{}", at(path))]
    InvalidDimension { message: String, path: Option<String> },

    #[error("invalid union case: {message}{}", at(path))]
    InvalidCase { message: String, path: Option<String> },

    #[error("cycle detected: {message}{}", at(path))]
    CycleDetected { message: String, path: Option<String> },

    #[error("I/O error reading {path:?}: {source}")]
    IoError { path: String, #[source] source: std::io::Error },

    #[error("XML parse error: {message}{}", at(path))]
    ParseError { message: String, path: Option<String> },
}

pub type Result<T> = std::result::Result<T, DdslError>;

impl DdslError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedDecl { message: message.into(), path: None }
    }

    pub fn duplicate(name: impl Into<String>, path: Option<String>) -> Self {
        Self::DuplicateName { name: name.into(), path }
    }

    pub fn unresolved(name: impl Into<String>, path: Option<String>) -> Self {
        Self::UnresolvedName { name: name.into(), path }
    }

    pub fn kind_mismatch(message: impl Into<String>) -> Self {
        Self::KindMismatch { message: message.into(), path: None }
    }

    pub fn invalid_dimension(message: impl Into<String>) -> Self {
        Self::InvalidDimension { message: message.into(), path: None }
    }

    pub fn invalid_case(message: impl Into<String>) -> Self {
        Self::InvalidCase { message: message.into(), path: None }
    }

    pub fn cycle(message: impl Into<String>) -> Self {
        Self::CycleDetected { message: message.into(), path: None }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::ParseError { message: message.into(), path: None }
    }

    pub fn with_path(mut self, new_path: impl Into<String>) -> Self {
        let new_path = Some(new_path.into());
        match &mut self {
            Self::MalformedDecl { path, .. }
            | Self::DuplicateName { path, .. }
            | Self::UnresolvedName { path, .. }
            | Self::KindMismatch { path, .. }
            | Self::InvalidDimension { path, .. }
            | Self::InvalidCase { path, .. }
            | Self::CycleDetected { path, .. }
            | Self::ParseError { path, .. } => *path = new_path,
            Self::IoError { .. } => {}
        }
        self
    }
}
