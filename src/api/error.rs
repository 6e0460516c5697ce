use std::fmt;

use thiserror::Error;

/// Why a call to the registry or tracking service failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    NotFound,
    Unauthorized,
    Network,
    Unknown,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FetchErrorKind::NotFound => "not found",
            FetchErrorKind::Unauthorized => "unauthorized",
            FetchErrorKind::Network => "network",
            FetchErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone)]
#[error("{kind} error fetching {resource}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub resource: String,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, resource: impl Into<String>, message: impl Into<String>) -> Self {
        FetchError {
            kind,
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        let resource = resource.into();
        let message = format!("the resource {} does not exist", resource);
        FetchError::new(FetchErrorKind::NotFound, resource, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == FetchErrorKind::NotFound
    }
}

impl From<anyhow::Error> for FetchError {
    fn from(error: anyhow::Error) -> Self {
        FetchError::new(FetchErrorKind::Unknown, "response", format!("{:#}", error))
    }
}

/// Upstream data that does not have one of the shapes we know how to read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unsupported flavor cardinality: expected 1 or 2 flavors, found {0}")]
    UnsupportedFlavorCardinality(usize),
    #[error("none of the flavors {0:?} is the python_function wrapper")]
    MissingWrapperFlavor(Vec<String>),
    #[error("{entity} is missing the field {field}")]
    MissingField { entity: String, field: String },
    #[error("flavor {flavor} has no field ending in _version")]
    MissingVersionField { flavor: String },
    #[error("flavor {flavor} has more than one version field: {candidates:?}")]
    AmbiguousVersionField { flavor: String, candidates: Vec<String> },
    #[error("invalid model URI {0}")]
    InvalidModelUri(String),
    #[error("run {run_id} has an unreadable model history: {message}")]
    InvalidModelHistory { run_id: String, message: String },
    #[error("run {run_id} did not log a model at {artifact_path}")]
    ModelNotLogged { run_id: String, artifact_path: String },
}

impl SchemaError {
    pub fn missing_field(entity: impl Into<String>, field: impl Into<String>) -> Self {
        SchemaError::MissingField {
            entity: entity.into(),
            field: field.into(),
        }
    }
}

/// Everything that aborts a report build.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("failed to write the report: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize the report data: {0}")]
    Json(#[from] serde_json::Error),
}

pub type FetchResult<T> = Result<T, FetchError>;
