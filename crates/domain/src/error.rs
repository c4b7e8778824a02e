/// Shared error type used across all coordination-core crates.
///
/// Variants map onto the HTTP status taxonomy the gateway exposes: each
/// corresponds to exactly one status code, so call sites pick the variant
/// by what went wrong rather than by what code to return.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed or semantically invalid caller input.
    #[error("input: {0}")]
    Input(String),

    /// Referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Request is well-formed but disallowed by policy.
    #[error("policy: {0}")]
    Policy(String),

    /// A collaborator (provider, tool, store) failed to respond.
    #[error("transport: {0}")]
    Transport(String),

    /// A value failed schema validation.
    #[error("schema: {0}")]
    Schema(String),

    /// Anything else: bugs, invariant violations.
    #[error("internal: {0}")]
    Internal(String),
}

impl Error {
    /// The error kind name used in trace events and error envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "internal",
            Error::Json(_) => "schema",
            Error::Input(_) => "input",
            Error::NotFound(_) => "not_found",
            Error::Policy(_) => "policy",
            Error::Transport(_) => "transport",
            Error::Schema(_) => "schema",
            Error::Internal(_) => "internal",
        }
    }

    /// HTTP status code this error kind maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Io(_) => 500,
            Error::Json(_) => 422,
            Error::Input(_) => 400,
            Error::NotFound(_) => 404,
            Error::Policy(_) => 403,
            Error::Transport(_) => 502,
            Error::Schema(_) => 422,
            Error::Internal(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
