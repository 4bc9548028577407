use thiserror::Error;

/// Rejections raised while compiling a `Filter` into a query document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("malformed operand for {op}: {reason}")]
    MalformedOperand { op: &'static str, reason: String },

    #[error("unsupported bound type for {op}: {found}")]
    UnsupportedBoundType { op: &'static str, found: String },

    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),
}

impl CompileError {
    pub(crate) fn malformed(op: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedOperand { op, reason: reason.into() }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("data argument can't be empty")]
    EmptyDocument,

    #[error("Config error: {0}")]
    Config(String),

    #[error("deadline of {after_ms} ms exceeded on collection {collection}")]
    Timeout { collection: String, after_ms: u64 },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Query error: {0}")]
    QueryError(String),
}

impl From<std::io::Error> for DbError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
