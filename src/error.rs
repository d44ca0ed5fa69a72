use thiserror::Error;

#[derive(Error, Debug)]
pub enum NestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Datastore error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Lexical error on line {line}: {reason}")]
    Lex { line: usize, reason: String },

    #[error("Syntax error on line {line}: expected {expected}, found {found}")]
    Parse {
        line: usize,
        found: String,
        expected: String,
    },

    #[error("Syntax error on line {line}: unexpected end of input, expected {expected}")]
    UnexpectedEof { line: usize, expected: String },

    #[error("Duplicate key: {0}")]
    Conflict(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Persistence worker is gone")]
    SinkClosed,

    #[error("Persistence worker panicked")]
    WorkerPanicked,

    #[error("Service error: {0}")]
    Service(String),
}
