use thiserror::Error;

pub use color_eyre::eyre;

/// ERR packet parsed from the wire.
///
/// The connection stays usable after a server error; only the in-flight
/// command is terminated.
#[derive(Debug, Clone, thiserror::Error)]
#[error("ERROR {} ({}): {}", self.code, self.sql_state, self.message)]
pub struct ServerError {
    pub code: u16,
    pub sql_state: String,
    pub message: String,
}

/// Why a result set cannot support write-back, decided once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NotUpdatableReason {
    #[error("result was not opened for write-back")]
    ReadOnly,

    #[error("result spans more than one table")]
    MultipleTables,

    #[error("result is not backed by a table")]
    NoTable,

    #[error("no primary key could be discovered for the backing table")]
    NoPrimaryKey,

    #[error("a primary key column is not part of the selected columns")]
    PrimaryKeyNotSelected,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Server Error: {0}")]
    ServerError(#[from] ServerError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// An earlier transport failure on the shared connection ended this
    /// result set and every sibling sharing the fetch mutex.
    #[error("connection broken by an earlier transport failure")]
    BrokenConnection,

    #[error("Invalid packet")]
    InvalidPacket,

    #[error("Unexpected end of packet")]
    UnexpectedEof,

    #[error("result set is closed")]
    Closed,

    #[error("cursor is not positioned on a row")]
    NoCurrentRow,

    #[error("column index {index} out of range 1..={count}")]
    ColumnIndexOutOfRange { index: usize, count: usize },

    #[error("unknown column label: {0}")]
    UnknownLabel(String),

    #[error("cursor is forward-only")]
    ForwardOnly,

    #[error("result set is not updatable: {0}")]
    NotUpdatable(NotUpdatableReason),

    #[error("no columns are staged for update")]
    NothingStaged,

    #[error("cursor is not on the insert row")]
    NotOnInsertRow,

    #[error("operation not allowed while staging an insert row")]
    OnInsertRow,

    #[error("column `{0}` has no default and was not staged for insert")]
    InsertMissingColumn(String),

    /// Scoped to a single getter call; the cursor and row stay valid.
    #[error("cannot decode column {column}: {message}")]
    Decode { column: String, message: String },

    #[error("column value is NULL")]
    UnexpectedNull,

    #[error("Library bug: {0}")]
    LibraryBug(eyre::Report),
}

impl From<std::convert::Infallible> for Error {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

pub type Result<T> = std::result::Result<T, Error>;
