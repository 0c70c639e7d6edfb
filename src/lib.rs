pub mod constant;
pub mod cursor;
pub mod error;
pub mod fetch;
pub mod field;
pub mod mutation;
pub mod protocol;
pub mod source;
pub mod store;
pub mod value;

#[cfg(test)]
mod testutil;

pub use cursor::{ResultOptions, ResultSet};
pub use error::{Error, NotUpdatableReason, Result, ServerError};
pub use field::Encoding;
pub use mutation::{ExecOutcome, Executor, MutationState};
pub use protocol::packet::EofSemantics;
pub use source::{PacketSource, ReadSource, SharedConnection};
pub use value::{Decode, Param, Value};
