use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A read touched bytes that are not present in the snapshot.
    #[error("invalid reference: {len} bytes at {addr:#x} are not mapped")]
    InvalidReference { addr: u64, len: usize },
    /// A value was read successfully but makes no structural sense.
    #[error("structural anomaly: {0}")]
    StructuralAnomaly(String),
    #[error("unknown symbol table: {0}")]
    UnknownTable(String),
    #[error("unknown type: {0}")]
    UnknownType(String),
    #[error("type {ty} has no member {member}")]
    UnknownMember { ty: String, member: String },
    #[error("member {ty}.{member} is not {expected}")]
    MemberKind {
        ty: String,
        member: String,
        expected: &'static str,
    },
    #[error("could not read memory image")]
    Io(#[from] std::io::Error),
    #[error("malformed symbol table")]
    Isf(#[from] serde_json::Error),
}

impl Error {
    /// True for failures caused by reading unmapped memory, as opposed to a
    /// schema mismatch or a nonsensical value.
    pub fn is_invalid_reference(&self) -> bool {
        matches!(self, Error::InvalidReference { .. })
    }
}
