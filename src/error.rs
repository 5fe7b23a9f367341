use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Precondition failures. An operation returning one of these left the
/// engine exactly as it was before the call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("no-repeat window {window} must be smaller than the pool ({pool} items)")]
    WindowTooLarge { window: usize, pool: usize },

    #[error("playlist edits must target an entry after the current one")]
    NonPositiveOffset,

    #[error("offset {offset} is past the end of the playlist ({len} entries)")]
    OffsetOutOfRange { offset: usize, len: usize },

    #[error("position {position} is outside the {list} list ({len} entries)")]
    PositionOutOfRange {
        list: &'static str,
        position: usize,
        len: usize,
    },

    #[error("the pool is empty")]
    EmptyPool,
}
