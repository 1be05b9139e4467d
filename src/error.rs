//! Error type shared by the fallible map operations.

/// Error type for [`OrderedMap`](crate::OrderedMap) operations.
///
/// Lookups (`contains`, `get`, `get_first`, `get_next`) never produce one;
/// a missing item is an ordinary `None`/`false` there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// A required argument was absent. Carries the name of the missing
    /// capability.
    InvalidArgument(&'static str),
    /// A node slot could not be allocated, or a key/value copy failed.
    OutOfMemory,
    /// The key passed to a removal is not in the map.
    ItemNotFound,
}

impl std::fmt::Display for MapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapError::InvalidArgument(what) => write!(f, "missing required argument: {}", what),
            MapError::OutOfMemory => write!(f, "out of memory"),
            MapError::ItemNotFound => write!(f, "item not found"),
        }
    }
}

impl std::error::Error for MapError {}

impl From<std::collections::TryReserveError> for MapError {
    fn from(_: std::collections::TryReserveError) -> Self {
        MapError::OutOfMemory
    }
}

/// Result type for map operations.
pub type Result<T> = std::result::Result<T, MapError>;
