//! datastore::error
//!
//! Error taxonomy for datastore operations.
//!
//! Every failure carries an [`ErrorKind`] so the transport layer can pick a
//! status code without matching on message text:
//!
//! | Kind | Typical response |
//! |---|---|
//! | `InvalidRange`, `OutOfRange` | range not satisfiable |
//! | `EmptyResult`, `NotFound`, `CollectionUnavailable` | not found |
//! | `QueryBuild` | bad request |
//! | `StoreExecution`, `Scan` | internal error |
//!
//! Nothing here is retried and no partial result travels with an error.

use thiserror::Error;

use crate::core::filter::FilterError;
use crate::core::range::RangeError;
use crate::store::StoreError;

/// Errors from datastore operations.
#[derive(Debug, Error)]
pub enum DatastoreError {
    /// The requested range is malformed.
    #[error("invalid range: {0}")]
    InvalidRange(RangeError),

    /// The requested range starts beyond the matching set.
    #[error("range not satisfiable: {0}")]
    OutOfRange(RangeError),

    /// No rows matched the query.
    #[error("no records returned for collection {collection_id}")]
    EmptyResult { collection_id: String },

    /// The filters could not be turned into a predicate.
    #[error("query build error: {0}")]
    QueryBuild(#[from] FilterError),

    /// The storage engine failed.
    #[error("{operation} failed: {source}")]
    StoreExecution {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    /// A returned row could not be decoded.
    #[error("scan error: {0}")]
    Scan(String),

    /// An object version does not exist in the object store.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The collection does not exist or is not enabled.
    #[error("collection {0} is not available")]
    CollectionUnavailable(String),
}

/// Error classification for transport mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidRange,
    OutOfRange,
    EmptyResult,
    QueryBuild,
    StoreExecution,
    Scan,
    NotFound,
    CollectionUnavailable,
}

impl DatastoreError {
    /// Get the error's kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DatastoreError::InvalidRange(_) => ErrorKind::InvalidRange,
            DatastoreError::OutOfRange(_) => ErrorKind::OutOfRange,
            DatastoreError::EmptyResult { .. } => ErrorKind::EmptyResult,
            DatastoreError::QueryBuild(_) => ErrorKind::QueryBuild,
            DatastoreError::StoreExecution { .. } => ErrorKind::StoreExecution,
            DatastoreError::Scan(_) => ErrorKind::Scan,
            DatastoreError::NotFound(_) => ErrorKind::NotFound,
            DatastoreError::CollectionUnavailable(_) => ErrorKind::CollectionUnavailable,
        }
    }

    /// Wrap an engine failure with the operation that produced it.
    pub(crate) fn store(operation: &'static str, source: StoreError) -> Self {
        DatastoreError::StoreExecution { operation, source }
    }
}

impl From<RangeError> for DatastoreError {
    fn from(err: RangeError) -> Self {
        if err.is_out_of_range() {
            DatastoreError::OutOfRange(err)
        } else {
            DatastoreError::InvalidRange(err)
        }
    }
}
