//! Error taxonomy for reference resolution.
//!
//! Every error is scoped to the single request that raised it. Soft failures
//! (a position that cannot be mapped between commits) never surface here;
//! they are reported as `None` by the position adjuster and the affected
//! upload or location is dropped.

use thiserror::Error;

use crate::bloom::FilterError;
use crate::types::UploadId;

/// Failure reported by a backing-store collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached or the query failed.
    #[error("{0}")]
    Unavailable(String),

    /// The store returned data it could not decode.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the resolver.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The continuation token could not be parsed or has an unsupported version.
    #[error("malformed cursor: {0}")]
    MalformedCursor(String),

    /// The set of visible uploads changed between pages of the same result set.
    #[error("result set changed while paginating")]
    ConcurrentModification,

    /// A backing-store operation failed.
    #[error("{operation}: {source}")]
    StoreUnavailable {
        /// The collaborator operation that failed
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    /// A candidate upload carried a bloom filter that failed to decode.
    #[error("invalid bloom filter for upload {upload_id}: {source}")]
    InvalidBloomFilter {
        upload_id: UploadId,
        #[source]
        source: FilterError,
    },

    /// The caller cancelled the request while a store call was in flight.
    #[error("request cancelled")]
    Cancelled,

    /// An in-flight error followed by a failure while releasing a resource.
    #[error("{error} (additionally, {cleanup})")]
    Cleanup {
        error: Box<ResolveError>,
        cleanup: Box<ResolveError>,
    },
}

impl ResolveError {
    pub fn store(operation: &'static str, source: StoreError) -> Self {
        Self::StoreUnavailable { operation, source }
    }

    /// Stable label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedCursor(_) => "malformed_cursor",
            Self::ConcurrentModification => "concurrent_modification",
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::InvalidBloomFilter { .. } => "invalid_bloom_filter",
            Self::Cancelled => "cancelled",
            Self::Cleanup { error, .. } => error.kind(),
        }
    }

    /// Combine an operation outcome with the outcome of releasing the
    /// resource it used. The original error is never overwritten.
    pub fn combine<T>(result: Result<T, ResolveError>, cleanup: Result<(), ResolveError>) -> Result<T, ResolveError> {
        match (result, cleanup) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(cleanup)) => Err(cleanup),
            (Err(error), Ok(())) => Err(error),
            (Err(error), Err(cleanup)) => Err(ResolveError::Cleanup {
                error: Box::new(error),
                cleanup: Box::new(cleanup),
            }),
        }
    }
}

pub type Result<T, E = ResolveError> = std::result::Result<T, E>;
