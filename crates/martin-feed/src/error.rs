//! Error types for martin-feed.

use thiserror::Error;

/// Feed error types.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Candle fetch failed for {asset}: {source}")]
    Fetch {
        asset: String,
        #[source]
        source: martin_sources::SourceError,
    },
}

/// Result type alias for feed operations.
pub type FeedResult<T> = std::result::Result<T, FeedError>;
