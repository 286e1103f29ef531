//! Error kinds surfaced by the archive engine

use thiserror::Error;

use crate::provider::ProviderId;

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Why a successfully parsed feed produced nothing to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// The provider returned no events at all
    NoEvents,
    /// Events came back but none fell inside the archive depth window
    OutsideWindow,
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("not an IPTV channel")]
    NotIptvChannel,
    #[error("unknown IPTV provider")]
    UnknownProvider,
    #[error("no EPG integration for provider {0}")]
    UnsupportedProvider(ProviderId),
    #[error("EPG unreachable: {0}")]
    NetworkError(String),
    #[error("feed parsing failed: {0}")]
    FeedParseError(String),
    #[error("empty archive: {0:?}")]
    EmptyResult(EmptyReason),
    #[error("request construction failed: {0}")]
    RequestConstructionError(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ArchiveError {
    /// Short title and description shown in place of the event list
    pub fn status(&self) -> (&'static str, &'static str) {
        match self {
            ArchiveError::NotIptvChannel => (
                "No access to archive",
                "Not IPTV Channel. No access to archive",
            ),
            ArchiveError::UnknownProvider => (
                "No access to archive",
                "Unknown IPTV provider. No access to archive",
            ),
            ArchiveError::UnsupportedProvider(_) => (
                "No access to archive",
                "This IPTV provider has no EPG archive support",
            ),
            ArchiveError::NetworkError(_) => (
                "Error getting archive",
                "Can't download the EPG data.\nFailed to reach a server or the API server couldn't fulfill the request",
            ),
            ArchiveError::FeedParseError(_) | ArchiveError::Json(_) => {
                ("No archive", "EPG data parsing error")
            }
            ArchiveError::EmptyResult(EmptyReason::NoEvents) => {
                ("No archive", "There are no archive entries for this channel")
            }
            ArchiveError::EmptyResult(EmptyReason::OutsideWindow) => (
                "No archive",
                "There are no archive entries for this channel satisfying the conditions of a given search depth",
            ),
            ArchiveError::RequestConstructionError(_) | ArchiveError::Io(_) => (
                "Error getting archive",
                "Error generating request URL for receiving EPG archive broadcasts",
            ),
        }
    }

    /// Only network failures are worth another user-triggered attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, ArchiveError::NetworkError(_))
    }
}
