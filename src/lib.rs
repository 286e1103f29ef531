//! IPTV Archive - catch-up engine for set-top IPTV players
//!
//! Classifies live stream URLs by provider, loads the provider's EPG archive
//! and rewrites the live URL into a time-shifted one for a chosen broadcast.

pub mod companion;
pub mod config;
pub mod epg;
pub mod error;
pub mod guide;
pub mod logging;
pub mod models;
pub mod provider;
pub mod rewrite;
pub mod session;
pub mod stream_url;

pub use config::ArchiveConfig;
pub use error::{ArchiveError, EmptyReason, Result};
pub use guide::{Guide, GuideMode, GuideStatus, Listing, ListingJob};
pub use models::{BroadcastEvent, ChannelContext, Service, ServiceRef};
pub use provider::{classify, Classification, FeedFormat, ProviderId, ProviderProfile, RewriteStrategy};
pub use rewrite::{rewrite, RewriteTiming};
pub use session::{ArchiveSession, PauseOutcome, SeekKey, SeekSteps, SessionAnchor};
pub use stream_url::StreamUrl;
