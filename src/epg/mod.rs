//! EPG (Electronic Program Guide) module
//!
//! Request construction, transport, feed parsing and the derived listings.

mod listing;
mod parser;
mod request;
mod transport;

use std::time::Duration;

pub use listing::{fake_events, glue_titles, normalize_title};
pub use parser::{decode_xml_entities, parse_feed};
pub use request::{build_request, EpgRequest, Method};
pub use transport::{decode_body, fetch, DEFAULT_TIMEOUT};

use crate::config::ArchiveConfig;
use crate::error::Result;
use crate::models::{BroadcastEvent, ChannelContext};

/// Get current Unix timestamp
pub fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Build, fetch and parse the archive feed for a channel
pub fn load_archive(ctx: &ChannelContext, config: &ArchiveConfig, now: i64) -> Result<Vec<BroadcastEvent>> {
    let request = build_request(ctx, &config.user_agent)?;
    let timeout = if config.epg_timeout_secs == 0 {
        DEFAULT_TIMEOUT
    } else {
        Duration::from_secs(config.epg_timeout_secs)
    };

    let body = fetch(&request, timeout).map_err(|e| {
        tracing::warn!(
            provider = %ctx.profile.id,
            channel = %ctx.channel_name,
            target = %request.url,
            error = %e,
            "archive fetch failed"
        );
        e
    })?;
    let events = parse_feed(ctx.profile.feed, &body, ctx.profile.depth_days, now).map_err(|e| {
        tracing::warn!(
            provider = %ctx.profile.id,
            channel = %ctx.channel_name,
            target = %request.url,
            error = %e,
            "archive feed rejected"
        );
        e
    })?;

    tracing::debug!(
        provider = %ctx.profile.id,
        channel = %ctx.channel_name,
        count = events.len(),
        "archive loaded"
    );
    Ok(events)
}
