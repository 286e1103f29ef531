//! Data models shared by the guide, the feed parser and the rewriter

use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{Local, TimeZone};

use crate::error::{ArchiveError, Result};
use crate::provider::ProviderProfile;
use crate::stream_url::StreamUrl;

/// Registered-trademark sign some playlists prepend to channel names
const NAME_SIGN: &str = "\u{ae}";

const NO_DESCRIPTION: &str = "Description not available";

static NEXT_SYNTHETIC_ID: AtomicU32 = AtomicU32::new(1);

/// Event id for feeds that don't carry one
pub fn synthetic_event_id() -> u32 {
    NEXT_SYNTHETIC_ID.fetch_add(1, Ordering::Relaxed)
}

/// One archived broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastEvent {
    pub description: String,
    pub event_id: u32,
    /// Unix timestamp
    pub begin_time: i64,
    pub duration_secs: i64,
    pub title: String,
}

impl BroadcastEvent {
    pub fn new(description: String, event_id: Option<u32>, begin_time: i64, duration_secs: i64, title: String) -> Self {
        Self {
            description,
            event_id: event_id.unwrap_or_else(synthetic_event_id),
            begin_time,
            duration_secs,
            title,
        }
    }

    /// Zero-length events are "live now" placeholders and can't be played back
    pub fn is_playable(&self) -> bool {
        self.duration_secs > 0
    }

    pub fn end_time(&self) -> i64 {
        self.begin_time + self.duration_secs
    }

    pub fn display_description(&self) -> &str {
        if self.description.is_empty() {
            NO_DESCRIPTION
        } else {
            &self.description
        }
    }

    /// Local begin time as `DD.MM, HH:MM`
    pub fn begin_label(&self) -> String {
        Local
            .timestamp_opt(self.begin_time, 0)
            .single()
            .map(|dt| dt.format("%d.%m, %H:%M").to_string())
            .unwrap_or_default()
    }

    /// Second info line while an archive event plays
    pub fn archive_label(&self) -> String {
        Local
            .timestamp_opt(self.begin_time, 0)
            .single()
            .map(|dt| dt.format("Archive for %A, %d %B %Y").to_string())
            .unwrap_or_default()
    }
}

/// The host's channel reference; only the stream path and name are read
pub trait ServiceRef {
    /// Live stream URL, empty for non-IPTV (DVB) services
    fn path(&self) -> &str;
    fn name(&self) -> &str;
}

/// Plain service reference for callers without their own type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Service {
    pub path: String,
    pub name: String,
}

impl Service {
    pub fn new(path: &str, name: &str) -> Self {
        Self {
            path: path.to_string(),
            name: name.to_string(),
        }
    }
}

impl ServiceRef for Service {
    fn path(&self) -> &str {
        &self.path
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Everything derived from one channel selection
#[derive(Debug, Clone)]
pub struct ChannelContext {
    pub raw_url: String,
    pub url: StreamUrl,
    pub channel_name: String,
    pub profile: ProviderProfile,
    /// Token read from the companion playlist plugin, bcumedia only
    pub companion_token: Option<String>,
}

impl ChannelContext {
    /// Build the context for a service. Fails with `NotIptvChannel` for
    /// services without a stream path and `UnknownProvider` when no provider matches.
    pub fn from_service(service: &dyn ServiceRef, companion_dir: Option<&std::path::Path>) -> Result<Self> {
        let raw_url = service.path().trim();
        if raw_url.is_empty() {
            return Err(ArchiveError::NotIptvChannel);
        }
        let url = StreamUrl::parse(raw_url)?;
        let profile = ProviderProfile::resolve(raw_url, &url, companion_dir.is_some())
            .ok_or(ArchiveError::UnknownProvider)?;

        let companion_token = match companion_dir {
            Some(dir) if raw_url.contains(".bcumedia.pro") => crate::companion::bcumedia_token(dir),
            _ => None,
        };

        Ok(Self {
            raw_url: raw_url.to_string(),
            url,
            channel_name: clean_channel_name(service.name()),
            profile,
            companion_token,
        })
    }
}

/// Strip the trademark sign decoration from a channel name
pub fn clean_channel_name(name: &str) -> String {
    name.replace(&format!("{} ", NAME_SIGN), "")
        .replace(NAME_SIGN, "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;

    #[test]
    fn test_context_for_dvb_service() {
        let service = Service::new("", "Das Erste");
        assert!(matches!(
            ChannelContext::from_service(&service, None),
            Err(ArchiveError::NotIptvChannel)
        ));
    }

    #[test]
    fn test_context_for_unknown_provider() {
        let service = Service::new("http://example.com/live.m3u8", "Some");
        assert!(matches!(
            ChannelContext::from_service(&service, None),
            Err(ArchiveError::UnknownProvider)
        ));
    }

    #[test]
    fn test_context_cleans_name() {
        let service = Service::new("http://tv.team/101/mono.m3u8?token=abc", "\u{ae} Channel One");
        let ctx = ChannelContext::from_service(&service, None).unwrap();
        assert_eq!(ctx.channel_name, "Channel One");
        assert_eq!(ctx.profile.id, ProviderId::TvTeam);
        assert_eq!(ctx.companion_token, None);
    }

    #[test]
    fn test_synthetic_ids_are_unique() {
        let a = BroadcastEvent::new(String::new(), None, 0, 60, "a".into());
        let b = BroadcastEvent::new(String::new(), None, 0, 60, "b".into());
        assert_ne!(a.event_id, b.event_id);
        assert_eq!(a.display_description(), "Description not available");
    }

    #[test]
    fn test_zero_duration_is_not_playable() {
        let live = BroadcastEvent::new("d".into(), Some(5), 100, 0, "t".into());
        assert!(!live.is_playable());
        assert_eq!(live.event_id, 5);
    }

    #[test]
    fn test_event_end_and_labels() {
        let event = BroadcastEvent::new(String::new(), Some(1), 1_700_000_000, 1800, "Show".into());
        assert_eq!(event.end_time(), 1_700_001_800);
        // 2023-11-14 22:13 UTC lands on the 14th or 15th depending on the zone
        let label = event.archive_label();
        assert!(label.starts_with("Archive for "));
        assert!(label.ends_with("November 2023"));
        assert!(label.contains(", 14 November") || label.contains(", 15 November"));
        assert_eq!(event.begin_label().len(), "14.11, 22:13".len());
    }
}
