//! Provider classification
//!
//! A live stream URL is matched against an ordered token table. The first token
//! found anywhere in the URL wins, so table order is the only tie-break: several
//! tokens can match the same URL (e.g. `.iptv.` and `/iptv/`) and the earlier
//! entry decides.

use std::fmt;

use url::form_urlencoded;

use crate::stream_url::StreamUrl;

/// Fragment parameter carrying an explicit archive depth in days
pub const CATCHUP_DAYS_HINT: &str = "sapp_catchup-days";
/// Fragment parameter carrying the playlist's tvg-id
pub const TVG_ID_HINT: &str = "sapp_tvgid";

/// Token that marks a broken playlist entry; never archive-capable
const NO_MATCH_SENTINEL: &str = "undefined";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    Shura,
    OneOtt,
    Only4,
    IptvxOne,
    SharaClub,
    Ipstream,
    It999,
    FoxTv,
    Online,
    Magic,
    SharaTv,
    UzTv,
    Bcu,
    Antifriz,
    AppGreatIptv,
    Zala,
    Zabava,
    Sharavoz,
    Tvoetv,
    Ttv,
    Ottclub,
    Itv,
    Cbilling,
    TvTeam,
    Viplime,
    PropgNet,
    Zmedia,
    /// Unmatched URL that still declares a catch-up depth
    Flussonic,
}

impl ProviderId {
    /// Provider name as used by EPG mirrors and in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Shura => "shura",
            ProviderId::OneOtt => "1ott",
            ProviderId::Only4 => "only4",
            ProviderId::IptvxOne => "iptvx.one",
            ProviderId::SharaClub => "shara.club",
            ProviderId::Ipstream => "ipstream",
            ProviderId::It999 => "it999",
            ProviderId::FoxTv => "fox-tv",
            ProviderId::Online => "online",
            ProviderId::Magic => "magic",
            ProviderId::SharaTv => "shara-tv",
            ProviderId::UzTv => "uz-tv",
            ProviderId::Bcu => "bcu",
            ProviderId::Antifriz => "antifriz",
            ProviderId::AppGreatIptv => "app-greatiptv",
            ProviderId::Zala => "zala",
            ProviderId::Zabava => "zabava",
            ProviderId::Sharavoz => "sharavoz",
            ProviderId::Tvoetv => "tvoetv",
            ProviderId::Ttv => "ttv",
            ProviderId::Ottclub => "ottclub",
            ProviderId::Itv => "itv",
            ProviderId::Cbilling => "cbilling",
            ProviderId::TvTeam => "tvteam",
            ProviderId::Viplime => "viplime",
            ProviderId::PropgNet => "propg.net",
            ProviderId::Zmedia => "zmedia",
            ProviderId::Flussonic => "flussonic",
        }
    }

    /// Providers whose EPG is served by the shared ottp mirror keyed by hashed tvg-id
    pub fn uses_hashed_mirror(&self) -> bool {
        matches!(
            self,
            ProviderId::It999
                | ProviderId::AppGreatIptv
                | ProviderId::IptvxOne
                | ProviderId::Only4
                | ProviderId::Bcu
                | ProviderId::PropgNet
        )
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of the EPG archive feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    /// `<event>` elements with `name`/`text`/`start_time`/`duration`
    XmlShura,
    /// `res` array with `startTime`/`stopTime`
    JsonItv,
    /// `epg_data` array (or a bare array) with `time`/`time_to`
    JsonGeneric,
    /// Generic JSON served by the hashed tvg-id mirror
    JsonHashedId,
    None,
}

/// How a live URL becomes a catch-up URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteStrategy {
    /// `<id>/video-timeshift_abs-<begin>.m3u8?token=..`
    Cbilling,
    /// `<id>/archive-<begin>-<duration>.m3u8` on port 80
    Antifriz,
    /// `q=..&offset=<begin-now>&utcstart=<last>`
    ZmediaProxy,
    /// `version=2&offset=<begin-now>`
    MirrorOffset,
    /// `archive=<begin>`
    SimpleArchive,
    /// `<id>/archive-<begin>-<duration>.m3u8?login=..&key=..`
    Tvoetv,
    /// `<id>/video-<begin>-<duration>.m3u8`
    Bcumedia,
    /// `<id>/index-<begin>-<duration>.m3u8`
    FlussonicIndex,
    /// `utc=<begin>&lutc=<last>`, optional token
    Shift,
}

const CLASSIFIER_TABLE: &[(&str, ProviderId, u32)] = &[
    ("tvshka.net", ProviderId::Shura, 7),
    ("1ott.", ProviderId::OneOtt, 8),
    ("only4.tv", ProviderId::Only4, 7),
    ("satbiling.com", ProviderId::IptvxOne, 7),
    (".crd-s.", ProviderId::IptvxOne, 3),
    ("/live/s.", ProviderId::SharaClub, 2),
    ("/live/u.", ProviderId::Ipstream, 3),
    ("/iptv/", ProviderId::It999, 3),
    (".ottg.", ProviderId::IptvxOne, 7),
    (".fox-tv.", ProviderId::FoxTv, 5),
    (".iptv.", ProviderId::Online, 1),
    (".mymagic.", ProviderId::Magic, 7),
    ("tvfor.pro", ProviderId::SharaTv, 5),
    ("uz-tv", ProviderId::UzTv, 5),
    (".bcumedia.pro", ProviderId::Bcu, 2),
    (".antifriz.", ProviderId::Antifriz, 7),
    ("app-greatiptv", ProviderId::AppGreatIptv, 7),
    (".zala.", ProviderId::Zala, 2),
    ("/zatv/", ProviderId::Zala, 2),
    ("178.124.183.", ProviderId::Zala, 2),
    ("zabava", ProviderId::Zabava, 3),
    ("cdn.ngenix.net", ProviderId::Zabava, 3),
    (".spr24.", ProviderId::Sharavoz, 3),
    (".onlineott.", ProviderId::Tvoetv, 5),
    ("85.143.191.", ProviderId::Ttv, 5),
    ("myott.top", ProviderId::Ottclub, 5),
    (".itv.", ProviderId::Itv, 3),
    ("cdn.wf", ProviderId::Itv, 3),
    ("iptvx.tv", ProviderId::Cbilling, 7),
    ("tv.team", ProviderId::TvTeam, 7),
    ("troya.tv", ProviderId::TvTeam, 7),
    ("1usd.tv", ProviderId::TvTeam, 7),
    ("cdntv.online", ProviderId::Viplime, 3),
    (".tvdosug.", ProviderId::PropgNet, 1),
    ("/channel/", ProviderId::Zmedia, 3),
    ("/rmtv/", ProviderId::IptvxOne, 7),
];

/// Result of matching a URL against the classifier table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// `None` means the channel has no archive
    pub provider: Option<ProviderId>,
    pub depth_days: u32,
}

/// Classify a live URL into a provider and archive depth
pub fn classify(url: &str) -> Classification {
    if url.contains(NO_MATCH_SENTINEL) {
        return Classification { provider: None, depth_days: 0 };
    }

    let mut result = CLASSIFIER_TABLE
        .iter()
        .find(|(token, _, _)| url.contains(token))
        .map(|&(_, provider, days)| Classification { provider: Some(provider), depth_days: days })
        .unwrap_or(Classification { provider: None, depth_days: 0 });

    if let Some(days) = catchup_days_hint(url) {
        result.depth_days = days;
        if result.provider.is_none() {
            result.provider = Some(ProviderId::Flussonic);
        }
    }

    result
}

fn catchup_days_hint(url: &str) -> Option<u32> {
    let (_, fragment) = url.split_once('#')?;
    let raw = form_urlencoded::parse(fragment.as_bytes())
        .find(|(k, _)| k == CATCHUP_DAYS_HINT)
        .map(|(_, v)| v.into_owned())?;
    match raw.trim().parse() {
        Ok(days) => Some(days),
        Err(_) => {
            tracing::warn!(value = %raw, "ignoring malformed catch-up days hint");
            None
        }
    }
}

const REWRITE_TABLE: &[(&[&str], RewriteStrategy)] = &[
    (&["iptvx.tv"], RewriteStrategy::Cbilling),
    (&[".antifriz."], RewriteStrategy::Antifriz),
    (&["/channel/", "/rmtv/", "/zatv/"], RewriteStrategy::ZmediaProxy),
    (&[".zala.", "178.124.183.", "zabava", "cdn.ngenix.net"], RewriteStrategy::MirrorOffset),
    (&["1ott."], RewriteStrategy::SimpleArchive),
    (&[".onlineott.", "46.174.189"], RewriteStrategy::Tvoetv),
    (&[".bcumedia.pro", "5.9.10.135"], RewriteStrategy::Bcumedia),
    (&[".itv.", "cdn.wf", ".ottg."], RewriteStrategy::FlussonicIndex),
];

impl RewriteStrategy {
    /// Pick the rewrite grammar for a URL. The bcumedia grammar needs the
    /// companion playlist plugin and is skipped without it.
    pub fn detect(url: &str, companion_available: bool) -> Self {
        REWRITE_TABLE
            .iter()
            .filter(|(_, strategy)| companion_available || *strategy != RewriteStrategy::Bcumedia)
            .find(|(tokens, _)| tokens.iter().any(|t| url.contains(t)))
            .map(|&(_, strategy)| strategy)
            .unwrap_or(RewriteStrategy::Shift)
    }
}

/// Everything known about the provider behind one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub id: ProviderId,
    pub depth_days: u32,
    pub feed: FeedFormat,
    pub rewrite: RewriteStrategy,
}

impl ProviderProfile {
    /// Resolve the profile for a parsed live URL; `None` when not archive-capable
    pub fn resolve(raw: &str, url: &StreamUrl, companion_available: bool) -> Option<Self> {
        let Classification { provider, depth_days } = classify(raw);
        let id = provider?;
        Some(Self {
            id,
            depth_days,
            feed: feed_format(id, url.fragment_value(TVG_ID_HINT).is_some()),
            rewrite: RewriteStrategy::detect(raw, companion_available),
        })
    }
}

fn feed_format(id: ProviderId, has_tvg_id: bool) -> FeedFormat {
    match id {
        ProviderId::Shura | ProviderId::OneOtt => FeedFormat::XmlShura,
        ProviderId::Itv => FeedFormat::JsonItv,
        ProviderId::Ottclub | ProviderId::Cbilling | ProviderId::TvTeam => FeedFormat::JsonGeneric,
        ProviderId::SharaClub | ProviderId::Ipstream if has_tvg_id => FeedFormat::JsonGeneric,
        id if id.uses_hashed_mirror() && has_tvg_id => FeedFormat::JsonHashedId,
        _ => FeedFormat::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_table_token_classifies() {
        for &(token, provider, days) in CLASSIFIER_TABLE {
            // First-match order means a token must be checked against the entries before it
            let expected = CLASSIFIER_TABLE
                .iter()
                .find(|(t, _, _)| token.contains(t))
                .map(|&(_, p, d)| (p, d))
                .unwrap_or((provider, days));
            let url = format!("http://x{}y/ch/1.m3u8", token);
            let result = classify(&url);
            assert_eq!(result.provider, Some(expected.0), "token {}", token);
            assert_eq!(result.depth_days, expected.1, "token {}", token);
        }
    }

    #[test]
    fn test_first_match_wins() {
        // both `.iptv.` and `iptvx.tv` match; `.iptv.` is earlier in the table
        let result = classify("http://srv.iptv.iptvx.tv/ch/index.m3u8");
        assert_eq!(result.provider, Some(ProviderId::Online));
        assert_eq!(result.depth_days, 1);
    }

    #[test]
    fn test_unknown_url() {
        let result = classify("http://example.com/stream.m3u8");
        assert_eq!(result, Classification { provider: None, depth_days: 0 });
    }

    #[test]
    fn test_undefined_sentinel_beats_everything() {
        let result = classify("http://tv.team/undefined/mono.m3u8");
        assert_eq!(result, Classification { provider: None, depth_days: 0 });
        let result = classify("http://undefined/x.m3u8#sapp_catchup-days=4");
        assert_eq!(result, Classification { provider: None, depth_days: 0 });
    }

    #[test]
    fn test_catchup_hint_overrides_depth() {
        let result = classify("http://tv.team/ch/mono.m3u8#sapp_catchup-days=2");
        assert_eq!(result.provider, Some(ProviderId::TvTeam));
        assert_eq!(result.depth_days, 2);
    }

    #[test]
    fn test_catchup_hint_falls_back_to_flussonic() {
        let result = classify("http://example.com/ch/index.m3u8#sapp_tvgid=1&sapp_catchup-days=4");
        assert_eq!(result.provider, Some(ProviderId::Flussonic));
        assert_eq!(result.depth_days, 4);
    }

    #[test]
    fn test_malformed_hint_is_ignored() {
        let result = classify("http://example.com/ch/index.m3u8#sapp_catchup-days=lots");
        assert_eq!(result.provider, None);
    }

    #[test]
    fn test_rewrite_detection_order() {
        assert_eq!(RewriteStrategy::detect("http://a.iptvx.tv/1/2.m3u8", true), RewriteStrategy::Cbilling);
        assert_eq!(RewriteStrategy::detect("http://proxy/rmtv/?q=1", true), RewriteStrategy::ZmediaProxy);
        assert_eq!(RewriteStrategy::detect("http://cdn.ngenix.net/x", true), RewriteStrategy::MirrorOffset);
        assert_eq!(RewriteStrategy::detect("http://x.ottg.tv/ch/index.m3u8", true), RewriteStrategy::FlussonicIndex);
        assert_eq!(RewriteStrategy::detect("http://tv.team/ch/mono.m3u8", true), RewriteStrategy::Shift);
    }

    #[test]
    fn test_bcumedia_needs_companion() {
        let url = "http://5.9.10.135:8080/abc/index.m3u8";
        assert_eq!(RewriteStrategy::detect(url, true), RewriteStrategy::Bcumedia);
        assert_eq!(RewriteStrategy::detect(url, false), RewriteStrategy::Shift);
    }

    #[test]
    fn test_profile_feed_depends_on_tvg_id() {
        let raw = "http://x.crd-s.tv/ch/index.m3u8#sapp_tvgid=abc";
        let url = StreamUrl::parse(raw).unwrap();
        let profile = ProviderProfile::resolve(raw, &url, false).unwrap();
        assert_eq!(profile.id, ProviderId::IptvxOne);
        assert_eq!(profile.feed, FeedFormat::JsonHashedId);

        let raw = "http://x.crd-s.tv/ch/index.m3u8";
        let url = StreamUrl::parse(raw).unwrap();
        let profile = ProviderProfile::resolve(raw, &url, false).unwrap();
        assert_eq!(profile.feed, FeedFormat::None);
    }
}
