//! EPG archive request construction, one rule per provider

use url::form_urlencoded;
use xxhash_rust::xxh32::xxh32;

use crate::error::{ArchiveError, Result};
use crate::models::ChannelContext;
use crate::provider::{ProviderId, TVG_ID_HINT};
use crate::stream_url::{stem, StreamUrl};

/// Community mirror serving EPG for playlists exported with tvg-ids
const OTTP_MIRROR: &str = "http://epg.ottp.eu.org";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Outbound EPG request, built without any I/O
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpgRequest {
    pub method: Method,
    pub url: String,
    /// `application/x-www-form-urlencoded` body for POST requests
    pub body: Option<String>,
    pub headers: Vec<(&'static str, String)>,
}

impl EpgRequest {
    fn get(url: String, user_agent: &str) -> Self {
        Self {
            method: Method::Get,
            url,
            body: None,
            headers: default_headers(user_agent),
        }
    }

    fn post(url: String, form: &[(&str, &str)], user_agent: &str) -> Self {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (k, v) in form {
            serializer.append_pair(k, v);
        }
        Self {
            method: Method::Post,
            url,
            body: Some(serializer.finish()),
            headers: default_headers(user_agent),
        }
    }
}

fn default_headers(user_agent: &str) -> Vec<(&'static str, String)> {
    vec![
        ("User-Agent", user_agent.to_string()),
        ("Accept-Encoding", "gzip, deflate".to_string()),
        ("Connection", "close".to_string()),
    ]
}

/// Build the EPG request for a channel
pub fn build_request(ctx: &ChannelContext, user_agent: &str) -> Result<EpgRequest> {
    let url = &ctx.url;
    let tvg_id = url.fragment_value(TVG_ID_HINT);

    let request = match ctx.profile.id {
        ProviderId::Shura | ProviderId::OneOtt => {
            let prefix: Vec<&str> = url.segments.iter().take(3).map(String::as_str).collect();
            let mut target = url.clone();
            target.set_path(&format!("{}/epg/archive.xml", prefix.join("/")));
            target.fragment.clear();
            EpgRequest::get(target.to_string(), user_agent)
        }
        ProviderId::Ottclub => EpgRequest::get(
            format!("http://spacetv.in/api/channel/{}", stem(url.segment(-1)?)),
            user_agent,
        ),
        ProviderId::Itv => {
            let token = url.query_or_empty("token");
            EpgRequest::post(
                "http://api.itv.live/epg.php".to_string(),
                &[
                    ("action", "epg"),
                    ("chid", url.segment(-2)?),
                    ("name", ctx.channel_name.as_str()),
                    ("token", token.as_str()),
                    ("serv", url.host.as_str()),
                ],
                user_agent,
            )
        }
        ProviderId::Cbilling => {
            let id = if url.has_segment("static") {
                url.segment(2)?
            } else if url.query.contains("token") {
                url.segment(1)?
            } else {
                stem(url.segment(-1)?)
            };
            EpgRequest::get(format!("http://{}/epg/{}?date=", api_host(url), id), user_agent)
        }
        ProviderId::TvTeam => {
            let id = if url.has_segment("static") { url.segment(-1)? } else { url.segment(-2)? };
            EpgRequest::get(format!("http://tv.team/{}.json", id), user_agent)
        }
        ProviderId::SharaClub | ProviderId::Ipstream if tvg_id.is_some() => {
            let ch = tvg_id.unwrap_or_default();
            EpgRequest::post(
                format!("{}://{}/get/", url.scheme, api_host(url)),
                &[("type", "epg"), ("ch", ch.as_str())],
                user_agent,
            )
        }
        id if id.uses_hashed_mirror() && tvg_id.is_some() => {
            let key = xxh32(tvg_id.unwrap_or_default().as_bytes(), 0);
            EpgRequest::get(format!("{}/{}/epg/{}.json", OTTP_MIRROR, id.as_str(), key), user_agent)
        }
        id => return Err(ArchiveError::UnsupportedProvider(id)),
    };

    tracing::debug!(
        provider = %ctx.profile.id,
        channel = %ctx.channel_name,
        target = %request.url,
        "built EPG request"
    );
    Ok(request)
}

/// `api.` + host without its first label, e.g. `s1.example.tv` -> `api.example.tv`
fn api_host(url: &StreamUrl) -> String {
    let host = url.hostname();
    let rest: Vec<&str> = host.split('.').skip(1).collect();
    format!("api.{}", rest.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Service;

    const UA: &str = "test-agent";

    fn ctx(url: &str, name: &str) -> ChannelContext {
        ChannelContext::from_service(&Service::new(url, name), None).unwrap()
    }

    #[test]
    fn test_shura_archive_xml() {
        let req = build_request(&ctx("http://s1.tvshka.net/user/ch5/index.m3u8?token=abc#x=1", "Ch5"), UA).unwrap();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.url, "http://s1.tvshka.net/user/ch5/epg/archive.xml?token=abc");
        assert!(req.headers.contains(&("Accept-Encoding", "gzip, deflate".to_string())));
        assert!(req.headers.contains(&("Connection", "close".to_string())));
        assert!(req.headers.contains(&("User-Agent", UA.to_string())));
    }

    #[test]
    fn test_ottclub_channel_api() {
        let req = build_request(&ctx("http://srv.myott.top/stream/KEY/245.m3u8", "X"), UA).unwrap();
        assert_eq!(req.url, "http://spacetv.in/api/channel/245");
    }

    #[test]
    fn test_itv_post_form() {
        let req = build_request(&ctx("http://de.itv.live:8080/ch42/video.m3u8?token=t0k", "Первый канал"), UA).unwrap();
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.url, "http://api.itv.live/epg.php");
        let body = req.body.unwrap();
        let pairs: Vec<(String, String)> = form_urlencoded::parse(body.as_bytes()).into_owned().collect();
        assert_eq!(pairs[0], ("action".to_string(), "epg".to_string()));
        assert_eq!(pairs[1], ("chid".to_string(), "ch42".to_string()));
        assert_eq!(pairs[2], ("name".to_string(), "Первый канал".to_string()));
        assert_eq!(pairs[3], ("token".to_string(), "t0k".to_string()));
        assert_eq!(pairs[4], ("serv".to_string(), "de.itv.live".to_string()));
    }

    #[test]
    fn test_cbilling_variants() {
        let req = build_request(&ctx("http://s.iptvx.tv/static/77/mono.m3u8", "C"), UA).unwrap();
        assert_eq!(req.url, "http://api.iptvx.tv/epg/77?date=");

        let req = build_request(&ctx("http://s.iptvx.tv/88/index.m3u8?token=z", "C"), UA).unwrap();
        assert_eq!(req.url, "http://api.iptvx.tv/epg/88?date=");

        let req = build_request(&ctx("http://s.iptvx.tv/s/99.m3u8", "C"), UA).unwrap();
        assert_eq!(req.url, "http://api.iptvx.tv/epg/99?date=");
    }

    #[test]
    fn test_tvteam_json() {
        let req = build_request(&ctx("http://tv.team/101/mono.m3u8?token=a", "T"), UA).unwrap();
        assert_eq!(req.url, "http://tv.team/101.json");
        let req = build_request(&ctx("rtmp://tv.team/static/202", "T"), UA).unwrap();
        assert_eq!(req.url, "http://tv.team/202.json");
    }

    #[test]
    fn test_sharaclub_needs_tvg_id() {
        let req = build_request(&ctx("http://a.shara.club/live/s.abc/ch.m3u8#sapp_tvgid=5", "S"), UA).unwrap();
        assert_eq!(req.url, "http://api.shara.club/get/");
        assert_eq!(req.body.as_deref(), Some("type=epg&ch=5"));

        let err = build_request(&ctx("http://a.shara.club/live/s.abc/ch.m3u8", "S"), UA).unwrap_err();
        assert!(matches!(err, ArchiveError::UnsupportedProvider(ProviderId::SharaClub)));
    }

    #[test]
    fn test_hashed_mirror() {
        let req = build_request(&ctx("http://x.crd-s.tv/ch/index.m3u8#sapp_tvgid=abc", "I"), UA).unwrap();
        assert_eq!(req.url, "http://epg.ottp.eu.org/iptvx.one/epg/852579327.json");
    }

    #[test]
    fn test_unsupported_provider() {
        let err = build_request(&ctx("http://x.mymagic.tv/ch/index.m3u8", "M"), UA).unwrap_err();
        assert!(matches!(err, ArchiveError::UnsupportedProvider(ProviderId::Magic)));
    }

    #[test]
    fn test_malformed_path_is_construction_error() {
        let err = build_request(&ctx("http://x.itv.live", "I"), UA).unwrap_err();
        assert!(matches!(err, ArchiveError::RequestConstructionError(_)));
    }
}
