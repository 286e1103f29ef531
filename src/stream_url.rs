//! Structured stream URL used by the request builder and the rewriter
//!
//! Parsing mirrors how set-top playlists write their service paths: the path is
//! kept as raw `/`-separated segments (including the leading empty segment), the
//! query and fragment are kept verbatim and only decoded on lookup, so an
//! untouched URL serializes back byte-for-byte.

use std::fmt;

use url::form_urlencoded;

use crate::error::{ArchiveError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamUrl {
    pub scheme: String,
    pub userinfo: Option<String>,
    pub host: String,
    pub port: Option<u16>,
    /// Path split on `/`; an absolute path starts with an empty segment
    pub segments: Vec<String>,
    pub query: String,
    pub fragment: String,
}

impl StreamUrl {
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| ArchiveError::RequestConstructionError(format!("no scheme in '{}'", url)))?;
        if scheme.is_empty() {
            return Err(ArchiveError::RequestConstructionError(format!("empty scheme in '{}'", url)));
        }

        let (rest, fragment) = match rest.split_once('#') {
            Some((r, f)) => (r, f),
            None => (rest, ""),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((r, q)) => (r, q),
            None => (rest, ""),
        };
        let (netloc, path) = match rest.find('/') {
            Some(pos) => (&rest[..pos], &rest[pos..]),
            None => (rest, ""),
        };

        let (userinfo, host_port) = match netloc.rsplit_once('@') {
            Some((u, hp)) => (Some(u.to_string()), hp),
            None => (None, netloc),
        };
        // Bracketed IPv6 literals keep their colons; the port comes after `]`
        let split = if host_port.starts_with('[') {
            let close = host_port.find(']').ok_or_else(|| {
                ArchiveError::RequestConstructionError(format!("unclosed IPv6 host in '{}'", url))
            })?;
            let (h, tail) = host_port.split_at(close + 1);
            match tail {
                "" => None,
                _ => Some((h, tail.strip_prefix(':').ok_or_else(|| {
                    ArchiveError::RequestConstructionError(format!("junk after IPv6 host '{}'", tail))
                })?)),
            }
        } else {
            host_port.rsplit_once(':')
        };
        let (host, port) = match split {
            Some((h, p)) if !p.is_empty() => {
                let port = p.parse::<u16>().map_err(|_| {
                    ArchiveError::RequestConstructionError(format!("invalid port '{}'", p))
                })?;
                (h, Some(port))
            }
            Some((h, _)) => (h, None),
            None => (host_port, None),
        };

        Ok(Self {
            scheme: scheme.to_string(),
            userinfo,
            host: host.to_string(),
            port,
            segments: path.split('/').map(str::to_string).collect(),
            query: query.to_string(),
            fragment: fragment.to_string(),
        })
    }

    /// Host in lowercase, without userinfo or port
    pub fn hostname(&self) -> String {
        self.host.to_lowercase()
    }

    /// `userinfo@host:port` as written in the URL
    pub fn netloc(&self) -> String {
        let mut out = String::new();
        if let Some(ref u) = self.userinfo {
            out.push_str(u);
            out.push('@');
        }
        out.push_str(&self.host);
        if let Some(port) = self.port {
            out.push(':');
            out.push_str(&port.to_string());
        }
        out
    }

    pub fn path(&self) -> String {
        self.segments.join("/")
    }

    pub fn set_path(&mut self, path: &str) {
        self.segments = path.split('/').map(str::to_string).collect();
    }

    /// Segment lookup with negative indices counting from the end
    pub fn segment(&self, index: isize) -> Result<&str> {
        let len = self.segments.len() as isize;
        let idx = if index < 0 { len + index } else { index };
        if idx < 0 || idx >= len {
            return Err(ArchiveError::RequestConstructionError(format!(
                "path '{}' has no segment {}",
                self.path(),
                index
            )));
        }
        Ok(&self.segments[idx as usize])
    }

    pub fn has_segment(&self, name: &str) -> bool {
        self.segments.iter().any(|s| s == name)
    }

    /// First decoded value of a query parameter; blank values count as absent
    pub fn query_value(&self, key: &str) -> Option<String> {
        lookup(&self.query, key)
    }

    /// Same as `query_value` but empty string when missing
    pub fn query_or_empty(&self, key: &str) -> String {
        self.query_value(key).unwrap_or_default()
    }

    pub fn fragment_value(&self, key: &str) -> Option<String> {
        lookup(&self.fragment, key)
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }
}

fn lookup(encoded: &str, key: &str) -> Option<String> {
    form_urlencoded::parse(encoded.as_bytes())
        .find(|(k, v)| k == key && !v.is_empty())
        .map(|(_, v)| v.into_owned())
}

/// File name without its extension(s), as used for stream ids like `123.m3u8`
pub fn stem(segment: &str) -> &str {
    segment.split('.').next().unwrap_or(segment)
}

impl fmt::Display for StreamUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.netloc())?;
        let path = self.path();
        if !path.is_empty() && !path.starts_with('/') {
            f.write_str("/")?;
        }
        f.write_str(&path)?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}
