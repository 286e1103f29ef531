//! EPG archive feed parser
//! Turns provider XML/JSON feeds into newest-first `BroadcastEvent` lists

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde_json::Value;

use crate::error::{ArchiveError, EmptyReason, Result};
use crate::models::BroadcastEvent;
use crate::provider::FeedFormat;

const SECONDS_PER_DAY: i64 = 86400;

/// Parse a decoded feed body.
///
/// Returns `EmptyResult` when nothing is left to show, distinguishing a feed
/// without events from one whose events all fell outside the archive window.
pub fn parse_feed(format: FeedFormat, raw: &[u8], depth_days: u32, now: i64) -> Result<Vec<BroadcastEvent>> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| ArchiveError::FeedParseError(format!("feed is not UTF-8: {}", e)))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let (total, mut events) = match format {
        FeedFormat::XmlShura => {
            let events = parse_shura_xml(text)?;
            (events.len(), events)
        }
        FeedFormat::JsonItv => parse_itv_json(text, now)?,
        FeedFormat::JsonGeneric | FeedFormat::JsonHashedId => parse_generic_json(text, depth_days, now)?,
        FeedFormat::None => return Err(ArchiveError::FeedParseError("provider has no feed format".into())),
    };

    events.retain(BroadcastEvent::is_playable);

    if events.is_empty() {
        let reason = if total == 0 { EmptyReason::NoEvents } else { EmptyReason::OutsideWindow };
        return Err(ArchiveError::EmptyResult(reason));
    }

    // Newest first; the sort is stable so equal begin times keep feed order
    events.sort_by(|a, b| b.begin_time.cmp(&a.begin_time));
    Ok(events)
}

/// Parser state
#[derive(Debug, Clone, Copy, PartialEq)]
enum ParserState {
    Root,
    Event,
    Name,
    Text,
    StartTime,
    Duration,
}

#[derive(Default)]
struct PendingEvent {
    id: Option<u32>,
    name: String,
    text: String,
    start_time: Option<String>,
    duration: Option<String>,
}

/// `<event id="..">` elements with `name`, `text`, `start_time`, `duration` children
fn parse_shura_xml(xml: &str) -> Result<Vec<BroadcastEvent>> {
    let sanitized = sanitize_xml(xml);
    let mut reader = Reader::from_str(&sanitized);
    // Text is split around entity references, so whitespace is trimmed per field instead
    reader.config_mut().trim_text(false);

    let mut events = Vec::new();
    let mut state = ParserState::Root;
    let mut current: Option<PendingEvent> = None;
    let mut text_buf = String::new();
    let mut saw_element = false;

    loop {
        let position = reader.buffer_position();
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                saw_element = true;
                match e.name().as_ref() {
                    b"event" => {
                        state = ParserState::Event;
                        current = Some(PendingEvent {
                            id: get_attribute(e, b"id").and_then(|s| s.trim().parse().ok()),
                            ..PendingEvent::default()
                        });
                    }
                    b"name" if state == ParserState::Event => {
                        state = ParserState::Name;
                        text_buf.clear();
                    }
                    b"text" if state == ParserState::Event => {
                        state = ParserState::Text;
                        text_buf.clear();
                    }
                    b"start_time" if state == ParserState::Event => {
                        state = ParserState::StartTime;
                        text_buf.clear();
                    }
                    b"duration" if state == ParserState::Event => {
                        state = ParserState::Duration;
                        text_buf.clear();
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => {
                saw_element = true;
                if e.name().as_ref() == b"event" {
                    return Err(ArchiveError::FeedParseError("empty <event/> element".into()));
                }
            }
            Ok(Event::Text(e)) => {
                if state != ParserState::Root && state != ParserState::Event {
                    text_buf.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::CData(e)) => {
                if state != ParserState::Root && state != ParserState::Event {
                    text_buf.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if state != ParserState::Root && state != ParserState::Event {
                    let name = String::from_utf8_lossy(e.as_ref()).to_string();
                    text_buf.push_str(&decode_xml_entities(&format!("&{};", name)));
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.name();
                if name.as_ref() == b"event" {
                    if let Some(pending) = current.take() {
                        events.push(finish_shura_event(pending)?);
                    }
                    state = ParserState::Root;
                } else if let Some(ev) = current.as_mut() {
                    let field = text_buf.trim().to_string();
                    match (name.as_ref(), state) {
                        (b"name", ParserState::Name) => ev.name = field,
                        (b"text", ParserState::Text) => ev.text = field,
                        (b"start_time", ParserState::StartTime) => ev.start_time = Some(field),
                        (b"duration", ParserState::Duration) => ev.duration = Some(field),
                        _ => continue,
                    }
                    state = ParserState::Event;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ArchiveError::FeedParseError(format!(
                    "XML error at byte {}: {}",
                    position, e
                )));
            }
            _ => {}
        }
    }

    if !saw_element {
        return Err(ArchiveError::FeedParseError("no XML element found".into()));
    }
    Ok(events)
}

fn finish_shura_event(pending: PendingEvent) -> Result<BroadcastEvent> {
    let begin = parse_int_field(pending.start_time.as_deref(), "start_time")?;
    let duration = parse_int_field(pending.duration.as_deref(), "duration")?;
    Ok(BroadcastEvent::new(
        decode_xml_entities(&pending.text),
        pending.id,
        begin,
        duration.max(0),
        decode_xml_entities(&pending.name),
    ))
}

fn parse_int_field(value: Option<&str>, field: &str) -> Result<i64> {
    value
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| ArchiveError::FeedParseError(format!("event without numeric {}", field)))
}

/// `{"res": [{"startTime", "stopTime", "title", "desc"}]}`; only already started events
fn parse_itv_json(text: &str, now: i64) -> Result<(usize, Vec<BroadcastEvent>)> {
    let root: Value = serde_json::from_str(text)
        .map_err(|e| ArchiveError::FeedParseError(format!("JSON: {}", e)))?;
    let obj = root
        .as_object()
        .ok_or_else(|| ArchiveError::FeedParseError("itv feed is not an object".into()))?;
    let list = match obj.get("res") {
        Some(Value::Null) => return Ok((0, Vec::new())),
        Some(Value::Array(list)) => list,
        _ => return Err(ArchiveError::FeedParseError("itv feed without 'res' list".into())),
    };

    let mut events = Vec::new();
    for item in list {
        let begin = json_timestamp(item, "startTime")?;
        let stop = json_timestamp(item, "stopTime")?;
        if begin < now {
            events.push(BroadcastEvent::new(
                decode_xml_entities(&json_text(item, "desc")),
                None,
                begin,
                event_span(begin, stop)?,
                decode_xml_entities(&json_text(item, "title")),
            ));
        }
    }
    Ok((list.len(), events))
}

/// `{"epg_data": [...]}` or a bare list of `{"time", "time_to", "name", "descr"}`;
/// keeps events strictly inside `(now - depth, now)`
fn parse_generic_json(text: &str, depth_days: u32, now: i64) -> Result<(usize, Vec<BroadcastEvent>)> {
    let root: Value = serde_json::from_str(text)
        .map_err(|e| ArchiveError::FeedParseError(format!("JSON: {}", e)))?;
    let list = match root {
        Value::Object(mut obj) if obj.contains_key("epg_data") => obj.remove("epg_data").unwrap_or(Value::Null),
        other => other,
    };
    let list = match list {
        Value::Null => return Ok((0, Vec::new())),
        Value::Array(list) => list,
        _ => return Err(ArchiveError::FeedParseError("feed is not an event list".into())),
    };

    let window_start = now - i64::from(depth_days) * SECONDS_PER_DAY;
    let mut events = Vec::new();
    for item in &list {
        let begin = json_timestamp(item, "time")?;
        let end = json_timestamp(item, "time_to")?;
        if window_start < begin && begin < now {
            events.push(BroadcastEvent::new(
                decode_xml_entities(&json_text(item, "descr")),
                None,
                begin,
                event_span(begin, end)?,
                decode_xml_entities(&json_text(item, "name")),
            ));
        }
    }
    Ok((list.len(), events))
}

/// Duration between two feed timestamps; negative spans count as zero
fn event_span(begin: i64, end: i64) -> Result<i64> {
    end.checked_sub(begin)
        .map(|d| d.max(0))
        .ok_or_else(|| ArchiveError::FeedParseError(format!("event times {}..{} out of range", begin, end)))
}

/// Timestamps arrive as numbers or numeric strings depending on the provider
fn json_timestamp(item: &Value, key: &str) -> Result<i64> {
    let value = item
        .get(key)
        .ok_or_else(|| ArchiveError::FeedParseError(format!("event without '{}'", key)))?;
    let ts = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    ts.ok_or_else(|| ArchiveError::FeedParseError(format!("'{}' is not a timestamp", key)))
}

fn json_text(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Filter illegal XML 1.0 control characters and escape bare ampersands.
/// Legal XML 1.0: #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
fn sanitize_xml(xml: &str) -> String {
    let bytes = xml.as_bytes();
    let mut out = String::with_capacity(xml.len() + 64);

    for (i, c) in xml.char_indices() {
        match c {
            '\t' | '\n' | '\r' => out.push(c),
            '\u{0}'..='\u{1f}' | '\u{7f}' => out.push(' '),
            '&' if !is_valid_entity_start(&bytes[i..]) => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
    out
}

/// Check if bytes starting with & look like a valid XML entity
fn is_valid_entity_start(bytes: &[u8]) -> bool {
    if bytes.len() < 2 {
        return false;
    }

    // Numeric entity &#
    if bytes[1] == b'#' {
        return true;
    }

    // Named entities - look for pattern &name;
    let mut end = 1;
    while end < bytes.len() && end < 10 {
        match bytes[end] {
            b';' => return end > 1,
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' => end += 1,
            _ => return false,
        }
    }

    false
}

/// Decode XML entities back to normal characters.
/// Feeds over-escape titles (`&amp;#91;` for `[`), so this also runs on text
/// the XML reader already unescaped once, and on JSON strings.
pub fn decode_xml_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(start) = rest.find('&') {
        result.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail
            .find(';')
            .filter(|&end| end <= 12)
            .and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                result.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                result.push('&');
                rest = &tail[1..];
            }
        }
    }
    result.push_str(rest);
    result
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = if let Some(hex) = num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                num.parse::<u32>().ok()?
            };
            char::from_u32(code)
        }
    }
}

/// Get attribute value from XML element
fn get_attribute(e: &BytesStart, name: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == name {
            let raw = String::from_utf8(attr.value.as_ref().to_vec()).ok()?;
            return Some(decode_xml_entities(&raw));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;
    const DAY: i64 = 86400;

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_xml_entities("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(decode_xml_entities("&#91;HD&#93; &#124; &apos;x&apos; &quot;y&quot;"), "[HD] | 'x' \"y\"");
        assert_eq!(decode_xml_entities("&#x41;"), "A");
        assert_eq!(decode_xml_entities("a & b; c"), "a & b; c");
        assert_eq!(decode_xml_entities("&unknown;"), "&unknown;");
    }

    #[test]
    fn test_sanitize_bare_ampersand() {
        assert_eq!(sanitize_xml("<a>R&D &amp; x\u{1}</a>"), "<a>R&amp;D &amp; x </a>");
    }

    #[test]
    fn test_shura_xml_keeps_all_events() {
        let xml = format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<events>
  <event id="11"><name>Old &amp;#91;12+&amp;#93;</name><text>Long ago</text><start_time>{}</start_time><duration>1800</duration></event>
  <event id="12"><name>News &amp; Weather</name><text></text><start_time>{}</start_time><duration>600</duration></event>
  <event id="13"><name>Live</name><text>now</text><start_time>{}</start_time><duration>0</duration></event>
</events>"#,
            NOW - 30 * DAY,
            NOW - 3600,
            NOW
        );
        let events = parse_feed(FeedFormat::XmlShura, xml.as_bytes(), 7, NOW).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_id, 12);
        assert_eq!(events[0].title, "News & Weather");
        assert_eq!(events[0].display_description(), "Description not available");
        assert_eq!(events[1].title, "Old [12+]");
        assert_eq!(events[1].begin_time, NOW - 30 * DAY);
        assert_eq!(events[1].duration_secs, 1800);
    }

    #[test]
    fn test_shura_xml_missing_start_is_parse_error() {
        let xml = "<events><event id=\"1\"><name>x</name><duration>5</duration></event></events>";
        let err = parse_feed(FeedFormat::XmlShura, xml.as_bytes(), 7, NOW).unwrap_err();
        assert!(matches!(err, ArchiveError::FeedParseError(_)));
    }

    #[test]
    fn test_html_error_page_is_parse_error() {
        let html = "<html><head><meta charset=utf-8></head><body>502 Bad Gateway</body></html>";
        let err = parse_feed(FeedFormat::XmlShura, html.as_bytes(), 7, NOW).unwrap_err();
        assert!(matches!(err, ArchiveError::FeedParseError(_)));
        let err = parse_feed(FeedFormat::JsonGeneric, html.as_bytes(), 7, NOW).unwrap_err();
        assert!(matches!(err, ArchiveError::FeedParseError(_)));
    }

    #[test]
    fn test_empty_xml_feed() {
        let err = parse_feed(FeedFormat::XmlShura, b"<events></events>", 7, NOW).unwrap_err();
        assert!(matches!(err, ArchiveError::EmptyResult(EmptyReason::NoEvents)));
    }

    #[test]
    fn test_generic_json_window() {
        // 3 in window, 2 outside (too old, in the future)
        let body = format!(
            r#"{{"epg_data":[
                {{"time":"{}","time_to":"{}","name":"A","descr":"a"}},
                {{"time":{},"time_to":{},"name":"B","descr":"b"}},
                {{"time":"{}","time_to":"{}","name":"Old","descr":""}},
                {{"time":"{}","time_to":"{}","name":"C","descr":"c"}},
                {{"time":"{}","time_to":"{}","name":"Future","descr":""}}
            ]}}"#,
            NOW - 2 * DAY, NOW - 2 * DAY + 600,
            NOW - 100, NOW + 500,
            NOW - 4 * DAY, NOW - 4 * DAY + 600,
            NOW - DAY, NOW - DAY + 60,
            NOW + 60, NOW + 600,
        );
        let events = parse_feed(FeedFormat::JsonGeneric, body.as_bytes(), 3, NOW).unwrap();
        let titles: Vec<&str> = events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "C", "A"]);
        assert_eq!(events[0].duration_secs, 600);
    }

    #[test]
    fn test_generic_json_window_bounds_are_exclusive() {
        let body = format!(
            r#"[{{"time":{},"time_to":{},"name":"Edge","descr":""}},{{"time":{},"time_to":{},"name":"Now","descr":""}}]"#,
            NOW - DAY, NOW - DAY + 60, NOW, NOW + 60
        );
        let err = parse_feed(FeedFormat::JsonHashedId, body.as_bytes(), 1, NOW).unwrap_err();
        assert!(matches!(err, ArchiveError::EmptyResult(EmptyReason::OutsideWindow)));
    }

    #[test]
    fn test_generic_json_null_and_empty() {
        for body in ["null", "[]", r#"{"epg_data": null}"#, r#"{"epg_data": []}"#] {
            let err = parse_feed(FeedFormat::JsonGeneric, body.as_bytes(), 3, NOW).unwrap_err();
            assert!(matches!(err, ArchiveError::EmptyResult(EmptyReason::NoEvents)), "{}", body);
        }
    }

    #[test]
    fn test_generic_json_object_without_list() {
        let err = parse_feed(FeedFormat::JsonGeneric, br#"{"error":"denied"}"#, 3, NOW).unwrap_err();
        assert!(matches!(err, ArchiveError::FeedParseError(_)));
    }

    #[test]
    fn test_itv_json_past_only() {
        let body = format!(
            r#"{{"res":[
                {{"startTime":"{}","stopTime":"{}","title":"Past","desc":"d"}},
                {{"startTime":"{}","stopTime":"{}","title":"Running","desc":""}},
                {{"startTime":"{}","stopTime":"{}","title":"Next","desc":""}}
            ]}}"#,
            NOW - 10 * DAY, NOW - 10 * DAY + 1200,
            NOW - 60, NOW + 1740,
            NOW + 1740, NOW + 3600,
        );
        let events = parse_feed(FeedFormat::JsonItv, body.as_bytes(), 3, NOW).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].title, "Running");
        assert_eq!(events[0].duration_secs, 1800);
        // itv ignores the depth window
        assert_eq!(events[1].title, "Past");
    }

    #[test]
    fn test_itv_without_res_is_parse_error() {
        let err = parse_feed(FeedFormat::JsonItv, br#"{"status":"fail"}"#, 3, NOW).unwrap_err();
        assert!(matches!(err, ArchiveError::FeedParseError(_)));
    }

    #[test]
    fn test_extreme_times_are_parse_errors() {
        let body = format!(
            r#"[{{"time":{},"time_to":-9223372036854775808,"name":"X","descr":""}}]"#,
            NOW - 100
        );
        let err = parse_feed(FeedFormat::JsonGeneric, body.as_bytes(), 3, NOW).unwrap_err();
        assert!(matches!(err, ArchiveError::FeedParseError(_)));

        let body = format!(
            r#"{{"res":[{{"startTime":{},"stopTime":9223372036854775807,"title":"X","desc":""}}]}}"#,
            -NOW
        );
        let err = parse_feed(FeedFormat::JsonItv, body.as_bytes(), 3, NOW).unwrap_err();
        assert!(matches!(err, ArchiveError::FeedParseError(_)));
    }

    #[test]
    fn test_nbsp_is_non_breaking() {
        assert_eq!(decode_xml_entities("a&nbsp;b"), "a\u{a0}b");
    }

    #[test]
    fn test_non_utf8_is_parse_error() {
        let err = parse_feed(FeedFormat::JsonGeneric, &[0xff, 0xfe, 0x00], 3, NOW).unwrap_err();
        assert!(matches!(err, ArchiveError::FeedParseError(_)));
    }
}
