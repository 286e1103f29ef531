//! Archive playback session: the virtual playhead and the actions that move it

use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, Result};
use crate::models::{BroadcastEvent, ChannelContext};
use crate::rewrite::{rewrite, RewriteTiming};

/// Virtual playhead of the archive being watched.
///
/// While running, the position is `start + (now - last_resume)`;
/// `last_resume == 0` means paused and the position is `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionAnchor {
    start: i64,
    duration: i64,
    last_resume: i64,
}

impl SessionAnchor {
    /// Anchor for a freshly selected event
    pub fn select(begin: i64, duration: i64, now: i64) -> Self {
        Self {
            start: begin,
            duration,
            last_resume: now,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.last_resume == 0
    }

    /// Virtual time being watched
    pub fn position(&self, now: i64) -> i64 {
        if self.is_paused() {
            self.start
        } else {
            self.start + now - self.last_resume
        }
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn duration(&self) -> i64 {
        self.duration
    }

    pub fn last_resume(&self) -> i64 {
        self.last_resume
    }

    /// Freeze the playhead. Returns false when already paused.
    pub fn pause(&mut self, now: i64) -> bool {
        if self.is_paused() {
            return false;
        }
        self.start = self.position(now);
        self.last_resume = 0;
        true
    }

    /// Move the playhead by `delta` seconds and restart the clock.
    /// A target at or after `now` is rejected and leaves the anchor unchanged.
    pub fn jump(&mut self, delta: i64, now: i64) -> bool {
        let target = self.position(now) + delta;
        if now <= target {
            return false;
        }
        self.start = target;
        self.last_resume = now;
        true
    }

    /// Fold the elapsed playing time into the start; nothing to do while paused
    pub fn close(&mut self, now: i64) {
        if !self.is_paused() {
            self.start = self.position(now);
            self.last_resume = now;
        }
    }

    /// Timing for a rewrite at the current anchor
    pub fn timing(&self, now: i64) -> RewriteTiming {
        RewriteTiming {
            begin: self.start,
            duration: self.duration,
            now,
            last_timestamp: self.last_resume,
        }
    }
}

/// Numeric remote keys that seek
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekKey {
    BackShort,
    ForwardShort,
    BackMedium,
    ForwardMedium,
    BackLong,
    ForwardLong,
}

impl SeekKey {
    /// Keys 1/3, 4/6 and 7/9
    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            1 => Some(SeekKey::BackShort),
            3 => Some(SeekKey::ForwardShort),
            4 => Some(SeekKey::BackMedium),
            6 => Some(SeekKey::ForwardMedium),
            7 => Some(SeekKey::BackLong),
            9 => Some(SeekKey::ForwardLong),
            _ => None,
        }
    }

    /// Signed step in seconds
    pub fn offset(&self, steps: &SeekSteps) -> i64 {
        match self {
            SeekKey::BackShort => -steps.short,
            SeekKey::ForwardShort => steps.short,
            SeekKey::BackMedium => -steps.medium,
            SeekKey::ForwardMedium => steps.medium,
            SeekKey::BackLong => -steps.long,
            SeekKey::ForwardLong => steps.long,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekSteps {
    pub short: i64,
    pub medium: i64,
    pub long: i64,
}

impl Default for SeekSteps {
    fn default() -> Self {
        Self {
            short: 15,
            medium: 60,
            long: 300,
        }
    }
}

impl From<&ArchiveConfig> for SeekSteps {
    fn from(config: &ArchiveConfig) -> Self {
        Self {
            short: config.seek_short_secs,
            medium: config.seek_medium_secs,
            long: config.seek_long_secs,
        }
    }
}

/// What a pause/resume toggle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PauseOutcome {
    /// Playback should stop
    Paused,
    /// Playback restarts from this URL
    Resumed(String),
    /// The paused position is no longer in the past
    ResumeRejected,
}

/// One archived event being played on one channel
#[derive(Debug, Clone)]
pub struct ArchiveSession {
    ctx: ChannelContext,
    event: BroadcastEvent,
    anchor: SessionAnchor,
    steps: SeekSteps,
    url: String,
}

impl ArchiveSession {
    /// Start playing an event; the playback URL is available via `url()`
    pub fn start(ctx: ChannelContext, event: BroadcastEvent, steps: SeekSteps, now: i64) -> Result<Self> {
        if !event.is_playable() {
            return Err(ArchiveError::RequestConstructionError(format!(
                "event '{}' has no duration",
                event.title
            )));
        }
        let anchor = SessionAnchor::select(event.begin_time, event.duration_secs, now);
        let url = rewrite(&ctx, &anchor.timing(now))?;
        tracing::debug!(
            provider = %ctx.profile.id,
            channel = %ctx.channel_name,
            title = %event.title,
            "archive session started"
        );
        Ok(Self {
            ctx,
            event,
            anchor,
            steps,
            url,
        })
    }

    /// Current playback URL
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn anchor(&self) -> &SessionAnchor {
        &self.anchor
    }

    pub fn event(&self) -> &BroadcastEvent {
        &self.event
    }

    pub fn context(&self) -> &ChannelContext {
        &self.ctx
    }

    /// Seek by a remote key
    pub fn seek_key(&mut self, key: SeekKey, now: i64) -> Result<Option<String>> {
        self.seek(key.offset(&self.steps), now)
    }

    /// Seek by `delta` seconds. `None` when the target would be in the future.
    pub fn seek(&mut self, delta: i64, now: i64) -> Result<Option<String>> {
        let before = self.anchor;
        if !self.anchor.jump(delta, now) {
            tracing::debug!(delta, "seek into the future ignored");
            return Ok(None);
        }
        match rewrite(&self.ctx, &self.anchor.timing(now)) {
            Ok(url) => {
                self.url = url.clone();
                Ok(Some(url))
            }
            Err(e) => {
                self.anchor = before;
                Err(e)
            }
        }
    }

    /// Pause when playing, resume (a zero-length seek) when paused
    pub fn toggle_pause(&mut self, now: i64) -> Result<PauseOutcome> {
        if self.anchor.pause(now) {
            return Ok(PauseOutcome::Paused);
        }
        Ok(match self.seek(0, now)? {
            Some(url) => PauseOutcome::Resumed(url),
            None => PauseOutcome::ResumeRejected,
        })
    }

    /// Seconds into the event at the current playhead
    pub fn elapsed(&self, now: i64) -> i64 {
        self.anchor.position(now) - self.event.begin_time
    }

    /// Seconds left until the event's original end, never negative
    pub fn remaining(&self, now: i64) -> i64 {
        (self.event.end_time() - self.anchor.position(now)).max(0)
    }

    /// The played event with its begin shifted so that wall-clock progress
    /// matches the playhead, for now/next displays
    pub fn now_playing(&self, now: i64) -> BroadcastEvent {
        let mut event = self.event.clone();
        event.begin_time = now - self.elapsed(now);
        event
    }

    /// Second info line: when the event originally aired
    pub fn next_label(&self) -> String {
        self.event.archive_label()
    }

    /// Leave the archive; returns the final anchor
    pub fn close(mut self, now: i64) -> SessionAnchor {
        self.anchor.close(now);
        self.anchor
    }
}
