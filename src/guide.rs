//! Per-channel archive guide
//!
//! Selecting a channel (or switching the listing mode) starts a new
//! generation. Listings are produced by `ListingJob`s that can run on any
//! thread; a listing from an older generation is dropped on `apply`.

use crate::config::ArchiveConfig;
use crate::epg::{current_timestamp, fake_events, glue_titles, load_archive};
use crate::error::{ArchiveError, Result};
use crate::models::{BroadcastEvent, ChannelContext, ServiceRef};
use crate::session::{ArchiveSession, SeekSteps};

/// What the event list shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuideMode {
    /// Provider feed
    #[default]
    Epg,
    /// Hourly placeholder slots
    FakeEvents,
    /// Provider feed collapsed to one entry per title
    GluedTitles,
}

/// Content of the event list area
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuideStatus {
    Idle,
    Loading,
    Events(Vec<BroadcastEvent>),
    Message {
        title: &'static str,
        description: &'static str,
        retryable: bool,
    },
}

impl GuideStatus {
    fn from_error(error: &ArchiveError) -> Self {
        let (title, description) = error.status();
        GuideStatus::Message {
            title,
            description,
            retryable: error.is_retryable(),
        }
    }
}

/// Finished listing, tagged with the generation that requested it
#[derive(Debug)]
pub struct Listing {
    pub generation: u64,
    pub mode: GuideMode,
    pub result: Result<Vec<BroadcastEvent>>,
}

/// Owned work item for one listing; `run` may block on the network
#[derive(Debug, Clone)]
pub struct ListingJob {
    generation: u64,
    mode: GuideMode,
    ctx: ChannelContext,
    config: ArchiveConfig,
}

impl ListingJob {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn run(self, now: i64) -> Listing {
        let result = match self.mode {
            GuideMode::Epg => load_archive(&self.ctx, &self.config, now),
            GuideMode::FakeEvents => Ok(fake_events(self.ctx.profile.depth_days, now)),
            GuideMode::GluedTitles => load_archive(&self.ctx, &self.config, now).map(|events| glue_titles(&events)),
        };
        Listing {
            generation: self.generation,
            mode: self.mode,
            result,
        }
    }
}

pub struct Guide {
    config: ArchiveConfig,
    generation: u64,
    mode: GuideMode,
    channel: Option<ChannelContext>,
    status: GuideStatus,
}

impl Guide {
    pub fn new(config: ArchiveConfig) -> Self {
        Self {
            config,
            generation: 0,
            mode: GuideMode::default(),
            channel: None,
            status: GuideStatus::Idle,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn mode(&self) -> GuideMode {
        self.mode
    }

    pub fn status(&self) -> &GuideStatus {
        &self.status
    }

    pub fn channel(&self) -> Option<&ChannelContext> {
        self.channel.as_ref()
    }

    /// Switch to a channel. Returns the job for its listing, or `None` when
    /// the channel has no archive (the status then carries the reason).
    pub fn select_channel(&mut self, service: &dyn ServiceRef) -> Option<ListingJob> {
        self.generation += 1;
        match ChannelContext::from_service(service, self.config.companion_config_dir.as_deref()) {
            Ok(ctx) => {
                tracing::debug!(
                    provider = %ctx.profile.id,
                    channel = %ctx.channel_name,
                    depth = ctx.profile.depth_days,
                    "channel selected"
                );
                self.channel = Some(ctx);
                self.job()
            }
            Err(e) => {
                tracing::debug!(channel = %service.name(), error = %e, "channel has no archive");
                self.channel = None;
                self.status = GuideStatus::from_error(&e);
                None
            }
        }
    }

    /// Change the listing mode for the current channel
    pub fn set_mode(&mut self, mode: GuideMode) -> Option<ListingJob> {
        self.mode = mode;
        self.generation += 1;
        self.job()
    }

    /// Job for the current channel and mode; used again for a manual retry
    pub fn job(&mut self) -> Option<ListingJob> {
        let ctx = self.channel.clone()?;
        self.status = GuideStatus::Loading;
        Some(ListingJob {
            generation: self.generation,
            mode: self.mode,
            ctx,
            config: self.config.clone(),
        })
    }

    /// Show a finished listing. Listings from an older generation are
    /// dropped and `false` is returned.
    pub fn apply(&mut self, listing: Listing) -> bool {
        if listing.generation != self.generation || listing.mode != self.mode {
            tracing::debug!(
                stale = listing.generation,
                current = self.generation,
                "dropping stale listing"
            );
            return false;
        }
        self.status = match listing.result {
            Ok(events) => GuideStatus::Events(events),
            Err(e) => GuideStatus::from_error(&e),
        };
        true
    }

    /// Run the current job on this thread and apply it
    pub fn refresh(&mut self) -> &GuideStatus {
        if let Some(job) = self.job() {
            let listing = job.run(current_timestamp());
            self.apply(listing);
        }
        &self.status
    }

    /// Start playing one of the listed events
    pub fn play(&self, event: &BroadcastEvent, now: i64) -> Result<ArchiveSession> {
        let ctx = self.channel.clone().ok_or(ArchiveError::NotIptvChannel)?;
        ArchiveSession::start(ctx, event.clone(), SeekSteps::from(&self.config), now)
    }
}
