//! IPTV Archive - command line front end
//! Inspect provider detection, EPG archive requests and catch-up URLs

// Use mimalloc for faster memory allocation (Linux, macOS)
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use iptv_archive::epg::{build_request, current_timestamp, fake_events, glue_titles, load_archive};
use iptv_archive::{
    classify, logging, rewrite, ArchiveConfig, ArchiveError, BroadcastEvent, ChannelContext, Result,
    RewriteTiming, Service,
};

#[derive(Parser, Debug)]
#[command(name = "iptv-archive", version, about = "Catch-up archive tools for IPTV playlists")]
struct Args {
    /// Write a debug log to the temp directory
    #[arg(long, global = true)]
    debug: bool,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show provider and archive depth for a live URL
    Classify { url: String },

    /// Show the EPG archive request for a live URL
    Request {
        url: String,
        #[arg(long, default_value = "")]
        name: String,
    },

    /// List archived broadcasts for a live URL
    Archive {
        url: String,
        #[arg(long, default_value = "")]
        name: String,
        /// Hourly placeholder slots instead of the provider feed
        #[arg(long)]
        fake: bool,
        /// One entry per title
        #[arg(long, conflicts_with = "fake")]
        glue: bool,
    },

    /// Rewrite a live URL into a catch-up URL
    Rewrite {
        url: String,
        /// Archive position (unix time)
        #[arg(long)]
        begin: i64,
        /// Event duration in seconds
        #[arg(long)]
        duration: i64,
        #[arg(long, default_value = "")]
        name: String,
        /// Reference time, defaults to the current time
        #[arg(long)]
        now: Option<i64>,
    },
}

fn main() {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ArchiveConfig::load_from(path),
        None => ArchiveConfig::load(),
    };
    config.debug |= args.debug;
    let _guard = logging::init(config.debug);

    if let Err(e) = run(args.command, &config) {
        let (title, description) = e.status();
        tracing::warn!(error = %e, "command failed");
        eprintln!("{}: {}", title, description);
        if config.debug {
            eprintln!("  {}", e);
        }
        process::exit(1);
    }
}

fn run(command: Commands, config: &ArchiveConfig) -> Result<()> {
    match command {
        Commands::Classify { url } => {
            let result = classify(&url);
            match result.provider {
                Some(provider) => println!("{} ({} days)", provider, result.depth_days),
                None => return Err(ArchiveError::UnknownProvider),
            }
        }
        Commands::Request { url, name } => {
            let ctx = context(&url, &name, config)?;
            let request = build_request(&ctx, &config.user_agent)?;
            println!("{:?} {}", request.method, request.url);
            for (header, value) in &request.headers {
                println!("{}: {}", header, value);
            }
            if let Some(body) = &request.body {
                println!();
                println!("{}", body);
            }
        }
        Commands::Archive { url, name, fake, glue } => {
            let ctx = context(&url, &name, config)?;
            let now = current_timestamp();
            let events = if fake {
                fake_events(ctx.profile.depth_days, now)
            } else if glue {
                glue_titles(&load_archive(&ctx, config, now)?)
            } else {
                load_archive(&ctx, config, now)?
            };
            for event in &events {
                print_event(event);
            }
        }
        Commands::Rewrite { url, begin, duration, name, now } => {
            let ctx = context(&url, &name, config)?;
            let now = now.unwrap_or_else(current_timestamp);
            let timing = RewriteTiming {
                begin,
                duration,
                now,
                last_timestamp: now,
            };
            println!("{}", rewrite(&ctx, &timing)?);
        }
    }
    Ok(())
}

fn context(url: &str, name: &str, config: &ArchiveConfig) -> Result<ChannelContext> {
    ChannelContext::from_service(&Service::new(url, name), config.companion_config_dir.as_deref())
}

fn print_event(event: &BroadcastEvent) {
    println!(
        "{}  {:>5} min  {}",
        event.begin_label(),
        event.duration_secs / 60,
        event.title
    );
    println!("    {}", event.display_description());
}
