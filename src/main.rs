//! Storyreel CLI
//!
//! Command-line interface for the story store and a headless story player:
//! - Seed demo stories
//! - Show the story bar for a viewer
//! - Play stories with real timers, logging every transition
//! - Inspect viewers, toggle likes, purge expired stories

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use storyreel::{
    generate_default_config, Config, LoggingConfig, MediaKind, NewStory, PlayerEvent,
    PlayerOutput, PlayerRuntime, Profile, SqliteStore, StoryBar, StoryPlayer, StoryStore,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "storyreel")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ephemeral story store and headless story player")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database path, overriding the config
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Publish a few demo stories
    Seed,

    /// Show everyone's active stories as seen by a viewer
    Bar {
        /// Viewing user
        viewer: String,
    },

    /// Play stories for a viewer until the player closes
    Play {
        /// Viewing user
        viewer: String,
        /// Start at this user's stories
        #[arg(short, long)]
        user: Option<String>,
        /// Measured length reported for video stories (seconds)
        #[arg(long, default_value = "8")]
        video_secs: u64,
        /// Like every story on entry
        #[arg(long)]
        like: bool,
    },

    /// List who has seen a story
    Viewers {
        story_id: String,
    },

    /// Toggle a like on a story
    Like {
        story_id: String,
        user: String,
    },

    /// Delete stories past their expiry
    Purge,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(db) = &cli.db {
        config.store.database_path = db.to_string_lossy().to_string();
    }

    init_logging(&config.logging);

    if let Commands::Config { output } = &cli.command {
        let content = generate_default_config();
        match output {
            Some(path) => {
                std::fs::write(path, content)
                    .with_context(|| format!("writing config to {:?}", path))?;
                println!("Config written to {:?}", path);
            }
            None => print!("{}", content),
        }
        return Ok(());
    }

    let store = Arc::new(
        SqliteStore::open(config.store.to_store_config())
            .with_context(|| format!("opening {}", config.store.database_path))?,
    );

    match cli.command {
        Commands::Seed => seed(&store).await?,

        Commands::Bar { viewer } => {
            let mut bar = StoryBar::new(store.clone(), viewer);
            let groups = bar.refresh().await?;
            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(groups)?);
            } else if groups.is_empty() {
                println!("No active stories");
            } else {
                for (i, group) in groups.iter().enumerate() {
                    println!("{:>3}  {:<20} {} stories", i, group.display_name, group.len());
                    for story in &group.stories {
                        println!(
                            "       {}  {:<5}  expires {}",
                            story.id,
                            story.media_kind.map(|k| k.as_str()).unwrap_or("-"),
                            story.expires_at.format("%Y-%m-%d %H:%M")
                        );
                    }
                }
            }
        }

        Commands::Play {
            viewer,
            user,
            video_secs,
            like,
        } => {
            let mut bar = StoryBar::new(store.clone(), viewer.clone());
            let groups = bar.refresh().await?.to_vec();
            let start = user.as_deref().and_then(|u| bar.index_of(u)).unwrap_or(0);

            let (player, initial) = StoryPlayer::open(viewer, groups, start, config.playback);
            let (runtime, handle, mut output) = PlayerRuntime::new(store.clone());
            let task = runtime.spawn(player, initial);

            while let Some(event) = output.recv().await {
                match event {
                    PlayerOutput::Entered {
                        user_index,
                        story_index,
                        story,
                    } => {
                        tracing::info!(
                            user_index,
                            story_index,
                            story_id = %story.id,
                            owner = %story.user_id,
                            "Showing story"
                        );
                        if story.is_video() {
                            handle.send(PlayerEvent::MediaDurationLoaded {
                                story_id: story.id.clone(),
                                duration: Duration::from_secs(video_secs),
                            });
                        }
                        if like {
                            handle.send(PlayerEvent::ToggleLike);
                        }
                    }
                    PlayerOutput::Notice(notice) => {
                        tracing::info!(kind = ?notice.kind, "{}", notice.message);
                    }
                    PlayerOutput::Refresh => {
                        bar.refresh().await?;
                    }
                    PlayerOutput::Closed => break,
                }
            }

            task.await?;
            tracing::info!("Player closed");
        }

        Commands::Viewers { story_id } => {
            let viewers = store.fetch_viewers(&story_id).await?;
            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&viewers)?);
            } else if viewers.is_empty() {
                println!("No viewers yet");
            } else {
                for v in viewers {
                    println!(
                        "{:<20} {}  {}",
                        v.profile.display_name,
                        v.viewed_at.format("%Y-%m-%d %H:%M:%S"),
                        if v.liked { "liked" } else { "" }
                    );
                }
            }
        }

        Commands::Like { story_id, user } => {
            let liked = store.toggle_like(&story_id, &user).await?;
            println!("{}", if liked { "liked" } else { "unliked" });
        }

        Commands::Purge => {
            let removed = store.purge_expired(Utc::now()).await?;
            println!("Removed {} expired stories", removed);
        }

        Commands::Config { .. } => {}
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("storyreel={}", logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn seed(store: &SqliteStore) -> anyhow::Result<()> {
    tracing::info!("Seeding demo stories...");

    store
        .upsert_profile(&Profile::new("maya", "Maya Chen").avatar("avatars/maya.png"))
        .await?;
    store
        .upsert_profile(&Profile::new("leo", "Leo Okafor"))
        .await?;
    store
        .upsert_profile(&Profile::new("sam", "Sam Rivera"))
        .await?;

    store
        .publish_story(
            NewStory::text("maya", "Study group in the library, 3rd floor")
                .background("linear-gradient(#4f46e5, #9333ea)"),
        )
        .await?;
    store
        .publish_story(NewStory::media("maya", MediaKind::Image, "media/quad.jpg"))
        .await?;
    store
        .publish_story(NewStory::media("leo", MediaKind::Video, "media/gig.mp4"))
        .await?;
    store
        .publish_story(NewStory::text("sam", "Lost: blue umbrella near the gym").duration(8))
        .await?;

    let count = store.active_stories(Utc::now()).await?.len();
    tracing::info!("{} active stories", count);
    Ok(())
}
