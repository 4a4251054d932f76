//! `feedback`: take the restaurant survey and claim the review prize from the
//! terminal.
//!
//! # Usage
//!
//! ```text
//! feedback survey --name Maria --phone "(11) 99999-0000" --channel Google \
//!   --rating 5 --service Excellent --speed "Very fast" --food Perfect
//! feedback prize review --phone 11999990000
//! feedback prize claim --phone 11999990000
//! feedback --url http://localhost:8080 metrics
//! feedback responses
//! ```

mod app;
mod client;
mod timer;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use app::{App, key_for, render_metrics, render_responses};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use client::HttpStore;
use feedback_core::survey::{
  DiscoveryChannel, FoodQuality, PrepSpeed, Respondent, ServiceQuality, SurveyAnswers,
};
use rand::{SeedableRng, rngs::StdRng};
use serde::Deserialize;
use timer::FileTimerCache;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "feedback", about = "Restaurant feedback survey and review prize")]
struct Cli {
  /// Path to a TOML config file (url, timer_cache, review_link).
  #[arg(short, long, value_name = "FILE", global = true)]
  config: Option<PathBuf>,

  /// Base URL of the feedback server (default: http://localhost:8080).
  #[arg(long, env = "FEEDBACK_URL", global = true)]
  url: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Answer the survey.
  Survey(SurveyArgs),
  /// Review the restaurant and claim your prize.
  #[command(subcommand)]
  Prize(PrizeCommand),
  /// Show the dashboard aggregates.
  Metrics,
  /// List every response with the prize its respondent won.
  Responses,
}

#[derive(Args, Debug)]
struct SurveyArgs {
  #[arg(long)]
  name:        String,
  /// Mobile number, e.g. "(11) 91234-5678".
  #[arg(long)]
  phone:       String,
  /// Google, In-person, Delivery-driven, Instagram or Influencer.
  #[arg(long)]
  channel:     DiscoveryChannel,
  /// Which influencer; required with `--channel Influencer`.
  #[arg(long)]
  influencer:  Option<String>,
  /// Overall rating, 1 to 5 stars.
  #[arg(long)]
  rating:      u8,
  /// Excellent, Good, Regular or Poor.
  #[arg(long)]
  service:     ServiceQuality,
  /// "Very fast", "As expected" or Slow.
  #[arg(long)]
  speed:       PrepSpeed,
  /// Perfect, Good or "Could improve".
  #[arg(long)]
  food:        FoodQuality,
  /// What could be better; required with `--food "Could improve"`.
  #[arg(long)]
  improvement: Option<String>,
  #[arg(long)]
  suggestion:  Option<String>,
}

#[derive(Subcommand, Debug)]
enum PrizeCommand {
  /// Show where you are in the review → wait → claim sequence.
  Status {
    #[arg(long)]
    phone: String,
  },
  /// Confirm you left a review and start the countdown.
  Review {
    #[arg(long)]
    phone: String,
  },
  /// Claim the prize and spin the wheel.
  Claim {
    #[arg(long)]
    phone: String,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:         String,
  timer_cache: Option<PathBuf>,
  review_link: Option<String>,
}

fn default_timer_cache() -> PathBuf {
  match std::env::var_os("HOME") {
    Some(home) => PathBuf::from(home).join(".local/share/feedback/timers.toml"),
    None => PathBuf::from("feedback-timers.toml"),
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  // Logs go to stderr so command output stays clean.
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let file_cfg: ConfigFile = if let Some(path) = &cli.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let base_url = cli
    .url
    .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
    .unwrap_or_else(|| "http://localhost:8080".to_string());

  let store = Arc::new(HttpStore::new(base_url)?);
  let app = App::new(store.clone()).with_review_link(file_cfg.review_link);

  let output = match cli.command {
    Command::Survey(args) => {
      let respondent = Respondent::new(args.name, args.phone);
      let answers = SurveyAnswers {
        discovery_channel: args.channel,
        influencer_name:   args.influencer,
        overall_rating:    args.rating,
        service:           args.service,
        speed:             args.speed,
        food:              args.food,
        food_improvement:  args.improvement,
        suggestion:        args.suggestion,
      };
      app.survey(&respondent, &answers).await?
    }
    Command::Prize(cmd) => {
      let catalog = store.catalog().await.context("fetching the prize catalog")?;
      let app = app.with_catalog(catalog);
      let timer_path = file_cfg.timer_cache.unwrap_or_else(default_timer_cache);
      let mut timers = FileTimerCache::load(timer_path)?;
      let now = Utc::now();

      match cmd {
        PrizeCommand::Status { phone } => {
          app.prize_status(&key_for(&phone)?, &timers, now).await?
        }
        PrizeCommand::Review { phone } => {
          let out = app.prize_review(&key_for(&phone)?, &mut timers, now).await?;
          timers.save()?;
          tracing::debug!(path = %timers.path().display(), "review timer saved");
          out
        }
        PrizeCommand::Claim { phone } => {
          let mut rng = StdRng::from_entropy();
          app
            .prize_claim(&key_for(&phone)?, &timers, now, &mut rng)
            .await?
        }
      }
    }
    Command::Metrics => {
      let metrics = store.metrics().await.context("fetching metrics")?;
      render_metrics(&metrics)
    }
    Command::Responses => render_responses(&app.responses().await?),
  };

  println!("{}", output.trim_end());
  Ok(())
}
