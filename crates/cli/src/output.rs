//! CLI output formatting utilities.
//!
//! Provides consistent formatting for terminal output including colored status
//! messages, per-resource outcome lines and human-readable durations.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use ctlplane_lib::apply::ApplyOutcome;
use ctlplane_lib::pipeline::ApplySummary;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ADD: &str = "+";
  pub const MODIFY: &str = "~";
  pub const REMOVE: &str = "-";
  pub const UNCHANGED: &str = "=";
}

pub fn truncate_hash(hash: &str) -> &str {
  let len = hash.len().min(12);
  &hash[..len]
}

/// Millisecond precision; anything finer is noise for a reconcile.
pub fn format_duration(duration: Duration) -> String {
  let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
  humantime::format_duration(Duration::from_millis(millis)).to_string()
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// One `<symbol> <key> (<outcome>)` line.
pub fn print_outcome(key: &impl std::fmt::Display, outcome: ApplyOutcome) {
  let symbol = match outcome {
    ApplyOutcome::Created => symbols::ADD.if_supports_color(Stream::Stdout, |s| s.green()).to_string(),
    ApplyOutcome::Updated => symbols::MODIFY.if_supports_color(Stream::Stdout, |s| s.yellow()).to_string(),
    ApplyOutcome::Unchanged => symbols::UNCHANGED.if_supports_color(Stream::Stdout, |s| s.dimmed()).to_string(),
  };
  let outcome = format!("({})", outcome);
  println!(
    "  {} {} {}",
    symbol,
    key,
    outcome.if_supports_color(Stream::Stdout, |s| s.dimmed())
  );
}

/// Per-resource lines followed by the totals.
pub fn print_summary(summary: &ApplySummary, verbose: bool) {
  for resource in &summary.resources {
    if verbose || resource.outcome.is_write() {
      print_outcome(&resource.key, resource.outcome);
    }
  }
  print_stat("Created", &summary.created.to_string());
  print_stat("Updated", &summary.updated.to_string());
  print_stat("Unchanged", &summary.unchanged.to_string());
}
