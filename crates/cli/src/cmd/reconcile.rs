//! Implementation of the `ctlplane reconcile` command.
//!
//! Runs one reconciliation of a parent. Retryable failures (store contention,
//! exhausted conflict retries) are retried here with exponential backoff;
//! terminal failures such as a broken template are reported immediately.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::warn;

use ctlplane_lib::controller::{
  ControlPlaneReconciler, OpenStackClientReconciler, ReconcileError, ReconcileOutcome, ReconcilerConfig,
};
use ctlplane_lib::parent::ParentKey;

use super::{ParentKind, open_store, runtime};
use crate::GlobalPaths;
use crate::output::{
  OutputFormat, format_duration, print_error, print_info, print_json, print_stat, print_success, print_summary,
  print_warning, truncate_hash,
};

const MAX_BACKOFF: Duration = Duration::from_secs(30);

async fn with_backoff<F, Fut>(
  key: &ParentKey,
  retries: u32,
  backoff: Duration,
  mut attempt: F,
) -> Result<ReconcileOutcome, ReconcileError>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<ReconcileOutcome, ReconcileError>>,
{
  let mut delay = backoff;
  let mut attempts = 0;

  loop {
    match attempt().await {
      Ok(outcome) => return Ok(outcome),
      Err(e) if e.is_retryable() && attempts < retries => {
        attempts += 1;
        warn!(parent = %key, attempt = attempts, delay = ?delay, error = %e, "reconcile failed, retrying");
        print_warning(&format!(
          "{} (retry {}/{} in {})",
          e,
          attempts,
          retries,
          format_duration(delay)
        ));
        tokio::time::sleep(delay).await;
        delay = delay.saturating_mul(2).min(MAX_BACKOFF);
      }
      Err(e) => return Err(e),
    }
  }
}

pub fn cmd_reconcile(
  key: &ParentKey,
  kind: ParentKind,
  retries: u32,
  backoff: Duration,
  paths: &GlobalPaths,
  output: OutputFormat,
) -> Result<()> {
  let start = Instant::now();
  let store = Arc::new(open_store(paths));
  let config = ReconcilerConfig::new(&paths.templates);

  let rt = runtime()?;
  let result = rt.block_on(async {
    match kind {
      ParentKind::ControlPlane => {
        let reconciler = ControlPlaneReconciler::new(store, config);
        with_backoff(key, retries, backoff, || reconciler.reconcile(key)).await
      }
      ParentKind::OpenStackClient => {
        let reconciler = OpenStackClientReconciler::new(store, config.apply);
        with_backoff(key, retries, backoff, || reconciler.reconcile(key)).await
      }
    }
  });

  let outcome = match result {
    Ok(outcome) => outcome,
    Err(e) => {
      if let Some(applied) = e.applied()
        && !applied.resources.is_empty()
      {
        print_error(&format!("Stopped after applying {} resource(s)", applied.resources.len()));
      }
      return Err(e).with_context(|| format!("Failed to reconcile {} {}", kind.kind(), key));
    }
  };

  if output.is_json() {
    return print_json(&outcome);
  }

  if !outcome.parent_found {
    print_info(&format!("{} {} not found, nothing to do", kind.kind(), key));
    return Ok(());
  }

  print_success(&format!("Reconciled {} {}", kind.kind(), key));
  print_summary(&outcome.summary, true);
  if let Some(hash) = &outcome.spec_hash {
    print_stat("Spec hash", truncate_hash(&hash.0));
  }
  print_stat("Duration", &format_duration(start.elapsed()));

  Ok(())
}
