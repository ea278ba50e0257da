use std::time::Instant;

use anyhow::{Context, Result};

use ctlplane_lib::gc::collect_orphans;

use super::{open_store, runtime};
use crate::GlobalPaths;
use crate::output::{self, OutputFormat, format_duration, print_info, print_json, print_stat, print_success};

pub fn cmd_gc(dry_run: bool, paths: &GlobalPaths, output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  let store = open_store(paths);

  let rt = runtime()?;
  let result = rt
    .block_on(collect_orphans(&store, dry_run))
    .context("Orphan collection failed")?;

  if output.is_json() {
    print_json(&result)?;
  } else {
    println!();
    if dry_run {
      print_info("Dry run - no changes made");
    } else {
      print_success("Orphan collection complete!");
    }
    for key in &result.deleted {
      println!("  {} {}", output::symbols::REMOVE, key);
    }
    print_stat("Objects scanned", &result.stats.scanned.to_string());
    print_stat("Owned objects", &result.stats.owned.to_string());
    print_stat(
      if dry_run { "Would remove" } else { "Orphans removed" },
      &result.stats.deleted.to_string(),
    );
    print_stat("Duration", &format_duration(start.elapsed()));
  }

  Ok(())
}
