//! Persistence layer.
//!
//! Saves and loads the ledger snapshot as a JSON file at the end of each run.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use crate::engine::ledger::LedgerSnapshot;

/// Default ledger file path.
pub const DEFAULT_LEDGER_FILE: &str = "punter_ledger.json";

/// Write `snapshot` as pretty JSON.
pub fn save_ledger(snapshot: &LedgerSnapshot, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_LEDGER_FILE);
    let json =
        serde_json::to_string_pretty(snapshot).context("Failed to serialise ledger snapshot")?;

    std::fs::write(path, &json).with_context(|| format!("Failed to write ledger to {path}"))?;

    debug!(
        path,
        placed = snapshot.placed.len(),
        confirmed = snapshot.confirmed.len(),
        "Ledger saved"
    );
    Ok(())
}

/// Load the last saved snapshot. Returns None if there is none yet.
pub fn load_ledger(path: Option<&str>) -> Result<Option<LedgerSnapshot>> {
    let path = path.unwrap_or(DEFAULT_LEDGER_FILE);

    if !Path::new(path).exists() {
        info!(path, "No saved ledger found");
        return Ok(None);
    }

    let json =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read ledger from {path}"))?;
    let snapshot: LedgerSnapshot = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse ledger from {path}"))?;

    info!(
        path,
        saved_at = %snapshot.saved_at,
        bankroll = %snapshot.bankroll.observed,
        placed = snapshot.placed.len(),
        "Ledger loaded from disk"
    );
    Ok(Some(snapshot))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
