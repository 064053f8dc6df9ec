//! Symbolic snapshot reference resolution
//!
//! A ref is resolved against the engine's snapshot listing (ordered oldest
//! to newest) with a fixed precedence:
//!
//! 1. A string that looks like a literal engine identifier (8-64 hex
//!    digits) is returned verbatim.
//! 2. `latest` / `HEAD` resolve to the newest snapshot.
//! 3. `HEAD~N` resolves to the snapshot N positions before the newest.
//! 4. Anything else is treated as a tag; the newest snapshot carrying it
//!    wins.
//! 5. Unmatched input is returned unchanged and left for the engine to
//!    reject.
//!
//! Known caveat: a tag that happens to consist of 8-64 hex digits is
//! shadowed by rule 1 and can never be reached by tag lookup. This
//! resolution order is deliberate and must not be reordered.

use crate::error::{Error, Result};
use crate::model::EngineSnapshot;

/// Heuristic for a literal engine identifier: restic-style hex token,
/// short (8 char) or full (64 char) form and anything in between.
fn looks_like_snapshot_id(reference: &str) -> bool {
    (8..=64).contains(&reference.len()) && reference.chars().all(|c| c.is_ascii_hexdigit())
}

/// Resolve a symbolic reference to a concrete snapshot identifier.
///
/// `listing` is the engine's snapshot listing ordered oldest to newest.
pub fn resolve(reference: &str, listing: &[EngineSnapshot]) -> Result<String> {
    // Rule 1: literal identifier heuristic
    if looks_like_snapshot_id(reference) {
        return Ok(reference.to_string());
    }

    // Rule 2: newest snapshot
    if reference == "latest" || reference == "HEAD" {
        return listing
            .last()
            .map(|s| s.id.clone())
            .ok_or_else(|| Error::reference(reference, "no snapshots exist"));
    }

    // Rule 3: HEAD~N
    if let Some(offset_str) = reference.strip_prefix("HEAD~") {
        let offset: usize = offset_str
            .parse()
            .map_err(|_| Error::reference(reference, "offset is not a non-negative integer"))?;
        if offset >= listing.len() {
            return Err(Error::reference(
                reference,
                format!("only {} snapshots exist", listing.len()),
            ));
        }
        return Ok(listing[listing.len() - 1 - offset].id.clone());
    }

    // Rule 4: tag lookup, newest match wins
    if let Some(snapshot) = listing
        .iter()
        .rev()
        .find(|s| s.tags.iter().any(|t| t == reference))
    {
        return Ok(snapshot.id.clone());
    }

    // Rule 5: defer validity to the engine
    Ok(reference.to_string())
}
