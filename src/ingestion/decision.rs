//! What to do with an incoming sample, given the newest stored one.

use crate::sample_store::{Sample, SampleMetadata};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestAction {
    /// Discard the incoming sample.
    Ignore,
    /// Swap the newest stored sample for the incoming one.
    ReplaceLatest,
    /// Prepend the incoming sample to the history.
    AppendNew,
}

/// Decides the fate of an incoming sample. Pure: callers serialize
/// decide-then-mutate sequences per source and pass a stable `now`.
///
/// A sample is fresh while `now - latest.id < freshness_window`; with no
/// stored sample there is nothing fresh. The rules, in order:
/// 1. a fresh recognized sample holds its slot, whatever comes in;
/// 2. the same song as the newest sample never enters twice, however old
///    the newest is, so one long track does not fill the history;
/// 3. a fresh unrecognized sample is swapped out as soon as a recognized
///    one arrives, and keeps its slot otherwise;
/// 4. anything else starts a new history entry.
pub fn decide(
    latest: Option<&Sample>,
    incoming: &SampleMetadata,
    now: u64,
    freshness_window: Duration,
) -> IngestAction {
    let Some(latest) = latest else {
        return IngestAction::AppendNew;
    };

    let fresh = now.saturating_sub(latest.id) < freshness_window.as_secs();

    if fresh && latest.metadata.is_recognized() {
        return IngestAction::Ignore;
    }

    if let (Some(newest), Some(incoming)) = (latest.metadata.song(), incoming.song()) {
        if newest.same_song(incoming) {
            return IngestAction::Ignore;
        }
    }

    if fresh {
        return if incoming.is_recognized() {
            IngestAction::ReplaceLatest
        } else {
            IngestAction::Ignore
        };
    }

    IngestAction::AppendNew
}
