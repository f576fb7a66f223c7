#![forbid(unsafe_code)]

use privlog_kernel_contracts::applicant::ApplicantColumn;
use privlog_kernel_contracts::history::{
    ActionHistoryEntry, HistoryEntryId, HistoryPayload, Operation,
};

/// Counts of `action_history` payloads touched by one column erasure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryRewrite {
    pub snapshots_scrubbed: usize,
    pub updates_nulled: usize,
}

impl HistoryRewrite {
    pub fn total(&self) -> usize {
        self.snapshots_scrubbed + self.updates_nulled
    }

    pub fn absorb(&mut self, other: HistoryRewrite) {
        self.snapshots_scrubbed += other.snapshots_scrubbed;
        self.updates_nulled += other.updates_nulled;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScrubOutcome {
    Untouched,
    SnapshotScrubbed,
    UpdateNulled,
}

/// The only mutation ever applied to a stored history entry.
///
/// - `add` snapshots: the column's captured value becomes the null marker.
/// - `update` of the same column: the whole payload becomes null.
/// - everything else is left as written.
pub(crate) fn scrub_entry(entry: &mut ActionHistoryEntry, column: ApplicantColumn) -> ScrubOutcome {
    match entry.operation {
        Operation::Add => match entry.new_data.as_mut() {
            Some(HistoryPayload::Snapshot(snapshot)) => {
                if snapshot.scrub(column) {
                    ScrubOutcome::SnapshotScrubbed
                } else {
                    ScrubOutcome::Untouched
                }
            }
            _ => ScrubOutcome::Untouched,
        },
        Operation::Update
            if entry.modified_column == Some(column) && entry.new_data.is_some() =>
        {
            entry.new_data = None;
            ScrubOutcome::UpdateNulled
        }
        _ => ScrubOutcome::Untouched,
    }
}

/// Scrubs every entry yielded by `entries`. `on_change` receives the id and
/// the payload as it was before, for each entry that actually changed.
pub(crate) fn scrub_entries<'a>(
    entries: impl Iterator<Item = &'a mut ActionHistoryEntry>,
    column: ApplicantColumn,
    mut on_change: impl FnMut(HistoryEntryId, Option<HistoryPayload>),
) -> HistoryRewrite {
    let mut rewrite = HistoryRewrite::default();
    for entry in entries {
        let before = entry.new_data.clone();
        match scrub_entry(entry, column) {
            ScrubOutcome::SnapshotScrubbed => rewrite.snapshots_scrubbed += 1,
            ScrubOutcome::UpdateNulled => rewrite.updates_nulled += 1,
            ScrubOutcome::Untouched => continue,
        }
        on_change(entry.entry_id, before);
    }
    rewrite
}
