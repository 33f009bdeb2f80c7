//! Classifies available migrations against the ledger

use std::collections::BTreeMap;

use crate::info::{ChecksumDrift, MigrationInfo, MigrationInfoSet};
use crate::migration::{MigrationDescriptor, MigrationKind};
use crate::record::LedgerRecord;
use crate::state::MigrationState;
use crate::version::SchemaVersion;

#[derive(Default)]
struct Slot<'a> {
    descriptor: Option<&'a MigrationDescriptor>,
    record: Option<&'a LedgerRecord>,
}

/// Merge the available migrations with the ledger into one status view.
///
/// Every version seen on either side gets exactly one entry, ordered
/// ascending. Ledger rows win for applied versions; descriptors without
/// a row resolve to PENDING unless a successful baseline at or above
/// their version shadows them.
pub fn resolve(available: &[MigrationDescriptor], applied: &[LedgerRecord]) -> MigrationInfoSet {
    let mut slots: BTreeMap<&SchemaVersion, Slot<'_>> = BTreeMap::new();
    for descriptor in available {
        slots.entry(&descriptor.version).or_default().descriptor = Some(descriptor);
    }
    for record in applied {
        slots.entry(&record.version).or_default().record = Some(record);
    }

    let baseline = applied
        .iter()
        .filter(|record| {
            record.kind == MigrationKind::Baseline && record.state == MigrationState::Success
        })
        .map(|record| &record.version)
        .max();

    let mut infos = Vec::with_capacity(slots.len());
    let mut drift = Vec::new();

    for (&version, slot) in &slots {
        match (slot.descriptor, slot.record) {
            (Some(descriptor), Some(record)) => {
                // Baseline rows carry no payload to compare against
                if record.kind != MigrationKind::Baseline && record.checksum != descriptor.checksum
                {
                    drift.push(ChecksumDrift {
                        version: version.clone(),
                        script: record.script.clone(),
                        recorded: record.checksum,
                        resolved: descriptor.checksum,
                    });
                }
                infos.push(info_from_record(record));
            }
            (Some(descriptor), None) => {
                let shadowed = baseline.is_some_and(|baseline| version <= baseline);
                infos.push(MigrationInfo {
                    version: version.clone(),
                    kind: descriptor.kind,
                    script: descriptor.script.clone(),
                    checksum: descriptor.checksum,
                    state: if shadowed {
                        MigrationState::Success
                    } else {
                        MigrationState::Pending
                    },
                    installed_on: None,
                    execution_time_ms: None,
                });
            }
            (None, Some(record)) => infos.push(info_from_record(record)),
            (None, None) => {}
        }
    }

    MigrationInfoSet::new(infos, drift)
}

fn info_from_record(record: &LedgerRecord) -> MigrationInfo {
    MigrationInfo {
        version: record.version.clone(),
        kind: record.kind,
        script: record.script.clone(),
        checksum: record.checksum,
        state: record.state,
        installed_on: record.installed_on,
        execution_time_ms: record.execution_time_ms,
    }
}
