//! Viewer-side replica of the hub's peer table.
//!
//! Rebuilt wholesale on `snapshot`, merged field-by-field on `sample`,
//! entry deleted on `left`. Owned by one viewer; never written back.

use std::collections::BTreeMap;

use crate::event::{HubEvent, PeerRecord, SampleUpdate};

/// Per-peer state as seen by a viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerPhase {
    /// Label known, no sample yet.
    Announced,
    /// At least one sample seen.
    Active,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaEntry {
    pub record: PeerRecord,
    pub phase: ViewerPhase,
}

/// An eventually-consistent copy of the hub's table.
#[derive(Debug, Default)]
pub struct Replica {
    peers: BTreeMap<String, ReplicaEntry>,
}

impl Replica {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one hub event. Returns true when the display must be redrawn.
    pub fn apply(&mut self, event: HubEvent) -> bool {
        match event {
            HubEvent::Snapshot { peers } => {
                self.peers.clear();
                for record in peers {
                    let phase = if record.count > 0 || !record.axes().is_empty() {
                        ViewerPhase::Active
                    } else {
                        ViewerPhase::Announced
                    };
                    self.peers
                        .insert(record.peer_id.clone(), ReplicaEntry { record, phase });
                }
                true
            }
            HubEvent::Sample(update) => {
                self.merge_sample(update);
                true
            }
            HubEvent::Left { peer_id } => {
                self.peers.remove(&peer_id);
                true
            }
            HubEvent::Hello { peer_id, label } | HubEvent::Msg { peer_id, label, .. } => {
                let entry = self.peers.entry(peer_id).or_insert_with_key(|id| ReplicaEntry {
                    record: PeerRecord::fresh(id.clone()),
                    phase: ViewerPhase::Announced,
                });
                if label.is_some() {
                    entry.record.label = label;
                }
                true
            }
            HubEvent::Unknown => false,
        }
    }

    fn merge_sample(&mut self, update: SampleUpdate) {
        let entry = self
            .peers
            .entry(update.peer_id.clone())
            .or_insert_with_key(|id| ReplicaEntry {
                record: PeerRecord::fresh(id.clone()),
                phase: ViewerPhase::Active,
            });
        entry.phase = ViewerPhase::Active;

        let r = &mut entry.record;
        // A missing count keeps the last known value.
        if let Some(count) = update.count {
            r.count = count;
        }
        overwrite(&mut r.label, update.label);
        overwrite(&mut r.ax, update.ax);
        overwrite(&mut r.ay, update.ay);
        overwrite(&mut r.az, update.az);
        overwrite(&mut r.gx, update.gx);
        overwrite(&mut r.gy, update.gy);
        overwrite(&mut r.gz, update.gz);
    }

    /// Discard everything; used before a resync.
    pub fn clear(&mut self) {
        self.peers.clear();
    }

    pub fn get(&self, peer_id: &str) -> Option<&ReplicaEntry> {
        self.peers.get(peer_id)
    }

    /// Entries ordered by peer identifier.
    pub fn entries(&self) -> impl Iterator<Item = &ReplicaEntry> {
        self.peers.values()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Absent never overwrites; present-but-null clears.
fn overwrite<T>(slot: &mut Option<T>, incoming: Option<Option<T>>) {
    if let Some(value) = incoming {
        *slot = value;
    }
}
