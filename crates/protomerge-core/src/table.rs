//! Prototype table: the append-only arena of [`PrototypeRecord`]s.
//!
//! Records are addressed by [`ProtoId`], their position in creation order.
//! The table only grows; indices are never reused or reordered. During the
//! merge, records are mutated in place through [`PrototypeTable::get_mut`].
//! Once the merge is done the table is frozen into a [`PrototypeSnapshot`].

use crate::model::{PrototypeRecord, PrototypeSeed, ProtoId};

/// Append-only prototype storage used while merging.
#[derive(Debug, Clone, Default)]
pub struct PrototypeTable {
    records: Vec<PrototypeRecord>,
}

impl PrototypeTable {
    /// Create an empty table.
    pub fn new() -> Self {
        PrototypeTable::default()
    }

    /// Append a record for a slot newly declared by `declaring_class`.
    pub fn create(
        &mut self,
        declaring_class: &str,
        slot_index: usize,
        seed: PrototypeSeed,
    ) -> ProtoId {
        let id = ProtoId::new(self.records.len() as u32);
        self.records.push(PrototypeRecord {
            proto_index: id,
            name: seed.name,
            mangled_name: seed.mangled_name,
            return_type: seed.return_type,
            parameters: seed.parameters,
            original_slot_index: slot_index,
            declaring_class: declaring_class.to_string(),
        });
        id
    }

    /// Look up a record.
    pub fn get(&self, id: ProtoId) -> Option<&PrototypeRecord> {
        self.records.get(id.index())
    }

    /// Look up a record for enrichment.
    pub fn get_mut(&mut self, id: ProtoId) -> Option<&mut PrototypeRecord> {
        self.records.get_mut(id.index())
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no record was created.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Freeze the table.
    pub fn finalize(self) -> PrototypeSnapshot {
        PrototypeSnapshot {
            records: self.records,
        }
    }
}

/// Frozen prototype table.
///
/// Read-only to callers. The post-merge passes in [`crate::synth`] rewrite
/// records through a crate-private hook and hand back a new snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrototypeSnapshot {
    records: Vec<PrototypeRecord>,
}

impl PrototypeSnapshot {
    /// Look up a record.
    pub fn get(&self, id: ProtoId) -> Option<&PrototypeRecord> {
        self.records.get(id.index())
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate records in index order.
    pub fn iter(&self) -> impl Iterator<Item = &PrototypeRecord> {
        self.records.iter()
    }

    /// All records in index order.
    pub fn records(&self) -> &[PrototypeRecord] {
        &self.records
    }

    /// Find the record declared by `declaring_class` at `slot_index`.
    pub fn find_declared(&self, declaring_class: &str, slot_index: usize) -> Option<&PrototypeRecord> {
        self.records
            .iter()
            .find(|r| r.declaring_class == declaring_class && r.original_slot_index == slot_index)
    }

    /// Apply `rewrite` to every record, returning how many it changed.
    pub(crate) fn rewrite(mut self, mut rewrite: impl FnMut(&mut PrototypeRecord) -> bool) -> (Self, usize) {
        let mut changed = 0;
        for record in &mut self.records {
            if rewrite(record) {
                changed += 1;
            }
        }
        (self, changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UNKNOWN;

    #[test]
    fn ids_follow_creation_order() {
        let mut table = PrototypeTable::new();
        let a = table.create("OSObject", 0, PrototypeSeed::unknown());
        let b = table.create("OSObject", 1, PrototypeSeed::unknown());
        let c = table.create("IOService", 7, PrototypeSeed::unknown());

        assert_eq!((a, b, c), (ProtoId::new(0), ProtoId::new(1), ProtoId::new(2)));
        assert_eq!(table.len(), 3);
        let record = table.get(c).unwrap();
        assert_eq!(record.proto_index, c);
        assert_eq!(record.declaring_class, "IOService");
        assert_eq!(record.original_slot_index, 7);
    }

    #[test]
    fn unknown_seed_starts_blank() {
        let mut table = PrototypeTable::new();
        let id = table.create("OSObject", 0, PrototypeSeed::unknown());
        let record = table.get(id).unwrap();
        assert!(!record.is_named());
        assert_eq!(record.return_type, UNKNOWN);
        assert!(record.has_unknown_parameters());
    }

    #[test]
    fn get_mut_edits_in_place() {
        let mut table = PrototypeTable::new();
        let id = table.create("OSObject", 0, PrototypeSeed::unknown());
        table.get_mut(id).unwrap().name = "free".to_string();
        assert_eq!(table.get(id).unwrap().name, "free");
        assert!(table.get(ProtoId::new(9)).is_none());
    }

    #[test]
    fn snapshot_lookups() {
        let mut table = PrototypeTable::new();
        table.create("OSObject", 0, PrototypeSeed::unknown());
        table.create("OSString", 5, PrototypeSeed::unknown());
        let snapshot = table.finalize();

        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.find_declared("OSString", 5).is_some());
        assert!(snapshot.find_declared("OSString", 0).is_none());
        assert_eq!(snapshot.iter().count(), 2);
    }

    #[test]
    fn rewrite_counts_changes() {
        let mut table = PrototypeTable::new();
        table.create("A", 0, PrototypeSeed::unknown());
        table.create("A", 1, PrototypeSeed::unknown());
        let (snapshot, changed) = table.finalize().rewrite(|r| {
            if r.original_slot_index == 1 {
                r.name = "touched".to_string();
                true
            } else {
                false
            }
        });
        assert_eq!(changed, 1);
        assert_eq!(snapshot.records()[1].name, "touched");
    }
}
