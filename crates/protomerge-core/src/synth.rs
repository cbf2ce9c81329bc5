//! Post-merge passes over the frozen prototype table.
//!
//! [`synthesize_placeholders`] gives every still-unnamed prototype a stable
//! synthetic name derived from its declaring class and slot, so that
//! downstream consumers can reference it. [`fix_void_getters`] undoes a
//! known decompiler artifact where accessor methods are recovered as
//! returning `void`.
//!
//! Both passes are idempotent: running them on their own output changes
//! nothing.

use tracing::{debug, info};

use crate::model::{unknown_parameters, UNKNOWN};
use crate::table::PrototypeSnapshot;

/// Prefix of synthesized method names.
pub const PLACEHOLDER_PREFIX: &str = "vmethod";

/// Synthetic method name for a prototype declared at `slot_index`.
pub fn placeholder_name(slot_index: usize) -> String {
    format!("{}{}", PLACEHOLDER_PREFIX, slot_index)
}

/// Name every unnamed prototype after its declaring class and slot.
///
/// An unnamed record gets `vmethod<N>` as its name and
/// `<DeclaringClass>::vmethod<N>` as its mangled name, with `N` its
/// original slot index. Its signature is reset to unknown: a record that
/// no class ever named has no trustworthy types either.
///
/// Returns the new snapshot and the number of records named.
pub fn synthesize_placeholders(snapshot: PrototypeSnapshot) -> (PrototypeSnapshot, usize) {
    let (snapshot, named) = snapshot.rewrite(|record| {
        if record.is_named() {
            return false;
        }
        let name = placeholder_name(record.original_slot_index);
        record.mangled_name = format!("{}::{}", record.declaring_class, name);
        record.name = name;
        record.return_type = UNKNOWN.to_string();
        record.parameters = unknown_parameters();
        debug!(
            proto = %record.proto_index,
            name = %record.mangled_name,
            "synthesized placeholder name"
        );
        true
    });
    if named > 0 {
        info!(count = named, "named unresolved prototypes");
    }
    (snapshot, named)
}

/// Reset `void` return types of `get*` methods to unknown.
///
/// Returns the new snapshot and the number of records changed.
pub fn fix_void_getters(snapshot: PrototypeSnapshot) -> (PrototypeSnapshot, usize) {
    let (snapshot, fixed) = snapshot.rewrite(|record| {
        if !record.name.starts_with("get") || record.return_type != "void" {
            return false;
        }
        info!(
            proto = %record.proto_index,
            name = %record.name,
            class = %record.declaring_class,
            "getter recovered as void, return type reset"
        );
        record.return_type = UNKNOWN.to_string();
        true
    });
    (snapshot, fixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MethodParam, PrototypeSeed, ProtoId};
    use crate::table::PrototypeTable;

    fn seed(name: &str, return_type: &str) -> PrototypeSeed {
        PrototypeSeed {
            name: name.to_string(),
            mangled_name: String::new(),
            return_type: return_type.to_string(),
            parameters: vec![MethodParam::new("int")],
        }
    }

    fn snapshot(entries: &[(&str, usize, PrototypeSeed)]) -> PrototypeSnapshot {
        let mut table = PrototypeTable::new();
        for (class, slot, seed) in entries {
            table.create(class, *slot, seed.clone());
        }
        table.finalize()
    }

    #[test]
    fn unnamed_records_get_synthetic_names() {
        let snap = snapshot(&[
            ("IOService", 12, seed("", "int")),
            ("IOService", 13, seed("start", "bool")),
        ]);

        let (snap, named) = synthesize_placeholders(snap);

        assert_eq!(named, 1);
        let record = snap.get(ProtoId::new(0)).unwrap();
        assert_eq!(record.name, "vmethod12");
        assert_eq!(record.mangled_name, "IOService::vmethod12");
        assert_eq!(record.return_type, UNKNOWN);
        assert!(record.has_unknown_parameters());

        let named_record = snap.get(ProtoId::new(1)).unwrap();
        assert_eq!(named_record.name, "start");
        assert_eq!(named_record.return_type, "bool");
    }

    #[test]
    fn synthesis_is_idempotent() {
        let snap = snapshot(&[("A", 0, PrototypeSeed::unknown()), ("A", 1, seed("", "void"))]);

        let (once, first) = synthesize_placeholders(snap);
        let (twice, second) = synthesize_placeholders(once.clone());

        assert_eq!(first, 2);
        assert_eq!(second, 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn void_getters_become_unknown() {
        let snap = snapshot(&[
            ("A", 0, seed("getProvider", "void")),
            ("A", 1, seed("getCount", "int")),
            ("A", 2, seed("setValue", "void")),
        ]);

        let (snap, fixed) = fix_void_getters(snap);

        assert_eq!(fixed, 1);
        assert_eq!(snap.records()[0].return_type, UNKNOWN);
        assert_eq!(snap.records()[1].return_type, "int");
        assert_eq!(snap.records()[2].return_type, "void");

        let (_, again) = fix_void_getters(snap);
        assert_eq!(again, 0);
    }

    #[test]
    fn placeholder_name_format() {
        assert_eq!(placeholder_name(0), "vmethod0");
        assert_eq!(placeholder_name(42), "vmethod42");
    }
}
