//! Effective vtable lookup over exported documents.
//!
//! A class the merge left without a vtable still has methods at runtime:
//! those of its nearest ancestor that does have one. [`ExportedTables`]
//! reads the two output documents back and answers, for any class, the
//! `(prototype, mangled name)` pairs of its effective vtable.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use thiserror::Error;

use crate::model::ProtoId;
use crate::output::{ClassEntry, PrototypeEntry};

/// Errors from vtable lookup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("class '{name}' is not in the class document")]
    UnknownClass { name: String },

    #[error("no vtable for '{name}' or any of its ancestors")]
    NoVtable { name: String },

    #[error("class '{class}' references missing prototype {proto}")]
    DanglingPrototype { class: String, proto: ProtoId },
}

/// One method of an effective vtable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveMethod {
    pub slot: usize,
    pub prototype: PrototypeEntry,
    /// Mangled symbol of the implementation in the class owning the vtable.
    pub mangled_name: Option<String>,
}

/// The methods a class actually has, and where they were found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveVtable {
    pub class_name: String,
    /// Class whose vtable was used: `class_name` itself or an ancestor.
    pub source_class: String,
    pub methods: Vec<EffectiveMethod>,
}

/// Exported class and prototype documents, indexed by class name.
#[derive(Debug, Clone)]
pub struct ExportedTables {
    classes: Vec<ClassEntry>,
    prototypes: Vec<PrototypeEntry>,
    index: HashMap<String, usize>,
}

impl ExportedTables {
    /// Index the documents. Later duplicates of a class name are ignored.
    pub fn new(classes: Vec<ClassEntry>, prototypes: Vec<PrototypeEntry>) -> Self {
        let mut index = HashMap::with_capacity(classes.len());
        for (idx, class) in classes.iter().enumerate() {
            index.entry(class.name.clone()).or_insert(idx);
        }
        ExportedTables {
            classes,
            prototypes,
            index,
        }
    }

    /// Look up a class entry.
    pub fn class(&self, name: &str) -> Option<&ClassEntry> {
        self.index.get(name).map(|&idx| &self.classes[idx])
    }

    /// Look up a prototype by index.
    pub fn prototype(&self, id: ProtoId) -> Option<&PrototypeEntry> {
        self.prototypes
            .get(id.index())
            .filter(|p| p.proto_index == id)
            .or_else(|| self.prototypes.iter().find(|p| p.proto_index == id))
    }

    /// Nearest class, starting at `name` itself, that has a vtable.
    pub fn vtable_owner(&self, name: &str) -> Result<&ClassEntry, LookupError> {
        let mut current = self.class(name).ok_or_else(|| LookupError::UnknownClass {
            name: name.to_string(),
        })?;
        let mut seen = HashSet::new();
        while current.vtable.is_none() {
            seen.insert(current.name.as_str());
            let next = current
                .parent
                .as_deref()
                .filter(|parent| !seen.contains(parent))
                .and_then(|parent| self.class(parent));
            current = next.ok_or_else(|| LookupError::NoVtable {
                name: name.to_string(),
            })?;
        }
        Ok(current)
    }

    /// Effective vtable of `name`.
    pub fn effective_vtable(&self, name: &str) -> Result<EffectiveVtable, LookupError> {
        let owner = self.vtable_owner(name)?;
        let slots = owner.slots().unwrap_or_default();
        let methods = slots
            .into_iter()
            .enumerate()
            .map(|(slot, entry)| -> Result<EffectiveMethod, LookupError> {
                let prototype = self.prototype(entry.proto_index).cloned().ok_or_else(|| {
                    LookupError::DanglingPrototype {
                        class: owner.name.clone(),
                        proto: entry.proto_index,
                    }
                })?;
                Ok(EffectiveMethod {
                    slot,
                    prototype,
                    mangled_name: entry.mangled_name,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(EffectiveVtable {
            class_name: name.to_string(),
            source_class: owner.name.clone(),
            methods,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{unknown_parameters, VtableSlot, UNKNOWN};
    use crate::output::{VtableEncoding, VtableEntryRepr};

    fn prototype(id: u32, name: &str) -> PrototypeEntry {
        PrototypeEntry {
            name: name.to_string(),
            mangled_name: String::new(),
            return_type: UNKNOWN.to_string(),
            parameters: unknown_parameters(),
            vtable_index: id as usize,
            declaring_class: "OSObject".to_string(),
            proto_index: ProtoId::new(id),
        }
    }

    fn class(name: &str, parent: Option<&str>, vtable: Option<&[u32]>) -> ClassEntry {
        ClassEntry {
            name: name.to_string(),
            parent: parent.map(str::to_string),
            is_abstract: false,
            vtable: vtable.map(|ids| {
                ids.iter()
                    .map(|&id| {
                        let slot = VtableSlot {
                            proto_index: ProtoId::new(id),
                            is_overridden: false,
                            is_pure_virtual: false,
                            mangled_name: Some(format!("impl_{}", id)),
                        };
                        VtableEntryRepr::encode(&slot, VtableEncoding::Compact)
                    })
                    .collect()
            }),
        }
    }

    fn tables() -> ExportedTables {
        ExportedTables::new(
            vec![
                class("OSObject", None, Some(&[0, 1])),
                class("OSString", Some("OSObject"), None),
                class("OSSymbol", Some("OSString"), None),
                class("Loner", None, None),
                class("Broken", None, Some(&[7])),
            ],
            vec![prototype(0, "free"), prototype(1, "init")],
        )
    }

    #[test]
    fn own_vtable_is_used() {
        let vt = tables().effective_vtable("OSObject").unwrap();
        assert_eq!(vt.source_class, "OSObject");
        assert_eq!(vt.methods.len(), 2);
        assert_eq!(vt.methods[1].prototype.name, "init");
        assert_eq!(vt.methods[1].mangled_name.as_deref(), Some("impl_1"));
    }

    #[test]
    fn walks_up_to_nearest_ancestor_with_vtable() {
        let vt = tables().effective_vtable("OSSymbol").unwrap();
        assert_eq!(vt.class_name, "OSSymbol");
        assert_eq!(vt.source_class, "OSObject");
        assert_eq!(vt.methods[0].slot, 0);
    }

    #[test]
    fn lookup_errors() {
        let t = tables();
        assert_eq!(
            t.effective_vtable("Nobody").unwrap_err(),
            LookupError::UnknownClass {
                name: "Nobody".to_string()
            }
        );
        assert_eq!(
            t.effective_vtable("Loner").unwrap_err(),
            LookupError::NoVtable {
                name: "Loner".to_string()
            }
        );
        assert!(matches!(
            t.effective_vtable("Broken").unwrap_err(),
            LookupError::DanglingPrototype { .. }
        ));
    }

    #[test]
    fn cyclic_parents_terminate() {
        let t = ExportedTables::new(
            vec![class("A", Some("B"), None), class("B", Some("A"), None)],
            vec![],
        );
        assert!(matches!(
            t.effective_vtable("A").unwrap_err(),
            LookupError::NoVtable { .. }
        ));
    }
}
