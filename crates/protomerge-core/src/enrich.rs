//! Enrichment: folding one class's observation into a shared prototype record.
//!
//! The merger calls [`enrich`] once per (slot, contributing class), parents
//! before children. Each field has its own precedence rule, and a rule that
//! declines to change a field never stops the rules for the other fields:
//!
//! | Field | Rule |
//! |-------|------|
//! | return type | UNKNOWN is replaced by the observed type |
//! | name + mangled name | empty is replaced; a different real name is a conflict |
//! | parameters | the placeholder list is replaced wholesale; otherwise UNKNOWN types are filled position by position |
//!
//! Pure-virtual observations contribute nothing. No rule ever writes UNKNOWN
//! over a concrete value.

use tracing::trace;

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::model::{
    is_destructor_name, is_unknown_parameters, is_unnamed, Observation, PrototypeRecord, UNKNOWN,
};

/// Which fields an [`enrich`] call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Adopted {
    pub return_type: bool,
    pub name: bool,
    pub parameters: bool,
}

impl Adopted {
    /// Returns true if any field changed.
    pub fn any(&self) -> bool {
        self.return_type || self.name || self.parameters
    }
}

/// Fold `observation`, made on `class_name` at `slot_index`, into `record`.
pub fn enrich(
    record: &mut PrototypeRecord,
    observation: &Observation,
    class_name: &str,
    slot_index: usize,
    diagnostics: &mut Diagnostics,
) -> Adopted {
    if observation.is_pure_virtual {
        return Adopted::default();
    }

    let adopted = Adopted {
        return_type: enrich_return_type(record, observation),
        name: enrich_name(record, observation, class_name, slot_index, diagnostics),
        parameters: enrich_parameters(record, observation, class_name, slot_index, diagnostics),
    };

    if adopted.any() {
        trace!(
            class = %class_name,
            slot = slot_index,
            proto = %record.proto_index,
            ?adopted,
            "prototype enriched"
        );
    }
    adopted
}

fn enrich_return_type(record: &mut PrototypeRecord, observation: &Observation) -> bool {
    if !record.has_unknown_return() || observation.return_type == UNKNOWN {
        return false;
    }
    record.return_type = observation.return_type.clone();
    true
}

fn enrich_name(
    record: &mut PrototypeRecord,
    observation: &Observation,
    class_name: &str,
    slot_index: usize,
    diagnostics: &mut Diagnostics,
) -> bool {
    if !record.is_named() {
        let mut changed = false;
        if record.mangled_name.is_empty() && !observation.mangled_name.is_empty() {
            record.mangled_name = observation.mangled_name.clone();
            changed = true;
        }
        if !observation.name.is_empty() {
            record.name = observation.name.clone();
            changed = true;
        }
        return changed;
    }

    if record.name != observation.name
        && !is_destructor_name(&record.name)
        && !is_destructor_name(&observation.name)
        && !is_unnamed(&observation.name)
    {
        diagnostics.record(
            Diagnostic::new(
                class_name,
                DiagnosticKind::NameMismatch,
                format!(
                    "{} declares '{}' but {} observes '{}'",
                    record.declaring_class, record.name, class_name, observation.name
                ),
            )
            .at_slot(slot_index),
        );
    }
    false
}

fn enrich_parameters(
    record: &mut PrototypeRecord,
    observation: &Observation,
    class_name: &str,
    slot_index: usize,
    diagnostics: &mut Diagnostics,
) -> bool {
    if record.has_unknown_parameters() {
        if record.parameters == observation.parameters {
            return false;
        }
        record.parameters = observation.parameters.clone();
        return true;
    }

    if is_unknown_parameters(&observation.parameters) {
        return false;
    }

    if record.parameters.len() != observation.parameters.len() {
        diagnostics.record(
            Diagnostic::new(
                class_name,
                DiagnosticKind::ParameterCountMismatch,
                format!(
                    "'{}' has {} parameters but {} observes {}",
                    record.name,
                    record.parameters.len(),
                    class_name,
                    observation.parameters.len()
                ),
            )
            .at_slot(slot_index),
        );
        // An unused parameter can make the disassembler see no parameters at
        // all, so the longer list wins over an empty one.
        if record.parameters.is_empty() {
            record.parameters = observation.parameters.clone();
            return true;
        }
        return false;
    }

    let mut changed = false;
    for (param, observed) in record.parameters.iter_mut().zip(&observation.parameters) {
        if param.is_unknown() && !observed.is_unknown() {
            param.ty = observed.ty.clone();
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MethodParam, ProtoId, PrototypeSeed};
    use crate::table::PrototypeTable;

    fn blank_record() -> PrototypeRecord {
        let mut table = PrototypeTable::new();
        let id = table.create("Base", 0, PrototypeSeed::unknown());
        table.get(id).unwrap().clone()
    }

    fn named_record(name: &str, params: Vec<MethodParam>) -> PrototypeRecord {
        PrototypeRecord {
            proto_index: ProtoId::new(0),
            name: name.to_string(),
            mangled_name: format!("__ZN4Base{}{}Ev", name.len(), name),
            return_type: "int".to_string(),
            parameters: params,
            original_slot_index: 0,
            declaring_class: "Base".to_string(),
        }
    }

    mod pure_virtual {
        use super::*;

        #[test]
        fn contributes_nothing() {
            let mut record = blank_record();
            let before = record.clone();
            let mut diags = Diagnostics::new();
            let obs = Observation::pure_virtual(0).with_return_type("int");

            let adopted = enrich(&mut record, &obs, "Derived", 0, &mut diags);

            assert!(!adopted.any());
            assert_eq!(record, before);
            assert!(diags.is_empty());
        }
    }

    mod return_type {
        use super::*;

        #[test]
        fn unknown_is_filled() {
            let mut record = blank_record();
            let obs = Observation::new(0, "foo").with_return_type("bool");
            let adopted = enrich(&mut record, &obs, "Derived", 0, &mut Diagnostics::new());
            assert!(adopted.return_type);
            assert_eq!(record.return_type, "bool");
        }

        #[test]
        fn concrete_is_kept() {
            let mut record = named_record("foo", vec![]);
            let obs = Observation::new(0, "foo").with_return_type("bool");
            enrich(&mut record, &obs, "Derived", 0, &mut Diagnostics::new());
            assert_eq!(record.return_type, "int");
        }

        #[test]
        fn unknown_never_overwrites() {
            let mut record = named_record("foo", vec![]);
            let obs = Observation::new(0, "foo");
            enrich(&mut record, &obs, "Derived", 0, &mut Diagnostics::new());
            assert_eq!(record.return_type, "int");
        }
    }

    mod name {
        use super::*;

        #[test]
        fn empty_name_adopts_name_and_mangled_name() {
            let mut record = blank_record();
            let obs = Observation::new(0, "foo").with_mangled_name("__ZN7Derived3fooEv");
            let adopted = enrich(&mut record, &obs, "Derived", 0, &mut Diagnostics::new());
            assert!(adopted.name);
            assert_eq!(record.name, "foo");
            assert_eq!(record.mangled_name, "__ZN7Derived3fooEv");
        }

        #[test]
        fn first_mangled_name_survives_a_later_named_override() {
            let mut record = blank_record();
            let mut diags = Diagnostics::new();

            let unnamed = Observation::new(0, "").with_mangled_name("__ZN7Derived3fooEv");
            let adopted = enrich(&mut record, &unnamed, "Derived", 0, &mut diags);
            assert!(adopted.name);
            assert_eq!(record.name, "");
            assert_eq!(record.mangled_name, "__ZN7Derived3fooEv");

            let named = Observation::new(0, "foo").with_mangled_name("__ZN4Leaf3fooEv");
            let adopted = enrich(&mut record, &named, "Leaf", 0, &mut diags);
            assert!(adopted.name);
            assert_eq!(record.name, "foo");
            assert_eq!(record.mangled_name, "__ZN7Derived3fooEv");
            assert!(diags.is_empty());
        }

        #[test]
        fn empty_observation_changes_nothing() {
            let mut record = blank_record();
            let adopted = enrich(&mut record, &Observation::new(0, ""), "Derived", 0, &mut Diagnostics::new());
            assert!(!adopted.name);
            assert!(record.mangled_name.is_empty());
        }

        #[test]
        fn mismatch_is_diagnosed_and_kept() {
            let mut record = named_record("foo", vec![]);
            let mut diags = Diagnostics::new();
            let obs = Observation::new(0, "bar").with_mangled_name("__ZN7Derived3barEv");

            let adopted = enrich(&mut record, &obs, "Derived", 3, &mut diags);

            assert!(!adopted.name);
            assert_eq!(record.name, "foo");
            assert_eq!(diags.count_of(DiagnosticKind::NameMismatch), 1);
            let diag = diags.iter().next().unwrap();
            assert_eq!(diag.class_name, "Derived");
            assert_eq!(diag.slot_index, Some(3));
        }

        #[test]
        fn destructors_never_conflict() {
            let mut diags = Diagnostics::new();
            let mut record = named_record("~Base", vec![]);
            enrich(&mut record, &Observation::new(0, "~Derived"), "Derived", 0, &mut diags);
            let mut record = named_record("release", vec![]);
            enrich(&mut record, &Observation::new(0, "~Derived"), "Derived", 0, &mut diags);
            assert!(diags.is_empty());
        }

        #[test]
        fn placeholder_observation_never_conflicts() {
            let mut diags = Diagnostics::new();
            let mut record = named_record("foo", vec![]);
            enrich(&mut record, &Observation::new(0, "sub_FFFF1234"), "Derived", 0, &mut diags);
            enrich(&mut record, &Observation::new(0, ""), "Derived", 0, &mut diags);
            assert!(diags.is_empty());
            assert_eq!(record.name, "foo");
        }

        #[test]
        fn mismatch_still_fills_parameter_types() {
            let mut record = named_record("foo", vec![MethodParam::unknown(), MethodParam::new("int")]);
            let obs = Observation::new(0, "bar")
                .with_parameters(vec![MethodParam::new("char *"), MethodParam::new("int")]);
            let adopted = enrich(&mut record, &obs, "Derived", 0, &mut Diagnostics::new());
            assert!(adopted.parameters);
            assert_eq!(record.parameters[0].ty, "char *");
        }
    }

    mod parameters {
        use super::*;

        #[test]
        fn placeholder_is_replaced_wholesale() {
            let mut record = blank_record();
            let obs = Observation::new(0, "foo").with_parameters(vec![MethodParam::named("int", "x")]);
            let adopted = enrich(&mut record, &obs, "Derived", 0, &mut Diagnostics::new());
            assert!(adopted.parameters);
            assert_eq!(record.parameters, vec![MethodParam::named("int", "x")]);
        }

        #[test]
        fn placeholder_accepts_zero_parameters() {
            let mut record = blank_record();
            let obs = Observation::new(0, "foo").with_parameters(vec![]);
            enrich(&mut record, &obs, "Derived", 0, &mut Diagnostics::new());
            assert!(record.parameters.is_empty());
        }

        #[test]
        fn observed_placeholder_changes_nothing() {
            let mut record = named_record("foo", vec![MethodParam::unknown(), MethodParam::unknown()]);
            let before = record.parameters.clone();
            let obs = Observation::new(0, "foo");
            enrich(&mut record, &obs, "Derived", 0, &mut Diagnostics::new());
            assert_eq!(record.parameters, before);
        }

        #[test]
        fn element_wise_fills_unknown_types_only() {
            let mut record = named_record(
                "foo",
                vec![MethodParam::named(UNKNOWN, "len"), MethodParam::named("void *", "buf")],
            );
            let obs = Observation::new(0, "foo").with_parameters(vec![
                MethodParam::named("size_t", "size"),
                MethodParam::named("char *", "data"),
            ]);
            enrich(&mut record, &obs, "Derived", 0, &mut Diagnostics::new());
            assert_eq!(
                record.parameters,
                vec![MethodParam::named("size_t", "len"), MethodParam::named("void *", "buf")]
            );
        }

        #[test]
        fn names_are_not_propagated() {
            let mut record = named_record("foo", vec![MethodParam::unknown(), MethodParam::new("int")]);
            let obs = Observation::new(0, "foo")
                .with_parameters(vec![MethodParam::named("long", "a"), MethodParam::named("int", "b")]);
            enrich(&mut record, &obs, "Derived", 0, &mut Diagnostics::new());
            assert_eq!(record.parameters[0], MethodParam::new("long"));
            assert_eq!(record.parameters[1], MethodParam::new("int"));
        }

        #[test]
        fn count_mismatch_is_diagnosed_and_kept() {
            let mut record = named_record("foo", vec![MethodParam::new("int")]);
            let mut diags = Diagnostics::new();
            let obs = Observation::new(0, "foo")
                .with_parameters(vec![MethodParam::new("int"), MethodParam::new("int")]);
            let adopted = enrich(&mut record, &obs, "Derived", 2, &mut diags);
            assert!(!adopted.parameters);
            assert_eq!(record.parameters.len(), 1);
            assert_eq!(diags.count_of(DiagnosticKind::ParameterCountMismatch), 1);
        }

        #[test]
        fn count_mismatch_prefers_richer_list_over_empty() {
            let mut record = named_record("foo", vec![]);
            let mut diags = Diagnostics::new();
            let obs = Observation::new(0, "foo").with_parameters(vec![MethodParam::new("bool")]);
            let adopted = enrich(&mut record, &obs, "Derived", 0, &mut diags);
            assert!(adopted.parameters);
            assert_eq!(record.parameters, vec![MethodParam::new("bool")]);
            assert_eq!(diags.count_of(DiagnosticKind::ParameterCountMismatch), 1);
        }

        #[test]
        fn richer_record_is_not_shrunk_to_empty() {
            let mut record = named_record("foo", vec![MethodParam::new("bool")]);
            let obs = Observation::new(0, "foo").with_parameters(vec![]);
            enrich(&mut record, &obs, "Derived", 0, &mut Diagnostics::new());
            assert_eq!(record.parameters, vec![MethodParam::new("bool")]);
        }
    }
}
