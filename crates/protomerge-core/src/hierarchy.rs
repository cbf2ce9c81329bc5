//! Class hierarchy: a forest of [`ClassNode`]s keyed by name.
//!
//! Parent links are plain names. Nothing guarantees that a parent exists in
//! the forest or that following parents terminates, so every walk here stops
//! at missing parents and at the first repeated class.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::model::ClassNode;

/// Errors building a hierarchy.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HierarchyError {
    /// The same class name appears twice.
    #[error("duplicate class '{name}'")]
    DuplicateClass { name: String },
}

/// A forest of classes in input order.
#[derive(Debug, Clone, Default)]
pub struct ClassHierarchy {
    classes: Vec<ClassNode>,
    by_name: HashMap<String, usize>,
}

impl ClassHierarchy {
    /// Build a hierarchy, rejecting duplicate names.
    pub fn from_nodes(nodes: Vec<ClassNode>) -> Result<Self, HierarchyError> {
        let mut by_name = HashMap::with_capacity(nodes.len());

        for (idx, node) in nodes.iter().enumerate() {
            if by_name.insert(node.name.clone(), idx).is_some() {
                return Err(HierarchyError::DuplicateClass {
                    name: node.name.clone(),
                });
            }
        }

        Ok(ClassHierarchy {
            classes: nodes,
            by_name,
        })
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns true if there are no classes.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Returns true if `name` is a class of this hierarchy.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Look up a class by name.
    pub fn get(&self, name: &str) -> Option<&ClassNode> {
        self.by_name.get(name).map(|&idx| &self.classes[idx])
    }

    /// Iterate classes in input order.
    pub fn iter(&self) -> impl Iterator<Item = &ClassNode> {
        self.classes.iter()
    }

    /// The parent node of `name`, if both exist.
    pub fn parent_of(&self, name: &str) -> Option<&ClassNode> {
        self.get(name)
            .and_then(|class| class.parent.as_deref())
            .and_then(|parent| self.get(parent))
    }

    /// Returns true if `name` is its own ancestor.
    pub fn is_cyclic(&self, name: &str) -> bool {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut current = self.get(name).and_then(|c| c.parent.as_deref());
        while let Some(parent) = current {
            if parent == name {
                return true;
            }
            if !seen.insert(parent) {
                return false;
            }
            current = self.get(parent).and_then(|c| c.parent.as_deref());
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ClassHierarchy {
        ClassHierarchy::from_nodes(vec![
            ClassNode::new("OSObject"),
            ClassNode::new("IORegistryEntry").with_parent("OSObject"),
            ClassNode::new("IOService").with_parent("IORegistryEntry"),
            ClassNode::new("OSString").with_parent("OSObject"),
        ])
        .unwrap()
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = ClassHierarchy::from_nodes(vec![ClassNode::new("A"), ClassNode::new("A")])
            .unwrap_err();
        assert_eq!(
            err,
            HierarchyError::DuplicateClass {
                name: "A".to_string()
            }
        );
    }

    #[test]
    fn lookup_and_parent() {
        let h = sample();
        assert_eq!(h.len(), 4);
        assert!(h.contains("IOService"));
        assert!(!h.contains("IOUserClient"));
        assert_eq!(h.parent_of("IOService").unwrap().name, "IORegistryEntry");
        assert!(h.parent_of("OSObject").is_none());
    }

    #[test]
    fn iteration_keeps_input_order() {
        let h = sample();
        let names: Vec<_> = h.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["OSObject", "IORegistryEntry", "IOService", "OSString"]);
    }

    #[test]
    fn missing_parent_is_not_a_cycle() {
        let h = ClassHierarchy::from_nodes(vec![ClassNode::new("A").with_parent("Gone")]).unwrap();
        assert!(h.parent_of("A").is_none());
        assert!(!h.is_cyclic("A"));
    }

    #[test]
    fn cycle_detection() {
        let h = ClassHierarchy::from_nodes(vec![
            ClassNode::new("A").with_parent("B"),
            ClassNode::new("B").with_parent("A"),
            ClassNode::new("C").with_parent("A"),
            ClassNode::new("Self").with_parent("Self"),
        ])
        .unwrap();
        assert!(h.is_cyclic("A"));
        assert!(h.is_cyclic("B"));
        assert!(h.is_cyclic("Self"));
        // C hangs below a cycle but is not part of it.
        assert!(!h.is_cyclic("C"));
    }
}
