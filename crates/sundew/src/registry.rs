//! Bookkeeping for bound elements, their directives, the dependency ledger
//! and the listener table.

use crate::action::Action;
use crate::arena::Arena;
use crate::directive::{Directive, DirectiveId, DirectiveState, ElementId};
use crate::parser::Reference;
use crate::scope::Scope;
use crate::update_loop::Snapshot;
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;
use sundew_dom::{ListenerKey, NodeId};

#[derive(Debug)]
pub(crate) struct BoundElement {
    pub node: NodeId,
    pub scope: Scope,
    /// In evaluation order.
    pub directives: SmallVec<[DirectiveId; 4]>,
}

/// One polled expression of a directive.
#[derive(Debug)]
pub(crate) struct Dependency {
    pub directive: DirectiveId,
    /// Which expression of the directive (attr/class sub-binding index).
    pub expression: usize,
    pub reference: Rc<Reference>,
    pub scope: Scope,
    pub last: Option<Snapshot>,
}

#[derive(Debug)]
pub(crate) struct Listener {
    pub directive: DirectiveId,
    pub node: NodeId,
    pub scope: Scope,
    pub actions: Rc<[Action]>,
}

#[derive(Default)]
pub(crate) struct Registry {
    elements: Arena<BoundElement>,
    by_node: HashMap<NodeId, ElementId>,
    directives: Arena<Directive>,
    /// Keyed by registration sequence, so iteration is registration order.
    dependencies: BTreeMap<u64, Dependency>,
    next_sequence: u64,
    listeners: HashMap<ListenerKey, Listener>,
    next_listener: u64,
    radio_groups: HashMap<String, DirectiveId>,
}

impl Registry {
    pub fn insert_element(&mut self, node: NodeId, scope: Scope) -> ElementId {
        let id = ElementId(self.elements.alloc(BoundElement {
            node,
            scope,
            directives: SmallVec::new(),
        }));
        self.by_node.insert(node, id);
        id
    }

    pub fn element(&self, id: ElementId) -> Option<&BoundElement> {
        self.elements.get(id.0)
    }

    pub fn element_for(&self, node: NodeId) -> Option<ElementId> {
        self.by_node.get(&node).copied()
    }

    pub fn elements(&self) -> impl Iterator<Item = (ElementId, &BoundElement)> {
        self.elements.iter().map(|(slot, element)| (ElementId(slot), element))
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn remove_element(&mut self, id: ElementId) -> Option<BoundElement> {
        let element = self.elements.free(id.0)?;
        if self.by_node.get(&element.node) == Some(&id) {
            self.by_node.remove(&element.node);
        }
        Some(element)
    }

    pub fn insert_directive(&mut self, element: ElementId, state: DirectiveState) -> DirectiveId {
        let id = DirectiveId(self.directives.alloc(Directive { element, state }));
        if let Some(bound) = self.elements.get_mut(element.0) {
            bound.directives.push(id);
        }
        id
    }

    pub fn directive(&self, id: DirectiveId) -> Option<&Directive> {
        self.directives.get(id.0)
    }

    pub fn directive_mut(&mut self, id: DirectiveId) -> Option<&mut Directive> {
        self.directives.get_mut(id.0)
    }

    pub fn remove_directive(&mut self, id: DirectiveId) -> Option<Directive> {
        self.directives.free(id.0)
    }

    pub fn add_dependency(
        &mut self,
        directive: DirectiveId,
        expression: usize,
        reference: Rc<Reference>,
        scope: Scope,
    ) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.dependencies.insert(
            sequence,
            Dependency {
                directive,
                expression,
                reference,
                scope,
                last: None,
            },
        );
        sequence
    }

    /// First dependency at or after `sequence`.
    pub fn next_dependency(&self, sequence: u64) -> Option<(u64, &Dependency)> {
        self.dependencies
            .range(sequence..)
            .next()
            .map(|(sequence, dependency)| (*sequence, dependency))
    }

    pub fn dependency_mut(&mut self, sequence: u64) -> Option<&mut Dependency> {
        self.dependencies.get_mut(&sequence)
    }

    /// Cached snapshot of the first polled expression of `directive`.
    pub fn snapshot_of(&self, directive: DirectiveId) -> Option<&Snapshot> {
        self.dependencies
            .values()
            .find(|dependency| dependency.directive == directive)?
            .last
            .as_ref()
    }

    /// Clear the snapshots of `directive`, so its next poll runs it.
    pub fn forget_snapshots(&mut self, directive: DirectiveId) {
        for dependency in self.dependencies.values_mut() {
            if dependency.directive == directive {
                dependency.last = None;
            }
        }
    }

    /// Drop every dependency owned by one of `directives`; returns how many.
    pub fn remove_dependencies_of(&mut self, directives: &HashSet<DirectiveId>) -> usize {
        let before = self.dependencies.len();
        self.dependencies
            .retain(|_, dependency| !directives.contains(&dependency.directive));
        before - self.dependencies.len()
    }

    pub fn dependency_count(&self) -> usize {
        self.dependencies.len()
    }

    pub fn add_listener(&mut self, listener: Listener) -> ListenerKey {
        let key = ListenerKey(self.next_listener);
        self.next_listener += 1;
        self.listeners.insert(key, listener);
        key
    }

    pub fn listener(&self, key: ListenerKey) -> Option<&Listener> {
        self.listeners.get(&key)
    }

    pub fn remove_listener(&mut self, key: ListenerKey) -> Option<Listener> {
        self.listeners.remove(&key)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Make `directive` the authority for `group` unless another one already is.
    pub fn claim_radio_group(&mut self, group: &str, directive: DirectiveId) -> bool {
        match self.radio_groups.get(group) {
            Some(owner) => *owner == directive,
            None => {
                self.radio_groups.insert(group.to_owned(), directive);
                true
            }
        }
    }

    /// Returns whether `directive` held the group.
    pub fn release_radio_group(&mut self, group: &str, directive: DirectiveId) -> bool {
        if self.radio_groups.get(group) == Some(&directive) {
            self.radio_groups.remove(group);
            true
        } else {
            false
        }
    }
}
