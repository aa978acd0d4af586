use std::fmt;

/// Handle to a node owned by a [`Document`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque key the engine hands to the host when it adds a listener.
/// The host passes it back when the event fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerKey(pub u64);

/// A host event delivered to a listener.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub kind: String,
    pub target: NodeId,
}

impl Event {
    pub fn new(kind: impl Into<String>, target: NodeId) -> Self {
        Self {
            kind: kind.into(),
            target,
        }
    }
}

/// Element mutation and tree primitives the binding engine depends on.
///
/// Implementations own the node storage. Methods taking a node that no longer
/// exists must be no-ops (or return empty results), never panic.
pub trait Document {
    /// Default scan root.
    fn body(&self) -> NodeId;

    fn is_element(&self, node: NodeId) -> bool;

    /// Lowercase tag name, `None` for text and comment nodes.
    fn tag_name(&self, node: NodeId) -> Option<String>;

    /// All child nodes in document order, text nodes included.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn attribute_names(&self, node: NodeId) -> Vec<String>;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);

    fn remove_attribute(&mut self, node: NodeId, name: &str);

    fn has_class(&self, node: NodeId, class: &str) -> bool;

    fn add_class(&mut self, node: NodeId, class: &str);

    fn remove_class(&mut self, node: NodeId, class: &str);

    /// Set (`Some`) or clear (`None`) one inline style property.
    fn set_style(&mut self, node: NodeId, property: &str, value: Option<&str>);

    fn style(&self, node: NodeId, property: &str) -> Option<String>;

    fn inner_html(&self, node: NodeId) -> String;

    /// Replace all children with the nodes described by `markup`.
    fn set_inner_html(&mut self, node: NodeId, markup: &str);

    /// Append the nodes described by `markup` and return the new top-level nodes.
    fn append_html(&mut self, node: NodeId, markup: &str) -> Vec<NodeId>;

    /// Detach and drop all children of `node`.
    fn remove_children(&mut self, node: NodeId);

    /// Current value of a form control (or `option`).
    fn value(&self, node: NodeId) -> String;

    fn set_value(&mut self, node: NodeId, value: &str);

    fn checked(&self, node: NodeId) -> bool;

    fn set_checked(&mut self, node: NodeId, checked: bool);

    fn set_selected(&mut self, node: NodeId, selected: bool);

    fn add_listener(&mut self, node: NodeId, event: &str, key: ListenerKey);

    fn remove_listener(&mut self, node: NodeId, event: &str, key: ListenerKey);

    /// Keys of the listeners attached to `node` for `event`, in attach order.
    fn listeners(&self, node: NodeId, event: &str) -> Vec<ListenerKey>;

    /// Element children only.
    fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.children(node)
            .into_iter()
            .filter(|child| self.is_element(*child))
            .collect()
    }

    /// True when `node` is `ancestor` or nested under it.
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if candidate == ancestor {
                return true;
            }
            current = self.parent(candidate);
        }
        false
    }

    /// Element descendants of `root` in depth-first document order, `root` excluded.
    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.element_children(root).into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            found.push(node);
            stack.extend(self.element_children(node).into_iter().rev());
        }
        found
    }

    /// Radio inputs sharing the `name` group, searched from the body.
    fn radio_group(&self, name: &str) -> Vec<NodeId> {
        self.descendants(self.body())
            .into_iter()
            .filter(|node| {
                self.tag_name(*node).as_deref() == Some("input")
                    && self
                        .attribute(*node, "type")
                        .is_some_and(|kind| kind.eq_ignore_ascii_case("radio"))
                    && self.attribute(*node, "name").as_deref() == Some(name)
            })
            .collect()
    }
}
