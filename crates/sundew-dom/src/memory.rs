//! In-memory [`Document`] implementation.
//!
//! Nodes live in a flat table addressed by [`NodeId`]. Slots are never reused,
//! so an id that was removed stays dead and cannot alias a newer node.
//! Control state (value, checked, selected) is kept in attributes, which makes
//! the serialized markup a faithful picture of what the engine did.

use crate::document::{Document, ListenerKey, NodeId};
use crate::markup::{self, MarkupError, MarkupNode};
use indexmap::IndexMap;

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attributes: IndexMap<String, String>,
        children: Vec<NodeId>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    data: NodeData,
    listeners: Vec<(String, ListenerKey)>,
}

#[derive(Debug, Clone)]
pub struct MemoryDocument {
    nodes: Vec<Option<Node>>,
    body: NodeId,
}

impl MemoryDocument {
    /// An empty document with a `body` element.
    pub fn new() -> Self {
        let mut document = Self {
            nodes: Vec::new(),
            body: NodeId(0),
        };
        document.body = document.create_element("body");
        document
    }

    /// A document whose body holds the given markup.
    pub fn parse(markup: &str) -> Result<Self, MarkupError> {
        let mut document = Self::new();
        let nodes = markup::parse_fragment(markup)?;
        let body = document.body;
        document.insert_nodes(body, nodes);
        Ok(document)
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: IndexMap::new(),
            children: Vec::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Text(text.to_owned()))
    }

    /// Append a detached node to `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if self.node(child).is_none_or(|node| node.parent.is_some()) {
            return;
        }
        let Some(Node {
            data: NodeData::Element { children, .. },
            ..
        }) = self.node_mut(parent)
        else {
            return;
        };
        children.push(child);
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
    }

    /// First element carrying `id="…"`.
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        std::iter::once(self.body)
            .chain(self.descendants(self.body))
            .find(|node| self.attribute(*node, "id").as_deref() == Some(id))
    }

    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.descendants(self.body)
            .into_iter()
            .filter(|node| self.tag_name(*node).as_deref() == Some(tag))
            .collect()
    }

    /// Concatenated text of `node` and its descendants.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.serialize(node, &mut out);
        out
    }

    /// Listeners attached anywhere in the document.
    pub fn listener_count(&self) -> usize {
        self.nodes
            .iter()
            .flatten()
            .map(|node| node.listeners.len())
            .sum()
    }

    pub fn classes(&self, node: NodeId) -> Vec<String> {
        self.attribute(node, "class")
            .map(|classes| classes.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(Node {
            parent: None,
            data,
            listeners: Vec::new(),
        }));
        id
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)?.as_ref()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)?.as_mut()
    }

    fn attributes(&self, id: NodeId) -> Option<&IndexMap<String, String>> {
        match &self.node(id)?.data {
            NodeData::Element { attributes, .. } => Some(attributes),
            NodeData::Text(_) => None,
        }
    }

    fn attributes_mut(&mut self, id: NodeId) -> Option<&mut IndexMap<String, String>> {
        match &mut self.node_mut(id)?.data {
            NodeData::Element { attributes, .. } => Some(attributes),
            NodeData::Text(_) => None,
        }
    }

    fn insert_nodes(&mut self, parent: NodeId, nodes: Vec<MarkupNode>) -> Vec<NodeId> {
        let mut created = Vec::with_capacity(nodes.len());
        for node in nodes {
            let id = match node {
                MarkupNode::Text(text) => self.create_text(&text),
                MarkupNode::Element {
                    tag,
                    attributes,
                    children,
                } => {
                    let id = self.create_element(&tag);
                    if let Some(map) = self.attributes_mut(id) {
                        map.extend(attributes);
                    }
                    self.insert_nodes(id, children);
                    id
                }
            };
            self.append_child(parent, id);
            created.push(id);
        }
        created
    }

    /// Drop `id` and its subtree from the table.
    fn release(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get_mut(current.0 as usize).and_then(Option::take) else {
                continue;
            };
            if let NodeData::Element { children, .. } = node.data {
                stack.extend(children);
            }
        }
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.node(id).map(|node| &node.data) {
            Some(NodeData::Text(text)) => out.push_str(text),
            Some(NodeData::Element { children, .. }) => {
                for child in children {
                    self.collect_text(*child, out);
                }
            }
            None => {}
        }
    }

    fn serialize(&self, id: NodeId, out: &mut String) {
        match self.node(id).map(|node| &node.data) {
            Some(NodeData::Text(text)) => out.push_str(&markup::escape_text(text)),
            Some(NodeData::Element {
                tag,
                attributes,
                children,
            }) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&markup::escape_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if markup::is_void(tag) {
                    return;
                }
                for child in children {
                    self.serialize(*child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            None => {}
        }
    }

    fn styles(&self, node: NodeId) -> Vec<(String, String)> {
        self.attribute(node, "style")
            .map(|style| {
                style
                    .split(';')
                    .filter_map(|declaration| {
                        let (property, value) = declaration.split_once(':')?;
                        Some((property.trim().to_owned(), value.trim().to_owned()))
                    })
                    .filter(|(property, _)| !property.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn options(&self, select: NodeId) -> Vec<NodeId> {
        self.descendants(select)
            .into_iter()
            .filter(|node| self.tag_name(*node).as_deref() == Some("option"))
            .collect()
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl Document for MemoryDocument {
    fn body(&self) -> NodeId {
        self.body
    }

    fn is_element(&self, node: NodeId) -> bool {
        matches!(
            self.node(node).map(|node| &node.data),
            Some(NodeData::Element { .. })
        )
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        match &self.node(node)?.data {
            NodeData::Element { tag, .. } => Some(tag.clone()),
            NodeData::Text(_) => None,
        }
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        match self.node(node).map(|node| &node.data) {
            Some(NodeData::Element { children, .. }) => children.clone(),
            _ => Vec::new(),
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.attributes(node)?.get(name).cloned()
    }

    fn attribute_names(&self, node: NodeId) -> Vec<String> {
        self.attributes(node)
            .map(|attributes| attributes.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(attributes) = self.attributes_mut(node) {
            attributes.insert(name.to_owned(), value.to_owned());
        }
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let Some(attributes) = self.attributes_mut(node) {
            attributes.shift_remove(name);
        }
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.classes(node).iter().any(|existing| existing == class)
    }

    fn add_class(&mut self, node: NodeId, class: &str) {
        if !self.is_element(node) || self.has_class(node, class) {
            return;
        }
        let mut classes = self.classes(node);
        classes.push(class.to_owned());
        self.set_attribute(node, "class", &classes.join(" "));
    }

    fn remove_class(&mut self, node: NodeId, class: &str) {
        if !self.has_class(node, class) {
            return;
        }
        let classes: Vec<String> = self
            .classes(node)
            .into_iter()
            .filter(|existing| existing != class)
            .collect();
        if classes.is_empty() {
            self.remove_attribute(node, "class");
        } else {
            self.set_attribute(node, "class", &classes.join(" "));
        }
    }

    fn set_style(&mut self, node: NodeId, property: &str, value: Option<&str>) {
        let mut styles: Vec<(String, String)> = self
            .styles(node)
            .into_iter()
            .filter(|(existing, _)| existing != property)
            .collect();
        if let Some(value) = value {
            styles.push((property.to_owned(), value.to_owned()));
        }
        if styles.is_empty() {
            self.remove_attribute(node, "style");
        } else {
            let style = styles
                .iter()
                .map(|(property, value)| format!("{property}: {value}"))
                .collect::<Vec<_>>()
                .join("; ");
            self.set_attribute(node, "style", &style);
        }
    }

    fn style(&self, node: NodeId, property: &str) -> Option<String> {
        self.styles(node)
            .into_iter()
            .find(|(existing, _)| existing == property)
            .map(|(_, value)| value)
    }

    fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.serialize(child, &mut out);
        }
        out
    }

    fn set_inner_html(&mut self, node: NodeId, markup: &str) {
        self.remove_children(node);
        self.append_html(node, markup);
    }

    fn append_html(&mut self, node: NodeId, markup: &str) -> Vec<NodeId> {
        if !self.is_element(node) {
            return Vec::new();
        }
        match markup::parse_fragment(markup) {
            Ok(nodes) => self.insert_nodes(node, nodes),
            Err(error) => {
                log::warn!("{error}; inserting markup as text into {node}");
                let text = self.create_text(markup);
                self.append_child(node, text);
                vec![text]
            }
        }
    }

    fn remove_children(&mut self, node: NodeId) {
        let children = match self.node_mut(node).map(|node| &mut node.data) {
            Some(NodeData::Element { children, .. }) => std::mem::take(children),
            _ => return,
        };
        for child in children {
            self.release(child);
        }
    }

    fn value(&self, node: NodeId) -> String {
        match self.tag_name(node).as_deref() {
            Some("select") => {
                let options = self.options(node);
                options
                    .iter()
                    .find(|option| self.attribute(**option, "selected").is_some())
                    .or(options.first())
                    .map(|option| self.value(*option))
                    .unwrap_or_default()
            }
            Some("option") => self
                .attribute(node, "value")
                .unwrap_or_else(|| self.text_content(node)),
            Some("textarea") => self
                .attribute(node, "value")
                .unwrap_or_else(|| self.text_content(node)),
            _ => self.attribute(node, "value").unwrap_or_default(),
        }
    }

    fn set_value(&mut self, node: NodeId, value: &str) {
        if self.tag_name(node).as_deref() == Some("select") {
            for option in self.options(node) {
                let selected = self.value(option) == value;
                self.set_selected(option, selected);
            }
        } else {
            self.set_attribute(node, "value", value);
        }
    }

    fn checked(&self, node: NodeId) -> bool {
        self.attribute(node, "checked").is_some()
    }

    fn set_checked(&mut self, node: NodeId, checked: bool) {
        if checked {
            self.set_attribute(node, "checked", "");
        } else {
            self.remove_attribute(node, "checked");
        }
    }

    fn set_selected(&mut self, node: NodeId, selected: bool) {
        if selected {
            self.set_attribute(node, "selected", "");
        } else {
            self.remove_attribute(node, "selected");
        }
    }

    fn add_listener(&mut self, node: NodeId, event: &str, key: ListenerKey) {
        if let Some(node) = self.node_mut(node) {
            node.listeners.push((event.to_owned(), key));
        }
    }

    fn remove_listener(&mut self, node: NodeId, event: &str, key: ListenerKey) {
        if let Some(node) = self.node_mut(node) {
            node.listeners
                .retain(|(existing, existing_key)| !(existing == event && *existing_key == key));
        }
    }

    fn listeners(&self, node: NodeId, event: &str) -> Vec<ListenerKey> {
        self.node(node)
            .map(|node| {
                node.listeners
                    .iter()
                    .filter(|(existing, _)| existing == event)
                    .map(|(_, key)| *key)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_serialize_round_trip() {
        let markup = "<div id=\"app\"><p class=\"a b\">hi &amp; bye</p><input type=\"text\"></div>";
        let document = MemoryDocument::parse(markup).unwrap();
        assert_eq!(document.inner_html(document.body()), markup);
    }

    #[test]
    fn class_and_style_helpers() {
        let mut document = MemoryDocument::parse("<p class=\"a\"></p>").unwrap();
        let p = document.elements_by_tag("p")[0];

        document.add_class(p, "b");
        document.add_class(p, "b");
        assert_eq!(document.classes(p), vec!["a", "b"]);
        document.remove_class(p, "a");
        document.remove_class(p, "b");
        assert_eq!(document.attribute(p, "class"), None);

        document.set_style(p, "display", Some("none"));
        assert_eq!(document.style(p, "display").as_deref(), Some("none"));
        document.set_style(p, "display", None);
        assert_eq!(document.attribute(p, "style"), None);
    }

    #[test]
    fn removed_nodes_are_dead() {
        let mut document = MemoryDocument::parse("<ul><li>a</li><li>b</li></ul>").unwrap();
        let ul = document.elements_by_tag("ul")[0];
        let li = document.elements_by_tag("li")[0];
        assert!(document.contains(ul, li));

        document.remove_children(ul);
        assert!(!document.is_element(li));
        assert!(!document.contains(ul, li));
        assert!(document.elements_by_tag("li").is_empty());

        let added = document.append_html(ul, "<li>c</li>");
        assert_eq!(added.len(), 1);
        assert_ne!(added[0], li);
    }

    #[test]
    fn select_value_follows_selected_option() {
        let mut document = MemoryDocument::parse(
            "<select><option value=\"a\">A</option><option>b</option></select>",
        )
        .unwrap();
        let select = document.elements_by_tag("select")[0];
        assert_eq!(document.value(select), "a");

        document.set_value(select, "b");
        assert_eq!(document.value(select), "b");
    }

    #[test]
    fn malformed_markup_becomes_text() {
        let mut document = MemoryDocument::parse("<div></div>").unwrap();
        let div = document.elements_by_tag("div")[0];
        document.set_inner_html(div, "1 < 2");
        assert_eq!(document.text_content(div), "1 < 2");
        assert_eq!(document.inner_html(div), "1 &lt; 2");
    }

    #[test]
    fn listeners_are_tracked_per_event() {
        let mut document = MemoryDocument::parse("<button></button>").unwrap();
        let button = document.elements_by_tag("button")[0];
        document.add_listener(button, "click", ListenerKey(1));
        document.add_listener(button, "focus", ListenerKey(2));
        assert_eq!(document.listeners(button, "click"), vec![ListenerKey(1)]);

        document.remove_listener(button, "click", ListenerKey(1));
        assert!(document.listeners(button, "click").is_empty());
        assert_eq!(document.listener_count(), 1);
    }

    #[test]
    fn radio_group_lookup() {
        let document = MemoryDocument::parse(
            "<input type=\"radio\" name=\"c\" value=\"r\"><input type=\"radio\" name=\"c\" value=\"g\"><input type=\"radio\" name=\"d\">",
        )
        .unwrap();
        assert_eq!(document.radio_group("c").len(), 2);
    }
}
