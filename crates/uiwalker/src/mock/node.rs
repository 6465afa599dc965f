//! In-memory document nodes.
//!
//! Built with consuming builders and shared through `Rc`, so a handle taken
//! from a tree observes later mutations made through any other handle, the
//! way a live document does.

use crate::node::{BoxObject, TreeNode};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

#[derive(Default)]
struct NodeData {
    local_name: String,
    attributes: Vec<(String, String)>,
    properties: HashMap<String, String>,
    styles: HashMap<String, String>,
    children: Vec<MockNode>,
    parent: Weak<RefCell<NodeData>>,
    anonymous: Vec<MockNode>,
    buttons: Vec<MockNode>,
    document: Option<MockNode>,
    box_object: Option<BoxObject>,
}

/// Handle to an in-memory node, compared by identity
#[derive(Clone)]
pub struct MockNode(Rc<RefCell<NodeData>>);

impl PartialEq for MockNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for MockNode {}

impl std::fmt::Debug for MockNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.0.borrow();
        f.debug_struct("MockNode")
            .field("local_name", &data.local_name)
            .field("attributes", &data.attributes)
            .field("children", &data.children.len())
            .finish_non_exhaustive()
    }
}

impl MockNode {
    /// Create an element with no attributes or children
    #[must_use]
    pub fn element(local_name: impl Into<String>) -> Self {
        Self(Rc::new(RefCell::new(NodeData {
            local_name: local_name.into(),
            ..NodeData::default()
        })))
    }

    /// Add an attribute
    #[must_use]
    pub fn with_attr(self, name: &str, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Add a script-level property
    #[must_use]
    pub fn with_property(self, name: &str, value: impl Into<String>) -> Self {
        self.set_property(name, value);
        self
    }

    /// Add a computed style value
    #[must_use]
    pub fn with_style(self, property: &str, value: impl Into<String>) -> Self {
        self.0
            .borrow_mut()
            .styles
            .insert(property.to_string(), value.into());
        self
    }

    /// Append a child
    #[must_use]
    pub fn with_child(self, child: Self) -> Self {
        self.append_child(child);
        self
    }

    /// Append children in order
    #[must_use]
    pub fn with_children(self, children: Vec<Self>) -> Self {
        for child in children {
            self.append_child(child);
        }
        self
    }

    /// Bind anonymous content
    #[must_use]
    pub fn with_anonymous(self, nodes: Vec<Self>) -> Self {
        for node in &nodes {
            node.0.borrow_mut().parent = Rc::downgrade(&self.0);
        }
        self.0.borrow_mut().anonymous.extend(nodes);
        self
    }

    /// Attach buttons that are not part of the child list
    #[must_use]
    pub fn with_buttons(self, buttons: Vec<Self>) -> Self {
        for button in &buttons {
            button.0.borrow_mut().parent = Rc::downgrade(&self.0);
        }
        self.0.borrow_mut().buttons.extend(buttons);
        self
    }

    /// Set the screen geometry
    #[must_use]
    pub fn with_box(self, box_object: BoxObject) -> Self {
        self.0.borrow_mut().box_object = Some(box_object);
        self
    }

    /// Make this node a container of another document
    #[must_use]
    pub fn with_document(self, document: Self) -> Self {
        self.0.borrow_mut().document = Some(document);
        self
    }

    /// Set or replace an attribute
    pub fn set_attribute(&self, name: &str, value: impl Into<String>) {
        let value = value.into();
        let mut data = self.0.borrow_mut();
        match data.attributes.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => data.attributes.push((name.to_string(), value)),
        }
    }

    /// Remove an attribute
    pub fn remove_attribute(&self, name: &str) {
        self.0.borrow_mut().attributes.retain(|(n, _)| n != name);
    }

    /// Set or replace a property
    pub fn set_property(&self, name: &str, value: impl Into<String>) {
        self.0
            .borrow_mut()
            .properties
            .insert(name.to_string(), value.into());
    }

    /// Append a child, re-parenting it
    pub fn append_child(&self, child: Self) {
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        self.0.borrow_mut().children.push(child);
    }
}

impl TreeNode for MockNode {
    fn local_name(&self) -> String {
        self.0.borrow().local_name.clone()
    }

    fn child_nodes(&self) -> Vec<Self> {
        self.0.borrow().children.clone()
    }

    fn parent_node(&self) -> Option<Self> {
        self.0.borrow().parent.upgrade().map(Self)
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0
            .borrow()
            .attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn property(&self, name: &str) -> Option<String> {
        let property = self.0.borrow().properties.get(name).cloned();
        property.or_else(|| self.attribute(name))
    }

    fn computed_style(&self, property: &str) -> Option<String> {
        self.0.borrow().styles.get(property).cloned()
    }

    fn box_object(&self) -> Option<BoxObject> {
        self.0.borrow().box_object
    }

    fn anonymous_nodes(&self) -> Vec<Self> {
        self.0.borrow().anonymous.clone()
    }

    fn hidden_buttons(&self) -> Vec<Self> {
        self.0.borrow().buttons.clone()
    }

    fn contained_document(&self) -> Option<Self> {
        self.0.borrow().document.clone()
    }
}
