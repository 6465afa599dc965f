//! Node collection and narrowing.
//!
//! A [`NodeCollector`] holds a root and a current selection. Queries replace
//! the selection; filters narrow it in place and chain:
//!
//! ```rust
//! use uiwalker::collector::NodeCollector;
//! use uiwalker::mock::MockNode;
//!
//! let root = MockNode::element("window").with_children(vec![
//!     MockNode::element("button").with_attr("id", "ok").with_attr("accesskey", "O"),
//!     MockNode::element("button").with_attr("id", "cancel"),
//! ]);
//! let mut collector = NodeCollector::new();
//! collector.set_root(Some(root)).unwrap();
//! collector.query_selector("button").unwrap().filter_by_attribute("accesskey", None);
//! assert_eq!(collector.len(), 1);
//! ```

use crate::node::TreeNode;
use crate::result::{WalkError, WalkResult};
use crate::selector::Selector;

/// Root plus the current selection of nodes
#[derive(Debug, Clone)]
pub struct NodeCollector<N: TreeNode> {
    root: Option<N>,
    nodes: Vec<N>,
}

impl<N: TreeNode> Default for NodeCollector<N> {
    fn default() -> Self {
        Self {
            root: None,
            nodes: Vec::new(),
        }
    }
}

impl<N: TreeNode> NodeCollector<N> {
    /// Create a collector without a root
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collector rooted at `root`
    #[must_use]
    pub fn with_root(root: N) -> Self {
        let root = root.contained_document().unwrap_or(root);
        Self {
            root: Some(root),
            nodes: Vec::new(),
        }
    }

    /// Set the root and clear the selection.
    ///
    /// A window-like container is replaced by the document it holds.
    pub fn set_root(&mut self, root: Option<N>) -> WalkResult<&mut Self> {
        let root = root.ok_or_else(|| WalkError::invalid_argument("collector root is missing"))?;
        self.root = Some(root.contained_document().unwrap_or(root));
        self.nodes.clear();
        Ok(self)
    }

    /// Current root
    #[must_use]
    pub fn root(&self) -> Option<&N> {
        self.root.as_ref()
    }

    fn require_root(&self) -> WalkResult<N> {
        self.root
            .clone()
            .ok_or_else(|| WalkError::invalid_argument("collector has no root"))
    }

    /// Replace the selection with the root's descendants matching `selector`
    pub fn query_selector(&mut self, selector: &str) -> WalkResult<&mut Self> {
        let root = self.require_root()?;
        let selector = Selector::parse(selector)?;
        self.nodes = selector.select_all(&root);
        tracing::trace!(%selector, matched = self.nodes.len(), "query_selector");
        Ok(self)
    }

    /// Replace the selection with the first anonymous node whose attribute
    /// `attribute` equals `value`.
    ///
    /// Anonymous content of the root and of every descendant is searched in
    /// document order. A miss leaves the selection empty.
    pub fn query_anonymous_node(&mut self, attribute: &str, value: &str) -> WalkResult<&mut Self> {
        let root = self.require_root()?;
        self.nodes = find_anonymous(&root, attribute, value).into_iter().collect();
        Ok(self)
    }

    /// Keep nodes for which `predicate` holds
    pub fn filter<F>(&mut self, predicate: F) -> &mut Self
    where
        F: Fn(&N) -> bool,
    {
        self.nodes.retain(|node| predicate(node));
        self
    }

    /// Keep nodes carrying `name`, equal to `value` when given
    pub fn filter_by_attribute(&mut self, name: &str, value: Option<&str>) -> &mut Self {
        self.filter(|node| value_matches(node.attribute(name), value))
    }

    /// Keep nodes whose property `name` is set, equal to `value` when given
    pub fn filter_by_property(&mut self, name: &str, value: Option<&str>) -> &mut Self {
        self.filter(|node| value_matches(node.property(name), value))
    }

    /// Keep nodes whose computed style `property` equals `value`
    pub fn filter_by_computed_style(&mut self, property: &str, value: &str) -> &mut Self {
        self.filter(|node| node.computed_style(property).as_deref() == Some(value))
    }

    /// Current selection in document order
    #[must_use]
    pub fn nodes(&self) -> &[N] {
        &self.nodes
    }

    /// Take the selection, leaving it empty
    pub fn take_nodes(&mut self) -> Vec<N> {
        std::mem::take(&mut self.nodes)
    }

    /// First selected node
    #[must_use]
    pub fn first(&self) -> Option<&N> {
        self.nodes.first()
    }

    /// Number of selected nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the selection is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn value_matches(actual: Option<String>, expected: Option<&str>) -> bool {
    match (actual, expected) {
        (Some(actual), Some(expected)) => actual == expected,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

fn find_anonymous<N: TreeNode>(node: &N, attribute: &str, value: &str) -> Option<N> {
    node.anonymous_nodes()
        .into_iter()
        .find(|anon| anon.attribute(attribute).as_deref() == Some(value))
        .or_else(|| {
            node.child_nodes()
                .iter()
                .find_map(|child| find_anonymous(child, attribute, value))
        })
}
