//! Proptest strategies for random documents.
//!
//! Strategies produce plain [`TreeShape`] values, which shrink well and are
//! `Send`; call [`TreeShape::build`] inside the test body to get a live
//! [`MockNode`] tree.
//!
//! ```rust,ignore
//! proptest! {
//!     #[test]
//!     fn prop_walk_visits_everything(shape in arb_tree()) {
//!         let root = shape.build();
//!         // ...
//!     }
//! }
//! ```

use super::node::MockNode;

#[cfg(any(test, feature = "proptest"))]
use proptest::prelude::*;

/// Local names drawn by the strategies
pub const LOCAL_NAMES: &[&str] = &["vbox", "hbox", "button", "label", "tab", "menu", "checkbox"];

/// Shape of a random document subtree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeShape {
    /// Local name
    pub local_name: String,
    /// Access key, if any
    pub access_key: Option<char>,
    /// Whether the node is hidden
    pub hidden: bool,
    /// Children
    pub children: Vec<TreeShape>,
}

impl TreeShape {
    /// A leaf with no attributes
    #[must_use]
    pub fn leaf(local_name: impl Into<String>) -> Self {
        Self {
            local_name: local_name.into(),
            access_key: None,
            hidden: false,
            children: Vec::new(),
        }
    }

    /// Number of nodes, root included
    #[must_use]
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(Self::size).sum::<usize>()
    }

    /// Build a live tree; ids are `n0`, `n1`, ... in document pre-order
    #[must_use]
    pub fn build(&self) -> MockNode {
        let mut next = 0;
        self.build_with(&mut next)
    }

    fn build_with(&self, next: &mut usize) -> MockNode {
        let mut node = MockNode::element(self.local_name.clone()).with_attr("id", format!("n{next}"));
        *next += 1;
        if let Some(key) = self.access_key {
            node = node.with_attr("accesskey", key.to_string());
        }
        if self.hidden {
            node = node.with_attr("hidden", "true");
        }
        for child in &self.children {
            node.append_child(child.build_with(next));
        }
        node
    }
}

/// Any local name from [`LOCAL_NAMES`]
#[cfg(any(test, feature = "proptest"))]
pub fn arb_local_name() -> impl Strategy<Value = String> {
    prop::sample::select(LOCAL_NAMES).prop_map(String::from)
}

/// A random tree of up to four levels
#[cfg(any(test, feature = "proptest"))]
pub fn arb_tree() -> impl Strategy<Value = TreeShape> {
    let node = || {
        (
            arb_local_name(),
            prop::option::of(prop::char::range('a', 'f')),
            prop::bool::weighted(0.2),
        )
    };
    let leaf = node().prop_map(|(local_name, access_key, hidden)| TreeShape {
        local_name,
        access_key,
        hidden,
        children: Vec::new(),
    });
    leaf.prop_recursive(4, 48, 5, move |inner| {
        (node(), prop::collection::vec(inner, 0..5)).prop_map(
            |((local_name, access_key, hidden), children)| TreeShape {
                local_name,
                access_key,
                hidden,
                children,
            },
        )
    })
}
