//! Tree node abstraction over the host's live document.
//!
//! The walker never owns the document. Hosts expose their nodes through
//! [`TreeNode`], a cheap clonable handle compared by identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Boolean visibility flags consulted by filters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFlags {
    /// Node is disabled
    pub disabled: bool,
    /// Node is collapsed
    pub collapsed: bool,
    /// Node is hidden
    pub hidden: bool,
}

impl NodeFlags {
    /// Read the flags from `disabled`, `collapsed` and `hidden` attributes
    #[must_use]
    pub fn from_attributes<N: TreeNode>(node: &N) -> Self {
        let flag = |name: &str| node.attribute(name).is_some_and(|v| v == "true");
        Self {
            disabled: flag("disabled"),
            collapsed: flag("collapsed"),
            hidden: flag("hidden"),
        }
    }

    /// Whether any flag makes the node invisible or inert
    #[must_use]
    pub const fn any(&self) -> bool {
        self.disabled || self.collapsed || self.hidden
    }
}

/// Screen geometry of a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxObject {
    /// X relative to the window
    pub x: i32,
    /// Y relative to the window
    pub y: i32,
    /// Width
    pub width: i32,
    /// Height
    pub height: i32,
    /// X on screen
    pub screen_x: i32,
    /// Y on screen
    pub screen_y: i32,
}

impl BoxObject {
    /// Create a box whose screen position equals its window position
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            screen_x: x,
            screen_y: y,
        }
    }

    /// Set the screen position
    #[must_use]
    pub const fn with_screen(mut self, screen_x: i32, screen_y: i32) -> Self {
        self.screen_x = screen_x;
        self.screen_y = screen_y;
        self
    }

    /// Right edge in screen coordinates
    #[must_use]
    pub const fn screen_right(&self) -> i32 {
        self.screen_x.saturating_add(self.width)
    }

    /// Bottom edge in screen coordinates
    #[must_use]
    pub const fn screen_bottom(&self) -> i32 {
        self.screen_y.saturating_add(self.height)
    }
}

/// Read access to a node of the host document.
///
/// Only `local_name`, `child_nodes`, `parent_node` and `attribute` are
/// required. The remaining methods have defaults derived from attributes so
/// simple hosts stay simple.
pub trait TreeNode: Clone + PartialEq + fmt::Debug {
    /// Local (tag) name
    fn local_name(&self) -> String;

    /// Children in document order
    fn child_nodes(&self) -> Vec<Self>;

    /// Parent node, `None` for the document root
    fn parent_node(&self) -> Option<Self>;

    /// Attribute value
    fn attribute(&self, name: &str) -> Option<String>;

    /// Attribute presence
    fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Script-level property value (falls back to the attribute)
    fn property(&self, name: &str) -> Option<String> {
        self.attribute(name)
    }

    /// Computed style value
    fn computed_style(&self, _property: &str) -> Option<String> {
        None
    }

    /// Visibility flags
    fn flags(&self) -> NodeFlags {
        NodeFlags::from_attributes(self)
    }

    /// Access key, if any
    fn access_key(&self) -> Option<String> {
        self.attribute("accesskey")
    }

    /// Screen geometry, if the node is laid out
    fn box_object(&self) -> Option<BoxObject> {
        None
    }

    /// Anonymous (implementation-internal) content bound to this node
    fn anonymous_nodes(&self) -> Vec<Self> {
        Vec::new()
    }

    /// Buttons that live outside `child_nodes` (dialog button boxes)
    fn hidden_buttons(&self) -> Vec<Self> {
        Vec::new()
    }

    /// Document held by a window-like container
    fn contained_document(&self) -> Option<Self> {
        None
    }

    /// Element id
    fn id(&self) -> Option<String> {
        self.attribute("id")
    }

    /// Whether the node is the selected entry of its container
    fn is_selected(&self) -> bool {
        self.property("selected").is_some_and(|v| v == "true")
    }
}

/// Short human-readable description used in logs and reports
#[must_use]
pub fn describe<N: TreeNode>(node: &N) -> String {
    match node.id() {
        Some(id) => format!("{}#{}", node.local_name(), id),
        None => match node.attribute("label") {
            Some(label) => format!("{}[label={label:?}]", node.local_name()),
            None => node.local_name(),
        },
    }
}

/// All descendants of `root` in document pre-order, excluding `root`
#[must_use]
pub fn descendants<N: TreeNode>(root: &N) -> Vec<N> {
    let mut out = Vec::new();
    collect_descendants(root, &mut out);
    out
}

fn collect_descendants<N: TreeNode>(node: &N, out: &mut Vec<N>) {
    for child in node.child_nodes() {
        out.push(child.clone());
        collect_descendants(&child, out);
    }
}

/// First node with the given id in `root`'s subtree, `root` included
#[must_use]
pub fn element_by_id<N: TreeNode>(root: &N, id: &str) -> Option<N> {
    if root.id().as_deref() == Some(id) {
        return Some(root.clone());
    }
    root.child_nodes()
        .iter()
        .find_map(|child| element_by_id(child, id))
}

/// Walk up to the topmost ancestor
#[must_use]
pub fn root_of<N: TreeNode>(node: &N) -> N {
    let mut current = node.clone();
    while let Some(parent) = current.parent_node() {
        current = parent;
    }
    current
}

/// How a navigation anchor makes its surface current.
///
/// Resolved once per descriptor from the anchor's local name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnchorKind {
    /// Tab in a tab strip
    Tab,
    /// Radio button
    Radio,
    /// Entry of a list box
    ListItem,
    /// Entry of a menu list
    MenuItem,
    /// Preference pane of a preference window
    PrefPane,
    /// Anything else: activated by a click
    Generic,
}

const ANCHOR_KINDS: &[(&str, AnchorKind)] = &[
    ("tab", AnchorKind::Tab),
    ("radio", AnchorKind::Radio),
    ("listitem", AnchorKind::ListItem),
    ("richlistitem", AnchorKind::ListItem),
    ("menuitem", AnchorKind::MenuItem),
    ("prefpane", AnchorKind::PrefPane),
];

impl AnchorKind {
    /// Classify a node
    #[must_use]
    pub fn of<N: TreeNode>(node: &N) -> Self {
        let name = node.local_name();
        ANCHOR_KINDS
            .iter()
            .find(|(local_name, _)| name.eq_ignore_ascii_case(local_name))
            .map_or(Self::Generic, |(_, kind)| *kind)
    }

    /// Whether activation is a selection that can already be in effect
    #[must_use]
    pub const fn is_selectable(&self) -> bool {
        !matches!(self, Self::Generic)
    }

    /// Whether the anchor's surface is already current
    #[must_use]
    pub fn is_current<N: TreeNode>(&self, node: &N) -> bool {
        match self {
            Self::PrefPane => {
                let current = node
                    .parent_node()
                    .and_then(|window| window.property("currentPane"));
                current.is_some() && current == node.id()
            }
            Self::Generic => false,
            _ => node.is_selected(),
        }
    }
}

impl fmt::Display for AnchorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Tab => "tab",
            Self::Radio => "radio",
            Self::ListItem => "listitem",
            Self::MenuItem => "menuitem",
            Self::PrefPane => "prefpane",
            Self::Generic => "generic",
        };
        f.write_str(name)
    }
}
