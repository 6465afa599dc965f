//! Localization checks built on the walker.
//!
//! Two visitors cover the common regressions of a translated UI:
//!
//! - [`AccessKeyChecker`] collects access keys per surface and flags keys
//!   used by more than one control.
//! - [`CroppedElementChecker`] compares each laid-out node with its parent
//!   and flags the sides where it sticks out.
//!
//! Both record one report per walked surface and serialize with `serde`.

use crate::node::{describe, BoxObject, TreeNode};
use crate::result::WalkResult;
use crate::walker::{FilterResult, NodeVisitor, WalkContext};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;

/// Containers whose access keys are checked with menus, not with the surface
const MENU_CONTAINERS: &[&str] = &["menu", "menubar", "menupopup", "popupset"];

/// Whether `node` is an inactive pane or panel of its container.
///
/// Preference panes compare against the window's `currentPane`, tab panels
/// and deck panels against the container's `selectedPanel`. A container that
/// does not report its current child hides nothing.
fn is_inactive_panel<N: TreeNode>(node: &N) -> bool {
    let Some(parent) = node.parent_node() else {
        return false;
    };
    let current = match parent.local_name().as_str() {
        "prefwindow" => parent.property("currentPane"),
        "tabpanels" | "deck" => parent.property("selectedPanel"),
        _ => return false,
    };
    current.is_some_and(|current| Some(current) != node.id())
}

fn surface_name<N: TreeNode>(context: &WalkContext<N>) -> String {
    match &context.window {
        Some(window) => format!("{window} {}", describe(&context.root)),
        None => describe(&context.root),
    }
}

// =============================================================================
// ACCESS KEYS
// =============================================================================

/// Filter for access key checks.
///
/// Rejects inert nodes, menu containers and inactive panels, accepts nodes
/// carrying an access key and skips everything else.
pub fn access_key_filter<N: TreeNode>(node: &N) -> FilterResult {
    if node.flags().any() {
        return FilterResult::Reject;
    }
    let name = node.local_name();
    if MENU_CONTAINERS.contains(&name.as_str()) || is_inactive_panel(node) {
        return FilterResult::Reject;
    }
    if node.has_attribute("accesskey") {
        FilterResult::Accept
    } else {
        FilterResult::Skip
    }
}

/// `(key, node)` pairs for an accepted node
pub fn access_key_entries<N: TreeNode>(node: &N) -> Vec<(String, N)> {
    node.access_key()
        .filter(|key| !key.is_empty())
        .map(|key| (key, node.clone()))
        .into_iter()
        .collect()
}

/// Keys bound to more than one node, compared case-insensitively.
///
/// Groups come back in key order; nodes keep their traversal order.
pub fn find_duplicate_access_keys<N: TreeNode>(entries: &[(String, N)]) -> Vec<(String, Vec<N>)> {
    let mut groups: BTreeMap<String, Vec<N>> = BTreeMap::new();
    for (key, node) in entries {
        groups.entry(key.to_lowercase()).or_default().push(node.clone());
    }
    groups.into_iter().filter(|(_, nodes)| nodes.len() > 1).collect()
}

/// One access key found on a surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessKeyEntry {
    /// Key as declared
    pub key: String,
    /// Node description
    pub node: String,
}

/// A key shared by several nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateAccessKey {
    /// Lower-cased key
    pub key: String,
    /// Descriptions of the nodes sharing it
    pub nodes: Vec<String>,
}

/// Access keys of one walked surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessKeyReport {
    /// Surface description
    pub surface: String,
    /// Walk depth the surface was reached at
    pub depth: usize,
    /// Every key found, in traversal order
    pub entries: Vec<AccessKeyEntry>,
    /// Keys used more than once
    pub duplicates: Vec<DuplicateAccessKey>,
}

impl AccessKeyReport {
    /// Whether the surface has no conflicting keys
    #[must_use]
    pub fn passed(&self) -> bool {
        self.duplicates.is_empty()
    }
}

impl fmt::Display for AccessKeyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} access keys", self.surface, self.entries.len())?;
        for duplicate in &self.duplicates {
            write!(f, "\n  '{}' used by {}", duplicate.key, duplicate.nodes.join(", "))?;
        }
        Ok(())
    }
}

/// Visitor recording an [`AccessKeyReport`] per surface
#[derive(Debug, Default)]
pub struct AccessKeyChecker {
    reports: RefCell<Vec<AccessKeyReport>>,
}

impl AccessKeyChecker {
    /// Create an empty checker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports recorded so far
    #[must_use]
    pub fn reports(&self) -> Vec<AccessKeyReport> {
        self.reports.borrow().clone()
    }

    /// Reports with duplicate keys
    #[must_use]
    pub fn failures(&self) -> Vec<AccessKeyReport> {
        self.reports.borrow().iter().filter(|r| !r.passed()).cloned().collect()
    }

    /// Reports as pretty JSON
    pub fn to_json(&self) -> WalkResult<String> {
        Ok(serde_json::to_string_pretty(&*self.reports.borrow())?)
    }
}

impl<N: TreeNode> NodeVisitor<N> for AccessKeyChecker {
    type Output = (String, N);

    fn filter(&self, node: &N) -> FilterResult {
        access_key_filter(node)
    }

    fn test(&self, node: &N) -> Vec<(String, N)> {
        access_key_entries(node)
    }

    fn results(&self, results: Vec<(String, N)>, context: &WalkContext<N>) -> WalkResult<()> {
        let duplicates: Vec<DuplicateAccessKey> = find_duplicate_access_keys(&results)
            .into_iter()
            .map(|(key, nodes)| DuplicateAccessKey {
                key,
                nodes: nodes.iter().map(describe).collect(),
            })
            .collect();
        let report = AccessKeyReport {
            surface: surface_name(context),
            depth: context.depth,
            entries: results
                .iter()
                .map(|(key, node)| AccessKeyEntry {
                    key: key.clone(),
                    node: describe(node),
                })
                .collect(),
            duplicates,
        };
        if report.passed() {
            tracing::debug!(surface = %report.surface, keys = report.entries.len(), "access keys ok");
        } else {
            tracing::warn!(%report, "duplicate access keys");
        }
        self.reports.borrow_mut().push(report);
        Ok(())
    }
}

// =============================================================================
// CROPPED ELEMENTS
// =============================================================================

/// Filter for crop checks.
///
/// Rejects inert nodes and inactive panels, accepts laid-out nodes and skips
/// nodes without geometry.
pub fn cropped_filter<N: TreeNode>(node: &N) -> FilterResult {
    if node.flags().any() || is_inactive_panel(node) {
        return FilterResult::Reject;
    }
    if node.box_object().is_some() {
        FilterResult::Accept
    } else {
        FilterResult::Skip
    }
}

/// Side of the parent box a node crosses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropSide {
    /// Starts left of the parent
    Left,
    /// Ends right of the parent
    Right,
    /// Starts above the parent
    Top,
    /// Ends below the parent
    Bottom,
}

impl fmt::Display for CropSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Top => "top",
            Self::Bottom => "bottom",
        };
        f.write_str(name)
    }
}

/// Area of a node lying outside its parent, in window coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    /// X
    pub x: i32,
    /// Y
    pub y: i32,
    /// Width
    pub width: i32,
    /// Height
    pub height: i32,
}

/// One crossed side of a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crop {
    /// Side crossed
    pub side: CropSide,
    /// Overhanging area
    pub rect: CropRect,
}

/// Sides where `node` extends past its parent's box.
///
/// Horizontal sides only count for nodes with a height, vertical sides only
/// for nodes with a width. Nodes without a laid-out parent yield nothing.
#[must_use]
pub fn check_dimensions<N: TreeNode>(node: &N) -> Vec<Crop> {
    let Some(child) = node.box_object() else {
        return Vec::new();
    };
    let Some(parent) = node.parent_node().and_then(|p| p.box_object()) else {
        return Vec::new();
    };
    crops_between(&child, &parent)
}

fn crops_between(child: &BoxObject, parent: &BoxObject) -> Vec<Crop> {
    let mut crops = Vec::new();
    let offset_x = parent.x.saturating_sub(parent.screen_x);
    let offset_y = parent.y.saturating_sub(parent.screen_y);
    if child.height > 0 {
        if child.screen_x < parent.screen_x {
            crops.push(Crop {
                side: CropSide::Left,
                rect: CropRect {
                    x: child.x,
                    y: child.y,
                    width: parent.screen_x.saturating_sub(child.screen_x),
                    height: child.height,
                },
            });
        }
        if child.screen_right() > parent.screen_right() {
            crops.push(Crop {
                side: CropSide::Right,
                rect: CropRect {
                    x: parent.screen_right().saturating_add(offset_x),
                    y: child.y,
                    width: child.screen_right().saturating_sub(parent.screen_right()),
                    height: child.height,
                },
            });
        }
    }
    if child.width > 0 {
        if child.screen_y < parent.screen_y {
            crops.push(Crop {
                side: CropSide::Top,
                rect: CropRect {
                    x: child.x,
                    y: child.y,
                    width: child.width,
                    height: parent.screen_y.saturating_sub(child.screen_y),
                },
            });
        }
        if child.screen_bottom() > parent.screen_bottom() {
            crops.push(Crop {
                side: CropSide::Bottom,
                rect: CropRect {
                    x: child.x,
                    y: parent.screen_bottom().saturating_add(offset_y),
                    width: child.width,
                    height: child.screen_bottom().saturating_sub(parent.screen_bottom()),
                },
            });
        }
    }
    crops
}

/// A node with at least one crossed side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CroppedNode {
    /// Node description
    pub node: String,
    /// Crossed sides
    pub crops: Vec<Crop>,
}

/// Cropped nodes of one walked surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropReport {
    /// Surface description
    pub surface: String,
    /// Walk depth the surface was reached at
    pub depth: usize,
    /// Number of nodes checked
    pub checked: usize,
    /// Nodes sticking out of their parent
    pub cropped: Vec<CroppedNode>,
}

impl CropReport {
    /// Whether no node was cropped
    #[must_use]
    pub fn passed(&self) -> bool {
        self.cropped.is_empty()
    }
}

/// Visitor recording a [`CropReport`] per surface
#[derive(Debug, Default)]
pub struct CroppedElementChecker {
    reports: RefCell<Vec<CropReport>>,
}

impl CroppedElementChecker {
    /// Create an empty checker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports recorded so far
    #[must_use]
    pub fn reports(&self) -> Vec<CropReport> {
        self.reports.borrow().clone()
    }

    /// Reports with cropped nodes
    #[must_use]
    pub fn failures(&self) -> Vec<CropReport> {
        self.reports.borrow().iter().filter(|r| !r.passed()).cloned().collect()
    }

    /// Reports as pretty JSON
    pub fn to_json(&self) -> WalkResult<String> {
        Ok(serde_json::to_string_pretty(&*self.reports.borrow())?)
    }
}

impl<N: TreeNode> NodeVisitor<N> for CroppedElementChecker {
    /// `(node, crops)`; empty crops mean the node fits
    type Output = (N, Vec<Crop>);

    fn filter(&self, node: &N) -> FilterResult {
        cropped_filter(node)
    }

    fn test(&self, node: &N) -> Vec<(N, Vec<Crop>)> {
        vec![(node.clone(), check_dimensions(node))]
    }

    fn results(&self, results: Vec<(N, Vec<Crop>)>, context: &WalkContext<N>) -> WalkResult<()> {
        let checked = results.len();
        let cropped: Vec<CroppedNode> = results
            .into_iter()
            .filter(|(_, crops)| !crops.is_empty())
            .map(|(node, crops)| CroppedNode {
                node: describe(&node),
                crops,
            })
            .collect();
        let report = CropReport {
            surface: surface_name(context),
            depth: context.depth,
            checked,
            cropped,
        };
        for node in &report.cropped {
            let sides: Vec<String> = node.crops.iter().map(|c| c.side.to_string()).collect();
            tracing::warn!(surface = %report.surface, node = %node.node, sides = %sides.join(","), "cropped element");
        }
        self.reports.borrow_mut().push(report);
        Ok(())
    }
}
