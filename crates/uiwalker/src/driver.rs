//! UI action primitive.
//!
//! The walker never synthesizes input itself. Anchors are activated through
//! a [`UiDriver`] supplied by the host, which is also its [`WindowHost`].
//!
//! ```text
//! ┌──────────────┐  click/select  ┌──────────────┐
//! │  DomWalker   │ ─────────────► │   UiDriver   │
//! │              │                │ (WindowHost) │
//! │              │ ◄───────────── │              │
//! └──────────────┘  ready/destroy └──────────────┘
//! ```

use crate::node::{describe, AnchorKind, TreeNode};
use crate::result::WalkResult;
use crate::windows::WindowHost;

/// Host primitive that performs user actions on nodes
pub trait UiDriver: WindowHost {
    /// Click a node
    fn click(&self, node: &Self::Node) -> WalkResult<()>;

    /// Make a selectable node (tab, radio, list entry, pane) current
    fn select(&self, node: &Self::Node) -> WalkResult<()>;

    /// Click a node whose action may open a modal window.
    ///
    /// A host whose click blocks until the modal closes must call
    /// `modal_loop` repeatedly from inside its modal loop. The default clicks
    /// and returns without calling it.
    fn click_modal(&self, node: &Self::Node, _modal_loop: &mut dyn FnMut()) -> WalkResult<()> {
        self.click(node)
    }

    /// [`select`](Self::select) counterpart of [`click_modal`](Self::click_modal)
    fn select_modal(&self, node: &Self::Node, _modal_loop: &mut dyn FnMut()) -> WalkResult<()> {
        self.select(node)
    }
}

/// Activate an anchor the way its kind expects: selectable kinds are
/// selected, everything else is clicked.
pub fn activate<D: UiDriver + ?Sized>(driver: &D, kind: AnchorKind, node: &D::Node) -> WalkResult<()> {
    tracing::debug!(anchor = %describe(node), %kind, "activating anchor");
    if kind.is_selectable() {
        driver.select(node)
    } else {
        driver.click(node)
    }
}

/// [`activate`] for anchors expected to open a modal window
pub fn activate_modal<D: UiDriver + ?Sized>(
    driver: &D,
    kind: AnchorKind,
    node: &D::Node,
    modal_loop: &mut dyn FnMut(),
) -> WalkResult<()> {
    tracing::debug!(anchor = %describe(node), %kind, "activating modal anchor");
    if kind.is_selectable() {
        driver.select_modal(node, modal_loop)
    } else {
        driver.click_modal(node, modal_loop)
    }
}

/// Whether activation can be skipped because the anchor is already current
#[must_use]
pub fn already_current<N: TreeNode>(kind: AnchorKind, node: &N) -> bool {
    kind.is_selectable() && kind.is_current(node)
}
