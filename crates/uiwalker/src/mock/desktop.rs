//! Scripted in-memory desktop.
//!
//! Implements [`WindowHost`] and [`UiDriver`] over [`MockNode`] documents.
//! Clicking or selecting an anchor with a registered template opens a new
//! window built from it. Every action is logged for later assertions.
//!
//! With blocking modals enabled, an action that opens a window does not
//! return until that window is gone, like a native modal loop. Closing a
//! window also closes the windows registered as its dependents.

use super::node::MockNode;
use crate::driver::UiDriver;
use crate::node::{describe, AnchorKind, TreeNode};
use crate::result::{WalkError, WalkResult};
use crate::windows::{WindowEvent, WindowEventBus, WindowHost, WindowId, WindowInfo};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Modal loop turns before an unhandled blocking modal is dismissed
const MODAL_LOOP_TURNS: usize = 64;

/// Builds the document of a window each time it opens
#[derive(Clone)]
pub struct WindowTemplate(Rc<dyn Fn() -> MockNode>);

impl WindowTemplate {
    /// Wrap a document factory
    pub fn new<F>(build: F) -> Self
    where
        F: Fn() -> MockNode + 'static,
    {
        Self(Rc::new(build))
    }

    /// Build a fresh document
    #[must_use]
    pub fn build(&self) -> MockNode {
        (self.0)()
    }
}

impl std::fmt::Debug for WindowTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowTemplate").finish_non_exhaustive()
    }
}

/// Action recorded by [`MockDesktop`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockAction {
    /// Node clicked (by description)
    Click(String),
    /// Node selected (by description)
    Select(String),
    /// Window close requested
    Close(WindowId),
}

/// In-memory window manager and UI driver
#[derive(Debug, Default)]
pub struct MockDesktop {
    windows: RefCell<Vec<(WindowInfo, MockNode)>>,
    bus: WindowEventBus,
    next_id: Cell<u64>,
    hidden: Cell<Option<WindowId>>,
    templates: RefCell<HashMap<String, WindowTemplate>>,
    failing: RefCell<HashSet<String>>,
    deferred_close: Cell<bool>,
    blocking_modals: Cell<bool>,
    dependents: RefCell<HashMap<WindowId, Vec<WindowId>>>,
    pending: RefCell<Vec<WindowEvent>>,
    actions: RefCell<Vec<MockAction>>,
    closed: Cell<usize>,
}

impl MockDesktop {
    /// Create an empty desktop
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a window from `template` and announce it
    pub fn open_window(&self, template: &WindowTemplate) -> WindowInfo {
        let document = template.build();
        let id = self.allocate_id();
        let info = WindowInfo::from_document(id, &document);
        self.windows.borrow_mut().push((info.clone(), document));
        tracing::trace!(window = %info, "mock window opened");
        self.bus.publish(WindowEvent::Ready(info.clone()));
        info
    }

    /// Open the reserved hidden window; it is not announced
    pub fn open_hidden_window(&self) -> WindowInfo {
        let document = MockNode::element("window").with_attr("windowtype", "hidden");
        let id = self.allocate_id();
        let info = WindowInfo::from_document(id, &document);
        self.windows.borrow_mut().push((info.clone(), document));
        self.hidden.set(Some(id));
        info
    }

    /// Open a window from `template` whenever the anchor with `anchor_id`
    /// is clicked or selected
    pub fn on_click_open(&self, anchor_id: impl Into<String>, template: WindowTemplate) {
        self.templates.borrow_mut().insert(anchor_id.into(), template);
    }

    /// Make every action on the anchor with `anchor_id` fail
    pub fn fail_action_on(&self, anchor_id: impl Into<String>) {
        self.failing.borrow_mut().insert(anchor_id.into());
    }

    /// Hold destroyed notifications until the next `process_events`
    pub fn set_deferred_close(&self, deferred: bool) {
        self.deferred_close.set(deferred);
    }

    /// Make actions that open a window block until it closes.
    ///
    /// While blocked the action runs the caller's modal loop. A modal still
    /// open after that is dismissed before the action returns.
    pub fn set_blocking_modals(&self, blocking: bool) {
        self.blocking_modals.set(blocking);
    }

    /// Close `dependent` whenever `owner` is closed
    pub fn close_with(&self, owner: WindowId, dependent: WindowId) {
        self.dependents
            .borrow_mut()
            .entry(owner)
            .or_default()
            .push(dependent);
    }

    /// Whether `window` is open
    #[must_use]
    pub fn is_open(&self, window: &WindowId) -> bool {
        self.windows.borrow().iter().any(|(info, _)| info.id == *window)
    }

    /// Actions performed so far
    #[must_use]
    pub fn actions(&self) -> Vec<MockAction> {
        self.actions.borrow().clone()
    }

    /// Number of open windows, hidden window included
    #[must_use]
    pub fn window_count(&self) -> usize {
        self.windows.borrow().len()
    }

    /// Number of windows closed so far
    #[must_use]
    pub fn closed_count(&self) -> usize {
        self.closed.get()
    }

    fn allocate_id(&self) -> WindowId {
        let next = self.next_id.get() + 1;
        self.next_id.set(next);
        WindowId(next)
    }

    fn perform(&self, node: &MockNode, action: MockAction) -> WalkResult<Option<WindowInfo>> {
        self.actions.borrow_mut().push(action);
        let Some(id) = node.id() else {
            return Ok(None);
        };
        if self.failing.borrow().contains(&id) {
            return Err(WalkError::action(format!("{} refused", describe(node))));
        }
        let template = self.templates.borrow().get(&id).cloned();
        Ok(template.map(|template| self.open_window(&template)))
    }

    fn block_on(&self, opened: Option<WindowInfo>, modal_loop: &mut dyn FnMut()) -> WalkResult<()> {
        let Some(info) = opened.filter(|_| self.blocking_modals.get()) else {
            return Ok(());
        };
        for _ in 0..MODAL_LOOP_TURNS {
            if !self.is_open(&info.id) {
                return Ok(());
            }
            modal_loop();
        }
        if self.is_open(&info.id) {
            tracing::trace!(window = %info, "dismissing unhandled modal");
            self.close_window(&info.id)?;
        }
        Ok(())
    }

    fn remove_window(&self, window: &WindowId) -> bool {
        let removed = {
            let mut windows = self.windows.borrow_mut();
            let before = windows.len();
            windows.retain(|(info, _)| info.id != *window);
            before != windows.len()
        };
        if !removed {
            return false;
        }
        self.closed.set(self.closed.get() + 1);
        let event = WindowEvent::Destroyed(*window);
        if self.deferred_close.get() {
            self.pending.borrow_mut().push(event);
        } else {
            self.bus.publish(event);
        }
        let dependents = self.dependents.borrow_mut().remove(window).unwrap_or_default();
        for dependent in dependents {
            self.remove_window(&dependent);
        }
        true
    }
}

fn mark_selected(node: &MockNode) {
    let name = node.local_name();
    if let Some(parent) = node.parent_node() {
        for sibling in parent.child_nodes() {
            if sibling.local_name() == name {
                sibling.set_property("selected", "false");
            }
        }
    }
    node.set_property("selected", "true");
}

impl WindowHost for MockDesktop {
    type Node = MockNode;

    fn windows(&self) -> Vec<WindowInfo> {
        self.windows
            .borrow()
            .iter()
            .map(|(info, _)| info.clone())
            .collect()
    }

    fn document(&self, window: &WindowId) -> Option<MockNode> {
        self.windows
            .borrow()
            .iter()
            .find(|(info, _)| info.id == *window)
            .map(|(_, document)| document.clone())
    }

    fn close_window(&self, window: &WindowId) -> WalkResult<()> {
        self.actions.borrow_mut().push(MockAction::Close(*window));
        if self.remove_window(window) {
            Ok(())
        } else {
            Err(WalkError::invalid_argument(format!("{window} is not open")))
        }
    }

    fn events(&self) -> &WindowEventBus {
        &self.bus
    }

    fn process_events(&self) {
        let pending: Vec<_> = self.pending.borrow_mut().drain(..).collect();
        for event in pending {
            self.bus.publish(event);
        }
    }

    fn hidden_window(&self) -> Option<WindowId> {
        self.hidden.get()
    }
}

impl UiDriver for MockDesktop {
    fn click(&self, node: &MockNode) -> WalkResult<()> {
        self.click_modal(node, &mut || {})
    }

    fn select(&self, node: &MockNode) -> WalkResult<()> {
        self.select_modal(node, &mut || {})
    }

    fn click_modal(&self, node: &MockNode, modal_loop: &mut dyn FnMut()) -> WalkResult<()> {
        let opened = self.perform(node, MockAction::Click(describe(node)))?;
        self.block_on(opened, modal_loop)
    }

    fn select_modal(&self, node: &MockNode, modal_loop: &mut dyn FnMut()) -> WalkResult<()> {
        let opened = self.perform(node, MockAction::Select(describe(node)))?;
        match AnchorKind::of(node) {
            AnchorKind::PrefPane => {
                if let (Some(window), Some(id)) = (node.parent_node(), node.id()) {
                    window.set_property("currentPane", id);
                }
            }
            AnchorKind::Generic => {}
            _ => mark_selected(node),
        }
        self.block_on(opened, modal_loop)
    }
}
