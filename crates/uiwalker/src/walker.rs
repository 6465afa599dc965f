//! Filtered document traversal with declarative navigation.
//!
//! A walk has three phases:
//!
//! 1. **Traverse** the root's descendants in document pre-order, asking the
//!    visitor's filter about each node and collecting test output for the
//!    accepted ones.
//! 2. **Dispatch** the collected results to the visitor, exactly once.
//! 3. **Navigate** each descriptor in order: open its surface, walk the
//!    descriptor's children there with a nested walker, and close whatever
//!    was opened before moving on.
//!
//! ```text
//!   walk(root)
//!     ├── traverse ──► results(..)
//!     ├── descriptor #paneMain   (select, nested walk, post-hook)
//!     └── descriptor #showCookies
//!           └── wait_for_open ──► nested walk ──► wait_for_closed
//! ```

use crate::config::WalkerConfig;
use crate::descriptor::{HookGuard, NavigationDescriptor, TargetKind};
use crate::driver::{activate, activate_modal, already_current, UiDriver};
use crate::node::{describe, root_of, AnchorKind, TreeNode};
use crate::result::{WalkError, WalkResult};
use crate::wait::{poll_until, WaitOptions};
use crate::windows::{first_error, ModalDialog, WindowInfo, WindowSync};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Verdict of a visitor's filter for one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterResult {
    /// Test the node and visit its children
    Accept,
    /// Visit the children without testing the node
    Skip,
    /// Exclude the node and its whole subtree
    Reject,
}

/// Where a batch of results came from
#[derive(Debug, Clone)]
pub struct WalkContext<N> {
    /// Root of the walked subtree
    pub root: N,
    /// Nesting depth (0 for the outermost walk)
    pub depth: usize,
    /// Window the walk is bound to, if any
    pub window: Option<WindowInfo>,
}

/// Caller-supplied callbacks of a walk
pub trait NodeVisitor<N: TreeNode> {
    /// Item produced by [`test`](Self::test)
    type Output;

    /// Decide whether a node is tested and whether its subtree is visited
    fn filter(&self, node: &N) -> FilterResult;

    /// Produce results for an accepted node
    fn test(&self, node: &N) -> Vec<Self::Output>;

    /// Receive the results of one walk, in traversal order
    fn results(&self, results: Vec<Self::Output>, context: &WalkContext<N>) -> WalkResult<()>;
}

/// [`NodeVisitor`] built from three closures
pub struct FnVisitor<F, T, R, O> {
    filter: F,
    test: T,
    results: R,
    _output: PhantomData<fn() -> O>,
}

impl<F, T, R, O> FnVisitor<F, T, R, O> {
    /// Wrap filter, test and results closures
    pub fn new<N>(filter: F, test: T, results: R) -> Self
    where
        N: TreeNode,
        F: Fn(&N) -> FilterResult,
        T: Fn(&N) -> Vec<O>,
        R: Fn(Vec<O>, &WalkContext<N>) -> WalkResult<()>,
    {
        Self {
            filter,
            test,
            results,
            _output: PhantomData,
        }
    }
}

impl<F, T, R, O> fmt::Debug for FnVisitor<F, T, R, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnVisitor").finish_non_exhaustive()
    }
}

impl<N, F, T, R, O> NodeVisitor<N> for FnVisitor<F, T, R, O>
where
    N: TreeNode,
    F: Fn(&N) -> FilterResult,
    T: Fn(&N) -> Vec<O>,
    R: Fn(Vec<O>, &WalkContext<N>) -> WalkResult<()>,
{
    type Output = O;

    fn filter(&self, node: &N) -> FilterResult {
        (self.filter)(node)
    }

    fn test(&self, node: &N) -> Vec<O> {
        (self.test)(node)
    }

    fn results(&self, results: Vec<O>, context: &WalkContext<N>) -> WalkResult<()> {
        (self.results)(results, context)
    }
}

/// Collect test output for the subtree below `root`.
///
/// `root` itself is not filtered. Hidden buttons of every visited node are
/// offered to the filter before its children and are tested but never
/// descended into.
pub fn traverse<N, V>(visitor: &V, root: &N) -> Vec<V::Output>
where
    N: TreeNode,
    V: NodeVisitor<N> + ?Sized,
{
    let mut results = Vec::new();
    traverse_into(visitor, root, &mut results);
    results
}

fn traverse_into<N, V>(visitor: &V, node: &N, results: &mut Vec<V::Output>)
where
    N: TreeNode,
    V: NodeVisitor<N> + ?Sized,
{
    for button in node.hidden_buttons() {
        if visitor.filter(&button) == FilterResult::Accept {
            results.extend(visitor.test(&button));
        }
    }
    for child in node.child_nodes() {
        match visitor.filter(&child) {
            FilterResult::Accept => {
                results.extend(visitor.test(&child));
                traverse_into(visitor, &child, results);
            }
            FilterResult::Skip => traverse_into(visitor, &child, results),
            FilterResult::Reject => {}
        }
    }
}

/// Walks documents and the surfaces its descriptors lead to
pub struct DomWalker<'w, D: UiDriver, V: NodeVisitor<D::Node>> {
    driver: &'w D,
    visitor: &'w V,
    options: WaitOptions,
    close_options: WaitOptions,
    window: Option<WindowInfo>,
    depth: usize,
}

impl<D: UiDriver, V: NodeVisitor<D::Node>> fmt::Debug for DomWalker<'_, D, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomWalker")
            .field("options", &self.options)
            .field("close_options", &self.close_options)
            .field("window", &self.window)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

impl<'w, D: UiDriver, V: NodeVisitor<D::Node>> DomWalker<'w, D, V> {
    /// Create a walker with default wait options
    #[must_use]
    pub fn new(driver: &'w D, visitor: &'w V) -> Self {
        Self {
            driver,
            visitor,
            options: WaitOptions::default(),
            close_options: WaitOptions::default(),
            window: None,
            depth: 0,
        }
    }

    /// Take wait options from a configuration
    #[must_use]
    pub fn with_config(mut self, config: &WalkerConfig) -> Self {
        self.options = config.wait_options();
        self.close_options = config.close_options();
        self
    }

    /// Options for opening waits and predicates
    #[must_use]
    pub fn with_wait_options(mut self, options: WaitOptions) -> Self {
        self.options = options;
        self
    }

    /// Options for closing waits
    #[must_use]
    pub fn with_close_options(mut self, options: WaitOptions) -> Self {
        self.close_options = options;
        self
    }

    /// Bind to a window; walks without an explicit root use its document
    #[must_use]
    pub fn in_window(mut self, window: WindowInfo) -> Self {
        self.window = Some(window);
        self
    }

    /// Nesting depth
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    fn nested(&self, window: Option<WindowInfo>) -> Self {
        Self {
            driver: self.driver,
            visitor: self.visitor,
            options: self.options,
            close_options: self.close_options,
            window,
            depth: self.depth + 1,
        }
    }

    fn sync(&self) -> WindowSync<'w, D> {
        WindowSync::with_options(self.driver, self.options).with_close_options(self.close_options)
    }

    fn resolve_root(&self, root: Option<&D::Node>) -> WalkResult<D::Node> {
        let root = match (root, &self.window) {
            (Some(root), _) => root.clone(),
            (None, Some(window)) => self.driver.document(&window.id).ok_or_else(|| {
                WalkError::invalid_argument(format!("{window} has no document"))
            })?,
            (None, None) => {
                return Err(WalkError::invalid_argument(
                    "walk needs a root node or a bound window",
                ))
            }
        };
        Ok(root.contained_document().unwrap_or(root))
    }

    /// Walk `root` (or the bound window's document), dispatch the results,
    /// then navigate `descriptors` in order.
    ///
    /// `wait`, when given, is polled against the root before traversal.
    pub fn walk<'d>(
        &self,
        descriptors: &[NavigationDescriptor<'d, D::Node>],
        root: Option<&D::Node>,
        wait: Option<&(dyn Fn(&D::Node) -> bool + 'd)>,
    ) -> WalkResult<()> {
        let root = self.resolve_root(root)?;
        let span = tracing::debug_span!("walk", depth = self.depth, root = %describe(&root));
        let _enter = span.enter();

        if let Some(predicate) = wait {
            poll_until(
                &self.options,
                &format!("{} to be ready", describe(&root)),
                || self.driver.process_events(),
                || predicate(&root).then_some(()),
            )?;
        }

        let results = traverse(self.visitor, &root);
        tracing::debug!(results = results.len(), "traversal finished");
        let context = WalkContext {
            root: root.clone(),
            depth: self.depth,
            window: self.window.clone(),
        };
        self.visitor.results(results, &context)?;

        for descriptor in descriptors {
            self.navigate(descriptor, &root)?;
        }
        Ok(())
    }

    fn navigate(&self, descriptor: &NavigationDescriptor<'_, D::Node>, root: &D::Node) -> WalkResult<()> {
        let document = root_of(root);
        let Some(anchor) = descriptor.anchor.resolve(&document)? else {
            tracing::debug!(%descriptor, "anchor not found, skipping");
            return Ok(());
        };
        tracing::info!(%descriptor, anchor = %describe(&anchor), "navigating");

        let guard = HookGuard::acquire(
            &anchor,
            descriptor.pre_hook.as_deref(),
            descriptor.post_hook.as_deref(),
        )?;
        let outcome = match descriptor.target {
            TargetKind::CurrentWindow => self.enter_current(descriptor, &document, &anchor),
            TargetKind::ModalDialog => self.enter_modal(descriptor, &anchor),
            TargetKind::NewWindow => self.enter_new_window(descriptor, &anchor),
        }
        .map_err(|e| e.with_context(format!("descriptor {descriptor}")));
        guard.release(outcome)
    }

    fn enter_current(
        &self,
        descriptor: &NavigationDescriptor<'_, D::Node>,
        document: &D::Node,
        anchor: &D::Node,
    ) -> WalkResult<()> {
        let kind = AnchorKind::of(anchor);
        if already_current(kind, anchor) {
            tracing::debug!(anchor = %describe(anchor), %kind, "already current");
        } else {
            activate(self.driver, kind, anchor)?;
            if kind.is_selectable() {
                poll_until(
                    &self.options,
                    &format!("{} to become current", describe(anchor)),
                    || self.driver.process_events(),
                    || kind.is_current(anchor).then_some(()),
                )?;
            }
        }

        let content = match &descriptor.content {
            Some(lookup) => match lookup.resolve(document)? {
                Some(content) => content,
                None => {
                    tracing::debug!(%descriptor, content = %lookup, "content not found, skipping");
                    return Ok(());
                }
            },
            None => anchor.clone(),
        };
        self.nested(self.window.clone())
            .walk(&descriptor.children, Some(&content), descriptor.wait.as_deref())
    }

    fn enter_modal(&self, descriptor: &NavigationDescriptor<'_, D::Node>, anchor: &D::Node) -> WalkResult<()> {
        let sync = self.sync();
        let kind = AnchorKind::of(anchor);
        ModalDialog::new(&sync, descriptor.window_matcher())
            .on_dialog(|info, document| {
                self.nested(Some(info.clone())).walk(
                    &descriptor.children,
                    Some(&document),
                    descriptor.wait.as_deref(),
                )
            })
            .trigger(|modal_loop| activate_modal(self.driver, kind, anchor, modal_loop))
    }

    fn enter_new_window(
        &self,
        descriptor: &NavigationDescriptor<'_, D::Node>,
        anchor: &D::Node,
    ) -> WalkResult<()> {
        let sync = self.sync();
        let kind = AnchorKind::of(anchor);
        let info = sync.wait_for_open(&descriptor.window_matcher(), || {
            activate(self.driver, kind, anchor)
        })?;
        let walked = self
            .nested(Some(info.clone()))
            .walk(&descriptor.children, None, descriptor.wait.as_deref());
        let closed = sync.wait_for_closed(&info, || self.driver.close_window(&info.id));
        first_error(walked, closed)
    }
}
