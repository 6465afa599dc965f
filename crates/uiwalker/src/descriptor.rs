//! Navigation descriptors.
//!
//! A descriptor names an anchor node and the surface that activating it
//! leads to. Trees of descriptors tell [`DomWalker`](crate::walker::DomWalker)
//! which tabs, panes, dialogs and windows to open after walking a document.
//!
//! Descriptors hold closures, so trees written as data go through
//! [`DescriptorSpec`] first:
//!
//! ```yaml
//! - identifier: paneMain
//!   target: current_window
//! - identifier: showCookies
//!   target: new_window
//!   window: "Browser:Cookies"
//! ```

use crate::node::{describe, element_by_id, TreeNode};
use crate::result::{WalkError, WalkResult};
use crate::selector::Selector;
use crate::windows::{first_error, WindowMatcher};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// How an anchor or content node is found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupStrategy {
    /// Element id
    Id,
    /// CSS-style selector, first match
    Selector,
}

impl FromStr for LookupStrategy {
    type Err = WalkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(Self::Id),
            "selector" => Ok(Self::Selector),
            other => Err(WalkError::UnsupportedLookup {
                strategy: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for LookupStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id => f.write_str("id"),
            Self::Selector => f.write_str("selector"),
        }
    }
}

/// Where activating the anchor leads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// A sub-surface of the current window (tab, pane, list entry)
    CurrentWindow,
    /// A modal dialog
    ModalDialog,
    /// A new top-level window
    NewWindow,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CurrentWindow => f.write_str("current_window"),
            Self::ModalDialog => f.write_str("modal_dialog"),
            Self::NewWindow => f.write_str("new_window"),
        }
    }
}

/// A strategy plus its identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lookup {
    /// Strategy
    pub strategy: LookupStrategy,
    /// Id or selector text
    pub identifier: String,
}

impl Lookup {
    /// Look up by element id
    #[must_use]
    pub fn id(identifier: impl Into<String>) -> Self {
        Self {
            strategy: LookupStrategy::Id,
            identifier: identifier.into(),
        }
    }

    /// Look up by selector
    #[must_use]
    pub fn selector(identifier: impl Into<String>) -> Self {
        Self {
            strategy: LookupStrategy::Selector,
            identifier: identifier.into(),
        }
    }

    /// Find the node in `document`; a miss is `Ok(None)`
    pub fn resolve<N: TreeNode>(&self, document: &N) -> WalkResult<Option<N>> {
        match self.strategy {
            LookupStrategy::Id => Ok(element_by_id(document, &self.identifier)),
            LookupStrategy::Selector => {
                Ok(Selector::parse(&self.identifier)?.select_first(document))
            }
        }
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.strategy {
            LookupStrategy::Id => write!(f, "#{}", self.identifier),
            LookupStrategy::Selector => write!(f, "{:?}", self.identifier),
        }
    }
}

/// Side effect run on the anchor before or after navigation
pub type Hook<'a, N> = Box<dyn Fn(&N) -> WalkResult<()> + 'a>;

/// Predicate awaited on a surface's root before it is walked
pub type WaitPredicate<'a, N> = Box<dyn Fn(&N) -> bool + 'a>;

/// One step of a declarative navigation tree
pub struct NavigationDescriptor<'a, N: TreeNode> {
    /// Anchor lookup
    pub anchor: Lookup,
    /// Target surface
    pub target: TargetKind,
    /// Window type or title of a dialog or new window
    pub window: Option<String>,
    /// Root of the nested walk for current-window targets (default: anchor)
    pub content: Option<Lookup>,
    /// Runs on the anchor before navigation
    pub pre_hook: Option<Hook<'a, N>>,
    /// Runs on the anchor after navigation, on every exit path
    pub post_hook: Option<Hook<'a, N>>,
    /// Awaited on the opened surface before walking it
    pub wait: Option<WaitPredicate<'a, N>>,
    /// Descriptors evaluated inside the opened surface
    pub children: Vec<NavigationDescriptor<'a, N>>,
}

impl<'a, N: TreeNode> NavigationDescriptor<'a, N> {
    /// Descriptor with no window, hooks or children
    #[must_use]
    pub fn new(anchor: Lookup, target: TargetKind) -> Self {
        Self {
            anchor,
            target,
            window: None,
            content: None,
            pre_hook: None,
            post_hook: None,
            wait: None,
            children: Vec::new(),
        }
    }

    /// Select or click an anchor in the current window
    #[must_use]
    pub fn current_window(anchor: Lookup) -> Self {
        Self::new(anchor, TargetKind::CurrentWindow)
    }

    /// Anchor opens a modal dialog
    #[must_use]
    pub fn modal_dialog(anchor: Lookup) -> Self {
        Self::new(anchor, TargetKind::ModalDialog)
    }

    /// Anchor opens a window of the given type or title
    #[must_use]
    pub fn new_window(anchor: Lookup, window_type_or_title: impl Into<String>) -> Self {
        Self::new(anchor, TargetKind::NewWindow).with_window(window_type_or_title)
    }

    /// Set the window type or title
    #[must_use]
    pub fn with_window(mut self, window_type_or_title: impl Into<String>) -> Self {
        self.window = Some(window_type_or_title.into());
        self
    }

    /// Walk `content` instead of the anchor
    #[must_use]
    pub fn with_content(mut self, content: Lookup) -> Self {
        self.content = Some(content);
        self
    }

    /// Set the pre-navigation hook
    #[must_use]
    pub fn with_pre_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&N) -> WalkResult<()> + 'a,
    {
        self.pre_hook = Some(Box::new(hook));
        self
    }

    /// Set the post-navigation hook
    #[must_use]
    pub fn with_post_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&N) -> WalkResult<()> + 'a,
    {
        self.post_hook = Some(Box::new(hook));
        self
    }

    /// Set the wait predicate
    #[must_use]
    pub fn with_wait<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&N) -> bool + 'a,
    {
        self.wait = Some(Box::new(predicate));
        self
    }

    /// Append a child descriptor
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Append child descriptors
    #[must_use]
    pub fn with_children(mut self, children: Vec<Self>) -> Self {
        self.children.extend(children);
        self
    }

    /// Matcher for the window a dialog or new-window target opens
    #[must_use]
    pub fn window_matcher(&self) -> WindowMatcher {
        self.window
            .clone()
            .map_or(WindowMatcher::Any, WindowMatcher::TypeOrTitle)
    }
}

impl<N: TreeNode> fmt::Debug for NavigationDescriptor<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationDescriptor")
            .field("anchor", &self.anchor)
            .field("target", &self.target)
            .field("window", &self.window)
            .field("content", &self.content)
            .field("pre_hook", &self.pre_hook.is_some())
            .field("post_hook", &self.post_hook.is_some())
            .field("wait", &self.wait.is_some())
            .field("children", &self.children)
            .finish()
    }
}

impl<N: TreeNode> fmt::Display for NavigationDescriptor<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.target, self.anchor)?;
        if let Some(window) = &self.window {
            write!(f, " -> {window:?}")?;
        }
        Ok(())
    }
}

// =============================================================================
// HOOK GUARD
// =============================================================================

/// Pairs a descriptor's pre- and post-hook around navigation.
///
/// The post-hook runs exactly once: through [`release`](Self::release) on
/// normal completion, or on drop if navigation unwound. A failing pre-hook
/// means the guard is never created and the post-hook does not run.
pub struct HookGuard<'g, N: TreeNode> {
    anchor: N,
    post: Option<&'g dyn Fn(&N) -> WalkResult<()>>,
}

impl<'g, N: TreeNode> HookGuard<'g, N> {
    /// Run the pre-hook and arm the post-hook
    pub fn acquire(
        anchor: &N,
        pre: Option<&dyn Fn(&N) -> WalkResult<()>>,
        post: Option<&'g dyn Fn(&N) -> WalkResult<()>>,
    ) -> WalkResult<Self> {
        if let Some(pre) = pre {
            pre(anchor).map_err(|e| hook_error(anchor, "pre-hook", &e))?;
        }
        Ok(Self {
            anchor: anchor.clone(),
            post,
        })
    }

    /// Run the post-hook and merge its result into `outcome`.
    ///
    /// An error in `outcome` wins over a post-hook error.
    pub fn release<T>(mut self, outcome: WalkResult<T>) -> WalkResult<T> {
        let cleanup = match self.post.take() {
            Some(post) => post(&self.anchor).map_err(|e| hook_error(&self.anchor, "post-hook", &e)),
            None => Ok(()),
        };
        first_error(outcome, cleanup)
    }
}

impl<N: TreeNode> Drop for HookGuard<'_, N> {
    fn drop(&mut self) {
        if let Some(post) = self.post.take() {
            if let Err(e) = post(&self.anchor) {
                tracing::warn!(anchor = %describe(&self.anchor), error = %e, "post-hook failed during unwind");
            }
        }
    }
}

impl<N: TreeNode> fmt::Debug for HookGuard<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookGuard")
            .field("anchor", &self.anchor)
            .field("armed", &self.post.is_some())
            .finish()
    }
}

fn hook_error<N: TreeNode>(anchor: &N, stage: &str, error: &WalkError) -> WalkError {
    WalkError::Hook {
        anchor: describe(anchor),
        message: format!("{stage}: {error}"),
    }
}

// =============================================================================
// DECLARATIVE TREES
// =============================================================================

fn default_strategy() -> String {
    "id".to_string()
}

/// Closure-free descriptor, loadable from YAML or JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorSpec {
    /// Lookup strategy name (`id` or `selector`)
    #[serde(default = "default_strategy")]
    pub lookup: String,
    /// Id or selector of the anchor
    pub identifier: String,
    /// Target surface
    pub target: TargetKind,
    /// Window type or title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
    /// Content root for current-window targets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentSpec>,
    /// Nested descriptors
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DescriptorSpec>,
}

/// Content lookup of a [`DescriptorSpec`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSpec {
    /// Lookup strategy name
    #[serde(default = "default_strategy")]
    pub lookup: String,
    /// Id or selector
    pub identifier: String,
}

impl DescriptorSpec {
    /// Parse a list of descriptors from YAML
    pub fn from_yaml(yaml: &str) -> WalkResult<Vec<Self>> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Parse a list of descriptors from JSON
    pub fn from_json(json: &str) -> WalkResult<Vec<Self>> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a list of descriptors; `.json` files are JSON, anything else YAML
    pub fn load(path: &Path) -> WalkResult<Vec<Self>> {
        let text = std::fs::read_to_string(path)?;
        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json(&text)
        } else {
            Self::from_yaml(&text)
        }
    }

    /// Convert a list into navigation descriptors
    pub fn into_descriptors<'a, N: TreeNode>(
        specs: Vec<Self>,
    ) -> WalkResult<Vec<NavigationDescriptor<'a, N>>> {
        specs.into_iter().map(NavigationDescriptor::try_from).collect()
    }
}

impl<N: TreeNode> TryFrom<DescriptorSpec> for NavigationDescriptor<'_, N> {
    type Error = WalkError;

    fn try_from(spec: DescriptorSpec) -> Result<Self, Self::Error> {
        let anchor = Lookup {
            strategy: spec.lookup.parse()?,
            identifier: spec.identifier,
        };
        let content = spec
            .content
            .map(|content| -> WalkResult<Lookup> {
                Ok(Lookup {
                    strategy: content.lookup.parse()?,
                    identifier: content.identifier,
                })
            })
            .transpose()?;
        let mut descriptor = Self::new(anchor, spec.target);
        descriptor.window = spec.window;
        descriptor.content = content;
        descriptor.children = DescriptorSpec::into_descriptors(spec.children)?;
        Ok(descriptor)
    }
}
