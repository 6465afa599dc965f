//! Window lifecycle tracking and synchronization.
//!
//! Hosts publish "ready" and "destroyed" notifications on a
//! [`WindowEventBus`]. Every wait opens its own [`Subscription`], so
//! concurrent sessions only ever see the windows they asked about, and the
//! subscription is gone as soon as the wait returns or fails.

use crate::node::TreeNode;
use crate::result::{WalkError, WalkResult};
use crate::wait::{poll_until, WaitOptions};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

/// Identity of a top-level window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window-{}", self.0)
    }
}

/// What the walker knows about a window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    /// Identity
    pub id: WindowId,
    /// Window type (`windowtype` of the document element)
    pub window_type: Option<String>,
    /// Id of the document element
    pub element_id: Option<String>,
    /// Window title
    pub title: String,
}

impl WindowInfo {
    /// Create info with only an identity
    #[must_use]
    pub fn new(id: WindowId) -> Self {
        Self {
            id,
            window_type: None,
            element_id: None,
            title: String::new(),
        }
    }

    /// Derive type, element id and title from the window's document element
    #[must_use]
    pub fn from_document<N: TreeNode>(id: WindowId, document: &N) -> Self {
        Self {
            id,
            window_type: document.attribute("windowtype"),
            element_id: document.id(),
            title: document.attribute("title").unwrap_or_default(),
        }
    }

    /// Set the window type
    #[must_use]
    pub fn with_type(mut self, window_type: impl Into<String>) -> Self {
        self.window_type = Some(window_type.into());
        self
    }

    /// Set the title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

impl fmt::Display for WindowInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.window_type {
            Some(window_type) => write!(f, "{} ({window_type}, {:?})", self.id, self.title),
            None => write!(f, "{} ({:?})", self.id, self.title),
        }
    }
}

/// Lifecycle of a tracked window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowState {
    /// Not seen by this session
    #[default]
    Unseen,
    /// Ready notification received
    Open,
    /// Destroyed notification received (terminal)
    Closed,
}

/// Notification published by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    /// Window finished loading
    Ready(WindowInfo),
    /// Window was destroyed
    Destroyed(WindowId),
}

/// Which window a wait is interested in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowMatcher {
    /// Any window
    Any,
    /// Window type
    Type(String),
    /// Document element id
    ElementId(String),
    /// Exact title
    Title(String),
    /// Window type or, failing that, exact title
    TypeOrTitle(String),
    /// A specific window
    Window(WindowId),
}

impl WindowMatcher {
    /// Whether `info` satisfies the matcher
    #[must_use]
    pub fn matches(&self, info: &WindowInfo) -> bool {
        match self {
            Self::Any => true,
            Self::Type(t) => info.window_type.as_deref() == Some(t.as_str()),
            Self::ElementId(id) => info.element_id.as_deref() == Some(id.as_str()),
            Self::Title(title) => info.title == *title,
            Self::TypeOrTitle(s) => {
                info.window_type.as_deref() == Some(s.as_str()) || info.title == *s
            }
            Self::Window(id) => info.id == *id,
        }
    }
}

impl fmt::Display for WindowMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any window"),
            Self::Type(t) => write!(f, "window of type {t}"),
            Self::ElementId(id) => write!(f, "window #{id}"),
            Self::Title(title) => write!(f, "window titled {title:?}"),
            Self::TypeOrTitle(s) => write!(f, "window of type or title {s:?}"),
            Self::Window(id) => write!(f, "{id}"),
        }
    }
}

// =============================================================================
// EVENT BUS
// =============================================================================

#[derive(Debug, Default)]
struct BusState {
    next_id: u64,
    subscribers: Vec<(u64, Sender<WindowEvent>)>,
}

/// Per-host window notification bus
#[derive(Debug, Clone, Default)]
pub struct WindowEventBus {
    state: Arc<Mutex<BusState>>,
}

impl WindowEventBus {
    /// Create an empty bus
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to every live subscription
    pub fn publish(&self, event: WindowEvent) {
        tracing::trace!(?event, "window event");
        if let Ok(mut state) = self.state.lock() {
            state
                .subscribers
                .retain(|(_, sender)| sender.send(event.clone()).is_ok());
        }
    }

    /// Open a subscription; it ends when dropped
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = channel();
        let id = match self.state.lock() {
            Ok(mut state) => {
                state.next_id += 1;
                let id = state.next_id;
                state.subscribers.push((id, sender));
                id
            }
            Err(_) => 0,
        };
        Subscription {
            id,
            receiver,
            bus: self.clone(),
        }
    }

    /// Number of live subscriptions
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().map(|s| s.subscribers.len()).unwrap_or(0)
    }

    fn unsubscribe(&self, id: u64) {
        if let Ok(mut state) = self.state.lock() {
            state.subscribers.retain(|(sid, _)| *sid != id);
        }
    }
}

/// Receiving end of a bus subscription
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    receiver: Receiver<WindowEvent>,
    bus: WindowEventBus,
}

impl Subscription {
    /// Next pending event, if any
    #[must_use]
    pub fn try_next(&self) -> Option<WindowEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.id);
    }
}

// =============================================================================
// HOST
// =============================================================================

/// Window management substrate provided by the host environment
pub trait WindowHost {
    /// Node type of the host's documents
    type Node: TreeNode;

    /// Currently open windows in enumeration order
    fn windows(&self) -> Vec<WindowInfo>;

    /// Document element of a window
    fn document(&self, window: &WindowId) -> Option<Self::Node>;

    /// Ask a window to close; completion is signalled on the bus
    fn close_window(&self, window: &WindowId) -> WalkResult<()>;

    /// Notification bus of this host
    fn events(&self) -> &WindowEventBus;

    /// Deliver queued notifications; called before every poll
    fn process_events(&self) {}

    /// Reserved system window that must never be closed
    fn hidden_window(&self) -> Option<WindowId> {
        None
    }
}

// =============================================================================
// OBSERVER
// =============================================================================

/// One observation session.
///
/// Only windows whose ready notification arrives after the session began are
/// tracked, plus an optional pre-seeded window. When several windows match,
/// the first to open is adopted.
#[derive(Debug)]
pub struct WindowObserver {
    matcher: WindowMatcher,
    subscription: Subscription,
    states: HashMap<WindowId, WindowState>,
    adopted: Option<WindowInfo>,
}

impl WindowObserver {
    /// Start observing windows matching `matcher`
    #[must_use]
    pub fn new(bus: &WindowEventBus, matcher: WindowMatcher) -> Self {
        Self {
            matcher,
            subscription: bus.subscribe(),
            states: HashMap::new(),
            adopted: None,
        }
    }

    /// Start observing a window that is already open
    #[must_use]
    pub fn seeded(bus: &WindowEventBus, window: &WindowInfo) -> Self {
        let mut observer = Self::new(bus, WindowMatcher::Window(window.id));
        observer.states.insert(window.id, WindowState::Open);
        observer.adopted = Some(window.clone());
        observer
    }

    /// Apply all pending notifications; returns how many were read
    pub fn drain(&mut self) -> usize {
        let mut count = 0;
        while let Some(event) = self.subscription.try_next() {
            self.apply(event);
            count += 1;
        }
        count
    }

    fn apply(&mut self, event: WindowEvent) {
        match event {
            WindowEvent::Ready(info) => {
                if self.matcher.matches(&info) && !self.states.contains_key(&info.id) {
                    self.states.insert(info.id, WindowState::Open);
                    if self.adopted.is_none() {
                        self.adopted = Some(info);
                    }
                }
            }
            WindowEvent::Destroyed(id) => {
                if let Some(state) = self.states.get_mut(&id) {
                    *state = WindowState::Closed;
                }
            }
        }
    }

    /// State of a window as seen by this session
    #[must_use]
    pub fn state(&self, window: &WindowId) -> WindowState {
        self.states.get(window).copied().unwrap_or_default()
    }

    /// First matching window that opened
    #[must_use]
    pub fn adopted(&self) -> Option<&WindowInfo> {
        self.adopted.as_ref()
    }

    /// Whether the window reached `Closed`
    #[must_use]
    pub fn is_closed(&self, window: &WindowId) -> bool {
        self.state(window) == WindowState::Closed
    }
}

// =============================================================================
// SYNC
// =============================================================================

/// Synchronous waits on window state
pub struct WindowSync<'h, H: WindowHost> {
    host: &'h H,
    options: WaitOptions,
    close_options: WaitOptions,
}

impl<H: WindowHost> fmt::Debug for WindowSync<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowSync")
            .field("options", &self.options)
            .field("close_options", &self.close_options)
            .finish_non_exhaustive()
    }
}

impl<'h, H: WindowHost> WindowSync<'h, H> {
    /// Create with default options
    #[must_use]
    pub fn new(host: &'h H) -> Self {
        Self::with_options(host, WaitOptions::default())
    }

    /// Create with options used for both opening and closing
    #[must_use]
    pub fn with_options(host: &'h H, options: WaitOptions) -> Self {
        Self {
            host,
            options,
            close_options: options,
        }
    }

    /// Use different options when waiting for windows to close
    #[must_use]
    pub const fn with_close_options(mut self, close_options: WaitOptions) -> Self {
        self.close_options = close_options;
        self
    }

    /// The host
    #[must_use]
    pub const fn host(&self) -> &'h H {
        self.host
    }

    /// Options for opening waits
    #[must_use]
    pub const fn options(&self) -> &WaitOptions {
        &self.options
    }

    /// Run `action` and wait until a matching window opens.
    ///
    /// The subscription is taken before the action runs and dropped on every
    /// exit path.
    pub fn wait_for_open<F>(&self, matcher: &WindowMatcher, action: F) -> WalkResult<WindowInfo>
    where
        F: FnOnce() -> WalkResult<()>,
    {
        let mut observer = WindowObserver::new(self.host.events(), matcher.clone());
        action()?;
        let description = format!("{matcher} to open");
        let (info, waited) = poll_until(
            &self.options,
            &description,
            || self.host.process_events(),
            || {
                observer.drain();
                observer.adopted().cloned()
            },
        )?;
        tracing::debug!(window = %info, elapsed_ms = waited.elapsed.as_millis() as u64, "window opened");
        Ok(info)
    }

    /// Run `action` and wait until `window` is destroyed
    pub fn wait_for_closed<F>(&self, window: &WindowInfo, action: F) -> WalkResult<()>
    where
        F: FnOnce() -> WalkResult<()>,
    {
        let mut observer = WindowObserver::seeded(self.host.events(), window);
        action()?;
        let description = format!("{window} to close");
        poll_until(
            &self.close_options,
            &description,
            || self.host.process_events(),
            || {
                observer.drain();
                observer.is_closed(&window.id).then_some(())
            },
        )?;
        tracing::debug!(window = %window, "window closed");
        Ok(())
    }

    /// Close every open window except `exclude` and the hidden window.
    ///
    /// Each close is awaited before the next starts. A window that went away
    /// together with an earlier one is skipped. Returns how many windows
    /// were closed by this call.
    pub fn close_all(&self, exclude: Option<&WindowId>) -> WalkResult<usize> {
        let hidden = self.host.hidden_window();
        let mut closed = 0;
        for info in self.host.windows() {
            if Some(&info.id) == exclude || Some(info.id) == hidden {
                continue;
            }
            if !self.host.windows().iter().any(|w| w.id == info.id) {
                tracing::debug!(window = %info, "already closed");
                continue;
            }
            self.wait_for_closed(&info, || self.host.close_window(&info.id))?;
            closed += 1;
        }
        tracing::info!(closed, "closed all windows");
        Ok(closed)
    }

    /// First open window matching, in host enumeration order
    #[must_use]
    pub fn find_window(&self, matcher: &WindowMatcher) -> Option<WindowInfo> {
        self.host.windows().into_iter().find(|w| matcher.matches(w))
    }

    /// Run `callback` against an open window, optionally closing it after.
    ///
    /// The close runs even if the callback fails; the callback's error is
    /// reported first.
    pub fn handle_window<T, F>(&self, matcher: &WindowMatcher, callback: F, close: bool) -> WalkResult<T>
    where
        F: FnOnce(&WindowInfo, H::Node) -> WalkResult<T>,
    {
        let info = self
            .find_window(matcher)
            .ok_or_else(|| WalkError::WindowNotFound {
                matcher: matcher.to_string(),
            })?;
        let document = self
            .host
            .document(&info.id)
            .ok_or_else(|| WalkError::invalid_argument(format!("{info} has no document")))?;

        let outcome = callback(&info, document);
        if !close {
            return outcome;
        }
        let closed = self.wait_for_closed(&info, || self.host.close_window(&info.id));
        first_error(outcome, closed)
    }
}

/// Keep the primary outcome's error; report a cleanup failure only if the
/// primary outcome succeeded.
pub(crate) fn first_error<T>(outcome: WalkResult<T>, cleanup: WalkResult<()>) -> WalkResult<T> {
    match (outcome, cleanup) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(cleanup)) => {
            tracing::warn!(error = %cleanup, "cleanup failed after earlier error");
            Err(e)
        }
    }
}

// =============================================================================
// MODAL DIALOGS
// =============================================================================

/// Handler run once when the modal dialog opens
pub type ModalHandler<'f, N> = Box<dyn FnOnce(&WindowInfo, N) -> WalkResult<()> + 'f>;

/// A modal dialog expected to open from an action.
///
/// Register the handler with [`on_dialog`](Self::on_dialog) first, then
/// [`trigger`](Self::trigger) the action. The dialog is closed before
/// `trigger` returns, whether or not the handler closed it itself.
pub struct ModalDialog<'s, 'h, 'f, H: WindowHost> {
    sync: &'s WindowSync<'h, H>,
    matcher: WindowMatcher,
    handler: Option<ModalHandler<'f, H::Node>>,
}

impl<H: WindowHost> fmt::Debug for ModalDialog<'_, '_, '_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModalDialog")
            .field("matcher", &self.matcher)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

impl<'s, 'h, 'f, H: WindowHost> ModalDialog<'s, 'h, 'f, H> {
    /// Expect a dialog matching `matcher`
    #[must_use]
    pub fn new(sync: &'s WindowSync<'h, H>, matcher: WindowMatcher) -> Self {
        Self {
            sync,
            matcher,
            handler: None,
        }
    }

    /// Register the one-shot handler
    #[must_use]
    pub fn on_dialog<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(&WindowInfo, H::Node) -> WalkResult<()> + 'f,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Run `action`, handle the dialog once it opens, and wait for it to close.
    ///
    /// `action` receives the modal loop callback. A host whose action blocks
    /// while the dialog is open calls it from inside its modal loop; the
    /// first call that sees the dialog runs the handler and closes it, which
    /// lets the action return. Hosts that return immediately can ignore the
    /// callback and the dialog is awaited after the action instead.
    pub fn trigger<F>(self, action: F) -> WalkResult<()>
    where
        F: FnOnce(&mut dyn FnMut()) -> WalkResult<()>,
    {
        let Self {
            sync,
            matcher,
            mut handler,
        } = self;
        let host = sync.host();
        let mut observer = WindowObserver::new(host.events(), matcher.clone());

        let mut handled: Option<WalkResult<()>> = None;
        let acted = {
            let mut modal_loop = || {
                if handled.is_some() {
                    return;
                }
                observer.drain();
                if let Some(info) = observer.adopted().cloned() {
                    tracing::debug!(dialog = %info, "modal dialog opened inside action");
                    handled = Some(handle_dialog(sync, &mut observer, handler.take(), &info));
                }
            };
            action(&mut modal_loop)
        };
        if let Some(outcome) = handled {
            return first_error(outcome, acted);
        }
        acted?;

        let description = format!("modal dialog ({matcher}) to open");
        let (info, _) = poll_until(
            sync.options(),
            &description,
            || host.process_events(),
            || {
                observer.drain();
                observer.adopted().cloned()
            },
        )?;
        tracing::debug!(dialog = %info, "modal dialog opened");
        handle_dialog(sync, &mut observer, handler, &info)
    }
}

/// Run the handler against an open dialog, then make sure it is closed
fn handle_dialog<H: WindowHost>(
    sync: &WindowSync<'_, H>,
    observer: &mut WindowObserver,
    handler: Option<ModalHandler<'_, H::Node>>,
    info: &WindowInfo,
) -> WalkResult<()> {
    let outcome = match (handler, sync.host().document(&info.id)) {
        (Some(handler), Some(document)) => handler(info, document),
        (Some(_), None) => Err(WalkError::invalid_argument(format!(
            "{info} has no document"
        ))),
        (None, _) => Ok(()),
    };

    observer.drain();
    let closed = if observer.is_closed(&info.id) {
        Ok(())
    } else {
        close_dialog(sync, observer, info)
    };
    first_error(outcome, closed)
}

fn close_dialog<H: WindowHost>(
    sync: &WindowSync<'_, H>,
    observer: &mut WindowObserver,
    info: &WindowInfo,
) -> WalkResult<()> {
    let host = sync.host();
    if host.windows().iter().any(|w| w.id == info.id) {
        host.close_window(&info.id)?;
    }
    let description = format!("modal dialog {info} to close");
    poll_until(
        &sync.close_options,
        &description,
        || host.process_events(),
        || {
            observer.drain();
            observer.is_closed(&info.id).then_some(())
        },
    )?;
    Ok(())
}
