//! uiwalker: filtered tree walking and window synchronization for UI tests
//!
//! uiwalker drives a live desktop UI document the way a tester would: it
//! visits every node a filter lets through, hands the collected results to a
//! visitor, then follows declarative navigation descriptors into tabs, panes,
//! modal dialogs and new windows, walking each surface it opens and closing
//! it again afterwards.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     UIWALKER Architecture                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Descriptor │    │ DomWalker  │    │ WindowSync │            │
//! │   │ tree       │───►│ + visitor  │───►│ (open /    │            │
//! │   │ (Rust/YAML)│    │            │    │  close)    │            │
//! │   └────────────┘    └─────┬──────┘    └─────┬──────┘            │
//! │                           ▼                 ▼                   │
//! │                    ┌──────────────────────────────┐             │
//! │                    │ Host: TreeNode + UiDriver    │             │
//! │                    └──────────────────────────────┘             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use uiwalker::prelude::*;
//!
//! let desktop = MockDesktop::new();
//! let main = desktop.open_window(&WindowTemplate::new(|| {
//!     MockNode::element("window").with_children(vec![
//!         MockNode::element("button").with_attr("id", "ok").with_attr("accesskey", "O"),
//!         MockNode::element("button").with_attr("id", "open").with_attr("accesskey", "o"),
//!     ])
//! }));
//!
//! let checker = AccessKeyChecker::new();
//! DomWalker::new(&desktop, &checker)
//!     .in_window(main)
//!     .walk(&[], None, None)
//!     .unwrap();
//! assert_eq!(checker.failures().len(), 1);
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

/// Node collection and narrowing
pub mod collector;

/// Timeouts and logging configuration
pub mod config;

/// Navigation descriptors, lookups and hooks
pub mod descriptor;

/// Host actions: click and select
pub mod driver;

/// Access key and cropped element checks
pub mod l10n;

/// `tracing` subscriber setup
pub mod logging;

/// In-memory host for tests and examples
pub mod mock;

/// Tree node abstraction
pub mod node;

mod result;

/// Selector parsing and matching
pub mod selector;

/// Polling waits
pub mod wait;

/// Filtered traversal and navigation
pub mod walker;

/// Window tracking and synchronization
pub mod windows;

pub use result::{WalkError, WalkResult};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::collector::NodeCollector;
    pub use super::config::WalkerConfig;
    pub use super::descriptor::{
        DescriptorSpec, HookGuard, Lookup, LookupStrategy, NavigationDescriptor, TargetKind,
    };
    pub use super::driver::{activate, activate_modal, UiDriver};
    pub use super::l10n::{
        access_key_entries, access_key_filter, check_dimensions, cropped_filter,
        find_duplicate_access_keys, AccessKeyChecker, AccessKeyReport, CropReport, CropSide,
        CroppedElementChecker,
    };
    pub use super::mock::{MockAction, MockDesktop, MockNode, WindowTemplate};
    pub use super::node::{describe, AnchorKind, BoxObject, NodeFlags, TreeNode};
    pub use super::result::{WalkError, WalkResult};
    pub use super::selector::Selector;
    pub use super::wait::{poll_until, WaitOptions};
    pub use super::walker::{traverse, DomWalker, FilterResult, FnVisitor, NodeVisitor, WalkContext};
    pub use super::windows::{
        ModalDialog, WindowEvent, WindowEventBus, WindowHost, WindowId, WindowInfo, WindowMatcher,
        WindowObserver, WindowSync,
    };
}
