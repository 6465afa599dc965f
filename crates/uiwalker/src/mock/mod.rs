//! In-memory host for tests and examples.
//!
//! Walks, window waits and localization checks run against [`MockDesktop`]
//! and [`MockNode`] trees without a browser.
//!
//! ## Example
//!
//! ```rust
//! use uiwalker::mock::{MockDesktop, MockNode, WindowTemplate};
//! use uiwalker::windows::WindowHost;
//!
//! let desktop = MockDesktop::new();
//! desktop.on_click_open(
//!     "showCookies",
//!     WindowTemplate::new(|| MockNode::element("window").with_attr("windowtype", "Browser:Cookies")),
//! );
//! assert!(desktop.windows().is_empty());
//! ```

pub mod desktop;
pub mod node;
pub mod strategies;

pub use desktop::{MockAction, MockDesktop, WindowTemplate};
pub use node::MockNode;
#[cfg(feature = "proptest")]
pub use strategies::{arb_local_name, arb_tree};
pub use strategies::{TreeShape, LOCAL_NAMES};
