//! Access Key Walk Example
//!
//! Walks a preferences window with the access key checker:
//! - selects each preference pane in turn
//! - opens the cookies dialog from the privacy pane and walks it
//! - prints one report per surface, then the JSON export
//!
//! # Running
//!
//! ```bash
//! cargo run --example access_key_walk -p uiwalker
//! ```
//!
//! Set `UIWALKER_LOG=uiwalker=debug` to see navigation events.

use uiwalker::logging::{self, LogFormat};
use uiwalker::prelude::*;

fn button(id: &str, label: &str, key: &str) -> MockNode {
    MockNode::element("button")
        .with_attr("id", id)
        .with_attr("label", label)
        .with_attr("accesskey", key)
}

fn preferences() -> MockNode {
    MockNode::element("prefwindow")
        .with_attr("id", "BrowserPreferences")
        .with_attr("windowtype", "Browser:Preferences")
        .with_attr("title", "Options")
        .with_property("currentPane", "paneMain")
        .with_children(vec![
            MockNode::element("prefpane")
                .with_attr("id", "paneMain")
                .with_children(vec![
                    button("setHome", "Use Current Page", "C"),
                    button("restoreDefault", "Restore to Default", "R"),
                ]),
            MockNode::element("prefpane")
                .with_attr("id", "panePrivacy")
                .with_children(vec![
                    button("showCookies", "Show Cookies", "S"),
                    button("clearNow", "Clear Now", "s"),
                ]),
        ])
}

fn cookies() -> MockNode {
    MockNode::element("window")
        .with_attr("id", "CookiesDialog")
        .with_attr("windowtype", "Browser:Cookies")
        .with_attr("title", "Cookies")
        .with_children(vec![
            button("removeSelected", "Remove Cookie", "R"),
            button("removeAll", "Remove All Cookies", "A"),
        ])
}

fn main() -> WalkResult<()> {
    println!("=== uiwalker Access Key Walk Example ===\n");

    let config = WalkerConfig::new().with_wait_timeout(2_000).with_poll_interval(10);
    logging::init(config.log_filter.as_deref(), LogFormat::Pretty);

    let desktop = MockDesktop::new();
    let window = desktop.open_window(&WindowTemplate::new(preferences));
    desktop.on_click_open("showCookies", WindowTemplate::new(cookies));

    let descriptors = vec![
        NavigationDescriptor::current_window(Lookup::id("paneMain")),
        NavigationDescriptor::current_window(Lookup::id("panePrivacy")).with_child(
            NavigationDescriptor::new_window(Lookup::id("showCookies"), "Browser:Cookies"),
        ),
    ];

    let checker = AccessKeyChecker::new();
    DomWalker::new(&desktop, &checker)
        .with_config(&config)
        .in_window(window)
        .walk(&descriptors, None, None)?;

    for report in checker.reports() {
        let status = if report.passed() { "ok" } else { "DUPLICATES" };
        println!("[{status}] {report}");
    }
    println!("\nActions performed:");
    for action in desktop.actions() {
        println!("  {action:?}");
    }
    println!("\nJSON report:\n{}", checker.to_json()?);

    Ok(())
}
