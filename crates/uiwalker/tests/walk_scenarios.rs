//! End-to-end walks against the mock desktop.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use std::cell::{Cell, RefCell};
use std::time::{Duration, Instant};
use uiwalker::collector::NodeCollector;
use uiwalker::descriptor::{DescriptorSpec, Lookup, NavigationDescriptor};
use uiwalker::l10n::AccessKeyChecker;
use uiwalker::mock::{MockAction, MockDesktop, MockNode, TreeShape, WindowTemplate};
use uiwalker::node::TreeNode;
use uiwalker::prelude::{DomWalker, FilterResult, FnVisitor, NodeVisitor, Selector, WalkContext};
use uiwalker::wait::WaitOptions;
use uiwalker::walker::traverse;
use uiwalker::windows::{WindowHost, WindowInfo, WindowSync};
use uiwalker::{WalkError, WalkResult};

type Batches = RefCell<Vec<(usize, Vec<String>)>>;

fn fast() -> WaitOptions {
    WaitOptions::new().with_timeout(200).with_poll_interval(5)
}

fn recording<'b>(batches: &'b Batches) -> impl NodeVisitor<MockNode, Output = String> + 'b {
    FnVisitor::new(
        |node: &MockNode| {
            if node.has_attribute("reject") {
                FilterResult::Reject
            } else if node.has_attribute("skip") {
                FilterResult::Skip
            } else {
                FilterResult::Accept
            }
        },
        |node: &MockNode| -> Vec<String> { node.id().into_iter().collect() },
        move |results: Vec<String>, context: &WalkContext<MockNode>| -> WalkResult<()> {
            batches.borrow_mut().push((context.depth, results));
            Ok(())
        },
    )
}

fn preferences_window() -> MockNode {
    MockNode::element("window")
        .with_attr("id", "main")
        .with_attr("windowtype", "navigator:browser")
        .with_children(vec![
            MockNode::element("tabs").with_children(vec![
                MockNode::element("tab")
                    .with_attr("id", "generalTab")
                    .with_property("selected", "true"),
                MockNode::element("tab").with_attr("id", "privacyTab"),
            ]),
            MockNode::element("tabpanels").with_attr("skip", "").with_children(vec![
                MockNode::element("vbox")
                    .with_attr("id", "generalPanel")
                    .with_child(MockNode::element("checkbox").with_attr("id", "startup")),
                MockNode::element("vbox")
                    .with_attr("id", "privacyPanel")
                    .with_child(MockNode::element("button").with_attr("id", "showCookies")),
            ]),
        ])
}

fn cookies_dialog() -> WindowTemplate {
    WindowTemplate::new(|| {
        MockNode::element("dialog")
            .with_attr("id", "cookiesDialog")
            .with_attr("windowtype", "Browser:Cookies")
            .with_attr("title", "Cookies")
            .with_children(vec![
                MockNode::element("tree").with_attr("id", "cookiesList"),
                MockNode::element("button").with_attr("id", "removeAll"),
            ])
    })
}

fn open_main(desktop: &MockDesktop) -> WindowInfo {
    desktop.open_window(&WindowTemplate::new(preferences_window))
}

mod scenario_tests {
    use super::*;

    #[test]
    fn test_duplicate_access_keys_reported_once() {
        let root = MockNode::element("hbox").with_children(vec![
            MockNode::element("button").with_attr("id", "a1").with_attr("accesskey", "a"),
            MockNode::element("button").with_attr("id", "b").with_attr("accesskey", "b"),
            MockNode::element("button").with_attr("id", "a2").with_attr("accesskey", "A"),
        ]);
        let desktop = MockDesktop::new();
        let checker = AccessKeyChecker::new();
        DomWalker::new(&desktop, &checker)
            .walk(&[], Some(&root), None)
            .unwrap();

        let reports = checker.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].duplicates.len(), 1);
        assert_eq!(reports[0].duplicates[0].key, "a");
        assert_eq!(reports[0].duplicates[0].nodes.len(), 2);
    }

    #[test]
    fn test_rejected_subtree_hides_grandchild() {
        let root = MockNode::element("window").with_children(vec![
            MockNode::element("vbox")
                .with_attr("id", "rejected")
                .with_attr("reject", "")
                .with_child(MockNode::element("button").with_attr("id", "grandchild")),
            MockNode::element("button").with_attr("id", "visible"),
        ]);
        let desktop = MockDesktop::new();
        let batches = Batches::default();
        let visitor = recording(&batches);
        DomWalker::new(&desktop, &visitor)
            .walk(&[], Some(&root), None)
            .unwrap();
        assert_eq!(batches.borrow().clone(), vec![(0, vec!["visible".to_string()])]);
    }

    #[test]
    fn test_new_window_that_never_opens_times_out_cleanly() {
        let desktop = MockDesktop::new();
        let main = open_main(&desktop);
        let batches = Batches::default();
        let visitor = recording(&batches);
        let descriptors = vec![NavigationDescriptor::new_window(
            Lookup::id("showCookies"),
            "Browser:Cookies",
        )];

        let started = Instant::now();
        let err = DomWalker::new(&desktop, &visitor)
            .with_wait_options(fast())
            .with_close_options(fast())
            .in_window(main)
            .walk(&descriptors, None, None)
            .unwrap_err();

        assert!(err.is_timeout(), "unexpected error: {err}");
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(desktop.events().subscriber_count(), 0);
        assert_eq!(desktop.window_count(), 1);
    }

    #[test]
    fn test_modal_dialog_walked_and_closed_before_return() {
        let desktop = MockDesktop::new();
        let main = open_main(&desktop);
        desktop.on_click_open("showCookies", cookies_dialog());
        let batches = Batches::default();
        let visitor = recording(&batches);
        let descriptors = vec![NavigationDescriptor::modal_dialog(Lookup::id("showCookies"))
            .with_window("Browser:Cookies")];

        DomWalker::new(&desktop, &visitor)
            .with_wait_options(fast())
            .with_close_options(fast())
            .in_window(main)
            .walk(&descriptors, None, None)
            .unwrap();

        let batches = batches.borrow().clone();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1], (1, vec!["cookiesList".to_string(), "removeAll".to_string()]));
        assert_eq!(desktop.window_count(), 1);
        assert_eq!(desktop.closed_count(), 1);
        assert_eq!(desktop.events().subscriber_count(), 0);
    }

    #[test]
    fn test_blocking_modal_walked_inside_modal_loop() {
        let desktop = MockDesktop::new();
        desktop.set_blocking_modals(true);
        let main = open_main(&desktop);
        desktop.on_click_open("showCookies", cookies_dialog());
        let batches = Batches::default();
        let visitor = recording(&batches);
        let descriptors = vec![NavigationDescriptor::modal_dialog(Lookup::id("showCookies"))
            .with_window("Browser:Cookies")];

        DomWalker::new(&desktop, &visitor)
            .with_wait_options(fast())
            .with_close_options(fast())
            .in_window(main.clone())
            .walk(&descriptors, None, None)
            .unwrap();

        let batches = batches.borrow().clone();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1], (1, vec!["cookiesList".to_string(), "removeAll".to_string()]));
        assert_eq!(desktop.closed_count(), 1);
        assert_eq!(desktop.windows().into_iter().map(|w| w.id).collect::<Vec<_>>(), vec![main.id]);
        assert_eq!(desktop.events().subscriber_count(), 0);
    }

    #[test]
    fn test_missing_anonymous_node_is_empty() {
        let root = MockNode::element("tree")
            .with_anonymous(vec![MockNode::element("treecols").with_attr("anonid", "cols")]);
        let mut collector = NodeCollector::with_root(root);
        collector.query_anonymous_node("anonid", "missing").unwrap();
        assert!(collector.is_empty());
    }
}

mod navigation_tests {
    use super::*;

    #[test]
    fn test_current_tab_is_not_reselected() {
        let desktop = MockDesktop::new();
        let main = open_main(&desktop);
        let batches = Batches::default();
        let visitor = recording(&batches);
        let descriptors = vec![NavigationDescriptor::current_window(Lookup::id("generalTab"))
            .with_content(Lookup::id("generalPanel"))];

        DomWalker::new(&desktop, &visitor)
            .with_wait_options(fast())
            .in_window(main)
            .walk(&descriptors, None, None)
            .unwrap();

        assert!(!desktop
            .actions()
            .iter()
            .any(|a| matches!(a, MockAction::Select(_) | MockAction::Click(_))));
        let nested: Vec<_> = batches.borrow().iter().filter(|(d, _)| *d == 1).cloned().collect();
        assert_eq!(nested, vec![(1, vec!["startup".to_string()])]);
    }

    #[test]
    fn test_other_tab_selected_then_walked() {
        let desktop = MockDesktop::new();
        let main = open_main(&desktop);
        let batches = Batches::default();
        let visitor = recording(&batches);
        let descriptors = vec![NavigationDescriptor::current_window(Lookup::id("privacyTab"))
            .with_content(Lookup::id("privacyPanel"))];

        DomWalker::new(&desktop, &visitor)
            .with_wait_options(fast())
            .in_window(main)
            .walk(&descriptors, None, None)
            .unwrap();

        assert_eq!(
            desktop.actions(),
            vec![MockAction::Select("tab#privacyTab".to_string())]
        );
        assert_eq!(batches.borrow()[1], (1, vec!["showCookies".to_string()]));
    }

    #[test]
    fn test_new_window_round_trip_from_nested_surface() {
        let desktop = MockDesktop::new();
        let main = open_main(&desktop);
        desktop.on_click_open("showCookies", cookies_dialog());
        let batches = Batches::default();
        let visitor = recording(&batches);
        let descriptors = vec![NavigationDescriptor::current_window(Lookup::id("privacyTab"))
            .with_content(Lookup::id("privacyPanel"))
            .with_child(NavigationDescriptor::new_window(
                Lookup::id("showCookies"),
                "Browser:Cookies",
            ))];

        DomWalker::new(&desktop, &visitor)
            .with_wait_options(fast())
            .with_close_options(fast())
            .in_window(main)
            .walk(&descriptors, None, None)
            .unwrap();

        let depths: Vec<usize> = batches.borrow().iter().map(|(d, _)| *d).collect();
        assert_eq!(depths, vec![0, 1, 2]);
        assert_eq!(desktop.window_count(), 1);
        assert_eq!(desktop.closed_count(), 1);
    }

    #[test]
    fn test_missing_anchor_is_skipped() {
        let desktop = MockDesktop::new();
        let main = open_main(&desktop);
        let batches = Batches::default();
        let visitor = recording(&batches);
        let descriptors = vec![NavigationDescriptor::current_window(Lookup::id("nowhere"))];

        DomWalker::new(&desktop, &visitor)
            .in_window(main)
            .walk(&descriptors, None, None)
            .unwrap();
        assert_eq!(batches.borrow().len(), 1);
        assert!(desktop.actions().is_empty());
    }

    #[test]
    fn test_descriptor_tree_from_yaml() {
        let yaml = r##"
- identifier: privacyTab
  target: current_window
  content:
    identifier: privacyPanel
  children:
    - lookup: selector
      identifier: "#showCookies"
      target: modal_dialog
      window: Cookies
"##;
        let desktop = MockDesktop::new();
        let main = open_main(&desktop);
        desktop.on_click_open("showCookies", cookies_dialog());
        let batches = Batches::default();
        let visitor = recording(&batches);
        let descriptors =
            DescriptorSpec::into_descriptors(DescriptorSpec::from_yaml(yaml).unwrap()).unwrap();

        DomWalker::new(&desktop, &visitor)
            .with_wait_options(fast())
            .with_close_options(fast())
            .in_window(main)
            .walk(&descriptors, None, None)
            .unwrap();

        assert_eq!(batches.borrow().len(), 3);
        assert_eq!(desktop.closed_count(), 1);
    }
}

mod selectable_anchor_tests {
    use super::*;

    fn preferences() -> MockNode {
        MockNode::element("prefwindow")
            .with_attr("id", "BrowserPreferences")
            .with_attr("windowtype", "Browser:Preferences")
            .with_property("currentPane", "paneMain")
            .with_children(vec![
                MockNode::element("prefpane")
                    .with_attr("id", "paneMain")
                    .with_child(MockNode::element("checkbox").with_attr("id", "homePage")),
                MockNode::element("prefpane")
                    .with_attr("id", "panePrivacy")
                    .with_child(MockNode::element("checkbox").with_attr("id", "rememberHistory")),
            ])
    }

    fn cookie_behavior() -> MockNode {
        MockNode::element("window").with_attr("id", "cookies").with_children(vec![
            MockNode::element("radiogroup").with_children(vec![
                MockNode::element("radio")
                    .with_attr("id", "acceptAll")
                    .with_property("selected", "true"),
                MockNode::element("radio").with_attr("id", "blockAll"),
            ]),
            MockNode::element("vbox")
                .with_attr("id", "blockOptions")
                .with_child(MockNode::element("checkbox").with_attr("id", "blockThirdParty")),
        ])
    }

    fn sort_menu() -> MockNode {
        MockNode::element("window").with_attr("id", "library").with_child(
            MockNode::element("menulist").with_child(MockNode::element("menupopup").with_children(vec![
                MockNode::element("menuitem")
                    .with_attr("id", "sortByName")
                    .with_property("selected", "true"),
                MockNode::element("menuitem").with_attr("id", "sortByDate"),
            ])),
        )
    }

    fn selections(desktop: &MockDesktop) -> Vec<MockAction> {
        desktop
            .actions()
            .into_iter()
            .filter(|a| matches!(a, MockAction::Select(_) | MockAction::Click(_)))
            .collect()
    }

    fn walk_in(
        desktop: &MockDesktop,
        window: &WindowInfo,
        batches: &Batches,
        descriptors: &[NavigationDescriptor<'_, MockNode>],
    ) {
        let visitor = recording(batches);
        DomWalker::new(desktop, &visitor)
            .with_wait_options(fast())
            .in_window(window.clone())
            .walk(descriptors, None, None)
            .unwrap();
    }

    #[test]
    fn test_prefpane_selected_only_when_not_current() {
        let desktop = MockDesktop::new();
        let window = desktop.open_window(&WindowTemplate::new(preferences));
        let batches = Batches::default();
        let descriptors = vec![
            NavigationDescriptor::current_window(Lookup::id("paneMain")),
            NavigationDescriptor::current_window(Lookup::id("panePrivacy")),
        ];
        walk_in(&desktop, &window, &batches, &descriptors);

        assert_eq!(
            selections(&desktop),
            vec![MockAction::Select("prefpane#panePrivacy".to_string())]
        );
        let document = desktop.document(&window.id).unwrap();
        assert_eq!(document.property("currentPane").as_deref(), Some("panePrivacy"));
        let nested: Vec<_> = batches.borrow().iter().filter(|(d, _)| *d == 1).cloned().collect();
        assert_eq!(
            nested,
            vec![
                (1, vec!["homePage".to_string()]),
                (1, vec!["rememberHistory".to_string()]),
            ]
        );
    }

    #[test]
    fn test_prefpane_walk_is_idempotent_once_current() {
        let desktop = MockDesktop::new();
        let window = desktop.open_window(&WindowTemplate::new(preferences));
        let descriptors = vec![NavigationDescriptor::current_window(Lookup::id("panePrivacy"))];

        walk_in(&desktop, &window, &Batches::default(), &descriptors);
        walk_in(&desktop, &window, &Batches::default(), &descriptors);

        assert_eq!(selections(&desktop).len(), 1);
        let document = desktop.document(&window.id).unwrap();
        assert_eq!(document.property("currentPane").as_deref(), Some("panePrivacy"));
    }

    #[test]
    fn test_radio_selected_and_content_walked() {
        let desktop = MockDesktop::new();
        let window = desktop.open_window(&WindowTemplate::new(cookie_behavior));
        let batches = Batches::default();
        let descriptors = vec![
            NavigationDescriptor::current_window(Lookup::id("acceptAll")),
            NavigationDescriptor::current_window(Lookup::id("blockAll"))
                .with_content(Lookup::id("blockOptions")),
        ];
        walk_in(&desktop, &window, &batches, &descriptors);

        assert_eq!(
            selections(&desktop),
            vec![MockAction::Select("radio#blockAll".to_string())]
        );
        let document = desktop.document(&window.id).unwrap();
        let radios = Selector::parse("radio").unwrap().select_all(&document);
        assert!(!radios[0].is_selected());
        assert!(radios[1].is_selected());
        assert_eq!(
            batches.borrow().last().cloned(),
            Some((1, vec!["blockThirdParty".to_string()]))
        );
    }

    #[test]
    fn test_menuitem_selected_once() {
        let desktop = MockDesktop::new();
        let window = desktop.open_window(&WindowTemplate::new(sort_menu));
        let descriptors = vec![NavigationDescriptor::current_window(Lookup::id("sortByDate"))];

        walk_in(&desktop, &window, &Batches::default(), &descriptors);
        walk_in(&desktop, &window, &Batches::default(), &descriptors);

        assert_eq!(
            selections(&desktop),
            vec![MockAction::Select("menuitem#sortByDate".to_string())]
        );
        let document = desktop.document(&window.id).unwrap();
        let items = Selector::parse("menuitem").unwrap().select_all(&document);
        assert!(!items[0].is_selected());
        assert!(items[1].is_selected());
    }
}

mod window_tests {
    use super::*;

    #[test]
    fn test_close_all_skips_window_closed_with_its_owner() {
        let desktop = MockDesktop::new();
        desktop.set_deferred_close(true);
        let main = open_main(&desktop);
        let cookies = desktop.open_window(&cookies_dialog());
        let details = desktop.open_window(&cookies_dialog());
        desktop.close_with(cookies.id, details.id);

        let sync = WindowSync::with_options(&desktop, fast());
        assert_eq!(sync.close_all(Some(&main.id)).unwrap(), 1);
        assert_eq!(desktop.windows().into_iter().map(|w| w.id).collect::<Vec<_>>(), vec![main.id]);
        assert_eq!(desktop.closed_count(), 2);
        assert_eq!(desktop.events().subscriber_count(), 0);
    }
}

mod hook_tests {
    use super::*;

    #[test]
    fn test_post_hook_runs_once_on_success() {
        let desktop = MockDesktop::new();
        let main = open_main(&desktop);
        let batches = Batches::default();
        let visitor = recording(&batches);
        let post = Cell::new(0);
        let descriptors = vec![NavigationDescriptor::current_window(Lookup::id("privacyTab"))
            .with_post_hook(|_: &MockNode| {
                post.set(post.get() + 1);
                Ok(())
            })];

        DomWalker::new(&desktop, &visitor)
            .with_wait_options(fast())
            .in_window(main)
            .walk(&descriptors, None, None)
            .unwrap();
        assert_eq!(post.get(), 1);
    }

    #[test]
    fn test_post_hook_runs_once_when_action_fails() {
        let desktop = MockDesktop::new();
        let main = open_main(&desktop);
        desktop.fail_action_on("privacyTab");
        let batches = Batches::default();
        let visitor = recording(&batches);
        let post = Cell::new(0);
        let descriptors = vec![NavigationDescriptor::current_window(Lookup::id("privacyTab"))
            .with_post_hook(|_: &MockNode| {
                post.set(post.get() + 1);
                Ok(())
            })];

        let err = DomWalker::new(&desktop, &visitor)
            .with_wait_options(fast())
            .in_window(main)
            .walk(&descriptors, None, None)
            .unwrap_err();
        assert!(matches!(err, WalkError::Action { .. }));
        assert_eq!(post.get(), 1);
    }

    #[test]
    fn test_post_hook_runs_once_when_window_times_out() {
        let desktop = MockDesktop::new();
        let main = open_main(&desktop);
        let batches = Batches::default();
        let visitor = recording(&batches);
        let post = Cell::new(0);
        let descriptors = vec![
            NavigationDescriptor::new_window(Lookup::id("showCookies"), "Browser:Cookies")
                .with_post_hook(|_: &MockNode| {
                    post.set(post.get() + 1);
                    Ok(())
                }),
        ];

        let err = DomWalker::new(&desktop, &visitor)
            .with_wait_options(fast())
            .in_window(main)
            .walk(&descriptors, None, None)
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(post.get(), 1);
    }

    #[test]
    fn test_failing_pre_hook_skips_navigation_and_post_hook() {
        let desktop = MockDesktop::new();
        let main = open_main(&desktop);
        let batches = Batches::default();
        let visitor = recording(&batches);
        let post = Cell::new(0);
        let descriptors = vec![NavigationDescriptor::current_window(Lookup::id("privacyTab"))
            .with_pre_hook(|_: &MockNode| Err(WalkError::action("not ready")))
            .with_post_hook(|_: &MockNode| {
                post.set(post.get() + 1);
                Ok(())
            })];

        let err = DomWalker::new(&desktop, &visitor)
            .in_window(main)
            .walk(&descriptors, None, None)
            .unwrap_err();
        assert!(matches!(err, WalkError::Hook { .. }));
        assert_eq!(post.get(), 0);
        assert!(desktop.actions().is_empty());
    }
}

fn arb_shape() -> impl Strategy<Value = TreeShape> {
    let leaf = ("[a-z]{1,6}", any::<bool>()).prop_map(|(name, hidden)| TreeShape {
        hidden,
        ..TreeShape::leaf(name)
    });
    leaf.prop_recursive(4, 40, 4, |inner| {
        ("[a-z]{1,6}", any::<bool>(), prop::collection::vec(inner, 0..4)).prop_map(
            |(name, hidden, children)| TreeShape {
                hidden,
                children,
                ..TreeShape::leaf(name)
            },
        )
    })
}

/// Ids of nodes with no hidden ancestor-or-self below the root, in pre-order
fn expected_ids(shape: &TreeShape, next: &mut usize, out: &mut Vec<String>, visible: bool) {
    let id = format!("n{next}");
    *next += 1;
    let visible = visible && !shape.hidden;
    if visible {
        out.push(id);
    }
    for child in &shape.children {
        expected_ids(child, next, out, visible);
    }
}

proptest! {
    #[test]
    fn prop_traversal_is_preorder_without_rejected_subtrees(shape in arb_shape()) {
        let root = shape.build();
        let visitor = FnVisitor::new(
            |node: &MockNode| {
                if node.flags().hidden { FilterResult::Reject } else { FilterResult::Accept }
            },
            |node: &MockNode| -> Vec<String> { node.id().into_iter().collect() },
            |_: Vec<String>, _: &WalkContext<MockNode>| -> WalkResult<()> { Ok(()) },
        );

        let mut expected = Vec::new();
        let mut next = 1;
        for child in &shape.children {
            expected_ids(child, &mut next, &mut expected, true);
        }
        prop_assert_eq!(traverse(&visitor, &root), expected);
    }
}
