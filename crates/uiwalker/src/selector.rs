//! CSS-style selectors over [`TreeNode`] trees.
//!
//! Supports selector groups, the four combinators, type/universal/id/class
//! selectors, attribute conditions and a small set of structural and state
//! pseudo-classes. Anything else is a [`WalkError::QuerySyntax`].

use crate::node::TreeNode;
use crate::result::{WalkError, WalkResult};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
    StartsWith { key: String, value: String },
    EndsWith { key: String, value: String },
    Contains { key: String, value: String },
    Includes { key: String, value: String },
    DashMatch { key: String, value: String },
}

impl AttrCondition {
    fn matches<N: TreeNode>(&self, node: &N) -> bool {
        match self {
            Self::Exists { key } => node.has_attribute(key),
            Self::Eq { key, value } => node.attribute(key).as_deref() == Some(value.as_str()),
            Self::StartsWith { key, value } => node
                .attribute(key)
                .is_some_and(|attr| attr.starts_with(value.as_str())),
            Self::EndsWith { key, value } => node
                .attribute(key)
                .is_some_and(|attr| attr.ends_with(value.as_str())),
            Self::Contains { key, value } => node
                .attribute(key)
                .is_some_and(|attr| attr.contains(value.as_str())),
            Self::Includes { key, value } => node
                .attribute(key)
                .is_some_and(|attr| attr.split_whitespace().any(|token| token == value)),
            Self::DashMatch { key, value } => node
                .attribute(key)
                .is_some_and(|attr| attr == *value || attr.starts_with(&format!("{value}-"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PseudoClass {
    FirstChild,
    LastChild,
    OnlyChild,
    Disabled,
    Enabled,
    Not(Vec<Vec<SelectorPart>>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SelectorStep {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrCondition>,
    pseudo_classes: Vec<PseudoClass>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Combinator {
    Descendant,
    Child,
    AdjacentSibling,
    GeneralSibling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorPart {
    step: SelectorStep,
    // Relation to the part on the left
    combinator: Option<Combinator>,
}

/// A parsed selector (one or more comma-separated groups)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    groups: Vec<Vec<SelectorPart>>,
}

impl Selector {
    /// Parse a selector
    pub fn parse(selector: &str) -> WalkResult<Self> {
        let groups = Parser { source: selector }.groups(selector)?;
        Ok(Self {
            source: selector.to_string(),
            groups,
        })
    }

    /// Source text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `node` matches any group
    #[must_use]
    pub fn matches<N: TreeNode>(&self, node: &N) -> bool {
        self.groups.iter().any(|chain| matches_chain(node, chain))
    }

    /// Matching descendants of `root` in document order, `root` excluded
    #[must_use]
    pub fn select_all<N: TreeNode>(&self, root: &N) -> Vec<N> {
        let mut out = Vec::new();
        self.collect(root, &mut out);
        out
    }

    /// First matching descendant of `root`
    #[must_use]
    pub fn select_first<N: TreeNode>(&self, root: &N) -> Option<N> {
        root.child_nodes().into_iter().find_map(|child| {
            if self.matches(&child) {
                Some(child)
            } else {
                self.select_first(&child)
            }
        })
    }

    fn collect<N: TreeNode>(&self, node: &N, out: &mut Vec<N>) {
        for child in node.child_nodes() {
            if self.matches(&child) {
                out.push(child.clone());
            }
            self.collect(&child, out);
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for Selector {
    type Err = WalkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// =============================================================================
// MATCHING
// =============================================================================

fn matches_step<N: TreeNode>(node: &N, step: &SelectorStep) -> bool {
    if let Some(tag) = &step.tag {
        if !node.local_name().eq_ignore_ascii_case(tag) {
            return false;
        }
    }
    if let Some(id) = &step.id {
        if node.id().as_deref() != Some(id.as_str()) {
            return false;
        }
    }
    if !step.classes.is_empty() {
        let class = node.attribute("class").unwrap_or_default();
        if step
            .classes
            .iter()
            .any(|name| !class.split_whitespace().any(|c| c == name))
        {
            return false;
        }
    }
    if !step.attrs.iter().all(|cond| cond.matches(node)) {
        return false;
    }
    step.pseudo_classes.iter().all(|pseudo| match pseudo {
        PseudoClass::FirstChild => siblings(node).first() == Some(node),
        PseudoClass::LastChild => siblings(node).last() == Some(node),
        PseudoClass::OnlyChild => siblings(node).len() == 1,
        PseudoClass::Disabled => node.flags().disabled,
        PseudoClass::Enabled => !node.flags().disabled,
        PseudoClass::Not(inners) => !inners.iter().any(|inner| matches_chain(node, inner)),
    })
}

fn siblings<N: TreeNode>(node: &N) -> Vec<N> {
    node.parent_node()
        .map_or_else(|| vec![node.clone()], |parent| parent.child_nodes())
}

fn previous_siblings<N: TreeNode>(node: &N) -> Vec<N> {
    let siblings = siblings(node);
    let index = siblings.iter().position(|s| s == node).unwrap_or(0);
    let mut before: Vec<N> = siblings.into_iter().take(index).collect();
    before.reverse();
    before
}

fn matches_chain<N: TreeNode>(node: &N, parts: &[SelectorPart]) -> bool {
    match parts.split_last() {
        Some((last, rest)) => matches_step(node, &last.step) && matches_left(node, last, rest),
        None => false,
    }
}

// Backtracks over every candidate on the left, so `a b > c` finds a match
// even when the nearest `a` ancestor is the wrong one.
fn matches_left<N: TreeNode>(node: &N, part: &SelectorPart, rest: &[SelectorPart]) -> bool {
    if rest.is_empty() {
        return true;
    }
    match part.combinator.unwrap_or(Combinator::Descendant) {
        Combinator::Child => node
            .parent_node()
            .is_some_and(|parent| matches_chain(&parent, rest)),
        Combinator::Descendant => {
            let mut cursor = node.parent_node();
            while let Some(ancestor) = cursor {
                if matches_chain(&ancestor, rest) {
                    return true;
                }
                cursor = ancestor.parent_node();
            }
            false
        }
        Combinator::AdjacentSibling => previous_siblings(node)
            .first()
            .is_some_and(|sibling| matches_chain(sibling, rest)),
        Combinator::GeneralSibling => previous_siblings(node)
            .iter()
            .any(|sibling| matches_chain(sibling, rest)),
    }
}

// =============================================================================
// PARSING
// =============================================================================

struct Parser<'s> {
    source: &'s str,
}

impl Parser<'_> {
    fn error(&self, message: impl Into<String>) -> WalkError {
        WalkError::QuerySyntax {
            selector: self.source.to_string(),
            message: message.into(),
        }
    }

    fn groups(&self, selector: &str) -> WalkResult<Vec<Vec<SelectorPart>>> {
        split_top_level(selector, |ch| ch == ',')
            .map_err(|message| self.error(message))?
            .iter()
            .map(|group| {
                if group.trim().is_empty() {
                    Err(self.error("empty selector group"))
                } else {
                    self.chain(group)
                }
            })
            .collect()
    }

    fn chain(&self, selector: &str) -> WalkResult<Vec<SelectorPart>> {
        let tokens = self.tokenize(selector)?;
        let mut parts: Vec<SelectorPart> = Vec::new();
        let mut pending: Option<Combinator> = None;

        for token in tokens {
            let combinator = match token.as_str() {
                ">" => Some(Combinator::Child),
                "+" => Some(Combinator::AdjacentSibling),
                "~" => Some(Combinator::GeneralSibling),
                _ => None,
            };
            if let Some(combinator) = combinator {
                if pending.is_some() || parts.is_empty() {
                    return Err(self.error(format!("misplaced combinator {token:?}")));
                }
                pending = Some(combinator);
                continue;
            }

            let step = self.step(&token)?;
            let combinator = if parts.is_empty() {
                None
            } else {
                Some(pending.take().unwrap_or(Combinator::Descendant))
            };
            parts.push(SelectorPart { step, combinator });
        }

        if parts.is_empty() || pending.is_some() {
            return Err(self.error("selector ends without a compound"));
        }
        Ok(parts)
    }

    fn tokenize(&self, selector: &str) -> WalkResult<Vec<String>> {
        let mut tokens = Vec::new();
        let mut current = String::new();
        let mut depth = 0usize;
        let mut quote: Option<char> = None;

        let flush = |current: &mut String, tokens: &mut Vec<String>| {
            if !current.trim().is_empty() {
                tokens.push(current.trim().to_string());
            }
            current.clear();
        };

        for ch in selector.chars() {
            if let Some(q) = quote {
                current.push(ch);
                if ch == q {
                    quote = None;
                }
                continue;
            }
            match ch {
                '"' | '\'' if depth > 0 => {
                    quote = Some(ch);
                    current.push(ch);
                }
                '[' | '(' => {
                    depth += 1;
                    current.push(ch);
                }
                ']' | ')' => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| self.error(format!("unbalanced {ch:?}")))?;
                    current.push(ch);
                }
                '>' | '+' | '~' if depth == 0 => {
                    flush(&mut current, &mut tokens);
                    tokens.push(ch.to_string());
                }
                c if c.is_whitespace() && depth == 0 => flush(&mut current, &mut tokens),
                _ => current.push(ch),
            }
        }
        if depth != 0 || quote.is_some() {
            return Err(self.error("unterminated bracket or string"));
        }
        flush(&mut current, &mut tokens);
        Ok(tokens)
    }

    fn step(&self, part: &str) -> WalkResult<SelectorStep> {
        let bytes = part.as_bytes();
        let mut i = 0usize;
        let mut step = SelectorStep::default();

        while i < bytes.len() {
            match bytes[i] {
                b'*' => {
                    if i != 0 {
                        return Err(self.error("misplaced '*'"));
                    }
                    i += 1;
                }
                b'#' => {
                    let (id, next) = ident(part, i + 1).ok_or_else(|| self.error("expected id"))?;
                    if step.id.replace(id).is_some() {
                        return Err(self.error("more than one id in a compound"));
                    }
                    i = next;
                }
                b'.' => {
                    let (class, next) =
                        ident(part, i + 1).ok_or_else(|| self.error("expected class name"))?;
                    step.classes.push(class);
                    i = next;
                }
                b'[' => {
                    let (cond, next) = self.attr_condition(part, i)?;
                    step.attrs.push(cond);
                    i = next;
                }
                b':' => {
                    let (pseudo, next) = self.pseudo(part, i)?;
                    step.pseudo_classes.push(pseudo);
                    i = next;
                }
                _ => {
                    if i != 0 {
                        return Err(self.error(format!("unexpected character in {part:?}")));
                    }
                    let (tag, next) = ident(part, i)
                        .ok_or_else(|| self.error(format!("unexpected character in {part:?}")))?;
                    step.tag = Some(tag);
                    i = next;
                }
            }
        }
        Ok(step)
    }

    fn pseudo(&self, part: &str, colon: usize) -> WalkResult<(PseudoClass, usize)> {
        let (name, next) =
            ident(part, colon + 1).ok_or_else(|| self.error("expected pseudo-class name"))?;
        let simple = match name.to_ascii_lowercase().as_str() {
            "first-child" => Some(PseudoClass::FirstChild),
            "last-child" => Some(PseudoClass::LastChild),
            "only-child" => Some(PseudoClass::OnlyChild),
            "disabled" => Some(PseudoClass::Disabled),
            "enabled" => Some(PseudoClass::Enabled),
            "not" => None,
            other => return Err(self.error(format!("unsupported pseudo-class :{other}"))),
        };
        if let Some(pseudo) = simple {
            return Ok((pseudo, next));
        }

        let rest = part.get(next..).unwrap_or_default();
        if !rest.starts_with('(') {
            return Err(self.error(":not requires an argument"));
        }
        let close = matching_paren(rest).ok_or_else(|| self.error("unbalanced ':not('"))?;
        let inner = rest.get(1..close).unwrap_or_default();
        let groups = self.groups(inner)?;
        if groups.iter().any(|chain| chain.len() != 1) {
            return Err(self.error(":not accepts compound selectors only"));
        }
        Ok((PseudoClass::Not(groups), next + close + 1))
    }

    fn attr_condition(&self, src: &str, open: usize) -> WalkResult<(AttrCondition, usize)> {
        let bytes = src.as_bytes();
        let skip_ws = |mut i: usize| {
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            i
        };

        let key_start = skip_ws(open + 1);
        let mut i = key_start;
        while i < bytes.len() && is_attr_name_char(bytes[i]) {
            i += 1;
        }
        if i == key_start {
            return Err(self.error("expected attribute name"));
        }
        let key = src.get(key_start..i).unwrap_or_default().to_string();

        i = skip_ws(i);
        match bytes.get(i) {
            Some(b']') => return Ok((AttrCondition::Exists { key }, i + 1)),
            None => return Err(self.error("unterminated attribute selector")),
            _ => {}
        }

        let (op, after_op) = match (bytes.get(i).copied(), bytes.get(i + 1).copied()) {
            (Some(b'='), _) => (b'=', i + 1),
            (Some(op @ (b'^' | b'$' | b'*' | b'~' | b'|')), Some(b'=')) => (op, i + 2),
            _ => return Err(self.error("unsupported attribute operator")),
        };

        let (value, after_value) = self.attr_value(src, skip_ws(after_op))?;
        i = skip_ws(after_value);
        if bytes.get(i) != Some(&b']') {
            return Err(self.error("expected ']'"));
        }

        let cond = match op {
            b'^' => AttrCondition::StartsWith { key, value },
            b'$' => AttrCondition::EndsWith { key, value },
            b'*' => AttrCondition::Contains { key, value },
            b'~' => AttrCondition::Includes { key, value },
            b'|' => AttrCondition::DashMatch { key, value },
            _ => AttrCondition::Eq { key, value },
        };
        Ok((cond, i + 1))
    }

    fn attr_value(&self, src: &str, start: usize) -> WalkResult<(String, usize)> {
        let bytes = src.as_bytes();
        match bytes.get(start).copied() {
            Some(quote @ (b'"' | b'\'')) => {
                let mut i = start + 1;
                while i < bytes.len() {
                    if bytes[i] == b'\\' {
                        i += 2;
                        continue;
                    }
                    if bytes[i] == quote {
                        let raw = src.get(start + 1..i).unwrap_or_default();
                        return Ok((unescape(raw), i + 1));
                    }
                    i += 1;
                }
                Err(self.error("unterminated string"))
            }
            Some(_) => {
                let mut i = start;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b']' {
                    i += if bytes[i] == b'\\' { 2 } else { 1 };
                }
                let i = i.min(bytes.len());
                Ok((unescape(src.get(start..i).unwrap_or_default()), i))
            }
            None => Err(self.error("expected attribute value")),
        }
    }
}

fn split_top_level(src: &str, is_separator: impl Fn(char) -> bool) -> Result<Vec<String>, String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in src.chars() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            current.push(ch);
            continue;
        }
        match ch {
            '"' | '\'' if depth > 0 => {
                quote = Some(ch);
                current.push(ch);
            }
            '[' | '(' => {
                depth += 1;
                current.push(ch);
            }
            ']' | ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| format!("unbalanced {ch:?}"))?;
                current.push(ch);
            }
            c if depth == 0 && is_separator(c) => parts.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    if depth != 0 || quote.is_some() {
        return Err("unterminated bracket or string".to_string());
    }
    parts.push(current);
    Ok(parts)
}

fn matching_paren(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, ch) in body.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn ident(src: &str, start: usize) -> Option<(String, usize)> {
    let bytes = src.as_bytes();
    if start >= bytes.len() || !is_ident_char(bytes[start]) {
        return None;
    }
    let mut end = start + 1;
    while end < bytes.len() && is_ident_char(bytes[end]) {
        end += 1;
    }
    Some((src.get(start..end)?.to_string(), end))
}

const fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

const fn is_attr_name_char(b: u8) -> bool {
    is_ident_char(b) || b == b':'
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::mock::MockNode;

    fn prefs() -> MockNode {
        MockNode::element("prefwindow").with_attr("id", "BrowserPreferences").with_children(vec![
            MockNode::element("prefpane").with_attr("id", "paneMain").with_children(vec![
                MockNode::element("groupbox")
                    .with_attr("id", "startupGroup")
                    .with_attr("class", "startup wide")
                    .with_children(vec![
                        MockNode::element("label").with_attr("id", "l1").with_attr("accesskey", "S"),
                        MockNode::element("menulist").with_attr("id", "browserStartupPage"),
                        MockNode::element("button")
                            .with_attr("id", "useCurrent")
                            .with_attr("disabled", "true"),
                    ]),
            ]),
            MockNode::element("prefpane").with_attr("id", "paneTabs").with_children(vec![
                MockNode::element("checkbox")
                    .with_attr("id", "linkTargeting")
                    .with_attr("preference", "browser.link.open_newwindow"),
            ]),
        ])
    }

    fn ids(nodes: &[MockNode]) -> Vec<String> {
        nodes.iter().filter_map(TreeNode::id).collect()
    }

    fn select(selector: &str) -> Vec<String> {
        ids(&Selector::parse(selector).unwrap().select_all(&prefs()))
    }

    mod matching_tests {
        use super::*;

        #[test]
        fn test_type_and_id() {
            assert_eq!(select("prefpane"), vec!["paneMain", "paneTabs"]);
            assert_eq!(select("#paneTabs"), vec!["paneTabs"]);
            assert_eq!(select("PREFPANE#paneMain"), vec!["paneMain"]);
        }

        #[test]
        fn test_root_is_excluded() {
            assert!(select("prefwindow").is_empty());
        }

        #[test]
        fn test_class() {
            assert_eq!(select(".startup > label"), vec!["l1"]);
            assert!(select(".startup.narrow").is_empty());
        }

        #[test]
        fn test_attribute_operators() {
            assert_eq!(select("[accesskey]"), vec!["l1"]);
            assert_eq!(select("[accesskey=S]"), vec!["l1"]);
            assert_eq!(select("[preference^='browser.link']"), vec!["linkTargeting"]);
            assert_eq!(select("[preference$=\"newwindow\"]"), vec!["linkTargeting"]);
            assert_eq!(select("[id*=Startup]"), vec!["browserStartupPage"]);
            assert_eq!(select("groupbox[class~=wide]"), vec!["startupGroup"]);
            assert!(select("groupbox[class~=startu]").is_empty());
            assert!(select("[id|=pane]").is_empty());
        }

        #[test]
        fn test_combinators() {
            assert_eq!(select("#paneMain label"), vec!["l1"]);
            assert!(select("#paneMain > label").is_empty());
            assert_eq!(select("label + menulist"), vec!["browserStartupPage"]);
            assert_eq!(select("label ~ button"), vec!["useCurrent"]);
            assert_eq!(select("#paneMain ~ prefpane"), vec!["paneTabs"]);
        }

        #[test]
        fn test_descendant_backtracks() {
            let root = MockNode::element("window").with_child(
                MockNode::element("box").with_attr("id", "outer").with_child(
                    MockNode::element("vbox").with_child(
                        MockNode::element("box")
                            .with_attr("id", "inner")
                            .with_child(MockNode::element("label").with_attr("id", "x")),
                    ),
                ),
            );
            let found = Selector::parse("box > vbox label").unwrap().select_all(&root);
            assert_eq!(ids(&found), vec!["x"]);
        }

        #[test]
        fn test_pseudo_classes() {
            assert_eq!(select("groupbox > :first-child"), vec!["l1"]);
            assert_eq!(select("groupbox > :last-child"), vec!["useCurrent"]);
            assert_eq!(select("checkbox:only-child"), vec!["linkTargeting"]);
            assert_eq!(select("button:disabled"), vec!["useCurrent"]);
            assert!(select("button:enabled").is_empty());
            assert_eq!(select("groupbox > :not(label, button)"), vec!["browserStartupPage"]);
        }

        #[test]
        fn test_groups_keep_document_order() {
            assert_eq!(select("checkbox, label"), vec!["l1", "linkTargeting"]);
        }

        #[test]
        fn test_select_first() {
            let selector: Selector = "prefpane".parse().unwrap();
            assert_eq!(selector.select_first(&prefs()).unwrap().id().unwrap(), "paneMain");
            assert_eq!(selector.to_string(), "prefpane");
        }
    }

    mod parse_error_tests {
        use super::*;

        fn assert_syntax_error(selector: &str) {
            match Selector::parse(selector) {
                Err(WalkError::QuerySyntax { selector: s, .. }) => assert_eq!(s, selector),
                other => panic!("expected QuerySyntax for {selector:?}, got {other:?}"),
            }
        }

        #[test]
        fn test_malformed_selectors() {
            for selector in [
                "",
                "   ",
                "a,",
                "> a",
                "a >",
                "a > > b",
                "[",
                "a]",
                "[attr",
                "[attr=]x",
                "[attr!=x]",
                "#",
                ".",
                "a:hover",
                ":not(a b)",
                ":not(a",
                "a*",
                "[a='x]",
            ] {
                assert_syntax_error(selector);
            }
        }
    }
}
