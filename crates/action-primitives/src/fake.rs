//! In-memory page used by tests across the workspace
//!
//! Elements form a tree built from [`ElementAttributes`]. `nth_of_type` and
//! `container` are always computed from the tree; values passed in the
//! builder attributes for those two fields are ignored.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::{
    driver::BrowserDriver,
    errors::ActionError,
    selector::{SelectorKind, TextMatch, DEFAULT_TEST_ID_ATTRIBUTE},
    types::{AssertProperty, ClickOptions, ElementAttributes, ElementHandle, ExecCtx, MouseButton},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Driver operations that can be delayed or made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    Query,
    FallbackLookup,
    Navigate,
    Click,
    Fill,
    Type,
    Select,
    Check,
    Read,
}

/// Call log entry
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Query { selector: String, scoped: bool },
    FallbackLookup { id: String },
    Navigate { url: String },
    Click { node: String, button: MouseButton },
    Fill { node: String, value: String },
    Type { node: String, text: String },
    Select { node: String, option: String },
    SetChecked { node: String, checked: bool },
    Read { node: String, property: AssertProperty },
}

impl DriverCall {
    /// Calls that change page state
    pub fn is_action(&self) -> bool {
        matches!(
            self,
            DriverCall::Navigate { .. }
                | DriverCall::Click { .. }
                | DriverCall::Fill { .. }
                | DriverCall::Type { .. }
                | DriverCall::Select { .. }
                | DriverCall::SetChecked { .. }
        )
    }
}

#[derive(Debug)]
struct Node {
    attrs: ElementAttributes,
    parent: Option<usize>,
    children: Vec<usize>,
    attached: bool,
    value: String,
    checked: bool,
    visible: bool,
    disabled: bool,
    options: Vec<String>,
    navigates_to: Option<String>,
}

#[derive(Debug, Default)]
struct PageInner {
    url: String,
    title: String,
    nodes: Vec<Node>,
    roots: Vec<usize>,
    routes: HashMap<String, String>,
    calls: Vec<DriverCall>,
    failures: HashMap<FakeOp, VecDeque<ActionError>>,
    delays: HashMap<FakeOp, Duration>,
}

pub struct FakePage {
    inner: Mutex<PageInner>,
}

impl FakePage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(PageInner {
                url: url.into(),
                ..Default::default()
            }),
        }
    }

    /// Add a top-level element
    pub fn add(&self, attrs: ElementAttributes) -> NodeId {
        self.insert(None, attrs)
    }

    pub fn add_child(&self, parent: NodeId, attrs: ElementAttributes) -> NodeId {
        self.insert(Some(parent.0), attrs)
    }

    fn insert(&self, parent: Option<usize>, mut attrs: ElementAttributes) -> NodeId {
        attrs.nth_of_type = None;
        attrs.container = None;
        let mut inner = self.inner.lock();
        let id = inner.nodes.len();
        inner.nodes.push(Node {
            attrs,
            parent,
            children: Vec::new(),
            attached: true,
            value: String::new(),
            checked: false,
            visible: true,
            disabled: false,
            options: Vec::new(),
            navigates_to: None,
        });
        match parent {
            Some(parent) => inner.nodes[parent].children.push(id),
            None => inner.roots.push(id),
        }
        NodeId(id)
    }

    /// Detach an element and its subtree
    pub fn remove(&self, node: NodeId) {
        self.inner.lock().nodes[node.0].attached = false;
    }

    /// Edit an element's attributes in place
    pub fn update(&self, node: NodeId, edit: impl FnOnce(&mut ElementAttributes)) {
        edit(&mut self.inner.lock().nodes[node.0].attrs);
    }

    pub fn set_disabled(&self, node: NodeId, disabled: bool) {
        self.inner.lock().nodes[node.0].disabled = disabled;
    }

    pub fn set_visible(&self, node: NodeId, visible: bool) {
        self.inner.lock().nodes[node.0].visible = visible;
    }

    pub fn set_options(&self, node: NodeId, options: &[&str]) {
        self.inner.lock().nodes[node.0].options = options.iter().map(|o| o.to_string()).collect();
    }

    /// Clicking `node` loads `url`
    pub fn link_to(&self, node: NodeId, url: impl Into<String>) {
        self.inner.lock().nodes[node.0].navigates_to = Some(url.into());
    }

    /// Title shown after loading `url`
    pub fn route(&self, url: impl Into<String>, title: impl Into<String>) {
        self.inner.lock().routes.insert(url.into(), title.into());
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.inner.lock().title = title.into();
    }

    pub fn url(&self) -> String {
        self.inner.lock().url.clone()
    }

    /// Queue one failure for the next call of `op`
    pub fn fail_next(&self, op: FakeOp, error: ActionError) {
        self.inner
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Queue `times` failures for `op`
    pub fn fail_times(&self, op: FakeOp, error: ActionError, times: usize) {
        for _ in 0..times {
            self.fail_next(op, error.clone());
        }
    }

    /// Every call of `op` sleeps first
    pub fn delay(&self, op: FakeOp, delay: Duration) {
        self.inner.lock().delays.insert(op, delay);
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.inner.lock().calls.clone()
    }

    /// Number of state-changing calls made so far
    pub fn action_calls(&self) -> usize {
        self.inner.lock().calls.iter().filter(|c| c.is_action()).count()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    pub fn value_of(&self, node: NodeId) -> String {
        self.inner.lock().nodes[node.0].value.clone()
    }

    pub fn is_checked(&self, node: NodeId) -> bool {
        self.inner.lock().nodes[node.0].checked
    }

    pub fn handle(&self, node: NodeId) -> ElementHandle {
        let inner = self.inner.lock();
        handle_of(&inner, node.0)
    }

    /// Computed attributes for a handle
    pub fn describe_node(&self, handle: &ElementHandle) -> Result<ElementAttributes, ActionError> {
        let inner = self.inner.lock();
        let idx = live_index(&inner, handle)?;
        Ok(computed_attributes(&inner, idx))
    }

    pub fn attributes_of(&self, node: NodeId) -> ElementAttributes {
        let inner = self.inner.lock();
        computed_attributes(&inner, node.0)
    }

    async fn enter(&self, op: FakeOp) -> Result<(), ActionError> {
        let (delay, failure) = {
            let mut inner = self.inner.lock();
            let delay = inner.delays.get(&op).copied();
            let failure = inner.failures.get_mut(&op).and_then(|q| q.pop_front());
            (delay, failure)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn with_live_node<T>(
        &self,
        handle: &ElementHandle,
        call: DriverCall,
        f: impl FnOnce(&mut PageInner, usize) -> Result<T, ActionError>,
    ) -> Result<T, ActionError> {
        let mut inner = self.inner.lock();
        inner.calls.push(call);
        let idx = live_index(&inner, handle)?;
        f(&mut inner, idx)
    }
}

fn handle_of(inner: &PageInner, idx: usize) -> ElementHandle {
    let handle = ElementHandle::new(format!("n{}", idx));
    match &inner.nodes[idx].attrs.fallback_id {
        Some(marker) => handle.with_marker(marker.clone()),
        None => handle,
    }
}

fn is_attached(inner: &PageInner, idx: usize) -> bool {
    let mut current = Some(idx);
    while let Some(i) = current {
        if !inner.nodes[i].attached {
            return false;
        }
        current = inner.nodes[i].parent;
    }
    true
}

fn live_index(inner: &PageInner, handle: &ElementHandle) -> Result<usize, ActionError> {
    let idx = handle
        .node_id
        .strip_prefix('n')
        .and_then(|raw| raw.parse::<usize>().ok())
        .filter(|idx| *idx < inner.nodes.len())
        .ok_or_else(|| ActionError::StaleElement(format!("unknown node {}", handle.node_id)))?;
    if !is_attached(inner, idx) {
        return Err(ActionError::StaleElement(format!(
            "node {} is detached",
            handle.node_id
        )));
    }
    Ok(idx)
}

fn nth_of_type(inner: &PageInner, idx: usize) -> usize {
    let tag = &inner.nodes[idx].attrs.tag;
    let siblings = match inner.nodes[idx].parent {
        Some(parent) => &inner.nodes[parent].children,
        None => &inner.roots,
    };
    siblings
        .iter()
        .filter(|&&s| inner.nodes[s].attached && &inner.nodes[s].attrs.tag == tag)
        .position(|&s| s == idx)
        .map(|pos| pos + 1)
        .unwrap_or(1)
}

fn computed_attributes(inner: &PageInner, idx: usize) -> ElementAttributes {
    let mut attrs = inner.nodes[idx].attrs.clone();
    attrs.nth_of_type = Some(nth_of_type(inner, idx));

    let mut ancestor = inner.nodes[idx].parent;
    while let Some(a) = ancestor {
        let candidate = &inner.nodes[a].attrs;
        let identifiable = candidate.test_id.is_some()
            || (candidate.role.is_some() && candidate.accessible_name.is_some());
        if identifiable {
            attrs.container = Some(Box::new(computed_attributes(inner, a)));
            break;
        }
        ancestor = inner.nodes[a].parent;
    }
    attrs
}

/// Attached nodes in document order, below `scope` when given
fn document_order(inner: &PageInner, scope: Option<usize>) -> Vec<usize> {
    let mut out = Vec::new();
    let mut stack: Vec<usize> = match scope {
        Some(s) => inner.nodes[s].children.iter().rev().copied().collect(),
        None => inner.roots.iter().rev().copied().collect(),
    };
    while let Some(idx) = stack.pop() {
        if !inner.nodes[idx].attached {
            continue;
        }
        out.push(idx);
        stack.extend(inner.nodes[idx].children.iter().rev().copied());
    }
    out
}

fn text_matches(value: Option<&str>, text: &TextMatch, exact: bool) -> bool {
    value.map(|v| text.matches(v, exact)).unwrap_or(false)
}

fn parse_css(selector: &str) -> Result<(String, Option<usize>), ActionError> {
    let unsupported = || ActionError::InvalidParams(format!("unsupported css '{}'", selector));
    let selector = selector.trim();
    let (tag, nth) = match selector.split_once(":nth-of-type(") {
        Some((tag, rest)) => {
            let n = rest
                .strip_suffix(')')
                .and_then(|n| n.trim().parse::<usize>().ok())
                .ok_or_else(unsupported)?;
            (tag, Some(n))
        }
        None => (selector, None),
    };
    if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(unsupported());
    }
    Ok((tag.to_ascii_lowercase(), nth))
}

fn node_matches(inner: &PageInner, idx: usize, kind: &SelectorKind) -> Result<bool, ActionError> {
    let attrs = &inner.nodes[idx].attrs;
    let matched = match kind {
        SelectorKind::TestId { attribute, id } => {
            attribute == DEFAULT_TEST_ID_ATTRIBUTE && attrs.test_id.as_deref() == Some(id.as_str())
        }
        SelectorKind::Role { role, name, exact } => {
            attrs.role.as_deref() == Some(role.as_str())
                && name
                    .as_ref()
                    .map(|name| text_matches(attrs.accessible_name.as_deref(), name, *exact))
                    .unwrap_or(true)
        }
        SelectorKind::Label { text, exact } => text_matches(attrs.label.as_deref(), text, *exact),
        SelectorKind::Placeholder { text, exact } => {
            text_matches(attrs.placeholder.as_deref(), text, *exact)
        }
        SelectorKind::AltText { text, exact } => text_matches(attrs.alt.as_deref(), text, *exact),
        SelectorKind::Title { text, exact } => text_matches(attrs.title.as_deref(), text, *exact),
        SelectorKind::Text { text, exact } => text_matches(attrs.text.as_deref(), text, *exact),
        SelectorKind::Css { selector } => {
            let (tag, nth) = parse_css(selector)?;
            attrs.tag == tag && nth.map(|n| nth_of_type(inner, idx) == n).unwrap_or(true)
        }
    };
    Ok(matched)
}

#[async_trait]
impl BrowserDriver for FakePage {
    async fn query(
        &self,
        _ctx: &ExecCtx,
        kind: &SelectorKind,
        scope: Option<&ElementHandle>,
    ) -> Result<Vec<ElementHandle>, ActionError> {
        self.enter(FakeOp::Query).await?;
        let mut inner = self.inner.lock();
        inner.calls.push(DriverCall::Query {
            selector: kind.to_string(),
            scoped: scope.is_some(),
        });
        let scope = match scope {
            Some(handle) => Some(live_index(&inner, handle)?),
            None => None,
        };
        let mut handles = Vec::new();
        for idx in document_order(&inner, scope) {
            if node_matches(&inner, idx, kind)? {
                handles.push(handle_of(&inner, idx));
            }
        }
        Ok(handles)
    }

    async fn find_by_fallback_id(
        &self,
        _ctx: &ExecCtx,
        fallback_id: &str,
    ) -> Result<Option<ElementHandle>, ActionError> {
        self.enter(FakeOp::FallbackLookup).await?;
        let mut inner = self.inner.lock();
        inner.calls.push(DriverCall::FallbackLookup {
            id: fallback_id.to_string(),
        });
        Ok(document_order(&inner, None)
            .into_iter()
            .find(|&idx| inner.nodes[idx].attrs.fallback_id.as_deref() == Some(fallback_id))
            .map(|idx| handle_of(&inner, idx)))
    }

    async fn describe(
        &self,
        _ctx: &ExecCtx,
        handle: &ElementHandle,
    ) -> Result<ElementAttributes, ActionError> {
        self.describe_node(handle)
    }

    async fn marked_elements(&self, _ctx: &ExecCtx) -> Result<Vec<ElementAttributes>, ActionError> {
        let inner = self.inner.lock();
        Ok(document_order(&inner, None)
            .into_iter()
            .filter(|&idx| inner.nodes[idx].attrs.fallback_id.is_some())
            .map(|idx| computed_attributes(&inner, idx))
            .collect())
    }

    async fn navigate(&self, _ctx: &ExecCtx, url: &str) -> Result<(), ActionError> {
        self.enter(FakeOp::Navigate).await?;
        let mut inner = self.inner.lock();
        inner.calls.push(DriverCall::Navigate {
            url: url.to_string(),
        });
        inner.title = inner.routes.get(url).cloned().unwrap_or_default();
        inner.url = url.to_string();
        Ok(())
    }

    async fn click(
        &self,
        _ctx: &ExecCtx,
        handle: &ElementHandle,
        options: &ClickOptions,
    ) -> Result<(), ActionError> {
        self.enter(FakeOp::Click).await?;
        let call = DriverCall::Click {
            node: handle.node_id.clone(),
            button: options.button,
        };
        self.with_live_node(handle, call, |inner, idx| {
            let node = &inner.nodes[idx];
            if node.disabled {
                return Err(ActionError::NotEnabled(handle.node_id.clone()));
            }
            if !node.visible {
                return Err(ActionError::NotClickable(handle.node_id.clone()));
            }
            if let Some(url) = node.navigates_to.clone() {
                inner.title = inner.routes.get(&url).cloned().unwrap_or_default();
                inner.url = url;
            }
            Ok(())
        })
    }

    async fn fill(
        &self,
        _ctx: &ExecCtx,
        handle: &ElementHandle,
        value: &str,
    ) -> Result<(), ActionError> {
        self.enter(FakeOp::Fill).await?;
        let call = DriverCall::Fill {
            node: handle.node_id.clone(),
            value: value.to_string(),
        };
        self.with_live_node(handle, call, |inner, idx| {
            if inner.nodes[idx].disabled {
                return Err(ActionError::NotEnabled(handle.node_id.clone()));
            }
            inner.nodes[idx].value = value.to_string();
            Ok(())
        })
    }

    async fn type_text(
        &self,
        _ctx: &ExecCtx,
        handle: &ElementHandle,
        text: &str,
    ) -> Result<(), ActionError> {
        self.enter(FakeOp::Type).await?;
        let call = DriverCall::Type {
            node: handle.node_id.clone(),
            text: text.to_string(),
        };
        self.with_live_node(handle, call, |inner, idx| {
            inner.nodes[idx].value.push_str(text);
            Ok(())
        })
    }

    async fn select_option(
        &self,
        _ctx: &ExecCtx,
        handle: &ElementHandle,
        option: &str,
    ) -> Result<(), ActionError> {
        self.enter(FakeOp::Select).await?;
        let call = DriverCall::Select {
            node: handle.node_id.clone(),
            option: option.to_string(),
        };
        self.with_live_node(handle, call, |inner, idx| {
            let node = &mut inner.nodes[idx];
            if !node.options.iter().any(|o| o == option) {
                return Err(ActionError::OptionNotFound(option.to_string()));
            }
            node.value = option.to_string();
            Ok(())
        })
    }

    async fn set_checked(
        &self,
        _ctx: &ExecCtx,
        handle: &ElementHandle,
        checked: bool,
    ) -> Result<(), ActionError> {
        self.enter(FakeOp::Check).await?;
        let call = DriverCall::SetChecked {
            node: handle.node_id.clone(),
            checked,
        };
        self.with_live_node(handle, call, |inner, idx| {
            inner.nodes[idx].checked = checked;
            Ok(())
        })
    }

    async fn read(
        &self,
        _ctx: &ExecCtx,
        handle: &ElementHandle,
        property: AssertProperty,
    ) -> Result<String, ActionError> {
        self.enter(FakeOp::Read).await?;
        let call = DriverCall::Read {
            node: handle.node_id.clone(),
            property,
        };
        self.with_live_node(handle, call, |inner, idx| {
            let node = &inner.nodes[idx];
            Ok(match property {
                AssertProperty::Text => node.attrs.text.clone().unwrap_or_default(),
                AssertProperty::Value => node.value.clone(),
                AssertProperty::Visible => node.visible.to_string(),
                AssertProperty::Url => inner.url.clone(),
                AssertProperty::Title => inner.title.clone(),
            })
        })
    }

    async fn current_url(&self, _ctx: &ExecCtx) -> Result<String, ActionError> {
        Ok(self.inner.lock().url.clone())
    }

    async fn title(&self, _ctx: &ExecCtx) -> Result<String, ActionError> {
        Ok(self.inner.lock().title.clone())
    }
}
