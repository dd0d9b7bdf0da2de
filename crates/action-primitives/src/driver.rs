//! Browser driver collaborator
//!
//! The page is never held by the engine: every resolution and action call
//! receives the driver explicitly. Implementations wrap a real automation
//! backend; tests use [`crate::fake::FakePage`].

use async_trait::async_trait;

use crate::{
    errors::ActionError,
    selector::SelectorKind,
    types::{AssertProperty, ClickOptions, ElementAttributes, ElementHandle, ExecCtx},
};

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// All live elements matching one selector link, in document order.
    /// With `scope`, only descendants of that element are considered.
    async fn query(
        &self,
        ctx: &ExecCtx,
        kind: &SelectorKind,
        scope: Option<&ElementHandle>,
    ) -> Result<Vec<ElementHandle>, ActionError>;

    /// Element carrying the given marker, if it is still attached
    async fn find_by_fallback_id(
        &self,
        ctx: &ExecCtx,
        fallback_id: &str,
    ) -> Result<Option<ElementHandle>, ActionError>;

    /// Attributes of a live element
    async fn describe(
        &self,
        ctx: &ExecCtx,
        handle: &ElementHandle,
    ) -> Result<ElementAttributes, ActionError>;

    /// Interactive elements tagged by the marking pass
    async fn marked_elements(&self, ctx: &ExecCtx) -> Result<Vec<ElementAttributes>, ActionError>;

    async fn navigate(&self, ctx: &ExecCtx, url: &str) -> Result<(), ActionError>;

    async fn click(
        &self,
        ctx: &ExecCtx,
        handle: &ElementHandle,
        options: &ClickOptions,
    ) -> Result<(), ActionError>;

    /// Replace the control's value
    async fn fill(&self, ctx: &ExecCtx, handle: &ElementHandle, value: &str)
        -> Result<(), ActionError>;

    /// Type key by key, appending to the current value
    async fn type_text(
        &self,
        ctx: &ExecCtx,
        handle: &ElementHandle,
        text: &str,
    ) -> Result<(), ActionError>;

    async fn select_option(
        &self,
        ctx: &ExecCtx,
        handle: &ElementHandle,
        option: &str,
    ) -> Result<(), ActionError>;

    async fn set_checked(
        &self,
        ctx: &ExecCtx,
        handle: &ElementHandle,
        checked: bool,
    ) -> Result<(), ActionError>;

    /// Read an element property for assertions. `Visible` reads as
    /// `"true"`/`"false"`.
    async fn read(
        &self,
        ctx: &ExecCtx,
        handle: &ElementHandle,
        property: AssertProperty,
    ) -> Result<String, ActionError>;

    async fn current_url(&self, ctx: &ExecCtx) -> Result<String, ActionError>;

    async fn title(&self, ctx: &ExecCtx) -> Result<String, ActionError>;
}
