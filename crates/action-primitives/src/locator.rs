//! Descriptor chain evaluation against a live driver

use tracing::debug;

use crate::{
    driver::BrowserDriver,
    errors::ActionError,
    selector::SelectorDescriptor,
    types::{ElementHandle, ExecCtx},
};

/// Every element the chain matches.
///
/// A link with a child must settle on a single node (after its `nth`);
/// the child is then queried inside that node's subtree only. A parent
/// with no match yields an empty result, several matches without `nth`
/// is an [`ActionError::AmbiguousSelector`].
pub async fn query_chain(
    driver: &dyn BrowserDriver,
    ctx: &ExecCtx,
    descriptor: &SelectorDescriptor,
) -> Result<Vec<ElementHandle>, ActionError> {
    let mut scope: Option<ElementHandle> = None;
    let mut link = descriptor;

    loop {
        let matches = driver.query(ctx, &link.kind, scope.as_ref()).await?;
        debug!(selector = %link.kind, count = matches.len(), "selector link matched");

        let narrowed = match link.nth {
            Some(nth) => matches.into_iter().nth(nth).into_iter().collect::<Vec<_>>(),
            None => matches,
        };

        let Some(child) = link.child.as_deref() else {
            return Ok(narrowed);
        };

        match narrowed.len() {
            0 => return Ok(Vec::new()),
            1 => {
                scope = narrowed.into_iter().next();
                link = child;
            }
            n => {
                return Err(ActionError::AmbiguousSelector(format!(
                    "scope '{}' matched {} elements",
                    link.kind, n
                )))
            }
        }
    }
}

/// Number of live elements the chain matches
pub async fn count_matches(
    driver: &dyn BrowserDriver,
    ctx: &ExecCtx,
    descriptor: &SelectorDescriptor,
) -> Result<usize, ActionError> {
    Ok(query_chain(driver, ctx, descriptor).await?.len())
}

/// Resolve the chain to exactly one element
pub async fn locate(
    driver: &dyn BrowserDriver,
    ctx: &ExecCtx,
    descriptor: &SelectorDescriptor,
) -> Result<ElementHandle, ActionError> {
    let mut matches = query_chain(driver, ctx, descriptor).await?;
    match matches.len() {
        0 => Err(ActionError::SelectorNotFound(descriptor.to_string())),
        1 => Ok(matches.remove(0)),
        n => Err(ActionError::AmbiguousSelector(format!(
            "{} matched {} elements",
            descriptor, n
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakePage;
    use crate::selector::TextMatch;
    use crate::types::ElementAttributes;
    use std::time::Duration;
    use stepreplay_core_types::RunId;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> ExecCtx {
        ExecCtx::new(RunId::new(), Duration::from_secs(5), CancellationToken::new())
    }

    fn two_forms() -> FakePage {
        let page = FakePage::new("https://app.test/");
        let login = page.add(ElementAttributes::new("form").with_test_id("login"));
        page.add_child(
            login,
            ElementAttributes::new("button").with_role("button", Some("Submit")),
        );
        let signup = page.add(ElementAttributes::new("form").with_test_id("signup"));
        page.add_child(
            signup,
            ElementAttributes::new("button").with_role("button", Some("Submit")),
        );
        page
    }

    #[tokio::test]
    async fn test_child_is_scoped_to_parent_subtree() {
        let page = two_forms();
        let ctx = ctx();
        let submit = SelectorDescriptor::role("button", Some(TextMatch::literal("Submit")), true);

        assert_eq!(count_matches(&page, &ctx, &submit).await.unwrap(), 2);

        let scoped = SelectorDescriptor::test_id("signup").with_child(submit.clone());
        let handle = locate(&page, &ctx, &scoped).await.unwrap();
        let attrs = page.describe_node(&handle).unwrap();
        assert_eq!(
            attrs.container.and_then(|c| c.test_id).as_deref(),
            Some("signup")
        );
    }

    #[tokio::test]
    async fn test_nth_and_ambiguity() {
        let page = two_forms();
        let ctx = ctx();
        let submit = SelectorDescriptor::role("button", Some(TextMatch::literal("Submit")), true);

        let err = locate(&page, &ctx, &submit).await.unwrap_err();
        assert!(matches!(err, ActionError::AmbiguousSelector(_)));

        assert!(locate(&page, &ctx, &submit.clone().with_nth(1)).await.is_ok());
        assert_eq!(count_matches(&page, &ctx, &submit.with_nth(5)).await.unwrap(), 0);

        let forms = SelectorDescriptor::css("form")
            .with_child(SelectorDescriptor::css("button"));
        assert!(matches!(
            query_chain(&page, &ctx, &forms).await,
            Err(ActionError::AmbiguousSelector(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_parent_yields_nothing() {
        let page = two_forms();
        let chain = SelectorDescriptor::test_id("nope").with_child(SelectorDescriptor::css("button"));
        assert_eq!(count_matches(&page, &ctx(), &chain).await.unwrap(), 0);
        assert!(matches!(
            locate(&page, &ctx(), &chain).await,
            Err(ActionError::SelectorNotFound(_))
        ));
    }
}
