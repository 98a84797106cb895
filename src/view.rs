//! Responsive View: the client-side state machine behind one image.
//!
//! ```text
//!            MetadataResolved
//! Loading ───────────────────▶ Ready
//!    │                          │
//!    │ FetchFailed              │ ImageLoadFailed
//!    ▼                          ▼
//!  Error ◀──────────────────────┘   (terminal)
//! ```
//!
//! The view fetches metadata once, when [`ResponsiveView::load`] is awaited.
//! Disposing the view while it is loading abandons the fetch and leaves the
//! state untouched; a disposed view ignores every later event.
//!
//! Rendering uses `maud`:
//!
//! ```text
//! Loading  <div class="loading">Loading...</div>
//! Error    <div class="error">Failed to load image. Please try again later.</div>
//! Ready    <img src=".." srcset=".." sizes=".." alt=".." loading="lazy">
//! ```

use crate::config::RuntimeConfig;
use crate::metadata::MetadataDocument;
use crate::naming;
use crate::resolver::{FetchError, MetadataResolver};
use crate::srcset::{ResolvedSrcSet, build_srcset};
use crate::types::SizeCatalog;
use maud::{Markup, html};
use tokio_util::sync::CancellationToken;

/// Message shown for every failure. Causes are logged, not displayed.
pub const LOAD_ERROR_MESSAGE: &str = "Failed to load image. Please try again later.";

/// Inputs of one view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewProps {
    /// Logical name; a trailing extension (`example.png`) is ignored.
    pub src: String,
    pub alt: String,
    /// Value of the `sizes` attribute.
    pub sizes: String,
    /// URL prefix of the artifact root.
    pub base_path: String,
    pub catalog: SizeCatalog,
}

impl ViewProps {
    /// Props with the stock runtime defaults.
    pub fn new(src: impl Into<String>, alt: impl Into<String>) -> Self {
        Self::from_runtime_config(src, alt, &RuntimeConfig::default(), SizeCatalog::default())
    }

    pub fn from_runtime_config(
        src: impl Into<String>,
        alt: impl Into<String>,
        runtime: &RuntimeConfig,
        catalog: SizeCatalog,
    ) -> Self {
        Self {
            src: src.into(),
            alt: alt.into(),
            sizes: runtime.sizes_hint.clone(),
            base_path: runtime.base_path.clone(),
            catalog,
        }
    }

    pub fn logical_name(&self) -> &str {
        naming::logical_name(&self.src)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyImage {
    pub srcset: ResolvedSrcSet,
    /// URL of the blur-up placeholder, when the metadata names one.
    pub placeholder_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCause {
    Fetch(FetchError),
    /// The browser failed to load the resolved image.
    ImageLoad,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    Loading,
    Ready(ReadyImage),
    Error { message: String, cause: ErrorCause },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    MetadataResolved(MetadataDocument),
    FetchFailed(FetchError),
    ImageLoadFailed,
}

impl ViewState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Apply one event. Events that don't apply to the current state leave it
    /// unchanged.
    pub fn transition(self, event: ViewEvent, props: &ViewProps) -> ViewState {
        match (self, event) {
            (Self::Loading, ViewEvent::MetadataResolved(doc)) => {
                Self::Ready(ready_image(props, &doc))
            }
            (Self::Loading, ViewEvent::FetchFailed(e)) => Self::Error {
                message: LOAD_ERROR_MESSAGE.to_string(),
                cause: ErrorCause::Fetch(e),
            },
            (Self::Ready(_), ViewEvent::ImageLoadFailed) => Self::Error {
                message: LOAD_ERROR_MESSAGE.to_string(),
                cause: ErrorCause::ImageLoad,
            },
            (state, _) => state,
        }
    }
}

fn ready_image(props: &ViewProps, doc: &MetadataDocument) -> ReadyImage {
    ReadyImage {
        srcset: build_srcset(
            &props.base_path,
            props.logical_name(),
            &props.catalog,
            doc.has_alpha,
        ),
        placeholder_url: doc
            .placeholder
            .as_deref()
            .map(|p| naming::join_url(&props.base_path, p)),
    }
}

/// `url("...")` with `\` and `"` escaped, so any URL stays one CSS string.
fn css_url(url: &str) -> String {
    format!("url(\"{}\")", url.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Render a state as HTML.
pub fn render_state(state: &ViewState, props: &ViewProps) -> Markup {
    match state {
        ViewState::Loading => html! {
            div.loading { "Loading..." }
        },
        ViewState::Error { message, .. } => html! {
            div.error { (message) }
        },
        ViewState::Ready(image) => {
            let style = image
                .placeholder_url
                .as_ref()
                .map(|url| format!("background-image: {}; background-size: cover", css_url(url)));
            html! {
                img
                    src=(image.srcset.src)
                    srcset=(image.srcset.srcset())
                    sizes=(props.sizes)
                    alt=(props.alt)
                    loading="lazy"
                    style=[style];
            }
        }
    }
}

/// One image on a page, bound to a [`MetadataResolver`].
pub struct ResponsiveView<R> {
    props: ViewProps,
    resolver: R,
    state: ViewState,
    disposed: CancellationToken,
}

impl<R: MetadataResolver> ResponsiveView<R> {
    pub fn new(props: ViewProps, resolver: R) -> Self {
        Self {
            props,
            resolver,
            state: ViewState::Loading,
            disposed: CancellationToken::new(),
        }
    }

    pub fn props(&self) -> &ViewProps {
        &self.props
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Token that disposes this view when cancelled. Can be handed to another
    /// task to tear the view down while a fetch is in flight.
    pub fn dispose_token(&self) -> CancellationToken {
        self.disposed.clone()
    }

    pub fn dispose(&self) {
        self.disposed.cancel();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.is_cancelled()
    }

    /// Fetch metadata and settle into `Ready` or `Error`.
    ///
    /// Does nothing unless the view is `Loading`. If the view is disposed
    /// before the fetch completes the result is dropped.
    pub async fn load(&mut self) -> &ViewState {
        if self.state != ViewState::Loading || self.is_disposed() {
            return &self.state;
        }
        let name = self.props.logical_name().to_string();
        tracing::debug!(%name, "resolving metadata");

        let outcome = tokio::select! {
            biased;
            _ = self.disposed.cancelled() => None,
            result = self.resolver.resolve(&name) => Some(result),
        };
        match outcome {
            Some(Ok(doc)) => self.apply(ViewEvent::MetadataResolved(doc)),
            Some(Err(e)) => {
                tracing::warn!(%name, error = %e, "image metadata unavailable");
                self.apply(ViewEvent::FetchFailed(e));
            }
            None => tracing::debug!(%name, "view disposed while loading"),
        }
        &self.state
    }

    /// Report that the browser failed to load the rendered image.
    pub fn image_load_failed(&mut self) {
        self.apply(ViewEvent::ImageLoadFailed);
    }

    pub fn apply(&mut self, event: ViewEvent) {
        if self.is_disposed() {
            return;
        }
        let state = std::mem::replace(&mut self.state, ViewState::Loading);
        self.state = state.transition(event, &self.props);
    }

    pub fn render(&self) -> Markup {
        render_state(&self.state, &self.props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticResolver {
        result: Result<MetadataDocument, FetchError>,
        calls: AtomicUsize,
    }

    impl StaticResolver {
        fn ok(doc: MetadataDocument) -> Self {
            Self {
                result: Ok(doc),
                calls: AtomicUsize::new(0),
            }
        }

        fn status(status: u16) -> Self {
            Self {
                result: Err(FetchError::Status {
                    url: "/assets/images/metadata/x.json".into(),
                    status,
                }),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MetadataResolver for StaticResolver {
        async fn resolve(&self, _logical_name: &str) -> Result<MetadataDocument, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    /// Never resolves.
    struct PendingResolver;

    #[async_trait]
    impl MetadataResolver for PendingResolver {
        async fn resolve(&self, _logical_name: &str) -> Result<MetadataDocument, FetchError> {
            std::future::pending().await
        }
    }

    fn props(src: &str) -> ViewProps {
        ViewProps::new(src, "An example")
    }

    #[test]
    fn starts_loading_and_renders_placeholder_text() {
        let view = ResponsiveView::new(props("example"), PendingResolver);
        assert_eq!(view.state(), &ViewState::Loading);
        assert_eq!(
            view.render().into_string(),
            r#"<div class="loading">Loading...</div>"#
        );
    }

    #[tokio::test]
    async fn resolved_metadata_makes_view_ready() {
        let mut view = ResponsiveView::new(
            props("example"),
            StaticResolver::ok(MetadataDocument::new(false)),
        );

        view.load().await;

        let ViewState::Ready(image) = view.state() else {
            panic!("expected Ready, got {:?}", view.state());
        };
        assert_eq!(image.srcset.src, "/assets/images/jpg/example-600.jpg");
        assert_eq!(image.srcset.entries.len(), 8);
        assert_eq!(image.placeholder_url, None);
    }

    #[tokio::test]
    async fn src_extension_is_stripped() {
        let mut view = ResponsiveView::new(
            props("example.png"),
            StaticResolver::ok(MetadataDocument::new(true)),
        );
        view.load().await;

        let html = view.render().into_string();
        assert!(html.contains(r#"src="/assets/images/png/example-600.png""#));
        assert!(!html.contains("example.png"));
    }

    #[tokio::test]
    async fn ready_renders_lazy_img() {
        let mut view = ResponsiveView::new(
            props("example"),
            StaticResolver::ok(MetadataDocument::new(false)),
        );
        view.load().await;

        let html = view.render().into_string();
        assert!(html.starts_with("<img "));
        assert!(html.contains(r#"loading="lazy""#));
        assert!(html.contains(r#"alt="An example""#));
        assert!(html.contains(
            r#"sizes="(max-width: 600px) 300px, (max-width: 1200px) 600px, 1200px""#
        ));
        assert!(html.contains(
            "/assets/images/webp/example-300.webp 300w, /assets/images/webp/example-600.webp 600w"
        ));
        assert!(!html.contains("style="));
    }

    #[tokio::test]
    async fn placeholder_becomes_background() {
        let doc = MetadataDocument::new(false).with_placeholder("placeholder/example-20.webp");
        let mut view = ResponsiveView::new(props("example"), StaticResolver::ok(doc));
        view.load().await;

        let ViewState::Ready(image) = view.state() else {
            panic!("expected Ready");
        };
        assert_eq!(
            image.placeholder_url.as_deref(),
            Some("/assets/images/placeholder/example-20.webp")
        );
        assert!(view.render().into_string().contains(
            r#"style="background-image: url(&quot;/assets/images/placeholder/example-20.webp&quot;); background-size: cover""#
        ));
    }

    #[test]
    fn css_url_keeps_quotes_inside_the_string() {
        assert_eq!(css_url("/a/b.webp"), r#"url("/a/b.webp")"#);
        assert_eq!(css_url(r#"/it's/"x"\y"#), r#"url("/it's/\"x\"\\y")"#);
    }

    #[tokio::test]
    async fn quote_in_base_path_cannot_leave_the_css_string() {
        let doc = MetadataDocument::new(true).with_placeholder("placeholder/logo-20.webp");
        let mut p = props("logo");
        p.base_path = "/it's/images".into();
        let mut view = ResponsiveView::new(p, StaticResolver::ok(doc));
        view.load().await;

        assert!(view.render().into_string().contains(
            r#"url(&quot;/it's/images/placeholder/logo-20.webp&quot;)"#
        ));
    }

    #[tokio::test]
    async fn fetch_failure_shows_error() {
        let mut view = ResponsiveView::new(props("missing"), StaticResolver::status(404));
        view.load().await;

        match view.state() {
            ViewState::Error { message, cause } => {
                assert!(!message.is_empty());
                assert_eq!(message, LOAD_ERROR_MESSAGE);
                assert!(matches!(cause, ErrorCause::Fetch(FetchError::Status { status: 404, .. })));
            }
            other => panic!("expected Error, got {other:?}"),
        }
        assert_eq!(
            view.render().into_string(),
            format!(r#"<div class="error">{LOAD_ERROR_MESSAGE}</div>"#)
        );
    }

    #[tokio::test]
    async fn image_load_failure_after_ready_is_error() {
        let mut view = ResponsiveView::new(
            props("example"),
            StaticResolver::ok(MetadataDocument::new(false)),
        );
        view.load().await;
        view.image_load_failed();

        assert!(view.state().is_terminal());
        assert!(matches!(
            view.state(),
            ViewState::Error { cause: ErrorCause::ImageLoad, .. }
        ));
    }

    #[tokio::test]
    async fn error_is_terminal() {
        let resolver = StaticResolver::status(500);
        let mut view = ResponsiveView::new(props("x"), resolver);
        view.load().await;
        let before = view.state().clone();

        view.apply(ViewEvent::MetadataResolved(MetadataDocument::new(true)));
        view.image_load_failed();
        view.load().await;

        assert_eq!(view.state(), &before);
        assert_eq!(view.resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn image_load_failure_while_loading_is_ignored() {
        let mut view = ResponsiveView::new(props("x"), PendingResolver);
        view.image_load_failed();
        assert_eq!(view.state(), &ViewState::Loading);
    }

    #[tokio::test]
    async fn disposal_abandons_in_flight_fetch() {
        let mut view = ResponsiveView::new(props("x"), PendingResolver);
        let token = view.dispose_token();

        tokio::join!(view.load(), async move { token.cancel() });

        assert_eq!(view.state(), &ViewState::Loading);
        assert!(view.is_disposed());
    }

    #[tokio::test]
    async fn disposed_view_ignores_resolution() {
        let resolver = StaticResolver::ok(MetadataDocument::new(false));
        let mut view = ResponsiveView::new(props("x"), resolver);
        view.dispose();
        view.load().await;

        assert_eq!(view.state(), &ViewState::Loading);
        assert_eq!(view.resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn transition_is_pure() {
        let p = props("example");
        let ready = ViewState::Loading
            .transition(ViewEvent::MetadataResolved(MetadataDocument::new(false)), &p);
        let again = ViewState::Loading
            .transition(ViewEvent::MetadataResolved(MetadataDocument::new(false)), &p);
        assert_eq!(ready, again);

        let late_failure = ViewEvent::FetchFailed(FetchError::Transport {
            url: "u".into(),
            message: "m".into(),
        });
        assert_eq!(ready.clone().transition(late_failure, &p), ready);
    }
}
