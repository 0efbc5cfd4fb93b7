//! Custom tracing layers
//!
//! This module provides a layer that attaches the active request context
//! to every span opened while a [`RequestContextGuard`] is alive.

use tracing::{Subscriber, span};
use tracing_subscriber::{
    layer::{Context, Layer},
    registry::LookupSpan,
};

use crate::context::{RequestContextData, RequestContextGuard};

/// Layer that injects request context into spans
pub struct RequestContextLayer;

impl RequestContextLayer {
    /// Create a new request context layer
    pub fn new() -> Self {
        Self
    }
}

impl Default for RequestContextLayer {
    fn default() -> Self {
        Self::new()
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone)]
pub struct RequestContextExtension {
    pub data: RequestContextData,
}

impl<S> Layer<S> for RequestContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id)
            && let Some(request) = RequestContextGuard::current()
        {
            span.extensions_mut()
                .insert(RequestContextExtension { data: request });
        }
    }
}
