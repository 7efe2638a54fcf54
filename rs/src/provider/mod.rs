pub mod graphhopper;
pub mod scoring;

pub use graphhopper::GraphHopperProvider;

use crate::core::errors::ProviderError;
use crate::core::types::{Route, RouteRequest};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type ProviderFuture<'a> =
    Pin<Box<dyn Future<Output = std::result::Result<Route, ProviderError>> + Send + 'a>>;

/// External directions service. Implementations return a normalized,
/// unsimplified [`Route`]; vendor quirks stay behind this trait.
pub trait RouteProvider: Send + Sync {
    fn fetch_route<'a>(&'a self, request: &'a RouteRequest) -> ProviderFuture<'a>;
}

impl<P: RouteProvider + ?Sized> RouteProvider for Arc<P> {
    fn fetch_route<'a>(&'a self, request: &'a RouteRequest) -> ProviderFuture<'a> {
        (**self).fetch_route(request)
    }
}
