//! Route Extractor (spec §4.9): the dual of registration. Walking the
//! pipeline itself is implemented per-link in `links.rs` (each link only
//! knows how to contribute its own dimension); this module is the
//! user-facing entry point, plus the filtering `find_routes()` supports.
use http::Method;

use crate::{
    links::RouteDescriptor,
    negotiation::{ContentType, LanguageRange, MediaRange},
    route::Router,
};

/// A filter over any subset of dimensions (spec §4.1 "`findRoutes()`
/// (filter by any subset of dimensions)"). `None` on a field means "don't
/// filter on this dimension".
#[derive(Debug, Clone, Default)]
pub struct RouteFilter {
    pub path_prefix: Option<String>,
    pub method: Option<Method>,
    pub consume: Option<MediaRange>,
    pub produce: Option<ContentType>,
    pub language: Option<LanguageRange>,
    pub disabled: Option<bool>,
}

impl RouteFilter {
    fn matches(&self, route: &RouteDescriptor) -> bool {
        if let Some(prefix) = &self.path_prefix {
            if !route.path.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(method) = &self.method {
            if route.method.as_ref() != Some(method) {
                return false;
            }
        }
        if let Some(consume) = &self.consume {
            if route.consume.as_ref() != Some(consume) {
                return false;
            }
        }
        if let Some(produce) = &self.produce {
            if route.produce.as_ref() != Some(produce) {
                return false;
            }
        }
        if let Some(language) = &self.language {
            if route.language.as_ref() != Some(language) {
                return false;
            }
        }
        if let Some(disabled) = self.disabled {
            if route.disabled != disabled {
                return false;
            }
        }
        true
    }
}

/// Extract every route in the pipeline matching `filter` (spec §4.9/§4.1).
pub fn find_routes<CX: Clone + 'static>(router: &Router<CX>, filter: &RouteFilter) -> Vec<RouteDescriptor> {
    router.find_routes().into_iter().filter(|r| filter.matches(r)).collect()
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;

    #[test]
    fn filters_by_method_and_disabled_state() {
        let router: Router<()> = Router::new();
        router.route("/a").method(Method::GET).handler(|_req, _cx| async move {
            Ok((http::Response::builder().status(200).body(crate::body::empty_body()).unwrap(), false))
        });
        router.route("/b").method(Method::POST).handler(|_req, _cx| async move {
            Ok((http::Response::builder().status(200).body(crate::body::empty_body()).unwrap(), false))
        });

        let gets = find_routes(
            &router,
            &RouteFilter {
                method: Some(Method::GET),
                ..Default::default()
            },
        );
        assert_eq!(gets.len(), 1);
        assert_eq!(gets[0].path, "/a");

        let enabled = find_routes(
            &router,
            &RouteFilter {
                disabled: Some(false),
                ..Default::default()
            },
        );
        assert_eq!(enabled.len(), 2);
    }
}
