//! Route resolution: explicit URL, then explicit node, then pool rotation.

use super::endpoint::Endpoint;
use super::endpoint_pool::EndpointPool;
use crate::error::{Result, TremError};

/// What the caller asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteRequest {
    /// Pinned node name.
    pub node: Option<String>,
    /// Pinned URL, wins over `node`.
    pub url: Option<String>,
}

impl RouteRequest {
    /// A request that lets the pool choose.
    pub fn rotate() -> Self {
        Self::default()
    }

    /// True when nothing is pinned.
    pub fn is_rotation(&self) -> bool {
        self.node.is_none() && self.url.is_none()
    }
}

/// The node and endpoint a transport will use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    /// Node name, or the URL itself for a pinned URL.
    pub node: String,
    /// Endpoint to dial.
    pub endpoint: Endpoint,
    /// True when the route came from the pool.
    pub rotated: bool,
}

/// Resolves `request` against `pool`.
///
/// A pinned URL is validated and used verbatim. A pinned node must exist in
/// the pool; its URL goes through `decorate` (the HTTP client appends its
/// API path there). Otherwise the pool picks the next node outside
/// `excluded`. Pinned routes ignore exclusions.
pub fn resolve_route<F>(
    pool: &mut EndpointPool,
    request: &RouteRequest,
    excluded: &[String],
    decorate: F,
) -> Result<ResolvedRoute>
where
    F: Fn(&str) -> String,
{
    if let Some(url) = request.url.as_deref().filter(|u| !u.is_empty()) {
        return Ok(ResolvedRoute {
            node: url.to_string(),
            endpoint: Endpoint::parse(url)?,
            rotated: false,
        });
    }

    if let Some(node) = request.node.as_deref() {
        if let Some(base) = pool.get(node) {
            return Ok(ResolvedRoute {
                node: node.to_string(),
                endpoint: Endpoint::parse(&decorate(base))?,
                rotated: false,
            });
        }
        tracing::warn!("Unknown node '{}', falling back to rotation", node);
    }

    pool.update_exclusions(excluded.iter().cloned());
    let (node, base) = pool.next().ok_or(TremError::NoAvailableNodes)?;
    Ok(ResolvedRoute {
        endpoint: Endpoint::parse(&decorate(&base))?,
        node,
        rotated: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[(&str, &str)] = &[("taipei", "https://lb-1.exptech.dev"), ("pingtung", "https://lb-2.exptech.dev")];

    fn api(base: &str) -> String {
        format!("{}/api/v2/eq/eew", base)
    }

    #[test]
    fn url_wins_over_node() {
        let mut pool = EndpointPool::new(TABLE).unwrap();
        let req = RouteRequest { node: Some("taipei".into()), url: Some("http://127.0.0.1:9000/eew".into()) };
        let route = resolve_route(&mut pool, &req, &[], api).unwrap();
        assert_eq!(route.node, "http://127.0.0.1:9000/eew");
        assert_eq!(route.endpoint.as_str(), "http://127.0.0.1:9000/eew");
        assert!(!route.rotated);
    }

    #[test]
    fn known_node_is_decorated() {
        let mut pool = EndpointPool::new(TABLE).unwrap();
        let req = RouteRequest { node: Some("pingtung".into()), url: None };
        let route = resolve_route(&mut pool, &req, &["pingtung".into()], api).unwrap();
        assert_eq!(route.endpoint.as_str(), "https://lb-2.exptech.dev/api/v2/eq/eew");
    }

    #[test]
    fn rotation_honours_exclusions() {
        let mut pool = EndpointPool::new(TABLE).unwrap();
        let route = resolve_route(&mut pool, &RouteRequest::rotate(), &["taipei".into()], api).unwrap();
        assert_eq!(route.node, "pingtung");
        assert!(route.rotated);

        let all = vec!["taipei".to_string(), "pingtung".to_string()];
        assert!(matches!(
            resolve_route(&mut pool, &RouteRequest::rotate(), &all, api),
            Err(TremError::NoAvailableNodes)
        ));
    }

    #[test]
    fn bad_pinned_scheme_fails() {
        let mut pool = EndpointPool::new(TABLE).unwrap();
        let req = RouteRequest { node: None, url: Some("ftp://x".into()) };
        assert!(matches!(resolve_route(&mut pool, &req, &[], api), Err(TremError::UnsupportedScheme(_))));
    }
}
