//! Static route table built from `[[gateway.routes]]`.
//!
//! Lookup is longest-prefix on path-segment boundaries among the routes that
//! allow the request method. The table is immutable after startup.

use anyhow::{bail, Context};
use axum::http::{Method, Uri};
use url::Url;

use bookstore_kernel::settings::RouteSettings;

/// One validated forwarding rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    upstream_path: String,
    downstream_url: String,
    /// Path component of `downstream_url`, without a trailing slash.
    downstream_path: String,
    methods: Vec<Method>,
}

impl Route {
    /// Validate and normalize a configured route.
    pub fn from_settings(settings: &RouteSettings) -> anyhow::Result<Self> {
        let upstream_path = normalize_prefix(&settings.upstream_path)?;

        let url = Url::parse(&settings.downstream_url)
            .with_context(|| format!("invalid downstream url '{}'", settings.downstream_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!(
                "downstream url '{}' must use http or https",
                settings.downstream_url
            );
        }
        if url.host().is_none() {
            bail!("downstream url '{}' has no host", settings.downstream_url);
        }
        if url.query().is_some() || url.fragment().is_some() {
            bail!(
                "downstream url '{}' must not carry a query or fragment",
                settings.downstream_url
            );
        }

        let methods = settings
            .methods
            .iter()
            .map(|method| {
                Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
                    .with_context(|| format!("invalid method '{method}'"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            upstream_path,
            downstream_url: settings.downstream_url.trim_end_matches('/').to_string(),
            downstream_path: url.path().trim_end_matches('/').to_string(),
            methods,
        })
    }

    pub fn upstream_path(&self) -> &str {
        &self.upstream_path
    }

    pub fn downstream_url(&self) -> &str {
        &self.downstream_url
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }

    /// Remainder of `path` after this route's prefix, if the prefix matches
    /// on a segment boundary.
    fn strip<'p>(&self, path: &'p str) -> Option<&'p str> {
        if self.upstream_path == "/" {
            return Some(path);
        }
        let rest = path.strip_prefix(self.upstream_path.as_str())?;
        (rest.is_empty() || rest.starts_with('/')).then_some(rest)
    }

    /// Map a downstream `Location` back into the gateway's URL space.
    ///
    /// Accepts a path or an absolute URL on the downstream origin; anything
    /// pointing elsewhere is left to the caller.
    pub fn relocate(&self, location: &str) -> Option<String> {
        let path = match location.strip_prefix(self.downstream_url.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with(['/', '?']) => {
                format!("{}{}", self.downstream_path, rest)
            }
            Some(_) => return None,
            None if location.starts_with('/') => location.to_string(),
            None => return None,
        };

        let rest = path.strip_prefix(self.downstream_path.as_str())?;
        if !(rest.is_empty() || rest.starts_with(['/', '?'])) {
            return None;
        }

        Some(match (self.upstream_path.as_str(), rest) {
            ("/", "") => "/".to_string(),
            ("/", rest) if rest.starts_with('?') => format!("/{rest}"),
            ("/", rest) => rest.to_string(),
            (prefix, rest) => format!("{prefix}{rest}"),
        })
    }

    fn rewrite(&self, rest: &str, query: Option<&str>) -> anyhow::Result<Uri> {
        let mut target = format!("{}{}", self.downstream_url, rest);
        if let Some(query) = query {
            target.push('?');
            target.push_str(query);
        }
        target
            .parse::<Uri>()
            .with_context(|| format!("rewritten uri '{target}' is invalid"))
    }
}

/// A matched route together with the rewritten downstream URI.
#[derive(Debug, Clone)]
pub struct Resolved<'a> {
    pub route: &'a Route,
    pub uri: Uri,
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn from_settings(settings: &[RouteSettings]) -> anyhow::Result<Self> {
        let routes = settings
            .iter()
            .enumerate()
            .map(|(index, route)| {
                Route::from_settings(route).with_context(|| {
                    format!("gateway route #{} ('{}') is invalid", index + 1, route.upstream_path)
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self { routes })
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the route for `method` + `uri` and build the downstream URI.
    pub fn resolve(&self, method: &Method, uri: &Uri) -> Option<Resolved<'_>> {
        let path = uri.path();
        let (route, rest) = self
            .routes
            .iter()
            .filter(|route| route.allows(method))
            .filter_map(|route| route.strip(path).map(|rest| (route, rest)))
            .max_by_key(|(route, _)| route.upstream_path.len())?;

        match route.rewrite(rest, uri.query()) {
            Ok(uri) => Some(Resolved { route, uri }),
            Err(err) => {
                tracing::warn!(error = %err, upstream = %route.upstream_path, "route rewrite failed");
                None
            }
        }
    }
}

fn normalize_prefix(prefix: &str) -> anyhow::Result<String> {
    let prefix = prefix.trim();
    if !prefix.starts_with('/') {
        bail!("upstream path '{prefix}' must start with '/'");
    }
    let trimmed = prefix.trim_end_matches('/');
    Ok(if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(upstream: &str, downstream: &str, methods: &[&str]) -> RouteSettings {
        RouteSettings {
            upstream_path: upstream.to_string(),
            downstream_url: downstream.to_string(),
            methods: methods.iter().map(|m| m.to_string()).collect(),
        }
    }

    fn resolve(table: &RouteTable, method: Method, uri: &str) -> Option<String> {
        table
            .resolve(&method, &uri.parse().unwrap())
            .map(|resolved| resolved.uri.to_string())
    }

    #[test]
    fn rewrites_prefix_and_keeps_query() {
        let table = RouteTable::from_settings(&[route(
            "/books",
            "http://api:8080/api/books",
            &["GET", "POST", "PUT", "DELETE"],
        )])
        .unwrap();

        assert_eq!(
            resolve(&table, Method::GET, "/books").as_deref(),
            Some("http://api:8080/api/books")
        );
        assert_eq!(
            resolve(&table, Method::PUT, "/books/7").as_deref(),
            Some("http://api:8080/api/books/7")
        );
        assert_eq!(
            resolve(&table, Method::GET, "/books/search?term=Tolkien").as_deref(),
            Some("http://api:8080/api/books/search?term=Tolkien")
        );
    }

    #[test]
    fn prefix_matches_on_segment_boundary_only() {
        let table =
            RouteTable::from_settings(&[route("/books", "http://api:8080/api/books", &[])]).unwrap();

        assert!(resolve(&table, Method::GET, "/booksellers").is_none());
        assert!(resolve(&table, Method::GET, "/authors").is_none());
    }

    #[test]
    fn longest_prefix_wins() {
        let table = RouteTable::from_settings(&[
            route("/", "http://fallback:9000", &[]),
            route("/books", "http://api:8080/api/books", &[]),
            route("/books/archive", "http://archive:7000/old", &[]),
        ])
        .unwrap();

        assert_eq!(
            resolve(&table, Method::GET, "/books/archive/3").as_deref(),
            Some("http://archive:7000/old/3")
        );
        assert_eq!(
            resolve(&table, Method::GET, "/books/3").as_deref(),
            Some("http://api:8080/api/books/3")
        );
        assert_eq!(
            resolve(&table, Method::GET, "/anything/else").as_deref(),
            Some("http://fallback:9000/anything/else")
        );
    }

    #[test]
    fn method_filter_skips_route() {
        let table = RouteTable::from_settings(&[
            route("/", "http://fallback:9000", &[]),
            route("/books", "http://api:8080/api/books", &["get"]),
        ])
        .unwrap();

        assert_eq!(
            resolve(&table, Method::GET, "/books").as_deref(),
            Some("http://api:8080/api/books")
        );
        assert_eq!(
            resolve(&table, Method::DELETE, "/books/1").as_deref(),
            Some("http://fallback:9000/books/1")
        );
    }

    #[test]
    fn trailing_slashes_are_normalized() {
        let table =
            RouteTable::from_settings(&[route("/books/", "http://api:8080/api/books/", &[])])
                .unwrap();

        assert_eq!(table.routes()[0].upstream_path(), "/books");
        assert_eq!(table.routes()[0].downstream_url(), "http://api:8080/api/books");
        assert_eq!(
            resolve(&table, Method::GET, "/books/1").as_deref(),
            Some("http://api:8080/api/books/1")
        );
    }

    #[test]
    fn rejects_invalid_routes() {
        for bad in [
            route("books", "http://api:8080", &[]),
            route("/books", "not a url", &[]),
            route("/books", "ftp://api/books", &[]),
            route("/books", "http://api:8080/api?x=1", &[]),
            route("/books", "http://api:8080", &["GE T"]),
        ] {
            assert!(RouteTable::from_settings(&[bad.clone()]).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn accepts_https_downstream() {
        let table =
            RouteTable::from_settings(&[route("/books", "https://api.example.com/api/books", &[])])
                .unwrap();

        assert_eq!(
            resolve(&table, Method::GET, "/books/1").as_deref(),
            Some("https://api.example.com/api/books/1")
        );
    }

    #[test]
    fn relocates_downstream_locations() {
        let table = RouteTable::from_settings(&[
            route("/books", "http://api:8080/api/books", &[]),
            route("/", "http://fallback:9000", &[]),
        ])
        .unwrap();
        let books = &table.routes()[0];
        let fallback = &table.routes()[1];

        assert_eq!(books.relocate("/api/books/7").as_deref(), Some("/books/7"));
        assert_eq!(books.relocate("/api/books").as_deref(), Some("/books"));
        assert_eq!(
            books.relocate("http://api:8080/api/books/7?x=1").as_deref(),
            Some("/books/7?x=1")
        );
        assert_eq!(books.relocate("/api/bookshelf/1"), None);
        assert_eq!(books.relocate("/api/authors"), None);
        assert_eq!(books.relocate("https://elsewhere.example/api/books/7"), None);

        assert_eq!(fallback.relocate("/orders/3").as_deref(), Some("/orders/3"));
        assert_eq!(fallback.relocate("http://fallback:9000").as_deref(), Some("/"));
    }

    #[test]
    fn empty_table_resolves_nothing() {
        let table = RouteTable::from_settings(&[]).unwrap();
        assert!(table.is_empty());
        assert!(resolve(&table, Method::GET, "/books").is_none());
    }
}
