//! Aggregation of paginated listings.
//!
//! Both supported styles decode into the same [`Page<T>`]; which fields
//! matter is decided by the kind's [`Pagination`] descriptor:
//!
//! - **Cursor**: follow `next` (absolute URL, path, or bare token) until it is
//!   empty or a page comes back with no results. A `next` value that was
//!   already followed ends the listing instead of looping.
//! - **Offset/limit**: advance `offset` by the page size until a short page
//!   or the reported `count` ends the listing.
//!
//! Every style is bounded by [`ListOptions::max_pages`]. Pages are fetched
//! strictly one after the other because each request depends on the
//! previous response.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::EndpointConfig;
use crate::error::RestError;
use crate::http::{HttpMethod, RequestEnvelope};
use crate::schema::Pagination;
use crate::transport::{decode, Dispatch, Transport};

/// Default cap on the number of pages fetched by one listing.
pub const DEFAULT_MAX_PAGES: usize = 1000;

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    /// Entities on this page.
    #[serde(default)]
    pub results: Vec<T>,
    /// Continuation for cursor listings.
    #[serde(default)]
    pub next: Option<String>,
    /// Total number of entities for offset/limit listings.
    #[serde(default)]
    pub count: Option<u64>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            next: None,
            count: None,
        }
    }
}

impl<T> Page<T> {
    /// The continuation, treating an empty string as "no more pages".
    pub fn next_link(&self) -> Option<&str> {
        self.next.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

/// Per-call listing limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    /// Maximum number of pages fetched before failing with
    /// [`RestError::PageLimitExceeded`].
    pub max_pages: usize,
    /// Overrides the descriptor's page size for offset/limit listings.
    pub page_size: Option<u32>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            page_size: None,
        }
    }
}

impl ListOptions {
    /// Set the page cap.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Set the offset/limit page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

/// Fetch every page of the listing at `path` and concatenate the results.
pub async fn collect<T, D>(
    transport: &Transport<D>,
    pagination: &Pagination,
    path: &str,
    query: &[(String, String)],
    options: &ListOptions,
) -> Result<Vec<T>, RestError>
where
    T: DeserializeOwned,
    D: Dispatch,
{
    match pagination {
        Pagination::Unpaginated => collect_unpaginated(transport, path, query, options).await,
        Pagination::Cursor { cursor_param } => {
            collect_cursor(transport, path, query, cursor_param, options).await
        },
        Pagination::OffsetLimit {
            limit,
            offset_param,
            limit_param,
        } => {
            let limit = options.page_size.unwrap_or(*limit).max(1);
            collect_offset_limit(transport, path, query, limit, offset_param, limit_param, options)
                .await
        },
    }
}

async fn collect_unpaginated<T, D>(
    transport: &Transport<D>,
    path: &str,
    query: &[(String, String)],
    options: &ListOptions,
) -> Result<Vec<T>, RestError>
where
    T: DeserializeOwned,
    D: Dispatch,
{
    check_budget(0, options)?;
    let request = RequestEnvelope::new(HttpMethod::Get, path).with_query(query.to_vec());
    let raw = transport.send(request).await?;
    Ok(decode::<Vec<T>>(raw)?.unwrap_or_default())
}

async fn collect_cursor<T, D>(
    transport: &Transport<D>,
    path: &str,
    query: &[(String, String)],
    cursor_param: &str,
    options: &ListOptions,
) -> Result<Vec<T>, RestError>
where
    T: DeserializeOwned,
    D: Dispatch,
{
    let mut results = Vec::new();
    let mut followed = HashSet::new();
    let mut request = RequestEnvelope::new(HttpMethod::Get, path).with_query(query.to_vec());
    let mut pages = 0;

    loop {
        check_budget(pages, options)?;
        let raw = transport.send(request).await?;
        pages += 1;

        let page: Page<T> = decode(raw)?.unwrap_or_default();
        let fetched = page.results.len();
        let next = page.next_link().map(str::to_string);
        results.extend(page.results);
        debug!(path, page = pages, fetched, "Fetched cursor page");

        let Some(next) = next else { break };
        if fetched == 0 {
            break;
        }
        if !followed.insert(next.clone()) {
            warn!(path, next = %next, "Listing repeated a cursor; stopping");
            break;
        }
        request = follow(transport.config(), path, query, cursor_param, &next)?;
    }

    Ok(results)
}

async fn collect_offset_limit<T, D>(
    transport: &Transport<D>,
    path: &str,
    query: &[(String, String)],
    limit: u32,
    offset_param: &str,
    limit_param: &str,
    options: &ListOptions,
) -> Result<Vec<T>, RestError>
where
    T: DeserializeOwned,
    D: Dispatch,
{
    let mut results = Vec::new();
    let mut offset: u64 = 0;
    let mut pages = 0;

    loop {
        check_budget(pages, options)?;
        let mut page_query = query.to_vec();
        page_query.push((offset_param.to_string(), offset.to_string()));
        page_query.push((limit_param.to_string(), limit.to_string()));
        let request = RequestEnvelope::new(HttpMethod::Get, path).with_query(page_query);

        let raw = transport.send(request).await?;
        pages += 1;

        let page: Page<T> = decode(raw)?.unwrap_or_default();
        let fetched = page.results.len();
        let count = page.count;
        results.extend(page.results);
        debug!(path, offset, fetched, ?count, "Fetched offset page");

        offset += u64::from(limit);
        if fetched < limit as usize {
            break;
        }
        if count.is_some_and(|count| offset >= count) {
            break;
        }
    }

    Ok(results)
}

fn check_budget(pages: usize, options: &ListOptions) -> Result<(), RestError> {
    if pages >= options.max_pages {
        return Err(RestError::PageLimitExceeded {
            limit: options.max_pages,
        });
    }
    Ok(())
}

/// Build the request for a cursor continuation.
fn follow(
    config: &EndpointConfig,
    path: &str,
    query: &[(String, String)],
    cursor_param: &str,
    next: &str,
) -> Result<RequestEnvelope, RestError> {
    if let Some(url) = Url::parse(next)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
    {
        // The bearer token goes wherever the link points.
        if !config.owns(&url) {
            return Err(RestError::InvalidNextLink(next.to_string()));
        }
        return Ok(RequestEnvelope::new(HttpMethod::Get, url.as_str()));
    }

    if next.starts_with('/') {
        let url = config.resolve_link(next)?;
        return Ok(RequestEnvelope::new(HttpMethod::Get, url.as_str()));
    }

    let mut cursor_query: Vec<(String, String)> = query
        .iter()
        .filter(|(k, _)| k != cursor_param)
        .cloned()
        .collect();
    cursor_query.push((cursor_param.to_string(), next.to_string()));
    Ok(RequestEnvelope::new(HttpMethod::Get, path).with_query(cursor_query))
}
