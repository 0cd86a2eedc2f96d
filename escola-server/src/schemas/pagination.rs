//! Page-number pagination for list endpoints.

use std::future::Future;

use axum::http::Uri;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::entities::{ListParams, Listing, Window};
use crate::error::ServerError;

/// Query parameters shared by every list endpoint.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Whitespace or comma separated terms; every term must match some
    /// searchable field.
    pub search: Option<String>,
    /// Comma separated field names, `-` prefix for descending.
    pub ordering: Option<String>,
    /// 1-based page number.
    #[param(value_type = Option<u32>)]
    pub page: Option<String>,
}

/// One page of results.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Paginated body, or a bare array when pagination is disabled.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ListResponse<T> {
    Paged(Page<T>),
    Plain(Vec<T>),
}

fn invalid_page() -> ServerError {
    ServerError::NotFound("Invalid page.".to_owned())
}

/// Resolves `?page=` against the configured page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    page: u32,
    page_size: u32,
}

impl Paginator {
    /// `page_size == 0` disables pagination.
    pub fn new(query: &ListQuery, page_size: u32) -> Result<Option<Self>, ServerError> {
        if page_size == 0 {
            return Ok(None);
        }
        let page = match query.page.as_deref().map(str::trim) {
            None | Some("") => 1,
            Some(raw) => raw.parse::<u32>().map_err(|_| invalid_page())?,
        };
        if page == 0 {
            return Err(invalid_page());
        }
        Ok(Some(Self { page, page_size }))
    }

    pub fn window(&self) -> Window {
        Window {
            limit: i64::from(self.page_size),
            offset: i64::from(self.page - 1) * i64::from(self.page_size),
        }
    }

    fn num_pages(&self, count: i64) -> i64 {
        let size = i64::from(self.page_size);
        ((count + size - 1) / size).max(1)
    }

    /// Wrap a fetched window, rejecting pages past the end.
    pub fn page<T, U>(
        &self,
        uri: &Uri,
        listing: Listing<T>,
        render: impl FnMut(T) -> U,
    ) -> Result<Page<U>, ServerError> {
        let num_pages = self.num_pages(listing.count);
        let page = i64::from(self.page);
        if page > num_pages {
            return Err(invalid_page());
        }
        Ok(Page {
            count: listing.count,
            next: (page < num_pages).then(|| page_link(uri, Some(self.page + 1))),
            previous: match self.page {
                1 => None,
                2 => Some(page_link(uri, None)),
                n => Some(page_link(uri, Some(n - 1))),
            },
            results: listing.items.into_iter().map(render).collect(),
        })
    }
}

impl ListQuery {
    pub fn params(&self, paginator: Option<&Paginator>) -> ListParams {
        ListParams {
            search: self.search.clone(),
            ordering: self.ordering.clone(),
            window: paginator.map(Paginator::window),
        }
    }

    /// Run `fetch` with these parameters and shape the response.
    pub async fn respond<T, U, F, Fut>(
        &self,
        uri: &Uri,
        page_size: u32,
        fetch: F,
        render: impl FnMut(T) -> U,
    ) -> Result<ListResponse<U>, ServerError>
    where
        F: FnOnce(ListParams) -> Fut,
        Fut: Future<Output = Result<Listing<T>, sqlx::Error>>,
    {
        let paginator = Paginator::new(self, page_size)?;
        let listing = fetch(self.params(paginator.as_ref())).await?;
        match paginator {
            Some(p) => p.page(uri, listing, render).map(ListResponse::Paged),
            None => Ok(ListResponse::Plain(listing.items.into_iter().map(render).collect())),
        }
    }
}

/// The request path and query with `page` replaced (or dropped for `None`).
fn page_link(uri: &Uri, page: Option<u32>) -> String {
    let mut pairs: Vec<String> = uri
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|p| !p.is_empty() && p.split('=').next() != Some("page"))
        .map(str::to_owned)
        .collect();
    if let Some(n) = page {
        pairs.push(format!("page={n}"));
    }
    if pairs.is_empty() {
        uri.path().to_owned()
    } else {
        format!("{}?{}", uri.path(), pairs.join("&"))
    }
}
