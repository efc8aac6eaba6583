//! Cursor walk over a paged endpoint.
//!
//! The walk is a plain loop over a cursor variable with a page cap. Any
//! failure ends the walk early; whatever was already yielded stays yielded and
//! the reason is kept in the [`WalkReport`].
use std::future::Future;
use std::marker::PhantomData;

use crate::error::{SyncError, SyncResult};

/// One fetched page.
#[derive(Debug)]
pub struct Page<T, C> {
    pub items: Vec<T>,
    pub next_cursor: Option<C>,
    pub has_more: bool,
    /// Set when only part of the page was usable: `items` are still yielded,
    /// then the walk ends with this error.
    pub failure: Option<SyncError>,
}

impl<T, C> Page<T, C> {
    pub fn new(items: Vec<T>, next_cursor: Option<C>, has_more: bool) -> Self {
        Self {
            items,
            next_cursor,
            has_more,
            failure: None,
        }
    }

    /// The usable head of a page whose remainder could not be read.
    pub fn partial(items: Vec<T>, failure: SyncError) -> Self {
        Self {
            items,
            next_cursor: None,
            has_more: false,
            failure: Some(failure),
        }
    }
}

/// Why a walk stopped.
#[derive(Debug)]
pub enum WalkEnd {
    /// The endpoint said there is nothing more.
    Exhausted,
    /// A page came back with no items.
    EmptyPage,
    /// The configured page cap was reached while the endpoint still had more.
    PageCap,
    /// The endpoint handed back the cursor it was just called with.
    StalledCursor,
    /// `has_more` was set but no cursor came with it.
    MissingCursor,
    /// Transport, protocol or shape failure on the next page.
    Failed(SyncError),
}

impl WalkEnd {
    /// Ends that mean the walk may have missed data.
    pub fn is_truncated(&self) -> bool {
        !matches!(self, WalkEnd::Exhausted | WalkEnd::EmptyPage)
    }

    pub fn label(&self) -> &'static str {
        match self {
            WalkEnd::Exhausted => "exhausted",
            WalkEnd::EmptyPage => "empty_page",
            WalkEnd::PageCap => "page_cap",
            WalkEnd::StalledCursor => "stalled_cursor",
            WalkEnd::MissingCursor => "missing_cursor",
            WalkEnd::Failed(_) => "failed",
        }
    }
}

#[derive(Debug)]
pub struct WalkReport {
    pub pages: usize,
    pub items: usize,
    pub end: WalkEnd,
}

/// Result of [`Paginator::collect`].
#[derive(Debug)]
pub struct Walk<T> {
    pub items: Vec<T>,
    pub report: WalkReport,
}

pub struct Paginator<T, C, F> {
    fetch: F,
    cursor: Option<C>,
    max_pages: usize,
    pages: usize,
    items: usize,
    end: Option<WalkEnd>,
    _item: PhantomData<fn() -> T>,
}

impl<T, C, F, Fut> Paginator<T, C, F>
where
    C: Clone + PartialEq,
    F: FnMut(Option<C>) -> Fut,
    Fut: Future<Output = SyncResult<Page<T, C>>>,
{
    /// `initial` is the cursor of the first request; pass a saved cursor to
    /// resume a walk.
    pub fn new(fetch: F, initial: Option<C>, max_pages: usize) -> Self {
        Self {
            fetch,
            cursor: initial,
            max_pages: max_pages.max(1),
            pages: 0,
            items: 0,
            end: None,
            _item: PhantomData,
        }
    }

    /// Cursor the next request will be sent with.
    pub fn cursor(&self) -> Option<&C> {
        self.cursor.as_ref()
    }

    pub fn is_done(&self) -> bool {
        self.end.is_some()
    }

    /// Fetches the next page. `None` once the walk has ended.
    pub async fn next_page(&mut self) -> Option<Vec<T>> {
        if self.end.is_some() {
            return None;
        }
        if self.pages >= self.max_pages {
            self.end = Some(WalkEnd::PageCap);
            return None;
        }

        let page = match (self.fetch)(self.cursor.clone()).await {
            Ok(page) => page,
            Err(err) => {
                self.end = Some(WalkEnd::Failed(err));
                return None;
            }
        };
        self.pages += 1;

        if let Some(err) = page.failure {
            self.end = Some(WalkEnd::Failed(err));
            if page.items.is_empty() {
                return None;
            }
            self.items += page.items.len();
            return Some(page.items);
        }
        if page.items.is_empty() {
            self.end = Some(WalkEnd::EmptyPage);
            return None;
        }
        self.items += page.items.len();

        if !page.has_more {
            self.end = Some(WalkEnd::Exhausted);
        } else {
            match page.next_cursor {
                None => self.end = Some(WalkEnd::MissingCursor),
                Some(next) if self.cursor.as_ref() == Some(&next) => {
                    self.end = Some(WalkEnd::StalledCursor)
                }
                Some(next) => self.cursor = Some(next),
            }
        }
        Some(page.items)
    }

    /// Report for a walk that was driven with [`next_page`](Self::next_page).
    pub fn finish(self) -> WalkReport {
        WalkReport {
            pages: self.pages,
            items: self.items,
            end: self.end.unwrap_or(WalkEnd::Exhausted),
        }
    }

    /// Drives the walk to its end, buffering every item.
    pub async fn collect(mut self) -> Walk<T> {
        let mut items = Vec::new();
        while let Some(mut page) = self.next_page().await {
            items.append(&mut page);
        }
        Walk {
            items,
            report: self.finish(),
        }
    }
}
