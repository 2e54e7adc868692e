/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 *
 * Licensed under the Apache License, Version 2.0 (the "License").
 * You may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

// The paginator family. Query, Scan, and ParallelScan become pull-driven
// async sequences of raw result pages (with cumulative counters and merged
// capacity), plus item-level wrappers that flatten pages. Parallel scan
// carries a per-segment state array that can be snapshotted at any moment
// and handed to a later paginator to resume the scan.

use crate::data::{Item, Key};
use crate::transport::{
    merge_consumed_capacity, CapacityError, ConsumedCapacity, DynamoDbTransport, QueryInput,
    ResultPage, ScanInput, TransportError,
};
use futures::future::BoxFuture;
use futures::stream::{self, FuturesUnordered, Stream, StreamExt};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::error;
use std::fmt;
use std::sync::Arc;

/* =================================================
struct / enum / const
================================================= */

#[derive(Debug)]
pub enum PaginatorError {
    /// The underlying client failed; the iterator is poisoned.
    Transport(TransportError),
    /// Per-page capacity reports could not be merged.
    Capacity(CapacityError),
    /// The iterator was closed, or a previous `next()` already failed.
    Interrupted,
    /// A resume state whose length differs from TotalSegments.
    InvalidScanState { expected: usize, actual: usize },
    /// TotalSegments must be a positive integer.
    InvalidTotalSegments(usize),
}

impl fmt::Display for PaginatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaginatorError::Transport(ref e) => e.fmt(f),
            PaginatorError::Capacity(ref e) => e.fmt(f),
            PaginatorError::Interrupted => {
                write!(f, "pagination was manually interrupted")
            }
            PaginatorError::InvalidScanState { expected, actual } => {
                write!(
                    f,
                    "parallel scan state has {} segments but the scan is configured for {}",
                    actual, expected
                )
            }
            PaginatorError::InvalidTotalSegments(n) => {
                write!(f, "TotalSegments must be a positive integer, got {}", n)
            }
        }
    }
}

impl error::Error for PaginatorError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            PaginatorError::Transport(ref e) => Some(e),
            PaginatorError::Capacity(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for PaginatorError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<CapacityError> for PaginatorError {
    fn from(e: CapacityError) -> Self {
        Self::Capacity(e)
    }
}

/// Cumulative pagination state shared by the query and scan paginators.
#[derive(Debug, Default)]
struct PageTracker {
    /// Soft cap on the total number of items returned.
    limit: Option<i64>,
    /// The user-requested page size (the wire `Limit` before capping).
    page_size: Option<i64>,
    count: i64,
    scanned_count: i64,
    consumed_capacity: Option<ConsumedCapacity>,
    last_evaluated_key: Option<Key>,
    finished: bool,
}

impl PageTracker {
    fn new(page_size: Option<i64>, limit: Option<i64>, start_key: Option<Key>) -> Self {
        Self {
            limit,
            page_size,
            last_evaluated_key: start_key,
            ..Default::default()
        }
    }

    fn at_limit(&self) -> bool {
        self.limit.map_or(false, |limit| self.count >= limit)
    }

    /// min(user page size, items remaining under the limit).
    fn next_page_size(&self) -> Option<i64> {
        match self.limit {
            Some(limit) => {
                let remaining = limit - self.count;
                Some(self.page_size.map_or(remaining, |p| p.min(remaining)))
            }
            None => self.page_size,
        }
    }

    fn absorb(&mut self, page: &ResultPage) -> Result<(), CapacityError> {
        self.count += page.count.unwrap_or(page.items.len() as i64);
        self.scanned_count += page.scanned_count.unwrap_or(0);
        self.consumed_capacity = merge_consumed_capacity(
            self.consumed_capacity.as_ref(),
            page.consumed_capacity.as_ref(),
        )?;
        self.last_evaluated_key = page.last_evaluated_key.clone();
        if page.last_evaluated_key.is_none() {
            // the table (or segment) is exhausted
            self.finished = true;
        }
        Ok(())
    }
}

/* =================================================
struct: Query / Scan paginators
================================================= */

/// An async sequence of raw Query result pages. The pagination token is
/// threaded invisibly; `limit` softly caps the total items returned.
pub struct QueryPaginator<T: DynamoDbTransport> {
    transport: Arc<T>,
    input: QueryInput,
    tracker: PageTracker,
    poisoned: bool,
}

/// An async sequence of raw Scan result pages. Also serves as the
/// per-segment child of the parallel scan paginator.
pub struct ScanPaginator<T: DynamoDbTransport> {
    transport: Arc<T>,
    input: ScanInput,
    tracker: PageTracker,
    poisoned: bool,
}

macro_rules! paginator_accessors {
    () => {
        /// Items yielded so far, summed across pages.
        pub fn count(&self) -> i64 {
            self.tracker.count
        }

        /// Items the service examined so far, summed across pages.
        pub fn scanned_count(&self) -> i64 {
            self.tracker.scanned_count
        }

        /// Capacity merged across every page received so far.
        pub fn consumed_capacity(&self) -> Option<&ConsumedCapacity> {
            self.tracker.consumed_capacity.as_ref()
        }

        /// The pagination token from the most recent non-terminal page.
        /// Preserved across `close()` so a later request can resume from it.
        pub fn last_evaluated_key(&self) -> Option<&Key> {
            self.tracker.last_evaluated_key.as_ref()
        }

        pub fn is_finished(&self) -> bool {
            self.tracker.finished || self.tracker.at_limit()
        }

        /// Disables the iterator; subsequent `next_page()` calls fail with
        /// an interrupted error. The last evaluated key stays readable.
        pub fn close(&mut self) {
            self.poisoned = true;
        }
    };
}

impl<T: DynamoDbTransport + 'static> QueryPaginator<T> {
    /// `input.limit` is the page size; `limit` softly caps total items.
    pub fn new(transport: Arc<T>, input: QueryInput, limit: Option<i64>) -> Self {
        let tracker = PageTracker::new(input.limit, limit, input.exclusive_start_key.clone());
        Self {
            transport,
            input,
            tracker,
            poisoned: false,
        }
    }

    paginator_accessors!();

    pub async fn next_page(&mut self) -> Option<Result<ResultPage, PaginatorError>> {
        if self.poisoned {
            return Some(Err(PaginatorError::Interrupted));
        }
        if self.tracker.finished || self.tracker.at_limit() {
            return None;
        }
        let mut request = self.input.clone();
        request.limit = self.tracker.next_page_size();
        request.exclusive_start_key = self.tracker.last_evaluated_key.clone();
        debug!(
            "querying table '{}' (limit {:?}, start key present: {})",
            request.table_name,
            request.limit,
            request.exclusive_start_key.is_some()
        );
        match self.transport.query(request).await {
            Ok(page) => {
                if let Err(e) = self.tracker.absorb(&page) {
                    self.poisoned = true;
                    return Some(Err(PaginatorError::Capacity(e)));
                }
                Some(Ok(page))
            }
            Err(e) => {
                self.poisoned = true;
                Some(Err(PaginatorError::Transport(e)))
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<ResultPage, PaginatorError>> {
        stream::unfold(self, |mut paginator| async move {
            paginator.next_page().await.map(|page| (page, paginator))
        })
    }
}

impl<T: DynamoDbTransport + 'static> ScanPaginator<T> {
    /// `input.limit` is the page size; `limit` softly caps total items. A
    /// parallel scan constructs one of these per segment with
    /// `input.segment` / `input.total_segments` filled in.
    pub fn new(transport: Arc<T>, input: ScanInput, limit: Option<i64>) -> Self {
        let tracker = PageTracker::new(input.limit, limit, input.exclusive_start_key.clone());
        Self {
            transport,
            input,
            tracker,
            poisoned: false,
        }
    }

    paginator_accessors!();

    pub async fn next_page(&mut self) -> Option<Result<ResultPage, PaginatorError>> {
        if self.poisoned {
            return Some(Err(PaginatorError::Interrupted));
        }
        if self.tracker.finished || self.tracker.at_limit() {
            return None;
        }
        let mut request = self.input.clone();
        request.limit = self.tracker.next_page_size();
        request.exclusive_start_key = self.tracker.last_evaluated_key.clone();
        debug!(
            "scanning table '{}' (segment {:?}, limit {:?}, start key present: {})",
            request.table_name,
            request.segment,
            request.limit,
            request.exclusive_start_key.is_some()
        );
        match self.transport.scan(request).await {
            Ok(page) => {
                if let Err(e) = self.tracker.absorb(&page) {
                    self.poisoned = true;
                    return Some(Err(PaginatorError::Capacity(e)));
                }
                Some(Ok(page))
            }
            Err(e) => {
                self.poisoned = true;
                Some(Err(PaginatorError::Transport(e)))
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<ResultPage, PaginatorError>> {
        stream::unfold(self, |mut paginator| async move {
            paginator.next_page().await.map(|page| (page, paginator))
        })
    }
}

/* =================================================
struct: item-level wrappers
================================================= */

macro_rules! item_iterator {
    ($name:ident, $paginator:ident) => {
        impl<T: DynamoDbTransport + 'static> $name<T> {
            pub fn new(paginator: $paginator<T>) -> Self {
                Self {
                    paginator,
                    buffer: VecDeque::new(),
                    poisoned: false,
                }
            }

            /// Pulls the next individual item, fetching pages as needed.
            pub async fn next_item(&mut self) -> Option<Result<Item, PaginatorError>> {
                if self.poisoned {
                    return Some(Err(PaginatorError::Interrupted));
                }
                loop {
                    if let Some(item) = self.buffer.pop_front() {
                        return Some(Ok(item));
                    }
                    match self.paginator.next_page().await? {
                        Ok(page) => {
                            self.buffer.extend(page.items);
                        }
                        Err(e) => {
                            self.poisoned = true;
                            return Some(Err(e));
                        }
                    }
                }
            }

            /// Detaches and returns the underlying page iterator. Consuming
            /// `self` makes further item iteration impossible by
            /// construction; buffered items not yet yielded are dropped.
            pub fn pages(self) -> $paginator<T> {
                self.paginator
            }

            /// Disables the iterator and releases buffered items. The
            /// paginator's last evaluated key stays readable for resumption.
            pub fn close(&mut self) {
                self.poisoned = true;
                self.buffer.clear();
                self.paginator.close();
            }

            pub fn count(&self) -> i64 {
                self.paginator.count()
            }

            pub fn scanned_count(&self) -> i64 {
                self.paginator.scanned_count()
            }

            pub fn consumed_capacity(&self) -> Option<&ConsumedCapacity> {
                self.paginator.consumed_capacity()
            }

            pub fn last_evaluated_key(&self) -> Option<&Key> {
                self.paginator.last_evaluated_key()
            }

            pub fn into_stream(self) -> impl Stream<Item = Result<Item, PaginatorError>> {
                stream::unfold(self, |mut iterator| async move {
                    iterator.next_item().await.map(|item| (item, iterator))
                })
            }
        }
    };
}

/// Flattens `QueryPaginator` pages into individual items.
pub struct QueryIterator<T: DynamoDbTransport> {
    paginator: QueryPaginator<T>,
    buffer: VecDeque<Item>,
    poisoned: bool,
}

/// Flattens `ScanPaginator` pages into individual items.
pub struct ScanIterator<T: DynamoDbTransport> {
    paginator: ScanPaginator<T>,
    buffer: VecDeque<Item>,
    poisoned: bool,
}

item_iterator!(QueryIterator, QueryPaginator);
item_iterator!(ScanIterator, ScanPaginator);

/* =================================================
struct: parallel scan
================================================= */

/// Resume state for one scan segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SegmentState {
    /// No page has been received for this segment yet.
    Uninitialized,
    /// At least one page received; a missing key means the segment is
    /// exhausted.
    Initialized { last_evaluated_key: Option<Key> },
}

/// Resume state for a whole parallel scan: one entry per segment. Snapshots
/// are plain data and serialize as DynamoDB JSON, so they can be persisted
/// and handed to a later `ParallelScanPaginator`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParallelScanState {
    segments: Vec<SegmentState>,
}

impl ParallelScanState {
    /// The state of a scan that has not started: every segment untouched.
    pub fn uninitialized(total_segments: usize) -> Self {
        Self {
            segments: vec![SegmentState::Uninitialized; total_segments],
        }
    }

    /// Assembles a state from explicit segment entries, e.g. one restored
    /// from external storage.
    pub fn new(segments: Vec<SegmentState>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[SegmentState] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when every segment is initialized and exhausted.
    pub fn is_complete(&self) -> bool {
        self.segments.iter().all(|s| {
            matches!(
                s,
                SegmentState::Initialized {
                    last_evaluated_key: None
                }
            )
        })
    }
}

/// A scan page annotated with the segment that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParallelScanPage {
    pub segment: usize,
    pub page: ResultPage,
}

type ChildCompletion<T> = (
    usize,
    ScanPaginator<T>,
    Option<Result<ResultPage, PaginatorError>>,
);

/// Scans `TotalSegments` table segments concurrently, yielding pages in
/// completion order. Every in-flight segment is polled on each `next_page`,
/// so no segment starves; within a segment, pages arrive in transport
/// order.
pub struct ParallelScanPaginator<T: DynamoDbTransport> {
    in_flight: FuturesUnordered<BoxFuture<'static, ChildCompletion<T>>>,
    state: ParallelScanState,
    count: i64,
    scanned_count: i64,
    consumed_capacity: Option<ConsumedCapacity>,
    poisoned: bool,
}

impl<T: DynamoDbTransport + 'static> ParallelScanPaginator<T> {
    /// Starts a fresh scan split into `total_segments` segments. The
    /// `segment`/`total_segments`/`exclusive_start_key` fields of `input`
    /// are managed per child and must be left unset.
    pub fn new(
        transport: Arc<T>,
        input: ScanInput,
        total_segments: usize,
    ) -> Result<Self, PaginatorError> {
        Self::resume(
            transport,
            input,
            total_segments,
            ParallelScanState::uninitialized(total_segments),
        )
    }

    /// Resumes a scan from a captured state snapshot. Segments recorded as
    /// exhausted are never requested again; segments with a key resume from
    /// it. The state length must equal `total_segments`.
    pub fn resume(
        transport: Arc<T>,
        input: ScanInput,
        total_segments: usize,
        state: ParallelScanState,
    ) -> Result<Self, PaginatorError> {
        if total_segments == 0 {
            return Err(PaginatorError::InvalidTotalSegments(total_segments));
        }
        if state.len() != total_segments {
            return Err(PaginatorError::InvalidScanState {
                expected: total_segments,
                actual: state.len(),
            });
        }

        let in_flight = FuturesUnordered::new();
        for (segment, segment_state) in state.segments().iter().enumerate() {
            let start_key = match segment_state {
                SegmentState::Uninitialized => None,
                SegmentState::Initialized {
                    last_evaluated_key: Some(key),
                } => Some(key.clone()),
                SegmentState::Initialized {
                    last_evaluated_key: None,
                } => {
                    debug!("segment {} already exhausted; skipping", segment);
                    continue;
                }
            };
            let mut child_input = input.clone();
            child_input.segment = Some(segment as i64);
            child_input.total_segments = Some(total_segments as i64);
            child_input.exclusive_start_key = start_key;
            let child = ScanPaginator::new(Arc::clone(&transport), child_input, None);
            in_flight.push(Self::fetch_one(segment, child));
        }

        Ok(Self {
            in_flight,
            state,
            count: 0,
            scanned_count: 0,
            consumed_capacity: None,
            poisoned: false,
        })
    }

    /// One in-flight page request. The future owns the child paginator and
    /// hands it back with the result so it can be re-armed.
    fn fetch_one(segment: usize, mut child: ScanPaginator<T>) -> BoxFuture<'static, ChildCompletion<T>> {
        Box::pin(async move {
            let result = child.next_page().await;
            (segment, child, result)
        })
    }

    /// The next page from whichever segment responds first. Terminal once
    /// every segment is exhausted.
    pub async fn next_page(&mut self) -> Option<Result<ParallelScanPage, PaginatorError>> {
        if self.poisoned {
            return Some(Err(PaginatorError::Interrupted));
        }
        loop {
            let (segment, child, result) = self.in_flight.next().await?;
            match result {
                Some(Ok(page)) => {
                    self.state.segments[segment] = SegmentState::Initialized {
                        last_evaluated_key: page.last_evaluated_key.clone(),
                    };
                    self.count += page.count.unwrap_or(page.items.len() as i64);
                    self.scanned_count += page.scanned_count.unwrap_or(0);
                    match merge_consumed_capacity(
                        self.consumed_capacity.as_ref(),
                        page.consumed_capacity.as_ref(),
                    ) {
                        Ok(merged) => self.consumed_capacity = merged,
                        Err(e) => {
                            self.close();
                            return Some(Err(PaginatorError::Capacity(e)));
                        }
                    }
                    if !child.is_finished() {
                        self.in_flight.push(Self::fetch_one(segment, child));
                    }
                    return Some(Ok(ParallelScanPage { segment, page }));
                }
                Some(Err(e)) => {
                    self.close();
                    return Some(Err(e));
                }
                // the child reported terminal without a page; nothing to
                // yield for it, wait for the remaining segments
                None => continue,
            }
        }
    }

    /// A snapshot of the per-segment scan state. Safe to take at any time,
    /// including after `close()`; pages still in flight are not reflected
    /// and will be re-read on resume.
    pub fn scan_state(&self) -> ParallelScanState {
        self.state.clone()
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    pub fn scanned_count(&self) -> i64 {
        self.scanned_count
    }

    pub fn consumed_capacity(&self) -> Option<&ConsumedCapacity> {
        self.consumed_capacity.as_ref()
    }

    /// Terminates every child paginator and poisons the iterator. The scan
    /// state snapshot stays readable.
    pub fn close(&mut self) {
        self.poisoned = true;
        self.in_flight = FuturesUnordered::new();
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<ParallelScanPage, PaginatorError>> {
        stream::unfold(self, |mut paginator| async move {
            paginator.next_page().await.map(|page| (page, paginator))
        })
    }
}

/// Flattens `ParallelScanPaginator` pages into individual items.
pub struct ParallelScanIterator<T: DynamoDbTransport> {
    paginator: ParallelScanPaginator<T>,
    buffer: VecDeque<Item>,
    poisoned: bool,
}

impl<T: DynamoDbTransport + 'static> ParallelScanIterator<T> {
    pub fn new(paginator: ParallelScanPaginator<T>) -> Self {
        Self {
            paginator,
            buffer: VecDeque::new(),
            poisoned: false,
        }
    }

    pub async fn next_item(&mut self) -> Option<Result<Item, PaginatorError>> {
        if self.poisoned {
            return Some(Err(PaginatorError::Interrupted));
        }
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            match self.paginator.next_page().await? {
                Ok(scan_page) => {
                    self.buffer.extend(scan_page.page.items);
                }
                Err(e) => {
                    self.poisoned = true;
                    return Some(Err(e));
                }
            }
        }
    }

    /// Detaches and returns the underlying page iterator; buffered items
    /// not yet yielded are dropped.
    pub fn pages(self) -> ParallelScanPaginator<T> {
        self.paginator
    }

    /// A snapshot of the scan state. Items already buffered here but not
    /// yet yielded count as read in the snapshot; resuming from it will
    /// not repeat their page.
    pub fn scan_state(&self) -> ParallelScanState {
        self.paginator.scan_state()
    }

    pub fn close(&mut self) {
        self.poisoned = true;
        self.buffer.clear();
        self.paginator.close();
    }

    pub fn count(&self) -> i64 {
        self.paginator.count()
    }

    pub fn scanned_count(&self) -> i64 {
        self.paginator.scanned_count()
    }

    pub fn consumed_capacity(&self) -> Option<&ConsumedCapacity> {
        self.paginator.consumed_capacity()
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Item, PaginatorError>> {
        stream::unfold(self, |mut iterator| async move {
            iterator.next_item().await.map(|item| (item, iterator))
        })
    }
}

/* =================================================
Unit tests
================================================= */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AttributeValue;

    fn key(id: &str) -> Key {
        Key::from([(String::from("pk"), AttributeValue::S(id.to_string()))])
    }

    #[test]
    fn test_page_tracker_limit() {
        let mut tracker = PageTracker::new(None, Some(2), None);
        assert!(!tracker.at_limit());
        assert_eq!(tracker.next_page_size(), Some(2));

        tracker
            .absorb(&ResultPage {
                items: vec![key("a"), key("b")],
                count: Some(2),
                scanned_count: Some(5),
                last_evaluated_key: Some(key("b")),
                consumed_capacity: None,
            })
            .unwrap();
        assert!(tracker.at_limit());
        assert_eq!(tracker.count, 2);
        assert_eq!(tracker.scanned_count, 5);
        // the token of the last non-terminal page is preserved
        assert_eq!(tracker.last_evaluated_key, Some(key("b")));
        assert!(!tracker.finished);
    }

    #[test]
    fn test_page_tracker_soft_page_size() {
        let mut tracker = PageTracker::new(None, Some(3), None);
        tracker
            .absorb(&ResultPage {
                items: vec![key("a"), key("b")],
                count: Some(2),
                scanned_count: Some(2),
                last_evaluated_key: Some(key("b")),
                consumed_capacity: None,
            })
            .unwrap();
        // 3 - 2 = 1 item still allowed
        assert_eq!(tracker.next_page_size(), Some(1));

        // an explicit page size caps at the smaller of the two
        let tracker = PageTracker::new(Some(10), Some(3), None);
        assert_eq!(tracker.next_page_size(), Some(3));
        let tracker = PageTracker::new(Some(2), Some(30), None);
        assert_eq!(tracker.next_page_size(), Some(2));
    }

    #[test]
    fn test_page_tracker_finishes_without_token() {
        let mut tracker = PageTracker::new(None, None, None);
        tracker
            .absorb(&ResultPage {
                items: vec![key("a")],
                count: Some(1),
                scanned_count: Some(1),
                last_evaluated_key: None,
                consumed_capacity: None,
            })
            .unwrap();
        assert!(tracker.finished);
        assert_eq!(tracker.last_evaluated_key, None);
    }

    #[test]
    fn test_parallel_scan_state_snapshot_serde() {
        let state = ParallelScanState {
            segments: vec![
                SegmentState::Uninitialized,
                SegmentState::Initialized {
                    last_evaluated_key: Some(key("cursor")),
                },
                SegmentState::Initialized {
                    last_evaluated_key: None,
                },
            ],
        };
        let encoded = serde_json::to_string(&state).unwrap();
        let decoded: ParallelScanState = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, state);
        assert!(!state.is_complete());
        assert!(ParallelScanState {
            segments: vec![SegmentState::Initialized {
                last_evaluated_key: None
            }],
        }
        .is_complete());
    }
}
