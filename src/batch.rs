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

// The batch operation engine. A (sync or async) source of (table, element)
// tuples is partitioned into size-bounded BatchGetItem / BatchWriteItem
// calls; elements the service reports as unprocessed are retried with
// per-table exponential backoff. The engine is a pull-driven async
// iterator: nothing is read from the source or sent on the wire except in
// service of a `next()` call.

use crate::data::{ddbjson_to_item, DataError, Item, Key};
use crate::transport::{
    BatchGetInput, BatchWriteInput, DynamoDbTransport, KeysAndAttributes, TransportError,
    WriteRequest,
};
use futures::future::BoxFuture;
use futures::stream::{self, FuturesUnordered, Stream, StreamExt};
use itertools::Itertools;
use log::{debug, warn};
use rand::Rng;
use std::collections::{HashMap, VecDeque};
use std::error;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/* =================================================
struct / enum / const
================================================= */

/// BatchGetItem accepts at most 100 keys per call.
pub const MAX_READS_PER_BATCH: usize = 100;

/// BatchWriteItem accepts at most 25 write requests per call.
pub const MAX_WRITES_PER_BATCH: usize = 25;

/// Caps the backoff shift so `1 << factor` stays in range. A table that
/// reaches this factor is already waiting upwards of twelve days.
const MAX_BACKOFF_EXPONENT: u32 = 40;

/// Read options applied to every request for one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableOptions {
    pub consistent_read: Option<bool>,
    pub projection_expression: Option<String>,
    pub expression_attribute_names: Option<HashMap<String, String>>,
}

#[derive(Debug)]
pub enum BatchError {
    /// The underlying client failed; the iterator is poisoned.
    Transport(TransportError),
    /// The iterator was closed, or a previous `next()` already failed.
    Interrupted,
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::Transport(ref e) => e.fmt(f),
            BatchError::Interrupted => write!(f, "batch iteration was manually interrupted"),
        }
    }
}

impl error::Error for BatchError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            BatchError::Transport(ref e) => Some(e),
            BatchError::Interrupted => None,
        }
    }
}

impl From<TransportError> for BatchError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

/// Errors raised while decoding batch request data from DynamoDB JSON.
#[derive(Debug)]
pub enum BatchInputError {
    ParseJson(serde_json::Error),
    Data(DataError),
    InvalidInput(String),
}

impl fmt::Display for BatchInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchInputError::ParseJson(ref e) => e.fmt(f),
            BatchInputError::Data(ref e) => e.fmt(f),
            BatchInputError::InvalidInput(ref msg) => write!(f, "{}", msg),
        }
    }
}

impl error::Error for BatchInputError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            BatchInputError::ParseJson(ref e) => Some(e),
            BatchInputError::Data(ref e) => Some(e),
            BatchInputError::InvalidInput(_) => None,
        }
    }
}

impl From<serde_json::Error> for BatchInputError {
    fn from(e: serde_json::Error) -> Self {
        Self::ParseJson(e)
    }
}

impl From<DataError> for BatchInputError {
    fn from(e: DataError) -> Self {
        Self::Data(e)
    }
}

type ElementSource<E> = Pin<Box<dyn Stream<Item = (String, E)> + Send>>;

/// Resolves once the table's backoff interval elapses. Carries the waiter
/// generation so superseded timers can be recognized and ignored.
type BackoffWaiter = BoxFuture<'static, (String, u64)>;

/// Per-table lifecycle state. Created lazily when the first element for the
/// table is observed; `unprocessed: Some(..)` is the Throttled state.
struct TableState<E> {
    backoff_factor: u32,
    unprocessed: Option<VecDeque<E>>,
    waiter_generation: u64,
}

impl<E> Default for TableState<E> {
    fn default() -> Self {
        Self {
            backoff_factor: 0,
            unprocessed: None,
            waiter_generation: 0,
        }
    }
}

/// What woke the refill loop: a source element (or its end) or an expired
/// backoff waiter.
enum Wake<E> {
    Source(Option<(String, E)>),
    Waiter(Option<(String, u64)>),
}

/// The engine state shared by the get and write operations.
struct BatchState<E> {
    source: ElementSource<E>,
    source_exhausted: bool,
    batch_size: usize,
    to_send: VecDeque<(String, E)>,
    pending: VecDeque<(String, Item)>,
    tables: HashMap<String, TableState<E>>,
    throttled: FuturesUnordered<BackoffWaiter>,
    options: HashMap<String, TableOptions>,
    poisoned: bool,
}

/* =================================================
impl: shared engine state
================================================= */

impl<E> BatchState<E> {
    fn new(source: ElementSource<E>, batch_size: usize) -> Self {
        Self {
            source,
            source_exhausted: false,
            batch_size,
            to_send: VecDeque::new(),
            pending: VecDeque::new(),
            tables: HashMap::new(),
            throttled: FuturesUnordered::new(),
            options: HashMap::new(),
            poisoned: false,
        }
    }

    fn table_state(&mut self, table: &str) -> &mut TableState<E> {
        if !self.tables.contains_key(table) {
            self.tables.insert(table.to_string(), TableState::default());
        }
        self.tables.get_mut(table).unwrap()
    }

    fn is_throttled(&self, table: &str) -> bool {
        self.tables
            .get(table)
            .map_or(false, |s| s.unprocessed.is_some())
    }

    fn any_throttled(&self) -> bool {
        self.tables.values().any(|s| s.unprocessed.is_some())
    }

    /// Source exhausted, nothing buffered, nothing waiting out a backoff.
    fn terminated(&self) -> bool {
        self.source_exhausted
            && self.pending.is_empty()
            && self.to_send.is_empty()
            && !self.any_throttled()
    }

    /// Route one source element: elements for currently-throttled tables
    /// join that table's retry queue instead of the next batch.
    fn route(&mut self, table: String, element: E) {
        if self.is_throttled(&table) {
            debug!(
                "table {} is backing off; folding a fresh element into its retry queue",
                table
            );
            self.table_state(&table)
                .unprocessed
                .as_mut()
                .unwrap()
                .push_back(element);
        } else {
            self.to_send.push_back((table, element));
        }
    }

    fn accept_source(&mut self, item: Option<(String, E)>) {
        match item {
            Some((table, element)) => self.route(table, element),
            None => {
                debug!("batch element source exhausted");
                self.source_exhausted = true;
            }
        }
    }

    /// An expired waiter moves its table's retry queue back into `to_send`.
    /// Waiters superseded by a newer throttling event resolve to no effect.
    fn accept_waiter(&mut self, waiter: Option<(String, u64)>) {
        let Some((table, generation)) = waiter else {
            return;
        };
        let Some(state) = self.tables.get_mut(&table) else {
            return;
        };
        if state.waiter_generation != generation || state.unprocessed.is_none() {
            debug!("ignoring a superseded backoff waiter for table {}", table);
            return;
        }
        let unprocessed = state.unprocessed.take().unwrap();
        debug!(
            "backoff expired for table {}; requeueing {} elements",
            table,
            unprocessed.len()
        );
        for element in unprocessed {
            self.to_send.push_back((table.clone(), element));
        }
    }

    /// Fill `to_send` up to one batch. While the source is live, the next
    /// source element races any backoff waiter so retry traffic folds back
    /// in as soon as its interval expires; once the source is exhausted,
    /// remaining throttled tables are drained to guarantee forward
    /// progress.
    async fn refill(&mut self) {
        while !self.source_exhausted && self.to_send.len() < self.batch_size {
            let wake = if self.any_throttled() {
                tokio::select! {
                    item = self.source.next() => Wake::Source(item),
                    waiter = self.throttled.next() => Wake::Waiter(waiter),
                }
            } else {
                Wake::Source(self.source.next().await)
            };
            match wake {
                Wake::Source(item) => self.accept_source(item),
                Wake::Waiter(waiter) => self.accept_waiter(waiter),
            }
        }

        while self.to_send.len() < self.batch_size && self.any_throttled() {
            match self.throttled.next().await {
                Some(resolved) => self.accept_waiter(Some(resolved)),
                // a throttled table always has a live waiter in the set, so
                // this arm is unreachable; bail out rather than spin
                None => break,
            }
        }
    }

    /// Remove up to one batch worth of elements from the head of `to_send`.
    fn drain_batch(&mut self) -> Vec<(String, E)> {
        let n = self.batch_size.min(self.to_send.len());
        self.to_send.drain(..n).collect()
    }

    /// The throttling protocol: bump the backoff factor, merge any queue
    /// the previous throttling event left behind (older elements first),
    /// and arm a fresh waiter for a delay drawn from [0, 2^factor) ms.
    fn handle_throttled(&mut self, table: String, unprocessed: Vec<E>) {
        let state = self.table_state(&table);
        state.backoff_factor += 1;

        let queue: VecDeque<E> = match state.unprocessed.take() {
            Some(previous) => {
                let mut q = previous;
                q.extend(unprocessed);
                q
            }
            None => unprocessed.into(),
        };
        state.waiter_generation += 1;
        let generation = state.waiter_generation;
        let factor = state.backoff_factor;

        let upper = 1u64 << factor.min(MAX_BACKOFF_EXPONENT);
        let delay_ms = rand::thread_rng().gen_range(0..upper);
        warn!(
            "table {} returned {} unprocessed elements; backing off up to {} ms (factor {})",
            table,
            queue.len(),
            upper,
            factor
        );

        state.unprocessed = Some(queue);
        let name = table;
        self.throttled.push(Box::pin(async move {
            sleep(Duration::from_millis(delay_ms)).await;
            (name, generation)
        }));
    }

    /// After a batch response reports throttled tables, relocate queued
    /// traffic for those tables out of `to_send` so the next batch does not
    /// send known-throttled requests. Scanning tail to head and prepending
    /// preserves the elements' relative order.
    fn move_pending_to_throttled(&mut self, throttled_tables: &[String]) {
        if throttled_tables.is_empty() {
            return;
        }
        let mut idx = self.to_send.len();
        while idx > 0 {
            idx -= 1;
            if throttled_tables.contains(&self.to_send[idx].0) {
                let (table, element) = self.to_send.remove(idx).unwrap();
                self.tables
                    .get_mut(&table)
                    .expect("throttled tables have state entries")
                    .unprocessed
                    .as_mut()
                    .expect("throttled tables have a retry queue")
                    .push_front(element);
            }
        }
    }

    /// One successful batch lowers the table's backoff factor a single
    /// step, floored at zero.
    fn decrement_backoff(&mut self, table: &str) {
        if let Some(state) = self.tables.get_mut(table) {
            state.backoff_factor = state.backoff_factor.saturating_sub(1);
        }
    }

    fn close(&mut self) {
        self.poisoned = true;
        self.pending.clear();
        self.to_send.clear();
        self.tables.clear();
        self.throttled = FuturesUnordered::new();
    }
}

/* =================================================
Public functions
================================================= */

/// Receives a string with the complete "RequestItems" JSON structure and
/// converts it into the corresponding write-request map, ready to feed a
/// `BatchWriteOperation`. The expected shape:
///
/// ```text
/// { "Thread": [
///   { "PutRequest": {
///     "Item": {
///       "ForumName": { "S": "Amazon DynamoDB" },
///       "Subject": { "S": "DynamoDB Thread 1" } } } },
///   { "DeleteRequest": {
///     "Key": {
///       "ForumName": { "S": "Amazon DynamoDB" } } } } ] }
/// ```
pub fn build_batch_request_items_from_json(
    raw_json_content: &str,
) -> Result<HashMap<String, Vec<WriteRequest>>, BatchInputError> {
    let mut results = HashMap::<String, Vec<WriteRequest>>::new();
    debug!(
        "Trying to convert given string into batch request items: {}",
        raw_json_content
    );

    let parsed: HashMap<String, serde_json::Value> = serde_json::from_str(raw_json_content)?;

    // for each table name as a key, multiple operations are included.
    for (table, operations) in parsed {
        let ops = operations.as_array().ok_or_else(|| {
            BatchInputError::InvalidInput(format!(
                "operations for table '{}' should be an array of PutRequest/DeleteRequest entries",
                table
            ))
        })?;

        let mut write_requests = Vec::<WriteRequest>::with_capacity(ops.len());
        for op in ops {
            if let Some(wrapped_item) = op.get("PutRequest") {
                let raw_item = wrapped_item.get("Item").ok_or_else(|| {
                    BatchInputError::InvalidInput(String::from(
                        "no field named 'Item' under PutRequest",
                    ))
                })?;
                write_requests.push(WriteRequest::put(ddbjson_to_item(raw_item)?));
            } else if let Some(wrapped_key) = op.get("DeleteRequest") {
                let raw_key = wrapped_key.get("Key").ok_or_else(|| {
                    BatchInputError::InvalidInput(String::from(
                        "no field named 'Key' under DeleteRequest",
                    ))
                })?;
                write_requests.push(WriteRequest::delete(ddbjson_to_item(raw_key)?));
            } else {
                return Err(BatchInputError::InvalidInput(format!(
                    "unknown field (neither PutRequest nor DeleteRequest) found: {}",
                    op
                )));
            }
        }
        results.insert(table, write_requests);
    }

    Ok(results)
}

/* =================================================
struct: the two concrete operations
================================================= */

/// Streams BatchGetItem results for an arbitrary sequence of (table, key)
/// tuples. Yields `(table, item)` for every item the service returns, in no
/// particular order relative to the input.
pub struct BatchGetOperation<T: DynamoDbTransport> {
    transport: Arc<T>,
    state: BatchState<Key>,
}

/// Streams BatchWriteItem acknowledgements for an arbitrary sequence of
/// (table, write-request) tuples.
///
/// Only acknowledged puts are yielded, as `(table, item)`; acknowledged
/// deletes complete silently. A request reported under UnprocessedItems is
/// never acknowledged in that response; it is queued for retry and yields
/// (if a put) once a later batch succeeds.
pub struct BatchWriteOperation<T: DynamoDbTransport> {
    transport: Arc<T>,
    state: BatchState<WriteRequest>,
}

/* =================================================
impl: BatchGetOperation
================================================= */

impl<T: DynamoDbTransport + 'static> BatchGetOperation<T> {
    pub fn new(
        transport: Arc<T>,
        source: impl Stream<Item = (String, Key)> + Send + 'static,
    ) -> Self {
        Self {
            transport,
            state: BatchState::new(Box::pin(source), MAX_READS_PER_BATCH),
        }
    }

    /// Builds the operation from an already-materialized sequence.
    pub fn from_iter(transport: Arc<T>, elements: impl IntoIterator<Item = (String, Key)>) -> Self {
        let buffered: Vec<(String, Key)> = elements.into_iter().collect();
        Self::new(transport, stream::iter(buffered))
    }

    /// Sets the read options used for every request against one table.
    pub fn table_options(mut self, table: impl Into<String>, options: TableOptions) -> Self {
        self.state.options.insert(table.into(), options);
        self
    }

    /// Pulls the next processed tuple. Returns None once every input key
    /// has been fetched and yielded.
    pub async fn next(&mut self) -> Option<Result<(String, Item), BatchError>> {
        loop {
            if self.state.poisoned {
                return Some(Err(BatchError::Interrupted));
            }
            if let Some(tuple) = self.state.pending.pop_front() {
                return Some(Ok(tuple));
            }
            if self.state.terminated() {
                return None;
            }
            self.state.refill().await;
            if !self.state.to_send.is_empty() {
                if let Err(e) = self.do_batch_request().await {
                    self.state.close();
                    return Some(Err(BatchError::Transport(e)));
                }
            }
        }
    }

    /// Irrevocably stops iteration and releases buffered state.
    pub fn close(&mut self) {
        self.state.close();
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<(String, Item), BatchError>> {
        stream::unfold(self, |mut operation| async move {
            operation.next().await.map(|item| (item, operation))
        })
    }

    async fn do_batch_request(&mut self) -> Result<(), TransportError> {
        let drained = self.state.drain_batch();
        debug!("dispatching BatchGetItem with {} keys", drained.len());

        let mut request_items: HashMap<String, KeysAndAttributes> = HashMap::new();
        for (table, keys) in drained.into_iter().into_group_map() {
            let opts = self.state.options.get(&table).cloned().unwrap_or_default();
            request_items.insert(
                table,
                KeysAndAttributes {
                    keys,
                    consistent_read: opts.consistent_read,
                    projection_expression: opts.projection_expression,
                    expression_attribute_names: opts.expression_attribute_names,
                },
            );
        }

        let output = self
            .transport
            .batch_get_item(BatchGetInput { request_items })
            .await?;

        let throttled_tables: Vec<String> = output
            .unprocessed_keys
            .iter()
            .filter(|(_, ka)| !ka.keys.is_empty())
            .map(|(table, _)| table.clone())
            .collect();
        for (table, ka) in output.unprocessed_keys {
            if !ka.keys.is_empty() {
                self.state.handle_throttled(table, ka.keys);
            }
        }
        self.state.move_pending_to_throttled(&throttled_tables);

        for (table, items) in output.responses {
            if items.is_empty() {
                continue;
            }
            if !throttled_tables.contains(&table) {
                self.state.decrement_backoff(&table);
            }
            for item in items {
                self.state.pending.push_back((table.clone(), item));
            }
        }
        Ok(())
    }
}

/* =================================================
impl: BatchWriteOperation
================================================= */

impl<T: DynamoDbTransport + 'static> BatchWriteOperation<T> {
    pub fn new(
        transport: Arc<T>,
        source: impl Stream<Item = (String, WriteRequest)> + Send + 'static,
    ) -> Self {
        Self {
            transport,
            state: BatchState::new(Box::pin(source), MAX_WRITES_PER_BATCH),
        }
    }

    pub fn from_iter(
        transport: Arc<T>,
        elements: impl IntoIterator<Item = (String, WriteRequest)>,
    ) -> Self {
        let buffered: Vec<(String, WriteRequest)> = elements.into_iter().collect();
        Self::new(transport, stream::iter(buffered))
    }

    /// Pulls the next acknowledged put as `(table, item)`. Returns None
    /// once every input request has been processed (deletes included, even
    /// though they yield nothing).
    pub async fn next(&mut self) -> Option<Result<(String, Item), BatchError>> {
        loop {
            if self.state.poisoned {
                return Some(Err(BatchError::Interrupted));
            }
            if let Some(tuple) = self.state.pending.pop_front() {
                return Some(Ok(tuple));
            }
            if self.state.terminated() {
                return None;
            }
            self.state.refill().await;
            if !self.state.to_send.is_empty() {
                if let Err(e) = self.do_batch_request().await {
                    self.state.close();
                    return Some(Err(BatchError::Transport(e)));
                }
            }
        }
    }

    /// Irrevocably stops iteration and releases buffered state.
    pub fn close(&mut self) {
        self.state.close();
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<(String, Item), BatchError>> {
        stream::unfold(self, |mut operation| async move {
            operation.next().await.map(|item| (item, operation))
        })
    }

    async fn do_batch_request(&mut self) -> Result<(), TransportError> {
        let drained = self.state.drain_batch();
        debug!(
            "dispatching BatchWriteItem with {} write requests",
            drained.len()
        );
        let batch_tables: Vec<String> = drained.iter().map(|(t, _)| t.clone()).unique().collect();

        let request_items: HashMap<String, Vec<WriteRequest>> =
            drained.clone().into_iter().into_group_map();
        let output = self
            .transport
            .batch_write_item(BatchWriteInput { request_items })
            .await?;

        let mut unprocessed = output.unprocessed_items;
        unprocessed.retain(|_, requests| !requests.is_empty());
        let throttled_tables: Vec<String> = unprocessed.keys().cloned().collect();

        // Acknowledge exactly the in-flight requests that did NOT come back
        // as unprocessed. Matching is by multiset subtraction so duplicate
        // requests within one batch are accounted one for one.
        let mut retried = unprocessed.clone();
        for (table, request) in drained {
            let was_retried = match retried.get_mut(&table) {
                Some(list) => match list.iter().position(|r| r == &request) {
                    Some(idx) => {
                        list.remove(idx);
                        true
                    }
                    None => false,
                },
                None => false,
            };
            if was_retried {
                continue;
            }
            match request {
                WriteRequest::Put { item } => {
                    self.state.pending.push_back((table, item));
                }
                WriteRequest::Delete { .. } => {
                    debug!("delete acknowledged for table {}", table);
                }
            }
        }

        for (table, requests) in unprocessed {
            self.state.handle_throttled(table, requests);
        }
        self.state.move_pending_to_throttled(&throttled_tables);

        for table in batch_tables {
            if !throttled_tables.contains(&table) {
                self.state.decrement_backoff(&table);
            }
        }
        Ok(())
    }
}

/* =================================================
Unit tests
================================================= */
