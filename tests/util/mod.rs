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

// A scripted stand-in for the DynamoDB client. Every call is recorded so
// tests can assert on partitioning and request shapes; responses come from
// small per-operation scripts (bounce lists for Unprocessed* feedback,
// page queues for Query/Scan).

#![allow(dead_code)]

use async_trait::async_trait;
use dynamap::data::{AttributeValue, Item, Key};
use dynamap::transport::{
    BatchGetInput, BatchGetOutput, BatchWriteInput, BatchWriteOutput, DeleteItemInput,
    DeleteItemOutput, DynamoDbTransport, GetItemInput, GetItemOutput, KeysAndAttributes,
    PutItemInput, PutItemOutput, QueryInput, ResultPage, ScanInput, TransportError,
    UpdateItemInput, UpdateItemOutput, WriteRequest,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Sentinel segment id for Scan requests without a Segment field.
pub const NO_SEGMENT: i64 = -1;

#[derive(Default)]
pub struct MockTransport {
    pub batch_get_calls: Mutex<Vec<BatchGetInput>>,
    pub batch_write_calls: Mutex<Vec<BatchWriteInput>>,
    pub query_calls: Mutex<Vec<QueryInput>>,
    pub scan_calls: Mutex<Vec<ScanInput>>,
    pub get_item_calls: Mutex<Vec<GetItemInput>>,
    pub put_item_calls: Mutex<Vec<PutItemInput>>,
    pub delete_item_calls: Mutex<Vec<DeleteItemInput>>,
    pub update_item_calls: Mutex<Vec<UpdateItemInput>>,

    /// pk values bounced as unprocessed exactly once each.
    bounce_once: Mutex<HashSet<String>>,
    query_pages: Mutex<VecDeque<ResultPage>>,
    scan_pages: Mutex<HashMap<i64, VecDeque<ResultPage>>>,
    get_item_result: Mutex<Option<Item>>,
    fail_next_batch_get: AtomicBool,
    fail_next_scan: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks pk values to be reported as unprocessed the first time they
    /// are seen (reads and writes alike).
    pub fn bounce_once(&self, pks: &[&str]) {
        let mut bounce = self.bounce_once.lock().unwrap();
        for pk in pks {
            bounce.insert((*pk).to_string());
        }
    }

    pub fn push_query_page(&self, page: ResultPage) {
        self.query_pages.lock().unwrap().push_back(page);
    }

    /// Scripts the next page for one scan segment (use `NO_SEGMENT` for
    /// sequential scans).
    pub fn push_scan_page(&self, segment: i64, page: ResultPage) {
        self.scan_pages
            .lock()
            .unwrap()
            .entry(segment)
            .or_default()
            .push_back(page);
    }

    pub fn set_get_item_result(&self, item: Option<Item>) {
        *self.get_item_result.lock().unwrap() = item;
    }

    pub fn fail_next_batch_get(&self) {
        self.fail_next_batch_get.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_scan(&self) {
        self.fail_next_scan.store(true, Ordering::SeqCst);
    }

    fn take_bounce(&self, pk: &str) -> bool {
        self.bounce_once.lock().unwrap().remove(pk)
    }
}

#[async_trait]
impl DynamoDbTransport for MockTransport {
    async fn batch_get_item(&self, input: BatchGetInput) -> Result<BatchGetOutput, TransportError> {
        self.batch_get_calls.lock().unwrap().push(input.clone());
        if self.fail_next_batch_get.swap(false, Ordering::SeqCst) {
            return Err(TransportError::new("injected batch_get_item failure"));
        }

        let mut responses: HashMap<String, Vec<Item>> = HashMap::new();
        let mut unprocessed_keys: HashMap<String, KeysAndAttributes> = HashMap::new();
        for (table, ka) in input.request_items {
            for key in ka.keys {
                if self.take_bounce(pk_of(&key)) {
                    unprocessed_keys
                        .entry(table.clone())
                        .or_default()
                        .keys
                        .push(key);
                } else {
                    // echo the key back as the fetched item
                    responses.entry(table.clone()).or_default().push(key);
                }
            }
        }
        Ok(BatchGetOutput {
            responses,
            unprocessed_keys,
            consumed_capacity: None,
        })
    }

    async fn batch_write_item(
        &self,
        input: BatchWriteInput,
    ) -> Result<BatchWriteOutput, TransportError> {
        self.batch_write_calls.lock().unwrap().push(input.clone());

        let mut unprocessed_items: HashMap<String, Vec<WriteRequest>> = HashMap::new();
        for (table, requests) in input.request_items {
            for request in requests {
                let pk = match &request {
                    WriteRequest::Put { item } => pk_of(item),
                    WriteRequest::Delete { key } => pk_of(key),
                };
                if self.take_bounce(pk) {
                    unprocessed_items
                        .entry(table.clone())
                        .or_default()
                        .push(request);
                }
            }
        }
        Ok(BatchWriteOutput {
            unprocessed_items,
            consumed_capacity: None,
        })
    }

    async fn query(&self, input: QueryInput) -> Result<ResultPage, TransportError> {
        self.query_calls.lock().unwrap().push(input);
        Ok(self
            .query_pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn scan(&self, input: ScanInput) -> Result<ResultPage, TransportError> {
        let segment = input.segment.unwrap_or(NO_SEGMENT);
        self.scan_calls.lock().unwrap().push(input);
        if self.fail_next_scan.swap(false, Ordering::SeqCst) {
            return Err(TransportError::new("injected scan failure"));
        }
        Ok(self
            .scan_pages
            .lock()
            .unwrap()
            .get_mut(&segment)
            .and_then(|pages| pages.pop_front())
            .unwrap_or_default())
    }

    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, TransportError> {
        self.get_item_calls.lock().unwrap().push(input);
        Ok(GetItemOutput {
            item: self.get_item_result.lock().unwrap().clone(),
            consumed_capacity: None,
        })
    }

    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, TransportError> {
        self.put_item_calls.lock().unwrap().push(input);
        Ok(PutItemOutput::default())
    }

    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput, TransportError> {
        self.delete_item_calls.lock().unwrap().push(input);
        Ok(DeleteItemOutput::default())
    }

    async fn update_item(&self, input: UpdateItemInput) -> Result<UpdateItemOutput, TransportError> {
        self.update_item_calls.lock().unwrap().push(input);
        Ok(UpdateItemOutput::default())
    }
}

/* =================================================
Shared helpers
================================================= */

/// A single-attribute key: { "pk": { "S": <id> } }.
pub fn key(pk: &str) -> Key {
    Key::from([(String::from("pk"), AttributeValue::S(pk.to_string()))])
}

/// A small item keyed the same way as `key`.
pub fn item(pk: &str) -> Item {
    Item::from([
        (String::from("pk"), AttributeValue::S(pk.to_string())),
        (String::from("flag"), AttributeValue::Bool(true)),
    ])
}

/// The "pk" attribute of an item, as a &str. Panics on malformed test data.
pub fn pk_of(item: &Item) -> &str {
    item.get("pk")
        .and_then(|v| v.as_s().ok())
        .map(String::as_str)
        .expect("test items carry a string pk")
}

/// A result page carrying the given pks, with an optional pagination token.
pub fn page(pks: &[&str], last_evaluated_key: Option<&str>) -> ResultPage {
    ResultPage {
        items: pks.iter().map(|pk| item(pk)).collect(),
        count: Some(pks.len() as i64),
        scanned_count: Some(pks.len() as i64),
        last_evaluated_key: last_evaluated_key.map(key),
        consumed_capacity: None,
    }
}
