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

// The transport boundary. The real DynamoDB client lives outside this
// crate; everything here is the crate-owned mirror of the wire shapes the
// batch engine, the paginators, and the mapper build against, plus the
// async trait an adapter implements. The transport is shared across
// operations and must tolerate concurrent calls.

use crate::data::{AttributeValue, Item, Key};
use async_trait::async_trait;
use std::collections::HashMap;
use std::error;
use std::fmt;

/* =================================================
struct / enum / const
================================================= */

/// One element of a BatchWriteItem request: a full-item put or a key-only
/// delete.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    Put { item: Item },
    Delete { key: Key },
}

impl WriteRequest {
    pub fn put(item: Item) -> Self {
        WriteRequest::Put { item }
    }

    pub fn delete(key: Key) -> Self {
        WriteRequest::Delete { key }
    }

    pub fn is_put(&self) -> bool {
        matches!(self, WriteRequest::Put { .. })
    }
}

/// The per-table portion of a BatchGetItem request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeysAndAttributes {
    pub keys: Vec<Key>,
    pub consistent_read: Option<bool>,
    pub projection_expression: Option<String>,
    pub expression_attribute_names: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetInput {
    pub request_items: HashMap<String, KeysAndAttributes>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetOutput {
    pub responses: HashMap<String, Vec<Item>>,
    pub unprocessed_keys: HashMap<String, KeysAndAttributes>,
    pub consumed_capacity: Option<Vec<ConsumedCapacity>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchWriteInput {
    pub request_items: HashMap<String, Vec<WriteRequest>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchWriteOutput {
    pub unprocessed_items: HashMap<String, Vec<WriteRequest>>,
    pub consumed_capacity: Option<Vec<ConsumedCapacity>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryInput {
    pub table_name: String,
    pub index_name: Option<String>,
    pub key_condition_expression: Option<String>,
    pub filter_expression: Option<String>,
    pub projection_expression: Option<String>,
    pub expression_attribute_names: Option<HashMap<String, String>>,
    pub expression_attribute_values: Option<HashMap<String, AttributeValue>>,
    pub consistent_read: Option<bool>,
    pub scan_index_forward: Option<bool>,
    pub exclusive_start_key: Option<Key>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanInput {
    pub table_name: String,
    pub index_name: Option<String>,
    pub filter_expression: Option<String>,
    pub projection_expression: Option<String>,
    pub expression_attribute_names: Option<HashMap<String, String>>,
    pub expression_attribute_values: Option<HashMap<String, AttributeValue>>,
    pub consistent_read: Option<bool>,
    pub exclusive_start_key: Option<Key>,
    pub limit: Option<i64>,
    /// Parallel scan only: which segment this request reads.
    pub segment: Option<i64>,
    /// Parallel scan only: how many segments the scan is split into.
    pub total_segments: Option<i64>,
}

/// One page of a Query or Scan response. `last_evaluated_key` absent means
/// the read reached the end of the (segment of the) table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultPage {
    pub items: Vec<Item>,
    pub count: Option<i64>,
    pub scanned_count: Option<i64>,
    pub last_evaluated_key: Option<Key>,
    pub consumed_capacity: Option<ConsumedCapacity>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetItemInput {
    pub table_name: String,
    pub key: Key,
    pub consistent_read: Option<bool>,
    pub projection_expression: Option<String>,
    pub expression_attribute_names: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetItemOutput {
    pub item: Option<Item>,
    pub consumed_capacity: Option<ConsumedCapacity>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PutItemInput {
    pub table_name: String,
    pub item: Item,
    pub condition_expression: Option<String>,
    pub expression_attribute_names: Option<HashMap<String, String>>,
    pub expression_attribute_values: Option<HashMap<String, AttributeValue>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PutItemOutput {
    pub attributes: Option<Item>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteItemInput {
    pub table_name: String,
    pub key: Key,
    pub condition_expression: Option<String>,
    pub expression_attribute_names: Option<HashMap<String, String>>,
    pub expression_attribute_values: Option<HashMap<String, AttributeValue>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteItemOutput {
    pub attributes: Option<Item>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateItemInput {
    pub table_name: String,
    pub key: Key,
    pub update_expression: Option<String>,
    pub condition_expression: Option<String>,
    pub expression_attribute_names: Option<HashMap<String, String>>,
    pub expression_attribute_values: Option<HashMap<String, AttributeValue>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateItemOutput {
    pub attributes: Option<Item>,
}

/// Capacity units consumed by one table or index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capacity {
    pub capacity_units: Option<f64>,
}

/// The ConsumedCapacity block of a response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumedCapacity {
    pub table_name: Option<String>,
    pub capacity_units: Option<f64>,
    pub table: Option<Capacity>,
    pub local_secondary_indexes: Option<HashMap<String, Capacity>>,
    pub global_secondary_indexes: Option<HashMap<String, Capacity>>,
}

#[derive(Debug, PartialEq)]
pub enum CapacityError {
    /// Reports for two different tables cannot be merged into one total.
    TableMismatch(String, String),
}

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityError::TableMismatch(a, b) => {
                write!(
                    f,
                    "cannot merge consumed capacity reports for different tables: '{}' and '{}'",
                    a, b
                )
            }
        }
    }
}

impl error::Error for CapacityError {}

/// An error propagated verbatim from the underlying client. The iterator
/// that observed it becomes poisoned.
#[derive(Debug)]
pub struct TransportError {
    message: String,
    source: Option<Box<dyn error::Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl error::Error for TransportError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn error::Error + 'static))
    }
}

/* =================================================
Transport trait
================================================= */

/// The opaque client this crate drives. The first four operations are what
/// the batch engine and the paginators require; the single-item operations
/// exist for the mapper facade's record verbs.
#[async_trait]
pub trait DynamoDbTransport: Send + Sync {
    async fn batch_get_item(&self, input: BatchGetInput)
        -> Result<BatchGetOutput, TransportError>;

    async fn batch_write_item(
        &self,
        input: BatchWriteInput,
    ) -> Result<BatchWriteOutput, TransportError>;

    async fn query(&self, input: QueryInput) -> Result<ResultPage, TransportError>;

    async fn scan(&self, input: ScanInput) -> Result<ResultPage, TransportError>;

    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, TransportError>;

    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, TransportError>;

    async fn delete_item(&self, input: DeleteItemInput)
        -> Result<DeleteItemOutput, TransportError>;

    async fn update_item(&self, input: UpdateItemInput)
        -> Result<UpdateItemOutput, TransportError>;
}

/* =================================================
Public functions
================================================= */

/// Merge two optional capacity reports into a cumulative one.
///
/// Numeric capacity units are summed at the top level, at `Table`, and per
/// index name (keeping the union of index names). Merging reports that name
/// different tables is a configuration error.
pub fn merge_consumed_capacity(
    a: Option<&ConsumedCapacity>,
    b: Option<&ConsumedCapacity>,
) -> Result<Option<ConsumedCapacity>, CapacityError> {
    let (a, b) = match (a, b) {
        (None, None) => return Ok(None),
        (Some(a), None) => return Ok(Some(a.clone())),
        (None, Some(b)) => return Ok(Some(b.clone())),
        (Some(a), Some(b)) => (a, b),
    };

    if let (Some(ta), Some(tb)) = (&a.table_name, &b.table_name) {
        if ta != tb {
            return Err(CapacityError::TableMismatch(ta.clone(), tb.clone()));
        }
    }

    Ok(Some(ConsumedCapacity {
        table_name: a.table_name.clone().or_else(|| b.table_name.clone()),
        capacity_units: sum_units(a.capacity_units, b.capacity_units),
        table: merge_capacity(a.table.as_ref(), b.table.as_ref()),
        local_secondary_indexes: merge_index_capacities(
            a.local_secondary_indexes.as_ref(),
            b.local_secondary_indexes.as_ref(),
        ),
        global_secondary_indexes: merge_index_capacities(
            a.global_secondary_indexes.as_ref(),
            b.global_secondary_indexes.as_ref(),
        ),
    }))
}

/* =================================================
Private functions
================================================= */

fn sum_units(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) | (None, Some(x)) => Some(x),
        (Some(x), Some(y)) => Some(x + y),
    }
}

fn merge_capacity(a: Option<&Capacity>, b: Option<&Capacity>) -> Option<Capacity> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) | (None, Some(x)) => Some(x.clone()),
        (Some(x), Some(y)) => Some(Capacity {
            capacity_units: sum_units(x.capacity_units, y.capacity_units),
        }),
    }
}

fn merge_index_capacities(
    a: Option<&HashMap<String, Capacity>>,
    b: Option<&HashMap<String, Capacity>>,
) -> Option<HashMap<String, Capacity>> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) | (None, Some(x)) => Some(x.clone()),
        (Some(x), Some(y)) => {
            // union of index names, summing where both report
            let mut merged = x.clone();
            for (index_name, capacity) in y {
                let entry = merged.entry(index_name.clone()).or_default();
                entry.capacity_units = sum_units(entry.capacity_units, capacity.capacity_units);
            }
            Some(merged)
        }
    }
}

/* =================================================
Unit tests
================================================= */
