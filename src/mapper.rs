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

// The record-centric facade: schema-driven marshalling composed with the
// single-item operations, the batch engine, and the paginator family. Each
// verb is a thin layer; the systems work lives in batch.rs / paginator.rs.

use crate::batch::{BatchError, BatchGetOperation, BatchWriteOperation};
use crate::data::{AttributeValue, Item, Key};
use crate::expression::{
    ArithmeticExpression, ArithmeticOperator, AttributePath, ConditionExpression,
    ExpressionAttributes, Operand, ProjectionExpression, UpdateExpression,
};
use crate::marshall::{
    marshall_item, marshall_node, unmarshall_item, MarshallError, MarshallOptions,
};
use crate::number::DynamoNumber;
use crate::paginator::{
    ParallelScanIterator, ParallelScanPaginator, ParallelScanState, PaginatorError,
    QueryIterator, QueryPaginator, ScanIterator, ScanPaginator,
};
use crate::schema::{Schema, SchemaError};
use crate::transport::{
    DeleteItemInput, DynamoDbTransport, GetItemInput, PutItemInput, QueryInput, ScanInput,
    TransportError, UpdateItemInput, WriteRequest,
};
use crate::value::Value;
use log::debug;
use std::collections::HashMap;
use std::error;
use std::fmt;
use std::sync::Arc;

/* =================================================
struct / enum / const
================================================= */

/// A schema bound to the table it describes.
#[derive(Debug, Clone)]
pub struct TableDefinition {
    pub table_name: String,
    pub schema: Schema,
}

impl TableDefinition {
    pub fn new(table_name: impl Into<String>, schema: Schema) -> Self {
        Self {
            table_name: table_name.into(),
            schema,
        }
    }
}

/// What `update` does with schema fields absent from the input record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OnMissing {
    /// Absent fields are removed from the stored item.
    Remove,
    /// Absent fields are left untouched.
    Skip,
}

/// Options for `query`.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub index_name: Option<String>,
    pub filter: Option<ConditionExpression>,
    pub projection: Option<ProjectionExpression>,
    pub consistent_read: Option<bool>,
    pub scan_index_forward: Option<bool>,
    /// Page size (the wire `Limit` of each request).
    pub page_size: Option<i64>,
    /// Soft cap on the total items returned.
    pub limit: Option<i64>,
    pub exclusive_start_key: Option<Key>,
}

/// Options for `scan` and `parallel_scan`.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub index_name: Option<String>,
    pub filter: Option<ConditionExpression>,
    pub projection: Option<ProjectionExpression>,
    pub consistent_read: Option<bool>,
    pub page_size: Option<i64>,
    /// Soft cap on total items; ignored by `parallel_scan`.
    pub limit: Option<i64>,
    pub exclusive_start_key: Option<Key>,
}

#[derive(Debug)]
pub enum MapperError {
    /// `get` found no item under the requested key.
    ItemNotFound { table_name: String },
    /// A version attribute holding something other than an integer.
    InvalidVersionValue(String),
    Schema(SchemaError),
    Marshall(MarshallError),
    Transport(TransportError),
    Batch(BatchError),
    Paginator(PaginatorError),
}

impl fmt::Display for MapperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapperError::ItemNotFound { table_name } => {
                write!(
                    f,
                    "no item with the requested key was found in the table '{}'",
                    table_name
                )
            }
            MapperError::InvalidVersionValue(ref v) => {
                write!(f, "version attributes must hold integers, found '{}'", v)
            }
            MapperError::Schema(ref e) => e.fmt(f),
            MapperError::Marshall(ref e) => e.fmt(f),
            MapperError::Transport(ref e) => e.fmt(f),
            MapperError::Batch(ref e) => e.fmt(f),
            MapperError::Paginator(ref e) => e.fmt(f),
        }
    }
}

impl error::Error for MapperError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            MapperError::Schema(ref e) => Some(e),
            MapperError::Marshall(ref e) => Some(e),
            MapperError::Transport(ref e) => Some(e),
            MapperError::Batch(ref e) => Some(e),
            MapperError::Paginator(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<SchemaError> for MapperError {
    fn from(e: SchemaError) -> Self {
        Self::Schema(e)
    }
}

impl From<MarshallError> for MapperError {
    fn from(e: MarshallError) -> Self {
        Self::Marshall(e)
    }
}

impl From<TransportError> for MapperError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<BatchError> for MapperError {
    fn from(e: BatchError) -> Self {
        Self::Batch(e)
    }
}

impl From<PaginatorError> for MapperError {
    fn from(e: PaginatorError) -> Self {
        Self::Paginator(e)
    }
}

/// A record as the application sees it.
pub type Record = HashMap<String, Value>;

pub struct DataMapper<T: DynamoDbTransport> {
    transport: Arc<T>,
    options: MarshallOptions,
}

/* =================================================
impl
================================================= */

impl<T: DynamoDbTransport + 'static> DataMapper<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            options: MarshallOptions::default(),
        }
    }

    pub fn with_options(transport: Arc<T>, options: MarshallOptions) -> Self {
        Self { transport, options }
    }

    /// Marshall a record under the table's schema.
    pub fn marshall_record(&self, table: &TableDefinition, record: &Record) -> Result<Item, MapperError> {
        Ok(marshall_item(&table.schema, record, &self.options)?)
    }

    /// Unmarshall a wire item back into a record.
    pub fn unmarshall_record(
        &self,
        table: &TableDefinition,
        item: &Item,
    ) -> Result<Record, MapperError> {
        Ok(unmarshall_item(&table.schema, item, &self.options)?)
    }

    /// Fetch a single record by key. A missing item is an error, so callers
    /// can distinguish "absent" from "empty" without inspecting options.
    pub async fn get(&self, table: &TableDefinition, record: &Record) -> Result<Record, MapperError> {
        let key = self.marshalled_key(table, record)?;
        debug!(
            "GetItem on table '{}' with key(s): {:?}",
            table.table_name, key
        );
        let output = self
            .transport
            .get_item(GetItemInput {
                table_name: table.table_name.clone(),
                key,
                ..Default::default()
            })
            .await?;
        match output.item {
            Some(item) => self.unmarshall_record(table, &item),
            None => Err(MapperError::ItemNotFound {
                table_name: table.table_name.clone(),
            }),
        }
    }

    /// Store a record, replacing any existing item with the same key. When
    /// the schema declares a version attribute, the put carries the
    /// matching optimistic-concurrency condition and the stored (and
    /// returned) record's version is incremented server-agnostically.
    pub async fn put(&self, table: &TableDefinition, record: &Record) -> Result<Record, MapperError> {
        let mut item = self.marshall_record(table, record)?;
        let mut stored = record.clone();

        let mut condition_expression = None;
        let mut names = None;
        let mut values = None;
        if let Some((field, wire_name)) = table.schema.version_attribute() {
            let mut attributes = ExpressionAttributes::new();
            let condition = match record.get(field) {
                None => {
                    // first put of this item: the attribute must not exist yet
                    item.insert(wire_name.to_string(), AttributeValue::N(String::from("0")));
                    stored.insert(field.to_string(), Value::Number(DynamoNumber::from(0_i64)));
                    ConditionExpression::AttributeNotExists(AttributePath::attribute(wire_name))
                }
                Some(value) => {
                    let current = version_as_integer(value)?;
                    item.insert(
                        wire_name.to_string(),
                        AttributeValue::N((current + 1).to_string()),
                    );
                    stored.insert(
                        field.to_string(),
                        Value::Number(DynamoNumber::from(current + 1)),
                    );
                    ConditionExpression::eq_value(
                        AttributePath::attribute(wire_name),
                        AttributeValue::N(current.to_string()),
                    )
                }
            };
            condition_expression = Some(condition.serialize(&mut attributes));
            let (n, v) = attributes.into_parts();
            names = n;
            values = v;
        }

        debug!("PutItem on table '{}'", table.table_name);
        self.transport
            .put_item(PutItemInput {
                table_name: table.table_name.clone(),
                item,
                condition_expression,
                expression_attribute_names: names,
                expression_attribute_values: values,
            })
            .await?;
        Ok(stored)
    }

    /// Delete a record by key. When the schema declares a version attribute
    /// and the record carries it, the delete is conditional on the stored
    /// version matching.
    pub async fn delete(&self, table: &TableDefinition, record: &Record) -> Result<(), MapperError> {
        let key = self.marshalled_key(table, record)?;

        let mut condition_expression = None;
        let mut names = None;
        let mut values = None;
        if let Some((field, wire_name)) = table.schema.version_attribute() {
            if let Some(value) = record.get(field) {
                let current = version_as_integer(value)?;
                let mut attributes = ExpressionAttributes::new();
                let condition = ConditionExpression::eq_value(
                    AttributePath::attribute(wire_name),
                    AttributeValue::N(current.to_string()),
                );
                condition_expression = Some(condition.serialize(&mut attributes));
                let (n, v) = attributes.into_parts();
                names = n;
                values = v;
            }
        }

        debug!(
            "DeleteItem on table '{}' with key(s): {:?}",
            table.table_name, key
        );
        self.transport
            .delete_item(DeleteItemInput {
                table_name: table.table_name.clone(),
                key,
                condition_expression,
                expression_attribute_names: names,
                expression_attribute_values: values,
            })
            .await?;
        Ok(())
    }

    /// Update the non-key fields of a record in place. Fields absent from
    /// the record are removed or skipped per `on_missing`; a declared
    /// version attribute is incremented atomically with the matching
    /// condition.
    pub async fn update(
        &self,
        table: &TableDefinition,
        record: &Record,
        on_missing: OnMissing,
    ) -> Result<Record, MapperError> {
        let key = self.marshalled_key(table, record)?;
        let (update, condition, expected) = self.build_update(table, record, on_missing)?;

        let mut attributes = ExpressionAttributes::new();
        let update_expression = if update.is_empty() {
            None
        } else {
            Some(update.serialize(&mut attributes))
        };
        let condition_expression = condition.map(|c| c.serialize(&mut attributes));
        let (names, values) = attributes.into_parts();

        debug!(
            "UpdateItem on table '{}' with key(s): {:?}",
            table.table_name, key
        );
        let output = self
            .transport
            .update_item(UpdateItemInput {
                table_name: table.table_name.clone(),
                key,
                update_expression,
                condition_expression,
                expression_attribute_names: names,
                expression_attribute_values: values,
            })
            .await?;

        match output.attributes {
            Some(item) => self.unmarshall_record(table, &item),
            None => Ok(expected),
        }
    }

    /// A lazy query over the table (or one of its indexes). Iterate with
    /// `next_item()`, or call `.pages()` for the raw page sequence.
    pub fn query(
        &self,
        table: &TableDefinition,
        key_condition: ConditionExpression,
        options: QueryOptions,
    ) -> QueryIterator<T> {
        let mut attributes = ExpressionAttributes::new();
        let key_condition_expression = Some(key_condition.serialize(&mut attributes));
        let filter_expression = options.filter.map(|f| f.serialize(&mut attributes));
        let projection_expression = options.projection.map(|p| p.serialize(&mut attributes));
        let (names, values) = attributes.into_parts();

        let input = QueryInput {
            table_name: table.table_name.clone(),
            index_name: options.index_name,
            key_condition_expression,
            filter_expression,
            projection_expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
            consistent_read: options.consistent_read,
            scan_index_forward: options.scan_index_forward,
            exclusive_start_key: options.exclusive_start_key,
            limit: options.page_size,
        };
        QueryIterator::new(QueryPaginator::new(
            Arc::clone(&self.transport),
            input,
            options.limit,
        ))
    }

    /// A lazy sequential scan.
    pub fn scan(&self, table: &TableDefinition, options: ScanOptions) -> ScanIterator<T> {
        let (input, limit) = self.scan_input(table, options);
        ScanIterator::new(ScanPaginator::new(
            Arc::clone(&self.transport),
            input,
            limit,
        ))
    }

    /// A lazy parallel scan split into `total_segments` segments.
    pub fn parallel_scan(
        &self,
        table: &TableDefinition,
        total_segments: usize,
        options: ScanOptions,
    ) -> Result<ParallelScanIterator<T>, MapperError> {
        let (input, _) = self.scan_input(table, options);
        let paginator =
            ParallelScanPaginator::new(Arc::clone(&self.transport), input, total_segments)?;
        Ok(ParallelScanIterator::new(paginator))
    }

    /// Resume a parallel scan from a captured `scan_state()` snapshot.
    pub fn resume_parallel_scan(
        &self,
        table: &TableDefinition,
        total_segments: usize,
        options: ScanOptions,
        state: ParallelScanState,
    ) -> Result<ParallelScanIterator<T>, MapperError> {
        let (input, _) = self.scan_input(table, options);
        let paginator = ParallelScanPaginator::resume(
            Arc::clone(&self.transport),
            input,
            total_segments,
            state,
        )?;
        Ok(ParallelScanIterator::new(paginator))
    }

    /// Batch-fetch records by key. Yields `(table, item)` tuples; feed the
    /// items through `unmarshall_record` as they arrive.
    pub fn batch_get(
        &self,
        table: &TableDefinition,
        records: impl IntoIterator<Item = Record>,
    ) -> Result<BatchGetOperation<T>, MapperError> {
        let mut elements: Vec<(String, Key)> = vec![];
        for record in records {
            let key = self.marshalled_key(table, &record)?;
            elements.push((table.table_name.clone(), key));
        }
        Ok(BatchGetOperation::from_iter(
            Arc::clone(&self.transport),
            elements,
        ))
    }

    /// Batch-store records. The yielded tuples are the acknowledged puts.
    pub fn batch_put(
        &self,
        table: &TableDefinition,
        records: impl IntoIterator<Item = Record>,
    ) -> Result<BatchWriteOperation<T>, MapperError> {
        let mut elements: Vec<(String, WriteRequest)> = vec![];
        for record in records {
            let item = self.marshall_record(table, &record)?;
            elements.push((table.table_name.clone(), WriteRequest::put(item)));
        }
        Ok(BatchWriteOperation::from_iter(
            Arc::clone(&self.transport),
            elements,
        ))
    }

    /// Batch-delete records by key. Acknowledged deletes complete silently,
    /// so drive the iterator to completion and expect no yields.
    pub fn batch_delete(
        &self,
        table: &TableDefinition,
        records: impl IntoIterator<Item = Record>,
    ) -> Result<BatchWriteOperation<T>, MapperError> {
        let mut elements: Vec<(String, WriteRequest)> = vec![];
        for record in records {
            let key = self.marshalled_key(table, &record)?;
            elements.push((table.table_name.clone(), WriteRequest::delete(key)));
        }
        Ok(BatchWriteOperation::from_iter(
            Arc::clone(&self.transport),
            elements,
        ))
    }

    /* ---------- private helpers ---------- */

    /// Marshall just the key fields of a record.
    fn marshalled_key(&self, table: &TableDefinition, record: &Record) -> Result<Key, MapperError> {
        let key_schema = table.schema.required_key_schema()?;
        let mut key = Key::new();
        for attr in std::iter::once(&key_schema.partition).chain(key_schema.sort.iter()) {
            let node = table
                .schema
                .get(&attr.field)
                .expect("key schema fields come from the schema");
            let value = match record.get(&attr.field) {
                Some(v) => v.clone(),
                None => match &node.options().default_provider {
                    Some(provider) => provider.provide(),
                    None => {
                        return Err(MapperError::Schema(SchemaError::MissingKeyAttribute(
                            attr.name.clone(),
                        )))
                    }
                },
            };
            match marshall_node(node, &value, &self.options)? {
                Some(attrval) => {
                    key.insert(attr.name.clone(), attrval);
                }
                None => {
                    return Err(MapperError::Schema(SchemaError::MissingKeyAttribute(
                        attr.name.clone(),
                    )))
                }
            }
        }
        Ok(key)
    }

    fn scan_input(&self, table: &TableDefinition, options: ScanOptions) -> (ScanInput, Option<i64>) {
        let mut attributes = ExpressionAttributes::new();
        let filter_expression = options.filter.map(|f| f.serialize(&mut attributes));
        let projection_expression = options.projection.map(|p| p.serialize(&mut attributes));
        let (names, values) = attributes.into_parts();

        let input = ScanInput {
            table_name: table.table_name.clone(),
            index_name: options.index_name,
            filter_expression,
            projection_expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
            consistent_read: options.consistent_read,
            exclusive_start_key: options.exclusive_start_key,
            limit: options.page_size,
            segment: None,
            total_segments: None,
        };
        (input, options.limit)
    }

    /// Assemble the update and condition expressions for `update`, plus the
    /// record the caller should expect after the write succeeds.
    fn build_update(
        &self,
        table: &TableDefinition,
        record: &Record,
        on_missing: OnMissing,
    ) -> Result<(UpdateExpression, Option<ConditionExpression>, Record), MapperError> {
        let key_schema = table.schema.required_key_schema()?;
        let version = table.schema.version_attribute();
        let mut update = UpdateExpression::new();
        let mut expected = record.clone();

        for (field, node) in table.schema.members() {
            let wire_name = table.schema.attribute_name_of(field, node);
            let is_key = key_schema.partition.field == *field
                || key_schema
                    .sort
                    .as_ref()
                    .map_or(false, |sk| sk.field == *field);
            let is_version = version.map_or(false, |(vf, _)| vf == field);
            if is_key || is_version {
                continue;
            }

            match record.get(field) {
                Some(value) => match marshall_node(node, value, &self.options)? {
                    Some(attrval) => {
                        update = update.set(
                            AttributePath::attribute(wire_name),
                            Operand::Value(attrval),
                        );
                    }
                    // an omitted value behaves like an absent field
                    None => {
                        if on_missing == OnMissing::Remove {
                            update = update.remove(AttributePath::attribute(wire_name));
                            expected.remove(field);
                        }
                    }
                },
                None => {
                    if on_missing == OnMissing::Remove {
                        update = update.remove(AttributePath::attribute(wire_name));
                    }
                }
            }
        }

        let mut condition = None;
        if let Some((field, wire_name)) = version {
            let path = AttributePath::attribute(wire_name);
            match record.get(field) {
                Some(value) => {
                    let current = version_as_integer(value)?;
                    condition = Some(ConditionExpression::eq_value(
                        path.clone(),
                        AttributeValue::N(current.to_string()),
                    ));
                    update = update.set(
                        path,
                        Operand::Arithmetic(Box::new(ArithmeticExpression {
                            lhs: Operand::Path(AttributePath::attribute(wire_name)),
                            operator: ArithmeticOperator::Add,
                            rhs: Operand::Value(AttributeValue::N(String::from("1"))),
                        })),
                    );
                    expected.insert(
                        field.to_string(),
                        Value::Number(DynamoNumber::from(current + 1)),
                    );
                }
                None => {
                    condition = Some(ConditionExpression::AttributeNotExists(path.clone()));
                    update = update.set(path, Operand::Value(AttributeValue::N(String::from("0"))));
                    expected.insert(field.to_string(), Value::Number(DynamoNumber::from(0_i64)));
                }
            }
        }

        Ok((update, condition, expected))
    }
}

/* =================================================
Private functions
================================================= */

fn version_as_integer(value: &Value) -> Result<i64, MapperError> {
    match value {
        Value::Number(n) => n
            .to_i64()
            .ok_or_else(|| MapperError::InvalidVersionValue(n.as_str().to_string())),
        other => Err(MapperError::InvalidVersionValue(format!(
            "{}",
            other.value_type()
        ))),
    }
}

/* =================================================
Unit tests
================================================= */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{self, number, string, Schema};
    use crate::transport::{
        BatchGetInput, BatchGetOutput, BatchWriteInput, BatchWriteOutput, DeleteItemOutput,
        GetItemOutput, PutItemOutput, ResultPage, UpdateItemOutput,
    };
    use async_trait::async_trait;

    /// A transport that refuses every call; enough for testing the pure
    /// request-building helpers.
    struct NullTransport;

    #[async_trait]
    impl DynamoDbTransport for NullTransport {
        async fn batch_get_item(
            &self,
            _: BatchGetInput,
        ) -> Result<BatchGetOutput, TransportError> {
            Err(TransportError::new("unreachable"))
        }
        async fn batch_write_item(
            &self,
            _: BatchWriteInput,
        ) -> Result<BatchWriteOutput, TransportError> {
            Err(TransportError::new("unreachable"))
        }
        async fn query(&self, _: QueryInput) -> Result<ResultPage, TransportError> {
            Err(TransportError::new("unreachable"))
        }
        async fn scan(&self, _: ScanInput) -> Result<ResultPage, TransportError> {
            Err(TransportError::new("unreachable"))
        }
        async fn get_item(&self, _: GetItemInput) -> Result<GetItemOutput, TransportError> {
            Err(TransportError::new("unreachable"))
        }
        async fn put_item(&self, _: PutItemInput) -> Result<PutItemOutput, TransportError> {
            Err(TransportError::new("unreachable"))
        }
        async fn delete_item(&self, _: DeleteItemInput) -> Result<DeleteItemOutput, TransportError> {
            Err(TransportError::new("unreachable"))
        }
        async fn update_item(&self, _: UpdateItemInput) -> Result<UpdateItemOutput, TransportError> {
            Err(TransportError::new("unreachable"))
        }
    }

    fn table() -> TableDefinition {
        TableDefinition::new(
            "widgets",
            Schema::builder()
                .field("id", string().partition_key().unwrap())
                .field("name", string())
                .field("version", number().version_attribute().unwrap())
                .build()
                .unwrap(),
        )
    }

    fn mapper() -> DataMapper<NullTransport> {
        DataMapper::new(Arc::new(NullTransport))
    }

    fn record(entries: Vec<(&str, Value)>) -> Record {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_marshalled_key_picks_key_fields_only() {
        let key = mapper()
            .marshalled_key(
                &table(),
                &record(vec![
                    ("id", Value::from("w-1")),
                    ("name", Value::from("sprocket")),
                ]),
            )
            .unwrap();
        assert_eq!(key.len(), 1);
        assert_eq!(key["id"], AttributeValue::S(String::from("w-1")));
    }

    #[test]
    fn test_marshalled_key_requires_key_fields() {
        let result = mapper().marshalled_key(&table(), &record(vec![("name", Value::from("x"))]));
        assert!(matches!(
            result,
            Err(MapperError::Schema(SchemaError::MissingKeyAttribute(ref n))) if n == "id"
        ));
    }

    #[test]
    fn test_build_update_with_version() {
        let (update, condition, expected) = mapper()
            .build_update(
                &table(),
                &record(vec![
                    ("id", Value::from("w-1")),
                    ("name", Value::from("sprocket")),
                    ("version", Value::from(3_i64)),
                ]),
                OnMissing::Remove,
            )
            .unwrap();

        let mut attributes = ExpressionAttributes::new();
        let update_str = update.serialize(&mut attributes);
        let condition_str = condition.unwrap().serialize(&mut attributes);
        // name is SET, version incremented in place
        assert_eq!(update_str, "SET #attr0 = :val1, #attr2 = #attr2 + :val3");
        assert_eq!(condition_str, "#attr2 = :val4");
        assert_eq!(attributes.names()["#attr0"], "name");
        assert_eq!(attributes.names()["#attr2"], "version");
        assert_eq!(
            attributes.values()[":val4"],
            AttributeValue::N(String::from("3"))
        );
        assert_eq!(
            expected["version"],
            Value::Number(DynamoNumber::from(4_i64))
        );
    }

    #[test]
    fn test_build_update_on_missing_remove_vs_skip() {
        let base = record(vec![("id", Value::from("w-1"))]);

        let (update, _, _) = mapper()
            .build_update(&table(), &base, OnMissing::Remove)
            .unwrap();
        let mut attributes = ExpressionAttributes::new();
        // absent "name" is removed, version initialized to zero; the SET
        // clause serializes first, so it claims the lower placeholders
        assert_eq!(
            update.serialize(&mut attributes),
            "SET #attr0 = :val1 REMOVE #attr2"
        );
        assert_eq!(attributes.names()["#attr0"], "version");
        assert_eq!(attributes.names()["#attr2"], "name");

        let (update, _, _) = mapper()
            .build_update(&table(), &base, OnMissing::Skip)
            .unwrap();
        let mut attributes = ExpressionAttributes::new();
        assert_eq!(update.serialize(&mut attributes), "SET #attr0 = :val1");
    }

    #[test]
    fn test_version_must_be_integer() {
        let result = mapper().build_update(
            &table(),
            &record(vec![
                ("id", Value::from("w-1")),
                ("version", Value::from("three")),
            ]),
            OnMissing::Skip,
        );
        assert!(matches!(result, Err(MapperError::InvalidVersionValue(_))));
    }

    #[test]
    fn test_table_definition_with_date_sort_key() {
        let table = TableDefinition::new(
            "events",
            Schema::builder()
                .field("stream", string().partition_key().unwrap())
                .field("at", schema::date().sort_key().unwrap())
                .build()
                .unwrap(),
        );
        let key = mapper()
            .marshalled_key(
                &table,
                &record(vec![
                    ("stream", Value::from("s-1")),
                    ("at", Value::from(1234567890_i64)),
                ]),
            )
            .unwrap();
        assert_eq!(key["at"], AttributeValue::N(String::from("1234567890")));
    }
}
