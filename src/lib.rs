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

//! dynamap - a client-side data-access layer for Amazon DynamoDB.
//!
//! Three composed capabilities:
//!
//! * **Schema-driven marshalling** ([`schema`], [`marshall`]): a reversible
//!   mapping between rich application values and DynamoDB's tagged
//!   attribute-value format.
//! * **Batch orchestration** ([`batch`]): streaming BatchGetItem /
//!   BatchWriteItem with size-bounded partitioning and per-table
//!   exponential backoff on unprocessed elements.
//! * **Paginated iteration** ([`paginator`]): Query, Scan, and parallel
//!   Scan as async sequences with merged metadata and snapshot-resumable
//!   state.
//!
//! The DynamoDB client itself stays outside the crate: everything is built
//! against the [`transport::DynamoDbTransport`] trait, and an adapter binds
//! it to a real SDK client (or a mock, in tests). The [`mapper`] module
//! composes the three capabilities behind record-centric verbs.

pub mod batch;
pub mod binary_set;
pub mod data;
pub mod expression;
pub mod mapper;
pub mod marshall;
pub mod number;
pub mod paginator;
pub mod schema;
pub mod transport;
pub mod value;

pub use batch::{
    build_batch_request_items_from_json, BatchError, BatchGetOperation, BatchInputError,
    BatchWriteOperation, TableOptions,
};
pub use binary_set::BinarySet;
pub use data::{AttributeValue, Item, Key};
pub use expression::{AttributePath, ConditionExpression, ExpressionAttributes};
pub use mapper::{DataMapper, MapperError, OnMissing, Record, TableDefinition};
pub use marshall::{MarshallError, MarshallOptions, OnEmpty, OnInvalid};
pub use number::DynamoNumber;
pub use paginator::{
    ParallelScanIterator, ParallelScanPaginator, ParallelScanState, PaginatorError,
    QueryIterator, QueryPaginator, ScanIterator, ScanPaginator, SegmentState,
};
pub use schema::{Schema, SchemaError, SchemaNode};
pub use transport::{DynamoDbTransport, TransportError, WriteRequest};
pub use value::Value;
