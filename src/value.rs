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

// The application-side value union. Marshalling consumes these explicit
// tagged values rather than sniffing runtime shapes, so the mapping between
// an application record and its wire item is total and reversible.

use crate::binary_set::BinarySet;
use crate::number::DynamoNumber;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

/* =================================================
struct / enum / const
================================================= */

/// A rich application value, one variant per marshallable shape.
///
/// `Number` carries the lossless decimal wrapper; `Double` is the native
/// float convenience that trades precision for ergonomics (it marshals to
/// the same wire "N" type). `Date` is kept distinct from `Number` so the
/// schema can round it to whole seconds on the way out.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    String(String),
    Number(DynamoNumber),
    Double(f64),
    Binary(Bytes),
    Date(DateTime<Utc>),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
    StringSet(Vec<String>),
    NumberSet(Vec<DynamoNumber>),
    BinarySet(BinarySet),
}

/// The shape tag of a `Value`, used in mismatch error messages.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum ValueType {
    Null,
    Bool,
    String,
    Number,
    Double,
    Binary,
    Date,
    List,
    Map,
    StringSet,
    NumberSet,
    BinarySet,
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Null => write!(f, "null"),
            ValueType::Bool => write!(f, "boolean"),
            ValueType::String => write!(f, "string"),
            ValueType::Number => write!(f, "number"),
            ValueType::Double => write!(f, "double"),
            ValueType::Binary => write!(f, "binary"),
            ValueType::Date => write!(f, "date"),
            ValueType::List => write!(f, "list"),
            ValueType::Map => write!(f, "map"),
            ValueType::StringSet => write!(f, "string set"),
            ValueType::NumberSet => write!(f, "number set"),
            ValueType::BinarySet => write!(f, "binary set"),
        }
    }
}

/* =================================================
impl
================================================= */

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::String(_) => ValueType::String,
            Value::Number(_) => ValueType::Number,
            Value::Double(_) => ValueType::Double,
            Value::Binary(_) => ValueType::Binary,
            Value::Date(_) => ValueType::Date,
            Value::List(_) => ValueType::List,
            Value::Map(_) => ValueType::Map,
            Value::StringSet(_) => ValueType::StringSet,
            Value::NumberSet(_) => ValueType::NumberSet,
            Value::BinarySet(_) => ValueType::BinarySet,
        }
    }

    pub fn is_type(&self, t: ValueType) -> bool {
        self.value_type() == t
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// True for the shapes the empty-value policy applies to: empty string,
    /// zero-length buffer, or empty set.
    pub fn is_empty_value(&self) -> bool {
        match self {
            Value::String(s) => s.is_empty(),
            Value::Binary(b) => b.is_empty(),
            Value::StringSet(s) => s.is_empty(),
            Value::NumberSet(s) => s.is_empty(),
            Value::BinarySet(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<DynamoNumber> for Value {
    fn from(v: DynamoNumber) -> Self {
        Value::Number(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(DynamoNumber::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(DynamoNumber::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Number(DynamoNumber::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Binary(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Date(v)
    }
}

impl From<BinarySet> for Value {
    fn from(v: BinarySet) -> Self {
        Value::BinarySet(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(v: HashMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

/* =================================================
Unit tests
================================================= */
