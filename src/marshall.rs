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

// Marshalling between application `Value`s and wire `AttributeValue`s, both
// schemaless (the tag is inferred from the value variant) and directed by a
// declared `Schema`. Unmarshalling is the strict inverse.

use crate::binary_set::BinarySet;
use crate::data::{AttributeValue, Item};
use crate::number::{DynamoNumber, ParseNumberError};
use crate::schema::{Schema, SchemaNode, SetMemberType};
use crate::value::{Value, ValueType};
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use log::debug;
use std::collections::HashMap;
use std::error;
use std::fmt;

/* =================================================
struct / enum / const
================================================= */

/// How to treat empty strings, zero-length buffers, and empty sets.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OnEmpty {
    /// Emit the empty value as-is. DynamoDB itself may reject it; that is
    /// the caller's bargain under this policy.
    Leave,
    /// Drop the attribute entirely.
    Omit,
    /// Replace the attribute with an explicit NULL.
    Nullify,
}

/// How to treat values that cannot be mapped under the requested node.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OnInvalid {
    Throw,
    Omit,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MarshallOptions {
    pub on_empty: OnEmpty,
    pub on_invalid: OnInvalid,
    /// Unmarshall only: convert "N" values to native `f64` (`Value::Double`)
    /// instead of the lossless decimal wrapper. Integers beyond 2^53 lose
    /// precision under this toggle.
    pub unwrap_numbers: bool,
}

impl Default for MarshallOptions {
    fn default() -> Self {
        Self {
            on_empty: OnEmpty::Leave,
            on_invalid: OnInvalid::Throw,
            unwrap_numbers: false,
        }
    }
}

#[derive(Debug)]
pub enum MarshallError {
    /// The value's shape does not match what the schema node expects.
    TypeMismatch {
        expected: &'static str,
        found: ValueType,
    },
    /// The wire value's tag does not match what the schema node expects.
    WireTypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// A set would contain an empty member under the Leave policy.
    EmptySetMember,
    /// A tuple value whose length differs from the declared member list.
    TupleArityMismatch { expected: usize, found: usize },
    /// A Date that cannot be represented as whole seconds since epoch.
    NonCoercibleDate(String),
    /// A non-finite float has no wire representation.
    NonFiniteNumber(f64),
    /// An "N" payload that is not a valid decimal string.
    InvalidNumber(ParseNumberError),
    /// Raised by user-supplied Custom converters.
    Custom(String),
}

impl fmt::Display for MarshallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarshallError::TypeMismatch { expected, found } => {
                write!(f, "expected a {} value, found {}", expected, found)
            }
            MarshallError::WireTypeMismatch { expected, found } => {
                write!(
                    f,
                    "expected a {} attribute value, found {}",
                    expected, found
                )
            }
            MarshallError::EmptySetMember => {
                write!(
                    f,
                    "sets may not contain empty members; use the Omit or Nullify empty policy to drop them"
                )
            }
            MarshallError::TupleArityMismatch { expected, found } => {
                write!(
                    f,
                    "tuple arity mismatch: schema declares {} members, value has {}",
                    expected, found
                )
            }
            MarshallError::NonCoercibleDate(ref msg) => {
                write!(f, "cannot coerce to a date: {}", msg)
            }
            MarshallError::NonFiniteNumber(v) => {
                write!(f, "{} has no DynamoDB number representation", v)
            }
            MarshallError::InvalidNumber(ref e) => e.fmt(f),
            MarshallError::Custom(ref msg) => write!(f, "{}", msg),
        }
    }
}

impl error::Error for MarshallError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            MarshallError::InvalidNumber(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<ParseNumberError> for MarshallError {
    fn from(e: ParseNumberError) -> Self {
        Self::InvalidNumber(e)
    }
}

/* =================================================
Public functions: schemaless path
================================================= */

/// Marshall a `Value` into an `AttributeValue`, inferring the wire tag from
/// the value variant. Returns None when a policy omits the value.
pub fn value_to_attrval(
    value: &Value,
    opts: &MarshallOptions,
) -> Result<Option<AttributeValue>, MarshallError> {
    match value {
        Value::Null => Ok(Some(AttributeValue::Null(true))),
        Value::Bool(b) => Ok(Some(AttributeValue::Bool(*b))),
        Value::String(s) => {
            if s.is_empty() {
                return Ok(apply_empty_policy(opts, || {
                    AttributeValue::S(String::new())
                }));
            }
            Ok(Some(AttributeValue::S(s.to_string())))
        }
        Value::Number(n) => Ok(Some(AttributeValue::N(n.as_str().to_string()))),
        Value::Double(d) => double_to_attrval(*d, opts),
        Value::Binary(b) => {
            if b.is_empty() {
                return Ok(apply_empty_policy(opts, || AttributeValue::B(Bytes::new())));
            }
            Ok(Some(AttributeValue::B(b.clone())))
        }
        Value::Date(d) => Ok(Some(date_to_attrval(d))),
        Value::List(members) => {
            let mut out = Vec::with_capacity(members.len());
            for member in members {
                if let Some(av) = value_to_attrval(member, opts)? {
                    out.push(av);
                }
            }
            Ok(Some(AttributeValue::L(out)))
        }
        Value::Map(members) => {
            let mut out = HashMap::with_capacity(members.len());
            for (k, v) in members {
                if let Some(av) = value_to_attrval(v, opts)? {
                    out.insert(k.to_string(), av);
                }
            }
            Ok(Some(AttributeValue::M(out)))
        }
        Value::StringSet(members) => string_set_to_attrval(members, opts),
        Value::NumberSet(members) => number_set_to_attrval(members, opts),
        Value::BinarySet(members) => binary_set_to_attrval(members, opts),
    }
}

/// Unmarshall an `AttributeValue` into a `Value`, the strict inverse of
/// `value_to_attrval`.
pub fn attrval_to_value(
    attrval: &AttributeValue,
    opts: &MarshallOptions,
) -> Result<Value, MarshallError> {
    match attrval {
        AttributeValue::S(s) => Ok(Value::String(s.to_string())),
        AttributeValue::N(n) => unmarshall_number(n, opts),
        AttributeValue::B(b) => Ok(Value::Binary(b.clone())),
        AttributeValue::Bool(b) => Ok(Value::Bool(*b)),
        AttributeValue::Null(_) => Ok(Value::Null),
        AttributeValue::L(members) => Ok(Value::List(
            members
                .iter()
                .map(|m| attrval_to_value(m, opts))
                .collect::<Result<Vec<Value>, MarshallError>>()?,
        )),
        AttributeValue::M(members) => {
            let mut out = HashMap::with_capacity(members.len());
            for (k, v) in members {
                out.insert(k.to_string(), attrval_to_value(v, opts)?);
            }
            Ok(Value::Map(out))
        }
        AttributeValue::Ss(members) => Ok(Value::StringSet(members.clone())),
        AttributeValue::Ns(members) => Ok(Value::NumberSet(
            members
                .iter()
                .map(|m| DynamoNumber::new(m.as_str()))
                .collect::<Result<Vec<DynamoNumber>, ParseNumberError>>()?,
        )),
        AttributeValue::Bs(members) => {
            Ok(Value::BinarySet(members.iter().cloned().collect()))
        }
    }
}

/* =================================================
Public functions: schema-directed path
================================================= */

/// Marshall a whole record under a schema. Fields absent from the input use
/// their default provider when one is declared, and are omitted otherwise.
pub fn marshall_item(
    schema: &Schema,
    record: &HashMap<String, Value>,
    opts: &MarshallOptions,
) -> Result<Item, MarshallError> {
    let mut item = Item::new();
    for (field, node) in schema.members() {
        let value: Option<Value> = match record.get(field) {
            Some(v) => Some(v.clone()),
            None => node.options().default_provider.as_ref().map(|p| p.provide()),
        };
        let Some(value) = value else {
            continue;
        };
        if let Some(attrval) = marshall_node(node, &value, opts)? {
            let name = schema.attribute_name_of(field, node);
            item.insert(name.to_string(), attrval);
        }
    }
    Ok(item)
}

/// Unmarshall a wire item back into a record. Attributes without a schema
/// field are dropped; declared fields missing from the item stay absent.
pub fn unmarshall_item(
    schema: &Schema,
    item: &Item,
    opts: &MarshallOptions,
) -> Result<HashMap<String, Value>, MarshallError> {
    let mut record = HashMap::new();
    for (field, node) in schema.members() {
        let name = schema.attribute_name_of(field, node);
        if let Some(attrval) = item.get(name) {
            record.insert(field.to_string(), unmarshall_node(node, attrval, opts)?);
        }
    }
    Ok(record)
}

/// Marshall one value under one schema node.
pub fn marshall_node(
    node: &SchemaNode,
    value: &Value,
    opts: &MarshallOptions,
) -> Result<Option<AttributeValue>, MarshallError> {
    match node {
        SchemaNode::String { .. } => match value {
            Value::String(s) => {
                if s.is_empty() {
                    Ok(apply_empty_policy(opts, || {
                        AttributeValue::S(String::new())
                    }))
                } else {
                    Ok(Some(AttributeValue::S(s.to_string())))
                }
            }
            other => invalid(opts, "String", other),
        },
        SchemaNode::Number { .. } => match value {
            Value::Number(n) => Ok(Some(AttributeValue::N(n.as_str().to_string()))),
            Value::Double(d) => double_to_attrval(*d, opts),
            other => invalid(opts, "Number", other),
        },
        SchemaNode::Binary { .. } => match value {
            Value::Binary(b) => {
                if b.is_empty() {
                    Ok(apply_empty_policy(opts, || AttributeValue::B(Bytes::new())))
                } else {
                    Ok(Some(AttributeValue::B(b.clone())))
                }
            }
            other => invalid(opts, "Binary", other),
        },
        SchemaNode::Boolean { .. } => match value {
            Value::Bool(b) => Ok(Some(AttributeValue::Bool(*b))),
            other => invalid(opts, "Boolean", other),
        },
        SchemaNode::Date { .. } => match value {
            Value::Date(d) => Ok(Some(date_to_attrval(d))),
            // epoch seconds are accepted as a convenience coercion
            Value::Number(n) => match n.to_i64() {
                Some(_) => Ok(Some(AttributeValue::N(n.as_str().to_string()))),
                None => Err(MarshallError::NonCoercibleDate(n.as_str().to_string())),
            },
            other => invalid(opts, "Date", other),
        },
        // the Null node marshals any input to an explicit NULL
        SchemaNode::Null { .. } => Ok(Some(AttributeValue::Null(true))),
        SchemaNode::List { member, .. } => match value {
            Value::List(members) => {
                let mut out = Vec::with_capacity(members.len());
                for m in members {
                    if let Some(av) = marshall_node(member, m, opts)? {
                        out.push(av);
                    }
                }
                Ok(Some(AttributeValue::L(out)))
            }
            other => invalid(opts, "List", other),
        },
        SchemaNode::Map { member, .. } => match value {
            Value::Map(members) => {
                let mut out = HashMap::with_capacity(members.len());
                for (k, v) in members {
                    if let Some(av) = marshall_node(member, v, opts)? {
                        out.insert(k.to_string(), av);
                    }
                }
                Ok(Some(AttributeValue::M(out)))
            }
            other => invalid(opts, "Map", other),
        },
        SchemaNode::Set { member, .. } => match (member, value) {
            (SetMemberType::String, Value::StringSet(members)) => {
                string_set_to_attrval(members, opts)
            }
            (SetMemberType::Number, Value::NumberSet(members)) => {
                number_set_to_attrval(members, opts)
            }
            (SetMemberType::Binary, Value::BinarySet(members)) => {
                binary_set_to_attrval(members, opts)
            }
            (SetMemberType::String, other) => invalid(opts, "String Set", other),
            (SetMemberType::Number, other) => invalid(opts, "Number Set", other),
            (SetMemberType::Binary, other) => invalid(opts, "Binary Set", other),
        },
        SchemaNode::Tuple { members, .. } => match value {
            Value::List(vals) if vals.len() == members.len() => {
                let mut out = Vec::with_capacity(vals.len());
                for (m_node, m_val) in members.iter().zip(vals.iter()) {
                    match marshall_node(m_node, m_val, opts)? {
                        Some(av) => out.push(av),
                        // a dropped member would shift positions, so omission
                        // inside a tuple falls back to explicit NULL
                        None => out.push(AttributeValue::Null(true)),
                    }
                }
                Ok(Some(AttributeValue::L(out)))
            }
            Value::List(vals) => match opts.on_invalid {
                OnInvalid::Throw => Err(MarshallError::TupleArityMismatch {
                    expected: members.len(),
                    found: vals.len(),
                }),
                OnInvalid::Omit => {
                    debug!(
                        "[skip] tuple arity mismatch: expected {}, found {}",
                        members.len(),
                        vals.len()
                    );
                    Ok(None)
                }
            },
            other => invalid(opts, "Tuple", other),
        },
        SchemaNode::Document { members, .. } => match value {
            Value::Map(record) => Ok(Some(AttributeValue::M(marshall_item(
                members, record, opts,
            )?))),
            other => invalid(opts, "Document", other),
        },
        SchemaNode::Collection { .. } => match value {
            Value::List(_) => Ok(value_to_attrval(value, opts)?),
            other => invalid(opts, "Collection", other),
        },
        SchemaNode::Hash { .. } => match value {
            Value::Map(_) => Ok(value_to_attrval(value, opts)?),
            other => invalid(opts, "Hash", other),
        },
        SchemaNode::Custom { converter, .. } => converter.marshall(value).map(Some),
    }
}

/// Unmarshall one attribute value under one schema node.
pub fn unmarshall_node(
    node: &SchemaNode,
    attrval: &AttributeValue,
    opts: &MarshallOptions,
) -> Result<Value, MarshallError> {
    match node {
        SchemaNode::String { .. } => match attrval {
            AttributeValue::S(s) => Ok(Value::String(s.to_string())),
            other => wire_mismatch("S", other),
        },
        SchemaNode::Number { .. } => match attrval {
            AttributeValue::N(n) => unmarshall_number(n, opts),
            other => wire_mismatch("N", other),
        },
        SchemaNode::Binary { .. } => match attrval {
            AttributeValue::B(b) => Ok(Value::Binary(b.clone())),
            other => wire_mismatch("B", other),
        },
        SchemaNode::Boolean { .. } => match attrval {
            AttributeValue::Bool(b) => Ok(Value::Bool(*b)),
            other => wire_mismatch("BOOL", other),
        },
        SchemaNode::Date { .. } => match attrval {
            AttributeValue::N(n) => attrval_number_to_date(n).map(Value::Date),
            other => wire_mismatch("N", other),
        },
        SchemaNode::Null { .. } => match attrval {
            AttributeValue::Null(_) => Ok(Value::Null),
            other => wire_mismatch("NULL", other),
        },
        SchemaNode::List { member, .. } => match attrval {
            AttributeValue::L(members) => Ok(Value::List(
                members
                    .iter()
                    .map(|m| unmarshall_node(member, m, opts))
                    .collect::<Result<Vec<Value>, MarshallError>>()?,
            )),
            other => wire_mismatch("L", other),
        },
        SchemaNode::Map { member, .. } => match attrval {
            AttributeValue::M(members) => {
                let mut out = HashMap::with_capacity(members.len());
                for (k, v) in members {
                    out.insert(k.to_string(), unmarshall_node(member, v, opts)?);
                }
                Ok(Value::Map(out))
            }
            other => wire_mismatch("M", other),
        },
        SchemaNode::Set { member, .. } => match (member, attrval) {
            (SetMemberType::String, AttributeValue::Ss(members)) => {
                Ok(Value::StringSet(members.clone()))
            }
            (SetMemberType::Number, AttributeValue::Ns(members)) => Ok(Value::NumberSet(
                members
                    .iter()
                    .map(|m| DynamoNumber::new(m.as_str()))
                    .collect::<Result<Vec<DynamoNumber>, ParseNumberError>>()?,
            )),
            (SetMemberType::Binary, AttributeValue::Bs(members)) => {
                Ok(Value::BinarySet(members.iter().cloned().collect()))
            }
            (SetMemberType::String, other) => wire_mismatch("SS", other),
            (SetMemberType::Number, other) => wire_mismatch("NS", other),
            (SetMemberType::Binary, other) => wire_mismatch("BS", other),
        },
        SchemaNode::Tuple { members, .. } => match attrval {
            AttributeValue::L(vals) if vals.len() == members.len() => Ok(Value::List(
                members
                    .iter()
                    .zip(vals.iter())
                    .map(|(m_node, m_val)| unmarshall_node(m_node, m_val, opts))
                    .collect::<Result<Vec<Value>, MarshallError>>()?,
            )),
            AttributeValue::L(vals) => Err(MarshallError::TupleArityMismatch {
                expected: members.len(),
                found: vals.len(),
            }),
            other => wire_mismatch("L", other),
        },
        SchemaNode::Document { members, .. } => match attrval {
            AttributeValue::M(item) => Ok(Value::Map(unmarshall_item(members, item, opts)?)),
            other => wire_mismatch("M", other),
        },
        SchemaNode::Collection { .. } => match attrval {
            AttributeValue::L(_) => attrval_to_value(attrval, opts),
            other => wire_mismatch("L", other),
        },
        SchemaNode::Hash { .. } => match attrval {
            AttributeValue::M(_) => attrval_to_value(attrval, opts),
            other => wire_mismatch("M", other),
        },
        SchemaNode::Custom { converter, .. } => converter.unmarshall(attrval),
    }
}

/* =================================================
Private functions
================================================= */

/// Dates travel as whole seconds since epoch in an "N" attribute.
fn date_to_attrval(d: &DateTime<Utc>) -> AttributeValue {
    AttributeValue::N(d.timestamp().to_string())
}

fn attrval_number_to_date(n: &str) -> Result<DateTime<Utc>, MarshallError> {
    let seconds = match n.parse::<i64>() {
        Ok(s) => s,
        // tolerate a fractional wire value by truncating to whole seconds
        Err(_) => n
            .parse::<f64>()
            .map_err(|_| MarshallError::NonCoercibleDate(n.to_string()))? as i64,
    };
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| MarshallError::NonCoercibleDate(n.to_string()))
}

fn double_to_attrval(
    d: f64,
    opts: &MarshallOptions,
) -> Result<Option<AttributeValue>, MarshallError> {
    if !d.is_finite() {
        return match opts.on_invalid {
            OnInvalid::Throw => Err(MarshallError::NonFiniteNumber(d)),
            OnInvalid::Omit => {
                debug!("[skip] non-finite number has no wire form: {}", d);
                Ok(None)
            }
        };
    }
    Ok(Some(AttributeValue::N(format!("{}", d))))
}

fn unmarshall_number(n: &str, opts: &MarshallOptions) -> Result<Value, MarshallError> {
    if opts.unwrap_numbers {
        // the lossy convenience path
        let parsed = n
            .parse::<f64>()
            .map_err(|_| MarshallError::InvalidNumber(ParseNumberError::new(n)))?;
        Ok(Value::Double(parsed))
    } else {
        Ok(Value::Number(DynamoNumber::new(n)?))
    }
}

fn apply_empty_policy<F>(opts: &MarshallOptions, leave: F) -> Option<AttributeValue>
where
    F: FnOnce() -> AttributeValue,
{
    match opts.on_empty {
        OnEmpty::Leave => Some(leave()),
        OnEmpty::Omit => {
            debug!("[skip] omitting empty value");
            None
        }
        OnEmpty::Nullify => Some(AttributeValue::Null(true)),
    }
}

/// Drop empty members per policy (error under Leave, which removes
/// nothing), then deduplicate preserving first-seen order.
fn clean_string_members(
    members: &[String],
    opts: &MarshallOptions,
) -> Result<Vec<String>, MarshallError> {
    let mut out: Vec<String> = Vec::with_capacity(members.len());
    for m in members {
        if m.is_empty() {
            if opts.on_empty == OnEmpty::Leave {
                return Err(MarshallError::EmptySetMember);
            }
            debug!("[skip] dropping empty set member");
            continue;
        }
        if !out.iter().any(|existing| existing == m) {
            out.push(m.to_string());
        }
    }
    Ok(out)
}

fn string_set_to_attrval(
    members: &[String],
    opts: &MarshallOptions,
) -> Result<Option<AttributeValue>, MarshallError> {
    let cleaned = clean_string_members(members, opts)?;
    if cleaned.is_empty() {
        return Ok(apply_empty_policy(opts, || AttributeValue::Ss(vec![])));
    }
    Ok(Some(AttributeValue::Ss(cleaned)))
}

fn number_set_to_attrval(
    members: &[DynamoNumber],
    opts: &MarshallOptions,
) -> Result<Option<AttributeValue>, MarshallError> {
    // numbers cannot be empty, so only deduplication applies here
    let mut cleaned: Vec<String> = Vec::with_capacity(members.len());
    for m in members {
        if !cleaned.iter().any(|existing| existing == m.as_str()) {
            cleaned.push(m.as_str().to_string());
        }
    }
    if cleaned.is_empty() {
        return Ok(apply_empty_policy(opts, || AttributeValue::Ns(vec![])));
    }
    Ok(Some(AttributeValue::Ns(cleaned)))
}

fn binary_set_to_attrval(
    members: &BinarySet,
    opts: &MarshallOptions,
) -> Result<Option<AttributeValue>, MarshallError> {
    if members.has_empty_member() {
        if opts.on_empty == OnEmpty::Leave {
            return Err(MarshallError::EmptySetMember);
        }
        debug!("[skip] dropping empty binary set member");
    }
    let cleaned: Vec<Bytes> = members
        .iter()
        .filter(|m| !m.is_empty())
        .cloned()
        .collect();
    if cleaned.is_empty() {
        return Ok(apply_empty_policy(opts, || AttributeValue::Bs(vec![])));
    }
    Ok(Some(AttributeValue::Bs(cleaned)))
}

fn invalid(
    opts: &MarshallOptions,
    expected: &'static str,
    found: &Value,
) -> Result<Option<AttributeValue>, MarshallError> {
    match opts.on_invalid {
        OnInvalid::Throw => Err(MarshallError::TypeMismatch {
            expected,
            found: found.value_type(),
        }),
        OnInvalid::Omit => {
            debug!(
                "[skip] cannot marshall {} under a {} node",
                found.value_type(),
                expected
            );
            Ok(None)
        }
    }
}

fn wire_mismatch(expected: &'static str, found: &AttributeValue) -> Result<Value, MarshallError> {
    Err(MarshallError::WireTypeMismatch {
        expected,
        found: found.type_tag(),
    })
}

/* =================================================
Unit tests
================================================= */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        self, custom, document, list, number, set, string, tuple, CustomConverter, Schema,
    };

    fn opts() -> MarshallOptions {
        MarshallOptions::default()
    }

    fn record(entries: Vec<(&str, Value)>) -> HashMap<String, Value> {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_schemaless_round_trip() {
        let mut map = HashMap::new();
        map.insert(String::from("name"), Value::from("Joe"));
        map.insert(String::from("age"), Value::from(35_i64));
        let original = Value::Map(map);

        let marshalled = value_to_attrval(&original, &opts()).unwrap().unwrap();
        let restored = attrval_to_value(&marshalled, &opts()).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_schemaless_date_becomes_number() {
        let d = Utc.timestamp_opt(1582050565, 0).unwrap();
        let marshalled = value_to_attrval(&Value::Date(d), &opts()).unwrap().unwrap();
        assert_eq!(marshalled, AttributeValue::N(String::from("1582050565")));
    }

    #[test]
    fn test_empty_string_policies() {
        let leave = MarshallOptions::default();
        let omit = MarshallOptions {
            on_empty: OnEmpty::Omit,
            ..leave
        };
        let nullify = MarshallOptions {
            on_empty: OnEmpty::Nullify,
            ..leave
        };
        let empty = Value::from("");
        assert_eq!(
            value_to_attrval(&empty, &leave).unwrap(),
            Some(AttributeValue::S(String::new()))
        );
        assert_eq!(value_to_attrval(&empty, &omit).unwrap(), None);
        assert_eq!(
            value_to_attrval(&empty, &nullify).unwrap(),
            Some(AttributeValue::Null(true))
        );
    }

    #[test]
    fn test_set_deduplication_and_empty_members() {
        let members = vec![
            String::from("a"),
            String::from("b"),
            String::from("a"),
            String::new(),
        ];
        // Leave: the empty member is an error
        assert!(matches!(
            value_to_attrval(&Value::StringSet(members.clone()), &opts()),
            Err(MarshallError::EmptySetMember)
        ));
        // Omit: empty member dropped, duplicate collapsed
        let omit = MarshallOptions {
            on_empty: OnEmpty::Omit,
            ..opts()
        };
        assert_eq!(
            value_to_attrval(&Value::StringSet(members), &omit).unwrap(),
            Some(AttributeValue::Ss(vec![
                String::from("a"),
                String::from("b"),
            ]))
        );
    }

    #[test]
    fn test_number_set_string_equality() {
        let members = vec![
            DynamoNumber::new("10").unwrap(),
            DynamoNumber::new("10.0").unwrap(),
            DynamoNumber::new("10").unwrap(),
        ];
        // "10" and "10.0" are distinct by decimal-string equality
        assert_eq!(
            value_to_attrval(&Value::NumberSet(members), &opts()).unwrap(),
            Some(AttributeValue::Ns(vec![
                String::from("10"),
                String::from("10.0"),
            ]))
        );
    }

    #[test]
    fn test_unwrap_numbers() {
        let opts_unwrap = MarshallOptions {
            unwrap_numbers: true,
            ..opts()
        };
        assert_eq!(
            attrval_to_value(&AttributeValue::N(String::from("2.5")), &opts_unwrap).unwrap(),
            Value::Double(2.5)
        );
        assert_eq!(
            attrval_to_value(&AttributeValue::N(String::from("2.5")), &opts()).unwrap(),
            Value::Number(DynamoNumber::new("2.5").unwrap())
        );
    }

    fn item_schema() -> Schema {
        Schema::builder()
            .field("id", string().partition_key().unwrap())
            .field("createdAt", schema::date().attribute_name("created_at"))
            .field("score", number())
            .field("tags", set(schema::SetMemberType::String))
            .field(
                "dimensions",
                tuple(vec![number(), number()]),
            )
            .field(
                "meta",
                document(
                    Schema::builder()
                        .field("owner", string())
                        .build()
                        .unwrap(),
                ),
            )
            .field("history", list(number()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_schema_round_trip() {
        let schema = item_schema();
        let input = record(vec![
            ("id", Value::from("item-1")),
            (
                "createdAt",
                Value::Date(Utc.timestamp_opt(1582050565, 0).unwrap()),
            ),
            ("score", Value::from(42_i64)),
            (
                "tags",
                Value::StringSet(vec![String::from("alpha"), String::from("beta")]),
            ),
            (
                "dimensions",
                Value::List(vec![Value::from(3_i64), Value::from(4_i64)]),
            ),
            (
                "meta",
                Value::Map(record(vec![("owner", Value::from("thash"))])),
            ),
            (
                "history",
                Value::List(vec![Value::from(1_i64), Value::from(2_i64)]),
            ),
        ]);

        let item = marshall_item(&schema, &input, &opts()).unwrap();
        // the date landed under its overridden wire name, as a number
        assert_eq!(
            item["created_at"],
            AttributeValue::N(String::from("1582050565"))
        );
        assert_eq!(item["id"], AttributeValue::S(String::from("item-1")));

        let restored = unmarshall_item(&schema, &item, &opts()).unwrap();
        assert_eq!(restored, input);
    }

    #[test]
    fn test_default_provider_fills_missing_field() {
        let schema = Schema::builder()
            .field("id", string())
            .field(
                "status",
                string().default_provider(|| Value::from("pending")),
            )
            .build()
            .unwrap();
        let item = marshall_item(&schema, &record(vec![("id", Value::from("x"))]), &opts()).unwrap();
        assert_eq!(item["status"], AttributeValue::S(String::from("pending")));
    }

    #[test]
    fn test_missing_field_without_default_is_omitted() {
        let schema = Schema::builder().field("id", string()).build().unwrap();
        let item = marshall_item(&schema, &record(vec![]), &opts()).unwrap();
        assert!(item.is_empty());
    }

    #[test]
    fn test_type_mismatch_policies() {
        let schema = Schema::builder().field("n", number()).build().unwrap();
        let input = record(vec![("n", Value::from("not a number"))]);

        assert!(matches!(
            marshall_item(&schema, &input, &opts()),
            Err(MarshallError::TypeMismatch {
                expected: "Number",
                ..
            })
        ));

        let omit = MarshallOptions {
            on_invalid: OnInvalid::Omit,
            ..opts()
        };
        let item = marshall_item(&schema, &input, &omit).unwrap();
        assert!(item.is_empty());
    }

    #[test]
    fn test_tuple_arity_mismatch() {
        let schema = Schema::builder()
            .field("pair", tuple(vec![number(), number()]))
            .build()
            .unwrap();
        let input = record(vec![("pair", Value::List(vec![Value::from(1_i64)]))]);
        assert!(matches!(
            marshall_item(&schema, &input, &opts()),
            Err(MarshallError::TupleArityMismatch {
                expected: 2,
                found: 1,
            })
        ));
    }

    #[test]
    fn test_custom_converter() {
        // store a string value reversed, to prove the closures run
        let converter = CustomConverter::new(
            |v| match v {
                Value::String(s) => Ok(AttributeValue::S(s.chars().rev().collect())),
                other => Err(MarshallError::Custom(format!(
                    "expected string, got {}",
                    other.value_type()
                ))),
            },
            |av| match av {
                AttributeValue::S(s) => Ok(Value::String(s.chars().rev().collect())),
                other => Err(MarshallError::Custom(format!(
                    "expected S, got {}",
                    other.type_tag()
                ))),
            },
        );
        let schema = Schema::builder()
            .field("word", custom(converter))
            .build()
            .unwrap();
        let input = record(vec![("word", Value::from("dynamo"))]);
        let item = marshall_item(&schema, &input, &opts()).unwrap();
        assert_eq!(item["word"], AttributeValue::S(String::from("omanyd")));
        let restored = unmarshall_item(&schema, &item, &opts()).unwrap();
        assert_eq!(restored, input);
    }

    #[test]
    fn test_date_unmarshall_rejects_garbage() {
        let schema = Schema::builder().field("at", schema::date()).build().unwrap();
        let item = Item::from([(String::from("at"), AttributeValue::S(String::from("x")))]);
        assert!(matches!(
            unmarshall_item(&schema, &item, &opts()),
            Err(MarshallError::WireTypeMismatch { expected: "N", .. })
        ));
    }
}
