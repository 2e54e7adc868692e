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

// The DynamoDB wire data model: the tagged attribute-value union, the item
// map, and codecs between attribute values and their JSON renditions
// ("DynamoDB JSON" with explicit type tags, and plain JSON with inference).

use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use log::debug;
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use std::collections::HashMap;
use std::error;
use std::fmt;

/* =================================================
struct / enum / const
================================================= */

/// One DynamoDB attribute value, tagged with its wire type.
/// https://docs.aws.amazon.com/amazondynamodb/latest/developerguide/HowItWorks.NamingRulesDataTypes.html
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// "S": string
    S(String),
    /// "N": number, transmitted as a decimal string
    N(String),
    /// "B": binary buffer
    B(Bytes),
    /// "BOOL"
    Bool(bool),
    /// "NULL": the explicit null marker. The wire always carries `true`.
    Null(bool),
    /// "L": ordered, heterogeneous list
    L(Vec<AttributeValue>),
    /// "M": string-keyed map
    M(HashMap<String, AttributeValue>),
    /// "SS": set of strings
    Ss(Vec<String>),
    /// "NS": set of numbers as decimal strings
    Ns(Vec<String>),
    /// "BS": set of binary buffers
    Bs(Vec<Bytes>),
}

/// A complete record: attribute name to attribute value.
pub type Item = HashMap<String, AttributeValue>;

/// The primary-key portion of an item; structurally identical to `Item`.
pub type Key = HashMap<String, AttributeValue>;

#[derive(Debug)]
pub enum DataError {
    /// A JSON value that is not a valid DynamoDB-JSON attribute value.
    InvalidDynamoJson(String),
    /// A "B"/"BS" payload that is not valid standard base64.
    InvalidBase64(base64::DecodeError),
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::InvalidDynamoJson(ref msg) => {
                write!(f, "invalid DynamoDB JSON: {}", msg)
            }
            DataError::InvalidBase64(ref e) => write!(f, "invalid base64 binary value: {}", e),
        }
    }
}

impl error::Error for DataError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            DataError::InvalidDynamoJson(_) => None,
            DataError::InvalidBase64(ref e) => Some(e),
        }
    }
}

impl From<base64::DecodeError> for DataError {
    fn from(e: base64::DecodeError) -> Self {
        Self::InvalidBase64(e)
    }
}

/* =================================================
impl
================================================= */

impl AttributeValue {
    pub fn as_s(&self) -> Result<&String, &AttributeValue> {
        match self {
            AttributeValue::S(v) => Ok(v),
            other => Err(other),
        }
    }

    pub fn as_n(&self) -> Result<&String, &AttributeValue> {
        match self {
            AttributeValue::N(v) => Ok(v),
            other => Err(other),
        }
    }

    pub fn as_b(&self) -> Result<&Bytes, &AttributeValue> {
        match self {
            AttributeValue::B(v) => Ok(v),
            other => Err(other),
        }
    }

    pub fn as_bool(&self) -> Result<&bool, &AttributeValue> {
        match self {
            AttributeValue::Bool(v) => Ok(v),
            other => Err(other),
        }
    }

    pub fn as_l(&self) -> Result<&Vec<AttributeValue>, &AttributeValue> {
        match self {
            AttributeValue::L(v) => Ok(v),
            other => Err(other),
        }
    }

    pub fn as_m(&self) -> Result<&HashMap<String, AttributeValue>, &AttributeValue> {
        match self {
            AttributeValue::M(v) => Ok(v),
            other => Err(other),
        }
    }

    pub fn as_ss(&self) -> Result<&Vec<String>, &AttributeValue> {
        match self {
            AttributeValue::Ss(v) => Ok(v),
            other => Err(other),
        }
    }

    pub fn as_ns(&self) -> Result<&Vec<String>, &AttributeValue> {
        match self {
            AttributeValue::Ns(v) => Ok(v),
            other => Err(other),
        }
    }

    pub fn as_bs(&self) -> Result<&Vec<Bytes>, &AttributeValue> {
        match self {
            AttributeValue::Bs(v) => Ok(v),
            other => Err(other),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null(_))
    }

    /// The single-letter wire tag, e.g. "S" or "NS".
    pub fn type_tag(&self) -> &'static str {
        match self {
            AttributeValue::S(_) => "S",
            AttributeValue::N(_) => "N",
            AttributeValue::B(_) => "B",
            AttributeValue::Bool(_) => "BOOL",
            AttributeValue::Null(_) => "NULL",
            AttributeValue::L(_) => "L",
            AttributeValue::M(_) => "M",
            AttributeValue::Ss(_) => "SS",
            AttributeValue::Ns(_) => "NS",
            AttributeValue::Bs(_) => "BS",
        }
    }
}

/// Attribute values serialize as their DynamoDB JSON rendition, so serde
/// snapshots (e.g. persisted scan state) use the same tagged format the
/// service itself speaks.
impl serde::Serialize for AttributeValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        attrval_to_ddbjson(self).serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for AttributeValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = JsonValue::deserialize(deserializer)?;
        ddbjson_to_attrval(&raw).map_err(serde::de::Error::custom)
    }
}

/* =================================================
Public functions
================================================= */

/// Render an attribute value in DynamoDB JSON, the explicitly tagged format
/// used by the AWS CLI and batch request files:
///     AttributeValue::S("Amazon DynamoDB") => {"S": "Amazon DynamoDB"}
/// Binary payloads are standard base64 with padding.
pub fn attrval_to_ddbjson(attrval: &AttributeValue) -> JsonValue {
    match attrval {
        AttributeValue::S(v) => json!({ "S": v }),
        AttributeValue::N(v) => json!({ "N": v }),
        AttributeValue::B(v) => json!({ "B": bytes_to_base64(v) }),
        AttributeValue::Bool(v) => json!({ "BOOL": v }),
        AttributeValue::Null(_) => json!({ "NULL": true }),
        AttributeValue::L(vs) => {
            let elements = vs.iter().map(attrval_to_ddbjson).collect::<Vec<JsonValue>>();
            json!({ "L": elements })
        }
        AttributeValue::M(m) => json!({ "M": item_to_ddbjson(m) }),
        AttributeValue::Ss(vs) => json!({ "SS": vs }),
        AttributeValue::Ns(vs) => json!({ "NS": vs }),
        AttributeValue::Bs(vs) => {
            let encoded = vs.iter().map(bytes_to_base64).collect::<Vec<String>>();
            json!({ "BS": encoded })
        }
    }
}

/// Render a whole item as a DynamoDB JSON object.
pub fn item_to_ddbjson(item: &HashMap<String, AttributeValue>) -> JsonValue {
    let mut obj = JsonMap::new();
    for (name, attrval) in item {
        obj.insert(name.to_string(), attrval_to_ddbjson(attrval));
    }
    JsonValue::Object(obj)
}

/// Parse a single DynamoDB JSON attribute value.
///
/// Input example (N):
///     Object( { "N": String( "4",), },)
///
/// Input example (M):
///     Object({"M": Object({
///              "Name": Object({"S": String("Joe")}),
///              "Age": Object({"N": String("35")})})})
pub fn ddbjson_to_attrval(ddb_jsonval: &JsonValue) -> Result<AttributeValue, DataError> {
    // shared logic for the two string-array set types (SS and NS).
    let set_logic = |val: &JsonValue| -> Result<Vec<String>, DataError> {
        val.as_array()
            .ok_or_else(|| DataError::InvalidDynamoJson(format!("expected array: {}", val)))?
            .iter()
            .map(|el| {
                el.as_str().map(str::to_string).ok_or_else(|| {
                    DataError::InvalidDynamoJson(format!("set member should be string: {}", el))
                })
            })
            .collect()
    };

    // the following list of if-else statements would be the return value of this function.
    if let Some(x) = ddb_jsonval.get("S") {
        Ok(AttributeValue::S(expect_json_str(x)?.to_string()))
    } else if let Some(x) = ddb_jsonval.get("N") {
        Ok(AttributeValue::N(expect_json_str(x)?.to_string()))
    } else if let Some(x) = ddb_jsonval.get("B") {
        Ok(AttributeValue::B(base64_json_to_bytes(x)?))
    } else if let Some(x) = ddb_jsonval.get("BOOL") {
        let b = x.as_bool().ok_or_else(|| {
            DataError::InvalidDynamoJson(format!("BOOL should hold a boolean: {}", x))
        })?;
        Ok(AttributeValue::Bool(b))
    } else if let Some(x) = ddb_jsonval.get("SS") {
        Ok(AttributeValue::Ss(set_logic(x)?))
    } else if let Some(x) = ddb_jsonval.get("NS") {
        Ok(AttributeValue::Ns(set_logic(x)?))
    } else if let Some(x) = ddb_jsonval.get("BS") {
        let binary_set = x
            .as_array()
            .ok_or_else(|| DataError::InvalidDynamoJson(format!("BS should hold an array: {}", x)))?
            .iter()
            .map(base64_json_to_bytes)
            .collect::<Result<Vec<Bytes>, DataError>>()?;
        Ok(AttributeValue::Bs(binary_set))
    } else if let Some(x) = ddb_jsonval.get("L") {
        let list_element = x
            .as_array()
            .ok_or_else(|| DataError::InvalidDynamoJson(format!("L should hold an array: {}", x)))?
            .iter()
            .map(ddbjson_to_attrval)
            .collect::<Result<Vec<AttributeValue>, DataError>>()?;
        Ok(AttributeValue::L(list_element))
    } else if let Some(x) = ddb_jsonval.get("M") {
        Ok(AttributeValue::M(ddbjson_to_item(x)?))
    } else if ddb_jsonval.get("NULL").is_some() {
        Ok(AttributeValue::Null(true))
    } else {
        Err(DataError::InvalidDynamoJson(format!(
            "no known type tag found in: {}",
            ddb_jsonval
        )))
    }
}

/// Parse a DynamoDB JSON object of attributes into an item.
///
/// Input example:
///     Object({
///         "Category": Object( { "S": String( "Amazon Web Services",), },),
///         "Messages": Object( { "N": String( "4",), },),
///     },)
pub fn ddbjson_to_item(ddbjson_attributes: &JsonValue) -> Result<Item, DataError> {
    let obj = ddbjson_attributes.as_object().ok_or_else(|| {
        DataError::InvalidDynamoJson(format!("expected JSON object: {}", ddbjson_attributes))
    })?;
    let mut built_attributes = Item::new();
    for (attribute_name, body) in obj {
        debug!("attribute name is: {}, body is: {:?}", attribute_name, body);
        built_attributes.insert(attribute_name.to_string(), ddbjson_to_attrval(body)?);
    }
    Ok(built_attributes)
}

/// Convert from serde_json::Value (standard JSON values) into a DynamoDB
/// style AttributeValue, inferring the type tag from the JSON shape.
///
/// With `enable_set_inference`, an array whose elements are all strings or
/// all numbers is promoted to "SS"/"NS" instead of "L".
pub fn dispatch_jsonvalue_to_attrval(jv: &JsonValue, enable_set_inference: bool) -> AttributeValue {
    match jv {
        // scalar types
        JsonValue::String(val) => AttributeValue::S(val.to_string()),
        JsonValue::Number(val) => AttributeValue::N(val.to_string()),
        JsonValue::Bool(val) => AttributeValue::Bool(*val),
        JsonValue::Null => AttributeValue::Null(true),

        // document types. they can be recursive.
        JsonValue::Object(obj) => {
            let mut mapval = HashMap::<String, AttributeValue>::new();
            for (k, v) in obj {
                mapval.insert(
                    k.to_string(),
                    dispatch_jsonvalue_to_attrval(v, enable_set_inference),
                );
            }
            AttributeValue::M(mapval)
        }
        JsonValue::Array(vec) => {
            if enable_set_inference && !vec.is_empty() && vec.iter().all(|v| v.is_string()) {
                debug!(
                    "All elements in this attribute are String - treat it as 'SS': {:?}",
                    vec
                );
                AttributeValue::Ss(
                    vec.iter()
                        .map(|v| v.as_str().unwrap_or_default().to_string())
                        .collect(),
                )
            } else if enable_set_inference && !vec.is_empty() && vec.iter().all(|v| v.is_number()) {
                debug!(
                    "All elements in this attribute are Number - treat it as 'NS': {:?}",
                    vec
                );
                AttributeValue::Ns(vec.iter().map(|v| v.to_string()).collect())
            } else {
                debug!("Elements are not uniform - treat it as 'L': {:?}", vec);
                AttributeValue::L(
                    vec.iter()
                        .map(|v| dispatch_jsonvalue_to_attrval(v, enable_set_inference))
                        .collect(),
                )
            }
        }
    }
}

/* =================================================
Private functions
================================================= */

fn expect_json_str(v: &JsonValue) -> Result<&str, DataError> {
    v.as_str()
        .ok_or_else(|| DataError::InvalidDynamoJson(format!("expected JSON string: {}", v)))
}

fn bytes_to_base64(v: &Bytes) -> String {
    general_purpose::STANDARD.encode(v)
}

/// Decodes a base64 encoded binary value to Bytes.
fn base64_json_to_bytes(v: &JsonValue) -> Result<Bytes, DataError> {
    let s = expect_json_str(v)?;
    Ok(Bytes::from(general_purpose::STANDARD.decode(s)?))
}

/* =================================================
Unit tests
================================================= */
