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

// Schema declaration: one node per field describing how it marshals, plus
// key configuration. Schemas are built once through `SchemaBuilder` and are
// immutable afterwards; `build()` runs the structural validation.

use crate::data::{AttributeValue, Item};
use crate::marshall::MarshallError;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

/* =================================================
struct / enum / const
================================================= */

/// Member type of a homogeneous Set node. DynamoDB only has three set
/// types, so anything else is unrepresentable by construction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetMemberType {
    Binary,
    Number,
    String,
}

/// Primary-key role of a field, either in the table key schema or in an
/// index key schema.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyRole {
    Partition,
    Sort,
}

/// Display as the wire-level KeyType strings ("HASH" / "RANGE").
impl Display for KeyRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                KeyRole::Partition => "HASH",
                KeyRole::Sort => "RANGE",
            }
        )
    }
}

/// Key configuration for a secondary index, looked up by index name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexKeyConfiguration {
    pub index_name: String,
    pub role: KeyRole,
}

/// Data type letter of a primary key attribute. i.e. "S" (String),
/// "N" (Number), or "B" (Binary). Use 'kind' as 'type' is a keyword in Rust.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Copy, Clone)]
pub enum KeyAttributeType {
    S,
    N,
    B,
}

impl Display for KeyAttributeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                KeyAttributeType::S => "S",
                KeyAttributeType::N => "N",
                KeyAttributeType::B => "B",
            }
        )
    }
}

/// One resolved key attribute: the wire attribute name, the schema field it
/// came from, and the wire type letter (None for Custom nodes, whose wire
/// type is whatever the user closure produces).
#[derive(Debug, Clone, PartialEq)]
pub struct KeyAttribute {
    pub name: String,
    pub field: String,
    pub kind: Option<KeyAttributeType>,
}

impl KeyAttribute {
    /// "myPk (S)" style rendering used in log lines.
    pub fn display(&self) -> String {
        match self.kind {
            Some(kind) => format!("{} ({})", self.name, kind),
            None => format!("{} (custom)", self.name),
        }
    }
}

/// The table key schema resolved from a `Schema`: partition key plus the
/// optional sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeySchema {
    pub partition: KeyAttribute,
    pub sort: Option<KeyAttribute>,
}

/// A value supplier for fields absent from the input record.
#[derive(Clone)]
pub struct DefaultProvider(Arc<dyn Fn() -> Value + Send + Sync>);

impl DefaultProvider {
    pub fn new(f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn provide(&self) -> Value {
        (self.0)()
    }
}

impl Debug for DefaultProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "DefaultProvider(..)")
    }
}

/// User-supplied bidirectional conversion for the Custom escape hatch.
#[derive(Clone)]
pub struct CustomConverter {
    marshall: Arc<dyn Fn(&Value) -> Result<AttributeValue, MarshallError> + Send + Sync>,
    unmarshall: Arc<dyn Fn(&AttributeValue) -> Result<Value, MarshallError> + Send + Sync>,
}

impl CustomConverter {
    pub fn new(
        marshall: impl Fn(&Value) -> Result<AttributeValue, MarshallError> + Send + Sync + 'static,
        unmarshall: impl Fn(&AttributeValue) -> Result<Value, MarshallError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            marshall: Arc::new(marshall),
            unmarshall: Arc::new(unmarshall),
        }
    }

    pub fn marshall(&self, value: &Value) -> Result<AttributeValue, MarshallError> {
        (self.marshall)(value)
    }

    pub fn unmarshall(&self, attrval: &AttributeValue) -> Result<Value, MarshallError> {
        (self.unmarshall)(attrval)
    }
}

impl Debug for CustomConverter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "CustomConverter(..)")
    }
}

/// Options every node may carry: a wire attribute-name override and a
/// default supplier for missing input.
#[derive(Debug, Clone, Default)]
pub struct FieldOptions {
    pub attribute_name: Option<String>,
    pub default_provider: Option<DefaultProvider>,
}

/// Key configuration carried only by the key-legal node variants.
#[derive(Debug, Clone, Default)]
pub struct KeyInfo {
    pub key: Option<KeyRole>,
    pub index_keys: Vec<IndexKeyConfiguration>,
}

/// How one field is marshalled. One variant per schema tag; the key-legal
/// variants (Binary, Date, Number, String, Custom) are the only ones that
/// can physically hold a `KeyInfo`.
#[derive(Debug, Clone)]
pub enum SchemaNode {
    Binary {
        options: FieldOptions,
        keys: KeyInfo,
    },
    Boolean {
        options: FieldOptions,
    },
    Date {
        options: FieldOptions,
        keys: KeyInfo,
    },
    Null {
        options: FieldOptions,
    },
    Number {
        options: FieldOptions,
        keys: KeyInfo,
        version_attribute: bool,
    },
    String {
        options: FieldOptions,
        keys: KeyInfo,
    },
    List {
        member: Box<SchemaNode>,
        options: FieldOptions,
    },
    Map {
        member: Box<SchemaNode>,
        options: FieldOptions,
    },
    Set {
        member: SetMemberType,
        options: FieldOptions,
    },
    Tuple {
        members: Vec<SchemaNode>,
        options: FieldOptions,
    },
    Document {
        members: Schema,
        options: FieldOptions,
    },
    /// Ordered container with opaque members (marshalled schemalessly).
    Collection {
        options: FieldOptions,
    },
    /// String-keyed container with opaque members.
    Hash {
        options: FieldOptions,
    },
    Custom {
        converter: CustomConverter,
        options: FieldOptions,
        keys: KeyInfo,
    },
}

/// An immutable, validated mapping from field name to schema node.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    members: BTreeMap<String, SchemaNode>,
}

pub struct SchemaBuilder {
    members: BTreeMap<String, SchemaNode>,
}

#[derive(Debug, PartialEq)]
pub enum SchemaError {
    /// Key configuration requested on a node type that is not key-legal.
    KeyOnNonKeyType(&'static str),
    /// `version_attribute` requested on a node other than Number.
    VersionOnNonNumber(&'static str),
    DuplicatePartitionKey(String, String),
    DuplicateSortKey(String, String),
    DuplicateIndexKey {
        index_name: String,
        role: KeyRole,
        first: String,
        second: String,
    },
    /// An operation that needs a table key schema found none declared.
    NoPartitionKey,
    /// A sort key is declared without a partition key.
    SortKeyWithoutPartitionKey(String),
    /// An item is missing a declared key attribute.
    MissingKeyAttribute(String),
    /// A key attribute is present with the wrong wire type.
    KeyTypeMismatch {
        name: String,
        expected: KeyAttributeType,
    },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::KeyOnNonKeyType(tag) => {
                write!(f, "{} fields cannot be used as keys; only Binary, Date, Number, String, and Custom fields can", tag)
            }
            SchemaError::VersionOnNonNumber(tag) => {
                write!(f, "version attributes must be Number fields, not {}", tag)
            }
            SchemaError::DuplicatePartitionKey(first, second) => {
                write!(
                    f,
                    "both '{}' and '{}' are declared as the partition key",
                    first, second
                )
            }
            SchemaError::DuplicateSortKey(first, second) => {
                write!(
                    f,
                    "both '{}' and '{}' are declared as the sort key",
                    first, second
                )
            }
            SchemaError::DuplicateIndexKey {
                index_name,
                role,
                first,
                second,
            } => {
                write!(
                    f,
                    "both '{}' and '{}' are declared as the {} key of index '{}'",
                    first, second, role, index_name
                )
            }
            SchemaError::NoPartitionKey => {
                write!(f, "the schema does not declare a partition key")
            }
            SchemaError::SortKeyWithoutPartitionKey(field) => {
                write!(
                    f,
                    "'{}' is declared as a sort key but no partition key is declared",
                    field
                )
            }
            SchemaError::MissingKeyAttribute(name) => {
                write!(f, "must provide the key attribute {}", name)
            }
            SchemaError::KeyTypeMismatch { name, expected } => {
                write!(
                    f,
                    "type mismatch for the key {}, expected: {}",
                    name, expected
                )
            }
        }
    }
}

impl std::error::Error for SchemaError {}

/* =================================================
Node constructors
================================================= */

pub fn string() -> SchemaNode {
    SchemaNode::String {
        options: FieldOptions::default(),
        keys: KeyInfo::default(),
    }
}

pub fn number() -> SchemaNode {
    SchemaNode::Number {
        options: FieldOptions::default(),
        keys: KeyInfo::default(),
        version_attribute: false,
    }
}

pub fn binary() -> SchemaNode {
    SchemaNode::Binary {
        options: FieldOptions::default(),
        keys: KeyInfo::default(),
    }
}

pub fn boolean() -> SchemaNode {
    SchemaNode::Boolean {
        options: FieldOptions::default(),
    }
}

pub fn date() -> SchemaNode {
    SchemaNode::Date {
        options: FieldOptions::default(),
        keys: KeyInfo::default(),
    }
}

pub fn null() -> SchemaNode {
    SchemaNode::Null {
        options: FieldOptions::default(),
    }
}

pub fn list(member: SchemaNode) -> SchemaNode {
    SchemaNode::List {
        member: Box::new(member),
        options: FieldOptions::default(),
    }
}

pub fn map_of(member: SchemaNode) -> SchemaNode {
    SchemaNode::Map {
        member: Box::new(member),
        options: FieldOptions::default(),
    }
}

pub fn set(member: SetMemberType) -> SchemaNode {
    SchemaNode::Set {
        member,
        options: FieldOptions::default(),
    }
}

pub fn tuple(members: Vec<SchemaNode>) -> SchemaNode {
    SchemaNode::Tuple {
        members,
        options: FieldOptions::default(),
    }
}

pub fn document(members: Schema) -> SchemaNode {
    SchemaNode::Document {
        members,
        options: FieldOptions::default(),
    }
}

pub fn collection() -> SchemaNode {
    SchemaNode::Collection {
        options: FieldOptions::default(),
    }
}

pub fn hash() -> SchemaNode {
    SchemaNode::Hash {
        options: FieldOptions::default(),
    }
}

pub fn custom(converter: CustomConverter) -> SchemaNode {
    SchemaNode::Custom {
        converter,
        options: FieldOptions::default(),
        keys: KeyInfo::default(),
    }
}

/* =================================================
impl
================================================= */

impl SchemaNode {
    /// The schema tag name, used in error messages.
    pub fn node_tag(&self) -> &'static str {
        match self {
            SchemaNode::Binary { .. } => "Binary",
            SchemaNode::Boolean { .. } => "Boolean",
            SchemaNode::Date { .. } => "Date",
            SchemaNode::Null { .. } => "Null",
            SchemaNode::Number { .. } => "Number",
            SchemaNode::String { .. } => "String",
            SchemaNode::List { .. } => "List",
            SchemaNode::Map { .. } => "Map",
            SchemaNode::Set { .. } => "Set",
            SchemaNode::Tuple { .. } => "Tuple",
            SchemaNode::Document { .. } => "Document",
            SchemaNode::Collection { .. } => "Collection",
            SchemaNode::Hash { .. } => "Hash",
            SchemaNode::Custom { .. } => "Custom",
        }
    }

    pub fn options(&self) -> &FieldOptions {
        match self {
            SchemaNode::Binary { options, .. }
            | SchemaNode::Boolean { options }
            | SchemaNode::Date { options, .. }
            | SchemaNode::Null { options }
            | SchemaNode::Number { options, .. }
            | SchemaNode::String { options, .. }
            | SchemaNode::List { options, .. }
            | SchemaNode::Map { options, .. }
            | SchemaNode::Set { options, .. }
            | SchemaNode::Tuple { options, .. }
            | SchemaNode::Document { options, .. }
            | SchemaNode::Collection { options }
            | SchemaNode::Hash { options }
            | SchemaNode::Custom { options, .. } => options,
        }
    }

    fn options_mut(&mut self) -> &mut FieldOptions {
        match self {
            SchemaNode::Binary { options, .. }
            | SchemaNode::Boolean { options }
            | SchemaNode::Date { options, .. }
            | SchemaNode::Null { options }
            | SchemaNode::Number { options, .. }
            | SchemaNode::String { options, .. }
            | SchemaNode::List { options, .. }
            | SchemaNode::Map { options, .. }
            | SchemaNode::Set { options, .. }
            | SchemaNode::Tuple { options, .. }
            | SchemaNode::Document { options, .. }
            | SchemaNode::Collection { options }
            | SchemaNode::Hash { options }
            | SchemaNode::Custom { options, .. } => options,
        }
    }

    pub fn key_info(&self) -> Option<&KeyInfo> {
        match self {
            SchemaNode::Binary { keys, .. }
            | SchemaNode::Date { keys, .. }
            | SchemaNode::Number { keys, .. }
            | SchemaNode::String { keys, .. }
            | SchemaNode::Custom { keys, .. } => Some(keys),
            _ => None,
        }
    }

    fn key_info_mut(&mut self) -> Option<&mut KeyInfo> {
        match self {
            SchemaNode::Binary { keys, .. }
            | SchemaNode::Date { keys, .. }
            | SchemaNode::Number { keys, .. }
            | SchemaNode::String { keys, .. }
            | SchemaNode::Custom { keys, .. } => Some(keys),
            _ => None,
        }
    }

    /// The wire type letter a key of this node type produces. None for
    /// Custom (the closure decides) and for non-key-legal nodes.
    pub fn key_wire_type(&self) -> Option<KeyAttributeType> {
        match self {
            SchemaNode::String { .. } => Some(KeyAttributeType::S),
            SchemaNode::Number { .. } | SchemaNode::Date { .. } => Some(KeyAttributeType::N),
            SchemaNode::Binary { .. } => Some(KeyAttributeType::B),
            _ => None,
        }
    }

    pub fn is_version_attribute(&self) -> bool {
        matches!(
            self,
            SchemaNode::Number {
                version_attribute: true,
                ..
            }
        )
    }

    /// Overrides the wire attribute name for this field.
    pub fn attribute_name(mut self, name: impl Into<String>) -> Self {
        self.options_mut().attribute_name = Some(name.into());
        self
    }

    /// Registers a supplier used when the input record lacks this field.
    pub fn default_provider(mut self, f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.options_mut().default_provider = Some(DefaultProvider::new(f));
        self
    }

    /// Marks this field as the table partition key. Errors unless the node
    /// type is key-legal.
    pub fn partition_key(self) -> Result<Self, SchemaError> {
        self.with_key_role(KeyRole::Partition)
    }

    /// Marks this field as the table sort key.
    pub fn sort_key(self) -> Result<Self, SchemaError> {
        self.with_key_role(KeyRole::Sort)
    }

    fn with_key_role(mut self, role: KeyRole) -> Result<Self, SchemaError> {
        let tag = self.node_tag();
        match self.key_info_mut() {
            Some(keys) => keys.key = Some(role),
            None => return Err(SchemaError::KeyOnNonKeyType(tag)),
        }
        Ok(self)
    }

    /// Adds an index key configuration, looked up by index name at query
    /// time.
    pub fn index_key(
        mut self,
        index_name: impl Into<String>,
        role: KeyRole,
    ) -> Result<Self, SchemaError> {
        let tag = self.node_tag();
        match self.key_info_mut() {
            Some(keys) => keys.index_keys.push(IndexKeyConfiguration {
                index_name: index_name.into(),
                role,
            }),
            None => return Err(SchemaError::KeyOnNonKeyType(tag)),
        }
        Ok(self)
    }

    /// Flags a Number field as the optimistic-concurrency version counter.
    pub fn version_attribute(mut self) -> Result<Self, SchemaError> {
        match &mut self {
            SchemaNode::Number {
                version_attribute, ..
            } => *version_attribute = true,
            other => return Err(SchemaError::VersionOnNonNumber(other.node_tag())),
        }
        Ok(self)
    }
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder {
            members: BTreeMap::new(),
        }
    }

    pub fn members(&self) -> &BTreeMap<String, SchemaNode> {
        &self.members
    }

    pub fn get(&self, field: &str) -> Option<&SchemaNode> {
        self.members.get(field)
    }

    /// The wire attribute name of a field: the override if present,
    /// otherwise the field name itself.
    pub fn attribute_name_of<'a>(&self, field: &'a str, node: &'a SchemaNode) -> &'a str {
        node.options().attribute_name.as_deref().unwrap_or(field)
    }

    /// The field flagged as the version attribute, with its wire name.
    pub fn version_attribute(&self) -> Option<(&str, &str)> {
        self.members.iter().find_map(|(field, node)| {
            if node.is_version_attribute() {
                Some((field.as_str(), self.attribute_name_of(field, node)))
            } else {
                None
            }
        })
    }

    /// Resolves the table key schema. None when no key is declared at all;
    /// an error when a sort key exists without a partition key.
    pub fn key_schema(&self) -> Result<Option<KeySchema>, SchemaError> {
        let mut partition: Option<KeyAttribute> = None;
        let mut sort: Option<KeyAttribute> = None;
        for (field, node) in &self.members {
            let Some(keys) = node.key_info() else {
                continue;
            };
            let attr = KeyAttribute {
                name: self.attribute_name_of(field, node).to_string(),
                field: field.to_string(),
                kind: node.key_wire_type(),
            };
            match keys.key {
                Some(KeyRole::Partition) => partition = Some(attr),
                Some(KeyRole::Sort) => sort = Some(attr),
                None => {}
            }
        }
        match (partition, sort) {
            (Some(p), s) => Ok(Some(KeySchema {
                partition: p,
                sort: s,
            })),
            (None, Some(s)) => Err(SchemaError::SortKeyWithoutPartitionKey(s.field)),
            (None, None) => Ok(None),
        }
    }

    /// Like `key_schema`, but an undeclared key schema is an error. Used by
    /// operations that address single items.
    pub fn required_key_schema(&self) -> Result<KeySchema, SchemaError> {
        self.key_schema()?.ok_or(SchemaError::NoPartitionKey)
    }

    /// The key attributes of the named index, if any are declared.
    pub fn index_key_schema(&self, index_name: &str) -> Option<KeySchema> {
        let mut partition: Option<KeyAttribute> = None;
        let mut sort: Option<KeyAttribute> = None;
        for (field, node) in &self.members {
            let Some(keys) = node.key_info() else {
                continue;
            };
            for ik in &keys.index_keys {
                if ik.index_name != index_name {
                    continue;
                }
                let attr = KeyAttribute {
                    name: self.attribute_name_of(field, node).to_string(),
                    field: field.to_string(),
                    kind: node.key_wire_type(),
                };
                match ik.role {
                    KeyRole::Partition => partition = Some(attr),
                    KeyRole::Sort => sort = Some(attr),
                }
            }
        }
        partition.map(|p| KeySchema {
            partition: p,
            sort,
        })
    }
}

impl SchemaBuilder {
    /// Adds one field. Re-adding a field name replaces the earlier node.
    pub fn field(mut self, name: impl Into<String>, node: SchemaNode) -> Self {
        self.members.insert(name.into(), node);
        self
    }

    /// Validates the accumulated fields and freezes them into a `Schema`.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let schema = Schema {
            members: self.members,
        };
        validate(&schema)?;
        Ok(schema)
    }
}

/* =================================================
Public functions
================================================= */

/// Check that a marshalled item carries the key attributes the schema
/// declares, with the wire types key marshalling produces.
pub fn validate_item_keys(attrs: &Item, schema: &Schema) -> Result<(), SchemaError> {
    let ks = schema.required_key_schema()?;
    validate_key_attribute(&ks.partition, attrs)?;
    if let Some(sk) = &ks.sort {
        validate_key_attribute(sk, attrs)?;
    }
    Ok(())
}

/* =================================================
Private functions
================================================= */

fn validate_key_attribute(key: &KeyAttribute, attrs: &Item) -> Result<(), SchemaError> {
    let attrval = attrs
        .get(&key.name)
        .ok_or_else(|| SchemaError::MissingKeyAttribute(key.name.clone()))?;
    match key.kind {
        Some(KeyAttributeType::S) => {
            if attrval.as_s().is_err() {
                return Err(SchemaError::KeyTypeMismatch {
                    name: key.name.clone(),
                    expected: KeyAttributeType::S,
                });
            }
        }
        Some(KeyAttributeType::N) => {
            if attrval.as_n().is_err() {
                return Err(SchemaError::KeyTypeMismatch {
                    name: key.name.clone(),
                    expected: KeyAttributeType::N,
                });
            }
        }
        Some(KeyAttributeType::B) => {
            if attrval.as_b().is_err() {
                return Err(SchemaError::KeyTypeMismatch {
                    name: key.name.clone(),
                    expected: KeyAttributeType::B,
                });
            }
        }
        // Custom key fields produce whatever their closure produces.
        None => {}
    }
    Ok(())
}

fn validate(schema: &Schema) -> Result<(), SchemaError> {
    let mut partition: Option<&str> = None;
    let mut sort: Option<&str> = None;
    let mut index_roles: Vec<(String, KeyRole, String)> = vec![];

    for (field, node) in schema.members() {
        if let Some(keys) = node.key_info() {
            match keys.key {
                Some(KeyRole::Partition) => {
                    if let Some(first) = partition {
                        return Err(SchemaError::DuplicatePartitionKey(
                            first.to_string(),
                            field.to_string(),
                        ));
                    }
                    partition = Some(field);
                }
                Some(KeyRole::Sort) => {
                    if let Some(first) = sort {
                        return Err(SchemaError::DuplicateSortKey(
                            first.to_string(),
                            field.to_string(),
                        ));
                    }
                    sort = Some(field);
                }
                None => {}
            }
            for ik in &keys.index_keys {
                if let Some((_, _, first)) = index_roles
                    .iter()
                    .find(|(name, role, _)| name == &ik.index_name && *role == ik.role)
                {
                    return Err(SchemaError::DuplicateIndexKey {
                        index_name: ik.index_name.clone(),
                        role: ik.role,
                        first: first.to_string(),
                        second: field.to_string(),
                    });
                }
                index_roles.push((ik.index_name.clone(), ik.role, field.to_string()));
            }
        }

        // nested structures are validated recursively
        match node {
            SchemaNode::Document { members, .. } => validate(members)?,
            SchemaNode::Tuple { members, .. } => {
                for member in members {
                    validate_nested(member)?;
                }
            }
            SchemaNode::List { member, .. } | SchemaNode::Map { member, .. } => {
                validate_nested(member)?;
            }
            _ => {}
        }
    }

    if partition.is_none() {
        if let Some(sk) = sort {
            return Err(SchemaError::SortKeyWithoutPartitionKey(sk.to_string()));
        }
    }

    Ok(())
}

fn validate_nested(node: &SchemaNode) -> Result<(), SchemaError> {
    match node {
        SchemaNode::Document { members, .. } => validate(members),
        SchemaNode::Tuple { members, .. } => {
            for member in members {
                validate_nested(member)?;
            }
            Ok(())
        }
        SchemaNode::List { member, .. } | SchemaNode::Map { member, .. } => validate_nested(member),
        _ => Ok(()),
    }
}

/* =================================================
Unit tests
================================================= */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AttributeValue;
    use std::collections::HashMap;

    fn sample_schema() -> Schema {
        Schema::builder()
            .field("id", string().partition_key().unwrap())
            .field(
                "createdAt",
                date().sort_key().unwrap().attribute_name("created_at"),
            )
            .field("version", number().version_attribute().unwrap())
            .field("tags", set(SetMemberType::String))
            .build()
            .unwrap()
    }

    #[test]
    fn test_key_schema_resolution() {
        let ks = sample_schema().required_key_schema().unwrap();
        assert_eq!(ks.partition.name, "id");
        assert_eq!(ks.partition.kind, Some(KeyAttributeType::S));
        let sk = ks.sort.unwrap();
        // the wire name honors the attribute_name override
        assert_eq!(sk.name, "created_at");
        assert_eq!(sk.field, "createdAt");
        assert_eq!(sk.kind, Some(KeyAttributeType::N));
    }

    #[test]
    fn test_version_attribute_lookup() {
        let schema = sample_schema();
        assert_eq!(schema.version_attribute(), Some(("version", "version")));
    }

    #[test]
    fn test_key_on_non_key_type() {
        assert_eq!(
            boolean().partition_key().unwrap_err(),
            SchemaError::KeyOnNonKeyType("Boolean")
        );
        assert_eq!(
            list(string()).sort_key().unwrap_err(),
            SchemaError::KeyOnNonKeyType("List")
        );
    }

    #[test]
    fn test_version_on_non_number() {
        assert_eq!(
            string().version_attribute().unwrap_err(),
            SchemaError::VersionOnNonNumber("String")
        );
    }

    #[test]
    fn test_duplicate_partition_key_rejected() {
        let result = Schema::builder()
            .field("a", string().partition_key().unwrap())
            .field("b", number().partition_key().unwrap())
            .build();
        assert_eq!(
            result.unwrap_err(),
            SchemaError::DuplicatePartitionKey(String::from("a"), String::from("b"))
        );
    }

    #[test]
    fn test_sort_key_without_partition_key_rejected() {
        let result = Schema::builder()
            .field("s", string().sort_key().unwrap())
            .build();
        assert_eq!(
            result.unwrap_err(),
            SchemaError::SortKeyWithoutPartitionKey(String::from("s"))
        );
    }

    #[test]
    fn test_index_key_schema() {
        let schema = Schema::builder()
            .field("id", string().partition_key().unwrap())
            .field(
                "owner",
                string()
                    .index_key("byOwner", KeyRole::Partition)
                    .unwrap(),
            )
            .field(
                "createdAt",
                date().index_key("byOwner", KeyRole::Sort).unwrap(),
            )
            .build()
            .unwrap();
        let ks = schema.index_key_schema("byOwner").unwrap();
        assert_eq!(ks.partition.name, "owner");
        assert_eq!(ks.sort.unwrap().name, "createdAt");
        assert!(schema.index_key_schema("nope").is_none());
    }

    #[test]
    fn test_validate_item_keys() {
        let schema = sample_schema();
        let mut attrs: HashMap<String, AttributeValue> = HashMap::from([
            (
                String::from("id"),
                AttributeValue::S(String::from("item-1")),
            ),
            (
                String::from("created_at"),
                AttributeValue::N(String::from("1582050565")),
            ),
        ]);
        assert!(validate_item_keys(&attrs, &schema).is_ok());

        attrs.insert(
            String::from("created_at"),
            AttributeValue::S(String::from("not-a-number")),
        );
        assert_eq!(
            validate_item_keys(&attrs, &schema).unwrap_err(),
            SchemaError::KeyTypeMismatch {
                name: String::from("created_at"),
                expected: KeyAttributeType::N,
            }
        );

        attrs.remove("created_at");
        assert_eq!(
            validate_item_keys(&attrs, &schema).unwrap_err(),
            SchemaError::MissingKeyAttribute(String::from("created_at"))
        );
    }
}
