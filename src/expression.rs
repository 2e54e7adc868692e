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

// Wire-safe expression building. Attribute names and values never appear
// verbatim in expression strings; they pass through the substitution
// accumulator and come out as "#attrN" / ":valN" placeholders backed by the
// ExpressionAttributeNames / ExpressionAttributeValues maps.

use crate::data::AttributeValue;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter, Write as _};
use std::str::FromStr;

/* =================================================
struct / enum / const
================================================= */

/// One step of an attribute path: a named attribute or a list index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathElement {
    Attribute(String),
    Index(u32),
}

/// A parsed document path such as `foo.bar[3].baz`.
///
/// Identifiers may contain `.`, `[`, and `\` when escaped with a backslash;
/// list indices are decimal digits in brackets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePath {
    elements: Vec<PathElement>,
}

#[derive(Debug, PartialEq)]
pub enum PathError {
    /// A zero-length identifier (leading dot, doubled dot, empty input).
    EmptySegment { position: usize },
    /// Something other than a decimal digit between brackets.
    InvalidIndexCharacter { found: char, position: usize },
    /// An opening bracket without its closing bracket.
    UnterminatedIndex { position: usize },
    /// An identifier directly after `]` with no `.` separator.
    MissingSeparator { position: usize },
    /// A backslash at the end of the input.
    UnexpectedEndOfEscape { position: usize },
    /// A path beginning with a list index.
    LeadingIndex,
}

impl Display for PathError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PathError::EmptySegment { position } => {
                write!(f, "empty path segment at offset {}", position)
            }
            PathError::InvalidIndexCharacter { found, position } => {
                write!(
                    f,
                    "invalid character '{}' in list index at offset {}",
                    found, position
                )
            }
            PathError::UnterminatedIndex { position } => {
                write!(f, "unterminated list index starting at offset {}", position)
            }
            PathError::MissingSeparator { position } => {
                write!(
                    f,
                    "expected '.' or '[' after list index at offset {}",
                    position
                )
            }
            PathError::UnexpectedEndOfEscape { position } => {
                write!(f, "dangling escape character at offset {}", position)
            }
            PathError::LeadingIndex => {
                write!(f, "attribute paths must begin with an attribute name")
            }
        }
    }
}

impl std::error::Error for PathError {}

/// Accumulates substitutions for one expression-bearing request. A single
/// counter is shared between names and values; equal attribute names map to
/// the same "#attrN", values are never deduplicated.
#[derive(Debug, Default)]
pub struct ExpressionAttributes {
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
    name_ids: HashMap<String, String>,
    counter: usize,
}

/// An operand of a comparison or function: a document path, a literal
/// value, or a nested function/arithmetic expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Path(AttributePath),
    Value(AttributeValue),
    Function(Box<FunctionExpression>),
    Arithmetic(Box<ArithmeticExpression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionExpression {
    /// size(path)
    Size(AttributePath),
    /// if_not_exists(path, fallback)
    IfNotExists(AttributePath, Operand),
    /// list_append(lhs, rhs)
    ListAppend(Operand, Operand),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ArithmeticOperator {
    Add,
    Subtract,
}

/// `lhs + rhs` / `lhs - rhs`, legal on the right side of a SET action.
#[derive(Debug, Clone, PartialEq)]
pub struct ArithmeticExpression {
    pub lhs: Operand,
    pub operator: ArithmeticOperator,
    pub rhs: Operand,
}

/// A condition usable in key conditions, filters, and condition
/// expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionExpression {
    Equals(Operand, Operand),
    NotEquals(Operand, Operand),
    LessThan(Operand, Operand),
    LessThanOrEqualTo(Operand, Operand),
    GreaterThan(Operand, Operand),
    GreaterThanOrEqualTo(Operand, Operand),
    Between {
        subject: Operand,
        lower: Operand,
        upper: Operand,
    },
    In {
        subject: Operand,
        candidates: Vec<Operand>,
    },
    AttributeExists(AttributePath),
    AttributeNotExists(AttributePath),
    /// attribute_type(path, :tag) with the single-letter wire tag.
    AttributeType(AttributePath, &'static str),
    BeginsWith(AttributePath, Operand),
    Contains(AttributePath, Operand),
    And(Vec<ConditionExpression>),
    Or(Vec<ConditionExpression>),
    Not(Box<ConditionExpression>),
}

/// The four clauses of an UpdateExpression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateExpression {
    set_actions: Vec<(AttributePath, Operand)>,
    remove_actions: Vec<AttributePath>,
    add_actions: Vec<(AttributePath, AttributeValue)>,
    delete_actions: Vec<(AttributePath, AttributeValue)>,
}

/// A list of paths serialized into a ProjectionExpression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionExpression {
    paths: Vec<AttributePath>,
}

/* =================================================
impl
================================================= */

impl AttributePath {
    pub fn new(elements: Vec<PathElement>) -> Self {
        Self { elements }
    }

    /// A single-attribute path, bypassing the parser (and therefore any
    /// need to escape the name).
    pub fn attribute(name: impl Into<String>) -> Self {
        Self {
            elements: vec![PathElement::Attribute(name.into())],
        }
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    /// Parses the dotted path syntax. Escapes: `\.`, `\[`, and `\\` keep
    /// their literal character inside an identifier.
    pub fn parse(input: &str) -> Result<Self, PathError> {
        let mut elements: Vec<PathElement> = vec![];
        let mut current = String::new();
        let mut segment_start = 0usize;
        // true right after a "]"; only '.', '[' or end-of-input may follow
        let mut after_index = false;

        let mut iter = input.char_indices();
        while let Some((pos, ch)) = iter.next() {
            match ch {
                '\\' => {
                    if after_index {
                        return Err(PathError::MissingSeparator { position: pos });
                    }
                    match iter.next() {
                        Some((_, escaped)) => current.push(escaped),
                        None => {
                            return Err(PathError::UnexpectedEndOfEscape { position: pos });
                        }
                    }
                }
                '.' => {
                    if after_index {
                        // "foo[1].bar" - the dot ends the index element
                        after_index = false;
                        segment_start = pos + 1;
                        continue;
                    }
                    if current.is_empty() {
                        return Err(PathError::EmptySegment {
                            position: segment_start,
                        });
                    }
                    elements.push(PathElement::Attribute(std::mem::take(&mut current)));
                    segment_start = pos + 1;
                }
                '[' => {
                    if !current.is_empty() {
                        elements.push(PathElement::Attribute(std::mem::take(&mut current)));
                    } else if !after_index {
                        // "[0]..." or "foo..[0]" has no identifier to index into
                        if elements.is_empty() {
                            return Err(PathError::LeadingIndex);
                        }
                        if !matches!(elements.last(), Some(PathElement::Index(_))) {
                            return Err(PathError::EmptySegment {
                                position: segment_start,
                            });
                        }
                    }
                    after_index = false;
                    let mut digits = String::new();
                    let mut closed = false;
                    for (ipos, ich) in iter.by_ref() {
                        match ich {
                            ']' => {
                                closed = true;
                                break;
                            }
                            '0'..='9' => digits.push(ich),
                            other => {
                                return Err(PathError::InvalidIndexCharacter {
                                    found: other,
                                    position: ipos,
                                });
                            }
                        }
                    }
                    if !closed {
                        return Err(PathError::UnterminatedIndex { position: pos });
                    }
                    if digits.is_empty() {
                        return Err(PathError::InvalidIndexCharacter {
                            found: ']',
                            position: pos,
                        });
                    }
                    elements.push(PathElement::Index(digits.parse::<u32>().map_err(|_| {
                        PathError::InvalidIndexCharacter {
                            found: ']',
                            position: pos,
                        }
                    })?));
                    after_index = true;
                }
                other => {
                    if after_index {
                        return Err(PathError::MissingSeparator { position: pos });
                    }
                    current.push(other);
                }
            }
        }

        if !current.is_empty() {
            elements.push(PathElement::Attribute(current));
        } else if !after_index {
            return Err(PathError::EmptySegment {
                position: segment_start,
            });
        }

        Ok(Self { elements })
    }
}

impl FromStr for AttributePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, PathError> {
        Self::parse(s)
    }
}

/// Re-serializes with the escapes the parser accepts, so that
/// `parse(path.to_string())` round-trips.
impl Display for AttributePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, element) in self.elements.iter().enumerate() {
            match element {
                PathElement::Attribute(name) => {
                    if i > 0 {
                        f.write_char('.')?;
                    }
                    for ch in name.chars() {
                        if matches!(ch, '.' | '[' | '\\') {
                            f.write_char('\\')?;
                        }
                        f.write_char(ch)?;
                    }
                }
                PathElement::Index(n) => write!(f, "[{}]", n)?,
            }
        }
        Ok(())
    }
}

impl ExpressionAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Substitute one attribute name. The same name always returns the same
    /// placeholder within one accumulator.
    pub fn add_name(&mut self, name: &str) -> String {
        if let Some(existing) = self.name_ids.get(name) {
            return existing.clone();
        }
        let placeholder = format!("#attr{}", self.counter);
        self.counter += 1;
        self.names.insert(placeholder.clone(), name.to_string());
        self.name_ids.insert(name.to_string(), placeholder.clone());
        placeholder
    }

    /// Substitute one value. Values are intentionally never deduplicated.
    pub fn add_value(&mut self, value: AttributeValue) -> String {
        let placeholder = format!(":val{}", self.counter);
        self.counter += 1;
        self.values.insert(placeholder.clone(), value);
        placeholder
    }

    /// Substitute a whole path: `foo.bar[3]` becomes `#attr0.#attr1[3]`.
    pub fn add_path(&mut self, path: &AttributePath) -> String {
        let mut out = String::new();
        for (i, element) in path.elements().iter().enumerate() {
            match element {
                PathElement::Attribute(name) => {
                    if i > 0 {
                        out.push('.');
                    }
                    out.push_str(&self.add_name(name));
                }
                PathElement::Index(n) => {
                    let _ = write!(out, "[{}]", n);
                }
            }
        }
        out
    }

    pub fn names(&self) -> &HashMap<String, String> {
        &self.names
    }

    pub fn values(&self) -> &HashMap<String, AttributeValue> {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.values.is_empty()
    }

    /// The (names, values) maps ready to be attached to a request. Empty
    /// maps come back as None, matching the optional wire fields.
    pub fn into_parts(
        self,
    ) -> (
        Option<HashMap<String, String>>,
        Option<HashMap<String, AttributeValue>>,
    ) {
        let names = if self.names.is_empty() {
            None
        } else {
            Some(self.names)
        };
        let values = if self.values.is_empty() {
            None
        } else {
            Some(self.values)
        };
        (names, values)
    }
}

impl Operand {
    pub fn serialize(&self, attributes: &mut ExpressionAttributes) -> String {
        match self {
            Operand::Path(path) => attributes.add_path(path),
            Operand::Value(value) => attributes.add_value(value.clone()),
            Operand::Function(func) => func.serialize(attributes),
            Operand::Arithmetic(arith) => arith.serialize(attributes),
        }
    }
}

impl From<AttributePath> for Operand {
    fn from(path: AttributePath) -> Self {
        Operand::Path(path)
    }
}

impl From<AttributeValue> for Operand {
    fn from(value: AttributeValue) -> Self {
        Operand::Value(value)
    }
}

impl FunctionExpression {
    pub fn serialize(&self, attributes: &mut ExpressionAttributes) -> String {
        match self {
            FunctionExpression::Size(path) => {
                format!("size({})", attributes.add_path(path))
            }
            FunctionExpression::IfNotExists(path, fallback) => {
                let substituted = attributes.add_path(path);
                format!(
                    "if_not_exists({}, {})",
                    substituted,
                    fallback.serialize(attributes)
                )
            }
            FunctionExpression::ListAppend(lhs, rhs) => {
                let lhs = lhs.serialize(attributes);
                let rhs = rhs.serialize(attributes);
                format!("list_append({}, {})", lhs, rhs)
            }
        }
    }
}

impl ArithmeticExpression {
    pub fn serialize(&self, attributes: &mut ExpressionAttributes) -> String {
        let lhs = self.lhs.serialize(attributes);
        let rhs = self.rhs.serialize(attributes);
        let op = match self.operator {
            ArithmeticOperator::Add => "+",
            ArithmeticOperator::Subtract => "-",
        };
        format!("{} {} {}", lhs, op, rhs)
    }
}

impl ConditionExpression {
    /// Convenience constructor for `path = value` conditions.
    pub fn eq_value(path: AttributePath, value: AttributeValue) -> Self {
        ConditionExpression::Equals(Operand::Path(path), Operand::Value(value))
    }

    pub fn serialize(&self, attributes: &mut ExpressionAttributes) -> String {
        match self {
            ConditionExpression::Equals(lhs, rhs) => comparison(attributes, lhs, "=", rhs),
            ConditionExpression::NotEquals(lhs, rhs) => comparison(attributes, lhs, "<>", rhs),
            ConditionExpression::LessThan(lhs, rhs) => comparison(attributes, lhs, "<", rhs),
            ConditionExpression::LessThanOrEqualTo(lhs, rhs) => {
                comparison(attributes, lhs, "<=", rhs)
            }
            ConditionExpression::GreaterThan(lhs, rhs) => comparison(attributes, lhs, ">", rhs),
            ConditionExpression::GreaterThanOrEqualTo(lhs, rhs) => {
                comparison(attributes, lhs, ">=", rhs)
            }
            ConditionExpression::Between {
                subject,
                lower,
                upper,
            } => {
                let subject = subject.serialize(attributes);
                let lower = lower.serialize(attributes);
                let upper = upper.serialize(attributes);
                format!("{} BETWEEN {} AND {}", subject, lower, upper)
            }
            ConditionExpression::In {
                subject,
                candidates,
            } => {
                let subject = subject.serialize(attributes);
                let rendered = candidates
                    .iter()
                    .map(|c| c.serialize(attributes))
                    .collect::<Vec<String>>()
                    .join(", ");
                format!("{} IN ({})", subject, rendered)
            }
            ConditionExpression::AttributeExists(path) => {
                format!("attribute_exists({})", attributes.add_path(path))
            }
            ConditionExpression::AttributeNotExists(path) => {
                format!("attribute_not_exists({})", attributes.add_path(path))
            }
            ConditionExpression::AttributeType(path, tag) => {
                let substituted = attributes.add_path(path);
                let tag_placeholder =
                    attributes.add_value(AttributeValue::S((*tag).to_string()));
                format!("attribute_type({}, {})", substituted, tag_placeholder)
            }
            ConditionExpression::BeginsWith(path, prefix) => {
                let substituted = attributes.add_path(path);
                format!(
                    "begins_with({}, {})",
                    substituted,
                    prefix.serialize(attributes)
                )
            }
            ConditionExpression::Contains(path, operand) => {
                let substituted = attributes.add_path(path);
                format!(
                    "contains({}, {})",
                    substituted,
                    operand.serialize(attributes)
                )
            }
            ConditionExpression::And(conditions) => conditions
                .iter()
                .map(|c| format!("({})", c.serialize(attributes)))
                .collect::<Vec<String>>()
                .join(" AND "),
            ConditionExpression::Or(conditions) => conditions
                .iter()
                .map(|c| format!("({})", c.serialize(attributes)))
                .collect::<Vec<String>>()
                .join(" OR "),
            ConditionExpression::Not(condition) => {
                format!("NOT ({})", condition.serialize(attributes))
            }
        }
    }
}

impl UpdateExpression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: AttributePath, value: impl Into<Operand>) -> Self {
        self.set_actions.push((path, value.into()));
        self
    }

    pub fn remove(mut self, path: AttributePath) -> Self {
        self.remove_actions.push(path);
        self
    }

    pub fn add(mut self, path: AttributePath, value: AttributeValue) -> Self {
        self.add_actions.push((path, value));
        self
    }

    pub fn delete(mut self, path: AttributePath, value: AttributeValue) -> Self {
        self.delete_actions.push((path, value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set_actions.is_empty()
            && self.remove_actions.is_empty()
            && self.add_actions.is_empty()
            && self.delete_actions.is_empty()
    }

    pub fn serialize(&self, attributes: &mut ExpressionAttributes) -> String {
        let mut clauses: Vec<String> = vec![];
        if !self.set_actions.is_empty() {
            let actions = self
                .set_actions
                .iter()
                .map(|(path, operand)| {
                    let substituted = attributes.add_path(path);
                    format!("{} = {}", substituted, operand.serialize(attributes))
                })
                .collect::<Vec<String>>()
                .join(", ");
            clauses.push(format!("SET {}", actions));
        }
        if !self.remove_actions.is_empty() {
            let actions = self
                .remove_actions
                .iter()
                .map(|path| attributes.add_path(path))
                .collect::<Vec<String>>()
                .join(", ");
            clauses.push(format!("REMOVE {}", actions));
        }
        if !self.add_actions.is_empty() {
            let actions = self
                .add_actions
                .iter()
                .map(|(path, value)| {
                    let substituted = attributes.add_path(path);
                    format!("{} {}", substituted, attributes.add_value(value.clone()))
                })
                .collect::<Vec<String>>()
                .join(", ");
            clauses.push(format!("ADD {}", actions));
        }
        if !self.delete_actions.is_empty() {
            let actions = self
                .delete_actions
                .iter()
                .map(|(path, value)| {
                    let substituted = attributes.add_path(path);
                    format!("{} {}", substituted, attributes.add_value(value.clone()))
                })
                .collect::<Vec<String>>()
                .join(", ");
            clauses.push(format!("DELETE {}", actions));
        }
        clauses.join(" ")
    }
}

impl ProjectionExpression {
    pub fn new(paths: Vec<AttributePath>) -> Self {
        Self { paths }
    }

    pub fn serialize(&self, attributes: &mut ExpressionAttributes) -> String {
        self.paths
            .iter()
            .map(|path| attributes.add_path(path))
            .collect::<Vec<String>>()
            .join(", ")
    }
}

/* =================================================
Private functions
================================================= */

fn comparison(
    attributes: &mut ExpressionAttributes,
    lhs: &Operand,
    operator: &str,
    rhs: &Operand,
) -> String {
    let lhs = lhs.serialize(attributes);
    let rhs = rhs.serialize(attributes);
    format!("{} {} {}", lhs, operator, rhs)
}

/* =================================================
Unit tests
================================================= */

#[cfg(test)]
mod tests {
    use super::*;

    fn path(input: &str) -> AttributePath {
        AttributePath::parse(input).unwrap()
    }

    #[test]
    fn test_parse_simple_paths() {
        assert_eq!(
            path("foo").elements(),
            &[PathElement::Attribute(String::from("foo"))]
        );
        assert_eq!(
            path("foo.bar").elements(),
            &[
                PathElement::Attribute(String::from("foo")),
                PathElement::Attribute(String::from("bar")),
            ]
        );
        assert_eq!(
            path("foo[3].bar[0][1]").elements(),
            &[
                PathElement::Attribute(String::from("foo")),
                PathElement::Index(3),
                PathElement::Attribute(String::from("bar")),
                PathElement::Index(0),
                PathElement::Index(1),
            ]
        );
    }

    #[test]
    fn test_parse_escapes() {
        assert_eq!(
            path(r"odd\.name.bar").elements(),
            &[
                PathElement::Attribute(String::from("odd.name")),
                PathElement::Attribute(String::from("bar")),
            ]
        );
        assert_eq!(
            path(r"braces\[0\]").elements(),
            &[PathElement::Attribute(String::from("braces[0]"))]
        );
        assert_eq!(
            path(r"back\\slash").elements(),
            &[PathElement::Attribute(String::from(r"back\slash"))]
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            AttributePath::parse("foo[a]").unwrap_err(),
            PathError::InvalidIndexCharacter {
                found: 'a',
                position: 4,
            }
        );
        assert_eq!(
            AttributePath::parse("foo[1]bar").unwrap_err(),
            PathError::MissingSeparator { position: 6 }
        );
        assert_eq!(
            AttributePath::parse("foo..bar").unwrap_err(),
            PathError::EmptySegment { position: 4 }
        );
        assert_eq!(
            AttributePath::parse("foo[").unwrap_err(),
            PathError::UnterminatedIndex { position: 3 }
        );
        assert_eq!(
            AttributePath::parse("[0]").unwrap_err(),
            PathError::LeadingIndex
        );
        assert_eq!(
            AttributePath::parse("foo.").unwrap_err(),
            PathError::EmptySegment { position: 4 }
        );
        assert_eq!(
            AttributePath::parse("trailing\\").unwrap_err(),
            PathError::UnexpectedEndOfEscape { position: 8 }
        );
    }

    #[test]
    fn test_display_round_trip() {
        for input in ["foo", "foo.bar[3]", r"odd\.name", r"braces\[0\]", r"back\\slash"] {
            let parsed = path(input);
            assert_eq!(AttributePath::parse(&parsed.to_string()).unwrap(), parsed);
        }
    }

    #[test]
    fn test_add_name_is_idempotent() {
        let mut attrs = ExpressionAttributes::new();
        assert_eq!(attrs.add_name("x"), attrs.add_name("x"));
        assert_eq!(attrs.names().len(), 1);
    }

    #[test]
    fn test_values_are_never_deduplicated() {
        let mut attrs = ExpressionAttributes::new();
        let first = attrs.add_value(AttributeValue::N(String::from("1")));
        let second = attrs.add_value(AttributeValue::N(String::from("1")));
        assert_ne!(first, second);
        assert_eq!(attrs.values().len(), 2);
    }

    #[test]
    fn test_shared_counter_across_names_and_values() {
        let mut attrs = ExpressionAttributes::new();
        assert_eq!(attrs.add_name("a"), "#attr0");
        assert_eq!(attrs.add_value(AttributeValue::Bool(true)), ":val1");
        assert_eq!(attrs.add_name("b"), "#attr2");
    }

    #[test]
    fn test_path_substitution() {
        let mut attrs = ExpressionAttributes::new();
        assert_eq!(attrs.add_path(&path("foo.bar[3].baz")), "#attr0.#attr1[3].#attr2");
        // repeated names inside paths stay deduplicated
        assert_eq!(attrs.add_path(&path("foo[0]")), "#attr0[0]");
    }

    #[test]
    fn test_and_condition_serialization() {
        let condition = ConditionExpression::And(vec![
            ConditionExpression::GreaterThanOrEqualTo(
                Operand::Path(path("foo")),
                Operand::Value(AttributeValue::N(String::from("1"))),
            ),
            ConditionExpression::LessThan(
                Operand::Path(path("foo")),
                Operand::Value(AttributeValue::N(String::from("10"))),
            ),
            ConditionExpression::Equals(
                Operand::Path(path("fizz")),
                Operand::Value(AttributeValue::S(String::from("buzz"))),
            ),
        ]);

        let mut attrs = ExpressionAttributes::new();
        let serialized = condition.serialize(&mut attrs);
        assert_eq!(
            serialized,
            "(#attr0 >= :val1) AND (#attr0 < :val2) AND (#attr3 = :val4)"
        );
        assert_eq!(
            attrs.names(),
            &HashMap::from([
                (String::from("#attr0"), String::from("foo")),
                (String::from("#attr3"), String::from("fizz")),
            ])
        );
        assert_eq!(
            attrs.values(),
            &HashMap::from([
                (String::from(":val1"), AttributeValue::N(String::from("1"))),
                (String::from(":val2"), AttributeValue::N(String::from("10"))),
                (
                    String::from(":val4"),
                    AttributeValue::S(String::from("buzz"))
                ),
            ])
        );
    }

    #[test]
    fn test_function_conditions() {
        let mut attrs = ExpressionAttributes::new();
        let exists = ConditionExpression::AttributeNotExists(path("id"));
        assert_eq!(exists.serialize(&mut attrs), "attribute_not_exists(#attr0)");

        let mut attrs = ExpressionAttributes::new();
        let begins = ConditionExpression::BeginsWith(
            path("name"),
            Operand::Value(AttributeValue::S(String::from("dy"))),
        );
        assert_eq!(begins.serialize(&mut attrs), "begins_with(#attr0, :val1)");

        let mut attrs = ExpressionAttributes::new();
        let size_check = ConditionExpression::GreaterThan(
            Operand::Function(Box::new(FunctionExpression::Size(path("tags")))),
            Operand::Value(AttributeValue::N(String::from("0"))),
        );
        assert_eq!(size_check.serialize(&mut attrs), "size(#attr0) > :val1");
    }

    #[test]
    fn test_between_and_in() {
        let mut attrs = ExpressionAttributes::new();
        let between = ConditionExpression::Between {
            subject: Operand::Path(path("age")),
            lower: Operand::Value(AttributeValue::N(String::from("10"))),
            upper: Operand::Value(AttributeValue::N(String::from("99"))),
        };
        assert_eq!(
            between.serialize(&mut attrs),
            "#attr0 BETWEEN :val1 AND :val2"
        );

        let mut attrs = ExpressionAttributes::new();
        let contained = ConditionExpression::In {
            subject: Operand::Path(path("state")),
            candidates: vec![
                Operand::Value(AttributeValue::S(String::from("pending"))),
                Operand::Value(AttributeValue::S(String::from("active"))),
            ],
        };
        assert_eq!(contained.serialize(&mut attrs), "#attr0 IN (:val1, :val2)");
    }

    #[test]
    fn test_update_expression_serialization() {
        let update = UpdateExpression::new()
            .set(
                path("Price"),
                Operand::Function(Box::new(FunctionExpression::IfNotExists(
                    path("Price"),
                    Operand::Value(AttributeValue::N(String::from("123"))),
                ))),
            )
            .remove(path("Brand"))
            .remove(path("RelatedItems[1]"));

        let mut attrs = ExpressionAttributes::new();
        assert_eq!(
            update.serialize(&mut attrs),
            "SET #attr0 = if_not_exists(#attr0, :val1) REMOVE #attr2, #attr3[1]"
        );
        assert_eq!(attrs.names()["#attr0"], "Price");
        assert_eq!(attrs.names()["#attr2"], "Brand");
        assert_eq!(attrs.names()["#attr3"], "RelatedItems");
    }

    #[test]
    fn test_version_increment_expression() {
        let update = UpdateExpression::new().set(
            path("version"),
            Operand::Arithmetic(Box::new(ArithmeticExpression {
                lhs: Operand::Path(path("version")),
                operator: ArithmeticOperator::Add,
                rhs: Operand::Value(AttributeValue::N(String::from("1"))),
            })),
        );
        let mut attrs = ExpressionAttributes::new();
        assert_eq!(
            update.serialize(&mut attrs),
            "SET #attr0 = #attr0 + :val1"
        );
    }

    #[test]
    fn test_projection_expression() {
        let projection = ProjectionExpression::new(vec![
            path("id"),
            path("meta.owner"),
            path("history[0]"),
        ]);
        let mut attrs = ExpressionAttributes::new();
        assert_eq!(
            projection.serialize(&mut attrs),
            "#attr0, #attr1.#attr2, #attr3[0]"
        );
    }
}
