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

use bytes::Bytes;

/// A set of byte buffers with membership decided by byte-for-byte equality,
/// matching the `BS` attribute type. Insertion order is preserved so that
/// marshalled output is deterministic; duplicates are dropped on insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinarySet {
    members: Vec<Bytes>,
}

impl BinarySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a buffer, returning false when an equal buffer is already a
    /// member (the set is left unchanged in that case).
    pub fn insert(&mut self, value: impl Into<Bytes>) -> bool {
        let value = value.into();
        if self.contains(&value) {
            false
        } else {
            self.members.push(value);
            true
        }
    }

    pub fn contains(&self, value: &[u8]) -> bool {
        self.members.iter().any(|m| m.as_ref() == value)
    }

    pub fn remove(&mut self, value: &[u8]) -> bool {
        match self.members.iter().position(|m| m.as_ref() == value) {
            Some(idx) => {
                self.members.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bytes> {
        self.members.iter()
    }

    /// True when any member is a zero-length buffer. Used by the marshaller
    /// when applying the empty-value policy.
    pub fn has_empty_member(&self) -> bool {
        self.members.iter().any(|m| m.is_empty())
    }
}

impl FromIterator<Bytes> for BinarySet {
    fn from_iter<I: IntoIterator<Item = Bytes>>(iter: I) -> Self {
        let mut set = Self::new();
        for b in iter {
            set.insert(b);
        }
        set
    }
}

impl<'a> IntoIterator for &'a BinarySet {
    type Item = &'a Bytes;
    type IntoIter = std::slice::Iter<'a, Bytes>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}

impl IntoIterator for BinarySet {
    type Item = Bytes;
    type IntoIter = std::vec::IntoIter<Bytes>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.into_iter()
    }
}

impl From<Vec<Bytes>> for BinarySet {
    fn from(v: Vec<Bytes>) -> Self {
        v.into_iter().collect()
    }
}
