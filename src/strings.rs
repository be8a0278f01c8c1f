// BSD 3-Clause License
//
// Copyright © 2020-2021 Keegan Saunders
// Copyright © 2020 VTIL Project
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this
//    list of conditions and the following disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice,
//    this list of conditions and the following disclaimer in the documentation
//    and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its
//    contributors may be used to endorse or promote products derived from
//    this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS"
// AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED TO, THE
// IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE
// FOR ANY DIRECT, INDIRECT, INCIDENTAL, SPECIAL, EXEMPLARY, OR CONSEQUENTIAL
// DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER
// CAUSED AND ON ANY THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY,
// OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE
// OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.
//

//! Module-wide string constant interning (§3 "String-constant pool", §4.4
//! "String constant", §8 property 9 "Idempotent string interning", §9
//! "Global constant interning").

use crate::ir::StringEncoding;
use indexmap::IndexMap;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StringSymbolId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Key {
    encoding_is_utf8: bool,
    bytes: Vec<u8>,
}

/// Additive, insertion-ordered interning table: (encoding, bytes) → symbol.
/// Backed by `IndexMap` so iteration order matches first-seen order, which
/// is what makes module output deterministic (§8 property 1) without a
/// second sort pass (§9 "Global constant interning").
#[derive(Debug, Default, Clone)]
pub struct StringPool {
    table: IndexMap<Key, StringSymbolId>,
    entries: Vec<(StringEncoding, Vec<u8>)>,
}

impl StringPool {
    pub fn new() -> Self {
        StringPool::default()
    }

    /// Interns `bytes` under `encoding`; returns the existing symbol if an
    /// equal (encoding, bytes) pair was already interned (§8 property 9).
    pub fn intern(&mut self, encoding: StringEncoding, bytes: Vec<u8>) -> StringSymbolId {
        let key = Key {
            encoding_is_utf8: matches!(encoding, StringEncoding::Utf8),
            bytes: bytes.clone(),
        };
        if let Some(existing) = self.table.get(&key) {
            trace!(symbol = existing.0, "string constant already interned");
            return *existing;
        }
        let id = StringSymbolId(self.entries.len() as u32);
        self.entries.push((encoding, bytes));
        self.table.insert(key, id);
        trace!(symbol = id.0, "interned new string constant");
        id
    }

    pub fn symbol_name(&self, id: StringSymbolId) -> String {
        format!("$str{}", id.0)
    }

    /// Iterates interned strings in first-seen order, for `.global`
    /// declaration emission (§6 artifact layout line 5).
    pub fn iter(&self) -> impl Iterator<Item = (StringSymbolId, &StringEncoding, &[u8])> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, (enc, bytes))| (StringSymbolId(i as u32), enc, bytes.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merges `others` (in caller-supplied, e.g. method-index, order) into
    /// a single pool, remapping each source symbol id to its slot in the
    /// merged pool (§5.1 "canonicalizes symbol names by first-seen order
    /// across a caller-supplied ordering").
    pub fn merge(others: &[StringPool]) -> (StringPool, Vec<Vec<StringSymbolId>>) {
        let mut merged = StringPool::new();
        let mut remaps = Vec::with_capacity(others.len());
        for pool in others {
            let mut remap = Vec::with_capacity(pool.entries.len());
            for (_, encoding, bytes) in pool.iter() {
                remap.push(merged.intern(*encoding, bytes.to_vec()));
            }
            remaps.push(remap);
        }
        (merged, remaps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_equal_bytes_shares_symbol() {
        let mut pool = StringPool::new();
        let a = pool.intern(StringEncoding::Utf8, b"hello".to_vec());
        let b = pool.intern(StringEncoding::Utf8, b"hello".to_vec());
        assert_eq!(a, b);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn interning_different_bytes_gets_distinct_symbols() {
        let mut pool = StringPool::new();
        let a = pool.intern(StringEncoding::Utf8, b"hello".to_vec());
        let b = pool.intern(StringEncoding::Utf8, b"world".to_vec());
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn encoding_participates_in_identity() {
        let mut pool = StringPool::new();
        let a = pool.intern(StringEncoding::Ascii, b"hi".to_vec());
        let b = pool.intern(StringEncoding::Utf8, b"hi".to_vec());
        assert_ne!(a, b);
    }

    #[test]
    fn merge_preserves_caller_supplied_order() {
        let mut first = StringPool::new();
        first.intern(StringEncoding::Utf8, b"b".to_vec());
        let mut second = StringPool::new();
        second.intern(StringEncoding::Utf8, b"a".to_vec());
        second.intern(StringEncoding::Utf8, b"b".to_vec());

        let (merged, remaps) = StringPool::merge(&[first, second]);
        assert_eq!(merged.len(), 2);
        assert_eq!(remaps[0][0].0, 0);
        assert_eq!(remaps[1][1].0, 0);
        assert_eq!(remaps[1][0].0, 1);
    }
}
