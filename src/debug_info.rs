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

//! `.loc`/`.file` emission and optional inline-source comments (§4.7).
//! This crate never touches the filesystem: the inline-source cache is
//! supplied pre-read by the driver (§5 "file reads for inline source
//! happen once per unique file and are cached").

use crate::ir::SourceLoc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Emits debug directives for a stream of source locations. The no-op
/// variant is used when `emit_debug_info` is off; the line-emitter variant
/// tracks file indices and the last-emitted location to avoid redundant
/// `.loc` lines.
pub enum DebugInfoSink {
    NoOp,
    LineEmitter(LineEmitter),
}

impl DebugInfoSink {
    pub fn noop() -> Self {
        DebugInfoSink::NoOp
    }

    pub fn line_emitter(inline_source: Option<HashMap<PathBuf, Vec<String>>>) -> Self {
        DebugInfoSink::LineEmitter(LineEmitter::new(inline_source, 0))
    }

    /// Like [`DebugInfoSink::line_emitter`], but file indices start at
    /// `base` instead of 0. The module assembler uses this to give each
    /// compiled method a disjoint slice of the module-wide `.file` table
    /// without having to rewrite already-emitted `.loc` lines.
    pub fn line_emitter_with_base(inline_source: Option<HashMap<PathBuf, Vec<String>>>, base: usize) -> Self {
        DebugInfoSink::LineEmitter(LineEmitter::new(inline_source, base))
    }

    /// Count of distinct files this sink has assigned an index to so far,
    /// used by the caller to advance the next method's `base`.
    pub fn file_count(&self) -> usize {
        match self {
            DebugInfoSink::NoOp => 0,
            DebugInfoSink::LineEmitter(emitter) => emitter.files.len(),
        }
    }

    /// Called before lowering each IR node; returns the `.loc` line (plus
    /// an optional inline-source comment) if this location differs from
    /// the last one emitted, `None` otherwise.
    pub fn on_node(&mut self, loc: Option<&SourceLoc>) -> Option<String> {
        match self {
            DebugInfoSink::NoOp => None,
            DebugInfoSink::LineEmitter(emitter) => emitter.on_node(loc),
        }
    }

    /// `.file i "path"` declarations for every file index assigned so far,
    /// emitted once at end-of-module (§4.7).
    pub fn file_declarations(&self) -> Vec<String> {
        match self {
            DebugInfoSink::NoOp => Vec::new(),
            DebugInfoSink::LineEmitter(emitter) => emitter.file_declarations(),
        }
    }
}

pub struct LineEmitter {
    files: indexmap::IndexSet<PathBuf>,
    base: usize,
    last: Option<(PathBuf, u32, u32)>,
    inline_source: Option<HashMap<PathBuf, Vec<String>>>,
}

impl LineEmitter {
    fn new(inline_source: Option<HashMap<PathBuf, Vec<String>>>, base: usize) -> Self {
        LineEmitter {
            files: indexmap::IndexSet::new(),
            base,
            last: None,
            inline_source,
        }
    }

    fn file_index(&mut self, path: &Path) -> usize {
        if let Some(idx) = self.files.get_index_of(path) {
            return self.base + idx;
        }
        self.files.insert(path.to_path_buf());
        self.base + self.files.get_index_of(path).unwrap()
    }

    fn on_node(&mut self, loc: Option<&SourceLoc>) -> Option<String> {
        let loc = loc?;
        let changed = match &self.last {
            Some((path, line, column)) => {
                path != &loc.file || *line != loc.line || *column != loc.column
            }
            None => true,
        };
        if !changed {
            return None;
        }
        self.last = Some((loc.file.clone(), loc.line, loc.column));
        let index = self.file_index(&loc.file);
        let mut out = format!(".loc {} {} {}\n", index, loc.line, loc.column);
        if let Some(cache) = &self.inline_source {
            if let Some(lines) = cache.get(&loc.file) {
                if let Some(text) = lines.get((loc.line.saturating_sub(1)) as usize) {
                    out.push_str("// ");
                    out.push_str(text);
                    out.push('\n');
                }
            }
        }
        Some(out)
    }

    fn file_declarations(&self) -> Vec<String> {
        self.files
            .iter()
            .enumerate()
            .map(|(i, path)| format!(".file {} \"{}\"\n", self.base + i, path.display()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(file: &str, line: u32, column: u32) -> SourceLoc {
        SourceLoc {
            file: PathBuf::from(file),
            line,
            column,
        }
    }

    #[test]
    fn noop_sink_never_emits() {
        let mut sink = DebugInfoSink::noop();
        assert_eq!(sink.on_node(Some(&loc("a.cs", 1, 1))), None);
    }

    #[test]
    fn line_emitter_skips_repeated_location() {
        let mut sink = DebugInfoSink::line_emitter(None);
        let first = sink.on_node(Some(&loc("a.cs", 4, 2)));
        assert!(first.is_some());
        let second = sink.on_node(Some(&loc("a.cs", 4, 2)));
        assert_eq!(second, None);
        let third = sink.on_node(Some(&loc("a.cs", 5, 2)));
        assert!(third.is_some());
    }

    #[test]
    fn file_indices_assigned_monotonically() {
        let mut sink = DebugInfoSink::line_emitter(None);
        sink.on_node(Some(&loc("a.cs", 1, 1)));
        sink.on_node(Some(&loc("b.cs", 1, 1)));
        let decls = sink.file_declarations();
        assert_eq!(decls[0], ".file 0 \"a.cs\"\n");
        assert_eq!(decls[1], ".file 1 \"b.cs\"\n");
    }

    #[test]
    fn inline_source_appends_comment_from_cache() {
        let mut cache = HashMap::new();
        cache.insert(PathBuf::from("a.cs"), vec!["int x = 1;".to_string()]);
        let mut sink = DebugInfoSink::line_emitter(Some(cache));
        let out = sink.on_node(Some(&loc("a.cs", 1, 1))).unwrap();
        assert!(out.contains("// int x = 1;"));
    }
}
