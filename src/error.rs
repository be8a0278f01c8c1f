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

use crate::types::{ElementType, OpKind};
use thiserror::Error;

/// Architecture version, carried purely for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchVersion {
    pub major: u32,
    pub minor: u32,
}

impl std::fmt::Display for ArchVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "sm_{}{}", self.major, self.minor)
    }
}

/// Errors raised while lowering IR to PTX text.
///
/// Each variant is a distinct, named tag so callers can route on it. No
/// error is ever recovered from locally: it is raised at the point of
/// detection, the in-progress method's buffer is dropped, and the error is
/// surfaced to the driver. There are no retries.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// The opcode table has no entry for this (operation, type) pair.
    #[error("unsupported operation {op:?} for type {ty:?}")]
    UnsupportedOperation { op: OpKind, ty: ElementType },

    /// An opcode table entry exists but the capability gate denies it.
    #[error("operation {op:?} for type {ty:?} is not supported on architecture {arch}")]
    UnsupportedOnArchitecture {
        op: OpKind,
        ty: ElementType,
        arch: ArchVersion,
    },

    /// Inputs violate a documented precondition (e.g. a predicate where an
    /// int32 was expected).
    #[error("invalid IR: {0}")]
    InvalidIr(String),

    /// The architecture is below the minimum supported, or otherwise unmapped.
    #[error("unknown or unsupported architecture sm_{major}{minor}")]
    UnknownArchitecture { major: u32, minor: u32 },

    /// A debug-time assertion; indicates a bug in this backend, not the
    /// input IR.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

pub type Result<T> = std::result::Result<T, CodegenError>;
