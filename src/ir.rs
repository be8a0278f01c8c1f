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

//! The IR contract (§3.1, §6): concrete, owned data shapes the driver
//! builds and hands to this backend. The IR itself is an external
//! collaborator — this module only defines the shapes it must take, the
//! same way the teacher crate's `parse.rs`/`pod.rs` define owned
//! `Instruction`/`BasicBlock`/`Routine` shapes rather than exposing a
//! trait-polymorphic reader.

use crate::register::{Dimension, IntrinsicKind};
use crate::types::{AtomicOp, BinaryOp, CompareOp, ElementType, TernaryOp, UnaryOp};
use std::path::PathBuf;

/// A type in the method's type model (§6: "a type model exposing element
/// types, pointer types with address space, structure types with field
/// offsets and alignments, array types with element type and length").
#[derive(Debug, Clone, PartialEq)]
pub enum IrType {
    Void,
    Primitive(ElementType),
    Pointer {
        space: crate::types::AddressSpace,
        pointee: Box<IrType>,
    },
    Struct {
        fields: Vec<IrType>,
        offsets: Vec<u32>,
        align: u32,
    },
    Array {
        element: Box<IrType>,
        len: u32,
    },
}

impl IrType {
    pub fn pointer(space: crate::types::AddressSpace, pointee: IrType) -> IrType {
        IrType::Pointer {
            space,
            pointee: Box::new(pointee),
        }
    }

    pub fn array(element: IrType, len: u32) -> IrType {
        IrType::Array {
            element: Box::new(element),
            len,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, IrType::Void)
    }

    /// A safe lower-bound alignment for a value of this type, used as the
    /// fallback the pointer-alignment oracle may fall back on (§4.2 "minimum
    /// alignment of the element type is the safe fallback").
    pub fn natural_alignment(&self, pointer_width_bytes: u32) -> u32 {
        match self {
            IrType::Void => 1,
            IrType::Primitive(e) => e.byte_size().max(1),
            IrType::Pointer { .. } => pointer_width_bytes,
            IrType::Struct { align, .. } => *align,
            IrType::Array { element, .. } => element.natural_alignment(pointer_width_bytes),
        }
    }

    /// Total size in bytes, used to lay out local allocas and compute
    /// vectorizable field ranges.
    pub fn byte_size(&self, pointer_width_bytes: u32) -> u32 {
        match self {
            IrType::Void => 0,
            IrType::Primitive(e) => e.byte_size(),
            IrType::Pointer { .. } => pointer_width_bytes,
            IrType::Struct {
                fields,
                offsets,
                align,
            } => {
                let end = fields
                    .iter()
                    .zip(offsets)
                    .map(|(f, off)| off + f.byte_size(pointer_width_bytes))
                    .max()
                    .unwrap_or(0);
                round_up(end, *align)
            }
            IrType::Array { element, len } => element.byte_size(pointer_width_bytes) * len,
        }
    }
}

fn round_up(value: u32, align: u32) -> u32 {
    if align == 0 {
        return value;
    }
    (value + align - 1) / align * align
}

/// SSA value identifier: a table index into a method's value list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

/// Basic block identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BasicBlockId(pub u32);

/// A source location for optional `.loc` emission (§4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLoc {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    Ascii,
    Utf8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShuffleKind {
    Idx,
    Down,
    Up,
    Bfly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierScope {
    Warp,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateBarrierOp {
    PopCount,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemBarrierScope {
    Cta,
    Gl,
    Sys,
}

/// A compile-time-constant alignment is inlined directly; a dynamic one is
/// converted to pointer width before use (§4.4 `AlignTo`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentArg {
    Constant(u32),
    Dynamic(ValueId),
}

#[derive(Debug, Clone)]
pub enum InlinePtxFragment {
    Literal(String),
    Arg(ValueId),
}

/// The closed sum type of lowerable operations (§3.1, §4.4). Modeled as one
/// tagged union rather than an open class hierarchy, per the Design Notes
/// ("Polymorphic IR value visitor").
#[derive(Debug, Clone)]
pub enum NodeKind {
    Unary {
        op: UnaryOp,
        value: ValueId,
    },
    Binary {
        op: BinaryOp,
        lhs: ValueId,
        rhs: ValueId,
    },
    Ternary {
        op: TernaryOp,
        a: ValueId,
        b: ValueId,
        c: ValueId,
    },
    Compare {
        op: CompareOp,
        unordered: bool,
        lhs: ValueId,
        rhs: ValueId,
    },
    Convert {
        value: ValueId,
    },
    Select {
        cond: ValueId,
        if_true: ValueId,
        if_false: ValueId,
    },
    AtomicRmw {
        op: AtomicOp,
        space: crate::types::AddressSpace,
        addr: ValueId,
        operand: ValueId,
        result_used: bool,
    },
    AtomicCas {
        space: crate::types::AddressSpace,
        addr: ValueId,
        compare: ValueId,
        new_value: ValueId,
    },
    Load {
        space: crate::types::AddressSpace,
        addr: ValueId,
    },
    Store {
        space: crate::types::AddressSpace,
        addr: ValueId,
        value: ValueId,
    },
    AddressOfElement {
        base: ValueId,
        index: ValueId,
        element_size: u32,
    },
    AddressOfField {
        base: ValueId,
        offset: u32,
    },
    AlignTo {
        ptr: ValueId,
        alignment: AlignmentArg,
    },
    Null,
    StringConstant {
        text: Vec<u8>,
        encoding: StringEncoding,
    },
    BuildStruct {
        fields: Vec<ValueId>,
    },
    GetField {
        base: ValueId,
        index: usize,
    },
    SetField {
        base: ValueId,
        index: usize,
        value: ValueId,
    },
    Intrinsic {
        kind: IntrinsicKind,
        dim: Option<Dimension>,
    },
    DynamicSharedMemLen {
        element_size: u32,
    },
    Shuffle {
        kind: ShuffleKind,
        value: ValueId,
        delta: ValueId,
        /// `None` for a full-warp shuffle; `Some` for a sub-warp shuffle of
        /// the given width (§4.4 "Warp and sub-warp shuffle").
        width: Option<ValueId>,
    },
    Barrier {
        scope: BarrierScope,
    },
    PredicateBarrier {
        op: PredicateBarrierOp,
        predicate: ValueId,
    },
    MemoryBarrier {
        scope: MemBarrierScope,
    },
    InlinePtx {
        fragments: Vec<InlinePtxFragment>,
        output_addr: Option<ValueId>,
    },
    Call {
        target: String,
        args: Vec<ValueId>,
        returns_value: bool,
    },
    Phi {
        incoming: Vec<(BasicBlockId, ValueId)>,
    },
    /// §4.4.1 (open question #2): `Broadcast`/`WarpSizeValue` and any other
    /// node the upstream IR marks as deliberately unsupported. Carries the
    /// marker name through unchanged for diagnostics.
    Unsupported(&'static str),
}

#[derive(Debug, Clone)]
pub struct IrNode {
    pub id: ValueId,
    pub ty: IrType,
    pub kind: NodeKind,
    pub loc: Option<SourceLoc>,
}

#[derive(Debug, Clone)]
pub enum Terminator {
    Branch(BasicBlockId),
    CondBranch {
        cond: ValueId,
        if_true: BasicBlockId,
        if_false: BasicBlockId,
    },
    Return(Option<ValueId>),
}

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BasicBlockId,
    pub nodes: Vec<IrNode>,
    pub terminator: Terminator,
    pub predecessors: Vec<BasicBlockId>,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: IrType,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: IrType) -> Param {
        Param {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalAlloca {
    pub name: String,
    pub ty: IrType,
    pub align: u32,
}

#[derive(Debug, Clone)]
pub struct Method {
    pub id: u32,
    pub name: String,
    pub params: Vec<Param>,
    pub blocks: Vec<BasicBlock>,
    pub entry: BasicBlockId,
    pub locals: Vec<LocalAlloca>,
    pub return_type: IrType,
}

impl Method {
    pub fn block(&self, id: BasicBlockId) -> &BasicBlock {
        self.blocks
            .iter()
            .find(|b| b.id == id)
            .expect("basic block id not present in method")
    }

    /// Reverse-post-order traversal of the control-flow graph, starting at
    /// `entry` (§4.4 "walks basic blocks in a stable order (e.g., reverse
    /// post-order)").
    pub fn reverse_post_order(&self) -> Vec<BasicBlockId> {
        let mut visited = std::collections::HashSet::new();
        let mut post_order = Vec::new();
        self.post_order_visit(self.entry, &mut visited, &mut post_order);
        post_order.reverse();
        post_order
    }

    fn post_order_visit(
        &self,
        id: BasicBlockId,
        visited: &mut std::collections::HashSet<BasicBlockId>,
        out: &mut Vec<BasicBlockId>,
    ) {
        if !visited.insert(id) {
            return;
        }
        let block = self.block(id);
        match &block.terminator {
            Terminator::Branch(next) => self.post_order_visit(*next, visited, out),
            Terminator::CondBranch {
                if_true, if_false, ..
            } => {
                self.post_order_visit(*if_true, visited, out);
                self.post_order_visit(*if_false, visited, out);
            }
            Terminator::Return(_) => {}
        }
        out.push(id);
    }
}

/// Whether a kernel launches with driver-managed (implicit) indices or with
/// the grid/block dimensions spelled out explicitly by the caller (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelGrouping {
    Implicit,
    Explicit,
}

#[derive(Debug, Clone)]
pub struct EntryPointDescriptor {
    pub method: u32,
    pub params: Vec<Param>,
    pub grouping: KernelGrouping,
    /// The kernel index element type, required when `grouping` is
    /// `Implicit` (§6).
    pub index_type: Option<ElementType>,
}

/// A pointer-alignment oracle returning a safe lower bound (§6).
pub trait AlignmentOracle {
    fn alignment_of(&self, ptr: ValueId, pointee: &IrType, pointer_width_bytes: u32) -> u32;
}

/// The documented conservative fallback: the pointee type's natural
/// alignment, ignoring any provenance the driver could otherwise supply.
pub struct ConservativeAlignmentOracle;

impl AlignmentOracle for ConservativeAlignmentOracle {
    fn alignment_of(&self, _ptr: ValueId, pointee: &IrType, pointer_width_bytes: u32) -> u32 {
        pointee.natural_alignment(pointer_width_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AddressSpace;

    #[test]
    fn struct_byte_size_respects_offsets_and_alignment() {
        let ty = IrType::Struct {
            fields: vec![
                IrType::Primitive(ElementType::I32),
                IrType::Primitive(ElementType::F64),
            ],
            offsets: vec![0, 8],
            align: 8,
        };
        assert_eq!(ty.byte_size(8), 16);
    }

    #[test]
    fn pointer_alignment_uses_pointer_width() {
        let ty = IrType::pointer(AddressSpace::Global, IrType::Primitive(ElementType::F32));
        assert_eq!(ty.natural_alignment(8), 8);
        assert_eq!(ty.natural_alignment(4), 4);
    }

    #[test]
    fn conservative_oracle_returns_natural_alignment() {
        let oracle = ConservativeAlignmentOracle;
        let ty = IrType::Primitive(ElementType::F64);
        assert_eq!(oracle.alignment_of(ValueId(0), &ty, 8), 8);
    }

    #[test]
    fn reverse_post_order_visits_entry_first() {
        let method = Method {
            id: 0,
            name: "k".into(),
            params: vec![],
            return_type: IrType::Void,
            entry: BasicBlockId(0),
            locals: vec![],
            blocks: vec![
                BasicBlock {
                    id: BasicBlockId(0),
                    nodes: vec![],
                    terminator: Terminator::Branch(BasicBlockId(1)),
                    predecessors: vec![],
                },
                BasicBlock {
                    id: BasicBlockId(1),
                    nodes: vec![],
                    terminator: Terminator::Return(None),
                    predecessors: vec![BasicBlockId(0)],
                },
            ],
        };
        assert_eq!(
            method.reverse_post_order(),
            vec![BasicBlockId(0), BasicBlockId(1)]
        );
    }
}
