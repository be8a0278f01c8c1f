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

//! Element types, address spaces, and the operation-kind tag union (§3).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A PTX scalar element type.
///
/// Pointers are not a distinct variant: a pointer is represented at the
/// primitive level as `U32` or `U64` depending on the target's pointer
/// width, chosen once per backend instance (§4.2 "Pointer width").
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// 1-bit predicate
    Predicate,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F16,
    F32,
    F64,
}

impl ElementType {
    /// Bit width of the element, including the 1-bit predicate.
    pub fn bit_width(&self) -> u32 {
        match self {
            ElementType::Predicate => 1,
            ElementType::I8 | ElementType::U8 => 8,
            ElementType::I16 | ElementType::U16 | ElementType::F16 => 16,
            ElementType::I32 | ElementType::U32 | ElementType::F32 => 32,
            ElementType::I64 | ElementType::U64 | ElementType::F64 => 64,
        }
    }

    /// Byte size, rounding up (matches the teacher's `RegisterDesc::size`
    /// and `ImmediateDesc::size` convention).
    pub fn byte_size(&self) -> u32 {
        (self.bit_width() + 7) / 8
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ElementType::F16 | ElementType::F32 | ElementType::F64)
    }

    pub fn is_signed_int(&self) -> bool {
        matches!(
            self,
            ElementType::I8 | ElementType::I16 | ElementType::I32 | ElementType::I64
        )
    }

    pub fn is_unsigned_int(&self) -> bool {
        matches!(
            self,
            ElementType::U8 | ElementType::U16 | ElementType::U32 | ElementType::U64
        )
    }

    pub fn is_integer(&self) -> bool {
        self.is_signed_int() || self.is_unsigned_int()
    }

    /// The PTX type-suffix token used in most mnemonics (`s32`, `u16`,
    /// `f64`, `pred`, ...). Bitwise-only instructions use [`ElementType::bitwise_suffix`]
    /// instead (`b16`/`b32`/`b64`), since PTX does not expose signed/unsigned
    /// bitwise opcodes.
    pub fn ptx_suffix(&self) -> &'static str {
        match self {
            ElementType::Predicate => "pred",
            ElementType::I8 => "s8",
            ElementType::I16 => "s16",
            ElementType::I32 => "s32",
            ElementType::I64 => "s64",
            ElementType::U8 => "u8",
            ElementType::U16 => "u16",
            ElementType::U32 => "u32",
            ElementType::U64 => "u64",
            ElementType::F16 => "f16",
            ElementType::F32 => "f32",
            ElementType::F64 => "f64",
        }
    }

    /// Width-only bitwise suffix (`b16`/`b32`/`b64`) used for selects,
    /// bitwise logic, and moves where signedness is immaterial.
    pub fn bitwise_suffix(&self) -> &'static str {
        match self.bit_width() {
            1 => "pred",
            8 => "b8",
            16 => "b16",
            32 => "b32",
            64 => "b64",
            _ => unreachable!("element types are 1, 8, 16, 32, or 64 bits wide"),
        }
    }

    /// The [`RegisterKind`] bank this element type is stored in.
    pub fn register_kind(&self) -> RegisterKind {
        match self {
            ElementType::Predicate => RegisterKind::Predicate,
            ElementType::I8 | ElementType::U8 | ElementType::I16 | ElementType::U16 => {
                RegisterKind::Int16
            }
            ElementType::I32 | ElementType::U32 => RegisterKind::Int32,
            ElementType::I64 | ElementType::U64 => RegisterKind::Int64,
            ElementType::F16 => RegisterKind::Int16,
            ElementType::F32 => RegisterKind::Float32,
            ElementType::F64 => RegisterKind::Float64,
        }
    }
}

/// Coarse-grained memory region tag (§3, GLOSSARY).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressSpace {
    Generic,
    Global,
    Shared,
    Local,
    Param,
}

impl AddressSpace {
    /// The `.space` suffix token, empty for the generic space (§4.5: "When
    /// a store/load targets the generic space, no `.<space>` suffix is
    /// emitted").
    pub fn suffix(&self) -> &'static str {
        match self {
            AddressSpace::Generic => "",
            AddressSpace::Global => "global",
            AddressSpace::Shared => "shared",
            AddressSpace::Local => "local",
            AddressSpace::Param => "param",
        }
    }
}

/// Target register bank for a primitive value (§3 `RegisterKind`).
///
/// Intrinsic device registers (`%tid.x`, `%laneid`, ...) are represented
/// separately by [`crate::register::IntrinsicKind`] — they are synthesized
/// without consuming a bank's id counter (§3 invariant on `VirtualRegister`).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterKind {
    Predicate,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl RegisterKind {
    /// The `.reg` declaration type token (e.g. `.pred`, `.s32`, `.f64`).
    /// Integer banks declare as bitwise types since a bank is shared between
    /// signed and unsigned uses of the same width.
    pub fn decl_type(&self) -> &'static str {
        match self {
            RegisterKind::Predicate => "pred",
            RegisterKind::Int16 => "b16",
            RegisterKind::Int32 => "b32",
            RegisterKind::Int64 => "b64",
            RegisterKind::Float32 => "f32",
            RegisterKind::Float64 => "f64",
        }
    }

    /// The `%<prefix>N` register-name prefix used by the [`crate::emitter::Emitter`]
    /// and the declaration block.
    pub fn name_prefix(&self) -> &'static str {
        match self {
            RegisterKind::Predicate => "p",
            RegisterKind::Int16 => "rs",
            RegisterKind::Int32 => "r",
            RegisterKind::Int64 => "rd",
            RegisterKind::Float32 => "f",
            RegisterKind::Float64 => "fd",
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
    Abs,
    Rcp,
    IsNaN,
    IsInf,
    Sqrt,
    Rsqrt,
    Sin,
    Cos,
    Tanh,
    Log2,
    Exp2,
    Floor,
    Ceil,
    PopC,
    Clz,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Max,
    Min,
    CopySign,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TernaryOp {
    Fma,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// The `setp` condition-code token for the ordered comparison.
    pub fn ordered_suffix(&self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
        }
    }

    /// The `setp` condition-code token for the unordered-or-true variant
    /// (`equ`, `neu`, `ltu`, ...), used when float comparisons must treat a
    /// NaN operand as satisfying the comparison (§4.1 Compare).
    pub fn unordered_suffix(&self) -> &'static str {
        match self {
            CompareOp::Eq => "equ",
            CompareOp::Ne => "neu",
            CompareOp::Lt => "ltu",
            CompareOp::Le => "leu",
            CompareOp::Gt => "gtu",
            CompareOp::Ge => "geu",
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicOp {
    Exch,
    Add,
    And,
    Or,
    Xor,
    Max,
    Min,
    Cas,
}

impl AtomicOp {
    pub fn mnemonic_suffix(&self) -> &'static str {
        match self {
            AtomicOp::Exch => "exch",
            AtomicOp::Add => "add",
            AtomicOp::And => "and",
            AtomicOp::Or => "or",
            AtomicOp::Xor => "xor",
            AtomicOp::Max => "max",
            AtomicOp::Min => "min",
            AtomicOp::Cas => "cas",
        }
    }
}

/// Tagged union over every arithmetic/compare/atomic operation this backend
/// lowers (§3 `OpKind`).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Unary(UnaryOp),
    Binary(BinaryOp),
    Ternary(TernaryOp),
    /// `unordered` selects the NaN-propagating comparison variant.
    Compare { op: CompareOp, unordered: bool },
    Atomic(AtomicOp),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_type_widths() {
        assert_eq!(ElementType::Predicate.bit_width(), 1);
        assert_eq!(ElementType::I8.bit_width(), 8);
        assert_eq!(ElementType::U64.bit_width(), 64);
        assert_eq!(ElementType::F32.byte_size(), 4);
    }

    #[test]
    fn ptx_suffixes() {
        assert_eq!(ElementType::I32.ptx_suffix(), "s32");
        assert_eq!(ElementType::U16.ptx_suffix(), "u16");
        assert_eq!(ElementType::F64.ptx_suffix(), "f64");
        assert_eq!(ElementType::Predicate.ptx_suffix(), "pred");
    }

    #[test]
    fn bitwise_suffixes_ignore_signedness() {
        assert_eq!(ElementType::I32.bitwise_suffix(), "b32");
        assert_eq!(ElementType::U32.bitwise_suffix(), "b32");
    }

    #[test]
    fn register_kind_mapping_groups_sub32_ints() {
        assert_eq!(ElementType::I8.register_kind(), RegisterKind::Int16);
        assert_eq!(ElementType::U16.register_kind(), RegisterKind::Int16);
        assert_eq!(ElementType::F16.register_kind(), RegisterKind::Int16);
        assert_eq!(ElementType::I32.register_kind(), RegisterKind::Int32);
    }

    #[test]
    fn generic_address_space_has_no_suffix() {
        assert_eq!(AddressSpace::Generic.suffix(), "");
        assert_eq!(AddressSpace::Global.suffix(), "global");
    }

    #[test]
    fn compare_suffixes() {
        assert_eq!(CompareOp::Eq.ordered_suffix(), "eq");
        assert_eq!(CompareOp::Eq.unordered_suffix(), "equ");
    }
}
