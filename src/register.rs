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

//! Virtual registers and the structured-register tree that mirrors composite
//! IR types (§3, §4.2, §9 "Structured registers").

use crate::ir::IrType;
use crate::types::{ElementType, RegisterKind};
use std::fmt;

/// One lane of a warp/block/grid intrinsic device register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    X,
    Y,
    Z,
}

impl Dimension {
    fn letter(&self) -> char {
        match self {
            Dimension::X => 'x',
            Dimension::Y => 'y',
            Dimension::Z => 'z',
        }
    }
}

/// Intrinsic device registers (§3 `RegisterKind::intrinsic`). These are
/// pseudo-registers the PTX driver materializes; they are never declared
/// and never consume an allocator id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntrinsicKind {
    Tid,
    Ctaid,
    Ntid,
    Nctaid,
    LaneId,
    DynamicSharedMemSize,
}

/// An immediate value wrapped so it can be passed wherever an operand is
/// expected (§3 `ConstantRegister`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImmediateValue {
    SignedInt(i64),
    UnsignedInt(u64),
    F32(f32),
    F64(f64),
    /// Raw 16-bit pattern, used for `f16` constants (§3 invariant 5: "FP16
    /// constants are represented as their raw 16-bit bit-pattern inside a
    /// 16-bit integer register").
    F16Bits(u16),
    Bool(bool),
}

/// The concrete representation behind a [`VirtualRegister`]: an ordinary
/// bank register, an intrinsic pseudo-register, or a not-yet-materialized
/// immediate (§3 `VirtualRegister`, `ConstantRegister`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegisterRepr {
    /// `(kind, numeric id)` for ordinary banks.
    Bank { kind: RegisterKind, id: u32 },
    /// `(intrinsic kind, dimension)` for intrinsic registers. `dim` is
    /// `None` for the dimensionless intrinsics (`%laneid`,
    /// `%dynamic_smem_size`).
    Intrinsic {
        kind: IntrinsicKind,
        dim: Option<Dimension>,
    },
    /// An immediate literal wrapped as a register for operand passing.
    Constant(ImmediateValue),
}

/// A single hardware-addressable PTX value: either a named `%<prefix>N`
/// register, an intrinsic pseudo-register, or a constant awaiting
/// materialization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualRegister {
    pub repr: RegisterRepr,
    /// Element type used to pick mnemonics/suffixes at emission time; the
    /// storage bank (`repr`'s `kind`) only fixes the physical width.
    pub value_type: ElementType,
}

impl VirtualRegister {
    pub fn bank(kind: RegisterKind, id: u32, value_type: ElementType) -> Self {
        VirtualRegister {
            repr: RegisterRepr::Bank { kind, id },
            value_type,
        }
    }

    pub fn intrinsic(kind: IntrinsicKind, dim: Option<Dimension>) -> Self {
        VirtualRegister {
            repr: RegisterRepr::Intrinsic { kind, dim },
            value_type: ElementType::U32,
        }
    }

    pub fn constant(value: ImmediateValue, value_type: ElementType) -> Self {
        VirtualRegister {
            repr: RegisterRepr::Constant(value),
            value_type,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.repr, RegisterRepr::Constant(_))
    }

    pub fn is_predicate(&self) -> bool {
        matches!(self.value_type, ElementType::Predicate)
    }

    /// The allocator bank this register lives in, if it is a bank register.
    pub fn bank_kind(&self) -> Option<RegisterKind> {
        match self.repr {
            RegisterRepr::Bank { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

impl fmt::Display for VirtualRegister {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.repr {
            RegisterRepr::Bank { kind, id } => write!(f, "%{}{}", kind.name_prefix(), id),
            RegisterRepr::Intrinsic { kind, dim } => match (kind, dim) {
                (IntrinsicKind::Tid, Some(d)) => write!(f, "%tid.{}", d.letter()),
                (IntrinsicKind::Ctaid, Some(d)) => write!(f, "%ctaid.{}", d.letter()),
                (IntrinsicKind::Ntid, Some(d)) => write!(f, "%ntid.{}", d.letter()),
                (IntrinsicKind::Nctaid, Some(d)) => write!(f, "%nctaid.{}", d.letter()),
                (IntrinsicKind::LaneId, None) => write!(f, "%laneid"),
                (IntrinsicKind::DynamicSharedMemSize, None) => write!(f, "%dynamic_smem_size"),
                (kind, dim) => unreachable!(
                    "intrinsic {:?} used with invalid dimension {:?}",
                    kind, dim
                ),
            },
            RegisterRepr::Constant(ImmediateValue::SignedInt(v)) => write!(f, "{}", v),
            RegisterRepr::Constant(ImmediateValue::UnsignedInt(v)) => write!(f, "{}", v),
            RegisterRepr::Constant(ImmediateValue::Bool(v)) => write!(f, "{}", *v as u8),
            RegisterRepr::Constant(ImmediateValue::F32(v)) => {
                write!(f, "0f{:08X}", v.to_bits())
            }
            RegisterRepr::Constant(ImmediateValue::F64(v)) => {
                write!(f, "0d{:016X}", v.to_bits())
            }
            RegisterRepr::Constant(ImmediateValue::F16Bits(bits)) => write!(f, "0x{:04X}", bits),
        }
    }
}

/// A recursive tree of primitive registers mirroring an IR composite type
/// (§3 `StructuredRegister`, §9 "Structured registers").
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredRegister {
    Primitive(VirtualRegister),
    Compound {
        ty: IrType,
        children: Vec<StructuredRegister>,
    },
}

impl StructuredRegister {
    /// The single primitive register, if this tree is a leaf.
    pub fn as_primitive(&self) -> Option<&VirtualRegister> {
        match self {
            StructuredRegister::Primitive(r) => Some(r),
            StructuredRegister::Compound { .. } => None,
        }
    }

    pub fn expect_primitive(&self) -> &VirtualRegister {
        self.as_primitive()
            .expect("expected a primitive structured register")
    }

    /// Depth-first, left-to-right flattening into primitive registers. Used
    /// by the vectorization planner (§4.4 Load/Store) to find contiguous
    /// same-kind runs, and by struct build/field operations.
    pub fn flatten(&self) -> Vec<&VirtualRegister> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into<'a>(&'a self, out: &mut Vec<&'a VirtualRegister>) {
        match self {
            StructuredRegister::Primitive(r) => out.push(r),
            StructuredRegister::Compound { children, .. } => {
                for child in children {
                    child.flatten_into(out);
                }
            }
        }
    }

    /// Reconstructs the IR type this tree mirrors, used to look up the
    /// conservative alignment of the address it was loaded from or is
    /// about to be stored to.
    pub fn ir_type(&self) -> IrType {
        match self {
            StructuredRegister::Primitive(r) => IrType::Primitive(r.value_type),
            StructuredRegister::Compound { ty, .. } => ty.clone(),
        }
    }

    /// Field access by index, used by `GetField`/`SetField` (§4.4).
    pub fn field(&self, index: usize) -> &StructuredRegister {
        match self {
            StructuredRegister::Compound { children, .. } => &children[index],
            StructuredRegister::Primitive(_) => {
                panic!("field access on a primitive structured register")
            }
        }
    }

    pub fn with_field(&self, index: usize, value: StructuredRegister) -> StructuredRegister {
        match self {
            StructuredRegister::Compound { ty, children } => {
                let mut children = children.clone();
                children[index] = value;
                StructuredRegister::Compound {
                    ty: ty.clone(),
                    children,
                }
            }
            StructuredRegister::Primitive(_) => {
                panic!("field update on a primitive structured register")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_register_display() {
        let r = VirtualRegister::bank(RegisterKind::Int32, 7, ElementType::I32);
        assert_eq!(r.to_string(), "%r7");
        let rd = VirtualRegister::bank(RegisterKind::Int64, 3, ElementType::U64);
        assert_eq!(rd.to_string(), "%rd3");
    }

    #[test]
    fn intrinsic_register_display() {
        let tidx = VirtualRegister::intrinsic(IntrinsicKind::Tid, Some(Dimension::X));
        assert_eq!(tidx.to_string(), "%tid.x");
        let lane = VirtualRegister::intrinsic(IntrinsicKind::LaneId, None);
        assert_eq!(lane.to_string(), "%laneid");
        let smem = VirtualRegister::intrinsic(IntrinsicKind::DynamicSharedMemSize, None);
        assert_eq!(smem.to_string(), "%dynamic_smem_size");
    }

    #[test]
    fn f32_constant_display_is_big_endian_hex_of_bit_pattern() {
        let one = VirtualRegister::constant(ImmediateValue::F32(1.0), ElementType::F32);
        assert_eq!(one.to_string(), "0f3F800000");
    }

    #[test]
    fn f64_constant_display_is_big_endian_hex_of_bit_pattern() {
        let one = VirtualRegister::constant(ImmediateValue::F64(1.0), ElementType::F64);
        assert_eq!(one.to_string(), "0d3FF0000000000000");
    }

    #[test]
    fn flatten_preserves_order_for_compound_registers() {
        let a = StructuredRegister::Primitive(VirtualRegister::bank(
            RegisterKind::Int32,
            0,
            ElementType::I32,
        ));
        let b = StructuredRegister::Primitive(VirtualRegister::bank(
            RegisterKind::Int32,
            1,
            ElementType::I32,
        ));
        let compound = StructuredRegister::Compound {
            ty: IrType::Struct {
                fields: vec![IrType::Primitive(ElementType::I32); 2],
                offsets: vec![0, 4],
                align: 4,
            },
            children: vec![a, b],
        };
        let flat = compound.flatten();
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].to_string(), "%r0");
        assert_eq!(flat[1].to_string(), "%r1");
    }
}
