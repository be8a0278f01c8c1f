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

//! (OpKind, ElementType, flags) → mnemonic (§4.1). Capability gating is
//! data (`CapabilitySet`), not branchy code (§9 "Capability gate as data,
//! not code") — this table only consults booleans already computed by
//! [`crate::capability::CapabilityGate`].

use crate::capability::CapabilitySet;
use crate::error::{ArchVersion, CodegenError};
use crate::types::{AddressSpace, AtomicOp, BinaryOp, CompareOp, ElementType, OpKind, TernaryOp, UnaryOp};

/// A mnemonic as an ordered list of dot-joined parts (`["add", "s32"]` →
/// `add.s32`), ready to feed an [`crate::emitter::InstructionBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mnemonic(pub Vec<String>);

impl Mnemonic {
    fn new(parts: &[&str]) -> Self {
        Mnemonic(parts.iter().map(|s| s.to_string()).collect())
    }

    pub fn apply<'a>(
        &self,
        mut builder: crate::emitter::InstructionBuilder<'a>,
    ) -> crate::emitter::InstructionBuilder<'a> {
        for (i, part) in self.0.iter().enumerate() {
            builder = if i == 0 {
                builder.op(part)
            } else {
                builder.suffix(part)
            };
        }
        builder
    }
}

fn unsupported(op: OpKind, ty: ElementType) -> CodegenError {
    CodegenError::UnsupportedOperation { op, ty }
}

fn unsupported_arch(op: OpKind, ty: ElementType, arch: ArchVersion) -> CodegenError {
    CodegenError::UnsupportedOnArchitecture { op, ty, arch }
}

pub struct InstructionTable;

impl InstructionTable {
    /// `selp.{b16|b32|b64}` chosen by element width (§4.1 "Select").
    pub fn select(ty: ElementType) -> Mnemonic {
        Mnemonic::new(&["selp", ty.bitwise_suffix()])
    }

    /// `setp.<cmp>.<typecode>`, unordered variant when requested (§4.1
    /// "Compare").
    pub fn compare(op: CompareOp, ty: ElementType, unordered: bool) -> Mnemonic {
        let cmp = if unordered {
            op.unordered_suffix()
        } else {
            op.ordered_suffix()
        };
        Mnemonic(vec!["setp".to_string(), cmp.to_string(), ty.ptx_suffix().to_string()])
    }

    /// `cvt[.<rounding>].<dst>.<src>` (§4.1 "Convert"). Rounding defaults to
    /// nearest-even for integer→float, round-to-zero for float→integer, and
    /// is omitted for widening float→float or any integer→integer
    /// conversion.
    pub fn convert(dst: ElementType, src: ElementType) -> Mnemonic {
        let rounding = if dst.is_float() && src.is_integer() {
            Some("rn")
        } else if dst.is_integer() && src.is_float() {
            Some("rz")
        } else {
            None
        };
        let mut parts = vec!["cvt".to_string()];
        if let Some(rnd) = rounding {
            parts.push(rnd.to_string());
        }
        parts.push(dst.ptx_suffix().to_string());
        parts.push(src.ptx_suffix().to_string());
        Mnemonic(parts)
    }

    /// Unary arithmetic, standard and fast-math variants (§4.1 "Unary
    /// arithmetic").
    pub fn unary(
        op: UnaryOp,
        ty: ElementType,
        fast_math: bool,
        caps: CapabilitySet,
        arch: ArchVersion,
    ) -> Result<Mnemonic, CodegenError> {
        let kind = OpKind::Unary(op);
        match op {
            UnaryOp::Neg => Ok(Mnemonic::new(&["neg", ty.ptx_suffix()])),
            UnaryOp::Not => {
                if ty.is_integer() || ty == ElementType::Predicate {
                    Ok(Mnemonic::new(&["not", ty.bitwise_suffix()]))
                } else {
                    Err(unsupported(kind, ty))
                }
            }
            UnaryOp::Abs => {
                if ty.is_integer() || ty.is_float() {
                    Ok(Mnemonic::new(&["abs", ty.ptx_suffix()]))
                } else {
                    Err(unsupported(kind, ty))
                }
            }
            UnaryOp::Rcp => float_only(ty, kind, |suffix| {
                if fast_math {
                    Mnemonic(vec!["rcp".into(), "approx".into(), "ftz".into(), suffix.into()])
                } else {
                    Mnemonic(vec!["rcp".into(), "rn".into(), suffix.into()])
                }
            }),
            UnaryOp::IsNaN => float_only(ty, kind, |suffix| {
                Mnemonic(vec!["testp".into(), "notanumber".into(), suffix.into()])
            }),
            UnaryOp::IsInf => float_only(ty, kind, |suffix| {
                Mnemonic(vec!["testp".into(), "infinite".into(), suffix.into()])
            }),
            UnaryOp::Sqrt => float_only(ty, kind, |suffix| {
                if fast_math {
                    Mnemonic(vec!["sqrt".into(), "approx".into(), "ftz".into(), suffix.into()])
                } else {
                    Mnemonic(vec!["sqrt".into(), "rn".into(), suffix.into()])
                }
            }),
            UnaryOp::Rsqrt => float_only(ty, kind, |suffix| {
                Mnemonic(vec!["rsqrt".into(), "approx".into(), "ftz".into(), suffix.into()])
            }),
            UnaryOp::Sin => float_only(ty, kind, |suffix| {
                Mnemonic(vec!["sin".into(), "approx".into(), "ftz".into(), suffix.into()])
            }),
            UnaryOp::Cos => float_only(ty, kind, |suffix| {
                Mnemonic(vec!["cos".into(), "approx".into(), "ftz".into(), suffix.into()])
            }),
            UnaryOp::Log2 => float_only(ty, kind, |suffix| {
                Mnemonic(vec!["lg2".into(), "approx".into(), "ftz".into(), suffix.into()])
            }),
            UnaryOp::Exp2 => float_only(ty, kind, |suffix| {
                Mnemonic(vec!["ex2".into(), "approx".into(), "ftz".into(), suffix.into()])
            }),
            UnaryOp::Tanh => {
                if !ty.is_float() {
                    return Err(unsupported(kind, ty));
                }
                let gated = match ty {
                    ElementType::F16 => caps.f16_tanh,
                    ElementType::F32 => caps.f32_tanh,
                    _ => false,
                };
                if !gated {
                    return Err(unsupported_arch(kind, ty, arch));
                }
                Ok(Mnemonic::new(&["tanh", "approx", ty.ptx_suffix()]))
            }
            UnaryOp::Floor => float_only(ty, kind, |suffix| {
                Mnemonic(vec!["cvt".into(), "rmi".into(), suffix.into(), suffix.into()])
            }),
            UnaryOp::Ceil => float_only(ty, kind, |suffix| {
                Mnemonic(vec!["cvt".into(), "rpi".into(), suffix.into(), suffix.into()])
            }),
            UnaryOp::PopC => {
                if ty.is_integer() {
                    Ok(Mnemonic::new(&["popc", ty.bitwise_suffix()]))
                } else {
                    Err(unsupported(kind, ty))
                }
            }
            UnaryOp::Clz => {
                if ty.is_integer() {
                    Ok(Mnemonic::new(&["clz", ty.bitwise_suffix()]))
                } else {
                    Err(unsupported(kind, ty))
                }
            }
        }
    }

    /// Binary arithmetic, standard and fast-math variants (§4.1 "Binary
    /// arithmetic"): `.ftz` for f32 add/sub/mul/min/max, `.approx.ftz` for
    /// f32 div, `.ftz` for f16 add/sub/mul when the architecture advertises
    /// it.
    pub fn binary(
        op: BinaryOp,
        ty: ElementType,
        fast_math: bool,
        caps: CapabilitySet,
    ) -> Result<Mnemonic, CodegenError> {
        let kind = OpKind::Binary(op);
        let ftz_eligible = fast_math
            && (ty == ElementType::F32 || (ty == ElementType::F16 && caps.f16_arith_ftz));
        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => {
                let name = match op {
                    BinaryOp::Add => "add",
                    BinaryOp::Sub => "sub",
                    BinaryOp::Mul => "mul",
                    _ => unreachable!(),
                };
                if ty.is_float() {
                    let mut parts = vec![name.to_string()];
                    if ftz_eligible {
                        parts.push("ftz".to_string());
                    } else {
                        parts.push("rn".to_string());
                    }
                    parts.push(ty.ptx_suffix().to_string());
                    Ok(Mnemonic(parts))
                } else if ty.is_integer() {
                    let mut parts = vec![name.to_string()];
                    if op == BinaryOp::Mul {
                        parts.push("lo".to_string());
                    }
                    parts.push(ty.ptx_suffix().to_string());
                    Ok(Mnemonic(parts))
                } else {
                    Err(unsupported(kind, ty))
                }
            }
            BinaryOp::Div => {
                if ty.is_float() {
                    let mut parts = vec!["div".to_string()];
                    if fast_math && ty == ElementType::F32 {
                        parts.push("approx".to_string());
                        parts.push("ftz".to_string());
                    } else {
                        parts.push("rn".to_string());
                    }
                    parts.push(ty.ptx_suffix().to_string());
                    Ok(Mnemonic(parts))
                } else if ty.is_integer() {
                    Ok(Mnemonic::new(&["div", ty.ptx_suffix()]))
                } else {
                    Err(unsupported(kind, ty))
                }
            }
            BinaryOp::Rem => {
                if ty.is_integer() {
                    Ok(Mnemonic::new(&["rem", ty.ptx_suffix()]))
                } else {
                    Err(unsupported(kind, ty))
                }
            }
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
                let name = match op {
                    BinaryOp::And => "and",
                    BinaryOp::Or => "or",
                    BinaryOp::Xor => "xor",
                    _ => unreachable!(),
                };
                Ok(Mnemonic::new(&[name, ty.bitwise_suffix()]))
            }
            BinaryOp::Shl | BinaryOp::Shr => {
                if !ty.is_integer() {
                    return Err(unsupported(kind, ty));
                }
                let name = if op == BinaryOp::Shl { "shl" } else { "shr" };
                let suffix = if op == BinaryOp::Shr {
                    ty.ptx_suffix()
                } else {
                    ty.bitwise_suffix()
                };
                Ok(Mnemonic::new(&[name, suffix]))
            }
            BinaryOp::Max | BinaryOp::Min => {
                let name = if op == BinaryOp::Max { "max" } else { "min" };
                let mut parts = vec![name.to_string()];
                if ftz_eligible {
                    parts.push("ftz".to_string());
                }
                parts.push(ty.ptx_suffix().to_string());
                Ok(Mnemonic(parts))
            }
            BinaryOp::CopySign => {
                if ty.is_float() {
                    Ok(Mnemonic::new(&["copysign", ty.ptx_suffix()]))
                } else {
                    Err(unsupported(kind, ty))
                }
            }
        }
    }

    /// Fused multiply-add: `mad.lo.*` for integers, `fma.rn.*` for floats
    /// (§4.1 "Ternary"). The 16-bit widen-through-int32 decision (§4.1.1)
    /// is applied by the lowering dispatcher, not here — this table is
    /// only ever asked for 32/64-bit integer or float FMA mnemonics.
    pub fn ternary(op: TernaryOp, ty: ElementType) -> Result<Mnemonic, CodegenError> {
        let TernaryOp::Fma = op;
        let kind = OpKind::Ternary(op);
        if ty.is_float() {
            Ok(Mnemonic::new(&["fma", "rn", ty.ptx_suffix()]))
        } else if ty == ElementType::I32 || ty == ElementType::U32 || ty == ElementType::I64 || ty == ElementType::U64 {
            Ok(Mnemonic::new(&["mad", "lo", ty.ptx_suffix()]))
        } else {
            Err(unsupported(kind, ty))
        }
    }

    /// Two forms: reduction-only (`red.*`, no result) vs. full atomic
    /// (`atom.*`, returns old value) (§4.1 "Atomic").
    pub fn atomic(
        op: AtomicOp,
        ty: ElementType,
        space: AddressSpace,
        result_used: bool,
    ) -> Result<Mnemonic, CodegenError> {
        let kind = OpKind::Atomic(op);
        let suffix = atomic_type_suffix(op, ty).ok_or_else(|| unsupported(kind, ty))?;
        let base = if result_used { "atom" } else { "red" };
        let mut parts = vec![base.to_string()];
        if !space.suffix().is_empty() {
            parts.push(space.suffix().to_string());
        }
        parts.push(op.mnemonic_suffix().to_string());
        parts.push(suffix.to_string());
        Ok(Mnemonic(parts))
    }

    /// `atom.cas.<space>.b32/b64` (§4.1 "Atomic").
    pub fn atomic_cas(ty: ElementType, space: AddressSpace) -> Result<Mnemonic, CodegenError> {
        if ty.bit_width() != 32 && ty.bit_width() != 64 {
            return Err(unsupported(OpKind::Atomic(AtomicOp::Cas), ty));
        }
        let mut parts = vec!["atom".to_string()];
        if !space.suffix().is_empty() {
            parts.push(space.suffix().to_string());
        }
        parts.push("cas".to_string());
        parts.push(ty.bitwise_suffix().to_string());
        Ok(Mnemonic(parts))
    }

    /// `cvta` toward generic, `cvta.to` away from generic (§4.1
    /// "Address-space cast", §4.5).
    pub fn address_space_cast(to_generic: bool, space: AddressSpace, pointer_suffix: &str) -> Mnemonic {
        let mut parts = vec!["cvta".to_string()];
        if !to_generic {
            parts.push("to".to_string());
        }
        if !space.suffix().is_empty() {
            parts.push(space.suffix().to_string());
        }
        parts.push(pointer_suffix.to_string());
        Mnemonic(parts)
    }

    pub fn load(space: AddressSpace, ty: ElementType) -> Mnemonic {
        io_mnemonic("ld", space, &[ty.ptx_suffix()])
    }

    pub fn store(space: AddressSpace, ty: ElementType) -> Mnemonic {
        io_mnemonic("st", space, &[ty.ptx_suffix()])
    }

    pub fn vector_load(space: AddressSpace, ty: ElementType, lanes: u32) -> Mnemonic {
        io_mnemonic("ld", space, &[vector_suffix(lanes), ty.ptx_suffix()])
    }

    pub fn vector_store(space: AddressSpace, ty: ElementType, lanes: u32) -> Mnemonic {
        io_mnemonic("st", space, &[vector_suffix(lanes), ty.ptx_suffix()])
    }

    pub fn barrier_warp() -> Mnemonic {
        Mnemonic::new(&["bar", "warp", "sync"])
    }

    pub fn barrier_group() -> Mnemonic {
        Mnemonic::new(&["bar", "sync"])
    }

    /// `bar.red.{popc.u32|and.pred|or.pred}` (§4.1 "Barriers").
    pub fn predicate_barrier(kind: crate::ir::PredicateBarrierOp) -> Mnemonic {
        use crate::ir::PredicateBarrierOp::*;
        match kind {
            PopCount => Mnemonic::new(&["bar", "red", "popc", "u32"]),
            And => Mnemonic::new(&["bar", "red", "and", "pred"]),
            Or => Mnemonic::new(&["bar", "red", "or", "pred"]),
        }
    }

    /// `membar.{cta|gl|sys}` (§4.1 "Barriers").
    pub fn memory_barrier(scope: crate::ir::MemBarrierScope) -> Mnemonic {
        use crate::ir::MemBarrierScope::*;
        let token = match scope {
            Cta => "cta",
            Gl => "gl",
            Sys => "sys",
        };
        Mnemonic::new(&["membar", token])
    }

    /// `shfl.sync.{idx|down|up|bfly}.b32` (§4.1 "Shuffles").
    pub fn shuffle(kind: crate::ir::ShuffleKind) -> Mnemonic {
        use crate::ir::ShuffleKind::*;
        let token = match kind {
            Idx => "idx",
            Down => "down",
            Up => "up",
            Bfly => "bfly",
        };
        Mnemonic::new(&["shfl", "sync", token, "b32"])
    }
}

fn float_only(
    ty: ElementType,
    kind: OpKind,
    build: impl FnOnce(&str) -> Mnemonic,
) -> Result<Mnemonic, CodegenError> {
    if ty.is_float() {
        Ok(build(ty.ptx_suffix()))
    } else {
        Err(unsupported(kind, ty))
    }
}

fn atomic_type_suffix(op: AtomicOp, ty: ElementType) -> Option<&'static str> {
    match (op, ty) {
        (AtomicOp::Add, ElementType::F16) => Some("f16"),
        (AtomicOp::Add, ElementType::F32) => Some("f32"),
        (AtomicOp::Add, ElementType::F64) => Some("f64"),
        (_, ElementType::I32) => Some("s32"),
        (_, ElementType::U32) => Some("u32"),
        (_, ElementType::I64) => Some("s64"),
        (_, ElementType::U64) => Some("u64"),
        _ => None,
    }
}

fn vector_suffix(lanes: u32) -> &'static str {
    match lanes {
        2 => "v2",
        4 => "v4",
        _ => panic!("vector lane width must be 2 or 4, got {}", lanes),
    }
}

fn io_mnemonic(base: &str, space: AddressSpace, rest: &[&str]) -> Mnemonic {
    let mut parts = vec![base.to_string()];
    if !space.suffix().is_empty() {
        parts.push(space.suffix().to_string());
    }
    parts.extend(rest.iter().map(|s| s.to_string()));
    Mnemonic(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityGate;

    #[test]
    fn select_uses_bitwise_width_suffix() {
        assert_eq!(InstructionTable::select(ElementType::I32).0, vec!["selp", "b32"]);
    }

    #[test]
    fn compare_eq_matches_literal_scenario() {
        let m = InstructionTable::compare(CompareOp::Eq, ElementType::I32, false);
        assert_eq!(m.0, vec!["setp", "eq", "s32"]);
    }

    #[test]
    fn convert_int_to_float_uses_round_nearest() {
        let m = InstructionTable::convert(ElementType::F32, ElementType::I32);
        assert_eq!(m.0, vec!["cvt", "rn", "f32", "s32"]);
    }

    #[test]
    fn fma_picks_mad_for_ints_and_fma_for_floats() {
        let m = InstructionTable::ternary(TernaryOp::Fma, ElementType::I32).unwrap();
        assert_eq!(m.0, vec!["mad", "lo", "s32"]);
        let m = InstructionTable::ternary(TernaryOp::Fma, ElementType::F64).unwrap();
        assert_eq!(m.0, vec!["fma", "rn", "f64"]);
    }

    #[test]
    fn tanh_requires_capability() {
        let low = CapabilityGate::new(6, 0).unwrap();
        let result = InstructionTable::unary(
            UnaryOp::Tanh,
            ElementType::F32,
            false,
            low.capabilities(),
            low.arch(),
        );
        assert!(matches!(
            result,
            Err(CodegenError::UnsupportedOnArchitecture { .. })
        ));

        let high = CapabilityGate::new(7, 5).unwrap();
        let result = InstructionTable::unary(
            UnaryOp::Tanh,
            ElementType::F32,
            false,
            high.capabilities(),
            high.arch(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn cvta_from_local_matches_literal_scenario() {
        let m = InstructionTable::address_space_cast(true, AddressSpace::Local, "u64");
        assert_eq!(m.0, vec!["cvta", "local", "u64"]);
    }

    #[test]
    fn vector_load_uses_v4_suffix() {
        let m = InstructionTable::vector_load(AddressSpace::Global, ElementType::U32, 4);
        assert_eq!(m.0, vec!["ld", "global", "v4", "u32"]);
    }
}
