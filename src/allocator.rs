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

//! Per-kind virtual register banks, SSA value binding, and the declaration
//! block (§4.2, §9 "Free-list allocator").

use crate::ir::{IrType, ValueId};
use crate::register::{ImmediateValue, RegisterRepr, StructuredRegister, VirtualRegister};
use crate::types::{ElementType, RegisterKind};
use indexmap::IndexMap;
use tracing::trace;

const BANK_COUNT: usize = 6;

fn bank_index(kind: RegisterKind) -> usize {
    match kind {
        RegisterKind::Predicate => 0,
        RegisterKind::Int16 => 1,
        RegisterKind::Int32 => 2,
        RegisterKind::Int64 => 3,
        RegisterKind::Float32 => 4,
        RegisterKind::Float64 => 5,
    }
}

const ALL_KINDS: [RegisterKind; BANK_COUNT] = [
    RegisterKind::Predicate,
    RegisterKind::Int16,
    RegisterKind::Int32,
    RegisterKind::Int64,
    RegisterKind::Float32,
    RegisterKind::Float64,
];

#[derive(Debug, Default)]
struct Bank {
    next_id: u32,
    free: Vec<u32>,
}

/// Hands out and reclaims virtual registers, one free-list-backed bank per
/// [`RegisterKind`] (§3 "Allocator state", §9 "Free-list allocator": "freed
/// register ids are reused LIFO within the same bank; the id counter never
/// decreases").
#[derive(Debug)]
pub struct RegisterAllocator {
    banks: [Bank; BANK_COUNT],
}

impl RegisterAllocator {
    pub fn new() -> Self {
        RegisterAllocator {
            banks: [
                Bank::default(),
                Bank::default(),
                Bank::default(),
                Bank::default(),
                Bank::default(),
                Bank::default(),
            ],
        }
    }

    /// Pop a released id from the bank's free stack, or mint a new one.
    pub fn allocate(&mut self, kind: RegisterKind, value_type: ElementType) -> VirtualRegister {
        let bank = &mut self.banks[bank_index(kind)];
        let id = bank.free.pop().unwrap_or_else(|| {
            let id = bank.next_id;
            bank.next_id += 1;
            id
        });
        VirtualRegister::bank(kind, id, value_type)
    }

    /// Push a bank register's id back on its free stack. No-op for
    /// intrinsic and constant registers, which never consumed an id.
    pub fn free(&mut self, reg: &VirtualRegister) {
        if let RegisterRepr::Bank { kind, id } = reg.repr {
            self.banks[bank_index(kind)].free.push(id);
        }
    }

    /// Recurse into an IR type, building a matching tree of freshly
    /// allocated primitive registers (§4.2 `allocate_for`).
    pub fn allocate_for(&mut self, ty: &IrType, pointer_kind: RegisterKind) -> StructuredRegister {
        match ty {
            IrType::Void => StructuredRegister::Primitive(VirtualRegister::bank(
                RegisterKind::Predicate,
                0,
                ElementType::Predicate,
            )),
            IrType::Primitive(element) => StructuredRegister::Primitive(
                self.allocate(element.register_kind(), *element),
            ),
            IrType::Pointer { .. } => StructuredRegister::Primitive(self.allocate(
                pointer_kind,
                pointer_element_type(pointer_kind),
            )),
            IrType::Struct { fields, .. } => StructuredRegister::Compound {
                ty: ty.clone(),
                children: fields
                    .iter()
                    .map(|field| self.allocate_for(field, pointer_kind))
                    .collect(),
            },
            IrType::Array { element, len } => StructuredRegister::Compound {
                ty: ty.clone(),
                children: (0..*len)
                    .map(|_| self.allocate_for(element, pointer_kind))
                    .collect(),
            },
        }
    }

    /// The peak id reached in each bank — equal to the number of
    /// declarations that must be emitted for that bank (§4.2 "Declaration
    /// block").
    pub fn peak_counts(&self) -> [u32; BANK_COUNT] {
        let mut out = [0u32; BANK_COUNT];
        for (i, bank) in self.banks.iter().enumerate() {
            out[i] = bank.next_id;
        }
        out
    }

    /// One `.reg .<type> %<prefix><N>;` line per bank whose counter is > 0
    /// (§4.2 "Declaration block").
    pub fn declaration_lines(&self) -> Vec<String> {
        let counts = self.peak_counts();
        ALL_KINDS
            .iter()
            .zip(counts.iter())
            .filter(|(_, count)| **count > 0)
            .map(|(kind, count)| {
                format!(
                    "\t.reg .{} \t%{}<{}>;\n",
                    kind.decl_type(),
                    kind.name_prefix(),
                    count
                )
            })
            .collect()
    }

    /// If `reg` is a constant, allocate a hardware register of the matching
    /// bank; the caller is responsible for emitting the move from
    /// [`Materialized::source`] (§4.2 `ensure_hardware`).
    pub fn ensure_hardware(&mut self, reg: VirtualRegister) -> Materialized {
        if !reg.is_constant() {
            return Materialized {
                register: reg,
                source: None,
            };
        }
        let kind = reg.value_type.register_kind();
        let hw = self.allocate(kind, reg.value_type);
        trace!(kind = ?kind, id = ?hw, "materialized constant into hardware register");
        Materialized {
            register: hw,
            source: Some(reg),
        }
    }
}

fn pointer_element_type(kind: RegisterKind) -> ElementType {
    match kind {
        RegisterKind::Int32 => ElementType::U32,
        RegisterKind::Int64 => ElementType::U64,
        other => panic!("pointer register kind must be Int32 or Int64, got {:?}", other),
    }
}

/// A register that is guaranteed addressable in hardware; `source` is set
/// when a move instruction must still be emitted to get a constant into
/// it.
pub struct Materialized {
    pub register: VirtualRegister,
    pub source: Option<VirtualRegister>,
}

/// IR value id → structured register binding (§3 "Binding map").
#[derive(Debug, Default)]
pub struct BindingMap {
    bindings: IndexMap<ValueId, StructuredRegister>,
}

impl BindingMap {
    pub fn new() -> Self {
        BindingMap::default()
    }

    /// Installs a binding; fails if the value already has one (use
    /// [`BindingMap::alias`] for intentional zero-cost aliasing).
    pub fn bind(
        &mut self,
        value: ValueId,
        register: StructuredRegister,
    ) -> Result<(), crate::error::CodegenError> {
        if self.bindings.contains_key(&value) {
            return Err(crate::error::CodegenError::InternalInvariant(format!(
                "value {:?} already bound",
                value
            )));
        }
        self.bindings.insert(value, register);
        Ok(())
    }

    /// Installs the same structured register under a second value id (§4.2
    /// `alias`), used for zero-cost casts like a zero-offset
    /// `AddressOfField`.
    pub fn alias(&mut self, to: ValueId, from: ValueId) -> Result<(), crate::error::CodegenError> {
        let existing = self.bindings.get(&from).cloned().ok_or_else(|| {
            crate::error::CodegenError::InvalidIr(format!("alias source {:?} not bound", from))
        })?;
        self.bindings.insert(to, existing);
        Ok(())
    }

    pub fn load(&self, value: ValueId) -> Result<&StructuredRegister, crate::error::CodegenError> {
        self.bindings.get(&value).ok_or_else(|| {
            crate::error::CodegenError::InvalidIr(format!(
                "value {:?} used before being bound",
                value
            ))
        })
    }

    pub fn is_bound(&self, value: ValueId) -> bool {
        self.bindings.contains_key(&value)
    }
}

/// Wraps an `ImmediateValue`'s owning `ElementType`-kind pair so callers
/// that only hold a raw constant can still go through `ensure_hardware`.
pub fn constant_register(value: ImmediateValue, value_type: ElementType) -> VirtualRegister {
    VirtualRegister::constant(value, value_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AddressSpace;

    #[test]
    fn allocate_reuses_freed_ids_lifo() {
        let mut alloc = RegisterAllocator::new();
        let a = alloc.allocate(RegisterKind::Int32, ElementType::I32);
        let b = alloc.allocate(RegisterKind::Int32, ElementType::I32);
        alloc.free(&a);
        alloc.free(&b);
        let c = alloc.allocate(RegisterKind::Int32, ElementType::I32);
        assert_eq!(c.to_string(), b.to_string());
    }

    #[test]
    fn peak_counts_never_decrease_after_free() {
        let mut alloc = RegisterAllocator::new();
        let a = alloc.allocate(RegisterKind::Int32, ElementType::I32);
        alloc.free(&a);
        alloc.allocate(RegisterKind::Int32, ElementType::I32);
        let counts = alloc.peak_counts();
        assert_eq!(counts[bank_index(RegisterKind::Int32)], 1);
    }

    #[test]
    fn allocate_for_struct_produces_matching_tree() {
        let mut alloc = RegisterAllocator::new();
        let ty = IrType::Struct {
            fields: vec![
                IrType::Primitive(ElementType::I32),
                IrType::Primitive(ElementType::F64),
            ],
            offsets: vec![0, 8],
            align: 8,
        };
        let structured = alloc.allocate_for(&ty, RegisterKind::Int64);
        let flat = structured.flatten();
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].value_type, ElementType::I32);
        assert_eq!(flat[1].value_type, ElementType::F64);
    }

    #[test]
    fn allocate_for_pointer_uses_pointer_kind() {
        let mut alloc = RegisterAllocator::new();
        let ty = IrType::pointer(AddressSpace::Global, IrType::Primitive(ElementType::F32));
        let structured = alloc.allocate_for(&ty, RegisterKind::Int64);
        assert_eq!(structured.expect_primitive().bank_kind(), Some(RegisterKind::Int64));
    }

    #[test]
    fn ensure_hardware_only_materializes_constants() {
        let mut alloc = RegisterAllocator::new();
        let bank_reg = alloc.allocate(RegisterKind::Int32, ElementType::I32);
        let materialized = alloc.ensure_hardware(bank_reg);
        assert!(materialized.source.is_none());

        let constant = constant_register(ImmediateValue::SignedInt(4), ElementType::I32);
        let materialized = alloc.ensure_hardware(constant);
        assert!(materialized.source.is_some());
    }

    #[test]
    fn binding_map_rejects_double_bind() {
        let mut bindings = BindingMap::new();
        let reg = StructuredRegister::Primitive(VirtualRegister::bank(
            RegisterKind::Int32,
            0,
            ElementType::I32,
        ));
        bindings.bind(ValueId(0), reg.clone()).unwrap();
        assert!(bindings.bind(ValueId(0), reg).is_err());
    }

    #[test]
    fn binding_map_alias_shares_register() {
        let mut bindings = BindingMap::new();
        let reg = StructuredRegister::Primitive(VirtualRegister::bank(
            RegisterKind::Int32,
            0,
            ElementType::I32,
        ));
        bindings.bind(ValueId(0), reg).unwrap();
        bindings.alias(ValueId(1), ValueId(0)).unwrap();
        assert_eq!(bindings.load(ValueId(1)).unwrap(), bindings.load(ValueId(0)).unwrap());
    }
}
