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

//! Per-IR-node-kind lowering (§4.4): one dispatch function over the closed
//! [`NodeKind`] sum type (§9 "Polymorphic IR value visitor"), using
//! [`RegisterAllocator`]/[`BindingMap`] for SSA-to-register state,
//! [`InstructionTable`] for opcode selection, and [`Emitter`] for text.

use crate::allocator::{BindingMap, RegisterAllocator};
use crate::capability::CapabilityGate;
use crate::debug_info::DebugInfoSink;
use crate::emitter::Emitter;
use crate::error::{CodegenError, Result};
use crate::instruction_table::InstructionTable;
use crate::ir::{
    AlignmentArg, AlignmentOracle, BarrierScope, BasicBlockId, ConservativeAlignmentOracle,
    IrNode, IrType, Method, NodeKind, Terminator, ValueId,
};
use crate::register::{ImmediateValue, StructuredRegister, VirtualRegister};
use crate::strings::StringPool;
use crate::target::{PointerWidth, TargetDescriptor};
use crate::types::{AddressSpace, ElementType, RegisterKind};
use tracing::{debug, warn};

pub struct LoweringDispatcher<'a> {
    allocator: RegisterAllocator,
    bindings: BindingMap,
    strings: StringPool,
    target: &'a TargetDescriptor,
    capability: CapabilityGate,
    debug: DebugInfoSink,
    body: String,
    local_decls: Vec<String>,
    alignment_oracle: Box<dyn AlignmentOracle>,
}

/// Everything a method's lowering produced, handed to the module assembler
/// so it can merge strings and patch in declarations without re-lowering
/// anything (§6.1 `CompiledMethod`).
pub struct LoweredMethod {
    pub body: String,
    pub strings: StringPool,
    pub register_decls: Vec<String>,
    pub local_decls: Vec<String>,
}

impl<'a> LoweringDispatcher<'a> {
    pub fn new(target: &'a TargetDescriptor, debug: DebugInfoSink) -> Result<Self> {
        let capability = CapabilityGate::new(target.arch_major, target.arch_minor)?;
        Ok(LoweringDispatcher {
            allocator: RegisterAllocator::new(),
            bindings: BindingMap::new(),
            strings: StringPool::new(),
            target,
            capability,
            debug,
            body: String::new(),
            local_decls: Vec::new(),
            alignment_oracle: Box::new(ConservativeAlignmentOracle),
        })
    }

    fn pointer_kind(&self) -> RegisterKind {
        self.target.pointer_width.register_kind()
    }

    fn pointer_element_type(&self) -> ElementType {
        self.target.pointer_width.element_type()
    }

    fn emitter(&mut self) -> Emitter<'_> {
        Emitter::new(&mut self.body)
    }

    /// Lowers one method's body over its basic blocks in reverse post
    /// order (§4.4 state machine, `Body` state).
    pub fn lower_method(&mut self, method: &Method) -> Result<()> {
        let span = tracing::info_span!("compile_method", method = %method.name);
        let _enter = span.enter();

        self.bind_params(method)?;
        self.bind_locals(method)?;
        self.pre_bind_phis(method)?;

        for block_id in method.reverse_post_order() {
            let block = method.block(block_id);
            let label = block_label(block_id);
            self.emitter().label(&label);
            for node in &block.nodes {
                if matches!(node.kind, NodeKind::Phi { .. }) {
                    continue;
                }
                if let Some(loc_text) = self.debug.on_node(node.loc.as_ref()) {
                    self.body.push_str(&loc_text);
                }
                self.lower_node(node)?;
            }
            self.lower_terminator(method, block_id, &block.terminator)?;
        }

        let decls = self.allocator.declaration_lines();
        debug!(banks = decls.len(), "register declaration block ready");
        Ok(())
    }

    /// Distinct source files this method's debug sink has assigned an index
    /// to, used by the caller to advance the next method's file-index base
    /// (§5.1-style disjoint-range merge, avoiding a `.loc` text rewrite).
    pub fn debug_file_count(&self) -> usize {
        self.debug.file_count()
    }

    pub fn debug_file_declarations(&self) -> Vec<String> {
        self.debug.file_declarations()
    }

    pub fn into_parts(self) -> LoweredMethod {
        let register_decls = self.allocator.declaration_lines();
        LoweredMethod {
            body: self.body,
            strings: self.strings,
            register_decls,
            local_decls: self.local_decls,
        }
    }

    fn bind_params(&mut self, method: &Method) -> Result<()> {
        for (index, param) in method.params.iter().enumerate() {
            let structured = self.allocator.allocate_for(&param.ty, self.pointer_kind());
            self.bindings.bind(ValueId(index as u32), structured)?;
        }
        Ok(())
    }

    /// `LocalAllocas` state (§4.4): declares one `.local` depot per entry and
    /// binds its generic-space address to the value id immediately following
    /// the parameter list, matching `bind_params`'s index scheme.
    fn bind_locals(&mut self, method: &Method) -> Result<()> {
        let ptr_width = self.target.pointer_width.bytes();
        let element = self.pointer_element_type();
        for (index, local) in method.locals.iter().enumerate() {
            let depot = format!("__local_depot{}", index);
            let size = local.ty.byte_size(ptr_width).max(1);
            self.local_decls
                .push(format!("\t.local .align {} .b8 {}[{}];\n", local.align, depot, size));

            let depot_addr = self.allocator.allocate(element.register_kind(), element);
            self.emitter()
                .instruction()
                .op("mov")
                .suffix(element.ptx_suffix())
                .operand_reg(&depot_addr)
                .operand_raw(depot.clone())
                .finish();
            let generic_addr = self.allocator.allocate(element.register_kind(), element);
            let cvta = InstructionTable::address_space_cast(true, AddressSpace::Local, element.ptx_suffix());
            cvta.apply(self.emitter().instruction())
                .operand_reg(&generic_addr)
                .operand_reg(&depot_addr)
                .finish();
            self.allocator.free(&depot_addr);

            let value = ValueId(method.params.len() as u32 + index as u32);
            self.bindings.bind(value, StructuredRegister::Primitive(generic_addr))?;
        }
        Ok(())
    }

    fn pre_bind_phis(&mut self, method: &Method) -> Result<()> {
        for block in &method.blocks {
            for node in &block.nodes {
                if matches!(node.kind, NodeKind::Phi { .. }) {
                    let structured = self.allocator.allocate_for(&node.ty, self.pointer_kind());
                    self.bindings.bind(node.id, structured)?;
                }
            }
        }
        Ok(())
    }

    fn load(&self, value: ValueId) -> Result<StructuredRegister> {
        self.bindings.load(value).map(|reg| reg.clone())
    }

    fn primitive(&self, value: ValueId) -> Result<VirtualRegister> {
        Ok(*self.load(value)?.expect_primitive())
    }

    fn materialize(&mut self, reg: VirtualRegister) -> VirtualRegister {
        let materialized = self.allocator.ensure_hardware(reg);
        if let Some(source) = materialized.source {
            self.emitter()
                .instruction()
                .op("mov")
                .suffix(source.value_type.bitwise_suffix())
                .operand_reg(&materialized.register)
                .operand_reg(&source)
                .finish();
        }
        materialized.register
    }

    fn lower_node(&mut self, node: &IrNode) -> Result<()> {
        match node.kind.clone() {
            NodeKind::Unary { op, value } => self.lower_unary(node.id, &node.ty, op, value),
            NodeKind::Binary { op, lhs, rhs } => self.lower_binary(node.id, &node.ty, op, lhs, rhs),
            NodeKind::Ternary { op, a, b, c } => self.lower_ternary(node.id, &node.ty, op, a, b, c),
            NodeKind::Compare { op, unordered, lhs, rhs } => {
                self.lower_compare(node.id, op, unordered, lhs, rhs)
            }
            NodeKind::Convert { value } => self.lower_convert(node.id, &node.ty, value),
            NodeKind::Select { cond, if_true, if_false } => {
                self.lower_select(node.id, &node.ty, cond, if_true, if_false)
            }
            NodeKind::AtomicRmw { op, space, addr, operand, result_used } => {
                self.lower_atomic_rmw(node.id, &node.ty, op, space, addr, operand, result_used)
            }
            NodeKind::AtomicCas { space, addr, compare, new_value } => {
                self.lower_atomic_cas(node.id, &node.ty, space, addr, compare, new_value)
            }
            NodeKind::Load { space, addr } => self.lower_load(node.id, &node.ty, space, addr),
            NodeKind::Store { space, addr, value } => self.lower_store(space, addr, value),
            NodeKind::AddressOfElement { base, index, element_size } => {
                self.lower_address_of_element(node.id, base, index, element_size)
            }
            NodeKind::AddressOfField { base, offset } => {
                self.lower_address_of_field(node.id, base, offset)
            }
            NodeKind::AlignTo { ptr, alignment } => self.lower_align_to(node.id, ptr, alignment),
            NodeKind::Null => self.lower_null(node.id, &node.ty),
            NodeKind::StringConstant { text, encoding } => {
                self.lower_string_constant(node.id, text, encoding)
            }
            NodeKind::BuildStruct { fields } => self.lower_build_struct(node.id, &node.ty, fields),
            NodeKind::GetField { base, index } => self.lower_get_field(node.id, base, index),
            NodeKind::SetField { base, index, value } => {
                self.lower_set_field(node.id, base, index, value)
            }
            NodeKind::Intrinsic { kind, dim } => self.lower_intrinsic(node.id, kind, dim),
            NodeKind::DynamicSharedMemLen { element_size } => {
                self.lower_dynamic_shared_mem_len(node.id, element_size)
            }
            NodeKind::Shuffle { kind, value, delta, width } => {
                self.lower_shuffle(node.id, &node.ty, kind, value, delta, width)
            }
            NodeKind::Barrier { scope } => self.lower_barrier(scope),
            NodeKind::PredicateBarrier { op, predicate } => {
                self.lower_predicate_barrier(node.id, op, predicate)
            }
            NodeKind::MemoryBarrier { scope } => self.lower_memory_barrier(scope),
            NodeKind::InlinePtx { fragments, output_addr } => {
                self.lower_inline_ptx(node.id, &node.ty, fragments, output_addr)
            }
            NodeKind::Call { target, args, returns_value } => {
                self.lower_call(node.id, &node.ty, target, args, returns_value)
            }
            NodeKind::Phi { .. } => Ok(()),
            NodeKind::Unsupported(marker) => Err(CodegenError::InvalidIr(format!(
                "unsupported IR marker: {}",
                marker
            ))),
        }
    }

    fn lower_unary(&mut self, id: ValueId, ty: &IrType, op: crate::types::UnaryOp, value: ValueId) -> Result<()> {
        let element = element_of(ty)?;
        let mnemonic = InstructionTable::unary(
            op,
            element,
            self.target.fast_math(),
            self.capability.capabilities(),
            self.capability.arch(),
        )?;
        let src = self.primitive(value)?;
        let src = self.materialize(src);
        let dst = self.allocator.allocate(element.register_kind(), element);
        mnemonic
            .apply(self.emitter().instruction())
            .operand_reg(&dst)
            .operand_reg(&src)
            .finish();
        self.bindings.bind(id, StructuredRegister::Primitive(dst))
    }

    fn lower_binary(
        &mut self,
        id: ValueId,
        ty: &IrType,
        op: crate::types::BinaryOp,
        lhs: ValueId,
        rhs: ValueId,
    ) -> Result<()> {
        let element = element_of(ty)?;
        let lhs_reg = self.primitive(lhs)?;
        let rhs_reg = self.primitive(rhs)?;
        if lhs_reg.is_predicate() || rhs_reg.is_predicate() {
            return self.lower_boolean_binary(id, op, lhs_reg, rhs_reg);
        }
        let mnemonic = InstructionTable::binary(
            op,
            element,
            self.target.fast_math(),
            self.capability.capabilities(),
        )?;
        let lhs_reg = self.materialize(lhs_reg);
        let rhs_reg = self.materialize(rhs_reg);
        let dst = self.allocator.allocate(element.register_kind(), element);
        mnemonic
            .apply(self.emitter().instruction())
            .operand_reg(&dst)
            .operand_reg(&lhs_reg)
            .operand_reg(&rhs_reg)
            .finish();
        self.bindings.bind(id, StructuredRegister::Primitive(dst))
    }

    /// `Eq(a,b)` ⇒ `xor` then `not`; `Ne(a,b)` ⇒ `xor` (§4.4 "Arithmetic").
    fn lower_boolean_binary(
        &mut self,
        id: ValueId,
        op: crate::types::BinaryOp,
        lhs: VirtualRegister,
        rhs: VirtualRegister,
    ) -> Result<()> {
        use crate::types::BinaryOp;
        if !matches!(op, BinaryOp::Xor | BinaryOp::And | BinaryOp::Or) {
            return Err(CodegenError::InvalidIr(
                "predicate operands only support and/or/xor".to_string(),
            ));
        }
        let op_name = match op {
            BinaryOp::Xor => "xor",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            _ => unreachable!(),
        };
        let dst = self.allocator.allocate(RegisterKind::Predicate, ElementType::Predicate);
        self.emitter()
            .instruction()
            .op(op_name)
            .suffix("pred")
            .operand_reg(&dst)
            .operand_reg(&lhs)
            .operand_reg(&rhs)
            .finish();
        self.bindings.bind(id, StructuredRegister::Primitive(dst))
    }

    fn boolean_xor(&mut self, lhs: VirtualRegister, rhs: VirtualRegister) -> VirtualRegister {
        let dst = self.allocator.allocate(RegisterKind::Predicate, ElementType::Predicate);
        self.emitter()
            .instruction()
            .op("xor")
            .suffix("pred")
            .operand_reg(&dst)
            .operand_reg(&lhs)
            .operand_reg(&rhs)
            .finish();
        dst
    }

    fn lower_ternary(
        &mut self,
        id: ValueId,
        ty: &IrType,
        op: crate::types::TernaryOp,
        a: ValueId,
        b: ValueId,
        c: ValueId,
    ) -> Result<()> {
        let element = element_of(ty)?;
        let a_reg = self.primitive(a)?;
        let b_reg = self.primitive(b)?;
        let c_reg = self.primitive(c)?;

        // §4.1.1: widen 16-bit multiply-add operands through a 32-bit
        // temporary rather than emitting a nonexistent mad.lo.s16.
        let narrow = matches!(element, ElementType::I16 | ElementType::U16);
        let widened_element = if narrow {
            if element.is_signed_int() {
                ElementType::I32
            } else {
                ElementType::U32
            }
        } else {
            element
        };

        let a_wide = if narrow { self.widen_to_32(a_reg)? } else { self.materialize(a_reg) };
        let b_wide = if narrow { self.widen_to_32(b_reg)? } else { self.materialize(b_reg) };
        let c_wide = if narrow { self.widen_to_32(c_reg)? } else { self.materialize(c_reg) };

        let mnemonic = InstructionTable::ternary(op, widened_element)?;
        let wide_dst = self
            .allocator
            .allocate(widened_element.register_kind(), widened_element);
        mnemonic
            .apply(self.emitter().instruction())
            .operand_reg(&wide_dst)
            .operand_reg(&a_wide)
            .operand_reg(&b_wide)
            .operand_reg(&c_wide)
            .finish();

        let dst = if narrow {
            let truncated = self.allocator.allocate(element.register_kind(), element);
            let cvt = InstructionTable::convert(element, widened_element);
            cvt.apply(self.emitter().instruction())
                .operand_reg(&truncated)
                .operand_reg(&wide_dst)
                .finish();
            truncated
        } else {
            wide_dst
        };
        self.bindings.bind(id, StructuredRegister::Primitive(dst))
    }

    fn widen_to_32(&mut self, reg: VirtualRegister) -> Result<VirtualRegister> {
        let reg = self.materialize(reg);
        let widened_ty = if reg.value_type.is_signed_int() {
            ElementType::I32
        } else {
            ElementType::U32
        };
        let dst = self.allocator.allocate(RegisterKind::Int32, widened_ty);
        let cvt = InstructionTable::convert(widened_ty, reg.value_type);
        cvt.apply(self.emitter().instruction())
            .operand_reg(&dst)
            .operand_reg(&reg)
            .finish();
        Ok(dst)
    }

    fn lower_compare(
        &mut self,
        id: ValueId,
        op: crate::types::CompareOp,
        unordered: bool,
        lhs: ValueId,
        rhs: ValueId,
    ) -> Result<()> {
        use crate::types::CompareOp;
        let lhs_reg = self.primitive(lhs)?;
        let rhs_reg = self.primitive(rhs)?;
        if lhs_reg.is_predicate() || rhs_reg.is_predicate() {
            if !matches!(op, CompareOp::Eq | CompareOp::Ne) {
                return Err(CodegenError::InvalidIr(
                    "only eq/ne are defined for predicate-typed compare".to_string(),
                ));
            }
            let xor_result = self.boolean_xor(lhs_reg, rhs_reg);
            let dst = match op {
                CompareOp::Ne => xor_result,
                CompareOp::Eq => {
                    let dst = self.allocator.allocate(RegisterKind::Predicate, ElementType::Predicate);
                    self.emitter()
                        .instruction()
                        .op("not")
                        .suffix("pred")
                        .operand_reg(&dst)
                        .operand_reg(&xor_result)
                        .finish();
                    self.allocator.free(&xor_result);
                    dst
                }
                _ => unreachable!(),
            };
            return self.bindings.bind(id, StructuredRegister::Primitive(dst));
        }
        let element = lhs_reg.value_type;
        let lhs_reg = self.materialize(lhs_reg);
        let rhs_reg = self.materialize(rhs_reg);
        let mnemonic = InstructionTable::compare(op, element, unordered);
        let dst = self.allocator.allocate(RegisterKind::Predicate, ElementType::Predicate);
        mnemonic
            .apply(self.emitter().instruction())
            .operand_reg(&dst)
            .operand_reg(&lhs_reg)
            .operand_reg(&rhs_reg)
            .finish();
        self.bindings.bind(id, StructuredRegister::Primitive(dst))
    }

    fn lower_convert(&mut self, id: ValueId, ty: &IrType, value: ValueId) -> Result<()> {
        let dst_element = element_of(ty)?;
        let src = self.primitive(value)?;
        let src = self.materialize(src);
        let mnemonic = InstructionTable::convert(dst_element, src.value_type);
        let dst = self.allocator.allocate(dst_element.register_kind(), dst_element);
        mnemonic
            .apply(self.emitter().instruction())
            .operand_reg(&dst)
            .operand_reg(&src)
            .finish();
        self.bindings.bind(id, StructuredRegister::Primitive(dst))
    }

    fn lower_select(
        &mut self,
        id: ValueId,
        ty: &IrType,
        cond: ValueId,
        if_true: ValueId,
        if_false: ValueId,
    ) -> Result<()> {
        let cond_reg = self.primitive(cond)?;
        let true_reg = self.load(if_true)?;
        let false_reg = self.load(if_false)?;
        let result = self.select_recursive(ty, cond_reg, &true_reg, &false_reg)?;
        self.bindings.bind(id, result)
    }

    fn select_recursive(
        &mut self,
        ty: &IrType,
        cond: VirtualRegister,
        if_true: &StructuredRegister,
        if_false: &StructuredRegister,
    ) -> Result<StructuredRegister> {
        match (if_true, if_false) {
            (StructuredRegister::Compound { children: t, .. }, StructuredRegister::Compound { children: f, .. }) => {
                let field_types = struct_field_types(ty);
                let mut children = Vec::with_capacity(t.len());
                for (i, (tv, fv)) in t.iter().zip(f.iter()).enumerate() {
                    let field_ty = field_types.get(i).cloned().unwrap_or_else(|| ty.clone());
                    children.push(self.select_recursive(&field_ty, cond, tv, fv)?);
                }
                Ok(StructuredRegister::Compound { ty: ty.clone(), children })
            }
            (StructuredRegister::Primitive(t), StructuredRegister::Primitive(f)) => {
                Ok(StructuredRegister::Primitive(self.select_primitive(*t, *f, cond)?))
            }
            _ => Err(CodegenError::InternalInvariant(
                "select operands have mismatched structured-register shapes".to_string(),
            )),
        }
    }

    fn select_primitive(
        &mut self,
        if_true: VirtualRegister,
        if_false: VirtualRegister,
        cond: VirtualRegister,
    ) -> Result<VirtualRegister> {
        let element = if_true.value_type;
        if element == ElementType::Predicate {
            // Two predicated moves so both possibilities land in the same
            // output register (§4.4 "Predicate select").
            let dst = self.allocator.allocate(RegisterKind::Predicate, ElementType::Predicate);
            self.emitter()
                .instruction()
                .predicated(cond, false)
                .op("mov")
                .suffix("pred")
                .operand_reg(&dst)
                .operand_reg(&if_true)
                .finish();
            self.emitter()
                .instruction()
                .predicated(cond, true)
                .op("mov")
                .suffix("pred")
                .operand_reg(&dst)
                .operand_reg(&if_false)
                .finish();
            Ok(dst)
        } else {
            let if_true = self.materialize(if_true);
            let if_false = self.materialize(if_false);
            let dst = self.allocator.allocate(element.register_kind(), element);
            InstructionTable::select(element)
                .apply(self.emitter().instruction())
                .operand_reg(&dst)
                .operand_reg(&if_true)
                .operand_reg(&if_false)
                .operand_reg(&cond)
                .finish();
            Ok(dst)
        }
    }

    fn lower_atomic_rmw(
        &mut self,
        id: ValueId,
        ty: &IrType,
        op: crate::types::AtomicOp,
        space: AddressSpace,
        addr: ValueId,
        operand: ValueId,
        result_used: bool,
    ) -> Result<()> {
        let element = element_of(ty)?;
        let addr_reg = self.primitive(addr)?;
        let addr_reg = self.materialize(addr_reg);
        let operand_reg = self.primitive(operand)?;
        let operand_reg = self.materialize(operand_reg);
        let mnemonic = InstructionTable::atomic(op, element, space, result_used)?;
        let dst = if result_used {
            Some(self.allocator.allocate(element.register_kind(), element))
        } else {
            None
        };
        match dst {
            Some(dst) => {
                mnemonic
                    .apply(self.emitter().instruction())
                    .operand_reg(&dst)
                    .operand_deref(&addr_reg, 0)
                    .operand_reg(&operand_reg)
                    .finish();
                self.bindings.bind(id, StructuredRegister::Primitive(dst))?;
            }
            None => {
                mnemonic
                    .apply(self.emitter().instruction())
                    .operand_deref(&addr_reg, 0)
                    .operand_reg(&operand_reg)
                    .finish();
            }
        }
        Ok(())
    }

    fn lower_atomic_cas(
        &mut self,
        id: ValueId,
        ty: &IrType,
        space: AddressSpace,
        addr: ValueId,
        compare: ValueId,
        new_value: ValueId,
    ) -> Result<()> {
        let element = element_of(ty)?;
        let addr_reg = self.primitive(addr)?;
        let addr_reg = self.materialize(addr_reg);
        let compare_reg = self.primitive(compare)?;
        let compare_reg = self.materialize(compare_reg);
        let new_reg = self.primitive(new_value)?;
        let new_reg = self.materialize(new_reg);
        let mnemonic = InstructionTable::atomic_cas(element, space)?;
        let dst = self.allocator.allocate(element.register_kind(), element);
        mnemonic
            .apply(self.emitter().instruction())
            .operand_reg(&dst)
            .operand_deref(&addr_reg, 0)
            .operand_reg(&new_reg)
            .operand_reg(&compare_reg)
            .finish();
        self.bindings.bind(id, StructuredRegister::Primitive(dst))
    }

    fn lower_load(&mut self, id: ValueId, ty: &IrType, space: AddressSpace, addr: ValueId) -> Result<()> {
        let addr_reg = self.primitive(addr)?;
        let addr_reg = self.materialize(addr_reg);
        let pointer_align = self.pointer_alignment(addr, ty);
        let structured = self.allocator.allocate_for(ty, self.pointer_kind());
        self.load_store_structured(&structured, addr_reg, space, true, pointer_align)?;
        self.bindings.bind(id, structured)
    }

    fn lower_store(&mut self, space: AddressSpace, addr: ValueId, value: ValueId) -> Result<()> {
        let addr_reg = self.primitive(addr)?;
        let addr_reg = self.materialize(addr_reg);
        let structured = self.load(value)?;
        let pointer_align = self.pointer_alignment(addr, &structured.ir_type());
        self.load_store_structured(&structured, addr_reg, space, false, pointer_align)
    }

    /// The conservative lower-bound alignment of a pointer value, used to
    /// gate vectorized IO (§3.1, §6 `AlignmentOracle`).
    fn pointer_alignment(&self, addr: ValueId, pointee: &IrType) -> u32 {
        let pointer_width_bytes = self.target.pointer_width.bytes();
        self.alignment_oracle.alignment_of(addr, pointee, pointer_width_bytes)
    }

    /// Walks the structured register, grouping contiguous same-kind,
    /// power-of-two (2 or 4) runs into vector IO when both the
    /// struct-relative offset and the base pointer's declared alignment
    /// prove the vector access is safe, falling back to scalar IO
    /// otherwise (§4.4 "Load / Store", §8 property 5).
    fn load_store_structured(
        &mut self,
        structured: &StructuredRegister,
        base_addr: VirtualRegister,
        space: AddressSpace,
        is_load: bool,
        pointer_align: u32,
    ) -> Result<()> {
        let flat = structured.flatten();
        let mut offset: u32 = 0;
        let mut i = 0;
        while i < flat.len() {
            let reg = *flat[i];
            let elem_size = reg.value_type.byte_size();
            let is_predicate = reg.value_type == ElementType::Predicate;
            let mut run_len = 1;
            if !is_predicate {
                while run_len < 4
                    && i + run_len < flat.len()
                    && flat[i + run_len].value_type == reg.value_type
                {
                    run_len += 1;
                }
            }
            let vector_len: usize = if run_len >= 4 { 4 } else if run_len >= 2 { 2 } else { 1 };
            let vector_width = elem_size * vector_len as u32;
            let aligned = offset % vector_width == 0 && pointer_align >= vector_width;
            if !is_predicate && vector_len > 1 && aligned {
                let group: Vec<VirtualRegister> = (0..vector_len).map(|k| *flat[i + k]).collect();
                if is_load {
                    let mnemonic = InstructionTable::vector_load(space, reg.value_type, vector_len as u32);
                    mnemonic
                        .apply(self.emitter().instruction())
                        .operand_vector(&group)
                        .operand_deref(&base_addr, offset as i64)
                        .finish();
                } else {
                    let materialized: Vec<VirtualRegister> =
                        group.iter().map(|r| self.materialize(*r)).collect();
                    let mnemonic = InstructionTable::vector_store(space, reg.value_type, vector_len as u32);
                    mnemonic
                        .apply(self.emitter().instruction())
                        .operand_deref(&base_addr, offset as i64)
                        .operand_vector(&materialized)
                        .finish();
                }
                offset += elem_size * vector_len as u32;
                i += vector_len;
            } else {
                if !is_predicate && vector_len > 1 {
                    warn!(offset, elem_size, "vectorized access not provably aligned, falling back to scalar IO");
                }
                let mnemonic = if is_load {
                    InstructionTable::load(space, reg.value_type)
                } else {
                    InstructionTable::store(space, reg.value_type)
                };
                if is_load {
                    mnemonic
                        .apply(self.emitter().instruction())
                        .operand_reg(&reg)
                        .operand_deref(&base_addr, offset as i64)
                        .finish();
                } else {
                    let reg = self.materialize(reg);
                    mnemonic
                        .apply(self.emitter().instruction())
                        .operand_deref(&base_addr, offset as i64)
                        .operand_reg(&reg)
                        .finish();
                }
                offset += elem_size;
                i += 1;
            }
        }
        Ok(())
    }

    fn lower_address_of_element(&mut self, id: ValueId, base: ValueId, index: ValueId, element_size: u32) -> Result<()> {
        let base_reg = self.primitive(base)?;
        let base_reg = self.materialize(base_reg);
        let index_reg = self.primitive(index)?;
        let index_reg = self.materialize(index_reg);
        let ptr_element = self.pointer_element_type();
        let offset = self.allocator.allocate(self.pointer_kind(), ptr_element);
        if index_reg.value_type.bit_width() <= 32 && self.target.pointer_width == PointerWidth::Bits64 {
            self.emitter()
                .instruction()
                .op("mul")
                .suffix("wide")
                .suffix(index_reg.value_type.ptx_suffix())
                .operand_reg(&offset)
                .operand_reg(&index_reg)
                .operand_immediate(element_size as i64)
                .finish();
            let dst = self.allocator.allocate(self.pointer_kind(), ptr_element);
            self.emitter()
                .instruction()
                .op("add")
                .suffix(ptr_element.ptx_suffix())
                .operand_reg(&dst)
                .operand_reg(&base_reg)
                .operand_reg(&offset)
                .finish();
            self.allocator.free(&offset);
            self.bindings.bind(id, StructuredRegister::Primitive(dst))
        } else if index_reg.value_type.bit_width() <= 32 {
            // Pointer is already 32-bit: a widening multiply has nowhere to
            // widen into, so emit the plain 32-bit form.
            self.emitter()
                .instruction()
                .op("mul")
                .suffix("lo")
                .suffix(ptr_element.ptx_suffix())
                .operand_reg(&offset)
                .operand_reg(&index_reg)
                .operand_immediate(element_size as i64)
                .finish();
            let dst = self.allocator.allocate(self.pointer_kind(), ptr_element);
            self.emitter()
                .instruction()
                .op("add")
                .suffix(ptr_element.ptx_suffix())
                .operand_reg(&dst)
                .operand_reg(&base_reg)
                .operand_reg(&offset)
                .finish();
            self.allocator.free(&offset);
            self.bindings.bind(id, StructuredRegister::Primitive(dst))
        } else {
            let dst = self.allocator.allocate(self.pointer_kind(), ptr_element);
            self.emitter()
                .instruction()
                .op("mad")
                .suffix("lo")
                .suffix(ptr_element.ptx_suffix())
                .operand_reg(&dst)
                .operand_reg(&index_reg)
                .operand_immediate(element_size as i64)
                .operand_reg(&base_reg)
                .finish();
            self.allocator.free(&offset);
            self.bindings.bind(id, StructuredRegister::Primitive(dst))
        }
    }

    fn lower_address_of_field(&mut self, id: ValueId, base: ValueId, offset: u32) -> Result<()> {
        if offset == 0 {
            return self.bindings.alias(id, base);
        }
        let base_reg = self.primitive(base)?;
        let base_reg = self.materialize(base_reg);
        let ptr_element = self.pointer_element_type();
        let dst = self.allocator.allocate(self.pointer_kind(), ptr_element);
        self.emitter()
            .instruction()
            .op("add")
            .suffix(ptr_element.ptx_suffix())
            .operand_reg(&dst)
            .operand_reg(&base_reg)
            .operand_immediate(offset as i64)
            .finish();
        self.bindings.bind(id, StructuredRegister::Primitive(dst))
    }

    /// Predicate-split `AlignTo` (§4.4, §9 "Predicate vs. integer register
    /// duality"): `base_offset = ptr & (alignment-1)`; a predicated move
    /// handles the already-aligned case, a predicated add handles the rest.
    fn lower_align_to(&mut self, id: ValueId, ptr: ValueId, alignment: AlignmentArg) -> Result<()> {
        let ptr_reg = self.primitive(ptr)?;
        let ptr_reg = self.materialize(ptr_reg);
        let ptr_element = ptr_reg.value_type;

        let alignment_reg = match alignment {
            AlignmentArg::Constant(value) => {
                VirtualRegister::constant(ImmediateValue::UnsignedInt(value as u64), ptr_element)
            }
            AlignmentArg::Dynamic(value_id) => {
                let reg = self.primitive(value_id)?;
                self.materialize(reg)
            }
        };
        let alignment_reg = self.materialize(alignment_reg);

        let mask = self.allocator.allocate(ptr_element.register_kind(), ptr_element);
        self.emitter()
            .instruction()
            .op("sub")
            .suffix(ptr_element.ptx_suffix())
            .operand_reg(&mask)
            .operand_reg(&alignment_reg)
            .operand_immediate(1)
            .finish();

        let base_offset = self.allocator.allocate(ptr_element.register_kind(), ptr_element);
        self.emitter()
            .instruction()
            .op("and")
            .suffix(ptr_element.bitwise_suffix())
            .operand_reg(&base_offset)
            .operand_reg(&ptr_reg)
            .operand_reg(&mask)
            .finish();

        let is_zero = self.allocator.allocate(RegisterKind::Predicate, ElementType::Predicate);
        self.emitter()
            .instruction()
            .op("setp")
            .suffix("eq")
            .suffix(ptr_element.ptx_suffix())
            .operand_reg(&is_zero)
            .operand_reg(&base_offset)
            .operand_immediate(0)
            .finish();

        let remainder = self.allocator.allocate(ptr_element.register_kind(), ptr_element);
        self.emitter()
            .instruction()
            .op("sub")
            .suffix(ptr_element.ptx_suffix())
            .operand_reg(&remainder)
            .operand_reg(&alignment_reg)
            .operand_reg(&base_offset)
            .finish();

        let dst = self.allocator.allocate(ptr_element.register_kind(), ptr_element);
        self.emitter()
            .instruction()
            .predicated(is_zero, false)
            .op("mov")
            .suffix(ptr_element.ptx_suffix())
            .operand_reg(&dst)
            .operand_reg(&ptr_reg)
            .finish();
        self.emitter()
            .instruction()
            .predicated(is_zero, true)
            .op("add")
            .suffix(ptr_element.ptx_suffix())
            .operand_reg(&dst)
            .operand_reg(&ptr_reg)
            .operand_reg(&remainder)
            .finish();

        self.allocator.free(&mask);
        self.allocator.free(&base_offset);
        self.allocator.free(&is_zero);
        self.allocator.free(&remainder);
        self.bindings.bind(id, StructuredRegister::Primitive(dst))
    }

    fn lower_null(&mut self, id: ValueId, ty: &IrType) -> Result<()> {
        let structured = self.null_recursive(ty)?;
        self.bindings.bind(id, structured)
    }

    fn null_recursive(&mut self, ty: &IrType) -> Result<StructuredRegister> {
        match ty {
            IrType::Struct { fields, .. } => {
                let children = fields
                    .iter()
                    .map(|f| self.null_recursive(f))
                    .collect::<Result<Vec<_>>>()?;
                Ok(StructuredRegister::Compound { ty: ty.clone(), children })
            }
            IrType::Array { element, len } => {
                let children = (0..*len).map(|_| self.null_recursive(element)).collect::<Result<Vec<_>>>()?;
                Ok(StructuredRegister::Compound { ty: ty.clone(), children })
            }
            IrType::Pointer { .. } => {
                let element = self.pointer_element_type();
                let dst = self.allocator.allocate(element.register_kind(), element);
                self.emitter()
                    .instruction()
                    .op("mov")
                    .suffix(element.ptx_suffix())
                    .operand_reg(&dst)
                    .operand_immediate(0)
                    .finish();
                Ok(StructuredRegister::Primitive(dst))
            }
            IrType::Primitive(element) => {
                let dst = self.allocator.allocate(element.register_kind(), *element);
                self.emitter()
                    .instruction()
                    .op("mov")
                    .suffix(element.bitwise_suffix())
                    .operand_reg(&dst)
                    .operand_immediate(0)
                    .finish();
                Ok(StructuredRegister::Primitive(dst))
            }
            IrType::Void => Err(CodegenError::InvalidIr("null value of void type".to_string())),
        }
    }

    fn lower_string_constant(&mut self, id: ValueId, text: Vec<u8>, encoding: crate::ir::StringEncoding) -> Result<()> {
        let symbol = self.strings.intern(encoding, text);
        let symbol_name = self.strings.symbol_name(symbol);
        let element = self.pointer_element_type();
        let global_addr = self.allocator.allocate(element.register_kind(), element);
        self.emitter()
            .instruction()
            .op("mov")
            .suffix(element.ptx_suffix())
            .operand_reg(&global_addr)
            .operand_raw(symbol_name)
            .finish();
        let generic_addr = self.allocator.allocate(element.register_kind(), element);
        let mnemonic = InstructionTable::address_space_cast(true, AddressSpace::Global, element.ptx_suffix());
        mnemonic
            .apply(self.emitter().instruction())
            .operand_reg(&generic_addr)
            .operand_reg(&global_addr)
            .finish();
        self.allocator.free(&global_addr);
        self.bindings.bind(id, StructuredRegister::Primitive(generic_addr))
    }

    fn lower_build_struct(&mut self, id: ValueId, ty: &IrType, fields: Vec<ValueId>) -> Result<()> {
        let children = fields.iter().map(|f| self.load(*f)).collect::<Result<Vec<_>>>()?;
        self.bindings
            .bind(id, StructuredRegister::Compound { ty: ty.clone(), children })
    }

    fn lower_get_field(&mut self, id: ValueId, base: ValueId, index: usize) -> Result<()> {
        let base_reg = self.load(base)?;
        let field = base_reg.field(index).clone();
        self.bindings.bind(id, field)
    }

    fn lower_set_field(&mut self, id: ValueId, base: ValueId, index: usize, value: ValueId) -> Result<()> {
        let base_reg = self.load(base)?;
        let value_reg = self.load(value)?;
        let updated = base_reg.with_field(index, value_reg);
        self.bindings.bind(id, updated)
    }

    fn lower_intrinsic(&mut self, id: ValueId, kind: crate::register::IntrinsicKind, dim: Option<crate::register::Dimension>) -> Result<()> {
        let pseudo = VirtualRegister::intrinsic(kind, dim);
        let dst = self.allocator.allocate(RegisterKind::Int32, ElementType::U32);
        self.emitter()
            .instruction()
            .op("mov")
            .suffix("u32")
            .operand_reg(&dst)
            .operand_reg(&pseudo)
            .finish();
        self.bindings.bind(id, StructuredRegister::Primitive(dst))
    }

    fn lower_dynamic_shared_mem_len(&mut self, id: ValueId, element_size: u32) -> Result<()> {
        let pseudo = VirtualRegister::intrinsic(crate::register::IntrinsicKind::DynamicSharedMemSize, None);
        let bytes = self.allocator.allocate(RegisterKind::Int32, ElementType::U32);
        self.emitter()
            .instruction()
            .op("mov")
            .suffix("u32")
            .operand_reg(&bytes)
            .operand_reg(&pseudo)
            .finish();
        let dst = self.allocator.allocate(RegisterKind::Int32, ElementType::U32);
        self.emitter()
            .instruction()
            .op("div")
            .suffix("u32")
            .operand_reg(&dst)
            .operand_reg(&bytes)
            .operand_immediate(element_size as i64)
            .finish();
        self.allocator.free(&bytes);
        self.bindings.bind(id, StructuredRegister::Primitive(dst))
    }

    fn lower_shuffle(
        &mut self,
        id: ValueId,
        ty: &IrType,
        kind: crate::ir::ShuffleKind,
        value: ValueId,
        delta: ValueId,
        width: Option<ValueId>,
    ) -> Result<()> {
        let element = element_of(ty)?;
        let value_reg = self.primitive(value)?;
        let value_reg = self.materialize(value_reg);
        let delta_reg = self.primitive(delta)?;
        let delta_reg = self.materialize(delta_reg);

        let member_mask = VirtualRegister::constant(ImmediateValue::UnsignedInt(0xffff_ffff), ElementType::U32);
        let mask_reg = match width {
            None => {
                use crate::ir::ShuffleKind::*;
                let literal = match kind {
                    Up => 0,
                    Down | Bfly | Idx => 0x1f,
                };
                VirtualRegister::constant(ImmediateValue::UnsignedInt(literal), ElementType::U32)
            }
            Some(width_value) => {
                let width_reg = self.primitive(width_value)?;
                self.materialize(width_reg)
            }
        };

        let mnemonic = InstructionTable::shuffle(kind);
        let dst = self.allocator.allocate(element.register_kind(), element);
        mnemonic
            .apply(self.emitter().instruction())
            .operand_reg(&dst)
            .operand_reg(&value_reg)
            .operand_reg(&delta_reg)
            .operand_reg(&mask_reg)
            .operand_reg(&member_mask)
            .finish();
        self.bindings.bind(id, StructuredRegister::Primitive(dst))
    }

    fn lower_barrier(&mut self, scope: BarrierScope) -> Result<()> {
        let mnemonic = match scope {
            BarrierScope::Warp => InstructionTable::barrier_warp(),
            BarrierScope::Group => InstructionTable::barrier_group(),
        };
        let mut emitter = self.emitter();
        let mut builder = mnemonic.apply(emitter.instruction());
        builder = match scope {
            BarrierScope::Warp => builder.operand_immediate(0xffffffffu32 as i64),
            BarrierScope::Group => builder.operand_immediate(0),
        };
        builder.finish();
        Ok(())
    }

    fn lower_predicate_barrier(&mut self, id: ValueId, op: crate::ir::PredicateBarrierOp, predicate: ValueId) -> Result<()> {
        let pred_reg = self.primitive(predicate)?;
        let mnemonic = InstructionTable::predicate_barrier(op);
        let dst = self.allocator.allocate(RegisterKind::Int32, ElementType::U32);
        mnemonic
            .apply(self.emitter().instruction())
            .operand_reg(&dst)
            .operand_reg(&pred_reg)
            .finish();
        self.bindings.bind(id, StructuredRegister::Primitive(dst))
    }

    fn lower_memory_barrier(&mut self, scope: crate::ir::MemBarrierScope) -> Result<()> {
        let mnemonic = InstructionTable::memory_barrier(scope);
        mnemonic.apply(self.emitter().instruction()).finish();
        Ok(())
    }

    /// Serializes inline PTX verbatim with an empty separator/terminator,
    /// then stores the output register (if any) to the supplied address
    /// (§4.4 "Inline PTX emission"). The output register is allocated
    /// before the fragments are assembled, so a fragment's `Arg` can
    /// self-reference this node's own value to name its destination.
    fn lower_inline_ptx(
        &mut self,
        id: ValueId,
        ty: &IrType,
        fragments: Vec<crate::ir::InlinePtxFragment>,
        output_addr: Option<ValueId>,
    ) -> Result<()> {
        use crate::ir::InlinePtxFragment;
        let dst = if ty.is_void() {
            None
        } else {
            let element = element_of(ty)?;
            let dst = self.allocator.allocate(element.register_kind(), element);
            self.bindings.bind(id, StructuredRegister::Primitive(dst))?;
            Some(dst)
        };
        let mut text = String::new();
        for fragment in fragments {
            match fragment {
                InlinePtxFragment::Literal(lit) => text.push_str(&lit),
                InlinePtxFragment::Arg(value) => {
                    let reg = self.primitive(value)?;
                    text.push_str(&reg.to_string());
                }
            }
        }
        self.emitter().instruction().raw_form("", "").operand_raw(text).finish();
        if let Some(addr) = output_addr {
            let dst = dst.ok_or_else(|| {
                CodegenError::InvalidIr("inline PTX with an output address must have a non-void result type".to_string())
            })?;
            let addr_reg = self.primitive(addr)?;
            let addr_reg = self.materialize(addr_reg);
            let mnemonic = InstructionTable::store(AddressSpace::Generic, dst.value_type);
            mnemonic
                .apply(self.emitter().instruction())
                .operand_deref(&addr_reg, 0)
                .operand_reg(&dst)
                .finish();
        }
        Ok(())
    }

    fn lower_call(&mut self, id: ValueId, ty: &IrType, target: String, args: Vec<ValueId>, returns_value: bool) -> Result<()> {
        self.emitter().raw_line("\t{");
        let mut param_names = Vec::new();
        for (index, arg) in args.iter().enumerate() {
            let reg = self.primitive(*arg)?;
            let reg = self.materialize(reg);
            let name = format!(".param .b{} p{}", reg.value_type.bit_width(), index);
            self.emitter().raw_line(&format!("\t.param {} _{};", name, index));
            self.emitter()
                .instruction()
                .op("st")
                .suffix("param")
                .suffix(reg.value_type.bitwise_suffix())
                .operand_raw(format!("[_{}]", index))
                .operand_reg(&reg)
                .finish();
            param_names.push(format!("_{}", index));
        }
        let retval_name = if returns_value {
            self.emitter().raw_line("\t.param .b32 _retval;");
            Some("_retval".to_string())
        } else {
            None
        };
        let call_operands = param_names.join(", ");
        let call_text = match &retval_name {
            Some(retval) => format!("call ({}), {}, ({});", retval, target, call_operands),
            None => format!("call {}, ({});", target, call_operands),
        };
        self.emitter().raw_line(&format!("\t{}", call_text));
        self.emitter().raw_line("\t}");

        if returns_value {
            let element = element_of(ty)?;
            let dst = self.allocator.allocate(element.register_kind(), element);
            self.emitter()
                .instruction()
                .op("ld")
                .suffix("param")
                .suffix(element.bitwise_suffix())
                .operand_reg(&dst)
                .operand_raw("[_retval]")
                .finish();
            self.bindings.bind(id, StructuredRegister::Primitive(dst))
        } else {
            Ok(())
        }
    }

    fn lower_terminator(&mut self, method: &Method, from: BasicBlockId, terminator: &Terminator) -> Result<()> {
        match terminator {
            Terminator::Branch(target) => {
                self.emit_phi_moves(method, from, *target, None)?;
                let label = block_label(*target);
                self.emitter().instruction().op("bra").operand_raw(label).finish();
                Ok(())
            }
            Terminator::CondBranch { cond, if_true, if_false } => {
                let cond_reg = self.primitive(*cond)?;
                self.emit_phi_moves(method, from, *if_true, Some((cond_reg, false)))?;
                self.emit_phi_moves(method, from, *if_false, Some((cond_reg, true)))?;
                let true_label = block_label(*if_true);
                let false_label = block_label(*if_false);
                self.emitter()
                    .instruction()
                    .predicated(cond_reg, false)
                    .op("bra")
                    .operand_raw(true_label)
                    .finish();
                self.emitter().instruction().op("bra").operand_raw(false_label).finish();
                Ok(())
            }
            Terminator::Return(value) => {
                if let Some(value) = value {
                    let reg = self.primitive(*value)?;
                    let reg = self.materialize(reg);
                    self.emitter()
                        .instruction()
                        .op("st")
                        .suffix("param")
                        .suffix(reg.value_type.bitwise_suffix())
                        .operand_raw("[_retval]")
                        .operand_reg(&reg)
                        .finish();
                }
                self.emitter().instruction().op("ret").operand_raw("").finish();
                Ok(())
            }
        }
    }

    fn emit_phi_moves(
        &mut self,
        method: &Method,
        from: BasicBlockId,
        to: BasicBlockId,
        guard: Option<(VirtualRegister, bool)>,
    ) -> Result<()> {
        let target_block = method.block(to);
        let mut moves = Vec::new();
        for node in &target_block.nodes {
            if let NodeKind::Phi { incoming } = &node.kind {
                if let Some((_, src)) = incoming.iter().find(|(pred, _)| *pred == from) {
                    let dest = self.load(node.id)?;
                    let source = self.load(*src)?;
                    moves.push((dest, source));
                }
            }
        }
        for (dest, source) in moves {
            self.emit_structured_move(&dest, &source, guard)?;
        }
        Ok(())
    }

    fn emit_structured_move(
        &mut self,
        dest: &StructuredRegister,
        source: &StructuredRegister,
        guard: Option<(VirtualRegister, bool)>,
    ) -> Result<()> {
        match (dest, source) {
            (StructuredRegister::Primitive(d), StructuredRegister::Primitive(s)) => {
                let mut emitter = self.emitter();
                let mut builder = emitter.instruction();
                if let Some((reg, negate)) = guard {
                    builder = builder.predicated(reg, negate);
                }
                builder
                    .op("mov")
                    .suffix(d.value_type.bitwise_suffix())
                    .operand_reg(d)
                    .operand_reg(s)
                    .finish();
                Ok(())
            }
            (StructuredRegister::Compound { children: d, .. }, StructuredRegister::Compound { children: s, .. }) => {
                for (dc, sc) in d.iter().zip(s.iter()) {
                    self.emit_structured_move(dc, sc, guard)?;
                }
                Ok(())
            }
            _ => Err(CodegenError::InternalInvariant(
                "phi move between mismatched structured-register shapes".to_string(),
            )),
        }
    }
}

fn block_label(id: BasicBlockId) -> String {
    format!("$L{}", id.0)
}

fn element_of(ty: &IrType) -> Result<ElementType> {
    match ty {
        IrType::Primitive(element) => Ok(*element),
        other => Err(CodegenError::InvalidIr(format!(
            "expected a primitive element type, got {:?}",
            other
        ))),
    }
}

fn struct_field_types(ty: &IrType) -> Vec<IrType> {
    match ty {
        IrType::Struct { fields, .. } => fields.clone(),
        IrType::Array { element, len } => (0..*len).map(|_| (**element).clone()).collect(),
        other => vec![other.clone()],
    }
}
