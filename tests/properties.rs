//! Property-based tests for the universally-quantified invariants this
//! backend is expected to hold (§8 "Testable properties"). Each test name
//! cites the property it checks.

use proptest::prelude::*;
use ptx_codegen::allocator::RegisterAllocator;
use ptx_codegen::capability::CapabilityGate;
use ptx_codegen::instruction_table::InstructionTable;
use ptx_codegen::ir::{BasicBlock, BasicBlockId, IrNode, IrType, NodeKind, Param, StringEncoding, Terminator, ValueId};
use ptx_codegen::register::{ImmediateValue, VirtualRegister};
use ptx_codegen::strings::StringPool;
use ptx_codegen::types::{AddressSpace, BinaryOp, ElementType, OpKind, RegisterKind, UnaryOp};
use ptx_codegen::{Backend, CodegenError, Method, PointerWidth, TargetDescriptor};

/// A straight-line chain of `count` dependent adds: `v2 = v0 + v1`, `v3 = v2
/// + v0`, `v4 = v3 + v1`, ... Every node after the first two consumes a
/// value produced earlier in the same block, so a binding gap anywhere in
/// the chain surfaces as a lowering error on the last node.
fn chain_method(count: usize) -> Method {
    let mut nodes = Vec::with_capacity(count);
    let mut lhs = ValueId(0);
    let mut rhs = ValueId(1);
    let mut last_id = ValueId(1);
    for i in 0..count {
        let id = ValueId(2 + i as u32);
        nodes.push(IrNode {
            id,
            ty: IrType::Primitive(ElementType::I32),
            kind: NodeKind::Binary { op: BinaryOp::Add, lhs, rhs },
            loc: None,
        });
        lhs = id;
        rhs = if i % 2 == 0 { ValueId(0) } else { ValueId(1) };
        last_id = id;
    }
    let block = BasicBlock {
        id: BasicBlockId(0),
        nodes,
        terminator: Terminator::Return(Some(last_id)),
        predecessors: vec![],
    };
    Method {
        id: 0,
        name: "chain".to_string(),
        params: vec![
            Param::new("a", IrType::Primitive(ElementType::I32)),
            Param::new("b", IrType::Primitive(ElementType::I32)),
        ],
        blocks: vec![block],
        entry: BasicBlockId(0),
        locals: vec![],
        return_type: IrType::Primitive(ElementType::I32),
    }
}

/// A single-block method loading a 4-field struct of `i32`s through one
/// pointer parameter, used to probe vectorization gating under varying
/// struct alignments.
fn struct_load_method(align: u32) -> Method {
    let struct_ty = IrType::Struct {
        fields: vec![
            IrType::Primitive(ElementType::I32),
            IrType::Primitive(ElementType::I32),
            IrType::Primitive(ElementType::I32),
            IrType::Primitive(ElementType::I32),
        ],
        offsets: vec![0, 4, 8, 12],
        align,
    };
    let node = IrNode {
        id: ValueId(1),
        ty: struct_ty.clone(),
        kind: NodeKind::Load {
            space: AddressSpace::Global,
            addr: ValueId(0),
        },
        loc: None,
    };
    let block = BasicBlock {
        id: BasicBlockId(0),
        nodes: vec![node],
        terminator: Terminator::Return(None),
        predecessors: vec![],
    };
    Method {
        id: 0,
        name: "struct_load".to_string(),
        params: vec![Param::new("p", IrType::pointer(AddressSpace::Global, struct_ty))],
        blocks: vec![block],
        entry: BasicBlockId(0),
        locals: vec![],
        return_type: IrType::Void,
    }
}

fn int32_add_method() -> Method {
    let node = IrNode {
        id: ValueId(2),
        ty: IrType::Primitive(ElementType::I32),
        kind: NodeKind::Binary {
            op: BinaryOp::Add,
            lhs: ValueId(0),
            rhs: ValueId(1),
        },
        loc: None,
    };
    let block = BasicBlock {
        id: BasicBlockId(0),
        nodes: vec![node],
        terminator: Terminator::Return(Some(ValueId(2))),
        predecessors: vec![],
    };
    Method {
        id: 0,
        name: "add_determinism".to_string(),
        params: vec![
            Param::new("a", IrType::Primitive(ElementType::I32)),
            Param::new("b", IrType::Primitive(ElementType::I32)),
        ],
        blocks: vec![block],
        entry: BasicBlockId(0),
        locals: vec![],
        return_type: IrType::Primitive(ElementType::I32),
    }
}

fn compile_module(target: TargetDescriptor, method: &Method) -> String {
    let mut backend = Backend::new(target).expect("valid architecture");
    let compiled = backend.compile_method(method, None).unwrap();
    backend.add_method(compiled);
    backend.finalize()
}

proptest! {
    /// §8 property 1: determinism — identical inputs and target produce
    /// byte-identical output across runs.
    #[test]
    fn determinism_across_repeated_compiles(arch_minor in 0u32..8) {
        let target = TargetDescriptor::new(7, arch_minor, "6.4").with_pointer_width(PointerWidth::Bits64);
        let method = int32_add_method();
        let first = compile_module(target.clone(), &method);
        let second = compile_module(target, &method);
        prop_assert_eq!(first, second);
    }

    /// §8 property 6: fast-math gating — `add`/`sub`/`mul` on f32 carry
    /// `.ftz` only when fast-math is requested, never in strict mode.
    #[test]
    fn fast_math_gating_controls_ftz_suffix(fast_math in any::<bool>(), op_index in 0usize..3) {
        let op = [BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul][op_index];
        let caps = ptx_codegen::capability::CapabilitySet::default();
        let mnemonic = InstructionTable::binary(op, ElementType::F32, fast_math, caps).unwrap();
        let has_ftz = mnemonic.0.iter().any(|p| p == "ftz");
        prop_assert_eq!(has_ftz, fast_math);
    }

    /// §8 property 7: FP constant encoding — the textual form of an f32
    /// constant is always the big-endian hex of its IEEE-754 bit pattern.
    #[test]
    fn f32_constant_encoding_matches_bit_pattern(bits in any::<u32>()) {
        let value = f32::from_bits(bits);
        let reg = VirtualRegister::constant(ImmediateValue::F32(value), ElementType::F32);
        prop_assert_eq!(reg.to_string(), format!("0f{:08X}", value.to_bits()));
    }

    /// §8 property 7, f64 variant.
    #[test]
    fn f64_constant_encoding_matches_bit_pattern(bits in any::<u64>()) {
        let value = f64::from_bits(bits);
        let reg = VirtualRegister::constant(ImmediateValue::F64(value), ElementType::F64);
        prop_assert_eq!(reg.to_string(), format!("0d{:016X}", value.to_bits()));
    }

    /// §8 property 9: idempotent string interning — interning the same
    /// (encoding, bytes) pair twice always yields the same symbol.
    #[test]
    fn interning_same_bytes_is_idempotent(bytes in prop::collection::vec(any::<u8>(), 0..32)) {
        let mut pool = StringPool::new();
        let a = pool.intern(StringEncoding::Utf8, bytes.clone());
        let b = pool.intern(StringEncoding::Utf8, bytes);
        prop_assert_eq!(a, b);
    }

    /// §8 property 8: capability gating — `tanh.approx.f32` is rejected
    /// below sm_75 and accepted at or above it, matching the capability
    /// table exactly.
    #[test]
    fn capability_gating_matches_table_for_f32_tanh(major in 3u32..9, minor in 0u32..9) {
        let gate = CapabilityGate::new(major, minor).unwrap();
        let result = InstructionTable::unary(
            UnaryOp::Tanh,
            ElementType::F32,
            false,
            gate.capabilities(),
            gate.arch(),
        );
        let expect_supported = (major, minor) >= (7, 5);
        prop_assert_eq!(result.is_ok(), expect_supported);
        if !expect_supported {
            prop_assert!(matches!(
                result.unwrap_err(),
                CodegenError::UnsupportedOnArchitecture { op: OpKind::Unary(UnaryOp::Tanh), .. }
            ), "expected UnsupportedOnArchitecture error");
        }
    }

    /// §8 property 3: SSA coverage — every value in a dependent chain of
    /// arbitrary length is bound before the node that consumes it lowers,
    /// so compilation never fails with a "used before being bound" error.
    #[test]
    fn ssa_coverage_holds_across_dependent_value_chains(count in 1usize..24) {
        let method = chain_method(count);
        let target = TargetDescriptor::new(7, 5, "6.4").with_pointer_width(PointerWidth::Bits64);
        let mut backend = Backend::new(target).expect("valid architecture");
        prop_assert!(backend.compile_method(&method, None).is_ok());
    }

    /// §8 property 4: address-space soundness — the `<space>` suffix on an
    /// emitted `ld` always matches the address space the `Load` node
    /// declares, and the generic space emits no suffix at all.
    #[test]
    fn load_suffix_matches_declared_address_space(space_index in 0usize..5) {
        let spaces = [
            AddressSpace::Generic,
            AddressSpace::Global,
            AddressSpace::Shared,
            AddressSpace::Local,
            AddressSpace::Param,
        ];
        let space = spaces[space_index];
        let node = IrNode {
            id: ValueId(1),
            ty: IrType::Primitive(ElementType::I32),
            kind: NodeKind::Load { space, addr: ValueId(0) },
            loc: None,
        };
        let block = BasicBlock {
            id: BasicBlockId(0),
            nodes: vec![node],
            terminator: Terminator::Return(Some(ValueId(1))),
            predecessors: vec![],
        };
        let method = Method {
            id: 0,
            name: "addr_space_probe".to_string(),
            params: vec![Param::new(
                "p",
                IrType::pointer(AddressSpace::Generic, IrType::Primitive(ElementType::I32)),
            )],
            blocks: vec![block],
            entry: BasicBlockId(0),
            locals: vec![],
            return_type: IrType::Primitive(ElementType::I32),
        };
        let target = TargetDescriptor::new(7, 5, "6.4").with_pointer_width(PointerWidth::Bits64);
        let text = compile_module(target, &method);
        let expected_mnemonic = if space.suffix().is_empty() {
            "ld.s32".to_string()
        } else {
            format!("ld.{}.s32", space.suffix())
        };
        prop_assert!(text.contains(&expected_mnemonic));
        for other in spaces.iter().filter(|s| **s != space && !s.suffix().is_empty()) {
            prop_assert!(!text.contains(&format!("ld.{}.s32", other.suffix())), "unexpected mnemonic for other space");
        }
    }

    /// §8 property 5: vectorization safety — a `v4` load is only ever
    /// emitted when the base pointer's declared alignment is at least the
    /// vector width, regardless of how favorably the struct's fields land.
    #[test]
    fn vectorized_load_requires_pointer_alignment_at_least_vector_width(align_index in 0usize..3) {
        let aligns = [4u32, 8, 16];
        let align = aligns[align_index];
        let method = struct_load_method(align);
        let target = TargetDescriptor::new(7, 5, "6.4").with_pointer_width(PointerWidth::Bits64);
        let text = compile_module(target, &method);
        let has_v4 = text.contains(".v4.");
        prop_assert_eq!(has_v4, align >= 16);
    }

    /// §8 property 2: register declaration tightness — the declared count
    /// for a bank always equals the peak id the allocator ever minted in
    /// that bank, regardless of how many registers were freed along the
    /// way.
    #[test]
    fn declaration_count_tracks_peak_allocation(allocate_then_free in prop::collection::vec(any::<bool>(), 0..40)) {
        let mut allocator = RegisterAllocator::new();
        let mut live = Vec::new();
        for free_now in allocate_then_free {
            let reg = allocator.allocate(RegisterKind::Int32, ElementType::I32);
            live.push(reg);
            if free_now {
                if let Some(reg) = live.pop() {
                    allocator.free(&reg);
                }
            }
        }
        let peak = allocator.peak_counts()[2]; // Int32 bank index
        let decls = allocator.declaration_lines();
        if peak == 0 {
            prop_assert!(decls.is_empty());
        } else {
            let expected = format!("\t.reg .b32 \t%r<{}>;\n", peak);
            prop_assert!(decls.contains(&expected));
        }
    }
}
