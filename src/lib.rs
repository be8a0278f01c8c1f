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

//! A PTX text code generator back end for a managed-language GPU compute
//! compiler (§1). The crate's only job is lowering an already-built,
//! already-verified IR to assembly text; it performs no optimization beyond
//! local peepholes folded into instruction selection, and never touches the
//! filesystem itself.
//!
//! Entry points: [`Backend::compile_method`] lowers one method to text,
//! [`Backend::finalize`] merges every compiled method into one module
//! (§6.1).

pub mod allocator;
pub mod capability;
pub mod debug_info;
pub mod emitter;
pub mod error;
pub mod instruction_table;
pub mod ir;
pub mod lowering;
pub mod module;
pub mod register;
pub mod strings;
pub mod target;
pub mod types;

pub use error::{CodegenError, Result};
pub use ir::{EntryPointDescriptor, Method};
pub use module::CompiledMethod;
pub use target::{BackendFlags, PointerWidth, TargetDescriptor};

use debug_info::DebugInfoSink;
use lowering::LoweringDispatcher;
use module::ModuleAssembler;

/// Owns the target configuration and accumulates compiled methods across
/// calls to [`Backend::compile_method`] until [`Backend::finalize`] merges
/// them into module text (§6.1).
pub struct Backend {
    target: TargetDescriptor,
    assembler: ModuleAssembler,
    file_index_base: usize,
}

impl Backend {
    pub fn new(target: TargetDescriptor) -> Result<Backend> {
        // Validates the target's architecture eagerly so a caller learns
        // about an unsupported arch before sinking work into lowering.
        capability::CapabilityGate::new(target.arch_major, target.arch_minor)?;
        let assembler = ModuleAssembler::new(target.clone());
        Ok(Backend {
            target,
            assembler,
            file_index_base: 0,
        })
    }

    /// Lowers one method to PTX text (§4.4 state machine). `entry` selects
    /// `.visible .entry` kernel-signature emission when present.
    pub fn compile_method(
        &mut self,
        method: &Method,
        entry: Option<&EntryPointDescriptor>,
    ) -> Result<CompiledMethod> {
        let debug = if self.target.emit_debug_info() {
            DebugInfoSink::line_emitter_with_base(None, self.file_index_base)
        } else {
            DebugInfoSink::noop()
        };
        let mut dispatcher = LoweringDispatcher::new(&self.target, debug)?;
        dispatcher.lower_method(method)?;
        self.file_index_base += dispatcher.debug_file_count();
        let file_decls = dispatcher.debug_file_declarations();
        let lowered = dispatcher.into_parts();
        Ok(CompiledMethod::new(method, entry, &self.target, lowered, file_decls))
    }

    /// Accumulates a compiled method into the module under construction, in
    /// the caller-supplied order the merge contract canonicalizes against
    /// (§5.1).
    pub fn add_method(&mut self, compiled: CompiledMethod) {
        self.assembler.add_method(compiled);
    }

    /// Consumes the backend and returns the final module text (§6 artifact
    /// layout).
    pub fn finalize(self) -> String {
        self.assembler.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::{BasicBlock, BasicBlockId, IrNode, IrType, NodeKind, Terminator, ValueId};
    use target::PointerWidth;
    use types::ElementType;

    fn trivial_method() -> Method {
        let node = IrNode {
            id: ValueId(0),
            ty: IrType::Primitive(ElementType::I32),
            kind: NodeKind::Null,
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
            name: "trivial".to_string(),
            params: vec![],
            blocks: vec![block],
            entry: BasicBlockId(0),
            locals: vec![],
            return_type: IrType::Void,
        }
    }

    #[test]
    fn compiling_and_finalizing_a_trivial_method_produces_module_text() {
        let target = TargetDescriptor::new(7, 5, "6.4").with_pointer_width(PointerWidth::Bits64);
        let mut backend = Backend::new(target).unwrap();
        let method = trivial_method();
        let compiled = backend.compile_method(&method, None).unwrap();
        backend.add_method(compiled);
        let text = backend.finalize();
        assert!(text.contains(".version 6.4"));
        assert!(text.contains(".func trivial"));
        assert!(text.contains("ret"));
    }

    #[test]
    fn unknown_architecture_is_rejected_at_construction() {
        let target = TargetDescriptor::new(1, 0, "6.4");
        assert!(Backend::new(target).is_err());
    }
}
