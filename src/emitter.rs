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

//! Textual instruction serialization (§4.3). One `Emitter` wraps the
//! growing output buffer; each instruction is built fluently and flushed
//! with [`InstructionBuilder::finish`], mirroring the host repo's
//! `dump_instr` (one instruction written per call).

use crate::register::VirtualRegister;

pub struct Emitter<'a> {
    out: &'a mut String,
}

impl<'a> Emitter<'a> {
    pub fn new(out: &'a mut String) -> Self {
        Emitter { out }
    }

    pub fn instruction(&mut self) -> InstructionBuilder<'_> {
        InstructionBuilder {
            out: self.out,
            predicate: None,
            mnemonic_parts: Vec::new(),
            operands: Vec::new(),
            separator: ", ",
            terminator: ";\n",
        }
    }

    /// Writes a `<label>:\n` line, used at the start of each basic block
    /// (§4.4 "Body ... emitting labels").
    pub fn label(&mut self, name: &str) {
        self.out.push_str(name);
        self.out.push_str(":\n");
    }

    pub fn raw_line(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }
}

pub struct InstructionBuilder<'a> {
    out: &'a mut String,
    predicate: Option<(VirtualRegister, bool)>,
    mnemonic_parts: Vec<String>,
    operands: Vec<String>,
    separator: &'static str,
    terminator: &'static str,
}

impl<'a> InstructionBuilder<'a> {
    /// Prepends `@%p` or `@!%p` (negated) before the mnemonic (§4.3).
    pub fn predicated(mut self, reg: VirtualRegister, negate: bool) -> Self {
        self.predicate = Some((reg, negate));
        self
    }

    pub fn op(mut self, mnemonic: &str) -> Self {
        self.mnemonic_parts.push(mnemonic.to_string());
        self
    }

    pub fn suffix(mut self, suffix: &str) -> Self {
        if !suffix.is_empty() {
            self.mnemonic_parts.push(suffix.to_string());
        }
        self
    }

    pub fn operand_reg(mut self, reg: &VirtualRegister) -> Self {
        self.operands.push(reg.to_string());
        self
    }

    pub fn operand_raw(mut self, text: impl Into<String>) -> Self {
        self.operands.push(text.into());
        self
    }

    /// `[%rd3]` with optional byte offset `[%rd3+16]` (§4.3).
    pub fn operand_deref(mut self, reg: &VirtualRegister, offset: i64) -> Self {
        let text = if offset == 0 {
            format!("[{}]", reg)
        } else if offset > 0 {
            format!("[{}+{}]", reg, offset)
        } else {
            format!("[{}-{}]", reg, -offset)
        };
        self.operands.push(text);
        self
    }

    pub fn operand_immediate(mut self, value: i64) -> Self {
        self.operands.push(value.to_string());
        self
    }

    /// `{ %r1, %r2, %r3, %r4 }`, length 2 or 4 (§4.3 "vector operand
    /// group").
    pub fn operand_vector(mut self, regs: &[VirtualRegister]) -> Self {
        debug_assert!(regs.len() == 2 || regs.len() == 4);
        let joined = regs
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        self.operands.push(format!("{{{}}}", joined));
        self
    }

    /// Switches to a custom separator/terminator, used only for inline PTX
    /// (§4.3, §4.4 "Inline PTX emission": "serialized verbatim with an
    /// empty separator and empty terminator").
    pub fn raw_form(mut self, separator: &'static str, terminator: &'static str) -> Self {
        self.separator = separator;
        self.terminator = terminator;
        self
    }

    pub fn finish(self) {
        self.out.push('\t');
        if let Some((reg, negate)) = &self.predicate {
            if *negate {
                self.out.push_str(&format!("@!{} ", reg));
            } else {
                self.out.push_str(&format!("@{} ", reg));
            }
        }
        self.out.push_str(&self.mnemonic_parts.join("."));
        self.out.push_str(" \t");
        self.out.push_str(&self.operands.join(self.separator));
        self.out.push_str(self.terminator);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ElementType, RegisterKind};

    #[test]
    fn add_s32_matches_literal_scenario() {
        let mut buffer = String::new();
        let mut emitter = Emitter::new(&mut buffer);
        let r3 = VirtualRegister::bank(RegisterKind::Int32, 3, ElementType::I32);
        let r1 = VirtualRegister::bank(RegisterKind::Int32, 1, ElementType::I32);
        let r2 = VirtualRegister::bank(RegisterKind::Int32, 2, ElementType::I32);
        emitter
            .instruction()
            .op("add")
            .suffix("s32")
            .operand_reg(&r3)
            .operand_reg(&r1)
            .operand_reg(&r2)
            .finish();
        assert_eq!(buffer, "\tadd.s32 \t%r3, %r1, %r2;\n");
    }

    #[test]
    fn mov_f32_constant_matches_literal_scenario() {
        use crate::register::ImmediateValue;
        let mut buffer = String::new();
        let mut emitter = Emitter::new(&mut buffer);
        let f5 = VirtualRegister::bank(RegisterKind::Float32, 5, ElementType::F32);
        let one = VirtualRegister::constant(ImmediateValue::F32(1.0), ElementType::F32);
        emitter
            .instruction()
            .op("mov")
            .suffix("f32")
            .operand_reg(&f5)
            .operand_reg(&one)
            .finish();
        assert_eq!(buffer, "\tmov.f32 \t%f5, 0f3F800000;\n");
    }

    #[test]
    fn vector_load_matches_literal_scenario() {
        let mut buffer = String::new();
        let mut emitter = Emitter::new(&mut buffer);
        let rd1 = VirtualRegister::bank(RegisterKind::Int64, 1, ElementType::U64);
        let regs: Vec<VirtualRegister> = (10..14)
            .map(|id| VirtualRegister::bank(RegisterKind::Int32, id, ElementType::U32))
            .collect();
        emitter
            .instruction()
            .op("ld")
            .suffix("global")
            .suffix("v4")
            .suffix("u32")
            .operand_vector(&regs)
            .operand_deref(&rd1, 0)
            .finish();
        assert_eq!(
            buffer,
            "\tld.global.v4.u32 \t{%r10, %r11, %r12, %r13}, [%rd1];\n"
        );
    }

    #[test]
    fn predicated_instruction_prefixes_guard() {
        let mut buffer = String::new();
        let mut emitter = Emitter::new(&mut buffer);
        let p2 = VirtualRegister::bank(RegisterKind::Predicate, 2, ElementType::Predicate);
        let r1 = VirtualRegister::bank(RegisterKind::Int32, 1, ElementType::I32);
        let r2 = VirtualRegister::bank(RegisterKind::Int32, 2, ElementType::I32);
        emitter
            .instruction()
            .predicated(p2, true)
            .op("mov")
            .suffix("b32")
            .operand_reg(&r1)
            .operand_reg(&r2)
            .finish();
        assert_eq!(buffer, "\t@!%p2 mov.b32 \t%r1, %r2;\n");
    }

    #[test]
    fn inline_ptx_uses_empty_separator_and_terminator() {
        let mut buffer = String::new();
        let mut emitter = Emitter::new(&mut buffer);
        emitter
            .instruction()
            .raw_form("", "")
            .operand_raw("bar.sync 0;")
            .finish();
        assert_eq!(buffer, "\t \tbar.sync 0;");
    }
}
