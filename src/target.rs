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

//! The backend's whole configuration surface (§6, §1.1): a target
//! descriptor and a bitset of behavior flags.

use bitflags::bitflags;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

bitflags! {
    /// Behavior flags threaded through instruction selection and module
    /// assembly (§6 "flags (fast_math, enable_assertions, emit_debug_info,
    /// inline_source, inlining_enabled, optimization_level)").
    ///
    /// `optimization_level` isn't boolean, so it lives on
    /// [`TargetDescriptor`] directly; everything else here is a yes/no
    /// switch, mirroring the host repo's `RegisterFlags` bitset convention.
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct BackendFlags: u32 {
        const FAST_MATH        = 1 << 0;
        const ENABLE_ASSERTIONS = 1 << 1;
        const EMIT_DEBUG_INFO   = 1 << 2;
        const INLINE_SOURCE     = 1 << 3;
        const INLINING_ENABLED  = 1 << 4;
    }
}

impl Default for BackendFlags {
    fn default() -> Self {
        BackendFlags::empty()
    }
}

/// Pointer width in bits, fixed once per backend instance (§4.2 "Pointer
/// width").
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerWidth {
    Bits32,
    Bits64,
}

impl PointerWidth {
    pub fn bits(&self) -> u32 {
        match self {
            PointerWidth::Bits32 => 32,
            PointerWidth::Bits64 => 64,
        }
    }

    pub fn bytes(&self) -> u32 {
        self.bits() / 8
    }

    /// The register kind a raw pointer value is stored in.
    pub fn register_kind(&self) -> crate::types::RegisterKind {
        match self {
            PointerWidth::Bits32 => crate::types::RegisterKind::Int32,
            PointerWidth::Bits64 => crate::types::RegisterKind::Int64,
        }
    }

    /// The unsigned element type matching this pointer width, used to build
    /// `cvta`/address-arithmetic suffixes.
    pub fn element_type(&self) -> crate::types::ElementType {
        match self {
            PointerWidth::Bits32 => crate::types::ElementType::U32,
            PointerWidth::Bits64 => crate::types::ElementType::U64,
        }
    }
}

/// (§6 "Target descriptor"): architecture, instruction-set version, pointer
/// width, and behavior flags. This is the entire configuration surface this
/// crate exposes; loading actual CLI/config values into it is the
/// embedding driver's job.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TargetDescriptor {
    pub arch_major: u32,
    pub arch_minor: u32,
    pub isa_version: String,
    pub pointer_width: PointerWidth,
    pub flags: BackendFlags,
    pub optimization_level: u32,
}

impl TargetDescriptor {
    pub fn new(arch_major: u32, arch_minor: u32, isa_version: impl Into<String>) -> Self {
        TargetDescriptor {
            arch_major,
            arch_minor,
            isa_version: isa_version.into(),
            pointer_width: PointerWidth::Bits64,
            flags: BackendFlags::empty(),
            optimization_level: 0,
        }
    }

    pub fn with_flags(mut self, flags: BackendFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_pointer_width(mut self, width: PointerWidth) -> Self {
        self.pointer_width = width;
        self
    }

    /// The `.target sm_<major><minor>` token (§6 artifact layout line 3).
    pub fn shader_model(&self) -> String {
        format!("sm_{}{}", self.arch_major, self.arch_minor)
    }

    pub fn fast_math(&self) -> bool {
        self.flags.contains(BackendFlags::FAST_MATH)
    }

    pub fn emit_debug_info(&self) -> bool {
        self.flags.contains(BackendFlags::EMIT_DEBUG_INFO)
    }

    pub fn inline_source(&self) -> bool {
        self.flags.contains(BackendFlags::INLINE_SOURCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shader_model_formats_major_minor() {
        let target = TargetDescriptor::new(7, 5, "6.4");
        assert_eq!(target.shader_model(), "sm_75");
    }

    #[test]
    fn flags_default_to_strict_mode() {
        let target = TargetDescriptor::new(8, 0, "7.0");
        assert!(!target.fast_math());
        assert!(!target.emit_debug_info());
    }

    #[test]
    fn with_flags_enables_fast_math() {
        let target =
            TargetDescriptor::new(8, 0, "7.0").with_flags(BackendFlags::FAST_MATH);
        assert!(target.fast_math());
    }

    #[test]
    fn pointer_width_maps_to_register_kind_and_element_type() {
        assert_eq!(
            PointerWidth::Bits64.register_kind(),
            crate::types::RegisterKind::Int64
        );
        assert_eq!(PointerWidth::Bits32.bytes(), 4);
    }
}
