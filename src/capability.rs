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

//! Capability gate (§4.6, §9 "Capability gate as data, not code"): a tagged
//! record of booleans indexed by architecture, built from a table rather
//! than branching code.

use crate::error::{ArchVersion, CodegenError};

/// Minimum supported major architecture version (§4.6: "Architectures below
/// the minimum supported are rejected at backend construction").
pub const MIN_ARCH_MAJOR: u32 = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    pub f16_min: bool,
    pub f16_max: bool,
    pub f16_tanh: bool,
    pub f32_tanh: bool,
    pub f16_arith_ftz: bool,
    pub warp_shuffle_sync: bool,
}

/// Row of the capability table: the minimum (major, minor) at which each
/// capability turns on.
struct CapabilityRow {
    major: u32,
    minor: u32,
    set: CapabilitySet,
}

/// Table entries, checked in order; later rows narrow or extend the
/// feature set relative to earlier ones by listing everything true *at and
/// above* that version.
const TABLE: &[CapabilityRow] = &[
    CapabilityRow {
        major: 3,
        minor: 0,
        set: CapabilitySet {
            f16_min: false,
            f16_max: false,
            f16_tanh: false,
            f32_tanh: false,
            f16_arith_ftz: false,
            warp_shuffle_sync: false,
        },
    },
    CapabilityRow {
        major: 6,
        minor: 0,
        set: CapabilitySet {
            f16_min: true,
            f16_max: true,
            f16_tanh: false,
            f32_tanh: false,
            f16_arith_ftz: true,
            warp_shuffle_sync: true,
        },
    },
    CapabilityRow {
        major: 7,
        minor: 0,
        set: CapabilitySet {
            f16_min: true,
            f16_max: true,
            f16_tanh: true,
            f32_tanh: false,
            f16_arith_ftz: true,
            warp_shuffle_sync: true,
        },
    },
    CapabilityRow {
        major: 7,
        minor: 5,
        set: CapabilitySet {
            f16_min: true,
            f16_max: true,
            f16_tanh: true,
            f32_tanh: true,
            f16_arith_ftz: true,
            warp_shuffle_sync: true,
        },
    },
];

/// Looks up the capability set for a given architecture version, refusing
/// anything below [`MIN_ARCH_MAJOR`] (§4.6).
#[derive(Debug, Clone, Copy)]
pub struct CapabilityGate {
    arch: ArchVersion,
    set: CapabilitySet,
}

impl CapabilityGate {
    pub fn new(major: u32, minor: u32) -> Result<CapabilityGate, CodegenError> {
        if major < MIN_ARCH_MAJOR {
            return Err(CodegenError::UnknownArchitecture { major, minor });
        }
        let mut set = TABLE[0].set;
        for row in TABLE {
            if (row.major, row.minor) <= (major, minor) {
                set = row.set;
            } else {
                break;
            }
        }
        Ok(CapabilityGate {
            arch: ArchVersion { major, minor },
            set,
        })
    }

    pub fn arch(&self) -> ArchVersion {
        self.arch
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.set
    }

    pub fn require(&self, predicate: bool) -> Result<(), ArchVersion> {
        if predicate {
            Ok(())
        } else {
            Err(self.arch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_minimum_major_is_rejected() {
        let result = CapabilityGate::new(2, 0);
        assert!(matches!(
            result,
            Err(CodegenError::UnknownArchitecture { major: 2, minor: 0 })
        ));
    }

    #[test]
    fn sm_60_enables_f16_min_max_but_not_tanh() {
        let gate = CapabilityGate::new(6, 0).unwrap();
        let caps = gate.capabilities();
        assert!(caps.f16_min);
        assert!(caps.f16_max);
        assert!(!caps.f16_tanh);
    }

    #[test]
    fn sm_75_enables_f32_tanh() {
        let gate = CapabilityGate::new(7, 5).unwrap();
        assert!(gate.capabilities().f32_tanh);
    }

    #[test]
    fn intermediate_minor_inherits_nearest_lower_row() {
        let gate = CapabilityGate::new(7, 2).unwrap();
        let caps = gate.capabilities();
        assert!(caps.f16_tanh);
        assert!(!caps.f32_tanh);
    }
}
