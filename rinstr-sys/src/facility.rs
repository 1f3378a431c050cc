/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Run-time detection of the runtime-instrumentation facility.

use lazy_static::lazy_static;

/// STFLE facility bit that advertises runtime instrumentation on z/Architecture.
pub const RI_FACILITY_BIT: usize = 64;

lazy_static! {
    static ref HAS_RUNTIME_INSTRUMENTATION: bool = probe();
}

/// Returns true if the CPU we are running on has a runtime-instrumentation
/// facility this crate knows how to drive. The probe runs once per process.
pub fn has_runtime_instrumentation() -> bool {
    *HAS_RUNTIME_INSTRUMENTATION
}

/// The extended facility list as stored by `STFLE`.
#[cfg_attr(not(target_arch = "s390x"), allow(dead_code))]
struct FacilityList([u64; 4]);

#[cfg_attr(not(target_arch = "s390x"), allow(dead_code))]
impl FacilityList {
    #[cfg(target_arch = "s390x")]
    fn store() -> Self {
        let mut list = [0u64; 4];
        // SAFETY: every s390x CPU supported by the toolchain has STFLE. r0
        // holds the number of doublewords minus one.
        unsafe {
            core::arch::asm!(
                "stfle 0({})",
                in(reg_addr) list.as_mut_ptr(),
                inout("r0") list.len() as u64 - 1 => _,
                options(nostack)
            );
        }
        Self(list)
    }

    /// Bits are numbered from the left.
    const fn test(&self, bit: usize) -> bool {
        bit < 256 && self.0[bit / 64] & (1 << (63 - (bit % 64))) != 0
    }
}

#[cfg(target_arch = "s390x")]
fn probe() -> bool {
    FacilityList::store().test(RI_FACILITY_BIT)
}

#[cfg(target_arch = "powerpc64")]
fn probe() -> bool {
    crate::power::HAS_MTSPR
}

#[cfg(not(any(target_arch = "s390x", target_arch = "powerpc64")))]
fn probe() -> bool {
    false
}
