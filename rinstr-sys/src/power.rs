/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! POWER performance-monitor control through the `MMCR0` special-purpose
//! register.

use syscalls::Errno;

/// SPR number of Monitor Mode Control Register 0.
pub const SPRN_MMCR0: u32 = 795;

/// Freeze counters. Writing only this bit stops all sampling.
pub const MMCR0_FC: u64 = 0x8000_0000;

/// Performance monitor alert enable.
pub const MMCR0_PMAE: u64 = 0x0400_0000;

/// True if this build is able to emit `mtspr`.
pub const HAS_MTSPR: bool = cfg!(target_arch = "powerpc64");

/// Writes `value` into `MMCR0` with `mtspr`.
///
/// # Safety
///
/// `MMCR0` is privileged. Unless the kernel has granted problem-state access
/// to the performance monitor, the write raises `SIGILL`.
#[cfg(target_arch = "powerpc64")]
#[inline]
pub unsafe fn write_mmcr0(value: u64) -> Result<(), Errno> {
    unsafe {
        core::arch::asm!(
            "mtspr 795, {0}",
            in(reg) value,
            options(nostack, nomem, preserves_flags)
        );
    }
    Ok(())
}

/// Writes `value` into `MMCR0`. Always fails with `ENOSYS` on this
/// architecture.
///
/// # Safety
///
/// Always safe to call here; the signature matches the POWER version.
#[cfg(not(target_arch = "powerpc64"))]
#[inline]
pub unsafe fn write_mmcr0(_value: u64) -> Result<(), Errno> {
    Err(Errno::ENOSYS)
}
