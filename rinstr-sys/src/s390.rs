/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! s390x runtime-instrumentation instructions and the `s390_runtime_instr(2)`
//! system call.

use syscalls::Errno;

/// `s390_runtime_instr` command that starts runtime instrumentation for the
/// calling thread.
pub const S390_RUNTIME_INSTR_START: libc::c_int = 1;

/// `s390_runtime_instr` command that stops runtime instrumentation for the
/// calling thread.
pub const S390_RUNTIME_INSTR_STOP: libc::c_int = 2;

/// Condition code reported by the instruction stubs on architectures without
/// the facility.
pub const CC_NOT_OPERATIONAL: u32 = 3;

/// Executes `RION` and returns the resulting condition code. Zero means
/// instrumentation is now on.
///
/// # Safety
///
/// The thread must have a valid runtime-instrumentation control block loaded
/// by the kernel (see [`runtime_instr`]), otherwise the CPU raises a special
/// operation exception.
#[cfg(target_arch = "s390x")]
#[inline]
pub unsafe fn rion() -> u32 {
    let cc: u32;
    unsafe {
        core::arch::asm!(
            ".long 0xaa010000",
            "ipm {0}",
            "srl {0}, 28",
            out(reg) cc,
            options(nostack, nomem)
        );
    }
    cc
}

/// Executes `RIOFF` and returns the resulting condition code. Turning off
/// instrumentation that is already off is harmless.
///
/// # Safety
///
/// Same requirements as [`rion`].
#[cfg(target_arch = "s390x")]
#[inline]
pub unsafe fn rioff() -> u32 {
    let cc: u32;
    unsafe {
        core::arch::asm!(
            ".long 0xaa030000",
            "ipm {0}",
            "srl {0}, 28",
            out(reg) cc,
            options(nostack, nomem)
        );
    }
    cc
}

/// Calls `s390_runtime_instr(command, signum)`.
#[cfg(target_arch = "s390x")]
pub fn runtime_instr(command: libc::c_int, signum: libc::c_int) -> Result<(), Errno> {
    Errno::result(unsafe { libc::syscall(libc::SYS_s390_runtime_instr, command, signum) })
        .map(drop)
}

/// `RION` stub. Always reports [`CC_NOT_OPERATIONAL`].
///
/// # Safety
///
/// Always safe to call here; the signature matches the s390x version.
#[cfg(not(target_arch = "s390x"))]
#[inline]
pub unsafe fn rion() -> u32 {
    CC_NOT_OPERATIONAL
}

/// `RIOFF` stub. Always reports [`CC_NOT_OPERATIONAL`].
///
/// # Safety
///
/// Always safe to call here; the signature matches the s390x version.
#[cfg(not(target_arch = "s390x"))]
#[inline]
pub unsafe fn rioff() -> u32 {
    CC_NOT_OPERATIONAL
}

/// `s390_runtime_instr` stub. Always fails with `ENOSYS`.
#[cfg(not(target_arch = "s390x"))]
pub fn runtime_instr(_command: libc::c_int, _signum: libc::c_int) -> Result<(), Errno> {
    Err(Errno::ENOSYS)
}

#[cfg(all(test, not(target_arch = "s390x")))]
mod tests {
    use super::*;

    #[test]
    fn stubs_report_not_operational() {
        assert_eq!(unsafe { rion() }, CC_NOT_OPERATIONAL);
        assert_eq!(unsafe { rioff() }, CC_NOT_OPERATIONAL);
        assert_eq!(
            runtime_instr(S390_RUNTIME_INSTR_START, libc::SIGRTMIN()),
            Err(Errno::ENOSYS)
        );
    }
}
