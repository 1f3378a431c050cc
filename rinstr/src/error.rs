/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Error handling.

use core::fmt;

pub use syscalls::Errno;
use thiserror::Error;

/// Sentinel reported for operations attempted before `initialize`.
pub const NOT_INITIALIZED_CODE: i32 = -1;

/// The operation an [`Error`] came from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Op {
    /// [`crate::RiController::initialize`].
    Initialize,
    /// [`crate::RiController::deinitialize`].
    Deinitialize,
    /// [`crate::RiController::enable`].
    Enable,
    /// [`crate::RiController::disable`].
    Disable,
    /// [`crate::RiController::enable_support`], which issues the start and
    /// stop syscalls itself.
    EnableSupport,
}

impl Op {
    /// Returns the name used for this operation in log events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialize => "ri_initialize",
            Self::Deinitialize => "ri_deinitialize",
            Self::Enable => "ri_enable",
            Self::Disable => "ri_disable",
            Self::EnableSupport => "ri_enable_support",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error from a per-thread runtime-instrumentation operation. None of these
/// change the caller's [`crate::RiParameters`].
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum Error {
    /// `enable` or `disable` was called before a successful `initialize`.
    #[error("runtime instrumentation is not initialized on this thread")]
    NotInitialized,

    /// The backend has no runtime-instrumentation hardware to drive.
    #[error("runtime instrumentation is not supported by this backend")]
    Unsupported,

    /// The platform has no per-thread setup step, so the operation declined to
    /// touch the state bits.
    #[error("{0} declined: no per-thread setup exists on this platform")]
    Declined(Op),

    /// `s390_runtime_instr(2)` failed.
    #[error("{op}: s390_runtime_instr failed: {errno}")]
    Syscall {
        /// The operation that issued the syscall.
        op: Op,
        /// The errno reported by the kernel.
        errno: Errno,
    },

    /// `RION` or `RIOFF` set a non-zero condition code.
    #[error("{op}: instruction set condition code {cc}")]
    ConditionCode {
        /// The operation that executed the instruction.
        op: Op,
        /// The condition code, 1 through 3.
        cc: u32,
    },

    /// The configured signal offset does not name a real-time signal.
    #[error("signal offset {0} is outside the real-time signal range")]
    InvalidSignal(i32),

    /// A low-level errno.
    #[error(transparent)]
    Errno(#[from] Errno),
}

impl Error {
    /// Returns the numeric detail logged for this failure: `-1` for "not
    /// initialized" and for an invalid signal offset, the condition code for
    /// instruction failures, the raw errno for syscall failures and `0` when
    /// there was nothing to do.
    pub fn code(&self) -> i32 {
        match self {
            Self::NotInitialized | Self::InvalidSignal(_) => NOT_INITIALIZED_CODE,
            Self::Unsupported | Self::Declined(_) => 0,
            Self::Syscall { errno, .. } => errno.into_raw(),
            Self::ConditionCode { cc, .. } => *cc as i32,
            Self::Errno(errno) => errno.into_raw(),
        }
    }

    /// Re-attributes an instruction or syscall failure to `op`. Other errors
    /// carry no operation and are returned unchanged.
    pub fn with_op(self, op: Op) -> Self {
        match self {
            Self::Syscall { errno, .. } => Self::Syscall { op, errno },
            Self::ConditionCode { cc, .. } => Self::ConditionCode { op, cc },
            other => other,
        }
    }

    /// True for errors that only mean "nothing to do here", as opposed to a
    /// real failure.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::Unsupported | Self::Declined(_))
    }
}

impl From<nix::errno::Errno> for Error {
    fn from(err: nix::errno::Errno) -> Self {
        Self::Errno(Errno::new(err as i32))
    }
}

/// An error from the process-wide support registration. [`SupportError::code`]
/// gives the legacy integer return code.
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum SupportError {
    /// Runtime instrumentation categorically does not exist here (zTPF).
    #[error("runtime instrumentation is unavailable on this platform")]
    Unavailable,

    /// Installing the RI signal handler failed.
    #[error("failed to register the runtime instrumentation signal handler: {0}")]
    Registration(Errno),

    /// The start syscall failed. The signal handler has been unregistered.
    #[error("failed to start runtime instrumentation: {0}")]
    StartSyscall(Error),

    /// The stop syscall failed. The signal handler has been unregistered.
    #[error("failed to stop runtime instrumentation: {0}")]
    StopSyscall(Error),

    /// Removing the RI signal handler failed.
    #[error("failed to unregister the runtime instrumentation signal handler: {0}")]
    Unregistration(Errno),
}

impl SupportError {
    /// Returns `-1`, `-2` or `-3`, the integer result of
    /// [`crate::RiController::enable_support_code`] and
    /// [`crate::RiController::disable_support_code`].
    pub fn code(&self) -> i32 {
        match self {
            Self::Unavailable | Self::Registration(_) | Self::Unregistration(_) => -1,
            Self::StartSyscall(_) => -2,
            Self::StopSyscall(_) => -3,
        }
    }
}

impl From<SupportError> for i32 {
    fn from(err: SupportError) -> i32 {
        err.code()
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(Error::NotInitialized, -1)]
    #[test_case(Error::InvalidSignal(4096), -1)]
    #[test_case(Error::Unsupported, 0)]
    #[test_case(Error::Declined(Op::Initialize), 0)]
    #[test_case(Error::ConditionCode { op: Op::Enable, cc: 2 }, 2)]
    #[test_case(Error::Syscall { op: Op::Initialize, errno: Errno::EINVAL }, libc::EINVAL)]
    #[test_case(Error::Errno(Errno::EPERM), libc::EPERM)]
    fn error_codes(err: Error, expected: i32) {
        assert_eq!(err.code(), expected);
    }

    #[test_case(SupportError::Unavailable, -1)]
    #[test_case(SupportError::Registration(Errno::EINVAL), -1)]
    #[test_case(SupportError::StartSyscall(Error::Unsupported), -2)]
    #[test_case(SupportError::StopSyscall(Error::Unsupported), -3)]
    #[test_case(SupportError::Unregistration(Errno::EINVAL), -1)]
    fn support_codes(err: SupportError, expected: i32) {
        assert_eq!(i32::from(err), expected);
    }

    #[test]
    fn with_op_only_touches_hardware_failures() {
        let err = Error::Syscall {
            op: Op::Initialize,
            errno: Errno::EINVAL,
        };
        assert_eq!(
            err.with_op(Op::EnableSupport),
            Error::Syscall {
                op: Op::EnableSupport,
                errno: Errno::EINVAL
            }
        );
        assert_eq!(
            Error::NotInitialized.with_op(Op::EnableSupport),
            Error::NotInitialized
        );
    }

    #[test]
    fn from_nix() {
        assert_eq!(
            Error::from(nix::errno::Errno::ENOBUFS),
            Error::Errno(Errno::ENOBUFS)
        );
    }

    #[test]
    fn display_names_the_operation() {
        let err = Error::ConditionCode {
            op: Op::Disable,
            cc: 3,
        };
        assert_eq!(err.to_string(), "ri_disable: instruction set condition code 3");
    }
}
