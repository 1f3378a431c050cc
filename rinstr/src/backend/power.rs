/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use rinstr_sys::power::MMCR0_FC;
use rinstr_sys::power::MMCR0_PMAE;
use syscalls::Errno;

use super::ProcessSupport;
use super::RiBackend;
use crate::error::Error;
use crate::error::Op;

/// Write access to the POWER `MMCR0` register.
pub trait Mmcr0 {
    /// Stores `value` into `MMCR0`. Reports [`Error::Unsupported`] if the
    /// build cannot emit `mtspr`.
    fn write_mmcr0(&self, value: u64) -> Result<(), Error>;
}

/// The real register. Only [`crate::RiController::native`] can create one,
/// so every write goes through the controller's state checks.
#[derive(Debug, Copy, Clone)]
pub struct NativeMmcr0(());

impl NativeMmcr0 {
    #[cfg_attr(not(target_arch = "powerpc64"), allow(dead_code))]
    pub(crate) const fn new() -> Self {
        Self(())
    }
}

impl Mmcr0 for NativeMmcr0 {
    fn write_mmcr0(&self, value: u64) -> Result<(), Error> {
        // SAFETY: the worst outcome of a privileged write from problem state
        // is SIGILL, which callers accept by choosing this backend.
        match unsafe { rinstr_sys::power::write_mmcr0(value) } {
            Ok(()) => Ok(()),
            Err(Errno::ENOSYS) => Err(Error::Unsupported),
            Err(errno) => Err(errno.into()),
        }
    }
}

/// POWER backend: instrumentation is the performance monitor, switched by
/// writing `MMCR0`.
///
/// There is no per-thread setup on POWER. Unless built
/// [`with_thread_init`](PowerSpr::with_thread_init), `initialize` and
/// `deinitialize` decline, leaving the initialized bit clear.
#[derive(Debug, Default, Clone)]
pub struct PowerSpr<H = NativeMmcr0> {
    hw: H,
    thread_init: bool,
}

impl<H: Mmcr0> PowerSpr<H> {
    /// Creates the backend on top of `hw`.
    pub fn new(hw: H) -> Self {
        Self {
            hw,
            thread_init: false,
        }
    }

    /// Lets `initialize`/`deinitialize` succeed without doing anything.
    pub fn with_thread_init(mut self, thread_init: bool) -> Self {
        self.thread_init = thread_init;
        self
    }

    /// The register access in use.
    pub fn hardware(&self) -> &H {
        &self.hw
    }
}

impl<H: Mmcr0> RiBackend for PowerSpr<H> {
    fn name(&self) -> &'static str {
        "power-spr"
    }

    fn supported(&self) -> bool {
        true
    }

    fn process_support(&self) -> ProcessSupport {
        ProcessSupport::NotRequired
    }

    fn enable_hardware(&self) -> Result<(), Error> {
        self.hw.write_mmcr0(MMCR0_PMAE)
    }

    fn disable_hardware(&self) -> Result<(), Error> {
        self.hw.write_mmcr0(MMCR0_FC)
    }

    fn syscall_init(&self) -> Result<(), Error> {
        if self.thread_init {
            Ok(())
        } else {
            Err(Error::Declined(Op::Initialize))
        }
    }

    fn syscall_deinit(&self) -> Result<(), Error> {
        if self.thread_init {
            Ok(())
        } else {
            Err(Error::Declined(Op::Deinitialize))
        }
    }
}
