/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use rinstr_sys::s390::S390_RUNTIME_INSTR_START;
use rinstr_sys::s390::S390_RUNTIME_INSTR_STOP;
use syscalls::Errno;

use super::ProcessSupport;
use super::RiBackend;
use crate::error::Error;
use crate::error::Op;

/// Commands understood by `s390_runtime_instr(2)`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RuntimeInstrCommand {
    /// Allocate a control block for the thread and start delivering RI
    /// interrupts to the bound signal.
    Start,
    /// Release the thread's control block.
    Stop,
}

impl RuntimeInstrCommand {
    /// The raw command number.
    pub fn as_raw(self) -> libc::c_int {
        match self {
            Self::Start => S390_RUNTIME_INSTR_START,
            Self::Stop => S390_RUNTIME_INSTR_STOP,
        }
    }
}

/// The s390 runtime-instrumentation facility: two instructions and one
/// syscall.
pub trait RiFacility {
    /// Executes `RION`, returning the condition code.
    fn rion(&self) -> u32;

    /// Executes `RIOFF`, returning the condition code.
    fn rioff(&self) -> u32;

    /// Calls `s390_runtime_instr(command, signal)`.
    fn runtime_instr(
        &self,
        command: RuntimeInstrCommand,
        signal: libc::c_int,
    ) -> Result<(), Errno>;
}

/// The real facility. Only [`crate::RiController::native`] can create one:
/// `RION` without a kernel control block raises `SIGILL`, and the controller
/// refuses `enable` until `initialize` has loaded that block.
#[derive(Debug, Copy, Clone)]
pub struct NativeRiFacility(());

impl NativeRiFacility {
    #[cfg_attr(not(target_arch = "s390x"), allow(dead_code))]
    pub(crate) const fn new() -> Self {
        Self(())
    }
}

impl RiFacility for NativeRiFacility {
    fn rion(&self) -> u32 {
        // SAFETY: only the controller holds a NativeRiFacility, and it calls
        // enable_hardware only once initialize issued the start syscall on
        // this thread.
        unsafe { rinstr_sys::s390::rion() }
    }

    fn rioff(&self) -> u32 {
        // SAFETY: as above.
        unsafe { rinstr_sys::s390::rioff() }
    }

    fn runtime_instr(
        &self,
        command: RuntimeInstrCommand,
        signal: libc::c_int,
    ) -> Result<(), Errno> {
        rinstr_sys::s390::runtime_instr(command.as_raw(), signal)
    }
}

/// Linux on Z backend.
#[derive(Debug, Clone)]
pub struct S390Ri<H = NativeRiFacility> {
    hw: H,
    signal: libc::c_int,
}

impl<H: RiFacility> S390Ri<H> {
    /// Creates the backend. `signal` is the real-time signal the kernel uses
    /// for buffer-full and halted interrupts; it must match the one the
    /// support registration installs a handler for.
    pub fn new(hw: H, signal: libc::c_int) -> Self {
        Self { hw, signal }
    }

    /// The RI signal number.
    pub fn signal(&self) -> libc::c_int {
        self.signal
    }

    /// The facility access in use.
    pub fn hardware(&self) -> &H {
        &self.hw
    }

    fn syscall(&self, op: Op, command: RuntimeInstrCommand) -> Result<(), Error> {
        self.hw
            .runtime_instr(command, self.signal)
            .map_err(|errno| Error::Syscall { op, errno })
    }
}

fn check_cc(op: Op, cc: u32) -> Result<(), Error> {
    match cc {
        0 => Ok(()),
        cc => Err(Error::ConditionCode { op, cc }),
    }
}

impl<H: RiFacility> RiBackend for S390Ri<H> {
    fn name(&self) -> &'static str {
        "s390"
    }

    fn supported(&self) -> bool {
        true
    }

    fn process_support(&self) -> ProcessSupport {
        ProcessSupport::Signal
    }

    fn enable_hardware(&self) -> Result<(), Error> {
        check_cc(Op::Enable, self.hw.rion())
    }

    fn disable_hardware(&self) -> Result<(), Error> {
        check_cc(Op::Disable, self.hw.rioff())
    }

    fn syscall_init(&self) -> Result<(), Error> {
        self.syscall(Op::Initialize, RuntimeInstrCommand::Start)
    }

    fn syscall_deinit(&self) -> Result<(), Error> {
        self.syscall(Op::Deinitialize, RuntimeInstrCommand::Stop)
    }
}
