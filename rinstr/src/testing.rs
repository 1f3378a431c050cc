/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Test doubles for the hardware and the signal registrar, so that the state
//! machine can be exercised on any machine without privileged instructions.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use syscalls::Errno;

use crate::backend::Mmcr0;
use crate::backend::RiFacility;
use crate::backend::RuntimeInstrCommand;
use crate::error::Error;
use crate::signal::SigInfoHandler;
use crate::signal::SignalRegistrar;

/// Installs a tracing subscriber that prints everything this crate logs.
/// Safe to call from every test; only the first call wins.
pub fn init_test_tracing() {
    let collector = tracing_subscriber::fmt()
        .with_env_filter("rinstr=trace")
        .with_test_writer()
        .finish();

    // Tests run in parallel and we don't care who wins.
    tracing::subscriber::set_global_default(collector).unwrap_or(());
}

#[derive(Debug, Default)]
struct HardwareLog {
    mmcr0_writes: Vec<u64>,
    no_mtspr: bool,
    rion_calls: usize,
    rioff_calls: usize,
    rion_cc: u32,
    rioff_cc: u32,
    syscalls: Vec<(RuntimeInstrCommand, libc::c_int)>,
    failures: HashMap<RuntimeInstrCommand, Errno>,
}

/// Fake POWER and s390 hardware that records every access. Clones share the
/// same log, so keep one clone in the test and hand the other to a backend.
#[derive(Debug, Default, Clone)]
pub struct MockHardware(Arc<Mutex<HardwareLog>>);

impl MockHardware {
    /// Hardware where everything succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `write_mmcr0` behave like a build without `mtspr`.
    pub fn without_mtspr(&self) {
        self.0.lock().no_mtspr = true;
    }

    /// Condition code returned by subsequent `RION`s.
    pub fn set_rion_cc(&self, cc: u32) {
        self.0.lock().rion_cc = cc;
    }

    /// Condition code returned by subsequent `RIOFF`s.
    pub fn set_rioff_cc(&self, cc: u32) {
        self.0.lock().rioff_cc = cc;
    }

    /// Makes every subsequent `command` syscall fail with `errno`.
    pub fn fail_syscall(&self, command: RuntimeInstrCommand, errno: Errno) {
        self.0.lock().failures.insert(command, errno);
    }

    /// Forgets all injected failures.
    pub fn clear_failures(&self) {
        let mut log = self.0.lock();
        log.failures.clear();
        log.rion_cc = 0;
        log.rioff_cc = 0;
        log.no_mtspr = false;
    }

    /// Every value written to `MMCR0`, in order.
    pub fn mmcr0_writes(&self) -> Vec<u64> {
        self.0.lock().mmcr0_writes.clone()
    }

    /// Number of `RION`s executed.
    pub fn rion_calls(&self) -> usize {
        self.0.lock().rion_calls
    }

    /// Number of `RIOFF`s executed.
    pub fn rioff_calls(&self) -> usize {
        self.0.lock().rioff_calls
    }

    /// Every syscall attempted, including failed ones, in order.
    pub fn syscalls(&self) -> Vec<(RuntimeInstrCommand, libc::c_int)> {
        self.0.lock().syscalls.clone()
    }
}

impl Mmcr0 for MockHardware {
    fn write_mmcr0(&self, value: u64) -> Result<(), Error> {
        let mut log = self.0.lock();
        if log.no_mtspr {
            return Err(Error::Unsupported);
        }
        log.mmcr0_writes.push(value);
        Ok(())
    }
}

impl RiFacility for MockHardware {
    fn rion(&self) -> u32 {
        let mut log = self.0.lock();
        log.rion_calls += 1;
        log.rion_cc
    }

    fn rioff(&self) -> u32 {
        let mut log = self.0.lock();
        log.rioff_calls += 1;
        log.rioff_cc
    }

    fn runtime_instr(
        &self,
        command: RuntimeInstrCommand,
        signal: libc::c_int,
    ) -> Result<(), Errno> {
        let mut log = self.0.lock();
        log.syscalls.push((command, signal));
        match log.failures.get(&command) {
            Some(errno) => Err(*errno),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
struct RegistrarLog {
    registered: Option<libc::c_int>,
    register_calls: usize,
    unregister_calls: usize,
    register_failure: Option<Errno>,
    unregister_failure: Option<Errno>,
}

/// A [`SignalRegistrar`] that never touches real signal dispositions.
#[derive(Debug, Default, Clone)]
pub struct MockRegistrar(Arc<Mutex<RegistrarLog>>);

impl MockRegistrar {
    /// A registrar where everything succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent registrations fail with `errno`.
    pub fn fail_register(&self, errno: Errno) {
        self.0.lock().register_failure = Some(errno);
    }

    /// Makes subsequent unregistrations fail with `errno`.
    pub fn fail_unregister(&self, errno: Errno) {
        self.0.lock().unregister_failure = Some(errno);
    }

    /// The signal that currently has a handler, if any.
    pub fn registered(&self) -> Option<libc::c_int> {
        self.0.lock().registered
    }

    /// Number of `register` calls, successful or not.
    pub fn register_calls(&self) -> usize {
        self.0.lock().register_calls
    }

    /// Number of `unregister` calls, successful or not.
    pub fn unregister_calls(&self) -> usize {
        self.0.lock().unregister_calls
    }
}

impl SignalRegistrar for MockRegistrar {
    fn register(&self, signo: libc::c_int, _handler: SigInfoHandler) -> Result<(), Errno> {
        let mut log = self.0.lock();
        log.register_calls += 1;
        if let Some(errno) = log.register_failure {
            return Err(errno);
        }
        log.registered = Some(signo);
        Ok(())
    }

    fn unregister(&self, signo: libc::c_int) -> Result<(), Errno> {
        let mut log = self.0.lock();
        log.unregister_calls += 1;
        if let Some(errno) = log.unregister_failure {
            return Err(errno);
        }
        if log.registered != Some(signo) {
            return Err(Errno::ENOENT);
        }
        log.registered = None;
        Ok(())
    }
}
