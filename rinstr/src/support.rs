/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Process-wide runtime-instrumentation support.
//!
//! Before any thread can initialize instrumentation on s390, the process has
//! to own a handler for the RI signal and the kernel has to accept a start and
//! a stop request bound to that signal. This module does that once, under a
//! lock, and undoes the handler installation if either request fails.

use parking_lot::Mutex;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::backend::ProcessSupport;
use crate::backend::RiBackend;
use crate::error::Op;
use crate::error::SupportError;
use crate::signal::ri_signal_handler;
use crate::signal::SignalRegistrar;

/// Whether the RI signal handler is currently installed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SupportState {
    /// Nothing installed.
    Uninstalled,
    /// The handler is installed and the kernel accepted the RI requests.
    Installed,
}

/// The process-wide registration.
pub struct RiSupport<R> {
    registrar: R,
    signal: libc::c_int,
    state: Mutex<SupportState>,
}

impl<R: SignalRegistrar> RiSupport<R> {
    /// Creates the registration service for `signal`. Nothing is installed
    /// until [`RiSupport::enable`].
    pub fn new(registrar: R, signal: libc::c_int) -> Self {
        Self {
            registrar,
            signal,
            state: Mutex::new(SupportState::Uninstalled),
        }
    }

    /// The RI signal number.
    pub fn signal(&self) -> libc::c_int {
        self.signal
    }

    /// Current state.
    pub fn state(&self) -> SupportState {
        *self.state.lock()
    }

    /// The signal registrar in use.
    pub fn registrar(&self) -> &R {
        &self.registrar
    }

    /// Enables process-wide support for `backend`. Calling this again while
    /// support is installed does nothing.
    pub fn enable<B: RiBackend + ?Sized>(&self, backend: &B) -> Result<(), SupportError> {
        trace!(
            "[ri] ri_enable_support entry: backend {}, signal {}",
            backend.name(),
            self.signal
        );
        let result = self.enable_impl(backend);
        match &result {
            Ok(()) => trace!("[ri] ri_enable_support exit"),
            Err(err) => warn!(
                "[ri] ri_enable_support failed with {}: {}",
                err.code(),
                err
            ),
        }
        result
    }

    fn enable_impl<B: RiBackend + ?Sized>(&self, backend: &B) -> Result<(), SupportError> {
        match backend.process_support() {
            ProcessSupport::Unavailable => return Err(SupportError::Unavailable),
            ProcessSupport::NotRequired => return Ok(()),
            ProcessSupport::Signal => {}
        }

        let mut state = self.state.lock();
        if *state == SupportState::Installed {
            debug!("[ri] support already enabled, nothing to do");
            return Ok(());
        }

        self.registrar
            .register(self.signal, ri_signal_handler)
            .map_err(SupportError::Registration)?;

        if let Err(err) = backend.syscall_init() {
            self.unregister_after_failure();
            return Err(SupportError::StartSyscall(err.with_op(Op::EnableSupport)));
        }

        if let Err(err) = backend.syscall_deinit() {
            self.unregister_after_failure();
            return Err(SupportError::StopSyscall(err.with_op(Op::EnableSupport)));
        }

        *state = SupportState::Installed;
        Ok(())
    }

    fn unregister_after_failure(&self) {
        if let Err(errno) = self.registrar.unregister(self.signal) {
            warn!(
                "[ri] could not unregister signal {} after failure: {}",
                self.signal, errno
            );
        }
    }

    /// Removes the RI signal handler. Does nothing when support was never
    /// installed.
    pub fn disable(&self) -> Result<(), SupportError> {
        trace!("[ri] ri_disable_support entry: signal {}", self.signal);
        let mut state = self.state.lock();
        if *state == SupportState::Uninstalled {
            trace!("[ri] ri_disable_support exit: not installed");
            return Ok(());
        }

        match self.registrar.unregister(self.signal) {
            Ok(()) => {
                *state = SupportState::Uninstalled;
                trace!("[ri] ri_disable_support exit");
                Ok(())
            }
            Err(errno) => {
                let err = SupportError::Unregistration(errno);
                warn!("[ri] ri_disable_support failed with {}: {}", err.code(), err);
                Err(err)
            }
        }
    }
}
