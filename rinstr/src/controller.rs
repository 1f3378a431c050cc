/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The runtime-instrumentation state machine.
//!
//! ```text
//!                initialize             enable
//! UNINITIALIZED ------------> INITIALIZED ------> ENABLED
//!      ^                       |     ^               |
//!      +-----------------------+     +---------------+
//!              deinitialize              disable
//! ```
//!
//! Every transition runs the backend hook first and only updates
//! [`RiParameters`] if the hook succeeded. A failed or refused operation
//! leaves the state bits exactly as they were, logs, and returns the error.

use core::ptr::NonNull;

use once_cell::sync::OnceCell;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::backend::native_backend;
use crate::backend::DynBackend;
use crate::backend::RiBackend;
use crate::config::Config;
use crate::control_block::RiControlBlock;
use crate::error::Error;
use crate::error::Op;
use crate::error::SupportError;
use crate::params::RiFlags;
use crate::params::RiParameters;
use crate::signal::SigactionRegistrar;
use crate::signal::SignalRegistrar;
use crate::support::RiSupport;
use crate::support::SupportState;

/// Drives runtime instrumentation through a [`RiBackend`].
///
/// The controller itself is shared by all threads. Each thread brings its own
/// [`RiParameters`], and the per-thread operations only ever act on the
/// calling thread's hardware.
pub struct RiController<B = DynBackend, R = SigactionRegistrar> {
    backend: B,
    support: RiSupport<R>,
    config: Config,
}

static NATIVE: OnceCell<RiController> = OnceCell::new();

/// Sets up the process-wide controller for the CPU we are running on. Only the
/// first call's `config` is used; later calls return the same controller.
pub fn init_native(config: Config) -> Result<&'static RiController, Error> {
    NATIVE.get_or_try_init(|| RiController::native(config))
}

/// The process-wide controller, if [`init_native`] has run.
pub fn native() -> Option<&'static RiController> {
    NATIVE.get()
}

impl RiController {
    /// Creates a controller for the CPU we are running on.
    pub fn native(config: Config) -> Result<Self, Error> {
        let backend = native_backend(&config)?;
        Self::new(backend, SigactionRegistrar::new(), config)
    }
}

impl<B: RiBackend, R: SignalRegistrar> RiController<B, R> {
    /// Creates a controller from its parts. The RI signal comes from
    /// `config`, and must match the one `backend` binds its syscalls to.
    pub fn new(backend: B, registrar: R, config: Config) -> Result<Self, Error> {
        let signal = config.signal()?;
        Ok(Self {
            backend,
            support: RiSupport::new(registrar, signal),
            config,
        })
    }

    /// Short name of the backend in use.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// The configuration this controller was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The process-wide support registration.
    pub fn support(&self) -> &RiSupport<R> {
        &self.support
    }

    /// True if process-wide support is currently installed.
    pub fn support_enabled(&self) -> bool {
        self.support.state() == SupportState::Installed
    }

    /// Resets `params` to the uninitialized state and records the caller's
    /// control block. Always succeeds.
    pub fn params_init(
        &self,
        params: &mut RiParameters,
        control_block: Option<NonNull<RiControlBlock>>,
    ) {
        trace!(
            "[ri] ri_params_init entry: flags {:#x}, control block {:?}",
            params.flags().bits(),
            control_block
        );
        params.reset(control_block);
        trace!("[ri] ri_params_init exit");
    }

    /// Enables process-wide support. Call once, before any thread calls
    /// [`RiController::initialize`].
    pub fn enable_support(&self) -> Result<(), SupportError> {
        self.support.enable(&self.backend)
    }

    /// [`RiController::enable_support`] as an integer: `0` on success, `-1`,
    /// `-2` or `-3` on failure.
    pub fn enable_support_code(&self) -> i32 {
        self.enable_support().err().map_or(0, |err| err.code())
    }

    /// Disables process-wide support.
    pub fn disable_support(&self) -> Result<(), SupportError> {
        self.support.disable()
    }

    /// [`RiController::disable_support`] as an integer: `0` or `-1`.
    pub fn disable_support_code(&self) -> i32 {
        self.disable_support().err().map_or(0, |err| err.code())
    }

    /// Prepares the calling thread. On success `params` becomes initialized.
    pub fn initialize(&self, params: &mut RiParameters) -> Result<(), Error> {
        self.transition(params, Op::Initialize, |backend, _params| {
            backend.syscall_init()
        })
        .map(|()| params.insert(RiFlags::INITIALIZED))
    }

    /// Undoes [`RiController::initialize`]. This does not switch
    /// instrumentation off; call [`RiController::disable`] first.
    pub fn deinitialize(&self, params: &mut RiParameters) -> Result<(), Error> {
        self.transition(params, Op::Deinitialize, |backend, _params| {
            backend.syscall_deinit()
        })
        .map(|()| params.remove(RiFlags::INITIALIZED))
    }

    /// Switches instrumentation on for the calling thread. `params` must be
    /// initialized. Enabling twice without a `disable` in between is not
    /// supported by the hardware and is not checked.
    pub fn enable(&self, params: &mut RiParameters) -> Result<(), Error> {
        self.transition(params, Op::Enable, |backend, params| {
            require_initialized(params)?;
            backend.enable_hardware()
        })
        .map(|()| params.insert(RiFlags::ENABLED))
    }

    /// Switches instrumentation off for the calling thread. `params` must be
    /// initialized. Harmless if instrumentation is already off.
    pub fn disable(&self, params: &mut RiParameters) -> Result<(), Error> {
        self.transition(params, Op::Disable, |backend, params| {
            require_initialized(params)?;
            backend.disable_hardware()
        })
        .map(|()| params.remove(RiFlags::ENABLED))
    }

    fn transition<F>(&self, params: &RiParameters, op: Op, hook: F) -> Result<(), Error>
    where
        F: FnOnce(&B, &RiParameters) -> Result<(), Error>,
    {
        trace!(
            "[ri] {} entry: backend {}, flags {:#x}",
            op,
            self.backend.name(),
            params.flags().bits()
        );

        let result = if self.backend.supported() {
            hook(&self.backend, params)
        } else {
            Err(Error::Unsupported)
        };

        match &result {
            Ok(()) => trace!("[ri] {} exit", op),
            Err(err) if err.is_benign() => debug!("[ri] {} exit: {}", op, err),
            Err(err) => warn!("[ri] {} failed with {}: {}", op, err.code(), err),
        }
        result
    }
}

fn require_initialized(params: &RiParameters) -> Result<(), Error> {
    if params.is_initialized() {
        Ok(())
    } else {
        Err(Error::NotInitialized)
    }
}
