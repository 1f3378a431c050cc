/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Architecture backends.
//!
//! A backend only knows how to poke the hardware. It keeps no state; the
//! [`crate::RiController`] decides when each hook runs and what happens to the
//! state bits afterwards.

mod power;
mod s390;
mod unsupported;

pub use power::Mmcr0;
pub use power::NativeMmcr0;
pub use power::PowerSpr;
pub use s390::NativeRiFacility;
pub use s390::RiFacility;
pub use s390::RuntimeInstrCommand;
pub use s390::S390Ri;
pub use unsupported::Unsupported;

use crate::config::BackendSelection;
use crate::config::Config;
use crate::error::Error;

/// What `enable_support` has to do on a backend.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ProcessSupport {
    /// Install the RI signal handler, then run the start and stop syscalls.
    Signal,
    /// Nothing. Support trivially succeeds.
    NotRequired,
    /// Support can never be enabled.
    Unavailable,
}

/// Hardware hooks for one architecture.
pub trait RiBackend {
    /// Short name for log events.
    fn name(&self) -> &'static str;

    /// False if this backend has no hardware to drive. Every per-thread
    /// operation is then a no-op reporting [`Error::Unsupported`].
    fn supported(&self) -> bool;

    /// The process-wide setup this backend needs.
    fn process_support(&self) -> ProcessSupport;

    /// Switches instrumentation on for the calling thread.
    ///
    /// On real hardware this is only sound after [`RiBackend::syscall_init`]
    /// succeeded on the same thread. [`crate::RiController::enable`] checks
    /// that, and the native backends can only be reached through it.
    fn enable_hardware(&self) -> Result<(), Error>;

    /// Switches instrumentation off for the calling thread. Must be harmless
    /// when it is already off.
    fn disable_hardware(&self) -> Result<(), Error>;

    /// Per-thread setup run by `initialize`.
    fn syscall_init(&self) -> Result<(), Error>;

    /// Per-thread teardown run by `deinitialize`.
    fn syscall_deinit(&self) -> Result<(), Error>;
}

impl<B: RiBackend + ?Sized> RiBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn supported(&self) -> bool {
        (**self).supported()
    }

    fn process_support(&self) -> ProcessSupport {
        (**self).process_support()
    }

    fn enable_hardware(&self) -> Result<(), Error> {
        (**self).enable_hardware()
    }

    fn disable_hardware(&self) -> Result<(), Error> {
        (**self).disable_hardware()
    }

    fn syscall_init(&self) -> Result<(), Error> {
        (**self).syscall_init()
    }

    fn syscall_deinit(&self) -> Result<(), Error> {
        (**self).syscall_deinit()
    }
}

/// A backend picked at run time.
pub type DynBackend = Box<dyn RiBackend + Send + Sync>;

/// Builds the backend described by `config` for the CPU we are running on.
/// Falls back to [`Unsupported`] when the hardware facility is missing.
pub(crate) fn native_backend(config: &Config) -> Result<DynBackend, Error> {
    let signal = config.signal()?;
    let backend: DynBackend = match config.backend {
        BackendSelection::Unsupported => Box::new(Unsupported::new()),
        BackendSelection::Ztpf => Box::new(Unsupported::ztpf()),
        BackendSelection::Native if rinstr_sys::facility::has_runtime_instrumentation() => {
            native_impl(config, signal)
        }
        BackendSelection::Native => {
            tracing::debug!("[ri] no runtime instrumentation facility on this cpu");
            Box::new(Unsupported::new())
        }
    };
    tracing::debug!("[ri] selected backend {}", backend.name());
    Ok(backend)
}

#[cfg(target_arch = "powerpc64")]
fn native_impl(config: &Config, _signal: libc::c_int) -> DynBackend {
    Box::new(PowerSpr::new(NativeMmcr0::new()).with_thread_init(config.power_thread_init))
}

#[cfg(target_arch = "s390x")]
fn native_impl(_config: &Config, signal: libc::c_int) -> DynBackend {
    Box::new(S390Ri::new(NativeRiFacility::new(), signal))
}

#[cfg(not(any(target_arch = "powerpc64", target_arch = "s390x")))]
fn native_impl(_config: &Config, _signal: libc::c_int) -> DynBackend {
    Box::new(Unsupported::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_selections() {
        let mut config = Config {
            backend: BackendSelection::Unsupported,
            ..Default::default()
        };
        let backend = native_backend(&config).unwrap();
        assert_eq!(backend.name(), "unsupported");
        assert_eq!(backend.process_support(), ProcessSupport::NotRequired);

        config.backend = BackendSelection::Ztpf;
        let backend = native_backend(&config).unwrap();
        assert_eq!(backend.name(), "ztpf");
        assert_eq!(backend.process_support(), ProcessSupport::Unavailable);
    }

    #[test]
    fn bad_signal_is_reported() {
        let config = Config {
            signal_offset: -4,
            ..Default::default()
        };
        assert_eq!(native_backend(&config).err(), Some(Error::InvalidSignal(-4)));
    }

    #[cfg(not(any(target_arch = "powerpc64", target_arch = "s390x")))]
    #[test]
    fn native_is_unsupported_here() {
        let backend = native_backend(&Config::default()).unwrap();
        assert!(!backend.supported());
        assert_eq!(backend.enable_hardware(), Err(Error::Unsupported));
    }
}
