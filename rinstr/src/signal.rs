/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The runtime-instrumentation signal.
//!
//! On s390 the kernel raises a real-time signal when the sample buffer fills
//! up (`si_errno == ENOBUFS`) or when instrumentation halts. The consumer polls
//! for these conditions itself, so the handler only has to exist so that the
//! signal does not kill the process. It additionally counts events in
//! lock-free atomics that normal code can read with [`events`].
//!
//! The handler must stay async-signal-safe: no locks, no allocation, no
//! logging.

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;
pub use rinstr_sys::signal::SigInfoHandler;
use syscalls::Errno;
use tracing::debug;

static BUFFER_FULL_EVENTS: AtomicU64 = AtomicU64::new(0);
static HALTED_EVENTS: AtomicU64 = AtomicU64::new(0);

/// Handler installed for the RI signal.
pub extern "C" fn ri_signal_handler(
    _signo: libc::c_int,
    info: *mut libc::siginfo_t,
    _ctx: *mut libc::c_void,
) {
    // SAFETY: the kernel hands us a valid siginfo for SA_SIGINFO handlers. A
    // null pointer only shows up when someone calls the handler by hand.
    let errno = if info.is_null() {
        0
    } else {
        unsafe { (*info).si_errno }
    };

    if errno == libc::ENOBUFS {
        BUFFER_FULL_EVENTS.fetch_add(1, Ordering::Relaxed);
    } else {
        HALTED_EVENTS.fetch_add(1, Ordering::Relaxed);
    }
}

/// Counts of RI signals seen by this process.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct RiEvents {
    /// The sample buffer filled up.
    pub buffer_full: u64,
    /// Instrumentation halted for any other reason.
    pub halted: u64,
}

/// Returns the event counts accumulated so far.
pub fn events() -> RiEvents {
    RiEvents {
        buffer_full: BUFFER_FULL_EVENTS.load(Ordering::Acquire),
        halted: HALTED_EVENTS.load(Ordering::Acquire),
    }
}

/// Returns the number of buffer-full events since the last call and resets
/// the count.
pub fn take_buffer_full_events() -> u64 {
    BUFFER_FULL_EVENTS.swap(0, Ordering::AcqRel)
}

/// Total halted interruptions seen so far.
pub fn halted_events() -> u64 {
    HALTED_EVENTS.load(Ordering::Acquire)
}

/// Installs and removes the handler for a signal. In a JVM this goes through
/// the signal-chaining library; in a plain process it is `sigaction(2)`.
pub trait SignalRegistrar {
    /// Installs `handler` for `signo`.
    fn register(&self, signo: libc::c_int, handler: SigInfoHandler) -> Result<(), Errno>;

    /// Removes whatever [`SignalRegistrar::register`] installed for `signo`.
    fn unregister(&self, signo: libc::c_int) -> Result<(), Errno>;
}

/// [`SignalRegistrar`] on top of `sigaction(2)`. Unregistering restores the
/// disposition that was in place before `register`.
#[derive(Default)]
pub struct SigactionRegistrar {
    previous: Mutex<HashMap<libc::c_int, libc::sigaction>>,
}

impl SigactionRegistrar {
    /// Creates a registrar with nothing installed.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignalRegistrar for SigactionRegistrar {
    fn register(&self, signo: libc::c_int, handler: SigInfoHandler) -> Result<(), Errno> {
        let mut previous = self.previous.lock();
        let old = rinstr_sys::signal::install_handler(signo, handler)?;
        // Installing twice must not lose the original disposition.
        previous.entry(signo).or_insert(old);
        debug!("[ri] installed handler for signal {}", signo);
        Ok(())
    }

    fn unregister(&self, signo: libc::c_int) -> Result<(), Errno> {
        let mut previous = self.previous.lock();
        match previous.get(&signo) {
            Some(old) => {
                rinstr_sys::signal::restore_handler(signo, old)?;
                previous.remove(&signo);
                debug!("[ri] restored previous handler for signal {}", signo);
                Ok(())
            }
            None => Err(Errno::ENOENT),
        }
    }
}
