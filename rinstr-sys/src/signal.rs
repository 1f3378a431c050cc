/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Thin `sigaction(2)` wrappers for real-time signals. `nix::sys::signal::Signal`
//! cannot name `SIGRTMIN+n`, so these talk to libc directly.

use core::mem::MaybeUninit;

use syscalls::Errno;

/// A three-argument (`SA_SIGINFO`) signal handler.
pub type SigInfoHandler = extern "C" fn(libc::c_int, *mut libc::siginfo_t, *mut libc::c_void);

/// Lowest real-time signal number available to applications.
pub fn sigrtmin() -> libc::c_int {
    libc::SIGRTMIN()
}

/// Highest real-time signal number.
pub fn sigrtmax() -> libc::c_int {
    libc::SIGRTMAX()
}

/// Installs `handler` for `signo` and returns the previous disposition, which
/// should later be handed back to [`restore_handler`].
pub fn install_handler(
    signo: libc::c_int,
    handler: SigInfoHandler,
) -> Result<libc::sigaction, Errno> {
    // SAFETY: an all-zero sigaction is a valid SIG_DFL action with an empty
    // mask; every field we care about is filled in below.
    let mut action: libc::sigaction = unsafe { core::mem::zeroed() };
    action.sa_sigaction = handler as *const libc::c_void as libc::sighandler_t;
    action.sa_flags = libc::SA_SIGINFO | libc::SA_RESTART;
    Errno::result(unsafe { libc::sigemptyset(&mut action.sa_mask) })?;

    let mut previous = MaybeUninit::<libc::sigaction>::uninit();
    Errno::result(unsafe { libc::sigaction(signo, &action, previous.as_mut_ptr()) })?;

    // SAFETY: sigaction succeeded, so the kernel filled in the old action.
    Ok(unsafe { previous.assume_init() })
}

/// Puts back a disposition previously returned by [`install_handler`].
pub fn restore_handler(signo: libc::c_int, previous: &libc::sigaction) -> Result<(), Errno> {
    Errno::result(unsafe { libc::sigaction(signo, previous, core::ptr::null_mut()) }).map(drop)
}

/// Returns the handler address currently installed for `signo`.
pub fn current_handler(signo: libc::c_int) -> Result<libc::sighandler_t, Errno> {
    let mut current = MaybeUninit::<libc::sigaction>::uninit();
    Errno::result(unsafe { libc::sigaction(signo, core::ptr::null(), current.as_mut_ptr()) })?;
    Ok(unsafe { current.assume_init() }.sa_sigaction)
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn nothing(_: libc::c_int, _: *mut libc::siginfo_t, _: *mut libc::c_void) {}

    #[test]
    fn install_then_restore() {
        let signo = sigrtmax() - 1;
        let before = current_handler(signo).unwrap();

        let previous = install_handler(signo, nothing).unwrap();
        assert_eq!(previous.sa_sigaction, before);
        assert_eq!(
            current_handler(signo).unwrap(),
            nothing as *const libc::c_void as libc::sighandler_t
        );

        restore_handler(signo, &previous).unwrap();
        assert_eq!(current_handler(signo).unwrap(), before);
    }

    #[test]
    fn bogus_signal_is_rejected() {
        assert_eq!(install_handler(0, nothing).unwrap_err(), Errno::EINVAL);
        assert_eq!(
            install_handler(libc::SIGKILL, nothing).unwrap_err(),
            Errno::EINVAL
        );
    }

    #[test]
    fn realtime_range() {
        assert!(sigrtmin() < sigrtmax());
    }
}
