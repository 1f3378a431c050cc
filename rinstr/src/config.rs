/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use core::fmt;
use core::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;

/// Default distance of the RI signal from `SIGRTMIN`.
pub const DEFAULT_SIGNAL_OFFSET: i32 = 1;

/// Which backend [`crate::RiController::native`] drives.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendSelection {
    /// Whatever the CPU we are running on supports.
    #[default]
    Native,
    /// Never touch the hardware.
    Unsupported,
    /// The zTPF flavour of s390, where process-wide support always fails.
    Ztpf,
}

impl BackendSelection {
    /// Returns the name accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Unsupported => "unsupported",
            Self::Ztpf => "ztpf",
        }
    }
}

impl fmt::Display for BackendSelection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" => Ok(Self::Native),
            "unsupported" => Ok(Self::Unsupported),
            "ztpf" => Ok(Self::Ztpf),
            other => Err(format!(
                "unknown backend {:?}, expected one of: native, unsupported, ztpf",
                other
            )),
        }
    }
}

/// Configuration of a [`crate::RiController`].
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The RI signal is `SIGRTMIN + signal_offset`.
    pub signal_offset: i32,

    /// Backend to use.
    pub backend: BackendSelection,

    /// On POWER, let `initialize` and `deinitialize` succeed as no-ops so
    /// that the `MMCR0` path can be reached. Off by default, in which case
    /// both decline and `enable` can never pass its precondition there.
    pub power_thread_init: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            signal_offset: DEFAULT_SIGNAL_OFFSET,
            backend: BackendSelection::default(),
            power_thread_init: false,
        }
    }
}

impl Config {
    /// Resolves the RI signal number.
    pub fn signal(&self) -> Result<libc::c_int, Error> {
        let min = rinstr_sys::signal::sigrtmin();
        let max = rinstr_sys::signal::sigrtmax();
        match min.checked_add(self.signal_offset) {
            Some(signo) if self.signal_offset >= 0 && signo <= max => Ok(signo),
            _ => Err(Error::InvalidSignal(self.signal_offset)),
        }
    }
}
