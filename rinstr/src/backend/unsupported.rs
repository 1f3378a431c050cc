/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use super::ProcessSupport;
use super::RiBackend;
use crate::error::Error;

/// Backend for CPUs without runtime instrumentation. Nothing ever reaches the
/// hardware.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct Unsupported {
    ztpf: bool,
}

impl Unsupported {
    /// Process-wide support trivially succeeds.
    pub fn new() -> Self {
        Self { ztpf: false }
    }

    /// zTPF: process-wide support always fails.
    pub fn ztpf() -> Self {
        Self { ztpf: true }
    }
}

impl RiBackend for Unsupported {
    fn name(&self) -> &'static str {
        if self.ztpf { "ztpf" } else { "unsupported" }
    }

    fn supported(&self) -> bool {
        false
    }

    fn process_support(&self) -> ProcessSupport {
        if self.ztpf {
            ProcessSupport::Unavailable
        } else {
            ProcessSupport::NotRequired
        }
    }

    fn enable_hardware(&self) -> Result<(), Error> {
        Err(Error::Unsupported)
    }

    fn disable_hardware(&self) -> Result<(), Error> {
        Err(Error::Unsupported)
    }

    fn syscall_init(&self) -> Result<(), Error> {
        Err(Error::Unsupported)
    }

    fn syscall_deinit(&self) -> Result<(), Error> {
        Err(Error::Unsupported)
    }
}
