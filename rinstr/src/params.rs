/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use core::ptr::NonNull;

use serde::Deserialize;
use serde::Serialize;

use crate::control_block::RiControlBlock;

bitflags::bitflags! {
    /// State bits of [`RiParameters`]. The values are part of the ABI shared
    /// with existing tooling and must not change.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[repr(transparent)]
    pub struct RiFlags: u32 {
        /// Instrumentation is switched on for the owning thread.
        const ENABLED = 0x1;
        /// The owning thread completed `initialize`.
        const INITIALIZED = 0x2;

        // Reserved bits are carried through untouched.
        const _ = !0;
    }
}

/// Per-thread runtime-instrumentation state.
///
/// The control block is borrowed, never owned: the caller allocates it, keeps
/// it alive for as long as instrumentation may be on, and frees it. Holding a
/// raw pointer keeps this type `!Send`, so an instance stays with the thread
/// that created it.
///
/// The layout matches `{ uint32_t flags; void *controlBlock; }`.
#[repr(C)]
#[derive(Debug, Default)]
pub struct RiParameters {
    flags: RiFlags,
    control_block: Option<NonNull<RiControlBlock>>,
}

impl RiParameters {
    /// Creates zeroed parameters. Pass them to
    /// [`crate::RiController::params_init`] before any other operation.
    pub const fn new() -> Self {
        Self {
            flags: RiFlags::empty(),
            control_block: None,
        }
    }

    /// Current state bits.
    pub fn flags(&self) -> RiFlags {
        self.flags
    }

    /// True once `initialize` has succeeded and `deinitialize` has not.
    pub fn is_initialized(&self) -> bool {
        self.flags.contains(RiFlags::INITIALIZED)
    }

    /// True while instrumentation is switched on.
    pub fn is_enabled(&self) -> bool {
        self.flags.contains(RiFlags::ENABLED)
    }

    /// The control block recorded by the last `params_init`.
    pub fn control_block(&self) -> Option<NonNull<RiControlBlock>> {
        self.control_block
    }

    pub(crate) fn reset(&mut self, control_block: Option<NonNull<RiControlBlock>>) {
        self.flags = RiFlags::empty();
        self.control_block = control_block;
    }

    pub(crate) fn insert(&mut self, flags: RiFlags) {
        self.flags.insert(flags);
    }

    pub(crate) fn remove(&mut self, flags: RiFlags) {
        self.flags.remove(flags);
    }

    #[cfg(test)]
    pub(crate) fn with_raw_flags(bits: u32) -> Self {
        Self {
            flags: RiFlags::from_bits_retain(bits),
            control_block: None,
        }
    }
}
