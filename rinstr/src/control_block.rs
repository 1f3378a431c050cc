/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The runtime-instrumentation control block.
//!
//! The block tells the hardware where to write samples and what to sample. The
//! state machine in this crate never looks inside it; it is handed to the
//! kernel and the CPU as-is. The typed accessors exist so that callers can
//! build one without hand-packing bits.
//!
//! Layout (64 bytes, big-endian bit numbering, bit 0 is the most significant):
//!
//! ```text
//!  0 | buffer current address                                    |
//!  8 | buffer origin address                                     |
//! 16 | buffer limit address                                      |
//! 24 | control word (valid, pstate, ... key, rgs) | mode word    |
//! 32 | reserved                                                  |
//! 40 | scaling factor                                            |
//! 48 | remaining sample interval count                           |
//! 56 | reserved                                                  |
//! ```
//!
//! On architectures other than s390x the block is an unused placeholder.

use serde::Deserialize;
use serde::Serialize;

bitflags::bitflags! {
    /// Single-bit fields of the control word.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct RiControlFlags: u32 {
        /// The block is valid.
        const VALID = 1 << 31;
        /// Instrumentation runs in problem state.
        const PSTATE = 1 << 30;
        /// Problem state may set the buffer addresses.
        const PSTATE_SET_BUF = 1 << 29;
        /// Buffer addresses are home-space addresses.
        const HOME_SPACE = 1 << 28;
        /// Set by the hardware once the block has been altered.
        const ALTERED = 1 << 27;
        /// Sample in problem state.
        const PSTATE_SAMPLE = 1 << 23;
        /// Sample in supervisor state.
        const SSTATE_SAMPLE = 1 << 22;
        /// Collect in problem state.
        const PSTATE_COLLECT = 1 << 21;
        /// Collect in supervisor state.
        const SSTATE_COLLECT = 1 << 20;
        /// A halted interruption is pending.
        const HALTED_INT = 1 << 18;
        /// An interruption was requested.
        const INT_REQUESTED = 1 << 17;
        /// Interrupt when the buffer fills.
        const BUFFER_FULL_INT = 1 << 16;
    }
}

bitflags::bitflags! {
    /// Single-bit fields of the mode word.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct RiModeFlags: u32 {
        /// Sample the next instruction instead of the current one.
        const NEXT = 1 << 27;
        /// Multiple-address-space enablement.
        const MAE = 1 << 26;
        /// Record call-type branches.
        const CALL_TYPE_BR = 1 << 23;
        /// Record return-type branches.
        const RETURN_TYPE_BR = 1 << 22;
        /// Record other branches.
        const OTHER_TYPE_BR = 1 << 21;
        /// Treat branch-on-condition as "other".
        const BC_OTHER_TYPE = 1 << 20;
        /// Allow `RIEMIT`.
        const EMIT = 1 << 19;
        /// Record transaction aborts.
        const TX_ABORT = 1 << 18;
        /// Branch prediction: not taken, not predicted.
        const BP_XN = 1 << 15;
        /// Branch prediction: taken, not predicted.
        const BP_XT = 1 << 14;
        /// Branch prediction: taken, predicted incorrectly.
        const BP_TI = 1 << 13;
        /// Branch prediction: not taken, predicted incorrectly.
        const BP_NI = 1 << 12;
        /// Suppress y-type records.
        const SUPPR_Y = 1 << 11;
        /// Suppress z-type records.
        const SUPPR_Z = 1 << 10;
        /// Extra data-cache miss information.
        const DC_MISS_EXTRA = 1 << 9;
        /// Ignore the latency levels below.
        const LAT_LEV_IGNORE = 1 << 8;
    }
}

const KEY_SHIFT: u32 = 12;
const KEY_MASK: u32 = 0xf << KEY_SHIFT;
const RGS_MASK: u32 = 0x7;
const MODE_SHIFT: u32 = 28;
const MODE_MASK: u32 = 0xf << MODE_SHIFT;
const IC_LAT_SHIFT: u32 = 4;
const IC_LAT_MASK: u32 = 0xf << IC_LAT_SHIFT;
const DC_LAT_MASK: u32 = 0xf;

/// Architecture-defined descriptor of the instrumentation buffer and sampling
/// mode. See the module documentation for the layout.
#[repr(C, align(8))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiControlBlock {
    buf_current: u64,
    buf_origin: u64,
    buf_limit: u64,
    control: u32,
    mode: u32,
    reserved1: u64,
    scaling_factor: u64,
    rsic: u64,
    reserved2: u64,
}

impl RiControlBlock {
    /// Address the hardware will write the next sample to.
    pub fn buffer_current(&self) -> u64 {
        self.buf_current
    }

    /// First address of the sample buffer.
    pub fn buffer_origin(&self) -> u64 {
        self.buf_origin
    }

    /// Last address of the sample buffer.
    pub fn buffer_limit(&self) -> u64 {
        self.buf_limit
    }

    /// Points the block at `buffer`. The current address starts at the
    /// origin. The hardware expects the limit to be the address of the last
    /// usable byte.
    ///
    /// # Panics
    ///
    /// If `buffer` is empty, since no limit address can describe it.
    pub fn set_buffer(&mut self, buffer: &mut [u8]) -> &mut Self {
        assert!(!buffer.is_empty(), "RI sample buffer must not be empty");
        let origin = buffer.as_mut_ptr() as u64;
        let limit = origin + (buffer.len() as u64 - 1);
        self.set_buffer_addresses(origin, origin, limit)
    }

    /// Sets the three buffer addresses directly.
    pub fn set_buffer_addresses(&mut self, current: u64, origin: u64, limit: u64) -> &mut Self {
        self.buf_current = current;
        self.buf_origin = origin;
        self.buf_limit = limit;
        self
    }

    /// Single-bit fields of the control word.
    pub fn control_flags(&self) -> RiControlFlags {
        RiControlFlags::from_bits_truncate(self.control)
    }

    /// Replaces the single-bit fields of the control word, leaving the key
    /// and register-group selector alone.
    pub fn set_control_flags(&mut self, flags: RiControlFlags) -> &mut Self {
        self.control = (self.control & !RiControlFlags::all().bits()) | flags.bits();
        self
    }

    /// 4-bit storage key used for buffer stores.
    pub fn key(&self) -> u8 {
        ((self.control & KEY_MASK) >> KEY_SHIFT) as u8
    }

    /// Sets the storage key. Only the low 4 bits are used.
    pub fn set_key(&mut self, key: u8) -> &mut Self {
        self.control = (self.control & !KEY_MASK) | ((u32::from(key) << KEY_SHIFT) & KEY_MASK);
        self
    }

    /// 3-bit register-group selector.
    pub fn register_group(&self) -> u8 {
        (self.control & RGS_MASK) as u8
    }

    /// Sets the register-group selector. Only the low 3 bits are used.
    pub fn set_register_group(&mut self, rgs: u8) -> &mut Self {
        self.control = (self.control & !RGS_MASK) | (u32::from(rgs) & RGS_MASK);
        self
    }

    /// 4-bit sampling mode.
    pub fn mode(&self) -> u8 {
        ((self.mode & MODE_MASK) >> MODE_SHIFT) as u8
    }

    /// Sets the sampling mode. Only the low 4 bits are used.
    pub fn set_mode(&mut self, mode: u8) -> &mut Self {
        self.mode = (self.mode & !MODE_MASK) | ((u32::from(mode) << MODE_SHIFT) & MODE_MASK);
        self
    }

    /// Single-bit fields of the mode word.
    pub fn mode_flags(&self) -> RiModeFlags {
        RiModeFlags::from_bits_truncate(self.mode)
    }

    /// Replaces the single-bit fields of the mode word, leaving the mode and
    /// latency levels alone.
    pub fn set_mode_flags(&mut self, flags: RiModeFlags) -> &mut Self {
        self.mode = (self.mode & !RiModeFlags::all().bits()) | flags.bits();
        self
    }

    /// Instruction-cache latency level.
    pub fn ic_latency_level(&self) -> u8 {
        ((self.mode & IC_LAT_MASK) >> IC_LAT_SHIFT) as u8
    }

    /// Sets the instruction-cache latency level (4 bits).
    pub fn set_ic_latency_level(&mut self, level: u8) -> &mut Self {
        self.mode =
            (self.mode & !IC_LAT_MASK) | ((u32::from(level) << IC_LAT_SHIFT) & IC_LAT_MASK);
        self
    }

    /// Data-cache latency level.
    pub fn dc_latency_level(&self) -> u8 {
        (self.mode & DC_LAT_MASK) as u8
    }

    /// Sets the data-cache latency level (4 bits).
    pub fn set_dc_latency_level(&mut self, level: u8) -> &mut Self {
        self.mode = (self.mode & !DC_LAT_MASK) | (u32::from(level) & DC_LAT_MASK);
        self
    }

    /// Scaling factor applied to the sample interval.
    pub fn scaling_factor(&self) -> u64 {
        self.scaling_factor
    }

    /// Sets the scaling factor.
    pub fn set_scaling_factor(&mut self, factor: u64) -> &mut Self {
        self.scaling_factor = factor;
        self
    }

    /// Number of events left before the next sample is taken.
    pub fn remaining_sample_interval(&self) -> u64 {
        self.rsic
    }

    /// Sets the remaining sample interval count.
    pub fn set_remaining_sample_interval(&mut self, count: u64) -> &mut Self {
        self.rsic = count;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        assert_eq!(core::mem::size_of::<RiControlBlock>(), 64);
        assert_eq!(core::mem::align_of::<RiControlBlock>(), 8);
    }

    #[test]
    fn packed_fields_do_not_overlap() {
        let mut cb = RiControlBlock::default();
        cb.set_control_flags(RiControlFlags::VALID | RiControlFlags::PSTATE_SAMPLE)
            .set_key(0xf)
            .set_register_group(0x5)
            .set_mode(0x2)
            .set_mode_flags(RiModeFlags::CALL_TYPE_BR | RiModeFlags::LAT_LEV_IGNORE)
            .set_ic_latency_level(0x3)
            .set_dc_latency_level(0x9);

        assert_eq!(
            cb.control_flags(),
            RiControlFlags::VALID | RiControlFlags::PSTATE_SAMPLE
        );
        assert_eq!(cb.key(), 0xf);
        assert_eq!(cb.register_group(), 0x5);
        assert_eq!(cb.mode(), 0x2);
        assert_eq!(
            cb.mode_flags(),
            RiModeFlags::CALL_TYPE_BR | RiModeFlags::LAT_LEV_IGNORE
        );
        assert_eq!(cb.ic_latency_level(), 0x3);
        assert_eq!(cb.dc_latency_level(), 0x9);

        // Replacing the flags keeps the multi-bit fields.
        cb.set_control_flags(RiControlFlags::empty());
        cb.set_mode_flags(RiModeFlags::empty());
        assert_eq!(cb.key(), 0xf);
        assert_eq!(cb.register_group(), 0x5);
        assert_eq!(cb.mode(), 0x2);
        assert_eq!(cb.dc_latency_level(), 0x9);
    }

    #[test]
    fn oversized_values_are_masked() {
        let mut cb = RiControlBlock::default();
        cb.set_key(0xff).set_mode(0x1f).set_register_group(0xff);
        assert_eq!(cb.key(), 0xf);
        assert_eq!(cb.mode(), 0xf);
        assert_eq!(cb.register_group(), 0x7);
        assert!(cb.control_flags().is_empty());
    }

    #[test]
    fn buffer_from_slice() {
        let mut buffer = vec![0u8; 4096];
        let mut cb = RiControlBlock::default();
        cb.set_buffer(&mut buffer);
        assert_eq!(cb.buffer_current(), cb.buffer_origin());
        assert_eq!(cb.buffer_limit() - cb.buffer_origin(), 4095);
    }

    #[test]
    fn one_byte_buffer() {
        let mut buffer = [0u8; 1];
        let mut cb = RiControlBlock::default();
        cb.set_buffer(&mut buffer);
        assert_eq!(cb.buffer_limit(), cb.buffer_origin());
    }

    #[test]
    #[should_panic(expected = "must not be empty")]
    fn empty_buffer_is_rejected() {
        let mut cb = RiControlBlock::default();
        cb.set_buffer(&mut []);
    }
}
