/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Per-thread control of CPU runtime-instrumentation hardware.
//!
//! Runtime instrumentation lets a JIT sample what the CPU is actually doing:
//! the performance monitor on POWER, the RI facility on z/Architecture. This
//! crate hides the per-architecture details behind one small state machine:
//!
//! 1. [`RiController::enable_support`] once per process,
//! 2. [`RiController::params_init`] and [`RiController::initialize`] once per
//!    thread,
//! 3. [`RiController::enable`] / [`RiController::disable`] as often as needed,
//! 4. [`RiController::deinitialize`] before the thread goes away, and
//!    [`RiController::disable_support`] at shutdown.
//!
//! On CPUs without such hardware every step is a harmless no-op.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg(target_os = "linux")]

pub mod backend;
mod config;
mod control_block;
mod controller;
mod error;
mod params;
pub mod signal;
mod support;
pub mod testing;

pub use crate::backend::DynBackend;
pub use crate::backend::ProcessSupport;
pub use crate::backend::RiBackend;
pub use crate::config::BackendSelection;
pub use crate::config::Config;
pub use crate::config::DEFAULT_SIGNAL_OFFSET;
pub use crate::control_block::RiControlBlock;
pub use crate::control_block::RiControlFlags;
pub use crate::control_block::RiModeFlags;
pub use crate::controller::init_native;
pub use crate::controller::native;
pub use crate::controller::RiController;
pub use crate::error::Errno;
pub use crate::error::Error;
pub use crate::error::Op;
pub use crate::error::SupportError;
pub use crate::error::NOT_INITIALIZED_CODE;
pub use crate::params::RiFlags;
pub use crate::params::RiParameters;
pub use crate::support::RiSupport;
pub use crate::support::SupportState;
