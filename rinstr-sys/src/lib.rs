/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Raw, unsafe access to the runtime-instrumentation hardware of the current
//! CPU and to the OS services it depends on.
//!
//! Nothing in here tracks state. Every function maps directly onto a single
//! machine instruction, system call or `sigaction(2)` invocation. On
//! architectures that lack a given facility the functions still exist, but
//! report `ENOSYS` (or condition code 3, "not operational") so that callers do
//! not need to sprinkle `cfg` attributes around.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg(target_os = "linux")]
#![cfg_attr(
    any(target_arch = "powerpc64", target_arch = "s390x"),
    feature(asm_experimental_arch)
)]

pub mod facility;
pub mod power;
pub mod s390;
pub mod signal;

pub use syscalls::Errno;
