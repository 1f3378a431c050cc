/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The process-wide controller on a CPU without instrumentation hardware.

#![cfg(not(any(target_arch = "powerpc64", target_arch = "s390x")))]

use rinstr::Config;
use rinstr::Error;
use rinstr::RiControlBlock;
use rinstr::RiFlags;
use rinstr::RiParameters;

#[test]
fn everything_is_a_no_op() {
    rinstr::testing::init_test_tracing();
    assert!(!rinstr_sys::facility::has_runtime_instrumentation());

    let controller = rinstr::init_native(Config::default()).unwrap();
    assert!(std::ptr::eq(controller, rinstr::native().unwrap()));
    assert_eq!(controller.backend_name(), "unsupported");

    assert_eq!(controller.enable_support_code(), 0);
    assert!(!controller.support_enabled());

    let mut cb = RiControlBlock::default();
    let mut params = RiParameters::new();
    controller.params_init(&mut params, Some(core::ptr::NonNull::from(&mut cb)));

    assert_eq!(controller.initialize(&mut params), Err(Error::Unsupported));
    assert_eq!(controller.enable(&mut params), Err(Error::Unsupported));
    assert_eq!(controller.disable(&mut params), Err(Error::Unsupported));
    assert_eq!(controller.deinitialize(&mut params), Err(Error::Unsupported));
    assert_eq!(params.flags(), RiFlags::empty());
    assert!(Error::Unsupported.is_benign());
    assert_eq!(Error::Unsupported.code(), 0);

    assert_eq!(controller.disable_support_code(), 0);

    // Only the first configuration counts.
    let again = rinstr::init_native(Config {
        signal_offset: 9,
        ..Default::default()
    })
    .unwrap();
    assert!(std::ptr::eq(controller, again));
    assert_eq!(again.config().signal_offset, 1);
}
