/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Process-wide support registration through the public controller API.

use rinstr::backend::RuntimeInstrCommand;
use rinstr::backend::S390Ri;
use rinstr::backend::Unsupported;
use rinstr::testing::init_test_tracing;
use rinstr::testing::MockHardware;
use rinstr::testing::MockRegistrar;
use rinstr::Config;
use rinstr::Errno;
use rinstr::RiController;
use rinstr::RiParameters;
use rinstr::SupportError;
use rinstr::SupportState;
use test_case::test_case;

fn s390() -> (MockHardware, RiController<S390Ri<MockHardware>, MockRegistrar>) {
    init_test_tracing();
    let config = Config::default();
    let hw = MockHardware::new();
    let backend = S390Ri::new(hw.clone(), config.signal().unwrap());
    let controller = RiController::new(backend, MockRegistrar::new(), config).unwrap();
    (hw, controller)
}

#[test]
fn enable_then_disable() {
    let (hw, controller) = s390();
    let signal = controller.support().signal();

    assert_eq!(controller.enable_support_code(), 0);
    assert!(controller.support_enabled());
    assert_eq!(controller.support().registrar().registered(), Some(signal));
    assert_eq!(
        hw.syscalls(),
        vec![
            (RuntimeInstrCommand::Start, signal),
            (RuntimeInstrCommand::Stop, signal)
        ]
    );

    assert_eq!(controller.disable_support_code(), 0);
    assert!(!controller.support_enabled());
    assert_eq!(controller.support().registrar().registered(), None);
}

#[test]
fn signal_follows_config() {
    let config = Config {
        signal_offset: 5,
        ..Default::default()
    };
    let signal = config.signal().unwrap();
    assert_eq!(signal, rinstr_sys::signal::sigrtmin() + 5);

    let hw = MockHardware::new();
    let controller =
        RiController::new(S390Ri::new(hw.clone(), signal), MockRegistrar::new(), config).unwrap();
    controller.enable_support().unwrap();
    assert!(hw.syscalls().iter().all(|(_, signo)| *signo == signal));
    assert_eq!(controller.support().registrar().registered(), Some(signal));
}

#[test_case(RuntimeInstrCommand::Start, Errno::EOPNOTSUPP, -2)]
#[test_case(RuntimeInstrCommand::Start, Errno::EINVAL, -2)]
#[test_case(RuntimeInstrCommand::Stop, Errno::EINVAL, -3)]
#[test_case(RuntimeInstrCommand::Stop, Errno::ENOMEM, -3)]
fn syscall_failure_unregisters(command: RuntimeInstrCommand, errno: Errno, code: i32) {
    let (hw, controller) = s390();
    hw.fail_syscall(command, errno);

    assert_eq!(controller.enable_support_code(), code);
    assert!(!controller.support_enabled());
    let registrar = controller.support().registrar();
    assert_eq!(registrar.register_calls(), 1);
    assert_eq!(registrar.unregister_calls(), 1);
    assert_eq!(registrar.registered(), None);
}

#[test]
fn registration_failure_skips_syscalls() {
    let (hw, controller) = s390();
    controller.support().registrar().fail_register(Errno::EINVAL);

    assert_eq!(
        controller.enable_support(),
        Err(SupportError::Registration(Errno::EINVAL))
    );
    assert_eq!(controller.enable_support_code(), -1);
    assert!(hw.syscalls().is_empty());
}

#[test]
fn retry_after_failure_succeeds() {
    let (hw, controller) = s390();
    hw.fail_syscall(RuntimeInstrCommand::Start, Errno::EAGAIN);
    assert_eq!(controller.enable_support_code(), -2);

    hw.clear_failures();
    assert_eq!(controller.enable_support_code(), 0);
    assert_eq!(controller.support().state(), SupportState::Installed);
    assert_eq!(controller.support().registrar().register_calls(), 2);
}

#[test]
fn repeated_enable_registers_once() {
    let (hw, controller) = s390();
    for _ in 0..3 {
        assert_eq!(controller.enable_support_code(), 0);
    }
    assert_eq!(controller.support().registrar().register_calls(), 1);
    assert_eq!(hw.syscalls().len(), 2);
}

#[test]
fn concurrent_enable_registers_once() {
    let (hw, controller) = s390();
    let controller = std::sync::Arc::new(controller);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let controller = controller.clone();
            std::thread::spawn(move || controller.enable_support_code())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 0);
    }

    assert_eq!(controller.support().registrar().register_calls(), 1);
    assert_eq!(hw.syscalls().len(), 2);
}

#[test]
fn disable_without_enable() {
    let (_hw, controller) = s390();
    assert_eq!(controller.disable_support_code(), 0);
    assert_eq!(controller.support().registrar().unregister_calls(), 0);
}

#[test]
fn unregistration_failure_is_reported() {
    let (_hw, controller) = s390();
    controller.enable_support().unwrap();
    controller
        .support()
        .registrar()
        .fail_unregister(Errno::EINVAL);

    assert_eq!(controller.disable_support_code(), -1);
    assert!(controller.support_enabled());
}

#[test]
fn ztpf_reports_unavailable() {
    init_test_tracing();
    let controller =
        RiController::new(Unsupported::ztpf(), MockRegistrar::new(), Config::default()).unwrap();

    assert_eq!(controller.enable_support(), Err(SupportError::Unavailable));
    assert_eq!(controller.enable_support_code(), -1);
    assert_eq!(controller.support().registrar().register_calls(), 0);

    let mut params = RiParameters::new();
    assert!(controller.initialize(&mut params).is_err());
    assert!(params.flags().is_empty());
}

#[test]
fn support_then_thread_lifecycle() {
    let (hw, controller) = s390();
    controller.enable_support().unwrap();

    let mut params = RiParameters::new();
    controller.params_init(&mut params, None);
    controller.initialize(&mut params).unwrap();
    controller.enable(&mut params).unwrap();
    controller.disable(&mut params).unwrap();
    controller.deinitialize(&mut params).unwrap();
    controller.disable_support().unwrap();

    // Two from enable_support, two from the thread.
    assert_eq!(hw.syscalls().len(), 4);
    assert!(params.flags().is_empty());
}
