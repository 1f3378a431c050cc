/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Per-thread state machine behavior against mock s390 hardware.

use core::ptr::NonNull;

use rinstr::backend::S390Ri;
use rinstr::testing::init_test_tracing;
use rinstr::testing::MockHardware;
use rinstr::testing::MockRegistrar;
use rinstr::Config;
use rinstr::Error;
use rinstr::RiControlBlock;
use rinstr::RiController;
use rinstr::RiFlags;
use rinstr::RiParameters;

type Controller = RiController<S390Ri<MockHardware>, MockRegistrar>;

fn controller() -> (MockHardware, Controller) {
    init_test_tracing();
    let config = Config::default();
    let hw = MockHardware::new();
    let backend = S390Ri::new(hw.clone(), config.signal().unwrap());
    let controller = RiController::new(backend, MockRegistrar::new(), config).unwrap();
    (hw, controller)
}

#[derive(Debug, Copy, Clone)]
enum Step {
    Initialize,
    Enable,
    Disable,
    Deinitialize,
}

const STEPS: [Step; 4] = [
    Step::Initialize,
    Step::Enable,
    Step::Disable,
    Step::Deinitialize,
];

fn run(controller: &Controller, params: &mut RiParameters, step: Step) -> Result<(), Error> {
    match step {
        Step::Initialize => controller.initialize(params),
        Step::Enable => controller.enable(params),
        Step::Disable => controller.disable(params),
        Step::Deinitialize => controller.deinitialize(params),
    }
}

fn enabled_implies_initialized(flags: RiFlags) -> bool {
    !flags.contains(RiFlags::ENABLED) || flags.contains(RiFlags::INITIALIZED)
}

#[test]
fn walk_through_every_state() {
    let (_hw, controller) = controller();
    let mut cb = RiControlBlock::default();
    let mut params = RiParameters::new();

    controller.params_init(&mut params, Some(NonNull::from(&mut cb)));
    assert_eq!(params.flags().bits(), 0);

    controller.initialize(&mut params).unwrap();
    assert_eq!(params.flags().bits(), 0x2);

    controller.enable(&mut params).unwrap();
    assert_eq!(params.flags().bits(), 0x3);

    controller.disable(&mut params).unwrap();
    assert_eq!(params.flags().bits(), 0x2);

    controller.deinitialize(&mut params).unwrap();
    assert_eq!(params.flags().bits(), 0);
    assert_eq!(params.control_block(), Some(NonNull::from(&mut cb)));
}

#[test]
fn enable_without_initialize_does_nothing() {
    let (hw, controller) = controller();
    let mut cb = RiControlBlock::default();
    let mut params = RiParameters::new();
    controller.params_init(&mut params, Some(NonNull::from(&mut cb)));

    assert_eq!(controller.enable(&mut params), Err(Error::NotInitialized));
    assert_eq!(params.flags().bits(), 0);
    assert_eq!(hw.rion_calls(), 0);
}

#[test]
fn many_cycles_keep_the_invariant() {
    let (hw, controller) = controller();
    let mut params = RiParameters::new();
    controller.params_init(&mut params, None);

    for _ in 0..3 {
        controller.initialize(&mut params).unwrap();
        assert!(enabled_implies_initialized(params.flags()));
        for _ in 0..5 {
            controller.enable(&mut params).unwrap();
            assert!(enabled_implies_initialized(params.flags()));
            controller.disable(&mut params).unwrap();
            assert!(enabled_implies_initialized(params.flags()));
        }
        controller.deinitialize(&mut params).unwrap();
        assert!(params.flags().is_empty());
    }

    assert_eq!(hw.rion_calls(), 15);
    assert_eq!(hw.rioff_calls(), 15);
}

/// Every sequence of up to six steps that never deinitializes while enabled
/// keeps ENABLED => INITIALIZED, whether or not individual steps are refused.
#[test]
fn enabled_implies_initialized_for_all_short_sequences() {
    const LEN: u32 = 6;
    let (_hw, controller) = controller();

    for mut seq in 0..STEPS.len().pow(LEN) {
        let mut params = RiParameters::new();
        controller.params_init(&mut params, None);

        for _ in 0..LEN {
            let step = STEPS[seq % STEPS.len()];
            seq /= STEPS.len();

            if matches!(step, Step::Deinitialize) && params.is_enabled() {
                continue;
            }
            let before = params.flags();
            let result = run(&controller, &mut params, step);
            if result.is_err() {
                assert_eq!(params.flags(), before, "{:?} failed but changed state", step);
            }
            assert!(
                enabled_implies_initialized(params.flags()),
                "{:?} broke the invariant: {:?}",
                step,
                params.flags()
            );
        }
    }
}

#[test]
fn disable_when_already_disabled() {
    let (_hw, controller) = controller();
    let mut params = RiParameters::new();
    controller.initialize(&mut params).unwrap();

    controller.disable(&mut params).unwrap();
    controller.disable(&mut params).unwrap();
    assert_eq!(params.flags(), RiFlags::INITIALIZED);
}

#[test]
fn threads_are_independent() {
    let (hw, controller) = controller();
    let controller = std::sync::Arc::new(controller);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let controller = controller.clone();
            std::thread::spawn(move || {
                let mut params = RiParameters::new();
                controller.params_init(&mut params, None);
                controller.initialize(&mut params).unwrap();
                if i % 2 == 0 {
                    controller.enable(&mut params).unwrap();
                }
                params.flags()
            })
        })
        .collect();

    let running = RiFlags::INITIALIZED | RiFlags::ENABLED;
    let flags: Vec<RiFlags> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(
        flags,
        vec![
            running,
            RiFlags::INITIALIZED,
            running,
            RiFlags::INITIALIZED
        ]
    );
    assert_eq!(hw.rion_calls(), 2);
}
