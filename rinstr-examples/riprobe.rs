/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Walks the calling thread through the whole runtime-instrumentation
//! lifecycle and reports what happened at each step. On a machine without the
//! hardware every step reports that it is unsupported, which is also useful to
//! know.

use std::hint::black_box;

use clap::Parser;
use rinstr::Error;
use rinstr::RiControlBlock;
use rinstr::RiControlFlags;
use rinstr::RiController;
use rinstr::RiModeFlags;
use rinstr::RiParameters;
use rinstr_util::RiArguments;

#[derive(Debug, Parser)]
struct Args {
    #[clap(flatten)]
    common: RiArguments,

    /// Loop iterations to run while instrumentation is on.
    #[clap(long, default_value_t = 1_000_000)]
    iterations: u64,

    /// Size of the sample buffer in bytes.
    #[clap(long, default_value_t = 4096)]
    buffer_size: usize,
}

fn report(step: &str, result: Result<(), Error>) -> bool {
    match result {
        Ok(()) => {
            println!("{:<16} ok", step);
            true
        }
        Err(err) => {
            println!("{:<16} {} (code {})", step, err, err.code());
            false
        }
    }
}

fn spin(iterations: u64) -> u64 {
    let mut acc = 0u64;
    for i in 0..iterations {
        acc = black_box(acc.wrapping_mul(31).wrapping_add(i));
    }
    acc
}

fn run(controller: &RiController, args: &Args) -> anyhow::Result<()> {
    anyhow::ensure!(args.buffer_size > 0, "--buffer-size must be at least 1");
    let mut buffer = vec![0u8; args.buffer_size];
    let mut cb = RiControlBlock::default();
    cb.set_buffer(&mut buffer)
        .set_control_flags(
            RiControlFlags::VALID
                | RiControlFlags::PSTATE
                | RiControlFlags::PSTATE_SAMPLE
                | RiControlFlags::PSTATE_COLLECT
                | RiControlFlags::BUFFER_FULL_INT,
        )
        .set_mode_flags(RiModeFlags::CALL_TYPE_BR | RiModeFlags::RETURN_TYPE_BR)
        .set_scaling_factor(1000);

    let support_code = controller.enable_support_code();
    println!("{:<16} {}", "enable_support", support_code);

    let mut params = RiParameters::new();
    controller.params_init(&mut params, Some((&mut cb).into()));

    if report("initialize", controller.initialize(&mut params)) {
        if report("enable", controller.enable(&mut params)) {
            let acc = spin(args.iterations);
            tracing::debug!("[riprobe] spin result {}", acc);
            report("disable", controller.disable(&mut params));
        }
        report("deinitialize", controller.deinitialize(&mut params));
    }
    println!("{:<16} {:#x}", "final flags", params.flags().bits());

    println!(
        "{:<16} {}",
        "disable_support",
        controller.disable_support_code()
    );

    let events = rinstr::signal::events();
    println!(
        "{:<16} buffer full {}, halted {}",
        "signals", events.buffer_full, events.halted
    );
    println!(
        "{:<16} {:#x}..{:#x}, next {:#x}",
        "buffer",
        cb.buffer_origin(),
        cb.buffer_limit(),
        cb.buffer_current()
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let log_guard = args.common.init_tracing();

    let controller = rinstr::init_native(args.common.config())?;
    println!(
        "{:<16} {}",
        "ri facility",
        rinstr_sys::facility::has_runtime_instrumentation()
    );
    println!("{:<16} {}", "backend", controller.backend_name());
    println!("{:<16} {}", "signal", controller.support().signal());

    let result = run(controller, &args);
    drop(log_guard); // Flush logs before exiting.
    result
}
