/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Command line and environment configuration for tools that drive runtime
//! instrumentation. Every option can also be set from the environment, which
//! is how an embedding runtime usually passes them along.

use std::io;
use std::path::Path;
use std::path::PathBuf;

use chrono::Local;
use clap::Parser;
use rinstr::BackendSelection;
use rinstr::Config;
use rinstr::DEFAULT_SIGNAL_OFFSET;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Parses a boolean from the command line or the environment. Accepts the
/// usual spellings so that `RINSTR_POWER_THREAD_INIT=1` works.
pub fn parse_bool_flag(s: &str) -> Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(format!("expected a boolean, got {:?}", other)),
    }
}

// Arguments shared by every tool. Designed to be flattened into a tool's own
// argument struct.
//
// NOTE: Do not change this to a doc comment, it would become the tool's help
// text.
#[allow(missing_docs)]
#[derive(Debug, Clone, Parser)]
pub struct RiArguments {
    /// Direct logging to a file. This can also be set with the RUST_LOG_FILE
    /// environment variable, but the CLI flag takes precedence.
    #[clap(long = "log-file", value_name = "PATH", env = "RUST_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Use SIGRTMIN + OFFSET as the runtime-instrumentation signal.
    #[clap(
        long = "signal-offset",
        value_name = "OFFSET",
        env = "RINSTR_SIGNAL_OFFSET",
        default_value_t = DEFAULT_SIGNAL_OFFSET
    )]
    pub signal_offset: i32,

    /// Backend to use: native, unsupported or ztpf.
    #[clap(
        long = "backend",
        value_name = "BACKEND",
        env = "RINSTR_BACKEND",
        default_value_t = BackendSelection::Native
    )]
    pub backend: BackendSelection,

    /// On POWER, let per-thread initialization succeed so that the
    /// performance monitor can actually be switched on.
    #[clap(
        long = "power-thread-init",
        value_name = "BOOL",
        env = "RINSTR_POWER_THREAD_INIT",
        action = clap::ArgAction::Set,
        default_value = "false",
        default_missing_value = "true",
        num_args = 0..=1,
        value_parser = parse_bool_flag
    )]
    pub power_thread_init: bool,
}

impl Default for RiArguments {
    fn default() -> Self {
        let config = Config::default();
        Self {
            log_file: None,
            signal_offset: config.signal_offset,
            backend: config.backend,
            power_thread_init: config.power_thread_init,
        }
    }
}

impl RiArguments {
    /// The controller configuration described by these arguments.
    pub fn config(&self) -> Config {
        Config {
            signal_offset: self.signal_offset,
            backend: self.backend,
            power_thread_init: self.power_thread_init,
        }
    }

    /// Installs the global tracing subscriber, writing to `log_file` if one
    /// was given and to stderr otherwise. Keep the returned guard alive until
    /// the end of `main` so buffered log lines are flushed.
    pub fn init_tracing(&self) -> Option<WorkerGuard> {
        fn set_subscriber_with_writer<
            T: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
        >(
            writer: T,
        ) {
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .with_writer(writer)
                .finish();
            if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
                eprintln!(" [rinstr] WARNING: could not install tracing subscriber: {}", err);
            }
        }

        self.log_file
            .as_ref()
            .and_then(|lf| {
                let parent = lf.parent()?;
                let filename = available_log_name(parent, lf.file_name()?.to_os_string());

                match filename {
                    None => {
                        eprintln!(" [rinstr] WARNING: could not open log file, falling back to stderr");
                        None
                    }
                    Some(filename) => {
                        let file_writer = tracing_appender::rolling::never(parent, &filename);
                        let (file_writer, guard) = tracing_appender::non_blocking(file_writer);

                        eprintln!(" [rinstr] Logging to file at {:?}", parent.join(&filename));
                        set_subscriber_with_writer(file_writer);
                        Some(guard)
                    }
                }
            })
            .or_else(|| {
                set_subscriber_with_writer(io::stderr);
                None
            })
    }
}

/// Picks a log file name in `dir` that does not exist yet, appending a
/// timestamp to `name` if needed. Gives up after 100 attempts.
fn available_log_name(dir: &Path, name: std::ffi::OsString) -> Option<std::ffi::OsString> {
    let mut filename = name.clone();
    for _ in 0..100 {
        if !dir.join(&filename).exists() {
            return Some(filename);
        }
        filename = name.clone();
        filename.push(format!("{}", Local::now().format(".%Y%m%d.%H%M%S.%f")));
    }
    None
}
