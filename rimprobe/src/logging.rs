// SPDX-License-Identifier: MIT
// rimprobe/src/logging.rs

use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Sets the CLI verbosity and installs the `log` backend for library diagnostics.
///
/// `RUST_LOG` wins when set; otherwise `--verbose` raises the default to `debug`.
pub fn init(verbose: bool) {
    VERBOSE.store(verbose, Ordering::Relaxed);
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

#[macro_export]
macro_rules! log_normal {
    ($($arg:tt)*) => {{
        println!("[rimprobe] {}", format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! log_verbose {
    ($($arg:tt)*) => {{
        if $crate::logging::is_verbose() {
            println!("[rimprobe] {}", format_args!($($arg)*));
        }
    }};
}
