// Logging shims: forward to `tracing` when enabled, expand to nothing otherwise.

cfg_if::cfg_if! {
    if #[cfg(feature = "tracing")] {
        #[allow(unused_imports)]
        pub(crate) use tracing::{debug, error, trace, warn};
    } else {
        macro_rules! trace {
            ($($arg:tt)*) => {};
        }
        macro_rules! debug {
            ($($arg:tt)*) => {};
        }
        macro_rules! warn {
            ($($arg:tt)*) => {};
        }
        macro_rules! error {
            ($($arg:tt)*) => {};
        }
        #[allow(unused_imports)]
        pub(crate) use {debug, error, trace, warn};
    }
}
