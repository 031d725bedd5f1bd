//! Logger backend agnostic logging.
//!
//! Ported from the teacher's logging facade: the core crates never pick a
//! concrete logging backend themselves, so they can be linked into either a
//! `defmt`-based embedded air build or a `tracing`/`log`-based ground build.

#[cfg(all(feature = "defmt", feature = "log"))]
compile_error!("Cannot select log and defmt features together.");

#[cfg(feature = "defmt")]
pub use defmt::{debug, error, info, trace, warn};

#[cfg(feature = "log")]
pub use log::{debug, error, info, trace, warn};

#[cfg(not(any(feature = "defmt", feature = "log")))]
#[allow(unused_macros)]
#[macro_export]
macro_rules! error {
    ($($arg:tt),*) => {{ // no-op
    }};
}

#[cfg(not(any(feature = "defmt", feature = "log")))]
#[allow(unused_macros)]
#[macro_export]
macro_rules! warn {
    ($($arg:tt),*) => {{ // no-op
    }};
}

#[cfg(not(any(feature = "defmt", feature = "log")))]
#[allow(unused_macros)]
#[macro_export]
macro_rules! info {
    ($($arg:tt),*) => {{ // no-op
    }};
}

#[cfg(not(any(feature = "defmt", feature = "log")))]
#[allow(unused_macros)]
#[macro_export]
macro_rules! debug {
    ($($arg:tt),*) => {{ // no-op
    }};
}

#[cfg(not(any(feature = "defmt", feature = "log")))]
#[allow(unused_macros)]
#[macro_export]
macro_rules! trace {
    ($($arg:tt),*) => {{ // no-op
    }};
}

#[cfg(not(any(feature = "defmt", feature = "log")))]
pub use crate::{debug, error, info, trace, warn};
