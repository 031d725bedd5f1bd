//! Synchronization primitives that do not depend on a concrete async runtime
//! or on `std::thread`.
//!
//! [`Mutex`] is suitable for serializing access to a resource shared between
//! cooperatively scheduled tasks running on a single executor (the air side's
//! task model, see spec §5). Ground-side code that runs on real POSIX threads
//! uses `std::sync::Mutex` directly instead — there is no benefit in
//! reinventing a blocking mutex once real OS threads are available.

mod mutex;

pub use mutex::{Mutex, MutexGuard};
