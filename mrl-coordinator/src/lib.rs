//! The MapReduce (lite) coordinator: a gRPC front for the task scheduler,
//! plus the driver that decides when the process may exit.

pub mod args;
pub mod core;
pub mod driver;

pub use crate::core::{serve, MRCoordinator};
pub use crate::driver::{run, wait_for_completion};
