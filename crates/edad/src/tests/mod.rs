//! Crate-level suites driving the service over real sockets.

mod process_behaviour;
mod support;
