//! Crate-internal test suites.

pub(crate) mod support;
