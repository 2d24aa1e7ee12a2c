//! Utilities for memory-efficient data structures.
//!
//! This module provides low-level utilities used internally by the
//! synchronizer. In particular, it exposes a [`Slab`] of stable slots
//! used as the arena for wait-queue nodes.

mod slab;

pub(crate) use slab::Slab;
