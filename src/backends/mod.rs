//! Shipped implementations of the engine seams.
//!
//! The coordinator itself is engine-agnostic; these modules provide the
//! implementations a desktop deployment typically wires in.

pub mod cpal_capture;
pub mod espeak;
