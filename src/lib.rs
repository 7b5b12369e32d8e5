//! # VE.Direct Capture Library
//!
//! Read live telemetry from a Victron solar charge controller over its
//! VE.Direct serial port.
//!
//! This library captures a window of the controller's text-mode stream,
//! locates the latest complete block, decodes its fields and normalizes them
//! into SI units, producing a fixed-layout record for report formatters.

pub mod config;
pub mod error;
pub mod serial;
pub mod telemetry;
pub mod vedirect;
