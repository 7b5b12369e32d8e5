//! # VE.Direct Protocol Module
//!
//! Implementation of the Victron VE.Direct text-mode protocol.
//!
//! This module handles:
//! - Locating the latest complete block inside a raw serial capture
//! - Tokenizing block lines into field code / value pairs
//! - Normalizing raw values into SI units and enumeration labels
//! - Assembling the fixed-layout record handed to report formatters
//! - Optional modulo-256 block checksum validation

pub mod protocol;
pub mod locator;
pub mod decoder;
pub mod normalizer;
pub mod record;
pub mod checksum;
