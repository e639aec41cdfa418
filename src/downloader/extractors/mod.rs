// Extractor output analysis
//
// The extraction engine only speaks free-form text; this module turns that
// text into structured reasons the retry engine can act on.

pub mod diagnostics;

pub use diagnostics::{diagnose_error, BlockingReason};
