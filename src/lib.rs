//! Campaigner: a call-budgeted marketing-analytics orchestrator.
//!
//! One request in, one six-section report out. A controller invokes each
//! capability (data, performance, creative, chart, research) at most once,
//! in a fixed order, under a per-request brand lock. The chart capability
//! renders whatever table it is handed without prior schema knowledge.
//!
//! See `DESIGN.md` for the module map.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;
pub mod prompts;
pub mod providers;

pub mod artifacts;
pub mod chart;
pub mod tabular;

pub mod capability;
pub mod pipeline;
pub mod report;
