// src/core/mod.rs

// The scanning engine. `scanner` and `detectors` gather data, `coordinator`
// walks one scan through the `pipeline`, `runner` runs many of them, and
// `store` / `notify` are the outward-facing seams.

/// Data structures shared by every layer: scans, results, findings and events.
pub mod models;

/// Probe library, one module per kind of network check.
pub mod scanner;

/// Finding producers for the vulnerability and misconfiguration stages.
pub mod detectors;

/// Titles, severities and remediation text for every finding code.
pub mod knowledge_base;

pub mod coordinator;
pub mod notify;
pub mod pipeline;
pub mod progress;
pub mod results;
pub mod runner;
pub mod store;
