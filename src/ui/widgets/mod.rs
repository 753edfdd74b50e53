// src/ui/widgets/mod.rs

// One module per screen region.
pub mod analysis_view; // Findings list and knowledge-base details.
pub mod disclaimer_popup; // Legal disclaimer shown at startup.
pub mod footer; // Key hints for the current state.
pub mod input; // Target domain field.
pub mod log_view; // Live scan event log.
pub mod progress; // Scan progress gauge.
pub mod results; // Raw reconnaissance data from the result document.
pub mod summary; // Score, checks and technologies.
