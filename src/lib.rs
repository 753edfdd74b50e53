// src/lib.rs

//! Domain reconnaissance engine.
//!
//! A scan walks a fixed pipeline of probes (DNS, WHOIS, TLS, fingerprinting,
//! ports, subdomains, API endpoints, vulnerability and misconfiguration
//! detectors), persists its status and progress through a [`ScanStore`], and
//! streams progress to a [`NotificationSink`].
//!
//! [`ScanStore`]: core::store::ScanStore
//! [`NotificationSink`]: core::notify::NotificationSink

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
