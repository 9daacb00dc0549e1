#![deny(missing_docs)]
//! stats_core: shared building blocks for the nhlstats driver (config, page cache, logging, collectors).

/// Configuration helpers (AppId, dirs, load_or_init, etc.)
pub mod cfg;
/// Filesystem page cache keyed by source URL.
pub mod cache;
/// Tracing/log initialization helpers.
pub mod logx;
/// Named collection actions and the per-process schedule config.
pub mod action;
/// Collectors for the NHL statistics endpoints.
pub mod collect;
