// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Heap statistics reported by jemalloc
//!
//! The counters are only meaningful when jemalloc is the process-global
//! allocator. A binary opts in with:
//!
//! ```rust,ignore
//! #[global_allocator]
//! static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;
//! ```

use tikv_jemalloc_ctl::{epoch, stats};

/// Point-in-time copy of jemalloc's global counters, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocSnapshot {
    /// Bytes handed out to the application.
    pub allocated: u64,
    /// Bytes in active pages, a multiple of the page size.
    pub active: u64,
    /// Bytes in physically resident data pages mapped by the allocator.
    pub resident: u64,
    /// Bytes in active extents mapped by the allocator.
    pub mapped: u64,
    /// Bytes dedicated to allocator metadata.
    pub metadata: u64,
    /// Bytes in virtual mappings kept instead of being returned to the OS.
    pub retained: u64,
}

/// Refreshes jemalloc's cached statistics and reads them.
///
/// jemalloc only updates the `stats.*` values when the epoch is advanced, so
/// every call advances it first.
pub fn read_allocator_stats() -> Result<AllocSnapshot, tikv_jemalloc_ctl::Error> {
    epoch::advance()?;
    Ok(AllocSnapshot {
        allocated: stats::allocated::read()? as u64,
        active: stats::active::read()? as u64,
        resident: stats::resident::read()? as u64,
        mapped: stats::mapped::read()? as u64,
        metadata: stats::metadata::read()? as u64,
        retained: stats::retained::read()? as u64,
    })
}
