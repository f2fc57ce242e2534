// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Memory stats sampling
//!
//! A [`Sampler`] turns one [`MemStats`] reading into a batch of gauge records,
//! one per tracked counter, all sharing the same timestamp and hostname.

use std::io;
use tracing::debug;

use crate::alloc::{read_allocator_stats, AllocSnapshot};
use crate::constants::PROC_SELF_STATUS_PATH;
use crate::metric::{now_unix_secs, MetricRecord, MetricValue};
use crate::proc::{get_process_status_from_path, ProcessStatus};

/// Number of records produced by every collection.
pub const TRACKED_COUNTERS: usize = 16;

/// jemalloc counters and kernel-side process memory, read together.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemStats {
    pub alloc: AllocSnapshot,
    pub process: ProcessStatus,
}

impl MemStats {
    /// Share of resident memory held by live heap allocations.
    pub fn heap_fraction(&self) -> f64 {
        if self.process.vm_rss == 0 {
            return 0.0;
        }
        self.alloc.allocated as f64 / self.process.vm_rss as f64
    }

    /// The tracked counters as `(metric name, value)` pairs, in a fixed order.
    pub fn counters(&self) -> [(&'static str, MetricValue); TRACKED_COUNTERS] {
        let alloc = &self.alloc;
        let process = &self.process;
        [
            ("Mem.Alloc", alloc.allocated.into()),
            ("Mem.Sys", alloc.mapped.into()),
            ("Mem.HeapInuse", alloc.active.into()),
            ("Mem.HeapResident", alloc.resident.into()),
            ("Mem.HeapReleased", alloc.retained.into()),
            ("Mem.OtherSys", alloc.metadata.into()),
            ("Mem.VmPeak", process.vm_peak.into()),
            ("Mem.VmSize", process.vm_size.into()),
            ("Mem.VmHWM", process.vm_hwm.into()),
            ("Mem.VmRSS", process.vm_rss.into()),
            ("Mem.VmData", process.vm_data.into()),
            ("Mem.VmStk", process.vm_stk.into()),
            ("Mem.RssAnon", process.rss_anon.into()),
            ("Mem.RssFile", process.rss_file.into()),
            ("Mem.Threads", process.threads.into()),
            ("Mem.HeapFraction", MetricValue::float(self.heap_fraction())),
        ]
    }
}

pub trait MemStatsReader {
    fn read(&self) -> MemStats;
}

/// Reads jemalloc's statistics and the process status file.
#[derive(Debug)]
pub struct ProcessMemStatsReader {
    status_path: String,
}

impl ProcessMemStatsReader {
    pub fn new() -> Self {
        Self::with_status_path(PROC_SELF_STATUS_PATH)
    }

    pub fn with_status_path(status_path: impl Into<String>) -> Self {
        Self {
            status_path: status_path.into(),
        }
    }

    /// Checks that both sources can be read at all. Meant to be called once at
    /// startup; later read failures only zero the affected counters.
    pub fn probe(&self) -> Result<(), io::Error> {
        read_allocator_stats().map_err(|e| {
            io::Error::new(io::ErrorKind::Unsupported, format!("jemalloc stats: {e}"))
        })?;
        get_process_status_from_path(&self.status_path).map(|_| ())
    }
}

impl Default for ProcessMemStatsReader {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStatsReader for ProcessMemStatsReader {
    fn read(&self) -> MemStats {
        let alloc = read_allocator_stats().unwrap_or_else(|e| {
            debug!("Could not read jemalloc stats: {e}");
            AllocSnapshot::default()
        });
        let process = get_process_status_from_path(&self.status_path).unwrap_or_else(|e| {
            debug!("Could not read process status from {}: {e}", self.status_path);
            ProcessStatus::default()
        });
        MemStats { alloc, process }
    }
}

pub struct Sampler<R> {
    reader: R,
    hostname: String,
}

impl<R: MemStatsReader> Sampler<R> {
    /// Creates a sampler stamping every record with `hostname`.
    pub fn new(reader: R, hostname: String) -> Self {
        Self { reader, hostname }
    }

    /// Reads the current stats and returns one record per tracked counter.
    pub fn collect(&self) -> Vec<MetricRecord> {
        let stats = self.reader.read();
        let timestamp = now_unix_secs();
        stats
            .counters()
            .into_iter()
            .map(|(metric, value)| {
                MetricRecord::gauge(self.hostname.as_str(), metric, value, timestamp)
            })
            .collect()
    }
}
