// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `/proc/self/status` parsing for process memory counters.
//!
//! The status file is a list of `Key:\tvalue [unit]` lines. The memory lines we
//! care about are reported in kB:
//!
//! ```text
//! VmPeak:	   12345 kB
//! VmSize:	   12000 kB
//! VmHWM:	    4000 kB
//! VmRSS:	    3900 kB
//! RssAnon:	    1200 kB
//! RssFile:	    2700 kB
//! VmData:	    2048 kB
//! VmStk:	     132 kB
//! Threads:	2
//! ```

use std::fs;
use std::io;
use tracing::debug;

/// Memory counters of the current process, in bytes (except `threads`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessStatus {
    pub vm_peak: u64,
    pub vm_size: u64,
    pub vm_hwm: u64,
    pub vm_rss: u64,
    pub vm_data: u64,
    pub vm_stk: u64,
    pub rss_anon: u64,
    pub rss_file: u64,
    pub threads: u64,
}

/// Reads memory counters from a status file at `path`.
///
/// Lines with an unparseable value leave the matching counter at 0. The call
/// only fails when the file cannot be read or holds none of the known keys.
pub fn get_process_status_from_path(path: &str) -> Result<ProcessStatus, io::Error> {
    let contents = fs::read_to_string(path)?;
    let mut status = ProcessStatus::default();
    let mut found = 0;

    for line in contents.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let field = match key {
            "VmPeak" => &mut status.vm_peak,
            "VmSize" => &mut status.vm_size,
            "VmHWM" => &mut status.vm_hwm,
            "VmRSS" => &mut status.vm_rss,
            "VmData" => &mut status.vm_data,
            "VmStk" => &mut status.vm_stk,
            "RssAnon" => &mut status.rss_anon,
            "RssFile" => &mut status.rss_file,
            "Threads" => &mut status.threads,
            _ => continue,
        };
        found += 1;
        match parse_value(rest) {
            Some(value) => *field = value,
            None => debug!("Could not parse {key} from {path}: {rest:?}"),
        }
    }

    if found == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("No memory counters found in {path}"),
        ));
    }

    Ok(status)
}

/// Parses `"   3900 kB"` into bytes and `"2"` as a plain count.
fn parse_value(raw: &str) -> Option<u64> {
    let mut parts = raw.split_whitespace();
    let value: u64 = parts.next()?.parse().ok()?;
    match parts.next() {
        None => Some(value),
        Some("kB") => value.checked_mul(1024),
        Some(_) => None,
    }
}
