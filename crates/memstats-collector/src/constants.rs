// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Reporting step attached to every record, in seconds.
pub const STEP_SECS: u64 = 60;

/// Period between two collections. Derived from [`STEP_SECS`] so the collector's
/// aggregation step always matches how often we actually report.
pub const COLLECTION_INTERVAL: Duration = Duration::from_secs(STEP_SECS);

/// Per-process status file read on every collection.
pub const PROC_SELF_STATUS_PATH: &str = "/proc/self/status";
