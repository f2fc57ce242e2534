// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Hostname detection

use tracing::warn;

/// Returns the system hostname, or an empty string when it cannot be
/// determined or is not valid UTF-8.
///
/// Resolved once at startup; the result is handed to the sampler by value.
#[must_use]
pub fn get_hostname() -> String {
    match nix::unistd::gethostname() {
        Ok(hostname) => match hostname.into_string() {
            Ok(hostname) => hostname,
            Err(raw) => {
                warn!("System hostname is not valid UTF-8: {raw:?}");
                String::new()
            }
        },
        Err(e) => {
            warn!("Failed to get system hostname: {e}");
            String::new()
        }
    }
}
