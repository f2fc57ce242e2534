// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Collection loop
//!
//! A single task alternates between waiting and working: it waits on the
//! collection interval and the shutdown future, and when the interval fires it
//! samples and delivers inline before waiting again. Ticks therefore never
//! overlap, and a shutdown that arrives mid-delivery is seen once that
//! delivery returns.

use falcon_push::Deliver;
use memstats_collector::sampler::{MemStatsReader, Sampler};
use std::future::Future;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::info;

use crate::signals::ShutdownSignal;

pub struct Scheduler<R, D> {
    sampler: Sampler<R>,
    reporter: D,
    interval: Duration,
}

impl<R, D> Scheduler<R, D>
where
    R: MemStatsReader,
    D: Deliver,
{
    pub fn new(sampler: Sampler<R>, reporter: D, interval: Duration) -> Self {
        Self {
            sampler,
            reporter,
            interval,
        }
    }

    /// Runs collections every interval until `shutdown` resolves, and returns
    /// the signal that stopped it. The first collection happens one full
    /// interval after the call.
    pub async fn run<F>(&self, shutdown: F) -> ShutdownSignal
    where
        F: Future<Output = ShutdownSignal>,
    {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Shutdown first: once it is ready no new collection starts.
                biased;

                signal = &mut shutdown => {
                    info!("Received {signal}");
                    return signal;
                }
                _ = ticker.tick() => self.tick().await,
            }
        }
    }

    /// One collect-and-deliver cycle.
    pub async fn tick(&self) {
        info!("Begin collecting memory stats");
        let batch = self.sampler.collect();
        self.reporter.deliver(&batch).await;
        info!("End collecting memory stats");
    }
}
