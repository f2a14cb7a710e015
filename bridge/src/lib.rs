// Copyright (c) UniBridge, Inc.
// SPDX-License-Identifier: Apache-2.0

pub mod chain_client;
pub mod circuit_breaker;
pub mod config;
pub mod confirmation_watcher;
pub mod error;
pub mod fee_advisor;
pub mod metrics;
pub mod node;
pub mod oracle;
pub mod orchestrator;
pub mod reserve_ledger;
pub mod settlement;
pub mod tracker;
pub mod ttl_cache;
pub mod types;

#[cfg(test)]
pub mod mock_chain_client;

#[cfg(test)]
pub mod test_utils;


#[macro_export]
macro_rules! retry_with_max_elapsed_time {
    ($func:expr, $max_elapsed_time:expr) => {{
        // The following delay sequence (in secs) will be used, applied with jitter
        // 0.4, 0.8, 1.6, 3.2, 6.4, 12.8, 25.6, 30, 60, 120, 120 ...
        let backoff = backoff::ExponentialBackoff {
            initial_interval: Duration::from_millis(400),
            randomization_factor: 0.1,
            multiplier: 2.0,
            max_interval: Duration::from_secs(120),
            max_elapsed_time: Some($max_elapsed_time),
            ..Default::default()
        };
        backoff::future::retry(backoff, || {
            let fut = async {
                let result = $func.await;
                match result {
                    Ok(_) => {
                        return Ok(result);
                    }
                    Err(e) => {
                        // Every error is treated as transient so the call is
                        // retried until max_elapsed_time runs out
                        tracing::debug!("Retrying due to error: {:?}", e);
                        return Err(backoff::Error::transient(e));
                    }
                }
            };
            std::boxed::Box::pin(fut)
        })
        .await
    }};
}
