//! Property-Based Tests for the Quota Engine
//!
//! # Test Strategies
//!
//! - **Stats derivation**: remaining never underflows and percentage matches
//!   floating-point rounding for realistic magnitudes
//! - **Recording**: counts accumulate exactly and admission flips at the limit
//! - **Isolation**: activity on one key never changes another key's usage
//!
//! # Running the Tests
//!
//! ```bash
//! cargo test --lib rate_limit::proptests
//! ```

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::sync::Arc;

use crate::rate_limit::clock::ManualClock;
use crate::rate_limit::config::{PolicyConfig, QuotaPolicyRegistry};
use crate::rate_limit::manager::RateLimiter;
use crate::rate_limit::quota::{compute_stats, usage_percentage, WindowState};
use crate::rate_limit::store::WindowedCounterStore;

fn limiter_with(max_requests: u64, window_secs: u64) -> (RateLimiter, ManualClock) {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    let registry =
        QuotaPolicyRegistry::new(vec![PolicyConfig::new("google", window_secs, max_requests)])
            .unwrap();
    let limiter = RateLimiter::with_clock(
        registry,
        WindowedCounterStore::new(),
        Arc::new(clock.clone()),
    );
    (limiter, clock)
}

proptest! {
    #[test]
    fn prop_remaining_never_underflows(count in any::<u64>(), limit in 1u64..) {
        let policy = PolicyConfig::new("google", 60, limit);
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let state = WindowState { count, reset_at: now + Duration::seconds(60) };

        let stats = compute_stats(Some(&state), &policy, now);
        prop_assert_eq!(stats.remaining, limit.saturating_sub(count));
        prop_assert_eq!(stats.used, count);
        prop_assert_eq!(stats.within_limit(), count <= limit);
    }

    #[test]
    fn prop_percentage_is_nearest_integer(count in any::<u64>(), limit in 1u64..) {
        // pct - 1/2 <= 100 * count / limit < pct + 1/2, scaled by 2 * limit
        let pct = usage_percentage(count, limit) as u128;
        let scaled = 200 * count as u128;
        let limit = limit as u128;
        prop_assume!(pct < u64::MAX as u128);
        prop_assert!(2 * pct * limit <= scaled + limit);
        prop_assert!(scaled + limit < 2 * pct * limit + 2 * limit);
    }

    #[test]
    fn prop_percentage_close_to_float(count in 0u64..1_000_000, limit in 1u64..1_000_000) {
        let float = (count as f64 / limit as f64) * 100.0;
        let pct = usage_percentage(count, limit) as f64;
        prop_assert!((pct - float).abs() <= 0.5 + 1e-9);
    }

    #[test]
    fn prop_percentage_monotonic_in_count(count in 0u64..1_000_000, limit in 1u64..10_000) {
        prop_assert!(usage_percentage(count, limit) <= usage_percentage(count + 1, limit));
    }

    #[test]
    fn prop_counts_accumulate(amounts in prop::collection::vec(1u64..50, 1..40), max in 1u64..500) {
        let (limiter, _clock) = limiter_with(max, 3600);

        let mut total = 0u64;
        for amount in &amounts {
            total += amount;
            let allowed = limiter.record_usage("google", "p", *amount).unwrap();
            prop_assert_eq!(allowed, total <= max);
        }

        let stats = limiter.get_usage("google", "p").unwrap();
        prop_assert_eq!(stats.used, total);
        prop_assert_eq!(stats.remaining, max.saturating_sub(total));
    }

    #[test]
    fn prop_get_usage_is_pure(recorded in 0u64..20, reads in 1usize..10) {
        let (limiter, _clock) = limiter_with(10, 60);
        if recorded > 0 {
            limiter.record_usage("google", "p", recorded).unwrap();
        }
        let windows = limiter.tracked_windows();

        let first = limiter.get_usage("google", "p").unwrap();
        for _ in 0..reads {
            prop_assert_eq!(&limiter.get_usage("google", "p").unwrap(), &first);
        }
        prop_assert_eq!(limiter.tracked_windows(), windows);
    }

    #[test]
    fn prop_principals_isolated(a in 1u64..1000, b in 1u64..1000) {
        let (limiter, _clock) = limiter_with(100, 3600);
        limiter.record_usage("google", "alice", a).unwrap();
        limiter.record_usage("google", "bob", b).unwrap();

        prop_assert_eq!(limiter.get_usage("google", "alice").unwrap().used, a);
        prop_assert_eq!(limiter.get_usage("google", "bob").unwrap().used, b);
    }

    #[test]
    fn prop_expiry_restarts_count(first in 1u64..100, gap in 0i64..120, window in 1u64..90) {
        let (limiter, clock) = limiter_with(50, window);
        limiter.record_usage("google", "p", first).unwrap();

        clock.advance(Duration::seconds(gap));
        limiter.record("google", "p").unwrap();

        let used = limiter.get_usage("google", "p").unwrap().used;
        if gap as u64 >= window {
            prop_assert_eq!(used, 1);
        } else {
            prop_assert_eq!(used, first + 1);
        }
    }
}
