use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::warn;

use common::Candle;

/// Result of feeding one tick into the assembler. The funnel gates inference
/// on `NewBucket`: the first market event of a completed period triggers
/// analysis against the finalized history, subsequent ticks in the same
/// bucket only update the in-progress candle (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Updated,
    NewBucket,
}

/// Reconstructs fixed-period OHLCV candles from a stream of mid-prices and
/// owns the dedup rule that guards against overlap with backfilled history
/// (spec §9 redesign note: extracted out of the strategy so it can be tested
/// with pre-baked candles).
pub struct CandleAssembler {
    period: ChronoDuration,
    history_length: usize,
    history: VecDeque<Candle>,
    seen_starts: HashSet<DateTime<Utc>>,
    current: Option<Candle>,
}

impl CandleAssembler {
    pub fn new(period: ChronoDuration, history_length: usize) -> Self {
        Self {
            period,
            history_length,
            history: VecDeque::with_capacity(history_length),
            seen_starts: HashSet::with_capacity(history_length),
            current: None,
        }
    }

    pub fn history(&self) -> &VecDeque<Candle> {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Insert backfilled candles at startup. Preserves the dedup rule and
    /// trims to `history_length`, keeping the most recent entries — the
    /// backfill source already excludes the final incomplete candle (spec §6).
    pub fn warm_up(&mut self, mut candles: Vec<Candle>) {
        candles.sort_by_key(|c| c.start_time);
        for candle in candles {
            self.push_finalized(candle);
        }
    }

    fn bucket(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        let period_secs = self.period.num_seconds().max(1);
        let epoch_secs = timestamp.timestamp();
        let floored = (epoch_secs.div_euclid(period_secs)) * period_secs;
        DateTime::from_timestamp(floored, 0).unwrap_or(timestamp)
    }

    fn push_finalized(&mut self, candle: Candle) {
        if self.seen_starts.contains(&candle.start_time) {
            warn!(start_time = %candle.start_time, "duplicate candle start_time ignored");
            return;
        }
        self.seen_starts.insert(candle.start_time);
        self.history.push_back(candle);
        while self.history.len() > self.history_length {
            if let Some(evicted) = self.history.pop_front() {
                self.seen_starts.remove(&evicted.start_time);
            }
        }
    }

    /// Fold one mid-price tick into the current candle. Returns
    /// `TickOutcome::NewBucket` exactly when a period boundary was crossed —
    /// this is also true for the very first tick ever seen, since there is no
    /// previous candle to extend.
    pub fn on_tick(&mut self, timestamp: DateTime<Utc>, mid: f64) -> TickOutcome {
        let bucket = self.bucket(timestamp);

        if let Some(current) = &mut self.current {
            if current.start_time == bucket {
                current.high = current.high.max(mid);
                current.low = current.low.min(mid);
                current.close = mid;
                return TickOutcome::Updated;
            }
        }

        if let Some(finished) = self.current.take() {
            self.push_finalized(finished);
        }

        self.current = Some(Candle {
            start_time: bucket,
            open: mid,
            high: mid,
            low: mid,
            close: mid,
            volume: 0.0,
        });

        TickOutcome::NewBucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn same_bucket_updates_high_low_close() {
        let mut a = CandleAssembler::new(ChronoDuration::hours(1), 250);
        assert_eq!(a.on_tick(ts(0), 10.0), TickOutcome::NewBucket);
        assert_eq!(a.on_tick(ts(60), 12.0), TickOutcome::Updated);
        assert_eq!(a.on_tick(ts(120), 9.0), TickOutcome::Updated);
        assert!(a.history().is_empty());
    }

    #[test]
    fn bucket_rollover_finalizes_previous_candle() {
        let mut a = CandleAssembler::new(ChronoDuration::hours(1), 250);
        a.on_tick(ts(0), 10.0);
        a.on_tick(ts(1800), 12.0);
        let outcome = a.on_tick(ts(3600), 11.0);
        assert_eq!(outcome, TickOutcome::NewBucket);
        assert_eq!(a.history().len(), 1);
        let c = a.history().front().unwrap();
        assert_eq!(c.open, 10.0);
        assert_eq!(c.high, 12.0);
        assert_eq!(c.close, 12.0);
    }

    #[test]
    fn duplicate_start_time_is_dropped_not_appended() {
        let mut a = CandleAssembler::new(ChronoDuration::hours(1), 250);
        a.warm_up(vec![Candle {
            start_time: ts(0),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 0.0,
        }]);
        assert_eq!(a.len(), 1);

        a.on_tick(ts(0), 5.0);
        let outcome = a.on_tick(ts(3600), 6.0);
        assert_eq!(outcome, TickOutcome::NewBucket);
        // the bucket starting at ts(0) already exists from warm-up: history
        // length must stay at 1, not grow to 2.
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn history_caps_at_configured_length() {
        let mut a = CandleAssembler::new(ChronoDuration::minutes(1), 3);
        for i in 0..10 {
            a.on_tick(ts(i * 60), i as f64);
        }
        assert!(a.len() <= 3);
    }
}
