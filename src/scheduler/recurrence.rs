//! Recurrence policy for scheduled tasks.
//!
//! Callers describe recurrence with [`TaskOptions`]; at submission the options
//! are resolved into a [`Recurrence`], which the dispatch loop consults after
//! every execution to decide whether (and when) the task fires again.

use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// How many more times a task fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    /// Fire this many more times (including the pending occurrence).
    Times(u32),
    /// Never runs out.
    Forever,
}

/// Options supplied alongside a task at submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskOptions {
    /// Explicit repeat count, if any.
    pub repeat: Option<Repeat>,
    /// Interval between firings. Zero means one-shot.
    pub every: Duration,
    /// Never schedule an occurrence after this time.
    pub until: Option<DateTime<Utc>>,
}

impl TaskOptions {
    /// Options for a plain one-shot task.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire `n` times in total.
    pub fn repeat(mut self, n: u32) -> Self {
        self.repeat = Some(Repeat::Times(n));
        self
    }

    /// Fire until stopped (or until the `until` cutoff).
    pub fn repeat_forever(mut self) -> Self {
        self.repeat = Some(Repeat::Forever);
        self
    }

    /// Interval between firings. The first firing is not delayed.
    pub fn every(mut self, interval: Duration) -> Self {
        self.every = interval;
        self
    }

    /// Do not schedule occurrences after `time`.
    pub fn until(mut self, time: DateTime<Utc>) -> Self {
        self.until = Some(time);
        self
    }

    /// Resolve into recurrence state.
    ///
    /// An interval without an explicit repeat count repeats forever.
    pub fn build(self) -> Recurrence {
        let remaining = match self.repeat {
            Some(repeat) => repeat,
            None if !self.every.is_zero() => Repeat::Forever,
            None => Repeat::Times(0),
        };
        Recurrence {
            remaining,
            interval: self.every,
            not_after: self.until,
        }
    }
}

/// Recurrence state attached to a pending task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recurrence {
    remaining: Repeat,
    interval: Duration,
    not_after: Option<DateTime<Utc>>,
}

impl Recurrence {
    /// A task that fires exactly once.
    pub fn once() -> Self {
        TaskOptions::new().build()
    }

    pub fn remaining(&self) -> Repeat {
        self.remaining
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn not_after(&self) -> Option<DateTime<Utc>> {
        self.not_after
    }

    /// Whether this policy can ever produce a further occurrence.
    pub fn is_one_shot(&self) -> bool {
        self.interval.is_zero()
    }

    /// Compute the state and due time of the next occurrence.
    ///
    /// `now` is when the previous execution finished. Returns `None` when the
    /// task is one-shot, its count is exhausted, or the next due time would
    /// land after `not_after`.
    pub fn advance(self, now: DateTime<Utc>) -> Option<(Recurrence, DateTime<Utc>)> {
        if self.is_one_shot() {
            return None;
        }

        let remaining = match self.remaining {
            Repeat::Forever => Repeat::Forever,
            Repeat::Times(n) => Repeat::Times(n.saturating_sub(1)),
        };
        if remaining == Repeat::Times(0) {
            return None;
        }

        let interval = ChronoDuration::from_std(self.interval).ok()?;
        let next = now.checked_add_signed(interval)?;
        if let Some(cutoff) = self.not_after
            && next > cutoff
        {
            return None;
        }

        Some((
            Recurrence {
                remaining,
                ..self
            },
            next,
        ))
    }
}

impl Default for Recurrence {
    fn default() -> Self {
        Self::once()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    /// Count the occurrences a policy allows, starting with the first firing.
    fn count_firings(mut recurrence: Recurrence, start: DateTime<Utc>, cap: usize) -> usize {
        let mut now = start;
        let mut fired = 1;
        while fired < cap {
            match recurrence.advance(now) {
                Some((next, due)) => {
                    recurrence = next;
                    now = due;
                    fired += 1;
                }
                None => break,
            }
        }
        fired
    }

    #[test]
    fn test_default_options_are_one_shot() {
        let recurrence = TaskOptions::new().build();
        assert!(recurrence.is_one_shot());
        assert_eq!(recurrence.remaining(), Repeat::Times(0));
        assert!(recurrence.advance(Utc::now()).is_none());
    }

    #[test]
    fn test_every_implies_forever() {
        let recurrence = TaskOptions::new().every(ms(10)).build();
        assert_eq!(recurrence.remaining(), Repeat::Forever);
        assert_eq!(recurrence.interval(), ms(10));
    }

    #[test]
    fn test_explicit_repeat_wins_over_every() {
        let a = TaskOptions::new().repeat(3).every(ms(10)).build();
        let b = TaskOptions::new().every(ms(10)).repeat(3).build();
        assert_eq!(a, b);
        assert_eq!(a.remaining(), Repeat::Times(3));
    }

    #[test]
    fn test_repeat_without_interval_never_reschedules() {
        let recurrence = TaskOptions::new().repeat(5).build();
        assert!(recurrence.is_one_shot());
        assert!(recurrence.advance(Utc::now()).is_none());
    }

    #[test]
    fn test_repeat_three_fires_three_times() {
        let recurrence = TaskOptions::new().repeat(3).every(ms(5)).build();
        assert_eq!(count_firings(recurrence, Utc::now(), 100), 3);
    }

    #[test]
    fn test_repeat_one_fires_once() {
        let recurrence = TaskOptions::new().repeat(1).every(ms(5)).build();
        assert_eq!(count_firings(recurrence, Utc::now(), 100), 1);
    }

    #[test]
    fn test_repeat_zero_fires_once() {
        let recurrence = TaskOptions::new().repeat(0).every(ms(5)).build();
        assert_eq!(count_firings(recurrence, Utc::now(), 100), 1);
    }

    #[test]
    fn test_advance_schedules_interval_after_now() {
        let now = Utc::now();
        let recurrence = TaskOptions::new().repeat(2).every(ms(250)).build();
        let (next, due) = recurrence.advance(now).expect("should reschedule");
        assert_eq!(due, now + ChronoDuration::milliseconds(250));
        assert_eq!(next.remaining(), Repeat::Times(1));
    }

    #[test]
    fn test_forever_keeps_forever() {
        let recurrence = TaskOptions::new().repeat_forever().every(ms(1)).build();
        let (next, _) = recurrence.advance(Utc::now()).expect("should reschedule");
        assert_eq!(next.remaining(), Repeat::Forever);
    }

    #[test]
    fn test_until_cuts_off_forever() {
        let start = Utc::now();
        let recurrence = TaskOptions::new()
            .repeat_forever()
            .every(ms(10))
            .until(start + ChronoDuration::milliseconds(35))
            .build();
        // Firings at +0, +10, +20, +30; +40 is past the cutoff.
        assert_eq!(count_firings(recurrence, start, 100), 4);
    }

    #[test]
    fn test_until_allows_exact_cutoff() {
        let start = Utc::now();
        let recurrence = TaskOptions::new()
            .every(ms(10))
            .until(start + ChronoDuration::milliseconds(10))
            .build();
        let (_, due) = recurrence.advance(start).expect("cutoff is inclusive");
        assert_eq!(due, start + ChronoDuration::milliseconds(10));
    }

    #[test]
    fn test_until_in_past_stops_immediately() {
        let now = Utc::now();
        let recurrence = TaskOptions::new()
            .every(ms(1))
            .until(now - ChronoDuration::seconds(1))
            .build();
        assert!(recurrence.advance(now).is_none());
    }

    #[test]
    fn test_huge_interval_does_not_overflow() {
        let recurrence = TaskOptions::new().every(Duration::MAX).build();
        assert!(recurrence.advance(Utc::now()).is_none());
    }
}
