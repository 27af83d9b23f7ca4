#![cfg_attr(not(test), no_std)]

/// Incremental mean and second moment of a stream of samples.
///
/// `push` is Welford's update; `merge` is the pairwise combination of two
/// independently accumulated streams, so per-worker statistics can be folded
/// into one without revisiting the samples.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStat {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStat {
    pub const fn new() -> Self {
        Self { count: 0, mean: 0.0, m2: 0.0 }
    }

    /// Builds a statistic from a known count and mean with no spread information.
    pub fn from_mean(count: u64, mean: f64) -> Self {
        Self { count, mean: if count == 0 { 0.0 } else { mean }, m2: 0.0 }
    }

    pub fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    pub fn merge(&mut self, other: &RunningStat) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let n_a = self.count as f64;
        let n_b = other.count as f64;
        let n = n_a + n_b;
        let delta = other.mean - self.mean;
        // Weighted form keeps the combined mean equal to Σ mean·n / Σ n.
        self.mean = (self.mean * n_a + other.mean * n_b) / n;
        self.m2 += other.m2 + delta * delta * n_a * n_b / n;
        self.count += other.count;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.mean)
        }
    }

    /// Sample variance; needs at least two samples.
    pub fn variance(&self) -> Option<f64> {
        if self.count < 2 {
            None
        } else {
            Some(self.m2 / (self.count - 1) as f64)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Rollout statistics one worker keeps for one candidate move.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CandidateStatistics {
    pub equity: RunningStat,
    pub win: RunningStat,
}

impl CandidateStatistics {
    pub const fn new() -> Self {
        Self { equity: RunningStat::new(), win: RunningStat::new() }
    }

    /// Records one rollout. `win` is 1.0 for a win, 0.5 for a tie, 0.0 otherwise.
    pub fn record(&mut self, equity: f64, win: f64) {
        self.equity.push(equity);
        self.win.push(win);
    }

    pub fn iterations(&self) -> u64 {
        self.equity.count()
    }

    pub fn merge(&mut self, other: &CandidateStatistics) {
        self.equity.merge(&other.equity);
        self.win.merge(&other.win);
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Iteration-weighted mean: Σ(mean × count) / Σ count.
///
/// Returns `None` when the total count is zero.
pub fn weighted_mean<I>(parts: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, u64)>,
{
    let (sum, total) = parts
        .into_iter()
        .fold((0.0f64, 0u64), |(sum, total), (mean, count)| {
            (sum + mean * count as f64, total + count)
        });
    if total == 0 {
        None
    } else {
        Some(sum / total as f64)
    }
}

/// Folds any number of running statistics into one.
pub fn combine<'a, I>(parts: I) -> RunningStat
where
    I: IntoIterator<Item = &'a RunningStat>,
{
    parts.into_iter().fold(RunningStat::new(), |mut acc, part| {
        acc.merge(part);
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_push_tracks_mean_and_variance() {
        let mut stat = RunningStat::new();
        for x in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stat.push(x);
        }
        assert_eq!(stat.count(), 8);
        assert!(approx(stat.mean().unwrap(), 5.0));
        assert!(approx(stat.variance().unwrap(), 32.0 / 7.0));
    }

    #[test]
    fn test_empty_stat_has_no_mean() {
        let stat = RunningStat::new();
        assert!(stat.is_empty());
        assert_eq!(stat.mean(), None);
        assert_eq!(stat.variance(), None);
    }

    #[test]
    fn test_merge_matches_single_stream() {
        let samples = [1.0, 3.0, 8.0, -2.0, 6.5, 0.25, 11.0];
        let mut whole = RunningStat::new();
        let mut left = RunningStat::new();
        let mut right = RunningStat::new();
        for (i, x) in samples.iter().enumerate() {
            whole.push(*x);
            if i < 3 {
                left.push(*x);
            } else {
                right.push(*x);
            }
        }
        left.merge(&right);
        assert_eq!(left.count(), whole.count());
        assert!(approx(left.mean().unwrap(), whole.mean().unwrap()));
        assert!(approx(left.variance().unwrap(), whole.variance().unwrap()));
    }

    #[test]
    fn test_merge_with_empty_is_identity() {
        let mut stat = RunningStat::from_mean(4, 2.5);
        stat.merge(&RunningStat::new());
        assert_eq!(stat, RunningStat::from_mean(4, 2.5));

        let mut empty = RunningStat::new();
        empty.merge(&RunningStat::from_mean(4, 2.5));
        assert_eq!(empty, RunningStat::from_mean(4, 2.5));
    }

    #[test]
    fn test_weighted_mean() {
        assert_eq!(weighted_mean([(10.0, 3), (20.0, 7)]), Some(17.0));
        assert_eq!(weighted_mean([(10.0, 0), (20.0, 0)]), None);
        assert_eq!(weighted_mean(std::iter::empty()), None);
    }

    #[test]
    fn test_combine_is_weighted() {
        let parts = [RunningStat::from_mean(3, 10.0), RunningStat::from_mean(7, 20.0)];
        let combined = combine(parts.iter());
        assert_eq!(combined.count(), 10);
        assert!(approx(combined.mean().unwrap(), 17.0));
    }

    #[test]
    fn test_candidate_statistics_record() {
        let mut stats = CandidateStatistics::new();
        stats.record(30.0, 1.0);
        stats.record(10.0, 0.0);
        assert_eq!(stats.iterations(), 2);
        assert!(approx(stats.equity.mean().unwrap(), 20.0));
        assert!(approx(stats.win.mean().unwrap(), 0.5));
        stats.reset();
        assert_eq!(stats.iterations(), 0);
    }
}
