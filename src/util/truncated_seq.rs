//! A bounded window of recent samples with both plain and exponentially decaying statistics.

/// Weight given to history by the decaying average unless told otherwise.
pub const DEFAULT_ALPHA: f64 = 0.7;

/// The most recent `length` samples of a series.
///
/// `avg`/`variance`/`sd` are computed over the retained window only.  `davg`/`dvariance`/`dsd`
/// decay over every sample ever added: a new sample `v` moves the average to
/// `(1 - alpha) * v + alpha * davg`.
#[derive(Clone, Debug)]
pub struct TruncatedSeq {
    samples: Vec<f64>,
    next: usize,
    num: usize,
    sum: f64,
    sum_of_squares: f64,
    alpha: f64,
    davg: f64,
    dvariance: f64,
}

impl TruncatedSeq {
    pub fn new(length: usize, alpha: f64) -> Self {
        assert!(length > 0);
        debug_assert!((0.0..=1.0).contains(&alpha));
        Self {
            samples: vec![0.0; length],
            next: 0,
            num: 0,
            sum: 0.0,
            sum_of_squares: 0.0,
            alpha,
            davg: 0.0,
            dvariance: 0.0,
        }
    }

    pub fn add(&mut self, v: f64) {
        if self.num == 0 {
            self.davg = v;
            self.dvariance = 0.0;
        } else {
            self.davg = (1.0 - self.alpha) * v + self.alpha * self.davg;
            let diff = v - self.davg;
            self.dvariance = (1.0 - self.alpha) * diff * diff + self.alpha * self.dvariance;
        }

        // Unfilled slots hold 0, so subtracting the evicted value is always correct.
        let old = self.samples[self.next];
        self.sum += v - old;
        self.sum_of_squares += v * v - old * old;
        self.samples[self.next] = v;
        self.next = (self.next + 1) % self.samples.len();
        self.num += 1;
    }

    /// Total number of samples ever added.
    pub fn num(&self) -> usize {
        self.num
    }

    /// Number of samples currently in the window.
    pub fn len(&self) -> usize {
        self.num.min(self.samples.len())
    }

    pub fn is_empty(&self) -> bool {
        self.num == 0
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn avg(&self) -> f64 {
        match self.len() {
            0 => 0.0,
            n => self.sum / n as f64,
        }
    }

    pub fn variance(&self) -> f64 {
        let n = self.len();
        if n <= 1 {
            return 0.0;
        }
        let avg = self.avg();
        // Rounding can make this slightly negative.
        (self.sum_of_squares / n as f64 - avg * avg).max(0.0)
    }

    pub fn sd(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn davg(&self) -> f64 {
        self.davg
    }

    pub fn dvariance(&self) -> f64 {
        self.dvariance.max(0.0)
    }

    pub fn dsd(&self) -> f64 {
        self.dvariance().sqrt()
    }

    /// The most recently added sample, or 0 if there is none.
    pub fn last(&self) -> f64 {
        if self.num == 0 {
            0.0
        } else {
            let len = self.samples.len();
            self.samples[(self.next + len - 1) % len]
        }
    }

    pub fn maximum(&self) -> f64 {
        self.samples[..self.len()]
            .iter()
            .copied()
            .fold(0.0, f64::max)
    }

    pub fn clear(&mut self) {
        *self = Self::new(self.samples.len(), self.alpha);
    }
}
