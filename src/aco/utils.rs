use rand::Rng;

/// Prefix sums over a set of non-negative weights, sampled with one uniform draw.
#[derive(Debug, Clone)]
pub struct CumulativeDistribution {
    cumulative: Vec<f64>,
}

impl CumulativeDistribution {
    /// `None` when the weights cannot form a distribution: empty, summing to
    /// zero, or containing NaN, infinite or negative values.
    pub fn new(weights: &[f64]) -> Option<Self> {
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return None;
        }

        let cumulative: Vec<f64> = weights
            .iter()
            .scan(0.0, |total, w| {
                *total += w;
                Some(*total)
            })
            .collect();

        match cumulative.last() {
            Some(&total) if total > 0.0 && total.is_finite() => Some(Self { cumulative }),
            _ => None,
        }
    }

    pub fn total(&self) -> f64 {
        // new() rejects empty weights
        self.cumulative[self.cumulative.len() - 1]
    }

    /// Index `i` is returned with probability `weights[i] / total`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let draw = rng.gen::<f64>() * self.total();
        let idx = self.cumulative.partition_point(|&c| c <= draw);

        // draw < total, but guard against the product rounding up to it
        idx.min(self.cumulative.len() - 1)
    }
}
