use num_traits::Float;

/// `alpha * next + (1 - alpha) * prev`
#[inline]
pub fn lerp<T: Float>(prev: T, next: T, alpha: T) -> T {
    alpha * next + (T::one() - alpha) * prev
}

/// Exponential moving average seeded by its first sample.
#[derive(Debug, Clone, Copy)]
pub struct Ema<T> {
    alpha: T,
    value: Option<T>,
}

impl<T: Float> Ema<T> {
    pub fn new(alpha: T) -> Self {
        Self { alpha, value: None }
    }

    pub fn push(&mut self, sample: T) -> T {
        let next = match self.value {
            Some(prev) => lerp(prev, sample, self.alpha),
            None => sample,
        };

        self.value = Some(next);
        next
    }

    #[inline]
    pub fn value(&self) -> Option<T> {
        self.value
    }
}
