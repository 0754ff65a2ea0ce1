//! Tick-based deadlines.
use core::fmt;

/// A tick budget passed to a blocking operation.
///
/// A tick is the scheduler's time quantum; deadlines are always
/// expressed relative to it, never as wall-clock time. [`Ticks::ZERO`]
/// means "don't block at all" (poll); [`Ticks::FOREVER`] disables the
/// deadline entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticks(Option<u32>);

impl Ticks {
    /// Never time out.
    pub const FOREVER: Self = Self(None);

    /// Don't block; equivalent to a zero-length wait.
    pub const ZERO: Self = Self(Some(0));

    /// Construct a finite deadline of `ticks` ticks.
    #[inline]
    pub const fn new(ticks: u32) -> Self {
        Self(Some(ticks))
    }

    #[inline]
    pub const fn is_forever(self) -> bool {
        self.0.is_none()
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        matches!(self.0, Some(0))
    }

    /// The finite tick count, or `None` if this is [`Ticks::FOREVER`].
    #[inline]
    pub const fn as_finite(self) -> Option<u32> {
        self.0
    }

    /// Split a deadline in half, for composing two sequential waits out
    /// of one caller-supplied budget (used by [`crate::Queue`]'s
    /// task-context operations).
    ///
    /// `Ticks::FOREVER` halves to `Ticks::FOREVER`. A finite budget
    /// halves by integer division, so the two halves never sum to more
    /// than the original budget.
    #[inline]
    pub const fn halve(self) -> Self {
        match self.0 {
            None => Self::FOREVER,
            Some(t) => Self(Some(t / 2)),
        }
    }
}

impl From<u32> for Ticks {
    #[inline]
    fn from(ticks: u32) -> Self {
        Self::new(ticks)
    }
}

impl fmt::Display for Ticks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            None => f.write_str("forever"),
            Some(t) => write!(f, "{t} ticks"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halve_forever_stays_forever() {
        assert_eq!(Ticks::FOREVER.halve(), Ticks::FOREVER);
    }

    #[test]
    fn halve_never_exceeds_original_budget() {
        for t in [0u32, 1, 2, 3, 9999, u32::MAX] {
            let half = Ticks::new(t).halve();
            let half = half.as_finite().unwrap();
            assert!(u64::from(half) * 2 <= u64::from(t) + 1);
        }
    }
}
