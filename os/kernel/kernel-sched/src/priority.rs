use core::fmt;

/// Number of run queues, one per priority level.
pub const PRIORITY_LEVELS: usize = 7;

/// Scheduling priority; larger runs first.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Priority(u8);

impl Priority {
    pub const LOWEST: Self = Self(0);
    pub const NORMAL: Self = Self(3);
    pub const HIGHEST: Self = Self(6);

    /// `None` above [`Priority::HIGHEST`].
    #[must_use]
    pub const fn new(level: u8) -> Option<Self> {
        if level <= Self::HIGHEST.0 {
            Some(Self(level))
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn level(self) -> u8 {
        self.0
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl fmt::Debug for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prio:{}", self.0)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const _: () = assert!(Priority::HIGHEST.index() + 1 == PRIORITY_LEVELS);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_bounded() {
        assert_eq!(Priority::new(6), Some(Priority::HIGHEST));
        assert_eq!(Priority::new(7), None);
        assert!(Priority::HIGHEST > Priority::NORMAL);
        assert!(Priority::NORMAL > Priority::LOWEST);
    }
}
