use core::fmt;

/// Half-open interval of PRBs `[start, stop)` within a carrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrbInterval {
    pub start: u16,
    pub stop: u16,
}

impl PrbInterval {
    pub fn new(start: u16, stop: u16) -> PrbInterval {
        assert!(start <= stop, "invalid prb interval [{}, {})", start, stop);
        PrbInterval { start, stop }
    }

    pub fn empty() -> PrbInterval {
        PrbInterval { start: 0, stop: 0 }
    }

    #[inline(always)]
    pub fn len(self) -> u16 {
        self.stop - self.start
    }

    #[inline(always)]
    pub fn is_empty(self) -> bool {
        self.start == self.stop
    }

    pub fn overlaps(self, other: PrbInterval) -> bool {
        self.start < other.stop && other.start < self.stop
    }

    pub fn contains(self, prb: u16) -> bool {
        prb >= self.start && prb < self.stop
    }
}

impl fmt::Display for PrbInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prbs=[{},{})", self.start, self.stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_basics() {
        let iv = PrbInterval::new(10, 20);
        assert_eq!(iv.len(), 10);
        assert!(!iv.is_empty());
        assert!(iv.contains(10));
        assert!(!iv.contains(20));
        assert!(PrbInterval::empty().is_empty());
    }

    #[test]
    fn test_overlaps() {
        let a = PrbInterval::new(0, 10);
        let b = PrbInterval::new(9, 15);
        let c = PrbInterval::new(10, 15);
        assert!(a.overlaps(b));
        assert!(!a.overlaps(c));
        assert!(!a.overlaps(PrbInterval::empty()));
    }

    #[test]
    #[should_panic]
    fn test_inverted_interval_panics() {
        let _ = PrbInterval::new(5, 4);
    }
}
