use core::fmt;

/// Number of system frames before the SFN counter wraps
pub const NOF_SFNS: u32 = 1024;

/// Slots per subframe for a given numerology (mu 0..=4)
#[inline(always)]
pub const fn slots_per_subframe(numerology: u8) -> u32 {
    1 << numerology
}

/// Slots per 10ms frame for a given numerology
#[inline(always)]
pub const fn slots_per_frame(numerology: u8) -> u32 {
    10 * slots_per_subframe(numerology)
}

/// A point in the cell's slot timeline.
///
/// Internally a flat slot count in `0..NOF_SFNS * slots_per_frame(mu)`, tagged
/// with the numerology so that arithmetic between mismatched cells is caught
/// early. All arithmetic wraps at the SFN period.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SlotPoint {
    numerology: u8,
    count: u32,
}

impl SlotPoint {
    pub fn new(numerology: u8, sfn: u16, slot: u16) -> SlotPoint {
        assert!(numerology <= 4, "invalid numerology {}", numerology);
        assert!((sfn as u32) < NOF_SFNS, "invalid sfn {}", sfn);
        assert!(
            (slot as u32) < slots_per_frame(numerology),
            "invalid slot {} for numerology {}",
            slot,
            numerology
        );
        SlotPoint {
            numerology,
            count: sfn as u32 * slots_per_frame(numerology) + slot as u32,
        }
    }

    pub fn from_count(numerology: u8, count: u32) -> SlotPoint {
        assert!(numerology <= 4, "invalid numerology {}", numerology);
        SlotPoint {
            numerology,
            count: count % Self::wrap_period(numerology),
        }
    }

    /// Total number of slots in one SFN period for this numerology
    #[inline(always)]
    const fn wrap_period(numerology: u8) -> u32 {
        NOF_SFNS * slots_per_frame(numerology)
    }

    #[inline(always)]
    pub fn numerology(self) -> u8 {
        self.numerology
    }

    #[inline(always)]
    pub fn sfn(self) -> u16 {
        (self.count / slots_per_frame(self.numerology)) as u16
    }

    #[inline(always)]
    pub fn slot_index(self) -> u16 {
        (self.count % slots_per_frame(self.numerology)) as u16
    }

    #[inline(always)]
    pub fn to_count(self) -> u32 {
        self.count
    }

    /// Add a (possibly negative) number of slots, wrapping at the SFN period
    pub fn add_slots(self, num_slots: i32) -> SlotPoint {
        let period = Self::wrap_period(self.numerology) as i64;
        let count = (self.count as i64 + num_slots as i64).rem_euclid(period);
        SlotPoint {
            numerology: self.numerology,
            count: count as u32,
        }
    }

    /// Difference between two SlotPoints in slots, handling SFN wrap-around.
    /// Result is in `[-period/2, period/2)`.
    pub fn diff(self, other: SlotPoint) -> i32 {
        assert!(
            self.numerology == other.numerology,
            "SlotPoint::diff across numerologies ({} vs {})",
            self.numerology,
            other.numerology
        );
        let period = Self::wrap_period(self.numerology) as i64;
        let mut d = self.count as i64 - other.count as i64;
        if d < -period / 2 {
            d += period;
        }
        if d >= period / 2 {
            d -= period;
        }
        d as i32
    }

    /// Age of this SlotPoint compared to now
    #[inline(always)]
    pub fn age(self, now: SlotPoint) -> i32 {
        now.diff(self)
    }

    /// True if `self` is strictly later than `other` under wrap-aware ordering
    #[inline(always)]
    pub fn is_after(self, other: SlotPoint) -> bool {
        self.diff(other) > 0
    }
}

impl fmt::Display for SlotPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:4}.{:<2}", self.sfn(), self.slot_index())
    }
}

impl fmt::Debug for SlotPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:4}.{:<2}", self.sfn(), self.slot_index())
    }
}
