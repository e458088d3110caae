use core::fmt;

use nr_core::TagId;

/// A queued out-of-band MAC Control Element destined for a UE.
///
/// Fixed-size CEs carry a 1-byte subheader without an L field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacCe {
    /// UE Contention Resolution Identity, 48 bits echoed from Msg3
    ConResId([u8; 6]),
    /// Timing Advance Command: 2-bit TAG + 6-bit command
    TimingAdvanceCmd { tag: TagId, cmd: u8 },
    /// DRX Command (zero-length payload)
    DrxCommand,
}

impl MacCe {
    /// Payload size in bytes, excluding the subheader
    pub fn payload_bytes(&self) -> u32 {
        match self {
            MacCe::ConResId(_) => 6,
            MacCe::TimingAdvanceCmd { .. } => 1,
            MacCe::DrxCommand => 0,
        }
    }

    /// Total bytes consumed in a transport block (subheader included)
    pub fn required_bytes(&self) -> u32 {
        self.payload_bytes() + 1
    }
}

impl fmt::Display for MacCe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacCe::ConResId(_) => write!(f, "ConResId"),
            MacCe::TimingAdvanceCmd { tag, cmd } => write!(f, "TaCmd(tag={} cmd={})", tag.as_usize(), cmd),
            MacCe::DrxCommand => write!(f, "DrxCommand"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ce_sizes() {
        assert_eq!(MacCe::ConResId([0; 6]).required_bytes(), 7);
        assert_eq!(
            MacCe::TimingAdvanceCmd { tag: TagId::new(0), cmd: 31 }.required_bytes(),
            2
        );
        assert_eq!(MacCe::DrxCommand.required_bytes(), 1);
    }
}
