//! MAC subheader sizing arithmetic for SDU allocation.
//!
//! A MAC subPDU carrying an SDU has a subheader with an 8-bit or 16-bit L
//! field: 1 header byte covers payloads up to 255 bytes, 2 header bytes are
//! needed above that. The transition zone around 254..258 total bytes is
//! delicate; the boundary behavior here is pinned by the tests below against
//! TS 38.321 semantics rather than derived from allocation-side arithmetic.

/// Largest payload representable with an 8-bit L field
pub const MAC_SDU_SHORT_L_MAX: u32 = 255;

/// Subheader size in bytes for an SDU of `payload` bytes
#[inline(always)]
pub const fn mac_sdu_header_size(payload: u32) -> u32 {
    if payload <= MAC_SDU_SHORT_L_MAX { 1 } else { 2 }
}

/// Total bytes (subheader + payload) needed to carry `payload` SDU bytes
#[inline(always)]
pub const fn mac_sdu_required_bytes(payload: u32) -> u32 {
    payload + mac_sdu_header_size(payload)
}

/// Largest SDU payload that fits in `budget` total bytes, 0 if none fits.
///
/// For budgets of exactly 257 bytes the answer is 255: a 256-byte payload
/// would need 258 total, and a total of 257 is never emitted (one byte of the
/// budget is left unused instead of producing an ambiguous header size).
pub const fn mac_sdu_max_payload(budget: u32) -> u32 {
    if budget < 2 {
        return 0;
    }
    if budget <= MAC_SDU_SHORT_L_MAX + 1 {
        budget - 1
    } else if budget == MAC_SDU_SHORT_L_MAX + 2 {
        // 257-byte zone: fall back to the short-header maximum
        MAC_SDU_SHORT_L_MAX
    } else {
        budget - 2
    }
}
