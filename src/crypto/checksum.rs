//! Running checksum feeding IV construction.
//!
//! Two one-byte accumulators updated per input byte. This is not a
//! standard algorithm; it must match the wire peers bit for bit, so it is
//! kept in one place with exhaustive byte-level vectors. Do not "fix" the
//! magic constants.

/// Fold one byte into the accumulator pair.
fn step(byte: u8, c1: u8, c2: u8) -> (u8, u8) {
    let t = byte ^ c2;
    let mut c2_new = (c1 & 0x7F) << 1;

    if c1 & 0x80 == 0 {
        if t >= 128 {
            c2_new |= 1;
        }
        (c2_new, t << 1)
    } else {
        if t >= 128 {
            c2_new |= 1;
        }
        (c2_new ^ 0x55, (t << 1) ^ 0x5B)
    }
}

/// Run the checksum over `data`, returning the final `(c1, c2)` pair.
pub fn running_checksum(data: &[u8]) -> (u8, u8) {
    data.iter().fold((0, 0), |(c1, c2), &b| step(b, c1, c2))
}
