//! CRC-16/KERMIT frame checksum.
//!
//! Polynomial 0x8408 (reflected 0x1021), initial value 0x0000, no final
//! XOR, reflected input and output. Transmitted little-endian: the low
//! byte of the CRC is the second-to-last byte on the wire.

use crate::error::AuthError;

/// Reflected CRC-16/KERMIT polynomial.
const POLY: u16 = 0x8408;

/// Fold one byte into the CRC state.
fn crc16_byte(crc: u16, byte: u8) -> u16 {
    let mut crc = crc ^ u16::from(byte);
    for _ in 0..8 {
        let remainder = if crc & 1 != 0 { POLY } else { 0 };
        crc = (crc >> 1) ^ remainder;
    }
    crc
}

/// Compute the CRC-16/KERMIT of a byte slice.
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0, |crc, &b| crc16_byte(crc, b))
}

/// Verify a buffer whose last two bytes are its little-endian CRC.
pub fn verify_crc(buf: &[u8]) -> Result<(), AuthError> {
    if buf.len() < 2 {
        return Err(AuthError::CrcMismatch);
    }
    let body = &buf[..buf.len() - 2];
    let received = u16::from(buf[buf.len() - 2]) | (u16::from(buf[buf.len() - 1]) << 8);
    if crc16(body) == received {
        Ok(())
    } else {
        Err(AuthError::CrcMismatch)
    }
}
