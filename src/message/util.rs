/// Compute the log-base-two of the next power of two: 8 -> 3, 9 -> 4.
///
pub fn ceil_log2(x: usize) -> usize {
    let mut n = 0;
    while 1 << n < x {
        n += 1
    }
    n
}

/// Encode a floating-point value as a message.
///
pub fn f64_to_bytes(x: f64) -> Vec<u8> {
    x.to_le_bytes().to_vec()
}

/// Decode a floating-point value from a message. Panics if the message
/// does not hold exactly eight bytes.
///
pub fn f64_from_bytes(bytes: &[u8]) -> f64 {
    let mut buffer = [0; 8];
    buffer.copy_from_slice(bytes);
    f64::from_le_bytes(buffer)
}
