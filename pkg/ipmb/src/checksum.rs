/// Two's-complement additive checksum used throughout IPMB framing.
///
/// A buffer that ends with its own checksum byte always sums to zero, so
/// verification and computation share this one function.
pub fn ipmb_checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    sum.wrapping_neg()
}
