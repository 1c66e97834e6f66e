//! The Internet checksum (RFC 1071) and its incremental update (RFC 1624), shared by the IPv4
//! header and ICMP.

/// Folds a 32 bit accumulator down to 16 bits, adding the carries back in.
fn fold(mut sum: u32) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum as u16
}

/// One's complement sum of `data` taken as big endian 16 bit words. An odd trailing byte is
/// padded with a zero on the right.
pub fn ones_complement_sum(data: &[u8]) -> u16 {
    let mut chunks = data.chunks_exact(2);
    let mut sum = chunks.by_ref().fold(0u32, |acc, word| {
        acc + u32::from(u16::from_be_bytes([word[0], word[1]]))
    });
    if let [last] = chunks.remainder() {
        sum += u32::from(*last) << 8;
    }
    fold(sum)
}

/// One's complement addition of two 16 bit words.
pub fn ones_complement_add(a: u16, b: u16) -> u16 {
    fold(u32::from(a) + u32::from(b))
}

/// Checksum of `data`. With the checksum field zeroed this is the value to store; over a header
/// that already carries its checksum it is zero iff the header is intact.
pub fn internet_checksum(data: &[u8]) -> u16 {
    !ones_complement_sum(data)
}

/// Recomputes a checksum after one 16 bit word of the covered data changed from `old_word` to
/// `new_word`, without touching the rest of the data: `HC' = ~(~HC + ~m + m')`.
pub fn incremental_checksum_update(checksum: u16, old_word: u16, new_word: u16) -> u16 {
    !ones_complement_add(ones_complement_add(!checksum, !old_word), new_word)
}
