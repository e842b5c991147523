//! Bitcoin CompactSize ("varint") encoding.

/// Append `value` to `output` in CompactSize form.
pub fn encode_varint(value: u64, output: &mut Vec<u8>) {
    if value < 0xfd {
        output.push(value as u8);
    } else if value <= 0xffff {
        output.push(0xfd);
        output.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value <= 0xffffffff {
        output.push(0xfe);
        output.extend_from_slice(&(value as u32).to_le_bytes());
    } else {
        output.push(0xff);
        output.extend_from_slice(&value.to_le_bytes());
    }
}

/// Number of bytes `encode_varint` writes for `value`.
pub fn encoded_len(value: u64) -> usize {
    match value {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Append a length-prefixed byte string.
pub fn write_var_bytes(bytes: &[u8], output: &mut Vec<u8>) {
    encode_varint(bytes.len() as u64, output);
    output.extend_from_slice(bytes);
}
