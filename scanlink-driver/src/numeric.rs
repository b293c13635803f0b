pub(crate) fn degree_to_radian(degree: f64) -> f64 {
    degree * std::f64::consts::PI / 180.
}

/// Decodes one SCIP 1.0 character pair into a 12 bit value.
pub(crate) fn decode_6bit_pair(high: u8, low: u8) -> i32 {
    (((high as i32) - (b'0' as i32)) << 6) | ((low as i32) - (b'0' as i32))
}

pub(crate) fn to_string(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .chars()
        .flat_map(char::escape_default)
        .collect()
}
