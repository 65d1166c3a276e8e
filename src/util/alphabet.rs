/// 字母表大小：{0:A, 1:C, 2:G, 3:U, 4:T, 5:-, 6:N}
///
/// T 在编码时折叠为 U，因此编码 4 不会出现在比对数据中；
/// 但它仍计入字母表大小，伪计数按 7 个符号均分。
pub const SIGMA: usize = 7;

pub const GAP: u8 = 5;
pub const UNKNOWN: u8 = 6;

/// 编码 -> 字符（索引即编码）
pub const SYMBOLS: [u8; SIGMA] = *b"ACGUT-N";

#[inline]
pub fn to_alphabet(b: u8) -> u8 {
    match b.to_ascii_uppercase() {
        b'A' => 0,
        b'C' => 1,
        b'G' => 2,
        b'U' | b'T' => 3,
        b'-' | b'.' => GAP,
        _ => UNKNOWN, // map others to N
    }
}

#[inline]
pub fn from_alphabet(a: u8) -> u8 {
    SYMBOLS.get(a as usize).copied().unwrap_or(b'N')
}

#[inline]
pub fn is_gap(a: u8) -> bool {
    a == GAP
}

/// 规范化序列：大写、T→U、'.'→'-'，其余未知字符记为 N
pub fn normalize_seq(seq: &[u8]) -> Vec<u8> {
    seq.iter().map(|&b| from_alphabet(to_alphabet(b))).collect()
}

pub fn encode_seq(seq: &[u8]) -> Vec<u8> {
    seq.iter().map(|&b| to_alphabet(b)).collect()
}

pub fn decode_seq(codes: &[u8]) -> Vec<u8> {
    codes.iter().map(|&a| from_alphabet(a)).collect()
}
