//! Byte-level encoding detection and decoding.
//!
//! Detection never fails: ambiguous or empty input is reported as UTF-8, and bytes that are
//! neither valid UTF-8 nor recognizably Windows-1252 fall back to ISO-8859-1, which decodes
//! any byte sequence.

use std::fmt;

use simdutf8::compat::from_utf8;

/// Number of leading bytes inspected by the heuristic detectors by default.
pub const DEFAULT_SAMPLE_BYTES: usize = 10_000;

/// Text encodings the classifier can report.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    #[default]
    UTF8,
    UTF16LE,
    UTF16BE,
    UTF32LE,
    UTF32BE,
    Windows1252,
    ISO8859_1,
}

impl Encoding {
    /// Canonical label, e.g. `UTF-16LE`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Encoding::UTF8 => "UTF-8",
            Encoding::UTF16LE => "UTF-16LE",
            Encoding::UTF16BE => "UTF-16BE",
            Encoding::UTF32LE => "UTF-32LE",
            Encoding::UTF32BE => "UTF-32BE",
            Encoding::Windows1252 => "Windows-1252",
            Encoding::ISO8859_1 => "ISO-8859-1",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Information about the detected encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodingInfo {
    /// The detected encoding.
    pub encoding: Encoding,
    /// Whether a byte-order mark was present.
    pub has_bom: bool,
    /// Length of the byte-order mark in bytes (0 when absent).
    pub bom_length: usize,
}

impl EncodingInfo {
    /// Create a new `EncodingInfo`.
    pub const fn new(encoding: Encoding, has_bom: bool, bom_length: usize) -> Self {
        Self {
            encoding,
            has_bom,
            bom_length,
        }
    }

    const fn without_bom(encoding: Encoding) -> Self {
        Self::new(encoding, false, 0)
    }
}

/// BOM signatures in match priority order. The UTF-32LE mark starts with the UTF-16LE mark,
/// so the four-byte signatures are checked first.
const BOMS: &[(&[u8], Encoding)] = &[
    (&[0xFF, 0xFE, 0x00, 0x00], Encoding::UTF32LE),
    (&[0x00, 0x00, 0xFE, 0xFF], Encoding::UTF32BE),
    (&[0xEF, 0xBB, 0xBF], Encoding::UTF8),
    (&[0xFF, 0xFE], Encoding::UTF16LE),
    (&[0xFE, 0xFF], Encoding::UTF16BE),
];

/// Windows-1252 assignments for 0x80..=0x9F. `None` marks the five undefined slots, which
/// pass through as the Latin-1 code point of the same value.
const WINDOWS_1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'), // 0x80 euro sign
    None,             // 0x81
    Some('\u{201A}'), // 0x82
    Some('\u{0192}'), // 0x83
    Some('\u{201E}'), // 0x84
    Some('\u{2026}'), // 0x85
    Some('\u{2020}'), // 0x86
    Some('\u{2021}'), // 0x87
    Some('\u{02C6}'), // 0x88
    Some('\u{2030}'), // 0x89
    Some('\u{0160}'), // 0x8A
    Some('\u{2039}'), // 0x8B
    Some('\u{0152}'), // 0x8C
    None,             // 0x8D
    Some('\u{017D}'), // 0x8E
    None,             // 0x8F
    None,             // 0x90
    Some('\u{2018}'), // 0x91
    Some('\u{2019}'), // 0x92
    Some('\u{201C}'), // 0x93
    Some('\u{201D}'), // 0x94
    Some('\u{2022}'), // 0x95
    Some('\u{2013}'), // 0x96
    Some('\u{2014}'), // 0x97
    Some('\u{02DC}'), // 0x98
    Some('\u{2122}'), // 0x99
    Some('\u{0161}'), // 0x9A
    Some('\u{203A}'), // 0x9B
    Some('\u{0153}'), // 0x9C
    None,             // 0x9D
    Some('\u{017E}'), // 0x9E
    Some('\u{0178}'), // 0x9F
];

/// Returns true for bytes that only carry printable meaning in Windows-1252.
#[inline]
fn is_windows_1252_specific(b: u8) -> bool {
    (0x80..=0x9F).contains(&b) && WINDOWS_1252_HIGH[(b - 0x80) as usize].is_some()
}

/// Map a single Windows-1252 byte to its character.
#[inline]
pub fn windows_1252_char(b: u8) -> char {
    match b {
        0x80..=0x9F => WINDOWS_1252_HIGH[(b - 0x80) as usize].unwrap_or(b as char),
        _ => b as char,
    }
}

/// Reverse lookup used by the fixture generators.
pub(crate) fn windows_1252_byte(c: char) -> Option<u8> {
    let cp = c as u32;
    if cp < 0x80 || (0xA0..=0xFF).contains(&cp) {
        return Some(cp as u8);
    }
    WINDOWS_1252_HIGH
        .iter()
        .position(|&m| m == Some(c))
        .map(|i| 0x80 + i as u8)
}

/// Check whether a sample is valid UTF-8.
///
/// `truncated` tells whether the sample was cut from a longer buffer; a multi-byte sequence
/// split by the cut is then not counted against it.
fn is_valid_utf8_sample(sample: &[u8], truncated: bool) -> bool {
    match from_utf8(sample) {
        Ok(_) => true,
        Err(e) => truncated && e.error_len().is_none(),
    }
}

/// Classify the encoding of `data` using the default sample size.
pub fn classify(data: &[u8]) -> EncodingInfo {
    classify_with_sample(data, DEFAULT_SAMPLE_BYTES)
}

/// Classify the encoding of `data`, inspecting at most `sample_bytes` leading bytes for the
/// heuristic (non-BOM) checks.
pub fn classify_with_sample(data: &[u8], sample_bytes: usize) -> EncodingInfo {
    for &(signature, encoding) in BOMS {
        if data.starts_with(signature) {
            return EncodingInfo::new(encoding, true, signature.len());
        }
    }

    if data.is_empty() {
        return EncodingInfo::default();
    }

    let len = data.len().min(sample_bytes.max(1));
    let sample = &data[..len];

    if let Some(encoding) = detect_utf16_by_nuls(sample) {
        return EncodingInfo::without_bom(encoding);
    }

    let valid_utf8 = is_valid_utf8_sample(sample, len < data.len());
    let cp1252_bytes = sample
        .iter()
        .filter(|&&b| is_windows_1252_specific(b))
        .count();

    let encoding = if valid_utf8 {
        Encoding::UTF8
    } else if cp1252_bytes > 0 {
        Encoding::Windows1252
    } else {
        Encoding::ISO8859_1
    };

    EncodingInfo::without_bom(encoding)
}

/// BOM-less UTF-16 detection: ASCII-heavy UTF-16 text has a NUL in every other byte.
/// NULs at odd offsets mean the high byte comes second (little-endian).
fn detect_utf16_by_nuls(sample: &[u8]) -> Option<Encoding> {
    let len = sample.len();
    let total = bytecount::count(sample, 0);
    if total <= len / 4 {
        return None;
    }

    let even = sample.iter().step_by(2).filter(|&&b| b == 0).count();
    let odd = total - even;

    if odd > len / 4 && even < len / 20 {
        Some(Encoding::UTF16LE)
    } else if even > len / 4 && odd < len / 20 {
        Some(Encoding::UTF16BE)
    } else {
        None
    }
}

/// Decode `data` into a `String` according to `info`.
///
/// The BOM is skipped, and NUL characters never appear in the output.
pub fn decode(data: &[u8], info: &EncodingInfo) -> String {
    let body = data.get(info.bom_length..).unwrap_or_default();

    let mut text = match info.encoding {
        Encoding::UTF8 => encoding_rs::UTF_8
            .decode_without_bom_handling(body)
            .0
            .into_owned(),
        Encoding::UTF16LE => encoding_rs::UTF_16LE
            .decode_without_bom_handling(body)
            .0
            .into_owned(),
        Encoding::UTF16BE => encoding_rs::UTF_16BE
            .decode_without_bom_handling(body)
            .0
            .into_owned(),
        Encoding::UTF32LE => decode_utf32(body, u32::from_le_bytes),
        Encoding::UTF32BE => decode_utf32(body, u32::from_be_bytes),
        Encoding::Windows1252 => body.iter().map(|&b| windows_1252_char(b)).collect(),
        Encoding::ISO8859_1 => body.iter().map(|&b| b as char).collect(),
    };

    if text.contains('\0') {
        text.retain(|c| c != '\0');
    }
    text
}

/// Decode 4-byte code units; zero, surrogate and out-of-range values are skipped.
fn decode_utf32(body: &[u8], unit: fn([u8; 4]) -> u32) -> String {
    body.chunks_exact(4)
        .filter_map(|chunk| {
            let cp = unit([chunk[0], chunk[1], chunk[2], chunk[3]]);
            if cp == 0 { None } else { char::from_u32(cp) }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    fn utf16be(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(|u| u.to_be_bytes()).collect()
    }

    #[test]
    fn test_bom_signatures() {
        let cases: &[(&[u8], Encoding, usize)] = &[
            (&[0xFF, 0xFE, 0x00, 0x00, b'a', 0, 0, 0], Encoding::UTF32LE, 4),
            (&[0x00, 0x00, 0xFE, 0xFF, 0, 0, 0, b'a'], Encoding::UTF32BE, 4),
            (&[0xEF, 0xBB, 0xBF, b'a'], Encoding::UTF8, 3),
            (&[0xFF, 0xFE, b'a', 0x00], Encoding::UTF16LE, 2),
            (&[0xFE, 0xFF, 0x00, b'a'], Encoding::UTF16BE, 2),
        ];

        for &(bytes, encoding, bom_length) in cases {
            let info = classify(bytes);
            assert_eq!(info.encoding, encoding);
            assert!(info.has_bom);
            assert_eq!(info.bom_length, bom_length);
            assert_eq!(decode(bytes, &info), "a");
        }
    }

    #[test]
    fn test_empty_defaults_to_utf8() {
        let info = classify(b"");
        assert_eq!(info, EncodingInfo::new(Encoding::UTF8, false, 0));
        assert_eq!(decode(b"", &info), "");
    }

    #[test]
    fn test_utf16_without_bom() {
        let le = utf16le("name,age\nAlice,30\n");
        assert_eq!(classify(&le).encoding, Encoding::UTF16LE);
        assert_eq!(decode(&le, &classify(&le)), "name,age\nAlice,30\n");

        let be = utf16be("name,age\nAlice,30\n");
        assert_eq!(classify(&be).encoding, Encoding::UTF16BE);
        assert_eq!(decode(&be, &classify(&be)), "name,age\nAlice,30\n");
    }

    #[test]
    fn test_utf8_detection() {
        assert_eq!(classify("naïve,café".as_bytes()).encoding, Encoding::UTF8);
        assert_eq!(classify(b"plain,ascii").encoding, Encoding::UTF8);
    }

    #[test]
    fn test_windows_1252_detection() {
        // "€5" and curly quotes: 0x80, 0x93, 0x94 are Windows-1252 specific.
        let data = [0x80, b'5', b',', 0x93, b'x', 0x94];
        let info = classify(&data);
        assert_eq!(info.encoding, Encoding::Windows1252);
        assert_eq!(decode(&data, &info), "\u{20AC}5,\u{201C}x\u{201D}");
    }

    #[test]
    fn test_latin1_fallback() {
        // 0xE9 alone is invalid UTF-8 and not in the Windows-1252 control range.
        let data = [b'c', b'a', b'f', 0xE9];
        let info = classify(&data);
        assert_eq!(info.encoding, Encoding::ISO8859_1);
        assert_eq!(decode(&data, &info), "café");
    }

    #[test]
    fn test_windows_1252_undefined_slots_pass_through() {
        let info = EncodingInfo::new(Encoding::Windows1252, false, 0);
        assert_eq!(decode(&[0x81, 0x8D], &info), "\u{0081}\u{008D}");
    }

    #[test]
    fn test_truncated_sample_keeps_utf8() {
        let mut data = vec![b'a'; 9];
        data.extend_from_slice("é".as_bytes());
        // Sample of 10 bytes cuts the two-byte sequence in half.
        assert_eq!(classify_with_sample(&data, 10).encoding, Encoding::UTF8);
    }

    #[test]
    fn test_utf32_skips_invalid_code_points() {
        let mut data = vec![0xFF, 0xFE, 0x00, 0x00];
        data.extend_from_slice(&(b'o' as u32).to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0x0011_0000u32.to_le_bytes());
        data.extend_from_slice(&(b'k' as u32).to_le_bytes());
        assert_eq!(decode(&data, &classify(&data)), "ok");
    }

    #[test]
    fn test_decode_strips_nul() {
        let info = EncodingInfo::default();
        assert_eq!(decode(b"a\0b", &info), "ab");
    }

    #[test]
    fn test_windows_1252_round_trip_table() {
        assert_eq!(windows_1252_byte('\u{20AC}'), Some(0x80));
        assert_eq!(windows_1252_byte('é'), Some(0xE9));
        assert_eq!(windows_1252_byte('\u{4E2D}'), None);
    }
}
