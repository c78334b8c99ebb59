//! Byte-level UTF-8 state machines behind the `:` and `::` built-ins.

use thiserror::Error;

use crate::host::Host;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid UTF-8 sequence")]
pub struct InvalidSequence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Expect {
    /// Between characters.
    #[default]
    Lead,
    /// First continuation of a 3-byte sequence.
    ThreeFirst,
    /// First continuation of a 4-byte sequence.
    FourFirst,
    /// Second continuation of a 4-byte sequence.
    FourSecond,
    /// Final continuation of any multi-byte sequence.
    Last,
}

/// Assembles output bytes into characters.
#[derive(Debug, Clone, Default)]
pub struct Utf8Encoder {
    code: u32,
    expect: Expect,
}

impl Utf8Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one byte. Returns the completed character, if this byte
    /// finished one. On error the encoder is left as it was.
    pub fn push(&mut self, byte: u32) -> Result<Option<char>, InvalidSequence> {
        if byte > 0xff {
            return Err(InvalidSequence);
        }
        let (code, expect) = match self.expect {
            Expect::Lead => {
                if byte & 0x80 == 0x00 {
                    (byte, Expect::Lead)
                } else if byte & 0xe0 == 0xc0 {
                    let code = (byte ^ 0xc0) << 6;
                    // overlong: fits in 7 bits
                    if code & 0x780 == 0 {
                        return Err(InvalidSequence);
                    }
                    (code, Expect::Last)
                } else if byte & 0xf0 == 0xe0 {
                    ((byte ^ 0xe0) << 12, Expect::ThreeFirst)
                } else if byte & 0xf8 == 0xf0 {
                    ((byte ^ 0xf0) << 18, Expect::FourFirst)
                } else {
                    return Err(InvalidSequence);
                }
            }
            _ if byte & 0xc0 != 0x80 => return Err(InvalidSequence),
            Expect::Last => (self.code | (byte ^ 0x80), Expect::Lead),
            Expect::ThreeFirst => {
                let code = self.code | (byte ^ 0x80) << 6;
                // overlong: fits in 11 bits
                if code & 0xf800 == 0 {
                    return Err(InvalidSequence);
                }
                (code, Expect::Last)
            }
            Expect::FourSecond => (self.code | (byte ^ 0x80) << 6, Expect::Last),
            Expect::FourFirst => {
                let code = self.code | (byte ^ 0x80) << 12;
                // overlong: fits in 16 bits
                if code & 0x1f0000 == 0 {
                    return Err(InvalidSequence);
                }
                (code, Expect::FourSecond)
            }
        };
        if expect != Expect::Lead {
            self.code = code;
            self.expect = expect;
            return Ok(None);
        }
        let c = char::from_u32(code).ok_or(InvalidSequence)?;
        self.code = 0;
        self.expect = Expect::Lead;
        Ok(Some(c))
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Splits input characters into bytes, one byte per request.
#[derive(Debug, Clone, Default)]
pub struct Utf8Decoder {
    code: u32,
    /// Continuation bytes still owed for `code`.
    owed: u8,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next continuation byte of the character in progress.
    pub fn pending(&mut self) -> Option<u8> {
        if self.owed == 0 {
            return None;
        }
        self.owed -= 1;
        let bits = (self.code >> (6 * self.owed as u32)) & 0x3f;
        Some((bits | 0x80) as u8)
    }

    /// Starts a new character and returns its lead byte.
    pub fn start(&mut self, c: char) -> u8 {
        let code = c as u32;
        self.code = code;
        if code & 0x1f0000 != 0 {
            self.owed = 3;
            ((code >> 18) & 0x07 | 0xf0) as u8
        } else if code & 0xf800 != 0 {
            self.owed = 2;
            ((code >> 12) & 0x0f | 0xe0) as u8
        } else if code & 0x780 != 0 {
            self.owed = 1;
            ((code >> 6) & 0x1f | 0xc0) as u8
        } else {
            self.owed = 0;
            code as u8
        }
    }

    /// Next input byte, fetching a character from the host when idle.
    /// `None` means the host reported end of input.
    pub async fn next_byte<H: Host>(
        &mut self,
        host: &mut H,
        on_wait: impl FnOnce() -> String,
    ) -> Option<u8> {
        if let Some(byte) = self.pending() {
            return Some(byte);
        }
        let c = host.get_char(on_wait).await?;
        Some(self.start(c))
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use parse_int::parse;

    fn bytes(hex: &str) -> Vec<u32> {
        hex.split_whitespace()
            .map(|b| parse::<u32>(b).unwrap())
            .collect()
    }

    fn encode_all(encoder: &mut Utf8Encoder, hex: &str) -> Result<String, InvalidSequence> {
        let mut out = String::new();
        for byte in bytes(hex) {
            if let Some(c) = encoder.push(byte)? {
                out.push(c);
            }
        }
        Ok(out)
    }

    #[test]
    fn test_encode_valid() {
        let test_cases = &[
            ("0x41", "A"),
            ("0x00", "\0"),
            ("0xC3 0xA9", "é"),
            ("0xE3 0x81 0x82", "あ"),
            ("0xF0 0x9F 0x8D 0xA9", "🍩"),
            ("0x6E 0xE2 0x82 0xAC 0x74", "n€t"),
        ];
        for (input, expected) in test_cases {
            let mut encoder = Utf8Encoder::new();
            assert_eq!(encode_all(&mut encoder, input).unwrap(), *expected);
            assert_eq!(encoder.expect, Expect::Lead);
        }
    }

    #[test]
    fn test_encode_rejects() {
        let test_cases = &[
            // overlong NUL
            "0xC0 0x80",
            "0xC1 0xBF",
            // lone continuation
            "0x80",
            // overlong 3-byte and 4-byte forms
            "0xE0 0x80 0x80",
            "0xF0 0x80 0x80 0x80",
            // lead byte where a continuation is due
            "0xE3 0x41",
            "0xC3 0xC3",
            // surrogate
            "0xED 0xA0 0x80",
            // beyond U+10FFFF
            "0xF4 0x90 0x80 0x80",
            "0xF8",
            "0xFF",
            // not a byte
            "0x100",
        ];
        for input in test_cases {
            let mut encoder = Utf8Encoder::new();
            assert_eq!(encode_all(&mut encoder, input), Err(InvalidSequence), "{}", input);
        }
    }

    #[test]
    fn test_encode_error_keeps_state() {
        let mut encoder = Utf8Encoder::new();
        assert_eq!(encoder.push(0xe3), Ok(None));
        assert_eq!(encoder.push(0x41), Err(InvalidSequence));
        assert_eq!(encoder.expect, Expect::ThreeFirst);
        assert_eq!(encode_all(&mut encoder, "0x81 0x82"), Ok("あ".to_owned()));
    }

    #[test]
    fn test_decode_bytes() {
        let test_cases: &[(char, &str)] = &[
            ('A', "0x41"),
            ('é', "0xC3 0xA9"),
            ('あ', "0xE3 0x81 0x82"),
            ('🍩', "0xF0 0x9F 0x8D 0xA9"),
        ];
        for (c, expected) in test_cases {
            let mut decoder = Utf8Decoder::new();
            let mut out = vec![decoder.start(*c) as u32];
            while let Some(byte) = decoder.pending() {
                out.push(byte as u32);
            }
            assert_eq!(out, bytes(expected));
        }
    }

    #[test]
    fn test_decode_then_encode() {
        let mut decoder = Utf8Decoder::new();
        let mut encoder = Utf8Encoder::new();
        let mut out = String::new();
        for c in "λx.€🍩".chars() {
            let mut byte = Some(decoder.start(c));
            while let Some(b) = byte {
                if let Some(c) = encoder.push(b as u32).unwrap() {
                    out.push(c);
                }
                byte = decoder.pending();
            }
        }
        assert_eq!(out, "λx.€🍩");
    }
}
