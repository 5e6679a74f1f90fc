//! Argument grammar for keyed commands.
//!
//! The remainder of a command line is a sequence of whitespace-separated
//! tokens. A token of the form `key=value` is a pair; any other token is
//! ignored. A value may be wrapped in one level of double quotes to carry
//! whitespace (`name="my vm"`). There are no escapes: the value ends at the
//! next `"`, and an unterminated quote runs to the end of the line. Anything
//! glued to a closing quote up to the next whitespace is dropped.

/// Parsed `key=value` pairs in input order.
#[derive(Debug, Default)]
pub struct KeyValues<'a> {
    pairs: Vec<(&'a str, &'a str)>,
}

impl<'a> KeyValues<'a> {
    pub fn parse(input: &'a str) -> Self {
        let bytes = input.as_bytes();
        let len = bytes.len();
        let mut pairs = Vec::new();
        let mut pos = 0;

        while pos < len {
            while pos < len && bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            if pos >= len {
                break;
            }

            let start = pos;
            while pos < len && !bytes[pos].is_ascii_whitespace() && bytes[pos] != b'=' {
                pos += 1;
            }
            if pos >= len || bytes[pos] != b'=' {
                // Bare word
                continue;
            }
            let key = &input[start..pos];
            pos += 1;

            let value = if pos < len && bytes[pos] == b'"' {
                let value_start = pos + 1;
                let value = match input[value_start..].find('"') {
                    Some(offset) => {
                        pos = value_start + offset + 1;
                        &input[value_start..value_start + offset]
                    }
                    None => {
                        pos = len;
                        &input[value_start..]
                    }
                };
                while pos < len && !bytes[pos].is_ascii_whitespace() {
                    pos += 1;
                }
                value
            } else {
                let value_start = pos;
                while pos < len && !bytes[pos].is_ascii_whitespace() {
                    pos += 1;
                }
                &input[value_start..pos]
            };

            pairs.push((key, value));
        }

        Self { pairs }
    }

    /// Value of the first pair whose key matches exactly.
    ///
    /// `None` means the key is missing, which is distinct from `Some("")`.
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }
}

/// Lenient integer conversion with C `atoi` semantics.
///
/// Leading whitespace and one sign are accepted, then as many digits as
/// follow. Input without leading digits yields 0.
pub fn parse_int(input: &str) -> i64 {
    let s = input.trim_start_matches(|c: char| c.is_ascii_whitespace());
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, b| {
            acc.saturating_mul(10).saturating_add(i64::from(b - b'0'))
        });

    if negative { -value } else { value }
}
