//! Decoding of backslash escapes in license userdata.

/// Decodes `\n`, `\r`, `\t`, `\0`, `\\`, `\"`, `\'`, `\xHH` (ASCII) and
/// `\u{H..}`. Unknown or malformed escapes are kept verbatim.
#[must_use]
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let (decoded, consumed) = decode_escape(tail);
        match decoded {
            Some(c) => out.push(c),
            None => out.push_str(&tail[..consumed]),
        }
        rest = &tail[consumed..];
    }
    out.push_str(rest);
    out
}

/// Decodes the escape at the start of `s` (which begins with a backslash).
/// Returns the character, if valid, and the number of bytes consumed.
fn decode_escape(s: &str) -> (Option<char>, usize) {
    let mut chars = s[1..].chars();
    let Some(kind) = chars.next() else {
        return (None, 1);
    };
    let simple = match kind {
        'n' => Some('\n'),
        'r' => Some('\r'),
        't' => Some('\t'),
        '0' => Some('\0'),
        '\\' => Some('\\'),
        '"' => Some('"'),
        '\'' => Some('\''),
        _ => None,
    };
    if simple.is_some() {
        return (simple, 2);
    }

    match kind {
        'x' => {
            let hex = s.get(2..4).filter(|h| is_hex(h)).unwrap_or("");
            match u8::from_str_radix(hex, 16) {
                Ok(byte) if hex.len() == 2 && byte.is_ascii() => (Some(char::from(byte)), 4),
                _ => (None, 2),
            }
        }
        'u' => {
            let Some(body) = s.get(2..).filter(|b| b.starts_with('{')) else {
                return (None, 2);
            };
            let Some(close) = body.find('}') else {
                return (None, 2);
            };
            let digits = &body[1..close];
            let decoded = ((1..=6).contains(&digits.len()) && is_hex(digits))
                .then(|| u32::from_str_radix(digits, 16).ok())
                .flatten()
                .and_then(char::from_u32);
            match decoded {
                Some(c) => (Some(c), 2 + close + 1),
                None => (None, 2),
            }
        }
        other => (None, 1 + other.len_utf8()),
    }
}

/// `from_str_radix` accepts a leading sign; escapes take bare hex digits only.
fn is_hex(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}
