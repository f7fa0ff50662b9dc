/// Zero-pads bare numeric tokens so channel and level numbers always go out
/// as three digits.
///
/// Tokens are classified one at a time: a run of one or two ASCII digits is
/// padded, while keywords, decimal-looking tokens, and numbers that already
/// have three or more digits pass through unchanged.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    for token in raw.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        if is_short_number(token) {
            for _ in token.len()..3 {
                out.push('0');
            }
        }
        out.push_str(token);
    }
    out
}

fn is_short_number(token: &str) -> bool {
    !token.is_empty() && token.len() < 3 && token.bytes().all(|b| b.is_ascii_digit())
}
