//! Filter for the markup of `contenteditable` elements.
//!
//! Only line breaks and character references are understood. Any other tag
//! makes `decode` fail, which leaves the user editing the raw markup instead
//! of silently dropping formatting.

use super::{ContentFilter, FilterError};

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlFilter;

impl ContentFilter for HtmlFilter {
    fn name(&self) -> &str {
        "html"
    }

    fn decode(&self, raw: &[u8]) -> Result<String, FilterError> {
        let input = std::str::from_utf8(raw).map_err(|e| FilterError::InvalidUtf8(e.to_string()))?;
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(idx) = rest.find(&['<', '&'][..]) {
            out.push_str(&rest[..idx]);
            let tail = &rest[idx..];

            if let Some(tag_body) = tail.strip_prefix('<') {
                let end = tag_body.find('>').ok_or(FilterError::Unterminated("tag"))?;
                let tag = &tag_body[..end];
                if !is_line_break(tag) {
                    return Err(FilterError::UnsupportedMarkup(tag.to_string()));
                }
                out.push('\n');
                rest = &tag_body[end + 1..];
            } else {
                let reference = &tail[1..];
                let end = reference
                    .find(';')
                    .ok_or(FilterError::Unterminated("character reference"))?;
                out.push(resolve_reference(&reference[..end])?);
                rest = &reference[end + 1..];
            }
        }

        out.push_str(rest);
        Ok(out)
    }

    fn encode(&self, text: &str) -> Result<Vec<u8>, FilterError> {
        let mut out = String::with_capacity(text.len() + text.len() / 8);
        for c in text.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '\n' => out.push_str("<br>"),
                '\u{a0}' => out.push_str("&nbsp;"),
                _ => out.push(c),
            }
        }
        Ok(out.into_bytes())
    }
}

/// `br`, `br/`, `br /` in any case.
fn is_line_break(tag: &str) -> bool {
    tag.trim_end_matches('/').trim().eq_ignore_ascii_case("br")
}

fn resolve_reference(name: &str) -> Result<char, FilterError> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok()
            } else {
                None
            };
            return code
                .and_then(char::from_u32)
                .ok_or_else(|| FilterError::UnknownEntity(name.to_string()));
        }
    };
    Ok(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode(raw: &str) -> Result<String, FilterError> {
        HtmlFilter.decode(raw.as_bytes())
    }

    #[test]
    fn test_decode_line_breaks() {
        assert_eq!(decode("one<br>two<BR/>three<br />four").unwrap(), "one\ntwo\nthree\nfour");
    }

    #[test]
    fn test_decode_character_references() {
        assert_eq!(decode("a &lt; b &amp;&amp; c &gt; d").unwrap(), "a < b && c > d");
        assert_eq!(decode("&quot;x&apos; &#39;y&#x27;").unwrap(), "\"x' 'y'");
        assert_eq!(decode("a&nbsp;b").unwrap(), "a\u{a0}b");
    }

    #[test]
    fn test_decode_rejects_other_markup() {
        assert_eq!(
            decode("<b>bold</b>").unwrap_err(),
            FilterError::UnsupportedMarkup("b".to_string())
        );
    }

    #[test]
    fn test_decode_rejects_unknown_entity() {
        assert_eq!(
            decode("&copy;").unwrap_err(),
            FilterError::UnknownEntity("copy".to_string())
        );
        assert!(decode("&#xZZ;").is_err());
    }

    #[test]
    fn test_decode_rejects_unterminated() {
        assert_eq!(decode("a <br").unwrap_err(), FilterError::Unterminated("tag"));
        assert_eq!(
            decode("fish & chips").unwrap_err(),
            FilterError::Unterminated("character reference")
        );
    }

    #[test]
    fn test_encode_escapes() {
        let encoded = HtmlFilter.encode("if a < b && c > d\nnext\u{a0}").unwrap();
        assert_eq!(
            String::from_utf8(encoded).unwrap(),
            "if a &lt; b &amp;&amp; c &gt; d<br>next&nbsp;"
        );
    }

    proptest! {
        #[test]
        fn prop_encode_then_decode_is_identity(text in any::<String>()) {
            let encoded = HtmlFilter.encode(&text).unwrap();
            prop_assert_eq!(HtmlFilter.decode(&encoded).unwrap(), text);
        }
    }
}
