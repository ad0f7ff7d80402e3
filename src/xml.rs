//! Small helpers shared by the OOXML readers and writers.

use quick_xml::escape::{escape, resolve_predefined_entity, unescape};
use quick_xml::events::BytesStart;

/// Escapes text for use inside an element or a double-quoted attribute.
/// Characters XML 1.0 cannot carry are dropped.
pub fn escape_xml(text: &str) -> String {
    if text.chars().any(is_forbidden_char) {
        let clean: String = text.chars().filter(|&c| !is_forbidden_char(c)).collect();
        escape(&clean).into_owned()
    } else {
        escape(text).into_owned()
    }
}

fn is_forbidden_char(c: char) -> bool {
    (c < '\u{20}' && !matches!(c, '\t' | '\n' | '\r')) || matches!(c, '\u{FFFE}' | '\u{FFFF}')
}

/// Strips the namespace prefix from a qualified name.
pub fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

/// Reads an attribute by qualified name (`r:embed`) or by local name when
/// `qualified` has no prefix.
pub fn attr(e: &BytesStart<'_>, qualified: &[u8]) -> Option<String> {
    for a in e.attributes().flatten() {
        let key = a.key.as_ref();
        let hit = key == qualified || (!qualified.contains(&b':') && local_name(key) == qualified);
        if hit {
            let raw = String::from_utf8(a.value.to_vec()).ok()?;
            return Some(match unescape(&raw) {
                Ok(v) => v.into_owned(),
                Err(_) => raw,
            });
        }
    }
    None
}

pub fn attr_i64(e: &BytesStart<'_>, qualified: &[u8]) -> Option<i64> {
    attr(e, qualified).and_then(|v| v.trim().parse().ok())
}

/// Resolves a general entity reference body (`amp`, `#x4E2D`) to text.
pub fn resolve_reference(name: &str) -> Option<String> {
    if let Some(s) = resolve_predefined_entity(name) {
        return Some(s.to_string());
    }
    let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        name.strip_prefix('#')?.parse().ok()?
    };
    char::from_u32(code).map(String::from)
}

/// Finds the byte range of the first `<tag ...>...</tag>` or `<tag .../>`
/// element in `xml`, starting the search at `from`.
pub fn find_element(xml: &str, tag: &str, from: usize) -> Option<(usize, usize)> {
    let open = format!("<{}", tag);
    let mut search = from;
    loop {
        let rel = xml.get(search..)?.find(&open)?;
        let start = search + rel;
        let after = start + open.len();
        let next = xml.as_bytes().get(after).copied()?;
        if next == b' ' || next == b'>' || next == b'/' || next == b'\n' || next == b'\r' || next == b'\t'
        {
            let tag_end = start + xml[start..].find('>')?;
            if xml.as_bytes()[tag_end - 1] == b'/' {
                return Some((start, tag_end + 1));
            }
            let close = format!("</{}>", tag);
            let end = tag_end + xml[tag_end..].find(&close)? + close.len();
            return Some((start, end));
        }
        search = after;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_element() {
        let xml = r#"<p:sldIdLst><p:sldId id="256"/></p:sldIdLst><p:sldSz cx="1"/>"#;
        let (s, e) = find_element(xml, "p:sldIdLst", 0).unwrap();
        assert_eq!(&xml[s..e], r#"<p:sldIdLst><p:sldId id="256"/></p:sldIdLst>"#);
        let (s, e) = find_element(xml, "p:sldSz", 0).unwrap();
        assert_eq!(&xml[s..e], r#"<p:sldSz cx="1"/>"#);
        // `p:sldId` must not match the longer `p:sldIdLst`.
        let (s, _) = find_element(xml, "p:sldId", 0).unwrap();
        assert_eq!(s, 12);
    }

    #[test]
    fn test_references() {
        assert_eq!(resolve_reference("amp").as_deref(), Some("&"));
        assert_eq!(resolve_reference("#x4E2D").as_deref(), Some("中"));
        assert_eq!(resolve_reference("#65").as_deref(), Some("A"));
        assert_eq!(escape_xml("a<b&\"c\""), "a&lt;b&amp;&quot;c&quot;");
    }

    #[test]
    fn test_escape_drops_control_chars() {
        assert_eq!(escape_xml("细胞\u{0}核\u{8}"), "细胞核");
        assert_eq!(escape_xml("a\u{b}b\u{c}c\u{1f}<"), "abc&lt;");
        assert_eq!(escape_xml("tab\tline\nret\r"), "tab\tline\nret\r");
        assert_eq!(escape_xml("\u{FFFE}ok"), "ok");
    }
}
