//! Minimal tag scanning for server-rendered listing pages.
//!
//! Matching is ASCII case-insensitive and nesting-aware for the tag being
//! searched, which is enough for table-shaped markup. Attribute values
//! containing `>` are not supported.

#[derive(Debug, Clone, Copy)]
pub struct Element<'a> {
    pub attrs: &'a str,
    pub inner: &'a str,
}

impl<'a> Element<'a> {
    pub fn attr(&self, name: &str) -> Option<String> {
        attr_value(self.attrs, name)
    }

    pub fn text(&self) -> String {
        strip_tags(self.inner)
    }

    /// Elements of `tag` inside this one, outermost first.
    pub fn find_all(&self, tag: &str) -> Vec<Element<'a>> {
        find_elements(self.inner, tag)
    }

    pub fn find_first_with_class(&self, tag: &str, class: &str) -> Option<Element<'a>> {
        find_first_with_class(self.inner, tag, class)
    }
}

/// All `tag` elements in document order. Once an element matches, its
/// body is skipped, so nested elements of the same tag are not returned.
pub fn find_elements<'a>(html: &'a str, tag: &str) -> Vec<Element<'a>> {
    scan(html, tag, |_| true, false)
}

/// First `tag` element carrying `class`, searching inside non-matching
/// elements as well.
pub fn find_first_with_class<'a>(html: &'a str, tag: &str, class: &str) -> Option<Element<'a>> {
    scan(html, tag, |attrs| class_list_contains(attrs, class), true)
        .into_iter()
        .next()
}

/// Every element of `tag` whose class list contains any of `classes`.
pub fn find_with_any_class<'a>(html: &'a str, tag: &str, classes: &[&str]) -> Vec<Element<'a>> {
    scan(
        html,
        tag,
        |attrs| classes.iter().any(|c| class_list_contains(attrs, c)),
        false,
    )
}

/// Attribute text of void elements such as `<img>`.
pub fn find_open_tags<'a>(html: &'a str, tag: &str) -> Vec<&'a str> {
    let lc = html.to_ascii_lowercase();
    let open = format!("<{tag}");
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(rel) = lc[pos..].find(&open) {
        let after = pos + rel + open.len();
        if !is_tag_boundary(lc.as_bytes().get(after)) {
            pos = after;
            continue;
        }
        let Some(gt) = lc[after..].find('>') else {
            break;
        };
        let attrs = html[after..after + gt].trim_end_matches('/');
        out.push(attrs);
        pos = after + gt + 1;
    }
    out
}

pub fn attr_value(attrs: &str, name: &str) -> Option<String> {
    let lc = attrs.to_ascii_lowercase();
    let name = name.to_ascii_lowercase();
    let bytes = lc.as_bytes();
    let mut pos = 0;
    while let Some(rel) = lc[pos..].find(&name) {
        let start = pos + rel;
        let mut cursor = start + name.len();
        pos = cursor;
        let boundary_before = start == 0 || bytes[start - 1].is_ascii_whitespace();
        if !boundary_before {
            continue;
        }
        while bytes.get(cursor).is_some_and(|b| b.is_ascii_whitespace()) {
            cursor += 1;
        }
        if bytes.get(cursor) != Some(&b'=') {
            continue;
        }
        cursor += 1;
        while bytes.get(cursor).is_some_and(|b| b.is_ascii_whitespace()) {
            cursor += 1;
        }
        let raw = match bytes.get(cursor) {
            Some(&q) if q == b'"' || q == b'\'' => {
                let body = cursor + 1;
                let end = lc[body..].find(q as char).map(|e| body + e)?;
                &attrs[body..end]
            }
            Some(_) => {
                let end = lc[cursor..]
                    .find(|c: char| c.is_ascii_whitespace())
                    .map(|e| cursor + e)
                    .unwrap_or(attrs.len());
                &attrs[cursor..end]
            }
            None => return None,
        };
        return Some(decode_entities(raw));
    }
    None
}

pub fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    normalize_ws(&decode_entities(&out))
}

pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').filter(|end| *end <= 10).and_then(|end| {
            let entity = &tail[1..end];
            decode_entity(entity).map(|ch| (ch, end + 1))
        });
        match decoded {
            Some((ch, len)) => {
                out.push(ch);
                rest = &tail[len..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        "euro" => Some('€'),
        "aacute" => Some('á'),
        "eacute" => Some('é'),
        "iacute" => Some('í'),
        "oacute" => Some('ó'),
        "uacute" => Some('ú'),
        "Aacute" => Some('Á'),
        "Eacute" => Some('É'),
        "Iacute" => Some('Í'),
        "Oacute" => Some('Ó'),
        "Uacute" => Some('Ú'),
        "ntilde" => Some('ñ'),
        "Ntilde" => Some('Ñ'),
        "uuml" => Some('ü'),
        "ccedil" => Some('ç'),
        _ => {
            let num = entity.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn class_list_contains(attrs: &str, class: &str) -> bool {
    attr_value(attrs, "class")
        .is_some_and(|v| v.split_whitespace().any(|c| c.eq_ignore_ascii_case(class)))
}

fn is_tag_boundary(b: Option<&u8>) -> bool {
    matches!(b, Some(b' ' | b'\t' | b'\n' | b'\r' | b'>' | b'/'))
}

fn scan<'a>(
    html: &'a str,
    tag: &str,
    accept: impl Fn(&str) -> bool,
    descend_into_rejected: bool,
) -> Vec<Element<'a>> {
    // ASCII lowercasing keeps byte offsets identical to `html`.
    let lc = html.to_ascii_lowercase();
    let tag = tag.to_ascii_lowercase();
    let open = format!("<{tag}");
    let mut out = Vec::new();
    let mut pos = 0;

    while let Some(rel) = lc[pos..].find(&open) {
        let start = pos + rel;
        let after = start + open.len();
        if !is_tag_boundary(lc.as_bytes().get(after)) {
            pos = after;
            continue;
        }
        let Some(gt) = lc[after..].find('>') else {
            break;
        };
        let open_end = after + gt + 1;
        let attrs = &html[after..open_end - 1];

        if !accept(attrs) {
            pos = if descend_into_rejected {
                open_end
            } else {
                matching_close(&lc, &tag, open_end)
                    .map(|close| past_tag(&lc, close))
                    .unwrap_or(open_end)
            };
            continue;
        }

        let Some(close) = matching_close(&lc, &tag, open_end) else {
            break;
        };
        out.push(Element {
            attrs,
            inner: &html[open_end..close],
        });
        pos = past_tag(&lc, close);
    }
    out
}

/// Offset just after the `>` ending the tag that starts at `start`.
fn past_tag(lc: &str, start: usize) -> usize {
    lc[start..].find('>').map_or(lc.len(), |gt| start + gt + 1)
}

/// Byte offset of the `</tag` that closes an element opened just before `from`.
fn matching_close(lc: &str, tag: &str, from: usize) -> Option<usize> {
    let open = format!("<{tag}");
    let close = format!("</{tag}");
    let mut depth = 1usize;
    let mut pos = from;
    loop {
        let next_close = lc[pos..]
            .match_indices(&close)
            .map(|(i, _)| pos + i)
            .find(|i| is_tag_boundary(lc.as_bytes().get(i + close.len())))?;
        let next_open = lc[pos..next_close]
            .match_indices(&open)
            .map(|(i, _)| pos + i)
            .find(|i| is_tag_boundary(lc.as_bytes().get(i + open.len())));
        match next_open {
            Some(o) => {
                depth += 1;
                pos = o + open.len();
            }
            None => {
                depth -= 1;
                if depth == 0 {
                    return Some(next_close);
                }
                pos = next_close + close.len();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{attr_value, decode_entities, find_elements, find_first_with_class, find_with_any_class, strip_tags};

    #[test]
    fn closing_tag_needs_a_name_boundary() {
        let html = "<div><a href=\"/x\">Pedri <abbr>MC</abbr></a><a href=\"/y\">Gavi</a ></div>";
        let links = find_elements(html, "a");
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].text(), "Pedri MC");
        assert_eq!(links[1].attr("href").as_deref(), Some("/y"));
        assert_eq!(links[1].text(), "Gavi");
    }

    #[test]
    fn multibyte_text_after_close_does_not_split_chars() {
        let html = "<a>Ñ</aÑ</a><a>Óscar</a>";
        let links = find_elements(html, "a");
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].text(), "Ñ");
        assert_eq!(links[1].text(), "Óscar");
    }

    #[test]
    fn nested_rows_are_skipped_as_one_element() {
        let html = r#"<table class="items"><tr class="odd"><td><table><tr><td>A</td></tr></table></td></tr><tr class="even"><td>B</td></tr></table>"#;
        let table = find_first_with_class(html, "table", "items").expect("table");
        let rows = find_with_any_class(table.inner, "tr", &["odd", "even"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text(), "A");
        assert_eq!(rows[1].text(), "B");
    }

    #[test]
    fn tag_prefix_is_not_a_match() {
        let html = "<thead><th>x</th></thead><td>y</td>";
        let cells = find_elements(html, "td");
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].text(), "y");
    }

    #[test]
    fn attribute_quoting_variants() {
        assert_eq!(attr_value(r#" href="/a" title='B c'"#, "title").as_deref(), Some("B c"));
        assert_eq!(attr_value(" data-title=x title=y", "title").as_deref(), Some("y"));
        assert_eq!(attr_value(r#" HREF="/x&amp;y""#, "href").as_deref(), Some("/x&y"));
        assert_eq!(attr_value(" class=a", "title"), None);
    }

    #[test]
    fn text_decodes_and_normalizes() {
        assert_eq!(strip_tags("<b>Vin&iacute;cius</b>\n  J&#250;nior"), "Vinícius Júnior");
        assert_eq!(strip_tags("R&amp;D &bogus; x"), "R&D &bogus; x");
        assert_eq!(decode_entities("&euro;1,50m&nbsp;"), "€1,50m ");
    }
}
