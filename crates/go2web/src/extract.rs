//! HTML to printable text
//!
//! A forgiving tag scanner, not a parser: it never fails, drops comments and
//! non-content elements, and hands back a flat stream of tags and decoded
//! text for [`page_text`] and the search result harvester to walk.

use url::Url;

/// Elements whose content is never shown
const SKIP_ELEMENTS: &[&str] = &["script", "style", "noscript", "iframe", "svg", "template"];

/// Elements printed as their own line
const BLOCK_ELEMENTS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6", "p", "li"];

/// Elements whose text is kept inline
const INLINE_ELEMENTS: &[&str] = &["span", "button"];

/// Elements that separate words without starting a new line
const BREAK_ELEMENTS: &[&str] = &["br", "div", "td", "th", "tr"];

/// Longest entity name looked up, excluding `&` and `;`
const MAX_ENTITY_LEN: usize = 10;

/// Check if content is HTML based on content type and body
pub fn is_html(content_type: Option<&str>, body: &str) -> bool {
    if let Some(ct) = content_type {
        let ct = ct.to_ascii_lowercase();
        if ct.contains("text/html") || ct.contains("application/xhtml") {
            return true;
        }
    }

    let start: String = body.trim_start().chars().take(14).collect();
    let start = start.to_ascii_lowercase();
    start.starts_with("<!doctype html") || start.starts_with("<html")
}

/// Render the readable parts of a page as lines of text
///
/// Headings, paragraphs and list items become one line each; spans and
/// buttons contribute their text. Anchors print as `Link -> <url>` and
/// images as `Image -> <url>`, with relative references resolved against
/// `base`. Links found inside a text line are printed right after it.
pub fn page_text(html: &str, base: &Url) -> String {
    let mut page = PageWriter::default();

    for node in nodes(html) {
        match node {
            Node::Text(text) => {
                if page.depth > 0 {
                    page.text.push_str(&text);
                }
            }
            Node::Tag(tag) => page.tag(&tag, base),
        }
    }
    page.flush();

    page.lines.join("\n")
}

#[derive(Default)]
struct PageWriter {
    lines: Vec<String>,
    text: String,
    // Link and image lines seen while a text line is open
    pending: Vec<String>,
    depth: usize,
}

impl PageWriter {
    fn tag(&mut self, tag: &Tag, base: &Url) {
        let name = tag.name.as_str();

        if BLOCK_ELEMENTS.contains(&name) && !tag.self_closing {
            self.flush();
            if tag.closing {
                self.depth = self.depth.saturating_sub(1);
            } else {
                self.depth += 1;
            }
            return;
        }

        if INLINE_ELEMENTS.contains(&name) && !tag.self_closing {
            if tag.closing {
                self.depth = self.depth.saturating_sub(1);
                if self.depth == 0 {
                    self.flush();
                }
            } else {
                self.depth += 1;
            }
            return;
        }

        if tag.closing {
            return;
        }

        let reference = match name {
            "a" => tag.attr("href").map(|href| format!("Link -> {}", resolve(base, &href))),
            "img" => tag.attr("src").map(|src| format!("Image -> {}", resolve(base, &src))),
            _ => {
                if BREAK_ELEMENTS.contains(&name) {
                    self.text.push(' ');
                }
                None
            }
        };

        if let Some(line) = reference {
            if self.depth > 0 {
                self.pending.push(line);
            } else {
                self.lines.push(line);
            }
        }
    }

    fn flush(&mut self) {
        let text = collapse_whitespace(&self.text);
        if !text.is_empty() {
            self.lines.push(text);
        }
        self.text.clear();
        self.lines.append(&mut self.pending);
    }
}

/// Resolve `reference` against `base`, keeping it as written when it does
/// not form a valid URL
pub(crate) fn resolve(base: &Url, reference: &str) -> String {
    let reference = reference.trim();
    match base.join(reference) {
        Ok(url) => url.to_string(),
        Err(_) => reference.to_string(),
    }
}

/// Collapse whitespace runs to single spaces and trim
pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A scanned HTML node
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Tag(Tag),
    /// Text with entities decoded
    Text(String),
}

/// An opening or closing tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Tag {
    /// Lowercased element name
    pub name: String,
    pub closing: bool,
    pub self_closing: bool,
    attrs: String,
}

impl Tag {
    /// Parse the text between `<` and `>`; `None` for doctypes and
    /// processing instructions
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (closing, body) = match raw.strip_prefix('/') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, raw),
        };

        let name_len = body
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
            .unwrap_or(body.len());
        if name_len == 0 {
            return None;
        }

        Some(Self {
            name: body[..name_len].to_ascii_lowercase(),
            closing,
            self_closing: body.ends_with('/'),
            attrs: body[name_len..].to_string(),
        })
    }

    /// Attribute value with entities decoded
    pub fn attr(&self, name: &str) -> Option<String> {
        let lower = self.attrs.to_ascii_lowercase();
        let mut from = 0;

        while let Some(offset) = lower[from..].find(name) {
            let start = from + offset;
            from = start + name.len();

            let at_boundary = lower[..start].ends_with(|c: char| c.is_whitespace());
            let Some(rest) = self.attrs[from..].trim_start().strip_prefix('=') else {
                continue;
            };
            if !at_boundary {
                continue;
            }

            let rest = rest.trim_start();
            let value = if let Some(quoted) = rest.strip_prefix('"') {
                quoted.split('"').next()
            } else if let Some(quoted) = rest.strip_prefix('\'') {
                quoted.split('\'').next()
            } else {
                rest.split(|c: char| c.is_whitespace()).next()
            };
            return value.map(decode_entities);
        }
        None
    }

    /// True if the `class` attribute lists a class containing `needle`
    pub fn class_contains(&self, needle: &str) -> bool {
        self.attr("class")
            .map(|class| class.split_whitespace().any(|c| c.contains(needle)))
            .unwrap_or(false)
    }
}

/// Scan `html` into tags and text
///
/// Comments, doctypes and the content of script-like elements are dropped.
/// A `<` that cannot start a tag is kept as text.
pub(crate) fn nodes(html: &str) -> Vec<Node> {
    // ASCII lowercasing keeps byte offsets aligned with `html`
    let lower = html.to_ascii_lowercase();
    let mut nodes = Vec::new();
    let mut text = String::new();
    let mut pos = 0;

    while let Some(offset) = html[pos..].find('<') {
        let start = pos + offset;
        text.push_str(&html[pos..start]);

        if lower[start..].starts_with("<!--") {
            pos = match lower[start + 4..].find("-->") {
                Some(end) => start + 4 + end + 3,
                None => html.len(),
            };
            continue;
        }

        let opens_tag = html[start + 1..]
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '/' || c == '!' || c == '?')
            .unwrap_or(false);
        let end = match html[start..].find('>') {
            Some(end) if opens_tag => start + end,
            _ => {
                text.push('<');
                pos = start + 1;
                continue;
            }
        };
        pos = end + 1;

        let Some(tag) = Tag::parse(&html[start + 1..end]) else {
            continue;
        };

        if !text.is_empty() {
            nodes.push(Node::Text(decode_entities(&text)));
            text.clear();
        }

        if SKIP_ELEMENTS.contains(&tag.name.as_str()) {
            if !tag.closing && !tag.self_closing {
                pos = skip_element(html, &lower, pos, &tag.name);
            }
            continue;
        }
        nodes.push(Node::Tag(tag));
    }

    text.push_str(&html[pos..]);
    if !text.is_empty() {
        nodes.push(Node::Text(decode_entities(&text)));
    }
    nodes
}

/// Position just past the closing tag of `name`, or the end of input
fn skip_element(html: &str, lower: &str, pos: usize, name: &str) -> usize {
    let close = format!("</{}", name);
    lower[pos..]
        .find(&close)
        .and_then(|offset| {
            let after = pos + offset;
            html[after..].find('>').map(|end| after + end + 1)
        })
        .unwrap_or(html.len())
}

/// Decode character references; unknown ones are kept as written
pub(crate) fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest[1..]
            .find(';')
            .filter(|&end| end <= MAX_ENTITY_LEN)
            .and_then(|end| entity(&rest[1..1 + end]).map(|c| (c, end)));

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 2..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "mdash" => '—',
        "ndash" => '–',
        "hellip" => '…',
        "laquo" => '«',
        "raquo" => '»',
        "copy" => '©',
        "reg" => '®',
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            return char::from_u32(code);
        }
    };
    Some(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/docs/page.html").unwrap()
    }

    #[test]
    fn test_is_html_by_content_type() {
        assert!(is_html(Some("text/html"), ""));
        assert!(is_html(Some("Text/HTML; charset=utf-8"), ""));
        assert!(is_html(Some("application/xhtml+xml"), ""));
        assert!(!is_html(Some("text/plain"), ""));
        assert!(!is_html(Some("application/json"), "{}"));
    }

    #[test]
    fn test_is_html_by_body() {
        assert!(is_html(None, "<!DOCTYPE html><html>"));
        assert!(is_html(None, "  <!doctype html>"));
        assert!(is_html(None, "<html><body>"));
        assert!(!is_html(None, "Hello world"));
        assert!(!is_html(None, "{\"json\": true}"));
    }

    #[test]
    fn test_page_text_blocks() {
        let html = "<html><body><h1>Title</h1><p>First   paragraph\n here</p>\
                    <div>ignored div text</div><p>Second</p></body></html>";
        assert_eq!(
            page_text(html, &base()),
            "Title\nFirst paragraph here\nSecond"
        );
    }

    #[test]
    fn test_page_text_inline_span_stays_on_line() {
        let html = "<p>Hello <span>brave</span> world</p><span>Loose span</span>";
        assert_eq!(page_text(html, &base()), "Hello brave world\nLoose span");
    }

    #[test]
    fn test_page_text_skips_script_and_style() {
        let html = "<p>Before</p><script>if (a < b) { alert('<p>bad</p>'); }</script>\
                    <style>p { color: red; }</style><!-- <p>hidden</p> --><p>After</p>";
        let text = page_text(html, &base());
        assert_eq!(text, "Before\nAfter");
    }

    #[test]
    fn test_page_text_links_and_images() {
        let html = r#"<a href="/about">About</a>
            <img src="img/logo.png" alt="logo">
            <a href="https://other.org/x">Other</a>
            <a name="anchor-without-href">x</a>"#;
        assert_eq!(
            page_text(html, &base()),
            "Link -> https://example.com/about\n\
             Image -> https://example.com/docs/img/logo.png\n\
             Link -> https://other.org/x"
        );
    }

    #[test]
    fn test_page_text_link_inside_paragraph() {
        let html = r#"<p>Read <a href="guide.html">the guide</a> first.</p><p>Next</p>"#;
        assert_eq!(
            page_text(html, &base()),
            "Read the guide first.\nLink -> https://example.com/docs/guide.html\nNext"
        );
    }

    #[test]
    fn test_page_text_unclosed_paragraphs() {
        let html = "<p>One<p>Two<br>Three";
        assert_eq!(page_text(html, &base()), "One\nTwo Three");
    }

    #[test]
    fn test_entity_decoding() {
        let html = "<p>&amp; &lt; &gt; &quot; &apos; &#39; &#x41; &mdash; &copy;</p>";
        assert_eq!(page_text(html, &base()), "& < > \" ' ' A — ©");
    }

    #[test]
    fn test_unknown_entity_kept() {
        assert_eq!(decode_entities("AT&T &bogus; a&b"), "AT&T &bogus; a&b");
        assert_eq!(decode_entities("x &amp"), "x &amp");
    }

    #[test]
    fn test_stray_angle_bracket_is_text() {
        assert_eq!(page_text("<p>1 < 2 and 3 > 2</p>", &base()), "1 < 2 and 3 > 2");
    }

    #[test]
    fn test_tag_attr() {
        let tag = Tag::parse(r#"a data-href="/no" href="/yes?a=1&amp;b=2" class=result"#).unwrap();
        assert_eq!(tag.name, "a");
        assert_eq!(tag.attr("href"), Some("/yes?a=1&b=2".to_string()));
        assert_eq!(tag.attr("class"), Some("result".to_string()));
        assert_eq!(tag.attr("title"), None);

        let tag = Tag::parse("IMG SRC='pic.png' /").unwrap();
        assert_eq!(tag.name, "img");
        assert!(tag.self_closing);
        assert_eq!(tag.attr("src"), Some("pic.png".to_string()));
    }

    #[test]
    fn test_tag_parse_rejects_doctype() {
        assert!(Tag::parse("!DOCTYPE html").is_none());
        assert!(Tag::parse("?xml version=\"1.0\"?").is_none());
        let close = Tag::parse("/DIV").unwrap();
        assert!(close.closing);
        assert_eq!(close.name, "div");
    }

    #[test]
    fn test_class_contains() {
        let tag = Tag::parse(r#"a class="result__a js-link""#).unwrap();
        assert!(tag.class_contains("result"));
        assert!(!tag.class_contains("snippet"));
    }
}
