use crate::error::MessageError;
use lazy_static::lazy_static;
use mailparse::{DispositionType, ParsedMail};
use regex::Regex;

lazy_static! {
    static ref HORIZONTAL_WS: Regex = Regex::new(r"[ \t]+").unwrap();
    static ref EXTERNAL_NOTICE: Regex = Regex::new(
        r"this\s*message\s*is\s*from\s*an\s*external\s*sender\s*-\s*be\s*cautious,\s*particularly\s*with\s*links\s*and\s*attachments"
    )
    .unwrap();
    static ref SCRIPT_BLOCK: Regex = Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap();
    static ref STYLE_BLOCK: Regex = Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap();
    static ref HTML_TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
    static ref BLANK_LINES: Regex = Regex::new(r"\n\s*\n+").unwrap();
}

/// Remove the gateway's "external sender" banner from already lower-cased text.
pub fn strip_external_notice(text: &str) -> String {
    EXTERNAL_NOTICE.replace_all(text, "").into_owned()
}

/// A mail address as found in a `From`/`To` header.
///
/// Construction never fails: input without `@` produces an empty address and
/// every accessor returns `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    parts: Option<AddressParts>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AddressParts {
    address: String,
    local_part: String,
    domain: String,
    display_name: String,
    first_name: String,
    last_name: String,
}

impl Address {
    pub fn parse(raw: &str) -> Self {
        if !raw.contains('@') {
            return Self { parts: None };
        }

        let bracketed = raw.find('<').and_then(|open| {
            raw[open + 1..]
                .find('>')
                .map(|close| &raw[open + 1..open + 1 + close])
        });
        let address = match bracketed {
            Some(inner) => inner.trim().to_lowercase(),
            None => raw.trim().to_string(),
        };

        let (local_part, domain) = match address.split_once('@') {
            Some((local, rest)) => (
                local.to_lowercase(),
                rest.split('@').next().unwrap_or_default().to_lowercase(),
            ),
            None => (address.to_lowercase(), String::new()),
        };

        let display_name = match raw.find('<') {
            Some(open) => raw[..open].trim().to_lowercase(),
            None => String::new(),
        };

        let mut names = local_part.split('.');
        let first_name = names.next().unwrap_or_default().to_string();
        let last_name = names.next().unwrap_or_default().to_string();

        Self {
            parts: Some(AddressParts {
                address,
                local_part,
                domain,
                display_name,
                first_name,
                last_name,
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_none()
    }

    pub fn address(&self) -> Option<&str> {
        self.parts.as_ref().map(|p| p.address.as_str())
    }

    pub fn local_part(&self) -> Option<&str> {
        self.parts.as_ref().map(|p| p.local_part.as_str())
    }

    pub fn domain(&self) -> Option<&str> {
        self.parts.as_ref().map(|p| p.domain.as_str())
    }

    pub fn display_name(&self) -> Option<&str> {
        self.parts.as_ref().map(|p| p.display_name.as_str())
    }

    pub fn first_name(&self) -> Option<&str> {
        self.parts.as_ref().map(|p| p.first_name.as_str())
    }

    pub fn last_name(&self) -> Option<&str> {
        self.parts.as_ref().map(|p| p.last_name.as_str())
    }

    /// The display name as written plus, for "Last, First" names, the
    /// "First Last" reading. Duplicates are removed.
    pub fn display_name_variants(&self) -> Vec<String> {
        let Some(name) = self.display_name() else {
            return Vec::new();
        };

        let mut variants = vec![name.to_string()];
        if name.contains(',') {
            let reordered = name
                .split(',')
                .rev()
                .map(str::trim)
                .collect::<Vec<_>>()
                .join(" ");
            if !variants.contains(&reordered) {
                variants.push(reordered);
            }
        }
        variants
    }
}

/// Decoded message headers in their original order.
#[derive(Debug, Clone, Default)]
pub struct HeaderSet {
    entries: Vec<(String, String)>,
}

impl HeaderSet {
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Case-insensitive lookup returning the first occurrence.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Converts an HTML body to readable text.
pub trait HtmlToText: Send + Sync {
    fn extract(&self, html: &str) -> String;
}

/// Regex based tag stripper used when no richer extractor is plugged in.
#[derive(Debug, Default, Clone, Copy)]
pub struct TagStripper;

impl HtmlToText for TagStripper {
    fn extract(&self, html: &str) -> String {
        let mut text = SCRIPT_BLOCK.replace_all(html, " ").into_owned();
        text = STYLE_BLOCK.replace_all(&text, " ").into_owned();
        text = text
            .replace("<br>", "\n")
            .replace("<br/>", "\n")
            .replace("<br />", "\n")
            .replace("</p>", "\n");
        text = HTML_TAG.replace_all(&text, " ").into_owned();

        text = text
            .replace("&nbsp;", " ")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&amp;", "&");

        let text = HORIZONTAL_WS.replace_all(&text, " ");
        BLANK_LINES.replace_all(text.trim(), "\n").into_owned()
    }
}

/// Normalized, lower-cased body text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Content {
    text: String,
}

impl Content {
    /// Normalizes a decoded body. HTML input goes through `html` first.
    pub fn new(raw: &str, is_html: bool, html: &dyn HtmlToText) -> Self {
        let mut text = HORIZONTAL_WS.replace_all(raw, " ").to_lowercase();

        if is_html || text.trim_start().starts_with("<html") {
            text = HORIZONTAL_WS
                .replace_all(&html.extract(&text), " ")
                .to_lowercase();
        }

        Self {
            text: strip_external_notice(&text),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn count(&self, needle: char) -> usize {
        self.text.matches(needle).count()
    }
}

impl std::fmt::Display for Content {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug, Clone)]
pub struct ParsedMessage {
    pub headers: HeaderSet,
    pub content: Content,
}

/// Parse raw message bytes into headers and the canonical body.
pub fn parse_message(raw: &[u8], html: &dyn HtmlToText) -> Result<ParsedMessage, MessageError> {
    let mail = mailparse::parse_mail(raw)?;

    let headers = HeaderSet::from_pairs(
        mail.headers
            .iter()
            .map(|h| (h.get_key(), h.get_value())),
    );

    let part = canonical_part(&mail).ok_or(MessageError::MissingBody)?;
    let is_html = part.ctype.mimetype.eq_ignore_ascii_case("text/html");
    let body = part.get_body()?;
    log::debug!(
        "Selected {} body part ({} bytes)",
        part.ctype.mimetype,
        body.len()
    );

    Ok(ParsedMessage {
        headers,
        content: Content::new(&body, is_html, html),
    })
}

/// A single-part message is its own body. Multipart messages use the first
/// inline `text/plain` leaf, falling back to the first inline `text/html`.
fn canonical_part<'a>(mail: &'a ParsedMail<'a>) -> Option<&'a ParsedMail<'a>> {
    if mail.subparts.is_empty() {
        return Some(mail);
    }
    find_leaf(mail, "text/plain").or_else(|| find_leaf(mail, "text/html"))
}

fn find_leaf<'a>(part: &'a ParsedMail<'a>, mimetype: &str) -> Option<&'a ParsedMail<'a>> {
    if part.subparts.is_empty() {
        let inline = part.get_content_disposition().disposition != DispositionType::Attachment;
        let matches = part.ctype.mimetype.eq_ignore_ascii_case(mimetype);
        return (inline && matches).then_some(part);
    }
    part.subparts.iter().find_map(|sub| find_leaf(sub, mimetype))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_with_display_name() {
        let addr = Address::parse("John Doe <John.Doe@Example.COM>");
        assert!(!addr.is_empty());
        assert_eq!(addr.address(), Some("john.doe@example.com"));
        assert_eq!(addr.local_part(), Some("john.doe"));
        assert_eq!(addr.domain(), Some("example.com"));
        assert_eq!(addr.display_name(), Some("john doe"));
        assert_eq!(addr.first_name(), Some("john"));
        assert_eq!(addr.last_name(), Some("doe"));
    }

    #[test]
    fn test_address_ignores_text_after_bracket() {
        let addr = Address::parse("Bob Smith <bob@corp.example> (via list)");
        assert_eq!(addr.address(), Some("bob@corp.example"));
        assert_eq!(addr.domain(), Some("corp.example"));
        assert_eq!(addr.display_name(), Some("bob smith"));
    }

    #[test]
    fn test_address_without_brackets() {
        let addr = Address::parse("alerts@bank.example");
        assert_eq!(addr.domain(), Some("bank.example"));
        assert_eq!(addr.display_name(), Some(""));
        assert_eq!(addr.first_name(), Some("alerts"));
        assert_eq!(addr.last_name(), Some(""));
    }

    #[test]
    fn test_address_without_at_is_empty() {
        for raw in ["", "undisclosed-recipients:;", "John Doe <nobody>"] {
            let addr = Address::parse(raw);
            assert!(addr.is_empty());
            assert_eq!(addr.address(), None);
            assert_eq!(addr.domain(), None);
            assert_eq!(addr.local_part(), None);
            assert_eq!(addr.display_name(), None);
            assert_eq!(addr.first_name(), None);
            assert_eq!(addr.last_name(), None);
        }
    }

    #[test]
    fn test_display_name_reordering() {
        let addr = Address::parse("Doe, John <jdoe@example.com>");
        assert_eq!(addr.display_name(), Some("doe, john"));
        assert_eq!(
            addr.display_name_variants(),
            vec!["doe, john".to_string(), "john doe".to_string()]
        );
    }

    #[test]
    fn test_header_lookup() {
        let headers = HeaderSet::from_pairs([("Subject", "Hello"), ("subject", "Second")]);
        assert_eq!(headers.get("SUBJECT"), Some("Hello"));
        assert_eq!(headers.get_or("Date", "n/a"), "n/a");
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_content_normalization() {
        let raw = "Hello\t\tWorld   THIS message is from an external\n sender - be cautious, particularly with links and attachments Bye";
        let content = Content::new(raw, false, &TagStripper);
        assert_eq!(content.as_str(), "hello world  bye");
    }

    #[test]
    fn test_parse_single_part_message() {
        let raw = b"From: Alice <alice@example.com>\r\nSubject: =?utf-8?B?SGVsbG8=?=\r\n\r\nHi   there\r\n";
        let parsed = parse_message(raw, &TagStripper).unwrap();
        assert_eq!(parsed.headers.get("Subject"), Some("Hello"));
        assert!(parsed.content.as_str().starts_with("hi there"));
    }

    #[test]
    fn test_parse_multipart_prefers_plain_text() {
        let raw = concat!(
            "From: a@example.com\r\n",
            "Content-Type: multipart/mixed; boundary=\"XX\"\r\n",
            "\r\n",
            "--XX\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Disposition: attachment; filename=\"notes.txt\"\r\n",
            "\r\n",
            "attached notes\r\n",
            "--XX\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<html><body><p>Html Body</p></body></html>\r\n",
            "--XX\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "Plain Body\r\n",
            "--XX--\r\n",
        );
        let parsed = parse_message(raw.as_bytes(), &TagStripper).unwrap();
        assert!(parsed.content.as_str().starts_with("plain body"));
    }

    #[test]
    fn test_parse_multipart_html_fallback() {
        let raw = concat!(
            "From: a@example.com\r\n",
            "Content-Type: multipart/alternative; boundary=\"YY\"\r\n",
            "\r\n",
            "--YY\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<html><body><p>Dear   Customer</p><script>x()</script></body></html>\r\n",
            "--YY--\r\n",
        );
        let parsed = parse_message(raw.as_bytes(), &TagStripper).unwrap();
        assert_eq!(parsed.content.as_str(), "dear customer");
    }

    #[test]
    fn test_parse_multipart_without_text_is_fatal() {
        let raw = concat!(
            "From: a@example.com\r\n",
            "Content-Type: multipart/mixed; boundary=\"ZZ\"\r\n",
            "\r\n",
            "--ZZ\r\n",
            "Content-Type: application/pdf\r\n",
            "\r\n",
            "JVBERi0=\r\n",
            "--ZZ--\r\n",
        );
        let err = parse_message(raw.as_bytes(), &TagStripper).unwrap_err();
        assert!(matches!(err, MessageError::MissingBody));
    }
}
