//! Structured-data extraction from raw page blobs.
//!
//! Stage 1 of the pipeline. A crawled wiki page carries its content as
//! object literals embedded in script text, often several per blob, with
//! string values full of quotes, brackets and escape sequences. A pattern
//! match cannot track nesting depth through that, so extraction is an
//! explicit character scan.
//!
//! ## Scanner State
//!
//! [`ScanState`] holds three pieces of state:
//!
//! - a stack of open brackets/braces (its length is the nesting depth),
//! - the active string delimiter, if inside a string literal,
//! - an escape-pending flag, set by an unescaped backslash inside a string
//!   and consumed by the very next character, whatever it is.
//!
//! Brackets only count outside string literals, so `{` or `]` inside a
//! title never moves the depth. Double quotes open a string at any depth,
//! so `var s = "{";` is content and not a structure. Single quotes only
//! open a string inside a structure; at depth zero they are apostrophes in
//! markup or prose.
//!
//! ## Record Spans
//!
//! A record span is a balanced object that sits at the top level, or only
//! inside arrays that sit at the top level (`[{...}, {...}]`). Spans found
//! inside a top-level structure are held back until that structure closes;
//! if the input ends first, they are discarded and a
//! [`Warning::MalformedSpan`] is recorded.
//!
//! ## Field Decoding
//!
//! Each span is decoded by a second pass with the same scanning rules that
//! splits the object on commas at depth 1 and each entry on its first colon.
//! String values are unescaped (`\"`, `\\`, `\n`, `\uXXXX`, ...); nested
//! objects and arrays are kept as raw text.
//!
//! ## Flight Chunks
//!
//! Pages rendered by the streaming framework push their payload as string
//! literals: `self.__next_f.push([1,"..."])`. Everything inside those
//! literals is invisible to the raw scan. When a marker is configured, each
//! pushed string is decoded and scanned as well.
//!
//! ## Markdown Fragments
//!
//! Most pushed strings are not objects but pieces of the rendered markdown
//! document. A chunk that does not start with `{` or `[` and carries a
//! `# Title` line outside code fences becomes a fragment record: `title`
//! is the heading text, `content` the whole chunk. The catalog merges
//! fragments that share a title into one page.

use crate::types::Warning;
use serde::Serialize;
use tracing::{debug, warn};

/// Marker preceding framework payload chunks in page scripts.
pub const DEFAULT_FLIGHT_MARKER: &str = "self.__next_f.push(";

// ============================================================================
// Scanner
// ============================================================================

/// What a single character did to the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Opened a bracket or brace outside any string.
    Open(char),
    /// Closed the innermost open bracket or brace.
    Close(char),
    /// Anything else: text, string content, quotes, unmatched closers.
    Text,
}

/// Character-level state of the structural scan.
#[derive(Debug, Clone, Default)]
pub struct ScanState {
    stack: Vec<char>,
    quote: Option<char>,
    escape_pending: bool,
}

impl ScanState {
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn in_string(&self) -> bool {
        self.quote.is_some()
    }

    /// Open brackets from outermost to innermost.
    pub fn open(&self) -> &[char] {
        &self.stack
    }

    /// Feed one character.
    pub fn step(&mut self, c: char) -> Step {
        if let Some(quote) = self.quote {
            if self.escape_pending {
                self.escape_pending = false;
            } else if c == '\\' {
                self.escape_pending = true;
            } else if c == quote {
                self.quote = None;
            }
            return Step::Text;
        }

        match c {
            '"' => {
                self.quote = Some(c);
                Step::Text
            }
            '\'' if !self.stack.is_empty() => {
                self.quote = Some(c);
                Step::Text
            }
            '{' | '[' => {
                self.stack.push(c);
                Step::Open(c)
            }
            '}' | ']' => {
                let opener = if c == '}' { '{' } else { '[' };
                if self.stack.last() == Some(&opener) {
                    self.stack.pop();
                    Step::Close(c)
                } else {
                    Step::Text
                }
            }
            _ => Step::Text,
        }
    }
}

/// A balanced record span located in a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// Byte offset of the opening brace.
    pub start: usize,
    /// Byte offset one past the closing brace.
    pub end: usize,
}

impl Span {
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

/// Result of [`scan_spans`].
#[derive(Debug, Clone, Default)]
pub struct SpanScan {
    pub spans: Vec<Span>,
    /// Start offsets of top-level structures that never closed.
    pub unterminated: Vec<usize>,
}

/// Locate every record span in `text`.
pub fn scan_spans(text: &str) -> SpanScan {
    let mut state = ScanState::default();
    let mut result = SpanScan::default();
    let mut top_start = 0;
    let mut record_start: Option<usize> = None;
    let mut pending: Vec<Span> = Vec::new();

    for (i, c) in text.char_indices() {
        let encloses_only_arrays = state.open().iter().all(|&b| b == '[');
        match state.step(c) {
            Step::Open(opener) => {
                if state.depth() == 1 {
                    top_start = i;
                }
                if opener == '{' && encloses_only_arrays && record_start.is_none() {
                    record_start = Some(i);
                }
            }
            Step::Close(_) => {
                if let Some(start) = record_start
                    && state.open().iter().all(|&b| b == '[')
                {
                    pending.push(Span { start, end: i + 1 });
                    record_start = None;
                }
                if state.depth() == 0 {
                    result.spans.append(&mut pending);
                }
            }
            Step::Text => {}
        }
    }

    if state.depth() > 0 {
        result.unterminated.push(top_start);
    }
    result
}

// ============================================================================
// Field decoding
// ============================================================================

/// Decoded value of one key in a record span.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Str(String),
    /// Numeric token, kept as written.
    Number(String),
    Bool(bool),
    Null,
    /// Nested object/array or an unrecognized token, kept as raw text.
    Raw(String),
}

impl FieldValue {
    /// Text form of scalar values. `Null` has none.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) | FieldValue::Number(s) | FieldValue::Raw(s) => Some(s),
            FieldValue::Bool(true) => Some("true"),
            FieldValue::Bool(false) => Some("false"),
            FieldValue::Null => None,
        }
    }

    fn classify(token: &str) -> Self {
        let token = token.trim();
        if token.starts_with(['"', '\'']) {
            return match decode_string_literal(token) {
                Some((s, _)) => FieldValue::Str(s),
                None => FieldValue::Raw(token.to_string()),
            };
        }
        match token {
            "true" => FieldValue::Bool(true),
            "false" => FieldValue::Bool(false),
            "null" | "undefined" => FieldValue::Null,
            _ if looks_numeric(token) => FieldValue::Number(token.to_string()),
            _ => FieldValue::Raw(token.to_string()),
        }
    }
}

fn looks_numeric(token: &str) -> bool {
    let digits = token.strip_prefix('-').unwrap_or(token);
    !digits.is_empty()
        && digits.starts_with(|c: char| c.is_ascii_digit())
        && digits
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
}

/// Key/value group decoded from one record span.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordFields {
    /// Byte offset of the span in its blob. For records found inside a
    /// flight chunk, the offset of the chunk literal.
    pub offset: usize,
    /// Offset inside the decoded flight chunk, if the record came from one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_offset: Option<usize>,
    /// Synthesized from a markdown chunk rather than decoded from an object.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fragment: bool,
    pub fields: Vec<(String, FieldValue)>,
}

impl RecordFields {
    /// First value stored under any of `keys`, in key priority order.
    pub fn get(&self, keys: &[&str]) -> Option<&FieldValue> {
        keys.iter()
            .find_map(|key| self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v))
    }

    /// Text of the first non-null value under any of `keys`.
    pub fn text(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| {
            self.fields
                .iter()
                .filter(|(k, _)| k == key)
                .find_map(|(_, v)| v.as_text())
        })
    }
}

/// Split an object span into its depth-1 key/value pairs.
///
/// `span` must start with `{`. Entries without a colon and keys that are
/// neither string literals nor bare identifiers are skipped.
pub fn decode_fields(span: &str) -> Vec<(String, FieldValue)> {
    let mut fields = Vec::new();
    let mut state = ScanState::default();
    let mut entry_start = 0;
    let mut colon: Option<usize> = None;

    for (i, c) in span.char_indices() {
        let depth = state.depth();
        let quoted = state.in_string();
        let step = state.step(c);

        if depth == 0 {
            if step == Step::Open('{') {
                entry_start = i + 1;
                continue;
            }
            break;
        }
        if quoted || depth != 1 {
            continue;
        }
        match (c, step) {
            (':', _) if colon.is_none() => colon = Some(i),
            (',', _) | ('}', Step::Close(_)) => {
                if let Some(split) = colon
                    && let Some(field) = decode_entry(&span[entry_start..split], &span[split + 1..i])
                {
                    fields.push(field);
                }
                entry_start = i + 1;
                colon = None;
                if state.depth() == 0 {
                    break;
                }
            }
            _ => {}
        }
    }
    fields
}

fn decode_entry(key: &str, value: &str) -> Option<(String, FieldValue)> {
    let key = key.trim();
    let key = if key.starts_with(['"', '\'']) {
        decode_string_literal(key)?.0
    } else if !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
    {
        key.to_string()
    } else {
        return None;
    };
    Some((key, FieldValue::classify(value)))
}

/// Decode a quoted string literal at the start of `text`.
///
/// Returns the unescaped content and the byte length consumed, including
/// both quotes, or `None` if the literal is not closed. One backslash
/// escapes exactly the next character; known escapes are translated, any
/// other escaped character stands for itself.
pub fn decode_string_literal(text: &str) -> Option<(String, usize)> {
    let mut chars = text.char_indices();
    let (_, quote) = chars.next().filter(|(_, q)| matches!(q, '"' | '\''))?;
    let mut out = String::new();

    while let Some((i, c)) = chars.next() {
        if c == quote {
            return Some((out, i + c.len_utf8()));
        }
        if c != '\\' {
            out.push(c);
            continue;
        }
        let (_, escaped) = chars.next()?;
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{0008}'),
            'f' => out.push('\u{000C}'),
            'u' => {
                let rest = chars.as_str();
                match decode_unicode_escape(rest) {
                    Some((ch, used)) => {
                        out.push(ch);
                        for _ in 0..used {
                            chars.next();
                        }
                    }
                    None => out.push('u'),
                }
            }
            other => out.push(other),
        }
    }
    None
}

/// Decode the hex part of a `\u` escape (`rest` starts after the `u`).
///
/// Surrogate pairs written as two escapes are combined. Returns the char
/// and the number of ASCII characters consumed from `rest`.
fn decode_unicode_escape(rest: &str) -> Option<(char, usize)> {
    let high = u32::from_str_radix(rest.get(..4)?, 16).ok()?;
    if !(0xD800..0xDC00).contains(&high) {
        return char::from_u32(high).map(|c| (c, 4));
    }
    let low = rest
        .get(4..6)
        .filter(|p| *p == "\\u")
        .and_then(|_| rest.get(6..10))
        .and_then(|hex| u32::from_str_radix(hex, 16).ok())
        .filter(|low| (0xDC00..0xE000).contains(low))?;
    let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
    char::from_u32(combined).map(|c| (c, 10))
}

// ============================================================================
// Flight chunks
// ============================================================================

/// A decoded string literal pushed through the flight marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightChunk {
    /// Byte offset of the literal's opening quote in the blob.
    pub offset: usize,
    pub text: String,
}

/// Decode every string element of every `marker([...])` call in `text`.
pub fn flight_chunks(text: &str, marker: &str) -> Vec<FlightChunk> {
    let mut chunks = Vec::new();
    if marker.is_empty() {
        return chunks;
    }

    let mut search_from = 0;
    while let Some(found) = text[search_from..].find(marker) {
        let after = search_from + found + marker.len();
        search_from = after;

        let args = &text[after..];
        let Some(bracket) = args.find(|c: char| !c.is_whitespace()) else {
            break;
        };
        if !args[bracket..].starts_with('[') {
            continue;
        }
        let array_start = after + bracket;

        let mut state = ScanState::default();
        let mut pos = array_start;
        while pos < text.len() {
            let rest = &text[pos..];
            let Some(c) = rest.chars().next() else { break };
            if state.depth() == 1 && !state.in_string() && matches!(c, '"' | '\'') {
                match decode_string_literal(rest) {
                    Some((decoded, used)) => {
                        chunks.push(FlightChunk {
                            offset: pos,
                            text: decoded,
                        });
                        pos += used;
                        continue;
                    }
                    None => break,
                }
            }
            state.step(c);
            pos += c.len_utf8();
            if state.depth() == 0 {
                break;
            }
        }
        search_from = search_from.max(pos);
    }
    chunks
}

// ============================================================================
// Extractor
// ============================================================================

/// Records and warnings extracted from one blob.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub records: Vec<RecordFields>,
    pub warnings: Vec<Warning>,
}

/// Structured-data extractor.
///
/// Stateless apart from its settings; one instance can serve many blobs
/// concurrently.
#[derive(Debug, Clone)]
pub struct Extractor {
    flight_marker: Option<String>,
    markdown_fragments: bool,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    /// Extractor that also unwraps chunks behind [`DEFAULT_FLIGHT_MARKER`].
    pub fn new() -> Self {
        Self::with_flight_marker(DEFAULT_FLIGHT_MARKER)
    }

    /// Extractor that only scans the raw text.
    pub fn raw_only() -> Self {
        Self::with_flight_marker("")
    }

    /// Use `marker` for flight chunks; an empty marker disables unwrapping.
    pub fn with_flight_marker(marker: &str) -> Self {
        Self {
            flight_marker: (!marker.is_empty()).then(|| marker.to_string()),
            markdown_fragments: true,
        }
    }

    /// Turn markdown flight chunks into fragment records (on by default).
    pub fn with_markdown_fragments(mut self, enabled: bool) -> Self {
        self.markdown_fragments = enabled;
        self
    }

    /// Extract all record field groups from `raw`, in order of appearance.
    ///
    /// `source` labels warnings (usually the page slug or file name).
    pub fn extract(&self, source: &str, raw: &str) -> Extraction {
        let mut extraction = Extraction::default();
        collect_records(source, raw, None, &mut extraction);

        if let Some(marker) = &self.flight_marker {
            for chunk in flight_chunks(raw, marker) {
                if self.markdown_fragments
                    && let Some(fragment) = markdown_fragment(&chunk)
                {
                    debug!(source, offset = chunk.offset, "markdown fragment");
                    extraction.records.push(fragment);
                    continue;
                }
                let label = format!("{source}#chunk@{}", chunk.offset);
                let before = extraction.records.len();
                collect_records(&label, &chunk.text, Some(chunk.offset), &mut extraction);
                debug!(
                    source,
                    offset = chunk.offset,
                    records = extraction.records.len() - before,
                    "scanned flight chunk"
                );
            }
            extraction
                .records
                .sort_by_key(|r| (r.offset, r.chunk_offset.unwrap_or(0)));
        }

        debug!(source, records = extraction.records.len(), "extracted blob");
        extraction
    }
}

/// Scan `text` and append its records. `chunk_at` is the blob offset of
/// the flight chunk `text` was decoded from, if any.
fn collect_records(
    source: &str,
    text: &str,
    chunk_at: Option<usize>,
    extraction: &mut Extraction,
) {
    let scan = scan_spans(text);
    for span in &scan.spans {
        let (offset, chunk_offset) = match chunk_at {
            Some(at) => (at, Some(span.start)),
            None => (span.start, None),
        };
        extraction.records.push(RecordFields {
            offset,
            chunk_offset,
            fragment: false,
            fields: decode_fields(span.slice(text)),
        });
    }
    for start in scan.unterminated {
        warn!(source, offset = start, "unterminated record span");
        extraction.warnings.push(Warning::MalformedSpan {
            source: source.to_string(),
            offset: start,
        });
    }
}

// ============================================================================
// Markdown fragments
// ============================================================================

/// Heading text of a `# Title` line. `# # x` and deeper levels are not titles.
pub fn title_line(line: &str) -> Option<&str> {
    let title = line.trim().strip_prefix("# ")?.trim();
    let unclosed = title.trim_end_matches('#');
    let title = if unclosed.ends_with(' ') {
        unclosed.trim_end()
    } else {
        title
    };
    (!title.is_empty() && !title.starts_with('#')).then_some(title)
}

/// First `# Title` line of a markdown document, skipping fenced code.
pub fn markdown_title(text: &str) -> Option<&str> {
    let mut fenced = false;
    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            fenced = !fenced;
        } else if !fenced && let Some(title) = title_line(line) {
            return Some(title);
        }
    }
    None
}

fn markdown_fragment(chunk: &FlightChunk) -> Option<RecordFields> {
    let text = chunk.text.trim();
    if text.starts_with(['{', '[']) {
        return None;
    }
    let title = markdown_title(text)?;
    Some(RecordFields {
        offset: chunk.offset,
        chunk_offset: Some(0),
        fragment: true,
        fields: vec![
            ("title".to_string(), FieldValue::Str(title.to_string())),
            ("content".to_string(), FieldValue::Str(text.to_string())),
        ],
    })
}
