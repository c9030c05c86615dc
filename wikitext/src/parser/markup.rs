use std::ops::Range;

// ---------------------------------------------------------------------------
// Fragment types
// ---------------------------------------------------------------------------

/// One piece of the linear fragment stream produced by [`scan`].
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment<'a> {
    /// Raw markup that is not a template, heading or comment.
    Text { raw: &'a str, span: Range<usize> },
    /// `<!-- ... -->`, kept so the text around it can be reassembled.
    Comment { raw: &'a str, span: Range<usize> },
    /// A line that starts and ends with `=`, trailing whitespace excluded.
    Heading { raw: &'a str, span: Range<usize> },
    /// A balanced `{{...}}` invocation.
    Template(RawTemplate<'a>),
}

/// A template invocation split into its name and parameters, unresolved.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTemplate<'a> {
    /// The whole invocation, braces included.
    pub raw: &'a str,
    /// Everything before the first top-level `|`, untrimmed.
    pub name: &'a str,
    pub params: Vec<RawParam<'a>>,
    pub span: Range<usize>,
}

/// One `|`-separated parameter of a [`RawTemplate`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawParam<'a> {
    /// Text before the first top-level `=`, if there is one.
    pub key: Option<&'a str>,
    /// The untrimmed value.
    pub value: &'a str,
    /// Byte offset of `value` in the document.
    pub value_start: usize,
}

impl<'a> Fragment<'a> {
    pub fn raw(&self) -> &'a str {
        match self {
            Fragment::Text { raw, .. } | Fragment::Comment { raw, .. } | Fragment::Heading { raw, .. } => {
                *raw
            }
            Fragment::Template(t) => t.raw,
        }
    }

    pub fn span(&self) -> Range<usize> {
        match self {
            Fragment::Text { span, .. } | Fragment::Comment { span, .. } | Fragment::Heading { span, .. } => {
                span.clone()
            }
            Fragment::Template(t) => t.span.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Split wikitext into fragments. `offset` is the position of `text` in the
/// enclosing document, so spans stay document-relative for nested re-parses.
///
/// Unbalanced `{{`, `[[` and `<nowiki>` openers are plain text.
pub fn scan(text: &str, offset: usize) -> Vec<Fragment<'_>> {
    Scanner::new(text, offset).run()
}

/// The text left once templates and comments are stripped, trimmed.
pub fn residue(fragments: &[Fragment<'_>]) -> String {
    let mut out = String::new();
    for fragment in fragments {
        if let Fragment::Text { raw, .. } | Fragment::Heading { raw, .. } = fragment {
            out.push_str(raw);
        }
    }
    out.trim().to_string()
}

/// `text` with every `<!-- ... -->` comment removed.
pub fn strip_comments(text: &str) -> String {
    scan(text, 0)
        .iter()
        .filter(|f| !matches!(f, Fragment::Comment { .. }))
        .map(Fragment::raw)
        .collect()
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    offset: usize,
    brackets: Brackets,
    fragments: Vec<Fragment<'a>>,
    /// Start of the text run not yet pushed.
    text_start: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str, offset: usize) -> Self {
        Scanner {
            text,
            bytes: text.as_bytes(),
            offset,
            brackets: Brackets::build(text.as_bytes()),
            fragments: Vec::new(),
            text_start: 0,
        }
    }

    fn run(mut self) -> Vec<Fragment<'a>> {
        let mut i = 0;

        while i < self.bytes.len() {
            if self.bytes[i] == b'=' && self.at_line_start(i) {
                if let Some(end) = self.heading_end(i) {
                    self.flush_text(i);
                    self.fragments.push(Fragment::Heading {
                        raw: &self.text[i..end],
                        span: self.span(i..end),
                    });
                    self.text_start = end;
                    i = end;
                    continue;
                }
            }

            match self.brackets.at(i) {
                Some((Construct::Template, end)) => {
                    self.flush_text(i);
                    let template = self.split_template(i, end);
                    self.fragments.push(Fragment::Template(template));
                    self.text_start = end;
                    i = end;
                    continue;
                }
                Some((Construct::Comment, end)) => {
                    self.flush_text(i);
                    self.fragments.push(Fragment::Comment {
                        raw: &self.text[i..end],
                        span: self.span(i..end),
                    });
                    self.text_start = end;
                    i = end;
                    continue;
                }
                // Arguments, links and nowiki stay inside the current text run
                Some((_, end)) => {
                    i = end;
                    continue;
                }
                None => {}
            }

            i += 1;
        }

        self.flush_text(self.bytes.len());
        self.fragments
    }

    fn at_line_start(&self, i: usize) -> bool {
        i == 0 || self.bytes[i - 1] == b'\n'
    }

    /// End of a heading line starting at `start`, trailing whitespace excluded.
    fn heading_end(&self, start: usize) -> Option<usize> {
        let line_end = self.bytes[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(self.bytes.len(), |p| start + p);
        let line = self.text[start..line_end].trim_end();
        if line.ends_with('=') {
            Some(start + line.len())
        } else {
            None
        }
    }

    fn flush_text(&mut self, end: usize) {
        if end > self.text_start {
            self.fragments.push(Fragment::Text {
                raw: &self.text[self.text_start..end],
                span: self.span(self.text_start..end),
            });
        }
    }

    fn span(&self, local: Range<usize>) -> Range<usize> {
        self.offset + local.start..self.offset + local.end
    }

    /// Split the body of `{{...}}` at top-level `|`, then each parameter at
    /// its first top-level `=`.
    fn split_template(&self, start: usize, end: usize) -> RawTemplate<'a> {
        let body = start + 2..end - 2;
        let pieces = split_top_level(self.bytes, &self.brackets, body.clone(), b'|');

        let name_range = pieces.first().cloned().unwrap_or(body);
        let params = pieces
            .iter()
            .skip(1)
            .map(|piece| {
                match split_top_level(self.bytes, &self.brackets, piece.clone(), b'=').first() {
                    Some(key) if key.end < piece.end => RawParam {
                        key: Some(&self.text[key.clone()]),
                        value: &self.text[key.end + 1..piece.end],
                        value_start: self.offset + key.end + 1,
                    },
                    _ => RawParam {
                        key: None,
                        value: &self.text[piece.clone()],
                        value_start: self.offset + piece.start,
                    },
                }
            })
            .collect();

        RawTemplate {
            raw: &self.text[start..end],
            name: &self.text[name_range],
            params,
            span: self.span(start..end),
        }
    }
}

// ---------------------------------------------------------------------------
// Bracket matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Construct {
    /// `{{{name|default}}}`, kept as literal text.
    Argument,
    Template,
    Link,
    Comment,
    Nowiki,
}

/// For every byte offset, the construct opening there and the offset just
/// past its closer.
///
/// Built right to left, so a closer search can jump over every construct
/// nested inside it with one lookup. Matching never recurses, and the worst
/// case (many unbalanced openers) stays quadratic in the input length.
struct Brackets {
    spans: Vec<Option<(Construct, usize)>>,
}

impl Brackets {
    fn build(bytes: &[u8]) -> Self {
        let mut spans = vec![None; bytes.len()];
        // Nearest closers at or after `i + 4` / `i + 8`, the first offset a
        // comment or nowiki opened at `i` may close at.
        let mut comment_close = None;
        let mut nowiki_close = None;

        for i in (0..bytes.len()).rev() {
            if starts_with(bytes, i + 4, "-->") {
                comment_close = Some(i + 4);
            }
            if starts_with_ignore_case(bytes, i + 8, "</nowiki>") {
                nowiki_close = Some(i + 8);
            }

            let span = match bytes[i] {
                b'{' if starts_with(bytes, i, "{{") => {
                    let argument = if starts_with(bytes, i, "{{{") {
                        closing_end(bytes, &spans, i + 3, "}}}").map(|end| (Construct::Argument, end))
                    } else {
                        None
                    };
                    argument.or_else(|| closing_end(bytes, &spans, i + 2, "}}").map(|end| (Construct::Template, end)))
                }
                b'[' if starts_with(bytes, i, "[[") => {
                    closing_end(bytes, &spans, i + 2, "]]").map(|end| (Construct::Link, end))
                }
                // An unterminated comment runs to the end of input
                b'<' if starts_with(bytes, i, "<!--") => {
                    Some((Construct::Comment, comment_close.map_or(bytes.len(), |p| p + 3)))
                }
                b'<' if starts_with_ignore_case(bytes, i, "<nowiki>") => {
                    nowiki_close.map(|p| (Construct::Nowiki, p + "</nowiki>".len()))
                }
                _ => None,
            };
            spans[i] = span;
        }

        Brackets { spans }
    }

    fn at(&self, i: usize) -> Option<(Construct, usize)> {
        self.spans.get(i).copied().flatten()
    }
}

/// Position just past the first `close` at or after `from`, skipping nested
/// constructs already recorded in `spans`.
fn closing_end(bytes: &[u8], spans: &[Option<(Construct, usize)>], from: usize, close: &str) -> Option<usize> {
    let mut j = from;
    while j < bytes.len() {
        if starts_with(bytes, j, close) {
            return Some(j + close.len());
        }
        j = match spans[j] {
            Some((_, end)) => end,
            None => j + 1,
        };
    }
    None
}

/// Split `range` at every occurrence of `sep` outside nested constructs.
fn split_top_level(bytes: &[u8], brackets: &Brackets, range: Range<usize>, sep: u8) -> Vec<Range<usize>> {
    let mut pieces = Vec::new();
    let mut piece_start = range.start;
    let mut j = range.start;

    while j < range.end {
        if bytes[j] == sep {
            pieces.push(piece_start..j);
            j += 1;
            piece_start = j;
            continue;
        }
        j = match brackets.at(j) {
            Some((_, end)) => end.min(range.end),
            None => j + 1,
        };
    }

    pieces.push(piece_start..range.end);
    pieces
}

fn starts_with(bytes: &[u8], i: usize, pat: &str) -> bool {
    bytes.get(i..).is_some_and(|rest| rest.starts_with(pat.as_bytes()))
}

fn starts_with_ignore_case(bytes: &[u8], i: usize, pat: &str) -> bool {
    bytes
        .get(i..i + pat.len())
        .is_some_and(|s| s.eq_ignore_ascii_case(pat.as_bytes()))
}
