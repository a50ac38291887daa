//! Streaming comment filters for inlined stylesheets and scripts
//!
//! Each filter is a small transducer: it is fed one input byte at a time,
//! followed by a single end-of-stream symbol (`None`), and answers every
//! symbol with zero to three output bytes. Nothing is buffered beyond the
//! current state, so a filter can be driven straight off a file stream.
//!
//! Only double-quoted strings are recognised. Inside them everything is
//! copied verbatim; a quote escaped by a backslash does not close the
//! string, but one following an escaped backslash (`"\\"`) does. Outside
//! strings, `/* ... */` comments are removed and runs of line breaks
//! collapse into one `\n`. The script filter additionally drops `//` line
//! comments, trims indentation and terminates the stream with
//! `;\n` so that concatenated scripts cannot run into each other.

use std::io::{self, BufReader, Read, Write};

/// Output produced for one input symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Emit {
    buf: [u8; 3],
    len: u8,
}

impl Emit {
    pub const NONE: Emit = Emit { buf: [0; 3], len: 0 };

    fn one(a: u8) -> Self {
        Self { buf: [a, 0, 0], len: 1 }
    }

    fn two(a: u8, b: u8) -> Self {
        Self { buf: [a, b, 0], len: 2 }
    }

    /// Prepend a collapsed line break to `rest`
    fn after_newline(newline: bool, rest: &[u8]) -> Self {
        let mut emit = Self::NONE;
        if newline {
            emit.push(b'\n');
        }
        for &b in rest {
            emit.push(b);
        }
        emit
    }

    fn push(&mut self, b: u8) {
        self.buf[self.len as usize] = b;
        self.len += 1;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A byte transducer; `None` marks the end of the stream
pub trait StreamFilter {
    fn feed(&mut self, symbol: Option<u8>) -> Emit;
}

/// Copies input unchanged (used for HTML fragments)
#[derive(Debug, Default)]
pub struct PassThrough;

impl StreamFilter for PassThrough {
    fn feed(&mut self, symbol: Option<u8>) -> Emit {
        symbol.map(Emit::one).unwrap_or(Emit::NONE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum CssState {
    #[default]
    Text,
    Slash,
    Comment,
    Quotes,
    Newline,
}

/// Comment stripper for stylesheets
#[derive(Debug, Default)]
pub struct CssFilter {
    state: CssState,
    last: u8,
    /// Previous byte inside a string was an unescaped backslash
    escaped: bool,
}

impl CssFilter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamFilter for CssFilter {
    fn feed(&mut self, symbol: Option<u8>) -> Emit {
        match self.state {
            CssState::Comment => match symbol {
                None => Emit::one(b'\n'),
                Some(b'/') => {
                    if self.last == b'*' {
                        self.state = CssState::Text;
                    }
                    self.last = 0;
                    Emit::NONE
                }
                Some(c) => {
                    self.last = c;
                    Emit::NONE
                }
            },
            CssState::Quotes => match symbol {
                None => Emit::NONE,
                Some(c) => {
                    if c == b'"' && !self.escaped {
                        self.state = CssState::Text;
                    }
                    self.escaped = c == b'\\' && !self.escaped;
                    Emit::one(c)
                }
            },
            CssState::Slash => match symbol {
                None => Emit::two(b'/', b'\n'),
                // the second slash may still open a comment
                Some(b'/') => Emit::one(b'/'),
                Some(b'*') => {
                    self.last = 0;
                    self.state = CssState::Comment;
                    Emit::NONE
                }
                Some(b'"') => {
                    self.last = b'"';
                    self.state = CssState::Quotes;
                    Emit::two(b'/', b'"')
                }
                Some(b'\n' | b'\r') => {
                    self.state = CssState::Newline;
                    Emit::one(b'/')
                }
                Some(c) => {
                    self.last = c;
                    self.state = CssState::Text;
                    Emit::two(b'/', c)
                }
            },
            CssState::Newline => match symbol {
                None => Emit::one(b'\n'),
                Some(b'\n' | b'\r') => Emit::NONE,
                Some(b'/') => {
                    self.state = CssState::Slash;
                    Emit::one(b'\n')
                }
                Some(b'"') => {
                    self.last = b'"';
                    self.state = CssState::Quotes;
                    Emit::two(b'\n', b'"')
                }
                Some(c) => {
                    self.last = c;
                    self.state = CssState::Text;
                    Emit::two(b'\n', c)
                }
            },
            CssState::Text => match symbol {
                None => Emit::one(b'\n'),
                Some(b'/') => {
                    self.state = CssState::Slash;
                    Emit::NONE
                }
                Some(b'\n' | b'\r') => {
                    self.state = CssState::Newline;
                    Emit::NONE
                }
                Some(b'"') => {
                    self.last = b'"';
                    self.state = CssState::Quotes;
                    Emit::one(b'"')
                }
                Some(c) => {
                    self.last = c;
                    Emit::one(c)
                }
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum JsState {
    #[default]
    Text,
    /// Pending `/`; `true` when it is the first character of a line
    Slash(bool),
    /// Inside `/* */`; `true` when the comment opened a line
    Comment(bool),
    LineComment,
    Quotes,
    Newline,
}

/// Comment stripper for scripts
#[derive(Debug, Default)]
pub struct JsFilter {
    state: JsState,
    last: u8,
    /// Previous byte inside a string was an unescaped backslash
    escaped: bool,
}

impl JsFilter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamFilter for JsFilter {
    fn feed(&mut self, symbol: Option<u8>) -> Emit {
        match self.state {
            JsState::Comment(line_start) => match symbol {
                None => Emit::two(b';', b'\n'),
                Some(b'/') => {
                    if self.last == b'*' {
                        // a comment that opened a line must not glue two lines together
                        self.state = if line_start { JsState::Newline } else { JsState::Text };
                    }
                    self.last = 0;
                    Emit::NONE
                }
                Some(c) => {
                    self.last = c;
                    Emit::NONE
                }
            },
            JsState::LineComment => match symbol {
                None => Emit::two(b';', b'\n'),
                Some(b'\n') => {
                    self.state = JsState::Newline;
                    Emit::NONE
                }
                Some(_) => Emit::NONE,
            },
            JsState::Quotes => match symbol {
                None => Emit::NONE,
                Some(c) => {
                    if c == b'"' && !self.escaped {
                        self.state = JsState::Text;
                    }
                    self.escaped = c == b'\\' && !self.escaped;
                    Emit::one(c)
                }
            },
            JsState::Slash(line_start) => match symbol {
                None => Emit::after_newline(line_start, b"/\n"),
                Some(b'/') => {
                    self.state = JsState::LineComment;
                    Emit::NONE
                }
                Some(b'*') => {
                    self.last = 0;
                    self.state = JsState::Comment(line_start);
                    Emit::NONE
                }
                Some(b'"') => {
                    self.last = b'"';
                    self.state = JsState::Quotes;
                    Emit::after_newline(line_start, b"/\"")
                }
                Some(b'\n' | b'\r') => {
                    self.state = JsState::Newline;
                    Emit::after_newline(line_start, b"/")
                }
                Some(c) => {
                    self.last = c;
                    self.state = JsState::Text;
                    Emit::after_newline(line_start, &[b'/', c])
                }
            },
            JsState::Newline => match symbol {
                None => Emit::two(b';', b'\n'),
                Some(b' ' | b'\t' | b'\n' | b'\r') => Emit::NONE,
                Some(b'/') => {
                    self.state = JsState::Slash(true);
                    Emit::NONE
                }
                Some(b'"') => {
                    self.last = b'"';
                    self.state = JsState::Quotes;
                    Emit::two(b'\n', b'"')
                }
                Some(c) => {
                    self.last = c;
                    self.state = JsState::Text;
                    Emit::two(b'\n', c)
                }
            },
            JsState::Text => match symbol {
                None => Emit::two(b';', b'\n'),
                Some(b'/') => {
                    self.state = JsState::Slash(false);
                    Emit::NONE
                }
                Some(b'\n' | b'\r') => {
                    self.state = JsState::Newline;
                    Emit::NONE
                }
                Some(b'"') => {
                    self.last = b'"';
                    self.state = JsState::Quotes;
                    Emit::one(b'"')
                }
                Some(c) => {
                    self.last = c;
                    Emit::one(c)
                }
            },
        }
    }
}

/// Run `reader` through `filter` into `out`, including the end-of-stream symbol
pub fn pipe<R, W, F>(reader: R, out: &mut W, mut filter: F) -> io::Result<()>
where
    R: Read,
    W: Write + ?Sized,
    F: StreamFilter,
{
    for byte in BufReader::new(reader).bytes() {
        let emit = filter.feed(Some(byte?));
        if !emit.is_empty() {
            out.write_all(emit.as_bytes())?;
        }
    }
    out.write_all(filter.feed(None).as_bytes())
}

/// Filter an in-memory string
pub fn apply<F: StreamFilter>(input: &str, mut filter: F) -> String {
    let mut out = Vec::with_capacity(input.len() + 2);
    for &b in input.as_bytes() {
        out.extend_from_slice(filter.feed(Some(b)).as_bytes());
    }
    out.extend_from_slice(filter.feed(None).as_bytes());
    String::from_utf8_lossy(&out).into_owned()
}
