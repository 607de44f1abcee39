//! Line-oriented INI parser
//!
//! The parser reads one line at a time and classifies it as a comment, a
//! section header or a key line. Key lines are split into a key name and a
//! value; value extraction may pull further lines from the same reader for
//! quoted multiline values, backslash continuations and Python-style
//! indented continuations.
//!
//! Parsing is all-or-nothing: [`parse_reader`] works on a staged copy of the
//! registry and only commits it once the whole source parsed successfully.

use std::io::Read;
use std::sync::OnceLock;

use regex::Regex;
use tracing::trace;

use crate::error::{ParseError, Result};
use crate::options::{MIN_READER_BUFFER_SIZE, Options};
use crate::reader::LineReader;
use crate::registry::{DEFAULT_SECTION, Registry};

/// Key name standing for "next ordinal in this section"
const AUTO_INCREMENT_KEY: &str = "-";

const TRIPLE_QUOTE: &str = "\"\"\"";

static PYTHON_MULTILINE: OnceLock<Regex> = OnceLock::new();

fn python_multiline() -> &'static Regex {
    PYTHON_MULTILINE.get_or_init(|| Regex::new(r"^([\t\f ]+)(.*)").expect("valid pattern"))
}

/// Parses one source into `registry`
///
/// Keys declared before any section header go to the default section named
/// `""`. Input must be UTF-8 after an optional byte-order mark; a line that
/// is not fails with [`ParseError::InvalidUtf8`]. On error, `registry` is left
/// untouched.
pub fn parse_reader<R: Read>(reader: R, options: &Options, registry: &mut Registry) -> Result<()> {
    let capacity = options.reader_buffer_size.max(MIN_READER_BUFFER_SIZE);
    let mut staged = registry.clone();
    Parser::new(reader, options, capacity).run(&mut staged)?;
    *registry = staged;
    Ok(())
}

fn decode(bytes: &[u8], line: usize) -> std::result::Result<&str, ParseError> {
    std::str::from_utf8(bytes).map_err(|e| ParseError::InvalidUtf8 {
        line,
        offset: e.valid_up_to(),
    })
}

/// Comment lines collected until the next section or key claims them
#[derive(Debug, Default)]
struct CommentBuffer {
    text: String,
}

impl CommentBuffer {
    fn push(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Returns the trimmed content and empties the buffer
    fn drain(&mut self) -> String {
        let comment = self.text.trim().to_string();
        self.text.clear();
        comment
    }
}

/// Result of splitting a key line
#[derive(Debug, PartialEq, Eq)]
enum KeyName {
    /// No delimiter on the line
    NameOnly,
    /// Key name and the byte offset where the value starts
    Split { name: String, offset: usize },
}

/// Quote styles for key names and values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    Triple,
    Backtick,
    Double,
}

impl Quote {
    fn as_str(self) -> &'static str {
        match self {
            Quote::Triple => TRIPLE_QUOTE,
            Quote::Backtick => "`",
            Quote::Double => "\"",
        }
    }
}

/// Returns the text from the first `#` or `;` onwards
fn find_comment(text: &str) -> Option<&str> {
    text.find(['#', ';']).map(|i| &text[i..])
}

/// Byte index of the first `#` or `;` not preceded by a backslash
fn find_unescaped_comment(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    bytes
        .iter()
        .enumerate()
        .find(|&(i, &b)| (b == b'#' || b == b';') && (i == 0 || bytes[i - 1] != b'\\'))
        .map(|(i, _)| i)
}

/// True if `text` starts and ends with `quote` and contains it nowhere else
pub(crate) fn has_surrounded_quote(text: &str, quote: char) -> bool {
    text.len() >= 2
        && text.starts_with(quote)
        && text.ends_with(quote)
        && text[1..].find(quote) == Some(text.len() - 2)
}

/// Splits a key line into key name and value offset
///
/// `line` must be non-empty and left-trimmed.
fn read_key_name(delimiters: &str, line: &str, line_number: usize) -> Result<KeyName, ParseError> {
    let is_delimiter = |c: char| delimiters.contains(c);

    let quote = if line.starts_with('"') {
        if line.len() > 6 && line.starts_with(TRIPLE_QUOTE) {
            Some(Quote::Triple)
        } else {
            Some(Quote::Double)
        }
    } else if line.starts_with('`') {
        Some(Quote::Backtick)
    } else {
        None
    };

    if let Some(quote) = quote {
        let quote = quote.as_str();
        let start = quote.len();
        let close = line[start..]
            .find(quote)
            .map(|pos| pos + start)
            .ok_or_else(|| ParseError::MissingKeyQuote {
                line: line_number,
                text: line.trim_end().to_string(),
            })?;

        let after = close + quote.len();
        return Ok(match line[after..].char_indices().find(|&(_, c)| is_delimiter(c)) {
            None => KeyName::NameOnly,
            Some((i, c)) => KeyName::Split {
                name: line[start..close].trim().to_string(),
                offset: after + i + c.len_utf8(),
            },
        });
    }

    match line.char_indices().find(|&(_, c)| is_delimiter(c)) {
        None => Ok(KeyName::NameOnly),
        Some((0, _)) => Err(ParseError::EmptyKeyName {
            line: line_number,
            text: line.trim_end().to_string(),
        }),
        Some((i, c)) => Ok(KeyName::Split {
            name: line[..i].trim().to_string(),
            offset: i + c.len_utf8(),
        }),
    }
}

struct Parser<'a, R> {
    options: &'a Options,
    reader: LineReader<R>,
    eof: bool,
    line: usize,
    ordinal: usize,
    comment: CommentBuffer,
}

impl<'a, R: Read> Parser<'a, R> {
    fn new(reader: R, options: &'a Options, capacity: usize) -> Self {
        Self {
            options,
            reader: LineReader::with_capacity(capacity, reader),
            eof: false,
            line: 0,
            ordinal: 1,
            comment: CommentBuffer::default(),
        }
    }

    fn read_line(&mut self) -> Result<String> {
        let (bytes, eof) = self.reader.read_line()?;
        if eof {
            self.eof = true;
        }
        self.line += 1;
        Ok(decode(&bytes, self.line)?.to_string())
    }

    fn run(mut self, registry: &mut Registry) -> Result<()> {
        if let Some(bom) = self.reader.skip_bom()? {
            trace!("skipped {:?} byte-order mark", bom);
        }

        let mut section = DEFAULT_SECTION.to_string();
        registry.new_section(&section);

        while !self.eof {
            let raw = self.read_line()?;
            let line = raw.trim_start();
            if line.is_empty() {
                continue;
            }

            if line.starts_with(['#', ';']) {
                // Line breaks are kept so consecutive comment lines stay separated
                self.comment.push(line);
                continue;
            }

            if line.starts_with('[') {
                section = self.read_section_header(line, registry)?;
                continue;
            }

            self.read_key_line(line, &section, registry)?;
        }

        Ok(())
    }

    fn read_section_header(&mut self, line: &str, registry: &mut Registry) -> Result<String> {
        let close = line.rfind(']').ok_or_else(|| ParseError::UnclosedSection {
            line: self.line,
            text: line.trim_end().to_string(),
        })?;

        let name = self.options.section_name(&line[1..close]).into_owned();
        trace!(line = self.line, "section {:?}", name);

        if let Some(comment) = find_comment(&line[close + 1..]) {
            self.comment.push(comment);
        }

        registry.new_section(&name).comment = self.comment.drain();
        self.ordinal = 1;
        Ok(name)
    }

    fn read_key_line(&mut self, line: &str, section: &str, registry: &mut Registry) -> Result<()> {
        match read_key_name(&self.options.key_value_delimiters, line, self.line)? {
            KeyName::NameOnly => {
                if !self.options.allow_boolean_keys {
                    return Err(ParseError::MissingDelimiter {
                        line: self.line,
                        text: line.trim_end().to_string(),
                    }
                    .into());
                }

                let name = self.read_value(line)?;
                let name = self.options.key_name(&name).into_owned();
                trace!(line = self.line, "boolean key {:?}", name);

                let key = registry.new_section(section).new_boolean_key(&name);
                key.comment = self.comment.drain();
            }
            KeyName::Split { name, offset } => {
                let auto_increment = name == AUTO_INCREMENT_KEY;
                let name = if auto_increment {
                    let generated = format!("#{}", self.ordinal);
                    self.ordinal += 1;
                    generated
                } else {
                    self.options.key_name(&name).into_owned()
                };

                let value = self.read_value(&line[offset..])?;
                trace!(line = self.line, "key {:?} = {:?}", name, value);

                let key = registry.new_section(section).new_key(&name, value);
                key.auto_increment = auto_increment;
                key.comment = self.comment.drain();
            }
        }
        Ok(())
    }

    /// Extracts a value starting at `input`, reading more lines when needed
    fn read_value(&mut self, input: &str) -> Result<String> {
        let options = self.options;
        let line = input.trim_start();
        if line.is_empty() {
            if options.allow_python_multiline_values && input.ends_with('\n') {
                return self.read_python_multilines(String::new());
            }
            return Ok(String::new());
        }

        let quote = if line.len() > 3 && line.starts_with(TRIPLE_QUOTE) {
            Some(Quote::Triple)
        } else if line.starts_with('`') {
            Some(Quote::Backtick)
        } else if options.unescape_value_double_quotes && line.starts_with('"') {
            Some(Quote::Double)
        } else {
            None
        };

        if let Some(quote) = quote {
            let start = quote.as_str().len();
            return match line[start..].rfind(quote.as_str()) {
                None => self.read_multilines(line, line[start..].to_string(), quote),
                Some(pos) => {
                    let inner = &line[start..start + pos];
                    if quote == Quote::Double {
                        Ok(inner.replace("\\\"", "\""))
                    } else {
                        Ok(inner.to_string())
                    }
                }
            };
        }

        let last_char = line.chars().last();
        let mut value = line.trim().to_string();

        if !options.ignore_continuation && value.ends_with('\\') {
            value.pop();
            return self.read_continuation_lines(value);
        }

        if !options.ignore_inline_comment {
            let marker = if options.space_before_inline_comment {
                value.find(" #").or_else(|| value.find(" ;"))
            } else {
                find_unescaped_comment(&value)
            };

            if let Some(i) = marker {
                self.comment.push(&value[i..]);
                value = value[..i].trim().to_string();
            }
        }

        if !options.preserve_surrounded_quote
            && (has_surrounded_quote(&value, '\'') || has_surrounded_quote(&value, '"'))
        {
            value = value[1..value.len() - 1].to_string();
        } else if options.unescape_value_comment_symbols {
            value = value.replace("\\;", ";").replace("\\#", "#");
        } else if options.allow_python_multiline_values && last_char == Some('\n') {
            return self.read_python_multilines(value);
        }

        Ok(value)
    }

    /// Appends whole lines until one contains the closing `quote`
    fn read_multilines(&mut self, first: &str, mut value: String, quote: Quote) -> Result<String> {
        let quote = quote.as_str();
        loop {
            let next = self.read_line()?;
            if let Some(pos) = next.rfind(quote) {
                value.push_str(&next[..pos]);
                if let Some(comment) = find_comment(&next[pos..]) {
                    self.comment.push(comment.trim());
                }
                return Ok(value);
            }

            value.push_str(&next);
            if self.eof {
                return Err(ParseError::MissingValueQuote {
                    line: self.line,
                    start: first.trim_end().to_string(),
                }
                .into());
            }
        }
    }

    /// Joins following trimmed lines while they end in a backslash
    fn read_continuation_lines(&mut self, mut value: String) -> Result<String> {
        loop {
            let next = self.read_line()?;
            let next = next.trim();
            if next.is_empty() {
                break;
            }

            value.push_str(next);
            if !value.ends_with('\\') {
                break;
            }
            value.pop();
        }
        Ok(value)
    }

    /// Appends following lines that are indented, without consuming the
    /// first line that is not
    fn read_python_multilines(&mut self, mut value: String) -> Result<String> {
        let options = self.options;
        let capacity = self.reader.capacity();
        let peeked = self.reader.peek(capacity)?.to_vec();
        let mut rest = &peeked[..];

        loop {
            let len = rest
                .iter()
                .position(|&b| b == b'\n')
                .map_or(rest.len(), |i| i + 1);
            let candidate = match std::str::from_utf8(&rest[..len]) {
                Ok(text) => text,
                // Peek window ends inside a character; the line is read normally later
                Err(e) if e.error_len().is_none() => return Ok(value),
                Err(e) => {
                    return Err(ParseError::InvalidUtf8 {
                        line: self.line + 1,
                        offset: e.valid_up_to(),
                    }
                    .into());
                }
            };
            rest = &rest[len..];

            options.emit_debug(format_args!("read_python_multilines: parsing {:?}", candidate));

            let Some(captures) = python_multiline().captures(&candidate) else {
                options.emit_debug(format_args!(
                    "read_python_multilines: end of value, got: {:?}",
                    value
                ));
                return Ok(value);
            };

            options.emit_debug(format_args!(
                "read_python_multilines: matched {} parts",
                captures.len()
            ));
            for (n, part) in captures.iter().enumerate() {
                let part = part.map_or("", |m| m.as_str());
                options.emit_debug(format_args!("   {}: {:?}", n, part));
            }

            // Keep the real cursor in step with the peeked lines
            self.reader.consume(len);
            self.line += 1;

            value.push('\n');
            value.push_str(&captures[0]);
        }
    }
}
