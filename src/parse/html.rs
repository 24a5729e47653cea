// src/parse/html.rs
// =============================================================================
// Streaming reference extraction from HTML.
//
// The extractor is a byte-at-a-time state machine. Between two calls to
// feed() it keeps only its current state plus small lookback buffers (the
// `<!` keyword read so far, the tag name, the attribute name and the
// attribute value being collected). That is enough to resume at any byte
// boundary, so a page can be fed straight from the socket.
//
// Constructs it understands:
// - text
// - <!DOCTYPE ...> with quoted literals and an internal [ ... ] subset
// - <!-- ... -->, tracking runs of '-' to spot the terminator
// - <? ... ?>
// - <![CDATA[ ... ]]>, tracking runs of ']'
// - </name ...> closing tags
// - other <! ... > declarations, skipped up to '>'
// - opening tags with quoted, unquoted and bare attributes
// - the raw-text bodies of <script> and <style>
//
// Values of URL-bearing attributes on opening tags are yielded with HTML
// entities decoded and surrounding whitespace trimmed. Nothing is an error:
// a construct left open at the end of a feed just stays open.
// =============================================================================

// Attributes whose value is a reference to another resource
const URL_ATTRIBUTES: [&[u8]; 8] = [
    b"href",
    b"src",
    b"action",
    b"cite",
    b"poster",
    b"background",
    b"formaction",
    b"data",
];

// Elements whose content is not markup
const RAW_TEXT_ELEMENTS: [&[u8]; 2] = [b"script", b"style"];

pub const DEFAULT_MAX_REFERENCE_LEN: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlState {
    Text,
    /// After `<`
    TagOpen,
    /// After `<!`, matching `--`, `[CDATA[` or `DOCTYPE`
    MarkupDeclaration,
    /// `<!` followed by something unknown; runs to `>`
    BogusDeclaration,

    Doctype,
    DoctypeDoubleQuoted,
    DoctypeSingleQuoted,
    DoctypeSubset,
    DoctypeSubsetDoubleQuoted,
    DoctypeSubsetSingleQuoted,
    DoctypeAfterSubset,

    Comment,
    CommentDash,
    CommentDashDash,

    ProcessingInstruction,
    ProcessingInstructionQuestion,

    CData,
    CDataBracket,
    CDataBracketBracket,

    /// After `</`
    ClosingTag,
    ClosingTagName,

    TagName,
    BeforeAttributeName,
    AttributeName,
    AfterAttributeName,
    BeforeAttributeValue,
    AttributeValueDoubleQuoted,
    AttributeValueSingleQuoted,
    AttributeValueUnquoted,

    /// Inside `<script>` or `<style>`
    RawText,
    RawTextLessThan,
    RawTextEndTagName,
}

// A fixed-size buffer remembering the first N bytes pushed into it
#[derive(Debug, Clone, Copy)]
struct Lookback<const N: usize> {
    bytes: [u8; N],
    len: usize,
    overflowed: bool,
}

impl<const N: usize> Lookback<N> {
    const fn new() -> Self {
        Self {
            bytes: [0; N],
            len: 0,
            overflowed: false,
        }
    }

    fn clear(&mut self) {
        self.len = 0;
        self.overflowed = false;
    }

    fn push(&mut self, byte: u8) {
        if self.len < N {
            self.bytes[self.len] = byte;
            self.len += 1;
        } else {
            self.overflowed = true;
        }
    }

    fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    fn is(&self, other: &[u8]) -> bool {
        !self.overflowed && self.as_slice() == other
    }
}

// What the `<!` keyword read so far turns out to be
enum Declaration {
    Partial,
    Comment,
    CData,
    Doctype,
    Unknown,
}

fn classify_declaration(seen: &[u8]) -> Declaration {
    const COMMENT: &[u8] = b"--";
    const CDATA: &[u8] = b"[CDATA[";
    const DOCTYPE: &[u8] = b"DOCTYPE";

    if seen == COMMENT {
        Declaration::Comment
    } else if seen == CDATA {
        Declaration::CData
    } else if seen.eq_ignore_ascii_case(DOCTYPE) {
        Declaration::Doctype
    } else if COMMENT.starts_with(seen)
        || CDATA.starts_with(seen)
        || DOCTYPE[..seen.len().min(DOCTYPE.len())].eq_ignore_ascii_case(seen)
    {
        Declaration::Partial
    } else {
        Declaration::Unknown
    }
}

fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | 0x0c)
}

pub struct HtmlReferenceExtractor {
    state: HtmlState,
    keyword: Lookback<7>,
    tag: Lookback<8>,
    attribute: Lookback<16>,
    // End tag name that closes the current raw-text element
    raw_end: &'static [u8],
    value: Vec<u8>,
    capturing: bool,
    value_overflowed: bool,
    max_reference_len: usize,
}

impl HtmlReferenceExtractor {
    pub fn new(max_reference_len: usize) -> Self {
        Self {
            state: HtmlState::Text,
            keyword: Lookback::new(),
            tag: Lookback::new(),
            attribute: Lookback::new(),
            raw_end: b"",
            value: Vec::new(),
            capturing: false,
            value_overflowed: false,
            max_reference_len: max_reference_len.max(1),
        }
    }

    pub fn state(&self) -> HtmlState {
        self.state
    }

    /// Forgets everything and starts over in the text state.
    pub fn reset(&mut self) {
        self.state = HtmlState::Text;
        self.keyword.clear();
        self.tag.clear();
        self.attribute.clear();
        self.raw_end = b"";
        self.value.clear();
        self.capturing = false;
        self.value_overflowed = false;
    }

    /// Feeds the next piece of the document.
    ///
    /// The returned iterator yields references as they complete. Dropping it
    /// early still consumes the rest of `input`, discarding its references,
    /// so the next feed continues from the right state.
    pub fn feed<'e, 'i>(&'e mut self, input: &'i [u8]) -> References<'e, 'i> {
        References {
            extractor: self,
            input,
            position: 0,
        }
    }

    // Advances one byte; returns a reference if this byte completed one
    fn step(&mut self, byte: u8) -> Option<String> {
        use HtmlState::*;

        match self.state {
            Text => {
                if byte == b'<' {
                    self.state = TagOpen;
                }
            }

            TagOpen => match byte {
                b'!' => {
                    self.keyword.clear();
                    self.state = MarkupDeclaration;
                }
                b'?' => self.state = ProcessingInstruction,
                b'/' => self.state = ClosingTag,
                b'<' => {}
                b if b.is_ascii_alphabetic() => {
                    self.tag.clear();
                    self.tag.push(b.to_ascii_lowercase());
                    self.state = TagName;
                }
                _ => self.state = Text,
            },

            MarkupDeclaration => {
                if byte == b'>' {
                    self.state = Text;
                    return None;
                }
                self.keyword.push(byte);
                self.state = match classify_declaration(self.keyword.as_slice()) {
                    Declaration::Partial => MarkupDeclaration,
                    Declaration::Comment => Comment,
                    Declaration::CData => CData,
                    Declaration::Doctype => Doctype,
                    Declaration::Unknown => BogusDeclaration,
                };
            }

            BogusDeclaration | ClosingTag | ClosingTagName => {
                if byte == b'>' {
                    self.state = Text;
                } else if self.state == ClosingTag && byte.is_ascii_alphabetic() {
                    self.state = ClosingTagName;
                }
            }

            Doctype => match byte {
                b'>' => self.state = Text,
                b'"' => self.state = DoctypeDoubleQuoted,
                b'\'' => self.state = DoctypeSingleQuoted,
                b'[' => self.state = DoctypeSubset,
                _ => {}
            },
            DoctypeDoubleQuoted => {
                if byte == b'"' {
                    self.state = Doctype;
                }
            }
            DoctypeSingleQuoted => {
                if byte == b'\'' {
                    self.state = Doctype;
                }
            }
            DoctypeSubset => match byte {
                b']' => self.state = DoctypeAfterSubset,
                b'"' => self.state = DoctypeSubsetDoubleQuoted,
                b'\'' => self.state = DoctypeSubsetSingleQuoted,
                _ => {}
            },
            DoctypeSubsetDoubleQuoted => {
                if byte == b'"' {
                    self.state = DoctypeSubset;
                }
            }
            DoctypeSubsetSingleQuoted => {
                if byte == b'\'' {
                    self.state = DoctypeSubset;
                }
            }
            DoctypeAfterSubset => {
                if byte == b'>' {
                    self.state = Text;
                }
            }

            Comment => {
                if byte == b'-' {
                    self.state = CommentDash;
                }
            }
            CommentDash => {
                self.state = if byte == b'-' { CommentDashDash } else { Comment };
            }
            CommentDashDash => match byte {
                b'>' => self.state = Text,
                b'-' => {}
                _ => self.state = Comment,
            },

            ProcessingInstruction => {
                if byte == b'?' {
                    self.state = ProcessingInstructionQuestion;
                }
            }
            ProcessingInstructionQuestion => match byte {
                b'>' => self.state = Text,
                b'?' => {}
                _ => self.state = ProcessingInstruction,
            },

            CData => {
                if byte == b']' {
                    self.state = CDataBracket;
                }
            }
            CDataBracket => {
                self.state = if byte == b']' { CDataBracketBracket } else { CData };
            }
            CDataBracketBracket => match byte {
                b'>' => self.state = Text,
                b']' => {}
                _ => self.state = CData,
            },

            TagName => match byte {
                b'>' => self.end_opening_tag(),
                b'/' => self.state = BeforeAttributeName,
                b if is_space(b) => self.state = BeforeAttributeName,
                b => self.tag.push(b.to_ascii_lowercase()),
            },

            BeforeAttributeName => match byte {
                b'>' => self.end_opening_tag(),
                b'/' => {}
                b if is_space(b) => {}
                b => self.begin_attribute(b),
            },

            AttributeName => match byte {
                b'>' => self.end_opening_tag(),
                b'=' => self.state = BeforeAttributeValue,
                b'/' => self.state = BeforeAttributeName,
                b if is_space(b) => self.state = AfterAttributeName,
                b => self.attribute.push(b.to_ascii_lowercase()),
            },

            AfterAttributeName => match byte {
                b'>' => self.end_opening_tag(),
                b'=' => self.state = BeforeAttributeValue,
                b'/' => self.state = BeforeAttributeName,
                b if is_space(b) => {}
                b => self.begin_attribute(b),
            },

            BeforeAttributeValue => match byte {
                b'>' => self.end_opening_tag(),
                b'"' => self.begin_value(AttributeValueDoubleQuoted),
                b'\'' => self.begin_value(AttributeValueSingleQuoted),
                b if is_space(b) => {}
                b => {
                    self.begin_value(AttributeValueUnquoted);
                    self.push_value(b);
                }
            },

            AttributeValueDoubleQuoted | AttributeValueSingleQuoted => {
                let quote = if self.state == AttributeValueDoubleQuoted {
                    b'"'
                } else {
                    b'\''
                };
                if byte == quote {
                    self.state = BeforeAttributeName;
                    return self.finish_value();
                }
                self.push_value(byte);
            }

            AttributeValueUnquoted => match byte {
                b'>' => {
                    let reference = self.finish_value();
                    self.end_opening_tag();
                    return reference;
                }
                b if is_space(b) => {
                    self.state = BeforeAttributeName;
                    return self.finish_value();
                }
                b => self.push_value(b),
            },

            RawText => {
                if byte == b'<' {
                    self.state = RawTextLessThan;
                }
            }
            RawTextLessThan => match byte {
                b'/' => {
                    self.tag.clear();
                    self.state = RawTextEndTagName;
                }
                b'<' => {}
                _ => self.state = RawText,
            },
            RawTextEndTagName => {
                if byte.is_ascii_alphabetic() {
                    self.tag.push(byte.to_ascii_lowercase());
                } else if self.tag.is(self.raw_end) {
                    self.state = if byte == b'>' { Text } else { ClosingTagName };
                } else {
                    self.state = if byte == b'<' { RawTextLessThan } else { RawText };
                }
            }
        }

        None
    }

    fn begin_attribute(&mut self, first: u8) {
        self.attribute.clear();
        self.attribute.push(first.to_ascii_lowercase());
        self.state = HtmlState::AttributeName;
    }

    fn begin_value(&mut self, state: HtmlState) {
        self.value.clear();
        self.value_overflowed = false;
        self.capturing = URL_ATTRIBUTES.iter().any(|name| self.attribute.is(name));
        self.state = state;
    }

    fn push_value(&mut self, byte: u8) {
        if !self.capturing {
            return;
        }
        if self.value.len() < self.max_reference_len {
            self.value.push(byte);
        } else {
            self.value_overflowed = true;
        }
    }

    fn finish_value(&mut self) -> Option<String> {
        let captured = std::mem::replace(&mut self.capturing, false);
        if !captured || self.value_overflowed {
            return None;
        }

        let raw = String::from_utf8_lossy(&self.value);
        let decoded = html_escape::decode_html_entities(&raw);
        let trimmed = decoded.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    fn end_opening_tag(&mut self) {
        self.state = match RAW_TEXT_ELEMENTS.iter().find(|name| self.tag.is(name)) {
            Some(&name) => {
                self.raw_end = name;
                HtmlState::RawText
            }
            None => HtmlState::Text,
        };
    }
}

impl Default for HtmlReferenceExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REFERENCE_LEN)
    }
}

/// References completed by one call to [`HtmlReferenceExtractor::feed`].
pub struct References<'e, 'i> {
    extractor: &'e mut HtmlReferenceExtractor,
    input: &'i [u8],
    position: usize,
}

impl Iterator for References<'_, '_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while let Some(&byte) = self.input.get(self.position) {
            self.position += 1;
            if let Some(reference) = self.extractor.step(byte) {
                return Some(reference);
            }
        }
        None
    }
}

impl Drop for References<'_, '_> {
    fn drop(&mut self) {
        for &byte in &self.input[self.position..] {
            let _ = self.extractor.step(byte);
        }
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What is a state machine parser?
//    - The extractor looks at one byte at a time
//    - `state` remembers where we are (inside a tag, a comment, a quote...)
//    - Each byte either stays in the state or moves to another one
//
// 2. Why not parse the whole document at once?
//    - Pages arrive in pieces from the socket
//    - Keeping only the state between pieces means memory does not grow
//      with the page size
//
// 3. What are the two lifetimes on References<'e, 'i>?
//    - 'e borrows the extractor mutably while we iterate
//    - 'i borrows the input slice we were fed
//    - The compiler stops you from feeding again before the iterator is gone
//
// 4. Why implement Drop for References?
//    - If a caller stops iterating early, the rest of the input must still
//      go through step(), or the next feed would start in the wrong state
//
// 5. What is Lookback<const N: usize>?
//    - A fixed-size array that remembers the last few bytes of a name
//    - const generics let one type serve 7-, 8- and 16-byte buffers
// -----------------------------------------------------------------------------
