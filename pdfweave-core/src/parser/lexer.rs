//! PDF Lexer
//!
//! Tokenizes PDF syntax according to ISO 32000-1 Section 7.2. The lexer works
//! over a shared in-memory byte source and supports arbitrary seeking, which
//! the xref recovery paths rely on to re-scan the same range several times.

use super::{ParseError, ParseResult};
use std::sync::Arc;

/// PDF Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Boolean: true or false
    Boolean(bool),

    /// Integer number
    Integer(i64),

    /// Real number
    Real(f64),

    /// Literal string `( ... )`
    String(Vec<u8>),

    /// Hexadecimal string `< ... >`
    HexString(Vec<u8>),

    /// Name object (e.g., /Type)
    Name(String),

    /// Left square bracket [
    ArrayStart,

    /// Right square bracket ]
    ArrayEnd,

    /// Dictionary start <<
    DictStart,

    /// Dictionary end >>
    DictEnd,

    Stream,
    EndStream,
    Obj,
    EndObj,
    StartXRef,
    Xref,
    Trailer,

    /// The bare `R` keyword
    R,

    /// Reference (e.g., 1 0 R), only produced by [`Lexer::next_valid_token`]
    Reference(u32, u16),

    /// Null object
    Null,

    /// Comment (usually ignored)
    Comment(Vec<u8>),

    /// Any other bare word, such as the `n`/`f` flags of xref entries
    Keyword(String),

    /// End of file
    Eof,
}

impl Token {
    /// True for strings written in `< ... >` form
    pub fn is_hex_string(&self) -> bool {
        matches!(self, Token::HexString(_))
    }
}

/// PDF whitespace per ISO 32000-1 Table 1.
pub(crate) fn is_whitespace(ch: u8) -> bool {
    matches!(ch, 0 | b'\t' | b'\n' | 0x0C | b'\r' | b' ')
}

pub(crate) fn is_delimiter(ch: u8) -> bool {
    matches!(
        ch,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// PDF Lexer for tokenizing PDF content
#[derive(Debug, Clone)]
pub struct Lexer {
    data: Arc<[u8]>,
    position: usize,
}

impl Lexer {
    /// Create a new lexer over a byte source
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: data.into(),
            position: 0,
        }
    }

    /// Current cursor position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Move the cursor; positions past the end are clamped to the end.
    pub fn seek(&mut self, position: usize) {
        self.position = position.min(self.data.len());
    }

    /// Total length of the byte source
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Step the cursor back over the last consumed byte.
    pub fn back_one_position(&mut self) {
        self.position = self.position.saturating_sub(1);
    }

    /// The underlying byte source
    pub fn data(&self) -> &Arc<[u8]> {
        &self.data
    }

    /// A bounded slice of the source; out-of-range requests are clamped.
    pub fn slice(&self, start: usize, len: usize) -> &[u8] {
        let start = start.min(self.data.len());
        let end = start.saturating_add(len).min(self.data.len());
        &self.data[start..end]
    }

    /// Read one byte and advance
    pub fn read_byte(&mut self) -> Option<u8> {
        let ch = self.data.get(self.position).copied();
        if ch.is_some() {
            self.position += 1;
        }
        ch
    }

    /// Read up to `count` bytes from the cursor
    pub fn read_bytes(&mut self, count: usize) -> Vec<u8> {
        let bytes = self.slice(self.position, count).to_vec();
        self.position += bytes.len();
        bytes
    }

    /// Get the next token
    pub fn next_token(&mut self) -> ParseResult<Token> {
        self.skip_whitespace();

        let ch = match self.peek_char() {
            Some(ch) => ch,
            None => return Ok(Token::Eof),
        };

        match ch {
            b'%' => Ok(self.read_comment()),
            b'/' => self.read_name(),
            b'(' => self.read_literal_string(),
            b'<' => self.read_angle_bracket(),
            b'>' => {
                self.consume_char();
                if self.peek_char() == Some(b'>') {
                    self.consume_char();
                    Ok(Token::DictEnd)
                } else {
                    Err(self.syntax_error("Expected '>' after '>'"))
                }
            }
            b'[' => {
                self.consume_char();
                Ok(Token::ArrayStart)
            }
            b']' => {
                self.consume_char();
                Ok(Token::ArrayEnd)
            }
            b'+' | b'-' | b'0'..=b'9' | b'.' => self.read_number(),
            _ if is_delimiter(ch) => {
                self.consume_char();
                Err(self.syntax_error(&format!("Unexpected character: {}", ch as char)))
            }
            _ => Ok(self.read_keyword()),
        }
    }

    /// Like [`Lexer::next_token`] but skips comments and folds `num gen R`
    /// into a single [`Token::Reference`].
    pub fn next_valid_token(&mut self) -> ParseResult<Token> {
        let token = self.next_non_comment()?;

        let Token::Integer(num) = token else {
            return Ok(token);
        };
        if num < 0 || num > u32::MAX as i64 {
            return Ok(token);
        }

        let after_num = self.position;
        if let Ok(Token::Integer(gen)) = self.next_non_comment() {
            if (0..=u16::MAX as i64).contains(&gen) {
                if let Ok(Token::R) = self.next_non_comment() {
                    return Ok(Token::Reference(num as u32, gen as u16));
                }
            }
        }
        self.position = after_num;
        Ok(Token::Integer(num))
    }

    fn next_non_comment(&mut self) -> ParseResult<Token> {
        loop {
            match self.next_token()? {
                Token::Comment(_) => continue,
                token => return Ok(token),
            }
        }
    }

    /// Expect a specific keyword token
    pub fn expect_token(&mut self, expected: Token) -> ParseResult<()> {
        let token = self.next_valid_token()?;
        if token == expected {
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken {
                expected: format!("{expected:?}"),
                found: format!("{token:?}"),
            })
        }
    }

    /// Read one line segment into `buffer`, skipping leading whitespace.
    ///
    /// When `null_is_whitespace` is false a NUL byte is kept as line content.
    /// Returns `false` once the source is exhausted before any byte is read.
    pub fn read_line(&mut self, buffer: &mut Vec<u8>, null_is_whitespace: bool) -> bool {
        buffer.clear();
        let mut ch = self.read_byte();
        while let Some(c) = ch {
            let skip = if null_is_whitespace {
                is_whitespace(c)
            } else {
                c != 0 && is_whitespace(c)
            };
            if !skip {
                break;
            }
            ch = self.read_byte();
        }

        let Some(first) = ch else {
            return false;
        };

        let mut current = Some(first);
        while let Some(c) = current {
            match c {
                b'\n' => break,
                b'\r' => {
                    if self.peek_char() == Some(b'\n') {
                        self.consume_char();
                    }
                    break;
                }
                _ => buffer.push(c),
            }
            current = self.read_byte();
        }
        true
    }

    /// Byte offset of the last `startxref` keyword in the source
    pub fn find_startxref(&self) -> ParseResult<usize> {
        const KEYWORD: &[u8] = b"startxref";
        self.data
            .windows(KEYWORD.len())
            .rposition(|window| window == KEYWORD)
            .ok_or_else(|| ParseError::InvalidXRef("startxref not found".to_string()))
    }

    /// Peek at the next character without consuming it
    fn peek_char(&self) -> Option<u8> {
        self.data.get(self.position).copied()
    }

    /// Consume the next character
    fn consume_char(&mut self) -> Option<u8> {
        self.read_byte()
    }

    /// Skip whitespace and return the number of bytes skipped
    pub(crate) fn skip_whitespace(&mut self) -> usize {
        let mut count = 0;
        while let Some(ch) = self.peek_char() {
            if !is_whitespace(ch) {
                break;
            }
            self.consume_char();
            count += 1;
        }
        count
    }

    /// Read a comment (from % to end of line)
    fn read_comment(&mut self) -> Token {
        self.consume_char(); // consume '%'
        let mut comment = Vec::new();

        while let Some(ch) = self.peek_char() {
            if ch == b'\n' || ch == b'\r' {
                break;
            }
            self.consume_char();
            comment.push(ch);
        }

        Token::Comment(comment)
    }

    /// Read a name object (e.g., /Type)
    fn read_name(&mut self) -> ParseResult<Token> {
        self.consume_char(); // consume '/'
        let mut name = Vec::new();

        while let Some(ch) = self.peek_char() {
            if is_whitespace(ch) || is_delimiter(ch) {
                break;
            }
            self.consume_char();

            // Handle hex codes in names (e.g., /A#20B means /A B)
            if ch == b'#' {
                let hex = self.slice(self.position, 2);
                let decoded = if hex.len() == 2 && hex.iter().all(u8::is_ascii_hexdigit) {
                    Some((hex_value(hex[0]) << 4) | hex_value(hex[1]))
                } else {
                    None
                };
                match decoded {
                    Some(value) => {
                        self.position += 2;
                        name.push(value);
                    }
                    None => name.push(ch),
                }
            } else {
                name.push(ch);
            }
        }

        Ok(Token::Name(String::from_utf8_lossy(&name).into_owned()))
    }

    /// Read a literal string (parentheses)
    fn read_literal_string(&mut self) -> ParseResult<Token> {
        self.consume_char(); // consume '('
        let mut string = Vec::new();
        let mut paren_depth = 1;
        let mut escape = false;

        while paren_depth > 0 {
            let ch = self
                .consume_char()
                .ok_or_else(|| self.syntax_error("Unterminated string"))?;

            if escape {
                escape = false;
                let escaped = match ch {
                    b'n' => b'\n',
                    b'r' => b'\r',
                    b't' => b'\t',
                    b'b' => b'\x08',
                    b'f' => b'\x0C',
                    b'(' => b'(',
                    b')' => b')',
                    b'\\' => b'\\',
                    b'\r' => {
                        // Line continuation
                        if self.peek_char() == Some(b'\n') {
                            self.consume_char();
                        }
                        continue;
                    }
                    b'\n' => continue,
                    b'0'..=b'7' => {
                        // Octal escape sequence
                        let mut value = (ch - b'0') as u16;
                        for _ in 0..2 {
                            match self.peek_char() {
                                Some(next @ b'0'..=b'7') => {
                                    self.consume_char();
                                    value = value * 8 + (next - b'0') as u16;
                                }
                                _ => break,
                            }
                        }
                        value as u8
                    }
                    _ => ch, // Unknown escape, use literal
                };
                string.push(escaped);
            } else {
                match ch {
                    b'\\' => escape = true,
                    b'(' => {
                        string.push(ch);
                        paren_depth += 1;
                    }
                    b')' => {
                        paren_depth -= 1;
                        if paren_depth > 0 {
                            string.push(ch);
                        }
                    }
                    _ => string.push(ch),
                }
            }
        }

        Ok(Token::String(string))
    }

    /// Read angle bracket tokens (hex strings or dict markers)
    fn read_angle_bracket(&mut self) -> ParseResult<Token> {
        self.consume_char(); // consume '<'

        if self.peek_char() == Some(b'<') {
            self.consume_char();
            return Ok(Token::DictStart);
        }

        let mut digits = Vec::new();
        loop {
            let ch = self
                .consume_char()
                .ok_or_else(|| self.syntax_error("Unterminated hex string"))?;
            match ch {
                b'>' => break,
                _ if ch.is_ascii_hexdigit() => digits.push(ch),
                _ if is_whitespace(ch) => {}
                _ => return Err(self.syntax_error("Invalid character in hex string")),
            }
        }

        // Pad with 0 if odd number of digits
        if digits.len() % 2 != 0 {
            digits.push(b'0');
        }

        let bytes = digits
            .chunks(2)
            .map(|pair| (hex_value(pair[0]) << 4) | hex_value(pair[1]))
            .collect();
        Ok(Token::HexString(bytes))
    }

    /// Read a number (integer or real)
    fn read_number(&mut self) -> ParseResult<Token> {
        let start = self.position;
        let mut number_str = String::new();
        let mut has_dot = false;

        if let Some(ch @ (b'+' | b'-')) = self.peek_char() {
            self.consume_char();
            number_str.push(ch as char);
            // Producers sometimes emit "--5"; treat repeated signs as one
            while let Some(b'-' | b'+') = self.peek_char() {
                self.consume_char();
            }
        }

        while let Some(ch) = self.peek_char() {
            match ch {
                b'0'..=b'9' => {
                    self.consume_char();
                    number_str.push(ch as char);
                }
                b'.' if !has_dot => {
                    self.consume_char();
                    number_str.push(ch as char);
                    has_dot = true;
                }
                _ => break,
            }
        }

        let digits = number_str.trim_start_matches(['+', '-']);
        if digits.is_empty() || digits == "." {
            return Err(ParseError::SyntaxError {
                position: start,
                message: format!("Invalid number: '{number_str}'"),
            });
        }

        if has_dot {
            let value = number_str
                .parse::<f64>()
                .map_err(|_| ParseError::SyntaxError {
                    position: start,
                    message: format!("Invalid real number: '{number_str}'"),
                })?;
            Ok(Token::Real(value))
        } else {
            match number_str.parse::<i64>() {
                Ok(value) => Ok(Token::Integer(value)),
                // Out of range integers degrade to reals
                Err(_) => number_str
                    .parse::<f64>()
                    .map(Token::Real)
                    .map_err(|_| ParseError::SyntaxError {
                        position: start,
                        message: format!("Invalid integer: '{number_str}'"),
                    }),
            }
        }
    }

    /// Read a keyword
    fn read_keyword(&mut self) -> Token {
        let word = self.read_word();
        process_keyword(word)
    }

    /// Read a word (sequence of non-delimiter characters)
    fn read_word(&mut self) -> String {
        let start = self.position;
        while let Some(ch) = self.peek_char() {
            if is_whitespace(ch) || is_delimiter(ch) {
                break;
            }
            self.consume_char();
        }
        String::from_utf8_lossy(&self.data[start..self.position]).into_owned()
    }

    fn syntax_error(&self, message: &str) -> ParseError {
        ParseError::SyntaxError {
            position: self.position,
            message: message.to_string(),
        }
    }
}

/// Process a word as a keyword
fn process_keyword(word: String) -> Token {
    match word.as_str() {
        "true" => Token::Boolean(true),
        "false" => Token::Boolean(false),
        "null" => Token::Null,
        "stream" => Token::Stream,
        "endstream" => Token::EndStream,
        "obj" => Token::Obj,
        "endobj" => Token::EndObj,
        "startxref" => Token::StartXRef,
        "xref" => Token::Xref,
        "trailer" => Token::Trailer,
        "R" => Token::R,
        _ => Token::Keyword(word),
    }
}

fn hex_value(ch: u8) -> u8 {
    match ch {
        b'0'..=b'9' => ch - b'0',
        b'a'..=b'f' => ch - b'a' + 10,
        b'A'..=b'F' => ch - b'A' + 10,
        _ => 0,
    }
}

/// Recognise an `num gen obj` object header at the start of `line`.
pub(crate) fn check_object_start(line: &[u8]) -> Option<(u32, u16)> {
    let mut lexer = Lexer::new(line.to_vec());
    let num = match lexer.next_token().ok()? {
        Token::Integer(n) if (0..=u32::MAX as i64).contains(&n) => n as u32,
        _ => return None,
    };
    let gen = match lexer.next_token().ok()? {
        Token::Integer(g) if (0..=u16::MAX as i64).contains(&g) => g as u16,
        _ => return None,
    };
    match lexer.next_token().ok()? {
        Token::Obj => Some((num, gen)),
        _ => None,
    }
}
