use crate::token::{Token, TokenKind};

/// Streaming tokenizer for `.ds` source text.
///
/// Whitespace is discarded; comments come back as ordinary tokens so the
/// parser can attach them to the following declaration. A `-` is
/// classified as unary or binary by looking at the previously emitted
/// non-comment token.
pub struct Lexer {
    source: Vec<char>,
    cur: String,
    idx: usize,
    line: u32,
    col: u32,
    prev_kind: TokenKind,
}

const fn is_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

const fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

const fn is_whitespace(c: char) -> bool {
    matches!(c, '\r' | '\n' | ' ' | '\t')
}

const fn is_symbol(c: char) -> bool {
    matches!(
        c,
        '/' | '*'
            | '-'
            | '+'
            | '%'
            | '='
            | '<'
            | '>'
            | '.'
            | '('
            | ')'
            | '{'
            | '}'
            | '&'
            | '|'
            | '!'
            | ','
            | ';'
    )
}

impl Lexer {
    #[must_use]
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            cur: String::new(),
            idx: 0,
            line: 1,
            col: 1,
            prev_kind: TokenKind::Error,
        }
    }

    #[must_use]
    pub fn done(&self) -> bool {
        self.prev_kind == TokenKind::Eof
    }

    pub fn scan(&mut self) -> Token {
        let kind = self.scan_token();

        if !kind.is_comment() {
            self.prev_kind = kind;
        }

        Token::new(kind, &self.cur, self.line, self.col)
    }

    /// Collect every remaining token, stopping after `Eof` or the first
    /// `Error` token.
    pub fn tokenize(source: &str) -> Vec<Token> {
        let mut lexer = Self::new(source);
        let mut tokens = Vec::new();
        while !lexer.done() {
            let token = lexer.scan();
            let is_err = token.kind == TokenKind::Error;
            tokens.push(token);
            if is_err {
                break;
            }
        }
        tokens
    }

    fn cur_char(&self) -> char {
        self.source.get(self.idx).copied().unwrap_or('\0')
    }

    fn next_char(&self) -> char {
        self.source.get(self.idx + 1).copied().unwrap_or('\0')
    }

    fn advance(&mut self) {
        match self.cur_char() {
            '\0' => return,
            '\n' => {
                self.line += 1;
                self.col = 1;
            }
            '\r' => {}
            _ => self.col += 1,
        }
        self.idx += 1;
    }

    fn take_it(&mut self) {
        if self.cur_char() != '\0' {
            self.cur.push(self.cur_char());
            self.advance();
        }
    }

    fn ignore_it(&mut self) {
        self.advance();
    }

    fn scan_token(&mut self) -> TokenKind {
        self.cur.clear();

        while is_whitespace(self.cur_char()) {
            self.ignore_it();
        }

        let c = self.cur_char();
        if is_letter(c) {
            self.scan_identifier();
            TokenKind::for_word(&self.cur)
        } else if c == '"' {
            self.scan_string_literal()
        } else if is_symbol(c) {
            if c == '/' && self.next_char() == '/' {
                self.scan_line_comment()
            } else if c == '/' && self.next_char() == '*' {
                self.scan_bracketed_comment()
            } else if c == '.' && is_digit(self.next_char()) {
                // literal of the form .45 — normalized to 0.45
                self.scan_number_literal()
            } else {
                self.scan_symbol()
            }
        } else if is_digit(c) {
            self.scan_number_literal()
        } else if c == '\0' {
            TokenKind::Eof
        } else {
            self.take_it();
            TokenKind::Error
        }
    }

    fn scan_identifier(&mut self) {
        self.take_it();
        while is_letter(self.cur_char()) || is_digit(self.cur_char()) {
            self.take_it();
        }
    }

    fn scan_string_literal(&mut self) -> TokenKind {
        self.ignore_it(); // opening "
        while self.cur_char() != '\0' && self.cur_char() != '"' {
            self.take_it();
        }

        if self.cur_char() == '\0' {
            return TokenKind::Error;
        }

        self.ignore_it(); // closing "
        TokenKind::StringLiteral
    }

    fn scan_number_literal(&mut self) -> TokenKind {
        while is_digit(self.cur_char()) {
            self.take_it();
        }

        if self.cur_char() != '.' {
            return TokenKind::IntegerLiteral;
        }

        if self.cur.is_empty() {
            self.cur.push('0');
        }

        self.take_it(); // take '.'

        if !is_digit(self.cur_char()) {
            return TokenKind::Error;
        }
        while is_digit(self.cur_char()) {
            self.take_it();
        }

        if matches!(self.cur_char(), 'e' | 'E') {
            self.take_it();
            if matches!(self.cur_char(), '-' | '+') {
                self.take_it();
            }
            if !is_digit(self.cur_char()) {
                return TokenKind::Error;
            }
            while is_digit(self.cur_char()) {
                self.take_it();
            }
        }

        TokenKind::FloatLiteral
    }

    fn scan_symbol(&mut self) -> TokenKind {
        match self.cur_char() {
            '/' => {
                self.take_it();
                TokenKind::Divide
            }
            '*' => {
                self.take_it();
                TokenKind::Multiply
            }
            '-' => {
                self.take_it();
                // a minus after an operator, an open paren, or a comma
                // starts a value rather than continuing one
                if matches!(
                    self.prev_kind,
                    TokenKind::Assign
                        | TokenKind::NotEquals
                        | TokenKind::Equals
                        | TokenKind::Divide
                        | TokenKind::Multiply
                        | TokenKind::Modulo
                        | TokenKind::Lt
                        | TokenKind::LtEq
                        | TokenKind::Gt
                        | TokenKind::GtEq
                        | TokenKind::OpenBracket
                        | TokenKind::Or
                        | TokenKind::And
                        | TokenKind::Not
                        | TokenKind::Comma
                ) {
                    TokenKind::UnaryMinus
                } else {
                    TokenKind::Minus
                }
            }
            '+' => {
                self.take_it();
                TokenKind::Plus
            }
            '%' => {
                self.take_it();
                TokenKind::Modulo
            }
            '=' => {
                self.take_it();
                if self.cur_char() == '=' {
                    self.take_it();
                    TokenKind::Equals
                } else {
                    TokenKind::Assign
                }
            }
            '<' => {
                self.take_it();
                if self.cur_char() == '=' {
                    self.take_it();
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                self.take_it();
                if self.cur_char() == '=' {
                    self.take_it();
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '.' => {
                self.take_it();
                TokenKind::Dot
            }
            '(' => {
                self.take_it();
                TokenKind::OpenBracket
            }
            ')' => {
                self.take_it();
                TokenKind::CloseBracket
            }
            '{' => {
                self.take_it();
                TokenKind::OpenCurly
            }
            '}' => {
                self.take_it();
                TokenKind::CloseCurly
            }
            '&' => {
                self.take_it();
                if self.cur_char() == '&' {
                    self.take_it();
                    TokenKind::And
                } else {
                    TokenKind::Error
                }
            }
            '|' => {
                self.take_it();
                if self.cur_char() == '|' {
                    self.take_it();
                    TokenKind::Or
                } else {
                    TokenKind::Error
                }
            }
            '!' => {
                self.take_it();
                if self.cur_char() == '=' {
                    self.take_it();
                    TokenKind::NotEquals
                } else {
                    TokenKind::Not
                }
            }
            ',' => {
                self.take_it();
                TokenKind::Comma
            }
            ';' => {
                self.take_it();
                TokenKind::Semicolon
            }
            _ => TokenKind::Error,
        }
    }

    fn scan_bracketed_comment(&mut self) -> TokenKind {
        self.ignore_it(); // take /
        self.ignore_it(); // take *

        while self.cur_char() != '\0' && !(self.cur_char() == '*' && self.next_char() == '/') {
            self.take_it();
        }

        if self.cur_char() == '\0' {
            return TokenKind::Error;
        }

        self.ignore_it(); // take *
        self.ignore_it(); // take /
        TokenKind::BracketedComment
    }

    fn scan_line_comment(&mut self) -> TokenKind {
        self.ignore_it(); // take first /
        self.ignore_it(); // take second /

        while !matches!(self.cur_char(), '\n' | '\r' | '\0') {
            self.take_it();
        }

        TokenKind::LineComment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::tokenize(source).iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("class Foo extends Bar"),
            vec![
                TokenKind::Class,
                TokenKind::Identifier,
                TokenKind::Extends,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn number_literals() {
        let tokens = Lexer::tokenize("12 3.5 .25 1.0e-3 7.5E2");
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::IntegerLiteral,
                TokenKind::FloatLiteral,
                TokenKind::FloatLiteral,
                TokenKind::FloatLiteral,
                TokenKind::FloatLiteral,
                TokenKind::Eof
            ]
        );
        // leading dot is normalized
        assert_eq!(&*tokens[2].spelling, "0.25");
    }

    #[test]
    fn unary_minus_by_context() {
        assert_eq!(
            kinds("a - 1"),
            vec![
                TokenKind::Identifier,
                TokenKind::Minus,
                TokenKind::IntegerLiteral,
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("a = -1"),
            vec![
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::UnaryMinus,
                TokenKind::IntegerLiteral,
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("(-x)"),
            vec![
                TokenKind::OpenBracket,
                TokenKind::UnaryMinus,
                TokenKind::Identifier,
                TokenKind::CloseBracket,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn comments_are_tokens() {
        let tokens = Lexer::tokenize("// leading\nclass /* inner */ C");
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::LineComment,
                TokenKind::Class,
                TokenKind::BracketedComment,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
        assert_eq!(&*tokens[0].spelling, " leading");
    }

    #[test]
    fn unterminated_comment_is_error() {
        assert!(kinds("/* no end").contains(&TokenKind::Error));
        assert!(kinds("\"no end").contains(&TokenKind::Error));
    }

    #[test]
    fn unknown_character_is_error() {
        assert!(kinds("a # b").contains(&TokenKind::Error));
    }

    #[test]
    fn spellings_relex_to_same_kinds() {
        // property: joining spellings with spaces re-lexes to the same
        // sequence, comments excluded
        let source = "class C { int f ( int n ) { return n * 2 + 1 ; } } ;";
        let first = Lexer::tokenize(source);
        let joined = first
            .iter()
            .filter(|t| t.kind != TokenKind::Eof)
            .map(|t| t.spelling.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        let second = Lexer::tokenize(&joined);
        assert_eq!(
            first.iter().map(|t| t.kind).collect::<Vec<_>>(),
            second.iter().map(|t| t.kind).collect::<Vec<_>>()
        );
    }
}
