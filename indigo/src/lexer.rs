//! Tokenizing: splits source text into the small fixed vocabulary of
//! punctuation the grammar needs plus a single catch-all `Name` token, with
//! comments and whitespace skipped.
//!
//! Source-file includes (`<path>`) are not part of this vocabulary — a path
//! may contain characters a `Name` can't (slashes, dots used as extension
//! separators) — so [`Lexer`] also exposes a raw, un-tokenized scan for that
//! one grammar position, matching the original parser's own dedicated
//! filename-reading routine.

use std::ops::Range;

use logos::Logos;

/// The lexical vocabulary. Everything outside the listed punctuation and the
/// catch-all `Name` regex is a lex error.
#[derive(Logos, Clone, Debug, PartialEq, Eq)]
pub enum Token {
    #[token("<")]
    LAngle,
    #[token(">")]
    RAngle,
    #[token("@")]
    At,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("$")]
    Dollar,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semicolon,
    #[token("|")]
    Pipe,
    #[token(".")]
    Dot,
    #[token("~")]
    Tilde,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("?")]
    Question,

    /// An identifier, possibly namespace-qualified with `:`. The grammar
    /// positions that require a fresh, unqualified name (parameter binders,
    /// and a constructor's own declared name) reject one containing `:`
    /// after the fact, rather than lexing two different identifier shapes.
    #[regex(r#"[0-9A-Za-z_+\-*/%^&='"\\,`:]+"#, |lex| lex.slice().to_owned())]
    Name(String),

    #[regex(r"#[^\n]*", logos::skip)]
    Comment,
    #[regex(r"[ \t\r\n\x0c]+", logos::skip)]
    Whitespace,

    #[error]
    Error,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::LAngle => write!(f, "<"),
            Token::RAngle => write!(f, ">"),
            Token::At => write!(f, "@"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Dollar => write!(f, "$"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Semicolon => write!(f, ";"),
            Token::Pipe => write!(f, "|"),
            Token::Dot => write!(f, "."),
            Token::Tilde => write!(f, "~"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Question => write!(f, "?"),
            Token::Name(name) => write!(f, "{}", name),
            Token::Comment | Token::Whitespace | Token::Error => write!(f, "<error>"),
        }
    }
}

/// A token and the byte range of source it came from.
pub type Spanned<T> = (T, Range<usize>);

/// A single lexical error: an unrecognized byte sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LexError {
    pub range: Range<usize>,
}

/// A one-token-of-lookahead tokenizer over a whole source string, plus a raw
/// scanning escape hatch for filenames.
///
/// Re-runs `Token::lexer` on the unconsumed suffix of `source` for each
/// token: `logos::Lexer` has no way to resume a previous scan from an
/// arbitrary byte offset, and this is the only way to interleave ordinary
/// tokenizing with the raw filename scan below. Source files are small
/// enough that the repeated re-scanning from `pos` is not a real cost.
pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    lookahead: Option<Spanned<Token>>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Lexer<'a> {
        Lexer { source, pos: 0, lookahead: None }
    }

    fn scan(&mut self) -> Result<Option<Spanned<Token>>, LexError> {
        let mut inner = Token::lexer(&self.source[self.pos..]);
        match inner.next() {
            None => Ok(None),
            Some(Token::Error) => {
                let span = inner.span();
                let range = (self.pos + span.start)..(self.pos + span.end);
                Err(LexError { range })
            }
            Some(token) => {
                let span = inner.span();
                let range = (self.pos + span.start)..(self.pos + span.end);
                self.pos = range.end;
                Ok(Some((token, range)))
            }
        }
    }

    /// The next token without consuming it, or `None` at end of input.
    pub fn peek(&mut self) -> Result<Option<&Token>, LexError> {
        if self.lookahead.is_none() {
            self.lookahead = self.scan()?;
        }
        Ok(self.lookahead.as_ref().map(|(token, _)| token))
    }

    /// The byte range the next token will occupy, or an empty range at the
    /// current position at end of input — used to anchor diagnostics at
    /// unexpected-EOF sites.
    pub fn peek_range(&mut self) -> Result<Range<usize>, LexError> {
        self.peek()?;
        Ok(self
            .lookahead
            .as_ref()
            .map(|(_, range)| range.clone())
            .unwrap_or(self.pos..self.pos))
    }

    /// Consume and return the next token, or `None` at end of input.
    pub fn advance(&mut self) -> Result<Option<Spanned<Token>>, LexError> {
        self.peek()?;
        Ok(self.lookahead.take())
    }

    /// Current byte offset — the start of whatever hasn't been scanned yet.
    pub fn pos(&self) -> usize {
        match &self.lookahead {
            Some((_, range)) => range.start,
            None => self.pos,
        }
    }

    /// Read raw bytes up to (not including) the first occurrence of `stop`,
    /// bypassing the token grammar entirely. Used once, right after consuming
    /// the `<` that opens an include path, since a path's character set is
    /// unconstrained by the `Name` token.
    ///
    /// Must be called with no token buffered; an unread `lookahead` would be
    /// silently skipped over.
    pub fn scan_raw_until(&mut self, stop: char) -> Spanned<String> {
        debug_assert!(self.lookahead.is_none(), "scan_raw_until called with a token already buffered");
        let start = self.pos;
        let mut end = self.pos;
        for ch in self.source[self.pos..].chars() {
            if ch == stop {
                break;
            }
            end += ch.len_utf8();
        }
        self.pos = end;
        (self.source[start..end].to_owned(), start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        while let Some((token, _)) = lexer.advance().unwrap() {
            out.push(token);
        }
        out
    }

    #[test]
    fn punctuation_and_names_are_tokenized() {
        assert_eq!(
            tokens("Bool | true ;"),
            vec![
                Token::Name("Bool".to_owned()),
                Token::Pipe,
                Token::Name("true".to_owned()),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn comments_and_whitespace_are_skipped() {
        assert_eq!(tokens("# a comment\n  Bool  # trailing\n"), vec![Token::Name("Bool".to_owned())]);
    }

    #[test]
    fn qualified_names_keep_their_colon() {
        assert_eq!(tokens("pair:mk"), vec![Token::Name("pair:mk".to_owned())]);
    }

    #[test]
    fn an_unrecognized_byte_is_a_lex_error() {
        let mut lexer = Lexer::new("Bool ! true");
        assert!(lexer.advance().unwrap().is_some());
        let error = lexer.advance().unwrap_err();
        assert_eq!(error.range, 5..6);
    }

    #[test]
    fn raw_scan_stops_before_the_delimiter_and_leaves_it_unconsumed() {
        let mut lexer = Lexer::new("dir/main.ind>@rest");
        let (path, range) = lexer.scan_raw_until('>');
        assert_eq!(path, "dir/main.ind");
        assert_eq!(range, 0..13);
        assert_eq!(lexer.peek().unwrap(), Some(&Token::RAngle));
    }
}
