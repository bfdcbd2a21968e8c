//! S-Expression Parser

use crate::builtins::Builtin;
use crate::error::{Error, ErrorKind, Result, SourceFileName, SyntaxErrorKind};
use crate::form::Form;
use crate::tokit::{tokenize, Token};
use ahash::AHashMap;

/**
 * Find matching parentheses inside a token array.
 *
 * # Returns
 *
 * A map `map`, where `map[idx]` is the position of the `)` that closes the
 * `(` at `idx`.
 */
pub fn find_pairs(toks: &[Token], file: &SourceFileName) -> Result<AHashMap<usize, usize>> {
    let mut st = vec![];
    let mut map = AHashMap::default();

    for (i, tok) in toks.iter().enumerate() {
        match tok.text {
            "(" => st.push(i),
            ")" => {
                let j = st.pop().ok_or_else(|| {
                    error!(TrailingDelimiter, close: ")").src(tok.src(file))
                })?;
                map.insert(j, i);
            }
            _ => ()
        }
    }

    if let Some(i) = st.pop() {
        bail!((UnclosedDelimiter { open: "(" }).src(toks[i].src(file)))
    }

    Ok(map)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || "!$%&*+-./:<=>?^_~@".contains(c)
}

/// Numbers are an optional sign, digits, and an optional fraction.
fn parse_number(text: &str) -> Option<Form> {
    let body = text.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(text);
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    match body.split_once('.') {
        None if digits(body) => Some(match text.parse::<i64>() {
            Ok(x) => Form::int(x),
            Err(_) => Form::real(text.parse().ok()?),
        }),
        Some((int, frac)) if digits(int) && digits(frac) =>
            Some(Form::real(text.parse().ok()?)),
        _ => None
    }
}

struct Parser<'a> {
    toks: Vec<Token<'a>>,
    pairs: AHashMap<usize, usize>,
    file: SourceFileName,
}

struct Items {
    items: Vec<Form>,
    tail: Form,
}

impl Parser<'_> {
    fn syntax_error(&self, tok: &Token, kind: SyntaxErrorKind) -> Error {
        Error::new(ErrorKind::SyntaxError(kind)).src(tok.src(&self.file))
    }

    fn parse_atom(&self, tok: &Token) -> Result<Form> {
        let text = tok.text;
        if let Some(x) = parse_number(text) {
            return Ok(x)
        }
        if text.starts_with('#') {
            return match Builtin::from(text) {
                Some(Builtin::True) => Ok(Form::bool(true)),
                Some(Builtin::False) => Ok(Form::bool(false)),
                Some(Builtin::Ignore) => Ok(Form::ignore()),
                Some(Builtin::Inert) => Ok(Form::inert()),
                _ => Err(error!(UnknownLiteral, lit: text.to_string())
                         .src(tok.src(&self.file)))
            }
        }
        if !text.chars().all(is_ident_char) {
            bail!((UnknownLiteral { lit: text.to_string() }).src(tok.src(&self.file)))
        }
        Ok(Form::sym(text))
    }

    /// Parse the tokens in `beg..end`, `in_list` tells whether a dot is
    /// allowed.
    fn parse_rec(&self, beg: usize, end: usize, in_list: bool) -> Result<Items> {
        let mut items = Vec::new();
        let mut tail = None;
        // Quote marks waiting for the next datum.
        let mut mods: Vec<Token> = Vec::new();
        let mut dot: Option<Token> = None;
        let mut i = beg;
        while i < end {
            let tok = self.toks[i];
            let form = match tok.text {
                "(" => {
                    let j = self.pairs[&i];
                    let Items { items, tail } = self.parse_rec(i + 1, j, true)?;
                    i = j;
                    Form::list(items, tail)
                }
                ")" => bail!((TrailingDelimiter { close: ")" }).src(tok.src(&self.file))),
                "'" => {
                    mods.push(tok);
                    i += 1;
                    continue
                }
                "." => {
                    use SyntaxErrorKind::*;
                    let kind = if !in_list {
                        Some(DotOutsideList)
                    } else if !mods.is_empty() {
                        Some(ModifierBeforeDot)
                    } else if dot.is_some() {
                        Some(DotAfterDot)
                    } else if items.is_empty() {
                        Some(DotAtStartOfList)
                    } else {
                        None
                    };
                    if let Some(kind) = kind {
                        return Err(self.syntax_error(&tok, kind))
                    }
                    dot = Some(tok);
                    i += 1;
                    continue
                }
                _ => self.parse_atom(&tok)?,
            };
            let form = mods.drain(..).fold(form, |form, _| {
                Form::from_vec(vec![Form::Symbol(Builtin::Quote.sym()), form])
            });
            match (dot.is_some(), tail.is_some()) {
                (false, _) => items.push(form),
                (true, false) => tail = Some(form),
                (true, true) =>
                    return Err(self.syntax_error(&tok, SyntaxErrorKind::MoreThanOneElemAfterDot)),
            }
            i += 1;
        }
        if let Some(m) = mods.first() {
            bail!((TrailingModifiers {
                mods: mods.iter().map(|t| t.text).collect()
            }).src(m.src(&self.file)))
        }
        match (dot, tail) {
            (Some(tok), None) => Err(self.syntax_error(&tok, SyntaxErrorKind::DotAtEndOfList)),
            (_, tail) => Ok(Items { items, tail: tail.unwrap_or(Form::Nil) }),
        }
    }
}

/// Read every datum in `text`.
pub fn parse(text: &str, file: SourceFileName) -> Result<Vec<Form>> {
    let toks = tokenize(text);
    let pairs = find_pairs(&toks, &file)?;
    let len = toks.len();
    let parser = Parser { toks, pairs, file };
    Ok(parser.parse_rec(0, len, false)?.items)
}
