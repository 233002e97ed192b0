//! Query reader for the catalogue.
//!
//! The catalogue answers one shape of operation:
//!
//! ```graphql
//! query BookDetails($id: ID) {
//!   bookById(id: $id) {
//!     id
//!     name
//!     ... @defer(label: "author") {
//!       author { firstName lastName }
//!     }
//!   }
//! }
//! ```
//!
//! `author` may be deferred either through a `... @defer` fragment or with
//! `@defer` on the field itself. Any other root field is rejected.

use regex::Regex;
use serde_json::Value;

use crate::domain::{DomainError, DomainResult};

const BOOK_FIELDS: [&str; 3] = ["id", "name", "pageCount"];
const AUTHOR_FIELDS: [&str; 3] = ["id", "firstName", "lastName"];

/// A parsed `bookById` operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookQuery {
    pub id: String,
    /// Scalar book fields, in selection order.
    pub fields: Vec<String>,
    pub author: Option<AuthorSelection>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorSelection {
    pub fields: Vec<String>,
    pub defer: Option<Defer>,
}

impl AuthorSelection {
    pub fn is_deferred(&self) -> bool {
        self.defer.is_some()
    }
}

/// A `@defer` directive that applies.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Defer {
    pub label: Option<String>,
}

type Variables = serde_json::Map<String, Value>;

/// Reads [`BookQuery`]s out of request documents.
#[derive(Debug, Clone)]
pub struct QueryParser {
    book_by_id: Regex,
}

impl QueryParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            book_by_id: Regex::new(
                r#"\bbookById\s*\(\s*id\s*:\s*(?:"([^"]*)"|\$([_A-Za-z][_0-9A-Za-z]*))\s*\)\s*\{"#,
            )?,
        })
    }

    /// Parses `query`, resolving `$variables` from `variables`.
    pub fn parse(
        &self,
        query: &str,
        variables: Option<&Variables>,
    ) -> DomainResult<BookQuery> {
        let captures = self.book_by_id.captures(query).ok_or_else(|| {
            DomainError::UnsupportedQuery("expected a `bookById(id: ...)` selection".into())
        })?;

        let id = match (captures.get(1), captures.get(2)) {
            (Some(literal), _) => literal.as_str().to_string(),
            (None, Some(name)) => {
                let name = name.as_str();
                match variable(variables, name)? {
                    Value::String(id) => id.clone(),
                    _ => return Err(DomainError::InvalidVariable(name.to_string())),
                }
            }
            (None, None) => {
                return Err(DomainError::UnsupportedQuery("missing book id".into()));
            }
        };

        // The regex match ends on the opening brace of the book selection set.
        let rest = &query[captures.get(0).map_or(0, |m| m.end())..];
        let mut tokens = Lexer::new(rest);
        let selections = self.selection_set(&mut tokens)?;

        let mut book = BookQuery {
            id,
            fields: Vec::new(),
            author: None,
        };
        collect_book(&mut book, selections, None, variables)?;
        Ok(book)
    }

    /// Reads selections up to the closing brace of the current set.
    fn selection_set<'a>(&self, tokens: &mut Lexer<'a>) -> DomainResult<Vec<Selection<'a>>> {
        let mut selections = Vec::new();
        let mut pending = tokens.next();

        loop {
            match pending {
                Some(Token::Close) => return Ok(selections),
                Some(Token::Name(name)) => {
                    let mut next = tokens.next();
                    if let Some(Token::Colon) = next {
                        // Aliases are not supported; the response key is the field name.
                        return Err(DomainError::UnsupportedQuery(format!(
                            "alias `{name}` is not supported"
                        )));
                    }
                    if let Some(Token::Arguments(_)) = next {
                        next = tokens.next();
                    }
                    let (directives, after) = directives(tokens, next);
                    let (children, after) = match after {
                        Some(Token::Open) => (Some(self.selection_set(tokens)?), tokens.next()),
                        other => (None, other),
                    };
                    selections.push(Selection::Field {
                        name,
                        directives,
                        children,
                    });
                    pending = after;
                }
                Some(Token::Spread) => {
                    let mut next = tokens.next();
                    if let Some(Token::Name("on")) = next {
                        // Type condition; the catalogue has one type per level.
                        tokens.next();
                        next = tokens.next();
                    }
                    let (directives, after) = directives(tokens, next);
                    match after {
                        Some(Token::Open) => {
                            let children = self.selection_set(tokens)?;
                            selections.push(Selection::Fragment {
                                directives,
                                children,
                            });
                        }
                        _ => {
                            return Err(DomainError::UnsupportedQuery(
                                "named fragments are not supported".into(),
                            ));
                        }
                    }
                    pending = tokens.next();
                }
                Some(token) => {
                    return Err(DomainError::UnsupportedQuery(format!(
                        "unexpected {token:?} in selection set"
                    )));
                }
                None => {
                    return Err(DomainError::UnsupportedQuery(
                        "unterminated selection set".into(),
                    ));
                }
            }
        }
    }
}

fn collect_book(
    book: &mut BookQuery,
    selections: Vec<Selection<'_>>,
    inherited: Option<&Defer>,
    variables: Option<&Variables>,
) -> DomainResult<()> {
    for selection in selections {
        match selection {
            Selection::Field {
                name: "author",
                directives,
                children: Some(children),
            } => {
                let defer = match enabled_defer(&directives, variables)? {
                    Some(defer) => Some(defer),
                    None => inherited.cloned(),
                };
                let fields = scalar_fields("Author", &AUTHOR_FIELDS, children)?;
                book.author = Some(AuthorSelection { fields, defer });
            }
            Selection::Field {
                name,
                children: None,
                ..
            } if BOOK_FIELDS.contains(&name) || name == "__typename" => {
                if !book.fields.iter().any(|f| f == name) {
                    book.fields.push(name.to_string());
                }
            }
            Selection::Field { name, .. } => {
                return Err(DomainError::unknown_field("Book", name));
            }
            Selection::Fragment {
                directives,
                children,
            } => {
                let defer = enabled_defer(&directives, variables)?;
                collect_book(book, children, defer.as_ref().or(inherited), variables)?;
            }
        }
    }
    Ok(())
}

fn variable<'v>(variables: Option<&'v Variables>, name: &str) -> DomainResult<&'v Value> {
    variables
        .and_then(|vars| vars.get(name))
        .ok_or_else(|| DomainError::MissingVariable(name.to_string()))
}

/// Finds an enabled `@defer` among `directives`.
fn enabled_defer(
    directives: &[Directive<'_>],
    variables: Option<&Variables>,
) -> DomainResult<Option<Defer>> {
    let Some(directive) = directives.iter().find(|d| d.name == "defer") else {
        return Ok(None);
    };

    let mut label = None;
    let mut enabled = true;
    for (name, value) in arguments(directive.arguments.unwrap_or_default())? {
        let value = match value {
            Argument::Variable(var) => variable(variables, var)?.clone(),
            Argument::String(text) => Value::String(text),
            Argument::Literal("true") => Value::Bool(true),
            Argument::Literal("false") => Value::Bool(false),
            Argument::Literal(other) => {
                return Err(DomainError::UnsupportedQuery(format!(
                    "unsupported `@defer` argument value `{other}`"
                )));
            }
        };
        match (name, value) {
            ("if", Value::Bool(flag)) => enabled = flag,
            ("label", Value::String(text)) => label = Some(text),
            ("if" | "label", _) => {
                return Err(DomainError::UnsupportedQuery(format!(
                    "invalid `{name}` for `@defer`"
                )));
            }
            _ => {
                return Err(DomainError::UnsupportedQuery(format!(
                    "unknown `@defer` argument `{name}`"
                )));
            }
        }
    }

    Ok(enabled.then_some(Defer { label }))
}

#[derive(Debug, PartialEq, Eq)]
enum Argument<'a> {
    String(String),
    Variable(&'a str),
    /// Any other bare value, such as `true`.
    Literal(&'a str),
}

/// Splits the raw text of an argument list into `name: value` pairs.
fn arguments(raw: &str) -> DomainResult<Vec<(&str, Argument<'_>)>> {
    let malformed = || DomainError::UnsupportedQuery(format!("malformed arguments `({raw})`"));
    let is_name = |c: char| c.is_ascii_alphanumeric() || c == '_';

    let mut found = Vec::new();
    let mut rest = skip(raw);
    while !rest.is_empty() {
        let name_len = rest.find(|c: char| !is_name(c)).unwrap_or(rest.len());
        if name_len == 0 {
            return Err(malformed());
        }
        let (name, after) = rest.split_at(name_len);
        let after = after.trim_start().strip_prefix(':').ok_or_else(malformed)?.trim_start();

        let (value, after) = if let Some(quoted) = after.strip_prefix('"') {
            let (text, len) = string_literal(quoted).ok_or_else(malformed)?;
            (Argument::String(text), &quoted[len..])
        } else if let Some(var) = after.strip_prefix('$') {
            let len = var.find(|c: char| !is_name(c)).unwrap_or(var.len());
            if len == 0 {
                return Err(malformed());
            }
            (Argument::Variable(&var[..len]), &var[len..])
        } else {
            let len = after
                .find(|c: char| c.is_whitespace() || c == ',')
                .unwrap_or(after.len());
            if len == 0 {
                return Err(malformed());
            }
            (Argument::Literal(&after[..len]), &after[len..])
        };

        found.push((name, value));
        rest = skip(after);
    }
    Ok(found)
}

fn skip(rest: &str) -> &str {
    rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',')
}

/// Reads a string body up to its closing quote. Returns the unescaped text and
/// the number of bytes consumed, closing quote included.
fn string_literal(src: &str) -> Option<(String, usize)> {
    let mut text = String::new();
    let mut chars = src.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((text, i + 1)),
            '\\' => match chars.next()?.1 {
                'n' => text.push('\n'),
                't' => text.push('\t'),
                'r' => text.push('\r'),
                escaped @ ('"' | '\\' | '/') => text.push(escaped),
                _ => return None,
            },
            c => text.push(c),
        }
    }
    None
}

fn scalar_fields(
    type_name: &str,
    allowed: &[&str],
    selections: Vec<Selection<'_>>,
) -> DomainResult<Vec<String>> {
    let mut fields: Vec<String> = Vec::new();
    for selection in selections {
        match selection {
            Selection::Field {
                name,
                children: None,
                ..
            } if allowed.contains(&name) || name == "__typename" => {
                if !fields.iter().any(|f| f == name) {
                    fields.push(name.to_string());
                }
            }
            Selection::Field { name, .. } => {
                return Err(DomainError::unknown_field(type_name, name));
            }
            Selection::Fragment { children, .. } => {
                for field in scalar_fields(type_name, allowed, children)? {
                    if !fields.contains(&field) {
                        fields.push(field);
                    }
                }
            }
        }
    }
    Ok(fields)
}

fn directives<'a>(
    tokens: &mut Lexer<'a>,
    mut next: Option<Token<'a>>,
) -> (Vec<Directive<'a>>, Option<Token<'a>>) {
    let mut found = Vec::new();
    while let Some(Token::Directive(name)) = next {
        next = tokens.next();
        let arguments = match next {
            Some(Token::Arguments(args)) => {
                next = tokens.next();
                Some(args)
            }
            _ => None,
        };
        found.push(Directive { name, arguments });
    }
    (found, next)
}

#[derive(Debug)]
enum Selection<'a> {
    Field {
        name: &'a str,
        directives: Vec<Directive<'a>>,
        children: Option<Vec<Selection<'a>>>,
    },
    Fragment {
        directives: Vec<Directive<'a>>,
        children: Vec<Selection<'a>>,
    },
}

#[derive(Debug)]
struct Directive<'a> {
    name: &'a str,
    arguments: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Name(&'a str),
    Directive(&'a str),
    /// Raw text between parentheses.
    Arguments(&'a str),
    Open,
    Close,
    Spread,
    Colon,
    Other(char),
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn skip_ignored(&mut self) {
        let bytes = self.src.as_bytes();
        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b' ' | b'\t' | b'\r' | b'\n' | b',' => self.pos += 1,
                b'#' => {
                    while self.pos < bytes.len() && bytes[self.pos] != b'\n' {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn name(&mut self) -> &'a str {
        let bytes = self.src.as_bytes();
        let start = self.pos;
        while self.pos < bytes.len()
            && (bytes[self.pos].is_ascii_alphanumeric() || bytes[self.pos] == b'_')
        {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    fn arguments(&mut self) -> &'a str {
        let bytes = self.src.as_bytes();
        let start = self.pos + 1;
        let mut depth = 0usize;
        let mut in_string = false;
        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b'"' => in_string = !in_string,
                b'\\' if in_string => self.pos = (self.pos + 1).min(bytes.len() - 1),
                b'(' if !in_string => depth += 1,
                b')' if !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        return &self.src[start..self.pos - 1];
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
        &self.src[start.min(self.src.len())..]
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        self.skip_ignored();
        let rest = self.src.get(self.pos..)?;
        let c = rest.chars().next()?;
        let token = match c {
            '{' => {
                self.pos += 1;
                Token::Open
            }
            '}' => {
                self.pos += 1;
                Token::Close
            }
            ':' => {
                self.pos += 1;
                Token::Colon
            }
            '(' => Token::Arguments(self.arguments()),
            '@' => {
                self.pos += 1;
                Token::Directive(self.name())
            }
            '.' if rest.starts_with("...") => {
                self.pos += 3;
                Token::Spread
            }
            c if c.is_ascii_alphabetic() || c == '_' => Token::Name(self.name()),
            other => {
                self.pos += other.len_utf8();
                Token::Other(other)
            }
        };
        Some(token)
    }
}
