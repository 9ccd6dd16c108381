//! Description language parser
//!
//! Handles the line-oriented declaration subset:
//! - `include <path>`, `define NAME value`
//! - `resource name[base]`, `type name typeexpr`
//! - `name = V1, V2` flags
//! - `name { field type }` structs and `name [ field type ]` unions
//! - `name(arg type, ...) ret` syscalls
//!
//! Errors never stop the parse: each is reported with its position and the
//! parser resumes at the next line (or after the enclosing body).
//!
//! Comments inside struct and union bodies are skipped and produce no node,
//! so they do not survive formatting.

use super::ast::{Description, Field, Node, TypeArg, TypeExpr};
use crate::diagnostics::{Diagnostics, Pos};
use std::fmt;
use std::fs;
use std::path::Path;

/// Extension of description files picked up by [`parse_glob`]
pub const DESCRIPTION_EXT: &str = "txt";

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(String),
    Str(String),
    Angle(String),
    Comment(String),
    LParen,
    RParen,
    LBrack,
    RBrack,
    LBrace,
    RBrace,
    Comma,
    Equals,
    NewLine,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "{}", s),
            Token::Int(s) => write!(f, "{}", s),
            Token::Str(s) => write!(f, "\"{}\"", s),
            Token::Angle(s) => write!(f, "<{}>", s),
            Token::Comment(_) => f.write_str("comment"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::LBrack => f.write_str("'['"),
            Token::RBrack => f.write_str("']'"),
            Token::LBrace => f.write_str("'{'"),
            Token::RBrace => f.write_str("'}'"),
            Token::Comma => f.write_str("','"),
            Token::Equals => f.write_str("'='"),
            Token::NewLine => f.write_str("new line"),
            Token::Eof => f.write_str("end of file"),
        }
    }
}

#[derive(Debug)]
struct ParseError {
    pos: Pos,
    message: String,
}

type PResult<T> = Result<T, ParseError>;

struct Lexer<'a> {
    input: &'a str,
    file: &'a str,
    offset: usize,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str, file: &'a str) -> Self {
        Self {
            input,
            file,
            offset: 0,
            line: 1,
            col: 1,
        }
    }

    fn pos(&self) -> Pos {
        Pos::new(self.file, self.line, self.col)
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.offset..].chars().next()
    }

    fn next_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek_char(), Some(' ' | '\t' | '\r')) {
            self.next_char();
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.offset;
        while self.peek_char().is_some_and(&pred) {
            self.next_char();
        }
        self.input[start..self.offset].to_string()
    }

    fn error(&self, pos: Pos, message: impl Into<String>) -> ParseError {
        ParseError {
            pos,
            message: message.into(),
        }
    }

    /// Next token and the position it starts at
    fn next_token(&mut self) -> PResult<(Token, Pos)> {
        self.skip_spaces();
        let pos = self.pos();
        let Some(ch) = self.peek_char() else {
            return Ok((Token::Eof, pos));
        };
        let simple = match ch {
            '\n' => Some(Token::NewLine),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '[' => Some(Token::LBrack),
            ']' => Some(Token::RBrack),
            '{' => Some(Token::LBrace),
            '}' => Some(Token::RBrace),
            ',' => Some(Token::Comma),
            '=' => Some(Token::Equals),
            _ => None,
        };
        if let Some(tok) = simple {
            self.next_char();
            return Ok((tok, pos));
        }
        match ch {
            '#' => {
                self.next_char();
                let text = self.take_while(|c| c != '\n');
                Ok((Token::Comment(text.trim_end().to_string()), pos))
            }
            '"' => {
                self.next_char();
                let text = self.take_while(|c| c != '"' && c != '\n');
                if self.peek_char() != Some('"') {
                    return Err(self.error(pos, "unterminated string"));
                }
                self.next_char();
                Ok((Token::Str(text), pos))
            }
            '<' => {
                self.next_char();
                let text = self.take_while(|c| c != '>' && c != '\n');
                if self.peek_char() != Some('>') {
                    return Err(self.error(pos, "unterminated include path"));
                }
                self.next_char();
                Ok((Token::Angle(text), pos))
            }
            c if c.is_ascii_digit() || c == '-' => {
                self.next_char();
                let rest = self.take_while(|c| c.is_ascii_alphanumeric());
                let text = format!("{}{}", c, rest);
                if !is_int_literal(&text) {
                    return Err(self.error(pos, format!("bad integer {:?}", text)));
                }
                Ok((Token::Int(text), pos))
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let text = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
                Ok((Token::Ident(text), pos))
            }
            c => {
                self.next_char();
                Err(self.error(pos, format!("unexpected {:?}", c)))
            }
        }
    }

    /// Raw text up to (not including) the end of the line
    fn rest_of_line(&mut self) -> String {
        self.skip_spaces();
        self.take_while(|c| c != '\n').trim_end().to_string()
    }
}

fn is_int_literal(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    if let Some(hex) = digits.strip_prefix("0x") {
        !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit())
    } else {
        !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
    }
}

struct Parser<'a, 'd> {
    lexer: Lexer<'a>,
    tok: Token,
    tok_pos: Pos,
    /// Closing token of the body being parsed, used for error recovery
    body_close: Option<Token>,
    diags: &'d mut Diagnostics,
    failed: bool,
}

impl<'a, 'd> Parser<'a, 'd> {
    fn new(data: &'a str, file: &'a str, diags: &'d mut Diagnostics) -> Self {
        Self {
            lexer: Lexer::new(data, file),
            tok: Token::NewLine,
            tok_pos: Pos::new(file, 1, 1),
            body_close: None,
            diags,
            failed: false,
        }
    }

    fn advance(&mut self) -> PResult<()> {
        let (tok, pos) = self.lexer.next_token()?;
        self.tok = tok;
        self.tok_pos = pos;
        Ok(())
    }

    fn unexpected(&self, expecting: &str) -> ParseError {
        self.lexer.error(
            self.tok_pos.clone(),
            format!("unexpected {}, expecting {}", self.tok, expecting),
        )
    }

    fn expect(&mut self, tok: Token) -> PResult<()> {
        if self.tok != tok {
            return Err(self.unexpected(&tok.to_string()));
        }
        self.advance()
    }

    fn expect_ident(&mut self) -> PResult<(String, Pos)> {
        match &self.tok {
            Token::Ident(name) => {
                let out = (name.clone(), self.tok_pos.clone());
                self.advance()?;
                Ok(out)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn expect_eol(&mut self) -> PResult<()> {
        match self.tok {
            Token::Eof => Ok(()),
            Token::NewLine => self.advance(),
            _ => Err(self.unexpected("new line")),
        }
    }

    fn report(&mut self, err: ParseError) {
        self.failed = true;
        self.diags.report(err.pos, err.message);
    }

    /// Skip past the broken declaration: to the end of its body if one is
    /// open, then to the end of the line.
    fn recover(&mut self) {
        let close = self.body_close.take();
        loop {
            match (&self.tok, &close) {
                (Token::Eof, _) => return,
                (Token::NewLine, None) => {
                    if let Err(err) = self.advance() {
                        self.report(err);
                        continue;
                    }
                    return;
                }
                (tok, Some(c)) if tok == c => {
                    return self.recover();
                }
                _ => {}
            }
            if let Err(err) = self.advance() {
                self.report(err);
            }
        }
    }

    fn parse_file(&mut self) -> Vec<Node> {
        let mut nodes: Vec<Node> = Vec::new();
        if let Err(err) = self.advance() {
            self.report(err);
            self.recover();
        }
        loop {
            let step = match &self.tok {
                Token::Eof => break,
                Token::NewLine => {
                    let blank_allowed = nodes
                        .last()
                        .is_some_and(|n| !matches!(n, Node::NewLine { .. }));
                    if blank_allowed {
                        nodes.push(Node::NewLine {
                            pos: self.tok_pos.clone(),
                        });
                    }
                    self.advance()
                }
                Token::Comment(text) => {
                    nodes.push(Node::Comment {
                        pos: self.tok_pos.clone(),
                        text: text.clone(),
                    });
                    self.advance().and_then(|_| self.expect_eol())
                }
                Token::Ident(_) => self.parse_decl().and_then(|node| {
                    nodes.push(node);
                    self.expect_eol()
                }),
                _ => Err(self.unexpected("declaration")),
            };
            if let Err(err) = step {
                self.report(err);
                self.recover();
            }
        }
        nodes
    }

    fn parse_decl(&mut self) -> PResult<Node> {
        let pos = self.tok_pos.clone();
        let Token::Ident(keyword) = self.tok.clone() else {
            return Err(self.unexpected("declaration"));
        };
        match keyword.as_str() {
            "define" => {
                // Value is raw text, so the lexer must not run past the name.
                self.advance()?;
                let (name, _) = self.expect_ident_raw()?;
                let value = self.lexer.rest_of_line();
                if value.is_empty() {
                    return Err(self.lexer.error(pos, format!("define {} has no value", name)));
                }
                self.advance()?;
                Ok(Node::Define { pos, name, value })
            }
            "include" => {
                self.advance()?;
                match &self.tok {
                    Token::Angle(path) => {
                        let path = path.clone();
                        self.advance()?;
                        Ok(Node::Include { pos, path })
                    }
                    _ => Err(self.unexpected("<path>")),
                }
            }
            "resource" => {
                self.advance()?;
                let (name, _) = self.expect_ident()?;
                self.expect(Token::LBrack)?;
                let base = self.parse_type()?;
                self.expect(Token::RBrack)?;
                Ok(Node::Resource { pos, name, base })
            }
            "type" => {
                self.advance()?;
                let (name, _) = self.expect_ident()?;
                let ty = self.parse_type()?;
                Ok(Node::TypeDef { pos, name, ty })
            }
            _ => {
                self.advance()?;
                match self.tok {
                    Token::LParen => self.parse_syscall(pos, keyword),
                    Token::Equals => self.parse_flags(pos, keyword),
                    Token::LBrace => self.parse_struct(pos, keyword, false),
                    Token::LBrack => self.parse_struct(pos, keyword, true),
                    _ => Err(self.unexpected("'(', '=', '{' or '['")),
                }
            }
        }
    }

    /// Current identifier without advancing the lexer
    fn expect_ident_raw(&mut self) -> PResult<(String, Pos)> {
        match &self.tok {
            Token::Ident(name) => Ok((name.clone(), self.tok_pos.clone())),
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn parse_syscall(&mut self, pos: Pos, name: String) -> PResult<Node> {
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if self.tok != Token::RParen {
            loop {
                args.push(self.parse_field()?);
                if self.tok != Token::Comma {
                    break;
                }
                self.advance()?;
            }
        }
        self.expect(Token::RParen)?;
        let ret = match self.tok {
            Token::Ident(_) => Some(self.parse_type()?),
            _ => None,
        };
        Ok(Node::Syscall {
            pos,
            name,
            args,
            ret,
        })
    }

    fn parse_flags(&mut self, pos: Pos, name: String) -> PResult<Node> {
        self.expect(Token::Equals)?;
        let mut values = Vec::new();
        loop {
            let value = match &self.tok {
                Token::Ident(v) => TypeArg::Type(TypeExpr {
                    pos: self.tok_pos.clone(),
                    ident: v.clone(),
                    args: Vec::new(),
                }),
                Token::Int(v) => TypeArg::Int(v.clone()),
                Token::Str(v) => TypeArg::Str(v.clone()),
                _ => return Err(self.unexpected("flag value")),
            };
            values.push(value);
            self.advance()?;
            if self.tok != Token::Comma {
                break;
            }
            self.advance()?;
        }
        Ok(Node::Flags { pos, name, values })
    }

    fn parse_struct(&mut self, pos: Pos, name: String, is_union: bool) -> PResult<Node> {
        let close = if is_union { Token::RBrack } else { Token::RBrace };
        self.body_close = Some(close.clone());
        self.advance()?;
        self.expect(Token::NewLine)?;
        let mut fields = Vec::new();
        loop {
            match &self.tok {
                Token::NewLine | Token::Comment(_) => self.advance()?,
                tok if *tok == close => {
                    self.body_close = None;
                    self.advance()?;
                    break;
                }
                _ => {
                    fields.push(self.parse_field()?);
                    self.expect(Token::NewLine)?;
                }
            }
        }
        if fields.is_empty() {
            return Err(self.lexer.error(pos, format!("{} has no fields", name)));
        }
        Ok(Node::Struct {
            pos,
            name,
            fields,
            is_union,
        })
    }

    fn parse_field(&mut self) -> PResult<Field> {
        let (name, pos) = self.expect_ident()?;
        let ty = self.parse_type()?;
        Ok(Field { pos, name, ty })
    }

    fn parse_type(&mut self) -> PResult<TypeExpr> {
        let (ident, pos) = self.expect_ident()?;
        let mut args = Vec::new();
        if self.tok == Token::LBrack {
            self.advance()?;
            loop {
                let arg = match &self.tok {
                    Token::Int(v) => {
                        let v = v.clone();
                        self.advance()?;
                        TypeArg::Int(v)
                    }
                    Token::Str(v) => {
                        let v = v.clone();
                        self.advance()?;
                        TypeArg::Str(v)
                    }
                    Token::Ident(_) => TypeArg::Type(self.parse_type()?),
                    _ => return Err(self.unexpected("type argument")),
                };
                args.push(arg);
                if self.tok != Token::Comma {
                    break;
                }
                self.advance()?;
            }
            self.expect(Token::RBrack)?;
        }
        Ok(TypeExpr { pos, ident, args })
    }
}

/// Parse one description file.
///
/// Returns `None` when any error was reported; all errors land in `diags`.
pub fn parse(data: &str, file: &str, diags: &mut Diagnostics) -> Option<Description> {
    let mut parser = Parser::new(data, file, diags);
    let nodes = parser.parse_file();
    if parser.failed {
        None
    } else {
        Some(Description::new(nodes))
    }
}

/// Parse every `*.txt` file in `dir` (sorted by name) as one document set.
///
/// All files are parsed even after a failure so every diagnostic is collected.
pub fn parse_glob(dir: &Path, diags: &mut Diagnostics) -> Option<Description> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            diags.report(
                Pos::new(dir.to_string_lossy(), 0, 0),
                format!("failed to read description dir: {}", err),
            );
            return None;
        }
    };
    let mut files: Vec<_> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == DESCRIPTION_EXT) && p.is_file())
        .collect();
    files.sort();

    let mut nodes = Vec::new();
    let mut ok = true;
    for path in files {
        let file = path.to_string_lossy().into_owned();
        match fs::read_to_string(&path) {
            Ok(data) => match parse(&data, &file, diags) {
                Some(desc) => nodes.extend(desc.nodes),
                None => ok = false,
            },
            Err(err) => {
                diags.report(Pos::new(file, 0, 0), format!("failed to read: {}", err));
                ok = false;
            }
        }
    }
    ok.then(|| Description::new(nodes))
}

#[cfg(test)]
mod tests {
    use super::super::ast::NodeKind;
    use super::*;

    fn parse_ok(data: &str) -> Description {
        let mut diags = Diagnostics::new();
        let desc = parse(data, "test.txt", &mut diags);
        assert!(diags.is_empty(), "{}", diags.render());
        desc.unwrap()
    }

    fn parse_err(data: &str) -> String {
        let mut diags = Diagnostics::new();
        assert!(parse(data, "test.txt", &mut diags).is_none());
        diags.render()
    }

    #[test]
    fn test_parse_every_declaration_kind() {
        let desc = parse_ok(
            "\
# comment
include <linux/socket.h>
define SOCK_FLAGS 0x80000 | 0x800
resource sock[fd]
type sockaddr_len len[addr, int32]
accept_flags = SOCK_NONBLOCK, SOCK_CLOEXEC, 0x10
sockaddr {
\tfamily\tint16
\tdata\tarray[int8, 14]
}
sockaddr_any [
\tin\tsockaddr
]
accept4(fd sock, peer ptr[out, sockaddr_any, opt], flags flags[accept_flags, int32]) sock
",
        );
        let kinds: Vec<_> = desc.nodes.iter().filter_map(|n| n.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Include,
                NodeKind::Define,
                NodeKind::Resource,
                NodeKind::TypeDef,
                NodeKind::Flags,
                NodeKind::Struct,
                NodeKind::Union,
                NodeKind::Syscall,
            ]
        );
        match &desc.nodes[2] {
            Node::Define { name, value, .. } => {
                assert_eq!(name, "SOCK_FLAGS");
                assert_eq!(value, "0x80000 | 0x800");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_syscall_args_and_ret() {
        let desc = parse_ok("read$auto(fd fd, buf ptr[out, array[int8]], count len[buf]) intptr\n");
        let Node::Syscall { name, args, ret, .. } = &desc.nodes[0] else {
            panic!("not a syscall");
        };
        assert_eq!(name, "read$auto");
        assert_eq!(args.len(), 3);
        assert_eq!(args[1].ty.ident, "ptr");
        assert_eq!(ret.as_ref().unwrap().ident, "intptr");
    }

    #[test]
    fn test_positions_are_recorded() {
        let desc = parse_ok("\n\nfoo = 1\n");
        let pos = desc.nodes[0].pos();
        assert_eq!((pos.file.as_str(), pos.line, pos.col), ("test.txt", 3, 1));
    }

    #[test]
    fn test_blank_lines_collapse() {
        let desc = parse_ok("\n\nfoo = 1\n\n\n\nbar = 2\n");
        let blanks = desc
            .nodes
            .iter()
            .filter(|n| matches!(n, Node::NewLine { .. }))
            .count();
        assert_eq!(blanks, 1);
        assert_eq!(desc.nodes.len(), 3);
    }

    #[test]
    fn test_errors_are_all_collected() {
        let out = parse_err("foo bar\nok = 1\nbaz(\n");
        assert!(out.contains("test.txt:1:5: unexpected bar"), "{}", out);
        assert!(out.contains("test.txt:3:5: unexpected new line"), "{}", out);
        assert_eq!(out.lines().count(), 2);
    }

    #[test]
    fn test_recovery_skips_broken_struct_body() {
        let out = parse_err("s {\n\tf\n\tg int8\n}\nt = 1\nu(\n");
        assert_eq!(out.lines().count(), 2, "{}", out);
        assert!(out.starts_with("test.txt:2:3:"), "{}", out);
    }

    #[test]
    fn test_unterminated_string() {
        let out = parse_err("s = \"abc\n");
        assert!(out.contains("unterminated string"));
    }

    #[test]
    fn test_bad_integer() {
        let out = parse_err("f = 0xzz\n");
        assert!(out.contains("bad integer"));
    }

    #[test]
    fn test_empty_struct_rejected() {
        let out = parse_err("s {\n}\n");
        assert!(out.contains("s has no fields"));
    }

    #[test]
    fn test_parse_glob_reads_txt_files_in_order() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), "b = 1\n").unwrap();
        fs::write(dir.path().join("a.txt"), "a = 1\n").unwrap();
        fs::write(dir.path().join("notes.md"), "not a description\n").unwrap();
        let mut diags = Diagnostics::new();
        let desc = parse_glob(dir.path(), &mut diags).unwrap();
        let names: Vec<_> = desc.nodes.iter().filter_map(|n| n.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(desc.nodes[0].pos().file.ends_with("a.txt"));
    }

    #[test]
    fn test_parse_glob_reports_every_bad_file() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "a(\n").unwrap();
        fs::write(dir.path().join("b.txt"), "b {\n").unwrap();
        let mut diags = Diagnostics::new();
        assert!(parse_glob(dir.path(), &mut diags).is_none());
        let out = diags.render();
        assert!(out.contains("a.txt:"), "{}", out);
        assert!(out.contains("b.txt:"), "{}", out);
    }
}
