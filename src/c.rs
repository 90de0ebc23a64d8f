//! The bits of C embedded in the registry.
//!
//! Member, parameter and prototype declarations arrive as text interleaved with `<type>`,
//! `<name>` and `<enum>` markup. Function pointer typedefs are worse: the return type and
//! parameter names are plain text. Everything here works on the markup token stream and
//! accepts only the declarator shapes the registry actually uses.

use crate::types::{ArrayLength, Field, Indirection, Modifier};

/// One piece of mixed text and markup content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeMarkup {
    Text(String),
    Type(String),
    Name(String),
    Enum(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeError {
    Declarator(String),
    FunctionPointer(String),
}

/// A function pointer typedef after parsing. `ret.name` is the callback name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionPointerDecl {
    pub name: String,
    pub ret: Field,
    pub params: Vec<Field>,
}

//--------------------------------------------------------------------------------------------------
fn is_c_identifier_char(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

/// Splits a whitespace-free chunk into identifier/number runs and single punctuation chars.
struct TokenIter<'a> {
    src: &'a str,
}

impl<'a> TokenIter<'a> {
    fn new(src: &'a str) -> Self {
        Self { src }
    }
}

impl<'a> Iterator for TokenIter<'a> {
    type Item = &'a str;
    fn next(&mut self) -> Option<&'a str> {
        let mut iter = self.src.char_indices();
        let (_, c) = iter.next()?;
        if is_c_identifier_char(c) {
            for (end_idx, c) in iter {
                if !is_c_identifier_char(c) {
                    let split = self.src.split_at(end_idx);
                    self.src = split.1;
                    return Some(split.0);
                }
            }
            let res = self.src;
            self.src = "";
            Some(res)
        } else {
            let split = self.src.split_at(c.len_utf8());
            self.src = split.1;
            Some(split.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lexeme<'a> {
    Word(&'a str),
    Punct(&'a str),
    Type(&'a str),
    Name(&'a str),
    Enum(&'a str),
}

fn lex(markup: &[CodeMarkup]) -> Vec<Lexeme<'_>> {
    let mut lexemes = Vec::new();
    for item in markup {
        match item {
            CodeMarkup::Text(text) => {
                for token in text.split_whitespace().flat_map(TokenIter::new) {
                    if token.starts_with(is_c_identifier_char) {
                        lexemes.push(Lexeme::Word(token));
                    } else {
                        lexemes.push(Lexeme::Punct(token));
                    }
                }
            }
            CodeMarkup::Type(text) => lexemes.push(Lexeme::Type(text.trim())),
            CodeMarkup::Name(text) => lexemes.push(Lexeme::Name(text.trim())),
            CodeMarkup::Enum(text) => lexemes.push(Lexeme::Enum(text.trim())),
        }
    }
    lexemes
}

fn describe(lexeme: Option<Lexeme>) -> String {
    match lexeme {
        None => String::from("end of input"),
        Some(Lexeme::Word(s)) | Some(Lexeme::Punct(s)) => format!("`{}`", s),
        Some(Lexeme::Type(s)) => format!("<type>{}</type>", s),
        Some(Lexeme::Name(s)) => format!("<name>{}</name>", s),
        Some(Lexeme::Enum(s)) => format!("<enum>{}</enum>", s),
    }
}

//--------------------------------------------------------------------------------------------------
/// Maps the run of `*` and `const` tokens between a type and a name to its normalized form.
///
/// Returns `None` for shapes outside the grammar.
pub fn normalize_indirection(tokens: &[&str]) -> Option<Indirection> {
    if tokens.iter().all(|t| *t == "*") {
        return match tokens.len() {
            0 => Some(Indirection::Direct),
            n if n <= u8::max_value() as usize => Some(Indirection::Pointer(n as u8)),
            _ => None,
        };
    }
    match tokens {
        ["*", "const", "*"] => Some(Indirection::PointerToConstPointer),
        _ => None,
    }
}

struct Parser<'a> {
    lexemes: Vec<Lexeme<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(markup: &'a [CodeMarkup]) -> Self {
        Self {
            lexemes: lex(markup),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<Lexeme<'a>> {
        self.lexemes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<Lexeme<'a>> {
        let lexeme = self.peek();
        if lexeme.is_some() {
            self.pos += 1;
        }
        lexeme
    }

    fn eat(&mut self, expected: Lexeme) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Lexeme) -> Result<(), String> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(format!(
                "expected {}, found {}",
                describe(Some(expected)),
                describe(self.peek())
            ))
        }
    }

    fn modifier(&mut self) -> Result<Option<Modifier>, String> {
        let (mut is_const, mut is_struct, mut is_enum) = (false, false, false);
        loop {
            match self.peek() {
                Some(Lexeme::Word("const")) => is_const = true,
                Some(Lexeme::Word("struct")) => is_struct = true,
                Some(Lexeme::Word("enum")) => is_enum = true,
                _ => break,
            }
            self.pos += 1;
        }
        match (is_const, is_struct, is_enum) {
            (false, false, false) => Ok(None),
            (true, false, false) => Ok(Some(Modifier::Const)),
            (false, true, false) => Ok(Some(Modifier::Struct)),
            (true, true, false) => Ok(Some(Modifier::ConstStruct)),
            (false, false, true) => Ok(Some(Modifier::Enum)),
            _ => Err(String::from("unsupported combination of type modifiers")),
        }
    }

    fn indirection(&mut self) -> Result<Indirection, String> {
        let mut run = Vec::new();
        loop {
            match self.peek() {
                Some(Lexeme::Punct("*")) => run.push("*"),
                Some(Lexeme::Word("const")) => run.push("const"),
                _ => break,
            }
            self.pos += 1;
        }
        normalize_indirection(&run)
            .ok_or_else(|| format!("unsupported pointer syntax `{}`", run.join(" ")))
    }

    fn array_shape(&mut self) -> Result<Option<Vec<ArrayLength>>, String> {
        let mut shape = Vec::new();
        while self.eat(Lexeme::Punct("[")) {
            let length = match self.bump() {
                Some(Lexeme::Word(text)) if text.starts_with(|c: char| c.is_ascii_digit()) => {
                    match text.parse::<u32>() {
                        Ok(n) => ArrayLength::Literal(n),
                        Err(_) => return Err(format!("invalid array length `{}`", text)),
                    }
                }
                Some(Lexeme::Word(name)) | Some(Lexeme::Enum(name)) => {
                    ArrayLength::Constant(String::from(name))
                }
                other => return Err(format!("expected array length, found {}", describe(other))),
            };
            self.expect(Lexeme::Punct("]"))?;
            shape.push(length);
        }
        Ok(if shape.is_empty() { None } else { Some(shape) })
    }

    fn bitfield_size(&mut self) -> Result<Option<u8>, String> {
        if !self.eat(Lexeme::Punct(":")) {
            return Ok(None);
        }
        match self.bump() {
            Some(Lexeme::Word(text)) => text
                .parse::<u8>()
                .map(Some)
                .map_err(|_| format!("invalid bitfield width `{}`", text)),
            other => Err(format!("expected bitfield width, found {}", describe(other))),
        }
    }

    /// `modifier* type indirection name? array* bitfield?`
    fn declaration(&mut self, name_required: bool) -> Result<Field, String> {
        let modifier = self.modifier()?;
        let type_name = match self.bump() {
            Some(Lexeme::Type(t)) | Some(Lexeme::Word(t)) => String::from(t),
            other => return Err(format!("expected type, found {}", describe(other))),
        };
        let indirection = self.indirection()?;
        let name = match self.peek() {
            Some(Lexeme::Name(n)) | Some(Lexeme::Word(n)) => {
                self.pos += 1;
                String::from(n)
            }
            other if name_required => {
                return Err(format!("expected name, found {}", describe(other)));
            }
            _ => String::new(),
        };
        let array_shape = self.array_shape()?;
        let bitfield_size = self.bitfield_size()?;

        Ok(Field {
            modifier,
            type_name,
            indirection,
            name,
            array_shape,
            bitfield_size,
            ..Field::default()
        })
    }
}

/// Parses a member, parameter or prototype declaration.
///
/// Attributes and comments are not part of the declaration and are left empty.
pub fn parse_field(markup: &[CodeMarkup]) -> Result<Field, CodeError> {
    let mut parser = Parser::new(markup);
    let field = parser.declaration(true).map_err(CodeError::Declarator)?;
    parser.eat(Lexeme::Punct(";"));
    match parser.peek() {
        None => Ok(field),
        trailing => Err(CodeError::Declarator(format!(
            "unexpected {} after declaration of '{}'",
            describe(trailing),
            field.name
        ))),
    }
}

/// Parses `typedef ret (CALLCONV *name)(params);`.
pub fn parse_function_pointer(markup: &[CodeMarkup]) -> Result<FunctionPointerDecl, CodeError> {
    parse_function_pointer_inner(&mut Parser::new(markup)).map_err(CodeError::FunctionPointer)
}

fn parse_function_pointer_inner(parser: &mut Parser) -> Result<FunctionPointerDecl, String> {
    parser.expect(Lexeme::Word("typedef"))?;
    let mut ret = parser.declaration(false)?;
    if !ret.name.is_empty() {
        return Err(format!("unexpected `{}` after return type", ret.name));
    }

    parser.expect(Lexeme::Punct("("))?;
    // calling convention macro, e.g. VKAPI_PTR
    if let Some(Lexeme::Word(_)) = parser.peek() {
        parser.pos += 1;
    }
    parser.expect(Lexeme::Punct("*"))?;
    let name = match parser.bump() {
        Some(Lexeme::Name(n)) | Some(Lexeme::Word(n)) => String::from(n),
        other => return Err(format!("expected callback name, found {}", describe(other))),
    };
    parser.expect(Lexeme::Punct(")"))?;
    parser.expect(Lexeme::Punct("("))?;

    let mut params = Vec::new();
    let is_void = parser.peek() == Some(Lexeme::Word("void"))
        && parser.lexemes.get(parser.pos + 1) == Some(&Lexeme::Punct(")"));
    if is_void {
        parser.pos += 1;
    } else if parser.peek() != Some(Lexeme::Punct(")")) {
        loop {
            params.push(parser.declaration(true)?);
            if !parser.eat(Lexeme::Punct(",")) {
                break;
            }
        }
    }
    parser.expect(Lexeme::Punct(")"))?;
    parser.eat(Lexeme::Punct(";"));
    if let Some(trailing) = parser.peek() {
        return Err(format!("unexpected {} after parameter list", describe(Some(trailing))));
    }

    ret.name = name.clone();
    Ok(FunctionPointerDecl { name, ret, params })
}
