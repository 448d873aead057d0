use std::collections::HashMap;
use std::ops::Range;

use log::debug;
use thiserror::Error;

use crate::opcode::{Arg, InstructionSet, LIST_END};
use crate::script::{self, Command, ItemRef, Line, LineHeader, Operand, Symbols, Table, TextRef};
use crate::strings::{self, TEXT_BASE};

#[derive(Debug, Error, PartialEq)]
pub enum EncodeError {
    #[error("line {line}: unrecognized command {mnemonic}")]
    UnknownMnemonic{ line: usize, mnemonic: String },
    #[error("line {line}: {reference} does not name a known string or item")]
    UnresolvedReference{ line: usize, reference: String },
    #[error("line {line}: cannot use {operand:?} here: {reason}")]
    MalformedOperand{ line: usize, operand: String, reason: String },
    #[error("line {line}: {mnemonic} takes {expected} parameters but {found} were given")]
    ParameterCount{ line: usize, mnemonic: String, expected: usize, found: usize },
    #[error("line {line}: opcode for {mnemonic} should have been (0x{expected:02x}) but found {found}")]
    OpcodeMismatch{ line: usize, mnemonic: String, expected: u8, found: String },
    #[error("line {line}: jump to undefined label {label}")]
    UndefinedLabel{ line: usize, label: String },
    #[error("line {line}: label {label} is defined twice")]
    DuplicateLabel{ line: usize, label: String },
    #[error("line {line}: string {id} does not belong to {file}")]
    TextOutOfRange{ line: usize, id: u32, file: String },
    #[error("line {line}: table {number} is outside the ranges {ranges}")]
    TableOutOfRange{ line: usize, number: u16, ranges: String },
    #[error("line {line}: {reason}")]
    Syntax{ line: usize, reason: String },
    #[error("line {line}: {file} is not a script file of this game")]
    UnknownFile{ line: usize, file: String },
}

fn syntax(line: usize, reason: impl Into<String>) -> EncodeError {
    EncodeError::Syntax{ line, reason: reason.into() }
}

fn malformed(line: usize, operand: &str, reason: impl Into<String>) -> EncodeError {
    EncodeError::MalformedOperand{ line, operand: operand.to_string(), reason: reason.into() }
}

/// Strings declared with `+"..."`, appended after the existing global strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringPool {
    first: u32,
    limit: u32,
    added: Vec<String>,
}

impl StringPool {
    pub fn new(first: u32) -> StringPool {
        StringPool::bounded(first, TEXT_BASE)
    }

    /// A pool whose ids must stay below `limit`, itself capped at the first text file id.
    pub fn bounded(first: u32, limit: u32) -> StringPool {
        StringPool{ first, limit: limit.min(TEXT_BASE), added: Vec::new() }
    }

    /// Returns the id of `text`, registering it when it is new. `None` once the global ids run out.
    pub fn add(&mut self, text: &str) -> Option<u32> {
        if let Some(n) = self.added.iter().position(|t| t == text) {
            return Some(self.first + n as u32);
        }
        let id = self.first + self.added.len() as u32;
        if id >= self.limit {
            return None;
        }
        self.added.push(text.to_string());
        Some(id)
    }

    pub fn get(&self, id: u32) -> Option<&str> {
        id.checked_sub(self.first)
            .and_then(|n| self.added.get(n as usize))
            .map(|s| s.as_str())
    }

    pub fn added(&self) -> &[String] {
        &self.added
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceCommand {
    pub line: usize,
    pub label: Option<String>,
    pub marker: Option<String>,
    pub mnemonic: String,
    pub operands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceLine {
    pub line: usize,
    pub header: Option<LineHeader>,
    pub commands: Vec<SourceCommand>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceTable {
    pub line: usize,
    pub number: u16,
    pub lines: Vec<SourceLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceBody {
    /// Decoding failed on extraction; the record is passed through.
    Raw,
    Tables{ ranges: Vec<(u16, u16)>, tables: Vec<SourceTable> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub line: usize,
    pub name: String,
    pub body: SourceBody,
}

/// Splits one line into tokens and drops a trailing `//` comment. Quoted text is kept as one token.
fn tokenize(text: &str, line: usize) -> Result<Vec<String>, EncodeError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_quote {
            current.push(ch);
            match ch {
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                },
                '"' => in_quote = false,
                _ => { },
            }
            continue;
        }
        match ch {
            '"' => {
                in_quote = true;
                current.push(ch);
            },
            '/' if chars.peek() == Some(&'/') => break,
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            },
            c => current.push(c),
        }
    }
    if in_quote {
        return Err(syntax(line, "unterminated string"));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

fn unquote(token: &str, line: usize) -> Result<Option<String>, EncodeError> {
    if token.len() < 2 || !token.starts_with('"') || !token.ends_with('"') {
        return Ok(None);
    }
    strings::unescape(&token[1..token.len() - 1], line)
        .map(Some)
        .map_err(|e| malformed(line, token, e.to_string()))
}

fn parse_ranges(tokens: &[String], line: usize) -> Result<Vec<(u16, u16)>, EncodeError> {
    if tokens.len() == 1 && tokens[0] == "~" {
        return Ok(Vec::new());
    }
    tokens.iter().map(|token| {
        let parsed = token.split_once(':')
            .and_then(|(min, max)| Some((min.parse::<u16>().ok()?, max.parse::<u16>().ok()?)));
        match parsed {
            Some((min, max)) if min != 0 && min <= max => Ok((min, max)),
            _ => Err(syntax(line, format!("bad table range {:?}", token))),
        }
    }).collect()
}

fn parse_u16(token: &str, line: usize, what: &str) -> Result<u16, EncodeError> {
    token.parse::<u16>().map_err(|_| syntax(line, format!("bad {} {:?}", what, token)))
}

fn parse_command(tokens: Vec<String>, line: usize) -> Result<SourceCommand, EncodeError> {
    let mut tokens = tokens.into_iter().peekable();
    let label = match tokens.peek() {
        Some(t) if t.len() > 1 && t.ends_with(':') => tokens.next().map(|t| t[..t.len() - 1].to_string()),
        _ => None,
    };
    let marker = match tokens.peek() {
        Some(t) if t.starts_with("(0x") && t.ends_with(')') => tokens.next(),
        _ => None,
    };
    let mnemonic = tokens.next().ok_or_else(|| syntax(line, "missing command"))?;
    Ok(SourceCommand{ line, label, marker, mnemonic, operands: tokens.collect() })
}

/// Parses a script file into its `== FILE` sections.
pub fn parse_script(text: &str) -> Result<Vec<SourceFile>, EncodeError> {
    let mut files: Vec<SourceFile> = Vec::new();
    for (n, raw) in text.lines().enumerate() {
        let line = n + 1;
        let content = raw.trim();
        if content.is_empty() || content.starts_with("//") {
            continue;
        }

        if let Some(rest) = content.strip_prefix("==>") {
            let tokens = tokenize(rest, line)?;
            let table = match files.last_mut().map(|f| &mut f.body) {
                Some(SourceBody::Tables{ tables, .. }) => tables.last_mut(),
                _ => None,
            }.ok_or_else(|| syntax(line, "line outside of a table"))?;
            let header = match tokens.as_slice() {
                [] => None,
                [ def, verb, noun1, noun2 ] if def == "DEF" => Some(LineHeader{
                    verb: parse_u16(verb, line, "verb")?,
                    noun1: parse_u16(noun1, line, "noun")?,
                    noun2: parse_u16(noun2, line, "noun")?,
                }),
                _ => return Err(syntax(line, "expected ==> or ==> DEF <verb> <noun1> <noun2>")),
            };
            if header.is_some() != (table.number == 0) {
                return Err(syntax(line, "DEF is required in table 0 and not allowed elsewhere"));
            }
            table.lines.push(SourceLine{ line, header, commands: Vec::new() });
        } else if let Some(rest) = content.strip_prefix("==") {
            let tokens = tokenize(rest, line)?;
            match tokens.first().map(|s| s.as_str()) {
                Some("FILE") => {
                    let name = tokens.get(1).ok_or_else(|| syntax(line, "missing file name"))?.clone();
                    let body = match &tokens[2..] {
                        [ raw ] if raw == "RAW" => SourceBody::Raw,
                        [] => return Err(syntax(line, "missing table ranges")),
                        ranges => SourceBody::Tables{ ranges: parse_ranges(ranges, line)?, tables: Vec::new() },
                    };
                    files.push(SourceFile{ line, name, body });
                },
                Some("TABLE") => {
                    let number = match tokens.as_slice() {
                        [ _, number ] => parse_u16(number, line, "table number")?,
                        _ => return Err(syntax(line, "expected == TABLE <number>")),
                    };
                    match files.last_mut().map(|f| &mut f.body) {
                        Some(SourceBody::Tables{ tables, .. }) => tables.push(SourceTable{ line, number, lines: Vec::new() }),
                        _ => return Err(syntax(line, "table outside of a script file")),
                    }
                },
                _ => return Err(syntax(line, "expected == FILE or == TABLE")),
            }
        } else {
            let tokens = tokenize(content, line)?;
            if tokens.is_empty() {
                continue;
            }
            let target = match files.last_mut().map(|f| &mut f.body) {
                Some(SourceBody::Tables{ tables, .. }) => tables.last_mut().and_then(|t| t.lines.last_mut()),
                _ => None,
            }.ok_or_else(|| syntax(line, "command outside of a line"))?;
            target.commands.push(parse_command(tokens, line)?);
        }
    }
    Ok(files)
}

struct Fixup {
    line: usize,
    label: String,
    position: (usize, usize, usize, usize),
}

/// Turns parsed script files back into record bytes. Strings referenced by text are looked
/// up in `symbols`; new strings go to the pool.
pub struct Assembler<'a> {
    set: &'a InstructionSet,
    symbols: &'a Symbols,
    pool: StringPool,
}

impl<'a> Assembler<'a> {
    pub fn new(set: &'a InstructionSet, symbols: &'a Symbols, pool: StringPool) -> Self {
        Assembler{ set, symbols, pool }
    }

    pub fn pool(&self) -> &StringPool {
        &self.pool
    }

    pub fn into_pool(self) -> StringPool {
        self.pool
    }

    fn text_known(&self, id: u32) -> bool {
        self.symbols.text(id).is_some() || self.pool.get(id).is_some()
    }

    fn parse_text(&mut self, token: &str, line: usize, texts: Option<&Range<u32>>, file: &str) -> Result<TextRef, EncodeError> {
        let in_file = |id: u32| id < TEXT_BASE || texts.map_or(true, |r| r.contains(&id));
        match token {
            "-1" => return Ok(TextRef::None),
            "-3" => return Ok(TextRef::Special),
            _ => { },
        }
        if let Some(quoted) = token.strip_prefix('+') {
            let text = unquote(quoted, line)?.ok_or_else(|| malformed(line, token, "expected +\"text\""))?;
            let id = self.pool.add(&text).ok_or_else(|| malformed(line, token, "no global string ids left"))?;
            debug!("line {}: new string {} {:?}", line, id, text);
            return Ok(TextRef::Id(id));
        }
        if let Some(text) = unquote(token, line)? {
            let id = self.symbols.find_text(&text, in_file)
                .ok_or_else(|| EncodeError::UnresolvedReference{ line, reference: token.to_string() })?;
            return Ok(TextRef::Id(id));
        }
        let id = token.parse::<u32>().map_err(|_| malformed(line, token, "expected a string id or quoted text"))?;
        if !in_file(id) {
            return Err(EncodeError::TextOutOfRange{ line, id, file: file.to_string() });
        }
        if !self.text_known(id) {
            return Err(EncodeError::UnresolvedReference{ line, reference: token.to_string() });
        }
        Ok(TextRef::Id(id))
    }

    fn parse_item(&self, token: &str, line: usize) -> Result<ItemRef, EncodeError> {
        if token.starts_with('$') {
            return script::special_item_code(token)
                .map(ItemRef::Special)
                .ok_or_else(|| malformed(line, token, "unknown special item"));
        }
        let inner = token.strip_prefix('<').and_then(|t| t.strip_suffix('>'))
            .ok_or_else(|| malformed(line, token, "expected <item> or $NAME"))?;
        if let Some(name) = unquote(inner, line)? {
            let found = self.symbols.find_items(&name);
            return match found.as_slice() {
                [ item ] => Ok(ItemRef::Id(*item)),
                [] => Err(EncodeError::UnresolvedReference{ line, reference: token.to_string() }),
                _ => Err(malformed(line, token, format!("name is shared by items {:?}", found))),
            };
        }
        let item = inner.parse::<u32>().map_err(|_| malformed(line, token, "bad item number"))?;
        if item == 1 {
            return Err(malformed(line, token, "item 1 cannot be referenced directly"));
        }
        if item != 0 && item >= self.symbols.item_count {
            return Err(EncodeError::UnresolvedReference{ line, reference: token.to_string() });
        }
        Ok(ItemRef::Id(item))
    }

    fn parse_operand(&mut self, arg: Arg, token: &str, line: usize, texts: Option<&Range<u32>>, file: &str) -> Result<Operand, EncodeError> {
        let operand = match arg {
            Arg::Byte => {
                match token.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
                    Some(var) => Operand::Variable(var.parse::<u8>().map_err(|_| malformed(line, token, "bad variable"))?),
                    None => {
                        let value = token.parse::<u8>().map_err(|_| malformed(line, token, "expected a byte"))?;
                        if value == 0xff {
                            return Err(malformed(line, token, "255 is only written as a variable"));
                        }
                        Operand::RawByte(value)
                    },
                }
            },
            Arg::Item => Operand::ObjectRef(self.parse_item(token, line)?),
            Arg::Text => Operand::StringRef(self.parse_text(token, line, texts, file)?),
            Arg::Jump => Operand::JumpTarget(0),
            Arg::List => {
                let inner = token.strip_prefix('{').and_then(|t| t.strip_suffix('}'))
                    .ok_or_else(|| malformed(line, token, "expected {a,b,...}"))?;
                let mut values = Vec::new();
                for value in inner.split(',').filter(|v| !v.is_empty()) {
                    let value = value.trim().parse::<u16>().map_err(|_| malformed(line, token, "bad list value"))?;
                    if value == LIST_END {
                        return Err(malformed(line, token, "list values end at 65535"));
                    }
                    values.push(value);
                }
                Operand::ArgList(values)
            },
            Arg::Voice | Arg::Number | Arg::Variable | Arg::Property | Arg::Noun | Arg::Adjective => {
                Operand::Immediate(arg, token.parse::<u16>().map_err(|_| malformed(line, token, "expected a number"))?)
            },
        };
        Ok(operand)
    }

    fn encode_command(&mut self, source: &SourceCommand, offset: usize, texts: Option<&Range<u32>>, file: &str,
                      fixups: &mut Vec<Fixup>, at: (usize, usize, usize)) -> Result<Command, EncodeError> {
        let line = source.line;
        let op = self.set.lookup(&source.mnemonic)
            .ok_or_else(|| EncodeError::UnknownMnemonic{ line, mnemonic: source.mnemonic.clone() })?;
        let (opcode, args) = (op.code, op.args);
        if let Some(marker) = &source.marker {
            let found = u8::from_str_radix(&marker[3..marker.len() - 1], 16).ok();
            if found != Some(opcode) {
                return Err(EncodeError::OpcodeMismatch{ line, mnemonic: source.mnemonic.clone(), expected: opcode, found: marker.clone() });
            }
        }
        if args.len() != source.operands.len() {
            return Err(EncodeError::ParameterCount{
                line, mnemonic: source.mnemonic.clone(), expected: args.len(), found: source.operands.len() });
        }

        let mut operands = Vec::with_capacity(args.len());
        for (n, (&arg, token)) in args.iter().zip(&source.operands).enumerate() {
            if arg == Arg::Jump {
                match token.parse::<u16>() {
                    Ok(target) => operands.push(Operand::JumpTarget(target)),
                    Err(_) => {
                        fixups.push(Fixup{ line, label: token.clone(), position: (at.0, at.1, at.2, n) });
                        operands.push(Operand::JumpTarget(0));
                    },
                }
                continue;
            }
            operands.push(self.parse_operand(arg, token, line, texts, file)?);
        }
        Ok(Command{ offset, opcode, operands })
    }

    /// First pass lays out every command and collects label positions, second pass patches jumps.
    fn build_tables(&mut self, file: &SourceFile, tables: &[SourceTable], texts: Option<&Range<u32>>) -> Result<Vec<Table>, EncodeError> {
        let mut position = 0usize;
        let mut labels: HashMap<&str, usize> = HashMap::new();
        let mut fixups = Vec::new();
        let mut out: Vec<Table> = Vec::with_capacity(tables.len());
        for table in tables {
            position += 4;
            let mut lines = Vec::with_capacity(table.lines.len());
            for source in &table.lines {
                position += 2 + script::header_len(table.number);
                let mut commands = Vec::with_capacity(source.commands.len());
                for command in &source.commands {
                    if let Some(label) = &command.label {
                        if labels.insert(label.as_str(), position).is_some() {
                            return Err(EncodeError::DuplicateLabel{ line: command.line, label: label.clone() });
                        }
                    }
                    let at = (out.len(), lines.len(), commands.len());
                    let encoded = self.encode_command(command, position, texts, &file.name, &mut fixups, at)?;
                    position += encoded.encoded_len();
                    commands.push(encoded);
                }
                position += 1;
                lines.push(Line{ header: source.header, commands });
            }
            position += 2;
            out.push(Table{ number: table.number, lines });
        }

        for fixup in fixups {
            let target = *labels.get(fixup.label.as_str())
                .ok_or_else(|| EncodeError::UndefinedLabel{ line: fixup.line, label: fixup.label.clone() })?;
            let target = u16::try_from(target)
                .map_err(|_| malformed(fixup.line, &fixup.label, "label lies beyond the 16-bit jump range"))?;
            let (t, l, c, o) = fixup.position;
            out[t].lines[l].commands[c].operands[o] = Operand::JumpTarget(target);
        }
        Ok(out)
    }

    /// Encodes one script file. `texts` limits the external strings it may reference.
    pub fn assemble(&mut self, file: &SourceFile, texts: Option<Range<u32>>) -> Result<Vec<u8>, EncodeError> {
        let (ranges, tables) = match &file.body {
            SourceBody::Tables{ ranges, tables } => (ranges, tables),
            SourceBody::Raw => return Err(syntax(file.line, format!("{} holds no tables", file.name))),
        };
        if let Err(script::ScriptError::TableOutOfRange{ number, ranges }) =
            script::validate_ranges(tables.iter().map(|t| t.number), ranges) {
            let line = tables.iter().find(|t| t.number == number).map_or(file.line, |t| t.line);
            return Err(EncodeError::TableOutOfRange{ line, number, ranges });
        }
        let tables = self.build_tables(file, tables, texts.as_ref())?;
        script::write_tables(&tables).map_err(|e| malformed(file.line, &file.name, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disassemble;
    use crate::label;
    use crate::opcode::OpDef;
    use crate::print::{self, Formatter};
    use pretty_assertions::assert_eq;

    static TINY: &[OpDef] = &[
        (0x01, Some("PRINT"), &[ Arg::Text ]),
        (0x02, Some("JUMP"), &[ Arg::Jump ]),
        (0x03, Some("END"), &[]),
        (0x04, Some("PUT"), &[ Arg::Byte, Arg::Item, Arg::List ]),
    ];

    fn symbols() -> Symbols {
        let mut symbols = Symbols::default();
        symbols.texts.insert(0, "NONE".into());
        symbols.texts.insert(1, "LAMP".into());
        symbols.texts.insert(0x8000, "HELLO".into());
        symbols.texts.insert(0x8001, "WORLD".into());
        symbols.texts.insert(0x9000, "ELSEWHERE".into());
        symbols.item_names.insert(2, 1);
        symbols.item_count = 10;
        symbols
    }

    fn assemble(source: &str, texts: Option<Range<u32>>) -> Result<Vec<u8>, EncodeError> {
        let set = InstructionSet::new("tiny", &[ TINY ]);
        let symbols = symbols();
        let files = parse_script(source)?;
        let mut assembler = Assembler::new(&set, &symbols, StringPool::new(2));
        assembler.assemble(&files[0], texts)
    }

    const PRINT_JUMP: &str = "== FILE TABLES01 ~\n== TABLE 1\n==>\n\tPRINT 32768\n\tJUMP L0002\n\tL0002: PRINT 32769\n\tEND\n";

    #[test]
    fn recompiles_forward_jump() {
        let set = InstructionSet::new("tiny", &[ TINY ]);
        let data = assemble(PRINT_JUMP, None).unwrap();
        assert_eq!(data, vec![
            0, 0, 0, 1,
            0, 0,
            0x01, 0, 1, 0, 0, 0x80, 0x00,
            0x02, 0, 16,
            0x01, 0, 1, 0, 0, 0x80, 0x01,
            0x03,
            0xff,
            0, 1,
            0, 1,
        ]);
        let stream = disassemble::decode_record(&data, &set).unwrap();
        assert_eq!(stream.instruction_count(), 4);
        let print = stream.commands().nth(2).unwrap();
        assert_eq!(print.offset, 16);
        assert_eq!(stream.commands().nth(1).unwrap().operands, vec![ Operand::JumpTarget(16) ]);
    }

    #[test]
    fn decompile_then_recompile() {
        let set = InstructionSet::new("tiny", &[ TINY ]);
        let symbols = symbols();
        let original = vec![
            0, 0, 0, 0,
            0, 0, 0, 7, 0, 8, 0, 9,
            0x04, 0xff, 3, 0, 0, 0, 0, 0, 0, 0, 5, 0xff, 0xff,
            0x01, 0, 0,
            0x02, 0, 12,
            0xff,
            0, 1,
            0, 1,
        ];
        let stream = disassemble::decode_record(&original, &set).unwrap();
        let labels = label::find_labels(&stream).unwrap();
        let mut text = String::new();
        print::file_header(&mut text, "TABLES01", &[]);
        Formatter::new(&set, &labels, &symbols, None).format_tables(&mut text, &stream);
        assert_eq!(text, concat!(
            "== FILE TABLES01 ~\n",
            "== TABLE 0\n",
            "==> DEF 7 8 9\n",
            "\tL0000: (0x04) PUT [3] <2> {5} // <LAMP>\n",
            "\t(0x01) PRINT -1\n",
            "\t(0x02) JUMP L0000\n",
        ));

        let files = parse_script(&text).unwrap();
        let mut assembler = Assembler::new(&set, &symbols, StringPool::new(2));
        assert_eq!(assembler.assemble(&files[0], None).unwrap(), original);
    }

    #[test]
    fn text_references() {
        let source = |operand: &str| format!("== FILE TABLES01 ~\n== TABLE 1\n==>\n\tPRINT {}\n", operand);
        let id = |data: Vec<u8>| u32::from_be_bytes([ data[9], data[10], data[11], data[12] ]);
        assert_eq!(id(assemble(&source("\"WORLD\""), None).unwrap()), 0x8001);
        assert_eq!(id(assemble(&source("\"LAMP\""), Some(0x8000..0x8002)).unwrap()), 1);
        assert_eq!(id(assemble(&source("+\"NEW \\\"ONE\\\"\""), None).unwrap()), 2);
        assert_eq!(assemble(&source("\"ELSEWHERE\""), Some(0x8000..0x8002)),
            Err(EncodeError::UnresolvedReference{ line: 4, reference: "\"ELSEWHERE\"".into() }));
        assert_eq!(assemble(&source("36864"), Some(0x8000..0x8002)),
            Err(EncodeError::TextOutOfRange{ line: 4, id: 0x9000, file: "TABLES01".into() }));
        assert_eq!(assemble(&source("36864"), None).map(id), Ok(0x9000));
        assert_eq!(assemble(&source("40000"), None),
            Err(EncodeError::UnresolvedReference{ line: 4, reference: "40000".into() }));
        assert_eq!(assemble(&source("\"GOODBYE\""), None),
            Err(EncodeError::UnresolvedReference{ line: 4, reference: "\"GOODBYE\"".into() }));
    }

    #[test]
    fn new_strings_share_one_pool() {
        let set = InstructionSet::new("tiny", &[ TINY ]);
        let symbols = symbols();
        let files = parse_script(concat!(
            "== FILE TABLES01 ~\n== TABLE 1\n==>\n\tPRINT +\"A\" // \"quoted // comment\"\n",
            "== FILE TABLES02 ~\n== TABLE 2\n==>\n\tPRINT +\"B\"\n\tPRINT +\"A\"\n",
        )).unwrap();
        let mut assembler = Assembler::new(&set, &symbols, StringPool::new(0x7ffe));
        assembler.assemble(&files[0], None).unwrap();
        assembler.assemble(&files[1], None).unwrap();
        assert_eq!(assembler.pool().get(0x7fff), Some("B"));
        assert_eq!(assembler.into_pool().added(), &[ "A".to_string(), "B".to_string() ]);

        let mut full = Assembler::new(&set, &symbols, StringPool::new(0x7fff));
        assert!(matches!(full.assemble(&files[1], None), Err(EncodeError::MalformedOperand{ line: 9, .. })));
        let mut capped = StringPool::bounded(5, 6);
        assert_eq!(capped.add("X"), Some(5));
        assert_eq!(capped.add("Y"), None);
        assert_eq!(capped.add("X"), Some(5));
        assert_eq!(StringPool::bounded(0x7fff, 0x9000).add("Z"), Some(0x7fff));
        assert_eq!(StringPool::bounded(0x8000, 0x9000).add("Z"), None);
    }

    #[test]
    fn item_references() {
        let source = |operand: &str| format!("== FILE T ~\n== TABLE 1\n==>\n\tPUT 1 {} {{}}\n", operand);
        assert!(assemble(&source("$AC"), None).is_ok());
        assert!(assemble(&source("<\"LAMP\">"), None).is_ok());
        assert!(assemble(&source("<0>"), None).is_ok());
        assert!(matches!(assemble(&source("<1>"), None), Err(EncodeError::MalformedOperand{ .. })));
        assert!(matches!(assemble(&source("$XY"), None), Err(EncodeError::MalformedOperand{ .. })));
        assert!(matches!(assemble(&source("<10>"), None), Err(EncodeError::UnresolvedReference{ .. })));
        assert!(matches!(assemble(&source("<\"NOBODY\">"), None), Err(EncodeError::UnresolvedReference{ .. })));
    }

    #[test]
    fn parser_errors() {
        let body = |command: &str| format!("== FILE TABLES01 ~\n== TABLE 1\n==>\n\t{}\n", command);
        assert_eq!(assemble(&body("SHOUT 1"), None),
            Err(EncodeError::UnknownMnemonic{ line: 4, mnemonic: "SHOUT".into() }));
        assert_eq!(assemble(&body("(0x02) END"), None),
            Err(EncodeError::OpcodeMismatch{ line: 4, mnemonic: "END".into(), expected: 3, found: "(0x02)".into() }));
        assert!(assemble(&body("(0x03) END"), None).is_ok());
        assert_eq!(assemble(&body("PRINT"), None),
            Err(EncodeError::ParameterCount{ line: 4, mnemonic: "PRINT".into(), expected: 1, found: 0 }));
        assert!(matches!(assemble(&body("PUT 255 $ME {}"), None), Err(EncodeError::MalformedOperand{ line: 4, .. })));
        assert!(matches!(assemble(&body("PUT x $ME {}"), None), Err(EncodeError::MalformedOperand{ line: 4, .. })));
        assert_eq!(assemble(&body("JUMP NOWHERE"), None),
            Err(EncodeError::UndefinedLabel{ line: 4, label: "NOWHERE".into() }));
        assert_eq!(assemble(&body("A: END\n\tA: END"), None),
            Err(EncodeError::DuplicateLabel{ line: 5, label: "A".into() }));
        assert!(matches!(assemble(&body("PRINT \"open"), None), Err(EncodeError::Syntax{ line: 4, .. })));
        assert!(matches!(parse_script("\tEND\n"), Err(EncodeError::Syntax{ line: 1, .. })));
        assert!(matches!(parse_script("== FILE T ~\n== TABLE 0\n==>\n"), Err(EncodeError::Syntax{ line: 3, .. })));
        assert!(matches!(parse_script("== FILE T 5:1\n"), Err(EncodeError::Syntax{ line: 1, .. })));
    }

    #[test]
    fn table_ranges_are_enforced() {
        let source = "== FILE TABLES01 1:5 10:12\n== TABLE 3\n==>\n\tEND\n== TABLE 7\n==>\n\tEND\n";
        assert_eq!(assemble(source, None),
            Err(EncodeError::TableOutOfRange{ line: 5, number: 7, ranges: "1:5 10:12".into() }));
        assert!(assemble(&source.replace("TABLE 7", "TABLE 11"), None).is_ok());
    }

    #[test]
    fn raw_files_parse_but_do_not_assemble() {
        let files = parse_script("== FILE TABLES09 RAW // unknown opcode\n").unwrap();
        assert_eq!(files, vec![ SourceFile{ line: 1, name: "TABLES09".into(), body: SourceBody::Raw } ]);
        assert!(assemble("== FILE TABLES09 RAW\n", None).is_err());
        assert!(matches!(parse_script("== FILE TABLES09 RAW\n== TABLE 1\n"), Err(EncodeError::Syntax{ line: 2, .. })));
    }

    #[test]
    fn recompile_is_deterministic() {
        assert_eq!(assemble(PRINT_JUMP, None).unwrap(), assemble(PRINT_JUMP, None).unwrap());
        assert!(assemble("== FILE EMPTY ~\n", None).unwrap().is_empty());
    }
}
