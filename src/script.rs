use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::opcode::{Arg, END_OF_LINE, LIST_END};
use crate::stream::{self, Stream, StreamError};

/// Marker words framing tables and lines.
pub const MARK_CONTINUE: u16 = 0;
pub const MARK_END: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRef {
    /// Stored as kind 0, written `-1`.
    None,
    /// Stored as kind 3, written `-3`.
    Special,
    Id(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemRef {
    Special(u16),
    Id(u32),
}

/// Reserved item selectors and their names.
pub static SPECIAL_ITEMS: [(u16, &str); 5] = [
    (1, "$1"),
    (3, "$2"),
    (5, "$ME"),
    (7, "$AC"),
    (9, "$RM"),
];

pub fn special_item_name(code: u16) -> Option<&'static str> {
    SPECIAL_ITEMS.iter().find(|(c, _)| *c == code).map(|(_, name)| *name)
}

pub fn special_item_code(name: &str) -> Option<u16> {
    SPECIAL_ITEMS.iter().find(|(_, n)| *n == name).map(|(code, _)| *code)
}

const ITEM_NONE: u32 = 0xffff_ffff;

/// Item ids are stored shifted past the null and player items.
pub fn read_item(rdr: &mut Stream) -> Result<u32, StreamError> {
    let value = rdr.get_u32_be()?;
    Ok(if value == ITEM_NONE { 0 } else { value.wrapping_add(2) })
}

/// Item 1 (the player) has no stored form.
pub fn write_item(out: &mut Vec<u8>, item: u32) -> Result<(), u32> {
    match item {
        0 => stream::put_u32_be(out, ITEM_NONE),
        1 => return Err(item),
        n => stream::put_u32_be(out, n - 2),
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    RawByte(u8),
    /// `FF nn`
    Variable(u8),
    /// Any of the plain u16 kinds.
    Immediate(Arg, u16),
    StringRef(TextRef),
    ObjectRef(ItemRef),
    JumpTarget(u16),
    ArgList(Vec<u16>),
}

impl Operand {
    pub fn write(&self, out: &mut Vec<u8>) -> Result<(), ScriptError> {
        match self {
            Operand::RawByte(b) => out.push(*b),
            Operand::Variable(b) => out.extend_from_slice(&[ 0xff, *b ]),
            Operand::Immediate(_, v) => stream::put_u16_be(out, *v),
            Operand::StringRef(text) => {
                match text {
                    TextRef::None => stream::put_u16_be(out, 0),
                    TextRef::Special => stream::put_u16_be(out, 3),
                    TextRef::Id(id) => {
                        stream::put_u16_be(out, 1);
                        stream::put_u32_be(out, *id);
                    },
                }
            },
            Operand::ObjectRef(item) => {
                match item {
                    ItemRef::Special(code) => stream::put_u16_be(out, *code),
                    ItemRef::Id(id) => {
                        stream::put_u16_be(out, 0);
                        write_item(out, *id).map_err(ScriptError::UnencodableItem)?;
                    },
                }
            },
            Operand::JumpTarget(target) => stream::put_u16_be(out, *target),
            Operand::ArgList(values) => {
                for v in values {
                    stream::put_u16_be(out, *v);
                }
                stream::put_u16_be(out, LIST_END);
            },
        }
        Ok(())
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            Operand::RawByte(_) => 1,
            Operand::Variable(_) => 2,
            Operand::Immediate(..) | Operand::JumpTarget(_) => 2,
            Operand::StringRef(TextRef::Id(_)) => 6,
            Operand::StringRef(_) => 2,
            Operand::ObjectRef(ItemRef::Id(_)) => 6,
            Operand::ObjectRef(_) => 2,
            Operand::ArgList(values) => 2 * (values.len() + 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Start of the command within its record.
    pub offset: usize,
    pub opcode: u8,
    pub operands: Vec<Operand>,
}

impl Command {
    pub fn write(&self, out: &mut Vec<u8>) -> Result<(), ScriptError> {
        out.push(self.opcode);
        for operand in &self.operands {
            operand.write(out)?;
        }
        Ok(())
    }

    pub fn encoded_len(&self) -> usize {
        1 + self.operands.iter().map(|o| o.encoded_len()).sum::<usize>()
    }
}

/// Verb and nouns that select a line of table 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineHeader {
    pub verb: u16,
    pub noun1: u16,
    pub noun2: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub header: Option<LineHeader>,
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub number: u16,
    pub lines: Vec<Line>,
}

/// Decoded tables of one record plus the start offset of every command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScriptStream {
    pub tables: Vec<Table>,
    /// Byte offset of each command start to its ordinal in decode order.
    pub starts: BTreeMap<usize, usize>,
}

impl ScriptStream {
    pub fn new(tables: Vec<Table>) -> ScriptStream {
        let mut starts = BTreeMap::new();
        for (ordinal, command) in tables.iter().flat_map(|t| &t.lines).flat_map(|l| &l.commands).enumerate() {
            starts.insert(command.offset, ordinal);
        }
        ScriptStream{ tables, starts }
    }

    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.tables.iter().flat_map(|t| &t.lines).flat_map(|l| &l.commands)
    }

    pub fn instruction_count(&self) -> usize {
        self.starts.len()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ScriptError {
    #[error("item {0} cannot be referenced directly")]
    UnencodableItem(u32),
    #[error("table {number} is outside the declared ranges {ranges}")]
    TableOutOfRange{ number: u16, ranges: String },
    #[error("table index: {0}")]
    Index(#[from] StreamError),
    #[error("table index names a non-ascii file {0:?}")]
    IndexName(String),
}

/// Record layout: `{ 00 00 table }* 00 01`. No tables encode to nothing.
pub fn write_tables(tables: &[Table]) -> Result<Vec<u8>, ScriptError> {
    let mut out = Vec::new();
    if tables.is_empty() {
        return Ok(out);
    }
    for table in tables {
        stream::put_u16_be(&mut out, MARK_CONTINUE);
        stream::put_u16_be(&mut out, table.number);
        for line in &table.lines {
            stream::put_u16_be(&mut out, MARK_CONTINUE);
            if let Some(header) = &line.header {
                stream::put_u16_be(&mut out, header.verb);
                stream::put_u16_be(&mut out, header.noun1);
                stream::put_u16_be(&mut out, header.noun2);
            }
            for command in &line.commands {
                command.write(&mut out)?;
            }
            out.push(END_OF_LINE);
        }
        stream::put_u16_be(&mut out, MARK_END);
    }
    stream::put_u16_be(&mut out, MARK_END);
    Ok(out)
}

pub fn header_len(table_number: u16) -> usize {
    if table_number == 0 { 6 } else { 0 }
}

/// Script file named by the table index and the table number ranges it serves.
#[derive(Debug, Clone, PartialEq)]
pub struct TableIndexEntry {
    pub file: String,
    pub ranges: Vec<(u16, u16)>,
}

pub fn format_ranges(ranges: &[(u16, u16)]) -> String {
    if ranges.is_empty() {
        return "~".to_string();
    }
    ranges.iter().map(|(min, max)| format!("{}:{}", min, max)).collect::<Vec<_>>().join(" ")
}

pub fn read_table_index(data: &[u8]) -> Result<Vec<TableIndexEntry>, ScriptError> {
    let mut rdr = Stream::new(data);
    let mut index = Vec::new();
    loop {
        let name = rdr.get_cstr();
        if name.is_empty() {
            break;
        }
        if !name.is_ascii() {
            return Err(ScriptError::IndexName(String::from_utf8_lossy(name).into_owned()));
        }
        let mut ranges = Vec::new();
        loop {
            let min = rdr.get_u16_be()?;
            if min == 0 {
                break;
            }
            let max = rdr.get_u16_be()?;
            ranges.push((min, max));
        }
        index.push(TableIndexEntry{ file: String::from_utf8_lossy(name).into_owned(), ranges });
    }
    Ok(index)
}

pub fn write_table_index(index: &[TableIndexEntry]) -> Vec<u8> {
    let mut out = Vec::new();
    for entry in index {
        stream::put_cstr(&mut out, entry.file.as_bytes());
        for (min, max) in &entry.ranges {
            stream::put_u16_be(&mut out, *min);
            stream::put_u16_be(&mut out, *max);
        }
        stream::put_u16_be(&mut out, 0);
    }
    out.push(0);
    out
}

/// Tables must appear in ascending order, each inside one of the ranges, which are
/// visited in order. No ranges means anything goes.
pub fn validate_ranges<I: IntoIterator<Item = u16>>(numbers: I, ranges: &[(u16, u16)]) -> Result<(), ScriptError> {
    if ranges.is_empty() {
        return Ok(());
    }
    let mut current = 0;
    let mut low = ranges[0].0;
    for number in numbers {
        while !(number >= low && number <= ranges[current].1) {
            current += 1;
            if current >= ranges.len() {
                return Err(ScriptError::TableOutOfRange{ number, ranges: format_ranges(ranges) });
            }
            low = ranges[current].0;
        }
        low = number;
    }
    Ok(())
}

/// Display strings and object names available to scripts.
#[derive(Debug, Clone, Default)]
pub struct Symbols {
    pub texts: BTreeMap<u32, String>,
    /// Item id to the string id of its name.
    pub item_names: BTreeMap<u32, u32>,
    pub item_count: u32,
}

impl Symbols {
    pub fn text(&self, id: u32) -> Option<&str> {
        self.texts.get(&id).map(|s| s.as_str())
    }

    pub fn item_name(&self, item: u32) -> Option<&str> {
        self.item_names.get(&item).and_then(|&id| self.text(id))
    }

    /// Reverse lookup of a display string, lowest accepted id first.
    pub fn find_text(&self, text: &str, allowed: impl Fn(u32) -> bool) -> Option<u32> {
        self.texts.iter().find(|(id, t)| t.as_str() == text && allowed(**id)).map(|(id, _)| *id)
    }

    /// Items whose name is `name`.
    pub fn find_items(&self, name: &str) -> Vec<u32> {
        let mut by_name: HashMap<&str, Vec<u32>> = HashMap::new();
        for (&item, &text) in &self.item_names {
            if let Some(t) = self.text(text) {
                by_name.entry(t).or_default().push(item);
            }
        }
        by_name.remove(name).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operand_encodings() {
        let cases: Vec<(Operand, Vec<u8>)> = vec![
            (Operand::RawByte(7), vec![ 7 ]),
            (Operand::Variable(7), vec![ 0xff, 7 ]),
            (Operand::Immediate(Arg::Number, 0x1234), vec![ 0x12, 0x34 ]),
            (Operand::StringRef(TextRef::None), vec![ 0, 0 ]),
            (Operand::StringRef(TextRef::Special), vec![ 0, 3 ]),
            (Operand::StringRef(TextRef::Id(0x8001)), vec![ 0, 1, 0, 0, 0x80, 0x01 ]),
            (Operand::ObjectRef(ItemRef::Special(5)), vec![ 0, 5 ]),
            (Operand::ObjectRef(ItemRef::Id(0)), vec![ 0, 0, 0xff, 0xff, 0xff, 0xff ]),
            (Operand::ObjectRef(ItemRef::Id(12)), vec![ 0, 0, 0, 0, 0, 10 ]),
            (Operand::JumpTarget(0x20), vec![ 0, 0x20 ]),
            (Operand::ArgList(vec![ 1, 2 ]), vec![ 0, 1, 0, 2, 0xff, 0xff ]),
        ];
        for (operand, bytes) in cases {
            let mut out = Vec::new();
            operand.write(&mut out).unwrap();
            assert_eq!(out, bytes, "{:?}", operand);
            assert_eq!(operand.encoded_len(), bytes.len());
        }
        assert_eq!(Operand::ObjectRef(ItemRef::Id(1)).write(&mut Vec::new()), Err(ScriptError::UnencodableItem(1)));
    }

    #[test]
    fn item_references() {
        let data = [ 0xff, 0xff, 0xff, 0xff, 0, 0, 0, 3 ];
        let mut rdr = Stream::new(&data);
        assert_eq!(read_item(&mut rdr), Ok(0));
        assert_eq!(read_item(&mut rdr), Ok(5));
        assert_eq!(special_item_name(5), Some("$ME"));
        assert_eq!(special_item_code("$RM"), Some(9));
        assert_eq!(special_item_code("$XX"), None);
    }

    #[test]
    fn tables_layout() {
        let tables = vec![
            Table{ number: 0, lines: vec![ Line{
                header: Some(LineHeader{ verb: 1, noun1: 2, noun2: 3 }),
                commands: vec![ Command{ offset: 0, opcode: 0x45, operands: vec![] } ],
            } ] },
            Table{ number: 7, lines: vec![] },
        ];
        let data = write_tables(&tables).unwrap();
        assert_eq!(data, vec![
            0, 0, 0, 0,
            0, 0, 0, 1, 0, 2, 0, 3, 0x45, 0xff,
            0, 1,
            0, 0, 0, 7,
            0, 1,
            0, 1,
        ]);
        assert!(write_tables(&[]).unwrap().is_empty());
    }

    #[test]
    fn table_index_codec() {
        let index = vec![
            TableIndexEntry{ file: "TABLES01".into(), ranges: vec![ (1, 10), (20, 25) ] },
            TableIndexEntry{ file: "TABLES02".into(), ranges: vec![] },
        ];
        let data = write_table_index(&index);
        assert_eq!(&data[..9], b"TABLES01\0");
        assert_eq!(read_table_index(&data).unwrap(), index);
        assert_eq!(format_ranges(&index[0].ranges), "1:10 20:25");
        assert_eq!(format_ranges(&index[1].ranges), "~");
    }

    #[test]
    fn range_validation() {
        let ranges = [ (1, 10), (20, 25) ];
        assert!(validate_ranges(vec![ 1, 5, 10, 20, 25 ], &ranges).is_ok());
        assert!(validate_ranges(vec![ 3, 22 ], &ranges).is_ok());
        assert!(validate_ranges(vec![], &ranges).is_ok());
        assert_eq!(validate_ranges(vec![ 5, 3 ], &ranges),
            Err(ScriptError::TableOutOfRange{ number: 3, ranges: "1:10 20:25".into() }));
        assert!(validate_ranges(vec![ 15 ], &ranges).is_err());
        assert!(validate_ranges(vec![ 21, 5 ], &ranges).is_err());
        assert!(validate_ranges(vec![ 99 ], &[]).is_ok());
    }

    #[test]
    fn symbol_lookup() {
        let mut symbols = Symbols::default();
        symbols.texts.insert(4, "LAMP".into());
        symbols.texts.insert(0x8002, "LAMP".into());
        symbols.item_names.insert(3, 4);
        assert_eq!(symbols.find_text("LAMP", |_| true), Some(4));
        assert_eq!(symbols.find_text("LAMP", |id| id >= 0x8000), Some(0x8002));
        assert_eq!(symbols.find_text("NOPE", |_| true), None);
        assert_eq!(symbols.item_name(3), Some("LAMP"));
        assert_eq!(symbols.find_items("LAMP"), vec![ 3 ]);
    }
}
