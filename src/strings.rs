use std::collections::VecDeque;
use std::fmt::Write;
use std::ops::Range;

use indexmap::IndexMap;
use thiserror::Error;

use crate::codepage::{EncodingError, Language};
use crate::stream::{self, Stream, StreamError};

/// First string id of the external text files; lower ids live in the basefile.
pub const TEXT_BASE: u32 = 0x8000;

const TEXT_INDEX_NAME_LEN: usize = 7;

#[derive(Debug, Error, PartialEq)]
pub enum StringsError {
    #[error("string table of {length} bytes does not end with a terminator")]
    MissingTerminator{ length: usize },
    #[error("text index: {0}")]
    Index(#[from] StreamError),
    #[error("text index name {0:?} is not ascii")]
    IndexName(String),
    #[error("line {line}: {reason}")]
    Syntax{ line: usize, reason: String },
    #[error("{file}: expected string {expected} but found {found}")]
    NonContiguous{ file: String, expected: u32, found: u32 },
}

/// NUL separated strings with consecutive ids starting at `base`.
#[derive(Debug, Clone, PartialEq)]
pub struct StringTable {
    pub base: u32,
    pub entries: Vec<Vec<u8>>,
}

impl StringTable {
    pub fn from_bytes(base: u32, data: &[u8]) -> Result<StringTable, StringsError> {
        if data.is_empty() {
            return Ok(StringTable{ base, entries: Vec::new() });
        }
        if data[data.len() - 1] != 0 {
            return Err(StringsError::MissingTerminator{ length: data.len() });
        }
        let entries = data[..data.len() - 1].split(|&c| c == 0).map(|s| s.to_vec()).collect();
        Ok(StringTable{ base, entries })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for entry in &self.entries {
            stream::put_cstr(&mut out, entry);
        }
        out
    }

    pub fn ids(&self) -> Range<u32> {
        self.base..self.base + self.entries.len() as u32
    }

    pub fn get(&self, id: u32) -> Option<&[u8]> {
        if id < self.base {
            return None;
        }
        self.entries.get((id - self.base) as usize).map(|e| e.as_slice())
    }

    pub fn decode(&self, language: Language) -> Vec<String> {
        self.entries.iter().map(|e| language.decode(e)).collect()
    }

    pub fn encode(base: u32, lines: &[String], language: Language) -> Result<StringTable, EncodingError> {
        let entries = lines.iter()
            .map(|line| language.encode(line))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(StringTable{ base, entries })
    }
}

/// One entry of the text file index.
#[derive(Debug, Clone, PartialEq)]
pub struct TextIndexEntry {
    pub name: String,
    pub base_max: u16,
}

pub fn read_text_index(data: &[u8]) -> Result<Vec<TextIndexEntry>, StringsError> {
    let mut rdr = Stream::new(data);
    let mut index = Vec::new();
    while !rdr.end_of_stream() {
        let name = rdr.get_padded(TEXT_INDEX_NAME_LEN)?;
        if !name.is_ascii() {
            return Err(StringsError::IndexName(String::from_utf8_lossy(name).into_owned()));
        }
        let name = String::from_utf8_lossy(name).into_owned();
        let base_max = rdr.get_u16_be()?;
        index.push(TextIndexEntry{ name, base_max });
    }
    Ok(index)
}

pub fn write_text_index(index: &[TextIndexEntry]) -> Result<Vec<u8>, StringsError> {
    let mut out = Vec::new();
    for entry in index {
        stream::put_padded(&mut out, entry.name.as_bytes(), TEXT_INDEX_NAME_LEN)?;
        stream::put_u16_be(&mut out, entry.base_max);
    }
    Ok(out)
}

/// First string id of every indexed text file. The engine only advances past a
/// file's upper bound once that file held at least one string.
pub fn text_bases(index: &[TextIndexEntry], is_empty: impl Fn(&str) -> bool) -> Vec<u32> {
    let mut base = TEXT_BASE;
    let mut pending = VecDeque::new();
    let mut bases = Vec::with_capacity(index.len());
    for entry in index {
        pending.push_back(entry.base_max as u32);
        bases.push(base);
        if !is_empty(&entry.name) {
            if let Some(next) = pending.pop_front() {
                base = next;
            }
        }
    }
    bases
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringEntry {
    pub file: String,
    pub id: u32,
    pub text: String,
    pub voices: Option<Vec<u16>>,
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 || c == '\x7f' => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            },
            c => out.push(c),
        }
    }
    out
}

pub fn unescape(text: &str, line: usize) -> Result<String, StringsError> {
    let bad = |reason: &str| StringsError::Syntax{ line, reason: reason.to_string() };
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                let value = u8::from_str_radix(&hex, 16).map_err(|_| bad("bad \\x escape"))?;
                if hex.len() != 2 {
                    return Err(bad("bad \\x escape"));
                }
                out.push(value as char);
            },
            _ => return Err(bad("unknown escape sequence")),
        }
    }
    Ok(out)
}

/// Serializes strings as `FILE<TAB>ID<TAB>TEXT[<TAB>VOICES]`, one entry per line.
pub fn write_strings(entries: &[StringEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let _ = write!(out, "{}\t{}\t{}", entry.file, entry.id, escape(&entry.text));
        if let Some(voices) = &entry.voices {
            if voices.is_empty() {
                out.push_str("\t-1");
            } else {
                let joined: Vec<String> = voices.iter().map(|v| v.to_string()).collect();
                let _ = write!(out, "\t{}", joined.join(","));
            }
        }
        out.push('\n');
    }
    out
}

pub fn read_strings(text: &str) -> Result<Vec<StringEntry>, StringsError> {
    let mut entries = Vec::new();
    for (n, raw) in text.lines().enumerate() {
        let line = n + 1;
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if raw.is_empty() {
            continue;
        }
        let fields: Vec<&str> = raw.split('\t').collect();
        if fields.len() < 3 || fields.len() > 4 {
            return Err(StringsError::Syntax{ line, reason: format!("expected 3 or 4 fields, found {}", fields.len()) });
        }
        let id = fields[1].parse::<u32>()
            .map_err(|_| StringsError::Syntax{ line, reason: format!("bad string id '{}'", fields[1]) })?;
        let voices = match fields.get(3) {
            None => None,
            Some(&"-1") => Some(Vec::new()),
            Some(list) => Some(list.split(',')
                .map(|v| v.trim().parse::<u16>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| StringsError::Syntax{ line, reason: format!("bad voice list '{}'", list) })?),
        };
        entries.push(StringEntry{ file: fields[0].to_string(), id, text: unescape(fields[2], line)?, voices });
    }
    Ok(entries)
}

/// Groups entries by file, keeping first-seen file order.
pub fn group_strings(entries: Vec<StringEntry>) -> IndexMap<String, Vec<StringEntry>> {
    let mut groups: IndexMap<String, Vec<StringEntry>> = IndexMap::new();
    for entry in entries {
        groups.entry(entry.file.clone()).or_default().push(entry);
    }
    groups
}

/// Texts of one file, which must carry consecutive ids from `base`.
pub fn contiguous_lines(file: &str, entries: &[StringEntry], base: u32) -> Result<Vec<String>, StringsError> {
    let mut lines = Vec::with_capacity(entries.len());
    for (n, entry) in entries.iter().enumerate() {
        let expected = base + n as u32;
        if entry.id != expected {
            return Err(StringsError::NonContiguous{ file: file.to_string(), expected, found: entry.id });
        }
        lines.push(entry.text.clone());
    }
    Ok(lines)
}
