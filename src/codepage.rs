use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use encoding_rs::Encoding;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Private use block that keeps bytes without a code page glyph addressable.
const UNMAPPED_BASE: u32 = 0xe000;

#[derive(Debug, Error, PartialEq)]
pub enum EncodingError {
    #[error("character {ch:?} at position {position} has no glyph in the {language} code page")]
    UnmappableGlyph{ ch: char, position: usize, language: Language },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[serde(alias = "identity")]
    Raw,
    #[serde(rename = "en")]
    English,
    #[serde(rename = "he")]
    Hebrew,
    #[serde(rename = "pl")]
    Polish,
    #[serde(rename = "ru")]
    Russian,
}

impl Language {
    pub fn tag(&self) -> &'static str {
        match self {
            Language::Raw => "raw",
            Language::English => "en",
            Language::Hebrew => "he",
            Language::Polish => "pl",
            Language::Russian => "ru",
        }
    }

    pub fn code_page(&self) -> &'static CodePage {
        match self {
            Language::Raw => &RAW,
            Language::English => &ENGLISH,
            Language::Hebrew => &HEBREW,
            Language::Polish => &POLISH,
            Language::Russian => &RUSSIAN,
        }
    }

    pub fn decode(&self, raw: &[u8]) -> String {
        self.code_page().decode(raw)
    }

    pub fn encode(&self, text: &str) -> Result<Vec<u8>, EncodingError> {
        self.code_page().encode(text)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" | "identity" => Ok(Language::Raw),
            "en" => Ok(Language::English),
            "he" => Ok(Language::Hebrew),
            "pl" => Ok(Language::Polish),
            "ru" => Ok(Language::Russian),
            _ => Err(format!("unknown language '{}'", s)),
        }
    }
}

/// Glyph table for one language. Byte 0 is the string terminator and is never part of
/// the encodable domain.
pub struct CodePage {
    language: Language,
    decode: [char; 256],
    encode: HashMap<char, u8>,
}

impl CodePage {
    fn build(language: Language, glyph: impl Fn(u8) -> Option<char>) -> CodePage {
        let mut decode = ['\0'; 256];
        let mut encode = HashMap::new();
        for b in 1..=255u8 {
            let ch = match glyph(b) {
                Some(ch) if !encode.contains_key(&ch) => ch,
                _ => unmapped(b),
            };
            decode[b as usize] = ch;
            encode.insert(ch, b);
        }
        CodePage{ language, decode, encode }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Byte values for which `encode(decode(b)) == b` holds.
    pub fn domain(&self) -> impl Iterator<Item = u8> {
        1..=255u8
    }

    pub fn decode(&self, raw: &[u8]) -> String {
        raw.iter().map(|&b| self.decode[b as usize]).collect()
    }

    pub fn encode(&self, text: &str) -> Result<Vec<u8>, EncodingError> {
        text.chars().enumerate().map(|(position, ch)| {
            self.encode.get(&ch).copied()
                .ok_or(EncodingError::UnmappableGlyph{ ch, position, language: self.language })
        }).collect()
    }
}

fn unmapped(b: u8) -> char {
    // U+E000..U+E0FF are all valid scalar values
    char::from_u32(UNMAPPED_BASE + b as u32).unwrap_or(char::REPLACEMENT_CHARACTER)
}

fn single_byte(encoding: &'static Encoding, b: u8) -> Option<char> {
    let bytes = [b];
    let decoded = encoding.decode_without_bom_handling_and_without_replacement(&bytes)?;
    let mut chars = decoded.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Some(ch),
        _ => None,
    }
}

/// The Hebrew releases draw their letters in place of '@'..'Z'.
fn hebrew_glyph(b: u8) -> Option<char> {
    match b {
        b'@'..=b'Z' => single_byte(encoding_rs::WINDOWS_1255, b + 0xa0),
        0xe0..=0xfa => None,
        _ => single_byte(encoding_rs::WINDOWS_1255, b),
    }
}

lazy_static! {
    static ref RAW: CodePage = CodePage::build(Language::Raw, |b| Some(b as char));
    static ref ENGLISH: CodePage = CodePage::build(Language::English, |b| single_byte(encoding_rs::WINDOWS_1252, b));
    static ref HEBREW: CodePage = CodePage::build(Language::Hebrew, hebrew_glyph);
    static ref POLISH: CodePage = CodePage::build(Language::Polish, |b| single_byte(encoding_rs::WINDOWS_1250, b));
    static ref RUSSIAN: CodePage = CodePage::build(Language::Russian, |b| single_byte(encoding_rs::WINDOWS_1251, b));
}
