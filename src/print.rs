use std::fmt::Write;

use crate::label::LabelMap;
use crate::opcode::InstructionSet;
use crate::script::{self, Command, ItemRef, Operand, ScriptStream, Symbols, TextRef};
use crate::strings;
use crate::voice::SoundMap;

pub struct Formatter<'a> {
    set: &'a InstructionSet,
    labels: &'a LabelMap,
    symbols: &'a Symbols,
    voices: Option<&'a SoundMap>,
}

impl<'a> Formatter<'a> {
    pub fn new(set: &'a InstructionSet, labels: &'a LabelMap, symbols: &'a Symbols, voices: Option<&'a SoundMap>) -> Self {
        Formatter{ set, labels, symbols, voices }
    }

    fn format_operand(&self, operand: &Operand, notes: &mut Vec<String>) -> String {
        match operand {
            Operand::RawByte(b) => { b.to_string() },
            Operand::Variable(v) => { format!("[{}]", v) },
            Operand::Immediate(_, v) => { v.to_string() },
            Operand::StringRef(TextRef::None) => { "-1".to_string() },
            Operand::StringRef(TextRef::Special) => { "-3".to_string() },
            Operand::StringRef(TextRef::Id(id)) => {
                match self.symbols.text(*id) {
                    Some(text) => notes.push(format!("{{{}}}", strings::escape(text))),
                    None => notes.push("{?}".to_string()),
                }
                if let Some(voices) = self.voices.and_then(|v| v.get(id)) {
                    let list: Vec<String> = voices.iter().map(|v| v.to_string()).collect();
                    notes.push(format!("[voice {}]", list.join(",")));
                }
                id.to_string()
            },
            Operand::ObjectRef(ItemRef::Special(code)) => {
                script::special_item_name(*code).map(|s| s.to_string()).unwrap_or_else(|| format!("${}", code))
            },
            Operand::ObjectRef(ItemRef::Id(item)) => {
                if let Some(name) = self.symbols.item_name(*item) {
                    notes.push(format!("<{}>", strings::escape(name)));
                }
                format!("<{}>", item)
            },
            Operand::JumpTarget(target) => {
                match self.labels.get(&(*target as usize)) {
                    Some(label) => label.clone(),
                    None => target.to_string(),
                }
            },
            Operand::ArgList(values) => {
                let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                format!("{{{}}}", values.join(","))
            },
        }
    }

    /// One command as `[Lnnnn:] (0xNN) MNEMONIC operands [// notes]`.
    pub fn format_command(&self, command: &Command) -> String {
        let mut out = String::new();
        if let Some(label) = self.labels.get(&command.offset) {
            let _ = write!(out, "{}: ", label);
        }
        let mnemonic = match self.set.get(command.opcode) {
            Some(op) => op.mnemonic.clone(),
            None => format!("OP_{:02X}", command.opcode),
        };
        let _ = write!(out, "(0x{:02x}) {}", command.opcode, mnemonic);

        let mut notes = Vec::new();
        for operand in &command.operands {
            let _ = write!(out, " {}", self.format_operand(operand, &mut notes));
        }
        if !notes.is_empty() {
            let _ = write!(out, " // {}", notes.join(" "));
        }
        out
    }

    pub fn format_tables(&self, out: &mut String, stream: &ScriptStream) {
        for table in &stream.tables {
            let _ = writeln!(out, "== TABLE {}", table.number);
            for line in &table.lines {
                match &line.header {
                    Some(h) => { let _ = writeln!(out, "==> DEF {} {} {}", h.verb, h.noun1, h.noun2); },
                    None => { let _ = writeln!(out, "==>"); },
                }
                for command in &line.commands {
                    let _ = writeln!(out, "\t{}", self.format_command(command));
                }
            }
        }
    }
}

pub fn file_header(out: &mut String, name: &str, ranges: &[(u16, u16)]) {
    let _ = writeln!(out, "== FILE {} {}", name, script::format_ranges(ranges));
}

/// Marks a record that could not be decoded. Its bytes are kept as they are.
pub fn raw_file_header(out: &mut String, name: &str, reason: &str) {
    let _ = writeln!(out, "== FILE {} RAW // {}", name, reason.replace('\n', " "));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disassemble;
    use crate::label;
    use crate::opcode::{Arg, OpDef};
    use pretty_assertions::assert_eq;

    static TINY: &[OpDef] = &[
        (0x01, Some("PRINT"), &[ Arg::Text ]),
        (0x02, Some("JUMP"), &[ Arg::Jump ]),
        (0x03, Some("END"), &[]),
        (0x04, None, &[ Arg::Byte, Arg::Item, Arg::List ]),
        (0x05, Some("SAY"), &[ Arg::Text, Arg::Voice ]),
    ];

    fn symbols() -> Symbols {
        let mut symbols = Symbols::default();
        symbols.texts.insert(3, "lamp".into());
        symbols.texts.insert(0x8000, "HELLO".into());
        symbols.item_names.insert(4, 3);
        symbols
    }

    #[test]
    fn renders_a_record() {
        let set = InstructionSet::new("tiny", &[ TINY ]);
        let data = vec![
            0, 0, 0, 0,
            0, 0, 0, 1, 0, 2, 0, 3,
            0x01, 0, 1, 0, 0, 0x80, 0x00,
            0x02, 0, 12,
            0x04, 0xff, 2, 0, 5, 0, 1, 0, 2, 0xff, 0xff,
            0x04, 7, 0, 0, 0, 0, 0, 2, 0xff, 0xff,
            0x05, 0, 0, 0, 9,
            0x03, 0xff,
            0, 1, 0, 1,
        ];
        let stream = disassemble::decode_record(&data, &set).unwrap();
        let labels = label::find_labels(&stream).unwrap();
        let symbols = symbols();
        let mut voices = SoundMap::new();
        voices.entry(0x8000).or_default().insert(17);
        let formatter = Formatter::new(&set, &labels, &symbols, Some(&voices));

        let mut out = String::new();
        file_header(&mut out, "TABLES01", &[ (0, 5) ]);
        formatter.format_tables(&mut out, &stream);
        assert_eq!(out, concat!(
            "== FILE TABLES01 0:5\n",
            "== TABLE 0\n",
            "==> DEF 1 2 3\n",
            "\tL0000: (0x01) PRINT 32768 // {HELLO} [voice 17]\n",
            "\t(0x02) JUMP L0000\n",
            "\t(0x04) OP_04 [2] $ME {1,2}\n",
            "\t(0x04) OP_04 7 <4> {} // <lamp>\n",
            "\t(0x05) SAY -1 9\n",
            "\t(0x03) END\n",
        ));
    }

    #[test]
    fn rendering_is_deterministic() {
        let set = InstructionSet::new("tiny", &[ TINY ]);
        let data = [ 0, 0, 0, 9, 0, 0, 0x01, 0, 1, 0, 0, 0x80, 0x01, 0x03, 0xff, 0, 1, 0, 1 ];
        let render = || {
            let stream = disassemble::decode_record(&data, &set).unwrap();
            let labels = label::find_labels(&stream).unwrap();
            let symbols = symbols();
            let mut out = String::new();
            Formatter::new(&set, &labels, &symbols, None).format_tables(&mut out, &stream);
            out
        };
        let first = render();
        assert_eq!(first, render());
        assert_eq!(first, "== TABLE 9\n==>\n\t(0x01) PRINT 32769 // {?}\n\t(0x03) END\n");
    }

    #[test]
    fn raw_header() {
        let mut out = String::new();
        raw_file_header(&mut out, "TABLES02", "unknown opcode 0x7e\nat offset 3");
        assert_eq!(out, "== FILE TABLES02 RAW // unknown opcode 0x7e at offset 3\n");
    }
}
