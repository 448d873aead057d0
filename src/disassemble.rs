use thiserror::Error;

use crate::opcode::{Arg, InstructionSet, END_OF_LINE, LIST_END};
use crate::script::{self, Command, ItemRef, Line, LineHeader, Operand, ScriptError, ScriptStream, Table, TextRef, MARK_CONTINUE, MARK_END};
use crate::stream::{Stream, StreamError};

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("unknown opcode 0x{opcode:02x} at offset {offset}")]
    UnknownOpcode{ opcode: u8, offset: usize },
    #[error("operand of the command at offset {offset} runs past the end of the data")]
    TruncatedOperand{ offset: usize },
    #[error("data ends inside the table structure at offset {offset}")]
    UnexpectedEnd{ offset: usize },
    #[error("malformed operand at offset {offset}: {reason}")]
    MalformedOperand{ offset: usize, reason: String },
    #[error("unexpected marker 0x{found:04x} at offset {offset}")]
    UnexpectedMarker{ offset: usize, found: u16 },
    #[error("command at offset {offset} jumps to {target}, which is not the start of a command")]
    InvalidJumpTarget{ offset: usize, target: usize },
    #[error("unknown property type {kind} at offset {offset}")]
    UnknownProperty{ offset: usize, kind: u16 },
    #[error("{length} bytes of trailing data at offset {offset}")]
    TrailingData{ offset: usize, length: usize },
    #[error("table {number} lies outside the ranges {ranges} of the table index")]
    TableOutOfRange{ number: u16, ranges: String },
}

fn truncated(offset: usize) -> impl Fn(StreamError) -> DecodeError {
    move |_| DecodeError::TruncatedOperand{ offset }
}

fn structure_end(rdr: &Stream) -> impl Fn(StreamError) -> DecodeError {
    let offset = rdr.position();
    move |_| DecodeError::UnexpectedEnd{ offset }
}

fn read_operand(rdr: &mut Stream, arg: Arg, offset: usize) -> Result<Operand, DecodeError> {
    let operand = match arg {
        Arg::Byte => {
            let value = rdr.get_byte().map_err(truncated(offset))?;
            if value == 0xff {
                Operand::Variable(rdr.get_byte().map_err(truncated(offset))?)
            } else {
                Operand::RawByte(value)
            }
        },
        Arg::Item => {
            let selector = rdr.get_u16_be().map_err(truncated(offset))?;
            match selector {
                0 => Operand::ObjectRef(ItemRef::Id(script::read_item(rdr).map_err(truncated(offset))?)),
                code if script::special_item_name(code).is_some() => Operand::ObjectRef(ItemRef::Special(code)),
                code => return Err(DecodeError::MalformedOperand{ offset, reason: format!("item selector {}", code) }),
            }
        },
        Arg::Text => {
            let kind = rdr.get_u16_be().map_err(truncated(offset))?;
            match kind {
                0 => Operand::StringRef(TextRef::None),
                1 => Operand::StringRef(TextRef::Id(rdr.get_u32_be().map_err(truncated(offset))?)),
                3 => Operand::StringRef(TextRef::Special),
                kind => return Err(DecodeError::MalformedOperand{ offset, reason: format!("text kind {}", kind) }),
            }
        },
        Arg::Jump => Operand::JumpTarget(rdr.get_u16_be().map_err(truncated(offset))?),
        Arg::List => {
            let mut values = Vec::new();
            loop {
                let value = rdr.get_u16_be().map_err(truncated(offset))?;
                if value == LIST_END {
                    break;
                }
                values.push(value);
            }
            Operand::ArgList(values)
        },
        Arg::Voice | Arg::Number | Arg::Variable | Arg::Property | Arg::Noun | Arg::Adjective => {
            Operand::Immediate(arg, rdr.get_u16_be().map_err(truncated(offset))?)
        },
    };
    Ok(operand)
}

/// Walks the commands of one line, stopping after the end-of-line byte.
pub struct Disassembler<'a, 'r, 's> {
    rdr: &'r mut Stream<'a>,
    set: &'s InstructionSet,
    done: bool,
}

impl<'a, 'r, 's> Disassembler<'a, 'r, 's> {
    pub fn new(rdr: &'r mut Stream<'a>, set: &'s InstructionSet) -> Disassembler<'a, 'r, 's> {
        Disassembler{ rdr, set, done: false }
    }

    fn decode_next(&mut self) -> Result<Option<Command>, DecodeError> {
        let offset = self.rdr.position();
        let opcode = self.rdr.get_byte().map_err(|_| DecodeError::UnexpectedEnd{ offset })?;
        if opcode == END_OF_LINE {
            return Ok(None);
        }
        let shape = self.set.operand_shape(opcode)
            .map_err(|_| DecodeError::UnknownOpcode{ opcode, offset })?;
        let mut operands = Vec::with_capacity(shape.len());
        for &arg in shape {
            operands.push(read_operand(self.rdr, arg, offset)?);
        }
        Ok(Some(Command{ offset, opcode, operands }))
    }
}

impl<'a, 'r, 's> Iterator for Disassembler<'a, 'r, 's> {
    type Item = Result<Command, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done { return None }
        match self.decode_next() {
            Ok(Some(command)) => Some(Ok(command)),
            Ok(None) => {
                self.done = true;
                None
            },
            Err(e) => {
                self.done = true;
                Some(Err(e))
            },
        }
    }
}

fn read_marker(rdr: &mut Stream) -> Result<u16, DecodeError> {
    let offset = rdr.position();
    let marker = rdr.get_u16_be().map_err(structure_end(rdr))?;
    if marker != MARK_CONTINUE && marker != MARK_END {
        return Err(DecodeError::UnexpectedMarker{ offset, found: marker });
    }
    Ok(marker)
}

fn read_table(rdr: &mut Stream, set: &InstructionSet) -> Result<Table, DecodeError> {
    let number = rdr.get_u16_be().map_err(structure_end(rdr))?;
    let mut lines = Vec::new();
    while read_marker(rdr)? == MARK_CONTINUE {
        let header = if number == 0 {
            let end = structure_end(rdr);
            Some(LineHeader{
                verb: rdr.get_u16_be().map_err(&end)?,
                noun1: rdr.get_u16_be().map_err(&end)?,
                noun2: rdr.get_u16_be().map_err(&end)?,
            })
        } else {
            None
        };
        let commands = Disassembler::new(rdr, set).collect::<Result<Vec<_>, _>>()?;
        lines.push(Line{ header, commands });
    }
    Ok(Table{ number, lines })
}

/// Reads one block of tables. An empty input holds no tables.
pub fn read_tables(rdr: &mut Stream, set: &InstructionSet) -> Result<Vec<Table>, DecodeError> {
    let mut tables = Vec::new();
    if rdr.end_of_stream() {
        return Ok(tables);
    }
    while read_marker(rdr)? == MARK_CONTINUE {
        tables.push(read_table(rdr, set)?);
    }
    Ok(tables)
}

/// Decodes a block of tables at the start of `data`, returning how many bytes it used.
pub fn decode_block(data: &[u8], set: &InstructionSet) -> Result<(ScriptStream, usize), DecodeError> {
    let mut rdr = Stream::new(data);
    let tables = read_tables(&mut rdr, set)?;
    Ok((ScriptStream::new(tables), rdr.position()))
}

/// Decodes a record that holds nothing but one block of tables.
pub fn decode_record(data: &[u8], set: &InstructionSet) -> Result<ScriptStream, DecodeError> {
    let (stream, used) = decode_block(data, set)?;
    if used != data.len() {
        return Err(DecodeError::TrailingData{ offset: used, length: data.len() - used });
    }
    Ok(stream)
}

/// Checks the table numbers of a decoded record against its table index entry.
pub fn check_ranges(stream: &ScriptStream, ranges: &[(u16, u16)]) -> Result<(), DecodeError> {
    script::validate_ranges(stream.tables.iter().map(|t| t.number), ranges).map_err(|e| match e {
        ScriptError::TableOutOfRange{ number, ranges } => DecodeError::TableOutOfRange{ number, ranges },
        other => DecodeError::MalformedOperand{ offset: 0, reason: other.to_string() },
    })
}
