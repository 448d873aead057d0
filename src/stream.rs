use byteorder::{BigEndian, ByteOrder, LittleEndian};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum StreamError {
    #[error("unexpected end of data at offset {position}, wanted {wanted} more bytes")]
    EndOfStream{ position: usize, wanted: usize },
    #[error("value of {len} bytes does not fit a {width} byte field")]
    FieldOverflow{ len: usize, width: usize },
}

/// Forward-only reader over an in-memory buffer.
pub struct Stream<'a> {
    data: &'a [u8],
    position: usize
}

impl<'a> Stream<'a> {
    pub fn new(data: &'a [u8]) -> Stream<'a> {
        Stream{ data, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn seek(&mut self, position: usize) -> Result<(), StreamError> {
        if position > self.data.len() {
            return Err(StreamError::EndOfStream{ position: self.position, wanted: position - self.position });
        }
        self.position = position;
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    pub fn end_of_stream(&self) -> bool {
        self.position >= self.data.len()
    }

    pub fn peek_byte(&self) -> Result<u8, StreamError> {
        if self.end_of_stream() {
            Err(StreamError::EndOfStream{ position: self.position, wanted: 1 })
        } else {
            Ok(self.data[self.position])
        }
    }

    pub fn peek_u16_be(&self) -> Result<u16, StreamError> {
        if self.remaining() < 2 {
            return Err(StreamError::EndOfStream{ position: self.position, wanted: 2 });
        }
        Ok(BigEndian::read_u16(&self.data[self.position..]))
    }

    pub fn get_byte(&mut self) -> Result<u8, StreamError> {
        let value = self.peek_byte()?;
        self.position += 1;
        Ok(value)
    }

    pub fn get_bytes(&mut self, len: usize) -> Result<&'a [u8], StreamError> {
        if len > self.remaining() {
            Err(StreamError::EndOfStream{ position: self.position, wanted: len })
        } else {
            let slice = &self.data[self.position..self.position + len];
            self.position += len;
            Ok(slice)
        }
    }

    pub fn get_rest(&mut self) -> &'a [u8] {
        let start = self.position.min(self.data.len());
        self.position = self.data.len();
        &self.data[start..]
    }

    pub fn get_u16_be(&mut self) -> Result<u16, StreamError> {
        Ok(BigEndian::read_u16(self.get_bytes(2)?))
    }

    pub fn get_u32_be(&mut self) -> Result<u32, StreamError> {
        Ok(BigEndian::read_u32(self.get_bytes(4)?))
    }

    pub fn get_u32_le(&mut self) -> Result<u32, StreamError> {
        Ok(LittleEndian::read_u32(self.get_bytes(4)?))
    }

    /// Reads up to the next NUL and consumes it. Running out of data ends the string.
    pub fn get_cstr(&mut self) -> &'a [u8] {
        let rest = &self.data[self.position.min(self.data.len())..];
        match rest.iter().position(|&c| c == 0) {
            Some(n) => {
                self.position += n + 1;
                &rest[..n]
            },
            None => {
                self.position = self.data.len();
                rest
            }
        }
    }

    /// Fixed-width field, trimmed at the first NUL.
    pub fn get_padded(&mut self, width: usize) -> Result<&'a [u8], StreamError> {
        let field = self.get_bytes(width)?;
        let len = field.iter().position(|&c| c == 0).unwrap_or(width);
        Ok(&field[..len])
    }
}

pub fn put_u16_be(out: &mut Vec<u8>, value: u16) {
    let mut buf = [0u8; 2];
    BigEndian::write_u16(&mut buf, value);
    out.extend_from_slice(&buf);
}

pub fn put_u32_be(out: &mut Vec<u8>, value: u32) {
    let mut buf = [0u8; 4];
    BigEndian::write_u32(&mut buf, value);
    out.extend_from_slice(&buf);
}

pub fn put_u32_le(out: &mut Vec<u8>, value: u32) {
    let mut buf = [0u8; 4];
    LittleEndian::write_u32(&mut buf, value);
    out.extend_from_slice(&buf);
}

pub fn put_cstr(out: &mut Vec<u8>, value: &[u8]) {
    out.extend_from_slice(value);
    out.push(0);
}

pub fn put_padded(out: &mut Vec<u8>, value: &[u8], width: usize) -> Result<(), StreamError> {
    if value.len() > width {
        return Err(StreamError::FieldOverflow{ len: value.len(), width });
    }
    out.extend_from_slice(value);
    out.resize(out.len() + width - value.len(), 0);
    Ok(())
}
