use log::debug;
use thiserror::Error;

use crate::stream::{self, Stream, StreamError};

#[derive(Debug, Error, PartialEq)]
pub enum ArchiveError {
    #[error("index declares {count} records but only {available} bytes follow")]
    TruncatedIndex{ count: usize, available: usize },
    #[error("index of {index_len} bytes is not a whole number of offsets")]
    MisalignedIndex{ index_len: usize },
    #[error("record {ordinal} at offset {offset} with length {length} runs past the container end ({container_len})")]
    OffsetOverflow{ ordinal: usize, offset: usize, length: usize, container_len: usize },
    #[error("record {ordinal} starts at {offset}, before the previous record at {previous}")]
    NonMonotonicOffset{ ordinal: usize, offset: usize, previous: usize },
    #[error("container of {0} bytes exceeds the 32-bit offset range")]
    TooLarge(usize),
    #[error("unexpected extra header block for a layout without one")]
    UnexpectedExtra,
    #[error("extra header block holds {found} bytes but the layout expects {expected}")]
    ExtraSize{ expected: usize, found: usize },
    #[error("{length} bytes follow the final offset {offset}")]
    TrailingData{ offset: usize, length: usize },
    #[error("last record {ordinal} holds {length} bytes, the final offset must end the container")]
    UnterminatedContainer{ ordinal: usize, length: usize },
    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// On-disk container layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveLayout {
    /// u32 BE record count, then every record prefixed by its u32 BE length.
    Classic,
    /// u32 LE absolute offset per record, records follow back to back.
    /// The last offset marks the container end, so the last record is always empty.
    Indexed,
    /// As `Indexed` with `extra_words` u32 LE words between the offsets and the first record.
    Talkie{ extra_words: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveIndexEntry {
    pub record_id: usize,
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    pub ordinal: usize,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Archive {
    pub layout: ArchiveLayout,
    /// Opaque block between the offset table and the first record.
    pub extra: Vec<u8>,
    pub records: Vec<ResourceRecord>,
}

fn read_offset_index(data: &[u8], extra_words: usize) -> Result<(Vec<ArchiveIndexEntry>, Vec<u8>), ArchiveError> {
    if data.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }
    let mut rdr = Stream::new(data);
    let first = rdr.get_u32_le()? as usize;
    let extra_len = extra_words * 4;
    if first > data.len() {
        return Err(ArchiveError::TruncatedIndex{ count: first / 4, available: data.len() });
    }
    if first < extra_len + 4 || (first - extra_len) % 4 != 0 {
        return Err(ArchiveError::MisalignedIndex{ index_len: first });
    }
    let count = (first - extra_len) / 4;

    let mut offsets = vec![ first ];
    for _ in 1..count {
        offsets.push(rdr.get_u32_le()? as usize);
    }
    let extra = rdr.get_bytes(extra_len)?.to_vec();

    let mut entries = Vec::with_capacity(count);
    for (ordinal, &offset) in offsets.iter().enumerate() {
        if ordinal > 0 && offset < offsets[ordinal - 1] {
            return Err(ArchiveError::NonMonotonicOffset{ ordinal, offset, previous: offsets[ordinal - 1] });
        }
        let end = offsets.get(ordinal + 1).copied().unwrap_or(offset);
        if end > data.len() || offset > data.len() {
            return Err(ArchiveError::OffsetOverflow{ ordinal, offset, length: end.saturating_sub(offset), container_len: data.len() });
        }
        let length = end.saturating_sub(offset);
        entries.push(ArchiveIndexEntry{ record_id: ordinal, offset, length });
    }
    if let Some(&last) = offsets.last() {
        if last < data.len() {
            return Err(ArchiveError::TrailingData{ offset: last, length: data.len() - last });
        }
    }
    Ok((entries, extra))
}

fn read_classic_index(data: &[u8]) -> Result<Vec<ArchiveIndexEntry>, ArchiveError> {
    let mut rdr = Stream::new(data);
    let count = rdr.get_u32_be()? as usize;
    if count.saturating_mul(4) > rdr.remaining() {
        return Err(ArchiveError::TruncatedIndex{ count, available: rdr.remaining() });
    }
    let mut entries = Vec::with_capacity(count);
    for ordinal in 0..count {
        let length = rdr.get_u32_be()? as usize;
        let offset = rdr.position();
        if length > rdr.remaining() {
            return Err(ArchiveError::OffsetOverflow{ ordinal, offset, length, container_len: data.len() });
        }
        rdr.seek(offset + length)?;
        entries.push(ArchiveIndexEntry{ record_id: ordinal, offset, length });
    }
    if !rdr.end_of_stream() {
        return Err(ArchiveError::OffsetOverflow{ ordinal: count, offset: rdr.position(), length: rdr.remaining(), container_len: data.len() });
    }
    Ok(entries)
}

impl Archive {
    pub fn read(data: &[u8], layout: ArchiveLayout) -> Result<Archive, ArchiveError> {
        let (entries, extra) = match layout {
            ArchiveLayout::Classic => (read_classic_index(data)?, Vec::new()),
            ArchiveLayout::Indexed => read_offset_index(data, 0)?,
            ArchiveLayout::Talkie{ extra_words } => read_offset_index(data, extra_words)?,
        };
        debug!("container of {} bytes holds {} records", data.len(), entries.len());
        let records = entries.iter()
            .map(|e| ResourceRecord{ ordinal: e.record_id, data: data[e.offset..e.offset + e.length].to_vec() })
            .collect();
        Ok(Archive{ layout, extra, records })
    }

    /// Offsets the records occupy when written with the current layout.
    pub fn index(&self) -> Vec<ArchiveIndexEntry> {
        let mut offset = match self.layout {
            ArchiveLayout::Classic => 4,
            ArchiveLayout::Indexed | ArchiveLayout::Talkie{ .. } => self.records.len() * 4 + self.extra.len(),
        };
        let mut entries = Vec::with_capacity(self.records.len());
        for record in &self.records {
            if self.layout == ArchiveLayout::Classic {
                offset += 4;
            }
            entries.push(ArchiveIndexEntry{ record_id: record.ordinal, offset, length: record.data.len() });
            offset += record.data.len();
        }
        entries
    }

    pub fn write(&self) -> Result<Vec<u8>, ArchiveError> {
        let index = self.index();
        let total = index.last().map(|e| e.offset + e.length).unwrap_or(0);
        if total > u32::MAX as usize {
            return Err(ArchiveError::TooLarge(total));
        }

        let mut out = Vec::with_capacity(total);
        match self.layout {
            ArchiveLayout::Classic => {
                if !self.extra.is_empty() {
                    return Err(ArchiveError::UnexpectedExtra);
                }
                stream::put_u32_be(&mut out, self.records.len() as u32);
                for record in &self.records {
                    stream::put_u32_be(&mut out, record.data.len() as u32);
                    out.extend_from_slice(&record.data);
                }
            },
            ArchiveLayout::Indexed | ArchiveLayout::Talkie{ .. } => {
                let expected = match self.layout {
                    ArchiveLayout::Talkie{ extra_words } => extra_words * 4,
                    _ => 0,
                };
                if expected == 0 && !self.extra.is_empty() {
                    return Err(ArchiveError::UnexpectedExtra);
                }
                if self.extra.len() != expected {
                    return Err(ArchiveError::ExtraSize{ expected, found: self.extra.len() });
                }
                if let Some(last) = self.records.last().filter(|r| !r.data.is_empty()) {
                    return Err(ArchiveError::UnterminatedContainer{ ordinal: last.ordinal, length: last.data.len() });
                }
                for entry in &index {
                    stream::put_u32_le(&mut out, entry.offset as u32);
                }
                out.extend_from_slice(&self.extra);
                for record in &self.records {
                    out.extend_from_slice(&record.data);
                }
            },
        }
        Ok(out)
    }
}
