use std::collections::{BTreeMap, BTreeSet};

use crate::item::{self, Item};
use crate::opcode::Arg;
use crate::script::{Operand, ScriptStream, TextRef};
use crate::stream::{self, Stream, StreamError};

/// Offsets stop before this position even when no sample starts earlier.
pub const MAX_INDEX_END: usize = 1 << 17;

/// Text id to the voice samples spoken with it.
pub type SoundMap = BTreeMap<u32, BTreeSet<u16>>;

#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSample {
    pub ordinal: usize,
    pub offset: usize,
    pub data: Vec<u8>,
}

/// Reads the u32 LE offset table at the start of a soundbank. Zero marks an absent sample.
pub fn read_voice_index(data: &[u8]) -> Result<Vec<u32>, StreamError> {
    let mut rdr = Stream::new(data);
    let mut limit = MAX_INDEX_END;
    let mut offsets = Vec::new();
    while rdr.position() < limit {
        let offset = rdr.get_u32_le()?;
        if offset > 0 {
            limit = limit.min(offset as usize);
        }
        offsets.push(offset);
    }
    Ok(offsets)
}

/// Splits a soundbank into its samples. Each sample ends where the next present sample starts.
pub fn read_soundbank(data: &[u8]) -> Result<Vec<VoiceSample>, StreamError> {
    let offsets = read_voice_index(data)?;
    let mut samples = Vec::new();
    for (ordinal, &offset) in offsets.iter().enumerate() {
        if offset == 0 {
            continue;
        }
        let start = offset as usize;
        let end = match offsets[ordinal + 1..].iter().find(|&&next| next > 0) {
            Some(&next) => next as usize,
            None => data.len(),
        };
        if end <= start {
            continue;
        }
        let mut rdr = Stream::new(data);
        rdr.seek(start)?;
        let data = rdr.get_bytes(end - start)?.to_vec();
        samples.push(VoiceSample{ ordinal, offset: start, data });
    }
    Ok(samples)
}

/// Joins samples back into a soundbank. Missing and empty samples get a zero offset.
pub fn write_soundbank(samples: &BTreeMap<usize, Vec<u8>>) -> Result<Vec<u8>, StreamError> {
    let count = samples.keys().next_back().map_or(0, |&last| last + 1);
    let mut offset = count * 4;
    let mut out = Vec::with_capacity(offset);
    let mut body = Vec::new();
    for ordinal in 0..count {
        match samples.get(&ordinal) {
            Some(data) if !data.is_empty() => {
                let value = u32::try_from(offset).map_err(|_| StreamError::FieldOverflow{ len: offset, width: 4 })?;
                stream::put_u32_le(&mut out, value);
                body.extend_from_slice(data);
                offset += data.len();
            },
            _ => stream::put_u32_le(&mut out, 0),
        }
    }
    out.extend_from_slice(&body);
    Ok(out)
}

/// Records the text and voice operands of every command that carries both.
pub fn collect_script_voices(map: &mut SoundMap, stream: &ScriptStream) {
    for command in stream.commands() {
        let text = command.operands.iter().find_map(|o| match o {
            Operand::StringRef(TextRef::Id(id)) => Some(*id),
            _ => None,
        });
        let voice = command.operands.iter().find_map(|o| match o {
            Operand::Immediate(Arg::Voice, voice) => Some(*voice),
            _ => None,
        });
        if let (Some(text), Some(voice)) = (text, voice) {
            map.entry(text).or_default().insert(voice);
        }
    }
}

pub fn collect_object_voices(map: &mut SoundMap, items: &[Item]) {
    for (text, voice) in item::description_voices(items) {
        map.entry(text).or_default().insert(voice);
    }
}
