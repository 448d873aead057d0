use packed_struct::prelude::*;
use thiserror::Error;

use crate::strings::{StringTable, StringsError};
use crate::stream::{Stream, StreamError};

pub const KNOWN_VERSION: u32 = 128;
const HEADER_SIZE: usize = 20;

#[derive(Debug, Error, PartialEq)]
pub enum BasefileError {
    #[error("malformed header: {0}")]
    Header(String),
    #[error("unknown basefile version {0}")]
    UnknownVersion(u32),
    #[error("header declares {declared} strings but the text block holds {found}")]
    StringCountMismatch{ declared: u32, found: usize },
    #[error("{0} items do not fit the item counters")]
    TooManyItems(usize),
    #[error(transparent)]
    Strings(#[from] StringsError),
    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// Both item counters are stored without the two implicit items (null and player).
#[derive(PackedStruct, Debug, Clone, Copy, PartialEq)]
#[packed_struct(endian="msb")]
pub struct BasefileHeader {
    pub total_item_count: u32,
    pub version: u32,
    pub item_count: u32,
    pub string_count: u32,
    pub text_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Basefile {
    pub header: BasefileHeader,
    pub strings: StringTable,
    /// Object table, resident script tables and whatever follows them.
    pub data: Vec<u8>,
}

impl Basefile {
    pub fn read(input: &[u8]) -> Result<Basefile, BasefileError> {
        let mut rdr = Stream::new(input);
        let header = BasefileHeader::unpack_from_slice(rdr.get_bytes(HEADER_SIZE)?)
            .map_err(|e| BasefileError::Header(format!("{:?}", e)))?;
        if header.version != KNOWN_VERSION {
            return Err(BasefileError::UnknownVersion(header.version));
        }

        let texts = rdr.get_bytes(header.text_size as usize)?;
        let strings = StringTable::from_bytes(0, texts)?;
        if strings.entries.len() != header.string_count as usize {
            return Err(BasefileError::StringCountMismatch{ declared: header.string_count, found: strings.entries.len() });
        }
        let data = rdr.get_rest().to_vec();
        Ok(Basefile{ header, strings, data })
    }

    /// Number of objects stored in the object table.
    pub fn object_count(&self) -> usize {
        self.header.item_count as usize
    }

    /// Replaces the object count while keeping the number of dynamic items constant.
    pub fn set_object_count(&mut self, count: usize) -> Result<(), BasefileError> {
        let dynamic = self.header.total_item_count.saturating_sub(self.header.item_count);
        let item_count = u32::try_from(count).map_err(|_| BasefileError::TooManyItems(count))?;
        let total = item_count.checked_add(dynamic).ok_or(BasefileError::TooManyItems(count))?;
        self.header.item_count = item_count;
        self.header.total_item_count = total;
        Ok(())
    }

    pub fn write(&self) -> Result<Vec<u8>, BasefileError> {
        let texts = self.strings.to_bytes();
        let header = BasefileHeader{
            string_count: self.strings.entries.len() as u32,
            text_size: texts.len() as u32,
            ..self.header
        };
        let packed = header.pack().map_err(|e| BasefileError::Header(format!("{:?}", e)))?;

        let mut out = Vec::with_capacity(HEADER_SIZE + texts.len() + self.data.len());
        out.extend_from_slice(&packed);
        out.extend_from_slice(&texts);
        out.extend_from_slice(&self.data);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        let mut data = vec![
            0, 0, 0, 10,
            0, 0, 0, 128,
            0, 0, 0, 3,
            0, 0, 0, 2,
            0, 0, 0, 6,
        ];
        data.extend_from_slice(b"AB\0CD\0");
        data.extend_from_slice(&[ 0xde, 0xad ]);
        data
    }

    #[test]
    fn read_and_write() {
        let input = sample();
        let base = Basefile::read(&input).unwrap();
        assert_eq!(base.header.total_item_count, 10);
        assert_eq!(base.object_count(), 3);
        assert_eq!(base.strings.entries, vec![ b"AB".to_vec(), b"CD".to_vec() ]);
        assert_eq!(base.data, vec![ 0xde, 0xad ]);
        assert_eq!(base.write().unwrap(), input);
    }

    #[test]
    fn counters_follow_edits() {
        let mut base = Basefile::read(&sample()).unwrap();
        base.strings.entries.push(b"NEW".to_vec());
        base.set_object_count(4).unwrap();
        let out = base.write().unwrap();
        assert_eq!(&out[0..20], &[ 0, 0, 0, 11, 0, 0, 0, 128, 0, 0, 0, 4, 0, 0, 0, 3, 0, 0, 0, 10 ]);
        assert_eq!(Basefile::read(&out).unwrap().strings.entries.len(), 3);
    }

    #[test]
    fn rejects_bad_headers() {
        let mut input = sample();
        input[7] = 129;
        assert_eq!(Basefile::read(&input), Err(BasefileError::UnknownVersion(129)));

        let mut input = sample();
        input[15] = 3;
        assert_eq!(Basefile::read(&input), Err(BasefileError::StringCountMismatch{ declared: 3, found: 2 }));

        assert!(matches!(Basefile::read(&[ 0, 0, 0 ]), Err(BasefileError::Stream(_))));
    }
}
