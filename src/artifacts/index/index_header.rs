use crate::artifacts::index::{HEADER_SIZE, SIGNATURE, VERSION};
use crate::errors::{Error, Result};
use byteorder::{ByteOrder, WriteBytesExt};
use derive_new::new;

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct IndexHeader {
    pub entries_count: u32,
}

impl IndexHeader {
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE);
        bytes.extend_from_slice(SIGNATURE);
        // writes into a Vec cannot fail
        let _ = bytes.write_u32::<byteorder::NetworkEndian>(VERSION);
        let _ = bytes.write_u32::<byteorder::NetworkEndian>(self.entries_count);
        bytes
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::corrupt("index header is truncated"));
        }
        if &bytes[0..4] != SIGNATURE {
            return Err(Error::corrupt("invalid index signature"));
        }

        let version = byteorder::NetworkEndian::read_u32(&bytes[4..8]);
        if version != VERSION {
            return Err(Error::corrupt(format!("unsupported index version {version}")));
        }

        Ok(IndexHeader {
            entries_count: byteorder::NetworkEndian::read_u32(&bytes[8..12]),
        })
    }
}
