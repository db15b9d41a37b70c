use crate::metadata::{MetadataError, MetadataMap};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

const SFO_MAGIC: &[u8; 4] = b"\0PSF";
const HEADER_LEN: usize = 20;
const INDEX_ENTRY_LEN: usize = 16;

const FMT_UTF8_SPECIAL: u16 = 0x0004;
const FMT_UTF8: u16 = 0x0204;
const FMT_INT32: u16 = 0x0404;

/// Decodes the key/value table of a `param.sfo` blob.
pub fn parse_param_sfo(data: &[u8]) -> Result<MetadataMap, MetadataError> {
    if data.len() < HEADER_LEN {
        return Err(invalid("header truncated"));
    }
    if &data[..4] != SFO_MAGIC {
        return Err(invalid("bad magic"));
    }

    let mut cursor = Cursor::new(&data[4..HEADER_LEN]);
    let _version = read_u32(&mut cursor)?;
    let key_table_start = read_u32(&mut cursor)? as usize;
    let data_table_start = read_u32(&mut cursor)? as usize;
    let entry_count = read_u32(&mut cursor)? as usize;

    let index_end = entry_count
        .checked_mul(INDEX_ENTRY_LEN)
        .and_then(|len| len.checked_add(HEADER_LEN))
        .filter(|end| *end <= data.len())
        .ok_or_else(|| invalid("index table out of bounds"))?;

    let mut cursor = Cursor::new(&data[HEADER_LEN..index_end]);
    let mut fields = MetadataMap::new();
    for _ in 0..entry_count {
        let key_offset = read_u16(&mut cursor)? as usize;
        let format = read_u16(&mut cursor)?;
        let len = read_u32(&mut cursor)? as usize;
        let _max_len = read_u32(&mut cursor)?;
        let data_offset = read_u32(&mut cursor)? as usize;

        let key = read_key(data, key_table_start + key_offset)?;
        let start = data_table_start + data_offset;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= data.len())
            .ok_or_else(|| invalid(&format!("value of {key} out of bounds")))?;
        let raw = &data[start..end];

        let value = match format {
            FMT_UTF8 | FMT_UTF8_SPECIAL => decode_utf8(raw),
            FMT_INT32 => {
                if raw.len() < 4 {
                    return Err(invalid(&format!("integer {key} truncated")));
                }
                let mut c = Cursor::new(raw);
                read_u32(&mut c)?.to_string()
            }
            other => {
                tracing::debug!(key = %key, format = other, "skipping unknown sfo value format");
                continue;
            }
        };
        fields.insert(key, value);
    }

    Ok(fields)
}

fn read_key(data: &[u8], offset: usize) -> Result<String, MetadataError> {
    let rest = data
        .get(offset..)
        .ok_or_else(|| invalid("key offset out of bounds"))?;
    let end = rest
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| invalid("unterminated key"))?;
    Ok(String::from_utf8_lossy(&rest[..end]).into_owned())
}

fn decode_utf8(raw: &[u8]) -> String {
    let trimmed = match raw.iter().position(|b| *b == 0) {
        Some(end) => &raw[..end],
        None => raw,
    };
    String::from_utf8_lossy(trimmed).into_owned()
}

fn read_u16(cursor: &mut Cursor<&[u8]>) -> Result<u16, MetadataError> {
    cursor
        .read_u16::<LittleEndian>()
        .map_err(|_| invalid("unexpected end of data"))
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32, MetadataError> {
    cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| invalid("unexpected end of data"))
}

fn invalid(reason: &str) -> MetadataError {
    MetadataError::InvalidParamSfo(reason.to_string())
}
