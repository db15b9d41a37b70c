use crate::metadata::{MetadataError, MetadataMap, MetadataProvider};
use crate::param_sfo::parse_param_sfo;
use byteorder::{BigEndian, ReadBytesExt};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

const PKG_MAGIC: u32 = 0x7F43_4E54;
const ENTRY_COUNT_OFFSET: u64 = 0x10;
const TABLE_OFFSET_OFFSET: u64 = 0x18;
const CONTENT_ID_OFFSET: u64 = 0x40;
const CONTENT_ID_LEN: usize = 0x24;
const ENTRY_LEN: u64 = 32;
const PARAM_SFO_ENTRY_ID: u32 = 0x1000;
const MAX_PARAM_SFO_LEN: u32 = 1 << 20;

/// Reads descriptor fields from the `param.sfo` embedded in a PS4 package.
#[derive(Debug, Clone, Copy, Default)]
pub struct PkgMetadataReader;

impl PkgMetadataReader {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataProvider for PkgMetadataReader {
    fn read_metadata(&self, path: &Path) -> Result<MetadataMap, MetadataError> {
        let file = File::open(path).map_err(|source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        read_pkg_metadata(&mut BufReader::new(file), path)
    }
}

pub(crate) fn read_pkg_metadata<R: Read + Seek>(
    reader: &mut R,
    path: &Path,
) -> Result<MetadataMap, MetadataError> {
    let io_err = |source: io::Error| {
        if source.kind() == io::ErrorKind::UnexpectedEof {
            MetadataError::InvalidPackage("file truncated".to_string())
        } else {
            MetadataError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    };

    let magic = reader.read_u32::<BigEndian>().map_err(io_err)?;
    if magic != PKG_MAGIC {
        return Err(MetadataError::InvalidPackage(format!(
            "unexpected magic 0x{magic:08X}"
        )));
    }

    reader
        .seek(SeekFrom::Start(ENTRY_COUNT_OFFSET))
        .map_err(io_err)?;
    let entry_count = reader.read_u32::<BigEndian>().map_err(io_err)?;
    reader
        .seek(SeekFrom::Start(TABLE_OFFSET_OFFSET))
        .map_err(io_err)?;
    let table_offset = reader.read_u32::<BigEndian>().map_err(io_err)?;

    let mut content_id = [0u8; CONTENT_ID_LEN];
    reader
        .seek(SeekFrom::Start(CONTENT_ID_OFFSET))
        .map_err(io_err)?;
    reader.read_exact(&mut content_id).map_err(io_err)?;
    let content_id = String::from_utf8_lossy(&content_id)
        .trim_end_matches('\0')
        .trim()
        .to_string();

    let (sfo_offset, sfo_len) =
        find_entry(reader, table_offset, entry_count, PARAM_SFO_ENTRY_ID)
            .map_err(io_err)?
            .ok_or(MetadataError::MissingParamSfo)?;
    if sfo_len > MAX_PARAM_SFO_LEN {
        return Err(MetadataError::InvalidParamSfo(format!(
            "declared size {sfo_len} is too large"
        )));
    }

    let mut sfo = vec![0u8; sfo_len as usize];
    reader
        .seek(SeekFrom::Start(u64::from(sfo_offset)))
        .map_err(io_err)?;
    reader.read_exact(&mut sfo).map_err(io_err)?;

    let mut fields = parse_param_sfo(&sfo)?;
    add_derived_fields(&mut fields, &content_id);
    tracing::debug!(path = %path.display(), fields = fields.len(), "read pkg metadata");
    Ok(fields)
}

fn find_entry<R: Read + Seek>(
    reader: &mut R,
    table_offset: u32,
    entry_count: u32,
    wanted_id: u32,
) -> io::Result<Option<(u32, u32)>> {
    for index in 0..u64::from(entry_count) {
        reader.seek(SeekFrom::Start(
            u64::from(table_offset) + index * ENTRY_LEN,
        ))?;
        let id = reader.read_u32::<BigEndian>()?;
        if id != wanted_id {
            continue;
        }
        let _filename_offset = reader.read_u32::<BigEndian>()?;
        let _flags1 = reader.read_u32::<BigEndian>()?;
        let _flags2 = reader.read_u32::<BigEndian>()?;
        let offset = reader.read_u32::<BigEndian>()?;
        let size = reader.read_u32::<BigEndian>()?;
        return Ok(Some((offset, size)));
    }
    Ok(None)
}

fn add_derived_fields(fields: &mut MetadataMap, header_content_id: &str) {
    if fields.non_empty("CONTENT_ID").is_none() && !header_content_id.is_empty() {
        fields.insert("CONTENT_ID", header_content_id);
    }

    let ver = fields
        .non_empty("APP_VER")
        .or_else(|| fields.non_empty("VERSION"))
        .map(str::to_string);
    if let Some(ver) = ver {
        fields.insert("VER", ver);
    }

    if let Some(content_id) = fields.non_empty("CONTENT_ID") {
        let region = region_for_content_id(content_id);
        fields.insert("REGION", region);
    }

    let sys_ver = fields
        .get("SYSTEM_VER")
        .and_then(|v| v.parse::<u32>().ok())
        .map(format_system_version);
    if let Some(sys_ver) = sys_ver {
        fields.insert("SYS_VER", sys_ver);
    }
}

fn region_for_content_id(content_id: &str) -> &'static str {
    match content_id.chars().next() {
        Some('U') => "US",
        Some('E') => "EU",
        Some('J') => "JP",
        Some('H') => "ASIA",
        Some('I') => "INT",
        _ => "UNKNOWN",
    }
}

fn format_system_version(raw: u32) -> String {
    format!("{:x}.{:02x}", (raw >> 24) & 0xff, (raw >> 16) & 0xff)
}
