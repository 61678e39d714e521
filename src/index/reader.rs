use crate::error::{Error, Result};
use crate::index::map::MapData;
use crate::index::types::{Posting, Reference};
use crate::index::writer::{HEADER_LEN, MAGIC};
use crate::utils::{ByteOrder, ByteReader, is_valid_trigram};
use memmap2::Mmap;
use roaring::RoaringBitmap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::warn;

/// Decoded map file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub order: ByteOrder,
    /// `size_of::<usize>()` on the machine that wrote the file
    pub word_size: u8,
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
        _ => Error::io(path, e),
    })
}

/// Read only the header of the map file at `path`
pub fn read_header(path: &Path) -> Result<FileHeader> {
    let mut file = open(path)?;
    let mut buf = [0u8; HEADER_LEN];
    file.read_exact(&mut buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::bad_format(path, "file shorter than header"),
        _ => Error::io(path, e),
    })?;
    parse_header(&buf, path)
}

/// Load and fully validate the map file at `path`
pub(crate) fn read_map(path: &Path) -> Result<MapData> {
    let file = open(path)?;
    let len = file.metadata().map_err(|e| Error::io(path, e))?.len();
    if len < HEADER_LEN as u64 {
        return Err(Error::bad_format(path, "file shorter than header"));
    }

    // SAFETY: the mapping is read-only and dropped before this returns;
    // saves replace map files by rename rather than writing in place
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::io(path, e))?;
    decode(&mmap, path)
}

fn parse_header(bytes: &[u8], path: &Path) -> Result<FileHeader> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::bad_format(path, "file shorter than header"));
    }
    if &bytes[..MAGIC.len()] != MAGIC {
        return Err(Error::bad_format(path, "missing trigra tag"));
    }

    let tag = bytes[MAGIC.len()];
    let order = ByteOrder::from_tag(tag)
        .ok_or_else(|| Error::bad_format(path, format!("unknown byte order 0x{tag:02x}")))?;

    let word_size = bytes[MAGIC.len() + 1];
    if word_size as usize != std::mem::size_of::<usize>() {
        warn!(
            path = %path.display(),
            word_size,
            "map written with a different word size"
        );
    }

    Ok(FileHeader { order, word_size })
}

/// Decode a complete map file image.
///
/// Every structural rule the writer guarantees is checked, so a decoded
/// map is always internally consistent.
pub(crate) fn decode(bytes: &[u8], path: &Path) -> Result<MapData> {
    let header = parse_header(bytes, path)?;
    let mut reader = ByteReader::new(&bytes[HEADER_LEN..], header.order);
    let truncated = || Error::bad_format(path, "truncated body");

    let trigram_count = reader.read_u32().ok_or_else(truncated)?;
    // Each trigram entry takes at least 6 bytes
    if trigram_count as usize > reader.remaining() / 6 {
        return Err(Error::bad_format(path, "trigram count exceeds file size"));
    }

    let mut data = MapData::default();
    data.postings.reserve(trigram_count as usize);
    let mut seen = RoaringBitmap::new();
    let mut weights = rustc_hash::FxHashMap::default();
    let mut previous = None;

    for _ in 0..trigram_count {
        let trigram = reader.read_u16().ok_or_else(truncated)?;
        if !is_valid_trigram(trigram) {
            return Err(Error::bad_format(path, format!("invalid trigram code {trigram}")));
        }
        if previous.is_some_and(|p| p >= trigram) {
            return Err(Error::bad_format(path, "trigrams not in ascending order"));
        }
        previous = Some(trigram);

        let count = reader.read_u32().ok_or_else(truncated)?;
        if count == 0 {
            return Err(Error::bad_format(path, format!("empty posting list for {trigram}")));
        }
        if count as usize > reader.remaining() / 8 {
            return Err(truncated());
        }

        let mut list = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let reference = reader.read_u32().ok_or_else(truncated)?;
            let weight = reader.read_u32().ok_or_else(truncated)?;

            if list
                .last()
                .is_some_and(|p: &Posting| p.reference.0 >= reference)
            {
                return Err(Error::bad_format(path, "postings not in ascending order"));
            }
            if *weights.entry(reference).or_insert(weight) != weight {
                return Err(Error::bad_format(
                    path,
                    format!("conflicting weights for reference {reference}"),
                ));
            }

            seen.insert(reference);
            list.push(Posting {
                reference: Reference(reference),
                weight,
            });
        }
        data.postings.insert(trigram, list);
    }

    let reference_count = reader.read_u32().ok_or_else(truncated)?;
    if reference_count as usize > reader.remaining() / 4 {
        return Err(truncated());
    }
    let mut last = None;
    for _ in 0..reference_count {
        let reference = reader.read_u32().ok_or_else(truncated)?;
        if last.is_some_and(|l| l >= reference) {
            return Err(Error::bad_format(path, "references not in ascending order"));
        }
        last = Some(reference);
        data.references.insert(reference);
    }

    if reader.remaining() != 0 {
        return Err(Error::bad_format(
            path,
            format!("{} trailing bytes", reader.remaining()),
        ));
    }
    if seen != data.references {
        return Err(Error::bad_format(
            path,
            "reference set does not match posting lists",
        ));
    }

    Ok(data)
}
