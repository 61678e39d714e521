use crate::error::{Error, Result};
use crate::index::map::MapData;
use crate::index::types::{Posting, Trigram};
use crate::utils::ByteOrder;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Leading bytes of every map file
pub const MAGIC: &[u8; 6] = b"trigra";

/// Header length: magic, byte-order tag, word size
pub const HEADER_LEN: usize = MAGIC.len() + 2;

/// Write `data` to `path` in native byte order.
///
/// The file is written next to its destination and renamed into place, so
/// a failed save never leaves a truncated map behind.
pub(crate) fn write_map(data: &MapData, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let tmp = NamedTempFile::new_in(dir).map_err(|e| Error::io(path, e))?;
    let mut file = BufWriter::new(tmp);
    encode(data, ByteOrder::native(), &mut file).map_err(|e| Error::io(path, e))?;

    let tmp = file
        .into_inner()
        .map_err(|e| Error::io(path, e.into_error()))?;
    tmp.as_file().sync_all().map_err(|e| Error::io(path, e))?;
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}

/// Serialize `data` with the given byte order.
///
/// Layout after the header:
/// trigram count, then per trigram in ascending code order its code, posting
/// count and (reference, weight) pairs; then the reference count and the
/// references, all ascending.
pub(crate) fn encode<W: Write>(data: &MapData, order: ByteOrder, out: &mut W) -> io::Result<()> {
    out.write_all(MAGIC)?;
    out.write_all(&[order.tag(), std::mem::size_of::<usize>() as u8])?;

    let mut trigrams: Vec<(&Trigram, &Vec<Posting>)> = data.postings.iter().collect();
    trigrams.sort_unstable_by_key(|(trigram, _)| **trigram);

    order.write_u32(out, trigrams.len() as u32)?;
    for (&trigram, list) in trigrams {
        order.write_u16(out, trigram)?;
        order.write_u32(out, list.len() as u32)?;
        for posting in list {
            order.write_u32(out, posting.reference.0)?;
            order.write_u32(out, posting.weight)?;
        }
    }

    order.write_u32(out, data.references.len() as u32)?;
    for reference in &data.references {
        order.write_u32(out, reference)?;
    }

    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::types::Reference;

    fn sample() -> MapData {
        let mut data = MapData::default();
        data.postings.insert(
            0x0102,
            vec![Posting {
                reference: Reference(7),
                weight: 3,
            }],
        );
        data.references.insert(7);
        data
    }

    #[test]
    fn test_encode_empty() {
        let mut buf = Vec::new();
        encode(&MapData::default(), ByteOrder::Little, &mut buf).unwrap();

        assert_eq!(&buf[..6], b"trigra");
        assert_eq!(buf[6], ByteOrder::LITTLE_TAG);
        assert_eq!(buf[7] as usize, std::mem::size_of::<usize>());
        assert_eq!(&buf[8..], &[0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_big_endian_layout() {
        let mut buf = Vec::new();
        encode(&sample(), ByteOrder::Big, &mut buf).unwrap();

        assert_eq!(buf[6], ByteOrder::BIG_TAG);
        let body = &buf[HEADER_LEN..];
        assert_eq!(
            body,
            &[
                0, 0, 0, 1, // trigram count
                0x01, 0x02, // code
                0, 0, 0, 1, // posting count
                0, 0, 0, 7, // reference
                0, 0, 0, 3, // weight
                0, 0, 0, 1, // reference count
                0, 0, 0, 7,
            ]
        );
    }

    #[test]
    fn test_write_map_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/missing/map.trigrams");
        let err = write_map(&sample(), &path).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(!path.exists());
    }
}
