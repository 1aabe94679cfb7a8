//! Byte-level handling of PNG `tEXt` chunks for thumbnail provenance.
//!
//! A chunk is `length(4 BE) + type(4) + data + crc32(type + data)(4 BE)`.
//! Thumbnails carry `Thumb::MTime`, `Thumb::URI` and `Software` chunks spliced
//! right after the first chunk of the encoded PNG.

use crate::DomainError;

pub const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\x0d\x0a\x1a\x0a";
pub const THUMB_MTIME_KEY: &[u8] = b"Thumb::MTime";
pub const THUMB_URI_KEY: &[u8] = b"Thumb::URI";
pub const SOFTWARE_KEY: &[u8] = b"Software";

const TEXT_CHUNK_TYPE: &[u8; 4] = b"tEXt";
const CHUNK_OVERHEAD: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub keyword: Vec<u8>,
    pub text: Vec<u8>,
}

pub fn text_chunk(keyword: &[u8], text: &[u8]) -> Result<Vec<u8>, DomainError> {
    let mut type_and_data = Vec::with_capacity(4 + keyword.len() + 1 + text.len());
    type_and_data.extend_from_slice(TEXT_CHUNK_TYPE);
    type_and_data.extend_from_slice(keyword);
    type_and_data.push(0);
    type_and_data.extend_from_slice(text);

    let data_len = u32::try_from(type_and_data.len() - 4).map_err(|_| {
        DomainError::ChunkTooLarge(String::from_utf8_lossy(keyword).into_owned())
    })?;
    let crc = crc32fast::hash(&type_and_data);

    let mut chunk = Vec::with_capacity(type_and_data.len() + 8);
    chunk.extend_from_slice(&data_len.to_be_bytes());
    chunk.extend_from_slice(&type_and_data);
    chunk.extend_from_slice(&crc.to_be_bytes());
    Ok(chunk)
}

/// Offset just past the CRC of the first chunk after the signature.
pub fn first_chunk_end(png: &[u8]) -> Result<usize, DomainError> {
    if !png.starts_with(PNG_SIGNATURE) {
        return Err(DomainError::InvalidPng("missing png signature".to_string()));
    }
    let length = read_u32(png, PNG_SIGNATURE.len())
        .ok_or_else(|| DomainError::InvalidPng("truncated first chunk header".to_string()))?;
    let end = PNG_SIGNATURE.len() + CHUNK_OVERHEAD + length as usize;
    if end > png.len() {
        return Err(DomainError::InvalidPng(format!(
            "first chunk claims {length} bytes but stream has {}",
            png.len()
        )));
    }
    Ok(end)
}

/// Splices the three thumbnail chunks, in order, after the first chunk.
pub fn inject_thumbnail_chunks(
    png: &[u8],
    source_mtime_secs: i64,
    canonical_uri: &[u8],
    software: &[u8],
) -> Result<Vec<u8>, DomainError> {
    let offset = first_chunk_end(png)?;
    let mtime = text_chunk(THUMB_MTIME_KEY, source_mtime_secs.to_string().as_bytes())?;
    let uri = text_chunk(THUMB_URI_KEY, canonical_uri)?;
    let software = text_chunk(SOFTWARE_KEY, software)?;

    let mut out = Vec::with_capacity(png.len() + mtime.len() + uri.len() + software.len());
    out.extend_from_slice(&png[..offset]);
    out.extend_from_slice(&mtime);
    out.extend_from_slice(&uri);
    out.extend_from_slice(&software);
    out.extend_from_slice(&png[offset..]);
    Ok(out)
}

/// All `tEXt` chunks of a PNG stream in file order. CRCs are verified.
pub fn read_text_chunks(png: &[u8]) -> Result<Vec<TextChunk>, DomainError> {
    if !png.starts_with(PNG_SIGNATURE) {
        return Err(DomainError::InvalidPng("missing png signature".to_string()));
    }
    let mut chunks = Vec::new();
    let mut offset = PNG_SIGNATURE.len();
    while offset < png.len() {
        let length = read_u32(png, offset)
            .ok_or_else(|| DomainError::InvalidPng(format!("truncated chunk at {offset}")))?
            as usize;
        let end = offset + CHUNK_OVERHEAD + length;
        if end > png.len() {
            return Err(DomainError::InvalidPng(format!(
                "chunk at {offset} overruns the stream"
            )));
        }
        let type_and_data = &png[offset + 4..offset + 8 + length];
        let stored_crc = read_u32(png, offset + 8 + length).unwrap_or_default();
        if crc32fast::hash(type_and_data) != stored_crc {
            return Err(DomainError::InvalidPng(format!("bad crc for chunk at {offset}")));
        }
        if &type_and_data[..4] == TEXT_CHUNK_TYPE {
            let data = &type_and_data[4..];
            let split = data.iter().position(|byte| *byte == 0).ok_or_else(|| {
                DomainError::InvalidPng(format!("tEXt chunk at {offset} has no separator"))
            })?;
            chunks.push(TextChunk {
                keyword: data[..split].to_vec(),
                text: data[split + 1..].to_vec(),
            });
        }
        if &type_and_data[..4] == b"IEND" {
            break;
        }
        offset = end;
    }
    Ok(chunks)
}

pub fn find_text<'a>(chunks: &'a [TextChunk], keyword: &[u8]) -> Option<&'a [u8]> {
    chunks
        .iter()
        .find(|chunk| chunk.keyword == keyword)
        .map(|chunk| chunk.text.as_slice())
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw: [u8; 4] = bytes.get(offset..offset + 4)?.try_into().ok()?;
    Some(u32::from_be_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let mut type_and_data = kind.to_vec();
        type_and_data.extend_from_slice(data);
        let mut out = (data.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(&type_and_data);
        out.extend_from_slice(&crc32fast::hash(&type_and_data).to_be_bytes());
        out
    }

    fn minimal_png() -> Vec<u8> {
        let mut png = PNG_SIGNATURE.to_vec();
        png.extend(chunk(b"IHDR", &[0_u8; 13]));
        png.extend(chunk(b"IDAT", &[1, 2, 3]));
        png.extend(chunk(b"IEND", &[]));
        png
    }

    #[test]
    fn text_chunk_layout_matches_png_format() {
        let built = text_chunk(b"Software", b"tagshelf").expect("chunk");
        assert_eq!(&built[..4], &17_u32.to_be_bytes());
        assert_eq!(&built[4..8], b"tEXt");
        assert_eq!(&built[8..17], b"Software\0");
        assert_eq!(&built[17..25], b"tagshelf");
        let crc = crc32fast::hash(&built[4..25]);
        assert_eq!(&built[25..], &crc.to_be_bytes());
    }

    #[test]
    fn first_chunk_end_skips_ihdr() {
        assert_eq!(first_chunk_end(&minimal_png()).expect("end"), 8 + 12 + 13);
    }

    #[test]
    fn first_chunk_end_rejects_non_png() {
        assert!(matches!(
            first_chunk_end(b"GIF89a"),
            Err(DomainError::InvalidPng(_))
        ));
    }

    #[test]
    fn injected_chunks_follow_ihdr_in_order() {
        let png = minimal_png();
        let out = inject_thumbnail_chunks(&png, 1_700_000_000, b"file:///a%20b.png", b"tagshelf")
            .expect("inject");

        assert_eq!(out.len(), png.len() + 3 * 12 + 23 + 28 + 17);
        assert_eq!(&out[33 + 4..33 + 8], b"tEXt");

        let chunks = read_text_chunks(&out).expect("parse");
        let keywords: Vec<&[u8]> = chunks.iter().map(|c| c.keyword.as_slice()).collect();
        assert_eq!(keywords, vec![THUMB_MTIME_KEY, THUMB_URI_KEY, SOFTWARE_KEY]);
        assert_eq!(find_text(&chunks, THUMB_MTIME_KEY), Some(&b"1700000000"[..]));
        assert_eq!(
            find_text(&chunks, THUMB_URI_KEY),
            Some(&b"file:///a%20b.png"[..])
        );
    }

    #[test]
    fn corrupted_crc_is_reported() {
        let mut out = inject_thumbnail_chunks(&minimal_png(), 1, b"file:///x", b"s").expect("inject");
        let mtime_text = 33 + 8 + THUMB_MTIME_KEY.len() + 1;
        out[mtime_text] ^= 0xff;
        assert!(read_text_chunks(&out).is_err());
    }
}
