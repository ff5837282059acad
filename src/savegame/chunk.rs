//! FORM/SCEN container framing.
//!
//! Layout: `FORM <u32 BE length> SCEN` followed by sibling chunks
//! `<tag> <u32 BE length> <payload> [pad]`. `SCEN` carries no length field.
//! Odd-length payloads are followed by a single zero pad byte.

use std::io::{self, Read, Seek, SeekFrom, Write};

use log::debug;

use super::{tag_name, Tag, TAG_FORM, TAG_SCEN};
use crate::error::SaveError;

/// Header of a chunk located by [`ChunkReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub tag: Tag,
    pub length: u32,
    /// Stream offset of the first payload byte.
    pub payload_start: u64,
}

impl ChunkHeader {
    /// Offset of the next sibling chunk header.
    pub fn next_offset(&self) -> u64 {
        self.payload_start + padded_len(self.length)
    }
}

/// Payload length plus the alignment pad byte.
pub fn padded_len(length: u32) -> u64 {
    length as u64 + (length & 1) as u64
}

/// Sequential chunk writer with backpatched lengths.
pub struct ChunkWriter<W: Write + Seek> {
    inner: W,
    form_start: u64,
}

impl<W: Write + Seek> ChunkWriter<W> {
    /// Write the container header and return a writer positioned for the
    /// first chunk.
    pub fn open(mut inner: W) -> io::Result<Self> {
        let form_start = inner.stream_position()?;
        inner.write_all(&TAG_FORM)?;
        inner.write_all(&0u32.to_be_bytes())?;
        inner.write_all(&TAG_SCEN)?;
        Ok(ChunkWriter { inner, form_start })
    }

    /// Write one chunk whose payload is produced by `producer`, and return
    /// the payload length.
    pub fn write_chunk<F, E>(&mut self, tag: Tag, producer: F) -> Result<u32, E>
    where
        F: FnOnce(&mut W) -> Result<(), E>,
        E: From<io::Error>,
    {
        self.inner.write_all(&tag)?;
        self.inner.write_all(&0u32.to_be_bytes())?;
        let start = self.inner.stream_position()?;

        producer(&mut self.inner)?;

        let end = self.inner.stream_position()?;
        let length = u32::try_from(end - start).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, "chunk larger than 4 GiB")
        })?;

        self.inner.seek(SeekFrom::Start(start - 4))?;
        self.inner.write_all(&length.to_be_bytes())?;
        self.inner.seek(SeekFrom::Start(end))?;

        if length % 2 == 1 {
            self.inner.write_all(&[0])?;
        }

        debug!("Wrote {} chunk ({} bytes)", tag_name(&tag), length);
        Ok(length)
    }

    /// Backpatch the FORM length and hand back the stream.
    pub fn close(mut self) -> io::Result<W> {
        let end = self.inner.stream_position()?;
        let total = u32::try_from(end - self.form_start - 8).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, "savegame larger than 4 GiB")
        })?;

        self.inner.seek(SeekFrom::Start(self.form_start + 4))?;
        self.inner.write_all(&total.to_be_bytes())?;
        self.inner.seek(SeekFrom::Start(end))?;
        self.inner.flush()?;

        debug!("Closed FORM ({} bytes)", total);
        Ok(self.inner)
    }
}

/// Chunk scanner over an opened container.
pub struct ChunkReader<R: Read + Seek> {
    inner: R,
    rewind_point: u64,
    stream_len: u64,
}

impl<R: Read + Seek> ChunkReader<R> {
    /// Validate `FORM ... SCEN` and remember the first chunk offset as the
    /// rewind point.
    pub fn open(mut inner: R) -> Result<Self, SaveError> {
        let mut tag = [0u8; 4];
        read_magic(&mut inner, &mut tag)?;
        if tag != TAG_FORM {
            return Err(SaveError::MagicMismatch);
        }

        let mut length = [0u8; 4];
        read_magic(&mut inner, &mut length)?;

        read_magic(&mut inner, &mut tag)?;
        if tag != TAG_SCEN {
            return Err(SaveError::MagicMismatch);
        }

        let rewind_point = inner.stream_position()?;
        let stream_len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(rewind_point))?;
        Ok(ChunkReader {
            inner,
            rewind_point,
            stream_len,
        })
    }

    pub fn rewind_point(&self) -> u64 {
        self.rewind_point
    }

    /// Seek back to the first chunk after `SCEN`.
    pub fn rewind(&mut self) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(self.rewind_point))?;
        Ok(())
    }

    /// Read the next chunk header.
    ///
    /// A clean end of stream before the tag returns `None`; a stream that
    /// ends inside the header is `Truncated`.
    pub fn next_chunk(&mut self) -> Result<Option<ChunkHeader>, SaveError> {
        let mut tag = [0u8; 4];
        if !read_or_eof(&mut self.inner, &mut tag).map_err(|e| SaveError::in_chunk(e, tag))? {
            return Ok(None);
        }

        let mut length = [0u8; 4];
        self.inner
            .read_exact(&mut length)
            .map_err(|e| SaveError::in_chunk(e, tag))?;

        Ok(Some(ChunkHeader {
            tag,
            length: u32::from_be_bytes(length),
            payload_start: self.inner.stream_position()?,
        }))
    }

    /// Scan forward from the current position for `tag`, leaving the stream
    /// at the start of its payload. Running out of chunks is `None`.
    pub fn find_chunk(&mut self, tag: Tag) -> Result<Option<ChunkHeader>, SaveError> {
        loop {
            let header = match self.next_chunk() {
                Ok(Some(header)) => header,
                Ok(None) | Err(SaveError::Truncated(_)) => return Ok(None),
                Err(e) => return Err(e),
            };

            if header.tag == tag {
                return Ok(Some(header));
            }
            match self.skip(&header) {
                Ok(()) => {}
                Err(SaveError::Truncated(_)) => return Ok(None),
                Err(e) => return Err(e),
            }
        }
    }

    /// Position the stream at the chunk following `header`, however much of
    /// its payload has been consumed.
    ///
    /// A payload that runs past the end of the stream is `Truncated`. A
    /// missing pad byte after the last chunk is tolerated.
    pub fn skip(&mut self, header: &ChunkHeader) -> Result<(), SaveError> {
        if header.payload_start + header.length as u64 > self.stream_len {
            return Err(SaveError::Truncated(header.tag));
        }
        self.inner.seek(SeekFrom::Start(header.next_offset()))?;
        Ok(())
    }

    pub fn inner_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

fn read_magic<R: Read>(inner: &mut R, buf: &mut [u8; 4]) -> Result<(), SaveError> {
    inner.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            SaveError::MagicMismatch
        } else {
            SaveError::Io(e)
        }
    })
}

/// Fill `buf`, returning `false` if the stream was already exhausted.
fn read_or_eof<R: Read>(inner: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match inner.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn write_sample(chunks: &[(Tag, &[u8])]) -> Vec<u8> {
        let mut writer = ChunkWriter::open(Cursor::new(Vec::new())).unwrap();
        for (tag, payload) in chunks {
            writer
                .write_chunk(*tag, |w| w.write_all(payload))
                .unwrap();
        }
        writer.close().unwrap().into_inner()
    }

    #[test_log::test]
    fn header_layout_is_form_length_scen() {
        let bytes = write_sample(&[(*b"NAME", &b"hi\0"[..])]);

        assert_eq!(&bytes[0..4], b"FORM");
        assert_eq!(u32::from_be_bytes(bytes[4..8].try_into().unwrap()) as usize, bytes.len() - 8);
        assert_eq!(&bytes[8..12], b"SCEN");
        assert_eq!(&bytes[12..16], b"NAME");
        assert_eq!(&bytes[16..20], &3u32.to_be_bytes());
        assert_eq!(&bytes[20..23], b"hi\0");
        // pad byte after the odd payload
        assert_eq!(bytes[23], 0);
        assert_eq!(bytes.len(), 24);
    }

    #[test_log::test]
    fn sibling_chunks_are_spaced_by_padded_length() {
        let bytes = write_sample(&[
            (*b"AAAA", &[1u8, 2, 3][..]),
            (*b"BBBB", &[][..]),
            (*b"CCCC", &[9u8; 10][..]),
        ]);

        let mut offset = 12;
        for (tag, len) in [(b"AAAA", 3u32), (b"BBBB", 0), (b"CCCC", 10)] {
            assert_eq!(&bytes[offset..offset + 4], tag);
            let stored = u32::from_be_bytes(bytes[offset + 4..offset + 8].try_into().unwrap());
            assert_eq!(stored, len);
            offset += 8 + len as usize + (len & 1) as usize;
        }
        assert_eq!(offset, bytes.len());
    }

    #[test_log::test]
    fn find_chunk_skips_others_and_rewinds() {
        let bytes = write_sample(&[(*b"AAAA", &[1u8, 2, 3][..]), (*b"BBBB", &[4u8, 5][..])]);
        let mut reader = ChunkReader::open(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.rewind_point(), 12);

        let header = reader.find_chunk(*b"BBBB").unwrap().unwrap();
        assert_eq!(header.length, 2);
        let mut payload = [0u8; 2];
        reader.inner_mut().read_exact(&mut payload).unwrap();
        assert_eq!(payload, [4, 5]);

        assert!(reader.find_chunk(*b"AAAA").unwrap().is_none());

        reader.rewind().unwrap();
        let header = reader.find_chunk(*b"AAAA").unwrap().unwrap();
        assert_eq!(header.length, 3);
    }

    #[test_log::test]
    fn next_chunk_ends_cleanly_and_flags_partial_headers() {
        let mut bytes = write_sample(&[(*b"AAAA", &[1u8, 2][..])]);
        let mut reader = ChunkReader::open(Cursor::new(bytes.clone())).unwrap();
        let header = reader.next_chunk().unwrap().unwrap();
        reader.skip(&header).unwrap();
        assert!(reader.next_chunk().unwrap().is_none());

        bytes.extend_from_slice(b"BBBB\0\0");
        let mut reader = ChunkReader::open(Cursor::new(bytes)).unwrap();
        let header = reader.next_chunk().unwrap().unwrap();
        reader.skip(&header).unwrap();
        assert!(matches!(reader.next_chunk(), Err(SaveError::Truncated(t)) if &t == b"BBBB"));
    }

    #[test_log::test]
    fn skip_past_the_end_is_truncated() {
        let mut bytes = write_sample(&[(*b"AAAA", &[1u8, 2][..])]);
        bytes.extend_from_slice(b"BBBB");
        bytes.extend_from_slice(&100u32.to_be_bytes());
        bytes.extend_from_slice(&[7, 7, 7]);

        let mut reader = ChunkReader::open(Cursor::new(bytes)).unwrap();
        let header = reader.next_chunk().unwrap().unwrap();
        reader.skip(&header).unwrap();
        let header = reader.next_chunk().unwrap().unwrap();
        assert_eq!(header.length, 100);
        assert!(matches!(reader.skip(&header), Err(SaveError::Truncated(t)) if &t == b"BBBB"));

        reader.rewind().unwrap();
        assert!(reader.find_chunk(*b"CCCC").unwrap().is_none());
    }

    #[test_log::test]
    fn last_chunk_may_omit_its_pad_byte() {
        let mut bytes = write_sample(&[(*b"AAAA", &[1u8, 2, 3][..])]);
        bytes.pop();

        let mut reader = ChunkReader::open(Cursor::new(bytes)).unwrap();
        let header = reader.next_chunk().unwrap().unwrap();
        reader.skip(&header).unwrap();
        assert!(reader.next_chunk().unwrap().is_none());
    }

    #[test_log::test]
    fn open_rejects_foreign_files() {
        assert!(matches!(
            ChunkReader::open(Cursor::new(b"RIFF\0\0\0\0WAVE".to_vec())),
            Err(SaveError::MagicMismatch)
        ));
        assert!(matches!(
            ChunkReader::open(Cursor::new(b"FORM\0\0\0\0IFZS".to_vec())),
            Err(SaveError::MagicMismatch)
        ));
        assert!(matches!(
            ChunkReader::open(Cursor::new(b"FOR".to_vec())),
            Err(SaveError::MagicMismatch)
        ));
    }
}
