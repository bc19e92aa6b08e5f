/// IMD file reader

use crate::error::{ImdError, Result};
use crate::format::constants::*;
use crate::image::{ImageFile, ImdHeader, SectorStatus, Track, TrackHeader};
use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read};
use std::path::Path;

/// Read an IMD file from disk
pub fn read_imd<P: AsRef<Path>>(path: P, fill_byte: u8) -> Result<ImageFile> {
    let file = File::open(path)?;
    read_imd_from(BufReader::new(file), fill_byte)
}

/// Read a complete IMD image from a stream
pub fn read_imd_from<R: Read>(mut reader: R, fill_byte: u8) -> Result<ImageFile> {
    let header = read_header(&mut reader)?;
    let comment = read_comment(&mut reader)?;
    let tracks = TrackReader::new(reader, fill_byte).collect::<Result<Vec<_>>>()?;

    Ok(ImageFile {
        header,
        comment,
        tracks,
    })
}

/// Read one byte, `None` at end of stream
pub(crate) fn read_byte<R: Read>(reader: &mut R) -> io::Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Fill as much of `buf` as the stream allows; returns the bytes read
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read exactly `buf.len()` bytes or fail with a truncation error
fn read_exact_at<R: Read>(reader: &mut R, buf: &mut [u8], offset: &mut usize, what: &str) -> Result<()> {
    let got = read_full(reader, buf)?;
    *offset += got;
    if got < buf.len() {
        return Err(ImdError::truncated(*offset, format!("end of file in {}", what)));
    }
    Ok(())
}

/// Read the header line
///
/// Fails with a format error as soon as the signature does not match,
/// and with a truncation error if the stream ends before the newline.
pub fn read_header<R: Read>(reader: &mut R) -> Result<ImdHeader> {
    let mut line = Vec::with_capacity(64);
    loop {
        let byte = read_byte(reader)?.ok_or_else(|| {
            ImdError::truncated(line.len(), "end of file in header line")
        })?;
        if byte == b'\n' {
            break;
        }
        line.push(byte);

        let checked = line.len().min(IMD_SIGNATURE.len());
        if line[..checked] != IMD_SIGNATURE[..checked] {
            return Err(ImdError::invalid_format("Missing IMD signature"));
        }
        if line.len() >= MAX_HEADER_LINE {
            return Err(ImdError::invalid_format("Header line too long"));
        }
    }
    ImdHeader::from_bytes(&line)
}

/// Read the comment block, consuming its terminator
pub fn read_comment<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut comment = Vec::new();
    loop {
        match read_byte(reader)? {
            Some(COMMENT_TERMINATOR) => return Ok(comment),
            Some(byte) => comment.push(byte),
            None => {
                return Err(ImdError::truncated(
                    comment.len(),
                    "comment terminator not found",
                ))
            }
        }
    }
}

/// Skip the comment block, consuming its terminator
pub fn skip_comment<R: Read>(reader: &mut R) -> Result<()> {
    let mut skipped = 0;
    loop {
        match read_byte(reader)? {
            Some(COMMENT_TERMINATOR) => return Ok(()),
            Some(_) => skipped += 1,
            None => return Err(ImdError::truncated(skipped, "comment terminator not found")),
        }
    }
}

/// Read only the fixed header of the next track
///
/// Returns `None` if the stream ends cleanly before the track. Maps and
/// sector data are left unread.
pub fn read_track_header<R: Read>(reader: &mut R) -> Result<Option<TrackHeader>> {
    let mut bytes = [0u8; TrackHeader::SIZE];
    match read_full(reader, &mut bytes)? {
        0 => Ok(None),
        TrackHeader::SIZE => Ok(Some(TrackHeader::from_bytes(bytes))),
        n => Err(ImdError::truncated(n, "end of file in track header")),
    }
}

/// Skip the maps and sector records that follow a track header
///
/// Status bytes are still validated so that a corrupt track is reported
/// rather than misread as the next header.
pub fn skip_track_body<R: Read>(reader: &mut R, header: &TrackHeader) -> Result<()> {
    let sector_size = header.sector_size().ok_or_else(|| {
        ImdError::invalid_format(format!(
            "Unsupported sector size code {} on track {}/{}",
            header.size_code, header.cylinder, header.head
        ))
    })?;
    let mut offset = TrackHeader::SIZE;
    skip_exact(reader, header.maps_len() as u64, &mut offset, "sector maps")?;
    for _ in 0..header.sector_count {
        let byte = read_byte(reader)?
            .ok_or_else(|| ImdError::truncated(offset, "end of file in sector status"))?;
        offset += 1;
        let status = SectorStatus::try_from(byte)?;
        skip_exact(reader, status.stored_len(sector_size) as u64, &mut offset, "sector data")?;
    }
    Ok(())
}

fn skip_exact<R: Read>(reader: &mut R, len: u64, offset: &mut usize, what: &str) -> Result<()> {
    let got = io::copy(&mut reader.by_ref().take(len), &mut io::sink())?;
    *offset += got as usize;
    if got < len {
        return Err(ImdError::truncated(*offset, format!("end of file in {}", what)));
    }
    Ok(())
}

/// Load the next track
///
/// Returns `None` on a clean end of file between tracks.
pub fn load_track<R: Read>(reader: &mut R, fill_byte: u8) -> Result<Option<Track>> {
    let mut track = Track::default();
    Ok(load_track_into(reader, &mut track, fill_byte)?.then_some(track))
}

/// Load the next track into an existing track, reusing its buffers
///
/// Returns `false` on a clean end of file. On error the track is left
/// empty.
pub fn load_track_into<R: Read>(reader: &mut R, track: &mut Track, fill_byte: u8) -> Result<bool> {
    track.clear();
    let result = load_track_body(reader, track, fill_byte);
    if !matches!(result, Ok(true)) {
        track.clear();
    }
    result
}

fn load_track_body<R: Read>(reader: &mut R, track: &mut Track, fill_byte: u8) -> Result<bool> {
    let header = match read_track_header(reader)? {
        Some(h) => h,
        None => return Ok(false),
    };
    let sector_size = header.sector_size().ok_or_else(|| {
        ImdError::invalid_format(format!(
            "Unsupported sector size code {} on track {}/{}",
            header.size_code, header.cylinder, header.head
        ))
    })?;
    let count = header.sector_count as usize;
    let mut offset = TrackHeader::SIZE;

    track.mode = header.mode;
    track.cylinder = header.cylinder;
    track.head = header.head;
    track.size_code = header.size_code;
    track.sector_size = sector_size;

    track.smap.resize(count, 0);
    read_exact_at(reader, &mut track.smap, &mut offset, "sector map")?;
    if header.has_cylinder_map() {
        let mut cmap = vec![0u8; count];
        read_exact_at(reader, &mut cmap, &mut offset, "cylinder map")?;
        track.cmap = Some(cmap);
    }
    if header.has_head_map() {
        let mut hmap = vec![0u8; count];
        read_exact_at(reader, &mut hmap, &mut offset, "head map")?;
        track.hmap = Some(hmap);
    }

    track.data.resize(count * sector_size, fill_byte);
    track.sflag.reserve(count);
    for index in 0..count {
        let byte = read_byte(reader)?
            .ok_or_else(|| ImdError::truncated(offset, "end of file in sector status"))?;
        offset += 1;
        let status = SectorStatus::try_from(byte)?;

        let region = &mut track.data[index * sector_size..(index + 1) * sector_size];
        match status {
            SectorStatus::Unavailable => region.fill(fill_byte),
            SectorStatus::Present { compressed: true, .. } => {
                let value = read_byte(reader)?.ok_or_else(|| {
                    ImdError::truncated(offset, "end of file in compressed sector")
                })?;
                offset += 1;
                region.fill(value);
            }
            SectorStatus::Present { .. } => {
                read_exact_at(reader, region, &mut offset, "sector data")?;
            }
        }
        track.sflag.push(status);
    }

    Ok(true)
}

/// Iterator over the tracks of a stream positioned after the comment
///
/// Stops after the first error.
pub struct TrackReader<R> {
    reader: R,
    fill_byte: u8,
    done: bool,
}

impl<R: Read> TrackReader<R> {
    /// Create a track iterator
    pub fn new(reader: R, fill_byte: u8) -> Self {
        Self {
            reader,
            fill_byte,
            done: false,
        }
    }

    /// Recover the underlying stream
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Iterator for TrackReader<R> {
    type Item = Result<Track>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match load_track(&mut self.reader, self.fill_byte) {
            Ok(Some(track)) => Some(Ok(track)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
