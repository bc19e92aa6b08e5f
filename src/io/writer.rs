/// IMD and raw binary writers

use crate::error::{ImdError, Result};
use crate::format::constants::*;
use crate::format::ModeTranslation;
use crate::image::interleave::{physical_order, InterleaveMode};
use crate::image::{CompressionMode, ImageFile, ImdHeader, SectorStatus, Track};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Options controlling how tracks are written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Compression policy for IMD output
    pub compression: CompressionMode,
    /// Clear the data error flag on every sector
    pub force_non_bad: bool,
    /// Clear the deleted data address mark on every sector
    pub force_non_deleted: bool,
    /// Data mode rewriting for IMD output
    pub mode_translation: ModeTranslation,
    /// Sector order for binary output
    pub interleave: InterleaveMode,
    /// Fill value for unavailable sectors in binary output; the loaded
    /// fill is used when `None`
    pub fill_byte: Option<u8>,
}

fn put<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    writer.write_all(bytes).map_err(ImdError::Write)
}

/// Write an IMD file to disk
pub fn write_imd<P: AsRef<Path>>(image: &ImageFile, path: P, opts: &WriteOptions) -> Result<()> {
    let file = File::create(path).map_err(ImdError::Write)?;
    let mut writer = BufWriter::new(file);
    write_imd_to(&mut writer, image, opts)?;
    writer.flush().map_err(ImdError::Write)
}

/// Write a complete IMD image to a stream
pub fn write_imd_to<W: Write>(writer: &mut W, image: &ImageFile, opts: &WriteOptions) -> Result<()> {
    write_header(writer, &image.header)?;
    write_comment(writer, &image.comment)?;
    for track in &image.tracks {
        write_track_imd(writer, track, opts)?;
    }
    Ok(())
}

/// Write the raw sector data of every track to a stream
pub fn write_bin_to<W: Write>(writer: &mut W, image: &ImageFile, opts: &WriteOptions) -> Result<()> {
    for track in &image.tracks {
        write_track_bin(writer, track, opts)?;
    }
    Ok(())
}

/// Write the header line followed by CR LF
pub fn write_header<W: Write>(writer: &mut W, header: &ImdHeader) -> Result<()> {
    put(writer, header.as_bytes())?;
    put(writer, b"\r\n")
}

/// Write the comment block and its single terminator
///
/// Terminator bytes inside the comment are dropped.
pub fn write_comment<W: Write>(writer: &mut W, comment: &[u8]) -> Result<()> {
    for chunk in comment.split(|&b| b == COMMENT_TERMINATOR) {
        put(writer, chunk)?;
    }
    put(writer, &[COMMENT_TERMINATOR])
}

/// Status each sector of `track` will carry when written with `opts`
pub fn resolved_statuses(track: &Track, opts: &WriteOptions) -> Vec<SectorStatus> {
    track
        .statuses()
        .iter()
        .enumerate()
        .map(|(index, status)| {
            let data = track.sector_data(index).unwrap_or(&[]);
            status.resolve(
                data,
                opts.compression,
                opts.force_non_bad,
                opts.force_non_deleted,
            )
        })
        .collect()
}

/// Write one track in IMD form
pub fn write_track_imd<W: Write>(writer: &mut W, track: &Track, opts: &WriteOptions) -> Result<()> {
    let statuses = resolved_statuses(track, opts);

    let mut header = track.header();
    header.mode = opts.mode_translation.apply(header.mode);
    put(writer, &header.to_bytes())?;
    put(writer, track.smap())?;
    if let Some(cmap) = track.cmap() {
        put(writer, cmap)?;
    }
    if let Some(hmap) = track.hmap() {
        put(writer, hmap)?;
    }

    for (index, status) in statuses.iter().enumerate() {
        let data = track.sector_data(index).ok_or_else(|| {
            ImdError::invalid_format(format!(
                "Track {}/{} has no data for sector {}",
                track.cylinder, track.head, index
            ))
        })?;
        put(writer, &[status.to_wire()])?;
        match status {
            SectorStatus::Unavailable => {}
            SectorStatus::Present { compressed: true, .. } => put(writer, &data[..1])?,
            SectorStatus::Present { .. } => put(writer, data)?,
        }
    }
    Ok(())
}

/// Write one track as raw sector data, ordered per `opts.interleave`
pub fn write_track_bin<W: Write>(writer: &mut W, track: &Track, opts: &WriteOptions) -> Result<()> {
    let fill = opts.fill_byte.map(|b| vec![b; track.sector_size()]);

    for index in physical_order(track.smap(), opts.interleave) {
        let data = track.sector_data(index).ok_or_else(|| {
            ImdError::invalid_format(format!(
                "Track {}/{} has no data for sector {}",
                track.cylinder, track.head, index
            ))
        })?;
        match (&fill, track.status(index)) {
            (Some(fill), Some(SectorStatus::Unavailable)) => put(writer, fill)?,
            _ => put(writer, data)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::DataMode;
    use crate::io::reader::load_track;
    use std::io::Cursor;

    fn track_with(statuses: &[(u8, SectorStatus, u8)]) -> Track {
        let mut track = Track::new(1, 0, DataMode::Mfm250, 0).unwrap();
        for &(id, status, fill) in statuses {
            track.add_sector(id, status, &[fill; 128]).unwrap();
        }
        track
    }

    /// Writer that fails after accepting `limit` bytes
    struct FailingWriter {
        limit: usize,
        written: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.written + buf.len() > self.limit {
                return Err(std::io::Error::other("device full"));
            }
            self.written += buf.len();
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_comment_single_terminator() {
        let mut out = Vec::new();
        write_comment(&mut out, b"a\x1ab").unwrap();
        assert_eq!(out, b"ab\x1a");

        let mut out = Vec::new();
        write_comment(&mut out, b"").unwrap();
        assert_eq!(out, vec![COMMENT_TERMINATOR]);
    }

    #[test]
    fn test_write_header() {
        let header = ImdHeader::parse("IMD 1.18: 01/01/2000 00:00:00").unwrap();
        let mut out = Vec::new();
        write_header(&mut out, &header).unwrap();
        assert_eq!(out, b"IMD 1.18: 01/01/2000 00:00:00\r\n");
    }

    #[test]
    fn test_header_bytes_written_unchanged() {
        let raw = b"IMD 1.18: 01/01/2000 00:00:00 \xE9t\xE9\r\n";
        let header = crate::io::reader::read_header(&mut &raw[..]).unwrap();
        let mut out = Vec::new();
        write_header(&mut out, &header).unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn test_write_track_imd_layout() {
        let track = track_with(&[
            (1, SectorStatus::COMPRESSED, 0xE5),
            (2, SectorStatus::Unavailable, 0x00),
        ]);
        let mut out = Vec::new();
        write_track_imd(&mut out, &track, &WriteOptions::default()).unwrap();
        assert_eq!(out, vec![5, 1, 0, 2, 0, 1, 2, 2, 0xE5, 0]);
    }

    #[test]
    fn test_write_track_imd_force_decompress() {
        let track = track_with(&[(1, SectorStatus::COMPRESSED, 0xE5)]);
        let opts = WriteOptions {
            compression: CompressionMode::ForceDecompress,
            ..WriteOptions::default()
        };
        let mut out = Vec::new();
        write_track_imd(&mut out, &track, &opts).unwrap();

        assert_eq!(out.len(), 5 + 1 + 1 + 128);
        assert_eq!(out[6], 1);
        assert!(out[7..].iter().all(|&b| b == 0xE5));
    }

    #[test]
    fn test_write_track_imd_maps_and_mode_translation() {
        let mut track = track_with(&[(1, SectorStatus::NORMAL, 0x10)]);
        track.set_cylinder_map(Some(vec![7])).unwrap();
        track.set_head_map(Some(vec![1])).unwrap();

        let mut opts = WriteOptions::default();
        opts.mode_translation.translate_rate(250, 300);
        let mut out = Vec::new();
        write_track_imd(&mut out, &track, &opts).unwrap();

        assert_eq!(&out[..8], &[4, 1, 0xC0, 1, 0, 1, 7, 1]);
    }

    #[test]
    fn test_imd_round_trip() {
        let mut track = track_with(&[
            (3, SectorStatus::from_wire(8).unwrap(), 0x00),
            (1, SectorStatus::Unavailable, 0xE5),
            (2, SectorStatus::from_wire(3).unwrap(), 0x42),
        ]);
        track.sector_data_mut(2).unwrap()[10] = 0x43;

        let mut out = Vec::new();
        write_track_imd(&mut out, &track, &WriteOptions::default()).unwrap();
        let loaded = load_track(&mut Cursor::new(out), 0xE5).unwrap().unwrap();
        assert_eq!(loaded, track);
    }

    #[test]
    fn test_write_track_bin_orders() {
        let track = track_with(&[
            (2, SectorStatus::NORMAL, 0x22),
            (1, SectorStatus::NORMAL, 0x11),
            (3, SectorStatus::Unavailable, 0x00),
        ]);

        let mut out = Vec::new();
        write_track_bin(&mut out, &track, &WriteOptions::default()).unwrap();
        assert_eq!(out.len(), 3 * 128);
        assert_eq!((out[0], out[128], out[256]), (0x22, 0x11, 0x00));

        let opts = WriteOptions {
            interleave: InterleaveMode::Factor(1),
            fill_byte: Some(0xF6),
            ..WriteOptions::default()
        };
        let mut out = Vec::new();
        write_track_bin(&mut out, &track, &opts).unwrap();
        assert_eq!((out[0], out[128], out[256]), (0x11, 0x22, 0xF6));
    }

    #[test]
    fn test_write_error() {
        let track = track_with(&[(1, SectorStatus::NORMAL, 0x10)]);
        let mut writer = FailingWriter {
            limit: 20,
            written: 0,
        };
        let err = write_track_imd(&mut writer, &track, &WriteOptions::default()).unwrap_err();
        assert!(err.is_write_error());
    }
}
