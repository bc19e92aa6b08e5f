/// IMD image data structures

/// Builder for creating images from raw binary data
pub mod builder;
/// Header line
pub mod header;
/// Physical interleave analysis
pub mod interleave;
/// Sector status and uniformity
pub mod sector;
/// Track definition and header
pub mod track;

pub use builder::{ImageBuilder, TrackFormat};
pub use header::ImdHeader;
pub use interleave::{calculate_best_interleave, Interleave, InterleaveMode};
pub use sector::{is_uniform, CompressionMode, SectorStats, SectorStatus};
pub use track::{Track, TrackHeader};

use crate::error::{ImdError, Result};
use crate::format::DEFAULT_FILL_BYTE;
use crate::io::writer::WriteOptions;
use log::{debug, warn};
use std::io::{Read, Write};
use std::path::Path;

/// A complete IMD image held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub(crate) header: ImdHeader,
    pub(crate) comment: Vec<u8>,
    pub(crate) tracks: Vec<Track>,
}

impl ImageFile {
    /// Create an empty image with a fresh header
    pub fn new(creator: &str) -> Self {
        Self {
            header: ImdHeader::new(creator),
            comment: Vec::new(),
            tracks: Vec::new(),
        }
    }

    /// Open an IMD file from disk, filling unavailable sectors with 0xE5
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let image = crate::io::reader::read_imd(path.as_ref(), DEFAULT_FILL_BYTE)?;
        debug!(
            "Loaded {} tracks from {}",
            image.tracks.len(),
            path.as_ref().display()
        );
        Ok(image)
    }

    /// Read an IMD image from a stream
    pub fn read_from<R: Read>(reader: R, fill_byte: u8) -> Result<Self> {
        crate::io::reader::read_imd_from(reader, fill_byte)
    }

    /// Save the image to a file
    pub fn save<P: AsRef<Path>>(&self, path: P, opts: &WriteOptions) -> Result<()> {
        crate::io::writer::write_imd(self, path.as_ref(), opts)?;
        debug!(
            "Saved {} tracks to {}",
            self.tracks.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Write the image to a stream
    pub fn write_to<W: Write>(&self, writer: &mut W, opts: &WriteOptions) -> Result<()> {
        crate::io::writer::write_imd_to(writer, self, opts)
    }

    /// Get the header line
    pub fn header(&self) -> &ImdHeader {
        &self.header
    }

    /// Replace the header line
    pub fn set_header(&mut self, header: ImdHeader) {
        self.header = header;
    }

    /// Get the comment bytes (without terminator)
    pub fn comment(&self) -> &[u8] {
        &self.comment
    }

    /// Get the comment as text
    pub fn comment_text(&self) -> String {
        String::from_utf8_lossy(&self.comment).into_owned()
    }

    /// Replace the comment
    pub fn set_comment<C: Into<Vec<u8>>>(&mut self, comment: C) {
        self.comment = comment.into();
    }

    /// Get all tracks in file order
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Get mutable access to all tracks
    pub fn tracks_mut(&mut self) -> &mut [Track] {
        &mut self.tracks
    }

    /// Get the number of tracks
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Append a track
    pub fn add_track(&mut self, track: Track) {
        self.tracks.push(track);
    }

    /// Get a track by physical cylinder and head
    pub fn get_track(&self, cylinder: u8, head: u8) -> Option<&Track> {
        self.tracks
            .iter()
            .find(|t| t.cylinder == cylinder && t.head == head)
    }

    /// Get a mutable track by physical cylinder and head
    pub fn get_track_mut(&mut self, cylinder: u8, head: u8) -> Result<&mut Track> {
        self.tracks
            .iter_mut()
            .find(|t| t.cylinder == cylinder && t.head == head)
            .ok_or(ImdError::InvalidTrack { cylinder, head })
    }

    /// Read sector data by cylinder, head and logical id
    pub fn read_sector(&self, cylinder: u8, head: u8, sector_id: u8) -> Result<&[u8]> {
        let track = self
            .get_track(cylinder, head)
            .ok_or(ImdError::InvalidTrack { cylinder, head })?;
        track.get_sector(sector_id).ok_or_else(|| {
            ImdError::invalid_format(format!(
                "No sector {} on track {}/{}",
                sector_id, cylinder, head
            ))
        })
    }

    /// Highest cylinder number present
    pub fn max_cylinder(&self) -> Option<u8> {
        self.tracks.iter().map(|t| t.cylinder).max()
    }

    /// Number of distinct heads present
    pub fn head_count(&self) -> usize {
        let mut seen = [false; 256];
        for track in &self.tracks {
            seen[track.head as usize] = true;
        }
        seen.iter().filter(|&&s| s).count()
    }

    /// Merge the tracks of another image into this one
    ///
    /// Tracks are interleaved in ascending (cylinder, head) order. When
    /// both images hold the same track, this image's copy is kept.
    pub fn merge(&mut self, other: ImageFile) {
        let mine = std::mem::take(&mut self.tracks);
        let mut merged = Vec::with_capacity(mine.len() + other.tracks.len());
        let mut a = mine.into_iter().peekable();
        let mut b = other.tracks.into_iter().peekable();

        loop {
            let ka = a.peek().map(|t| (t.cylinder, t.head));
            let kb = b.peek().map(|t| (t.cylinder, t.head));
            let take_a = match (ka, kb) {
                (Some(ka), Some(kb)) => {
                    if ka == kb {
                        warn!(
                            "Track {}/{} present in both images, keeping the first",
                            ka.0, ka.1
                        );
                        b.next();
                    }
                    ka <= kb
                }
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            let next = if take_a { a.next() } else { b.next() };
            merged.extend(next);
        }
        self.tracks = merged;
    }

    /// Count sector classes over the whole image as stored
    pub fn sector_stats(&self) -> SectorStats {
        let mut stats = SectorStats::default();
        for track in &self.tracks {
            stats.record_all(track.statuses().iter().copied());
        }
        stats
    }
}
