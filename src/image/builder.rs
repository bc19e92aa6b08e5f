/// Builder for creating IMD images from raw binary sector dumps

use crate::error::{ImdError, Result};
use crate::format::constants::*;
use crate::format::DataMode;
use crate::image::{CompressionMode, ImageFile, ImdHeader, SectorStatus, Track};
use crate::io::writer::WriteOptions;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::io::Read;

/// Layout of one track: data mode, sector size and ID field maps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFormat {
    /// Data mode
    pub mode: DataMode,
    /// Sector size code
    pub size_code: u8,
    /// Logical sector ids in physical order
    pub smap: Vec<u8>,
    /// Cylinder ids, when they differ from the physical cylinder
    pub cmap: Option<Vec<u8>>,
    /// Head ids, when they differ from the physical head
    pub hmap: Option<Vec<u8>>,
}

impl TrackFormat {
    /// Create a format with an explicit sector map
    pub fn new(mode: DataMode, size_code: u8, smap: Vec<u8>) -> Self {
        Self {
            mode,
            size_code,
            smap,
            cmap: None,
            hmap: None,
        }
    }

    /// Create a format with `count` sectors numbered from `first_id` in order
    pub fn sequential(mode: DataMode, size_code: u8, first_id: u8, count: u8) -> Self {
        let smap = (0..count).map(|i| first_id.wrapping_add(i)).collect();
        Self::new(mode, size_code, smap)
    }

    /// Set the cylinder map
    pub fn with_cylinder_map(mut self, cmap: Vec<u8>) -> Self {
        self.cmap = Some(cmap);
        self
    }

    /// Set the head map
    pub fn with_head_map(mut self, hmap: Vec<u8>) -> Self {
        self.hmap = Some(hmap);
        self
    }

    /// Sector size in bytes, `None` for unsupported size codes
    pub fn sector_size(&self) -> Option<usize> {
        size_code_to_bytes(self.size_code)
    }

    /// Number of raw bytes one track of this format consumes
    pub fn track_bytes(&self) -> usize {
        self.smap.len() * self.sector_size().unwrap_or(0)
    }

    /// Check that the format describes a writable track
    pub fn validate(&self) -> Result<()> {
        if self.sector_size().is_none() {
            return Err(ImdError::invalid_format(format!(
                "Unsupported sector size code {}",
                self.size_code
            )));
        }
        if self.smap.is_empty() {
            return Err(ImdError::invalid_format("Sector map is empty"));
        }
        if self.smap.len() > MAX_SECTORS_PER_TRACK {
            return Err(ImdError::invalid_format(format!(
                "Sector map has {} entries, limit is {}",
                self.smap.len(),
                MAX_SECTORS_PER_TRACK
            )));
        }
        for (name, map) in [("Cylinder", &self.cmap), ("Head", &self.hmap)] {
            if let Some(map) = map {
                if map.len() != self.smap.len() {
                    return Err(ImdError::invalid_format(format!(
                        "{} map has {} entries, sector map has {}",
                        name,
                        map.len(),
                        self.smap.len()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Builder that lays raw sector data out as IMD tracks
///
/// Input is consumed cylinder by cylinder, side 0 before side 1, each
/// track's sectors in sector map order.
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    cylinders: u8,
    sides: u8,
    fill_byte: u8,
    compression: CompressionMode,
    creator: String,
    comment: Vec<u8>,
    side_formats: [Option<TrackFormat>; 2],
    overrides: BTreeMap<(u8, u8), TrackFormat>,
}

impl ImageBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            cylinders: 40,
            sides: 1,
            fill_byte: DEFAULT_FILL_BYTE,
            compression: CompressionMode::ForceCompress,
            creator: crate::CREATOR.to_string(),
            comment: Vec::new(),
            side_formats: [None, None],
            overrides: BTreeMap::new(),
        }
    }

    /// Set the number of cylinders
    pub fn cylinders(mut self, cylinders: u8) -> Self {
        self.cylinders = cylinders;
        self
    }

    /// Set the number of sides (1 or 2)
    pub fn sides(mut self, sides: u8) -> Self {
        self.sides = sides;
        self
    }

    /// Set the byte used to pad short input
    pub fn fill_byte(mut self, fill_byte: u8) -> Self {
        self.fill_byte = fill_byte;
        self
    }

    /// Set the compression policy used when saving
    pub fn compression(mut self, compression: CompressionMode) -> Self {
        self.compression = compression;
        self
    }

    /// Set the creator written into the header line
    pub fn creator(mut self, creator: &str) -> Self {
        self.creator = creator.to_string();
        self
    }

    /// Set the comment
    pub fn comment<C: Into<Vec<u8>>>(mut self, comment: C) -> Self {
        self.comment = comment.into();
        self
    }

    /// Set the format of every track on both sides
    pub fn format(mut self, format: TrackFormat) -> Self {
        self.side_formats = [Some(format.clone()), Some(format)];
        self
    }

    /// Set the format of every track on one side
    ///
    /// Side 1 uses the side 0 format unless given its own.
    pub fn side_format(mut self, head: u8, format: TrackFormat) -> Self {
        if let Some(slot) = self.side_formats.get_mut(head as usize) {
            *slot = Some(format);
        }
        self
    }

    /// Override the format of a single track
    pub fn track_format(mut self, cylinder: u8, head: u8, format: TrackFormat) -> Self {
        self.overrides.insert((cylinder, head), format);
        self
    }

    /// Format in effect for a track
    pub fn format_for(&self, cylinder: u8, head: u8) -> Option<&TrackFormat> {
        self.overrides
            .get(&(cylinder, head))
            .or_else(|| self.side_formats.get(head as usize)?.as_ref())
            .or(self.side_formats[0].as_ref())
    }

    /// Write options carrying this builder's compression policy
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            compression: self.compression,
            ..WriteOptions::default()
        }
    }

    /// Total raw bytes the configured geometry consumes
    pub fn total_bytes(&self) -> usize {
        let mut total = 0;
        for cylinder in 0..self.cylinders {
            for head in 0..self.sides {
                total += self.format_for(cylinder, head).map_or(0, |f| f.track_bytes());
            }
        }
        total
    }

    /// Check the geometry and every track format
    pub fn validate(&self) -> Result<()> {
        if self.cylinders == 0 {
            return Err(ImdError::invalid_format("Cylinder count must be at least 1"));
        }
        if !(1..=2).contains(&self.sides) {
            return Err(ImdError::invalid_format(format!(
                "Side count must be 1 or 2, got {}",
                self.sides
            )));
        }
        if self.side_formats[0].is_none() {
            return Err(ImdError::invalid_format("No track format defined for side 0"));
        }
        for format in self.side_formats.iter().flatten() {
            format.validate()?;
        }
        for (&(cylinder, head), format) in &self.overrides {
            if cylinder >= self.cylinders || head >= self.sides {
                return Err(ImdError::invalid_format(format!(
                    "Track override {}/{} is outside the image geometry",
                    cylinder, head
                )));
            }
            format.validate()?;
        }
        Ok(())
    }

    /// Read raw sector data and lay it out as an image
    ///
    /// Every sector gets a normal status; compression is decided when the
    /// image is written.
    pub fn build<R: Read>(&self, mut reader: R) -> Result<ImageFile> {
        self.validate()?;

        let mut image = ImageFile {
            header: ImdHeader::new(&self.creator),
            comment: self.comment.clone(),
            tracks: Vec::with_capacity(self.cylinders as usize * self.sides as usize),
        };

        let mut buffer = Vec::new();
        for cylinder in 0..self.cylinders {
            for head in 0..self.sides {
                let format = self
                    .format_for(cylinder, head)
                    .ok_or(ImdError::InvalidTrack { cylinder, head })?;
                let track_bytes = format.track_bytes();

                buffer.clear();
                (&mut reader)
                    .take(track_bytes as u64)
                    .read_to_end(&mut buffer)?;
                if buffer.len() < track_bytes {
                    warn!(
                        "Input ended early at {}/{}, padding {} bytes with 0x{:02X}",
                        cylinder,
                        head,
                        track_bytes - buffer.len(),
                        self.fill_byte
                    );
                    buffer.resize(track_bytes, self.fill_byte);
                }

                image.tracks.push(make_track(cylinder, head, format, &buffer)?);
                debug!(
                    "Built track {}/{}: {} sectors, {}",
                    cylinder,
                    head,
                    format.smap.len(),
                    format.mode
                );
            }
        }

        let mut extra = [0u8; 1];
        if reader.read(&mut extra)? > 0 {
            warn!("Input contains more data than the image geometry holds");
        }
        Ok(image)
    }
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn make_track(cylinder: u8, head: u8, format: &TrackFormat, data: &[u8]) -> Result<Track> {
    let mut track = Track::new(cylinder, head, format.mode, format.size_code)?;
    for (&id, sector) in format.smap.iter().zip(data.chunks(track.sector_size())) {
        track.add_sector(id, SectorStatus::NORMAL, sector)?;
    }
    track.set_cylinder_map(format.cmap.clone())?;
    track.set_head_map(format.hmap.clone())?;
    Ok(track)
}
