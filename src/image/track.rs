/// Track data structures

use crate::error::{ImdError, Result};
use crate::format::constants::*;
use crate::format::DataMode;
use crate::image::interleave::{calculate_best_interleave, Interleave};
use crate::image::sector::SectorStatus;

/// The five fixed bytes that open every track record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackHeader {
    /// Data mode byte
    pub mode: u8,
    /// Physical cylinder
    pub cylinder: u8,
    /// Physical head (map flags stripped)
    pub head: u8,
    /// Map presence flags from the head byte
    pub flags: u8,
    /// Number of sectors on the track
    pub sector_count: u8,
    /// Sector size code
    pub size_code: u8,
}

impl TrackHeader {
    /// Size of the header on disk
    pub const SIZE: usize = 5;

    /// Decode the on-disk header bytes
    pub fn from_bytes(bytes: [u8; Self::SIZE]) -> Self {
        Self {
            mode: bytes[0],
            cylinder: bytes[1],
            head: bytes[2] & HEAD_MASK,
            flags: bytes[2] & (HFLAG_CYLINDER_MAP | HFLAG_HEAD_MAP),
            sector_count: bytes[3],
            size_code: bytes[4],
        }
    }

    /// Encode as on-disk header bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        [
            self.mode,
            self.cylinder,
            (self.head & HEAD_MASK) | self.flags,
            self.sector_count,
            self.size_code,
        ]
    }

    /// Check if a cylinder map follows the sector map
    pub fn has_cylinder_map(&self) -> bool {
        self.flags & HFLAG_CYLINDER_MAP != 0
    }

    /// Check if a head map follows
    pub fn has_head_map(&self) -> bool {
        self.flags & HFLAG_HEAD_MAP != 0
    }

    /// Sector size in bytes, `None` for unsupported size codes
    pub fn sector_size(&self) -> Option<usize> {
        size_code_to_bytes(self.size_code)
    }

    /// Decoded data mode, `None` for unknown mode bytes
    pub fn data_mode(&self) -> Option<DataMode> {
        DataMode::from_code(self.mode)
    }

    /// Total bytes of sector, cylinder and head maps
    pub fn maps_len(&self) -> usize {
        let n = self.sector_count as usize;
        n + if self.has_cylinder_map() { n } else { 0 } + if self.has_head_map() { n } else { 0 }
    }
}

/// A disk track: maps, per-sector status and expanded sector data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Data mode byte (see [`DataMode`])
    pub mode: u8,
    /// Physical cylinder
    pub cylinder: u8,
    /// Physical head
    pub head: u8,
    pub(crate) size_code: u8,
    pub(crate) sector_size: usize,
    /// Physical position -> logical sector id
    pub(crate) smap: Vec<u8>,
    pub(crate) cmap: Option<Vec<u8>>,
    pub(crate) hmap: Option<Vec<u8>>,
    pub(crate) sflag: Vec<SectorStatus>,
    /// `sector_count * sector_size` bytes, physical order
    pub(crate) data: Vec<u8>,
}

impl Default for Track {
    fn default() -> Self {
        Self {
            mode: 0,
            cylinder: 0,
            head: 0,
            size_code: 0,
            sector_size: SECTOR_SIZES[0],
            smap: Vec::new(),
            cmap: None,
            hmap: None,
            sflag: Vec::new(),
            data: Vec::new(),
        }
    }
}

impl Track {
    /// Create an empty track
    pub fn new(cylinder: u8, head: u8, mode: DataMode, size_code: u8) -> Result<Self> {
        let sector_size = size_code_to_bytes(size_code).ok_or_else(|| {
            ImdError::invalid_format(format!("Unsupported sector size code {}", size_code))
        })?;
        Ok(Self {
            mode: mode.code(),
            cylinder,
            head,
            size_code,
            sector_size,
            ..Self::default()
        })
    }

    /// Append a sector at the next physical position
    pub fn add_sector(&mut self, id: u8, status: SectorStatus, data: &[u8]) -> Result<()> {
        if self.smap.len() >= MAX_SECTORS_PER_TRACK {
            return Err(ImdError::invalid_format(format!(
                "Track {}/{} already has {} sectors",
                self.cylinder, self.head, MAX_SECTORS_PER_TRACK
            )));
        }
        if data.len() != self.sector_size {
            return Err(ImdError::invalid_format(format!(
                "Sector data is {} bytes, track sector size is {}",
                data.len(),
                self.sector_size
            )));
        }
        self.smap.push(id);
        if let Some(cmap) = self.cmap.as_mut() {
            cmap.push(self.cylinder);
        }
        if let Some(hmap) = self.hmap.as_mut() {
            hmap.push(self.head);
        }
        self.sflag.push(status);
        self.data.extend_from_slice(data);
        Ok(())
    }

    /// Header fields as they would be written
    pub fn header(&self) -> TrackHeader {
        let mut flags = 0;
        if self.cmap.is_some() {
            flags |= HFLAG_CYLINDER_MAP;
        }
        if self.hmap.is_some() {
            flags |= HFLAG_HEAD_MAP;
        }
        TrackHeader {
            mode: self.mode,
            cylinder: self.cylinder,
            head: self.head,
            flags,
            sector_count: self.smap.len() as u8,
            size_code: self.size_code,
        }
    }

    /// Decoded data mode, `None` for unknown mode bytes
    pub fn data_mode(&self) -> Option<DataMode> {
        DataMode::from_code(self.mode)
    }

    /// Sector size code
    pub fn size_code(&self) -> u8 {
        self.size_code
    }

    /// Sector size in bytes
    pub fn sector_size(&self) -> usize {
        self.sector_size
    }

    /// Get the number of sectors in this track
    pub fn sector_count(&self) -> usize {
        self.smap.len()
    }

    /// Check if this track has any sectors
    pub fn is_empty(&self) -> bool {
        self.smap.is_empty()
    }

    /// Sector numbering map (physical order)
    pub fn smap(&self) -> &[u8] {
        &self.smap
    }

    /// Cylinder map, if present
    pub fn cmap(&self) -> Option<&[u8]> {
        self.cmap.as_deref()
    }

    /// Head map, if present
    pub fn hmap(&self) -> Option<&[u8]> {
        self.hmap.as_deref()
    }

    /// Status of every sector (physical order)
    pub fn statuses(&self) -> &[SectorStatus] {
        &self.sflag
    }

    /// Entire expanded data buffer
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Replace or remove the cylinder map
    pub fn set_cylinder_map(&mut self, cmap: Option<Vec<u8>>) -> Result<()> {
        self.check_map_len(cmap.as_deref(), "Cylinder")?;
        self.cmap = cmap;
        Ok(())
    }

    /// Replace or remove the head map
    pub fn set_head_map(&mut self, hmap: Option<Vec<u8>>) -> Result<()> {
        self.check_map_len(hmap.as_deref(), "Head")?;
        self.hmap = hmap;
        Ok(())
    }

    fn check_map_len(&self, map: Option<&[u8]>, name: &str) -> Result<()> {
        match map {
            Some(m) if m.len() != self.smap.len() => Err(ImdError::invalid_format(format!(
                "{} map has {} entries, track has {} sectors",
                name,
                m.len(),
                self.smap.len()
            ))),
            _ => Ok(()),
        }
    }

    /// Cylinder recorded in the ID field of a sector
    pub fn sector_cylinder(&self, index: usize) -> u8 {
        self.cmap
            .as_ref()
            .and_then(|m| m.get(index).copied())
            .unwrap_or(self.cylinder)
    }

    /// Head recorded in the ID field of a sector
    pub fn sector_head(&self, index: usize) -> u8 {
        self.hmap
            .as_ref()
            .and_then(|m| m.get(index).copied())
            .unwrap_or(self.head)
    }

    /// Status of the sector at a physical position
    pub fn status(&self, index: usize) -> Option<SectorStatus> {
        self.sflag.get(index).copied()
    }

    /// Change the status of the sector at a physical position
    pub fn set_status(&mut self, index: usize, status: SectorStatus) -> Option<()> {
        *self.sflag.get_mut(index)? = status;
        Some(())
    }

    /// Data of the sector at a physical position
    pub fn sector_data(&self, index: usize) -> Option<&[u8]> {
        let start = index.checked_mul(self.sector_size)?;
        self.data.get(start..start + self.sector_size)
    }

    /// Mutable data of the sector at a physical position
    pub fn sector_data_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        let start = index.checked_mul(self.sector_size)?;
        let size = self.sector_size;
        self.data.get_mut(start..start + size)
    }

    /// Physical position of a logical sector id
    pub fn physical_index(&self, sector_id: u8) -> Option<usize> {
        self.smap.iter().position(|&id| id == sector_id)
    }

    /// Get a sector's data by its logical id
    pub fn get_sector(&self, sector_id: u8) -> Option<&[u8]> {
        self.physical_index(sector_id)
            .and_then(|idx| self.sector_data(idx))
    }

    /// Check if this track contains a sector with the given ID
    pub fn has_sector(&self, sector_id: u8) -> bool {
        self.smap.contains(&sector_id)
    }

    /// Check if any logical id appears more than once
    pub fn has_duplicate_ids(&self) -> bool {
        has_duplicates(&self.smap)
    }

    /// Best guess at the physical interleave of this track
    pub fn best_interleave(&self) -> Interleave {
        calculate_best_interleave(&self.smap)
    }

    /// Pad the track with unavailable sectors up to `target` sectors
    ///
    /// New sectors take the lowest ids not already in use and are filled
    /// with `fill_byte`. Returns the number of sectors added.
    pub fn add_missing_sectors(&mut self, target: usize, fill_byte: u8) -> usize {
        let target = target.min(MAX_SECTORS_PER_TRACK);
        let mut used = [false; 256];
        for &id in &self.smap {
            used[id as usize] = true;
        }

        let mut added = 0;
        let mut candidates = (0..=255u8).filter(|&id| !used[id as usize]);
        while self.smap.len() < target {
            let Some(id) = candidates.next() else { break };
            self.smap.push(id);
            if let Some(cmap) = self.cmap.as_mut() {
                cmap.push(self.cylinder);
            }
            if let Some(hmap) = self.hmap.as_mut() {
                hmap.push(self.head);
            }
            self.sflag.push(SectorStatus::Unavailable);
            self.data.resize(self.data.len() + self.sector_size, fill_byte);
            added += 1;
        }
        added
    }

    /// Reset to an empty track, keeping buffer capacity
    pub fn clear(&mut self) {
        self.mode = 0;
        self.cylinder = 0;
        self.head = 0;
        self.size_code = 0;
        self.sector_size = SECTOR_SIZES[0];
        self.smap.clear();
        self.cmap = None;
        self.hmap = None;
        self.sflag.clear();
        self.data.clear();
    }
}

/// Check a sector map for repeated ids
pub fn has_duplicates(smap: &[u8]) -> bool {
    let mut seen = [false; 256];
    for &id in smap {
        if seen[id as usize] {
            return true;
        }
        seen[id as usize] = true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_track(ids: &[u8]) -> Track {
        let mut track = Track::new(3, 1, DataMode::Mfm250, 1).unwrap();
        for &id in ids {
            track
                .add_sector(id, SectorStatus::NORMAL, &[id; 256])
                .unwrap();
        }
        track
    }

    #[test]
    fn test_new_track() {
        let track = Track::new(0, 0, DataMode::Mfm250, 2).unwrap();
        assert_eq!(track.sector_size(), 512);
        assert_eq!(track.sector_count(), 0);
        assert!(track.is_empty());
        assert_eq!(track.data_mode(), Some(DataMode::Mfm250));
    }

    #[test]
    fn test_new_track_bad_size() {
        let result = Track::new(0, 0, DataMode::Mfm250, 7);
        assert!(result.unwrap_err().is_format_error());
    }

    #[test]
    fn test_add_sector() {
        let track = sample_track(&[1, 2, 3]);
        assert_eq!(track.sector_count(), 3);
        assert_eq!(track.data().len(), 3 * 256);
        assert!(track.has_sector(2));
        assert_eq!(track.get_sector(3).unwrap()[0], 3);
        assert_eq!(track.physical_index(3), Some(2));
    }

    #[test]
    fn test_add_sector_wrong_size() {
        let mut track = Track::new(0, 0, DataMode::Mfm250, 2).unwrap();
        assert!(track.add_sector(1, SectorStatus::NORMAL, &[0; 256]).is_err());
    }

    #[test]
    fn test_header_flags() {
        let mut track = sample_track(&[1, 2]);
        assert_eq!(track.header().flags, 0);

        track.set_head_map(Some(vec![0, 0])).unwrap();
        let header = track.header();
        assert!(header.has_head_map());
        assert!(!header.has_cylinder_map());
        assert_eq!(header.to_bytes(), [5, 3, 1 | HFLAG_HEAD_MAP, 2, 1]);
        assert_eq!(header.maps_len(), 4);
    }

    #[test]
    fn test_header_round_trip() {
        let header = TrackHeader::from_bytes([3, 40, 0xC1, 9, 2]);
        assert_eq!(header.head, 1);
        assert!(header.has_cylinder_map());
        assert!(header.has_head_map());
        assert_eq!(header.sector_size(), Some(512));
        assert_eq!(header.maps_len(), 27);
        assert_eq!(header.to_bytes(), [3, 40, 0xC1, 9, 2]);
    }

    #[test]
    fn test_map_length_checked() {
        let mut track = sample_track(&[1, 2, 3]);
        assert!(track.set_cylinder_map(Some(vec![3, 3])).is_err());
        assert!(track.set_cylinder_map(Some(vec![3, 3, 4])).is_ok());
        assert_eq!(track.sector_cylinder(2), 4);
        assert_eq!(track.sector_head(2), 1);
    }

    #[test]
    fn test_sector_data_mut() {
        let mut track = sample_track(&[1, 2]);
        track.sector_data_mut(1).unwrap()[0] = 0xAA;
        assert_eq!(track.get_sector(2).unwrap()[0], 0xAA);
        assert!(track.sector_data(2).is_none());
    }

    #[test]
    fn test_duplicates() {
        assert!(sample_track(&[1, 2, 2, 4]).has_duplicate_ids());
        assert!(!sample_track(&[1, 2, 3, 4]).has_duplicate_ids());
    }

    #[test]
    fn test_add_missing_sectors() {
        let mut track = sample_track(&[0, 2]);
        track.set_cylinder_map(Some(vec![3, 3])).unwrap();

        let added = track.add_missing_sectors(5, 0xE5);
        assert_eq!(added, 3);
        assert_eq!(track.smap(), &[0, 2, 1, 3, 4]);
        assert_eq!(track.cmap().unwrap(), &[3, 3, 3, 3, 3]);
        assert_eq!(track.status(4), Some(SectorStatus::Unavailable));
        assert!(track.sector_data(4).unwrap().iter().all(|&b| b == 0xE5));

        assert_eq!(track.add_missing_sectors(3, 0), 0);
    }

    #[test]
    fn test_clear() {
        let mut track = sample_track(&[1, 2, 3]);
        track.clear();
        assert_eq!(track, Track::default());
    }
}
