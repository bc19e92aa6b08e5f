/*!
# imdtools

A Rust library for reading, writing, checking and converting ImageDisk
(IMD) floppy disk images.

## Features

- Streaming track codec with per-sector compression, deleted data and
  data error flags
- Compression policies (as read, force compress, force decompress) and
  flag clearing on write
- Physical interleave detection and re-interleaved raw binary export
- Single pass consistency checker with stable failure bits
- Drive type recommendations from track geometry and data rate
- Track by track image comparison
- Conversion with merging, track exclusion, sector padding and data rate
  translation
- Building IMD images from raw binary sector dumps

## Quick Start

```rust,no_run
use imdtools::{run_checks, CheckOptions, CompressionMode, ImageFile, WriteOptions};
use std::fs::File;
use std::io::BufReader;

// Open an existing IMD file
let image = ImageFile::open("disk.imd")?;
println!("{}", image.header());

// Read a sector by cylinder, head and logical id
let data = image.read_sector(0, 0, 1)?;
assert_eq!(data.len(), image.tracks()[0].sector_size());

// Save with every uniform sector compressed
let opts = WriteOptions {
    compression: CompressionMode::ForceCompress,
    ..WriteOptions::default()
};
image.save("packed.imd", &opts)?;

// Check the structure of a file without loading it
let results = run_checks(BufReader::new(File::open("disk.imd")?), &CheckOptions::default());
println!("{} tracks: {}", results.track_count, results.failures);
# Ok::<(), imdtools::ImdError>(())
```

## Modules

- `format`: IMD format constants and data modes
- `image`: Core image data structures (ImageFile, Track, SectorStatus)
- `io`: Stream readers and writers
- `analyze`: Drive recommendations
- `check`: Consistency checker
- `compare`: Image comparison
- `convert`: Streaming conversion and merging
- `error`: Error types and Result alias
*/

#![warn(missing_docs)]

/// Drive recommendations
pub mod analyze;
/// Consistency checker
pub mod check;
/// Image comparison
pub mod compare;
/// Streaming conversion and merging
pub mod convert;
/// Error types and Result alias
pub mod error;
/// IMD format constants and data modes
pub mod format;
/// Core image data structures (ImageFile, Track, SectorStatus)
pub mod image;
/// I/O operations for reading and writing IMD files
pub mod io;

/// Creator name written into header lines produced by this library
pub const CREATOR: &str = concat!("imdtools ", env!("CARGO_PKG_VERSION"));

// Re-export common types
pub use analyze::{analyze, AnalysisResult, DriveNote, DriveOption, DriveType, Recommendation};
pub use check::{run_checks, CheckFailures, CheckOptions, CheckResults, DEFAULT_ERROR_MASK};
pub use compare::{compare_images, compare_tracks, CompareResult, DiffFlags};
pub use convert::{
    convert, convert_merged, CommentEdit, ConvertOptions, ConvertSummary, OutputFormat,
    TrackExclusion,
};
pub use error::{ImdError, Result};
pub use format::{DataMode, Encoding, ModeTranslation};
pub use image::{
    calculate_best_interleave, is_uniform, CompressionMode, ImageBuilder, ImageFile, ImdHeader,
    Interleave, InterleaveMode, SectorStats, SectorStatus, Track, TrackFormat, TrackHeader,
};
pub use io::{read_imd, write_imd, WriteOptions};
