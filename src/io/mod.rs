/// I/O operations for reading and writing IMD files

/// Reader implementation for IMD files
pub mod reader;
/// Writer implementation for IMD and raw binary output
pub mod writer;

pub use reader::{
    load_track, load_track_into, read_imd, read_imd_from, skip_track_body, TrackReader,
};
pub use writer::{write_bin_to, write_imd, write_imd_to, WriteOptions};
