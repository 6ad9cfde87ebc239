//! File-system metadata preservation.
//!
//! Conversion outputs carry the source's access and modification times so
//! photo libraries keep sorting them by when they were taken.

use std::io;
use std::path::Path;

pub fn apply_file_timestamps(src: &Path, dst: &Path) -> io::Result<()> {
    let m = std::fs::metadata(src)?;
    let atime = filetime::FileTime::from_last_access_time(&m);
    let mtime = filetime::FileTime::from_last_modification_time(&m);
    filetime::set_file_times(dst, atime, mtime)
}
