#[cfg(target_os = "windows")]
pub mod windows;

use std::io;

/// ENOSPC on unix-likes.
#[cfg(not(target_os = "windows"))]
const DISK_FULL_CODES: &[i32] = &[28];

#[cfg(target_os = "windows")]
pub fn is_disk_full(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::StorageFull || windows::is_disk_full_code(err.raw_os_error())
}

#[cfg(not(target_os = "windows"))]
pub fn is_disk_full(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::StorageFull
        || err
            .raw_os_error()
            .is_some_and(|code| DISK_FULL_CODES.contains(&code))
}
