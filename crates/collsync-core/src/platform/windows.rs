use winapi::shared::winerror::{ERROR_DISK_FULL, ERROR_HANDLE_DISK_FULL};

pub fn is_disk_full_code(code: Option<i32>) -> bool {
    match code {
        Some(code) => code as u32 == ERROR_DISK_FULL || code as u32 == ERROR_HANDLE_DISK_FULL,
        None => false,
    }
}
