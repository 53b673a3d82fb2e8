use std::ffi::c_void;
use std::iter;

use tracing::debug;
use windows_sys::Win32::Foundation::{CloseHandle, HWND};
use windows_sys::Win32::Storage::FileSystem::{
    GetFileVersionInfoSizeW, GetFileVersionInfoW, VerQueryValueW,
};
use windows_sys::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    GetForegroundWindow, GetWindowTextLengthW, GetWindowTextW, GetWindowThreadProcessId,
};

use crate::{label_from_exe_path, FocusSample, ProbeError, UNKNOWN_APP};

pub(crate) fn foreground_sample() -> Result<FocusSample, ProbeError> {
    unsafe {
        let hwnd: HWND = GetForegroundWindow();
        if hwnd.is_null() {
            return Ok(FocusSample::idle());
        }

        let mut pid: u32 = 0;
        GetWindowThreadProcessId(hwnd, &mut pid);
        if pid == 0 {
            return Err(ProbeError::NoForegroundProcess);
        }

        let title = window_title(hwnd);
        let app = match query_process_exe_path(pid) {
            Some(exe_path) => {
                file_description(&exe_path).unwrap_or_else(|| label_from_exe_path(&exe_path))
            }
            None => {
                debug!("cannot open process {pid}; labelling as {UNKNOWN_APP}");
                UNKNOWN_APP.to_string()
            }
        };

        Ok(FocusSample::new(app, title))
    }
}

unsafe fn window_title(hwnd: HWND) -> String {
    let len = GetWindowTextLengthW(hwnd);
    if len <= 0 {
        return String::new();
    }
    let mut buf = vec![0u16; (len as usize) + 1];
    let read = GetWindowTextW(hwnd, buf.as_mut_ptr(), buf.len() as i32);
    if read > 0 {
        buf.truncate(read as usize);
        String::from_utf16_lossy(&buf)
    } else {
        String::new()
    }
}

fn query_process_exe_path(pid: u32) -> Option<String> {
    unsafe {
        let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
        if handle.is_null() {
            return None;
        }

        let mut buf = vec![0u16; 1024];
        let mut size: u32 = buf.len() as u32;
        let ok = QueryFullProcessImageNameW(handle, 0, buf.as_mut_ptr(), &mut size);
        let _ = CloseHandle(handle);
        if ok == 0 || size == 0 {
            None
        } else {
            buf.truncate(size as usize);
            Some(String::from_utf16_lossy(&buf))
        }
    }
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(iter::once(0)).collect()
}

/// The `FileDescription` string from the executable's version resource, e.g.
/// "Microsoft Edge" for `msedge.exe`.
fn file_description(exe_path: &str) -> Option<String> {
    let path = wide(exe_path);
    unsafe {
        let mut ignored: u32 = 0;
        let size = GetFileVersionInfoSizeW(path.as_ptr(), &mut ignored);
        if size == 0 {
            return None;
        }
        let mut block = vec![0u8; size as usize];
        if GetFileVersionInfoW(path.as_ptr(), 0, size, block.as_mut_ptr() as *mut c_void) == 0 {
            return None;
        }

        let mut translation: *mut c_void = std::ptr::null_mut();
        let mut translation_len: u32 = 0;
        let sub = wide("\\VarFileInfo\\Translation");
        if VerQueryValueW(
            block.as_ptr() as *const c_void,
            sub.as_ptr(),
            &mut translation,
            &mut translation_len,
        ) == 0
            || translation.is_null()
            || (translation_len as usize) < 2 * std::mem::size_of::<u16>()
        {
            return None;
        }
        let pair = translation as *const u16;
        let lang = *pair;
        let codepage = *pair.add(1);

        let sub = wide(&format!(
            "\\StringFileInfo\\{lang:04X}{codepage:04X}\\FileDescription"
        ));
        let mut value: *mut c_void = std::ptr::null_mut();
        let mut value_len: u32 = 0;
        if VerQueryValueW(
            block.as_ptr() as *const c_void,
            sub.as_ptr(),
            &mut value,
            &mut value_len,
        ) == 0
            || value.is_null()
            || value_len == 0
        {
            return None;
        }

        let chars = std::slice::from_raw_parts(value as *const u16, value_len as usize);
        let end = chars.iter().position(|&c| c == 0).unwrap_or(chars.len());
        let description = String::from_utf16_lossy(&chars[..end]);
        let description = description.trim();
        if description.is_empty() {
            None
        } else {
            Some(description.to_string())
        }
    }
}
