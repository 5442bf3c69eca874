//! Where the loader itself lives on disk.
//!
//! The default plugin root and config file sit next to the loader library,
//! whatever process it was loaded into.

use std::path::{Path, PathBuf};

use plugload_core::{PlugloadError, Result};

/// Directory containing the loader module.
pub fn residence() -> Result<PathBuf> {
    let module = module_path()?;
    module
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| PlugloadError::Residence(format!("{} has no parent directory", module.display())))
}

/// Full path of the module (shared library or executable) this code is part of.
#[cfg(unix)]
pub fn module_path() -> Result<PathBuf> {
    use std::ffi::{CStr, OsStr};
    use std::os::unix::ffi::OsStrExt;

    let anchor = module_path as *const () as *const libc::c_void;
    let mut info: libc::Dl_info = unsafe { std::mem::zeroed() };
    let found = unsafe { libc::dladdr(anchor, &mut info) };
    if found == 0 || info.dli_fname.is_null() {
        return Err(PlugloadError::Residence("dladdr could not locate the loader module".into()));
    }

    let name = unsafe { CStr::from_ptr(info.dli_fname) };
    let path = PathBuf::from(OsStr::from_bytes(name.to_bytes()));
    if path.is_absolute() {
        return Ok(path);
    }
    // The main executable can be reported by its invocation name.
    std::env::current_exe().map_err(|e| PlugloadError::Residence(e.to_string()))
}

/// Full path of the module (DLL or executable) this code is part of.
#[cfg(windows)]
pub fn module_path() -> Result<PathBuf> {
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;
    use windows_sys::Win32::Foundation::HMODULE;
    use windows_sys::Win32::System::LibraryLoader::{
        GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS, GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT,
        GetModuleFileNameW, GetModuleHandleExW,
    };

    let anchor = module_path as *const () as *const u16;
    let mut module: HMODULE = std::ptr::null_mut();
    let flags = GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS | GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT;
    if unsafe { GetModuleHandleExW(flags, anchor, &mut module) } == 0 {
        return Err(PlugloadError::Residence(format!(
            "GetModuleHandleExW failed: {}",
            std::io::Error::last_os_error()
        )));
    }

    let mut buf = vec![0u16; 512];
    loop {
        let len = unsafe { GetModuleFileNameW(module, buf.as_mut_ptr(), buf.len() as u32) } as usize;
        if len == 0 {
            return Err(PlugloadError::Residence(format!(
                "GetModuleFileNameW failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        if len < buf.len() {
            return Ok(PathBuf::from(OsString::from_wide(&buf[..len])));
        }
        // Truncated.
        buf.resize(buf.len() * 2, 0);
    }
}

#[cfg(not(any(unix, windows)))]
pub fn module_path() -> Result<PathBuf> {
    std::env::current_exe().map_err(|e| PlugloadError::Residence(e.to_string()))
}
