#![allow(non_snake_case)]

use dlopen::wrapper::{Container, WrapperApi};
use std::ffi::{CStr, OsString};
use std::fs;
use std::os::raw::{c_char, c_int, c_uchar};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

use crate::error::DutError;

pub static DEFAULT_LIBRARY: &str = "DemuraDLL.dll";

// Sizes of the output buffers the library writes into. None of the calls
// take a length, so these must stay at least as large as the vendor expects.
pub const VERSION_BUFFER_LEN: usize = 128;
pub const ERROR_CODE_BUFFER_LEN: usize = 128;
pub const IMAGE_NAME_BUFFER_LEN: usize = 384;
pub const DECODE_BUFFER_LEN: usize = 2 * 1024;

// Instance counter shared by every loaded copy in the process.
static INSTANCES: Mutex<u32> = Mutex::new(1);

#[derive(WrapperApi)]
struct DemuraDllApi {
    EnableEmulator: unsafe extern "C" fn(emulator: bool) -> c_int,
    OpenDevice: unsafe extern "C" fn(host: *const c_char) -> c_int,
    PowerON: unsafe extern "C" fn(mode: c_int) -> c_int,
    PowerOFF: unsafe extern "C" fn() -> c_int,
    CloseDevice: unsafe extern "C" fn() -> c_int,
    ShowEMMCImageIndex: unsafe extern "C" fn(index: c_int) -> c_int,
    ShowEMMCImageName: unsafe extern "C" fn(name: *const c_char) -> c_int,
    ReadVersion: unsafe extern "C" fn(version: *mut c_char) -> c_int,
    ReadDLLVersion: unsafe extern "C" fn(version: *mut c_char) -> c_int,
    WriteImageToEMMC: unsafe extern "C" fn(
        file_names: *const *const c_char,
        file_num: c_int,
        is_to_rgb: bool,
        rotation_type: c_int,
        tailor: c_int,
        tailor_width: c_int,
        tailor_height: c_int,
        timeout: c_int,
    ) -> c_int,
    GetEMMCImageName: unsafe extern "C" fn(name_list: *mut c_char) -> c_int,
    SetDeviceIpAddress: unsafe extern "C" fn(address: c_int) -> c_int,
    SetRGB: unsafe extern "C" fn(r: c_int, g: c_int, b: c_int) -> c_int,
    Decoding: unsafe extern "C" fn(code: c_int, message: *mut c_char) -> c_int,
    GetErrorCode: unsafe extern "C" fn(code: *mut c_char) -> c_int,
    DemuraMode: unsafe extern "C" fn(mode: c_int) -> c_int,
    LoadDemuraFile: unsafe extern "C" fn(file_name: *const c_char, crc: *const c_uchar) -> c_int,
    BeforeDemuraPowerOn: unsafe extern "C" fn() -> c_int,
    DemuraWrite: unsafe extern "C" fn() -> c_int,
    DemuraProtection: unsafe extern "C" fn(mode: c_int) -> c_int,
    AfterDemuraPowerOn: unsafe extern "C" fn() -> c_int,
    DemuraOTP: unsafe extern "C" fn() -> c_int,
    DemuraRead: unsafe extern "C" fn(file_name: *const c_char) -> c_int,
}

/// Raw call surface of DemuraDLL.
///
/// Every call returns the library status, `0` meaning success. Output
/// buffers receive a NUL terminated string.
pub trait DemuraApi {
    fn enable_emulator(&self, emulator: bool) -> i32;
    fn open_device(&self, host: &CStr) -> i32;
    fn power_on(&self, mode: i32) -> i32;
    fn power_off(&self) -> i32;
    fn close_device(&self) -> i32;
    fn show_emmc_image_index(&self, index: i32) -> i32;
    fn show_emmc_image_name(&self, name: &CStr) -> i32;
    fn read_version(&self, buf: &mut [u8]) -> i32;
    fn read_dll_version(&self, buf: &mut [u8]) -> i32;
    #[allow(clippy::too_many_arguments)]
    fn write_image_to_emmc(
        &self,
        files: &[&CStr],
        to_rgb: bool,
        rotation: i32,
        tailor: i32,
        tailor_width: i32,
        tailor_height: i32,
        timeout_ms: i32,
    ) -> i32;
    fn get_emmc_image_name(&self, buf: &mut [u8]) -> i32;
    fn set_device_ip_address(&self, address: i32) -> i32;
    fn set_rgb(&self, r: i32, g: i32, b: i32) -> i32;
    fn decoding(&self, code: i32, buf: &mut [u8]) -> i32;
    fn get_error_code(&self, buf: &mut [u8]) -> i32;
    fn demura_mode(&self, mode: i32) -> i32;
    fn load_demura_file(&self, file_name: &CStr, crc: [u8; 2]) -> i32;
    fn before_demura_power_on(&self) -> i32;
    fn demura_write(&self) -> i32;
    fn demura_protection(&self, mode: i32) -> i32;
    fn after_demura_power_on(&self) -> i32;
    fn demura_otp(&self) -> i32;
    fn demura_read(&self, file_name: &CStr) -> i32;
}

/// DemuraDLL loaded into the process.
pub struct DemuraLibrary {
    api: Container<DemuraDllApi>,
    path: PathBuf,
}

impl DemuraLibrary {
    /// Loads the library from `path`.
    ///
    /// The vendor library keeps its device state in globals, so only the
    /// first instance of the process loads the file itself. Later instances
    /// load a private copy named `<stem>_<n>.<ext>` next to it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<DemuraLibrary, DutError> {
        let path = resolve_library_path(path.as_ref());

        let mut instances = INSTANCES.lock().unwrap_or_else(PoisonError::into_inner);
        let load_path = if *instances > 1 {
            let copy = private_copy_path(&path, *instances);
            prepare_private_copy(&path, &copy)?;
            copy
        } else {
            path
        };

        let api: Container<DemuraDllApi> = unsafe { Container::load(&load_path) }?;
        *instances += 1;

        info!("loaded {}", load_path.display());
        Ok(DemuraLibrary {
            api,
            path: load_path,
        })
    }

    /// File the library was actually loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DemuraApi for DemuraLibrary {
    fn enable_emulator(&self, emulator: bool) -> i32 {
        unsafe { self.api.EnableEmulator(emulator) }
    }

    fn open_device(&self, host: &CStr) -> i32 {
        unsafe { self.api.OpenDevice(host.as_ptr()) }
    }

    fn power_on(&self, mode: i32) -> i32 {
        unsafe { self.api.PowerON(mode) }
    }

    fn power_off(&self) -> i32 {
        unsafe { self.api.PowerOFF() }
    }

    fn close_device(&self) -> i32 {
        unsafe { self.api.CloseDevice() }
    }

    fn show_emmc_image_index(&self, index: i32) -> i32 {
        unsafe { self.api.ShowEMMCImageIndex(index) }
    }

    fn show_emmc_image_name(&self, name: &CStr) -> i32 {
        unsafe { self.api.ShowEMMCImageName(name.as_ptr()) }
    }

    fn read_version(&self, buf: &mut [u8]) -> i32 {
        unsafe { self.api.ReadVersion(buf.as_mut_ptr() as *mut c_char) }
    }

    fn read_dll_version(&self, buf: &mut [u8]) -> i32 {
        unsafe { self.api.ReadDLLVersion(buf.as_mut_ptr() as *mut c_char) }
    }

    fn write_image_to_emmc(
        &self,
        files: &[&CStr],
        to_rgb: bool,
        rotation: i32,
        tailor: i32,
        tailor_width: i32,
        tailor_height: i32,
        timeout_ms: i32,
    ) -> i32 {
        let pointers: Vec<*const c_char> = files.iter().map(|file| file.as_ptr()).collect();
        unsafe {
            self.api.WriteImageToEMMC(
                pointers.as_ptr(),
                pointers.len() as c_int,
                to_rgb,
                rotation,
                tailor,
                tailor_width,
                tailor_height,
                timeout_ms,
            )
        }
    }

    fn get_emmc_image_name(&self, buf: &mut [u8]) -> i32 {
        unsafe { self.api.GetEMMCImageName(buf.as_mut_ptr() as *mut c_char) }
    }

    fn set_device_ip_address(&self, address: i32) -> i32 {
        unsafe { self.api.SetDeviceIpAddress(address) }
    }

    fn set_rgb(&self, r: i32, g: i32, b: i32) -> i32 {
        unsafe { self.api.SetRGB(r, g, b) }
    }

    fn decoding(&self, code: i32, buf: &mut [u8]) -> i32 {
        unsafe { self.api.Decoding(code, buf.as_mut_ptr() as *mut c_char) }
    }

    fn get_error_code(&self, buf: &mut [u8]) -> i32 {
        unsafe { self.api.GetErrorCode(buf.as_mut_ptr() as *mut c_char) }
    }

    fn demura_mode(&self, mode: i32) -> i32 {
        unsafe { self.api.DemuraMode(mode) }
    }

    fn load_demura_file(&self, file_name: &CStr, crc: [u8; 2]) -> i32 {
        unsafe { self.api.LoadDemuraFile(file_name.as_ptr(), crc.as_ptr()) }
    }

    fn before_demura_power_on(&self) -> i32 {
        unsafe { self.api.BeforeDemuraPowerOn() }
    }

    fn demura_write(&self) -> i32 {
        unsafe { self.api.DemuraWrite() }
    }

    fn demura_protection(&self, mode: i32) -> i32 {
        unsafe { self.api.DemuraProtection(mode) }
    }

    fn after_demura_power_on(&self) -> i32 {
        unsafe { self.api.AfterDemuraPowerOn() }
    }

    fn demura_otp(&self) -> i32 {
        unsafe { self.api.DemuraOTP() }
    }

    fn demura_read(&self, file_name: &CStr) -> i32 {
        unsafe { self.api.DemuraRead(file_name.as_ptr()) }
    }
}

/// Falls back to the directory of the running executable when `path`
/// does not exist as given.
fn resolve_library_path(path: &Path) -> PathBuf {
    if path.exists() {
        return path.to_path_buf();
    }
    let beside_exe = std::env::current_exe().ok().and_then(|exe| {
        let dir = exe.parent()?;
        Some(dir.join(path.file_name()?))
    });
    match beside_exe {
        Some(candidate) if candidate.exists() => {
            debug!("using library next to executable: {}", candidate.display());
            candidate
        }
        _ => path.to_path_buf(),
    }
}

pub(crate) fn private_copy_path(path: &Path, instance: u32) -> PathBuf {
    let mut name = OsString::new();
    if let Some(stem) = path.file_stem() {
        name.push(stem);
    }
    name.push(format!("_{}", instance));
    if let Some(extension) = path.extension() {
        name.push(".");
        name.push(extension);
    }
    path.with_file_name(name)
}

fn prepare_private_copy(source: &Path, copy: &Path) -> Result<(), DutError> {
    let copy_error = |source: std::io::Error| DutError::LibraryCopy {
        path: copy.display().to_string(),
        source,
    };
    if copy.exists() {
        fs::remove_file(copy).map_err(copy_error)?;
    }
    fs::copy(source, copy).map_err(copy_error)?;
    debug!("copied {} to {}", source.display(), copy.display());
    Ok(())
}

/// Reads the NUL terminated string the library left in `buf`.
pub(crate) fn buffer_to_string(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

#[test]
fn test_private_copy_path() {
    let copy = private_copy_path(Path::new("lib/DemuraDLL.dll"), 2);
    assert_eq!(copy, PathBuf::from("lib/DemuraDLL_2.dll"));

    let copy = private_copy_path(Path::new("libdemura"), 5);
    assert_eq!(copy, PathBuf::from("libdemura_5"));
}

#[test]
fn test_prepare_private_copy_replaces_stale_file() {
    let dir = std::env::temp_dir().join(format!("demura-copy-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let source = dir.join("DemuraDLL.dll");
    let copy = private_copy_path(&source, 3);
    fs::write(&source, b"fresh").unwrap();
    fs::write(&copy, b"stale").unwrap();

    prepare_private_copy(&source, &copy).unwrap();
    assert_eq!(fs::read(&copy).unwrap(), b"fresh");

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_prepare_private_copy_missing_source() {
    let dir = std::env::temp_dir().join(format!("demura-missing-{}", std::process::id()));
    let result = prepare_private_copy(&dir.join("nope.dll"), &dir.join("nope_2.dll"));
    match result {
        Err(DutError::LibraryCopy { path, .. }) => assert!(path.ends_with("nope_2.dll")),
        _ => panic!("expected a copy error"),
    }
}

#[test]
fn test_buffer_to_string() {
    let mut buf = [0u8; 16];
    buf[..5].copy_from_slice(b"V1.02");
    assert_eq!(buffer_to_string(&buf), "V1.02");
    assert_eq!(buffer_to_string(b"no terminator"), "no terminator");
    assert_eq!(buffer_to_string(&[0u8; 4]), "");
}

#[ignore]
#[test]
fn test_load_library() {
    let library = DemuraLibrary::load(DEFAULT_LIBRARY);
    assert!(library.is_ok());
}
