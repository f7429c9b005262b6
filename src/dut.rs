use std::convert::TryFrom;
use std::ffi::{CStr, CString};
use std::ops::Drop;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::DutError;
use crate::library::{
    buffer_to_string, DemuraApi, DemuraLibrary, DECODE_BUFFER_LEN, ERROR_CODE_BUFFER_LEN,
    IMAGE_NAME_BUFFER_LEN, VERSION_BUFFER_LEN,
};
use crate::modes::{DscMode, EmmcImage, ImageWrite};

pub static DEFAULT_HOST: &str = "192.168.21.132";

// Fixture addresses always live on this /24.
static SUBNET: &str = "192.168.21";

/// Display-panel test fixture driven through DemuraDLL.
///
/// Every call maps onto one library export. A nonzero status is turned into
/// `DutError::Call` carrying the code the fixture reports for it.
pub struct Dut<A: DemuraApi = DemuraLibrary> {
    api: A,
    is_screen_poweron: bool,
    opened: bool,
    host: Option<String>,
    current_host: Option<String>,
    emulator_mode: bool,
}

impl<A: DemuraApi> Drop for Dut<A> {
    fn drop(&mut self) {
        if self.opened {
            self.close_device();
        }
    }
}

impl Dut<DemuraLibrary> {
    /// Loads DemuraDLL from `path` and wraps it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Dut, DutError> {
        Ok(Dut::with_api(DemuraLibrary::load(path)?))
    }
}

impl<A: DemuraApi> Dut<A> {
    pub fn with_api(api: A) -> Dut<A> {
        Dut {
            api,
            is_screen_poweron: false,
            opened: false,
            host: None,
            current_host: None,
            emulator_mode: false,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn is_screen_powered_on(&self) -> bool {
        self.is_screen_poweron
    }

    /// Whether the last `open_device` succeeded and nothing closed it since.
    pub fn is_open(&self) -> bool {
        self.opened
    }

    /// Host passed to the last `open_device` call.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Host the fixture answers on, following `set_device_ip_address`.
    pub fn current_host(&self) -> Option<&str> {
        self.current_host.as_deref()
    }

    /// Runs the library against its built-in emulator instead of a fixture.
    /// Takes effect on the next `open_device`.
    pub fn enable_emulator(&mut self, emulator: bool) {
        self.emulator_mode = emulator;
    }

    /// Connects to the fixture at `host` (`192.168.21.x`, x neither 1 nor 255).
    pub fn open_device(&mut self, host: &str) -> Result<(), DutError> {
        self.is_screen_poweron = false;
        self.opened = false;
        self.host = Some(host.to_string());

        let c_host = CString::new(host)?;
        self.api.enable_emulator(self.emulator_mode);
        let status = self.api.open_device(&c_host);
        self.check(status, || {
            format!("Unable to connect DUT. Received: {}", status)
        })?;
        self.opened = true;
        self.current_host = Some(host.to_string());

        debug!("DUT Initialised ip {}.", host);
        Ok(())
    }

    /// Powers the panel. Does nothing when it is already on.
    pub fn power_on(&mut self, mode: DscMode) -> Result<(), DutError> {
        if self.is_screen_poweron {
            return Ok(());
        }
        let status = self.api.power_on(mode as i32);
        self.check(status, || {
            "Exit power_on because power_on failed.".to_string()
        })?;
        self.is_screen_poweron = true;
        debug!("screen on success. {:?}", mode);
        Ok(())
    }

    pub fn power_off(&mut self) -> Result<(), DutError> {
        let status = self.api.power_off();
        self.check(status, || {
            "Exit power_off because power_off failed.".to_string()
        })?;
        debug!("screen off success.");
        self.is_screen_poweron = false;
        Ok(())
    }

    /// Releases the connection. The library status is not checked.
    pub fn close_device(&mut self) {
        let status = self.api.close_device();
        if status != 0 {
            warn!("CloseDevice returned {}", status);
        }
        debug!("Closing DUT.");
        self.opened = false;
        self.is_screen_poweron = false;
    }

    pub fn show_emmc_image<I: Into<EmmcImage>>(&mut self, image: I) -> Result<(), DutError> {
        let image = image.into();
        let status = match &image {
            EmmcImage::Index(index) => {
                let index = c_int_arg("image index", u128::from(*index))?;
                self.api.show_emmc_image_index(index)
            }
            EmmcImage::Name(name) => {
                let c_name = CString::new(name.as_str())?;
                self.api.show_emmc_image_name(&c_name)
            }
        };
        self.check(status, || format!("Fail to show image {}.", image))?;
        debug!("show image {} success", image);
        Ok(())
    }

    /// Firmware version of the fixture.
    pub fn read_version(&mut self) -> Result<String, DutError> {
        let mut buf = [0u8; VERSION_BUFFER_LEN];
        let status = self.api.read_version(&mut buf);
        self.check(status, || {
            format!("Unable to get FW version. Received: {}", status)
        })?;
        let version = buffer_to_string(&buf);
        debug!("Read FW version: {}", version);
        Ok(version)
    }

    /// Version of DemuraDLL itself, without its label.
    pub fn read_dll_version(&mut self) -> Result<String, DutError> {
        let mut buf = [0u8; VERSION_BUFFER_LEN];
        let status = self.api.read_dll_version(&mut buf);
        self.check(status, || {
            format!("Unable to get DLL version. Received: {}", status)
        })?;
        let version = parse_dll_version(&buffer_to_string(&buf))?;
        debug!("Read DLL version: {}", version);
        Ok(version)
    }

    /// Powers the panel down and reconnects to the current host.
    pub fn reset(&mut self) -> Result<(), DutError> {
        self.power_off()?;
        self.api.close_device();
        self.opened = false;

        let host = self
            .current_host
            .clone()
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        self.open_device(&host)
    }

    pub fn write_image_to_emmc(&mut self, write: &ImageWrite) -> Result<(), DutError> {
        let tailor_width = c_int_arg("tailor width", u128::from(write.tailor_width))?;
        let tailor_height = c_int_arg("tailor height", u128::from(write.tailor_height))?;
        let timeout_ms = c_int_arg("timeout ms", write.timeout.as_millis())?;
        let files = write
            .files
            .iter()
            .map(|file| CString::new(file.to_string_lossy().into_owned()))
            .collect::<Result<Vec<CString>, _>>()?;
        let file_refs: Vec<&CStr> = files.iter().map(|file| file.as_c_str()).collect();

        let status = self.api.write_image_to_emmc(
            &file_refs,
            write.to_rgb,
            write.rotation as i32,
            write.tailor as i32,
            tailor_width,
            tailor_height,
            timeout_ms,
        );
        if status != 0 {
            debug!("write image Failed, return: {}", status);
        }
        self.check(status, || "write image to EMMC Err. ".to_string())?;
        debug!("write image success, {} file(s)", files.len());
        Ok(())
    }

    /// Names of the images stored on the fixture eMMC.
    pub fn get_emmc_image_name(&mut self) -> Result<Vec<String>, DutError> {
        self.get_emmc_image_name_with_buffer(IMAGE_NAME_BUFFER_LEN)
    }

    /// Same as `get_emmc_image_name` with a larger output buffer, for
    /// fixtures holding many images.
    pub fn get_emmc_image_name_with_buffer(&mut self, len: usize) -> Result<Vec<String>, DutError> {
        let mut buf = vec![0u8; len.max(1)];
        let status = self.api.get_emmc_image_name(&mut buf);
        self.check(status, || "get emmc image name err".to_string())?;
        let names: Vec<String> = buffer_to_string(&buf)
            .split(',')
            .map(str::to_string)
            .collect();
        debug!("get emmc image name success {:?}", names);
        Ok(names)
    }

    /// Moves the fixture to `192.168.21.<addr>`.
    ///
    /// The fixture restarts on the new address: close the device and open it
    /// again with `current_host()` once it is back.
    pub fn set_device_ip_address(&mut self, addr: u8) -> Result<(), DutError> {
        if addr == 1 || addr == 255 {
            return Err(DutError::ReservedAddress { addr });
        }
        let status = self.api.set_device_ip_address(addr as i32);
        self.check(status, || format!("Fail to set IP addr {}", addr))?;
        self.current_host = Some(format!("{}.{}", SUBNET, addr));
        debug!("set ip to {} success", addr);
        Ok(())
    }

    /// Fills the screen with one colour. The panel must be powered on.
    pub fn set_rgb(&mut self, r: u8, g: u8, b: u8) -> Result<(), DutError> {
        let status = self.api.set_rgb(r as i32, g as i32, b as i32);
        self.check(status, || "set rgb failed.".to_string())?;
        debug!("set rgb success ({}, {}, {})", r, g, b);
        Ok(())
    }

    pub fn decode_msg(&mut self, code: i32) -> Result<String, DutError> {
        let mut buf = vec![0u8; DECODE_BUFFER_LEN];
        let status = self.api.decoding(code, &mut buf);
        self.check(status, || "Unable to _decode_msg".to_string())?;
        Ok(buffer_to_string(&buf))
    }

    /// Last error code recorded by the fixture, see `errcode::description`.
    pub fn get_error_code(&self) -> String {
        let mut buf = [0u8; ERROR_CODE_BUFFER_LEN];
        self.api.get_error_code(&mut buf);
        buffer_to_string(&buf)
    }

    /// Selects the Demura mode (0, 1 or 2) used by the following writes.
    pub fn demura_mode(&mut self, mode: u8) -> Result<(), DutError> {
        let status = self.api.demura_mode(mode as i32);
        self.check(status, || "demura_mode  failed.".to_string())?;
        debug!("demura_mode success. {}", mode);
        Ok(())
    }

    /// Hands a Demura compensation file to the library, `crc` being the
    /// checksum the fixture verifies it against.
    pub fn load_demura_file<P: AsRef<Path>>(&mut self, file: P, crc: u16) -> Result<(), DutError> {
        let c_file = CString::new(file.as_ref().to_string_lossy().into_owned())?;
        let status = self.api.load_demura_file(&c_file, crc.to_be_bytes());
        self.check(status, || "load_demura_file  failed.".to_string())?;
        debug!("load_demura_file success. crc {:#06x}", crc);
        Ok(())
    }

    pub fn before_demura_poweron(&mut self) -> Result<(), DutError> {
        let status = self.api.before_demura_power_on();
        self.check(status, || "BeforeDemuraPowerOn  failed.".to_string())?;
        debug!("BeforeDemuraPowerOn success.");
        Ok(())
    }

    pub fn demura_write(&mut self) -> Result<(), DutError> {
        let status = self.api.demura_write();
        self.check(status, || "DemuraWrite  failed.".to_string())?;
        debug!("DemuraWrite success.");
        Ok(())
    }

    /// Flash write protection, 1 lifts it and 0 restores it.
    pub fn demura_protection(&mut self, mode: u8) -> Result<(), DutError> {
        let status = self.api.demura_protection(mode as i32);
        self.check(status, || "DemuraProtection  failed.".to_string())?;
        debug!("DemuraProtection success. {}", mode);
        Ok(())
    }

    pub fn after_demura_poweron(&mut self) -> Result<(), DutError> {
        let status = self.api.after_demura_power_on();
        self.check(status, || "AfterDemuraPowerOn  failed.".to_string())?;
        debug!("AfterDemuraPowerOn success.");
        Ok(())
    }

    /// Burns the written Demura data into the panel OTP. Not reversible.
    pub fn demura_otp(&mut self) -> Result<(), DutError> {
        let status = self.api.demura_otp();
        self.check(status, || "DemuraOTP  failed.".to_string())?;
        debug!("DemuraOTP success.");
        Ok(())
    }

    /// Reads the Demura data back from the panel into `file`.
    pub fn demura_read<P: AsRef<Path>>(&mut self, file: P) -> Result<(), DutError> {
        let c_file = CString::new(file.as_ref().to_string_lossy().into_owned())?;
        let status = self.api.demura_read(&c_file);
        self.check(status, || "DemuraRead  failed.".to_string())?;
        debug!("DemuraRead success.");
        Ok(())
    }

    fn check<F: FnOnce() -> String>(&self, status: i32, context: F) -> Result<(), DutError> {
        if status == 0 {
            return Ok(());
        }
        let code = self.get_error_code();
        Err(DutError::Call {
            context: context(),
            code,
        })
    }
}

// The library takes plain C ints; larger values must not wrap negative.
fn c_int_arg(name: &str, value: u128) -> Result<i32, DutError> {
    i32::try_from(value).map_err(|_| DutError::OutOfRange {
        name: name.to_string(),
        value,
    })
}

fn parse_dll_version(raw: &str) -> Result<String, DutError> {
    match raw.splitn(2, ':').nth(1) {
        Some(version) => Ok(version.trim().to_string()),
        None => Err(DutError::Version {
            raw: raw.to_string(),
        }),
    }
}

#[cfg(test)]
use crate::fake::FakeApi;
#[cfg(test)]
use crate::modes::{Rotation, Tailor};
#[cfg(test)]
use std::time::Duration;

#[cfg(test)]
fn opened(api: FakeApi) -> Dut<FakeApi> {
    let mut dut = Dut::with_api(api);
    dut.open_device(DEFAULT_HOST).unwrap();
    dut.api().clear();
    dut
}

#[test]
fn test_open_device() {
    let mut dut = Dut::with_api(FakeApi::new());
    dut.enable_emulator(true);
    dut.open_device("192.168.21.140").unwrap();

    assert_eq!(
        dut.api().calls(),
        vec!["EnableEmulator(true)", "OpenDevice(192.168.21.140)"]
    );
    assert_eq!(dut.current_host(), Some("192.168.21.140"));
    assert!(!dut.is_screen_powered_on());
}

#[test]
fn test_open_device_failure() {
    let mut dut = Dut::with_api(FakeApi::new().failing("OpenDevice", 3, "9999"));
    let err = dut.open_device(DEFAULT_HOST).unwrap_err();

    assert_eq!(err.code(), Some("9999"));
    assert_eq!(
        err.to_string(),
        "Unable to connect DUT. Received: 3 + errcode: 9999, errmsg: Communication exception"
    );
    assert_eq!(dut.host(), Some(DEFAULT_HOST));
    assert_eq!(dut.current_host(), None);
}

#[test]
fn test_power_on_once() {
    let mut dut = opened(FakeApi::new());
    dut.power_on(DscMode::Dsc100P).unwrap();
    dut.power_on(DscMode::Dsc100P).unwrap();

    assert!(dut.is_screen_powered_on());
    assert_eq!(dut.api().calls(), vec!["PowerON(1)"]);

    dut.power_off().unwrap();
    assert!(!dut.is_screen_powered_on());
    dut.power_on(DscMode::Dsc10P).unwrap();
    assert_eq!(dut.api().calls(), vec!["PowerON(1)", "PowerOFF", "PowerON(0)"]);
}

#[test]
fn test_power_on_failure_keeps_screen_off() {
    let mut dut = opened(FakeApi::new().failing("PowerON", 1, "8004"));
    let err = dut.power_on(DscMode::Dsc10P).unwrap_err();

    assert!(!dut.is_screen_powered_on());
    assert_eq!(
        err.to_string(),
        "Exit power_on because power_on failed. + errcode: 8004, \
         errmsg: VSP Voltage below lower-limit 10P Mode"
    );
}

#[test]
fn test_power_off_failure_keeps_screen_on() {
    let mut dut = opened(FakeApi::new().failing("PowerOFF", 1, "9999"));
    dut.power_on(DscMode::Dsc10P).unwrap();
    assert!(dut.power_off().is_err());
    assert!(dut.is_screen_powered_on());
}

#[test]
fn test_close_device_ignores_status() {
    let mut dut = opened(FakeApi::new().failing("CloseDevice", 7, "9999"));
    dut.power_on(DscMode::Dsc10P).unwrap();
    dut.close_device();
    assert!(!dut.is_screen_powered_on());
}

#[test]
fn test_show_emmc_image() {
    let mut dut = opened(FakeApi::new());
    dut.show_emmc_image(2).unwrap();
    dut.show_emmc_image("w255").unwrap();

    assert_eq!(
        dut.api().calls(),
        vec!["ShowEMMCImageIndex(2)", "ShowEMMCImageName(w255)"]
    );
}

#[test]
fn test_show_emmc_image_failure() {
    let mut dut = opened(FakeApi::new().failing("ShowEMMCImageName", 1, "0005"));
    let err = dut.show_emmc_image("missing").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Fail to show image missing. + errcode: 0005, errmsg: Powerboard Hardware error"
    );
}

#[test]
fn test_show_emmc_image_rejects_nul() {
    let mut dut = opened(FakeApi::new());
    match dut.show_emmc_image("w\0255") {
        Err(DutError::Nul { .. }) => {}
        _ => panic!("expected a NUL error"),
    }
    assert!(dut.api().calls().is_empty());
}

#[test]
fn test_read_versions() {
    let mut dut = opened(FakeApi::new());
    assert_eq!(dut.read_version().unwrap(), "FW_V1.0.3");
    assert_eq!(dut.read_dll_version().unwrap(), "2.1.0");
}

#[test]
fn test_parse_dll_version() {
    assert_eq!(parse_dll_version("DLL Version: 1.4").unwrap(), "1.4");
    assert_eq!(parse_dll_version("Version:  3.0.1 ").unwrap(), "3.0.1");
    match parse_dll_version("1.4") {
        Err(DutError::Version { raw }) => assert_eq!(raw, "1.4"),
        _ => panic!("expected a version error"),
    }
}

#[test]
fn test_reset_reconnects_to_current_host() {
    let mut dut = opened(FakeApi::new());
    dut.set_device_ip_address(134).unwrap();
    dut.api().clear();
    dut.reset().unwrap();

    assert_eq!(
        dut.api().calls(),
        vec![
            "PowerOFF",
            "CloseDevice",
            "EnableEmulator(false)",
            "OpenDevice(192.168.21.134)"
        ]
    );
    assert_eq!(dut.host(), Some("192.168.21.134"));
}

#[test]
fn test_reset_stops_when_power_off_fails() {
    let mut dut = opened(FakeApi::new().failing("PowerOFF", 2, "9999"));
    assert!(dut.reset().is_err());
    assert_eq!(dut.api().calls(), vec!["PowerOFF"]);
}

#[test]
fn test_write_image_to_emmc() {
    let mut dut = opened(FakeApi::new());
    let write = ImageWrite::new(vec!["b255.bmp", "g255.bmp"])
        .rotation(Rotation::Rotate180)
        .tailor(Tailor::Middle, 2160, 2312)
        .timeout(Duration::from_millis(4000));
    dut.write_image_to_emmc(&write).unwrap();

    assert_eq!(
        dut.api().calls(),
        vec!["WriteImageToEMMC([b255.bmp,g255.bmp], false, 1, 2, 2160, 2312, 4000)"]
    );
}

#[test]
fn test_write_image_to_emmc_failure() {
    let mut dut = opened(FakeApi::new().failing("WriteImageToEMMC", 5, "9999"));
    let err = dut.write_image_to_emmc(&ImageWrite::new(vec!["a.bmp"])).unwrap_err();
    assert_eq!(err.code(), Some("9999"));
}

#[test]
fn test_get_emmc_image_name() {
    let mut dut = opened(FakeApi::new());
    assert_eq!(dut.get_emmc_image_name().unwrap(), vec!["w255", "r255", "g255"]);
}

#[test]
fn test_get_emmc_image_name_truncated_by_buffer() {
    let mut dut = opened(FakeApi::new());
    // 8 bytes leave room for 7 characters and the terminator
    assert_eq!(
        dut.get_emmc_image_name_with_buffer(8).unwrap(),
        vec!["w255", "r2"]
    );
}

#[test]
fn test_set_device_ip_address() {
    let mut dut = opened(FakeApi::new());
    dut.set_device_ip_address(134).unwrap();
    assert_eq!(dut.current_host(), Some("192.168.21.134"));
    assert_eq!(dut.host(), Some(DEFAULT_HOST));
}

#[test]
fn test_set_device_ip_address_reserved() {
    let mut dut = opened(FakeApi::new());
    for addr in [1u8, 255].iter() {
        match dut.set_device_ip_address(*addr) {
            Err(DutError::ReservedAddress { addr: rejected }) => assert_eq!(rejected, *addr),
            _ => panic!("expected address {} to be rejected", addr),
        }
    }
    assert!(dut.api().calls().is_empty());
    assert_eq!(dut.current_host(), Some(DEFAULT_HOST));
}

#[test]
fn test_set_device_ip_address_failure_keeps_host() {
    let mut dut = opened(FakeApi::new().failing("SetDeviceIpAddress", 1, "9999"));
    assert!(dut.set_device_ip_address(140).is_err());
    assert_eq!(dut.current_host(), Some(DEFAULT_HOST));
}

#[test]
fn test_set_rgb_and_decode() {
    let mut dut = opened(FakeApi::new());
    dut.set_rgb(255, 255, 0).unwrap();
    assert_eq!(dut.decode_msg(12).unwrap(), "power board ok");
    assert_eq!(dut.api().calls(), vec!["SetRGB(255, 255, 0)", "Decoding(12)"]);
}

#[test]
fn test_set_rgb_failure() {
    let mut dut = opened(FakeApi::new().failing("SetRGB", 1, "8015"));
    let err = dut.set_rgb(127, 127, 127).unwrap_err();
    assert_eq!(
        err.to_string(),
        "set rgb failed. + errcode: 8015, errmsg: LED1 Current over upper-limit 10P Mode"
    );
}

#[test]
fn test_get_error_code() {
    let dut = Dut::with_api(FakeApi::new().failing("DemuraWrite", 1, "8028"));
    assert_eq!(dut.get_error_code(), "8028");
}

#[test]
fn test_load_demura_file_crc_big_endian() {
    let mut dut = opened(FakeApi::new());
    dut.load_demura_file("./lut_mode2_flash.bin", 0x4bde).unwrap();
    dut.load_demura_file("zero.bin", 0).unwrap();
    assert_eq!(
        dut.api().calls(),
        vec![
            "LoadDemuraFile(./lut_mode2_flash.bin, 4bde)",
            "LoadDemuraFile(zero.bin, 0000)"
        ]
    );
}

#[test]
fn test_demura_calls() {
    let mut dut = opened(FakeApi::new());
    dut.demura_mode(2).unwrap();
    dut.before_demura_poweron().unwrap();
    dut.demura_protection(1).unwrap();
    dut.demura_write().unwrap();
    dut.demura_protection(0).unwrap();
    dut.after_demura_poweron().unwrap();
    dut.demura_otp().unwrap();
    dut.demura_read("readback.bin").unwrap();

    assert_eq!(
        dut.api().calls(),
        vec![
            "DemuraMode(2)",
            "BeforeDemuraPowerOn",
            "DemuraProtection(1)",
            "DemuraWrite",
            "DemuraProtection(0)",
            "AfterDemuraPowerOn",
            "DemuraOTP",
            "DemuraRead(readback.bin)"
        ]
    );
}

#[test]
fn test_demura_failures_carry_context() {
    let mut dut = opened(FakeApi::new().failing("DemuraOTP", 1, "0009"));
    let err = dut.demura_otp().unwrap_err();
    assert_eq!(
        err.to_string(),
        "DemuraOTP  failed. + errcode: 0009, errmsg: Panel is not 0x9c"
    );
}

#[test]
fn test_show_emmc_image_index_too_large() {
    let mut dut = opened(FakeApi::new());
    match dut.show_emmc_image(EmmcImage::Index(u32::MAX)) {
        Err(DutError::OutOfRange { name, value }) => {
            assert_eq!(name, "image index");
            assert_eq!(value, u128::from(u32::MAX));
        }
        _ => panic!("expected the index to be rejected"),
    }
    assert!(dut.api().calls().is_empty());

    dut.show_emmc_image(EmmcImage::Index(i32::MAX as u32)).unwrap();
    assert_eq!(dut.api().calls(), vec![format!("ShowEMMCImageIndex({})", i32::MAX)]);
}

#[test]
fn test_write_image_to_emmc_timeout_too_large() {
    let mut dut = opened(FakeApi::new());
    let write = ImageWrite::new(vec!["a.bmp"]).timeout(Duration::from_millis(3_000_000_000));
    match dut.write_image_to_emmc(&write) {
        Err(DutError::OutOfRange { name, value }) => {
            assert_eq!(name, "timeout ms");
            assert_eq!(value, 3_000_000_000);
        }
        _ => panic!("expected the timeout to be rejected"),
    }
    assert!(dut.api().calls().is_empty());
}

#[test]
fn test_write_image_to_emmc_tailor_size_too_large() {
    let mut dut = opened(FakeApi::new());
    let wide = ImageWrite::new(vec!["a.bmp"]).tailor(Tailor::Left, u32::MAX, 2312);
    match dut.write_image_to_emmc(&wide) {
        Err(DutError::OutOfRange { name, .. }) => assert_eq!(name, "tailor width"),
        _ => panic!("expected the width to be rejected"),
    }
    let tall = ImageWrite::new(vec!["a.bmp"]).tailor(Tailor::Left, 2160, 1 << 31);
    match dut.write_image_to_emmc(&tall) {
        Err(DutError::OutOfRange { name, value }) => {
            assert_eq!(name, "tailor height");
            assert_eq!(value, 1 << 31);
        }
        _ => panic!("expected the height to be rejected"),
    }
    assert!(dut.api().calls().is_empty());
}

#[test]
fn test_drop_closes_open_device() {
    let api = FakeApi::new();
    let log = api.call_log();
    let mut dut = Dut::with_api(api);
    dut.open_device(DEFAULT_HOST).unwrap();
    assert!(dut.is_open());
    drop(dut);

    assert_eq!(log.borrow().last().map(String::as_str), Some("CloseDevice"));
}

#[test]
fn test_drop_after_close_does_not_close_again() {
    let api = FakeApi::new();
    let log = api.call_log();
    let mut dut = Dut::with_api(api);
    dut.open_device(DEFAULT_HOST).unwrap();
    dut.close_device();
    drop(dut);

    let closes = log.borrow().iter().filter(|call| *call == "CloseDevice").count();
    assert_eq!(closes, 1);
}

#[test]
fn test_failed_reopen_clears_open_state() {
    let api = FakeApi::new();
    let log = api.call_log();
    let mut dut = Dut::with_api(api);
    dut.open_device(DEFAULT_HOST).unwrap();

    dut.api().fail("OpenDevice", 1, "9999");
    assert!(dut.open_device("192.168.21.140").is_err());
    assert!(!dut.is_open());

    log.borrow_mut().clear();
    drop(dut);
    assert!(log.borrow().is_empty());
}
