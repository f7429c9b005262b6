//! In-process stand-in for DemuraDLL used by the unit tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::CStr;
use std::rc::Rc;

use crate::library::DemuraApi;

pub struct FakeApi {
    calls: Rc<RefCell<Vec<String>>>,
    failing: RefCell<HashMap<&'static str, i32>>,
    error_code: RefCell<String>,
    pub version: String,
    pub dll_version: String,
    pub image_names: String,
    pub decoded: String,
}

impl FakeApi {
    pub fn new() -> FakeApi {
        FakeApi {
            calls: Rc::new(RefCell::new(Vec::new())),
            failing: RefCell::new(HashMap::new()),
            error_code: RefCell::new("0000".to_string()),
            version: "FW_V1.0.3".to_string(),
            dll_version: "DemuraDLL Version: 2.1.0 ".to_string(),
            image_names: "w255,r255,g255".to_string(),
            decoded: "power board ok".to_string(),
        }
    }

    /// Makes every call to `name` return `status` and report `code`.
    pub fn failing(self, name: &'static str, status: i32, code: &str) -> FakeApi {
        self.fail(name, status, code);
        self
    }

    /// Same as `failing`, on a fake already handed to a `Dut`.
    pub fn fail(&self, name: &'static str, status: i32, code: &str) {
        self.failing.borrow_mut().insert(name, status);
        *self.error_code.borrow_mut() = code.to_string();
    }

    /// Call log that outlives the fake, for checks after a `Dut` is dropped.
    pub fn call_log(&self) -> Rc<RefCell<Vec<String>>> {
        Rc::clone(&self.calls)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }

    fn record(&self, name: &'static str, call: String) -> i32 {
        self.calls.borrow_mut().push(call);
        *self.failing.borrow().get(name).unwrap_or(&0)
    }
}

fn fill(buf: &mut [u8], text: &str) {
    let len = text.len().min(buf.len().saturating_sub(1));
    buf[..len].copy_from_slice(&text.as_bytes()[..len]);
    if len < buf.len() {
        buf[len] = 0;
    }
}

fn text(s: &CStr) -> String {
    s.to_string_lossy().into_owned()
}

impl DemuraApi for FakeApi {
    fn enable_emulator(&self, emulator: bool) -> i32 {
        self.record("EnableEmulator", format!("EnableEmulator({})", emulator))
    }

    fn open_device(&self, host: &CStr) -> i32 {
        self.record("OpenDevice", format!("OpenDevice({})", text(host)))
    }

    fn power_on(&self, mode: i32) -> i32 {
        self.record("PowerON", format!("PowerON({})", mode))
    }

    fn power_off(&self) -> i32 {
        self.record("PowerOFF", "PowerOFF".to_string())
    }

    fn close_device(&self) -> i32 {
        self.record("CloseDevice", "CloseDevice".to_string())
    }

    fn show_emmc_image_index(&self, index: i32) -> i32 {
        self.record("ShowEMMCImageIndex", format!("ShowEMMCImageIndex({})", index))
    }

    fn show_emmc_image_name(&self, name: &CStr) -> i32 {
        self.record("ShowEMMCImageName", format!("ShowEMMCImageName({})", text(name)))
    }

    fn read_version(&self, buf: &mut [u8]) -> i32 {
        fill(buf, &self.version);
        self.record("ReadVersion", "ReadVersion".to_string())
    }

    fn read_dll_version(&self, buf: &mut [u8]) -> i32 {
        fill(buf, &self.dll_version);
        self.record("ReadDLLVersion", "ReadDLLVersion".to_string())
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
        let files: Vec<String> = files.iter().map(|file| text(file)).collect();
        self.record(
            "WriteImageToEMMC",
            format!(
                "WriteImageToEMMC([{}], {}, {}, {}, {}, {}, {})",
                files.join(","),
                to_rgb,
                rotation,
                tailor,
                tailor_width,
                tailor_height,
                timeout_ms
            ),
        )
    }

    fn get_emmc_image_name(&self, buf: &mut [u8]) -> i32 {
        fill(buf, &self.image_names);
        self.record("GetEMMCImageName", "GetEMMCImageName".to_string())
    }

    fn set_device_ip_address(&self, address: i32) -> i32 {
        self.record("SetDeviceIpAddress", format!("SetDeviceIpAddress({})", address))
    }

    fn set_rgb(&self, r: i32, g: i32, b: i32) -> i32 {
        self.record("SetRGB", format!("SetRGB({}, {}, {})", r, g, b))
    }

    fn decoding(&self, code: i32, buf: &mut [u8]) -> i32 {
        fill(buf, &self.decoded);
        self.record("Decoding", format!("Decoding({})", code))
    }

    fn get_error_code(&self, buf: &mut [u8]) -> i32 {
        fill(buf, &self.error_code.borrow());
        0
    }

    fn demura_mode(&self, mode: i32) -> i32 {
        self.record("DemuraMode", format!("DemuraMode({})", mode))
    }

    fn load_demura_file(&self, file_name: &CStr, crc: [u8; 2]) -> i32 {
        self.record(
            "LoadDemuraFile",
            format!("LoadDemuraFile({}, {:02x}{:02x})", text(file_name), crc[0], crc[1]),
        )
    }

    fn before_demura_power_on(&self) -> i32 {
        self.record("BeforeDemuraPowerOn", "BeforeDemuraPowerOn".to_string())
    }

    fn demura_write(&self) -> i32 {
        self.record("DemuraWrite", "DemuraWrite".to_string())
    }

    fn demura_protection(&self, mode: i32) -> i32 {
        self.record("DemuraProtection", format!("DemuraProtection({})", mode))
    }

    fn after_demura_power_on(&self) -> i32 {
        self.record("AfterDemuraPowerOn", "AfterDemuraPowerOn".to_string())
    }

    fn demura_otp(&self) -> i32 {
        self.record("DemuraOTP", "DemuraOTP".to_string())
    }

    fn demura_read(&self, file_name: &CStr) -> i32 {
        self.record("DemuraRead", format!("DemuraRead({})", text(file_name)))
    }
}
