use std::ffi::NulError;
use std::io;

use custom_error::custom_error;

use crate::errcode;

custom_error! {pub DutError
    Call{context: String, code: String} = @{
        format!(
            "{} + errcode: {}, errmsg: {}",
            context,
            code,
            errcode::description(code).unwrap_or("None")
        )
    },
    Load{source: dlopen::Error} = "could not open DemuraDLL or load its symbols: {source}",
    LibraryCopy{path: String, source: io::Error} = "could not prepare library copy {path}: {source}",
    Nul{source: NulError} = "string passed to DemuraDLL contains a NUL byte",
    OutOfRange{name: String, value: u128} = "{name} {value} does not fit the library's int argument",
    ReservedAddress{addr: u8} = "192.168.21.{addr} is reserved, do not use 1 or 255",
    Version{raw: String} = "unexpected DLL version string: {raw}",
    ConfigRead{path: String, source: io::Error} = "could not read config {path}: {source}",
    Config{source: toml::de::Error} = "invalid config: {source}",
    Pattern{source: image::ImageError} = "could not write test pattern: {source}",
    Color{spec: String} = "invalid colour '{spec}', expected name=r,g,b"
}

impl DutError {
    /// Device error code attached to a failed library call.
    pub fn code(&self) -> Option<&str> {
        match self {
            DutError::Call { code, .. } => Some(code),
            _ => None,
        }
    }
}

#[test]
fn test_call_error_display() {
    let err = DutError::Call {
        context: "Exit power_on because power_on failed.".to_string(),
        code: "8003".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Exit power_on because power_on failed. + errcode: 8003, \
         errmsg: VSP Voltage over upper-limit 10P Mode"
    );
    assert_eq!(err.code(), Some("8003"));
}

#[test]
fn test_call_error_unknown_code() {
    let err = DutError::Call {
        context: "set rgb failed.".to_string(),
        code: "4242".to_string(),
    };
    assert_eq!(err.to_string(), "set rgb failed. + errcode: 4242, errmsg: None");
}

#[test]
fn test_reserved_address_display() {
    let err = DutError::ReservedAddress { addr: 255 };
    assert_eq!(
        err.to_string(),
        "192.168.21.255 is reserved, do not use 1 or 255"
    );
    assert_eq!(err.code(), None);
}
