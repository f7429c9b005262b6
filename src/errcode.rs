/// Code reported by the fixture when the last call went through.
pub static SUCCESS: &str = "0000";

/// Code reported when the link to the fixture dropped.
pub static COMMUNICATION_EXCEPTION: &str = "9999";

/// Looks up the human readable meaning of a fixture error code.
///
/// The codes are the four-character strings returned by `GetErrorCode`.
/// 80xx codes are the power-board rail checks; "10P" and "100P" are the
/// DSC modes the panel was powered with.
pub fn description(code: &str) -> Option<&'static str> {
    let text = match code.trim() {
        "0000" => "Success",
        "0005" => "Powerboard Hardware error",
        "0006" => "Powerboard Hardware version mismatch",
        "0007" => "No vendor id",
        "0008" => "MP3314 Config Error",
        "0009" => "Panel is not 0x9c",
        "8001" => "IOVCC Voltage over upper-limit 10P Mode",
        "8002" => "IOVCC Voltage below lower-limit 10P Mode",
        "8003" => "VSP Voltage over upper-limit 10P Mode",
        "8004" => "VSP Voltage below lower-limit 10P Mode",
        "8005" => "VSN Voltage over upper-limit 10P Mode",
        "8006" => "VSN Voltage below lower-limit 10P Mode",
        "8007" => "VLED Voltage over upper-limit 10P Mode",
        "8008" => "VLED Voltage below lower-limit 10P Mode",
        "8009" => "IOVCC Current over upper-limit 10P Mode",
        "8010" => "IOVCC Current below lower-limit 10P Mode",
        "8011" => "VSP Current over upper-limit 10P Mode",
        "8012" => "VSP Current below lower-limit 10P Mode",
        "8013" => "VSN Current over upper-limit 10P Mode",
        "8014" => "VSN Current below lower-limit 10P Mode",
        "8015" => "LED1 Current over upper-limit 10P Mode",
        "8016" => "LED1 Current below lower-limit 10P Mode",
        "8017" => "LED2 Current over upper-limit 10P Mode",
        "8018" => "LED2 Current below lower-limit 10P Mode",
        "8024" => "LED1 Current below lower-limit 100P Mode",
        "8025" => "LED2 Current below lower-limit 100P Mode",
        "8027" => "LED1 Current over upper-limit 100P Mode",
        "8028" => "LED2 Current over upper-limit 100P Mode",
        "9999" => "Communication exception",
        _ => return None,
    };
    Some(text)
}

#[test]
fn test_known_codes() {
    assert_eq!(description(SUCCESS), Some("Success"));
    assert_eq!(description("0009"), Some("Panel is not 0x9c"));
    assert_eq!(
        description("8027"),
        Some("LED1 Current over upper-limit 100P Mode")
    );
    assert_eq!(
        description(COMMUNICATION_EXCEPTION),
        Some("Communication exception")
    );
}

#[test]
fn test_unknown_codes() {
    // gaps in the 80xx range are not assigned
    assert_eq!(description("8019"), None);
    assert_eq!(description("8026"), None);
    assert_eq!(description(""), None);
    assert_eq!(description("-1"), None);
}

#[test]
fn test_code_is_trimmed() {
    assert_eq!(description(" 8001\n"), Some("IOVCC Voltage over upper-limit 10P Mode"));
}
