//! Demura calibration write, in the order the fixture requires.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use tracing::info;

use crate::dut::Dut;
use crate::error::DutError;
use crate::library::DemuraApi;
use crate::modes::DscMode;

/// One Demura write: which data, in which mode, and how to check it.
#[derive(Debug, Clone)]
pub struct DemuraPlan {
    pub file: PathBuf,
    pub crc: u16,
    /// Demura mode, 0, 1 or 2.
    pub mode: u8,
    /// Burn the data into OTP once written.
    pub otp: bool,
    /// Grey level shown after the write for a visual check.
    pub grey: u8,
    pub hold: Duration,
    /// Power cycle the panel afterwards and show the grey level again.
    pub verify: bool,
}

impl DemuraPlan {
    pub fn new<P: Into<PathBuf>>(file: P, crc: u16) -> DemuraPlan {
        DemuraPlan {
            file: file.into(),
            crc,
            mode: 2,
            otp: false,
            grey: 127,
            hold: Duration::from_secs(5),
            verify: true,
        }
    }
}

pub fn write_demura<A: DemuraApi>(dut: &mut Dut<A>, plan: &DemuraPlan) -> Result<(), DutError> {
    info!(
        "writing demura data {} (crc {:#06x}, mode {})",
        plan.file.display(),
        plan.crc,
        plan.mode
    );
    dut.load_demura_file(&plan.file, plan.crc)?;
    dut.demura_mode(plan.mode)?;
    dut.before_demura_poweron()?;
    dut.demura_protection(1)?;
    dut.demura_write()?;
    dut.demura_protection(0)?;
    dut.after_demura_poweron()?;
    if plan.otp {
        info!("burning demura data to OTP");
        dut.demura_otp()?;
    }

    show_grey(dut, plan)?;
    dut.power_off()?;

    if plan.verify {
        // data written without OTP does not survive this power cycle
        dut.power_on(DscMode::Dsc10P)?;
        show_grey(dut, plan)?;
        dut.power_off()?;
    }
    info!("demura write done");
    Ok(())
}

fn show_grey<A: DemuraApi>(dut: &mut Dut<A>, plan: &DemuraPlan) -> Result<(), DutError> {
    dut.set_rgb(plan.grey, plan.grey, plan.grey)?;
    if plan.hold > Duration::from_secs(0) {
        thread::sleep(plan.hold);
    }
    Ok(())
}

#[cfg(test)]
use crate::dut::DEFAULT_HOST;
#[cfg(test)]
use crate::fake::FakeApi;

#[cfg(test)]
fn plan() -> DemuraPlan {
    let mut plan = DemuraPlan::new("./lut_x_pattern_2160x2312_mode2_flash.bin", 0x4bde);
    plan.hold = Duration::from_secs(0);
    plan
}

#[cfg(test)]
fn opened(api: FakeApi) -> Dut<FakeApi> {
    let mut dut = Dut::with_api(api);
    dut.open_device(DEFAULT_HOST).unwrap();
    dut.api().clear();
    dut
}

#[test]
fn test_write_demura_order() {
    let mut dut = opened(FakeApi::new());
    write_demura(&mut dut, &plan()).unwrap();

    assert_eq!(
        dut.api().calls(),
        vec![
            "LoadDemuraFile(./lut_x_pattern_2160x2312_mode2_flash.bin, 4bde)",
            "DemuraMode(2)",
            "BeforeDemuraPowerOn",
            "DemuraProtection(1)",
            "DemuraWrite",
            "DemuraProtection(0)",
            "AfterDemuraPowerOn",
            "SetRGB(127, 127, 127)",
            "PowerOFF",
            "PowerON(0)",
            "SetRGB(127, 127, 127)",
            "PowerOFF"
        ]
    );
    assert!(!dut.is_screen_powered_on());
}

#[test]
fn test_write_demura_with_otp_without_verify() {
    let mut dut = opened(FakeApi::new());
    let mut plan = plan();
    plan.otp = true;
    plan.verify = false;
    plan.mode = 1;
    plan.grey = 64;
    write_demura(&mut dut, &plan).unwrap();

    let calls = dut.api().calls();
    assert_eq!(calls[1], "DemuraMode(1)");
    assert_eq!(calls[7], "DemuraOTP");
    assert_eq!(&calls[8..], ["SetRGB(64, 64, 64)", "PowerOFF"]);
}

#[test]
fn test_write_demura_stops_at_first_failure() {
    let mut dut = opened(FakeApi::new().failing("DemuraWrite", 1, "9999"));
    let err = write_demura(&mut dut, &plan()).unwrap_err();

    assert_eq!(err.code(), Some("9999"));
    assert_eq!(dut.api().calls().last().unwrap(), "DemuraWrite");
}
