//! Power source classification.
//!
//! Which stage (DC-DC converter, linear regulator, external supply) currently feeds a
//! rail is not stored anywhere; it follows from the 5V-present status, the global DC-DC
//! enable and the rail's own mode bits. [`classify`] derives it from one consistent
//! [`PowerStatusSnapshot`].

use super::rail::{Rail, SourceKind, VDDMEM_ENABLE_ILIMIT};
use crate::regs::{sts, v5ctrl, RegisterPort, HW_POWER_5VCTRL, HW_POWER_STS};

/// Bit of the linreg-offset field that puts the rail in DC-DC mode.
pub const LINREG_OFFSET_DCDC_MODE: u32 = 1 << 1;

/// What currently powers a rail. Discriminants match the hardware reference numbering.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerSource {
    /// Linear regulator at target, DC-DC output gated off.
    LinregDcdcOff = 1,
    /// Linear regulator 25mV below target, DC-DC ready for the automatic switch-over
    /// after a 5V event.
    LinregDcdcReady = 2,
    /// DC-DC converter with the linear regulator on.
    DcdcLinregOn = 3,
    /// DC-DC converter with the linear regulator off.
    DcdcLinregOff = 4,
    /// DC-DC converter, linear regulator ready for the automatic switch-over.
    DcdcLinregReady = 5,
    /// External supply while 5V is present.
    ExternalSource5V = 6,
    /// External supply while 5V is absent.
    ExternalSourceBattery = 7,
    /// Contradictory or unsupported bit combination.
    UnknownSource = 8,
}

/// Regulator state as reported to a regulator framework.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegulatorStatus {
    On,
    Off,
    Undefined,
}

impl PowerSource {
    /// The rail output is live.
    pub fn is_enabled(self) -> bool {
        matches!(
            self,
            PowerSource::LinregDcdcOff | PowerSource::LinregDcdcReady | PowerSource::DcdcLinregOn
        )
    }

    pub fn status(self) -> RegulatorStatus {
        match self {
            PowerSource::LinregDcdcOff | PowerSource::LinregDcdcReady | PowerSource::DcdcLinregOn => {
                RegulatorStatus::On
            }
            PowerSource::DcdcLinregOff | PowerSource::DcdcLinregReady => RegulatorStatus::Off,
            _ => RegulatorStatus::Undefined,
        }
    }

    /// The DC-DC control loop does not drive this rail, so DC_OK says nothing about it.
    pub fn dcdc_loop_inactive(self) -> bool {
        matches!(
            self,
            PowerSource::LinregDcdcOff | PowerSource::LinregDcdcReady | PowerSource::ExternalSource5V
        )
    }
}

/// HW_POWER_5VCTRL, HW_POWER_STS and a rail control register, read back to back.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerStatusSnapshot {
    pub v5ctrl: u32,
    pub status: u32,
    pub ctrl: u32,
}

impl PowerStatusSnapshot {
    pub fn read<P: RegisterPort>(port: &mut P, rail: &Rail) -> Result<Self, P::Error> {
        let v5ctrl = port.read(HW_POWER_5VCTRL)?;
        let status = port.read(HW_POWER_STS)?;
        let ctrl = port.read(rail.ctrl_reg)?;
        Ok(Self { v5ctrl, status, ctrl })
    }

    fn vbus_valid(&self) -> bool {
        self.status & sts::VBUSVALID0_STATUS != 0
    }

    fn dcdc_enabled(&self) -> bool {
        self.v5ctrl & v5ctrl::ENABLE_DCDC != 0
    }
}

/// Derive the power source of `rail` from `snap`. Rails without a classification
/// strategy are always [`PowerSource::UnknownSource`].
pub fn classify(rail: &Rail, snap: &PowerStatusSnapshot) -> PowerSource {
    match rail.source {
        Some(SourceKind::Vddio) => classify_vddio(rail, snap),
        Some(SourceKind::VddaVddd) => classify_vdda_vddd(rail, snap),
        Some(SourceKind::Vddmem) => classify_vddmem(rail, snap),
        None => PowerSource::UnknownSource,
    }
}

fn dcdc_mode(rail: &Rail, snap: &PowerStatusSnapshot) -> bool {
    rail.linreg_offset.get(snap.ctrl) & LINREG_OFFSET_DCDC_MODE != 0
}

fn classify_vddio(rail: &Rail, snap: &PowerStatusSnapshot) -> PowerSource {
    let dcdc_mode = dcdc_mode(rail, snap);

    if !snap.vbus_valid() {
        return if dcdc_mode {
            PowerSource::DcdcLinregOn
        } else {
            PowerSource::UnknownSource
        };
    }

    if snap.ctrl & rail.disable_fet_mask != 0 && !dcdc_mode {
        return PowerSource::LinregDcdcOff;
    }

    match (snap.dcdc_enabled(), dcdc_mode) {
        (true, true) => PowerSource::DcdcLinregOn,
        (true, false) => PowerSource::UnknownSource,
        (false, true) => PowerSource::LinregDcdcReady,
        (false, false) => PowerSource::LinregDcdcOff,
    }
}

fn classify_vdda_vddd(rail: &Rail, snap: &PowerStatusSnapshot) -> PowerSource {
    let dcdc_mode = dcdc_mode(rail, snap);

    if snap.ctrl & rail.disable_fet_mask != 0 {
        if snap.vbus_valid() {
            return PowerSource::ExternalSource5V;
        }
        if !dcdc_mode {
            return PowerSource::LinregDcdcOff;
        }
    }

    if snap.vbus_valid() {
        if snap.dcdc_enabled() {
            return PowerSource::DcdcLinregOn;
        }
        if dcdc_mode {
            return PowerSource::LinregDcdcReady;
        }
        return PowerSource::LinregDcdcOff;
    }

    if dcdc_mode {
        let linreg_on = rail.enable.is_some_and(|en| en.is_on(snap.ctrl));
        return if linreg_on {
            PowerSource::DcdcLinregOn
        } else {
            PowerSource::DcdcLinregOff
        };
    }

    PowerSource::UnknownSource
}

fn classify_vddmem(rail: &Rail, snap: &PowerStatusSnapshot) -> PowerSource {
    let Some(enable) = rail.enable else {
        return PowerSource::UnknownSource;
    };

    if snap.ctrl & (enable.mask | VDDMEM_ENABLE_ILIMIT) == enable.mask {
        PowerSource::LinregDcdcOff
    } else {
        PowerSource::DcdcLinregOff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pmu::rail::{Chip, RailId};
    use crate::regs::{sts, v5ctrl};

    const VBUS: u32 = sts::VBUSVALID0_STATUS;
    const DCDC_EN: u32 = v5ctrl::ENABLE_DCDC;

    fn snap(v5ctrl: u32, status: u32, ctrl: u32) -> PowerStatusSnapshot {
        PowerStatusSnapshot { v5ctrl, status, ctrl }
    }

    fn vddio() -> &'static Rail {
        Chip::Imx28.rail(RailId::Vddio)
    }

    fn vdda() -> &'static Rail {
        Chip::Imx28.rail(RailId::Vdda)
    }

    // DCDC-mode bit of VDDIOCTRL / VDDACTRL (linreg offset field at bit 12).
    const MODE_12: u32 = LINREG_OFFSET_DCDC_MODE << 12;
    const FET_16: u32 = 1 << 16;

    #[test]
    fn vddio_with_5v() {
        let r = vddio();
        assert_eq!(classify(r, &snap(0, VBUS, FET_16)), PowerSource::LinregDcdcOff);
        assert_eq!(classify(r, &snap(DCDC_EN, VBUS, MODE_12)), PowerSource::DcdcLinregOn);
        assert_eq!(classify(r, &snap(DCDC_EN, VBUS, FET_16 | MODE_12)), PowerSource::DcdcLinregOn);
        assert_eq!(classify(r, &snap(0, VBUS, 0)), PowerSource::LinregDcdcOff);
        assert_eq!(classify(r, &snap(0, VBUS, MODE_12)), PowerSource::LinregDcdcReady);
        assert_eq!(classify(r, &snap(DCDC_EN, VBUS, 0)), PowerSource::UnknownSource);
    }

    #[test]
    fn vddio_without_5v() {
        let r = vddio();
        assert_eq!(classify(r, &snap(0, 0, MODE_12)), PowerSource::DcdcLinregOn);
        assert_eq!(classify(r, &snap(DCDC_EN, 0, FET_16 | MODE_12)), PowerSource::DcdcLinregOn);
        assert_eq!(classify(r, &snap(DCDC_EN, 0, FET_16)), PowerSource::UnknownSource);
        assert_eq!(classify(r, &snap(DCDC_EN, 0, 0)), PowerSource::UnknownSource);
    }

    #[test]
    fn vddio_ignores_unrelated_bits() {
        let r = vddio();
        let noise_ctrl = 0x1f | (7 << 8) | (1 << 12);
        assert_eq!(classify(r, &snap(0, VBUS | sts::DC_OK, noise_ctrl)), PowerSource::LinregDcdcOff);
        assert_eq!(classify(r, &snap(!DCDC_EN, 0, noise_ctrl)), PowerSource::UnknownSource);
    }

    #[test]
    fn vddio_classification_is_exhaustive_over_decision_bits() {
        let r = vddio();
        for bits in 0..16u32 {
            let v5 = if bits & 1 != 0 { DCDC_EN } else { 0 };
            let st = if bits & 2 != 0 { VBUS } else { 0 };
            let fet = if bits & 4 != 0 { FET_16 } else { 0 };
            let mode = if bits & 8 != 0 { MODE_12 } else { 0 };
            let ctrl = fet | mode;
            let s = snap(v5, st, ctrl);

            let first = classify(r, &s);
            assert_eq!(first, classify(r, &s));
            assert!(!matches!(
                first,
                PowerSource::DcdcLinregOff
                    | PowerSource::DcdcLinregReady
                    | PowerSource::ExternalSource5V
                    | PowerSource::ExternalSourceBattery
            ));
        }
    }

    #[test]
    fn vdda_disabled_fet() {
        let r = vdda();
        assert_eq!(classify(r, &snap(0, VBUS, FET_16)), PowerSource::ExternalSource5V);
        assert_eq!(classify(r, &snap(DCDC_EN, VBUS, FET_16 | MODE_12)), PowerSource::ExternalSource5V);
        assert_eq!(classify(r, &snap(DCDC_EN, 0, FET_16)), PowerSource::LinregDcdcOff);
    }

    #[test]
    fn vdda_with_5v() {
        let r = vdda();
        assert_eq!(classify(r, &snap(DCDC_EN, VBUS, 0)), PowerSource::DcdcLinregOn);
        assert_eq!(classify(r, &snap(0, VBUS, 0)), PowerSource::LinregDcdcOff);
        assert_eq!(classify(r, &snap(0, VBUS, MODE_12)), PowerSource::LinregDcdcReady);
    }

    #[test]
    fn vdda_on_battery() {
        let r = vdda();
        let enable = 1 << 17;
        assert_eq!(classify(r, &snap(0, 0, MODE_12 | enable)), PowerSource::DcdcLinregOn);
        assert_eq!(classify(r, &snap(0, 0, MODE_12)), PowerSource::DcdcLinregOff);
        assert_eq!(classify(r, &snap(0, 0, FET_16 | MODE_12)), PowerSource::DcdcLinregOff);
        assert_eq!(classify(r, &snap(DCDC_EN, 0, enable)), PowerSource::UnknownSource);
    }

    #[test]
    fn vddd_uses_its_own_field_positions() {
        let r = Chip::Imx23.rail(RailId::Vddd);
        let mode = LINREG_OFFSET_DCDC_MODE << 16;
        let enable = 1 << 21;
        let fet = 1 << 20;

        assert_eq!(classify(r, &snap(0, 0, mode | enable)), PowerSource::DcdcLinregOn);
        // The VDDA mode bit means nothing on VDDD.
        assert_eq!(classify(r, &snap(0, 0, MODE_12 | enable)), PowerSource::UnknownSource);
        assert_eq!(classify(r, &snap(0, VBUS, fet)), PowerSource::ExternalSource5V);
    }

    #[test]
    fn vddmem_follows_enable_and_current_limit() {
        let r = Chip::Imx23.rail(RailId::Vddmem);
        let enable = 1 << 8;

        assert_eq!(classify(r, &snap(0, 0, enable)), PowerSource::LinregDcdcOff);
        assert_eq!(classify(r, &snap(0, 0, enable | VDDMEM_ENABLE_ILIMIT)), PowerSource::DcdcLinregOff);
        assert_eq!(classify(r, &snap(0, 0, 0)), PowerSource::DcdcLinregOff);
    }

    #[test]
    fn dcdc_rail_has_no_source() {
        let r = Chip::Imx28.rail(RailId::Dcdc);
        assert_eq!(classify(r, &snap(DCDC_EN, VBUS, DCDC_EN)), PowerSource::UnknownSource);
    }

    #[test]
    fn enabled_and_status_agree() {
        use PowerSource::*;
        for source in [
            LinregDcdcOff,
            LinregDcdcReady,
            DcdcLinregOn,
            DcdcLinregOff,
            DcdcLinregReady,
            ExternalSource5V,
            ExternalSourceBattery,
            UnknownSource,
        ] {
            assert_eq!(source.is_enabled(), source.status() == RegulatorStatus::On);
        }
        assert_eq!(DcdcLinregReady.status(), RegulatorStatus::Off);
        assert_eq!(ExternalSource5V.status(), RegulatorStatus::Undefined);
    }
}
