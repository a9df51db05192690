//! Rail descriptors for the i.MX23 / i.MX28 on-chip regulators.
//!
//! All variation between rails and between the two chips is data: one [`Rail`] table
//! per chip, with the classification strategy picked by [`SourceKind`].

use crate::regs::{
    ctrl, v5ctrl, HW_POWER_5VCTRL, HW_POWER_VDDACTRL, HW_POWER_VDDDCTRL, HW_POWER_VDDIOCTRL,
    HW_POWER_VDDMEMCTRL,
};

/// SoC variant.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Chip {
    Imx23,
    #[default]
    Imx28,
}

/// Regulated voltage domain.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RailId {
    Dcdc,
    Vddio,
    Vdda,
    Vddd,
    Vddmem,
}

impl RailId {
    pub const ALL: [RailId; 5] = [RailId::Dcdc, RailId::Vddio, RailId::Vdda, RailId::Vddd, RailId::Vddmem];
}

/// How a rail's power source is derived from the status registers.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SourceKind {
    /// No enable path of its own besides the DC-DC/linreg coupling.
    Vddio,
    /// Own enable bit and disable-FET bit.
    VddaVddd,
    /// Plain linear regulator with a current limiter.
    Vddmem,
}

/// Linear selector to voltage mapping: `min_uv + selector * step_uv` for
/// `selector < n_voltages`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinearRange {
    pub min_uv: u32,
    pub step_uv: u32,
    pub n_voltages: u32,
}

impl LinearRange {
    pub fn contains(&self, selector: u32) -> bool {
        selector < self.n_voltages
    }

    pub fn voltage(&self, selector: u32) -> Option<u32> {
        if !self.contains(selector) {
            return None;
        }
        Some(self.min_uv + selector * self.step_uv)
    }

    /// Lowest selector whose voltage lies in `[min_uv, max_uv]`.
    pub fn map(&self, min_uv: u32, max_uv: u32) -> Option<u32> {
        let selector = if min_uv <= self.min_uv {
            0
        } else {
            (min_uv - self.min_uv).div_ceil(self.step_uv)
        };
        let uv = self.voltage(selector)?;
        (uv <= max_uv).then_some(selector)
    }

    pub fn max_uv(&self) -> u32 {
        self.min_uv + (self.n_voltages - 1) * self.step_uv
    }
}

/// A bit field inside a register.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Field {
    pub mask: u32,
    pub shift: u8,
}

impl Field {
    pub const fn new(mask: u32, shift: u8) -> Self {
        Self { mask, shift }
    }

    pub fn get(&self, reg: u32) -> u32 {
        (reg & self.mask) >> self.shift
    }

    pub fn max(&self) -> u32 {
        self.mask >> self.shift
    }
}

/// The bit that switches a rail's output on.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EnableBit {
    pub reg: u32,
    pub mask: u32,
    /// Output is on when the bit is clear.
    pub inverted: bool,
}

impl EnableBit {
    pub fn is_on(&self, reg: u32) -> bool {
        (reg & self.mask != 0) != self.inverted
    }
}

/// Brownout interrupt bits of a rail, both in HW_POWER_CTRL.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Brownout {
    /// Latched brownout status.
    pub irq: u32,
    /// Brownout interrupt enable.
    pub enirq: u32,
}

/// Regulator operations a rail supports.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ops {
    pub list_voltage: bool,
    pub set_voltage_sel: bool,
    pub get_voltage_sel: bool,
    pub is_enabled: bool,
    pub get_status: bool,
}

const DCDC_OPS: Ops = Ops {
    list_voltage: false,
    set_voltage_sel: false,
    get_voltage_sel: false,
    is_enabled: true,
    get_status: false,
};

const LDO_OPS: Ops = Ops {
    list_voltage: true,
    set_voltage_sel: true,
    get_voltage_sel: true,
    is_enabled: true,
    get_status: true,
};

// VDDMEM has no DC-DC stage to wait on, so it is read-only.
const VDDMEM_OPS: Ops = Ops {
    list_voltage: true,
    set_voltage_sel: false,
    get_voltage_sel: true,
    is_enabled: true,
    get_status: true,
};

/// One regulated voltage domain.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rail {
    pub id: RailId,
    pub name: &'static str,
    /// Rail control register holding the selector and mode bits.
    pub ctrl_reg: u32,
    pub enable: Option<EnableBit>,
    pub vsel_mask: u32,
    pub range: Option<LinearRange>,
    /// Gates the DC-DC output stage off this rail.
    pub disable_fet_mask: u32,
    /// Steps between linreg output and DC-DC target; bit 1 of the field is the
    /// DCDC-mode bit.
    pub linreg_offset: Field,
    pub bo_offset: Option<Field>,
    pub brownout: Option<Brownout>,
    pub source: Option<SourceKind>,
    pub ops: Ops,
}

/// VDDMEM current limiter enable.
pub const VDDMEM_ENABLE_ILIMIT: u32 = 1 << 9;

const NO_FIELD: Field = Field::new(0, 0);

const DCDC: Rail = Rail {
    id: RailId::Dcdc,
    name: "dcdc",
    ctrl_reg: HW_POWER_5VCTRL,
    enable: Some(EnableBit {
        reg: HW_POWER_5VCTRL,
        mask: v5ctrl::ENABLE_DCDC,
        inverted: false,
    }),
    vsel_mask: 0,
    range: None,
    disable_fet_mask: 0,
    linreg_offset: NO_FIELD,
    bo_offset: None,
    brownout: None,
    source: None,
    ops: DCDC_OPS,
};

const fn vddio(n_voltages: u32, step_uv: u32) -> Rail {
    Rail {
        id: RailId::Vddio,
        name: "vddio",
        ctrl_reg: HW_POWER_VDDIOCTRL,
        enable: Some(EnableBit {
            reg: HW_POWER_5VCTRL,
            mask: v5ctrl::ILIMIT_EQ_ZERO,
            inverted: true,
        }),
        vsel_mask: 0x1f,
        range: Some(LinearRange {
            min_uv: 2_800_000,
            step_uv,
            n_voltages,
        }),
        disable_fet_mask: 1 << 16,
        linreg_offset: Field::new(3 << 12, 12),
        bo_offset: Some(Field::new(7 << 8, 8)),
        brownout: Some(Brownout {
            irq: ctrl::VDDIO_BO_IRQ,
            enirq: ctrl::ENIRQ_VDDIO_BO,
        }),
        source: Some(SourceKind::Vddio),
        ops: LDO_OPS,
    }
}

const VDDA: Rail = Rail {
    id: RailId::Vdda,
    name: "vdda",
    ctrl_reg: HW_POWER_VDDACTRL,
    enable: Some(EnableBit {
        reg: HW_POWER_VDDACTRL,
        mask: 1 << 17,
        inverted: false,
    }),
    vsel_mask: 0x1f,
    range: Some(LinearRange {
        min_uv: 1_500_000,
        step_uv: 25_000,
        n_voltages: 0x20,
    }),
    disable_fet_mask: 1 << 16,
    linreg_offset: Field::new(3 << 12, 12),
    bo_offset: Some(Field::new(7 << 8, 8)),
    brownout: Some(Brownout {
        irq: ctrl::VDDA_BO_IRQ,
        enirq: ctrl::ENIRQ_VDDA_BO,
    }),
    source: Some(SourceKind::VddaVddd),
    ops: LDO_OPS,
};

const VDDD: Rail = Rail {
    id: RailId::Vddd,
    name: "vddd",
    ctrl_reg: HW_POWER_VDDDCTRL,
    enable: Some(EnableBit {
        reg: HW_POWER_VDDDCTRL,
        mask: 1 << 21,
        inverted: false,
    }),
    vsel_mask: 0x1f,
    range: Some(LinearRange {
        min_uv: 800_000,
        step_uv: 25_000,
        n_voltages: 0x20,
    }),
    disable_fet_mask: 1 << 20,
    linreg_offset: Field::new(3 << 16, 16),
    bo_offset: Some(Field::new(7 << 8, 8)),
    brownout: Some(Brownout {
        irq: ctrl::VDDD_BO_IRQ,
        enirq: ctrl::ENIRQ_VDDD_BO,
    }),
    source: Some(SourceKind::VddaVddd),
    ops: LDO_OPS,
};

// The i.MX28 can detect VDDMEM brownouts but has no interrupt for them.
const fn vddmem(min_uv: u32, step_uv: u32) -> Rail {
    Rail {
        id: RailId::Vddmem,
        name: "vddmem",
        ctrl_reg: HW_POWER_VDDMEMCTRL,
        enable: Some(EnableBit {
            reg: HW_POWER_VDDMEMCTRL,
            mask: 1 << 8,
            inverted: false,
        }),
        vsel_mask: 0x1f,
        range: Some(LinearRange {
            min_uv,
            step_uv,
            n_voltages: 0x20,
        }),
        disable_fet_mask: 0,
        linreg_offset: NO_FIELD,
        bo_offset: None,
        brownout: None,
        source: Some(SourceKind::Vddmem),
        ops: VDDMEM_OPS,
    }
}

static IMX23_RAILS: [Rail; 5] = [DCDC, vddio(0x20, 25_000), VDDA, VDDD, vddmem(1_700_000, 50_000)];
static IMX28_RAILS: [Rail; 5] = [DCDC, vddio(0x11, 50_000), VDDA, VDDD, vddmem(1_100_000, 25_000)];

impl Chip {
    /// Descriptor table, indexed in [`RailId::ALL`] order.
    pub fn rails(self) -> &'static [Rail; 5] {
        match self {
            Chip::Imx23 => &IMX23_RAILS,
            Chip::Imx28 => &IMX28_RAILS,
        }
    }

    pub fn rail(self, id: RailId) -> &'static Rail {
        &self.rails()[id as usize]
    }
}

impl Rail {
    /// Current selector encoded in a control register value.
    pub fn selector(&self, ctrl: u32) -> u32 {
        ctrl & self.vsel_mask
    }

    pub fn list_voltage(&self, selector: u32) -> Option<u32> {
        self.range?.voltage(selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_indexed_by_rail_id() {
        for chip in [Chip::Imx23, Chip::Imx28] {
            for id in RailId::ALL {
                assert_eq!(chip.rail(id).id, id);
            }
        }
    }

    #[test]
    fn vddio_range_differs_between_chips() {
        let mx23 = Chip::Imx23.rail(RailId::Vddio).range.unwrap();
        let mx28 = Chip::Imx28.rail(RailId::Vddio).range.unwrap();

        assert_eq!(mx23.max_uv(), 3_575_000);
        assert_eq!(mx28.max_uv(), 3_600_000);
        assert_eq!(mx28.voltage(0x10), Some(3_600_000));
        assert_eq!(mx28.voltage(0x11), None);
    }

    #[test]
    fn voltage_is_strictly_increasing_and_fits_the_selector_field() {
        for chip in [Chip::Imx23, Chip::Imx28] {
            for rail in chip.rails().iter().filter(|r| r.range.is_some()) {
                let range = rail.range.unwrap();
                assert!(range.n_voltages - 1 <= rail.vsel_mask, "{}", rail.name);
                for sel in 1..range.n_voltages {
                    assert!(range.voltage(sel) > range.voltage(sel - 1));
                }
            }
        }
    }

    #[test]
    fn map_picks_lowest_selector_in_window() {
        let vddd = Chip::Imx28.rail(RailId::Vddd).range.unwrap();

        assert_eq!(vddd.map(1_200_000, 1_250_000), Some(16));
        assert_eq!(vddd.map(1_210_000, 1_250_000), Some(17));
        assert_eq!(vddd.map(1_210_000, 1_220_000), None);
        assert_eq!(vddd.map(0, 800_000), Some(0));
        assert_eq!(vddd.map(2_000_000, 3_000_000), None);
    }

    #[test]
    fn vddio_enable_bit_is_inverted() {
        let enable = Chip::Imx28.rail(RailId::Vddio).enable.unwrap();
        assert!(enable.is_on(0));
        assert!(!enable.is_on(v5ctrl::ILIMIT_EQ_ZERO));
    }
}
