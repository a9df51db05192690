//! Power Management Unit: DC-DC converter and on-chip LDO regulators.
//!
//! [`PowerController`] owns the HW_POWER register bank and a delay/clock source, and is
//! the only way to reach the hardware; holding `&mut PowerController` is what
//! serializes voltage transitions and classifications. Use [`SharedPowerController`] to
//! share one controller between contexts.
//!
//! ```ignore
//! use mxs_power::pmu::{Chip, Config, PowerController, RailId};
//! use mxs_power::regs::Mmio;
//! use mxs_power::time::{khz, EmbassyClock};
//!
//! let mut config = Config::default();
//! config.chip = Chip::Imx28;
//! config.switching_frequency = Some(khz(24_000));
//!
//! let port = unsafe { Mmio::new(Mmio::HW_POWER_BASE) };
//! let mut pmu = PowerController::new(port, EmbassyClock, config)?;
//! pmu.set_voltage(RailId::Vddd, 0x14)?;
//! ```

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_hal_1::delay::DelayNs;

use crate::regs::{v5ctrl, RegisterPort, HW_POWER_5VCTRL};
use crate::time::{Hertz, Monotonic};
use crate::utils::RateLimit;

pub mod dcdc;
mod ldo;
pub mod rail;
mod regulator;
pub mod source;
pub mod vbus;

pub use rail::{Chip, Rail, RailId};
pub use regulator::{RailRegulator, Regulator};
pub use source::{PowerSource, PowerStatusSnapshot, RegulatorStatus};
pub use vbus::FiveVoltStatus;

/// PMU error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Selector outside the rail's voltage range.
    InvalidSelector { rail: RailId, selector: u32 },
    /// DC-DC clock frequency (kHz) is not one of the supported values.
    InvalidFrequency { khz: u32 },
    /// Brownout offset does not fit the field.
    InvalidOffset { offset: u32 },
    /// DC_OK did not come up after a voltage change. `status` is the last HW_POWER_STS
    /// value read.
    Timeout { rail: RailId, status: u32 },
    /// The rail does not support the operation.
    Unsupported { rail: RailId },
    /// Register access failed.
    Bus(E),
}

/// PMU configuration.
#[non_exhaustive]
pub struct Config {
    pub chip: Chip,
    /// DC-DC converter clock to program at init; `None` keeps what the boot loader set.
    pub switching_frequency: Option<Hertz>,
    /// Clear HW_POWER_5VCTRL.ENABLE_LINREG_ILIMIT at init.
    pub disable_linreg_ilimit: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chip: Chip::Imx28,
            switching_frequency: None,
            disable_linreg_ilimit: true,
        }
    }
}

/// Power controller for one SoC instance.
pub struct PowerController<P, D> {
    port: P,
    delay: D,
    chip: Chip,
    timeout_log: RateLimit,
}

impl<P: RegisterPort, D: DelayNs + Monotonic> PowerController<P, D> {
    /// Take ownership of the register bank and bring the PMU into its configured state.
    pub fn new(port: P, delay: D, config: Config) -> Result<Self, Error<P::Error>> {
        let mut this = Self {
            port,
            delay,
            chip: config.chip,
            timeout_log: RateLimit::default(),
        };

        if config.disable_linreg_ilimit {
            this.port
                .clear_bits(HW_POWER_5VCTRL, v5ctrl::ENABLE_LINREG_ILIMIT)
                .map_err(Error::Bus)?;
        }

        if let Some(freq) = config.switching_frequency {
            match dcdc::set_switching_clock(&mut this.port, freq) {
                // Keep the boot setting, as for any other bad board description.
                Ok(()) | Err(Error::InvalidFrequency { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        match this.get_switching_frequency() {
            Some(khz) => info!("DCDC clock freq: {} kHz", khz),
            None => warn!("DCDC clock freq: unknown FREQSEL"),
        }

        match vbus::status(&mut this.port).map_err(Error::Bus)? {
            s if s.is_connected() => info!("5V = connected"),
            _ => info!("5V = disconnected"),
        }

        for rail in this.chip.rails().iter().filter(|r| r.source.is_some()) {
            let source = this.classify(rail.id);
            if source == PowerSource::UnknownSource {
                warn!("{}: Invalid power source", rail.name);
            } else {
                info!("{}: Current power source ({})", rail.name, source as u8);
            }
        }

        Ok(this)
    }

    pub fn chip(&self) -> Chip {
        self.chip
    }

    pub fn rail(&self, id: RailId) -> &'static Rail {
        self.chip.rail(id)
    }

    /// Read the registers `id` is classified from.
    pub fn snapshot(&mut self, id: RailId) -> Result<PowerStatusSnapshot, Error<P::Error>> {
        let rail = self.chip.rail(id);
        PowerStatusSnapshot::read(&mut self.port, rail).map_err(Error::Bus)
    }

    /// Current power source of `id`. A failed register read yields
    /// [`PowerSource::UnknownSource`].
    pub fn classify(&mut self, id: RailId) -> PowerSource {
        match self.snapshot(id) {
            Ok(snap) => source::classify(self.rail(id), &snap),
            Err(_) => PowerSource::UnknownSource,
        }
    }

    /// Whether the output of `id` is live. Rails with a classifier answer from their
    /// power source, the DC-DC converter from its enable bit. Errors read as disabled.
    pub fn is_enabled(&mut self, id: RailId) -> bool {
        let rail = self.rail(id);
        if rail.source.is_some() {
            return self.classify(id).is_enabled();
        }
        self.enable_bit(id).unwrap_or(false)
    }

    /// Raw state of the enable bit of `id`, with inverted polarity applied. `None` if the
    /// rail has no enable bit or the read failed.
    pub fn enable_bit(&mut self, id: RailId) -> Option<bool> {
        let enable = self.rail(id).enable?;
        self.port.read(enable.reg).ok().map(|v| enable.is_on(v))
    }

    pub fn get_status(&mut self, id: RailId) -> RegulatorStatus {
        if !self.rail(id).ops.get_status {
            return RegulatorStatus::Undefined;
        }
        self.classify(id).status()
    }

    pub fn list_voltage(&self, id: RailId, selector: u32) -> Option<u32> {
        self.rail(id).list_voltage(selector)
    }

    /// Lowest selector of `id` whose voltage lies in `[min_uv, max_uv]`.
    pub fn map_voltage(&self, id: RailId, min_uv: u32, max_uv: u32) -> Option<u32> {
        self.rail(id).range?.map(min_uv, max_uv)
    }

    pub fn get_voltage_sel(&mut self, id: RailId) -> Result<u32, Error<P::Error>> {
        let rail = self.rail(id);
        if !rail.ops.get_voltage_sel {
            return Err(Error::Unsupported { rail: id });
        }
        let ctrl = self.port.read(rail.ctrl_reg).map_err(Error::Bus)?;
        Ok(rail.selector(ctrl))
    }

    /// Current output target of `id` in microvolts.
    pub fn get_voltage(&mut self, id: RailId) -> Result<u32, Error<P::Error>> {
        let selector = self.get_voltage_sel(id)?;
        self.list_voltage(id, selector)
            .ok_or(Error::InvalidSelector { rail: id, selector })
    }

    /// Move `id` to `selector` and wait for the output to settle.
    ///
    /// The rail's brownout interrupt is masked for the transition and restored on every
    /// exit path. Rails fed by the linear regulator or an external supply get a fixed
    /// settle time, DC-DC fed rails are confirmed through HW_POWER_STS.DC_OK. An invalid
    /// selector is rejected before any register access, and a timeout leaves the new
    /// selector in place.
    pub fn set_voltage(&mut self, id: RailId, selector: u32) -> Result<(), Error<P::Error>> {
        let rail = self.chip.rail(id);
        ldo::set_voltage_sel(&mut self.port, &mut self.delay, &mut self.timeout_log, rail, selector)
    }

    pub fn set_brownout_offset(&mut self, id: RailId, offset: u32) -> Result<(), Error<P::Error>> {
        let rail = self.chip.rail(id);
        ldo::set_brownout_offset(&mut self.port, rail, offset)
    }

    /// Program the DC-DC clock; see [`dcdc::set_switching_frequency`].
    pub fn set_switching_frequency(&mut self, khz: u32) -> Result<(), Error<P::Error>> {
        dcdc::set_switching_frequency(&mut self.port, khz)
    }

    /// Effective DC-DC clock in kHz, `None` if unknown or unreadable.
    pub fn get_switching_frequency(&mut self) -> Option<u32> {
        dcdc::get_switching_frequency(&mut self.port).ok().flatten()
    }

    pub fn five_volt_status(&mut self) -> Result<FiveVoltStatus, Error<P::Error>> {
        vbus::status(&mut self.port).map_err(Error::Bus)
    }

    /// 5V supply present.
    pub fn ac_online(&mut self) -> Result<bool, Error<P::Error>> {
        Ok(self.five_volt_status()?.is_connected())
    }

    /// See [`vbus::mask_on_event`].
    pub fn mask_5v_irq(&mut self) -> Result<Option<FiveVoltStatus>, Error<P::Error>> {
        vbus::mask_on_event(&mut self.port).map_err(Error::Bus)
    }

    /// See [`vbus::acknowledge`].
    pub fn acknowledge_5v_event(&mut self) -> Result<FiveVoltStatus, Error<P::Error>> {
        vbus::acknowledge(&mut self.port).map_err(Error::Bus)
    }

    /// Regulator-framework view of one rail.
    pub fn regulator(&mut self, id: RailId) -> RailRegulator<'_, P, D> {
        RailRegulator::new(self, id)
    }
}

impl<P: RegisterPort, D: embedded_hal_async::delay::DelayNs + Monotonic> PowerController<P, D> {
    /// Like [`PowerController::set_voltage`], but the waits yield to the executor.
    pub async fn set_voltage_async(&mut self, id: RailId, selector: u32) -> Result<(), Error<P::Error>> {
        let rail = self.chip.rail(id);
        ldo::set_voltage_sel_async(&mut self.port, &mut self.delay, &mut self.timeout_log, rail, selector).await
    }
}

impl<P, D> PowerController<P, D> {
    /// Give back the register bank and delay source.
    pub fn release(self) -> (P, D) {
        (self.port, self.delay)
    }
}

/// A [`PowerController`] behind a blocking mutex, so that a classify-then-act sequence
/// never interleaves with another user of the shared HW_POWER registers.
pub struct SharedPowerController<M: RawMutex, P, D> {
    inner: Mutex<M, RefCell<PowerController<P, D>>>,
}

impl<M: RawMutex, P, D> SharedPowerController<M, P, D> {
    pub const fn new(pmu: PowerController<P, D>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(pmu)),
        }
    }

    /// Run `f` with exclusive access to the controller.
    ///
    /// # Panics
    ///
    /// If called again from inside `f`.
    pub fn lock<R>(&self, f: impl FnOnce(&mut PowerController<P, D>) -> R) -> R {
        self.inner.lock(|pmu| f(&mut pmu.borrow_mut()))
    }
}
