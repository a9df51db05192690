use embedded_hal_1::delay::DelayNs;

use super::rail::{Rail, RailId};
use super::source::RegulatorStatus;
use super::{Error, PowerController};
use crate::regs::RegisterPort;
use crate::time::Monotonic;

/// Operations a regulator framework drives a rail through.
///
/// Capabilities a rail lacks return [`Error::Unsupported`] (or `None` for the pure
/// lookups) without touching the hardware.
pub trait Regulator {
    type Error;

    fn rail(&self) -> &'static Rail;

    fn list_voltage(&self, selector: u32) -> Option<u32> {
        let rail = self.rail();
        if !rail.ops.list_voltage {
            return None;
        }
        rail.list_voltage(selector)
    }

    fn map_voltage(&self, min_uv: u32, max_uv: u32) -> Option<u32> {
        let rail = self.rail();
        if !rail.ops.list_voltage {
            return None;
        }
        rail.range?.map(min_uv, max_uv)
    }

    fn set_voltage_sel(&mut self, selector: u32) -> Result<(), Self::Error>;

    fn get_voltage_sel(&mut self) -> Result<u32, Self::Error>;

    fn is_enabled(&mut self) -> Result<bool, Self::Error>;

    fn get_status(&mut self) -> Result<RegulatorStatus, Self::Error>;
}

/// One rail of a [`PowerController`], borrowed for the regulator framework.
pub struct RailRegulator<'a, P, D> {
    pmu: &'a mut PowerController<P, D>,
    id: RailId,
}

impl<'a, P, D> RailRegulator<'a, P, D> {
    pub(super) fn new(pmu: &'a mut PowerController<P, D>, id: RailId) -> Self {
        Self { pmu, id }
    }

    pub fn id(&self) -> RailId {
        self.id
    }
}

impl<P: RegisterPort, D: DelayNs + Monotonic> RailRegulator<'_, P, D> {
    fn require(&self, supported: bool) -> Result<(), Error<P::Error>> {
        if supported {
            Ok(())
        } else {
            Err(Error::Unsupported { rail: self.id })
        }
    }
}

impl<P: RegisterPort, D: DelayNs + Monotonic> Regulator for RailRegulator<'_, P, D> {
    type Error = Error<P::Error>;

    fn rail(&self) -> &'static Rail {
        self.pmu.rail(self.id)
    }

    fn set_voltage_sel(&mut self, selector: u32) -> Result<(), Self::Error> {
        self.pmu.set_voltage(self.id, selector)
    }

    fn get_voltage_sel(&mut self) -> Result<u32, Self::Error> {
        self.pmu.get_voltage_sel(self.id)
    }

    fn is_enabled(&mut self) -> Result<bool, Self::Error> {
        self.require(self.rail().ops.is_enabled)?;
        Ok(self.pmu.is_enabled(self.id))
    }

    fn get_status(&mut self) -> Result<RegulatorStatus, Self::Error> {
        self.require(self.rail().ops.get_status)?;
        Ok(self.pmu.get_status(self.id))
    }
}
