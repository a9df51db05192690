//! 5V (VBUS) presence.
//!
//! VBUSVALID edges are caught with a polarity-programmable interrupt: the polarity is
//! always set to look for the opposite of the current state. A pending IRQ or a status
//! that disagrees with the programmed polarity means the state changed since the last
//! acknowledge.

use crate::regs::{ctrl, sts, RegisterPort, HW_POWER_CTRL, HW_POWER_STS};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FiveVoltStatus {
    NewConnection,
    NewDisconnection,
    ExistingConnection,
    ExistingDisconnection,
}

impl FiveVoltStatus {
    pub fn is_connected(self) -> bool {
        matches!(self, FiveVoltStatus::NewConnection | FiveVoltStatus::ExistingConnection)
    }

    /// The state changed since the last [`acknowledge`].
    pub fn is_new(self) -> bool {
        matches!(self, FiveVoltStatus::NewConnection | FiveVoltStatus::NewDisconnection)
    }
}

/// Decode HW_POWER_CTRL and HW_POWER_STS.
pub fn decode(ctrl: u32, status: u32) -> FiveVoltStatus {
    let irq = ctrl & ctrl::VBUSVALID_IRQ != 0;
    let vbus = status & sts::VBUSVALID0_STATUS != 0;

    // Polarity set: waiting for a connection.
    if ctrl & ctrl::POLARITY_VBUSVALID != 0 {
        if irq || vbus {
            return FiveVoltStatus::NewConnection;
        }
        return FiveVoltStatus::ExistingDisconnection;
    }

    if irq || !vbus || status & sts::VDD5V_DROOP != 0 {
        return FiveVoltStatus::NewDisconnection;
    }

    FiveVoltStatus::ExistingConnection
}

pub fn status<P: RegisterPort>(port: &mut P) -> Result<FiveVoltStatus, P::Error> {
    let ctrl = port.read(HW_POWER_CTRL)?;
    let status = port.read(HW_POWER_STS)?;
    Ok(decode(ctrl, status))
}

/// Interrupt half of a VBUSVALID event: if the state changed, mask the interrupt until
/// [`acknowledge`] runs. Returns the new state, or `None` for a spurious interrupt.
pub fn mask_on_event<P: RegisterPort>(port: &mut P) -> Result<Option<FiveVoltStatus>, P::Error> {
    let state = status(port)?;
    match state {
        FiveVoltStatus::NewConnection => info!("New 5v connection detected"),
        FiveVoltStatus::NewDisconnection => info!("New 5v disconnection detected"),
        _ => return Ok(None),
    }

    port.clear_bits(HW_POWER_CTRL, ctrl::ENIRQ_VBUS_VALID)?;
    Ok(Some(state))
}

/// Re-arm VBUSVALID detection for the opposite edge, clear the latched interrupt and
/// unmask it.
pub fn acknowledge<P: RegisterPort>(port: &mut P) -> Result<FiveVoltStatus, P::Error> {
    let state = status(port)?;

    if state.is_connected() {
        port.clear_bits(HW_POWER_CTRL, ctrl::POLARITY_VBUSVALID)?;
    } else {
        port.set_bits(HW_POWER_CTRL, ctrl::POLARITY_VBUSVALID)?;
    }

    port.clear_bits(HW_POWER_CTRL, ctrl::VBUSVALID_IRQ)?;
    port.set_bits(HW_POWER_CTRL, ctrl::ENIRQ_VBUS_VALID)?;

    Ok(state)
}
