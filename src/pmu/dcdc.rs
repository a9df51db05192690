//! DC-DC switching clock.
//!
//! The converter clock comes either from the 24 MHz crystal or from a PLL derived
//! source selected by HW_POWER_MISC.FREQSEL. The switching frequency driving the power
//! inductor is that clock divided by 16.

use super::Error;
use crate::regs::{misc, RegisterPort, HW_POWER_MISC};
use crate::time::Hertz;

/// Frequency of the crystal path, used whenever SEL_PLLCLK is clear.
pub const XTAL_KHZ: u32 = 24_000;

// Recommended PLL derived sources; the remaining FREQSEL codes are reserved.
const FREQSEL_TABLE: [(u32, u32); 3] = [(19_200, 3), (20_000, 1), (24_000, 2)];

/// FREQSEL code for a supported clock frequency.
pub fn freqsel_for_khz(khz: u32) -> Option<u32> {
    FREQSEL_TABLE.iter().find(|(f, _)| *f == khz).map(|(_, sel)| *sel)
}

/// Effective DC-DC clock frequency encoded in a HW_POWER_MISC value.
pub fn decode_misc(value: u32) -> Option<u32> {
    if value & misc::SEL_PLLCLK == 0 {
        return Some(XTAL_KHZ);
    }

    let sel = (value & misc::FREQSEL) >> misc::FREQSEL_SHIFT;
    FREQSEL_TABLE.iter().find(|(_, s)| *s == sel).map(|(f, _)| *f)
}

/// Program the DC-DC clock to `khz` (19200, 20000 or 24000).
///
/// FREQSEL is written with the PLL deselected first, and only the second write
/// switches the source over, so the divider is settled before it is used.
pub fn set_switching_frequency<P: RegisterPort>(port: &mut P, khz: u32) -> Result<(), Error<P::Error>> {
    let Some(sel) = freqsel_for_khz(khz) else {
        warn!("dcdc: switching frequency {} kHz not supported", khz);
        return Err(Error::InvalidFrequency { khz });
    };

    let mut value = port.read(HW_POWER_MISC).map_err(Error::Bus)?;
    value &= !(misc::FREQSEL | misc::SEL_PLLCLK);
    value |= sel << misc::FREQSEL_SHIFT;

    port.write(HW_POWER_MISC, value).map_err(Error::Bus)?;
    port.write(HW_POWER_MISC, value | misc::SEL_PLLCLK).map_err(Error::Bus)?;

    debug!("dcdc: clock set to {} kHz (MISC={:#x})", khz, value | misc::SEL_PLLCLK);
    Ok(())
}

/// [`set_switching_frequency`] for a frequency given in Hz. Anything that is not a whole
/// number of kHz is rejected; the error reports it rounded down.
pub fn set_switching_clock<P: RegisterPort>(port: &mut P, freq: Hertz) -> Result<(), Error<P::Error>> {
    if freq.0 % 1_000 != 0 {
        warn!("dcdc: switching frequency {} Hz not supported", freq.0);
        return Err(Error::InvalidFrequency { khz: freq.to_khz() });
    }
    set_switching_frequency(port, freq.to_khz())
}

/// Read back the effective DC-DC clock. `None` if FREQSEL holds a reserved code.
pub fn get_switching_frequency<P: RegisterPort>(port: &mut P) -> Result<Option<u32>, P::Error> {
    Ok(decode_misc(port.read(HW_POWER_MISC)?))
}
