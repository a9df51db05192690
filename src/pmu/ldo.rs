//! LDO voltage transitions.
//!
//! A selector change is written straight into the rail control register. When the
//! rail is fed by the DC-DC converter, the converter's control loop has to re-settle and
//! reports it through HW_POWER_STS.DC_OK, which is polled for a bounded time. The
//! rail's brownout interrupt is masked for the duration of the transition, because the
//! transient dip would otherwise trip it, and is restored on every exit path.

use embassy_time::Instant;
use embedded_hal_1::delay::DelayNs;

use super::rail::Rail;
use super::source::{classify, PowerSource, PowerStatusSnapshot};
use super::Error;
use crate::regs::{sts, RegisterPort, HW_POWER_CTRL, HW_POWER_STS};
use crate::time::Monotonic;
use crate::utils::RateLimit;

/// Settle time when the linear regulator alone drives the rail.
pub const LINREG_SETTLE_US: u32 = 1_000;
/// Delay before the first DC_OK poll, so the status bit has dropped.
pub const DC_OK_DROP_US: u32 = 15;
/// DC_OK poll budget.
pub const DC_OK_POLLS: u32 = 20;
pub const DC_OK_POLL_INTERVAL_US: u32 = 1;
/// Extra settle time after the DC_OK poll failed.
pub const TIMEOUT_SETTLE_MS: u32 = 20;

fn check_selector<E>(rail: &Rail, selector: u32) -> Result<(), Error<E>> {
    if !rail.ops.set_voltage_sel {
        return Err(Error::Unsupported { rail: rail.id });
    }
    match rail.range {
        Some(range) if range.contains(selector) && selector & !rail.vsel_mask == 0 => Ok(()),
        _ => Err(Error::InvalidSelector { rail: rail.id, selector }),
    }
}

/// Mask the rail's brownout interrupt. Returns HW_POWER_CTRL as it was before.
fn mask_brownout<P: RegisterPort>(port: &mut P, rail: &Rail) -> Result<u32, P::Error> {
    let saved_ctrl = port.read(HW_POWER_CTRL)?;
    if let Some(bo) = rail.brownout {
        port.clear_bits(HW_POWER_CTRL, bo.enirq)?;
    }
    Ok(saved_ctrl)
}

/// Write the selector, then classify the rail with the new setting in place.
fn write_selector<P: RegisterPort>(port: &mut P, rail: &Rail, selector: u32) -> Result<PowerSource, P::Error> {
    port.update_bits(rail.ctrl_reg, rail.vsel_mask, selector)?;

    let source = match PowerStatusSnapshot::read(port, rail) {
        Ok(snap) => classify(rail, &snap),
        Err(_) => PowerSource::UnknownSource,
    };
    trace!("{}: selector {:#x} written, source {:?}", rail.name, selector, source);
    Ok(source)
}

/// Drop any brownout latched during the transition and put the interrupt enable back
/// the way it was, whatever `result` is.
fn restore_brownout<P: RegisterPort>(
    port: &mut P,
    rail: &Rail,
    saved_ctrl: u32,
    result: Result<(), Error<P::Error>>,
) -> Result<(), Error<P::Error>> {
    let Some(bo) = rail.brownout else {
        return result;
    };

    let mut restored = port.clear_bits(HW_POWER_CTRL, bo.irq);
    if saved_ctrl & bo.enirq != 0 {
        restored = restored.and(port.set_bits(HW_POWER_CTRL, bo.enirq));
    }

    result?;
    restored.map_err(Error::Bus)
}

/// Error for a poll loop that ended without DC_OK. Timeouts are logged, rate limited.
fn poll_failed<E>(rail: &Rail, status: u32, bus_error: Option<E>, limit: &mut RateLimit, now: Instant) -> Error<E> {
    if let Some(e) = bus_error {
        return Error::Bus(e);
    }
    if let Some(suppressed) = limit.check(now) {
        if suppressed > 0 {
            warn!("{}: {} DC_OK timeouts suppressed", rail.name, suppressed);
        }
        warn!("{}: DC_OK timeout status={:#x}", rail.name, status);
    }
    Error::Timeout { rail: rail.id, status }
}

/// Move `rail` to `selector`, blocking until the output is confirmed stable.
///
/// An invalid selector is rejected before any register access. A timeout leaves the
/// new selector in place.
pub fn set_voltage_sel<P, D>(
    port: &mut P,
    delay: &mut D,
    limit: &mut RateLimit,
    rail: &Rail,
    selector: u32,
) -> Result<(), Error<P::Error>>
where
    P: RegisterPort,
    D: DelayNs + Monotonic,
{
    check_selector(rail, selector)?;
    let saved_ctrl = mask_brownout(port, rail).map_err(Error::Bus)?;

    let result = match write_selector(port, rail, selector) {
        Ok(source) if source.dcdc_loop_inactive() => {
            // DC_OK says nothing here, give the linear regulator time instead.
            delay.delay_us(LINREG_SETTLE_US);
            Ok(())
        }
        Ok(_) => {
            delay.delay_us(DC_OK_DROP_US);
            poll_dc_ok(port, delay, limit, rail)
        }
        Err(e) => Err(Error::Bus(e)),
    };

    restore_brownout(port, rail, saved_ctrl, result)
}

fn poll_dc_ok<P, D>(port: &mut P, delay: &mut D, limit: &mut RateLimit, rail: &Rail) -> Result<(), Error<P::Error>>
where
    P: RegisterPort,
    D: DelayNs + Monotonic,
{
    let mut status = 0;
    let mut bus_error = None;
    for _ in 0..DC_OK_POLLS {
        match port.read(HW_POWER_STS) {
            Ok(s) if s & sts::DC_OK != 0 => return Ok(()),
            Ok(s) => status = s,
            Err(e) => {
                bus_error = Some(e);
                break;
            }
        }
        delay.delay_us(DC_OK_POLL_INTERVAL_US);
    }

    let err = poll_failed(rail, status, bus_error, limit, delay.now());
    delay.delay_ms(TIMEOUT_SETTLE_MS);
    Err(err)
}

/// Async version of [`set_voltage_sel`]: the settle and poll waits yield to the
/// executor instead of spinning.
pub async fn set_voltage_sel_async<P, D>(
    port: &mut P,
    delay: &mut D,
    limit: &mut RateLimit,
    rail: &Rail,
    selector: u32,
) -> Result<(), Error<P::Error>>
where
    P: RegisterPort,
    D: embedded_hal_async::delay::DelayNs + Monotonic,
{
    check_selector(rail, selector)?;
    let saved_ctrl = mask_brownout(port, rail).map_err(Error::Bus)?;

    let result = match write_selector(port, rail, selector) {
        Ok(source) if source.dcdc_loop_inactive() => {
            delay.delay_us(LINREG_SETTLE_US).await;
            Ok(())
        }
        Ok(_) => {
            delay.delay_us(DC_OK_DROP_US).await;
            poll_dc_ok_async(port, delay, limit, rail).await
        }
        Err(e) => Err(Error::Bus(e)),
    };

    restore_brownout(port, rail, saved_ctrl, result)
}

async fn poll_dc_ok_async<P, D>(
    port: &mut P,
    delay: &mut D,
    limit: &mut RateLimit,
    rail: &Rail,
) -> Result<(), Error<P::Error>>
where
    P: RegisterPort,
    D: embedded_hal_async::delay::DelayNs + Monotonic,
{
    let mut status = 0;
    let mut bus_error = None;
    for _ in 0..DC_OK_POLLS {
        match port.read(HW_POWER_STS) {
            Ok(s) if s & sts::DC_OK != 0 => return Ok(()),
            Ok(s) => status = s,
            Err(e) => {
                bus_error = Some(e);
                break;
            }
        }
        delay.delay_us(DC_OK_POLL_INTERVAL_US).await;
    }

    let err = poll_failed(rail, status, bus_error, limit, delay.now());
    delay.delay_ms(TIMEOUT_SETTLE_MS).await;
    Err(err)
}

/// Program the brownout trip point of `rail`, as an offset (0..=7) below its target.
pub fn set_brownout_offset<P: RegisterPort>(port: &mut P, rail: &Rail, offset: u32) -> Result<(), Error<P::Error>> {
    let Some(field) = rail.bo_offset else {
        return Err(Error::Unsupported { rail: rail.id });
    };
    if offset > field.max() {
        return Err(Error::InvalidOffset { offset });
    }

    port.update_bits(rail.ctrl_reg, field.mask, offset << field.shift)
        .map_err(Error::Bus)
}
