//! HW_POWER register bank access.
//!
//! Every MXS (i.MX23/i.MX28) register block uses the STMP addressing convention: each
//! 32-bit register at offset `n` has three write-only aliases at `n + 0x4` (SET),
//! `n + 0x8` (CLR) and `n + 0xc` (TOG). Writing a mask to an alias sets, clears or
//! toggles exactly those bits without a read-modify-write cycle.
//!
//! [`RegisterPort`] is the seam between the power management logic and whatever
//! provides the registers: [`Mmio`] for the real block, or a scripted bank in tests.

use core::convert::Infallible;
use core::fmt::Debug;

/// Offset of the SET alias relative to a register.
pub const SET_OFFSET: u32 = 0x4;
/// Offset of the CLR alias relative to a register.
pub const CLR_OFFSET: u32 = 0x8;
/// Offset of the TOG alias relative to a register.
pub const TOG_OFFSET: u32 = 0xc;

// Register offsets inside the HW_POWER block.
pub const HW_POWER_CTRL: u32 = 0x0000;
pub const HW_POWER_5VCTRL: u32 = 0x0010;
pub const HW_POWER_VDDDCTRL: u32 = 0x0040;
pub const HW_POWER_VDDACTRL: u32 = 0x0050;
pub const HW_POWER_VDDIOCTRL: u32 = 0x0060;
pub const HW_POWER_VDDMEMCTRL: u32 = 0x0070;
pub const HW_POWER_DCDC4P2: u32 = 0x0080;
pub const HW_POWER_MISC: u32 = 0x0090;
pub const HW_POWER_STS: u32 = 0x00c0;
pub const HW_POWER_RESET: u32 = 0x0100;

/// HW_POWER_CTRL bits.
pub mod ctrl {
    pub const VDDIO_BO_IRQ: u32 = 1 << 11;
    pub const ENIRQ_VDDIO_BO: u32 = 1 << 10;
    pub const VDDA_BO_IRQ: u32 = 1 << 9;
    pub const ENIRQ_VDDA_BO: u32 = 1 << 8;
    pub const VDDD_BO_IRQ: u32 = 1 << 7;
    pub const ENIRQ_VDDD_BO: u32 = 1 << 6;
    pub const POLARITY_VBUSVALID: u32 = 1 << 5;
    pub const VBUSVALID_IRQ: u32 = 1 << 4;
    pub const ENIRQ_VBUS_VALID: u32 = 1 << 3;
}

/// HW_POWER_5VCTRL bits.
pub mod v5ctrl {
    pub const VBUSVALID_THRESH: u32 = 7 << 8;
    pub const PWDN_5VBRNOUT: u32 = 1 << 7;
    pub const ENABLE_LINREG_ILIMIT: u32 = 1 << 6;
    pub const VBUSVALID_5VDETECT: u32 = 1 << 4;
    pub const ILIMIT_EQ_ZERO: u32 = 1 << 2;
    pub const ENABLE_DCDC: u32 = 1 << 0;
}

/// HW_POWER_STS bits.
pub mod sts {
    pub const VBUSVALID0_STATUS: u32 = 1 << 15;
    pub const DC_OK: u32 = 1 << 9;
    pub const VDD5V_DROOP: u32 = 1 << 4;
}

/// HW_POWER_MISC bits.
pub mod misc {
    pub const FREQSEL_SHIFT: u32 = 4;
    pub const FREQSEL: u32 = 7 << FREQSEL_SHIFT;
    pub const SEL_PLLCLK: u32 = 1 << 0;
}

/// Access to a bank of 32-bit control/status registers addressed by byte offset.
///
/// Implementations only need [`read`](RegisterPort::read) and
/// [`write`](RegisterPort::write); the alias helpers are derived from them.
pub trait RegisterPort {
    /// Error reported by the underlying bus. MMIO cannot fail and uses [`Infallible`].
    type Error: Debug;

    /// Read the register at `offset`.
    fn read(&mut self, offset: u32) -> Result<u32, Self::Error>;

    /// Write `value` to the register (or alias) at `offset`.
    fn write(&mut self, offset: u32, value: u32) -> Result<(), Self::Error>;

    /// Set `mask` bits of the register at `offset` through its SET alias.
    fn set_bits(&mut self, offset: u32, mask: u32) -> Result<(), Self::Error> {
        self.write(offset + SET_OFFSET, mask)
    }

    /// Clear `mask` bits of the register at `offset` through its CLR alias.
    fn clear_bits(&mut self, offset: u32, mask: u32) -> Result<(), Self::Error> {
        self.write(offset + CLR_OFFSET, mask)
    }

    /// Toggle `mask` bits of the register at `offset` through its TOG alias.
    fn toggle_bits(&mut self, offset: u32, mask: u32) -> Result<(), Self::Error> {
        self.write(offset + TOG_OFFSET, mask)
    }

    /// Replace the `mask` bits of the register at `offset` with `value`, keeping the
    /// others. This is a plain read-modify-write and must not race with other writers
    /// of the same register.
    fn update_bits(&mut self, offset: u32, mask: u32, value: u32) -> Result<(), Self::Error> {
        let old = self.read(offset)?;
        self.write(offset, (old & !mask) | (value & mask))
    }
}

impl<T: RegisterPort + ?Sized> RegisterPort for &mut T {
    type Error = T::Error;

    fn read(&mut self, offset: u32) -> Result<u32, Self::Error> {
        T::read(self, offset)
    }

    fn write(&mut self, offset: u32, value: u32) -> Result<(), Self::Error> {
        T::write(self, offset, value)
    }
}

/// Memory-mapped HW_POWER block.
pub struct Mmio {
    base: usize,
}

// Only the owner of the `Mmio` value touches the block.
unsafe impl Send for Mmio {}

impl Mmio {
    /// i.MX23 and i.MX28 both map HW_POWER at this physical address.
    pub const HW_POWER_BASE: usize = 0x8004_4000;

    /// Create an accessor for a HW_POWER block mapped at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be the (virtual) address of a mapped HW_POWER block, and no other
    /// code may write the block while this value is alive.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    #[inline]
    fn ptr(&self, offset: u32) -> *mut u32 {
        (self.base + offset as usize) as *mut u32
    }
}

impl RegisterPort for Mmio {
    type Error = Infallible;

    #[inline]
    fn read(&mut self, offset: u32) -> Result<u32, Infallible> {
        // SAFETY: `new` requires `base` to point at a mapped HW_POWER block.
        Ok(unsafe { core::ptr::read_volatile(self.ptr(offset)) })
    }

    #[inline]
    fn write(&mut self, offset: u32, value: u32) -> Result<(), Infallible> {
        // SAFETY: see `read`.
        unsafe { core::ptr::write_volatile(self.ptr(offset), value) };
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted register bank.

    use std::collections::{HashMap, HashSet, VecDeque};
    use std::vec::Vec;

    use super::*;

    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub(crate) struct BusError(pub u32);

    /// Emulates an STMP register bank: alias writes are decoded, every access is logged,
    /// and reads of a register can be scripted to return a sequence of values.
    #[derive(Default)]
    pub(crate) struct MockPort {
        regs: HashMap<u32, u32>,
        scripts: HashMap<u32, VecDeque<u32>>,
        reads: HashMap<u32, usize>,
        failing: HashSet<u32>,
        pub(crate) writes: Vec<(u32, u32)>,
    }

    impl MockPort {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn with(mut self, offset: u32, value: u32) -> Self {
            self.regs.insert(offset, value);
            self
        }

        /// Queue values returned by the next reads of `offset`, after which reads fall
        /// back to the stored register value, or fail if [`fail_reads`](Self::fail_reads)
        /// was called for it.
        pub(crate) fn script(&mut self, offset: u32, values: &[u32]) {
            self.scripts.entry(offset).or_default().extend(values.iter().copied());
        }

        pub(crate) fn fail_reads(&mut self, offset: u32) {
            self.failing.insert(offset);
        }

        pub(crate) fn value(&self, offset: u32) -> u32 {
            self.regs.get(&offset).copied().unwrap_or(0)
        }

        pub(crate) fn reads_of(&self, offset: u32) -> usize {
            self.reads.get(&offset).copied().unwrap_or(0)
        }

        pub(crate) fn total_reads(&self) -> usize {
            self.reads.values().sum()
        }

        pub(crate) fn clear_log(&mut self) {
            self.reads.clear();
            self.writes.clear();
        }
    }

    impl RegisterPort for MockPort {
        type Error = BusError;

        fn read(&mut self, offset: u32) -> Result<u32, BusError> {
            *self.reads.entry(offset).or_default() += 1;
            if let Some(v) = self.scripts.get_mut(&offset).and_then(|s| s.pop_front()) {
                return Ok(v);
            }
            if self.failing.contains(&offset) {
                return Err(BusError(offset));
            }
            Ok(self.value(offset))
        }

        fn write(&mut self, offset: u32, value: u32) -> Result<(), BusError> {
            self.writes.push((offset, value));
            let reg = offset & !0xf;
            let old = self.value(reg);
            let new = match offset & 0xf {
                SET_OFFSET => old | value,
                CLR_OFFSET => old & !value,
                TOG_OFFSET => old ^ value,
                _ => value,
            };
            self.regs.insert(reg, new);
            Ok(())
        }
    }
}
