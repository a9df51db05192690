//! Time units and time sources.

use core::fmt::Display;

use embassy_time::Instant;

/// Hertz
#[derive(PartialEq, PartialOrd, Clone, Copy, Debug, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hertz(pub u32);

impl Display for Hertz {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} Hz", self.0)
    }
}

impl Hertz {
    /// Create a `Hertz` from the given hertz.
    pub const fn hz(hertz: u32) -> Self {
        Self(hertz)
    }

    /// Create a `Hertz` from the given kilohertz.
    pub const fn khz(kilohertz: u32) -> Self {
        Self(kilohertz * 1_000)
    }

    /// Create a `Hertz` from the given megahertz.
    pub const fn mhz(megahertz: u32) -> Self {
        Self(megahertz * 1_000_000)
    }

    /// Value in whole kilohertz, rounded down.
    pub const fn to_khz(self) -> u32 {
        self.0 / 1_000
    }
}

/// This is a convenience shortcut for [`Hertz::hz`]
pub const fn hz(hertz: u32) -> Hertz {
    Hertz::hz(hertz)
}

/// This is a convenience shortcut for [`Hertz::khz`]
pub const fn khz(kilohertz: u32) -> Hertz {
    Hertz::khz(kilohertz)
}

/// This is a convenience shortcut for [`Hertz::mhz`]
pub const fn mhz(megahertz: u32) -> Hertz {
    Hertz::mhz(megahertz)
}

/// A monotonic clock.
///
/// Only used to pace diagnostics; it never bounds a hardware wait.
pub trait Monotonic {
    fn now(&mut self) -> Instant;
}

impl<T: Monotonic + ?Sized> Monotonic for &mut T {
    fn now(&mut self) -> Instant {
        T::now(self)
    }
}

/// Delay and clock source backed by the embassy time driver.
#[cfg(feature = "time")]
#[derive(Clone, Copy, Default)]
pub struct EmbassyClock;

#[cfg(feature = "time")]
impl embedded_hal_1::delay::DelayNs for EmbassyClock {
    fn delay_ns(&mut self, ns: u32) {
        embassy_time::block_for(embassy_time::Duration::from_nanos(ns as u64));
    }

    fn delay_us(&mut self, us: u32) {
        embassy_time::block_for(embassy_time::Duration::from_micros(us as u64));
    }

    fn delay_ms(&mut self, ms: u32) {
        embassy_time::block_for(embassy_time::Duration::from_millis(ms as u64));
    }
}

#[cfg(feature = "time")]
impl embedded_hal_async::delay::DelayNs for EmbassyClock {
    async fn delay_ns(&mut self, ns: u32) {
        embassy_time::Timer::after_nanos(ns as u64).await
    }

    async fn delay_us(&mut self, us: u32) {
        embassy_time::Timer::after_micros(us as u64).await
    }

    async fn delay_ms(&mut self, ms: u32) {
        embassy_time::Timer::after_millis(ms as u64).await
    }
}

#[cfg(feature = "time")]
impl Monotonic for EmbassyClock {
    fn now(&mut self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Clock that only moves when somebody waits on it.

    use std::vec::Vec;

    use embassy_time::Instant;

    use super::Monotonic;

    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub(crate) enum Wait {
        Ns(u32),
        Us(u32),
        Ms(u32),
    }

    #[derive(Default)]
    pub(crate) struct FakeClock {
        now_ns: u64,
        pub(crate) waits: Vec<Wait>,
    }

    impl FakeClock {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn advance_ms(&mut self, ms: u64) {
            self.now_ns += ms * 1_000_000;
        }

        pub(crate) fn count(&self, wait: Wait) -> usize {
            self.waits.iter().filter(|w| **w == wait).count()
        }

        fn wait(&mut self, wait: Wait) {
            self.now_ns += match wait {
                Wait::Ns(ns) => ns as u64,
                Wait::Us(us) => us as u64 * 1_000,
                Wait::Ms(ms) => ms as u64 * 1_000_000,
            };
            self.waits.push(wait);
        }
    }

    impl Monotonic for FakeClock {
        fn now(&mut self) -> Instant {
            Instant::from_micros(self.now_ns / 1_000)
        }
    }

    impl embedded_hal_1::delay::DelayNs for FakeClock {
        fn delay_ns(&mut self, ns: u32) {
            self.wait(Wait::Ns(ns));
        }

        fn delay_us(&mut self, us: u32) {
            self.wait(Wait::Us(us));
        }

        fn delay_ms(&mut self, ms: u32) {
            self.wait(Wait::Ms(ms));
        }
    }

    impl embedded_hal_async::delay::DelayNs for FakeClock {
        async fn delay_ns(&mut self, ns: u32) {
            self.wait(Wait::Ns(ns));
        }

        async fn delay_us(&mut self, us: u32) {
            self.wait(Wait::Us(us));
        }

        async fn delay_ms(&mut self, ms: u32) {
            self.wait(Wait::Ms(ms));
        }
    }
}
