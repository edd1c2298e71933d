use std::fmt;

use crate::adb::{Adb, AdbDevice};
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::fastboot::{parse, Fastboot};
use crate::mode::{self, Device};

/// Bootloader-mode descriptor for one physical device. The bootloader
/// reports no attributes at enumeration time, so this carries the serial
/// only; the product is queried live when needed.
#[derive(Clone)]
pub struct FastbootDevice<'a> {
    serial: String,
    fastboot: &'a Fastboot,
}

impl fmt::Debug for FastbootDevice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FastbootDevice")
            .field("serial", &self.serial)
            .finish_non_exhaustive()
    }
}

impl<'a> FastbootDevice<'a> {
    pub(crate) fn from_serial(serial: impl Into<String>, fastboot: &'a Fastboot) -> Self {
        Self {
            serial: serial.into(),
            fastboot,
        }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Runs a tool command addressed to this device. Also the escape hatch
    /// for bootloader commands this type does not wrap.
    pub fn run(&self, args: &[&str]) -> Result<String> {
        let mut full: Vec<&str> = vec!["-s", &self.serial];
        full.extend_from_slice(args);
        self.fastboot.tool().run(&full)
    }

    /// Live `getvar product` query; doubles as the bootloader-mode readiness
    /// probe.
    pub fn product(&self) -> Result<String> {
        let output = self.run(&["getvar", "product"])?;
        parse::parse_getvar_product(&output)
    }

    /// Resumes the interrupted normal boot without a reboot cycle.
    pub fn boot(&self) -> Result<()> {
        self.run(&["continue"]).map(|_| ())
    }

    /// Issues a plain reboot, then waits for the device to answer.
    pub fn reboot(&self, token: &CancelToken) -> Result<()> {
        self.run(&["reboot"])?;
        self.wait_until_ready(token)
    }

    /// Polls the product probe once per second until the bootloader answers
    /// or the token fires.
    pub fn wait_until_ready(&self, token: &CancelToken) -> Result<()> {
        mode::poll_ready(token, || self.product())
    }

    /// Boots back into normal mode and returns this device's normal-mode
    /// descriptor once it answers there.
    pub fn switch_to_adb<'b>(&self, adb: &'b Adb, token: &CancelToken) -> Result<AdbDevice<'b>> {
        mode::switch_to_adb(self, adb, token)
    }
}

impl Device for FastbootDevice<'_> {
    fn serial(&self) -> &str {
        FastbootDevice::serial(self)
    }

    fn product(&self) -> Result<String> {
        FastbootDevice::product(self)
    }

    fn reboot(&self, token: &CancelToken) -> Result<()> {
        FastbootDevice::reboot(self, token)
    }

    fn wait_until_ready(&self, token: &CancelToken) -> Result<()> {
        FastbootDevice::wait_until_ready(self, token)
    }
}
