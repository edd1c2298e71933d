use std::thread;
use std::time::Duration;

use crate::adb::{Adb, AdbDevice};
use crate::cancel::CancelToken;
use crate::error::{BridgeError, Result};
use crate::fastboot::{Fastboot, FastbootDevice};

/// One probe attempt per interval while waiting for a device to answer in
/// its target mode.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Capability surface shared by both mode descriptors, for callers that
/// follow a device across transitions without caring which mode it is in.
pub trait Device {
    fn serial(&self) -> &str;
    fn product(&self) -> Result<String>;
    fn reboot(&self, token: &CancelToken) -> Result<()>;
    fn wait_until_ready(&self, token: &CancelToken) -> Result<()>;
}

/// Probes until one attempt succeeds or the token fires.
///
/// The token is checked ahead of each sleep-and-probe round, so an already
/// expired token returns `Cancelled` without probing at all. Individual
/// probe failures are expected while the device is mid-reboot and are never
/// surfaced; only the token bounds the wait.
pub(crate) fn poll_ready<T, F>(token: &CancelToken, mut probe: F) -> Result<()>
where
    F: FnMut() -> Result<T>,
{
    loop {
        if token.is_cancelled() {
            return Err(BridgeError::Cancelled);
        }
        thread::sleep(POLL_INTERVAL);
        if probe().is_ok() {
            return Ok(());
        }
    }
}

/// Moves a normal-mode device into the bootloader. The target tool is
/// precondition-checked before anything touches the device, and only a
/// successful reboot command constructs the target descriptor and starts
/// polling it. The serial carries over unchanged.
pub fn switch_to_fastboot<'f>(
    device: &AdbDevice<'_>,
    fastboot: &'f Fastboot,
    token: &CancelToken,
) -> Result<FastbootDevice<'f>> {
    fastboot.check()?;
    device.wait_until_ready(token)?;
    device.run(&["reboot", "bootloader"])?;
    let target = FastbootDevice::from_serial(device.serial(), fastboot);
    target.wait_until_ready(token)?;
    Ok(target)
}

/// Inverse of [`switch_to_fastboot`]: `continue` resumes the interrupted
/// normal boot, then the normal-mode client is polled until the device
/// answers there.
pub fn switch_to_adb<'a>(
    device: &FastbootDevice<'_>,
    adb: &'a Adb,
    token: &CancelToken,
) -> Result<AdbDevice<'a>> {
    adb.check()?;
    device.wait_until_ready(token)?;
    device.run(&["continue"])?;
    let target = AdbDevice::from_serial(device.serial(), adb);
    target.wait_until_ready(token)?;
    Ok(target)
}
