use std::fmt;

use crate::adb::parse::{self, DeviceEntry};
use crate::adb::Adb;
use crate::cancel::CancelToken;
use crate::cli::output::BufferedOutput;
use crate::error::Result;
use crate::fastboot::{Fastboot, FastbootDevice};
use crate::mode::{self, Device};

/// Normal-mode descriptor for one physical device.
///
/// Holds the serial plus whatever attributes enumeration captured, and a
/// borrow of the owning client; the compiler keeps the client alive for as
/// long as any of its descriptors. Dropping a descriptor tears nothing down.
#[derive(Clone)]
pub struct AdbDevice<'a> {
    entry: DeviceEntry,
    adb: &'a Adb,
}

impl fmt::Debug for AdbDevice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdbDevice")
            .field("entry", &self.entry)
            .finish_non_exhaustive()
    }
}

impl<'a> AdbDevice<'a> {
    pub(crate) fn from_entry(entry: DeviceEntry, adb: &'a Adb) -> Self {
        Self { entry, adb }
    }

    pub(crate) fn from_serial(serial: impl Into<String>, adb: &'a Adb) -> Self {
        Self {
            entry: DeviceEntry {
                serial: serial.into(),
                product: None,
                model: None,
                device: None,
            },
            adb,
        }
    }

    pub fn serial(&self) -> &str {
        &self.entry.serial
    }

    /// Attributes captured at enumeration time. Descriptors built by a mode
    /// transition carry the serial only.
    pub fn entry(&self) -> &DeviceEntry {
        &self.entry
    }

    /// Runs a tool command addressed to this device.
    pub fn run(&self, args: &[&str]) -> Result<String> {
        let mut full: Vec<&str> = vec!["-s", &self.entry.serial];
        full.extend_from_slice(args);
        self.adb.tool().run(&full)
    }

    fn run_streamed(&self, token: &CancelToken, args: &[&str]) -> BufferedOutput {
        let mut full: Vec<&str> = vec!["-s", &self.entry.serial];
        full.extend_from_slice(args);
        self.adb.tool().run_streamed(token, &full)
    }

    fn getprop(&self, property: &str) -> Result<String> {
        Ok(self.run(&["shell", "getprop", property])?.trim().to_string())
    }

    /// Board code name (`ro.product.device`), queried live.
    pub fn product(&self) -> Result<String> {
        self.getprop("ro.product.device")
    }

    pub fn model(&self) -> Result<String> {
        self.getprop("ro.product.model")
    }

    pub fn os_version(&self) -> Result<String> {
        self.getprop("ro.build.version.release")
    }

    pub fn manufacturer(&self) -> Result<String> {
        self.getprop("ro.product.manufacturer")
    }

    /// Exact-name check against the installed package list.
    pub fn is_package_installed(&self, package: &str) -> Result<bool> {
        let output = self.run(&["shell", "pm", "list", "packages"])?;
        Ok(parse::package_listed(&output, package))
    }

    pub fn install(&self, package_path: &str, overwrite: bool) -> Result<()> {
        let mut args = vec!["install"];
        if overwrite {
            args.push("-r");
        }
        args.push(package_path);
        self.run(&args).map(|_| ())
    }

    pub fn uninstall(&self, package: &str) -> Result<()> {
        self.run(&["uninstall", package]).map(|_| ())
    }

    pub fn force_stop(&self, package: &str) -> Result<()> {
        self.run(&["shell", "am", "force-stop", package]).map(|_| ())
    }

    pub fn run_activity(&self, component: &str, extra: &[&str]) -> Result<()> {
        let mut args = vec!["shell", "am", "start", "-n", component];
        args.extend_from_slice(extra);
        self.run(&args).map(|_| ())
    }

    pub fn run_service(&self, component: &str, extra: &[&str]) -> Result<()> {
        let mut args = vec!["shell", "am", "startservice", "-n", component];
        args.extend_from_slice(extra);
        self.run(&args).map(|_| ())
    }

    pub fn pull(&self, remote: &str, local: &str) -> Result<()> {
        self.run(&["pull", remote, local]).map(|_| ())
    }

    pub fn push(&self, local: &str, remote: &str) -> Result<()> {
        self.run(&["push", local, remote]).map(|_| ())
    }

    pub fn delete_file(&self, remote: &str) -> Result<()> {
        self.run(&["shell", "rm", remote]).map(|_| ())
    }

    pub fn delete_dir(&self, remote: &str) -> Result<()> {
        self.run(&["shell", "rmdir", remote]).map(|_| ())
    }

    /// Quotes the path so directories with spaces survive the remote shell.
    pub fn create_dir(&self, remote: &str) -> Result<()> {
        let quoted = format!("\"{remote}\"");
        self.run(&["shell", "mkdir", "-p", &quoted]).map(|_| ())
    }

    /// Cheap readiness probe; also what the mode-transition poll uses.
    pub fn wake_up(&self) -> Result<()> {
        self.run(&["shell", "input", "keyevent", "KEYCODE_WAKEUP"])
            .map(|_| ())
    }

    pub fn list_directory(&self, directory: &str) -> Result<Vec<String>> {
        let output = self.run(&["shell", "ls", directory])?;
        Ok(parse::parse_ls_lines(&output))
    }

    pub fn is_file(&self, remote: &str) -> bool {
        self.run(&["shell", "ls", remote]).is_ok()
    }

    pub fn cat_file(&self, remote: &str) -> Result<String> {
        self.run(&["shell", "cat", remote])
    }

    /// Streams the device log until the token fires or the handle is
    /// dropped.
    pub fn logcat(&self, token: &CancelToken) -> BufferedOutput {
        self.run_streamed(token, &["logcat"])
    }

    /// `logcat -s <filter>` variant of [`AdbDevice::logcat`].
    pub fn logcat_filtered(&self, token: &CancelToken, filter: &str) -> BufferedOutput {
        self.run_streamed(token, &["logcat", "-s", filter])
    }

    pub fn set_permission(&self, grant: bool, package: &str, permission: &str) -> Result<()> {
        let action = if grant { "grant" } else { "revoke" };
        self.run(&["shell", "pm", action, package, permission])
            .map(|_| ())
    }

    /// Android 11 and later only; older releases ignore the secure setting.
    pub fn set_gps(&self, enabled: bool) -> Result<()> {
        let mode = if enabled { "3" } else { "0" };
        self.run(&["shell", "settings", "put", "secure", "location_mode", mode])
            .map(|_| ())
    }

    pub fn set_root(&self, root: bool) -> Result<()> {
        let command = if root { "root" } else { "unroot" };
        self.run(&[command]).map(|_| ())
    }

    /// Quoted like [`AdbDevice::create_dir`] so mount points with spaces
    /// survive.
    pub fn mount(&self, remote: &str) -> Result<()> {
        let quoted = format!("\"{remote}\"");
        self.run(&["shell", "service", "call", "mount", "90", "s16", &quoted])
            .map(|_| ())
    }

    pub fn chmod(&self, path: &str, mode: &str, recursive: bool) -> Result<()> {
        let mut args = vec!["shell", "chmod"];
        if recursive {
            args.push("-R");
        }
        args.push(mode);
        args.push(path);
        self.run(&args).map(|_| ())
    }

    /// Reboots back into normal mode and waits until the device answers.
    pub fn reboot(&self, token: &CancelToken) -> Result<()> {
        self.run(&["reboot"])?;
        self.wait_until_ready(token)
    }

    /// Polls the wake-up probe once per second until the device answers or
    /// the token fires.
    pub fn wait_until_ready(&self, token: &CancelToken) -> Result<()> {
        mode::poll_ready(token, || self.wake_up())
    }

    /// Reboots into the bootloader and returns this device's bootloader-mode
    /// descriptor once it answers there.
    pub fn switch_to_fastboot<'f>(
        &self,
        fastboot: &'f Fastboot,
        token: &CancelToken,
    ) -> Result<FastbootDevice<'f>> {
        mode::switch_to_fastboot(self, fastboot, token)
    }
}

impl Device for AdbDevice<'_> {
    fn serial(&self) -> &str {
        AdbDevice::serial(self)
    }

    fn product(&self) -> Result<String> {
        AdbDevice::product(self)
    }

    fn reboot(&self, token: &CancelToken) -> Result<()> {
        AdbDevice::reboot(self, token)
    }

    fn wait_until_ready(&self, token: &CancelToken) -> Result<()> {
        AdbDevice::wait_until_ready(self, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(unix)]
    use std::time::{Duration, Instant};

    #[cfg(unix)]
    fn logging_device(dir: &tempfile::TempDir, log: &std::path::Path) -> Adb {
        let script = crate::testutil::argv_logger(log);
        let path = crate::testutil::fake_tool(dir, "adb", &script);
        Adb::new(path.to_string_lossy().to_string())
    }

    #[cfg(unix)]
    fn logged_lines(log: &std::path::Path) -> Vec<String> {
        std::fs::read_to_string(log)
            .unwrap_or_default()
            .lines()
            .map(ToString::to_string)
            .collect()
    }

    #[cfg(unix)]
    #[test]
    fn commands_are_prefixed_with_the_serial_selector() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = dir.path().join("args.log");
        let adb = logging_device(&dir, &log);
        let device = AdbDevice::from_serial("SER1", &adb);

        device.force_stop("com.example.app").expect("force-stop");

        assert_eq!(
            logged_lines(&log),
            vec!["-s", "SER1", "shell", "am", "force-stop", "com.example.app"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn create_dir_quotes_the_remote_path_as_one_argument() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = dir.path().join("args.log");
        let adb = logging_device(&dir, &log);
        let device = AdbDevice::from_serial("SER1", &adb);

        device.create_dir("/sdcard/my dir").expect("create_dir");

        assert_eq!(
            logged_lines(&log),
            vec!["-s", "SER1", "shell", "mkdir", "-p", "\"/sdcard/my dir\""]
        );
    }

    #[cfg(unix)]
    #[test]
    fn install_adds_the_overwrite_flag_only_when_asked() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = dir.path().join("args.log");
        let adb = logging_device(&dir, &log);
        let device = AdbDevice::from_serial("SER1", &adb);

        device.install("/tmp/app.apk", true).expect("install -r");
        assert_eq!(
            logged_lines(&log),
            vec!["-s", "SER1", "install", "-r", "/tmp/app.apk"]
        );

        std::fs::write(&log, "").expect("clear log");
        device.install("/tmp/app.apk", false).expect("install");
        assert_eq!(logged_lines(&log), vec!["-s", "SER1", "install", "/tmp/app.apk"]);
    }

    #[cfg(unix)]
    #[test]
    fn property_queries_are_trimmed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = r#"case "$5" in
  ro.product.model) printf 'Pixel 7\r\n' ;;
  ro.product.device) printf 'panther\n' ;;
esac"#;
        let path = crate::testutil::fake_tool(&dir, "adb", script);
        let adb = Adb::new(path.to_string_lossy().to_string());
        let device = AdbDevice::from_serial("SER1", &adb);

        assert_eq!(device.model().expect("model"), "Pixel 7");
        assert_eq!(device.product().expect("product"), "panther");
    }

    #[cfg(unix)]
    #[test]
    fn package_check_matches_exact_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = "printf 'package:com.example.app\\r\\npackage:com.example.app2\\r\\n'";
        let path = crate::testutil::fake_tool(&dir, "adb", script);
        let adb = Adb::new(path.to_string_lossy().to_string());
        let device = AdbDevice::from_serial("SER1", &adb);

        assert!(device.is_package_installed("com.example.app").expect("query"));
        assert!(!device.is_package_installed("com.example.ap").expect("query"));
    }

    #[cfg(unix)]
    #[test]
    fn logcat_streams_until_cancelled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = r#"if [ "$3" = "logcat" ]; then
  printf 'I tag: first\n'
  printf 'I tag: second\n'
  sleep 30
fi"#;
        let path = crate::testutil::fake_tool(&dir, "adb", script);
        let adb = Adb::new(path.to_string_lossy().to_string());
        let device = AdbDevice::from_serial("SER1", &adb);

        let token = CancelToken::unbounded();
        let stream = device.logcat(&token);
        assert!(stream.start_error().is_none());

        let start = Instant::now();
        while !stream.stdout_snapshot().contains("second")
            && start.elapsed() < Duration::from_secs(5)
        {
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(stream.stdout_snapshot().contains("first"));
        assert!(stream.stdout_snapshot().contains("second"));

        token.cancel();
        let start = Instant::now();
        while stream.is_running() && start.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(50));
        }
        assert!(!stream.is_running(), "cancel should stop the stream");
        assert!(stream.stdout_snapshot().contains("first"));
    }
}
