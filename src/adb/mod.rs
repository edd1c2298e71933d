pub mod device;
pub mod parse;

pub use device::AdbDevice;
pub use parse::DeviceEntry;

use std::sync::Arc;

use crate::cli::{CommandTool, TraceSink};
use crate::error::Result;

/// Client for the normal-mode tool. Long-lived; every descriptor enumerated
/// from it borrows the client.
pub struct Adb {
    tool: CommandTool,
}

impl Adb {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            tool: CommandTool::new(path),
        }
    }

    pub fn with_sink(path: impl Into<String>, sink: Arc<dyn TraceSink>) -> Self {
        Self {
            tool: CommandTool::with_sink(path, sink),
        }
    }

    pub fn path(&self) -> &str {
        self.tool.path()
    }

    pub fn check(&self) -> Result<()> {
        self.tool.check()
    }

    /// Starts the background server. Construction never starts it implicitly.
    pub fn start(&self) -> Result<()> {
        self.tool.run(&["start-server"]).map(|_| ())
    }

    pub fn stop(&self) -> Result<()> {
        self.tool.run(&["kill-server"]).map(|_| ())
    }

    pub fn version(&self) -> Result<String> {
        let output = self.tool.run(&["version"])?;
        parse::parse_version(&output)
    }

    /// Devices currently visible in normal mode, in the tool's emission order.
    pub fn devices(&self) -> Result<Vec<AdbDevice<'_>>> {
        let output = self.tool.run(&["devices", "-l"])?;
        Ok(parse::parse_devices(&output)
            .into_iter()
            .map(|entry| AdbDevice::from_entry(entry, self))
            .collect())
    }

    pub(crate) fn tool(&self) -> &CommandTool {
        &self.tool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;

    #[cfg(unix)]
    #[test]
    fn devices_parses_fake_tool_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let adb_path = crate::testutil::fake_tool(
            &dir,
            "adb",
            r#"if [ "$1" = "devices" ]; then
  printf '* daemon not running; starting now at tcp:5037\n'
  printf 'List of devices attached\n'
  printf 'SER123 device product:foo model:bar device:baz\n'
  printf 'SER456 device\n'
  exit 0
fi
exit 1"#,
        );
        let adb = Adb::new(adb_path.to_string_lossy().to_string());
        let devices = adb.devices().expect("devices");
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].serial(), "SER123");
        assert_eq!(devices[0].entry().product.as_deref(), Some("foo"));
        assert_eq!(devices[0].entry().model.as_deref(), Some("bar"));
        assert_eq!(devices[1].serial(), "SER456");
        assert_eq!(devices[1].entry().model, None);
    }

    #[cfg(unix)]
    #[test]
    fn version_strips_the_banner_prefix() {
        let dir = tempfile::tempdir().expect("tempdir");
        let adb_path = crate::testutil::fake_tool(
            &dir,
            "adb",
            "printf 'Android Debug Bridge version 1.0.41\\nInstalled as /usr/bin/adb\\n'",
        );
        let adb = Adb::new(adb_path.to_string_lossy().to_string());
        assert_eq!(adb.version().expect("version"), "1.0.41");
    }

    #[cfg(unix)]
    #[test]
    fn server_lifecycle_sends_the_expected_subcommands() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = dir.path().join("args.log");
        let script = crate::testutil::argv_logger(&log);
        let adb_path = crate::testutil::fake_tool(&dir, "adb", &script);
        let adb = Adb::new(adb_path.to_string_lossy().to_string());

        adb.start().expect("start");
        adb.stop().expect("stop");

        let logged = std::fs::read_to_string(&log).expect("read log");
        let lines: Vec<&str> = logged.lines().collect();
        assert_eq!(lines, vec!["start-server", "kill-server"]);
    }

    #[cfg(unix)]
    #[test]
    fn failed_enumeration_surfaces_command_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let adb_path =
            crate::testutil::fake_tool(&dir, "adb", "echo 'cannot connect to daemon' >&2; exit 1");
        let adb = Adb::new(adb_path.to_string_lossy().to_string());
        let err = adb.devices().expect_err("enumeration should fail");
        match err {
            BridgeError::CommandFailed { code, output, .. } => {
                assert_eq!(code, Some(1));
                assert!(output.contains("cannot connect to daemon"), "{output}");
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }
}
