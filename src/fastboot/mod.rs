pub mod device;
pub mod parse;

pub use device::FastbootDevice;

use std::sync::Arc;

use crate::cli::{CommandTool, TraceSink};
use crate::error::Result;

/// Client for the bootloader-mode tool. Same shape as the normal-mode
/// client, without a server to manage.
pub struct Fastboot {
    tool: CommandTool,
}

impl Fastboot {
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

    /// Devices currently visible in bootloader mode, serial only, in the
    /// tool's emission order.
    pub fn devices(&self) -> Result<Vec<FastbootDevice<'_>>> {
        let output = self.tool.run(&["devices"])?;
        Ok(parse::parse_devices(&output)
            .into_iter()
            .map(|serial| FastbootDevice::from_serial(serial, self))
            .collect())
    }

    pub(crate) fn tool(&self) -> &CommandTool {
        &self.tool
    }
}
