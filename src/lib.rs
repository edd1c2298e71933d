pub mod adb;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod error;
pub mod fastboot;
pub mod logging;
pub mod mode;
#[cfg(all(test, unix))]
pub(crate) mod testutil;

pub use adb::{Adb, AdbDevice, DeviceEntry};
pub use cancel::CancelToken;
pub use cli::output::BufferedOutput;
pub use cli::{CommandTool, TraceSink, TracingSink};
pub use config::{load_config, save_config, BridgeConfig, ToolSettings};
pub use error::{BridgeError, Result};
pub use fastboot::{Fastboot, FastbootDevice};
pub use mode::{switch_to_adb, switch_to_fastboot, Device};
