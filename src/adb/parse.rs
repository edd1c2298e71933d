use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Marker line the tool prints before the first device row.
pub const DEVICES_HEADER: &str = "List of devices attached";

const VERSION_PREFIX: &str = "Android Debug Bridge version ";

/// One row of `devices -l` output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceEntry {
    pub serial: String,
    pub product: Option<String>,
    pub model: Option<String>,
    pub device: Option<String>,
}

/// Parse `devices -l` output into ordered device entries.
///
/// Expected rows after the header:
/// - `0123456789ABCDEF device product:foo model:bar device:baz transport_id:1`
///
/// Everything up to and including the header is server startup chatter and
/// never produces an entry; without the header the whole output is chatter.
pub fn parse_devices(output: &str) -> Vec<DeviceEntry> {
    let lines: Vec<&str> = output.lines().map(str::trim).collect();
    let Some(header) = lines.iter().position(|line| *line == DEVICES_HEADER) else {
        return Vec::new();
    };
    lines[header + 1..]
        .iter()
        .filter(|line| !line.is_empty())
        .filter_map(|line| parse_device_row(line))
        .collect()
}

fn parse_device_row(line: &str) -> Option<DeviceEntry> {
    // Single-space split; the literal token `device` is the state marker the
    // tool appends to healthy rows, not data.
    let tokens: Vec<&str> = line
        .split(' ')
        .filter(|token| !token.trim().is_empty() && *token != "device")
        .collect();
    let (serial, attrs) = tokens.split_first()?;

    let mut product = None;
    let mut model = None;
    let mut device = None;
    for attr in attrs {
        if let Some(value) = attr.strip_prefix("product:") {
            product = Some(value.to_string());
        } else if let Some(value) = attr.strip_prefix("model:") {
            model = Some(value.to_string());
        } else if let Some(value) = attr.strip_prefix("device:") {
            device = Some(value.to_string());
        }
    }

    Some(DeviceEntry {
        serial: (*serial).to_string(),
        product,
        model,
        device,
    })
}

/// Extract the version token from the first line of `version` output.
///
/// Expected first line:
/// - `Android Debug Bridge version 1.0.41`
pub fn parse_version(output: &str) -> Result<String> {
    let first_line = output.lines().next().unwrap_or("").trim();
    let caps = version_regex()
        .captures(first_line)
        .ok_or_else(|| BridgeError::parse("adb version output", first_line))?;
    Ok(caps[1].to_string())
}

fn version_regex() -> Regex {
    Regex::new(&format!(r"^{VERSION_PREFIX}(\S+)")).expect("version regex should compile")
}

/// Exact-line match against `pm list packages` output. `com.foo.ba` must not
/// match a listed `com.foo.bar`.
pub fn package_listed(output: &str, package: &str) -> bool {
    let needle = format!("package:{}", package.trim());
    output.lines().any(|line| line.trim() == needle)
}

/// Non-empty trimmed lines of `shell ls` output.
pub fn parse_ls_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_in_order_with_attributes() {
        let output = "List of devices attached\n\
                      0123456789ABCDEF device product:foo model:bar device:baz transport_id:1\n\
                      emulator-5554 device product:sdk_gphone64_arm64 model:Pixel_7 device:emu64a\n";
        let parsed = parse_devices(output);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].serial, "0123456789ABCDEF");
        assert_eq!(parsed[0].product.as_deref(), Some("foo"));
        assert_eq!(parsed[0].model.as_deref(), Some("bar"));
        assert_eq!(parsed[0].device.as_deref(), Some("baz"));
        assert_eq!(parsed[1].serial, "emulator-5554");
        assert_eq!(parsed[1].model.as_deref(), Some("Pixel_7"));
    }

    #[test]
    fn startup_chatter_before_header_is_ignored() {
        let output = "* daemon not running; starting now at tcp:5037\n\
                      * daemon started successfully\n\
                      List of devices attached\n\
                      ABCD1234 device\n";
        let parsed = parse_devices(output);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].serial, "ABCD1234");
        assert_eq!(parsed[0].product, None);
    }

    #[test]
    fn rows_without_the_state_marker_still_enumerate() {
        let output = "List of devices attached\nemulator-5554 unauthorized\n";
        let parsed = parse_devices(output);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].serial, "emulator-5554");
    }

    #[test]
    fn marker_only_rows_produce_no_entry() {
        let output = "List of devices attached\ndevice\n   \n";
        assert!(parse_devices(output).is_empty());
    }

    #[test]
    fn empty_output_is_an_empty_set() {
        assert!(parse_devices("").is_empty());
        assert!(parse_devices("List of devices attached\n\n").is_empty());
    }

    #[test]
    fn output_without_the_header_yields_nothing() {
        let output = "* daemon not running; starting now at tcp:5037\n";
        assert!(parse_devices(output).is_empty());
    }

    #[test]
    fn parses_version_token_from_first_line() {
        let output = "Android Debug Bridge version 1.0.41\nInstalled as /usr/bin/adb\n";
        assert_eq!(parse_version(output).expect("version"), "1.0.41");
    }

    #[test]
    fn unrecognized_version_output_is_a_parse_error() {
        let err = parse_version("some unrelated banner\n").expect_err("should not parse");
        assert!(matches!(err, BridgeError::Parse { .. }), "{err:?}");
    }

    #[test]
    fn package_match_is_exact_not_prefix() {
        let output = "package:com.foo.bar\r\npackage:com.other.app\r\n";
        assert!(package_listed(output, "com.foo.bar"));
        assert!(!package_listed(output, "com.foo.ba"));
        assert!(!package_listed(output, "com.foo.bar.extra"));
    }

    #[test]
    fn ls_lines_drop_blank_rows() {
        let output = "Download\n\nfile.txt\r\n  \n";
        assert_eq!(parse_ls_lines(output), vec!["Download", "file.txt"]);
    }
}
