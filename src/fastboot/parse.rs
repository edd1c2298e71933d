use crate::error::{BridgeError, Result};

/// Serials from bootloader-mode `devices` output: one per non-empty row,
/// first tab-separated field. No header precedes the rows.
pub fn parse_devices(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let serial = line.split('\t').next()?.trim();
            if serial.is_empty() {
                None
            } else {
                Some(serial.to_string())
            }
        })
        .collect()
}

/// Product name from `getvar product` output.
///
/// The value sits after the colon on the line mentioning `product`; a
/// product line that does not split into exactly two fields, or output with
/// no product line at all, is a parse failure.
pub fn parse_getvar_product(output: &str) -> Result<String> {
    let mut product = String::new();
    for line in output.lines() {
        if !line.contains("product") {
            continue;
        }
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() != 2 {
            return Err(BridgeError::parse("getvar product output", line));
        }
        product = fields[1].trim().to_string();
    }
    if product.is_empty() {
        return Err(BridgeError::parse(
            "getvar product output",
            "no product line found",
        ));
    }
    Ok(product)
}
