use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Writes an executable `/bin/sh` script posing as a device tool and
/// returns its path.
pub(crate) fn fake_tool(dir: &TempDir, name: &str, script: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, format!("#!/bin/sh\n{script}\n")).expect("write fake tool script");
    let mut permissions = fs::metadata(&path)
        .expect("fake tool metadata")
        .permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&path, permissions).expect("mark fake tool executable");
    path
}

/// Shell fragment that appends every argument of an invocation, one per
/// line, to `log`. Embed it at the top of a fake tool script to assert on
/// the exact argv afterwards.
pub(crate) fn argv_logger(log: &Path) -> String {
    format!(
        r#"for arg in "$@"; do printf '%s\n' "$arg"; done >> "{}""#,
        log.display()
    )
}
