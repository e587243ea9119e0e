//! Atomic, owner-only file writes.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Permission bits for every file this controller writes.
pub const READ_WRITE_BY_USER: u32 = 0o600;

/// Write `content` to `path` via a temp file in the same directory and a rename.
///
/// Readers observe either the previous file or the complete new one, never a
/// partial write. The temp file is removed if any step fails.
pub fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".tmp-")
        .tempfile_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(READ_WRITE_BY_USER))?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
