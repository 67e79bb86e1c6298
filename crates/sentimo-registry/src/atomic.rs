//! Whole-document writes via temp file + rename

use sentimo_core::{Error, Result};
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::Path;

fn staged<T: Serialize>(path: &Path, value: &T) -> Result<tempfile::NamedTempFile> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::internal(format!("{} has no parent directory", path.display())))?;
    std::fs::create_dir_all(dir)?;

    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

/// Replace `path` with the JSON form of `value`. Readers see either the old
/// document or the new one, never a partial write.
pub fn replace_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    staged(path, value)?
        .persist(path)
        .map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Create `path` with the JSON form of `value`, failing if it already exists
pub fn create_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    staged(path, value)?
        .persist_noclobber(path)
        .map_err(|e| Error::Io(e.error))?;
    Ok(())
}
