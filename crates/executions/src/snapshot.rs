//! Compressed snapshots of input trees.

use crate::error::{Error, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::path::Path;

/// Compress the contents of `source` into the tarball `dest`.
///
/// Paths inside the archive are relative to `source`.
pub fn pack(source: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io("create", parent, e))?;
    }
    let file = File::create(dest).map_err(|e| Error::io("create", dest, e))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    builder
        .append_dir_all(".", source)
        .map_err(|e| Error::io("archive", source, e))?;
    builder
        .into_inner()
        .and_then(GzEncoder::finish)
        .map_err(|e| Error::io("finish", dest, e))?;

    log::debug!("Packed {} into {}", source.display(), dest.display());
    Ok(())
}

/// Extract the tarball `archive` into `dest`, creating it if needed.
pub fn unpack(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|e| Error::io("open", archive, e))?;
    fs::create_dir_all(dest).map_err(|e| Error::io("create", dest, e))?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    tar.unpack(dest).map_err(|e| Error::io("extract", archive, e))?;
    log::debug!("Unpacked {} into {}", archive.display(), dest.display());
    Ok(())
}

/// Replace the tree at `dest` with the contents of `archive`.
pub fn restore(archive: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        fs::remove_dir_all(dest).map_err(|e| Error::io("remove", dest, e))?;
    }
    unpack(archive, dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_restore_replaces_tree() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("input");
        fs::create_dir_all(input.join("design")).unwrap();
        fs::write(input.join("design/configlets.yml"), "configlets: []\n").unwrap();
        let tgz = temp.path().join("input.tgz");
        pack(&input, &tgz).unwrap();

        fs::write(input.join("design/configlets.yml"), "configlets: [x]\n").unwrap();
        fs::write(input.join("stray.yml"), "x: 1\n").unwrap();
        restore(&tgz, &input).unwrap();

        assert_eq!(
            fs::read_to_string(input.join("design/configlets.yml")).unwrap(),
            "configlets: []\n"
        );
        assert!(!input.join("stray.yml").exists());
    }

    #[test]
    fn test_unpack_missing_archive() {
        let temp = TempDir::new().unwrap();
        let err = unpack(&temp.path().join("nope.tgz"), temp.path()).unwrap_err();
        assert!(err.to_string().contains("nope.tgz"));
    }
}
