use anyhow::{Context, Result};
use edgar_core::Error;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

pub trait ArchiveReader: Send + Sync {
    /// Extract the first entry whose name ends in `suffix` into `dest_dir`.
    fn extract_first_matching(&self, archive: &Path, suffix: &str, dest_dir: &Path) -> Result<PathBuf>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiveReader;

impl ArchiveReader for ZipArchiveReader {
    fn extract_first_matching(&self, archive: &Path, suffix: &str, dest_dir: &Path) -> Result<PathBuf> {
        let file = File::open(archive).with_context(|| format!("opening {}", archive.display()))?;
        let mut zip = zip::ZipArchive::new(file).with_context(|| format!("reading {}", archive.display()))?;

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            if !entry.is_file() || !entry.name().ends_with(suffix) {
                continue;
            }
            // Entries are flattened into dest_dir; paths escaping it are skipped.
            let Some(file_name) = entry.enclosed_name().and_then(|p| p.file_name().map(PathBuf::from)) else {
                log::warn!("skipping unsafe entry {:?} in {}", entry.name(), archive.display());
                continue;
            };
            fs::create_dir_all(dest_dir)?;
            let dest = dest_dir.join(file_name);
            let mut part_name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
            part_name.push(".part");
            let part = dest.with_file_name(part_name);
            {
                let mut out = File::create(&part).with_context(|| format!("creating {}", part.display()))?;
                io::copy(&mut entry, &mut out)?;
            }
            fs::rename(&part, &dest)?;
            log::info!("extracted {} from {}", dest.display(), archive.display());
            return Ok(dest);
        }
        Err(Error::ArchiveEntryMissing { archive: archive.to_path_buf(), suffix: suffix.to_string() }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build(path: &Path, entries: &[(&str, &str)]) {
        let mut w = zip::ZipWriter::new(File::create(path).unwrap());
        let opts = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, body) in entries {
            w.start_file(*name, opts).unwrap();
            w.write_all(body.as_bytes()).unwrap();
        }
        w.finish().unwrap();
    }

    #[test]
    fn extracts_first_csv() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("log20170630.zip");
        build(&archive, &[("README.txt", "hi"), ("log20170630.csv", "ip,date\n1.2.3.abc,2017-06-30\n"), ("other.csv", "x")]);

        let out = ZipArchiveReader.extract_first_matching(&archive, ".csv", &dir.path().join("extracted")).unwrap();
        assert_eq!(out, dir.path().join("extracted").join("log20170630.csv"));
        assert!(fs::read_to_string(&out).unwrap().starts_with("ip,date"));
    }

    #[test]
    fn missing_entry_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("log.zip");
        build(&archive, &[("README.txt", "nothing here")]);

        let err = ZipArchiveReader.extract_first_matching(&archive, ".csv", dir.path()).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::ArchiveEntryMissing { .. })));
    }
}
