//! Zip (and wheel) archives

use super::ArchiveExtractor;
use crate::error::{GetpackError, GetpackResult};
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// Zip extractor over an in-memory archive
///
/// The central directory sits at the end of the file, so the whole archive
/// is buffered before members can be listed.
pub struct ZipExtractor {
    name: String,
    archive: ZipArchive<Cursor<Vec<u8>>>,
    members: Vec<(String, Option<u32>)>,
}

impl ZipExtractor {
    pub fn open(name: &str, bytes: Vec<u8>) -> GetpackResult<Self> {
        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).map_err(|e| GetpackError::archive(name, e))?;

        let mut members = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive
                .by_index_raw(index)
                .map_err(|e| GetpackError::archive(name, e))?;
            // skip folders
            if file.is_dir() || file.name().ends_with('/') {
                continue;
            }
            members.push((file.name().to_string(), file.unix_mode()));
        }

        Ok(Self {
            name: name.to_string(),
            archive,
            members,
        })
    }

    pub(super) fn open_boxed(
        name: &str,
        bytes: Vec<u8>,
    ) -> GetpackResult<Box<dyn ArchiveExtractor>> {
        Ok(Box::new(Self::open(name, bytes)?))
    }
}

impl ArchiveExtractor for ZipExtractor {
    fn file_list(&self) -> Vec<String> {
        self.members.iter().map(|(name, _)| name.clone()).collect()
    }

    fn read(&mut self, member: &str) -> GetpackResult<Vec<u8>> {
        let mut file = self
            .archive
            .by_name(member)
            .map_err(|e| GetpackError::archive(&self.name, format!("{}: {}", member, e)))?;
        let mut bytes = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut bytes)
            .map_err(|e| GetpackError::archive(&self.name, format!("{}: {}", member, e)))?;
        Ok(bytes)
    }

    fn mode(&self, member: &str) -> Option<u32> {
        self.members
            .iter()
            .find(|(name, _)| name == member)
            .and_then(|(_, mode)| *mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::tests::zip_bytes;

    #[test]
    fn folders_are_skipped() {
        let bytes = zip_bytes(&[("pkg/", b""), ("pkg/a.txt", b"a"), ("pkg/sub/b.txt", b"b")]);
        let extractor = ZipExtractor::open("pkg.zip", bytes).unwrap();

        assert_eq!(
            extractor.file_list(),
            vec!["pkg/a.txt".to_string(), "pkg/sub/b.txt".to_string()]
        );
    }

    #[test]
    fn read_member() {
        let bytes = zip_bytes(&[("a.txt", b"hello")]);
        let mut extractor = ZipExtractor::open("a.zip", bytes).unwrap();

        assert_eq!(extractor.read("a.txt").unwrap(), b"hello");
        assert!(extractor.read("missing.txt").is_err());
    }

    #[test]
    fn corrupt_archive() {
        let result = ZipExtractor::open("broken.zip", b"not a zip".to_vec());
        assert!(matches!(result, Err(GetpackError::Archive { .. })));
    }
}
