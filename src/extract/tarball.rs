//! Tar archives, plain or compressed with gzip, xz or bzip2

use super::ArchiveExtractor;
use crate::error::{GetpackError, GetpackResult};
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read};
use tar::{Archive, EntryType};
use tracing::trace;
use xz2::read::XzDecoder;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const XZ_MAGIC: &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];
const BZIP2_MAGIC: &[u8] = b"BZh";

/// Pick the decompressor from the leading bytes, not the file name
fn decoder(bytes: Vec<u8>) -> Box<dyn Read> {
    if bytes.starts_with(GZIP_MAGIC) {
        Box::new(GzDecoder::new(Cursor::new(bytes)))
    } else if bytes.starts_with(XZ_MAGIC) {
        Box::new(XzDecoder::new(Cursor::new(bytes)))
    } else if bytes.starts_with(BZIP2_MAGIC) {
        Box::new(BzDecoder::new(Cursor::new(bytes)))
    } else {
        Box::new(Cursor::new(bytes))
    }
}

struct Member {
    mode: Option<u32>,
    bytes: Vec<u8>,
}

/// Tar extractor over an in-memory archive
///
/// Tar has no index, so every member is read up front.
pub struct TarExtractor {
    name: String,
    order: Vec<String>,
    members: HashMap<String, Member>,
}

impl TarExtractor {
    pub fn open(name: &str, bytes: Vec<u8>) -> GetpackResult<Self> {
        let mut archive = Archive::new(decoder(bytes));

        let mut names = Vec::new();
        let mut members = HashMap::new();
        let entries = archive
            .entries()
            .map_err(|e| GetpackError::archive(name, e))?;
        for entry in entries {
            let mut entry = entry.map_err(|e| GetpackError::archive(name, e))?;
            let path = entry
                .path()
                .map_err(|e| GetpackError::archive(name, e))?
                .to_string_lossy()
                .into_owned();
            names.push(path.clone());

            let kind = entry.header().entry_type();
            if !matches!(kind, EntryType::Regular | EntryType::Continuous) {
                trace!("Skipping {:?} member {}", kind, path);
                continue;
            }

            let mut bytes = Vec::new();
            entry
                .read_to_end(&mut bytes)
                .map_err(|e| GetpackError::archive(name, format!("{}: {}", path, e)))?;
            let mode = entry.header().mode().ok();
            members.insert(path, Member { mode, bytes });
        }

        let order = files_only(&names)
            .into_iter()
            .filter(|n| members.contains_key(n))
            .collect();

        Ok(Self {
            name: name.to_string(),
            order,
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

/// Drop every name that is a directory of another member
///
/// Some archives carry directories without a directory entry type, so the
/// member table alone decides what is a folder.
fn files_only(names: &[String]) -> Vec<String> {
    let mut dirs = HashSet::new();
    for name in names {
        let mut rest = name.trim_end_matches('/');
        while let Some((parent, _)) = rest.rsplit_once('/') {
            if !dirs.insert(parent) {
                break;
            }
            rest = parent;
        }
    }

    names
        .iter()
        .filter(|name| !name.ends_with('/') && !dirs.contains(name.as_str()))
        .cloned()
        .collect()
}

impl ArchiveExtractor for TarExtractor {
    fn file_list(&self) -> Vec<String> {
        self.order.clone()
    }

    fn read(&mut self, member: &str) -> GetpackResult<Vec<u8>> {
        self.members
            .get(member)
            .map(|m| m.bytes.clone())
            .ok_or_else(|| GetpackError::archive(&self.name, format!("no member {}", member)))
    }

    fn mode(&self, member: &str) -> Option<u32> {
        self.members.get(member).and_then(|m| m.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::tests::tar_gz_bytes;
    use std::io::Write;

    fn plain_tar(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_path(path).unwrap();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, &content[..]).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn gzip_detected_by_magic() {
        let bytes = tar_gz_bytes(&[("a.txt", b"gz")]);
        let mut extractor = TarExtractor::open("a.tar.gz", bytes).unwrap();
        assert_eq!(extractor.read("a.txt").unwrap(), b"gz");
    }

    #[test]
    fn xz_detected_by_magic() {
        let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
        encoder.write_all(&plain_tar(&[("bin/tool", b"xz")])).unwrap();
        let bytes = encoder.finish().unwrap();

        let mut extractor = TarExtractor::open("tool-1.0.tar.xz", bytes).unwrap();
        assert_eq!(extractor.file_list(), vec!["bin/tool".to_string()]);
        assert_eq!(extractor.read("bin/tool").unwrap(), b"xz");
    }

    #[test]
    fn bzip2_detected_by_magic() {
        let mut encoder =
            bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        encoder.write_all(&plain_tar(&[("a.txt", b"bz")])).unwrap();
        let bytes = encoder.finish().unwrap();

        let mut extractor = TarExtractor::open("a.tar.bz2", bytes).unwrap();
        assert_eq!(extractor.read("a.txt").unwrap(), b"bz");
    }

    #[test]
    fn plain_tar_readable() {
        let bytes = plain_tar(&[("a.txt", b"plain")]);
        let mut extractor = TarExtractor::open("a.tar", bytes).unwrap();
        assert_eq!(extractor.read("a.txt").unwrap(), b"plain");
        assert_eq!(extractor.mode("a.txt"), Some(0o644));
    }

    #[test]
    fn directories_filtered_from_member_table() {
        let names: Vec<String> = ["pkg", "pkg/bin", "pkg/bin/tool", "pkg/readme.txt"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        assert_eq!(
            files_only(&names),
            vec!["pkg/bin/tool".to_string(), "pkg/readme.txt".to_string()]
        );
    }

    #[test]
    fn deep_trees_keep_only_leaves() {
        let mut names = Vec::new();
        for i in 0..2000 {
            names.push(format!("pkg/lib/mod{}", i));
            names.push(format!("pkg/lib/mod{}/__init__.py", i));
        }
        names.push("pkg/lib/".to_string());

        let files = files_only(&names);
        assert_eq!(files.len(), 2000);
        assert!(files.iter().all(|f| f.ends_with("__init__.py")));
    }

    #[test]
    fn archive_order_preserved() {
        let bytes = tar_gz_bytes(&[("z.txt", b"z"), ("a.txt", b"a"), ("m/x.txt", b"x")]);
        let extractor = TarExtractor::open("o.tgz", bytes).unwrap();
        assert_eq!(
            extractor.file_list(),
            vec!["z.txt".to_string(), "a.txt".to_string(), "m/x.txt".to_string()]
        );
    }

    #[test]
    fn missing_member() {
        let bytes = tar_gz_bytes(&[("a.txt", b"a")]);
        let mut extractor = TarExtractor::open("a.tgz", bytes).unwrap();
        assert!(matches!(
            extractor.read("b.txt"),
            Err(GetpackError::Archive { .. })
        ));
    }
}
