// src/repomd.rs
//! repomd.xml manifest parsing
//!
//! Only `<data>` entries that carry both a `<location href>` and an
//! `<open-checksum>` are considered, and of those only the SQLite databases.
//! The primary database is always ordered first so the content-id caches it
//! produces are available when the filelists and other databases are diffed.

use crate::error::{Error, Result};
use crate::hash::HashAlgorithm;
use crate::store::DbKind;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

/// One database announced by a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    /// File name relative to the repodata directory
    pub filename: String,
    /// Hex digest of the decompressed database
    pub checksum: String,
    pub algorithm: HashAlgorithm,
}

impl ArtifactDescriptor {
    /// Which sibling database this artifact is
    pub fn kind(&self) -> Option<DbKind> {
        DbKind::from_artifact_name(&self.filename)
    }

    pub fn is_primary(&self) -> bool {
        self.filename.contains("primary")
    }
}

#[derive(Default)]
struct DataEntry {
    href: Option<String>,
    checksum: Option<String>,
    checksum_type: Option<String>,
}

/// Parse a manifest into its SQLite artifacts, primary first
pub fn parse_manifest(xml: &str) -> Result<Vec<ArtifactDescriptor>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut artifacts = Vec::new();
    let mut entry: Option<DataEntry> = None;
    let mut in_open_checksum = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            Error::Manifest(format!("at byte {}: {}", reader.buffer_position(), e))
        })?;

        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"data" => entry = Some(DataEntry::default()),
                b"location" => set_location(&mut entry, &e)?,
                b"open-checksum" => {
                    in_open_checksum = true;
                    if let Some(entry) = entry.as_mut() {
                        entry.checksum_type = attribute(&e, "type")?;
                    }
                }
                _ => {}
            },
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"location" {
                    set_location(&mut entry, &e)?;
                }
            }
            Event::Text(text) if in_open_checksum => {
                if let Some(entry) = entry.as_mut() {
                    let value = text
                        .unescape()
                        .map_err(|e| Error::Manifest(e.to_string()))?;
                    entry.checksum = Some(value.trim().to_string());
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"open-checksum" => in_open_checksum = false,
                b"data" => {
                    if let Some(artifact) = entry.take().map(into_artifact).transpose()?.flatten() {
                        artifacts.push(artifact);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    order_primary_first(&mut artifacts);
    Ok(artifacts)
}

/// Stable sort putting primary databases ahead of everything else
pub fn order_primary_first(artifacts: &mut [ArtifactDescriptor]) {
    artifacts.sort_by_key(|a| !a.is_primary());
}

fn set_location(entry: &mut Option<DataEntry>, e: &BytesStart<'_>) -> Result<()> {
    if let Some(entry) = entry.as_mut() {
        entry.href = attribute(e, "href")?;
    }
    Ok(())
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    let attr = e
        .try_get_attribute(name)
        .map_err(|err| Error::Manifest(err.to_string()))?;
    attr.map(|a| {
        a.unescape_value()
            .map(|v| v.into_owned())
            .map_err(|err| Error::Manifest(err.to_string()))
    })
    .transpose()
}

/// Keep complete SQLite entries, drop everything else
fn into_artifact(entry: DataEntry) -> Result<Option<ArtifactDescriptor>> {
    let (Some(href), Some(checksum)) = (entry.href, entry.checksum) else {
        return Ok(None);
    };

    let filename = href.replace("repodata/", "");
    if !filename.contains(".sqlite") {
        return Ok(None);
    }

    let algorithm = entry
        .checksum_type
        .as_deref()
        .map(str::parse::<HashAlgorithm>)
        .transpose()?
        .unwrap_or_default();

    Ok(Some(ArtifactDescriptor {
        filename,
        checksum,
        algorithm,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPOMD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<repomd xmlns="http://linux.duke.edu/metadata/repo" xmlns:rpm="http://linux.duke.edu/metadata/rpm">
  <revision>1712345678</revision>
  <data type="primary">
    <checksum type="sha256">aaaa</checksum>
    <open-checksum type="sha256">bbbb</open-checksum>
    <location href="repodata/bbbb-primary.xml.gz"/>
  </data>
  <data type="other_db">
    <checksum type="sha256">cccc</checksum>
    <open-checksum type="sha256">dddd</open-checksum>
    <location href="repodata/cccc-other.sqlite.xz"/>
    <database_version>10</database_version>
  </data>
  <data type="filelists_db">
    <checksum type="sha256">eeee</checksum>
    <open-checksum type="sha256">ffff</open-checksum>
    <location href="repodata/eeee-filelists.sqlite.xz"/>
  </data>
  <data type="primary_db">
    <checksum type="sha">1111</checksum>
    <open-checksum type="sha">2222</open-checksum>
    <location href="repodata/1111-primary.sqlite.bz2"/>
  </data>
  <data type="group">
    <checksum type="sha256">9999</checksum>
    <location href="repodata/9999-comps.xml"/>
  </data>
</repomd>
"#;

    #[test]
    fn test_parse_keeps_sqlite_primary_first() {
        let artifacts = parse_manifest(REPOMD).unwrap();
        let names: Vec<_> = artifacts.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "1111-primary.sqlite.bz2",
                "cccc-other.sqlite.xz",
                "eeee-filelists.sqlite.xz",
            ]
        );

        assert_eq!(artifacts[0].algorithm, HashAlgorithm::Sha1);
        assert_eq!(artifacts[0].checksum, "2222");
        assert_eq!(artifacts[0].kind(), Some(DbKind::Primary));
        assert_eq!(artifacts[1].kind(), Some(DbKind::Other));
        assert_eq!(artifacts[2].algorithm, HashAlgorithm::Sha256);
    }

    #[test]
    fn test_no_databases_is_empty() {
        let xml = r#"<repomd xmlns="http://linux.duke.edu/metadata/repo">
  <data type="primary">
    <open-checksum type="sha256">bbbb</open-checksum>
    <location href="repodata/bbbb-primary.xml.gz"/>
  </data>
</repomd>"#;
        assert!(parse_manifest(xml).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_checksum_type() {
        let xml = r#"<repomd>
  <data type="primary_db">
    <open-checksum type="crc32">bbbb</open-checksum>
    <location href="repodata/bbbb-primary.sqlite.gz"/>
  </data>
</repomd>"#;
        assert!(matches!(parse_manifest(xml), Err(Error::Hash(_))));
    }

    #[test]
    fn test_malformed_xml() {
        let xml = "<repomd><data></repomd>";
        assert!(matches!(parse_manifest(xml), Err(Error::Manifest(_))));
    }
}
