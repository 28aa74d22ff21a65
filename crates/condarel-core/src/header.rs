//! Reading and rewriting the text header of a constructor-built installer.
//!
//! The installer is a shell script followed by a binary payload. The script
//! part ends at the first `@@END_HEADER@@` marker and carries metadata as
//! `# KEY: value` comment lines. The installer locates its payload at run
//! time by searching for the marker line, so the header holds no byte
//! offsets and replacements may change its length freely.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

pub const END_HEADER_MAGIC: &[u8] = b"@@END_HEADER@@";

static METADATA_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^# ([A-Z]+): +(.+?)[ \t\r]*$").expect("metadata pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    #[error("Installer has no @@END_HEADER@@ marker")]
    MissingEndMarker,
    #[error("Installer header is not valid UTF-8")]
    NotUtf8,
    #[error("Installer header has no `# {key}:` metadata line")]
    MissingMetadata { key: &'static str },
    #[error(
        "Version {version} appears {count} unexpected time(s) in the installer header"
    )]
    StrayVersion { version: String, count: usize },
    #[error("Replacement range {offset}+{len} is outside the {total}-byte input")]
    OutOfBounds {
        offset: usize,
        len: usize,
        total: usize,
    },
    #[error("Patched installer payload differs from the original")]
    PayloadChanged,
}

/// Byte range of one version occurrence inside the installer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionSpan {
    pub offset: usize,
    pub len: usize,
}

#[derive(Debug, Clone)]
pub struct InstallerHeader {
    text: String,
    metadata: BTreeMap<String, MetadataValue>,
}

#[derive(Debug, Clone)]
struct MetadataValue {
    value: String,
    offset: usize,
}

impl InstallerHeader {
    /// Parse the header of `installer`, leaving the payload untouched.
    ///
    /// # Errors
    /// Returns an error if the end-of-header marker is missing or the header
    /// is not UTF-8.
    pub fn parse(installer: &[u8]) -> Result<Self, HeaderError> {
        let len = header_len(installer)?;
        let text = std::str::from_utf8(&installer[..len])
            .map_err(|_| HeaderError::NotUtf8)?
            .to_string();

        let metadata = METADATA_LINE
            .captures_iter(&text)
            .filter_map(|caps| {
                let key = caps.get(1)?;
                let value = caps.get(2)?;
                Some((
                    key.as_str().to_string(),
                    MetadataValue {
                        value: value.as_str().to_string(),
                        offset: value.start(),
                    },
                ))
            })
            .collect();

        Ok(Self { text, metadata })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|entry| entry.value.as_str())
    }

    pub fn metadata(&self) -> impl Iterator<Item = (&str, &str)> {
        self.metadata
            .iter()
            .map(|(key, entry)| (key.as_str(), entry.value.as_str()))
    }

    /// The `# VER:` value written by the installer generator.
    ///
    /// # Errors
    /// Returns an error if the header carries no version line.
    pub fn version(&self) -> Result<&str, HeaderError> {
        self.get("VER")
            .ok_or(HeaderError::MissingMetadata { key: "VER" })
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.get("NAME")
    }

    /// Every place the version occurs in the header.
    ///
    /// The version must appear exactly once as metadata. Other occurrences
    /// are only allowed as `<NAME> <VER>` display labels.
    ///
    /// # Errors
    /// Returns an error if the version line is missing or the version
    /// appears anywhere else.
    pub fn version_spans(&self) -> Result<Vec<VersionSpan>, HeaderError> {
        let meta = self
            .metadata
            .get("VER")
            .ok_or(HeaderError::MissingMetadata { key: "VER" })?;
        let version = meta.value.as_str();
        let label_prefix = self.name().map(|name| format!("{name} "));

        let mut spans = Vec::new();
        let mut stray = 0;
        for (offset, _) in self.text.match_indices(version) {
            let is_metadata = offset == meta.offset;
            let is_label = label_prefix
                .as_deref()
                .is_some_and(|prefix| self.text[..offset].ends_with(prefix));
            if is_metadata || is_label {
                spans.push(VersionSpan {
                    offset,
                    len: version.len(),
                });
            } else {
                stray += 1;
            }
        }

        if stray > 0 {
            return Err(HeaderError::StrayVersion {
                version: version.to_string(),
                count: stray,
            });
        }

        Ok(spans)
    }
}

fn header_len(installer: &[u8]) -> Result<usize, HeaderError> {
    installer
        .windows(END_HEADER_MAGIC.len())
        .position(|window| window == END_HEADER_MAGIC)
        .ok_or(HeaderError::MissingEndMarker)
}

/// Replace `len` bytes at `offset` with `replacement`.
///
/// # Errors
/// Returns an error if the range does not lie within `bytes`.
pub fn splice(
    bytes: &[u8],
    offset: usize,
    len: usize,
    replacement: &[u8],
) -> Result<Vec<u8>, HeaderError> {
    let end = offset
        .checked_add(len)
        .filter(|end| *end <= bytes.len())
        .ok_or(HeaderError::OutOfBounds {
            offset,
            len,
            total: bytes.len(),
        })?;

    let mut out = Vec::with_capacity(bytes.len() - len + replacement.len());
    out.extend_from_slice(&bytes[..offset]);
    out.extend_from_slice(replacement);
    out.extend_from_slice(&bytes[end..]);
    Ok(out)
}

/// Rewrite every version occurrence in the installer header to
/// `new_version`. Only the header is rebuilt; the payload is copied once.
///
/// # Errors
/// Returns an error if the header cannot be parsed, the version occurs
/// somewhere unexpected, or the payload would change.
pub fn patch_installer(installer: &[u8], new_version: &str) -> Result<Vec<u8>, HeaderError> {
    let header = InstallerHeader::parse(installer)?;
    let spans = header.version_spans()?;
    let (head, payload) = installer.split_at(header.len());

    let mut new_head = head.to_vec();
    for span in spans.iter().rev() {
        new_head = splice(&new_head, span.offset, span.len, new_version.as_bytes())?;
    }

    let mut patched = Vec::with_capacity(new_head.len() + payload.len());
    patched.extend_from_slice(&new_head);
    patched.extend_from_slice(payload);

    let before = Sha256::digest(payload);
    let after = Sha256::digest(&patched[header_len(&patched)?..]);
    if before != after {
        return Err(HeaderError::PayloadChanged);
    }

    Ok(patched)
}
