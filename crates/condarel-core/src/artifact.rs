use std::io::{Cursor, Read};

use thiserror::Error;
use zip::ZipArchive;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read {artifact} archive: {source}")]
    Zip {
        artifact: String,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("failed to extract {file} from {artifact} archive: {source}")]
    Read {
        artifact: String,
        file: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{artifact} archive should contain exactly one file, found {count}")]
    UnexpectedFileCount { artifact: String, count: usize },
    #[error("{artifact} archive has no {file}")]
    MissingFile { artifact: String, file: String },
}

impl ArtifactError {
    fn zip(artifact: &str, source: zip::result::ZipError) -> Self {
        Self::Zip {
            artifact: artifact.to_string(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFile {
    pub name: String,
    pub data: Vec<u8>,
}

/// Extract the only file of a zipped CI artifact.
///
/// # Errors
/// Returns an error if the archive is unreadable or does not hold exactly
/// one file.
pub fn read_single_file(artifact: &str, archive: &[u8]) -> Result<ArtifactFile, ArtifactError> {
    let mut zip = open(artifact, archive)?;

    let mut file_indices = Vec::new();
    for idx in 0..zip.len() {
        let entry = zip
            .by_index(idx)
            .map_err(|source| ArtifactError::zip(artifact, source))?;
        if !entry.is_dir() {
            file_indices.push(idx);
        }
    }

    let [idx] = file_indices[..] else {
        return Err(ArtifactError::UnexpectedFileCount {
            artifact: artifact.to_string(),
            count: file_indices.len(),
        });
    };

    let mut entry = zip
        .by_index(idx)
        .map_err(|source| ArtifactError::zip(artifact, source))?;
    let name = entry.name().to_string();
    let data = read_entry(artifact, &name, &mut entry)?;
    Ok(ArtifactFile { name, data })
}

/// Extract `file` from a zipped CI artifact.
///
/// # Errors
/// Returns an error if the archive is unreadable or has no such file.
pub fn read_named_file(
    artifact: &str,
    archive: &[u8],
    file: &str,
) -> Result<Vec<u8>, ArtifactError> {
    let mut zip = open(artifact, archive)?;
    let mut entry = match zip.by_name(file) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(ArtifactError::MissingFile {
                artifact: artifact.to_string(),
                file: file.to_string(),
            });
        }
        Err(source) => return Err(ArtifactError::zip(artifact, source)),
    };
    read_entry(artifact, file, &mut entry)
}

fn open<'a>(
    artifact: &str,
    archive: &'a [u8],
) -> Result<ZipArchive<Cursor<&'a [u8]>>, ArtifactError> {
    ZipArchive::new(Cursor::new(archive)).map_err(|source| ArtifactError::zip(artifact, source))
}

fn read_entry(artifact: &str, file: &str, entry: &mut impl Read) -> Result<Vec<u8>, ArtifactError> {
    let mut data = Vec::new();
    entry
        .read_to_end(&mut data)
        .map_err(|source| ArtifactError::Read {
            artifact: artifact.to_string(),
            file: file.to_string(),
            source,
        })?;
    Ok(data)
}
