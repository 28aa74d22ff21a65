use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreKind {
    Alpha,
    Beta,
    Candidate,
}

impl PreKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alpha => "a",
            Self::Beta => "b",
            Self::Candidate => "rc",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        match label {
            "a" | "alpha" => Some(Self::Alpha),
            "b" | "beta" => Some(Self::Beta),
            "rc" | "c" | "pre" | "preview" => Some(Self::Candidate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PreRelease {
    pub kind: PreKind,
    pub number: u64,
}

/// A distribution version: a dotted release segment with an optional
/// alpha/beta/candidate suffix, compared the way PEP 440 compares them.
#[derive(Debug, Clone, Eq)]
pub struct ReleaseVersion {
    release: Vec<u64>,
    pre: Option<PreRelease>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionParseError {
    #[error("Version string is empty")]
    Empty,
    #[error("Invalid release segment in version: {input}")]
    InvalidRelease { input: String },
    #[error("Unsupported version suffix in {input}: only a, b and rc pre-releases are allowed")]
    UnsupportedSuffix { input: String },
    #[error("Cannot bump {version}: component is already at its maximum")]
    BumpOverflow { version: String },
}

impl ReleaseVersion {
    #[must_use]
    pub fn release(&self) -> &[u64] {
        &self.release
    }

    #[must_use]
    pub fn pre(&self) -> Option<PreRelease> {
        self.pre
    }

    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some()
    }

    /// Drop any pre-release suffix: `2.4a5` becomes `2.4`.
    #[must_use]
    pub fn round_to_release(&self) -> Self {
        Self {
            release: self.release.clone(),
            pre: None,
        }
    }

    /// The version development moves on to once `self` is released.
    ///
    /// Pre-releases bump their pre-release number (`2.0a1` -> `2.0a2`), full
    /// releases bump the last release component and start a new alpha series
    /// (`2.1` -> `2.2a1`).
    ///
    /// # Errors
    /// Returns [`VersionParseError::BumpOverflow`] if the bumped component
    /// does not fit in a `u64`.
    pub fn next_version(&self) -> Result<Self, VersionParseError> {
        let overflow = || VersionParseError::BumpOverflow {
            version: self.to_string(),
        };

        match self.pre {
            Some(pre) => Ok(Self {
                release: self.release.clone(),
                pre: Some(PreRelease {
                    kind: pre.kind,
                    number: pre.number.checked_add(1).ok_or_else(overflow)?,
                }),
            }),
            None => {
                let mut release = self.release.clone();
                if let Some(last) = release.last_mut() {
                    *last = last.checked_add(1).ok_or_else(overflow)?;
                }
                Ok(Self {
                    release,
                    pre: Some(PreRelease {
                        kind: PreKind::Alpha,
                        number: 1,
                    }),
                })
            }
        }
    }
}

/// Pick the version to release and the version to develop next.
///
/// Without an explicit request the version recorded at build time is
/// rounded up to its full release.
///
/// # Errors
/// Fails when the next version cannot be computed.
pub fn resolve_versions(
    requested: Option<&ReleaseVersion>,
    built: &ReleaseVersion,
) -> Result<(ReleaseVersion, ReleaseVersion), VersionParseError> {
    let this_version = requested.map_or_else(|| built.round_to_release(), Clone::clone);
    let next_version = this_version.next_version()?;
    Ok((this_version, next_version))
}

impl FromStr for ReleaseVersion {
    type Err = VersionParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VersionParseError::Empty);
        }

        let lower = trimmed.to_ascii_lowercase();
        let split = lower
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(lower.len());
        let (release_part, rest) = lower.split_at(split);
        let release_part = if rest.is_empty() {
            release_part
        } else {
            release_part.strip_suffix('.').unwrap_or(release_part)
        };

        let release = release_part
            .split('.')
            .map(|part| {
                part.parse::<u64>()
                    .map_err(|_| VersionParseError::InvalidRelease {
                        input: trimmed.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let pre = if rest.is_empty() {
            None
        } else {
            Some(parse_pre_release(rest).ok_or_else(|| {
                VersionParseError::UnsupportedSuffix {
                    input: trimmed.to_string(),
                }
            })?)
        };

        Ok(Self { release, pre })
    }
}

fn parse_pre_release(suffix: &str) -> Option<PreRelease> {
    let suffix = suffix.strip_prefix(['.', '-', '_']).unwrap_or(suffix);
    let label_end = suffix
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(suffix.len());
    let (label, number) = suffix.split_at(label_end);
    let kind = PreKind::from_label(label)?;

    let number = number.strip_prefix(['.', '-', '_']).unwrap_or(number);
    let number = if number.is_empty() {
        0
    } else {
        number.parse().ok()?
    };

    Some(PreRelease { kind, number })
}

impl Ord for ReleaseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        let segment = |release: &[u64], idx: usize| release.get(idx).copied().unwrap_or(0);

        (0..len)
            .map(|idx| segment(&self.release, idx).cmp(&segment(&other.release, idx)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for ReleaseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ReleaseVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, segment) in self.release.iter().enumerate() {
            if idx > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        if let Some(pre) = self.pre {
            write!(f, "{}{}", pre.kind.as_str(), pre.number)?;
        }
        Ok(())
    }
}
