use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::HarvestError;

/// Composite dbGaP study key: accession number, version and participant set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StudyIdentifier {
    id: u32,
    version: u32,
    participant_set: u32,
}

impl StudyIdentifier {
    pub fn new(id: u32, version: u32, participant_set: u32) -> Result<Self, HarvestError> {
        if id == 0 || version == 0 || participant_set == 0 {
            return Err(HarvestError::InvalidStudyId(format!(
                "{id}.v{version}.p{participant_set}"
            )));
        }
        Ok(Self {
            id,
            version,
            participant_set,
        })
    }

    /// `phs000774`
    pub fn accession(&self) -> String {
        format!("phs{:06}", self.id)
    }

    /// `phs000774.v1`
    pub fn versioned(&self) -> String {
        format!("{}.v{}", self.accession(), self.version)
    }

    /// `phs000774.v1.p1`
    pub fn full_id(&self) -> String {
        format!("{}.p{}", self.versioned(), self.participant_set)
    }
}

impl fmt::Display for StudyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_id())
    }
}

impl FromStr for StudyIdentifier {
    type Err = HarvestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || HarvestError::InvalidStudyId(value.to_string());
        let mut parts = value.trim().split('.');
        let id = parts
            .next()
            .and_then(|part| part.strip_prefix("phs"))
            .and_then(|digits| digits.parse::<u32>().ok())
            .ok_or_else(invalid)?;
        let version = parts
            .next()
            .and_then(|part| part.strip_prefix('v'))
            .and_then(|digits| digits.parse::<u32>().ok())
            .ok_or_else(invalid)?;
        let participant_set = parts
            .next()
            .and_then(|part| part.strip_prefix('p'))
            .and_then(|digits| digits.parse::<u32>().ok())
            .ok_or_else(invalid)?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        Self::new(id, version, participant_set).map_err(|_| invalid())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Fetch,
    Convert,
    Graph,
    All,
}

/// The expanded stage set for one run. `Mode::All` is expanded here, once,
/// so the pipeline never re-checks set membership against raw flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunModes {
    fetch: bool,
    convert: bool,
    graph: bool,
}

impl RunModes {
    pub fn from_modes(modes: &[Mode]) -> Result<Self, HarvestError> {
        if modes.is_empty() {
            return Err(HarvestError::EmptyRunModes);
        }
        let mut resolved = Self {
            fetch: false,
            convert: false,
            graph: false,
        };
        for mode in modes {
            match mode {
                Mode::Fetch => resolved.fetch = true,
                Mode::Convert => resolved.convert = true,
                Mode::Graph => resolved.graph = true,
                Mode::All => {
                    resolved.fetch = true;
                    resolved.convert = true;
                    resolved.graph = true;
                }
            }
        }
        Ok(resolved)
    }

    pub fn fetch(&self) -> bool {
        self.fetch
    }

    pub fn convert(&self) -> bool {
        self.convert
    }

    pub fn graph(&self) -> bool {
        self.graph
    }
}
