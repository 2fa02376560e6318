use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use regex::Regex;

use crate::error::HarvestError;
use crate::study::StudyIdentifier;

pub const DATA_DICT_SUFFIX: &str = ".data_dict.xml";
pub const STUDY_DESCRIPTION_STEM: &str = "StudyDescription";

/// The three per-study staging directories: raw XML, intermediate JSON and
/// serialized graph output. Directories are created lazily and never removed.
#[derive(Debug, Clone)]
pub struct Staging {
    xml_dir: Utf8PathBuf,
    json_dir: Utf8PathBuf,
    ttl_dir: Utf8PathBuf,
}

impl Staging {
    pub fn for_study(data_root: &Utf8Path, study: &StudyIdentifier) -> Self {
        let root = data_root.join(study.full_id());
        Self {
            xml_dir: root.join("xml"),
            json_dir: root.join("json"),
            ttl_dir: root.join("ttl"),
        }
    }

    pub fn with_dirs(xml_dir: Utf8PathBuf, json_dir: Utf8PathBuf, ttl_dir: Utf8PathBuf) -> Self {
        Self {
            xml_dir,
            json_dir,
            ttl_dir,
        }
    }

    pub fn xml_dir(&self) -> &Utf8Path {
        &self.xml_dir
    }

    pub fn json_dir(&self) -> &Utf8Path {
        &self.json_dir
    }

    pub fn ttl_dir(&self) -> &Utf8Path {
        &self.ttl_dir
    }
}

pub fn default_data_root() -> Result<Utf8PathBuf, HarvestError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("dbgap-harvest")).ok()
        })
        .ok_or_else(|| HarvestError::Filesystem("unable to resolve data root".to_string()))
}

pub fn ensure_dir(dir: &Utf8Path) -> Result<(), HarvestError> {
    fs::create_dir_all(dir.as_std_path()).map_err(|err| HarvestError::Filesystem(err.to_string()))
}

/// Remote subtree for one study under the dbGaP studies root.
pub fn remote_subpath(study: &StudyIdentifier) -> String {
    format!("{}/{}", study.accession(), study.versioned())
}

/// The single top-level study descriptor, e.g. `GapExchange_phs000774.v1.p1.xml`.
pub fn study_description_name(study: &StudyIdentifier) -> String {
    format!("GapExchange_{}.xml", study.full_id())
}

pub fn is_data_dict(name: &str) -> bool {
    name.ends_with(DATA_DICT_SUFFIX)
}

/// Member table id from a data dictionary file name:
/// `phs000774.v1.pht003910.v1.p1.data_dict.xml` -> `pht003910.v1`.
pub fn table_id(xml_name: &str) -> Result<String, HarvestError> {
    let pattern = Regex::new(r"^phs\d+\.v\d+\.(pht\d+\.v\d+)\.p\d+\.data_dict\.xml$").unwrap();
    pattern
        .captures(xml_name)
        .map(|captures| captures[1].to_string())
        .ok_or_else(|| HarvestError::InvalidFileName(xml_name.to_string()))
}

/// Intermediate output name for a data dictionary: the table id plus `.json`.
pub fn data_dict_json_name(xml_name: &str) -> Result<String, HarvestError> {
    Ok(format!("{}.json", table_id(xml_name)?))
}

/// Graph output name from an intermediate name: the `.json` suffix replaced
/// with `.ttl`.
pub fn ttl_name(json_name: &str) -> String {
    match json_name.strip_suffix(".json") {
        Some(stem) => format!("{stem}.ttl"),
        None => format!("{json_name}.ttl"),
    }
}

/// Write through a sibling temp file then rename, so a partial write never
/// lands at the final path. Parents are created on demand.
pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), HarvestError> {
    let parent = path
        .parent()
        .ok_or_else(|| HarvestError::Filesystem(format!("no parent directory for {path}")))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    let temp = tempfile::Builder::new()
        .prefix("dbgap-harvest")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    fs::write(temp.path(), content).map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    if path.as_std_path().exists() {
        fs::remove_file(path.as_std_path())
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    }
    temp.persist(path.as_std_path())
        .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn study() -> StudyIdentifier {
        StudyIdentifier::new(774, 1, 1).unwrap()
    }

    #[test]
    fn staging_paths_follow_the_template() {
        let staging = Staging::for_study(Utf8Path::new("/data"), &study());
        assert_eq!(staging.xml_dir().as_str(), "/data/phs000774.v1.p1/xml");
        assert_eq!(staging.json_dir().as_str(), "/data/phs000774.v1.p1/json");
        assert_eq!(staging.ttl_dir().as_str(), "/data/phs000774.v1.p1/ttl");
    }

    #[test]
    fn remote_subtree_template() {
        assert_eq!(remote_subpath(&study()), "phs000774/phs000774.v1");
    }

    #[test]
    fn study_description_file_name() {
        assert_eq!(
            study_description_name(&study()),
            "GapExchange_phs000774.v1.p1.xml"
        );
    }

    #[test]
    fn data_dict_names_derive_table_id() {
        let name = "phs000774.v1.pht003910.v1.p1.data_dict.xml";
        assert!(is_data_dict(name));
        assert_eq!(table_id(name).unwrap(), "pht003910.v1");
        assert_eq!(data_dict_json_name(name).unwrap(), "pht003910.v1.json");
    }

    #[test]
    fn non_conforming_name_is_rejected() {
        let err = data_dict_json_name("notes.data_dict.xml").unwrap_err();
        assert_matches!(err, HarvestError::InvalidFileName(_));
    }

    #[test]
    fn ttl_name_replaces_suffix() {
        assert_eq!(ttl_name("pht003910.v1.json"), "pht003910.v1.ttl");
        assert_eq!(ttl_name("StudyDescription.json"), "StudyDescription.ttl");
    }

    #[test]
    fn atomic_write_overwrites() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("nested").join("out.json")).unwrap();
        write_bytes_atomic(&path, b"first").unwrap();
        write_bytes_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read(path.as_std_path()).unwrap(), b"second");
    }
}
