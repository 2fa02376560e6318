use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};

use dbgap_harvest::convert::XmlConverter;
use dbgap_harvest::error::HarvestError;
use dbgap_harvest::graph::JsonLdAssembler;
use dbgap_harvest::layout::Staging;
use dbgap_harvest::pipeline::{Harvester, RunRequest};
use dbgap_harvest::remote::RemoteSource;
use dbgap_harvest::study::{Mode, RunModes, StudyIdentifier};

const DICT_XML: &str = "phs000774.v1.pht003910.v1.p1.data_dict.xml";
const STUDY_XML: &str = "GapExchange_phs000774.v1.p1.xml";
const SCHEMA: &str = "https://schema.example.org/dats#";

#[derive(Default)]
struct MockRemote {
    calls: Arc<Mutex<usize>>,
    files: Vec<&'static str>,
}

impl RemoteSource for MockRemote {
    fn download_dir(
        &self,
        _remote_subpath: &str,
        local_dir: &Utf8Path,
        predicate: &dyn Fn(&str) -> bool,
    ) -> Result<usize, HarvestError> {
        *self.calls.lock().unwrap() += 1;
        let mut count = 0;
        for name in &self.files {
            if predicate(name) {
                std::fs::write(local_dir.join(name).as_std_path(), b"<xml/>").unwrap();
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Echoes a fixed document for well-formed markup and the service's
/// `ERROR:` marker for anything containing `BAD`.
#[derive(Default)]
struct ScriptedConverter {
    calls: Arc<Mutex<usize>>,
}

impl XmlConverter for ScriptedConverter {
    fn convert(&self, raw_xml: &str) -> Result<String, HarvestError> {
        *self.calls.lock().unwrap() += 1;
        if raw_xml.contains("BAD") {
            return Ok("ERROR: malformed markup".to_string());
        }
        Ok(r#"{"converted": true}"#.to_string())
    }
}

fn study() -> StudyIdentifier {
    StudyIdentifier::new(774, 1, 1).unwrap()
}

fn staging_in(temp: &tempfile::TempDir) -> Staging {
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    Staging::for_study(&root, &study())
}

fn seed_xml(staging: &Staging, name: &str, content: &str) {
    std::fs::create_dir_all(staging.xml_dir().as_std_path()).unwrap();
    std::fs::write(staging.xml_dir().join(name).as_std_path(), content).unwrap();
}

fn request(modes: &[Mode]) -> RunRequest {
    RunRequest {
        study: study(),
        modes: RunModes::from_modes(modes).unwrap(),
        schema_uri: Some(SCHEMA.to_string()),
    }
}

#[test]
fn convert_and_graph_stage_one_dictionary() {
    let temp = tempfile::tempdir().unwrap();
    let staging = staging_in(&temp);
    seed_xml(&staging, DICT_XML, "<data_table/>");
    seed_xml(&staging, STUDY_XML, "<GaPExchange/>");

    let harvester = Harvester::new(
        staging.clone(),
        MockRemote::default(),
        ScriptedConverter::default(),
        JsonLdAssembler,
    );
    let report = harvester
        .run(&request(&[Mode::Convert, Mode::Graph]))
        .unwrap();

    assert_eq!(report.fetched, None);
    assert_eq!(report.study_description, Some(true));
    let summary = report.dictionaries.unwrap();
    assert_eq!((summary.total, summary.succeeded), (1, 1));

    assert!(staging
        .json_dir()
        .join("pht003910.v1.json")
        .as_std_path()
        .exists());
    assert!(staging
        .ttl_dir()
        .join("pht003910.v1.ttl")
        .as_std_path()
        .exists());
    assert!(staging
        .json_dir()
        .join("StudyDescription.json")
        .as_std_path()
        .exists());
    assert!(staging
        .json_dir()
        .join("StudyDescription.biocaddie.json")
        .as_std_path()
        .exists());
    assert!(staging
        .ttl_dir()
        .join("StudyDescription.ttl")
        .as_std_path()
        .exists());

    // The catalog summary names the member table.
    let summary_doc: serde_json::Value = serde_json::from_slice(
        &std::fs::read(
            staging
                .json_dir()
                .join("StudyDescription.biocaddie.json")
                .as_std_path(),
        )
        .unwrap(),
    )
    .unwrap();
    assert!(summary_doc["resultsIn"][0]
        .as_str()
        .unwrap()
        .ends_with("pht003910.v1"));
}

#[test]
fn conversion_rejection_leaves_no_output() {
    let temp = tempfile::tempdir().unwrap();
    let staging = staging_in(&temp);
    seed_xml(&staging, DICT_XML, "<BAD/>");
    seed_xml(&staging, STUDY_XML, "<GaPExchange/>");

    let harvester = Harvester::new(
        staging.clone(),
        MockRemote::default(),
        ScriptedConverter::default(),
        JsonLdAssembler,
    );
    let report = harvester
        .run(&request(&[Mode::Convert, Mode::Graph]))
        .unwrap();

    let summary = report.dictionaries.unwrap();
    assert_eq!((summary.total, summary.succeeded), (1, 0));
    assert!(!staging
        .json_dir()
        .join("pht003910.v1.json")
        .as_std_path()
        .exists());
    assert!(!staging
        .ttl_dir()
        .join("pht003910.v1.ttl")
        .as_std_path()
        .exists());
}

#[test]
fn one_bad_file_among_many_is_isolated() {
    let temp = tempfile::tempdir().unwrap();
    let staging = staging_in(&temp);
    seed_xml(&staging, "phs000774.v1.pht003910.v1.p1.data_dict.xml", "<a/>");
    seed_xml(&staging, "phs000774.v1.pht003911.v1.p1.data_dict.xml", "<BAD/>");
    seed_xml(&staging, "phs000774.v1.pht003912.v1.p1.data_dict.xml", "<c/>");
    seed_xml(&staging, STUDY_XML, "<GaPExchange/>");

    let harvester = Harvester::new(
        staging.clone(),
        MockRemote::default(),
        ScriptedConverter::default(),
        JsonLdAssembler,
    );
    let report = harvester.run(&request(&[Mode::Convert])).unwrap();

    let summary = report.dictionaries.unwrap();
    assert_eq!((summary.total, summary.succeeded), (3, 2));
    assert!(staging
        .json_dir()
        .join("pht003910.v1.json")
        .as_std_path()
        .exists());
    assert!(!staging
        .json_dir()
        .join("pht003911.v1.json")
        .as_std_path()
        .exists());
    assert!(staging
        .json_dir()
        .join("pht003912.v1.json")
        .as_std_path()
        .exists());
}

#[test]
fn repeated_runs_are_byte_identical() {
    let temp = tempfile::tempdir().unwrap();
    let staging = staging_in(&temp);
    seed_xml(&staging, DICT_XML, "<data_table/>");
    seed_xml(&staging, STUDY_XML, "<GaPExchange/>");

    let harvester = Harvester::new(
        staging.clone(),
        MockRemote::default(),
        ScriptedConverter::default(),
        JsonLdAssembler,
    );
    let req = request(&[Mode::Convert, Mode::Graph]);
    harvester.run(&req).unwrap();

    let snapshot = |dir: &Utf8Path| {
        let mut entries = std::fs::read_dir(dir.as_std_path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect::<Vec<_>>();
        entries.sort();
        entries
            .into_iter()
            .map(|path| (path.clone(), std::fs::read(path).unwrap()))
            .collect::<Vec<_>>()
    };
    let json_before = snapshot(staging.json_dir());
    let ttl_before = snapshot(staging.ttl_dir());

    harvester.run(&req).unwrap();

    assert_eq!(json_before, snapshot(staging.json_dir()));
    assert_eq!(ttl_before, snapshot(staging.ttl_dir()));
}

#[test]
fn graph_only_without_intermediates_fails_per_file() {
    let temp = tempfile::tempdir().unwrap();
    let staging = staging_in(&temp);
    seed_xml(&staging, DICT_XML, "<data_table/>");

    let remote = MockRemote::default();
    let converter = ScriptedConverter::default();
    let harvester = Harvester::new(staging.clone(), remote, converter, JsonLdAssembler);
    let report = harvester.run(&request(&[Mode::Graph])).unwrap();

    let summary = report.dictionaries.unwrap();
    assert_eq!((summary.total, summary.succeeded), (1, 0));
    // Neither fetch nor convert work was attempted.
    assert_eq!(report.fetched, None);
}

#[test]
fn graph_only_attempts_no_fetch_or_convert_calls() {
    let temp = tempfile::tempdir().unwrap();
    let staging = staging_in(&temp);
    seed_xml(&staging, DICT_XML, "<data_table/>");

    let remote = MockRemote::default();
    let converter = ScriptedConverter::default();
    let remote_calls = Arc::clone(&remote.calls);
    let converter_calls = Arc::clone(&converter.calls);

    let harvester = Harvester::new(staging, remote, converter, JsonLdAssembler);
    harvester.run(&request(&[Mode::Graph])).unwrap();

    assert_eq!(*remote_calls.lock().unwrap(), 0);
    assert_eq!(*converter_calls.lock().unwrap(), 0);
}

#[test]
fn fetch_only_downloads_matching_files() {
    let temp = tempfile::tempdir().unwrap();
    let staging = staging_in(&temp);

    let remote = MockRemote {
        files: vec![DICT_XML, STUDY_XML, "phenotype.txt"],
        ..MockRemote::default()
    };
    let harvester = Harvester::new(
        staging.clone(),
        remote,
        ScriptedConverter::default(),
        JsonLdAssembler,
    );
    let report = harvester.run(&request(&[Mode::Fetch])).unwrap();

    // The name predicate admits dictionaries and the study description only.
    assert_eq!(report.fetched, Some(2));
    assert_eq!(report.study_description, None);
    assert!(report.dictionaries.is_none());
    assert!(staging.xml_dir().join(DICT_XML).as_std_path().exists());
    assert!(staging.xml_dir().join(STUDY_XML).as_std_path().exists());
    assert!(!staging
        .xml_dir()
        .join("phenotype.txt")
        .as_std_path()
        .exists());
}

#[test]
fn remote_failure_is_fatal() {
    struct DownRemote;
    impl RemoteSource for DownRemote {
        fn download_dir(
            &self,
            _remote_subpath: &str,
            _local_dir: &Utf8Path,
            _predicate: &dyn Fn(&str) -> bool,
        ) -> Result<usize, HarvestError> {
            Err(HarvestError::RemoteUnavailable("connection refused".to_string()))
        }
    }

    let temp = tempfile::tempdir().unwrap();
    let staging = staging_in(&temp);
    let harvester = Harvester::new(
        staging,
        DownRemote,
        ScriptedConverter::default(),
        JsonLdAssembler,
    );
    let err = harvester.run(&request(&[Mode::All])).unwrap_err();
    assert!(matches!(err, HarvestError::RemoteUnavailable(_)));
}
