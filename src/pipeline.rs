use std::fs;

use camino::Utf8Path;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::batch::{self, RunSummary};
use crate::convert::{decode_payload, XmlConverter};
use crate::error::HarvestError;
use crate::graph::GraphAssembler;
use crate::layout::{self, Staging, STUDY_DESCRIPTION_STEM};
use crate::listing;
use crate::remote::RemoteSource;
use crate::reshape;
use crate::study::{RunModes, StudyIdentifier};

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub study: StudyIdentifier,
    pub modes: RunModes,
    pub schema_uri: Option<String>,
}

/// The only caller-observable result of a run. Per-file failures are folded
/// into `dictionaries`; a stage that was not requested stays `None`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub fetched: Option<usize>,
    pub study_description: Option<bool>,
    pub dictionaries: Option<RunSummary>,
}

/// Pipeline assembler: owns the staging layout and the three external
/// collaborators for the lifetime of one run. No global state; everything a
/// stage needs travels through this context.
pub struct Harvester<R: RemoteSource, C: XmlConverter, G: GraphAssembler> {
    staging: Staging,
    remote: R,
    converter: C,
    assembler: G,
}

impl<R: RemoteSource, C: XmlConverter, G: GraphAssembler> Harvester<R, C, G> {
    pub fn new(staging: Staging, remote: R, converter: C, assembler: G) -> Self {
        Self {
            staging,
            remote,
            converter,
            assembler,
        }
    }

    pub fn run(&self, request: &RunRequest) -> Result<RunReport, HarvestError> {
        let modes = request.modes;
        let schema_uri = request.schema_uri.as_deref();
        // Configuration precondition, checked before any I/O.
        if modes.graph() && schema_uri.is_none() {
            return Err(HarvestError::MissingSchemaUri);
        }

        if modes.fetch() {
            layout::ensure_dir(self.staging.xml_dir())?;
        }
        if modes.convert() {
            layout::ensure_dir(self.staging.json_dir())?;
        }
        if modes.graph() {
            layout::ensure_dir(self.staging.ttl_dir())?;
        }

        let fetched = if modes.fetch() {
            let study_file = layout::study_description_name(&request.study);
            let predicate = move |name: &str| layout::is_data_dict(name) || name == study_file;
            let count = self.remote.download_dir(
                &layout::remote_subpath(&request.study),
                self.staging.xml_dir(),
                &predicate,
            )?;
            info!(study = %request.study, files = count, "fetch complete");
            Some(count)
        } else {
            None
        };

        // The study description is a single well-known file, handled once
        // outside the per-file batch loop. Its failure is isolated too.
        let study_description = if modes.convert() || modes.graph() {
            match self.process_study_description(&request.study, modes, schema_uri) {
                Ok(()) => Some(true),
                Err(err) => {
                    warn!(study = %request.study, error = %err, "study description stage failed");
                    Some(false)
                }
            }
        } else {
            None
        };

        let dictionaries = if modes.convert() || modes.graph() {
            Some(batch::run_batch(
                self.staging.xml_dir(),
                layout::is_data_dict,
                |name| self.process_data_dict(name, modes, schema_uri),
            )?)
        } else {
            None
        };

        Ok(RunReport {
            fetched,
            study_description,
            dictionaries,
        })
    }

    fn process_study_description(
        &self,
        study: &StudyIdentifier,
        modes: RunModes,
        schema_uri: Option<&str>,
    ) -> Result<(), HarvestError> {
        let raw_path = self
            .staging
            .json_dir()
            .join(format!("{STUDY_DESCRIPTION_STEM}.json"));
        let summary_path = self
            .staging
            .json_dir()
            .join(format!("{STUDY_DESCRIPTION_STEM}.biocaddie.json"));

        if modes.convert() {
            let xml_path = self
                .staging
                .xml_dir()
                .join(layout::study_description_name(study));
            let raw_xml = read_text(&xml_path)?;
            let payload = self.converter.convert(&raw_xml)?;
            let document = decode_payload(&payload, &xml_path)?;
            layout::write_bytes_atomic(&raw_path, &pretty_bytes(&document)?)?;

            let tables = listing::list_matching(self.staging.xml_dir(), layout::is_data_dict)?
                .iter()
                .filter_map(|name| layout::table_id(name).ok())
                .collect::<Vec<_>>();
            let summary = reshape::reshape_study(&document, &tables);
            layout::write_bytes_atomic(&summary_path, &pretty_bytes(&summary)?)?;
        }

        if modes.graph() {
            let schema = schema_uri.ok_or(HarvestError::MissingSchemaUri)?;
            let document = read_document(&summary_path)?;
            let graph = self.assembler.assemble(&document, schema)?;
            let ttl_path = self
                .staging
                .ttl_dir()
                .join(format!("{STUDY_DESCRIPTION_STEM}.ttl"));
            layout::write_bytes_atomic(&ttl_path, &graph.serialize_turtle())?;
        }

        Ok(())
    }

    fn process_data_dict(
        &self,
        xml_name: &str,
        modes: RunModes,
        schema_uri: Option<&str>,
    ) -> Result<(), HarvestError> {
        let json_name = layout::data_dict_json_name(xml_name)?;
        let json_path = self.staging.json_dir().join(&json_name);

        if modes.convert() {
            let xml_path = self.staging.xml_dir().join(xml_name);
            let raw_xml = read_text(&xml_path)?;
            let payload = self.converter.convert(&raw_xml)?;
            let document = decode_payload(&payload, &xml_path)?;
            let reshaped = reshape::reshape_data_dict(&document, xml_name);
            layout::write_bytes_atomic(&json_path, &pretty_bytes(&reshaped)?)?;
        }

        if modes.graph() {
            let schema = schema_uri.ok_or(HarvestError::MissingSchemaUri)?;
            // When convert was not requested the intermediate must already
            // exist from a prior run; a missing one is this file's failure.
            let document = read_document(&json_path)?;
            let graph = self.assembler.assemble(&document, schema)?;
            let ttl_path = self.staging.ttl_dir().join(layout::ttl_name(&json_name));
            layout::write_bytes_atomic(&ttl_path, &graph.serialize_turtle())?;
        }

        Ok(())
    }
}

fn read_text(path: &Utf8Path) -> Result<String, HarvestError> {
    fs::read_to_string(path.as_std_path())
        .map_err(|err| HarvestError::Filesystem(format!("{path}: {err}")))
}

fn read_document(path: &Utf8Path) -> Result<Value, HarvestError> {
    serde_json::from_str(&read_text(path)?)
        .map_err(|err| HarvestError::MalformedDocument(format!("{path}: {err}")))
}

fn pretty_bytes(value: &Value) -> Result<Vec<u8>, HarvestError> {
    serde_json::to_vec_pretty(value).map_err(|err| HarvestError::Filesystem(err.to_string()))
}
