use serde_json::{json, Value};

use crate::layout;

/// Namespace under which dbGaP accessions are minted as identifiers.
pub const DBGAP: &str = "https://identifiers.org/dbgap/";

/// Canonical (bioCADDIE-shaped) study summary from the converted study
/// description, plus one catalog entry per member table. Pure; fields the
/// converted document does not carry come through as null.
pub fn reshape_study(raw: &Value, pht_entries: &[String]) -> Value {
    let study = raw
        .pointer("/GaPExchange/Studies/Study")
        .cloned()
        .unwrap_or(Value::Null);
    let accession = study
        .get("accession")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let field = |pointer: &str| study.pointer(pointer).cloned().unwrap_or(Value::Null);

    json!({
        "@type": "Study",
        "identifierInfo": [{
            "identifier": format!("{DBGAP}{accession}"),
            "identifierScheme": "dbGaP",
        }],
        "title": field("/Configuration/StudyNameEntrez"),
        "description": field("/Configuration/StudyNameReportPage"),
        "study_types": field("/Configuration/StudyTypes/StudyType"),
        "resultsIn": pht_entries
            .iter()
            .map(|pht| Value::String(format!("{DBGAP}{pht}")))
            .collect::<Vec<_>>(),
    })
}

/// Canonical form of one converted data dictionary. Pure; a source name
/// outside the dbGaP convention just yields no identifier block.
pub fn reshape_data_dict(document: &Value, source_name: &str) -> Value {
    let identifier_info = layout::table_id(source_name).ok().map(|table| {
        json!([{
            "identifier": format!("{DBGAP}{table}"),
            "identifierScheme": "dbGaP",
        }])
    });

    json!({
        "@type": "DataDictionary",
        "identifierInfo": identifier_info.unwrap_or(Value::Null),
        "sourceFile": source_name,
        "dataTable": document.clone(),
    })
}
