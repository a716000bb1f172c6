//! Column sets and per-hit row projection for each export layout.

use serde_json::Value;

use super::{DownloadOption, ExportError};
use crate::domain::IndexDomain;

/// Ordered cells of one CSV row.
pub type ExportRow = Vec<String>;

const ENA_FASTA_BASE: &str = "https://www.ebi.ac.uk/ena/browser/api/fasta";

const ASSEMBLIES_HEADER: &[&str] = &[
    "Scientific Name",
    "Accession",
    "Version",
    "Assembly Name",
    "Assembly Description",
    "Link to chromosomes, contigs and scaffolds all in one",
];

const ANNOTATION_HEADER: &[&str] = &[
    "Annotation GTF",
    "Annotation GFF3",
    "Proteins Fasta",
    "Transcripts Fasta",
    "Softmasked genomes Fasta",
];

const RAW_FILES_HEADER: &[&str] = &[
    "Study Accession",
    "Sample Accession",
    "Experiment Accession",
    "Run Accession",
    "Tax Id",
    "Scientific Name",
    "FASTQ FTP",
    "Submitted FTP",
    "SRA FTP",
    "Library Construction Protocol",
];

const PORTAL_METADATA_HEADER: &[&str] = &[
    "Organism",
    "Common Name",
    "Common Name Source",
    "Current Status",
];

const TRACKING_METADATA_HEADER: &[&str] = &[
    "Organism",
    "Common Name",
    "Metadata submitted to BioSamples",
    "Raw data submitted to ENA",
    "Mapped reads submitted to ENA",
    "Assemblies submitted to ENA",
    "Annotation complete",
    "Annotation submitted to ENA",
];

/// Raw-file experiment fields before and after the FASTQ cell.
const RAW_FILES_LEADING: &[&str] = &[
    "study_accession",
    "sample_accession",
    "experiment_accession",
    "run_accession",
    "tax_id",
    "scientific_name",
];
const RAW_FILES_TRAILING: &[&str] = &["submitted_ftp", "sra-ftp", "library_construction_protocol"];

const PORTAL_METADATA_FIELDS: &[&str] = &["organism", "commonName", "commonNameSource", "currentStatus"];

const TRACKING_METADATA_FIELDS: &[&str] = &[
    "organism",
    "commonName",
    "biosamples",
    "raw_data",
    "mapped_reads",
    "assemblies_status",
    "annotation_complete",
    "annotation_status",
];

/// Column set and row projection for one (download option, domain) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportLayout {
    Assemblies,
    Annotation,
    RawFiles,
    PortalMetadata,
    TrackingMetadata,
}

impl ExportLayout {
    /// Pick the layout for `option` on `domain`.
    ///
    /// File-oriented options work on any domain; metadata columns only exist
    /// for the portal and tracking domains.
    pub fn resolve(option: DownloadOption, domain: IndexDomain) -> Result<Self, ExportError> {
        match (option, domain) {
            (DownloadOption::Assemblies, _) => Ok(Self::Assemblies),
            (DownloadOption::Annotation, _) => Ok(Self::Annotation),
            (DownloadOption::RawFiles, _) => Ok(Self::RawFiles),
            (DownloadOption::Metadata, IndexDomain::DataPortal) => Ok(Self::PortalMetadata),
            (DownloadOption::Metadata, IndexDomain::TrackingStatus) => Ok(Self::TrackingMetadata),
            (option, domain) => Err(ExportError::UnsupportedLayout { option, domain }),
        }
    }

    pub fn header(self) -> &'static [&'static str] {
        match self {
            Self::Assemblies => ASSEMBLIES_HEADER,
            Self::Annotation => ANNOTATION_HEADER,
            Self::RawFiles => RAW_FILES_HEADER,
            Self::PortalMetadata => PORTAL_METADATA_HEADER,
            Self::TrackingMetadata => TRACKING_METADATA_HEADER,
        }
    }

    /// Project one hit's `_source` into rows. Missing fields never fail.
    pub fn project(self, source: &Value) -> Vec<ExportRow> {
        match self {
            Self::Assemblies => elements(source, "assemblies")
                .map(|assembly| assembly_row(source, assembly))
                .collect(),
            Self::Annotation => elements(source, "annotation").map(annotation_row).collect(),
            Self::RawFiles => elements(source, "experiment")
                .flat_map(raw_file_rows)
                .collect(),
            Self::PortalMetadata => vec![flat_row(source, PORTAL_METADATA_FIELDS)],
            Self::TrackingMetadata => vec![flat_row(source, TRACKING_METADATA_FIELDS)],
        }
    }
}

/// Elements of the array at `key`; anything else yields nothing.
fn elements<'a>(source: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    source
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// Render a cell: missing → `default`, `null` → empty, strings verbatim,
/// anything else as JSON text.
fn cell(value: Option<&Value>, default: &str) -> String {
    match value {
        None => default.to_string(),
        Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn field(object: &Value, key: &str, default: &str) -> String {
    cell(object.get(key), default)
}

/// `object.outer.inner`, treating a non-object `outer` as missing.
fn nested_field(object: &Value, outer: &str, inner: &str, default: &str) -> String {
    cell(object.get(outer).and_then(|o| o.get(inner)), default)
}

fn flat_row(source: &Value, fields: &[&str]) -> ExportRow {
    fields.iter().map(|key| field(source, key, "")).collect()
}

fn assembly_row(source: &Value, assembly: &Value) -> ExportRow {
    let link = match assembly.get("accession") {
        Some(Value::Null) | None => String::new(),
        accession => match cell(accession, "") {
            a if a.is_empty() => a,
            a => format!("{ENA_FASTA_BASE}/{a}?download=true&gzip=true"),
        },
    };
    vec![
        field(source, "organism", ""),
        field(assembly, "accession", "-"),
        field(assembly, "version", "-"),
        field(assembly, "assembly_name", ""),
        field(assembly, "description", ""),
        link,
    ]
}

fn annotation_row(annotation: &Value) -> ExportRow {
    vec![
        nested_field(annotation, "annotation", "GTF", "-"),
        nested_field(annotation, "annotation", "GFF3", "-"),
        nested_field(annotation, "proteins", "FASTA", ""),
        nested_field(annotation, "transcripts", "FASTA", ""),
        nested_field(annotation, "softmasked_genome", "FASTA", ""),
    ]
}

/// One row per `;`-separated FASTQ entry, or a single row when there is none.
fn raw_file_rows(experiment: &Value) -> Vec<ExportRow> {
    let leading: Vec<String> = RAW_FILES_LEADING
        .iter()
        .map(|key| field(experiment, key, ""))
        .collect();
    let trailing: Vec<String> = RAW_FILES_TRAILING
        .iter()
        .map(|key| field(experiment, key, ""))
        .collect();

    let fastq = field(experiment, "fastq_ftp", "");
    let files: Vec<&str> = if fastq.is_empty() {
        vec![""]
    } else {
        fastq.split(';').collect()
    };

    files
        .into_iter()
        .map(|file| {
            let mut row = Vec::with_capacity(RAW_FILES_HEADER.len());
            row.extend(leading.iter().cloned());
            row.push(file.to_string());
            row.extend(trailing.iter().cloned());
            row
        })
        .collect()
}
