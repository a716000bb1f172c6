//! CSV export of drained hits.
//!
//! A download option plus the index domain selects an [`ExportLayout`];
//! the layout fixes the header and projects each hit into zero or more rows.

mod layout;

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use thiserror::Error;

use crate::domain::IndexDomain;
use crate::gateway::HitRecord;

pub use layout::{ExportLayout, ExportRow};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unknown download option: {0}")]
    UnknownDownloadOption(String),

    #[error("download option `{option}` is not available for {domain}")]
    UnsupportedLayout {
        option: DownloadOption,
        domain: IndexDomain,
    },

    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to flush CSV: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportError {
    /// Whether the caller asked for something that cannot be exported.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownDownloadOption(_) | Self::UnsupportedLayout { .. }
        )
    }
}

/// What a download request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownloadOption {
    Assemblies,
    Annotation,
    RawFiles,
    Metadata,
}

impl DownloadOption {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assemblies => "assemblies",
            Self::Annotation => "annotation",
            Self::RawFiles => "raw_files",
            Self::Metadata => "metadata",
        }
    }
}

impl fmt::Display for DownloadOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadOption {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "assemblies" => Ok(Self::Assemblies),
            "annotation" => Ok(Self::Annotation),
            "raw_files" => Ok(Self::RawFiles),
            "metadata" => Ok(Self::Metadata),
            _ => Err(ExportError::UnknownDownloadOption(s.to_string())),
        }
    }
}

/// Write `hits` as CSV to `sink`, header first.
///
/// Returns the number of data rows written.
pub fn write_csv<W: Write>(
    layout: ExportLayout,
    hits: &[HitRecord],
    sink: W,
) -> Result<usize, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(sink);

    writer.write_record(layout.header())?;

    let mut rows = 0;
    for hit in hits {
        for row in layout.project(hit.source()) {
            writer.write_record(&row)?;
            rows += 1;
        }
    }
    writer.flush()?;
    Ok(rows)
}

/// Render `hits` into an in-memory CSV document.
pub fn render_csv(layout: ExportLayout, hits: &[HitRecord]) -> Result<Vec<u8>, ExportError> {
    let mut buffer = Vec::new();
    write_csv(layout, hits, &mut buffer)?;
    Ok(buffer)
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hit(source: serde_json::Value) -> HitRecord {
        HitRecord::new(json!({ "_id": "x", "_source": source }))
    }

    fn lines(bytes: &[u8]) -> Vec<String> {
        String::from_utf8(bytes.to_vec())
            .unwrap()
            .split("\r\n")
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn download_option_is_case_insensitive() {
        assert_eq!("Raw_Files".parse::<DownloadOption>().unwrap(), DownloadOption::RawFiles);
        assert_eq!("METADATA".parse::<DownloadOption>().unwrap(), DownloadOption::Metadata);
        assert!(matches!(
            "fasta".parse::<DownloadOption>(),
            Err(ExportError::UnknownDownloadOption(o)) if o == "fasta"
        ));
    }

    #[test]
    fn empty_input_writes_header_only() {
        let bytes = render_csv(ExportLayout::Annotation, &[]).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "Annotation GTF,Annotation GFF3,Proteins Fasta,Transcripts Fasta,Softmasked genomes Fasta\r\n"
        );
    }

    #[test]
    fn metadata_export_applies_defaults() {
        let hits = vec![
            hit(json!({
                "organism": "Vulpes vulpes",
                "commonName": "red fox",
                "commonNameSource": "NCBI",
                "currentStatus": "Annotation Complete"
            })),
            hit(json!({ "organism": "Lynx lynx" })),
            hit(json!({ "commonName": null, "currentStatus": "Biosamples" })),
        ];

        let mut buffer = Vec::new();
        let rows = write_csv(ExportLayout::PortalMetadata, &hits, &mut buffer).unwrap();

        assert_eq!(rows, 3);
        assert_eq!(
            lines(&buffer),
            vec![
                "Organism,Common Name,Common Name Source,Current Status",
                "Vulpes vulpes,red fox,NCBI,Annotation Complete",
                "Lynx lynx,,,",
                ",,,Biosamples",
            ]
        );
    }

    #[test]
    fn cells_with_commas_are_quoted() {
        let hits = vec![hit(json!({ "organism": "Canis lupus, familiaris" }))];
        let bytes = render_csv(ExportLayout::PortalMetadata, &hits).unwrap();
        assert_eq!(lines(&bytes)[1], "\"Canis lupus, familiaris\",,,");
    }

    #[test]
    fn raw_files_fan_out_in_csv() {
        let hits = vec![hit(json!({
            "experiment": [{ "run_accession": "ERR1", "fastq_ftp": "a.fastq;b.fastq" }]
        }))];
        let bytes = render_csv(ExportLayout::RawFiles, &hits).unwrap();
        let lines = lines(&bytes);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], ",,,ERR1,,,a.fastq,,,");
        assert_eq!(lines[2], ",,,ERR1,,,b.fastq,,,");
    }

    #[test]
    fn client_errors_are_flagged() {
        assert!(ExportError::UnknownDownloadOption("x".into()).is_client_error());
        assert!(
            ExportError::UnsupportedLayout {
                option: DownloadOption::Metadata,
                domain: IndexDomain::Articles,
            }
            .is_client_error()
        );
        assert!(!ExportError::Io(std::io::Error::other("disk")).is_client_error());
    }
}
