use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

use crate::snippet::preview;
use crate::stats::human_size;

pub type DocumentId = u64;

/// Identity of an authenticated user as established by the session service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Which extraction path produced a document's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    DirectText,
    Ocr,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::DirectText => "direct-text",
            ExtractionMethod::Ocr => "ocr",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct-text" | "direct" => Ok(ExtractionMethod::DirectText),
            "ocr" => Ok(ExtractionMethod::Ocr),
            other => Err(format!("unknown extraction method: {other}")),
        }
    }
}

/// Fields supplied when a document record is created. The store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    pub owner_id: UserId,
    pub file_name: String,
    pub size_bytes: u64,
    pub extraction_method: ExtractionMethod,
    pub extracted_text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub processed_at: OffsetDateTime,
    pub processing_seconds: Option<f64>,
}

/// A persisted document record. Everything except the soft-delete pair is write-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub owner_id: UserId,
    pub file_name: String,
    pub size_bytes: u64,
    pub extraction_method: ExtractionMethod,
    pub extracted_text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub processed_at: OffsetDateTime,
    pub processing_seconds: Option<f64>,
    pub deleted: bool,
    #[serde(with = "rfc3339_opt")]
    pub deleted_at: Option<OffsetDateTime>,
}

/// Optional timestamp carried as `Option<String>`.
///
/// `time::serde::rfc3339::option` needs a self-describing format, which bincode is not.
mod rfc3339_opt {
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use time::format_description::well_known::Rfc3339;
    use time::OffsetDateTime;

    pub fn serialize<S: Serializer>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error> {
        let text = value.map(|at| at.format(&Rfc3339)).transpose().map_err(S::Error::custom)?;
        text.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|text| OffsetDateTime::parse(&text, &Rfc3339).map_err(D::Error::custom))
            .transpose()
    }
}

impl Document {
    pub fn from_new(id: DocumentId, new: NewDocument) -> Self {
        Self {
            id,
            owner_id: new.owner_id,
            file_name: new.file_name,
            size_bytes: new.size_bytes,
            extraction_method: new.extraction_method,
            extracted_text: new.extracted_text,
            processed_at: new.processed_at,
            processing_seconds: new.processing_seconds,
            deleted: false,
            deleted_at: None,
        }
    }

    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.owner_id == user
    }

    pub fn size_human(&self) -> String {
        human_size(self.size_bytes)
    }

    pub fn preview(&self) -> String {
        preview(&self.extracted_text)
    }

    /// Marks the record deleted. Returns false if it already was.
    pub(crate) fn mark_deleted(&mut self, at: OffsetDateTime) -> bool {
        if self.deleted {
            return false;
        }
        self.deleted = true;
        self.deleted_at = Some(at);
        true
    }
}

/// Full document as returned by a single-document fetch.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    pub id: DocumentId,
    /// Absent when the owner is hidden from this requester.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<UserId>,
    pub file_name: String,
    pub size_bytes: u64,
    pub size_human: String,
    pub extraction_method: ExtractionMethod,
    pub extracted_text: String,
    pub preview: String,
    #[serde(with = "time::serde::rfc3339")]
    pub processed_at: OffsetDateTime,
    pub processing_seconds: Option<f64>,
}

impl From<Document> for DocumentView {
    fn from(doc: Document) -> Self {
        let size_human = doc.size_human();
        let preview = doc.preview();
        Self {
            id: doc.id,
            owner_id: Some(doc.owner_id),
            file_name: doc.file_name,
            size_bytes: doc.size_bytes,
            size_human,
            extraction_method: doc.extraction_method,
            extracted_text: doc.extracted_text,
            preview,
            processed_at: doc.processed_at,
            processing_seconds: doc.processing_seconds,
        }
    }
}

/// Listing projection: metadata plus a short preview, without the full text.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub file_name: String,
    pub size_bytes: u64,
    pub size_human: String,
    pub extraction_method: ExtractionMethod,
    pub preview: String,
    #[serde(with = "time::serde::rfc3339")]
    pub processed_at: OffsetDateTime,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            file_name: doc.file_name.clone(),
            size_bytes: doc.size_bytes,
            size_human: doc.size_human(),
            extraction_method: doc.extraction_method,
            preview: doc.preview(),
            processed_at: doc.processed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn sample() -> Document {
        Document::from_new(
            7,
            NewDocument {
                owner_id: UserId::from("ana"),
                file_name: "report.pdf".into(),
                size_bytes: 2048,
                extraction_method: ExtractionMethod::Ocr,
                extracted_text: "scanned text".into(),
                processed_at: datetime!(2024-03-01 10:00 UTC),
                processing_seconds: Some(1.5),
            },
        )
    }

    #[test]
    fn method_tags_match_wire_names() {
        assert_eq!(serde_json::to_string(&ExtractionMethod::DirectText).unwrap(), "\"direct-text\"");
        assert_eq!(serde_json::to_string(&ExtractionMethod::Ocr).unwrap(), "\"ocr\"");
        assert_eq!("OCR".parse::<ExtractionMethod>().unwrap(), ExtractionMethod::Ocr);
        assert!("pypdf".parse::<ExtractionMethod>().is_err());
    }

    #[test]
    fn delete_mark_is_one_way() {
        let mut doc = sample();
        assert!(!doc.deleted);
        assert!(doc.mark_deleted(datetime!(2024-03-02 10:00 UTC)));
        assert!(!doc.mark_deleted(datetime!(2024-03-03 10:00 UTC)));
        assert_eq!(doc.deleted_at, Some(datetime!(2024-03-02 10:00 UTC)));
    }

    #[test]
    fn record_survives_bincode() {
        let doc = sample();
        let bytes = bincode::serialize(&doc).unwrap();
        let back: Document = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, doc);
        assert_eq!(back.size_human(), "2.00 KB");
    }

    #[test]
    fn deleted_record_survives_bincode() {
        let mut doc = sample();
        doc.mark_deleted(datetime!(2024-03-02 10:30:15.25 UTC));
        let bytes = bincode::serialize(&doc).unwrap();
        let back: Document = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, doc);
        assert_eq!(back.deleted_at, Some(datetime!(2024-03-02 10:30:15.25 UTC)));
    }

    #[test]
    fn deleted_at_is_rfc3339_in_json() {
        let mut doc = sample();
        doc.mark_deleted(datetime!(2024-03-02 10:00 UTC));
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["deleted_at"], "2024-03-02T10:00:00Z");
        let live = serde_json::to_value(sample()).unwrap();
        assert!(live["deleted_at"].is_null());
    }
}
