use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use super::client::ExtractionClient;
use super::parser::parse_structured_text;
use super::prompt::build_extraction_prompt;
use super::schema::{FieldSchema, FieldValue};
use super::ExtractionError;
use crate::period::DocumentKind;

/// The model's JSON object and the schema fields read out of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedFields {
    pub kind: DocumentKind,
    pub raw: Map<String, Value>,
    pub values: BTreeMap<String, FieldValue>,
}

impl ExtractedFields {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }
}

pub struct DocumentFieldExtractor {
    client: Box<dyn ExtractionClient>,
    payslip_schema: FieldSchema,
    attendance_schema: FieldSchema,
}

impl DocumentFieldExtractor {
    pub fn new(client: Box<dyn ExtractionClient>) -> Self {
        Self {
            client,
            payslip_schema: FieldSchema::payslip(),
            attendance_schema: FieldSchema::attendance(),
        }
    }

    /// Replace the field contract for one document kind.
    pub fn with_schema(mut self, kind: DocumentKind, schema: FieldSchema) -> Self {
        match kind {
            DocumentKind::Payslip => self.payslip_schema = schema,
            DocumentKind::Attendance => self.attendance_schema = schema,
        }
        self
    }

    pub fn schema(&self, kind: DocumentKind) -> &FieldSchema {
        match kind {
            DocumentKind::Payslip => &self.payslip_schema,
            DocumentKind::Attendance => &self.attendance_schema,
        }
    }

    /// Extract fields from the PDF at `path`. Every failure is logged and becomes `None`.
    pub async fn extract(&self, kind: DocumentKind, path: &Path) -> Option<ExtractedFields> {
        match self.try_extract(kind, path).await {
            Ok(fields) => {
                tracing::info!(kind = %kind, fields = fields.values.len(), "fields extracted");
                Some(fields)
            }
            Err(e) => {
                tracing::warn!(kind = %kind, path = %path.display(), error = %e, "ExtractionFailure");
                None
            }
        }
    }

    async fn try_extract(
        &self,
        kind: DocumentKind,
        path: &Path,
    ) -> Result<ExtractedFields, ExtractionError> {
        let pdf = tokio::fs::read(path).await?;
        if pdf.is_empty() {
            return Err(ExtractionError::EmptyDocument(path.to_path_buf()));
        }

        let schema = self.schema(kind);
        let prompt = build_extraction_prompt(kind, schema);
        let text = self.client.generate_from_pdf(&prompt, &pdf).await?;

        let raw = parse_structured_text(&text).ok_or(ExtractionError::NoStructuredObject)?;
        let values = schema.coerce(&raw);
        Ok(ExtractedFields { kind, raw, values })
    }
}
