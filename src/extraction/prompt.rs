use super::schema::FieldSchema;
use crate::period::DocumentKind;

pub const EXTRACTION_INSTRUCTIONS: &str = "\
You read Italian payroll documents. Extract ONLY values explicitly printed on the attached PDF.
Never estimate or compute a value that is not written on the document.
Answer with exactly one JSON object and nothing else.
Use null for any field you cannot find.";

fn describe(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Payslip => "The attached PDF is a monthly payslip (cedolino / busta paga).",
        DocumentKind::Attendance => {
            "The attached PDF is a monthly attendance record (cartellino presenze)."
        }
    }
}

/// Build the prompt sent alongside the PDF for `kind`.
pub fn build_extraction_prompt(kind: DocumentKind, schema: &FieldSchema) -> String {
    let fields = schema
        .fields
        .iter()
        .map(|f| f.prompt_line())
        .collect::<Vec<_>>()
        .join("\n");
    let keys = schema
        .fields
        .iter()
        .map(|f| format!("\"{}\": ...", f.name))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "{EXTRACTION_INSTRUCTIONS}\n\n{}\n\nFields:\n{fields}\n\nReply in this shape: {{{keys}}}",
        describe(kind)
    )
}
