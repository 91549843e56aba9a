use chrono::NaiveDate;

use super::{Artifact, ExportError, ExportRow};

/// UTF-8 byte-order mark so spreadsheet tools pick the right encoding.
pub const BOM: &[u8] = b"\xEF\xBB\xBF";
pub const DELIMITER: u8 = b',';
pub const HEADERS: [&str; 8] = [
    "No.",
    "Title",
    "Content",
    "URL",
    "Source",
    "Category",
    "Published",
    "Authors",
];

pub fn file_name(date: NaiveDate) -> String {
    format!("search_results_{}.csv", date.format("%Y-%m-%d"))
}

/// Serializes rows into a BOM-prefixed table. Every field is quoted and embedded quotes
/// are doubled.
pub fn build_artifact(rows: &[ExportRow], date: NaiveDate) -> Result<Artifact, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .quote_style(csv::QuoteStyle::Always)
        .double_quote(true)
        .from_writer(BOM.to_vec());

    writer.write_record(HEADERS)?;
    for (i, row) in rows.iter().enumerate() {
        writer.write_record([
            (i + 1).to_string().as_str(),
            row.title.as_str(),
            row.content.as_str(),
            row.url.as_str(),
            row.source.as_str(),
            row.category.as_str(),
            row.published.as_deref().unwrap_or(""),
            row.authors.as_deref().unwrap_or(""),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Serialize(e.to_string()))?;
    Ok(Artifact {
        file_name: file_name(date),
        bytes,
    })
}
