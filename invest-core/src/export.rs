//! Export of an analysed story as a downloadable file.

use csv::{QuoteStyle, WriterBuilder};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to flush CSV writer: {0}")]
    Flush(String),

    #[error("Export produced invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Text,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" | "text" => Some(ExportFormat::Text),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Text => "text/plain; charset=utf-8",
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }
}

/// A rendered export ready to hand to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub format: ExportFormat,
    pub content: String,
}

pub fn render_text(story: &str, judgment: &str) -> String {
    format!("Story:\n{story}\n\nAnalysis:\n{judgment}")
}

/// One `;`-separated row with every field quoted and quotes doubled.
pub fn render_csv(story: &str, judgment: &str) -> Result<String, ExportError> {
    let mut writer = WriterBuilder::new()
        .delimiter(b';')
        .quote_style(QuoteStyle::Always)
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record([story, judgment])?;

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Flush(e.to_string()))?;
    let mut out = String::from_utf8(bytes)?;
    while out.ends_with('\n') || out.ends_with('\r') {
        out.pop();
    }
    Ok(out)
}

pub fn export(format: ExportFormat, story: &str, judgment: &str) -> Result<ExportFile, ExportError> {
    let content = match format {
        ExportFormat::Text => render_text(story, judgment),
        ExportFormat::Csv => render_csv(story, judgment)?,
    };
    Ok(ExportFile {
        file_name: format!("story_analysis.{}", format.extension()),
        format,
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_layout() {
        assert_eq!(
            render_text("Как клиент...", "Оценка: 5/6"),
            "Story:\nКак клиент...\n\nAnalysis:\nОценка: 5/6"
        );
    }

    #[test]
    fn test_csv_quotes_everything() {
        assert_eq!(render_csv("a", "b").unwrap(), r#""a";"b""#);
    }

    #[test]
    fn test_csv_doubles_embedded_quotes() {
        let row = render_csv(r#"Как "клиент""#, "ok; fine").unwrap();
        assert_eq!(row, r#""Как ""клиент""";"ok; fine""#);
    }

    #[test]
    fn test_csv_keeps_inner_newlines() {
        let row = render_csv("story", "line 1\nline 2\n").unwrap();
        assert_eq!(row, "\"story\";\"line 1\nline 2\n\"");
    }

    #[test]
    fn test_export_file_names() {
        let txt = export(ExportFormat::Text, "s", "j").unwrap();
        assert_eq!(txt.file_name, "story_analysis.txt");
        let csv = export(ExportFormat::Csv, "s", "j").unwrap();
        assert_eq!(csv.file_name, "story_analysis.csv");
        assert_eq!(csv.content, r#""s";"j""#);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ExportFormat::from_extension("CSV"), Some(ExportFormat::Csv));
        assert_eq!(ExportFormat::from_extension("txt"), Some(ExportFormat::Text));
        assert_eq!(ExportFormat::from_extension("pdf"), None);
    }
}
