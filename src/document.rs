use crate::error::{RagError, Result};
use docx_rs::{DocumentChild, Paragraph, ParagraphChild, RunChild};
use log::{debug, info, warn};
use mime_guess::Mime;
use std::fs;
use std::path::Path;

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Represents a document with its content and metadata
#[derive(Debug, Clone)]
pub struct Document {
    /// The extracted text content of the document
    pub content: String,
    /// The document's file name
    pub filename: String,
    /// The document's MIME type
    pub mime_type: String,
}

impl Document {
    /// Create a new document from a file path
    pub fn from_file<P: AsRef<Path>>(file_path: P) -> Result<Self> {
        let path = file_path.as_ref();
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                RagError::ExtractionFailure(format!("Invalid file name: {}", path.display()))
            })?
            .to_string();

        let bytes = fs::read(path).map_err(|e| {
            RagError::ExtractionFailure(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_bytes(&filename, &bytes)
    }

    /// Create a new document from uploaded bytes, using the file name's extension
    pub fn from_bytes(filename: &str, bytes: &[u8]) -> Result<Self> {
        let extension = file_extension(filename);
        let mime = mime_for_extension(&extension)?;
        let content = read_document_content(bytes, &mime)?;

        Ok(Document {
            content,
            filename: filename.to_string(),
            mime_type: mime.to_string(),
        })
    }
}

/// Lowercased extension of a file name, without the dot
pub fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Extract the text of a document given its declared extension
pub fn extract_text(bytes: &[u8], extension: &str) -> Result<String> {
    let mime = mime_for_extension(extension)?;
    read_document_content(bytes, &mime)
}

fn mime_for_extension(extension: &str) -> Result<Mime> {
    let extension = extension.trim_start_matches('.').to_lowercase();
    let mime = mime_guess::from_ext(&extension)
        .first()
        .ok_or_else(|| RagError::UnsupportedFormat(format!(".{}", extension)))?;
    debug!("Detected MIME type: {}", mime);
    Ok(mime)
}

/// Read content from a document based on its MIME type
fn read_document_content(bytes: &[u8], mime: &Mime) -> Result<String> {
    match mime.essence_str() {
        // Handle PDF documents
        "application/pdf" => {
            info!("Processing PDF document ({} bytes)", bytes.len());
            let content = pdf_extract::extract_text_from_mem(bytes).map_err(|e| {
                RagError::ExtractionFailure(format!("Failed to extract text from PDF: {}", e))
            })?;

            // PDF extraction can sometimes include excessive whitespace
            let cleaned_content = normalize_whitespace(&content);

            if cleaned_content.is_empty() {
                warn!("Extracted PDF content is empty or contains only whitespace");
            }

            Ok(cleaned_content)
        }

        // Handle Word documents
        DOCX_MIME => {
            info!("Processing DOCX document ({} bytes)", bytes.len());
            read_docx_text(bytes)
        }

        // Handle plain text documents
        _ if mime.type_() == mime_guess::mime::TEXT => {
            info!("Processing text document ({} bytes)", bytes.len());
            String::from_utf8(bytes.to_vec()).map_err(|e| {
                RagError::ExtractionFailure(format!("Text file is not valid UTF-8: {}", e))
            })
        }

        // Unsupported format
        other => Err(RagError::UnsupportedFormat(format!(
            "{}. Only PDF, DOCX and text files are supported.",
            other
        ))),
    }
}

/// Join the text runs of every top-level paragraph, one paragraph per line
fn read_docx_text(bytes: &[u8]) -> Result<String> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| {
        RagError::ExtractionFailure(format!("Failed to extract text from DOCX: {}", e))
    })?;

    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(paragraph) => Some(paragraph_text(paragraph)),
            _ => None,
        })
        .collect();

    Ok(paragraphs.join("\n"))
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    paragraph
        .children
        .iter()
        .filter_map(|child| match child {
            ParagraphChild::Run(run) => Some(run),
            _ => None,
        })
        .flat_map(|run| run.children.iter())
        .filter_map(|child| match child {
            RunChild::Text(text) => Some(text.text.as_str()),
            RunChild::Tab(_) => Some("\t"),
            _ => None,
        })
        .collect()
}

/// Normalize whitespace in text (remove multiple consecutive spaces, newlines, etc.)
fn normalize_whitespace(text: &str) -> String {
    let result = text.replace('\r', "");

    let mut prev_char = ' ';
    let mut newline_count = 0;
    let mut normalized = String::with_capacity(result.len());

    for c in result.chars() {
        if c == '\n' {
            newline_count += 1;
            continue;
        }

        if newline_count > 0 {
            push_newlines(&mut normalized, newline_count);
            newline_count = 0;
        }

        // Don't add consecutive spaces
        if !(c == ' ' && prev_char == ' ') {
            normalized.push(c);
        }
        prev_char = c;
    }

    if newline_count > 0 {
        push_newlines(&mut normalized, newline_count);
    }

    normalized.trim().to_string()
}

/// At most two newlines survive (a paragraph break)
fn push_newlines(out: &mut String, count: usize) {
    if count >= 2 {
        out.push_str("\n\n");
    } else {
        out.push('\n');
    }
}
