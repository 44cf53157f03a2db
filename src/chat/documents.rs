//! Text extraction from chat attachments.

use std::panic::{self, AssertUnwindSafe};

use anyhow::{Context, Result};

use crate::traits::DocumentParser;

/// Extension an attachment must carry to be parsed.
pub const DOCUMENT_EXTENSION: &str = ".pdf";

/// A file sent alongside a chat question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Whether the name ends in the document extension (case-insensitive).
    pub fn is_document(&self) -> bool {
        self.name.to_lowercase().ends_with(DOCUMENT_EXTENSION)
    }
}

/// [`DocumentParser`] backed by `pdf-extract`.
#[derive(Debug, Clone, Default)]
pub struct PdfParser;

impl DocumentParser for PdfParser {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>> {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
            .context("Failed to extract text from PDF")
    }
}

/// Pulls text out of attachments, one source-tagged block per document.
#[derive(Debug, Clone, Default)]
pub struct DocumentTextExtractor<P = PdfParser> {
    parser: P,
}

impl DocumentTextExtractor<PdfParser> {
    pub fn new() -> Self {
        Self { parser: PdfParser }
    }
}

impl<P: DocumentParser> DocumentTextExtractor<P> {
    pub fn with_parser(parser: P) -> Self {
        Self { parser }
    }

    /// Concatenate the text of every parseable document attachment.
    ///
    /// Non-document attachments are ignored. A document that fails to parse
    /// is logged and skipped; it never aborts the remaining attachments.
    /// Empty pages are dropped; a document whose pages are all empty
    /// contributes nothing.
    pub fn extract(&self, attachments: &[Attachment]) -> String {
        let mut context = String::new();

        for attachment in attachments.iter().filter(|a| a.is_document()) {
            match self.extract_one(attachment) {
                Ok(pages) => {
                    let content: String = pages
                        .iter()
                        .filter(|page| !page.is_empty())
                        .map(|page| format!("{}\n", page))
                        .collect();

                    if content.is_empty() {
                        tracing::debug!("No extractable text in {}", attachment.name);
                        continue;
                    }

                    context.push_str(&source_block(&attachment.name, &content));
                    tracing::debug!("Extracted text from {}", attachment.name);
                }
                Err(e) => {
                    tracing::warn!(
                        attachment = %attachment.name,
                        "Skipping attachment, text extraction failed: {:#}",
                        e
                    );
                }
            }
        }

        context
    }

    /// Parse one attachment; a parser panic is reported as an error.
    fn extract_one(&self, attachment: &Attachment) -> Result<Vec<String>> {
        panic::catch_unwind(AssertUnwindSafe(|| {
            self.parser.extract_pages(&attachment.bytes)
        }))
        .map_err(|_| anyhow::anyhow!("document parser panicked"))?
    }
}

fn source_block(name: &str, content: &str) -> String {
    format!("\n--- CONTENIDO DEL ARCHIVO {} ---\n{}\n", name, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Treats the attachment bytes as UTF-8 pages separated by form feeds.
    struct FakeParser;

    impl DocumentParser for FakeParser {
        fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>> {
            let text = std::str::from_utf8(bytes).context("not utf-8")?;
            if text.starts_with("CORRUPT") {
                anyhow::bail!("broken xref table");
            }
            Ok(text.split('\x0c').map(str::to_string).collect())
        }
    }

    /// Panics on inputs starting with "PANIC".
    struct PanickingParser;

    impl DocumentParser for PanickingParser {
        fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>> {
            if bytes.starts_with(b"PANIC") {
                panic!("index out of bounds in xref stream");
            }
            Ok(vec![String::from_utf8_lossy(bytes).into_owned()])
        }
    }

    #[test]
    fn test_is_document() {
        assert!(Attachment::new("manual.pdf", Vec::<u8>::new()).is_document());
        assert!(Attachment::new("MANUAL.PDF", Vec::<u8>::new()).is_document());
        assert!(!Attachment::new("lecturas.csv", Vec::<u8>::new()).is_document());
        assert!(!Attachment::new("pdf", Vec::<u8>::new()).is_document());
    }

    #[test]
    fn test_extract_tags_each_source() {
        let extractor = DocumentTextExtractor::with_parser(FakeParser);
        let context = extractor.extract(&[
            Attachment::new("a.pdf", "voltaje 220V"),
            Attachment::new("b.pdf", "pico 19:00"),
        ]);

        assert_eq!(
            context,
            "\n--- CONTENIDO DEL ARCHIVO a.pdf ---\nvoltaje 220V\n\n\
             \n--- CONTENIDO DEL ARCHIVO b.pdf ---\npico 19:00\n\n"
        );
    }

    #[test]
    fn test_corrupted_attachment_is_skipped() {
        let extractor = DocumentTextExtractor::with_parser(FakeParser);
        let context = extractor.extract(&[
            Attachment::new("first.pdf", "texto uno"),
            Attachment::new("second.pdf", "CORRUPT"),
            Attachment::new("third.pdf", "texto tres"),
        ]);

        assert!(context.contains("first.pdf"));
        assert!(context.contains("texto uno"));
        assert!(!context.contains("second.pdf"));
        assert!(context.contains("third.pdf"));
        assert!(context.contains("texto tres"));
        assert!(context.find("texto uno").unwrap() < context.find("texto tres").unwrap());
    }

    #[test]
    fn test_non_documents_are_ignored() {
        let extractor = DocumentTextExtractor::with_parser(FakeParser);
        let context = extractor.extract(&[Attachment::new("notes.txt", "should not appear")]);

        assert!(context.is_empty());
    }

    #[test]
    fn test_empty_documents_contribute_nothing() {
        let extractor = DocumentTextExtractor::with_parser(FakeParser);
        let context = extractor.extract(&[Attachment::new("blank.pdf", "\x0c")]);

        assert!(context.is_empty());
    }

    #[test]
    fn test_whitespace_pages_are_kept() {
        let extractor = DocumentTextExtractor::with_parser(FakeParser);
        let context = extractor.extract(&[Attachment::new("spaced.pdf", "uno\x0c  \x0cdos")]);

        assert!(context.contains("--- CONTENIDO DEL ARCHIVO spaced.pdf ---\nuno\n  \ndos\n"));
    }

    #[test]
    fn test_pages_are_joined_with_newlines() {
        let extractor = DocumentTextExtractor::with_parser(FakeParser);
        let context = extractor.extract(&[Attachment::new("two.pdf", "page one\x0cpage two")]);

        assert!(context.contains("page one\npage two\n"));
    }

    #[test]
    fn test_panicking_parser_is_isolated() {
        let extractor = DocumentTextExtractor::with_parser(PanickingParser);
        let context = extractor.extract(&[
            Attachment::new("x.pdf", "PANIC"),
            Attachment::new("y.pdf", "still here"),
        ]);

        assert!(!context.contains("x.pdf"));
        assert!(context.contains("still here"));
    }

    #[test]
    fn test_pdf_parser_skips_garbage() {
        let extractor = DocumentTextExtractor::new();
        let context = extractor.extract(&[Attachment::new(
            "fake.pdf",
            "%PDF-1.4 this is not really a pdf",
        )]);

        assert!(context.is_empty());
    }
}
