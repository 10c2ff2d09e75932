use crate::error::IngestError;
use lopdf::Document;
use tracing::debug;

/// Extracted text of one page. `number` is 1-based; `text` may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

impl PageText {
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

pub trait PdfExtractor: Send + Sync {
    /// Returns every page in page order. Fails with
    /// [`IngestError::UnreadableDocument`] when the bytes are not a usable PDF.
    fn extract_pages(&self, document: &str, bytes: &[u8]) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, document: &str, bytes: &[u8]) -> Result<Vec<PageText>, IngestError> {
        let pdf = Document::load_mem(bytes).map_err(|error| IngestError::UnreadableDocument {
            document: document.to_string(),
            reason: error.to_string(),
        })?;

        if pdf.is_encrypted() {
            return Err(IngestError::UnreadableDocument {
                document: document.to_string(),
                reason: "document is encrypted".to_string(),
            });
        }

        let mut pages = Vec::new();
        for (page_no, _page_id) in pdf.get_pages() {
            let text = match pdf.extract_text(&[page_no]) {
                Ok(text) => text,
                Err(error) => {
                    debug!(document, page = page_no, %error, "page text could not be decoded");
                    String::new()
                }
            };
            pages.push(PageText::new(page_no, text));
        }

        Ok(pages)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{LopdfExtractor, PdfExtractor};
    use crate::error::IngestError;
    use lopdf::{dictionary, Document, Object, Stream};

    pub(crate) fn build_pdf(page_texts: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.4");
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut page_ids = Vec::new();
        for text in page_texts {
            let content = if text.is_empty() {
                String::new()
            } else {
                format!("BT /F1 12 Tf 100 700 Td ({text}) Tj ET")
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            page_ids.push(doc.add_object(dictionary! {
                "Type" => "Page",
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => resources_id,
                "Contents" => content_id,
            }));
        }

        let kids: Vec<Object> = page_ids.iter().map(|&id| id.into()).collect();
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(page_texts.len() as i64),
        });
        for page_id in &page_ids {
            if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(*page_id) {
                dict.set("Parent", pages_id);
            }
        }

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).expect("in-memory pdf should serialize");
        buffer
    }

    #[test]
    fn extracts_every_page_in_order() {
        let bytes = build_pdf(&["Hydraulic pump manual", "", "Pressure limits"]);
        let pages = LopdfExtractor
            .extract_pages("manual.pdf", &bytes)
            .expect("generated pdf should load");

        assert_eq!(pages.len(), 3);
        assert_eq!(
            pages.iter().map(|page| page.number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(pages[0].text.contains("Hydraulic"));
        assert!(!pages[1].has_text());
        assert!(pages[2].text.contains("Pressure"));
    }

    #[test]
    fn garbage_bytes_are_unreadable() {
        let result = LopdfExtractor.extract_pages("broken.pdf", b"%PDF-1.4\n%broken");

        match result {
            Err(IngestError::UnreadableDocument { document, .. }) => {
                assert_eq!(document, "broken.pdf")
            }
            other => panic!("expected unreadable document, got {other:?}"),
        }
    }
}
