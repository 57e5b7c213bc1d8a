use lopdf::{Dictionary, Document as LoDocument, Object as LoObject};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfInspectErrorCode {
    PdfParseFailed,
    PdfEncryptedUnsupported,
    PdfEmptyOrNoPages,
    PdfUnpairedSheet,
    PdfIoError,
}

impl PdfInspectErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PdfInspectErrorCode::PdfParseFailed => "PDF_PARSE_FAILED",
            PdfInspectErrorCode::PdfEncryptedUnsupported => "PDF_ENCRYPTED_UNSUPPORTED",
            PdfInspectErrorCode::PdfEmptyOrNoPages => "PDF_EMPTY_OR_NO_PAGES",
            PdfInspectErrorCode::PdfUnpairedSheet => "PDF_UNPAIRED_SHEET",
            PdfInspectErrorCode::PdfIoError => "PDF_IO_ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}: {}", .code.as_str(), .message)]
pub struct PdfInspectError {
    pub code: PdfInspectErrorCode,
    pub message: String,
}

impl PdfInspectError {
    fn new(code: PdfInspectErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfInspectReport {
    pub pdf_version: String,
    pub page_count: usize,
    pub encrypted: bool,
    pub file_size_bytes: usize,
    pub title: Option<String>,
    pub image_count: usize,
    /// Per page, in order: whether the page draws at least one image.
    pub image_pages: Vec<bool>,
}

impl PdfInspectReport {
    /// QR sheets closing the document. A sheet is a front page that draws
    /// codes followed by an image-free back page. Pairs are counted from the
    /// end and the first page always belongs to the statistics section, which
    /// may span any number of pages.
    pub fn sheet_count(&self) -> usize {
        let pages = &self.image_pages;
        let mut end = pages.len();
        let mut sheets = 0;
        while end >= 3 && pages[end - 2] && !pages[end - 1] {
            sheets += 1;
            end -= 2;
        }
        sheets
    }

    /// Last page draws codes, so its back page is missing.
    fn ends_with_front(&self) -> bool {
        self.image_pages.len() > 1 && self.image_pages.last() == Some(&true)
    }
}

pub fn inspect_pdf_bytes(bytes: &[u8]) -> Result<PdfInspectReport, PdfInspectError> {
    let pdf = LoDocument::load_mem(bytes)
        .map_err(|err| PdfInspectError::new(PdfInspectErrorCode::PdfParseFailed, err.to_string()))?;

    let image_count = pdf
        .objects
        .values()
        .filter_map(|object| object.as_stream().ok())
        .filter(|stream| {
            stream
                .dict
                .get(b"Subtype")
                .and_then(|subtype| subtype.as_name())
                .is_ok_and(|name| name == b"Image")
        })
        .count();

    let image_pages = pdf
        .get_pages()
        .values()
        .map(|page_id| page_draws_image(&pdf, *page_id))
        .collect();

    let title = document_title(&pdf);
    Ok(PdfInspectReport {
        page_count: pdf.get_pages().len(),
        encrypted: pdf.is_encrypted(),
        file_size_bytes: bytes.len(),
        pdf_version: pdf.version,
        title,
        image_count,
        image_pages,
    })
}

fn resolve_dict<'a>(pdf: &'a LoDocument, object: &'a LoObject) -> Option<&'a Dictionary> {
    match object {
        LoObject::Dictionary(dict) => Some(dict),
        LoObject::Reference(id) => pdf.get_object(*id).ok()?.as_dict().ok(),
        _ => None,
    }
}

fn page_draws_image(pdf: &LoDocument, page_id: lopdf::ObjectId) -> bool {
    let Some(xobjects) = pdf
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Resources").ok())
        .and_then(|resources| resolve_dict(pdf, resources))
        .and_then(|resources| resources.get(b"XObject").ok())
        .and_then(|xobjects| resolve_dict(pdf, xobjects))
    else {
        return false;
    };
    xobjects.iter().any(|(_, object)| {
        let stream = match object {
            LoObject::Reference(id) => pdf.get_object(*id).ok().and_then(|o| o.as_stream().ok()),
            other => other.as_stream().ok(),
        };
        stream.is_some_and(|stream| {
            stream
                .dict
                .get(b"Subtype")
                .and_then(|subtype| subtype.as_name())
                .is_ok_and(|name| name == b"Image")
        })
    })
}

pub fn inspect_pdf_path(path: &Path) -> Result<PdfInspectReport, PdfInspectError> {
    std::fs::read(path)
        .map_err(|err| PdfInspectError::new(PdfInspectErrorCode::PdfIoError, err.to_string()))
        .and_then(|data| inspect_pdf_bytes(&data))
}

fn document_title(pdf: &LoDocument) -> Option<String> {
    let info_id = pdf.trailer.get(b"Info").ok()?.as_reference().ok()?;
    let info = pdf.get_dictionary(info_id).ok()?;
    let title = info.get(b"Title").ok()?.as_str().ok()?;
    Some(String::from_utf8_lossy(title).into_owned())
}

/// Problems that make a file unusable as a printable deck.
pub fn deck_layout_issues(report: &PdfInspectReport) -> Vec<PdfInspectErrorCode> {
    let pages = if report.page_count == 0 {
        Some(PdfInspectErrorCode::PdfEmptyOrNoPages)
    } else if report.ends_with_front() {
        Some(PdfInspectErrorCode::PdfUnpairedSheet)
    } else {
        None
    };
    report
        .encrypted
        .then_some(PdfInspectErrorCode::PdfEncryptedUnsupported)
        .into_iter()
        .chain(pages)
        .collect()
}

pub fn require_deck_layout(report: &PdfInspectReport) -> Result<(), PdfInspectError> {
    match deck_layout_issues(report).into_iter().next() {
        None => Ok(()),
        Some(code) => {
            let message = match code {
                PdfInspectErrorCode::PdfEncryptedUnsupported => "encrypted pdf is not supported",
                PdfInspectErrorCode::PdfEmptyOrNoPages => "pdf has no pages",
                PdfInspectErrorCode::PdfUnpairedSheet => "qr sheet without matching back page",
                PdfInspectErrorCode::PdfParseFailed | PdfInspectErrorCode::PdfIoError => "",
            };
            Err(PdfInspectError::new(code, message))
        }
    }
}
