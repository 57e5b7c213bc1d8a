use crate::assets::{ImageFilter, RasterImage};
use crate::canvas::{Command, Document, Page};
use crate::font::FontStyle;
use crate::metrics::{DocumentMetrics, PageMetrics};
use crate::types::{Color, Pt};
use fixed::types::I32F32;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};
use std::time::Instant;

const PDF_HEADER: &[u8] = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n";
const PRODUCER: &str = "qrdeck";

#[derive(Debug, Clone, Default)]
pub struct PdfOptions {
    pub title: Option<String>,
}

pub fn document_to_pdf(document: &Document, options: &PdfOptions) -> io::Result<Vec<u8>> {
    document_to_pdf_with_metrics(document, options, None)
}

pub fn document_to_pdf_with_metrics(
    document: &Document,
    options: &PdfOptions,
    metrics: Option<&mut DocumentMetrics>,
) -> io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    document_to_pdf_to_writer(document, options, metrics, &mut bytes)?;
    Ok(bytes)
}

/// Streams the PDF into `writer` and returns the number of bytes written.
pub fn document_to_pdf_to_writer<W: Write>(
    document: &Document,
    options: &PdfOptions,
    mut metrics: Option<&mut DocumentMetrics>,
    writer: &mut W,
) -> io::Result<usize> {
    let started = Instant::now();
    let fonts = collect_font_styles(document);
    let layout = ObjectLayout::new(document, &fonts);
    let mut sink = PdfSink::new(writer);
    sink.write_bytes(PDF_HEADER)?;

    let mut offsets = vec![0usize; layout.object_count + 1];
    let kids = layout
        .page_ids
        .iter()
        .map(|(_, page_id)| format!("{page_id} 0 R"))
        .collect::<Vec<_>>()
        .join(" ");
    sink.write_object(
        &mut offsets,
        CATALOG_ID,
        &format!("<< /Type /Catalog /Pages {PAGES_ID} 0 R >>"),
    )?;
    sink.write_object(
        &mut offsets,
        PAGES_ID,
        &format!(
            "<< /Type /Pages /Kids [{kids}] /Count {} /MediaBox [0 0 {} {}] >>",
            layout.page_ids.len(),
            fmt_pt(document.page_size.width),
            fmt_pt(document.page_size.height)
        ),
    )?;
    sink.write_object(&mut offsets, INFO_ID, &info_object(options.title.as_deref()))?;

    for (style, font_id) in &layout.font_ids {
        sink.write_object(&mut offsets, *font_id, &font_object(*style))?;
    }

    for (resource_id, ids) in &layout.image_ids {
        let Some(image) = document.images.get(resource_id) else {
            continue;
        };
        sink.write_object(&mut offsets, ids.image, &image_object(image, ids.smask))?;
        if let (Some(smask_id), Some(alpha)) = (ids.smask, image.alpha.as_deref()) {
            sink.write_object(&mut offsets, smask_id, &image_smask_object(image, alpha))?;
        }
    }

    let mut replaced_chars = 0usize;
    for (index, page) in document.pages.iter().enumerate() {
        let (content_id, page_id) = layout.page_ids[index];
        let rendered = render_page(page, document.page_size.height, &layout);
        replaced_chars += rendered.replaced_chars;
        let content_bytes = rendered.content.len();
        sink.write_object(&mut offsets, content_id, &stream_object(&rendered.content))?;
        sink.write_object(
            &mut offsets,
            page_id,
            &format!(
                "<< /Type /Page /Parent {PAGES_ID} 0 R /Resources << /Font {} /XObject {} >> /Contents {content_id} 0 R >>",
                font_resources(&layout.font_ids),
                xobject_resources(&layout.image_ids, &rendered.images),
            ),
        )?;
        if let Some(metrics) = metrics.as_deref_mut() {
            metrics.pages.push(PageMetrics {
                page_number: index + 1,
                command_count: page.commands.len(),
                image_count: rendered.images.len(),
                content_bytes,
            });
        }
    }
    if replaced_chars > 0 {
        log::warn!("{replaced_chars} character(s) outside WinAnsi replaced by '?'");
    }

    let total_bytes = sink.finish(&offsets)?;
    if let Some(metrics) = metrics {
        metrics.total_bytes = total_bytes;
        metrics.total_render_ms = started.elapsed().as_secs_f64() * 1000.0;
    }
    log::debug!(
        "pdf: {} pages, {} images, {total_bytes} bytes",
        document.page_count(),
        document.images.len()
    );
    Ok(total_bytes)
}

const CATALOG_ID: usize = 1;
const PAGES_ID: usize = 2;
const INFO_ID: usize = 3;

struct ImageIds {
    name: String,
    image: usize,
    smask: Option<usize>,
}

/// Object numbers for everything in the file, assigned before writing.
struct ObjectLayout {
    font_ids: Vec<(FontStyle, usize)>,
    image_ids: BTreeMap<String, ImageIds>,
    page_ids: Vec<(usize, usize)>,
    object_count: usize,
}

impl ObjectLayout {
    fn new(document: &Document, fonts: &[FontStyle]) -> Self {
        let mut next = INFO_ID + 1;
        let mut take = || {
            let id = next;
            next += 1;
            id
        };
        let font_ids = fonts.iter().map(|style| (*style, take())).collect();
        let image_ids = document
            .images
            .iter()
            .enumerate()
            .map(|(index, (resource_id, image))| {
                let image_id = take();
                let smask = image.alpha.as_ref().map(|_| take());
                (
                    resource_id.clone(),
                    ImageIds {
                        name: format!("Im{}", index + 1),
                        image: image_id,
                        smask,
                    },
                )
            })
            .collect();
        let page_ids = document.pages.iter().map(|_| (take(), take())).collect();
        Self {
            font_ids,
            image_ids,
            page_ids,
            object_count: next - 1,
        }
    }

    fn font_resource(&self, style: FontStyle) -> String {
        let index = self
            .font_ids
            .iter()
            .position(|(s, _)| *s == style)
            .unwrap_or(0);
        format!("F{}", index + 1)
    }
}

/// Tracks byte offsets and the running SHA-256 used for the trailer `/ID`.
struct PdfSink<'a, W: Write> {
    writer: &'a mut W,
    offset: usize,
    digest: Sha256,
}

impl<'a, W: Write> PdfSink<'a, W> {
    fn new(writer: &'a mut W) -> Self {
        Self {
            writer,
            offset: 0,
            digest: Sha256::new(),
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)?;
        self.digest.update(data);
        self.offset += data.len();
        Ok(())
    }

    fn write_object(&mut self, offsets: &mut [usize], obj_id: usize, body: &str) -> io::Result<()> {
        if let Some(slot) = offsets.get_mut(obj_id) {
            *slot = self.offset;
        }
        self.write_bytes(format!("{obj_id} 0 obj\n").as_bytes())?;
        self.write_bytes(body.as_bytes())?;
        self.write_bytes(b"\nendobj\n")
    }

    fn finish(mut self, offsets: &[usize]) -> io::Result<usize> {
        let xref_start = self.offset;
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", offsets.len());
        for offset in &offsets[1..] {
            xref.push_str(&format!("{offset:010} 00000 n \n"));
        }
        self.write_bytes(xref.as_bytes())?;

        let id: String = self.digest.clone().finalize()[..16]
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect();
        let trailer = format!(
            "trailer\n<< /Size {} /Root {CATALOG_ID} 0 R /Info {INFO_ID} 0 R /ID [<{id}> <{id}>] >>\nstartxref\n{xref_start}\n%%EOF\n",
            offsets.len()
        );
        self.write_bytes(trailer.as_bytes())?;
        self.writer.flush()?;
        Ok(self.offset)
    }
}

fn collect_font_styles(document: &Document) -> Vec<FontStyle> {
    let mut used = BTreeSet::new();
    used.insert(FontStyle::Normal);
    for page in &document.pages {
        for cmd in &page.commands {
            if let Command::SetFont(style) = cmd {
                used.insert(*style);
            }
        }
    }
    FontStyle::ALL
        .into_iter()
        .filter(|style| used.contains(style))
        .collect()
}

struct RenderedPage {
    content: String,
    images: BTreeSet<String>,
    replaced_chars: usize,
}

#[derive(Clone, Copy)]
struct TextState {
    font: FontStyle,
    size: Pt,
}

/// Content stream under construction. Canvas y coordinates grow downwards,
/// so every y is flipped against the page height on the way in.
struct ContentStream {
    out: String,
    page_height: Pt,
}

impl ContentStream {
    fn op(&mut self, line: std::fmt::Arguments<'_>) {
        use std::fmt::Write as _;
        let _ = self.out.write_fmt(line);
        self.out.push('\n');
    }

    fn raw(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn point(&self, x: Pt, y: Pt) -> String {
        format!("{} {}", fmt_pt(x), fmt_pt(self.page_height - y))
    }

    // Lower-left corner of a box whose top-left corner is (x, y).
    fn box_origin(&self, x: Pt, y: Pt, height: Pt) -> String {
        self.point(x, y + height)
    }

    fn show_text(&mut self, text: &TextState, layout: &ObjectLayout, placement: &str, encoded: &str) {
        let font = layout.font_resource(text.font);
        let size = fmt_pt(text.size);
        self.op(format_args!("BT\n/{font} {size} Tf\n{placement}\n({encoded}) Tj\nET"));
    }
}

fn render_page(page: &Page, page_height: Pt, layout: &ObjectLayout) -> RenderedPage {
    let mut stream = ContentStream {
        out: String::new(),
        page_height,
    };
    let mut images = BTreeSet::new();
    let mut replaced_chars = 0usize;
    let mut text = TextState {
        font: FontStyle::Normal,
        size: Pt::from_f32(12.0),
    };
    let mut saved_text: Vec<TextState> = Vec::new();

    for cmd in &page.commands {
        match cmd {
            Command::Meta { .. } => {}
            Command::SaveState => {
                saved_text.push(text);
                stream.raw("q\n");
            }
            Command::RestoreState => {
                text = saved_text.pop().unwrap_or(text);
                stream.raw("Q\n");
            }
            Command::SetFont(style) => text.font = *style,
            Command::SetFontSize(size) => text.size = *size,
            Command::SetFillColor(color) => stream.raw(&color_op(*color, "rg")),
            Command::SetStrokeColor(color) => stream.raw(&color_op(*color, "RG")),
            Command::SetLineWidth(width) => stream.op(format_args!("{} w", fmt_pt(*width))),
            Command::SetDash { pattern, phase } => {
                let dashes: Vec<String> = pattern.iter().copied().map(fmt_pt).collect();
                stream.op(format_args!("[{}] {} d", dashes.join(" "), fmt_pt(*phase)));
            }
            Command::MoveTo { x, y } => {
                let at = stream.point(*x, *y);
                stream.op(format_args!("{at} m"));
            }
            Command::LineTo { x, y } => {
                let at = stream.point(*x, *y);
                stream.op(format_args!("{at} l"));
            }
            Command::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                let (c1, c2, end) = (
                    stream.point(*x1, *y1),
                    stream.point(*x2, *y2),
                    stream.point(*x, *y),
                );
                stream.op(format_args!("{c1} {c2} {end} c"));
            }
            Command::ClosePath => stream.raw("h\n"),
            Command::Fill => stream.raw("f\n"),
            Command::Stroke => stream.raw("S\n"),
            Command::DrawString { x, y, text: run } => {
                let encoded = encode_winansi_pdf_string(run);
                replaced_chars += encoded.replaced;
                let placement = format!("{} Td", stream.point(*x, *y));
                stream.show_text(&text, layout, &placement, &encoded.text);
            }
            Command::DrawStringTransformed {
                x,
                y,
                text: run,
                m00,
                m01,
                m10,
                m11,
            } => {
                let encoded = encode_winansi_pdf_string(run);
                replaced_chars += encoded.replaced;
                let placement = format!(
                    "{} {} {} {} {} Tm",
                    fmt(*m00),
                    fmt(*m01),
                    fmt(*m10),
                    fmt(*m11),
                    stream.point(*x, *y)
                );
                stream.show_text(&text, layout, &placement, &encoded.text);
            }
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                let origin = stream.box_origin(*x, *y, *height);
                stream.op(format_args!("{origin} {} {} re\nf", fmt_pt(*width), fmt_pt(*height)));
            }
            Command::DrawImage {
                x,
                y,
                width,
                height,
                resource_id,
            } => {
                let Some(ids) = layout.image_ids.get(resource_id) else {
                    log::warn!("image resource {resource_id} was never registered");
                    continue;
                };
                images.insert(resource_id.clone());
                let origin = stream.box_origin(*x, *y, *height);
                stream.op(format_args!(
                    "q\n{} 0 0 {} {origin} cm\n/{} Do\nQ",
                    fmt_pt(*width),
                    fmt_pt(*height),
                    ids.name
                ));
            }
        }
    }

    RenderedPage {
        content: stream.out,
        images,
        replaced_chars,
    }
}

fn font_object(style: FontStyle) -> String {
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
        style.base_font()
    )
}

fn font_resources(fonts: &[(FontStyle, usize)]) -> String {
    let entries = fonts
        .iter()
        .enumerate()
        .map(|(index, (_, font_id))| format!("/F{} {font_id} 0 R", index + 1))
        .collect::<Vec<_>>();
    format!("<< {} >>", entries.join(" "))
}

fn xobject_resources(images: &BTreeMap<String, ImageIds>, used: &BTreeSet<String>) -> String {
    let entries = used
        .iter()
        .filter_map(|resource_id| images.get(resource_id))
        .map(|ids| format!("/{} {} 0 R", ids.name, ids.image))
        .collect::<Vec<_>>();
    format!("<< {} >>", entries.join(" "))
}

fn image_object(image: &RasterImage, smask_id: Option<usize>) -> String {
    let stream_data = encode_stream_data(&image.data);
    let filters = match image.filter {
        ImageFilter::Dct => "[/ASCIIHexDecode /DCTDecode]",
        ImageFilter::Flate => "[/ASCIIHexDecode /FlateDecode]",
    };
    let smask = smask_id
        .map(|id| format!(" /SMask {id} 0 R"))
        .unwrap_or_default();
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace {} /BitsPerComponent 8 /Interpolate {} /Length {} /Filter {filters}{smask} >>
stream
{stream_data}
endstream",
        image.width,
        image.height,
        image.color_space.pdf_name(),
        image.interpolate,
        stream_data.len(),
    )
}

fn image_smask_object(image: &RasterImage, alpha: &[u8]) -> String {
    let stream_data = encode_stream_data(alpha);
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceGray /BitsPerComponent 8 /Length {} /Filter [/ASCIIHexDecode /FlateDecode] >>
stream
{stream_data}
endstream",
        image.width,
        image.height,
        stream_data.len(),
    )
}

fn encode_stream_data(data: &[u8]) -> String {
    let mut hex = ascii_hex_encode(data);
    hex.push('>');
    hex
}

fn ascii_hex_encode(data: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(data.len() * 2 + data.len() / 32);
    for (index, byte) in data.iter().enumerate() {
        let _ = write!(&mut out, "{byte:02X}");
        if index % 32 == 31 {
            out.push('\n');
        }
    }
    out
}

fn stream_object(content: &str) -> String {
    format!(
        "<< /Length {} >>\nstream\n{content}\nendstream",
        content.len()
    )
}

fn info_object(title: Option<&str>) -> String {
    let mut entries = vec![format!("/Producer ({PRODUCER})")];
    if let Some(title) = title {
        entries.push(format!("/Title ({})", encode_winansi_pdf_string(title).text));
    }
    format!("<< {} >>", entries.join(" "))
}

struct WinAnsiEncoded {
    text: String,
    replaced: usize,
}

/// Escaped PDF literal string content in WinAnsi (cp1252) encoding.
fn encode_winansi_pdf_string(input: &str) -> WinAnsiEncoded {
    let mut out = String::new();
    let mut replaced = 0usize;
    for ch in input.chars() {
        let byte = match ch {
            '\u{0000}'..='\u{007F}' | '\u{00A0}'..='\u{00FF}' => ch as u8,
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{0192}' => 0x83,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2020}' => 0x86,
            '\u{2021}' => 0x87,
            '\u{02C6}' => 0x88,
            '\u{2030}' => 0x89,
            '\u{0160}' => 0x8A,
            '\u{2039}' => 0x8B,
            '\u{0152}' => 0x8C,
            '\u{017D}' => 0x8E,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{02DC}' => 0x98,
            '\u{2122}' => 0x99,
            '\u{0161}' => 0x9A,
            '\u{203A}' => 0x9B,
            '\u{0153}' => 0x9C,
            '\u{017E}' => 0x9E,
            '\u{0178}' => 0x9F,
            _ => {
                replaced += 1;
                b'?'
            }
        };
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b if !(0x20..0x7f).contains(&b) => out.push_str(&format!("\\{b:03o}")),
            b => out.push(b as char),
        }
    }
    WinAnsiEncoded {
        text: out,
        replaced,
    }
}

fn color_op(color: Color, op: &str) -> String {
    format!(
        "{} {} {} {op}\n",
        fmt(clamp_unit(color.r)),
        fmt(clamp_unit(color.g)),
        fmt(clamp_unit(color.b))
    )
}

fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = I32F32::from_num(value);
    let scaled = (fixed * I32F32::from_num(1000)).round();
    let milli: i64 = scaled.to_num();
    format_milli(milli)
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        return format!("{sign}{int_part}");
    }
    let frac = format!("{frac_part:03}");
    format!("{sign}{int_part}.{}", frac.trim_end_matches('0'))
}

fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::types::Size;

    fn one_page_document(commands: Vec<Command>) -> Document {
        Document {
            page_size: Size::a4(),
            pages: vec![Page { commands }],
            images: BTreeMap::new(),
        }
    }

    pub(crate) fn count_token(bytes: &[u8], token: &[u8]) -> usize {
        if token.is_empty() || bytes.len() < token.len() {
            return 0;
        }
        bytes.windows(token.len()).filter(|w| *w == token).count()
    }

    #[test]
    fn numbers_are_trimmed_millipoints() {
        assert_eq!(format_milli(0), "0");
        assert_eq!(format_milli(12_000), "12");
        assert_eq!(format_milli(-1_500), "-1.5");
        assert_eq!(format_milli(2_835), "2.835");
        assert_eq!(fmt(0.5), "0.5");
        assert_eq!(fmt(f32::NAN), "0");
    }

    #[test]
    fn text_uses_flipped_baseline_and_winansi() {
        let doc = one_page_document(vec![
            Command::SetFont(FontStyle::Bold),
            Command::SetFontSize(Pt::from_f32(10.0)),
            Command::DrawString {
                x: Pt::from_f32(20.0),
                y: Pt::from_f32(100.0),
                text: "Beyoncé (Live)".to_string(),
            },
        ]);
        let bytes = document_to_pdf(&doc, &PdfOptions::default()).unwrap();
        let pdf = String::from_utf8_lossy(&bytes);
        assert!(pdf.contains("/BaseFont /Helvetica-Bold"));
        assert!(pdf.contains("/F2 10 Tf"));
        assert!(pdf.contains("20 741.89 Td"));
        assert!(pdf.contains("(Beyonc\\351 \\(Live\\)) Tj"));
    }

    #[test]
    fn rotated_text_emits_text_matrix() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.draw_string_rotated(Pt::from_f32(50.0), Pt::from_f32(100.0), "1999", 30.0);
        let bytes = document_to_pdf(&canvas.finish(), &PdfOptions::default()).unwrap();
        let pdf = String::from_utf8_lossy(&bytes);
        assert!(pdf.contains("0.866 0.5 -0.5 0.866 50 741.89 Tm"));
    }

    #[test]
    fn dashes_and_colors_are_written() {
        let doc = one_page_document(vec![
            Command::SetStrokeColor(Color::gray(200)),
            Command::SetDash {
                pattern: vec![Pt::from_f32(14.173), Pt::from_f32(14.173)],
                phase: Pt::from_f32(2.835),
            },
            Command::MoveTo {
                x: Pt::ZERO,
                y: Pt::ZERO,
            },
            Command::LineTo {
                x: Pt::from_f32(10.0),
                y: Pt::ZERO,
            },
            Command::Stroke,
            Command::SetDash {
                pattern: Vec::new(),
                phase: Pt::ZERO,
            },
        ]);
        let bytes = document_to_pdf(&doc, &PdfOptions::default()).unwrap();
        let pdf = String::from_utf8_lossy(&bytes);
        assert!(pdf.contains("0.784 0.784 0.784 RG"));
        assert!(pdf.contains("[14.173 14.173] 2.835 d"));
        assert!(pdf.contains("[] 0 d"));
    }

    #[test]
    fn images_are_shared_and_only_listed_where_used() {
        let mut canvas = Canvas::new(Size::a4());
        let image = RasterImage::from_gray_pixels(2, 2, &[0, 255, 255, 0]).unwrap();
        canvas.add_image("qr-0", image);
        let side = Pt::from_f32(40.0);
        canvas.draw_image(Pt::ZERO, Pt::ZERO, side, side, "qr-0");
        canvas.show_page();
        canvas.draw_string(Pt::ZERO, Pt::from_f32(20.0), "back");
        canvas.show_page();
        canvas.draw_image(Pt::ZERO, Pt::ZERO, side, side, "qr-0");
        let bytes = document_to_pdf(&canvas.finish(), &PdfOptions::default()).unwrap();

        assert_eq!(count_token(&bytes, b"/Subtype /Image"), 1);
        assert_eq!(count_token(&bytes, b"/Im1 Do"), 2);
        assert_eq!(count_token(&bytes, b"/XObject << /Im1"), 2);
        assert_eq!(count_token(&bytes, b"/XObject <<  >>"), 1);
        assert_eq!(count_token(&bytes, b"/Interpolate false"), 1);
    }

    #[test]
    fn trailer_carries_title_and_content_id() {
        let doc = one_page_document(vec![]);
        let options = PdfOptions {
            title: Some("QR Deck - QR Codes".to_string()),
        };
        let first = document_to_pdf(&doc, &options).unwrap();
        let second = document_to_pdf(&doc, &options).unwrap();
        assert_eq!(first, second);
        let pdf = String::from_utf8_lossy(&first);
        assert!(pdf.contains("/Title (QR Deck - QR Codes)"));
        assert!(pdf.contains("/ID [<"));
        assert!(pdf.ends_with("%%EOF\n"));

        let parsed = lopdf::Document::load_mem(&first).unwrap();
        assert_eq!(parsed.get_pages().len(), 1);
    }

    #[test]
    fn metrics_cover_every_page() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.draw_string(Pt::ZERO, Pt::from_f32(20.0), "one");
        canvas.show_page();
        canvas.draw_string(Pt::ZERO, Pt::from_f32(20.0), "two");
        let mut metrics = DocumentMetrics::default();
        let bytes =
            document_to_pdf_with_metrics(&canvas.finish(), &PdfOptions::default(), Some(&mut metrics))
                .unwrap();
        assert_eq!(metrics.pages.len(), 2);
        assert_eq!(metrics.pages[1].page_number, 2);
        assert!(metrics.pages.iter().all(|p| p.content_bytes > 0));
        assert_eq!(metrics.total_bytes, bytes.len());
    }
}
