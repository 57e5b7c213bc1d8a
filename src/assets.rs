use crate::error::QrDeckError;
use base64::Engine;
use image::GenericImageView;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageColorSpace {
    Gray,
    Rgb,
}

impl ImageColorSpace {
    pub fn pdf_name(self) -> &'static str {
        match self {
            ImageColorSpace::Gray => "/DeviceGray",
            ImageColorSpace::Rgb => "/DeviceRGB",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFilter {
    Flate,
    Dct,
}

impl ImageFilter {
    pub fn pdf_name(self) -> &'static str {
        match self {
            ImageFilter::Flate => "/FlateDecode",
            ImageFilter::Dct => "/DCTDecode",
        }
    }
}

/// Image payload ready for embedding: pixel data is already encoded with
/// `filter` (JPEG sources are passed through untouched).
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub color_space: ImageColorSpace,
    pub filter: ImageFilter,
    pub data: Vec<u8>,
    /// Flate-compressed 8-bit soft mask.
    pub alpha: Option<Vec<u8>>,
    /// Off for pixel-exact sources such as QR glyphs.
    pub interpolate: bool,
}

impl RasterImage {
    /// 8-bit grayscale pixels in row-major order.
    pub fn from_gray_pixels(width: u32, height: u32, pixels: &[u8]) -> Result<Self, QrDeckError> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(QrDeckError::Asset(format!(
                "expected {expected} gray pixels for {width}x{height}, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            color_space: ImageColorSpace::Gray,
            filter: ImageFilter::Flate,
            data: flate_compress(pixels)?,
            alpha: None,
            interpolate: false,
        })
    }

    pub fn decode(data: &[u8]) -> Result<Self, QrDeckError> {
        let format = image::guess_format(data)
            .map_err(|err| QrDeckError::Asset(format!("unrecognized image data: {err}")))?;
        let decoded = image::load_from_memory(data)
            .map_err(|err| QrDeckError::Asset(format!("image decode failed: {err}")))?;
        let (width, height) = decoded.dimensions();

        if format == image::ImageFormat::Jpeg {
            let color_space = match decoded.color() {
                image::ColorType::L8 | image::ColorType::La8 => ImageColorSpace::Gray,
                _ => ImageColorSpace::Rgb,
            };
            return Ok(Self {
                width,
                height,
                color_space,
                filter: ImageFilter::Dct,
                data: data.to_vec(),
                alpha: None,
                interpolate: true,
            });
        }

        let rgba = decoded.to_rgba8();
        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        let mut alpha = Vec::with_capacity(width as usize * height as usize);
        let mut has_alpha = false;
        for pixel in rgba.pixels() {
            let [r, g, b, a] = pixel.0;
            has_alpha |= a != 255;
            rgb.extend_from_slice(&[r, g, b]);
            alpha.push(a);
        }
        let alpha = if has_alpha {
            Some(flate_compress(&alpha)?)
        } else {
            None
        };
        Ok(Self {
            width,
            height,
            color_space: ImageColorSpace::Rgb,
            filter: ImageFilter::Flate,
            data: flate_compress(&rgb)?,
            alpha,
            interpolate: true,
        })
    }

    /// Loads a `data:` URI or a local file. Remote URLs are rejected: cover
    /// art has to be fetched by the caller before generation starts.
    pub fn load(source: &str) -> Result<Self, QrDeckError> {
        if source.starts_with("data:") {
            let (_mime, data) = parse_data_uri(source)?;
            return Self::decode(&data);
        }
        if source.starts_with("http://") || source.starts_with("https://") {
            return Err(QrDeckError::Asset(format!(
                "remote image source not prefetched: {source}"
            )));
        }
        let bytes = std::fs::read(Path::new(source))
            .map_err(|err| QrDeckError::Asset(format!("cannot read image {source}: {err}")))?;
        Self::decode(&bytes)
    }
}

fn parse_data_uri(uri: &str) -> Result<(String, Vec<u8>), QrDeckError> {
    let Some((header, data_part)) = uri.split_once(',') else {
        return Err(QrDeckError::Asset("malformed data uri".to_string()));
    };
    let mime = header
        .trim_start_matches("data:")
        .split(';')
        .next()
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.contains("base64") {
        base64::engine::general_purpose::STANDARD
            .decode(data_part.trim())
            .map_err(|err| QrDeckError::Asset(format!("invalid base64 in data uri: {err}")))?
    } else {
        data_part.as_bytes().to_vec()
    };
    Ok((mime, data))
}

pub(crate) fn flate_compress(data: &[u8]) -> Result<Vec<u8>, QrDeckError> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
