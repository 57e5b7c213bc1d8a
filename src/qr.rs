use crate::assets::RasterImage;
use crate::error::QrDeckError;
use qrcode::{EcLevel, QrCode};

/// Square monochrome QR bitmap, one pixel per module, quiet zone included.
/// Pixels are 8-bit gray: 0 for dark modules, 255 for light ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrBitmap {
    pub size: u32,
    pub pixels: Vec<u8>,
}

impl QrBitmap {
    pub fn is_dark(&self, x: u32, y: u32) -> bool {
        x < self.size && y < self.size && self.pixels[(y * self.size + x) as usize] == 0
    }

    pub fn to_raster(&self) -> Result<RasterImage, QrDeckError> {
        RasterImage::from_gray_pixels(self.size, self.size, &self.pixels)
    }
}

/// QR glyph primitive. Implementations must be pure: the same payload
/// always yields the same bitmap.
pub trait QrEncoder: Send + Sync {
    fn encode(&self, payload: &str) -> Result<QrBitmap, QrDeckError>;
}

/// Encoder backed by the `qrcode` crate, error correction level L.
#[derive(Debug, Clone, Copy)]
pub struct QrCodeEncoder {
    quiet_zone: u32,
}

impl QrCodeEncoder {
    pub const DEFAULT_QUIET_ZONE: u32 = 4;

    pub fn with_quiet_zone(quiet_zone: u32) -> Self {
        Self { quiet_zone }
    }
}

impl Default for QrCodeEncoder {
    fn default() -> Self {
        Self::with_quiet_zone(Self::DEFAULT_QUIET_ZONE)
    }
}

impl QrEncoder for QrCodeEncoder {
    fn encode(&self, payload: &str) -> Result<QrBitmap, QrDeckError> {
        let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::L)
            .map_err(|err| QrDeckError::QrEncoding(format!("{payload}: {err}")))?;
        let modules = code.width() as u32;
        let colors = code.to_colors();
        let size = modules + 2 * self.quiet_zone;
        let mut pixels = vec![255u8; (size * size) as usize];
        for (idx, color) in colors.iter().enumerate() {
            if *color == qrcode::Color::Dark {
                let x = idx as u32 % modules + self.quiet_zone;
                let y = idx as u32 / modules + self.quiet_zone;
                pixels[(y * size + x) as usize] = 0;
            }
        }
        Ok(QrBitmap { size, pixels })
    }
}
