use fixed::types::I32F32;

const MM_PER_INCH: f32 = 25.4;
const PT_PER_INCH: f32 = 72.0;

/// Fixed-point length in PDF points, quantized to 1/1000 pt so that layout
/// arithmetic is reproducible across platforms.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Pt(I32F32);

impl Pt {
    pub const ZERO: Pt = Pt(I32F32::from_bits(0));

    pub fn from_f32(value: f32) -> Pt {
        if !value.is_finite() {
            return Pt::ZERO;
        }
        let milli = (value as f64 * 1000.0).round();
        let milli = milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
        Pt::from_milli_i64(milli)
    }

    pub fn from_mm(value: f32) -> Pt {
        Pt::from_f32(value * PT_PER_INCH / MM_PER_INCH)
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    pub fn to_mm(self) -> f32 {
        self.to_f32() * MM_PER_INCH / PT_PER_INCH
    }

    pub fn to_milli_i64(self) -> i64 {
        const ONE: i128 = 1 << 32;
        let scaled = self.0.to_bits() as i128 * 1000;
        let half = if scaled < 0 { -ONE / 2 } else { ONE / 2 };
        ((scaled + half) / ONE).clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn max(self, other: Pt) -> Pt {
        if other > self { other } else { self }
    }

    pub fn min(self, other: Pt) -> Pt {
        if other < self { other } else { self }
    }

    pub fn from_milli_i64(milli: i64) -> Pt {
        Pt::from_milli(milli as i128)
    }

    fn milli(self) -> i128 {
        self.to_milli_i64() as i128
    }

    // Rounds half away from zero onto the 32-bit fractional grid.
    fn from_milli(milli: i128) -> Pt {
        const ONE: i128 = 1 << 32;
        let half = if milli < 0 { -500 } else { 500 };
        let bits = ((milli * ONE + half) / 1000).clamp(i64::MIN as i128, i64::MAX as i128);
        Pt(I32F32::from_bits(bits as i64))
    }
}

impl std::ops::Add for Pt {
    type Output = Pt;
    fn add(self, rhs: Pt) -> Pt {
        Pt::from_milli(self.milli() + rhs.milli())
    }
}

impl std::ops::Sub for Pt {
    type Output = Pt;
    fn sub(self, rhs: Pt) -> Pt {
        Pt::from_milli(self.milli() - rhs.milli())
    }
}

impl std::ops::AddAssign for Pt {
    fn add_assign(&mut self, rhs: Pt) {
        *self = *self + rhs;
    }
}

impl std::ops::SubAssign for Pt {
    fn sub_assign(&mut self, rhs: Pt) {
        *self = *self - rhs;
    }
}

impl std::ops::Neg for Pt {
    type Output = Pt;
    fn neg(self) -> Pt {
        Pt::from_milli(-self.milli())
    }
}

/// Integer scaling stays exact in millipoints.
impl std::ops::Mul<i32> for Pt {
    type Output = Pt;
    fn mul(self, rhs: i32) -> Pt {
        Pt::from_milli(self.milli().saturating_mul(rhs.into()))
    }
}

/// Fractional scaling goes through `f32`; non-finite factors collapse to zero.
impl std::ops::Mul<f32> for Pt {
    type Output = Pt;
    fn mul(self, rhs: f32) -> Pt {
        if rhs.is_finite() {
            Pt::from_f32(self.to_f32() * rhs)
        } else {
            Pt::ZERO
        }
    }
}

impl std::ops::Div<f32> for Pt {
    type Output = Pt;
    fn div(self, rhs: f32) -> Pt {
        if rhs.is_finite() && rhs != 0.0 {
            Pt::from_f32(self.to_f32() / rhs)
        } else {
            Pt::ZERO
        }
    }
}

impl std::iter::Sum for Pt {
    fn sum<I: Iterator<Item = Pt>>(iter: I) -> Pt {
        Pt::from_milli(iter.map(Pt::milli).sum())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: Pt,
    pub height: Pt,
}

impl Size {
    /// A4 portrait, 210mm x 297mm.
    pub fn a4() -> Self {
        Self::from_mm(210.0, 297.0)
    }

    pub fn from_mm(width_mm: f32, height_mm: f32) -> Self {
        Self {
            width: Pt::from_mm(width_mm),
            height: Pt::from_mm(height_mm),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: Pt,
    pub right: Pt,
    pub bottom: Pt,
    pub left: Pt,
}

impl Margins {
    pub fn from_mm(top: f32, right: f32, bottom: f32, left: f32) -> Self {
        Self {
            top: Pt::from_mm(top),
            right: Pt::from_mm(right),
            bottom: Pt::from_mm(bottom),
            left: Pt::from_mm(left),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub const BLUE: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 1.0,
    };

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Gray level on the 0..=255 scale.
    pub fn gray(level: u8) -> Self {
        let v = level as f32 / 255.0;
        Self { r: v, g: v, b: v }
    }
}
