use crate::IconValue;

use image::RgbaImage;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum IconError {
    #[error("icon slot holds an icon name or nothing, not a bitmap")]
    NotABitmap,
    #[error("bitmap of {width}x{height} is too large to send over DBus")]
    TooLarge { width: u32, height: u32 },
}

/// A bitmap in StatusNotifierItem's [Icon format], as sent in the `*Pixmap` properties.
///
/// [Icon format]: https://freedesktop.org/wiki/Specifications/StatusNotifierItem/Icons/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pixmap {
    pub width: i32,
    pub height: i32,
    /// ARGB32 pixels, alpha-premultiplied, each pixel in network byte order.
    pub data: Vec<u8>,
}

impl From<Pixmap> for (i32, i32, Vec<u8>) {
    fn from(p: Pixmap) -> Self {
        (p.width, p.height, p.data)
    }
}

/// Convert a bitmap into StatusNotifierItem's icon format.
///
/// Every pixel becomes one premultiplied ARGB32 word. The words are written big-endian no matter
/// the host byte order, which is what hosts expect.
pub fn encode(bitmap: &RgbaImage) -> Result<Pixmap, IconError> {
    let (w, h) = bitmap.dimensions();
    let too_large = || IconError::TooLarge { width: w, height: h };
    let width = i32::try_from(w).map_err(|_| too_large())?;
    let height = i32::try_from(h).map_err(|_| too_large())?;

    let mut data = Vec::with_capacity(bitmap.as_raw().len());
    for pixel in bitmap.pixels() {
        let [r, g, b, a] = pixel.0;
        let word = u32::from(a) << 24
            | u32::from(premultiply(r, a)) << 16
            | u32::from(premultiply(g, a)) << 8
            | u32::from(premultiply(b, a));
        data.extend_from_slice(&word.to_be_bytes());
    }

    Ok(Pixmap { width, height, data })
}

/// Encode the bitmap held in an icon slot.
///
/// It's an error to call this on a slot holding an icon name or nothing at all.
pub fn encode_slot(value: &IconValue) -> Result<Pixmap, IconError> {
    match value {
        IconValue::Bitmap(bitmap) => encode(bitmap),
        IconValue::Name(_) | IconValue::Unset => Err(IconError::NotABitmap),
    }
}

/// `c * a / 255`, rounded to nearest, without a division.
fn premultiply(c: u8, a: u8) -> u8 {
    let t = u32::from(c) * u32::from(a) + 0x80;
    (((t >> 8) + t) >> 8) as u8
}
