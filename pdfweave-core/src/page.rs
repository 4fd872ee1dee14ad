//! Page sizes and margins for laid out documents

use crate::geometry::Rectangle;

/// Page dimensions in points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub const A4: PageSize = PageSize {
        width: 595.0,
        height: 842.0,
    };

    pub const LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };

    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Same page turned on its side
    pub fn rotate(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    pub fn to_rectangle(self) -> Rectangle {
        Rectangle::new(0.0, 0.0, self.width, self.height)
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::A4
    }
}

/// Page margins in points (1/72 inch).
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Margins {
    /// Top margin
    pub top: f64,
    /// Right margin
    pub right: f64,
    /// Bottom margin
    pub bottom: f64,
    /// Left margin
    pub left: f64,
}

impl Margins {
    pub fn uniform(value: f64) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }
}

impl Default for Margins {
    fn default() -> Self {
        Self::uniform(36.0)
    }
}

/// Region of `size` left for content once `margins` are removed
pub fn content_area(size: PageSize, margins: &Margins) -> Rectangle {
    let mut area = size.to_rectangle();
    area.apply_margins(margins.top, margins.right, margins.bottom, margins.left, false);
    area
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(PageSize::A4, PageSize::new(595.0, 842.0));
        assert_eq!(PageSize::LETTER.rotate(), PageSize::new(792.0, 612.0));
    }

    #[test]
    fn test_content_area() {
        let area = content_area(PageSize::A4, &Margins::default());
        assert_eq!(area, Rectangle::new(36.0, 36.0, 523.0, 770.0));
    }
}
