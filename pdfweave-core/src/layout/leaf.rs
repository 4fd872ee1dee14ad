//! Leaf content and its layout
//!
//! Leaves are the only renderers that measure themselves. Everything a
//! leaf knows is reached through [`LeafContent`], so new content kinds plug
//! in without touching the block algorithm.

use std::fmt::Debug;

use crate::geometry::{Rectangle, EPS};
use crate::layout::area::{LayoutArea, LayoutContext, LayoutResult, MinMaxWidth};
use crate::layout::properties::Property;
use crate::layout::renderer::{Renderer, RendererKind};

/// Measured extent of a leaf
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeafSize {
    pub width: f64,
    pub height: f64,
}

/// Capabilities every leaf kind provides
pub trait LeafContent: Debug + Send + Sync {
    fn measure(&self, available_width: f64) -> LeafSize;

    /// Split into a part at most `height` tall and the remainder.
    fn split_at(&self, height: f64) -> Option<(Box<dyn LeafContent>, Box<dyn LeafContent>)>;

    fn clone_box(&self) -> Box<dyn LeafContent>;

    /// Short name used in placements
    fn kind_name(&self) -> &'static str;

    fn min_max_width(&self) -> MinMaxWidth {
        let natural = self.measure(f64::MAX).width;
        MinMaxWidth::new(natural, natural)
    }
}

impl Clone for Box<dyn LeafContent> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// One line of text with a fixed advance per character
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub font_size: f64,
}

impl TextLine {
    pub fn new(text: impl Into<String>, font_size: f64) -> Self {
        Self {
            text: text.into(),
            font_size,
        }
    }

    fn natural_width(&self) -> f64 {
        self.text.chars().count() as f64 * self.font_size * 0.5
    }
}

impl LeafContent for TextLine {
    fn measure(&self, available_width: f64) -> LeafSize {
        LeafSize {
            width: self.natural_width().min(available_width),
            height: self.font_size * 1.2,
        }
    }

    fn split_at(&self, _height: f64) -> Option<(Box<dyn LeafContent>, Box<dyn LeafContent>)> {
        None
    }

    fn clone_box(&self) -> Box<dyn LeafContent> {
        Box::new(self.clone())
    }

    fn kind_name(&self) -> &'static str {
        "text"
    }

    fn min_max_width(&self) -> MinMaxWidth {
        let longest_word = self
            .text
            .split_whitespace()
            .map(|w| w.chars().count())
            .max()
            .unwrap_or(0);
        MinMaxWidth::new(
            longest_word as f64 * self.font_size * 0.5,
            self.natural_width(),
        )
    }
}

/// Vertical space that may break across areas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spacer {
    pub height: f64,
}

impl Spacer {
    pub fn new(height: f64) -> Self {
        Self { height }
    }
}

impl LeafContent for Spacer {
    fn measure(&self, available_width: f64) -> LeafSize {
        LeafSize {
            width: available_width,
            height: self.height,
        }
    }

    fn split_at(&self, height: f64) -> Option<(Box<dyn LeafContent>, Box<dyn LeafContent>)> {
        if height <= EPS || height >= self.height {
            return None;
        }
        Some((
            Box::new(Spacer::new(height)),
            Box::new(Spacer::new(self.height - height)),
        ))
    }

    fn clone_box(&self) -> Box<dyn LeafContent> {
        Box::new(*self)
    }

    fn kind_name(&self) -> &'static str {
        "spacer"
    }

    fn min_max_width(&self) -> MinMaxWidth {
        MinMaxWidth::default()
    }
}

/// Fixed-size box standing in for an image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageBox {
    pub width: f64,
    pub height: f64,
}

impl ImageBox {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl LeafContent for ImageBox {
    fn measure(&self, _available_width: f64) -> LeafSize {
        LeafSize {
            width: self.width,
            height: self.height,
        }
    }

    fn split_at(&self, _height: f64) -> Option<(Box<dyn LeafContent>, Box<dyn LeafContent>)> {
        None
    }

    fn clone_box(&self) -> Box<dyn LeafContent> {
        Box::new(*self)
    }

    fn kind_name(&self) -> &'static str {
        "image"
    }
}

/// Lay out a leaf renderer at the top of the offered area.
pub(crate) fn layout_leaf(renderer: &mut Renderer, ctx: &mut LayoutContext) -> LayoutResult {
    let RendererKind::Leaf(content) = &renderer.kind else {
        return LayoutResult::nothing(Some(renderer.clone()), Some(renderer.id()));
    };
    let bbox = ctx.area.bbox;
    let page = ctx.area.page_number;
    let forced = renderer.properties.get_bool(Property::ForcedPlacement);
    let size = content.measure(bbox.width);

    let fits = size.height <= bbox.height + EPS && size.width <= bbox.width + EPS;
    if fits || forced {
        let occupied = Rectangle::new(bbox.x, bbox.get_top() - size.height, size.width, size.height);
        let area = LayoutArea::new(page, occupied);
        renderer.occupied_area = Some(area);
        return LayoutResult::full(area);
    }

    if size.width <= bbox.width + EPS {
        if let Some((head, tail)) = content.split_at(bbox.height) {
            let head_size = head.measure(bbox.width);
            let occupied = Rectangle::new(
                bbox.x,
                bbox.get_top() - head_size.height,
                head_size.width,
                head_size.height,
            );
            let area = LayoutArea::new(page, occupied);

            let mut split = renderer.with_kind(RendererKind::Leaf(head));
            split.occupied_area = Some(area);
            let mut overflow = renderer.with_kind(RendererKind::Leaf(tail));
            overflow.properties.remove(Property::ForcedPlacement);
            return LayoutResult::partial(area, split, overflow);
        }
    }

    LayoutResult::nothing(Some(renderer.clone()), Some(renderer.id()))
}
