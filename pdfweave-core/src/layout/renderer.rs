//! Renderer tree
//!
//! A [`Renderer`] mirrors one content element. It owns its properties and
//! children, and after a successful layout it holds the area it occupies.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::geometry::Rectangle;
use crate::layout::area::{AreaBreakType, LayoutArea, LayoutContext, LayoutResult, MinMaxWidth};
use crate::layout::leaf::{self, ImageBox, LeafContent, Spacer, TextLine};
use crate::layout::properties::{FloatValue, Position, Property, PropertyBag, PropertyValue};
use crate::layout::table::{self, TableModel};
use crate::layout::block;

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a content element, shared by its split and overflow parts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElementId(pub u64);

impl ElementId {
    pub fn next() -> Self {
        ElementId(NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Content kind of a renderer
#[derive(Debug, Clone)]
pub enum RendererKind {
    Div,
    Paragraph,
    /// Table cell; `row`/`col` are assigned when the cell joins a table.
    Cell {
        row: usize,
        col: usize,
        rowspan: usize,
        colspan: usize,
    },
    Table(Box<TableModel>),
    AreaBreak(AreaBreakType),
    Leaf(Box<dyn LeafContent>),
}

/// Where one renderer ended up
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Placement {
    pub id: ElementId,
    pub kind: String,
    pub page: u32,
    pub bbox: Rectangle,
}

#[derive(Debug, Clone)]
pub struct Renderer {
    id: ElementId,
    pub kind: RendererKind,
    pub properties: PropertyBag,
    /// In-flow children
    pub children: Vec<Renderer>,
    /// Absolutely or fixed positioned children
    pub positioned: Vec<Renderer>,
    pub occupied_area: Option<LayoutArea>,
}

impl Renderer {
    pub fn new(kind: RendererKind) -> Self {
        Self {
            id: ElementId::next(),
            kind,
            properties: PropertyBag::new(),
            children: Vec::new(),
            positioned: Vec::new(),
            occupied_area: None,
        }
    }

    pub fn div() -> Self {
        Self::new(RendererKind::Div)
    }

    /// A paragraph with one text line per input line
    pub fn paragraph(text: &str, font_size: f64) -> Self {
        let mut paragraph = Self::new(RendererKind::Paragraph);
        for line in text.lines() {
            paragraph.add_child(Self::text_line(line, font_size));
        }
        paragraph
    }

    pub fn cell(rowspan: usize, colspan: usize) -> Self {
        Self::new(RendererKind::Cell {
            row: 0,
            col: 0,
            rowspan,
            colspan,
        })
    }

    pub fn table(model: TableModel) -> Self {
        Self::new(RendererKind::Table(Box::new(model)))
    }

    pub fn area_break(kind: AreaBreakType) -> Self {
        Self::new(RendererKind::AreaBreak(kind))
    }

    pub fn leaf(content: Box<dyn LeafContent>) -> Self {
        Self::new(RendererKind::Leaf(content))
    }

    pub fn text_line(text: &str, font_size: f64) -> Self {
        Self::leaf(Box::new(TextLine::new(text, font_size)))
    }

    pub fn spacer(height: f64) -> Self {
        Self::leaf(Box::new(Spacer::new(height)))
    }

    pub fn image(width: f64, height: f64) -> Self {
        Self::leaf(Box::new(ImageBox::new(width, height)))
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Builder form of [`Renderer::set`]
    pub fn with(mut self, key: Property, value: impl Into<PropertyValue>) -> Self {
        self.properties.set(key, value);
        self
    }

    pub fn set(&mut self, key: Property, value: impl Into<PropertyValue>) {
        self.properties.set(key, value);
    }

    /// Builder form of [`Renderer::add_child`]
    pub fn child(mut self, child: Renderer) -> Self {
        self.add_child(child);
        self
    }

    /// Positioned children leave the flow.
    pub fn add_child(&mut self, child: Renderer) {
        if child.is_positioned() {
            self.positioned.push(child);
        } else {
            self.children.push(child);
        }
    }

    /// Same element and properties with no children or geometry
    pub(crate) fn shell(&self) -> Renderer {
        Renderer {
            id: self.id,
            kind: self.kind.clone(),
            properties: self.properties.clone(),
            children: Vec::new(),
            positioned: Vec::new(),
            occupied_area: None,
        }
    }

    pub(crate) fn with_kind(&self, kind: RendererKind) -> Renderer {
        let mut shell = self.shell();
        shell.kind = kind;
        shell
    }

    pub fn is_float(&self) -> bool {
        self.properties.float_value() != FloatValue::None
    }

    pub fn is_positioned(&self) -> bool {
        matches!(
            self.properties.position(),
            Position::Absolute | Position::Fixed
        )
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            RendererKind::Div => "div",
            RendererKind::Paragraph => "paragraph",
            RendererKind::Cell { .. } => "cell",
            RendererKind::Table(_) => "table",
            RendererKind::AreaBreak(_) => "area-break",
            RendererKind::Leaf(content) => content.kind_name(),
        }
    }

    pub fn occupied_bbox(&self) -> Option<Rectangle> {
        self.occupied_area.map(|a| a.bbox)
    }

    /// Lay this renderer out against `ctx.area`.
    pub fn layout(&mut self, ctx: &mut LayoutContext) -> LayoutResult {
        if let RendererKind::AreaBreak(kind) = self.kind {
            return LayoutResult::nothing(None, None).with_area_break(Some(kind));
        }
        match self.kind {
            RendererKind::Leaf(_) => leaf::layout_leaf(self, ctx),
            RendererKind::Table(_) => table::layout_table(self, ctx),
            _ => block::layout_block(self, ctx),
        }
    }

    /// Shift the laid out subtree.
    pub fn move_by(&mut self, dx: f64, dy: f64) {
        if let Some(area) = self.occupied_area.as_mut() {
            area.bbox.move_right(dx).move_up(dy);
        }
        for child in self.children.iter_mut().chain(self.positioned.iter_mut()) {
            child.move_by(dx, dy);
        }
    }

    pub(crate) fn set_page(&mut self, page: u32) {
        if let Some(area) = self.occupied_area.as_mut() {
            area.page_number = page;
        }
        for child in self.children.iter_mut().chain(self.positioned.iter_mut()) {
            child.set_page(page);
        }
    }

    /// Occupied box shifted by a relative position offset
    pub fn visual_bbox(&self) -> Option<Rectangle> {
        let mut bbox = self.occupied_bbox()?;
        if self.properties.position() == Position::Relative {
            let p = &self.properties;
            let dx = match (p.get_f64(Property::Left), p.get_f64(Property::Right)) {
                (Some(left), _) => left,
                (None, Some(right)) => -right,
                _ => 0.0,
            };
            let dy = match (p.get_f64(Property::Top), p.get_f64(Property::Bottom)) {
                (Some(top), _) => -top,
                (None, Some(bottom)) => bottom,
                _ => 0.0,
            };
            bbox.move_right(dx).move_up(dy);
        }
        Some(bbox)
    }

    pub fn min_max_width(&self) -> MinMaxWidth {
        let p = &self.properties;
        let margins = p.margins();
        let borders = p.borders();
        let paddings = p.paddings();
        let horizontal = margins[1] + margins[3] + borders[1] + borders[3] + paddings[1] + paddings[3];

        let inner = match &self.kind {
            RendererKind::Leaf(content) => content.min_max_width(),
            RendererKind::Table(model) => model.min_max_width(),
            RendererKind::AreaBreak(_) => MinMaxWidth::default(),
            _ => self
                .children
                .iter()
                .fold(MinMaxWidth::default(), |acc, c| acc.merge_max(c.min_max_width())),
        };
        let inner = match p.get_f64(Property::Width) {
            Some(width) => MinMaxWidth::new(width, width),
            None => inner,
        };
        inner.widen(horizontal)
    }

    /// Every laid out renderer in this subtree, parents first
    pub fn placements(&self) -> Vec<Placement> {
        let mut out = Vec::new();
        self.collect_placements(&mut out);
        out
    }

    fn collect_placements(&self, out: &mut Vec<Placement>) {
        if let Some(bbox) = self.visual_bbox() {
            out.push(Placement {
                id: self.id,
                kind: self.kind_name().to_string(),
                page: self.occupied_area.map(|a| a.page_number).unwrap_or(0),
                bbox,
            });
        }
        for child in self.children.iter().chain(self.positioned.iter()) {
            child.collect_placements(out);
        }
    }
}
