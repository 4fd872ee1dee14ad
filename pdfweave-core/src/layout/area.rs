//! Areas, contexts and results exchanged by renderers

use crate::geometry::Rectangle;
use crate::layout::renderer::{ElementId, Renderer};

/// A region offered to a renderer
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LayoutArea {
    pub page_number: u32,
    pub bbox: Rectangle,
    /// Nothing has been placed in this area yet
    pub empty_area: bool,
}

impl LayoutArea {
    pub fn new(page_number: u32, bbox: Rectangle) -> Self {
        Self {
            page_number,
            bbox,
            empty_area: false,
        }
    }

    /// A fresh area that has not accepted any content
    pub fn empty(page_number: u32, bbox: Rectangle) -> Self {
        Self {
            page_number,
            bbox,
            empty_area: true,
        }
    }
}

/// Where an area break sends the following content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AreaBreakType {
    #[default]
    NextArea,
    NextPage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutStatus {
    Full,
    Partial,
    Nothing,
}

/// Outcome of one `layout` call
#[derive(Debug, Clone)]
pub struct LayoutResult {
    pub status: LayoutStatus,
    pub occupied_area: Option<LayoutArea>,
    pub split: Option<Box<Renderer>>,
    pub overflow: Option<Box<Renderer>>,
    pub area_break: Option<AreaBreakType>,
    pub cause_of_nothing: Option<ElementId>,
}

impl LayoutResult {
    pub fn full(occupied_area: LayoutArea) -> Self {
        Self {
            status: LayoutStatus::Full,
            occupied_area: Some(occupied_area),
            split: None,
            overflow: None,
            area_break: None,
            cause_of_nothing: None,
        }
    }

    pub fn partial(occupied_area: LayoutArea, split: Renderer, overflow: Renderer) -> Self {
        Self {
            status: LayoutStatus::Partial,
            occupied_area: Some(occupied_area),
            split: Some(Box::new(split)),
            overflow: Some(Box::new(overflow)),
            area_break: None,
            cause_of_nothing: None,
        }
    }

    pub fn nothing(overflow: Option<Renderer>, cause_of_nothing: Option<ElementId>) -> Self {
        Self {
            status: LayoutStatus::Nothing,
            occupied_area: None,
            split: None,
            overflow: overflow.map(Box::new),
            area_break: None,
            cause_of_nothing,
        }
    }

    pub fn with_area_break(mut self, area_break: Option<AreaBreakType>) -> Self {
        self.area_break = area_break;
        self
    }
}

/// Bottom margin of the previous sibling, for collapsing adjacent margins
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MarginsCollapseInfo {
    pub prev_bottom_margin: f64,
}

/// Everything a renderer sees while laying out
#[derive(Debug, Clone)]
pub struct LayoutContext {
    pub area: LayoutArea,
    pub margins_collapse: Option<MarginsCollapseInfo>,
    /// Floats placed so far in the enclosing flow
    pub float_areas: Vec<Rectangle>,
}

impl LayoutContext {
    pub fn new(area: LayoutArea) -> Self {
        Self {
            area,
            margins_collapse: None,
            float_areas: Vec::new(),
        }
    }

    pub fn with_floats(area: LayoutArea, float_areas: Vec<Rectangle>) -> Self {
        Self {
            area,
            margins_collapse: None,
            float_areas,
        }
    }
}

/// Narrowest and widest widths a renderer can take
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MinMaxWidth {
    pub min: f64,
    pub max: f64,
}

impl MinMaxWidth {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn widen(self, delta: f64) -> Self {
        Self::new(self.min + delta, self.max + delta)
    }

    pub fn merge_max(self, other: MinMaxWidth) -> Self {
        Self::new(self.min.max(other.min), self.max.max(other.max))
    }
}
