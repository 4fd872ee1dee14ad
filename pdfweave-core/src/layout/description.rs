//! JSON element descriptions
//!
//! A document is described as a list of [`ElementSpec`] trees, each tagged
//! with its `type`. [`parse_document`] reads the JSON and
//! [`ElementSpec::to_renderer`] builds the renderer tree the layout engine
//! consumes.
//!
//! ```json
//! [
//!   { "type": "paragraph", "text": "Title", "font_size": 18,
//!     "style": { "keep_with_next": true } },
//!   { "type": "div", "style": { "height": 300, "padding": 5 },
//!     "children": [ { "type": "image", "width": 100, "height": 80 } ] },
//!   { "type": "area-break", "page": true }
//! ]
//! ```

use serde::{Deserialize, Serialize};

use crate::layout::area::AreaBreakType;
use crate::layout::properties::{
    ClearValue, FloatValue, HorizontalAlignment, Position, Property, PropertyBag, UnitValue,
    VerticalAlignment,
};
use crate::layout::renderer::Renderer;
use crate::layout::table::TableModel;
use crate::layout::LayoutError;

#[derive(Debug, thiserror::Error)]
pub enum DescriptionError {
    #[error("Invalid element description: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid length '{0}', expected points or a percentage")]
    InvalidLength(String),

    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// A length given as points (`120`) or as a percentage (`"50%"`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LengthSpec {
    Points(f64),
    Text(String),
}

impl LengthSpec {
    pub fn to_unit(&self) -> Result<UnitValue, DescriptionError> {
        match self {
            LengthSpec::Points(v) => Ok(UnitValue::Point(*v)),
            LengthSpec::Text(text) => {
                let trimmed = text.trim();
                let parsed = match trimmed.strip_suffix('%') {
                    Some(percent) => percent.trim().parse().map(UnitValue::Percent),
                    None => trimmed.parse().map(UnitValue::Point),
                };
                parsed.map_err(|_| DescriptionError::InvalidLength(text.clone()))
            }
        }
    }
}

/// Box edge widths: one value for all sides or `[top, right, bottom, left]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EdgesSpec {
    Uniform(f64),
    Sides([f64; 4]),
}

impl EdgesSpec {
    fn sides(self) -> [f64; 4] {
        match self {
            EdgesSpec::Uniform(v) => [v; 4],
            EdgesSpec::Sides(sides) => sides,
        }
    }
}

/// Layout properties of one element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StyleSpec {
    pub width: Option<LengthSpec>,
    pub height: Option<f64>,
    pub min_height: Option<f64>,
    pub max_height: Option<f64>,
    pub margin: Option<EdgesSpec>,
    pub border: Option<EdgesSpec>,
    pub padding: Option<EdgesSpec>,
    pub keep_together: bool,
    pub keep_with_next: bool,
    /// Radians
    pub rotation: Option<f64>,
    pub rotation_point: Option<[f64; 2]>,
    pub float: Option<FloatValue>,
    pub clear: Option<ClearValue>,
    pub position: Option<Position>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub top: Option<f64>,
    pub left: Option<f64>,
    pub right: Option<f64>,
    pub bottom: Option<f64>,
    pub page_number: Option<u32>,
    pub vertical_alignment: Option<VerticalAlignment>,
    pub horizontal_alignment: Option<HorizontalAlignment>,
    pub fill_available_area: bool,
    pub fill_available_area_on_split: bool,
    pub collapsing_margins: bool,
    pub column_count: Option<u32>,
    pub column_gap: Option<f64>,
}

impl StyleSpec {
    /// Write the set fields into `bag`.
    pub fn apply(&self, bag: &mut PropertyBag) -> Result<(), DescriptionError> {
        if let Some(width) = &self.width {
            bag.set(Property::Width, width.to_unit()?);
        }
        let numbers = [
            (Property::Height, self.height),
            (Property::MinHeight, self.min_height),
            (Property::MaxHeight, self.max_height),
            (Property::RotationAngle, self.rotation),
            (Property::X, self.x),
            (Property::Y, self.y),
            (Property::Top, self.top),
            (Property::Left, self.left),
            (Property::Right, self.right),
            (Property::Bottom, self.bottom),
            (Property::ColumnGap, self.column_gap),
        ];
        for (key, value) in numbers {
            if let Some(value) = value {
                bag.set(key, value);
            }
        }

        let edges = [
            (self.margin, [Property::MarginTop, Property::MarginRight, Property::MarginBottom, Property::MarginLeft]),
            (self.border, [Property::BorderTop, Property::BorderRight, Property::BorderBottom, Property::BorderLeft]),
            (self.padding, [Property::PaddingTop, Property::PaddingRight, Property::PaddingBottom, Property::PaddingLeft]),
        ];
        for (spec, keys) in edges {
            if let Some(spec) = spec {
                for (key, value) in keys.into_iter().zip(spec.sides()) {
                    bag.set(key, value);
                }
            }
        }

        let flags = [
            (Property::KeepTogether, self.keep_together),
            (Property::KeepWithNext, self.keep_with_next),
            (Property::FillAvailableArea, self.fill_available_area),
            (Property::FillAvailableAreaOnSplit, self.fill_available_area_on_split),
            (Property::CollapsingMargins, self.collapsing_margins),
        ];
        for (key, value) in flags {
            if value {
                bag.set(key, true);
            }
        }

        if let Some([x, y]) = self.rotation_point {
            bag.set(Property::RotationPointX, x);
            bag.set(Property::RotationPointY, y);
        }
        if let Some(v) = self.float {
            bag.set(Property::Float, v);
        }
        if let Some(v) = self.clear {
            bag.set(Property::Clear, v);
        }
        if let Some(v) = self.position {
            bag.set(Property::Position, v);
        }
        if let Some(v) = self.vertical_alignment {
            bag.set(Property::VerticalAlignment, v);
        }
        if let Some(v) = self.horizontal_alignment {
            bag.set(Property::HorizontalAlignment, v);
        }
        if let Some(page) = self.page_number {
            bag.set(Property::PageNumber, i64::from(page));
        }
        if let Some(count) = self.column_count {
            bag.set(Property::ColumnCount, i64::from(count));
        }
        Ok(())
    }
}

fn default_font_size() -> f64 {
    12.0
}

fn default_span() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSpec {
    #[serde(default = "default_span")]
    pub rowspan: usize,
    #[serde(default = "default_span")]
    pub colspan: usize,
    #[serde(default)]
    pub style: StyleSpec,
    #[serde(default)]
    pub children: Vec<ElementSpec>,
}

impl CellSpec {
    fn to_renderer(&self) -> Result<Renderer, DescriptionError> {
        let mut cell = Renderer::cell(self.rowspan, self.colspan);
        self.style.apply(&mut cell.properties)?;
        for child in &self.children {
            cell.add_child(child.to_renderer()?);
        }
        Ok(cell)
    }
}

/// Header or footer rows of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSpec {
    pub cells: Vec<CellSpec>,
}

/// One element of a described document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ElementSpec {
    Div {
        #[serde(default)]
        style: StyleSpec,
        #[serde(default)]
        children: Vec<ElementSpec>,
    },
    Paragraph {
        text: String,
        #[serde(default = "default_font_size")]
        font_size: f64,
        #[serde(default)]
        style: StyleSpec,
    },
    Image {
        width: f64,
        height: f64,
        #[serde(default)]
        style: StyleSpec,
    },
    Spacer {
        height: f64,
        #[serde(default)]
        style: StyleSpec,
    },
    AreaBreak {
        /// Break to the next page rather than the next area
        #[serde(default)]
        page: bool,
    },
    Table {
        columns: usize,
        #[serde(default)]
        column_widths: Option<Vec<f64>>,
        #[serde(default)]
        header: Option<SectionSpec>,
        #[serde(default)]
        footer: Option<SectionSpec>,
        #[serde(default)]
        skip_first_header: bool,
        #[serde(default)]
        skip_last_footer: bool,
        cells: Vec<CellSpec>,
        #[serde(default)]
        style: StyleSpec,
    },
}

impl ElementSpec {
    /// Build the renderer tree for this element.
    pub fn to_renderer(&self) -> Result<Renderer, DescriptionError> {
        let (mut renderer, style) = match self {
            ElementSpec::Div { style, children } => {
                let mut div = Renderer::div();
                for child in children {
                    div.add_child(child.to_renderer()?);
                }
                (div, style)
            }
            ElementSpec::Paragraph {
                text,
                font_size,
                style,
            } => (Renderer::paragraph(text, *font_size), style),
            ElementSpec::Image {
                width,
                height,
                style,
            } => (Renderer::image(*width, *height), style),
            ElementSpec::Spacer { height, style } => (Renderer::spacer(*height), style),
            ElementSpec::AreaBreak { page } => {
                let kind = if *page {
                    AreaBreakType::NextPage
                } else {
                    AreaBreakType::NextArea
                };
                return Ok(Renderer::area_break(kind));
            }
            ElementSpec::Table {
                columns,
                column_widths,
                header,
                footer,
                skip_first_header,
                skip_last_footer,
                cells,
                style,
            } => {
                let mut model = build_table(*columns, column_widths.as_deref(), cells)?;
                if let Some(header) = header {
                    model.set_header(build_table(*columns, column_widths.as_deref(), &header.cells)?)?;
                }
                if let Some(footer) = footer {
                    model.set_footer(build_table(*columns, column_widths.as_deref(), &footer.cells)?)?;
                }
                model.skip_first_header = *skip_first_header;
                model.skip_last_footer = *skip_last_footer;
                (Renderer::table(model), style)
            }
        };
        style.apply(&mut renderer.properties)?;
        Ok(renderer)
    }
}

fn build_table(
    columns: usize,
    widths: Option<&[f64]>,
    cells: &[CellSpec],
) -> Result<TableModel, DescriptionError> {
    let mut model = TableModel::new(columns)?;
    if let Some(widths) = widths {
        model = model.with_column_widths(widths.to_vec())?;
    }
    for cell in cells {
        model.add_cell(cell.to_renderer()?)?;
    }
    Ok(model)
}

/// Parse a JSON array of elements into renderers.
pub fn parse_document(json: &str) -> Result<Vec<Renderer>, DescriptionError> {
    let specs: Vec<ElementSpec> = serde_json::from_str(json)?;
    specs.iter().map(ElementSpec::to_renderer).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::properties::Position;
    use crate::layout::renderer::RendererKind;

    #[test]
    fn test_parse_mixed_document() {
        let json = r#"[
            { "type": "paragraph", "text": "a\nb", "style": { "keep_with_next": true } },
            { "type": "div", "style": { "width": "50%", "padding": [1, 2, 3, 4] },
              "children": [ { "type": "image", "width": 10, "height": 20 } ] },
            { "type": "area-break", "page": true }
        ]"#;
        let renderers = parse_document(json).unwrap();
        assert_eq!(renderers.len(), 3);

        assert_eq!(renderers[0].children.len(), 2);
        assert!(renderers[0].properties.get_bool(Property::KeepWithNext));

        let div = &renderers[1];
        assert_eq!(
            div.properties.get_unit(Property::Width),
            Some(UnitValue::Percent(50.0))
        );
        assert_eq!(div.properties.paddings(), [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(div.children[0].kind_name(), "image");

        assert!(matches!(
            renderers[2].kind,
            RendererKind::AreaBreak(AreaBreakType::NextPage)
        ));
    }

    #[test]
    fn test_positioned_child_is_kept_out_of_flow() {
        let json = r#"[{ "type": "div", "children": [
            { "type": "spacer", "height": 5 },
            { "type": "div", "style": { "position": "absolute", "top": 10 } }
        ]}]"#;
        let renderers = parse_document(json).unwrap();
        assert_eq!(renderers[0].children.len(), 1);
        assert_eq!(renderers[0].positioned.len(), 1);
        assert_eq!(renderers[0].positioned[0].properties.position(), Position::Absolute);
    }

    #[test]
    fn test_table_with_header() {
        let json = r#"[{ "type": "table", "columns": 2, "column_widths": [100, 50],
            "header": { "cells": [ {}, {} ] },
            "cells": [ { "rowspan": 2 }, {}, {} ] }]"#;
        let renderers = parse_document(json).unwrap();
        let RendererKind::Table(model) = &renderers[0].kind else {
            panic!("expected a table");
        };
        assert_eq!(model.columns(), 2);
        assert_eq!(model.cells().len(), 3);
        assert!(model.is_complete());
    }

    #[test]
    fn test_invalid_descriptions() {
        assert!(matches!(
            parse_document(r#"[{ "type": "div", "style": { "width": "wide" } }]"#),
            Err(DescriptionError::InvalidLength(_))
        ));
        assert!(matches!(
            parse_document(r#"[{ "type": "table", "columns": 0, "cells": [] }]"#),
            Err(DescriptionError::Layout(LayoutError::InvalidTable(_)))
        ));
        assert!(matches!(
            parse_document(r#"[{ "type": "div", "style": { "colour": "red" } }]"#),
            Err(DescriptionError::Json(_))
        ));
        assert!(matches!(
            parse_document(r#"[{ "type": "table", "columns": 3, "column_widths": [1, 2], "cells": [] }]"#),
            Err(DescriptionError::Layout(LayoutError::InvalidTable(_)))
        ));
    }
}
