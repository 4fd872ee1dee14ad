//! Paginating block and table layout
//!
//! Content is described as a tree of [`Renderer`]s. Each renderer lays
//! itself out against an offered [`LayoutArea`] and reports one of three
//! outcomes:
//!
//! - `Full`: everything fit and the renderer now holds its final geometry
//! - `Partial`: a split renderer holds what fit, an overflow renderer holds
//!   the rest for a later area
//! - `Nothing`: not even a forced minimum could be placed
//!
//! [`RootLayout`] drives top-level renderers across areas handed out by an
//! [`AreaProvider`]; [`DocumentLayout`] is the page-based driver.
//!
//! ## Example
//!
//! ```rust
//! use pdfweave::layout::{DocumentLayout, LayoutConfig, Property, Renderer};
//! use pdfweave::page::PageSize;
//!
//! let mut doc = DocumentLayout::new(PageSize::A4, LayoutConfig::default());
//! doc.add(Renderer::paragraph("Hello\nWorld", 12.0));
//! doc.add(Renderer::div().with(Property::Height, 1300.0));
//! let pages = doc.close();
//! assert_eq!(pages.len(), 2);
//! ```

pub mod area;
pub mod block;
#[cfg(feature = "serde")]
pub mod description;
pub mod leaf;
pub mod messages;
pub mod properties;
pub mod renderer;
pub mod root;
pub mod table;

pub use area::{
    AreaBreakType, LayoutArea, LayoutContext, LayoutResult, LayoutStatus, MarginsCollapseInfo,
    MinMaxWidth,
};
pub use leaf::{ImageBox, LeafContent, LeafSize, Spacer, TextLine};
pub use properties::{
    ClearValue, FloatValue, HorizontalAlignment, Position, Property, PropertyBag, PropertyValue,
    UnitValue, VerticalAlignment,
};
pub use renderer::{ElementId, Placement, Renderer, RendererKind};
pub use root::{
    placements, AreaProvider, DocumentLayout, KeepWithNextPolicy, LayoutConfig, PageAreaProvider,
    RootLayout,
};
pub use table::TableModel;

/// Height used for "unbounded" layout boxes
pub const INF: f64 = 1e6;

/// Layout errors
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("Unsupported layout operation: {0}")]
    UnsupportedOperation(&'static str),

    #[error("Invalid table: {0}")]
    InvalidTable(String),
}
