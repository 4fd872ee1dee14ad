//! Tables
//!
//! A [`TableModel`] places cells on a logical grid. The table renderer lays
//! rows top-down; when a row does not fit it either splits that row (every
//! single-row cell can show part of its content) or moves it whole to the
//! overflow table. Cells spanning the boundary row continue in the
//! overflow with the rows they still cover.

use tracing::{debug, warn};

use crate::geometry::{Rectangle, EPS};
use crate::layout::area::{LayoutArea, LayoutContext, LayoutResult, LayoutStatus, MinMaxWidth};
use crate::layout::block::decrement_heights;
use crate::layout::messages;
use crate::layout::properties::{Property, VerticalAlignment};
use crate::layout::renderer::{ElementId, Renderer, RendererKind};
use crate::layout::{LayoutError, INF};

/// Grid position of one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellPos {
    row: usize,
    col: usize,
    rowspan: usize,
    colspan: usize,
}

impl CellPos {
    fn of(cell: &Renderer) -> Self {
        match cell.kind {
            RendererKind::Cell {
                row,
                col,
                rowspan,
                colspan,
            } => CellPos {
                row,
                col,
                rowspan,
                colspan,
            },
            _ => CellPos {
                row: 0,
                col: 0,
                rowspan: 1,
                colspan: 1,
            },
        }
    }

    fn end_row(&self) -> usize {
        self.row + self.rowspan - 1
    }
}

fn relocate(cell: &mut Renderer, new_row: usize, new_rowspan: usize) {
    if let RendererKind::Cell { row, rowspan, .. } = &mut cell.kind {
        *row = new_row;
        *rowspan = new_rowspan;
    }
}

#[derive(Debug, Clone)]
pub struct TableModel {
    columns: usize,
    column_widths: Option<Vec<f64>>,
    cells: Vec<Renderer>,
    occupancy: Vec<Vec<bool>>,
    current_row: usize,
    current_col: usize,
    header: Option<Box<TableModel>>,
    footer: Option<Box<TableModel>>,
    pub skip_first_header: bool,
    pub skip_last_footer: bool,
    is_continuation: bool,
}

impl TableModel {
    pub fn new(columns: usize) -> Result<Self, LayoutError> {
        if columns == 0 {
            return Err(LayoutError::InvalidTable(
                "a table needs at least one column".to_string(),
            ));
        }
        Ok(Self {
            columns,
            column_widths: None,
            cells: Vec::new(),
            occupancy: Vec::new(),
            current_row: 0,
            current_col: 0,
            header: None,
            footer: None,
            skip_first_header: false,
            skip_last_footer: false,
            is_continuation: false,
        })
    }

    /// Fixed column widths in points.
    pub fn with_column_widths(mut self, widths: Vec<f64>) -> Result<Self, LayoutError> {
        if widths.len() != self.columns {
            return Err(LayoutError::InvalidTable(format!(
                "{} column widths given for {} columns",
                widths.len(),
                self.columns
            )));
        }
        self.column_widths = Some(widths);
        Ok(self)
    }

    pub fn set_header(&mut self, header: TableModel) -> Result<(), LayoutError> {
        self.check_section(&header)?;
        self.header = Some(Box::new(header));
        Ok(())
    }

    pub fn set_footer(&mut self, footer: TableModel) -> Result<(), LayoutError> {
        self.check_section(&footer)?;
        self.footer = Some(Box::new(footer));
        Ok(())
    }

    fn check_section(&self, section: &TableModel) -> Result<(), LayoutError> {
        if section.columns != self.columns {
            return Err(LayoutError::InvalidTable(format!(
                "section has {} columns, table has {}",
                section.columns, self.columns
            )));
        }
        Ok(())
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn cells(&self) -> &[Renderer] {
        &self.cells
    }

    pub fn is_continuation(&self) -> bool {
        self.is_continuation
    }

    /// Number of rows covered by cells; trailing empty rows do not count.
    pub fn row_count(&self) -> usize {
        self.cells
            .iter()
            .map(|c| {
                let pos = CellPos::of(c);
                pos.row + pos.rowspan
            })
            .max()
            .unwrap_or(0)
    }

    fn is_occupied(&self, row: usize, col: usize) -> bool {
        self.occupancy
            .get(row)
            .and_then(|r| r.get(col))
            .copied()
            .unwrap_or(false)
    }

    fn row_has_cells(&self, row: usize) -> bool {
        (0..self.columns).any(|c| self.is_occupied(row, c))
    }

    pub fn is_row_complete(&self, row: usize) -> bool {
        (0..self.columns).all(|c| self.is_occupied(row, c))
    }

    /// True when the row being filled has no free column left.
    pub fn is_complete(&self) -> bool {
        self.is_row_complete(self.current_row)
    }

    /// Add a cell at the next free grid position.
    ///
    /// Renderers that are not cells are wrapped in a 1x1 cell.
    pub fn add_cell(&mut self, cell: Renderer) -> Result<&mut Self, LayoutError> {
        let is_cell = matches!(cell.kind, RendererKind::Cell { .. });
        let mut cell = if is_cell {
            cell
        } else {
            Renderer::cell(1, 1).child(cell)
        };
        let pos = CellPos::of(&cell);
        if pos.rowspan == 0 || pos.colspan == 0 {
            return Err(LayoutError::InvalidTable(format!(
                "cell spans must be positive, got rowspan {} colspan {}",
                pos.rowspan, pos.colspan
            )));
        }
        if pos.colspan > self.columns {
            return Err(LayoutError::InvalidTable(format!(
                "colspan {} exceeds {} columns",
                pos.colspan, self.columns
            )));
        }

        loop {
            if self.current_col >= self.columns {
                self.current_row += 1;
                self.current_col = 0;
                continue;
            }
            if self.current_col + pos.colspan > self.columns {
                self.start_new_row();
                continue;
            }
            let row = self.current_row;
            let start = self.current_col;
            if (start..start + pos.colspan).all(|c| !self.is_occupied(row, c)) {
                break;
            }
            self.current_col += 1;
        }

        if let RendererKind::Cell { row, col, .. } = &mut cell.kind {
            *row = self.current_row;
            *col = self.current_col;
        }
        self.current_col += pos.colspan;
        self.place(cell);
        Ok(self)
    }

    /// Close the current row, warning if it still has free columns.
    pub fn start_new_row(&mut self) -> &mut Self {
        let row = self.current_row;
        if self.row_has_cells(row) && !self.is_row_complete(row) {
            warn!(
                code = messages::LAST_ROW_IS_NOT_COMPLETE,
                row, "Last row is not completed. Table bottom border may collapse as you do not expect it"
            );
        }
        self.current_row += 1;
        self.current_col = 0;
        self
    }

    /// Store a cell whose position is already set.
    fn place(&mut self, cell: Renderer) {
        let pos = CellPos::of(&cell);
        for row in pos.row..pos.row + pos.rowspan {
            if self.occupancy.len() <= row {
                self.occupancy.resize(row + 1, vec![false; self.columns]);
            }
            for col in pos.col..(pos.col + pos.colspan).min(self.columns) {
                self.occupancy[row][col] = true;
            }
        }
        self.cells.push(cell);
    }

    /// Empty model carrying the configuration of this one
    fn continuation(&self) -> TableModel {
        TableModel {
            columns: self.columns,
            column_widths: self.column_widths.clone(),
            cells: Vec::new(),
            occupancy: Vec::new(),
            current_row: 0,
            current_col: 0,
            header: self.header.clone(),
            footer: self.footer.clone(),
            skip_first_header: self.skip_first_header,
            skip_last_footer: self.skip_last_footer,
            is_continuation: true,
        }
    }

    fn warn_if_last_row_incomplete(&self) {
        let rows = self.row_count();
        if rows > 0 && !self.is_row_complete(rows - 1) {
            warn!(
                code = messages::LAST_ROW_IS_NOT_COMPLETE,
                row = rows - 1,
                "Last row is not completed. Table bottom border may collapse as you do not expect it"
            );
        }
    }

    /// Column widths fitted into `available`
    fn resolve_widths(&self, available: f64) -> Vec<f64> {
        match &self.column_widths {
            Some(widths) => {
                let total: f64 = widths.iter().sum();
                if total > available + EPS && total > 0.0 {
                    let scale = available / total;
                    widths.iter().map(|w| w * scale).collect()
                } else {
                    widths.clone()
                }
            }
            None => vec![available / self.columns as f64; self.columns],
        }
    }

    pub fn min_max_width(&self) -> MinMaxWidth {
        if let Some(widths) = &self.column_widths {
            let total = widths.iter().sum();
            return MinMaxWidth::new(total, total);
        }
        let per_column = self.cells.iter().fold(MinMaxWidth::default(), |acc, cell| {
            let span = CellPos::of(cell).colspan.max(1) as f64;
            let mmw = cell.min_max_width();
            acc.merge_max(MinMaxWidth::new(mmw.min / span, mmw.max / span))
        });
        let n = self.columns as f64;
        MinMaxWidth::new(per_column.min * n, per_column.max * n)
    }
}

fn layout_at(cell: &mut Renderer, page: u32, bbox: Rectangle) -> LayoutResult {
    let mut ctx = LayoutContext::new(LayoutArea::new(page, bbox));
    let result = cell.layout(&mut ctx);
    if cell.occupied_area.is_none() && result.status == LayoutStatus::Full {
        cell.occupied_area = Some(LayoutArea::new(
            page,
            Rectangle::new(bbox.x, bbox.get_top(), bbox.width, 0.0),
        ));
    }
    result
}

/// Stretch a laid out cell down to `height`, honoring its vertical alignment.
fn stretch_cell(cell: &mut Renderer, height: f64) {
    let Some(bbox) = cell.occupied_bbox() else {
        return;
    };
    let extra = height - bbox.height;
    if extra <= EPS {
        return;
    }
    let shift = match cell.properties.vertical_alignment() {
        VerticalAlignment::Top => 0.0,
        VerticalAlignment::Middle => extra / 2.0,
        VerticalAlignment::Bottom => extra,
    };
    if shift > EPS {
        for child in cell.children.iter_mut() {
            child.move_by(0.0, -shift);
        }
    }
    if let Some(area) = cell.occupied_area.as_mut() {
        area.bbox.increase_height(extra);
    }
}

struct Columns {
    lefts: Vec<f64>,
    widths: Vec<f64>,
}

impl Columns {
    fn new(x: f64, widths: Vec<f64>) -> Self {
        let mut lefts = Vec::with_capacity(widths.len());
        let mut left = x;
        for w in &widths {
            lefts.push(left);
            left += w;
        }
        Self { lefts, widths }
    }

    fn total(&self) -> f64 {
        self.widths.iter().sum()
    }

    fn left(&self, pos: &CellPos) -> f64 {
        self.lefts.get(pos.col).copied().unwrap_or(0.0)
    }

    fn span(&self, pos: &CellPos) -> f64 {
        let end = (pos.col + pos.colspan).min(self.widths.len());
        self.widths[pos.col.min(end)..end].iter().sum()
    }
}

struct BodyLayout {
    cells: Vec<Renderer>,
    height: f64,
    overflow: Option<TableModel>,
    nothing_placed: bool,
}

/// Cells placed on this page and the model continuing on the next
struct Cut {
    page: u32,
    placed: Vec<Renderer>,
    overflow: TableModel,
}

impl Cut {
    /// Place the part of one spanning or split cell that fits in `bbox`.
    fn place(
        &mut self,
        original: &Renderer,
        mut trial: Renderer,
        result: LayoutResult,
        bbox: Rectangle,
        new_rowspan: usize,
    ) {
        match result.status {
            LayoutStatus::Full => {
                stretch_cell(&mut trial, bbox.height);
                self.placed.push(trial);
                let mut continuation = original.shell();
                relocate(&mut continuation, 0, new_rowspan);
                decrement_heights(&mut continuation.properties, bbox.height);
                self.overflow.place(continuation);
            }
            LayoutStatus::Partial => {
                if let Some(mut split) = result.split {
                    stretch_cell(&mut split, bbox.height);
                    self.placed.push(*split);
                }
                if let Some(mut rest) = result.overflow {
                    relocate(&mut rest, 0, new_rowspan);
                    self.overflow.place(*rest);
                }
            }
            LayoutStatus::Nothing => {
                let mut empty = original.shell();
                empty.occupied_area = Some(LayoutArea::new(self.page, bbox));
                self.placed.push(empty);
                let mut moved = original.clone();
                relocate(&mut moved, 0, new_rowspan);
                decrement_heights(&mut moved.properties, bbox.height);
                self.overflow.place(moved);
            }
        }
    }
}

/// Lay out the rows of `model` from `top` down to `bottom`.
fn layout_body(
    model: &TableModel,
    columns: &Columns,
    top: f64,
    bottom: f64,
    page: u32,
    forced: bool,
) -> BodyLayout {
    let rows = model.row_count();
    let mut natural: Vec<Option<Renderer>> = vec![None; model.cells.len()];
    let mut row_tops = Vec::with_capacity(rows);
    let mut row_heights = vec![0.0; rows];
    let mut y = top;
    let mut boundary = None;

    for r in 0..rows {
        row_tops.push(y);
        for (i, cell) in model.cells.iter().enumerate() {
            let pos = CellPos::of(cell);
            if pos.row != r {
                continue;
            }
            let mut laid = cell.clone();
            if forced {
                laid.set(Property::ForcedPlacement, true);
            }
            let bbox = Rectangle::new(columns.left(&pos), y - INF, columns.span(&pos), INF);
            layout_at(&mut laid, page, bbox);
            natural[i] = Some(laid);
        }

        let mut height: f64 = 0.0;
        for (i, cell) in model.cells.iter().enumerate() {
            let pos = CellPos::of(cell);
            if pos.end_row() != r {
                continue;
            }
            let cell_height = natural[i]
                .as_ref()
                .and_then(|c| c.occupied_bbox())
                .map(|b| b.height)
                .unwrap_or(0.0);
            let above: f64 = row_heights[pos.row..r].iter().sum();
            height = height.max(cell_height - above);
        }
        row_heights[r] = height;

        if !forced && y - height < bottom - EPS {
            boundary = Some(r);
            break;
        }
        y -= height;
    }

    let Some(b) = boundary else {
        let cells = natural
            .into_iter()
            .flatten()
            .map(|mut cell| {
                let pos = CellPos::of(&cell);
                stretch_cell(&mut cell, row_heights[pos.row..=pos.end_row()].iter().sum());
                cell
            })
            .collect();
        return BodyLayout {
            cells,
            height: top - y,
            overflow: None,
            nothing_placed: false,
        };
    };

    let row_top = row_tops[b];
    let remaining = (row_top - bottom).max(0.0);

    // Row b splits only if each single-row cell shows something and one of them breaks.
    let mut singles = Vec::new();
    let mut can_split = remaining > EPS;
    let mut any_partial = false;
    for (i, cell) in model.cells.iter().enumerate() {
        let pos = CellPos::of(cell);
        if pos.row != b || pos.rowspan != 1 {
            continue;
        }
        let mut trial = cell.clone();
        let bbox = Rectangle::new(columns.left(&pos), row_top - remaining, columns.span(&pos), remaining);
        let result = layout_at(&mut trial, page, bbox);
        match result.status {
            LayoutStatus::Nothing => can_split = false,
            LayoutStatus::Partial => any_partial = true,
            LayoutStatus::Full => {}
        }
        singles.push((i, trial, result));
    }
    let can_split = can_split && any_partial;

    if b == 0 && !can_split {
        return BodyLayout {
            cells: Vec::new(),
            height: 0.0,
            overflow: Some(model.clone()),
            nothing_placed: true,
        };
    }

    let split_height = if can_split {
        singles
            .iter()
            .filter_map(|(_, trial, result)| match result.status {
                LayoutStatus::Partial => result.split.as_ref().and_then(|s| s.occupied_bbox()),
                _ => trial.occupied_bbox(),
            })
            .map(|bbox| bbox.height)
            .fold(0.0, f64::max)
    } else {
        0.0
    };
    let body_bottom = row_top - split_height;
    debug!(boundary = b, split_row = can_split, "Table breaks");

    let mut cut = Cut {
        page,
        placed: Vec::new(),
        overflow: model.continuation(),
    };

    for (i, cell) in model.cells.iter().enumerate() {
        let pos = CellPos::of(cell);
        if pos.end_row() < b {
            if let Some(mut laid) = natural[i].take() {
                stretch_cell(&mut laid, row_heights[pos.row..=pos.end_row()].iter().sum());
                cut.placed.push(laid);
            }
            continue;
        }
        if pos.row > b {
            let mut moved = cell.clone();
            relocate(&mut moved, pos.row - b, pos.rowspan);
            cut.overflow.place(moved);
            continue;
        }
        let new_rowspan = pos.end_row() - b + 1;
        if pos.row == b && (pos.rowspan == 1 || !can_split) {
            if !can_split {
                let mut moved = cell.clone();
                relocate(&mut moved, 0, new_rowspan);
                cut.overflow.place(moved);
            }
            continue;
        }
        let available = row_tops[pos.row] - body_bottom;
        let bbox = Rectangle::new(columns.left(&pos), body_bottom, columns.span(&pos), available);
        let mut trial = cell.clone();
        let result = layout_at(&mut trial, page, bbox);
        cut.place(cell, trial, result, bbox, new_rowspan);
    }

    if can_split {
        for (i, trial, result) in singles {
            let cell = &model.cells[i];
            let pos = CellPos::of(cell);
            let bbox = Rectangle::new(columns.left(&pos), body_bottom, columns.span(&pos), split_height);
            cut.place(cell, trial, result, bbox, 1);
        }
    }

    cut.overflow.current_row = cut.overflow.row_count();
    BodyLayout {
        cells: cut.placed,
        height: top - body_bottom,
        overflow: Some(cut.overflow),
        nothing_placed: false,
    }
}

/// Lay out a header or footer section in full at `top`.
fn layout_section(section: &TableModel, columns: &Columns, top: f64, page: u32) -> Renderer {
    let body = layout_body(section, columns, top, f64::NEG_INFINITY, page, true);
    let mut renderer = Renderer::table(section.clone());
    renderer.children = body.cells;
    renderer.occupied_area = Some(LayoutArea::new(
        page,
        Rectangle::new(columns.lefts.first().copied().unwrap_or(0.0), top - body.height, columns.total(), body.height),
    ));
    renderer
}

fn section_height(section: &Renderer) -> f64 {
    section.occupied_bbox().map(|b| b.height).unwrap_or(0.0)
}

fn table_nothing(renderer: &Renderer, model: &TableModel, cause: Option<ElementId>) -> LayoutResult {
    let mut overflow = renderer.shell();
    overflow.kind = RendererKind::Table(Box::new(model.clone()));
    LayoutResult::nothing(Some(overflow), cause.or(Some(renderer.id())))
}

pub(crate) fn layout_table(renderer: &mut Renderer, ctx: &mut LayoutContext) -> LayoutResult {
    let RendererKind::Table(model) = &renderer.kind else {
        return LayoutResult::nothing(Some(renderer.clone()), Some(renderer.id()));
    };
    let model = (**model).clone();
    renderer.properties.override_height_properties();
    let props = renderer.properties.clone();
    let area = ctx.area;
    let page = area.page_number;
    let forced = props.get_bool(Property::ForcedPlacement);
    let keep_together = props.get_bool(Property::KeepTogether);

    let margins = props.margins();
    let borders = props.borders();
    let paddings = props.paddings();
    let mut parent_bbox = area.bbox;
    parent_bbox.apply_margins(margins[0], margins[1], margins[2], margins[3], false);
    parent_bbox.apply_margins(borders[0], borders[1], borders[2], borders[3], false);
    parent_bbox.apply_margins(paddings[0], paddings[1], paddings[2], paddings[3], false);
    if let Some(width) = props.get_unit(Property::Width) {
        parent_bbox.set_width(width.resolve(area.bbox.width));
    }

    let max_height = props.get_f64(Property::MaxHeight);
    let mut was_height_clipped = false;
    if let Some(max) = max_height {
        if !forced && max < parent_bbox.height {
            parent_bbox.decrease_height(parent_bbox.height - max);
            was_height_clipped = true;
        }
    }

    if !model.is_continuation {
        model.warn_if_last_row_incomplete();
    }

    let columns = Columns::new(parent_bbox.x, model.resolve_widths(parent_bbox.width));
    let top = parent_bbox.get_top();

    let draw_header = !(model.skip_first_header && !model.is_continuation);
    let header = model
        .header
        .as_deref()
        .filter(|_| draw_header)
        .map(|h| layout_section(h, &columns, top, page));
    let header_height = header.as_ref().map(section_height).unwrap_or(0.0);
    let mut footer = model
        .footer
        .as_deref()
        .map(|f| layout_section(f, &columns, top, page));
    let footer_height = footer.as_ref().map(section_height).unwrap_or(0.0);

    if !forced && header_height + footer_height > parent_bbox.height + EPS {
        return table_nothing(renderer, &model, None);
    }

    let body_top = top - header_height;
    let mut body = layout_body(
        &model,
        &columns,
        body_top,
        parent_bbox.get_bottom() + footer_height,
        page,
        forced,
    );
    if model.skip_last_footer && footer.is_some() {
        let without = layout_body(&model, &columns, body_top, parent_bbox.get_bottom(), page, forced);
        if without.overflow.is_none() {
            body = without;
            footer = None;
        }
    }

    let mut status = LayoutStatus::Full;
    let mut clipped = false;
    if body.overflow.is_some() {
        if was_height_clipped {
            warn!(
                code = messages::CLIP_ELEMENT,
                "Element content was clipped because some height properties are set"
            );
            body.overflow = None;
            clipped = true;
        } else if body.nothing_placed || (keep_together && !forced) {
            return table_nothing(renderer, &model, None);
        } else {
            status = LayoutStatus::Partial;
        }
    }

    let body_bottom = body_top - body.height;
    let footer_kept = footer.is_some();
    let mut children = Vec::new();
    if let Some(header) = header {
        children.push(header);
    }
    children.append(&mut body.cells);
    if let Some(mut footer) = footer {
        footer.move_by(0.0, body_bottom - top);
        children.push(footer);
    }

    let content_bottom = body_bottom - if footer_kept { footer_height } else { 0.0 };
    let mut occupied = Rectangle::new(parent_bbox.x, content_bottom, columns.total(), top - content_bottom);
    if clipped {
        if let Some(max) = max_height {
            occupied.set_y(top - max).set_height(max);
        }
    }

    let mut min_height_overflow = false;
    if let Some(min) = props.get_f64(Property::MinHeight) {
        if occupied.height < min - EPS && !forced {
            let available = (occupied.get_bottom() - parent_bbox.get_bottom()).max(0.0);
            occupied.increase_height((min - occupied.height).min(available));
            if min - occupied.height > EPS && status == LayoutStatus::Full {
                if keep_together {
                    return table_nothing(renderer, &model, Some(renderer.id()));
                }
                status = LayoutStatus::Partial;
                min_height_overflow = true;
            }
        }
    }

    let content_height = occupied.height;
    occupied.apply_margins(paddings[0], paddings[1], paddings[2], paddings[3], true);
    occupied.apply_margins(borders[0], borders[1], borders[2], borders[3], true);
    occupied.apply_margins(margins[0], margins[1], margins[2], margins[3], true);

    renderer.children = children;
    let occupied_area = LayoutArea::new(page, occupied);
    renderer.occupied_area = Some(occupied_area);

    if status != LayoutStatus::Partial {
        return LayoutResult::full(occupied_area);
    }

    // Only the remaining minimum height continues when every row was placed
    let rest = body.overflow.unwrap_or_else(|| model.continuation());
    let mut overflow = renderer.shell();
    overflow.kind = RendererKind::Table(Box::new(rest));
    overflow.properties.remove(Property::ForcedPlacement);
    decrement_heights(&mut overflow.properties, content_height);
    if min_height_overflow {
        debug!(
            residual = overflow.properties.get_f64(Property::MinHeight),
            "Minimum height continues in overflow"
        );
    }
    let split = renderer.clone();
    LayoutResult::partial(occupied_area, split, overflow)
}
