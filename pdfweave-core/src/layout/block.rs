//! Block layout
//!
//! Lays block children top-down inside the box left after margins, borders
//! and paddings. Children that do not fit produce a split renderer (what
//! fit) and an overflow renderer (the rest), or propagate `Nothing`.

use std::collections::VecDeque;
use std::f64::consts::PI;
use std::mem;

use tracing::{debug, warn};

use crate::geometry::{Point, Rectangle, EPS};
use crate::layout::area::{
    AreaBreakType, LayoutArea, LayoutContext, LayoutResult, LayoutStatus, MarginsCollapseInfo,
};
use crate::layout::messages;
use crate::layout::properties::{
    ClearValue, FloatValue, HorizontalAlignment, Position, Property, PropertyBag,
    VerticalAlignment,
};
use crate::layout::renderer::{ElementId, Renderer};
use crate::layout::INF;

/// What happened to the children of one block
enum ChildOutcome {
    /// Every child was placed
    Complete,
    /// Placement stopped; `overflow` holds what is left
    Stopped {
        overflow_children: Vec<Renderer>,
        cause: Option<ElementId>,
        nothing_placed: bool,
    },
}

/// Floats centered at or left of the box center count as left floats.
fn float_side(float: &Rectangle, bbox: &Rectangle) -> FloatValue {
    if float.center().x <= bbox.center().x {
        FloatValue::Left
    } else {
        FloatValue::Right
    }
}

/// Floats whose vertical range covers the line at `y`
fn floats_at<'a>(floats: &'a [Rectangle], y: f64) -> impl Iterator<Item = &'a Rectangle> {
    floats
        .iter()
        .filter(move |f| f.get_bottom() < y - EPS && f.get_top() > y - EPS)
}

/// Narrow `bbox` so it clears the floats overlapping its top line.
fn avoid_floats(bbox: &mut Rectangle, floats: &[Rectangle]) {
    let top = bbox.get_top();
    let original = *bbox;
    let mut left = bbox.get_left();
    let mut right = bbox.get_right();
    for float in floats_at(floats, top) {
        match float_side(float, &original) {
            FloatValue::Right => right = right.min(float.get_left()),
            _ => left = left.max(float.get_right()),
        }
    }
    bbox.set_x(left).set_width((right - left).max(0.0));
}

/// Move the top of `bbox` below the floats named by `clear`.
fn apply_clear(bbox: &mut Rectangle, clear: ClearValue, floats: &[Rectangle]) -> f64 {
    if clear == ClearValue::None {
        return 0.0;
    }
    let original = *bbox;
    let lowest = floats
        .iter()
        .filter(|f| f.get_bottom() < original.get_top() - EPS)
        .filter(|f| match (clear, float_side(f, &original)) {
            (ClearValue::Both, _) => true,
            (ClearValue::Left, FloatValue::Left) => true,
            (ClearValue::Right, FloatValue::Right) => true,
            _ => false,
        })
        .map(|f| f.get_bottom())
        .fold(f64::INFINITY, f64::min);
    if lowest.is_finite() && lowest < original.get_top() {
        let correction = original.get_top() - lowest;
        bbox.cut_top(correction.min(bbox.height));
        correction
    } else {
        0.0
    }
}

/// Divide `bbox` into `count` side-by-side columns.
fn column_areas(bbox: Rectangle, count: usize, gap: f64) -> Vec<Rectangle> {
    if count <= 1 {
        return vec![bbox];
    }
    let width = ((bbox.width - gap * (count - 1) as f64) / count as f64).max(0.0);
    (0..count)
        .map(|i| Rectangle::new(bbox.x + i as f64 * (width + gap), bbox.y, width, bbox.height))
        .collect()
}

/// Reduce the height budgets carried by an overflow renderer.
pub(crate) fn decrement_heights(props: &mut PropertyBag, used: f64) {
    for key in [Property::MaxHeight, Property::MinHeight, Property::Height] {
        if let Some(value) = props.get_f64(key) {
            props.set(key, (value - used).max(0.0));
        }
    }
}

pub(crate) fn align_child_horizontally(child: &mut Renderer, layout_box: &Rectangle) {
    let Some(alignment) = child.properties.horizontal_alignment() else {
        return;
    };
    let Some(bbox) = child.occupied_bbox() else {
        return;
    };
    let free = layout_box.width - bbox.width;
    if free <= EPS {
        return;
    }
    let dx = match alignment {
        HorizontalAlignment::Left => layout_box.get_left() - bbox.get_left(),
        HorizontalAlignment::Center => layout_box.get_left() + free / 2.0 - bbox.get_left(),
        HorizontalAlignment::Right => layout_box.get_right() - bbox.get_right(),
    };
    child.move_by(dx, 0.0);
}

/// Lay out positioned children against the box they are anchored to.
fn layout_positioned(renderer: &mut Renderer, anchor: Rectangle, page: u32) {
    for child in renderer.positioned.iter_mut() {
        child.set(Property::ForcedPlacement, true);
        let mut ctx = LayoutContext::new(LayoutArea::new(page, anchor));
        let result = child.layout(&mut ctx);
        if result.status != LayoutStatus::Full {
            debug!(
                status = ?result.status,
                "Positioned child did not fit its anchor box"
            );
        }
    }
}

pub(crate) fn layout_block(renderer: &mut Renderer, ctx: &mut LayoutContext) -> LayoutResult {
    renderer.properties.override_height_properties();

    let area = ctx.area;
    let page = area.page_number;
    let props = renderer.properties.clone();
    let forced = props.get_bool(Property::ForcedPlacement);
    let keep_together = props.get_bool(Property::KeepTogether);
    let position = props.position();
    let fixed = position == Position::Fixed;
    let float = props.float_value();
    let rotation = props
        .get_f64(Property::RotationAngle)
        .filter(|angle| (angle % (2.0 * PI)).abs() > EPS);

    let pristine_children = if keep_together || rotation.is_some() {
        Some(renderer.children.clone())
    } else {
        None
    };

    let mut outer = area.bbox;
    let clear_correction = apply_clear(&mut outer, props.clear(), &ctx.float_areas);

    if float == FloatValue::None {
        avoid_floats(&mut outer, &ctx.float_areas);
    }

    let margins = props.margins();
    let top_margin = match ctx.margins_collapse {
        Some(info) => (margins[0] - info.prev_bottom_margin).max(0.0),
        None => margins[0],
    };
    let borders = props.borders();
    let paddings = props.paddings();
    let horizontal_edges = margins[1] + margins[3] + borders[1] + borders[3] + paddings[1] + paddings[3];

    if float != FloatValue::None {
        let mut lane = outer;
        avoid_floats(&mut lane, &ctx.float_areas);
        let content_width = match props.get_unit(Property::Width) {
            Some(width) => width.resolve(area.bbox.width),
            None => renderer.min_max_width().max - horizontal_edges,
        };
        let outer_width = (content_width + horizontal_edges).min(lane.width).max(0.0);
        let x = match float {
            FloatValue::Right => lane.get_right() - outer_width,
            _ => lane.get_left(),
        };
        outer.set_x(x).set_width(outer_width);
    }

    if rotation.is_some() || fixed {
        let top = outer.get_top();
        outer.set_y(top - INF).set_height(INF);
    }

    let mut parent_bbox = outer;
    parent_bbox.apply_margins(top_margin, margins[1], margins[2], margins[3], false);
    parent_bbox.apply_margins(borders[0], borders[1], borders[2], borders[3], false);
    if fixed {
        if let Some(x) = props.get_f64(Property::X) {
            parent_bbox.set_x(x + margins[3] + borders[3]);
        }
    }
    parent_bbox.apply_margins(paddings[0], paddings[1], paddings[2], paddings[3], false);

    if float == FloatValue::None {
        if let Some(width) = props.get_unit(Property::Width) {
            parent_bbox.set_width(width.resolve(area.bbox.width));
        }
    }

    let max_height = props.get_f64(Property::MaxHeight);
    let mut was_height_clipped = false;
    if let Some(max) = max_height {
        if !fixed && !forced && max < parent_bbox.height {
            parent_bbox.decrease_height(parent_bbox.height - max);
            was_height_clipped = true;
        }
    }

    let column_count = props.get_int(Property::ColumnCount).unwrap_or(1).max(1) as usize;
    let column_gap = props.get_f64(Property::ColumnGap).unwrap_or(0.0);
    let areas = column_areas(parent_bbox, column_count, column_gap);
    let mut area_index = 0;
    let mut layout_box = areas[0];

    let mut occupied = Rectangle::new(parent_bbox.x, parent_bbox.get_top(), parent_bbox.width, 0.0);
    let collapsing = props.get_bool(Property::CollapsingMargins);
    let mut prev_bottom_margin = 0.0;
    let mut area_break: Option<AreaBreakType> = None;

    let mut pending: VecDeque<Renderer> = mem::take(&mut renderer.children).into();
    let mut placed: Vec<Renderer> = Vec::new();
    let mut outcome = ChildOutcome::Complete;
    let mut child_status = LayoutStatus::Full;

    while let Some(mut child) = pending.pop_front() {
        if forced {
            child.set(Property::ForcedPlacement, true);
        }
        let mut child_ctx = LayoutContext {
            area: LayoutArea::new(page, layout_box),
            margins_collapse: collapsing.then_some(MarginsCollapseInfo {
                prev_bottom_margin,
            }),
            float_areas: mem::take(&mut ctx.float_areas),
        };
        let result = child.layout(&mut child_ctx);
        ctx.float_areas = child_ctx.float_areas;

        if result.area_break.is_some() {
            area_break = result.area_break;
        }

        match result.status {
            LayoutStatus::Full => {
                if let Some(bbox) = child.occupied_bbox() {
                    occupied = occupied.union(&bbox);
                    if !child.is_float() {
                        let used = layout_box.get_top() - bbox.get_bottom();
                        layout_box.cut_top(used.max(0.0).min(layout_box.height));
                    }
                }
                align_child_horizontally(&mut child, &layout_box);
                prev_bottom_margin = child.properties.edge(Property::MarginBottom);
                placed.push(child);
            }
            status if area_index + 1 < areas.len() && area_break.is_none() => {
                if status == LayoutStatus::Partial {
                    if let Some(split) = result.split {
                        if let Some(bbox) = split.occupied_bbox() {
                            occupied = occupied.union(&bbox);
                        }
                        placed.push(*split);
                    }
                }
                if let Some(overflow) = result.overflow {
                    pending.push_front(*overflow);
                }
                area_index += 1;
                layout_box = areas[area_index];
                prev_bottom_margin = 0.0;
                debug!(column = area_index, "Block continues in next column");
            }
            status => {
                child_status = status;
                let mut overflow_children = Vec::new();
                if status == LayoutStatus::Partial {
                    if let Some(split) = result.split {
                        if let Some(bbox) = split.occupied_bbox() {
                            occupied = occupied.union(&bbox);
                        }
                        placed.push(*split);
                    }
                }
                if let Some(overflow) = result.overflow {
                    overflow_children.push(*overflow);
                }
                overflow_children.extend(pending.drain(..));
                let nothing_placed = placed.is_empty();
                outcome = ChildOutcome::Stopped {
                    overflow_children,
                    cause: result.cause_of_nothing.or(Some(child.id())),
                    nothing_placed,
                };
                break;
            }
        }
    }

    let mut status = LayoutStatus::Full;
    let mut overflow_children: Option<Vec<Renderer>> = None;
    let mut cause_of_nothing = None;

    if let ChildOutcome::Stopped {
        overflow_children: rest,
        cause,
        nothing_placed,
    } = outcome
    {
        cause_of_nothing = cause;
        if was_height_clipped {
            warn!(
                code = messages::CLIP_ELEMENT,
                "Element content was clipped because some height properties are set"
            );
            if let Some(max) = max_height {
                occupied.set_y(parent_bbox.get_top() - max).set_height(max);
            }
        } else if keep_together && !forced {
            return nothing_with_pristine(renderer, &props, pristine_children, cause_of_nothing, area_break);
        } else if child_status == LayoutStatus::Nothing && nothing_placed && !forced {
            let mut overflow = renderer.shell();
            overflow.properties = props.clone();
            overflow.children = rest;
            return LayoutResult::nothing(Some(overflow), cause_of_nothing).with_area_break(area_break);
        } else if forced && child_status == LayoutStatus::Nothing && area_break.is_none() {
            debug!("Forced block drops children that could not be placed");
        } else {
            status = LayoutStatus::Partial;
            overflow_children = Some(rest);
        }
    }

    let fill = props.get_bool(Property::FillAvailableArea)
        || (status == LayoutStatus::Partial && props.get_bool(Property::FillAvailableAreaOnSplit));
    if fill && occupied.get_bottom() > layout_box.get_bottom() {
        occupied.increase_height(occupied.get_bottom() - layout_box.get_bottom());
    }

    let mut min_height_overflow = false;
    if let Some(min) = props.get_f64(Property::MinHeight) {
        if occupied.height < min - EPS && !forced {
            if fixed {
                occupied.increase_height(min - occupied.height);
            } else {
                let available = (occupied.get_bottom() - parent_bbox.get_bottom()).max(0.0);
                occupied.increase_height((min - occupied.height).min(available));
                let residual = min - occupied.height;
                if residual > EPS && status == LayoutStatus::Full {
                    if keep_together {
                        return nothing_with_pristine(renderer, &props, pristine_children, Some(renderer.id()), area_break);
                    }
                    status = LayoutStatus::Partial;
                    min_height_overflow = true;
                }
            }
        }
    }

    let vertical = props.vertical_alignment();
    if vertical != VerticalAlignment::Top {
        let last_bottom = placed
            .iter()
            .filter(|c| !c.is_float())
            .filter_map(|c| c.occupied_bbox())
            .map(|b| b.get_bottom())
            .fold(f64::INFINITY, f64::min);
        if last_bottom.is_finite() {
            let delta = last_bottom - occupied.get_bottom();
            let shift = match vertical {
                VerticalAlignment::Bottom => delta,
                _ => delta / 2.0,
            };
            if shift > EPS {
                for child in placed.iter_mut() {
                    child.move_by(0.0, -shift);
                }
            }
        }
    }

    let content_height = occupied.height;
    occupied.apply_margins(paddings[0], paddings[1], paddings[2], paddings[3], true);
    occupied.apply_margins(borders[0], borders[1], borders[2], borders[3], true);

    renderer.children = placed;
    renderer.occupied_area = Some(LayoutArea::new(page, occupied));
    let padding_box = {
        let mut b = occupied;
        b.apply_margins(borders[0], borders[1], borders[2], borders[3], false);
        b
    };
    layout_positioned(renderer, padding_box, page);

    occupied.apply_margins(top_margin, margins[1], margins[2], margins[3], true);
    occupied.set_height(occupied.height + clear_correction);
    renderer.occupied_area = Some(LayoutArea::new(page, occupied));

    if fixed {
        if let Some(y) = props.get_f64(Property::Y) {
            let dy = y - occupied.get_bottom();
            renderer.move_by(0.0, dy);
        }
    }

    if let Some(angle) = rotation {
        if let Some(result) = apply_rotation(renderer, &props, angle, &area, forced, pristine_children) {
            return result;
        }
    }

    if position == Position::Absolute {
        apply_absolute_offsets(renderer, &props, &area.bbox);
    }

    if float != FloatValue::None && status == LayoutStatus::Full {
        if let Some(bbox) = renderer.occupied_bbox() {
            ctx.float_areas.push(bbox);
        }
    }

    let Some(occupied_area) = renderer.occupied_area else {
        return LayoutResult::nothing(Some(renderer.clone()), Some(renderer.id()));
    };

    match status {
        LayoutStatus::Partial => {
            let mut overflow = renderer.shell();
            overflow.properties = props.clone();
            overflow.properties.remove(Property::ForcedPlacement);
            decrement_heights(&mut overflow.properties, content_height);
            if min_height_overflow {
                debug!(
                    residual = overflow.properties.get_f64(Property::MinHeight),
                    "Minimum height continues in overflow"
                );
            } else {
                overflow.children = overflow_children.unwrap_or_default();
            }
            let split = renderer.clone();
            LayoutResult::partial(occupied_area, split, overflow).with_area_break(area_break)
        }
        _ => LayoutResult::full(occupied_area).with_area_break(area_break),
    }
}

fn nothing_with_pristine(
    renderer: &Renderer,
    props: &PropertyBag,
    pristine_children: Option<Vec<Renderer>>,
    cause: Option<ElementId>,
    area_break: Option<AreaBreakType>,
) -> LayoutResult {
    let mut overflow = renderer.shell();
    overflow.properties = props.clone();
    overflow.children = pristine_children.unwrap_or_default();
    overflow.positioned = renderer.positioned.clone();
    LayoutResult::nothing(Some(overflow), cause).with_area_break(area_break)
}

/// Replace the occupied box with the envelope of the rotated content.
///
/// Returns a result only when the rotated envelope does not fit.
fn apply_rotation(
    renderer: &mut Renderer,
    props: &PropertyBag,
    angle: f64,
    area: &LayoutArea,
    forced: bool,
    pristine_children: Option<Vec<Renderer>>,
) -> Option<LayoutResult> {
    let bbox = renderer.occupied_bbox()?;
    renderer.set(Property::RotationInitialWidth, bbox.width);
    renderer.set(Property::RotationInitialHeight, bbox.height);

    let envelope = if renderer.is_positioned() {
        let center = Point::new(
            props.get_f64(Property::RotationPointX).unwrap_or(bbox.get_left()),
            props.get_f64(Property::RotationPointY).unwrap_or(bbox.get_bottom()),
        );
        bbox.rotated_envelope(center, angle)
    } else {
        let natural = bbox.rotated_envelope(Point::new(bbox.get_left(), bbox.get_bottom()), angle);
        Rectangle::new(
            bbox.get_left(),
            bbox.get_top() - natural.height,
            natural.width,
            natural.height,
        )
    };

    if !forced
        && !renderer.is_positioned()
        && (envelope.height > area.bbox.height + EPS || envelope.width > area.bbox.width + EPS)
    {
        return Some(nothing_with_pristine(
            renderer,
            props,
            pristine_children,
            Some(renderer.id()),
            None,
        ));
    }

    let dy = envelope.get_top() - bbox.get_top();
    let dx = envelope.get_left() - bbox.get_left();
    for child in renderer.children.iter_mut() {
        child.move_by(dx, dy);
    }
    renderer.occupied_area = Some(LayoutArea::new(area.page_number, envelope));
    None
}

/// Move an absolutely positioned box by its edge offsets.
fn apply_absolute_offsets(renderer: &mut Renderer, props: &PropertyBag, parent: &Rectangle) {
    let Some(bbox) = renderer.occupied_bbox() else {
        return;
    };
    let dx = match (props.get_f64(Property::Left), props.get_f64(Property::Right)) {
        (Some(left), _) => parent.get_left() + left - bbox.get_left(),
        (None, Some(right)) => parent.get_right() - right - bbox.get_right(),
        _ => 0.0,
    };
    let dy = match (props.get_f64(Property::Top), props.get_f64(Property::Bottom)) {
        (Some(top), _) => parent.get_top() - top - bbox.get_top(),
        (None, Some(bottom)) => parent.get_bottom() + bottom - bbox.get_bottom(),
        _ => 0.0,
    };
    renderer.move_by(dx, dy);
}
