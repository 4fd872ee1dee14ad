//! Root layout driver
//!
//! [`RootLayout`] takes top-level renderers one at a time, lays each out in
//! the current area and asks its [`AreaProvider`] for a new area whenever
//! content overflows. Finished renderers are flushed per page.

use std::collections::BTreeMap;
use std::mem;

use tracing::{debug, warn};

use crate::geometry::Rectangle;
use crate::layout::area::{AreaBreakType, LayoutArea, LayoutContext, LayoutResult, LayoutStatus};
use crate::layout::block::align_child_horizontally;
use crate::layout::messages;
use crate::layout::properties::{Position, Property};
use crate::layout::renderer::{ElementId, Placement, Renderer};
use crate::layout::LayoutError;
use crate::page::{content_area, Margins, PageSize};

/// Source of layout areas
///
/// Providers are stateless: the next area depends only on the current one,
/// so the driver can snapshot and restore its position freely.
pub trait AreaProvider {
    fn next_area(&self, current: Option<&LayoutArea>, area_break: Option<AreaBreakType>) -> LayoutArea;
}

/// One content area per page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageAreaProvider {
    pub size: PageSize,
    pub margins: Margins,
}

impl PageAreaProvider {
    pub fn new(size: PageSize, margins: Margins) -> Self {
        Self { size, margins }
    }
}

impl AreaProvider for PageAreaProvider {
    fn next_area(&self, current: Option<&LayoutArea>, _area_break: Option<AreaBreakType>) -> LayoutArea {
        let page = current.map(|a| a.page_number + 1).unwrap_or(1);
        LayoutArea::empty(page, content_area(self.size, &self.margins))
    }
}

/// Trial split heights used when a keep-with-next pair does not fit
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeepWithNextPolicy {
    /// Height removed from the held renderer per attempt
    pub step: f64,
    pub attempts: usize,
}

impl Default for KeepWithNextPolicy {
    fn default() -> Self {
        Self {
            step: 35.0,
            attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LayoutConfig {
    pub keep_with_next: KeepWithNextPolicy,
    /// Move finished renderers to their page as soon as they are placed
    pub immediate_flush: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            keep_with_next: KeepWithNextPolicy::default(),
            immediate_flush: true,
        }
    }
}

#[derive(Debug, Clone)]
struct Snapshot {
    current: Option<LayoutArea>,
    initial: Option<LayoutArea>,
    floats: Vec<Rectangle>,
}

/// Renderer held back until its successor arrives
#[derive(Debug)]
struct Hanging {
    renderer: Renderer,
    height: f64,
}

#[derive(Debug)]
pub struct RootLayout<P: AreaProvider> {
    provider: P,
    config: LayoutConfig,
    current_area: Option<LayoutArea>,
    initial_current_area: Option<LayoutArea>,
    keep_with_next_hanging: Option<Hanging>,
    float_areas: Vec<Rectangle>,
    pages: BTreeMap<u32, Vec<Renderer>>,
    pending: Vec<Renderer>,
    positioned: Vec<Renderer>,
}

impl<P: AreaProvider> RootLayout<P> {
    pub fn new(provider: P, config: LayoutConfig) -> Self {
        Self {
            provider,
            config,
            current_area: None,
            initial_current_area: None,
            keep_with_next_hanging: None,
            float_areas: Vec::new(),
            pages: BTreeMap::new(),
            pending: Vec::new(),
            positioned: Vec::new(),
        }
    }

    pub fn current_area(&self) -> Option<&LayoutArea> {
        self.current_area.as_ref()
    }

    /// Flushed renderers keyed by page number
    pub fn pages(&self) -> &BTreeMap<u32, Vec<Renderer>> {
        &self.pages
    }

    pub fn into_pages(self) -> BTreeMap<u32, Vec<Renderer>> {
        self.pages
    }

    /// The root is driven through [`RootLayout::add_child`], never laid out itself.
    pub fn layout(&mut self, _ctx: &mut LayoutContext) -> Result<LayoutResult, LayoutError> {
        Err(LayoutError::UnsupportedOperation("layout on root"))
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            current: self.current_area,
            initial: self.initial_current_area,
            floats: self.float_areas.clone(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        let page = snapshot.current.map(|a| a.page_number).unwrap_or(0);
        self.pages
            .retain(|&number, renderers| number <= page || !renderers.is_empty());
        self.current_area = snapshot.current;
        self.initial_current_area = snapshot.initial;
        self.float_areas = snapshot.floats;
    }

    fn update_current_and_initial_area(&mut self, area_break: Option<AreaBreakType>) {
        let next = self.provider.next_area(self.current_area.as_ref(), area_break);
        debug!(page = next.page_number, "Opening new layout area");
        self.pages.entry(next.page_number).or_default();
        self.current_area = Some(next);
        self.initial_current_area = Some(next);
        self.float_areas.clear();
    }

    /// Lay out `renderer` and place it, moving to new areas as needed.
    pub fn add_child(&mut self, renderer: Renderer) {
        if self.current_area.is_none() {
            self.update_current_and_initial_area(None);
        }
        if renderer.is_positioned() {
            self.add_positioned(renderer);
            return;
        }

        self.process_waiting_keep_with_next(&renderer);

        let mut next = Some(renderer);
        let mut stored_area: Option<Snapshot> = None;
        let mut next_stored_area: Option<Snapshot> = None;
        let mut placed: Option<Renderer> = None;

        while let Some(mut renderer) = next.take() {
            let Some(area) = self.current_area else {
                break;
            };
            let mut ctx = LayoutContext::with_floats(area, mem::take(&mut self.float_areas));
            let mut result = renderer.layout(&mut ctx);
            self.float_areas = ctx.float_areas;

            match result.status {
                LayoutStatus::Full => {
                    placed = Some(renderer);
                    break;
                }
                LayoutStatus::Partial => {
                    if let Some(split) = result.split.take() {
                        self.process_renderer(*split);
                    }
                    match next_stored_area.take() {
                        Some(snapshot) => self.restore(snapshot),
                        None => self.update_current_and_initial_area(result.area_break),
                    }
                }
                LayoutStatus::Nothing if area.empty_area && result.area_break.is_none() => {
                    let Some(mut overflow) = result.overflow.take() else {
                        break;
                    };
                    if overflow.properties.get_bool(Property::KeepTogether) {
                        overflow.set(Property::KeepTogether, false);
                        warn!(
                            code = messages::ELEMENT_DOES_NOT_FIT_AREA,
                            "Element does not fit current area. KeepTogether property will be ignored."
                        );
                        if let Some(stored) = stored_area.take() {
                            next_stored_area = Some(self.snapshot());
                            self.restore(stored);
                        }
                        stored_area = Some(self.snapshot());
                    } else if result
                        .cause_of_nothing
                        .is_some_and(|cause| release_keep_together(&mut overflow, cause))
                    {
                        warn!(
                            code = messages::ELEMENT_DOES_NOT_FIT_AREA,
                            "Element does not fit current area. KeepTogether property of inner element will be ignored."
                        );
                    } else {
                        overflow.set(Property::ForcedPlacement, true);
                        warn!(
                            code = messages::ELEMENT_DOES_NOT_FIT_AREA,
                            "Element does not fit current area"
                        );
                    }
                    next = Some(*overflow);
                    continue;
                }
                LayoutStatus::Nothing => {
                    stored_area = Some(self.snapshot());
                    match next_stored_area.take() {
                        Some(snapshot) => self.restore(snapshot),
                        None => self.update_current_and_initial_area(result.area_break),
                    }
                }
            }
            next = result.overflow.map(|overflow| *overflow);
        }

        let Some(renderer) = placed else {
            return;
        };
        if renderer.properties.get_bool(Property::KeepWithNext) {
            if renderer.properties.get_bool(Property::ForcedPlacement) {
                warn!(
                    code = messages::ELEMENT_WAS_FORCE_PLACED_KEEP_WITH_NEXT_WILL_BE_IGNORED,
                    "Element was placed in a forced way. Keep with next property will be ignored"
                );
                self.shrink_current_area_and_process(renderer);
            } else {
                let height = renderer.occupied_bbox().map(|b| b.height).unwrap_or(0.0);
                self.keep_with_next_hanging = Some(Hanging { renderer, height });
            }
        } else {
            self.shrink_current_area_and_process(renderer);
        }
    }

    fn add_positioned(&mut self, mut renderer: Renderer) {
        let current_page = self.current_area.map(|a| a.page_number).unwrap_or(1);
        let page = renderer
            .properties
            .get_int(Property::PageNumber)
            .and_then(|p| u32::try_from(p).ok())
            .unwrap_or(current_page);
        let has_offsets = [Property::Top, Property::Left, Property::Right, Property::Bottom]
            .into_iter()
            .any(|key| renderer.properties.has(key));
        let source = if renderer.properties.position() == Position::Absolute && !has_offsets {
            self.current_area
        } else {
            self.initial_current_area
        };
        let bbox = source.map(|a| a.bbox).unwrap_or_default();

        renderer.set(Property::ForcedPlacement, true);
        let mut ctx = LayoutContext::new(LayoutArea::new(page, bbox));
        renderer.layout(&mut ctx);
        if self.config.immediate_flush {
            self.flush_single(renderer);
        } else {
            self.positioned.push(renderer);
        }
    }

    fn shrink_current_area_and_process(&mut self, renderer: Renderer) {
        let Some(area) = self.current_area.as_mut() else {
            return;
        };
        if !renderer.is_float() {
            let height = renderer.occupied_bbox().map(|b| b.height).unwrap_or(0.0);
            area.bbox.cut_top(height);
            if area.bbox.height < 0.0 {
                area.bbox.set_height(0.0);
            }
        }
        area.empty_area = false;
        self.process_renderer(renderer);
    }

    fn process_renderer(&mut self, mut renderer: Renderer) {
        if let Some(area) = self.current_area {
            align_child_horizontally(&mut renderer, &area.bbox);
        }
        if self.config.immediate_flush {
            self.flush_single(renderer);
        } else {
            self.pending.push(renderer);
        }
    }

    fn flush_single(&mut self, renderer: Renderer) {
        match renderer.occupied_area {
            Some(area) => self.pages.entry(area.page_number).or_default().push(renderer),
            None => warn!(
                code = messages::OCCUPIED_AREA_HAS_NOT_BEEN_INITIALIZED,
                element = renderer.id().0,
                "Occupied area has not been initialized. The renderer will not be drawn"
            ),
        }
    }

    /// Move pending and positioned renderers to their pages.
    pub fn flush(&mut self) {
        for renderer in mem::take(&mut self.pending) {
            self.flush_single(renderer);
        }
        for renderer in mem::take(&mut self.positioned) {
            self.flush_single(renderer);
        }
    }

    /// Place anything still held back and flush.
    pub fn close(&mut self) {
        if let Some(hanging) = self.keep_with_next_hanging.take() {
            let mut renderer = hanging.renderer;
            renderer.set(Property::KeepWithNext, false);
            self.add_child(renderer);
        }
        self.flush();
    }

    /// True if a copy of `renderer` lays out in `area` without returning nothing.
    fn fits(renderer: &Renderer, area: LayoutArea) -> bool {
        let mut trial = renderer.clone();
        trial.layout(&mut LayoutContext::new(area)).status != LayoutStatus::Nothing
    }

    fn process_waiting_keep_with_next(&mut self, next: &Renderer) {
        let Some(Hanging { renderer: hanging, height }) = self.keep_with_next_hanging.take() else {
            return;
        };
        let Some(current) = self.current_area else {
            self.process_renderer(hanging);
            return;
        };

        let mut rest = current;
        rest.bbox.cut_top(height);
        if Self::fits(next, rest) {
            self.shrink_current_area_and_process(hanging);
            return;
        }

        let policy = self.config.keep_with_next;
        let split_heights: Vec<f64> = (1..=policy.attempts)
            .map(|i| height - policy.step * i as f64)
            .take_while(|h| *h > height / 2.0)
            .collect();

        for split_height in split_heights {
            let mut first_area = current;
            first_area
                .bbox
                .set_y(current.bbox.get_top() - split_height)
                .set_height(split_height);
            let mut first = hanging.clone();
            let mut first_result = first.layout(&mut LayoutContext::new(first_area));
            if first_result.status != LayoutStatus::Partial {
                continue;
            }
            let (Some(split), Some(mut overflow)) = (first_result.split.take(), first_result.overflow.take()) else {
                continue;
            };

            let stored = self.snapshot();
            self.update_current_and_initial_area(first_result.area_break);
            let Some(new_area) = self.current_area else {
                self.restore(stored);
                continue;
            };
            let overflow_result = overflow.layout(&mut LayoutContext::new(new_area));
            if overflow_result.status == LayoutStatus::Full {
                let mut second_area = new_area;
                second_area
                    .bbox
                    .cut_top(overflow.occupied_bbox().map(|b| b.height).unwrap_or(0.0));
                if Self::fits(next, second_area) {
                    debug!(split_height, "Keep with next satisfied by splitting the held element");
                    let on_next_page = self.snapshot();
                    self.restore(stored);
                    self.shrink_current_area_and_process(*split);
                    self.restore(on_next_page);
                    self.shrink_current_area_and_process(*overflow);
                    return;
                }
            }
            self.restore(stored);
        }

        if !current.empty_area {
            let stored = self.snapshot();
            self.update_current_and_initial_area(None);
            if let Some(new_area) = self.current_area {
                let mut moved = hanging.clone();
                let result = moved.layout(&mut LayoutContext::new(new_area));
                if result.status == LayoutStatus::Full {
                    let mut second_area = new_area;
                    second_area
                        .bbox
                        .cut_top(moved.occupied_bbox().map(|b| b.height).unwrap_or(0.0));
                    if Self::fits(next, second_area) {
                        self.shrink_current_area_and_process(moved);
                        return;
                    }
                }
            }
            self.restore(stored);
        }

        warn!(
            code = messages::RENDERER_WAS_NOT_ABLE_TO_PROCESS_KEEP_WITH_NEXT,
            "Renderer was not able to process keep with next property properly"
        );
        self.shrink_current_area_and_process(hanging);
    }
}

/// Clear `KEEP_TOGETHER` on the path from `renderer` down to `cause`.
///
/// Returns true if any renderer on that path had it set.
fn release_keep_together(renderer: &mut Renderer, cause: ElementId) -> bool {
    fn walk(renderer: &mut Renderer, cause: ElementId) -> Option<bool> {
        let mut found = if renderer.id() == cause {
            Some(false)
        } else {
            renderer.children.iter_mut().find_map(|c| walk(c, cause))
        };
        if let Some(released) = found.as_mut() {
            if renderer.properties.get_bool(Property::KeepTogether) {
                renderer.set(Property::KeepTogether, false);
                *released = true;
            }
        }
        found
    }
    walk(renderer, cause).unwrap_or(false)
}

/// Every placed renderer across `pages`, in page order
pub fn placements(pages: &BTreeMap<u32, Vec<Renderer>>) -> Vec<Placement> {
    pages
        .values()
        .flat_map(|renderers| renderers.iter().flat_map(Renderer::placements))
        .collect()
}

/// Page-based layout of a document
#[derive(Debug)]
pub struct DocumentLayout {
    root: RootLayout<PageAreaProvider>,
}

impl DocumentLayout {
    pub fn new(size: PageSize, config: LayoutConfig) -> Self {
        Self::with_margins(size, Margins::default(), config)
    }

    pub fn with_margins(size: PageSize, margins: Margins, config: LayoutConfig) -> Self {
        Self {
            root: RootLayout::new(PageAreaProvider::new(size, margins), config),
        }
    }

    pub fn add(&mut self, renderer: Renderer) -> &mut Self {
        self.root.add_child(renderer);
        self
    }

    pub fn root(&self) -> &RootLayout<PageAreaProvider> {
        &self.root
    }

    /// Finish layout and return the renderers of every page.
    pub fn close(mut self) -> BTreeMap<u32, Vec<Renderer>> {
        self.root.close();
        self.root.into_pages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::EPS;
    use crate::layout::messages::capture::capture_warnings;
    use crate::layout::table::TableModel;

    fn document() -> DocumentLayout {
        DocumentLayout::new(PageSize::A4, LayoutConfig::default())
    }

    fn page_heights(pages: &BTreeMap<u32, Vec<Renderer>>, page: u32) -> Vec<f64> {
        pages[&page]
            .iter()
            .map(|r| r.occupied_bbox().unwrap().height)
            .collect()
    }

    #[test]
    fn test_layout_on_root_is_unsupported() {
        let mut root = RootLayout::new(
            PageAreaProvider::new(PageSize::A4, Margins::default()),
            LayoutConfig::default(),
        );
        let mut ctx = LayoutContext::new(LayoutArea::new(1, Rectangle::default()));
        assert!(matches!(
            root.layout(&mut ctx),
            Err(LayoutError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_fixed_height_div_spans_two_pages() {
        let mut doc = document();
        doc.add(
            Renderer::div()
                .with(Property::Height, 1300.0)
                .child(Renderer::paragraph("Short paragraph", 12.0)),
        );
        let (pages, warnings) = capture_warnings(|| doc.close());
        assert_eq!(pages.len(), 2);
        let first = page_heights(&pages, 1)[0];
        let second = page_heights(&pages, 2)[0];
        assert!((first - 770.0).abs() < EPS);
        assert!((second - 530.0).abs() < EPS);
        assert!((first + second - 1300.0).abs() < EPS);
        assert!(!warnings.contains(&messages::CLIP_ELEMENT.to_string()));
    }

    #[test]
    fn test_element_taller_than_page_is_forced() {
        let mut doc = document();
        let (pages, warnings) = capture_warnings(|| {
            doc.add(Renderer::image(100.0, 900.0));
            doc.close()
        });
        assert_eq!(pages.len(), 1);
        assert_eq!(page_heights(&pages, 1), vec![900.0]);
        assert_eq!(warnings, vec![messages::ELEMENT_DOES_NOT_FIT_AREA.to_string()]);
    }

    #[test]
    fn test_keep_together_moves_to_next_page() {
        let mut doc = document();
        doc.add(Renderer::spacer(500.0));
        doc.add(
            Renderer::div()
                .with(Property::KeepTogether, true)
                .child(Renderer::image(10.0, 200.0))
                .child(Renderer::image(10.0, 200.0)),
        );
        let pages = doc.close();
        assert_eq!(pages[&1].len(), 1);
        assert_eq!(pages[&2].len(), 1);
        assert_eq!(pages[&2][0].children.len(), 2);
    }

    #[test]
    fn test_oversized_keep_together_is_released() {
        let mut doc = document();
        let (pages, warnings) = capture_warnings(|| {
            doc.add(Renderer::spacer(100.0));
            doc.add(
                Renderer::div()
                    .with(Property::KeepTogether, true)
                    .child(Renderer::image(10.0, 500.0))
                    .child(Renderer::image(10.0, 500.0)),
            );
            doc.close()
        });
        assert_eq!(warnings, vec![messages::ELEMENT_DOES_NOT_FIT_AREA.to_string()]);
        // Released content starts on the page it was first offered.
        assert_eq!(pages[&1].len(), 2);
        assert_eq!(pages[&2].len(), 1);
    }

    #[test]
    fn test_keep_with_next_moves_pair_to_next_page() {
        let mut doc = document();
        let (pages, warnings) = capture_warnings(|| {
            doc.add(Renderer::spacer(700.0));
            doc.add(Renderer::image(10.0, 40.0).with(Property::KeepWithNext, true));
            doc.add(Renderer::image(10.0, 60.0));
            doc.close()
        });
        assert!(warnings.is_empty());
        assert_eq!(pages[&1].len(), 1);
        assert_eq!(page_heights(&pages, 2), vec![40.0, 60.0]);
    }

    #[test]
    fn test_keep_with_next_splits_held_element() {
        let mut doc = document();
        doc.add(Renderer::spacer(600.0));
        doc.add(
            Renderer::div()
                .with(Property::KeepWithNext, true)
                .child(Renderer::spacer(160.0)),
        );
        doc.add(Renderer::image(10.0, 50.0));
        let pages = doc.close();
        // 160 - 35 = 125 stays on the first page
        let first = page_heights(&pages, 1);
        assert_eq!(first.len(), 2);
        assert!((first[1] - 125.0).abs() < EPS);
        let second = page_heights(&pages, 2);
        assert!((second[0] - 35.0).abs() < EPS);
        assert_eq!(second[1], 50.0);
    }

    #[test]
    fn test_keep_with_next_gives_up_on_empty_area() {
        let mut doc = document();
        let (pages, warnings) = capture_warnings(|| {
            doc.add(Renderer::image(10.0, 750.0).with(Property::KeepWithNext, true));
            doc.add(Renderer::image(10.0, 60.0));
            doc.close()
        });
        assert_eq!(
            warnings,
            vec![messages::RENDERER_WAS_NOT_ABLE_TO_PROCESS_KEEP_WITH_NEXT.to_string()]
        );
        assert_eq!(page_heights(&pages, 1), vec![750.0]);
        assert_eq!(page_heights(&pages, 2), vec![60.0]);
    }

    #[test]
    fn test_forced_element_ignores_keep_with_next() {
        let mut doc = document();
        let (_, warnings) = capture_warnings(|| {
            doc.add(Renderer::image(10.0, 900.0).with(Property::KeepWithNext, true));
            doc.add(Renderer::image(10.0, 60.0));
            doc.close()
        });
        assert_eq!(
            warnings,
            vec![
                messages::ELEMENT_DOES_NOT_FIT_AREA.to_string(),
                messages::ELEMENT_WAS_FORCE_PLACED_KEEP_WITH_NEXT_WILL_BE_IGNORED.to_string(),
            ]
        );
    }

    #[test]
    fn test_hanging_element_is_placed_on_close() {
        let mut doc = document();
        doc.add(Renderer::image(10.0, 40.0).with(Property::KeepWithNext, true));
        let pages = doc.close();
        assert_eq!(page_heights(&pages, 1), vec![40.0]);
    }

    #[test]
    fn test_area_break_opens_new_page() {
        let mut doc = document();
        doc.add(Renderer::image(10.0, 40.0));
        doc.add(Renderer::area_break(AreaBreakType::NextPage));
        doc.add(Renderer::image(10.0, 40.0));
        let pages = doc.close();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[&2][0].occupied_bbox().unwrap().get_top(), 806.0);
    }

    #[test]
    fn test_table_paginates_with_header() {
        let mut header = TableModel::new(2).unwrap();
        header.add_cell(Renderer::image(10.0, 20.0)).unwrap();
        header.add_cell(Renderer::image(10.0, 20.0)).unwrap();
        let mut model = TableModel::new(2).unwrap();
        model.set_header(header).unwrap();
        for _ in 0..70 {
            model.add_cell(Renderer::image(10.0, 30.0)).unwrap();
        }
        let mut doc = document();
        doc.add(Renderer::table(model));
        let pages = doc.close();
        assert_eq!(pages.len(), 2);
        let all = placements(&pages);
        let headers = all.iter().filter(|p| p.kind == "table").count();
        assert_eq!(headers, 4);
    }

    #[test]
    fn test_absolute_child_uses_page_box() {
        let mut doc = document();
        doc.add(Renderer::image(10.0, 100.0));
        doc.add(
            Renderer::div()
                .with(Property::Position, Position::Absolute)
                .with(Property::Bottom, 0.0)
                .with(Property::Left, 0.0)
                .child(Renderer::image(10.0, 10.0)),
        );
        let pages = doc.close();
        let abs = pages[&1][1].occupied_bbox().unwrap();
        assert_eq!(abs.get_bottom(), 36.0);
        assert_eq!(abs.get_left(), 36.0);
    }

    #[test]
    fn test_fixed_child_uses_absolute_coordinates() {
        let mut doc = document();
        doc.add(
            Renderer::div()
                .with(Property::Position, Position::Fixed)
                .with(Property::X, 100.0)
                .with(Property::Y, 200.0)
                .with(Property::Width, 50.0)
                .child(Renderer::image(10.0, 10.0)),
        );
        let pages = doc.close();
        let fixed = pages[&1][0].occupied_bbox().unwrap();
        assert_eq!(fixed.get_left(), 100.0);
        assert_eq!(fixed.get_bottom(), 200.0);
        assert_eq!(fixed.height, 10.0);
    }

    #[test]
    fn test_deferred_flush_keeps_pending_until_close() {
        let config = LayoutConfig {
            immediate_flush: false,
            ..LayoutConfig::default()
        };
        let mut doc = DocumentLayout::new(PageSize::LETTER, config);
        doc.add(Renderer::paragraph("a\nb", 10.0));
        assert!(doc.root().pages()[&1].is_empty());
        let pages = doc.close();
        assert_eq!(pages[&1].len(), 1);
    }
}
