//! Warning codes attached to layout log events
//!
//! Every degradation is logged through `tracing::warn!` with a `code` field
//! holding one of these constants.

pub const CLIP_ELEMENT: &str = "CLIP_ELEMENT";
pub const ELEMENT_DOES_NOT_FIT_AREA: &str = "ELEMENT_DOES_NOT_FIT_AREA";
pub const LAST_ROW_IS_NOT_COMPLETE: &str = "LAST_ROW_IS_NOT_COMPLETE";
pub const ELEMENT_WAS_FORCE_PLACED_KEEP_WITH_NEXT_WILL_BE_IGNORED: &str =
    "ELEMENT_WAS_FORCE_PLACED_KEEP_WITH_NEXT_WILL_BE_IGNORED";
pub const RENDERER_WAS_NOT_ABLE_TO_PROCESS_KEEP_WITH_NEXT: &str =
    "RENDERER_WAS_NOT_ABLE_TO_PROCESS_KEEP_WITH_NEXT";
pub const OCCUPIED_AREA_HAS_NOT_BEEN_INITIALIZED: &str = "OCCUPIED_AREA_HAS_NOT_BEEN_INITIALIZED";
