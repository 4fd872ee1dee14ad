//! Layout properties
//!
//! Each renderer carries a [`PropertyBag`] keyed by [`Property`]. Values are
//! stored untyped and read back through typed getters; a getter that meets a
//! value of the wrong kind reports it as absent.

use std::collections::HashMap;

/// Enumerated property keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Property {
    Width,
    Height,
    MinHeight,
    MaxHeight,
    MarginTop,
    MarginRight,
    MarginBottom,
    MarginLeft,
    BorderTop,
    BorderRight,
    BorderBottom,
    BorderLeft,
    PaddingTop,
    PaddingRight,
    PaddingBottom,
    PaddingLeft,
    KeepTogether,
    KeepWithNext,
    RotationAngle,
    RotationPointX,
    RotationPointY,
    RotationInitialWidth,
    RotationInitialHeight,
    Float,
    Clear,
    Position,
    X,
    Y,
    Top,
    Left,
    Right,
    Bottom,
    PageNumber,
    VerticalAlignment,
    HorizontalAlignment,
    ForcedPlacement,
    FillAvailableArea,
    FillAvailableAreaOnSplit,
    CollapsingMargins,
    ColumnCount,
    ColumnGap,
}

/// A length in points or as a share of the available width
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnitValue {
    Point(f64),
    Percent(f64),
}

impl UnitValue {
    pub fn resolve(&self, available: f64) -> f64 {
        match self {
            UnitValue::Point(v) => *v,
            UnitValue::Percent(p) => available * p / 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FloatValue {
    #[default]
    None,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ClearValue {
    #[default]
    None,
    Left,
    Right,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Position {
    #[default]
    Static,
    Relative,
    Absolute,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum VerticalAlignment {
    #[default]
    Top,
    Middle,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum HorizontalAlignment {
    #[default]
    Left,
    Center,
    Right,
}

/// A stored property value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Unit(UnitValue),
    Side(FloatValue),
    Clear(ClearValue),
    Position(Position),
    VerticalAlignment(VerticalAlignment),
    HorizontalAlignment(HorizontalAlignment),
}

macro_rules! impl_from {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for PropertyValue {
            fn from(value: $ty) -> Self {
                PropertyValue::$variant(value)
            }
        }
    };
}

impl_from!(f64, Float);
impl_from!(i64, Int);
impl_from!(bool, Bool);
impl_from!(UnitValue, Unit);
impl_from!(FloatValue, Side);
impl_from!(ClearValue, Clear);
impl_from!(Position, Position);
impl_from!(VerticalAlignment, VerticalAlignment);
impl_from!(HorizontalAlignment, HorizontalAlignment);

/// Mutable property map of one renderer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyBag {
    values: HashMap<Property, PropertyValue>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: Property, value: impl Into<PropertyValue>) -> &mut Self {
        self.values.insert(key, value.into());
        self
    }

    pub fn remove(&mut self, key: Property) -> Option<PropertyValue> {
        self.values.remove(&key)
    }

    pub fn has(&self, key: Property) -> bool {
        self.values.contains_key(&key)
    }

    pub fn get(&self, key: Property) -> Option<&PropertyValue> {
        self.values.get(&key)
    }

    /// Numeric value; integers widen to `f64`.
    pub fn get_f64(&self, key: Property) -> Option<f64> {
        match self.values.get(&key)? {
            PropertyValue::Float(v) => Some(*v),
            PropertyValue::Int(v) => Some(*v as f64),
            PropertyValue::Unit(UnitValue::Point(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_int(&self, key: Property) -> Option<i64> {
        match self.values.get(&key)? {
            PropertyValue::Int(v) => Some(*v),
            PropertyValue::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Boolean flag; absent means `false`.
    pub fn get_bool(&self, key: Property) -> bool {
        matches!(self.values.get(&key), Some(PropertyValue::Bool(true)))
    }

    pub fn get_unit(&self, key: Property) -> Option<UnitValue> {
        match self.values.get(&key)? {
            PropertyValue::Unit(v) => Some(*v),
            PropertyValue::Float(v) => Some(UnitValue::Point(*v)),
            PropertyValue::Int(v) => Some(UnitValue::Point(*v as f64)),
            _ => None,
        }
    }

    /// Margin, border or padding width; absent means zero.
    pub fn edge(&self, key: Property) -> f64 {
        self.get_f64(key).unwrap_or(0.0)
    }

    pub fn float_value(&self) -> FloatValue {
        match self.values.get(&Property::Float) {
            Some(PropertyValue::Side(v)) => *v,
            _ => FloatValue::None,
        }
    }

    pub fn clear(&self) -> ClearValue {
        match self.values.get(&Property::Clear) {
            Some(PropertyValue::Clear(v)) => *v,
            _ => ClearValue::None,
        }
    }

    pub fn position(&self) -> Position {
        match self.values.get(&Property::Position) {
            Some(PropertyValue::Position(v)) => *v,
            _ => Position::Static,
        }
    }

    pub fn vertical_alignment(&self) -> VerticalAlignment {
        match self.values.get(&Property::VerticalAlignment) {
            Some(PropertyValue::VerticalAlignment(v)) => *v,
            _ => VerticalAlignment::Top,
        }
    }

    pub fn horizontal_alignment(&self) -> Option<HorizontalAlignment> {
        match self.values.get(&Property::HorizontalAlignment) {
            Some(PropertyValue::HorizontalAlignment(v)) => Some(*v),
            _ => None,
        }
    }

    /// Fold `HEIGHT` into the min/max bounds.
    ///
    /// A set height fixes both bounds. A max below the min is lifted to
    /// the min.
    pub fn override_height_properties(&mut self) {
        if let Some(height) = self.get_f64(Property::Height) {
            self.set(Property::MinHeight, height);
            self.set(Property::MaxHeight, height);
        }
        if let (Some(min), Some(max)) = (
            self.get_f64(Property::MinHeight),
            self.get_f64(Property::MaxHeight),
        ) {
            if max < min {
                self.set(Property::MaxHeight, min);
            }
        }
    }

    /// `[top, right, bottom, left]` for one of the three box edges
    pub fn margins(&self) -> [f64; 4] {
        [
            self.edge(Property::MarginTop),
            self.edge(Property::MarginRight),
            self.edge(Property::MarginBottom),
            self.edge(Property::MarginLeft),
        ]
    }

    pub fn borders(&self) -> [f64; 4] {
        [
            self.edge(Property::BorderTop),
            self.edge(Property::BorderRight),
            self.edge(Property::BorderBottom),
            self.edge(Property::BorderLeft),
        ]
    }

    pub fn paddings(&self) -> [f64; 4] {
        [
            self.edge(Property::PaddingTop),
            self.edge(Property::PaddingRight),
            self.edge(Property::PaddingBottom),
            self.edge(Property::PaddingLeft),
        ]
    }

    /// Iterate over the stored entries
    pub fn iter(&self) -> impl Iterator<Item = (&Property, &PropertyValue)> {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let mut bag = PropertyBag::new();
        bag.set(Property::Width, UnitValue::Percent(50.0))
            .set(Property::ColumnCount, 3i64)
            .set(Property::KeepTogether, true)
            .set(Property::Position, Position::Absolute);

        assert_eq!(bag.get_unit(Property::Width).unwrap().resolve(200.0), 100.0);
        assert_eq!(bag.get_int(Property::ColumnCount), Some(3));
        assert!(bag.get_bool(Property::KeepTogether));
        assert!(!bag.get_bool(Property::KeepWithNext));
        assert_eq!(bag.position(), Position::Absolute);
        assert_eq!(bag.float_value(), FloatValue::None);
        // Wrong kind reads as absent
        assert_eq!(bag.get_f64(Property::Position), None);
    }

    #[test]
    fn test_height_fixes_both_bounds() {
        let mut bag = PropertyBag::new();
        bag.set(Property::Height, 120.0).set(Property::MinHeight, 10.0);
        bag.override_height_properties();
        assert_eq!(bag.get_f64(Property::MinHeight), Some(120.0));
        assert_eq!(bag.get_f64(Property::MaxHeight), Some(120.0));
    }

    #[test]
    fn test_max_below_min_is_lifted() {
        let mut bag = PropertyBag::new();
        bag.set(Property::MinHeight, 80.0).set(Property::MaxHeight, 50.0);
        bag.override_height_properties();
        assert_eq!(bag.get_f64(Property::MaxHeight), Some(80.0));
    }
}
