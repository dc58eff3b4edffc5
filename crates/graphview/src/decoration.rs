//! Placement of decorations around their anchor node.
//!
//! A decoration is a small node (badge, icon, counter) that sits next to an
//! entity node. Its position is a pure function of the anchor's geometry, the
//! anchor's label alignment, the decoration's own size and the requested
//! [`Alignment`]. When the anchor's label sits on the side the decoration is
//! asked for, the decoration hugs the label instead of the node shape.

use serde::{Deserialize, Serialize};

use graphview_core::geometry::{Point, Size};

use crate::{engine::NodeGeometry, error::DecorationError};

const DEFAULT_PADDING: f32 = 8.0;

/// Horizontal placement of a decoration, or of a node's label text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Vertical placement of a decoration, or of a node's label text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlign {
    #[default]
    Top,
    Center,
    Bottom,
}

/// Requested decoration placement, `data.alignment` in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alignment {
    pub h: HorizontalAlign,
    pub v: VerticalAlign,
}

impl Alignment {
    pub fn new(h: HorizontalAlign, v: VerticalAlign) -> Self {
        Self { h, v }
    }
}

/// Gap between a decoration and its anchor, `data.padding` in a snapshot.
///
/// Each axis falls back to 8 model units when omitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Padding {
    #[serde(default = "default_padding")]
    pub x: f32,
    #[serde(default = "default_padding")]
    pub y: f32,
}

fn default_padding() -> f32 {
    DEFAULT_PADDING
}

impl Padding {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Default for Padding {
    fn default() -> Self {
        Self::new(DEFAULT_PADDING, DEFAULT_PADDING)
    }
}

/// Geometry of the anchor node that decorations are laid out against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorSpecs {
    pub position: Point,
    pub size: Size,
    /// Size of the anchor's bounding box including its label.
    pub label_size: Size,
    pub text_h_align: HorizontalAlign,
    pub text_v_align: VerticalAlign,
}

impl AnchorSpecs {
    /// Builds the specs from live geometry.
    ///
    /// `position` overrides the live position, which is how decorations are
    /// retargeted towards where an animating anchor is heading.
    pub fn from_geometry(geometry: &NodeGeometry, position: Option<Point>) -> Self {
        Self {
            position: position.unwrap_or(geometry.position),
            size: geometry.size,
            label_size: geometry.label_bounds.to_size(),
            text_h_align: geometry.text_h_align,
            text_v_align: geometry.text_v_align,
        }
    }
}

/// Size of the decoration itself, with and without its own label.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DecorationSize {
    pub plain: Size,
    pub with_labels: Size,
}

impl DecorationSize {
    pub fn new(plain: Size, with_labels: Size) -> Self {
        Self { plain, with_labels }
    }

    pub fn from_geometry(geometry: &NodeGeometry) -> Self {
        Self::new(geometry.size, geometry.label_bounds.to_size())
    }
}

/// Computes where a decoration should sit relative to its anchor.
///
/// # Errors
///
/// Returns [`DecorationError::MissingAlignment`] when `alignment` is `None`;
/// decorations are never placed with a guessed alignment.
///
/// # Examples
///
/// ```
/// use graphview::decoration::{
///     calculate_position, Alignment, AnchorSpecs, DecorationSize, HorizontalAlign, VerticalAlign,
/// };
/// use graphview::geometry::{Point, Size};
///
/// let anchor = AnchorSpecs {
///     position: Point::new(100.0, 50.0),
///     size: Size::new(20.0, 20.0),
///     label_size: Size::new(60.0, 40.0),
///     text_h_align: HorizontalAlign::Left,
///     text_v_align: VerticalAlign::Center,
/// };
/// let decoration = DecorationSize::new(Size::new(10.0, 10.0), Size::new(10.0, 10.0));
/// let alignment = Alignment::new(HorizontalAlign::Right, VerticalAlign::Center);
///
/// let position = calculate_position(None, Some(alignment), &anchor, &decoration).unwrap();
/// assert_eq!(position, Point::new(100.0 + 10.0 + 5.0 + 8.0, 50.0));
/// ```
pub fn calculate_position(
    padding: Option<Padding>,
    alignment: Option<Alignment>,
    anchor: &AnchorSpecs,
    decoration: &DecorationSize,
) -> Result<Point, DecorationError> {
    let alignment = alignment.ok_or(DecorationError::MissingAlignment)?;
    let padding = padding.unwrap_or_default();

    let x = horizontal(padding.x, alignment, anchor, decoration);
    let y = vertical(padding.y, alignment, anchor, decoration);
    Ok(Point::new(x, y))
}

/// Which part of the anchor the decoration is offset from.
enum Hug {
    /// Label is centered on the requested side; offset from the label's far edge.
    LabelEdge,
    /// Label sits on the requested side; offset from the label box.
    LabelBox,
    /// Offset from the node shape.
    Shape,
}

fn horizontal_hug(alignment: Alignment, anchor: &AnchorSpecs) -> Hug {
    let same_v = anchor.text_v_align == alignment.v;
    let same_h = anchor.text_h_align == alignment.h;

    if same_v && anchor.text_v_align == VerticalAlign::Center && same_h {
        Hug::LabelEdge
    } else if same_v
        && (anchor.text_v_align != VerticalAlign::Center
            || same_h
            || anchor.text_h_align == HorizontalAlign::Center)
    {
        Hug::LabelBox
    } else {
        Hug::Shape
    }
}

fn horizontal(
    padding: f32,
    alignment: Alignment,
    anchor: &AnchorSpecs,
    decoration: &DecorationSize,
) -> f32 {
    let x = anchor.position.x();
    let half_width = anchor.size.width() / 2.0;
    let label_width = anchor.label_size.width();
    let dec_label_half = decoration.with_labels.width() / 2.0;
    let dec_half = decoration.plain.width() / 2.0;

    match alignment.h {
        HorizontalAlign::Center => x,
        HorizontalAlign::Right => {
            let offset = match horizontal_hug(alignment, anchor) {
                Hug::LabelEdge => x - half_width + label_width + dec_label_half,
                Hug::LabelBox => x + label_width / 2.0 + dec_label_half,
                Hug::Shape => x + half_width + dec_half,
            };
            offset + padding
        }
        HorizontalAlign::Left => {
            let offset = match horizontal_hug(alignment, anchor) {
                Hug::LabelEdge => x + half_width - label_width - dec_label_half,
                Hug::LabelBox => x - label_width / 2.0 - dec_label_half,
                Hug::Shape => x - half_width - dec_half,
            };
            offset - padding
        }
    }
}

fn vertical(
    padding: f32,
    alignment: Alignment,
    anchor: &AnchorSpecs,
    decoration: &DecorationSize,
) -> f32 {
    let y = anchor.position.y();
    let height = anchor.size.height();
    let label_height = anchor.label_size.height();
    let dec_label_half = decoration.with_labels.height() / 2.0;
    let same_v = anchor.text_v_align == alignment.v;
    // Extra room the label takes below (or above) the shape, split evenly.
    let label_overhang = (label_height - height - padding) / 2.0;

    match alignment.v {
        VerticalAlign::Center => y,
        VerticalAlign::Bottom => {
            if same_v && alignment.h == HorizontalAlign::Center {
                y - height / 2.0 + label_height + dec_label_half + padding
            } else if same_v {
                y + height / 2.0 + padding + label_overhang
            } else {
                y + height / 2.0 + dec_label_half + padding
            }
        }
        VerticalAlign::Top => {
            if same_v && alignment.h == HorizontalAlign::Center {
                y + height / 2.0 - label_height - dec_label_half - padding
            } else if same_v {
                y - height / 2.0 - padding - label_overhang
            } else {
                y - height / 2.0 - dec_label_half - padding
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(text_h_align: HorizontalAlign, text_v_align: VerticalAlign) -> AnchorSpecs {
        AnchorSpecs {
            position: Point::new(100.0, 200.0),
            size: Size::new(20.0, 30.0),
            label_size: Size::new(80.0, 60.0),
            text_h_align,
            text_v_align,
        }
    }

    fn badge() -> DecorationSize {
        DecorationSize::new(Size::new(10.0, 12.0), Size::new(16.0, 18.0))
    }

    #[test]
    fn test_missing_alignment_is_an_error() {
        let result = calculate_position(
            None,
            None,
            &anchor(HorizontalAlign::Center, VerticalAlign::Bottom),
            &badge(),
        );
        assert_eq!(result, Err(DecorationError::MissingAlignment));
    }

    #[test]
    fn test_right_center_with_left_text_uses_shape() {
        let anchor = anchor(HorizontalAlign::Left, VerticalAlign::Center);
        let alignment = Alignment::new(HorizontalAlign::Right, VerticalAlign::Center);

        let position = calculate_position(None, Some(alignment), &anchor, &badge()).unwrap();
        assert_eq!(position.x(), 100.0 + 20.0 / 2.0 + 10.0 / 2.0 + 8.0);
        assert_eq!(position.y(), 200.0);
    }

    #[test]
    fn test_center_center_stays_on_anchor() {
        let alignment = Alignment::new(HorizontalAlign::Center, VerticalAlign::Center);
        let position = calculate_position(
            Some(Padding::new(50.0, 50.0)),
            Some(alignment),
            &anchor(HorizontalAlign::Right, VerticalAlign::Top),
            &badge(),
        )
        .unwrap();
        assert_eq!(position, Point::new(100.0, 200.0));
    }

    #[test]
    fn test_right_hugs_centered_label_edge() {
        let anchor = anchor(HorizontalAlign::Right, VerticalAlign::Center);
        let alignment = Alignment::new(HorizontalAlign::Right, VerticalAlign::Center);

        let position = calculate_position(None, Some(alignment), &anchor, &badge()).unwrap();
        assert_eq!(position.x(), 100.0 - 10.0 + 80.0 + 8.0 + 8.0);
    }

    #[test]
    fn test_left_hugs_label_box_when_vertical_matches() {
        let anchor = anchor(HorizontalAlign::Center, VerticalAlign::Bottom);
        let alignment = Alignment::new(HorizontalAlign::Left, VerticalAlign::Bottom);

        let position = calculate_position(None, Some(alignment), &anchor, &badge()).unwrap();
        assert_eq!(position.x(), 100.0 - 40.0 - 8.0 - 8.0);
        // Bottom with matching text: below the label overhang.
        assert_eq!(position.y(), 200.0 + 15.0 + 8.0 + (60.0 - 30.0 - 8.0) / 2.0);
    }

    #[test]
    fn test_bottom_center_sits_below_label() {
        let anchor = anchor(HorizontalAlign::Center, VerticalAlign::Bottom);
        let alignment = Alignment::new(HorizontalAlign::Center, VerticalAlign::Bottom);

        let position = calculate_position(None, Some(alignment), &anchor, &badge()).unwrap();
        assert_eq!(position.x(), 100.0);
        assert_eq!(position.y(), 200.0 - 15.0 + 60.0 + 9.0 + 8.0);
    }

    #[test]
    fn test_top_without_matching_text_uses_shape() {
        let anchor = anchor(HorizontalAlign::Center, VerticalAlign::Bottom);
        let alignment = Alignment::new(HorizontalAlign::Center, VerticalAlign::Top);

        let position = calculate_position(
            Some(Padding::new(2.0, 4.0)),
            Some(alignment),
            &anchor,
            &badge(),
        )
        .unwrap();
        assert_eq!(position.y(), 200.0 - 15.0 - 9.0 - 4.0);
    }

    #[test]
    fn test_padding_partial_deserialize() {
        let padding: Padding = serde_json::from_str(r#"{"x": 3}"#).unwrap();
        assert_eq!(padding, Padding::new(3.0, 8.0));
    }

    #[test]
    fn test_alignment_deserialize() {
        let alignment: Alignment = serde_json::from_str(r#"{"h": "center", "v": "bottom"}"#).unwrap();
        assert_eq!(
            alignment,
            Alignment::new(HorizontalAlign::Center, VerticalAlign::Bottom)
        );
    }
}

#[cfg(test)]
mod proptest_tests {
    use proptest::prelude::*;

    use super::*;

    fn h_align() -> impl Strategy<Value = HorizontalAlign> {
        prop_oneof![
            Just(HorizontalAlign::Left),
            Just(HorizontalAlign::Center),
            Just(HorizontalAlign::Right),
        ]
    }

    fn v_align() -> impl Strategy<Value = VerticalAlign> {
        prop_oneof![
            Just(VerticalAlign::Top),
            Just(VerticalAlign::Center),
            Just(VerticalAlign::Bottom),
        ]
    }

    fn size() -> impl Strategy<Value = Size> {
        (1.0f32..200.0, 1.0f32..200.0).prop_map(|(w, h)| Size::new(w, h))
    }

    fn anchor() -> impl Strategy<Value = AnchorSpecs> {
        (
            -500.0f32..500.0,
            -500.0f32..500.0,
            size(),
            size(),
            h_align(),
            v_align(),
        )
            .prop_map(|(x, y, size, label_size, text_h_align, text_v_align)| AnchorSpecs {
                position: Point::new(x, y),
                size,
                label_size,
                text_h_align,
                text_v_align,
            })
    }

    proptest! {
        #[test]
        fn calculate_position_is_pure(
            anchor in anchor(),
            plain in size(),
            with_labels in size(),
            h in h_align(),
            v in v_align(),
            px in 0.0f32..20.0,
            py in 0.0f32..20.0,
        ) {
            let decoration = DecorationSize::new(plain, with_labels);
            let alignment = Some(Alignment::new(h, v));
            let padding = Some(Padding::new(px, py));

            let first = calculate_position(padding, alignment, &anchor, &decoration).unwrap();
            // Interleave an unrelated call to make sure no state carries over.
            let _ = calculate_position(None, alignment, &anchor, &DecorationSize::default());
            let second = calculate_position(padding, alignment, &anchor, &decoration).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn left_and_right_mirror_for_shape_hugging(
            anchor in anchor(),
            plain in size(),
            px in 0.0f32..20.0,
        ) {
            // Force the shape branch: text aligned opposite to the requested side.
            let anchor = AnchorSpecs {
                text_v_align: VerticalAlign::Top,
                ..anchor
            };
            let decoration = DecorationSize::new(plain, plain);
            let padding = Some(Padding::new(px, 0.0));
            let right = calculate_position(
                padding,
                Some(Alignment::new(HorizontalAlign::Right, VerticalAlign::Center)),
                &anchor,
                &decoration,
            )
            .unwrap();
            let left = calculate_position(
                padding,
                Some(Alignment::new(HorizontalAlign::Left, VerticalAlign::Center)),
                &anchor,
                &decoration,
            )
            .unwrap();

            let center = anchor.position.x();
            prop_assert!(((right.x() - center) - (center - left.x())).abs() < 0.01);
        }
    }
}
