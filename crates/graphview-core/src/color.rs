//! Color handling for path highlighting.
//!
//! This module provides the [`Color`] type which wraps an sRGB color from the
//! color crate, with the hue arithmetic needed to give every highlighted path
//! its own color.

use std::{fmt, str::FromStr};

use color::{AlphaColor, DynamicColor, Hsl, Srgb};

/// Wrapper around an sRGB `AlphaColor` from the color crate.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Color {
    color: AlphaColor<Srgb>,
}

impl Color {
    /// Create a new `Color` from a CSS color string such as "#0088cc",
    /// "rgb(0, 136, 204)" or "steelblue".
    ///
    /// # Examples
    ///
    /// ```
    /// use graphview_core::color::Color;
    ///
    /// let blue = Color::new("#0088cc").unwrap();
    /// assert_eq!(blue.to_css_hex(), "#0088cc");
    /// assert!(Color::new("not-a-color").is_err());
    /// ```
    pub fn new(color_str: &str) -> Result<Self, String> {
        match DynamicColor::from_str(color_str) {
            Ok(color) => Ok(Self {
                color: color.to_alpha_color::<Srgb>(),
            }),
            Err(err) => Err(format!("invalid color `{color_str}`: {err}")),
        }
    }

    /// Returns this color with its hue rotated by `degrees` in HSL space.
    ///
    /// Saturation, lightness and alpha are preserved. Rotations wrap around
    /// the hue circle, so a full turn returns the original color.
    ///
    /// # Examples
    ///
    /// ```
    /// use graphview_core::color::Color;
    ///
    /// let red = Color::new("#ff0000").unwrap();
    /// assert_eq!(red.shift_hue(120.0).to_css_hex(), "#00ff00");
    /// assert_eq!(red.shift_hue(360.0).to_css_hex(), "#ff0000");
    /// ```
    pub fn shift_hue(self, degrees: f32) -> Self {
        let [hue, saturation, lightness, alpha] = self.color.convert::<Hsl>().components;
        let hue = if hue.is_nan() { 0.0 } else { hue };
        let rotated = AlphaColor::<Hsl>::new([
            (hue + degrees).rem_euclid(360.0),
            saturation,
            lightness,
            alpha,
        ]);
        Self {
            color: rotated.convert::<Srgb>(),
        }
    }

    /// Returns the color as a lowercase `#rrggbb` string, ignoring alpha.
    pub fn to_css_hex(self) -> String {
        let rgba = self.color.to_rgba8();
        format!("#{:02x}{:02x}{:02x}", rgba.r, rgba.g, rgba.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css_hex())
    }
}
