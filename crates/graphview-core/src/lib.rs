//! Graphview Core Types
//!
//! This crate provides the foundational value types shared by the graphview
//! scene reconciler. It includes:
//!
//! - **Identifiers**: String-interned element identifiers ([`identifier::ElementId`])
//! - **Colors**: sRGB colors with hue rotation ([`color::Color`])
//! - **Geometry**: Points, sizes, bounds and insets ([`geometry`] module)
//! - **Animation**: Easing and timing descriptors ([`animation`] module)

pub mod animation;
pub mod color;
pub mod geometry;
pub mod identifier;
