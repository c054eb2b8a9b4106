//! Optotype sizing from the visual angle a letter must subtend.
//!
//! A 20/20 optotype subtends 5 arcminutes at the eye; a 20/x optotype
//! subtends `x/20` times that. Given the live viewing distance and the
//! screen's pixel density, that angle fixes the on-screen letter height.

use crate::distance_source::Centimeters;

use std::f64::consts::PI;

/// Arcminutes subtended by a 20/20 optotype.
pub const ARCMIN_PER_LETTER: f64 = 5.0;

/// Centimeters to inches.
pub const SCALING_CORRECTION: f64 = 1.0 / 2.54;

/// Width of the optotype box relative to its height.
pub const ASPECT_RATIO: f64 = 5.0;

/// Font size relative to box height. Calibrated against printed acuity
/// cards; rendering the glyph at the textbook 0.6 makes it twice too large.
pub const FONT_SCALE: f64 = 0.3;

/// On-screen size of one optotype.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptotypeSize {
    /// Width of the letter box in pixels.
    pub width_px: f64,
    /// Height of the letter box in pixels.
    pub height_px: f64,
    /// Font size for the letter, in points.
    pub font_size_pt: f64,
}

/// The angle, in radians, an optotype for 20/`desired_acuity` subtends.
pub fn visual_angle(desired_acuity: u32) -> f64 {
    (desired_acuity as f64 / 20.0) * ARCMIN_PER_LETTER / 60.0 * (PI / 180.0)
}

/// Size an optotype for 20/`desired_acuity` seen from `viewing_distance_cm`
/// on a screen with `pixels_per_inch`.
///
/// Never fails: a zero distance gives a zero-sized letter and a negative one
/// gives a negative size, so validate the distance before calling.
pub fn size_for(
    desired_acuity: u32,
    viewing_distance_cm: Centimeters,
    pixels_per_inch: f64,
) -> OptotypeSize {
    let scale_factor = viewing_distance_cm * visual_angle(desired_acuity).tan() * SCALING_CORRECTION;
    let height_px = scale_factor * pixels_per_inch;

    OptotypeSize {
        width_px: height_px * ASPECT_RATIO,
        height_px,
        font_size_pt: FONT_SCALE * height_px,
    }
}
