//! Profile-driven level of detail for replayed geometry construction.

use core_kernel::Manifold;

/// Quality tier selected by the caller; maps to a chord-error tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LodProfile {
    Draft,
    #[default]
    Model,
    Export3mf,
}

// Balanced defaults selected for profile-driven modelling/export, in scene
// units.
pub const LOD_TOLERANCE_DRAFT: f64 = 0.1;
pub const LOD_TOLERANCE_MODEL: f64 = 0.01;
pub const LOD_TOLERANCE_EXPORT_3MF: f64 = 0.0001;

const MIN_CIRCULAR_SEGMENTS: u32 = 4;
const MAX_CIRCULAR_SEGMENTS: u32 = 8192;

/// Future-facing hook: when enabled, refine replayed manifolds toward a
/// tolerance after construction. Disabled by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayPostprocessPolicy {
    pub refine_to_tolerance_enabled: bool,
    pub refine_tolerance: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayLodPolicy {
    pub profile: LodProfile,
    pub postprocess: ReplayPostprocessPolicy,
}

pub fn lod_tolerance_for_profile(profile: LodProfile) -> f64 {
    match profile {
        LodProfile::Draft => LOD_TOLERANCE_DRAFT,
        LodProfile::Model => LOD_TOLERANCE_MODEL,
        LodProfile::Export3mf => LOD_TOLERANCE_EXPORT_3MF,
    }
}

fn round_up_to_multiple_of_four(n: u32) -> u32 {
    n.div_ceil(4) * 4
}

fn circular_segments_for_radius_and_tolerance(radius: f64, tolerance: f64) -> u32 {
    let radius = radius.abs();
    if !radius.is_finite() || radius <= 1e-12 {
        return MIN_CIRCULAR_SEGMENTS;
    }
    let mut tolerance = if tolerance.is_finite() && tolerance > 0.0 {
        tolerance
    } else {
        LOD_TOLERANCE_MODEL
    };
    tolerance = tolerance.max(1e-9);
    if tolerance >= radius {
        return MIN_CIRCULAR_SEGMENTS;
    }
    // Sagitta error bound for a circle approximated by n segments:
    // sagitta = r * (1 - cos(pi / n)) <= tolerance
    let cos_arg = (1.0 - tolerance / radius).clamp(-1.0, 1.0);
    let theta = cos_arg.acos();
    if !theta.is_finite() || theta <= 1e-9 {
        return MAX_CIRCULAR_SEGMENTS;
    }
    let n = (std::f64::consts::PI / theta).ceil() as u32;
    round_up_to_multiple_of_four(n.clamp(MIN_CIRCULAR_SEGMENTS, MAX_CIRCULAR_SEGMENTS))
}

/// Auto-derived circular tessellation from profile tolerance.
pub fn auto_circular_segments(radius: f64, profile: LodProfile) -> u32 {
    circular_segments_for_radius_and_tolerance(radius, lod_tolerance_for_profile(profile))
}

/// Segment count for a partial revolve: the full-circle count scaled by the
/// angular extent, floored at 3.
pub fn auto_circular_segments_for_revolve(radius: f64, revolve_degrees: f64, profile: LodProfile) -> u32 {
    let full = auto_circular_segments(radius, profile);
    if !revolve_degrees.is_finite() || revolve_degrees <= 0.0 {
        return 3;
    }
    let clamped = revolve_degrees.min(360.0);
    let scaled = (full as f64 * clamped / 360.0).ceil() as u32;
    scaled.max(3)
}

/// Apply the optional refine hook to a replayed manifold.
pub fn apply_replay_postprocess(input: Manifold, postprocess: &ReplayPostprocessPolicy) -> Manifold {
    if !postprocess.refine_to_tolerance_enabled {
        return input;
    }
    if !postprocess.refine_tolerance.is_finite() || postprocess.refine_tolerance <= 0.0 {
        return input;
    }
    input.refine_to_tolerance(postprocess.refine_tolerance)
}
