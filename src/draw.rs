//! Visualization of matches and projected model outlines.
//!
//! [`draw`] runs the matcher once per model and composites the results on a
//! copy of the observed image. Match lines are only drawn when exactly one
//! model is given; every model with a homography gets an outline in the
//! colour of its slot, and models past the fifth slot get none.

use crate::image::view_from_gray_image;
use crate::search::{find_match_with_config, MatchConfig, MatchOutput};
use crate::trace::{trace_event, trace_span};
use crate::util::SurfMatchResult;
use ::image::imageops::{grayscale, replace};
use ::image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use std::time::Duration;

/// Outline colours by model position: red, yellow, green, blue, purple.
pub const OUTLINE_COLORS: [Rgb<u8>; 5] = [
    Rgb([255, 0, 0]),
    Rgb([255, 255, 0]),
    Rgb([0, 128, 0]),
    Rgb([0, 0, 255]),
    Rgb([128, 0, 128]),
];

/// Returns the outline colour for the model at `index`, if it has one.
pub fn outline_color(index: usize) -> Option<Rgb<u8>> {
    OUTLINE_COLORS.get(index).copied()
}

/// Rendering parameters.
#[derive(Clone, Debug)]
pub struct DrawConfig {
    /// Outline width in pixels.
    pub outline_thickness: u32,
    /// Colour of match lines.
    pub match_color: Rgb<u8>,
    /// Colour of keypoint circles.
    pub keypoint_color: Rgb<u8>,
    /// Radius of keypoint circles in pixels.
    pub keypoint_radius: i32,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            outline_thickness: 2,
            match_color: Rgb([255, 255, 255]),
            keypoint_color: Rgb([255, 255, 255]),
            keypoint_radius: 3,
        }
    }
}

/// Rectangle of a model image that is searched for and outlined.
///
/// Model keypoints and the projected outline use coordinates relative to
/// the rectangle's top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ModelRegion {
    /// The whole of `image`.
    pub fn full(image: &RgbImage) -> Self {
        Self {
            x: 0,
            y: 0,
            width: image.width(),
            height: image.height(),
        }
    }
}

/// Per-model summary of a [`draw`] run.
#[derive(Clone, Debug)]
pub struct ModelReport {
    pub model_keypoints: usize,
    pub observed_keypoints: usize,
    /// Matches that survived every filter.
    pub accepted: usize,
    /// Projected model corners when a homography was found.
    pub corners: Option<[(f32, f32); 4]>,
    /// Whether an outline was drawn for this model.
    pub outlined: bool,
}

/// Annotated observed image and the accumulated matching time.
#[derive(Clone, Debug)]
pub struct Drawing {
    pub image: RgbImage,
    pub match_time: Duration,
    pub models: Vec<ModelReport>,
}

/// Matches every model against `observed` and draws the results.
pub fn draw(models: &[RgbImage], observed: &RgbImage) -> SurfMatchResult<Drawing> {
    draw_with_config(models, observed, &MatchConfig::default(), &DrawConfig::default())
}

/// Matches every model against `observed` and draws the results.
///
/// The loop is sequential and in model order. The returned `match_time`
/// is the sum over all models.
pub fn draw_with_config(
    models: &[RgbImage],
    observed: &RgbImage,
    match_cfg: &MatchConfig,
    draw_cfg: &DrawConfig,
) -> SurfMatchResult<Drawing> {
    let regions: Vec<(&RgbImage, ModelRegion)> =
        models.iter().map(|m| (m, ModelRegion::full(m))).collect();
    draw_regions_with_config(&regions, observed, match_cfg, draw_cfg)
}

/// Like [`draw_with_config`], but only the given region of each model is
/// matched and outlined.
pub fn draw_regions_with_config(
    models: &[(&RgbImage, ModelRegion)],
    observed: &RgbImage,
    match_cfg: &MatchConfig,
    draw_cfg: &DrawConfig,
) -> SurfMatchResult<Drawing> {
    let _span = trace_span!("draw", models = models.len()).entered();

    let mut result = observed.clone();
    let mut match_time = Duration::ZERO;
    let mut reports = Vec::with_capacity(models.len());
    if models.is_empty() {
        return Ok(Drawing {
            image: result,
            match_time,
            models: reports,
        });
    }

    let observed_gray = grayscale(observed);
    let observed_view = view_from_gray_image(&observed_gray)?;

    for (i, &(model, region)) in models.iter().enumerate() {
        let model_gray = grayscale(model);
        let model_view = view_from_gray_image(&model_gray)?.roi(
            region.x as usize,
            region.y as usize,
            region.width as usize,
            region.height as usize,
        )?;
        let output = find_match_with_config(model_view, observed_view, match_cfg.clone())?;
        match_time += output.match_time;

        if models.len() == 1 {
            result = draw_match_overlay(observed, &output, draw_cfg);
        }

        let corners = output.project_model_corners(region.width, region.height);
        let mut outlined = false;
        if let (Some(corners), Some(color)) = (corners, outline_color(i)) {
            let rounded = corners.map(|(x, y)| (x.round() as i32, y.round() as i32));
            draw_closed_polyline(&mut result, &rounded, color, draw_cfg.outline_thickness);
            outlined = true;
        }

        trace_event!(
            "draw_model",
            index = i,
            accepted = output.accepted_count(),
            outlined = outlined
        );
        reports.push(ModelReport {
            model_keypoints: output.model_keypoints.len(),
            observed_keypoints: output.observed_keypoints.len(),
            accepted: output.accepted_count(),
            corners,
            outlined,
        });
    }

    Ok(Drawing {
        image: result,
        match_time,
        models: reports,
    })
}

/// Copy of `observed` with observed keypoints circled and a line from each
/// accepted model keypoint (model origin at the image origin) to its match.
pub fn draw_match_overlay(observed: &RgbImage, output: &MatchOutput, cfg: &DrawConfig) -> RgbImage {
    let mut canvas = observed.clone();
    for kp in output.observed_keypoints.iter() {
        draw_hollow_circle_mut(
            &mut canvas,
            (kp.x.round() as i32, kp.y.round() as i32),
            cfg.keypoint_radius,
            cfg.keypoint_color,
        );
    }
    for (model, obs) in output.accepted_pairs() {
        draw_line_segment_mut(&mut canvas, (model.x, model.y), (obs.x, obs.y), cfg.match_color);
    }
    canvas
}

/// Model and observed images side by side, keypoints circled and accepted
/// matches joined by lines.
///
/// The canvas is `model.width + observed.width` wide and as tall as the
/// taller image; the observed image sits to the right of the model.
pub fn draw_matches_side_by_side(
    model: &RgbImage,
    observed: &RgbImage,
    output: &MatchOutput,
    cfg: &DrawConfig,
) -> RgbImage {
    let offset = model.width();
    let mut canvas = RgbImage::new(
        offset + observed.width(),
        model.height().max(observed.height()),
    );
    replace(&mut canvas, model, 0, 0);
    replace(&mut canvas, observed, i64::from(offset), 0);

    let shift = offset as f32;
    for kp in output.model_keypoints.iter() {
        draw_hollow_circle_mut(
            &mut canvas,
            (kp.x.round() as i32, kp.y.round() as i32),
            cfg.keypoint_radius,
            cfg.keypoint_color,
        );
    }
    for kp in output.observed_keypoints.iter() {
        draw_hollow_circle_mut(
            &mut canvas,
            ((kp.x + shift).round() as i32, kp.y.round() as i32),
            cfg.keypoint_radius,
            cfg.keypoint_color,
        );
    }
    for (m, o) in output.accepted_pairs() {
        draw_line_segment_mut(&mut canvas, (m.x, m.y), (o.x + shift, o.y), cfg.match_color);
    }
    canvas
}

/// Draws a closed polyline through `points` with the given stroke width.
pub fn draw_closed_polyline(
    canvas: &mut RgbImage,
    points: &[(i32, i32)],
    color: Rgb<u8>,
    thickness: u32,
) {
    if points.len() < 2 {
        return;
    }
    let thickness = thickness.max(1) as i32;
    let lo = -(thickness / 2);
    let hi = thickness - thickness / 2;
    for (idx, &(x0, y0)) in points.iter().enumerate() {
        let (x1, y1) = points[(idx + 1) % points.len()];
        for dy in lo..hi {
            for dx in lo..hi {
                draw_line_segment_mut(
                    canvas,
                    ((x0 + dx) as f32, (y0 + dy) as f32),
                    ((x1 + dx) as f32, (y1 + dy) as f32),
                    color,
                );
            }
        }
    }
}
