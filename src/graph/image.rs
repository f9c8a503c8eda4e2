//! Raster synthesis: turn point arrays into an RGB image
//!
//! This is the CPU-bound stage of a render job. Drawing happens directly on
//! a bitmap backend in pixel coordinates; all placement went through the
//! chart transform during point generation.

use bytes::Bytes;
use plotters::prelude::*;

use crate::error::RenderError;
use crate::graph::geometry::ChartParameters;
use crate::graph::points::{flag_bits, PointSeries};
use crate::types::{MonthDay, PixelSize};

const GRID_COLOR: RGBColor = RGBColor(226, 226, 226);
const SCALE_COLOR: RGBColor = RGBColor(64, 112, 192);
const TREND_COLOR: RGBColor = RGBColor(198, 58, 58);
const GOAL_COLOR: RGBColor = RGBColor(52, 148, 82);
const TODAY_COLOR: RGBColor = RGBColor(240, 228, 160);

/// Marker radius for measured days, pixels.
const MARKER_RADIUS: i32 = 2;

/// Dash geometry for the trajectory projection, pixels.
const DASH_ON: f32 = 6.0;
const DASH_OFF: f32 = 4.0;

/// A finished raster: tightly packed RGB8 rows, top to bottom.
#[derive(Debug, Clone)]
pub struct ChartImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 3` bytes of RGB data.
    pub data: Bytes,
}

/// Goal overlay: a slope from the starting point toward the target, then
/// flat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalLine {
    /// Day the goal was set.
    pub start: MonthDay,
    /// Weight on the start day.
    pub start_weight: f32,
    /// Target weight.
    pub target_weight: f32,
    /// Planned weight change per week; sign points toward the target.
    pub weekly_change: f32,
}

/// Display switches bound into a render request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOptions {
    /// Draw the goal overlay (requires `goal`).
    pub show_goal_line: bool,
    /// Project the current trend to the right edge.
    pub show_trajectory_line: bool,
    /// Plot fat weights instead of scale weights.
    pub show_fat_weight: bool,
    /// Goal overlay data, supplied by the caller.
    pub goal: Option<GoalLine>,
}

fn px(v: f32) -> i32 {
    v.round() as i32
}

/// Render the series into an RGB buffer of exactly `size`.
pub fn synthesize(
    params: &ChartParameters,
    series: &PointSeries,
    options: &RenderOptions,
    begin: MonthDay,
    size: PixelSize,
) -> Result<ChartImage, RenderError> {
    let (w, h) = (size.width, size.height);
    let mut buffer = vec![0u8; (w * h * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (w, h)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;

        draw_grid(&root, params, w).map_err(draw_err)?;
        draw_today_band(&root, series, params, h).map_err(draw_err)?;
        if options.show_goal_line {
            if let Some(goal) = &options.goal {
                draw_goal(&root, params, goal, begin, w).map_err(draw_err)?;
            }
        }
        draw_trend(&root, series).map_err(draw_err)?;
        if options.show_trajectory_line {
            draw_trajectory(&root, series, w).map_err(draw_err)?;
        }
        draw_markers(&root, series).map_err(draw_err)?;

        root.present().map_err(draw_err)?;
    }

    Ok(ChartImage {
        width: w,
        height: h,
        data: Bytes::from(buffer),
    })
}

type Area<'a> = DrawingArea<BitMapBackend<'a>, plotters::coord::Shift>;
type AreaResult<'a> =
    Result<(), plotters::drawing::DrawingAreaErrorKind<<BitMapBackend<'a> as DrawingBackend>::ErrorType>>;

fn draw_err<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Drawing(e.to_string())
}

fn draw_grid<'a>(root: &Area<'a>, params: &ChartParameters, width: u32) -> AreaResult<'a> {
    let mut weight = params.grid_min_weight;
    while weight <= params.grid_max_weight + 1e-3 {
        let (_, y) = params.transform.apply(0.0, weight);
        root.draw(&PathElement::new(
            vec![(0, px(y)), (width as i32, px(y))],
            GRID_COLOR,
        ))?;
        weight += params.grid_increment;
    }
    Ok(())
}

fn draw_today_band<'a>(
    root: &Area<'a>,
    series: &PointSeries,
    params: &ChartParameters,
    height: u32,
) -> AreaResult<'a> {
    for flag in &series.flags {
        if flag.bits & flag_bits::TODAY != 0 {
            let half = (params.scale_x * 0.5).max(1.0);
            root.draw(&Rectangle::new(
                [
                    (px(flag.x - half), 0),
                    (px(flag.x + half), height as i32),
                ],
                TODAY_COLOR.mix(0.4).filled(),
            ))?;
        }
    }
    Ok(())
}

fn draw_goal<'a>(
    root: &Area<'a>,
    params: &ChartParameters,
    goal: &GoalLine,
    begin: MonthDay,
    width: u32,
) -> AreaResult<'a> {
    let start_day = begin.days_until(goal.start) as f32;
    let daily = goal.weekly_change / 7.0;
    let span = goal.target_weight - goal.start_weight;

    let mut vertices = Vec::with_capacity(3);
    vertices.push(params.transform.apply(start_day, goal.start_weight));
    if daily != 0.0 && span / daily > 0.0 {
        let hit_day = start_day + span / daily;
        vertices.push(params.transform.apply(hit_day, goal.target_weight));
    }
    // Flat segment to the right edge at the target.
    let (_, target_y) = params.transform.apply(0.0, goal.target_weight);
    vertices.push((width as f32, target_y));

    root.draw(&PathElement::new(
        vertices.into_iter().map(|(x, y)| (px(x), px(y))).collect::<Vec<_>>(),
        GOAL_COLOR.stroke_width(2),
    ))
}

fn draw_trend<'a>(root: &Area<'a>, series: &PointSeries) -> AreaResult<'a> {
    let mut vertices: Vec<(i32, i32)> = Vec::new();
    if let Some((x, y)) = series.head {
        vertices.push((px(x), px(y)));
    }
    for point in &series.points {
        if let Some((x, y)) = point.trend {
            vertices.push((px(x), px(y)));
        }
    }
    if let Some((x, y)) = series.tail {
        vertices.push((px(x), px(y)));
    }
    if vertices.len() < 2 {
        return Ok(());
    }
    root.draw(&PathElement::new(vertices, TREND_COLOR.stroke_width(2)))
}

fn draw_trajectory<'a>(root: &Area<'a>, series: &PointSeries, width: u32) -> AreaResult<'a> {
    let trend: Vec<(f32, f32)> = series
        .points
        .iter()
        .filter_map(|p| p.trend)
        .collect();
    if trend.len() < 2 {
        return Ok(());
    }
    let (x1, y1) = trend[trend.len() - 2];
    let (x2, y2) = trend[trend.len() - 1];
    if x2 <= x1 {
        return Ok(());
    }
    let slope = (y2 - y1) / (x2 - x1);

    // Dashed segment from the last trend point to the right edge.
    let mut x = x2;
    while x < width as f32 {
        let x_end = (x + DASH_ON).min(width as f32);
        let y_start = y2 + slope * (x - x2);
        let y_end = y2 + slope * (x_end - x2);
        root.draw(&PathElement::new(
            vec![(px(x), px(y_start)), (px(x_end), px(y_end))],
            TREND_COLOR.mix(0.6),
        ))?;
        x = x_end + DASH_OFF;
    }
    Ok(())
}

fn draw_markers<'a>(root: &Area<'a>, series: &PointSeries) -> AreaResult<'a> {
    for (point, flag) in series.points.iter().zip(&series.flags) {
        let Some((x, y)) = point.scale else { continue };
        let style = if flag.bits & flag_bits::FAT != 0 {
            SCALE_COLOR.filled()
        } else {
            Into::<ShapeStyle>::into(SCALE_COLOR)
        };
        root.draw(&Circle::new((px(x), px(y)), MARKER_RADIUS, style))?;
    }
    Ok(())
}
