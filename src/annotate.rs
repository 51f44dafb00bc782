// Overlay drawing for detected faces

use crate::emotion::frame_to_mat;
use crate::error::Result;
use crate::models::{Emotion, FaceRegion, Frame};
use opencv::core::{Mat, Point, Scalar};
use opencv::imgproc::{self, FONT_HERSHEY_SIMPLEX, LINE_4, LINE_8};

/// Box color in BGR order (green)
pub const BOX_COLOR: [u8; 3] = [0, 255, 0];
/// Label color in BGR order (red)
pub const LABEL_COLOR: [u8; 3] = [0, 0, 255];
pub const BOX_THICKNESS: i32 = 2;
pub const LABEL_THICKNESS: i32 = 2;
pub const LABEL_SCALE: f64 = 1.0;
/// Distance between the label baseline and the top edge of its box
pub const LABEL_OFFSET: i32 = 10;

/// One drawing primitive
#[derive(Clone, Debug, PartialEq)]
pub enum Overlay {
    Rectangle {
        top_left: (i32, i32),
        bottom_right: (i32, i32),
        color: [u8; 3],
        thickness: i32,
    },
    Label {
        text: String,
        origin: (i32, i32),
        scale: f64,
        color: [u8; 3],
        thickness: i32,
    },
}

/// Lays out a box and the shared label for every region.
///
/// Labels sit above the box even when that puts them off-frame.
pub fn plan_overlays(regions: &[FaceRegion], label: Emotion) -> Vec<Overlay> {
    regions
        .iter()
        .flat_map(|region| {
            [
                Overlay::Rectangle {
                    top_left: (region.x, region.y),
                    bottom_right: region.bottom_right(),
                    color: BOX_COLOR,
                    thickness: BOX_THICKNESS,
                },
                Overlay::Label {
                    text: label.as_str().to_string(),
                    origin: (region.x, region.y - LABEL_OFFSET),
                    scale: LABEL_SCALE,
                    color: LABEL_COLOR,
                    thickness: LABEL_THICKNESS,
                },
            ]
        })
        .collect()
}

fn scalar(bgr: [u8; 3]) -> Scalar {
    Scalar::new(bgr[0] as f64, bgr[1] as f64, bgr[2] as f64, 0.0)
}

/// Converts an RGB frame into the BGR Mat the display expects
pub fn to_display_mat(frame: &Frame) -> Result<Mat> {
    let rgb = frame_to_mat(frame)?;
    let mut bgr = Mat::default();
    imgproc::cvt_color(
        &rgb,
        &mut bgr,
        imgproc::COLOR_RGB2BGR,
        0,
        opencv::core::AlgorithmHint::ALGO_HINT_DEFAULT,
    )?;
    Ok(bgr)
}

/// Draws overlays onto a BGR Mat in place
pub fn draw_overlays(img: &mut Mat, overlays: &[Overlay]) -> Result<()> {
    for overlay in overlays {
        match overlay {
            Overlay::Rectangle {
                top_left,
                bottom_right,
                color,
                thickness,
            } => {
                imgproc::rectangle_points(
                    img,
                    Point::new(top_left.0, top_left.1),
                    Point::new(bottom_right.0, bottom_right.1),
                    scalar(*color),
                    *thickness,
                    LINE_8,
                    0,
                )?;
            }
            Overlay::Label {
                text,
                origin,
                scale,
                color,
                thickness,
            } => {
                imgproc::put_text(
                    img,
                    text,
                    Point::new(origin.0, origin.1),
                    FONT_HERSHEY_SIMPLEX,
                    *scale,
                    scalar(*color),
                    *thickness,
                    LINE_4,
                    false,
                )?;
            }
        }
    }
    Ok(())
}

/// Produces the display copy of `frame` with every region boxed and labelled
pub fn annotate(frame: &Frame, regions: &[FaceRegion], label: Emotion) -> Result<Mat> {
    let mut img = to_display_mat(frame)?;
    draw_overlays(&mut img, &plan_overlays(regions, label))?;
    Ok(img)
}
