//! Box rendering for workers that only report coordinates.

use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::errors::DetectorError;
use super::{BoundingBox, Detection};

const PALETTE: [Rgb<u8>; 6] = [
    Rgb([255, 56, 56]),
    Rgb([255, 157, 151]),
    Rgb([255, 112, 31]),
    Rgb([72, 249, 10]),
    Rgb([0, 194, 255]),
    Rgb([146, 204, 23]),
];

/// Where the adapter writes its own rendering of `image_path`
pub fn rendered_path_for(output_dir: &Path, image_path: &Path) -> PathBuf {
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let extension = match image_path.extension().and_then(|e| e.to_str()) {
        Some(ext) if image::ImageFormat::from_extension(ext).is_some() => ext.to_string(),
        _ => "png".to_string(),
    };
    output_dir.join(format!("{stem}_annotated.{extension}"))
}

/// Draw every detection box onto a copy of `source` and save it at `destination`.
///
/// The source file is only read. Detections without a box are skipped.
pub fn render_annotations(
    source: &Path,
    detections: &[Detection],
    destination: &Path,
) -> Result<(), DetectorError> {
    let mut canvas = image::open(source)?.to_rgb8();
    let (width, height) = canvas.dimensions();
    let thickness = (width.min(height) / 200).max(2);

    let mut drawn = 0;
    for (i, detection) in detections.iter().enumerate() {
        if let Some(bbox) = detection.bbox {
            draw_box(&mut canvas, bbox, PALETTE[i % PALETTE.len()], thickness);
            drawn += 1;
        }
    }

    canvas.save(destination)?;
    debug!(boxes = drawn, destination = %destination.display(), "Rendered annotated image");
    Ok(())
}

fn draw_box(canvas: &mut RgbImage, bbox: BoundingBox, color: Rgb<u8>, thickness: u32) {
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let clamp = |v: f32, max: u32| -> u32 { v.max(0.0).min((max - 1) as f32) as u32 };
    let (x1, y1) = (clamp(bbox.x1, width), clamp(bbox.y1, height));
    let (x2, y2) = (clamp(bbox.x2, width), clamp(bbox.y2, height));

    for t in 0..thickness {
        let top = (y1 + t).min(y2);
        let bottom = y2.saturating_sub(t).max(y1);
        for x in x1..=x2 {
            canvas.put_pixel(x, top, color);
            canvas.put_pixel(x, bottom, color);
        }

        let left = (x1 + t).min(x2);
        let right = x2.saturating_sub(t).max(x1);
        for y in y1..=y2 {
            canvas.put_pixel(left, y, color);
            canvas.put_pixel(right, y, color);
        }
    }
}
