//! roadwatch – detection layer
//!
//! Backend-agnostic [`Detector`] trait plus a concrete [`TractYolo`]
//! implementation that runs a pretrained YOLOv8 ONNX network through Tract
//! (pure Rust, no C deps).  Frames go in as BGR `Mat`s straight from the
//! source layer; out comes a flat `Vec<Detection>` with pixel-space corner
//! boxes and class labels from the COCO table.
//!
//! The annotation layer treats the detector as opaque: swapping the network
//! or the engine only touches this crate.

use log::debug;
use opencv::{
    core::{Rect, Scalar, Size, CV_8UC3},
    imgproc,
    prelude::*,
};
use thiserror::Error;
use tract_onnx::prelude::*;

mod labels;
pub use labels::COCO_CLASSES;

const INPUT_SIZE: i32 = 640;
const CONF_THR: f32 = 0.25;
const IOU_THR: f32 = 0.45;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("model load or inference error: {0}")]
    Tract(#[from] TractError),
    #[error("frame preprocessing error: {0}")]
    Preprocess(#[from] opencv::Error),
    #[error("invalid output shape: expected [1, 84, N], got {0:?}")]
    InvalidOutputShape(Vec<usize>),
}

pub type Result<T> = std::result::Result<T, DetectError>;

/// A single detection: corner box `[x1,y1,x2,y2]` in source-frame pixels,
/// class label from the COCO table, confidence score.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: &'static str,
    pub bbox: [f32; 4],
    pub score: f32,
}

/// Trait for object detectors.
pub trait Detector {
    fn detect(&mut self, frame: &Mat) -> Result<Vec<Detection>>;
}

// ------------------------------------------------------------
// helpers: IoU • NMS
// ------------------------------------------------------------

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let ix1 = a[0].max(b[0]);
    let iy1 = a[1].max(b[1]);
    let ix2 = a[2].min(b[2]);
    let iy2 = a[3].min(b[3]);
    let iw = (ix2 - ix1).max(0.0);
    let ih = (iy2 - iy1).max(0.0);
    let inter = iw * ih;
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter + 1e-6)
}

fn non_max_suppression(mut dets: Vec<Detection>, iou_thr: f32) -> Vec<Detection> {
    dets.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut keep: Vec<Detection> = Vec::with_capacity(dets.len());
    'outer: for d in dets {
        for k in &keep {
            if iou(&d.bbox, &k.bbox) > iou_thr {
                continue 'outer;
            }
        }
        keep.push(d);
        if keep.len() >= 300 {
            break;
        }
    }
    keep
}

/// Tract-powered YOLOv8 detector over a fixed 640×640 input.
pub struct TractYolo {
    model: RunnableModel<TypedFact, Box<dyn TypedOp>, TypedModel>,
}

impl TractYolo {
    /// Load and optimize the ONNX model, preparing it for inference.
    pub fn new(model_path: &str) -> Result<Self> {
        let model = tract_onnx::onnx()
            .model_for_path(model_path)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec![1, 3, INPUT_SIZE as usize, INPUT_SIZE as usize]),
            )?
            .into_optimized()?
            .into_runnable()?;

        Ok(Self { model })
    }

    /// Aspect-preserving resize + gray padding into a 640×640 RGB square.
    /// Returns the padded image plus the scale and pad offsets needed to map
    /// boxes back to source-frame coordinates.
    fn letterbox(frame: &Mat) -> Result<(Mat, f32, i32, i32)> {
        let (orig_w, orig_h) = (frame.cols() as f32, frame.rows() as f32);

        let mut rgb = Mat::default();
        imgproc::cvt_color(frame, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

        let target = INPUT_SIZE as f32;
        let scale = (target / orig_h).min(target / orig_w);
        let new_w = (orig_w * scale).round() as i32;
        let new_h = (orig_h * scale).round() as i32;

        let mut resized = Mat::default();
        imgproc::resize(&rgb, &mut resized, Size::new(new_w, new_h), 0.0, 0.0, imgproc::INTER_LINEAR)?;

        let pad_x = (INPUT_SIZE - new_w) / 2;
        let pad_y = (INPUT_SIZE - new_h) / 2;

        let mut letter =
            Mat::new_rows_cols_with_default(INPUT_SIZE, INPUT_SIZE, CV_8UC3, Scalar::all(114.0))?;
        {
            let mut roi = letter.roi_mut(Rect::new(pad_x, pad_y, new_w, new_h))?;
            resized.copy_to(&mut roi)?;
        }

        Ok((letter, scale, pad_x, pad_y))
    }
}

impl Detector for TractYolo {
    fn detect(&mut self, frame: &Mat) -> Result<Vec<Detection>> {
        let (orig_w, orig_h) = (frame.cols() as f32, frame.rows() as f32);
        let (letter, scale, pad_x, pad_y) = Self::letterbox(frame)?;

        let bytes = letter.data_bytes()?;
        let side = INPUT_SIZE as usize;
        let tensor: Tensor =
            tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
                bytes[(y * side + x) * 3 + c] as f32 / 255.0
            })
            .into();

        let outputs = self.model.run(tvec![tensor.into()])?;
        let view = outputs[0].to_array_view::<f32>()?;

        // YOLOv8 head: [1, 4 + classes, anchors]
        let shape = view.shape().to_vec();
        if shape.len() != 3 || shape[1] != 4 + COCO_CLASSES.len() {
            return Err(DetectError::InvalidOutputShape(shape));
        }
        let view = view.index_axis(tract_ndarray::Axis(0), 0);
        let anchors = view.shape()[1];

        let mut dets = Vec::new();
        for a in 0..anchors {
            let scores = view.slice(tract_ndarray::s![4.., a]);
            let (best_cls, &conf) = scores
                .iter()
                .enumerate()
                .max_by(|x, y| x.1.partial_cmp(y.1).unwrap_or(std::cmp::Ordering::Equal))
                .expect("class axis is non-empty");
            if conf < CONF_THR {
                continue;
            }

            let cx = view[[0, a]];
            let cy = view[[1, a]];
            let w = view[[2, a]];
            let h = view[[3, a]];

            // letterbox space → source-frame pixels
            let x1 = ((cx - w / 2.0 - pad_x as f32) / scale).clamp(0.0, orig_w);
            let y1 = ((cy - h / 2.0 - pad_y as f32) / scale).clamp(0.0, orig_h);
            let x2 = ((cx + w / 2.0 - pad_x as f32) / scale).clamp(0.0, orig_w);
            let y2 = ((cy + h / 2.0 - pad_y as f32) / scale).clamp(0.0, orig_h);

            dets.push(Detection {
                label: COCO_CLASSES[best_cls],
                bbox: [x1, y1, x2, y2],
                score: conf,
            });
        }

        let kept = non_max_suppression(dets, IOU_THR);
        debug!("{} detections after nms", kept.len());
        Ok(kept)
    }
}

/// Returns a pre-scripted detection list per call; stands in for the
/// external model in tests.  Calls past the end of the script yield empty
/// frames.
pub struct ScriptedDetector {
    script: Vec<Vec<Detection>>,
    cursor: usize,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Vec<Detection>>) -> Self {
        Self { script, cursor: 0 }
    }
}

impl Detector for ScriptedDetector {
    fn detect(&mut self, _frame: &Mat) -> Result<Vec<Detection>> {
        let dets = self.script.get(self.cursor).cloned().unwrap_or_default();
        self.cursor += 1;
        Ok(dets)
    }
}
