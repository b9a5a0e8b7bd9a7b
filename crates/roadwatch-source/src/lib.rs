//! roadwatch – frame source layer
//!
//! Wraps an OpenCV `VideoCapture` behind the [`FrameSource`] trait so the
//! rest of the pipeline never touches the decode backend directly.  A
//! [`VideoFile`] pulls decoded BGR frames from a file on disk and normalizes
//! them to a fixed display size; [`ScriptedSource`] replays a prepared frame
//! sequence for headless tests.
//!
//! End of stream is a value, not an error: `next_frame` yields `Ok(None)`
//! once the file is exhausted.

use log::debug;
use opencv::{core::Size, imgproc, prelude::*, videoio};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to open video file: {0}")]
    Open(String),
    #[error("decode backend error: {0}")]
    Backend(#[from] opencv::Error),
}

pub type Result<T> = std::result::Result<T, SourceError>;

/// Anything that can hand out decoded frames in sequence.
///
/// `Ok(None)` means the stream is exhausted and no further frames will come.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Mat>>;
}

/// Frame source backed by a video file on disk.
///
/// Every decoded frame is resized to `out_width` × `out_height` before being
/// handed out, so downstream drawing works in one fixed coordinate space.
#[derive(Debug)]
pub struct VideoFile {
    cap: videoio::VideoCapture,
    out_width: i32,
    out_height: i32,
}

impl VideoFile {
    pub const DEFAULT_WIDTH: i32 = 1280;
    pub const DEFAULT_HEIGHT: i32 = 720;

    /// Open `path` with the default 1280×720 output size.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_size(path, Self::DEFAULT_WIDTH, Self::DEFAULT_HEIGHT)
    }

    pub fn open_with_size<P: AsRef<Path>>(path: P, out_width: i32, out_height: i32) -> Result<Self> {
        let path = path.as_ref();
        let cap = videoio::VideoCapture::from_file(
            path.to_str().unwrap_or_default(),
            videoio::CAP_ANY,
        )?;
        if !cap.is_opened()? {
            return Err(SourceError::Open(path.display().to_string()));
        }
        debug!(
            "opened {} ({}x{} @ {:.1} fps)",
            path.display(),
            cap.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32,
            cap.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32,
            cap.get(videoio::CAP_PROP_FPS)?,
        );
        Ok(Self { cap, out_width, out_height })
    }

    /// Native frame rate as reported by the container, if any.
    pub fn fps(&self) -> Result<f64> {
        Ok(self.cap.get(videoio::CAP_PROP_FPS)?)
    }

    pub fn output_size(&self) -> (i32, i32) {
        (self.out_width, self.out_height)
    }
}

impl FrameSource for VideoFile {
    fn next_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        if !self.cap.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }
        let mut resized = Mat::default();
        imgproc::resize(
            &frame,
            &mut resized,
            Size::new(self.out_width, self.out_height),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;
        Ok(Some(resized))
    }
}

impl Drop for VideoFile {
    fn drop(&mut self) {
        let _ = self.cap.release();
    }
}

/// Replays a prepared frame sequence, then reports end of stream.
///
/// Test stand-in for [`VideoFile`] so the pipeline runs without a decoder
/// or a real file.
pub struct ScriptedSource {
    frames: std::collections::VecDeque<Mat>,
    served: usize,
}

impl ScriptedSource {
    pub fn new(frames: Vec<Mat>) -> Self {
        Self { frames: frames.into(), served: 0 }
    }

    /// Number of frames handed out so far.
    pub fn served(&self) -> usize {
        self.served
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<Mat>> {
        match self.frames.pop_front() {
            Some(f) => {
                self.served += 1;
                Ok(Some(f))
            }
            None => Ok(None),
        }
    }
}
