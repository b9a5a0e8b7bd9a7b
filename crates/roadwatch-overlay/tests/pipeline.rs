//! Headless pipeline test: scripted source + scripted detector + annotator,
//! no decoder, no model, no window.

use opencv::core::{Scalar, Vec3b, CV_8UC3};
use opencv::prelude::*;
use roadwatch_detect::{Detection, Detector, ScriptedDetector};
use roadwatch_overlay::{Annotator, ClassColorMap, Color, FrameStats, Theme};
use roadwatch_source::{FrameSource, ScriptedSource};

const WIDTH: i32 = 1280;
const HEIGHT: i32 = 720;

fn blank_frame() -> Mat {
    Mat::new_rows_cols_with_default(HEIGHT, WIDTH, CV_8UC3, Scalar::all(0.0)).unwrap()
}

fn pixel(frame: &Mat, row: i32, col: i32) -> Color {
    let px: &Vec3b = frame.at_2d::<Vec3b>(row, col).unwrap();
    Color(px[0], px[1], px[2])
}

fn person(bbox: [f32; 4]) -> Detection {
    Detection { label: "person", bbox, score: 0.92 }
}

#[test]
fn ten_frame_synthetic_stream() {
    let mut source = ScriptedSource::new((0..10).map(|_| blank_frame()).collect());

    // one person on frames 1-5, nothing on frames 6-10
    let mut script: Vec<Vec<Detection>> = (0..5)
        .map(|_| vec![person([100.0, 100.0, 300.0, 300.0])])
        .collect();
    script.extend((0..5).map(|_| Vec::new()));
    let mut detector = ScriptedDetector::new(script);

    let annotator = Annotator::new(ClassColorMap::default(), Theme::from_name("dark"));
    let person_color = annotator.color_map().color_for("person");

    let mut frame_no = 0;
    while let Some(mut frame) = source.next_frame().unwrap() {
        frame_no += 1;
        let dets = detector.detect(&frame).unwrap();
        let stats = FrameStats::from_detections(&dets, 30.0);
        annotator.annotate(&mut frame, &dets, &stats).unwrap();

        let header = &stats.panel_lines()[0];
        if frame_no <= 5 {
            assert!(header.starts_with("Objects: 1 |"), "frame {frame_no}: {header}");
            // left edge of the box outline, clear of chip and panel
            assert_eq!(pixel(&frame, 200, 100), person_color, "frame {frame_no}");
        } else {
            assert!(header.starts_with("Objects: 0 |"), "frame {frame_no}: {header}");
            assert_eq!(pixel(&frame, 200, 100), Color(0, 0, 0), "frame {frame_no}");
        }

        // panel background is always painted
        assert_eq!(pixel(&frame, 25, 25), Theme::Dark.panel_bg(), "frame {frame_no}");
    }
    assert_eq!(frame_no, 10);
    assert_eq!(source.served(), 10);
}

#[test]
fn unmapped_label_is_drawn_in_fallback_color() {
    let mut frame = blank_frame();
    let dets = vec![Detection {
        label: "zebra",
        bbox: [400.0, 200.0, 600.0, 400.0],
        score: 0.5,
    }];
    let stats = FrameStats::from_detections(&dets, 15.0);

    let annotator = Annotator::new(ClassColorMap::default(), Theme::from_name("light"));
    annotator.annotate(&mut frame, &dets, &stats).unwrap();

    let fallback = annotator.color_map().fallback();
    assert_eq!(pixel(&frame, 300, 400), fallback);
    // counted and listed despite being unmapped
    assert_eq!(stats.panel_lines(), vec![
        "Objects: 1 |  FPS: 15.0 ".to_string(),
        "zebra: 1".to_string(),
    ]);
}

#[test]
fn zero_detection_frame_still_gets_a_panel() {
    let mut frame = blank_frame();
    let stats = FrameStats::from_detections(&[], 24.0);

    let annotator = Annotator::new(ClassColorMap::default(), Theme::from_name("light"));
    annotator.annotate(&mut frame, &[], &stats).unwrap();

    assert_eq!(pixel(&frame, 25, 25), Theme::Light.panel_bg());
    // header only: panel is one base row tall, nothing below it
    assert_eq!(pixel(&frame, 70, 25), Color(0, 0, 0));
}
