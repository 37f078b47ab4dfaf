use nozzle_align_blob::{stage_color, BlobCascadeDetector, CascadeParams};
use nozzle_align_core::{BlobLocator, Frame, Rgb};

const BG: Rgb = Rgb([220, 220, 220]);
const NOZZLE: Rgb = Rgb([20, 20, 20]);

fn frame_with_disks(w: usize, h: usize, disks: &[(i64, i64, i64)]) -> Frame {
    let mut frame = Frame::filled(w, h, BG);
    {
        let mut px = frame.pixels_mut();
        for &(cx, cy, r) in disks {
            for y in cy - r..=cy + r {
                for x in cx - r..=cx + r {
                    if (x - cx).pow(2) + (y - cy).pow(2) <= r * r {
                        px.put(x, y, NOZZLE);
                    }
                }
            }
        }
    }
    frame
}

#[test]
fn clear_disk_is_found_by_strictest_stage() {
    let frame = frame_with_disks(320, 240, &[(160, 120, 13)]);
    let detector = BlobCascadeDetector::new(CascadeParams::default());
    let report = detector.detect_with_report(&frame);

    let hit = report.detection.expect("nozzle should be detected");
    assert_eq!(hit.stage, 0);
    assert_eq!(report.stage_counts, vec![1]);
    assert!((hit.blob.x - 160.0).abs() <= 1.0);
    assert!((hit.blob.y - 120.0).abs() <= 1.0);
    assert_eq!(hit.blob.x.fract(), 0.0);
    assert_eq!(hit.blob.y.fract(), 0.0);
}

#[test]
fn two_equal_disks_are_not_a_detection() {
    let frame = frame_with_disks(320, 240, &[(100, 120, 13), (230, 120, 13)]);
    let detector = BlobCascadeDetector::new(CascadeParams {
        center_tie_break: false,
        ..CascadeParams::default()
    });
    let report = detector.detect_with_report(&frame);

    assert!(report.detection.is_none());
    assert_eq!(report.stage_counts.len(), 5);
    assert!(report.stage_counts.iter().all(|&n| n != 1));
    assert_eq!(report.stage_counts[4], 2);
}

#[test]
fn last_stage_tie_break_prefers_blob_nearest_center() {
    let frame = frame_with_disks(320, 240, &[(100, 120, 13), (230, 120, 13)]);
    let detector = BlobCascadeDetector::new(CascadeParams::default());

    let hit = detector.detect(&frame).expect("tie-break should pick one");
    assert_eq!(hit.stage, 4);
    assert!((hit.blob.x - 100.0).abs() <= 1.0);
    assert!((hit.blob.y - 120.0).abs() <= 1.0);
}

#[test]
fn blank_frame_yields_nothing() {
    let frame = Frame::filled(320, 240, Rgb::WHITE);
    let detector = BlobCascadeDetector::default();
    assert!(detector.locate(&frame).is_none());

    let (blob, annotated) = detector.locate_annotated(&frame);
    assert!(blob.is_none());
    let annotated = annotated.expect("overlay");
    assert_eq!(annotated.size(), frame.size());
    assert_eq!(annotated.pixel(160, 0), Rgb::WHITE);
    assert_eq!(annotated.pixel(159, 0), Rgb::BLACK);
}

#[test]
fn larger_disks_fall_through_to_later_stages() {
    let detector = BlobCascadeDetector::default();

    let mid = detector.detect_with_report(&frame_with_disks(320, 240, &[(160, 120, 20)]));
    let hit = mid.detection.expect("radius 20 disk");
    assert_eq!(hit.stage, 1);
    assert_eq!(mid.stage_counts.len(), 2);
    assert_ne!(mid.stage_counts[0], 1);

    let big = detector.detect_with_report(&frame_with_disks(320, 240, &[(160, 120, 30)]));
    let hit = big.detection.expect("radius 30 disk");
    assert_eq!(hit.stage, 3);
    assert_eq!(big.stage_counts.len(), 4);
    assert!(big.stage_counts[..3].iter().all(|&n| n != 1));
    assert!((hit.blob.x - 160.0).abs() <= 1.0);
    assert!((hit.blob.y - 120.0).abs() <= 1.0);
}

#[test]
fn preview_is_filled_with_the_matching_stage_color() {
    let frame = frame_with_disks(320, 240, &[(160, 120, 20)]);
    let detector = BlobCascadeDetector::default();

    let (blob, annotated) = detector.locate_annotated(&frame);
    assert!(blob.is_some());
    let annotated = annotated.expect("overlay");

    // Inside the disk, away from both crosshairs and the outline.
    let fill = stage_color(1);
    let expected: Vec<u8> = fill
        .0
        .iter()
        .map(|&c| (0.4 * c as f32 + 0.6 * NOZZLE.0[0] as f32).round() as u8)
        .collect();
    assert_eq!(annotated.pixel(168, 126).0.to_vec(), expected);
}
