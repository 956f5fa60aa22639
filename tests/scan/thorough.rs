use crate::common::{detect_in, detected, payload, FnDetector};
use malslice::oracle::ScanClassification;
use malslice::scan::{scan_payload_thorough, window_bounds, ResultCode};

const STEP: usize = 8198;

#[test]
fn narrow_trigger_between_boundaries_is_skipped() {
    // No prefix boundary (8198, 16396, 20000) lands in [3000, 7000).
    let data = payload(20_000);
    let detector = FnDetector::new(detect_in(3000, 7000));
    let result = scan_payload_thorough(&detector, &data, STEP, 2).expect("scan");

    assert_eq!(detector.lens(), vec![8198, 16396, 20_000]);
    assert_eq!(result.result_code, ResultCode::NotDetected);
    assert!(result.regions.is_empty());
    assert_eq!(result.zero_x_bytes.as_ref().map(|b| b.len()), Some(20_000));
    assert_eq!(window_bounds(20_000, STEP), Some(3604..15901));
    assert_eq!(
        result.near_boundary_window.as_deref(),
        Some(&data[3604..15901])
    );
}

#[test]
fn single_region_closed_on_clean_prefix() {
    let data = payload(20_000);
    let detector = FnDetector::new(detect_in(8000, 16_000));
    let result = scan_payload_thorough(&detector, &data, STEP, 2).expect("scan");

    assert_eq!(result.result_code, ResultCode::ThreatDetected);
    assert_eq!(result.regions.len(), 1);
    let region = &result.regions[0];
    assert_eq!((region.start, region.end), (0, 8198));
    assert_eq!(&region.bytes[..], &data[..8198]);
    assert_eq!(result.threat_names.as_slice(), ["Trojan:Win32/Fixture"]);
    // a found region suppresses the fallback window
    assert!(result.near_boundary_window.is_none());
    assert!(result.zero_x_bytes.is_none());
}

#[test]
fn region_spanning_several_steps_keeps_first_start() {
    let data = payload(100);
    let detector = FnDetector::new(detect_in(30, 60));
    let result = scan_payload_thorough(&detector, &data, 10, 2).expect("scan");

    assert_eq!(result.regions.len(), 1);
    assert_eq!((result.regions[0].start, result.regions[0].end), (20, 50));
}

#[test]
fn stops_after_two_regions() {
    let data = payload(100);
    let detector = FnDetector::new(|len| match len {
        20 | 30 | 50 | 80 => detected(&format!("Threat.{len}")),
        _ => ScanClassification::NotDetected,
    });
    let result = scan_payload_thorough(&detector, &data, 10, 2).expect("scan");

    assert_eq!(detector.lens(), vec![10, 20, 30, 40, 50, 60]);
    let bounds: Vec<_> = result.regions.iter().map(|r| (r.start, r.end)).collect();
    assert_eq!(bounds, vec![(10, 30), (40, 50)]);
    assert_eq!(
        result.threat_names.as_slice(),
        ["Threat.20", "Threat.30", "Threat.50"]
    );
    assert_eq!(result.regions_base64().len(), 2);
}

#[test]
fn region_bounds_sit_on_step_grid() {
    let len = 1000;
    let step = 64;
    let data = payload(len);
    let detector = FnDetector::new(|l| {
        if (200..400).contains(&l) || (700..1000).contains(&l) {
            detected("G")
        } else {
            ScanClassification::NotDetected
        }
    });
    let result = scan_payload_thorough(&detector, &data, step, 2).expect("scan");

    assert_eq!(result.regions.len(), 2);
    for r in &result.regions {
        assert!(r.start < r.end && r.end <= len);
        assert_eq!(r.start % step, 0);
        assert!(r.end % step == 0 || r.end == len - step);
    }
}

#[test]
fn errors_do_not_move_the_state_machine() {
    let data = payload(60);
    let detector = FnDetector::new(|len| match len {
        10 => ScanClassification::NotDetected,
        20 => detected("E"),
        30 | 40 => ScanClassification::Error,
        50 => ScanClassification::TimedOut,
        _ => ScanClassification::NotDetected,
    });
    let result = scan_payload_thorough(&detector, &data, 10, 2).expect("scan");
    assert_eq!(result.regions.len(), 1);
    assert_eq!((result.regions[0].start, result.regions[0].end), (10, 50));
}

#[test]
fn open_region_without_close_falls_back_to_window() {
    let data = payload(30_000);
    let detector = FnDetector::new(|len| {
        if len >= 16_000 {
            detected("Trojan:Win32/Open")
        } else {
            ScanClassification::NotDetected
        }
    });
    let result = scan_payload_thorough(&detector, &data, STEP, 2).expect("scan");

    assert_eq!(result.result_code, ResultCode::NotDetected);
    assert!(result.regions.is_empty());
    assert!(result.near_boundary_window.is_some());
    assert_eq!(result.threat_names.as_slice(), ["Trojan:Win32/Open"]);
}

#[test]
fn empty_payload_scans_nothing() {
    let detector = FnDetector::new(|_| detected("never"));
    let result = scan_payload_thorough(&detector, &bytes::Bytes::new(), STEP, 2).expect("scan");
    assert!(detector.calls().is_empty());
    assert_eq!(result.result_code, ResultCode::NotDetected);
    assert!(result.near_boundary_window.is_none());
}

#[test]
fn scratch_directory_removed_after_region_bound() {
    let data = payload(100);
    let detector = FnDetector::new(|len| match len {
        20 | 50 => detected("S"),
        _ => ScanClassification::NotDetected,
    });
    scan_payload_thorough(&detector, &data, 10, 2).expect("scan");
    let calls = detector.calls();
    let dir = calls[0].path.parent().unwrap().to_path_buf();
    assert!(!dir.exists());
}
