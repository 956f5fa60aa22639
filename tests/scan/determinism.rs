use crate::common::{detect_in, detected, payload, FnDetector};
use malslice::oracle::ScanClassification;
use malslice::scan::{scan_payload_chunked, scan_payload_thorough};

#[test]
fn chunked_results_are_stable_across_runs() {
    let data = payload(12_345);
    let classify = |len: usize| {
        if len >= 7000 {
            ScanClassification::Detected {
                threat_names: vec!["B".into(), "A".into(), "B".into()],
            }
        } else {
            ScanClassification::NotDetected
        }
    };

    let a = scan_payload_chunked(&FnDetector::new(classify), &data, 1024).expect("run 1");
    let b = scan_payload_chunked(&FnDetector::new(classify), &data, 1024).expect("run 2");
    assert_eq!(a, b);
    assert_eq!(a.threat_names.as_slice(), ["B", "A"]);
    assert_eq!(a.zero_x_base64(), b.zero_x_base64());
    assert_eq!(a.near_boundary_base64(), b.near_boundary_base64());
}

#[test]
fn thorough_results_are_stable_across_runs() {
    let data = payload(50_000);
    let classify = |len: usize| match len {
        l if (8198..16_396).contains(&l) => detected("R1"),
        l if (24_594..40_990).contains(&l) => detected("R2"),
        _ => ScanClassification::NotDetected,
    };

    let a = scan_payload_thorough(&FnDetector::new(classify), &data, 8198, 2).expect("run 1");
    let b = scan_payload_thorough(&FnDetector::new(classify), &data, 8198, 2).expect("run 2");
    assert_eq!(a, b);
    assert_eq!(a.regions_base64(), b.regions_base64());
    let bounds: Vec<_> = a.regions.iter().map(|r| (r.start, r.end)).collect();
    assert_eq!(bounds, vec![(0, 8198), (16_396, 32_792)]);
}

#[test]
fn fallback_window_is_stable_across_runs() {
    let data = payload(20_000);
    let a = scan_payload_thorough(&FnDetector::new(detect_in(3000, 7000)), &data, 8198, 2)
        .expect("run 1");
    let b = scan_payload_thorough(&FnDetector::new(detect_in(3000, 7000)), &data, 8198, 2)
        .expect("run 2");
    assert_eq!(a.near_boundary_window, b.near_boundary_window);
    assert!(a.near_boundary_window.is_some());
}
