// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Plate verification pipeline tests
//!
//! These tests verify that PlateVerifier:
//! - Skips detection entirely when no photo is supplied
//! - Degrades to "no detection" on corrupt photos, detector failures and panics
//! - Uses the first candidate with legible text and ignores later ones
//! - Normalizes both plates and applies the tolerant containment match
//!
//! Detector and recognizer are mocked; no ONNX models are required.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use entry_shield::vision::plate::{
    BoundingBox, DetectionCandidate, PlateLocalizer, PlateVerifier, RecognizedText,
    TextRecognizer, VerificationError, VerificationResult, VerifierConfig,
};
use image::{ImageFormat, RgbImage};
use mockall::{mock, Sequence};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Localizer {}

    impl PlateLocalizer for Localizer {
        fn detect(
            &self,
            image: &RgbImage,
            min_confidence: f32,
        ) -> Result<Vec<DetectionCandidate>, VerificationError>;

        fn name(&self) -> &'static str;
    }
}

mock! {
    pub Recognizer {}

    impl TextRecognizer for Recognizer {
        fn recognize(&self, region: &RgbImage) -> Result<Vec<RecognizedText>, VerificationError>;

        fn name(&self) -> &'static str;
    }
}

/// Helper: base64 data URL of a blank 320x160 PNG
fn photo() -> String {
    let mut buf = Vec::new();
    RgbImage::new(320, 160)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    format!("data:image/png;base64,{}", STANDARD.encode(buf))
}

fn candidate(x1: f32, confidence: f32) -> DetectionCandidate {
    DetectionCandidate::new(BoundingBox::new(x1, 40.0, x1 + 100.0, 80.0), confidence)
}

fn localizer_returning(candidates: Vec<DetectionCandidate>) -> MockLocalizer {
    let mut localizer = MockLocalizer::new();
    localizer
        .expect_detect()
        .returning(move |_, _| Ok(candidates.clone()));
    localizer.expect_name().return_const("mock-localizer");
    localizer
}

fn recognizer_reading(text: &'static str) -> MockRecognizer {
    let mut recognizer = MockRecognizer::new();
    recognizer
        .expect_recognize()
        .returning(move |_| Ok(vec![RecognizedText::new(text, 0.9)]));
    recognizer.expect_name().return_const("mock-recognizer");
    recognizer
}

fn verifier(localizer: MockLocalizer, recognizer: MockRecognizer) -> PlateVerifier {
    PlateVerifier::new(
        Arc::new(localizer),
        Arc::new(recognizer),
        VerifierConfig::default(),
    )
}

#[test]
fn test_no_image_skips_detection() {
    let mut localizer = MockLocalizer::new();
    localizer.expect_detect().times(0);
    localizer.expect_name().return_const("mock-localizer");
    let mut recognizer = MockRecognizer::new();
    recognizer.expect_recognize().times(0);
    recognizer.expect_name().return_const("mock-recognizer");

    let result = verifier(localizer, recognizer).verify(None, Some("KA01AB1234"));

    assert_eq!(result.detected_plate, "");
    assert!(!result.is_match);
}

#[test]
fn test_zero_candidates() {
    let mut recognizer = MockRecognizer::new();
    recognizer.expect_recognize().times(0);
    recognizer.expect_name().return_const("mock-recognizer");

    let result =
        verifier(localizer_returning(Vec::new()), recognizer).verify(Some(photo().as_str()), Some("KA01AB1234"));

    assert_eq!(result, VerificationResult::no_detection());
}

#[test]
fn test_corrupt_payload_does_not_raise() {
    let mut localizer = MockLocalizer::new();
    localizer.expect_detect().times(0);
    localizer.expect_name().return_const("mock-localizer");

    let v = verifier(localizer, recognizer_reading("KA01AB1234"));

    for payload in [
        "data:image/png;base64,not-an-image",
        "%%%%",
        "",
        "data:image/jpeg;base64,",
        "data:image/png;base64,AAAAAAAAAAAA",
    ] {
        let result = v.verify(Some(payload), Some("KA01AB1234"));
        assert_eq!(result, VerificationResult::no_detection(), "payload {:?}", payload);
    }
}

#[test]
fn test_exact_plate_with_separators_matches() {
    let v = verifier(
        localizer_returning(vec![candidate(10.0, 0.9)]),
        recognizer_reading("KA01AB1234"),
    );

    let result = v.verify(Some(photo().as_str()), Some("KA-01-AB-1234"));

    assert_eq!(result.detected_plate, "KA01AB1234");
    assert!(result.is_match);
}

#[test]
fn test_partial_read_matches() {
    let v = verifier(
        localizer_returning(vec![candidate(10.0, 0.9)]),
        recognizer_reading("AB1234"),
    );

    let result = v.verify(Some(photo().as_str()), Some("KA01AB1234"));

    assert_eq!(result.detected_plate, "AB1234");
    assert!(result.is_match);
}

#[test]
fn test_different_plate_does_not_match() {
    let v = verifier(
        localizer_returning(vec![candidate(10.0, 0.9)]),
        recognizer_reading("XY9999"),
    );

    let result = v.verify(Some(photo().as_str()), Some("KA01AB1234"));

    assert_eq!(result.detected_plate, "XY9999");
    assert!(!result.is_match);
}

#[test]
fn test_missing_declared_plate_never_matches() {
    let v = verifier(
        localizer_returning(vec![candidate(10.0, 0.9)]),
        recognizer_reading("KA01AB1234"),
    );

    for declared in [None, Some(""), Some("   ")] {
        let result = v.verify(Some(photo().as_str()), declared);
        assert_eq!(result.detected_plate, "KA01AB1234");
        assert!(!result.is_match);
    }
}

#[test]
fn test_detected_plate_is_normalized() {
    let v = verifier(
        localizer_returning(vec![candidate(10.0, 0.9)]),
        recognizer_reading("ka 01 ab 1234"),
    );

    let result = v.verify(Some(photo().as_str()), None);

    assert_eq!(result.detected_plate, "KA01AB1234");
}

#[test]
fn test_first_legible_candidate_short_circuits() {
    let mut recognizer = MockRecognizer::new();
    recognizer
        .expect_recognize()
        .times(1)
        .returning(|_| Ok(vec![RecognizedText::new("KA01AB1234", 0.5)]));
    recognizer.expect_name().return_const("mock-recognizer");

    // Second candidate has higher confidence but is never read
    let v = verifier(
        localizer_returning(vec![candidate(10.0, 0.4), candidate(200.0, 0.99)]),
        recognizer,
    );

    let result = v.verify(Some(photo().as_str()), Some("KA01AB1234"));
    assert_eq!(result.detected_plate, "KA01AB1234");
    assert!(result.is_match);
}

#[test]
fn test_output_equals_first_candidate_only() {
    let two_candidates = verifier(
        localizer_returning(vec![candidate(10.0, 0.9), candidate(200.0, 0.9)]),
        recognizer_reading("MH12DE1433"),
    );
    let one_candidate = verifier(
        localizer_returning(vec![candidate(10.0, 0.9)]),
        recognizer_reading("MH12DE1433"),
    );

    let payload = photo();
    assert_eq!(
        two_candidates.verify(Some(payload.as_str()), Some("MH12DE1433")),
        one_candidate.verify(Some(payload.as_str()), Some("MH12DE1433"))
    );
}

#[test]
fn test_recognition_failure_moves_to_next_candidate() {
    let mut seq = Sequence::new();
    let mut recognizer = MockRecognizer::new();
    recognizer
        .expect_recognize()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Err(VerificationError::Recognition("blurred".to_string())));
    recognizer
        .expect_recognize()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(vec![RecognizedText::new("DL3CAB1234", 0.8)]));
    recognizer.expect_name().return_const("mock-recognizer");

    let v = verifier(
        localizer_returning(vec![candidate(10.0, 0.9), candidate(200.0, 0.8)]),
        recognizer,
    );

    let result = v.verify(Some(photo().as_str()), Some("DL 3C AB 1234"));
    assert_eq!(result.detected_plate, "DL3CAB1234");
    assert!(result.is_match);
}

#[test]
fn test_detection_failure_is_no_detection() {
    let mut localizer = MockLocalizer::new();
    localizer
        .expect_detect()
        .returning(|_, _| Err(VerificationError::Detection("session crashed".to_string())));
    localizer.expect_name().return_const("mock-localizer");
    let mut recognizer = MockRecognizer::new();
    recognizer.expect_recognize().times(0);
    recognizer.expect_name().return_const("mock-recognizer");

    let result = verifier(localizer, recognizer).verify(Some(photo().as_str()), Some("KA01AB1234"));

    assert_eq!(result, VerificationResult::no_detection());
}

#[test]
fn test_degenerate_candidates_are_skipped() {
    let mut recognizer = MockRecognizer::new();
    recognizer.expect_recognize().times(0);
    recognizer.expect_name().return_const("mock-recognizer");

    let outside = DetectionCandidate::new(BoundingBox::new(400.0, 0.0, 500.0, 50.0), 0.9);
    let inverted = DetectionCandidate::new(BoundingBox::new(100.0, 100.0, 50.0, 50.0), 0.9);
    let v = verifier(localizer_returning(vec![outside, inverted]), recognizer);

    let result = v.verify(Some(photo().as_str()), Some("KA01AB1234"));
    assert_eq!(result, VerificationResult::no_detection());
}

#[test]
fn test_threshold_passed_to_localizer() {
    let mut localizer = MockLocalizer::new();
    localizer
        .expect_detect()
        .withf(|_, min_confidence| (*min_confidence - 0.6).abs() < 1e-6)
        .times(1)
        .returning(|_, _| Ok(Vec::new()));
    localizer.expect_name().return_const("mock-localizer");

    let v = PlateVerifier::new(
        Arc::new(localizer),
        Arc::new(recognizer_reading("AB")),
        VerifierConfig {
            confidence_threshold: 0.6,
            timeout: None,
        },
    );

    v.verify(Some(photo().as_str()), None);
}

struct SlowRecognizer;

impl TextRecognizer for SlowRecognizer {
    fn recognize(&self, _region: &RgbImage) -> Result<Vec<RecognizedText>, VerificationError> {
        std::thread::sleep(Duration::from_millis(500));
        Ok(vec![RecognizedText::new("KA01AB1234", 0.9)])
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

#[tokio::test]
async fn test_async_timeout_is_no_detection() {
    let v = Arc::new(PlateVerifier::new(
        Arc::new(localizer_returning(vec![candidate(10.0, 0.9)])),
        Arc::new(SlowRecognizer),
        VerifierConfig {
            timeout: Some(Duration::from_millis(20)),
            ..VerifierConfig::default()
        },
    ));

    let result = v
        .verify_async(Some(photo()), Some("KA01AB1234".to_string()))
        .await;

    assert_eq!(result, VerificationResult::no_detection());
}

#[tokio::test]
async fn test_async_without_timeout_completes() {
    let v = Arc::new(PlateVerifier::new(
        Arc::new(localizer_returning(vec![candidate(10.0, 0.9)])),
        Arc::new(SlowRecognizer),
        VerifierConfig {
            timeout: None,
            ..VerifierConfig::default()
        },
    ));

    let result = v
        .verify_async(Some(photo()), Some("KA01AB1234".to_string()))
        .await;

    assert!(result.is_match);
}
