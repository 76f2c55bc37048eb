// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Normalization tests
//!
//! Engine-native detections from either engine come out as canonical
//! `Detection` records with a 0-1 confidence and plain `[x, y]` corners.

use ndarray::{ArrayD, IxDyn};
use ocr_service::vision::ocr::{
    normalize, normalize_all, EngineKind, OcrError, RawConfidence, RawDetection, RawValue,
};

#[cfg(test)]
mod normalization_tests {
    use super::*;

    /// Test 1: a detector tensor becomes four corner points
    #[test]
    fn test_tensor_bounding_box() {
        let tensor = ArrayD::from_shape_vec(
            IxDyn(&[4, 2]),
            vec![1.0, 2.0, 31.0, 2.0, 31.0, 14.0, 1.0, 14.0],
        )
        .unwrap();
        let raw = RawDetection::new("TOTAL", RawConfidence::Unit(0.91))
            .with_bounding_box(RawValue::Tensor(tensor));

        let detection = normalize(EngineKind::Library, raw).unwrap();

        assert_eq!(
            detection.bounding_box.unwrap().points(),
            &[[1.0, 2.0], [31.0, 2.0], [31.0, 14.0], [1.0, 14.0]]
        );
        let position = detection.position().unwrap();
        assert_eq!(position.x, 1.0);
        assert_eq!(position.y, 8.0);
    }

    /// Test 2: integer corners inside tuples are accepted
    #[test]
    fn test_integer_tuple_bounding_box() {
        let corner = |x: i64, y: i64| RawValue::Tuple(vec![RawValue::Int(x), RawValue::Int(y)]);
        let raw = RawDetection::new("7", RawConfidence::Unit(0.5)).with_bounding_box(
            RawValue::Sequence(vec![corner(0, 0), corner(10, 0), corner(10, 10), corner(0, 10)]),
        );

        let detection = normalize(EngineKind::Library, raw).unwrap();

        assert_eq!(detection.bounding_box.unwrap().points()[2], [10.0, 10.0]);
    }

    /// Test 3: confidences from every scale land in 0-1
    #[test]
    fn test_confidence_scales() {
        let raw = vec![
            RawDetection::new("a", RawConfidence::Percent(87.5)),
            RawDetection::new("b", RawConfidence::Unit(1.4)),
            RawDetection::new("c", RawConfidence::Unit(-0.2)),
            RawDetection::new("d", RawConfidence::Fixed),
        ];

        let detections = normalize_all(EngineKind::Local, raw).unwrap();
        let confidences: Vec<f64> = detections.iter().map(|d| d.confidence).collect();

        assert!((confidences[0] - 0.875).abs() < 1e-9);
        assert_eq!(confidences[1], 1.0);
        assert_eq!(confidences[2], 0.0);
        assert_eq!(confidences[3], 1.0);
        assert!(detections.iter().all(|d| d.bounding_box.is_none()));
    }

    /// Test 4: one malformed record fails the whole result
    #[test]
    fn test_malformed_record_fails_batch() {
        let raw = vec![
            RawDetection::new("ok", RawConfidence::Unit(0.9)),
            RawDetection::new("bad", RawConfidence::Unit(0.9))
                .with_bounding_box(RawValue::Text("0,0,1,1".to_string())),
        ];

        let err = normalize_all(EngineKind::Library, raw).unwrap_err();

        assert!(matches!(err, OcrError::Inference(_)));
    }

    /// Test 5: text is passed through untouched
    #[test]
    fn test_text_preserved() {
        let raw = RawDetection::new("  Ünïcødé 42 ", RawConfidence::Fixed);

        let detection = normalize(EngineKind::Local, raw).unwrap();

        assert_eq!(detection.text, "  Ünïcødé 42 ");
    }
}
