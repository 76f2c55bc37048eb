// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR endpoint tests for POST /ocr and POST /api/ocr
//!
//! Requests go through the full router: multipart extraction, validation,
//! upload staging, engine resolution, normalization and the error mapping.

use super::support::*;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use ocr_service::config::ServiceConfig;
use ocr_service::vision::ocr::{EngineKind, LocalModelLoader, RawConfidence, RawDetection};
use std::sync::Arc;
use tempfile::TempDir;

#[cfg(test)]
mod ocr_endpoint_tests {
    use super::*;

    /// Test 1: lines layout groups HELLO and WORLD into one line
    #[tokio::test]
    async fn test_lines_layout_groups_words_on_one_line() {
        let uploads = TempDir::new().unwrap();
        let stub = StubRecognizer::new(EngineKind::Library, hello_world());
        let app = app(Some(stub.clone()), Arc::new(MissingLocalModel), test_config(&uploads));

        let png = png_bytes();
        let request = ocr_request(
            "/ocr",
            &[
                Part::File {
                    field: "file",
                    filename: "hello.png",
                    bytes: &png,
                },
                Part::Text {
                    field: "engine",
                    value: "easyocr",
                },
                Part::Text {
                    field: "layout",
                    value: "lines",
                },
            ],
        );
        let (status, json) = send(app, request).await;

        assert_eq!(status, StatusCode::OK, "unexpected body: {}", json);
        assert_eq!(json["success"], true);
        assert_eq!(json["engine"], "easyocr");

        let lines = json["lines"].as_array().unwrap();
        assert_eq!(lines.len(), 1);
        let texts: Vec<&str> = lines[0]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["text"].as_str().unwrap())
            .collect();
        assert_eq!(texts, vec!["HELLO", "WORLD"]);

        let hello = &lines[0][0];
        assert_eq!(hello["position"]["x"], 10.0);
        assert_eq!(hello["position"]["y"], 100.0);
        assert!((hello["confidence"].as_f64().unwrap() - 0.97).abs() < 1e-6);

        assert_eq!(stub.calls(), 1);
        assert!(dir_is_empty(uploads.path()), "upload was not removed");
    }

    /// Test 2: flat layout is the default and keeps engine order
    #[tokio::test]
    async fn test_flat_layout_is_default() {
        let uploads = TempDir::new().unwrap();
        let stub = StubRecognizer::new(EngineKind::Library, hello_world());
        let app = app(Some(stub), Arc::new(MissingLocalModel), test_config(&uploads));

        let png = png_bytes();
        let request = ocr_request(
            "/api/ocr",
            &[Part::File {
                field: "file",
                filename: "hello.png",
                bytes: &png,
            }],
        );
        let (status, json) = send(app, request).await;

        assert_eq!(status, StatusCode::OK, "unexpected body: {}", json);
        assert!(json.get("lines").is_none());
        let result = json["result"].as_array().unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0]["text"], "WORLD");
        assert_eq!(result[1]["text"], "HELLO");

        let bbox = result[1]["bbox"].as_array().unwrap();
        assert_eq!(bbox.len(), 4);
        assert_eq!(bbox[0], serde_json::json!([10.0, 95.0]));
        assert_eq!(bbox[2], serde_json::json!([50.0, 105.0]));
    }

    /// Test 3: the `image` field is accepted in place of `file`
    #[tokio::test]
    async fn test_image_field_alias() {
        let uploads = TempDir::new().unwrap();
        let stub = StubRecognizer::new(EngineKind::Library, hello_world());
        let app = app(Some(stub.clone()), Arc::new(MissingLocalModel), test_config(&uploads));

        let png = png_bytes();
        let request = ocr_request(
            "/ocr",
            &[Part::File {
                field: "image",
                filename: "scan.PNG",
                bytes: &png,
            }],
        );
        let (status, _) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(stub.calls(), 1);
    }

    /// Test 4: disallowed extension is rejected before anything is stored
    #[tokio::test]
    async fn test_invalid_file_type_rejected() {
        let uploads = TempDir::new().unwrap();
        let stub = StubRecognizer::new(EngineKind::Library, hello_world());
        let app = app(Some(stub.clone()), Arc::new(MissingLocalModel), test_config(&uploads));

        let request = ocr_request(
            "/ocr",
            &[Part::File {
                field: "file",
                filename: "notes.txt",
                bytes: b"plain text",
            }],
        );
        let (status, json) = send(app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, serde_json::json!({ "error": "Invalid file type" }));
        assert_eq!(stub.calls(), 0);
        assert!(dir_is_empty(uploads.path()));
    }

    /// Test 5: a form without a file part never reaches the engine
    #[tokio::test]
    async fn test_missing_file_part() {
        let uploads = TempDir::new().unwrap();
        let stub = StubRecognizer::new(EngineKind::Library, hello_world());
        let app = app(Some(stub.clone()), Arc::new(MissingLocalModel), test_config(&uploads));

        let request = ocr_request(
            "/ocr",
            &[Part::Text {
                field: "engine",
                value: "easyocr",
            }],
        );
        let (status, json) = send(app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, serde_json::json!({ "error": "No file part" }));
        assert_eq!(stub.calls(), 0);
    }

    /// Test 6: an empty filename is reported separately from a missing part
    #[tokio::test]
    async fn test_empty_filename() {
        let uploads = TempDir::new().unwrap();
        let stub = StubRecognizer::new(EngineKind::Library, hello_world());
        let app = app(Some(stub.clone()), Arc::new(MissingLocalModel), test_config(&uploads));

        let request = ocr_request(
            "/ocr",
            &[Part::File {
                field: "file",
                filename: "",
                bytes: b"",
            }],
        );
        let (status, json) = send(app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No selected file");
        assert_eq!(stub.calls(), 0);
    }

    /// Test 7: unknown engine names are rejected with the supported list
    #[tokio::test]
    async fn test_unknown_engine_rejected() {
        let uploads = TempDir::new().unwrap();
        let stub = StubRecognizer::new(EngineKind::Library, hello_world());
        let app = app(Some(stub.clone()), Arc::new(MissingLocalModel), test_config(&uploads));

        let png = png_bytes();
        let request = ocr_request(
            "/ocr",
            &[
                Part::File {
                    field: "file",
                    filename: "a.png",
                    bytes: &png,
                },
                Part::Text {
                    field: "engine",
                    value: "tesseract",
                },
            ],
        );
        let (status, json) = send(app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error = json["error"].as_str().unwrap();
        assert!(error.contains("tesseract"), "got: {}", error);
        assert!(error.contains("easyocr"), "got: {}", error);
        assert_eq!(stub.calls(), 0);
        assert!(dir_is_empty(uploads.path()));
    }

    /// Test 8: local engine with config but no weights fails cleanly
    #[tokio::test]
    async fn test_local_engine_missing_weights() {
        let uploads = TempDir::new().unwrap();
        let models = TempDir::new().unwrap();
        std::fs::write(
            models.path().join("model_config.toml"),
            "[model]\nweights = \"missing.onnx\"\ninput_size = [32, 100]\nnum_classes = 37\n",
        )
        .unwrap();

        let loader = Arc::new(LocalModelLoader::new(models.path()));
        let app = app(None, loader, test_config(&uploads));

        let png = png_bytes();
        let request = ocr_request(
            "/ocr",
            &[
                Part::File {
                    field: "file",
                    filename: "digits.png",
                    bytes: &png,
                },
                Part::Text {
                    field: "engine",
                    value: "local",
                },
            ],
        );
        let (status, json) = send(app, request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let error = json["error"].as_str().unwrap();
        assert!(error.starts_with("Model load error"), "got: {}", error);
        assert!(error.contains("missing.onnx"), "got: {}", error);
        assert!(dir_is_empty(uploads.path()), "upload left behind");
    }

    /// Test 9: local engine without a config file is a configuration error
    #[tokio::test]
    async fn test_local_engine_missing_config() {
        let uploads = TempDir::new().unwrap();
        let models = TempDir::new().unwrap();
        let loader = Arc::new(LocalModelLoader::new(models.path()));
        let app = app(None, loader, test_config(&uploads));

        let png = png_bytes();
        let request = ocr_request(
            "/ocr",
            &[
                Part::File {
                    field: "file",
                    filename: "digits.png",
                    bytes: &png,
                },
                Part::Text {
                    field: "engine",
                    value: "local",
                },
            ],
        );
        let (status, json) = send(app, request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let error = json["error"].as_str().unwrap();
        assert!(error.contains("Config file not found"), "got: {}", error);
    }

    /// Test 10: the local engine is loaded once and reused across requests
    #[tokio::test]
    async fn test_local_engine_loaded_once() {
        let uploads = TempDir::new().unwrap();
        let local = StubRecognizer::new(
            EngineKind::Local,
            vec![RawDetection::new("42", RawConfidence::Fixed)],
        );
        let loader = StubLoader::new(local.clone());
        let app = app(None, loader.clone(), test_config(&uploads));

        let png = png_bytes();
        for _ in 0..2 {
            let request = ocr_request(
                "/ocr",
                &[
                    Part::File {
                        field: "file",
                        filename: "digits.bmp",
                        bytes: &png,
                    },
                    Part::Text {
                        field: "engine",
                        value: "local",
                    },
                ],
            );
            let (status, json) = send(app.clone(), request).await;
            assert_eq!(status, StatusCode::OK, "unexpected body: {}", json);
            assert_eq!(json["engine"], "local");
            assert_eq!(json["result"][0]["text"], "42");
            assert_eq!(json["result"][0]["confidence"], 1.0);
            assert!(json["result"][0]["bbox"].is_null());
        }

        assert_eq!(loader.loads(), 1);
        assert_eq!(local.calls(), 2);
    }

    /// Test 11: library engine requested while disabled
    #[tokio::test]
    async fn test_library_engine_unavailable() {
        let uploads = TempDir::new().unwrap();
        let app = app(None, Arc::new(MissingLocalModel), test_config(&uploads));

        let png = png_bytes();
        let request = ocr_request(
            "/ocr",
            &[Part::File {
                field: "file",
                filename: "a.jpg",
                bytes: &png,
            }],
        );
        let (status, json) = send(app, request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].as_str().unwrap().contains("not available"));
        assert!(dir_is_empty(uploads.path()));
    }

    /// Test 12: bytes that are not an image surface as a processing error
    #[tokio::test]
    async fn test_undecodable_image() {
        let uploads = TempDir::new().unwrap();
        let stub = StubRecognizer::new(EngineKind::Library, hello_world());
        let app = app(Some(stub.clone()), Arc::new(MissingLocalModel), test_config(&uploads));

        let request = ocr_request(
            "/ocr",
            &[Part::File {
                field: "file",
                filename: "broken.png",
                bytes: b"definitely not a png",
            }],
        );
        let (status, json) = send(app, request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"]
            .as_str()
            .unwrap()
            .starts_with("Error processing image"));
        assert_eq!(stub.calls(), 0);
        assert!(dir_is_empty(uploads.path()));
    }

    /// Test 13: uploads above the configured limit are refused
    #[tokio::test]
    async fn test_upload_over_limit_rejected() {
        let uploads = TempDir::new().unwrap();
        let stub = StubRecognizer::new(EngineKind::Library, hello_world());
        let config = ServiceConfig {
            max_upload_bytes: 1024,
            ..test_config(&uploads)
        };
        let app = app(Some(stub.clone()), Arc::new(MissingLocalModel), config);

        let big = vec![0u8; 8 * 1024];
        let request = ocr_request(
            "/ocr",
            &[Part::File {
                field: "file",
                filename: "big.png",
                bytes: &big,
            }],
        );
        let (status, _) = send(app, request).await;

        assert!(status.is_client_error(), "got {}", status);
        assert_eq!(stub.calls(), 0);
        assert!(dir_is_empty(uploads.path()));
    }

    /// Test 14: a body that is not multipart gets the JSON error shape
    #[tokio::test]
    async fn test_non_multipart_body_rejected() {
        let uploads = TempDir::new().unwrap();
        let stub = StubRecognizer::new(EngineKind::Library, hello_world());
        let app = app(Some(stub.clone()), Arc::new(MissingLocalModel), test_config(&uploads));

        let empty = Request::builder()
            .method("POST")
            .uri("/ocr")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(app.clone(), empty).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, serde_json::json!({ "error": "No file part" }));

        let as_json = Request::builder()
            .method("POST")
            .uri("/api/ocr")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"file":"receipt.png"}"#))
            .unwrap();
        let (status, json) = send(app, as_json).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());

        assert_eq!(stub.calls(), 0);
    }
}
