// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Grounding DINO pipeline tests that run without model files
//!
//! Cover the pieces around the ONNX session:
//! - Phrase attention masks and position ids
//! - Query selection and box conversion into image pixels
//! - Upload decoding into RGB tensors

use grounding_dino_serve::vision::{
    decode_image_bytes,
    grounding_dino::{
        postprocessing::select_queries,
        preprocessing::preprocess_image,
        text::{build_text_inputs, preprocess_caption},
    },
    BoundingBox, ImageError, InputResize,
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use ndarray::Array2;
use std::io::Cursor;

// BERT uncased ids
const CLS: i64 = 101;
const SEP: i64 = 102;
const DOT: i64 = 1012;
const QUESTION: i64 = 1029;
const SPECIAL: &[i64] = &[CLS, SEP, DOT, QUESTION];

const CAT: i64 = 4937;
const REMOTE: i64 = 6556;
const CONTROL: i64 = 2491;

fn logit(p: f32) -> f32 {
    (p / (1.0 - p)).ln()
}

#[test]
fn test_caption_normalisation() {
    assert_eq!(preprocess_caption("  Cat . Remote Control "), "cat . remote control.");
    assert_eq!(preprocess_caption("dog."), "dog.");
}

#[test]
fn test_phrase_blocks_for_two_phrases() {
    // [CLS] cat . remote control . [SEP]
    let ids = vec![CLS, CAT, DOT, REMOTE, CONTROL, DOT, SEP];
    let inputs = build_text_inputs(ids.clone(), vec![true; ids.len()], SPECIAL, 256);

    assert_eq!(inputs.position_ids, vec![0, 0, 1, 0, 1, 2, 0]);
    assert_eq!(inputs.token_type_ids, vec![0; 7]);

    let mask = &inputs.self_attention_mask;
    // "cat" sees its separator but not the next phrase
    assert!(mask[[1, 2]]);
    assert!(!mask[[1, 3]]);
    // "remote control ." is one block
    for i in 3..=5 {
        for j in 3..=5 {
            assert!(mask[[i, j]], "expected {} to attend to {}", i, j);
        }
    }
    // special boundary tokens only see themselves
    assert!(mask[[0, 0]] && mask[[6, 6]]);
    assert!(!mask[[0, 1]] && !mask[[6, 5]]);
}

#[test]
fn test_text_inputs_truncated_to_max_len() {
    let mut ids = vec![CLS];
    ids.extend(std::iter::repeat(CAT).take(300));
    ids.push(SEP);

    let inputs = build_text_inputs(ids, vec![true; 302], SPECIAL, 256);

    assert_eq!(inputs.len(), 256);
    assert_eq!(inputs.token_mask.len(), 256);
    assert_eq!(inputs.position_ids.len(), 256);
    assert_eq!(inputs.self_attention_mask.dim(), (256, 256));
}

#[test]
fn test_selected_query_maps_to_pixel_box() {
    let ids = [CLS, CAT, DOT, SEP];
    let low = logit(0.01);
    let logits = Array2::from_shape_vec(
        (2, 6),
        vec![
            low, logit(0.8), low, low, low, low, // confident "cat"
            low, logit(0.2), low, low, low, low, // below box threshold
        ],
    )
    .unwrap();
    let boxes =
        Array2::from_shape_vec((2, 4), vec![0.5, 0.5, 0.5, 0.5, 0.1, 0.1, 0.1, 0.1]).unwrap();

    let matches = select_queries(logits.view(), boxes.view(), &ids, 0.35, 0.25);
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].phrase_token_ids, vec![CAT]);

    let bbox = BoundingBox::from_normalized_cxcywh(matches[0].cxcywh, 640, 480);
    assert_eq!(
        bbox,
        BoundingBox {
            xmin: 160.0,
            ymin: 120.0,
            xmax: 480.0,
            ymax: 360.0,
        }
    );
}

#[test]
fn test_boxes_clamped_to_image() {
    let bbox = BoundingBox::from_normalized_cxcywh([0.95, 0.05, 0.3, 0.3], 100, 200);
    assert_eq!(bbox.xmax, 100.0);
    assert_eq!(bbox.ymin, 0.0);
    assert!(bbox.area() > 0.0);
}

#[test]
fn test_rgba_upload_becomes_three_channel_tensor() {
    let rgba = RgbaImage::from_pixel(40, 30, Rgba([10, 20, 30, 128]));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(rgba)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();

    let (image, info) = decode_image_bytes(buffer.get_ref()).unwrap();
    assert_eq!((info.width, info.height), (40, 30));
    assert_eq!(info.format, ImageFormat::Png);

    let tensor = preprocess_image(&image, InputResize::default());
    assert_eq!(tensor.shape(), &[1, 3, 800, 1066]);
}

#[test]
fn test_truncated_png_rejected() {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(RgbaImage::new(16, 16))
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    let bytes = buffer.into_inner();

    let err = decode_image_bytes(&bytes[..bytes.len() / 2]).unwrap_err();
    assert!(matches!(err, ImageError::DecodeFailed(_)));
}
