// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Integration tests for the five document operations.

use bindery_core::error::BinderyError;
use bindery_core::types::{ImageKind, OutputNaming, PixelBuffer, PixelLayout};
use bindery_document::{PdfComposer, PdfReader, merge, images_to_pdf, pdf_to_images, split, unlock};
use lopdf::{Document, Object, StringFormat};

// -- Fixtures ----------------------------------------------------------------

fn solid(width: u32, height: u32, rgb: [u8; 3]) -> PixelBuffer {
    let data = rgb
        .iter()
        .copied()
        .cycle()
        .take(width as usize * height as usize * 3)
        .collect();
    PixelBuffer::new(width, height, PixelLayout::Rgb, data).unwrap()
}

/// Author a document whose pages have the given pixel-point sizes.
fn document_with_page_sizes(sizes: &[(u32, u32)]) -> Vec<u8> {
    let mut composer = PdfComposer::new();
    for &(width, height) in sizes {
        composer
            .append_image_page(&solid(width, height, [200, 40, 40]), ImageKind::Png)
            .unwrap();
    }
    composer.serialize().unwrap()
}

fn page_sizes(bytes: &[u8]) -> Vec<(f32, f32)> {
    let reader = PdfReader::decode(bytes, None).unwrap();
    reader
        .page_ids()
        .into_iter()
        .map(|id| reader.page_size(id).unwrap())
        .collect()
}

/// Encrypt a PDF with an RC4-128 user password, as a protected fixture.
fn encrypt_with_password(pdf: &[u8], user: &str, owner: &str) -> Vec<u8> {
    let mut doc = Document::load_mem(pdf).unwrap();

    // Encryption derives its key from the file ID.
    let id_first: Vec<u8> = (1u8..=16).collect();
    let id_second: Vec<u8> = (16u8..=31).collect();
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(id_first, StringFormat::Literal),
            Object::String(id_second, StringFormat::Literal),
        ]),
    );

    let version = lopdf::EncryptionVersion::V2 {
        document: &doc,
        owner_password: owner,
        user_password: user,
        key_length: 128,
        permissions: lopdf::Permissions::all(),
    };
    let state = lopdf::EncryptionState::try_from(version).unwrap();
    doc.encrypt(&state).unwrap();

    let mut output = Vec::new();
    doc.save_to(&mut output).unwrap();
    output
}

// -- Merge -------------------------------------------------------------------

#[test]
fn merge_preserves_input_then_page_order() {
    // Two 3-page documents; sizes double as page identity markers.
    let first = document_with_page_sizes(&[(100, 100), (110, 100), (120, 100)]);
    let second = document_with_page_sizes(&[(200, 50), (210, 50), (220, 50)]);

    let output = merge(&[&first, &second], &OutputNaming::default()).unwrap();
    assert_eq!(output.name, "merged.pdf");

    let sizes = page_sizes(&output.bytes);
    assert_eq!(
        sizes,
        vec![
            (100.0, 100.0),
            (110.0, 100.0),
            (120.0, 100.0),
            (200.0, 50.0),
            (210.0, 50.0),
            (220.0, 50.0),
        ]
    );
}

#[test]
fn merge_page_count_is_additive() {
    let a = document_with_page_sizes(&[(80, 80)]);
    let b = document_with_page_sizes(&[(80, 80), (90, 90)]);
    let c = document_with_page_sizes(&[(70, 70), (60, 60), (50, 50)]);

    let output = merge(&[&a, &b, &c], &OutputNaming::default()).unwrap();
    let reader = PdfReader::decode(&output.bytes, None).unwrap();
    assert_eq!(reader.page_count(), 6);
}

#[test]
fn merge_with_one_document_is_insufficient() {
    let only = document_with_page_sizes(&[(80, 80)]);
    let err = merge(&[&only], &OutputNaming::default()).unwrap_err();
    assert!(matches!(
        err,
        BinderyError::InsufficientInput { needed: 2, got: 1 }
    ));
}

// -- Split -------------------------------------------------------------------

#[test]
fn split_yields_one_document_per_page() {
    let input = document_with_page_sizes(&[(100, 90), (110, 90), (120, 90)]);
    let outputs = split(&[&input], &OutputNaming::default()).unwrap();

    assert_eq!(outputs.len(), 3);
    let names: Vec<&str> = outputs.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["page_001.pdf", "page_002.pdf", "page_003.pdf"]);

    for (index, output) in outputs.iter().enumerate() {
        let sizes = page_sizes(&output.bytes);
        assert_eq!(sizes, vec![((100 + 10 * index) as f32, 90.0)]);
    }
}

#[test]
fn split_aborts_on_malformed_input() {
    let err = split(&[b"%PDF-1.5 garbage".as_slice()], &OutputNaming::default()).unwrap_err();
    assert!(matches!(err, BinderyError::MalformedDocument(_)));
}

// -- PDF to images -------------------------------------------------------------

#[test]
fn pdf_to_images_renders_pages_at_scale_two() {
    let input = document_with_page_sizes(&[(100, 80), (50, 40)]);
    let outputs = pdf_to_images(&[&input], &OutputNaming::default()).unwrap();

    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0].name, "page_001.jpg");
    assert_eq!(outputs[1].name, "page_002.jpg");

    let first = bindery_document::decode_image(&outputs[0].bytes, ImageKind::Jpeg).unwrap();
    assert_eq!((first.width(), first.height()), (200, 160));
    let second = bindery_document::decode_image(&outputs[1].bytes, ImageKind::Jpeg).unwrap();
    assert_eq!((second.width(), second.height()), (100, 80));
}

// -- Images to PDF -------------------------------------------------------------

#[test]
fn images_to_pdf_sizes_pages_to_pixels() {
    let png = bindery_document::encode_image(&solid(37, 53, [10, 200, 30]), ImageKind::Png, None)
        .unwrap();
    let jpeg = bindery_document::encode_image(&solid(64, 32, [0, 0, 0]), ImageKind::Jpeg, None)
        .unwrap();

    let inputs = vec![("first.png".to_string(), png), ("second.jpg".to_string(), jpeg)];
    let output = images_to_pdf(&inputs, &OutputNaming::default()).unwrap();
    assert_eq!(output.name, "images.pdf");

    let sizes = page_sizes(&output.bytes);
    assert_eq!(sizes, vec![(37.0, 53.0), (64.0, 32.0)]);
}

#[test]
fn images_to_pdf_trusts_the_declared_extension() {
    // PNG bytes under a .jpg name must fail as a JPEG decode, not sniff.
    let png = bindery_document::encode_image(&solid(8, 8, [1, 2, 3]), ImageKind::Png, None)
        .unwrap();
    let inputs = vec![("mislabeled.jpg".to_string(), png)];
    let err = images_to_pdf(&inputs, &OutputNaming::default()).unwrap_err();
    assert!(matches!(err, BinderyError::UnsupportedImage(_)));
}

// -- Round trips ---------------------------------------------------------------

#[test]
fn decode_of_reserialised_document_is_stable() {
    let original = document_with_page_sizes(&[(90, 90), (100, 100)]);

    // serialize(decode(bytes)): copy every page into a fresh composer.
    let reader = PdfReader::decode(&original, None).unwrap();
    let mut composer = PdfComposer::new();
    for index in 0..reader.page_count() {
        composer.append_page(&reader, index).unwrap();
    }
    let reserialised = composer.serialize().unwrap();

    let reloaded = PdfReader::decode(&reserialised, None).unwrap();
    assert_eq!(reloaded.page_count(), reader.page_count());
}

// -- Unlock --------------------------------------------------------------------

#[test]
fn unlock_with_correct_password_produces_open_document() {
    let plain = document_with_page_sizes(&[(120, 100), (80, 60)]);
    let locked = encrypt_with_password(&plain, "secret", "owner-secret");

    // The locked fixture must actually require the password.
    assert!(matches!(
        PdfReader::decode(&locked, None).unwrap_err(),
        BinderyError::IncorrectPassword
    ));

    let output = unlock(&[&locked], "secret", &OutputNaming::default()).unwrap();
    assert_eq!(output.name, "unlocked.pdf");

    // Decodes without any password, same page count, original point sizes.
    let sizes = page_sizes(&output.bytes);
    assert_eq!(sizes, vec![(120.0, 100.0), (80.0, 60.0)]);
}

#[test]
fn unlock_with_wrong_password_fails_typed() {
    let plain = document_with_page_sizes(&[(100, 100)]);
    let locked = encrypt_with_password(&plain, "secret", "owner-secret");

    let err = unlock(&[&locked], "not-the-password", &OutputNaming::default()).unwrap_err();
    assert!(matches!(err, BinderyError::IncorrectPassword));
}

#[test]
fn unlock_of_unencrypted_document_still_flattens() {
    let plain = document_with_page_sizes(&[(100, 50)]);
    let output = unlock(&[&plain], "whatever", &OutputNaming::default()).unwrap();
    let sizes = page_sizes(&output.bytes);
    assert_eq!(sizes, vec![(100.0, 50.0)]);
}
