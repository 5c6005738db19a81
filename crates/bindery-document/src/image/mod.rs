// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module — the codec bridge between encoded JPEG/PNG bytes and raw
// pixel buffers.

pub mod codec;

pub use codec::{decode_image, encode_image};
