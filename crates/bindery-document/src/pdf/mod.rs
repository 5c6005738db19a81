// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — decoding existing documents and composing new ones.

pub mod composer;
pub mod reader;

pub use composer::PdfComposer;
pub use reader::PdfReader;
