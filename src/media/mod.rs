// SPDX-License-Identifier: GPL-3.0-only

//! Media processing utilities
//!
//! Camera frames arrive in whatever pixel format the provider negotiated
//! (RGBA, NV12, YUYV, ...). The [`format_converters`] module turns them into
//! tightly packed RGBA images that any texture engine can upload.

pub mod format_converters;

pub use format_converters::{convert_to_rgba, yuv_to_rgba};
