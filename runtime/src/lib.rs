// Copyright 2026 ModelRelay Contributors
// SPDX-License-Identifier: MIT

//! ModelRelay runtime: the browser-facing half of the pipeline.
//!
//! The [`extraction::Extractor`] reads a source gallery page into a
//! [`model_relay::ModelRecord`]; the [`injection::Injector`] replays it
//! into the target platform's creation wizard. Both run against traits
//! ([`extraction::source::DocumentSource`], [`injection::page::WizardPage`])
//! so they can be exercised without a browser.

#![allow(clippy::should_implement_trait)]

pub mod cli;
pub mod config;
pub mod extraction;
pub mod injection;
pub mod protocol;
pub mod renderer;
pub mod script;
pub mod store;
pub mod translate;
pub mod wait;
