#![doc = "cycle-hire-core: core pipeline library for cycle-hire."]

//! This crate contains the ingestion pipelines for public cycle-hire trip data:
//! listing and fetching objects from public S3 buckets, then extracting the
//! downloaded archives and consolidating the CSV payloads into one flat directory.
//!
//! # Usage
//! The CLI crate (`cycle-hire`) drives the two phases in [`pipeline`]; tests drive
//! the individual components directly.

pub mod config;
pub mod consolidate;
pub mod contract;
pub mod download;
pub mod error;
pub mod extract;
pub mod listing;
pub mod pipeline;
pub mod s3;
pub mod walk;
