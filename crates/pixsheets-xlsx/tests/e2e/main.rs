//! End-to-end tests for pixsheets-xlsx.
//!
//! Each test builds the package it needs in memory, writes it through
//! `XlsxWriter` into a temp directory and reads the result back with
//! `XlsxReader`, asserting on both the parsed workbook and the raw parts.

mod common;
mod macros;
mod pictures;
mod reading;

pub use common::*;
