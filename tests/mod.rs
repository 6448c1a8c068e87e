//! Test suite for boardsync
//!
//! This module organizes all tests

pub mod common;
pub mod property;
