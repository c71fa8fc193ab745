//! pulse - Weekly engagement reports for open sales deals
//!
//! This crate provides the core functionality for the pulse reporter,
//! including activity classification, engagement aggregation, deal triage,
//! owner grouping, and the CRM/mail plumbing around them.

pub mod config;
pub mod domain;
pub mod providers;
pub mod services;
