//! Hypervisor command dispatch for provisioning automation.
//!
//! A caller names one of eight commands and supplies a parameter bag; the
//! [`dispatch::Dispatcher`] validates the bag, runs the command against a
//! libvirt connection and reports a uniform [`envelope::ResultEnvelope`].

pub mod cli;
pub mod config;
pub mod connection;
pub mod descriptor;
pub mod dispatch;
pub mod envelope;
pub mod errors;
pub mod interfaces;
pub mod matcher;
pub mod request;
pub mod validate;
pub mod xml_utils;
