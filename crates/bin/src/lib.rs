#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod args;
pub mod bin_util;
pub mod entry;
pub mod errors;
pub mod logging;
pub mod main_impl;
