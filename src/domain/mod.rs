//! Domain layer modules
//!
//! This module contains business domain logic:
//! - `template`: Document templates, placeholder rendering and storage

pub mod template;
