//! Configuration module for Skriv.
//!
//! Handles loading and managing application settings.

mod settings;

pub use settings::{
    ChunkingSettings, DispatchSettings, GeneralSettings, MergeSettings, SegmentingSettings,
    Settings,
};
