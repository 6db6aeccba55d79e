//! Skill Loader (C14): scans a skills directory for `skill.toml` /
//! `SKILL.md` bundles, validates them, and exposes a hot-reloadable
//! registry the Agent Loop and Inbox Dispatcher consult.

pub mod aliases;
pub mod installer;
pub mod loader;
pub mod manifest;
pub mod registry;
pub mod types;
