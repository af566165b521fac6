// SPDX-License-Identifier: MIT OR Apache-2.0
//! Process-wide language selection.
//!
//! The selection is read from `FLOWSPEC_LANG` exactly once and is read-only
//! afterwards. Message catalogs live outside this workspace; components only
//! need to know which language was chosen.

use std::sync::OnceLock;

/// Languages the toolchain can be asked to report in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Lang {
    /// English, the fallback for unknown values.
    #[default]
    English,
    /// Simplified Chinese.
    Chinese,
}

impl Lang {
    /// Parse a locale value; unknown values fall back to English.
    #[must_use]
    pub fn parse_lossy(value: &str) -> Self {
        let v = value.trim().to_ascii_lowercase();
        if v == "zh" || v.starts_with("zh-") || v.starts_with("zh_") {
            Self::Chinese
        } else {
            Self::English
        }
    }
}

static SELECTED: OnceLock<Lang> = OnceLock::new();

/// Resolve the process-wide language from `FLOWSPEC_LANG`.
///
/// The environment is consulted on the first call only; every later call
/// returns the same value.
pub fn current() -> Lang {
    *SELECTED.get_or_init(|| {
        std::env::var("FLOWSPEC_LANG")
            .map(|v| Lang::parse_lossy(&v))
            .unwrap_or_default()
    })
}
