use serde::{Deserialize, Serialize};

use crate::models::{SymbolFormat, SymbolResult};

/// Passive decoder configuration. Decoders read it; the orchestrator only
/// uses `formats` to drop results the caller did not ask for.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DecodeHints {
    /// Accepted symbologies. Empty accepts everything.
    pub formats: Vec<SymbolFormat>,
    pub try_harder: bool,
    pub character_set: Option<String>,
}

impl DecodeHints {
    pub fn qr_only() -> Self {
        Self {
            formats: vec![SymbolFormat::Qr],
            ..Self::default()
        }
    }

    pub fn accepts(&self, format: &SymbolFormat) -> bool {
        self.formats.is_empty() || self.formats.contains(format)
    }

    pub fn retain_accepted(&self, symbols: &mut Vec<SymbolResult>) {
        symbols.retain(|symbol| self.accepts(&symbol.format));
    }
}
