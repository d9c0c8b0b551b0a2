use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SymbolFormat {
    Qr,
    MicroQr,
    Ean13,
    Ean8,
    UpcA,
    Code128,
    Code39,
    DataMatrix,
    Pdf417,
    Aztec,
    Other(String),
}

impl SymbolFormat {
    pub fn as_str(&self) -> &str {
        match self {
            SymbolFormat::Qr => "QR",
            SymbolFormat::MicroQr => "MICRO_QR",
            SymbolFormat::Ean13 => "EAN13",
            SymbolFormat::Ean8 => "EAN8",
            SymbolFormat::UpcA => "UPC_A",
            SymbolFormat::Code128 => "CODE128",
            SymbolFormat::Code39 => "CODE39",
            SymbolFormat::DataMatrix => "DATA_MATRIX",
            SymbolFormat::Pdf417 => "PDF417",
            SymbolFormat::Aztec => "AZTEC",
            SymbolFormat::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// One decoded symbol as reported by a decoder adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SymbolResult {
    pub payload: String,
    pub format: SymbolFormat,
    /// Corner polygon in frame coordinates, when the decoder reports one.
    pub location: Option<[Point; 4]>,
}

impl SymbolResult {
    pub fn new(payload: impl Into<String>, format: SymbolFormat) -> Self {
        Self {
            payload: payload.into(),
            format,
            location: None,
        }
    }

    pub fn with_location(mut self, location: [Point; 4]) -> Self {
        self.location = Some(location);
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ScanOrigin {
    Camera,
    Image,
}

/// A symbol that passed cooldown and de-duplication and was forwarded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedResult {
    pub payload: String,
    pub format: SymbolFormat,
    pub location: Option<[Point; 4]>,
    pub origin: ScanOrigin,
    pub session_id: String,
    pub accepted_at: DateTime<Utc>,
}

impl AcceptedResult {
    pub fn from_symbol(symbol: SymbolResult, origin: ScanOrigin, session_id: &str) -> Self {
        Self {
            payload: symbol.payload,
            format: symbol.format,
            location: symbol.location,
            origin,
            session_id: session_id.to_string(),
            accepted_at: Utc::now(),
        }
    }
}
