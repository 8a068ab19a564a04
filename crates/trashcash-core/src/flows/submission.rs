//! ============================================================================
//! Recycling Submission - Validation before anything reaches the network
//! ============================================================================
//! - weight must parse as a positive finite number of kilograms
//! - a QR code must match a cached point
//! - the material must be one of the point's accepted types
//! ============================================================================

use base64::Engine;
use serde::Serialize;

use crate::error::{Result, TrashCashError};
use crate::types::{RecyclingPoint, SubmissionMethod, Transaction};

/// Weight used when the user leaves the prompt empty
pub const DEFAULT_WEIGHT_KG: f64 = 1.0;

/// Validated report, ready to send
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionRequest {
    pub method: SubmissionMethod,
    pub point_id: i64,
    pub qr_code: Option<String>,
    /// Data URL of the receipt photo
    pub receipt_photo: Option<String>,
    pub material_type: String,
    pub weight: f64,
}

/// Server-confirmed result of a submission
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReceipt {
    pub point_id: i64,
    pub new_balance: i64,
    pub coins_awarded: i64,
    pub transaction: Option<Transaction>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    Submitted(SubmissionReceipt),
    /// User cancelled a prompt; nothing was sent
    Aborted,
}

pub fn parse_weight(raw: &str) -> Result<f64> {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(w) if w.is_finite() && w > 0.0 => Ok(w),
        _ => Err(TrashCashError::InvalidWeight(raw.to_string())),
    }
}

/// Prompt answer to kilograms; no answer or a blank one means 1 kg
pub fn weight_or_default(raw: Option<&str>) -> Result<f64> {
    match raw.map(str::trim) {
        None | Some("") => Ok(DEFAULT_WEIGHT_KG),
        Some(value) => parse_weight(value),
    }
}

pub fn resolve_qr<'a>(points: &'a [RecyclingPoint], code: &str) -> Result<&'a RecyclingPoint> {
    let code = code.trim();
    points
        .iter()
        .find(|p| p.qr_code == code)
        .ok_or_else(|| TrashCashError::QrNotRecognized(code.to_string()))
}

pub fn check_material(point: &RecyclingPoint, material: &str) -> Result<()> {
    if point.accepts(material) {
        Ok(())
    } else {
        Err(TrashCashError::MaterialNotAccepted {
            material: material.to_string(),
            point: point.name.clone(),
        })
    }
}

impl SubmissionRequest {
    pub fn qr(point: &RecyclingPoint, material: &str, weight: f64) -> Result<Self> {
        check_material(point, material)?;
        Ok(Self {
            method: SubmissionMethod::Qr,
            point_id: point.id,
            qr_code: Some(point.qr_code.clone()),
            receipt_photo: None,
            material_type: material.to_string(),
            weight,
        })
    }

    pub fn receipt(
        point: &RecyclingPoint,
        photo_data_url: String,
        material: &str,
        weight: f64,
    ) -> Result<Self> {
        check_material(point, material)?;
        Ok(Self {
            method: SubmissionMethod::Receipt,
            point_id: point.id,
            qr_code: None,
            receipt_photo: Some(photo_data_url),
            material_type: material.to_string(),
            weight,
        })
    }
}

/// Encode a receipt photo as a data URL
pub fn photo_data_url(bytes: &[u8], mime: &str) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

pub fn success_message(coins: i64, balance: i64) -> String {
    format!("Awarded {} coins! Your balance: {}", coins, balance)
}
