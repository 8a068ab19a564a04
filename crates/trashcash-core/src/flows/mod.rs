//! User-triggered flows: reward purchase and recycling submission.
//! Pure checks live here; `App` sequences them around the backend calls.

pub mod purchase;
pub mod submission;

pub use purchase::{check_purchase, confirm_prompt, PurchaseOutcome, PurchaseReceipt, PURCHASE_SUCCESS};
pub use submission::{
    check_material, parse_weight, photo_data_url, resolve_qr, success_message, weight_or_default,
    SubmissionOutcome, SubmissionReceipt, SubmissionRequest, DEFAULT_WEIGHT_KG,
};
