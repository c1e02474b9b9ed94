//! System prompts for the extraction and transformation stages.
//!
//! Both stages delegate all reasoning to the hosted model, so the prompts are
//! the contract: the extractor prompt fixes the four output fields, and the
//! transformer prompt fixes the reshaping rules. Keeping them here lets unit
//! tests inspect them without a provider.

use serde_json::Value;

/// System prompt for extracting clinical fields from one page image.
pub const EXTRACTION_SYSTEM_PROMPT: &str =
    r#"You are an OCR-like data extraction tool for clinical notes.
Given the image of one page of a medical record, extract exactly:

1. medical_diagnosis: list of primary diagnoses.
2. surgical_history: list of past surgeries.
3. allergies:
   • has_allergies: true/false
   • allergy_list: list each allergy if true; otherwise empty.
4. physical_examination:
   • height: feet/inches (e.g. "5'7\"")
   • weight: lbs (e.g. "150 lbs")
   • blood_pressure: mmHg (e.g. "120/80")
   • pulse: bpm (e.g. "72")
   • respiratory_rate: breaths/min (e.g. "16")
   • temperature: °F (e.g. "98.6")
   • overall_health: one of "good", "fair", or "poor"

Output ONLY a JSON object with these keys."#;

/// Text part of the user message that accompanies each page image.
pub const EXTRACTION_USER_TEXT: &str = "Extract the medical fields from this page:";

const TRANSFORM_RULES: &str =
    r#"You are a data transformation tool. Given raw JSON data and a JSON schema,
output data that conforms exactly to the schema:
- Omit fields that are not in the schema.
- Fill missing fields with null.
- Translate any non-English text to English.
- Format dates as YYYY-MM-DD."#;

/// Build the transformer system prompt with the schema embedded (2-space indent).
pub fn transform_system_prompt(schema: &Value) -> String {
    let schema_text = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    format!("{TRANSFORM_RULES}\n\nHere is the schema:\n{schema_text}")
}

/// Build the transformer user message carrying the raw extraction as compact JSON.
pub fn transform_user_message(raw: &Value) -> String {
    format!("Transform this JSON to match the schema: {raw}")
}
