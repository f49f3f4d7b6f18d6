use wasm_bindgen::prelude::*;

use crate::{ConversionSession, ConvertOptions, LopdfDocument, OutputFormat};

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

fn convert(data: &[u8], opts: ConvertOptions) -> Result<Vec<u8>, JsValue> {
    let mut doc = LopdfDocument::from_bytes(data).map_err(|e| JsValue::from_str(&format!("Parse error: {}", e)))?;
    ConversionSession::new(opts)
        .convert(&mut doc)
        .map_err(|e| JsValue::from_str(&format!("Conversion error: {}", e)))
}

/// Convert a PDF to plain text with the default layout options
#[wasm_bindgen]
pub fn pdf_to_text(data: &[u8]) -> Result<String, JsValue> {
    let bytes = convert(data, ConvertOptions::with_format(OutputFormat::Ascii))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Convert a PDF with options given as JSON, e.g. `{"format":"rtf","pad_strip":true}`
#[wasm_bindgen]
pub fn pdf_convert(data: &[u8], options_json: &str) -> Result<Vec<u8>, JsValue> {
    let opts = ConvertOptions::from_json(options_json).map_err(|e| JsValue::from_str(&e.to_string()))?;
    convert(data, opts)
}

/// Get page count from a PDF
#[wasm_bindgen]
pub fn pdf_page_count(data: &[u8]) -> Result<usize, JsValue> {
    use crate::DocumentProvider;

    let doc = LopdfDocument::from_bytes(data).map_err(|e| JsValue::from_str(&format!("Parse error: {}", e)))?;
    Ok(doc.page_count())
}
