use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::parser::DexParser;
use crate::protocols::Protocol;
use crate::records::ParseResult;
use crate::types::{ParseOptions, RawTransaction};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = JSON)]
    fn parse(s: &str) -> JsValue;
}

fn to_js<T: Serialize>(value: &T) -> JsValue {
    match serde_json::to_string(value) {
        Ok(json_str) => parse(&json_str),
        Err(_) => JsValue::NULL,
    }
}

fn error_result(msg: &str) -> JsValue {
    let obj = serde_json::json!({"error": msg});
    to_js(&obj)
}

fn read_inputs(tx_json: &str, options: JsValue) -> Result<(RawTransaction, ParseOptions), String> {
    let tx = serde_json::from_str(tx_json).map_err(|e| format!("Invalid transaction JSON: {e}"))?;
    let options = if options.is_undefined() || options.is_null() {
        ParseOptions::default()
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| format!("Invalid options: {e}"))?
    };
    Ok((tx, options))
}

fn run<T: Serialize>(tx_json: &str, options: JsValue, project: impl FnOnce(ParseResult) -> T) -> JsValue {
    let (tx, options) = match read_inputs(tx_json, options) {
        Ok(inputs) => inputs,
        Err(msg) => return error_result(&msg),
    };
    match DexParser::new().parse_all(&tx, &options) {
        Ok(result) => to_js(&project(result)),
        Err(e) => error_result(&e.to_string()),
    }
}

/// Parse a `getTransaction` JSON payload into the full result.
#[wasm_bindgen(js_name = parseAll)]
pub fn parse_all(tx_json: &str, options: JsValue) -> JsValue {
    run(tx_json, options, |r| r)
}

#[wasm_bindgen(js_name = parseTrades)]
pub fn parse_trades(tx_json: &str, options: JsValue) -> JsValue {
    run(tx_json, options, |r| r.trades)
}

#[wasm_bindgen(js_name = parseLiquidity)]
pub fn parse_liquidity(tx_json: &str, options: JsValue) -> JsValue {
    run(tx_json, options, |r| r.liquidities)
}

/// Built-in protocols with their amm names and program ids.
#[wasm_bindgen(js_name = supportedPrograms)]
pub fn supported_programs() -> JsValue {
    let programs: Vec<serde_json::Value> = Protocol::all()
        .iter()
        .map(|p| {
            serde_json::json!({
                "amm": p.to_string(),
                "programId": p.program_id(),
            })
        })
        .collect();
    to_js(&programs)
}
