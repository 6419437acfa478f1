//! WebAssembly bindings for StyleMatch
//!
//! The background script owns one engine for the lifetime of the page. It
//! pushes style mutations in as JSON and asks for sections per URL.

use std::sync::OnceLock;

use sm_core::{
    EngineConfig, ErrorContext, ErrorReporter, FixedScheme, InjectionOrder, MatchEngine, MatchResult,
    PatternError, SharedEngine, Style, StyleId,
};
use sm_import::import_into;
use wasm_bindgen::prelude::*;

static ENGINE: OnceLock<SharedEngine> = OnceLock::new();

/// Reports malformed patterns to the devtools console.
struct ConsoleReporter;

impl ErrorReporter for ConsoleReporter {
    fn report(&mut self, context: &ErrorContext, error: &PatternError) {
        let message = match context.section {
            Some(section) => format!("Style {} section {}: {}", context.style_id, section, error),
            None => format!("Style {}: {}", context.style_id, error),
        };
        web_sys::console::warn_1(&JsValue::from_str(&message));
    }
}

fn engine() -> Result<&'static SharedEngine, JsValue> {
    ENGINE
        .get()
        .ok_or_else(|| JsValue::from_str("Not initialized. Call init() first."))
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn parse_config(config_json: Option<&str>) -> Result<EngineConfig, String> {
    match config_json {
        Some(text) if !text.trim().is_empty() => EngineConfig::from_json(text).map_err(|e| e.to_string()),
        _ => Ok(EngineConfig::default()),
    }
}

fn parse_style(style_json: &str) -> Result<Style, String> {
    serde_json::from_str(style_json).map_err(|e| format!("Invalid style JSON: {}", e))
}

fn parse_styles(styles_json: &str) -> Result<Vec<Style>, String> {
    serde_json::from_str(styles_json).map_err(|e| format!("Invalid styles JSON: {}", e))
}

/// Serialize through JSON into a plain JS value.
fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    let json = serde_json::to_string(value).map_err(js_error)?;
    js_sys::JSON::parse(&json)
}

fn result_to_js(result: &MatchResult) -> JsValue {
    let sections = js_sys::Object::new();
    for (id, indices) in &result.sections {
        let list = js_sys::Array::new();
        for &index in indices {
            list.push(&JsValue::from(index as u32));
        }
        let _ = js_sys::Reflect::set(&sections, &JsValue::from(*id), &list);
    }

    let maybe = js_sys::Array::new();
    for &id in &result.maybe_match {
        maybe.push(&JsValue::from(id));
    }

    let js_result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&js_result, &"sections".into(), &sections);
    let _ = js_sys::Reflect::set(&js_result, &"maybeMatch".into(), &maybe);
    js_result.into()
}

// =============================================================================
// Lifecycle
// =============================================================================

#[wasm_bindgen]
pub fn init(config_json: Option<String>) -> Result<(), JsValue> {
    if ENGINE.get().is_some() {
        return Err(JsValue::from_str("Already initialized. Reload the page to reinitialize."));
    }

    let config = parse_config(config_json.as_deref()).map_err(|e| JsValue::from_str(&e))?;
    let engine = MatchEngine::new(config).with_reporter(Box::new(ConsoleReporter));

    ENGINE
        .set(SharedEngine::new(engine))
        .map_err(|_| JsValue::from_str("Failed to set engine state"))
}

#[wasm_bindgen]
pub fn is_initialized() -> bool {
    ENGINE.get().is_some()
}

#[wasm_bindgen]
pub fn get_stats() -> JsValue {
    let result = js_sys::Object::new();
    match ENGINE.get() {
        Some(shared) => {
            let stats = shared.with(|engine| engine.stats());
            let _ = js_sys::Reflect::set(&result, &"initialized".into(), &JsValue::from(true));
            let _ = js_sys::Reflect::set(&result, &"styles".into(), &JsValue::from(stats.styles as u32));
            let _ = js_sys::Reflect::set(&result, &"cachedUrls".into(), &JsValue::from(stats.cached_urls as u32));
            let _ = js_sys::Reflect::set(&result, &"cacheCapacity".into(), &JsValue::from(stats.cache_capacity as u32));
            let _ = js_sys::Reflect::set(&result, &"hits".into(), &JsValue::from(stats.hits as f64));
            let _ = js_sys::Reflect::set(&result, &"misses".into(), &JsValue::from(stats.misses as f64));
            let _ = js_sys::Reflect::set(&result, &"evictions".into(), &JsValue::from(stats.evictions as f64));
        }
        None => {
            let _ = js_sys::Reflect::set(&result, &"initialized".into(), &JsValue::from(false));
        }
    }
    result.into()
}

// =============================================================================
// Style Mutations
// =============================================================================

#[wasm_bindgen]
pub fn load_styles(styles_json: &str) -> Result<u32, JsValue> {
    let styles = parse_styles(styles_json).map_err(|e| JsValue::from_str(&e))?;
    let count = engine()?.with(|engine| engine.load_styles(styles)).map_err(js_error)?;
    Ok(count as u32)
}

#[wasm_bindgen]
pub fn style_created(style_json: &str) -> Result<(), JsValue> {
    let style = parse_style(style_json).map_err(|e| JsValue::from_str(&e))?;
    engine()?.with(|engine| engine.on_style_created(style)).map_err(js_error)
}

#[wasm_bindgen]
pub fn style_updated(style_json: &str) -> Result<(), JsValue> {
    let style = parse_style(style_json).map_err(|e| JsValue::from_str(&e))?;
    engine()?.with(|engine| engine.on_style_updated(style)).map_err(js_error)
}

#[wasm_bindgen]
pub fn style_deleted(id: StyleId) -> Result<(), JsValue> {
    engine()?.with(|engine| engine.on_style_deleted(id)).map_err(js_error)
}

#[wasm_bindgen]
pub fn style_toggled(id: StyleId, enabled: bool) -> Result<(), JsValue> {
    engine()?.with(|engine| engine.on_style_toggled(id, enabled)).map_err(js_error)
}

#[wasm_bindgen]
pub fn set_dark_mode(dark: bool) -> Result<(), JsValue> {
    engine()?.with(|engine| engine.set_scheme_policy(Box::new(FixedScheme { dark })));
    Ok(())
}

#[wasm_bindgen]
pub fn set_injection_order(order_json: &str) -> Result<(), JsValue> {
    let order: InjectionOrder = serde_json::from_str(order_json).map_err(js_error)?;
    engine()?.with(|engine| engine.set_injection_order(order)).map_err(js_error)
}

#[wasm_bindgen]
pub fn invalidate(id: StyleId) -> Result<u32, JsValue> {
    Ok(engine()?.with(|engine| engine.invalidate(id)) as u32)
}

#[wasm_bindgen]
pub fn invalidate_all() -> Result<(), JsValue> {
    engine()?.with(|engine| engine.invalidate_all());
    Ok(())
}

// =============================================================================
// Queries
// =============================================================================

/// `{sections: {[styleId]: number[]}, maybeMatch: number[]}`
#[wasm_bindgen]
pub fn get_sections_by_url(url: &str) -> Result<JsValue, JsValue> {
    let result = engine()?.with(|engine| engine.get_matches(url));
    Ok(result_to_js(&result))
}

#[wasm_bindgen]
pub fn resolve_deferred(url: &str) -> Result<JsValue, JsValue> {
    let result = engine()?.with(|engine| engine.resolve_deferred(url));
    Ok(result_to_js(&result))
}

/// Sections in injection order: `[{styleId, index, code}]`.
#[wasm_bindgen]
pub fn get_ordered_sections(url: &str) -> Result<JsValue, JsValue> {
    let list = js_sys::Array::new();
    engine()?.with(|engine| {
        for at in engine.get_ordered_matches(url, None) {
            let item = js_sys::Object::new();
            let code = engine.section(at).map(|s| s.code.as_str()).unwrap_or_default();
            let _ = js_sys::Reflect::set(&item, &"styleId".into(), &JsValue::from(at.style_id));
            let _ = js_sys::Reflect::set(&item, &"index".into(), &JsValue::from(at.index as u32));
            let _ = js_sys::Reflect::set(&item, &"code".into(), &JsValue::from_str(code));
            list.push(&item);
        }
    });
    Ok(list.into())
}

/// Number of distinct styles applied to a tab (page plus frames).
#[wasm_bindgen]
pub fn count_tab_styles(urls: JsValue) -> Result<u32, JsValue> {
    let urls: Vec<String> = js_sys::Array::from(&urls).iter().filter_map(|v| v.as_string()).collect();
    let ids = engine()?.with(|engine| engine.frame_style_ids(&urls));
    Ok(ids.len() as u32)
}

#[wasm_bindgen]
pub fn inspect_url(url: &str) -> Result<JsValue, JsValue> {
    let info = engine()?.with(|engine| engine.inspect_url(url));
    to_js(&info)
}

#[wasm_bindgen]
pub fn import_backup(text: &str) -> Result<JsValue, JsValue> {
    let outcome = engine()?.with(|engine| import_into(engine, text)).map_err(js_error)?;

    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"report".into(), &to_js(&outcome.report)?);
    let _ = js_sys::Reflect::set(&result, &"invalid".into(), &JsValue::from(outcome.invalid.len() as u32));
    let _ = js_sys::Reflect::set(&result, &"skipped".into(), &JsValue::from(outcome.skipped as u32));
    let _ = js_sys::Reflect::set(&result, &"deduped".into(), &JsValue::from((outcome.dedupe.replaced + outcome.dedupe.duplicates) as u32));
    let _ = js_sys::Reflect::set(&result, &"orderApplied".into(), &JsValue::from(outcome.order_applied));
    Ok(result.into())
}


#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn end_to_end() {
        init(None).unwrap();
        style_created(r#"{"id": 1, "name": "All", "sections": [{"code": "a{}"}]}"#).unwrap();
        let result = get_sections_by_url("https://example.com/").unwrap();
        let sections = js_sys::Reflect::get(&result, &"sections".into()).unwrap();
        assert!(js_sys::Reflect::has(&sections, &JsValue::from(1)).unwrap());
        assert_eq!(count_tab_styles(js_sys::Array::of1(&"https://a.com/".into()).into()).unwrap(), 1);
    }
}
