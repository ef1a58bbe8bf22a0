//! Reading shader and mesh files: straight from disk natively, through
//! `fetch` in the browser.

use crate::error::AssetError;

#[cfg(not(target_arch = "wasm32"))]
pub async fn load_bytes(path: &str) -> Result<Vec<u8>, AssetError> {
    log::debug!("reading {path}");
    std::fs::read(path).map_err(|source| AssetError::Io {
        path: path.to_string(),
        source,
    })
}

#[cfg(target_arch = "wasm32")]
pub async fn load_bytes(url: &str) -> Result<Vec<u8>, AssetError> {
    use wasm_bindgen_futures::wasm_bindgen::{JsCast, JsValue};
    use wasm_bindgen_futures::JsFuture;
    let fetch_error = |message: String| AssetError::Fetch {
        url: url.to_string(),
        message,
    };
    let js_error = |e: JsValue| fetch_error(format!("{e:?}"));
    log::debug!("fetching {url}");
    let window = web_sys::window().ok_or_else(|| fetch_error("no window".to_string()))?;
    let response: web_sys::Response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(js_error)?
        .dyn_into()
        .map_err(js_error)?;
    if !response.ok() {
        return Err(fetch_error(format!("HTTP status {}", response.status())));
    }
    let buffer = JsFuture::from(response.array_buffer().map_err(js_error)?)
        .await
        .map_err(js_error)?;
    Ok(js_sys::Uint8Array::new(&buffer).to_vec())
}

pub async fn load_string(path: &str) -> Result<String, AssetError> {
    let bytes = load_bytes(path).await?;
    String::from_utf8(bytes).map_err(|_| AssetError::Utf8 {
        path: path.to_string(),
    })
}
