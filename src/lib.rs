use wasm_bindgen::closure::WasmClosure;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};

pub mod config;
pub mod error;
pub mod leaderboard;
pub mod remote;
pub mod score;
pub mod storage;
pub mod sync;
mod ui;

pub use config::{FirebaseConfig, LeaderboardConfig};
pub use error::{LeaderboardError, Result};
pub use leaderboard::LocalScoreStore;
pub use remote::{FirestoreBackend, NullBackend, RemoteScoreBackend};
pub use score::{ScoreEntry, Source};
pub use storage::{BrowserStorage, KeyValueStore, MemoryStorage};
pub use sync::{FetchResult, LeaderboardClient, SubmitResult};

#[wasm_bindgen(start)]
pub fn init() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    log::info!("Leaderboard module loaded");

    if let Err(e) = install_page_globals() {
        log::warn!("Page globals not installed: {e:?}");
    }
    if let Err(e) = ui::install_navigation() {
        log::warn!("Navigation not wired: {e}");
    }

    // Connect in the background so the first render does not wait on it.
    let client = ui::client();
    if client.is_configured() {
        spawn_local(async move {
            if client.init_remote_if_configured().await {
                log::info!("Firebase ready");
            } else {
                log::warn!("Firebase failed to init");
            }
        });
    }

    if let Err(e) = ui::show_panel("home") {
        log::warn!("Could not show home panel: {e}");
    }
    Ok(())
}

/// Called by the games when a round ends. JS numbers are truncated to integers.
#[wasm_bindgen(js_name = saveLocalScore)]
pub fn save_local_score(game: &str, score: f64, name: Option<String>) -> bool {
    let Some(score) = score::score_from_number(score) else {
        log::warn!("Ignoring non-finite score for {game}");
        return false;
    };
    let name = name.as_deref().unwrap_or(config::DEFAULT_NICKNAME);
    ui::client().local().save(game, score, name)
}

#[wasm_bindgen(js_name = getLocalTop)]
pub fn get_local_top(game: &str, n: Option<u32>) -> Result<JsValue, JsValue> {
    let client = ui::client();
    let n = n.map_or(client.local().config().default_limit, |n| n as usize);
    let entries = client.local().top_n(game, n);
    serde_wasm_bindgen::to_value(&entries).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = renderLeaderboardForGame)]
pub async fn render_leaderboard_for_game(game: String) {
    ui::render_leaderboard(&game).await;
}

#[wasm_bindgen(js_name = submitScoreUI)]
pub async fn submit_score_ui(game: String) {
    ui::submit_score_prompt(&game).await;
}

#[wasm_bindgen(js_name = showPanel)]
pub fn show_panel(id: &str) {
    if let Err(e) = ui::show_panel(id) {
        log::warn!("showPanel({id}) failed: {e}");
    }
}

fn set_global<T: ?Sized + WasmClosure>(
    window: &web_sys::Window,
    name: &str,
    closure: Closure<T>,
) -> Result<(), JsValue> {
    js_sys::Reflect::set(window, &JsValue::from_str(name), closure.as_ref())?;
    // Page scripts may call these at any time.
    closure.forget();
    Ok(())
}

/// Puts the entry points on `window` under the names the page's game code
/// and inline handlers call.
fn install_page_globals() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;

    let save = Closure::<dyn Fn(JsValue, JsValue, JsValue) -> bool>::new(
        |game: JsValue, score: JsValue, name: JsValue| {
            let Some(game) = game.as_string() else {
                log::warn!("_saveLocalScore called without a game id");
                return false;
            };
            save_local_score(&game, score.as_f64().unwrap_or(f64::NAN), name.as_string())
        },
    );
    set_global(&window, "_saveLocalScore", save)?;

    let top = Closure::<dyn Fn(JsValue, JsValue) -> JsValue>::new(|game: JsValue, n: JsValue| {
        let game = game.as_string().unwrap_or_default();
        let n = n.as_f64().filter(|n| n.is_finite() && *n >= 0.0).map(|n| n as u32);
        get_local_top(&game, n).unwrap_or_else(|_| js_sys::Array::new().into())
    });
    set_global(&window, "_getLocalTop", top)?;

    let render = Closure::<dyn Fn(JsValue) -> js_sys::Promise>::new(|game: JsValue| {
        let game = game.as_string().unwrap_or_default();
        future_to_promise(async move {
            ui::render_leaderboard(&game).await;
            Ok(JsValue::UNDEFINED)
        })
    });
    set_global(&window, "renderLeaderboardForGame", render)?;

    let submit = Closure::<dyn Fn(JsValue) -> js_sys::Promise>::new(|game: JsValue| {
        let game = game.as_string().unwrap_or_default();
        future_to_promise(async move {
            ui::submit_score_prompt(&game).await;
            Ok(JsValue::UNDEFINED)
        })
    });
    set_global(&window, "submitScoreUI", submit)?;

    Ok(())
}
