use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, Window};

use crate::config::{FirebaseConfig, LeaderboardConfig, DEFAULT_NICKNAME};
use crate::error::{LeaderboardError, Result};
use crate::leaderboard::LocalScoreStore;
use crate::remote::FirestoreBackend;
use crate::score::{normalize_nickname, parse_manual_score, ScoreEntry, Source};
use crate::storage::BrowserStorage;
use crate::sync::{LeaderboardClient, SubmitResult};

pub type PageClient = LeaderboardClient<BrowserStorage, FirestoreBackend>;

const LIST_ID: &str = "lb-list";
const TITLE_ID: &str = "lb-title";
const SOURCE_NOTE_ID: &str = "lb-source-note";

thread_local! {
    static CLIENT: Rc<PageClient> = Rc::new(PageClient::new(
        LocalScoreStore::new(BrowserStorage, LeaderboardConfig::default()),
        FirebaseConfig::from_window(),
    ));
}

/// The page-wide client, created on first use.
pub fn client() -> Rc<PageClient> {
    CLIENT.with(Rc::clone)
}

fn window() -> Result<Window> {
    web_sys::window().ok_or(LeaderboardError::MissingElement("window"))
}

fn document() -> Result<Document> {
    window()?
        .document()
        .ok_or(LeaderboardError::MissingElement("document"))
}

fn element(document: &Document, id: &'static str) -> Result<Element> {
    document
        .get_element_by_id(id)
        .ok_or(LeaderboardError::MissingElement(id))
}

fn query_all(document: &Document, selector: &str) -> Vec<Element> {
    let Ok(nodes) = document.query_selector_all(selector) else {
        return Vec::new();
    };
    (0..nodes.length())
        .filter_map(|i| nodes.item(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}

fn alert(message: &str) {
    if let Some(window) = web_sys::window() {
        let _ = window.alert_with_message(message);
    }
}

/// Lazily connects the remote store the first time a view needs it.
/// `window.FIREBASE_CONFIG` is checked again here since its script may load
/// after this module.
async fn ensure_remote(client: &PageClient) {
    if !client.is_configured() {
        if let Some(config) = FirebaseConfig::from_window() {
            log::info!("FIREBASE_CONFIG found, enabling remote leaderboard");
            client.configure_remote(config);
        }
    }
    if client.is_configured() && !client.is_remote_ready() {
        client.init_remote_if_configured().await;
    }
}

fn placeholder(document: &Document, text: &str) -> std::result::Result<Element, JsValue> {
    let div = document.create_element("div")?;
    div.set_class_name("muted");
    div.set_text_content(Some(text));
    Ok(div)
}

fn leaderboard_row(
    document: &Document,
    rank: usize,
    entry: &ScoreEntry,
) -> std::result::Result<Element, JsValue> {
    let row = document.create_element("div")?;
    row.set_class_name("lb-item");

    let who = document.create_element("div")?;
    who.set_attribute("style", "display:flex;align-items:center;gap:8px")?;

    let rank_el = document.create_element("div")?;
    rank_el.set_class_name("lb-rank");
    rank_el.set_text_content(Some(&rank.to_string()));

    let name_el = document.create_element("div")?;
    name_el.set_class_name("lb-name");
    name_el.set_text_content(Some(&entry.name));

    let score_el = document.create_element("div")?;
    score_el.set_class_name("lb-score");
    score_el.set_text_content(Some(&entry.score.to_string()));

    who.append_child(&rank_el)?;
    who.append_child(&name_el)?;
    row.append_child(&who)?;
    row.append_child(&score_el)?;
    Ok(row)
}

fn fill_list(
    document: &Document,
    list: &Element,
    items: &[ScoreEntry],
) -> std::result::Result<(), JsValue> {
    list.set_inner_html("");
    if items.is_empty() {
        let empty = placeholder(document, "No scores yet.")?;
        list.append_child(&empty)?;
        return Ok(());
    }
    for (i, entry) in items.iter().enumerate() {
        let row = leaderboard_row(document, i + 1, entry)?;
        list.append_child(&row)?;
    }
    Ok(())
}

fn source_label(source: Source) -> &'static str {
    match source {
        Source::Remote => "Source: Global (Firebase)",
        Source::Local => "Source: Local (browser)",
    }
}

/// Renders the top scores for `game` into `#lb-title`, `#lb-list` and
/// `#lb-source-note`. Missing elements are skipped.
pub async fn render_leaderboard(game: &str) {
    let document = match document() {
        Ok(document) => document,
        Err(e) => {
            log::warn!("Cannot render leaderboard: {e}");
            return;
        }
    };
    let client = client();
    let limit = client.local().config().default_limit;

    let title = element(&document, TITLE_ID);
    let list = element(&document, LIST_ID);
    let source_note = element(&document, SOURCE_NOTE_ID);
    for missing in [&title, &list, &source_note].into_iter().filter_map(|el| el.as_ref().err()) {
        log::warn!("Leaderboard view incomplete: {missing}");
    }

    if let Ok(title) = &title {
        title.set_text_content(Some(&format!("{}: Top {limit}", game.to_uppercase())));
    }
    if let Ok(list) = &list {
        list.set_inner_html("");
        if let Ok(loading) = placeholder(&document, "Loading...") {
            let _ = list.append_child(&loading);
        }
    }

    ensure_remote(&client).await;
    let result = client.fetch_top(game, limit).await;

    if let Ok(list) = &list {
        if let Err(e) = fill_list(&document, list, &result.items) {
            log::warn!("Failed to draw leaderboard rows: {e:?}");
        }
    }
    if let Ok(note) = &source_note {
        note.set_text_content(Some(source_label(result.source)));
    }
}

fn prompt(window: &Window, message: &str, default: &str) -> Result<String> {
    match window.prompt_with_message_and_default(message, default) {
        Ok(Some(answer)) => Ok(answer),
        _ => Err(LeaderboardError::Cancelled),
    }
}

async fn submit_flow(game: &str) -> Result<SubmitResult> {
    let window = window()?;
    let client = client();

    let score = match client.local().best(game) {
        Some(best) => {
            let question = format!(
                "Your best local score is {}. Submit it to the global leaderboard?",
                best.score
            );
            if !window.confirm_with_message(&question).unwrap_or(false) {
                return Err(LeaderboardError::Cancelled);
            }
            best.score
        }
        None => parse_manual_score(&prompt(
            &window,
            "Enter the score to submit (number):",
            "",
        )?)?,
    };

    let max_chars = client.local().config().max_name_chars;
    let raw_name = prompt(
        &window,
        &format!("Nickname (up to {max_chars} characters):"),
        DEFAULT_NICKNAME,
    )?;
    let nickname = normalize_nickname(&raw_name, max_chars);

    ensure_remote(&client).await;
    Ok(client.submit(game, &nickname, score).await)
}

/// Asks the player to confirm their best local score (or type one in), asks
/// for a nickname, submits, and refreshes the leaderboard view.
pub async fn submit_score_prompt(game: &str) {
    match submit_flow(game).await {
        Ok(result) => {
            if result.ok {
                alert(&format!("Score submitted ({}). Thanks!", result.source.as_str()));
            } else {
                alert("Score saved locally (offline or error).");
            }
            render_leaderboard(game).await;
        }
        Err(LeaderboardError::Cancelled) => {}
        Err(LeaderboardError::InvalidScore(raw)) => {
            alert(&format!("Invalid score: {raw}"));
        }
        Err(e) => log::warn!("Score submission aborted: {e}"),
    }
}

/// Shows the `.panel` with the given id, hides the others and marks the
/// matching `.tab` active.
pub fn show_panel(id: &str) -> Result<()> {
    let document = document()?;

    for panel in query_all(&document, ".panel") {
        let classes = panel.class_list();
        let _ = if panel.id() == id {
            classes.remove_1("hidden")
        } else {
            classes.add_1("hidden")
        };
    }
    for tab in query_all(&document, ".tab") {
        let active = tab.get_attribute("data-target").as_deref() == Some(id);
        let _ = tab.class_list().toggle_with_force("active", active);
    }

    let options = web_sys::ScrollToOptions::new();
    options.set_top(0.0);
    options.set_behavior(web_sys::ScrollBehavior::Smooth);
    window()?.scroll_to_with_scroll_to_options(&options);
    Ok(())
}

/// Calls `window.start_<target>()` or `window.startGame[target]()` if the page defines one.
fn call_global_starter(window: &Window, target: &str) -> bool {
    let global = js_sys::Reflect::get(window, &JsValue::from_str(&format!("start_{target}")));
    if let Ok(func) = global.and_then(|v| v.dyn_into::<js_sys::Function>()) {
        return func.call0(&JsValue::NULL).is_ok();
    }
    let registry = js_sys::Reflect::get(window, &JsValue::from_str("startGame"))
        .ok()
        .filter(|v| v.is_object());
    if let Some(registry) = registry {
        let entry = js_sys::Reflect::get(&registry, &JsValue::from_str(target));
        if let Ok(func) = entry.and_then(|v| v.dyn_into::<js_sys::Function>()) {
            return func.call0(&registry).is_ok();
        }
    }
    false
}

fn navigate(trigger: &Element) -> Result<()> {
    let Some(target) = trigger.get_attribute("data-target") else {
        return Ok(());
    };
    let window = window()?;
    let document = document()?;

    if let Some(panel) = document.get_element_by_id(&target) {
        if panel.class_list().contains("panel") {
            return show_panel(&target);
        }
    }
    if let Some(start) = document.get_element_by_id(&format!("start-{target}")) {
        if let Ok(start) = start.dyn_into::<HtmlElement>() {
            start.click();
            return Ok(());
        }
    }
    if call_global_starter(&window, &target) {
        return Ok(());
    }
    // Stay inside the section the trigger lives in.
    if let Ok(Some(parent)) = trigger.closest(".panel") {
        let id = parent.id();
        if !id.is_empty() {
            return show_panel(&id);
        }
    }

    log::warn!("No panel or starter found for {target}");
    alert("This game is not loaded yet or could not be found. Please return to the home page.");
    Ok(())
}

/// Wires click handlers on every `.tab` and `.go` trigger.
pub fn install_navigation() -> Result<()> {
    let document = document()?;
    for trigger in query_all(&document, ".tab, .go") {
        let el = trigger.clone();
        let on_click = Closure::<dyn Fn()>::new(move || {
            if let Err(e) = navigate(&el) {
                log::warn!("Navigation failed: {e}");
            }
        });
        trigger
            .add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())
            .map_err(|e| LeaderboardError::Dom(format!("{e:?}")))?;
        // Handlers live as long as the page.
        on_click.forget();
    }
    Ok(())
}
