//! HTML generation for the `chrome://` internal pages and their actions.
//!
//! Pages are rendered from read-only snapshots of the bookmark, history and
//! tab stores. User actions on a page (saving settings, removing a bookmark,
//! clearing history) are expressed as navigations to reserved
//! `http://tabshell.<area>/<action>` URLs, intercepted by
//! [`crate::browser::Browser`] before any resolution happens.

use crate::address::{Destination, InternalPage, encode_component};
use crate::bookmarks::{BookmarkStore, NEW_TAB_TILES};
use crate::config::Config;
use crate::history::HistoryLog;
use crate::html::escape;
use crate::tabs::TabStore;

/// Reserved domain suffix for page actions.
const ACTION_DOMAIN: &str = "tabshell.";

/// Stock extension listing. Nothing is ever executed.
const EXTENSIONS: [(&str, &str, &str); 2] = [
    (
        "Docs Offline",
        "1.4",
        "Get things done offline with your documents.",
    ),
    ("PDF Viewer", "1.0", "A built-in extension to view PDF files."),
];

/// Read-only view handed to the router.
#[derive(Clone, Copy)]
pub struct PageSnapshot<'a> {
    pub tabs: &'a TabStore,
    pub bookmarks: &'a BookmarkStore,
    pub history: &'a HistoryLog,
    pub config: &'a Config,
    /// Filter applied to the history page.
    pub history_query: Option<&'a str>,
}

/// Renders an internal page as a complete HTML document.
pub fn render(page: InternalPage, snapshot: &PageSnapshot<'_>) -> String {
    let body = match page {
        InternalPage::NewTab => new_tab_body(snapshot.bookmarks),
        InternalPage::Settings => settings_body(snapshot.config),
        InternalPage::Extensions => extensions_body(),
        InternalPage::Bookmarks => bookmarks_body(snapshot.bookmarks),
        InternalPage::History => {
            history_body(snapshot.tabs, snapshot.history, snapshot.history_query)
        }
    };
    document(page.title(), &body)
}

// ─────────────────────────────────────────────────────────────────────────────
// Actions
// ─────────────────────────────────────────────────────────────────────────────

/// An action triggered from an internal page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAction {
    /// Address-bar text typed into the new-tab search box.
    Navigate(String),
    /// Query string of the settings form.
    SaveSettings(String),
    RemoveBookmark(Destination),
    ClearBookmarks,
    ClearHistory,
}

/// Recognizes `http(s)://tabshell.<area>/<action>[?query]` URLs.
pub fn parse_action(raw: &str) -> Option<PageAction> {
    let raw = raw.trim();
    let rest = raw
        .strip_prefix("http://")
        .or_else(|| raw.strip_prefix("https://"))?
        .strip_prefix(ACTION_DOMAIN)?;
    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
    // Une soumission de formulaire sérialise `http://tabshell.search` en `…search/?q=`.
    let path = path.trim_end_matches('/');

    match path {
        "search" => url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "q")
            .map(|(_, value)| PageAction::Navigate(value.into_owned())),
        "settings/save" => Some(PageAction::SaveSettings(query.to_string())),
        "bookmarks/clear" => Some(PageAction::ClearBookmarks),
        "history/clear" => Some(PageAction::ClearHistory),
        "bookmarks/remove" => {
            let target = url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == "url")
                .map(|(_, value)| value.into_owned())?;
            let destination = match target.strip_prefix(crate::address::INTERNAL_SCHEME) {
                Some(id) => Destination::Internal(InternalPage::from_id(id)?),
                None => Destination::Url(target),
            };
            Some(PageAction::RemoveBookmark(destination))
        }
        _ => None,
    }
}

fn action_url(path: &str) -> String {
    format!("http://{ACTION_DOMAIN}{path}")
}

// ─────────────────────────────────────────────────────────────────────────────
// Pages
// ─────────────────────────────────────────────────────────────────────────────

fn document(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
* {{ margin: 0; padding: 0; box-sizing: border-box; }}
body {{
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
    background: #f1f3f4; color: #202124;
}}
header {{ background: #3367d6; color: #fff; height: 56px; display: flex; align-items: center; padding: 0 24px; font-size: 18px; }}
main {{ max-width: 800px; margin: 24px auto; background: #fff; border-radius: 4px; box-shadow: 0 1px 2px rgba(0,0,0,.15); }}
.row {{ display: flex; justify-content: space-between; align-items: center; padding: 14px 16px; border-bottom: 1px solid #eee; }}
.row .name {{ font-size: 14px; font-weight: 500; }}
.row .url {{ font-size: 12px; color: #80868b; }}
.bar {{ display: flex; justify-content: space-between; padding: 14px 16px; background: #fafafa; font-size: 12px; text-transform: uppercase; font-weight: bold; color: #5f6368; }}
.danger {{ color: #d93025; text-decoration: none; }}
.empty {{ padding: 48px; text-align: center; color: #80868b; }}
a {{ color: inherit; }}
label {{ display: flex; justify-content: space-between; align-items: center; margin: 10px 16px; font-size: 14px; }}
input[type="text"], input[type="number"], select {{ flex: 0 0 60%; padding: 6px 10px; border: 1px solid #dadce0; border-radius: 4px; }}
.tiles {{ display: grid; grid-template-columns: repeat(4, 1fr); gap: 16px; max-width: 560px; margin: 32px auto; }}
.tile {{ text-align: center; font-size: 12px; text-decoration: none; }}
.search {{ display: block; width: 560px; margin: 120px auto 0; height: 44px; padding: 0 20px; border: 1px solid #dadce0; border-radius: 22px; }}
</style>
</head>
<body>
{body}
</body>
</html>"#,
        title = escape(title),
    )
}

fn new_tab_body(bookmarks: &BookmarkStore) -> String {
    let mut tiles = String::new();
    for entry in bookmarks.top(NEW_TAB_TILES) {
        tiles.push_str(&format!(
            r#"<a class="tile" href="{href}">{name}</a>
"#,
            href = escape(&entry.destination.to_string()),
            name = escape(&entry.name),
        ));
    }
    tiles.push_str(&format!(
        r#"<a class="tile" href="{}">Add shortcut</a>
"#,
        InternalPage::Bookmarks.address()
    ));

    format!(
        r#"<form action="{action}">
<input class="search" type="text" name="q" placeholder="Search or type a URL" autofocus>
</form>
<div class="tiles">
{tiles}</div>"#,
        action = action_url("search"),
    )
}

fn settings_body(config: &Config) -> String {
    let preset = config.isolation.preset;
    let selected = |nested: bool| {
        if nested == (preset == crate::isolation::IsolationPreset::Nested) {
            " selected"
        } else {
            ""
        }
    };
    format!(
        r#"<header>Settings</header>
<main>
<div class="bar"><span>General</span></div>
<label><span>Window Title</span>
<input type="text" id="window_title" value="{window_title}"></label>
<label><span>Home Page</span>
<input type="text" id="home_page" value="{home_page}"></label>

<div class="bar"><span>Search</span></div>
<label><span>Search Template</span>
<input type="text" id="search_template" value="{search_template}"></label>

<div class="bar"><span>Isolation</span></div>
<label><span>Preset</span>
<select id="isolation_preset">
<option value="standard"{standard}>Standard (1 layer)</option>
<option value="nested"{nested}>Nested (3 layers)</option>
</select></label>
<label><span>Layer Override</span>
<input type="number" id="isolation_layers" value="{layers}" min="1" max="{max_layers}"></label>

<div class="bar"><span>Bookmarks</span></div>
<label><span>Seed default bookmarks</span>
<input type="checkbox" id="seed_bookmarks"{seed}></label>

<div class="row"><a class="name" href="javascript:save()">Save Settings</a></div>
</main>
<script>
function enc(s) {{ return encodeURIComponent(s); }}
function val(id) {{ return document.getElementById(id).value; }}
function save() {{
    var q = "window_title=" + enc(val("window_title"))
        + "&home_page=" + enc(val("home_page"))
        + "&search_template=" + enc(val("search_template"))
        + "&isolation_preset=" + val("isolation_preset")
        + "&isolation_layers=" + val("isolation_layers")
        + "&seed_bookmarks=" + document.getElementById("seed_bookmarks").checked;
    window.location.href = "{save_url}?" + q;
}}
</script>"#,
        window_title = escape(&config.general.window_title),
        home_page = escape(&config.general.home_page),
        search_template = escape(&config.search.template),
        standard = selected(false),
        nested = selected(true),
        layers = config.isolation.layers.map(|l| l.to_string()).unwrap_or_default(),
        max_layers = crate::isolation::MAX_LAYERS,
        seed = if config.bookmarks.seed_defaults { " checked" } else { "" },
        save_url = action_url("settings/save"),
    )
}

fn extensions_body() -> String {
    let rows: String = EXTENSIONS
        .iter()
        .map(|(name, version, description)| {
            format!(
                r#"<div class="row"><div><div class="name">{name} <span class="url">{version}</span></div><div class="url">{description}</div></div></div>
"#
            )
        })
        .collect();
    format!("<header>Extensions</header>\n<main>\n{rows}</main>")
}

fn bookmarks_body(bookmarks: &BookmarkStore) -> String {
    let mut rows = String::new();
    for entry in bookmarks.entries() {
        let target = entry.destination.to_string();
        rows.push_str(&format!(
            r#"<div class="row"><a href="{href}"><div class="name">{name}</div><div class="url">{href}</div></a><a class="danger" href="{remove}">Remove</a></div>
"#,
            href = escape(&target),
            name = escape(&entry.name),
            remove = escape(&format!(
                "{}?url={}",
                action_url("bookmarks/remove"),
                encode_component(&target)
            )),
        ));
    }
    if bookmarks.is_empty() {
        rows.push_str("<div class=\"empty\">No bookmarks yet.</div>\n");
    }
    format!(
        r#"<header>Bookmarks</header>
<main>
<div class="bar"><span>All Bookmarks</span><a class="danger" href="{clear}">Clear All</a></div>
{rows}</main>"#,
        clear = action_url("bookmarks/clear"),
    )
}

fn history_body(tabs: &TabStore, history: &HistoryLog, query: Option<&str>) -> String {
    let mut open_tabs = String::new();
    for tab in tabs.tabs() {
        open_tabs.push_str(&format!(
            r#"<div class="row"><div><div class="name">{name}</div><div class="url">{href}</div></div></div>
"#,
            href = escape(&tab.destination().to_string()),
            name = escape(tab.display_name()),
        ));
    }

    let mut rows = String::new();
    for entry in history.search(query.unwrap_or("")) {
        rows.push_str(&format!(
            r#"<div class="row"><a href="{href}"><div class="name">{name}</div><div class="url">{href}</div></a><span class="url">{time}</span></div>
"#,
            href = escape(&entry.destination.to_string()),
            name = escape(&entry.display_name),
            time = entry.timestamp.format("%Y-%m-%d %H:%M"),
        ));
    }
    if rows.is_empty() {
        rows.push_str("<div class=\"empty\">No history yet.</div>\n");
    }
    format!(
        r#"<header>History</header>
<main>
<div class="bar"><span>Open Tabs</span></div>
{open_tabs}<div class="bar"><span>Recent History</span><a class="danger" href="{clear}">Clear History</a></div>
{rows}</main>"#,
        clear = action_url("history/clear"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AddressResolver;
    use crate::isolation::{IsolationLayerBuilder, IsolationPolicy};

    struct Fixture {
        tabs: TabStore,
        bookmarks: BookmarkStore,
        config: Config,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tabs: TabStore::init(
                    AddressResolver::default(),
                    IsolationLayerBuilder::default(),
                    IsolationPolicy::standard(),
                ),
                bookmarks: BookmarkStore::with_defaults(),
                config: Config::default(),
            }
        }

        fn render(&self, page: InternalPage) -> String {
            render(
                page,
                &PageSnapshot {
                    tabs: &self.tabs,
                    bookmarks: &self.bookmarks,
                    history: self.tabs.history(),
                    config: &self.config,
                    history_query: None,
                },
            )
        }
    }

    #[test]
    fn test_every_page_renders_a_document() {
        let fixture = Fixture::new();
        for page in InternalPage::ALL {
            let html = fixture.render(page);
            assert!(html.starts_with("<!DOCTYPE html>"));
            assert!(html.contains(&format!("<title>{}</title>", page.title())));
        }
    }

    #[test]
    fn test_new_tab_shows_bookmark_tiles() {
        let fixture = Fixture::new();
        let html = fixture.render(InternalPage::NewTab);
        assert!(html.contains(r#"href="https://google.com?igu=1">Google</a>"#));
        assert!(html.contains("Add shortcut"));
    }

    #[test]
    fn test_bookmarks_page_escapes_names() {
        let mut fixture = Fixture::new();
        fixture.bookmarks.toggle(
            "<b>x</b>",
            &Destination::Url("https://x.com/?a=1&b=2".into()),
        );
        let html = fixture.render(InternalPage::Bookmarks);
        assert!(html.contains("&lt;b&gt;x&lt;/b&gt;"));
        assert!(html.contains("https://x.com/?a=1&amp;b=2"));
    }

    #[test]
    fn test_empty_bookmarks_message() {
        let mut fixture = Fixture::new();
        fixture.bookmarks = BookmarkStore::new();
        assert!(fixture.render(InternalPage::Bookmarks).contains("No bookmarks yet."));
    }

    #[test]
    fn test_history_page_lists_navigations() {
        let mut fixture = Fixture::new();
        let id = fixture.tabs.active_id().unwrap();
        fixture.tabs.navigate(id, "rust-lang.org");
        let html = fixture.render(InternalPage::History);
        assert!(html.contains("https://rust-lang.org"));
        assert!(html.contains("Open Tabs"));
        assert!(!html.contains("No history yet."));
    }

    #[test]
    fn test_history_page_filter() {
        let mut fixture = Fixture::new();
        let id = fixture.tabs.active_id().unwrap();
        fixture.tabs.navigate(id, "rust-lang.org");
        let html = render(
            InternalPage::History,
            &PageSnapshot {
                tabs: &fixture.tabs,
                bookmarks: &fixture.bookmarks,
                history: fixture.tabs.history(),
                config: &fixture.config,
                history_query: Some("nomatch"),
            },
        );
        assert!(html.contains("No history yet."));
    }

    #[test]
    fn test_settings_page_contains_values() {
        let fixture = Fixture::new();
        let html = fixture.render(InternalPage::Settings);
        assert!(html.contains("TabShell"));
        assert!(html.contains("chrome://new-tab"));
        assert!(html.contains(r#"<option value="standard" selected>"#));
        assert!(html.contains("http://tabshell.settings/save?"));
    }

    #[test]
    fn test_parse_actions() {
        assert_eq!(
            parse_action("http://tabshell.settings/save?isolation_layers=2"),
            Some(PageAction::SaveSettings("isolation_layers=2".into()))
        );
        assert_eq!(
            parse_action("https://tabshell.history/clear"),
            Some(PageAction::ClearHistory)
        );
        assert_eq!(
            parse_action("http://tabshell.bookmarks/clear"),
            Some(PageAction::ClearBookmarks)
        );
        assert_eq!(
            parse_action("http://tabshell.search?q=rust+lang"),
            Some(PageAction::Navigate("rust lang".into()))
        );
        assert_eq!(parse_action("http://tabshell.search"), None);
        assert_eq!(
            parse_action("http://tabshell.history/clear/"),
            Some(PageAction::ClearHistory)
        );
        assert_eq!(parse_action("https://example.com"), None);
        assert_eq!(parse_action("http://tabshell.history/other"), None);
    }

    #[test]
    fn test_search_form_submission_is_recognized() {
        let html = Fixture::new().render(InternalPage::NewTab);
        let action = action_url("search");
        assert!(html.contains(&format!(r#"<form action="{action}">"#)));

        let submitted = url::Url::parse(&format!("{action}?q=rust+lang")).unwrap();
        assert_eq!(submitted.as_str(), "http://tabshell.search/?q=rust+lang");
        assert_eq!(
            parse_action(submitted.as_str()),
            Some(PageAction::Navigate("rust lang".into()))
        );
    }

    #[test]
    fn test_remove_action_round_trips_through_bookmarks_page() {
        let mut fixture = Fixture::new();
        let target = Destination::Url("https://x.com/?a=1&b=2".into());
        fixture.bookmarks = BookmarkStore::new();
        fixture.bookmarks.toggle("x", &target);
        fixture
            .bookmarks
            .toggle("History", &Destination::Internal(InternalPage::History));

        let html = fixture.render(InternalPage::Bookmarks);
        let hrefs: Vec<String> = html
            .match_indices("http://tabshell.bookmarks/remove?url=")
            .map(|(start, _)| {
                let end = start + html[start..].find('"').unwrap();
                html[start..end].replace("&amp;", "&")
            })
            .collect();

        assert_eq!(hrefs.len(), 2);
        assert_eq!(
            parse_action(&hrefs[0]),
            Some(PageAction::RemoveBookmark(target))
        );
        assert_eq!(
            parse_action(&hrefs[1]),
            Some(PageAction::RemoveBookmark(Destination::Internal(
                InternalPage::History
            )))
        );
    }
}
