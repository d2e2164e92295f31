//! Session du navigateur : onglets, favoris et configuration réunis.
//!
//! ```text
//! saisie ──▶ Browser::navigate_active
//!              ├─ http://tabshell.<zone>/<action> → PageAction (jamais chargé)
//!              └─ sinon → TabStore → AddressResolver → IsolationLayerBuilder
//! ```
//!
//! Les pages internes déclenchent leurs actions (enregistrer les réglages,
//! vider l'historique…) en naviguant vers des URLs réservées. Elles sont
//! interceptées ici, avant toute résolution.

use chrono::Local;
use tracing::{info, warn};

use crate::address::{AddressResolver, Destination, InternalPage};
use crate::bookmarks::BookmarkStore;
use crate::config::Config;
use crate::export::{self, Snapshot};
use crate::history::HistoryLog;
use crate::internal_pages::{self, PageAction, PageSnapshot};
use crate::isolation::{ContentDescriptor, IsolationLayerBuilder};
use crate::tabs::{ClosedTab, Tab, TabId, TabStore};

/// État complet d'une session.
#[derive(Debug)]
pub struct Browser {
    tabs: TabStore,
    bookmarks: BookmarkStore,
    config: Config,
    /// Écrit la configuration sur disque à chaque enregistrement des réglages.
    persist: bool,
}

impl Browser {
    /// Session avec un premier onglet ouvert sur la page d'accueil.
    pub fn new(config: Config) -> Self {
        Self::with_initial(config, None)
    }

    /// Session dont le premier onglet s'ouvre sur `address` (page
    /// d'accueil si absente ou vide). N'ajoute rien à l'historique.
    pub fn with_initial(config: Config, address: Option<&str>) -> Self {
        let resolver = AddressResolver::new(config.search.template.clone());
        let home = home_destination(&resolver, &config);
        let mut tabs = TabStore::new(
            resolver,
            IsolationLayerBuilder::default(),
            config.isolation.policy(),
        )
        .with_home(home);
        tabs.open(address);

        let bookmarks = if config.bookmarks.seed_defaults {
            BookmarkStore::with_defaults()
        } else {
            BookmarkStore::new()
        };

        info!(
            policy = ?config.isolation.policy(),
            bookmarks = bookmarks.len(),
            "Browser session started"
        );

        Self {
            tabs,
            bookmarks,
            config,
            persist: false,
        }
    }

    pub fn persist_settings(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    // ── Onglets ────────────────────────────────────────────────────────

    pub fn open(&mut self, raw: Option<&str>) -> TabId {
        self.tabs.open(raw)
    }

    pub fn close(&mut self, id: TabId) -> Option<ClosedTab> {
        self.tabs.close(id)
    }

    pub fn select(&mut self, id: TabId) -> bool {
        self.tabs.select(id)
    }

    /// Navigue l'onglet `id`. Les URLs d'action sont exécutées au lieu
    /// d'être chargées. Id inconnu → `false`, sans effet, action comprise.
    pub fn navigate(&mut self, id: TabId, raw: &str) -> bool {
        if self.tabs.get(id).is_none() {
            return false;
        }
        match internal_pages::parse_action(raw) {
            Some(action) => self.apply(id, action),
            None => self.tabs.navigate(id, raw),
        }
    }

    /// Point d'entrée de la barre d'adresse.
    pub fn navigate_active(&mut self, raw: &str) -> bool {
        match self.tabs.active_id() {
            Some(id) => self.navigate(id, raw),
            None => self.tabs.navigate_active(raw),
        }
    }

    // ── Favoris ────────────────────────────────────────────────────────

    /// Ajoute ou retire l'onglet actif des favoris. Retourne l'état après
    /// l'appel.
    pub fn toggle_bookmark_active(&mut self) -> Option<bool> {
        let tab = self.tabs.active()?;
        Some(self.bookmarks.toggle(tab.display_name(), tab.destination()))
    }

    pub fn clear_bookmarks(&mut self) {
        self.bookmarks.clear();
    }

    pub fn clear_history(&mut self) {
        self.tabs.clear_history();
    }

    pub fn is_active_bookmarked(&self) -> bool {
        self.tabs
            .active()
            .is_some_and(|tab| self.bookmarks.contains(tab.destination()))
    }

    // ── Rendu et export ────────────────────────────────────────────────

    /// Document à afficher pour l'onglet actif : la page interne rendue,
    /// ou le document de la couche d'isolation la plus externe.
    pub fn render_active(&self) -> Option<String> {
        let tab = self.tabs.active()?;
        match tab.descriptor() {
            ContentDescriptor::Internal(page) => Some(self.render_page(*page, None)),
            ContentDescriptor::Isolated(content) => self
                .tabs
                .builder()
                .store()
                .get(content.entry_reference())
                .map(|document| document.to_string()),
        }
    }

    /// Rend une page interne. `history_query` filtre la page d'historique.
    pub fn render_page(&self, page: InternalPage, history_query: Option<&str>) -> String {
        internal_pages::render(
            page,
            &PageSnapshot {
                tabs: &self.tabs,
                bookmarks: &self.bookmarks,
                history: self.tabs.history(),
                config: &self.config,
                history_query,
            },
        )
    }

    /// Instantané hors ligne de l'onglet actif.
    pub fn export_active(&self) -> Option<Snapshot> {
        let tab = self.tabs.active()?;
        Some(export::snapshot(tab.destination(), tab.display_name(), Local::now()))
    }

    // ── Lecture ────────────────────────────────────────────────────────

    pub fn tabs(&self) -> &TabStore {
        &self.tabs
    }

    pub fn active(&self) -> Option<&Tab> {
        self.tabs.active()
    }

    pub fn bookmarks(&self) -> &BookmarkStore {
        &self.bookmarks
    }

    pub fn history(&self) -> &HistoryLog {
        self.tabs.history()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ── Actions des pages internes ─────────────────────────────────────

    /// `id` est l'onglet d'où vient l'action. Il doit exister.
    fn apply(&mut self, id: TabId, action: PageAction) -> bool {
        match action {
            PageAction::Navigate(text) => self.tabs.navigate(id, &text),
            PageAction::SaveSettings(query) => {
                let config = self.config.clone().with_query_params(&query);
                self.apply_config(config);
                true
            }
            PageAction::RemoveBookmark(destination) => self.bookmarks.remove(&destination),
            PageAction::ClearBookmarks => {
                self.clear_bookmarks();
                true
            }
            PageAction::ClearHistory => {
                self.clear_history();
                true
            }
        }
    }

    /// Les nouveaux réglages s'appliquent aux prochaines navigations.
    fn apply_config(&mut self, config: Config) {
        let resolver = AddressResolver::new(config.search.template.clone());
        self.tabs.set_home(home_destination(&resolver, &config));
        self.tabs.set_resolver(resolver);
        self.tabs.set_policy(config.isolation.policy());
        self.config = config;
        info!(policy = ?self.config.isolation.policy(), "Settings applied");

        if self.persist {
            match self.config.save() {
                Ok(path) => info!(path = %path.display(), "Settings persisted"),
                Err(e) => warn!(error = %e, "Could not persist settings"),
            }
        }
    }
}

impl Default for Browser {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

/// Page d'accueil configurée, ou `chrome://new-tab` si elle est vide.
fn home_destination(resolver: &AddressResolver, config: &Config) -> Destination {
    resolver
        .resolve(&config.general.home_page)
        .unwrap_or_else(Destination::new_tab)
}
