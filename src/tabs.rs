//! Onglets et machine à états de navigation.
//!
//! ```text
//! Created ──▶ Active ⇄ Background ──▶ Closed
//! ```
//!
//! Invariants maintenus après chaque opération :
//! - au moins un onglet existe une fois le store initialisé ;
//! - exactement un onglet est `Active` ;
//! - un [`TabId`] n'est jamais réutilisé. Les recherches se font par id,
//!   jamais par position (la position change à chaque fermeture).
//!
//! Le store possède les descripteurs de contenu de ses onglets : remplacer
//! ou fermer un onglet libère immédiatement ses documents d'isolation.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use tracing::{debug, info};

use crate::address::{AddressResolver, Destination};
use crate::history::HistoryLog;
use crate::isolation::{ContentDescriptor, IsolationLayerBuilder, IsolationPolicy};

/// Identifiant opaque et stable d'un onglet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TabId(u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TabId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(TabId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabState {
    Created,
    Active,
    Background,
    /// Terminal. Only observable through [`ClosedTab`].
    Closed,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tab
// ─────────────────────────────────────────────────────────────────────────────

/// Un onglet navigable.
#[derive(Debug)]
pub struct Tab {
    id: TabId,
    state: TabState,
    destination: Destination,
    display_name: String,
    descriptor: ContentDescriptor,
}

impl Tab {
    pub fn id(&self) -> TabId {
        self.id
    }

    pub fn state(&self) -> TabState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TabState::Active
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn descriptor(&self) -> &ContentDescriptor {
        &self.descriptor
    }

    /// Transition vers `Closed`. Consomme l'onglet : son descripteur (et
    /// donc chaque document d'isolation) est libéré ici.
    fn close(self) -> ClosedTab {
        ClosedTab {
            id: self.id,
            destination: self.destination,
            display_name: self.display_name,
        }
    }
}

/// Ce qu'il reste d'un onglet fermé. Ne détient plus aucune ressource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedTab {
    pub id: TabId,
    pub destination: Destination,
    pub display_name: String,
}

impl ClosedTab {
    pub fn state(&self) -> TabState {
        TabState::Closed
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TabStore
// ─────────────────────────────────────────────────────────────────────────────

/// Collection ordonnée d'onglets et pointeur vers l'onglet actif.
///
/// Un seul appelant (boucle UI). Toutes les opérations sont synchrones et
/// ne laissent aucun état partiel visible.
#[derive(Debug)]
pub struct TabStore {
    tabs: Vec<Tab>,
    active: Option<TabId>,
    next_id: u64,
    resolver: AddressResolver,
    builder: IsolationLayerBuilder,
    policy: IsolationPolicy,
    home: Destination,
    history: HistoryLog,
}

impl TabStore {
    /// Store vide. Utiliser [`TabStore::init`] pour obtenir un store qui
    /// respecte déjà l'invariant « au moins un onglet ».
    pub fn new(
        resolver: AddressResolver,
        builder: IsolationLayerBuilder,
        policy: IsolationPolicy,
    ) -> Self {
        Self {
            tabs: Vec::new(),
            active: None,
            next_id: 1,
            resolver,
            builder,
            policy,
            home: Destination::new_tab(),
            history: HistoryLog::new(),
        }
    }

    /// Destination des nouveaux onglets (par défaut `chrome://new-tab`).
    pub fn with_home(mut self, home: Destination) -> Self {
        self.home = home;
        self
    }

    /// Store initialisé avec un premier onglet sur la page d'accueil.
    pub fn init(
        resolver: AddressResolver,
        builder: IsolationLayerBuilder,
        policy: IsolationPolicy,
    ) -> Self {
        let mut store = Self::new(resolver, builder, policy);
        store.open(None);
        store
    }

    // ── Opérations ─────────────────────────────────────────────────────

    /// Ouvre un onglet et l'active. Une saisie absente ou vide ouvre la
    /// page d'accueil. N'échoue jamais.
    pub fn open(&mut self, raw: Option<&str>) -> TabId {
        let destination = raw
            .and_then(|raw| self.resolver.resolve(raw))
            .unwrap_or_else(|| self.home.clone());
        self.open_destination(destination)
    }

    /// Comme [`TabStore::open`] pour une destination déjà résolue.
    pub fn open_destination(&mut self, destination: Destination) -> TabId {
        let id = TabId(self.next_id);
        self.next_id += 1;

        let descriptor = self.builder.build(&destination, &self.policy);
        let display_name = destination.display_name();
        info!(tab = %id, %destination, layers = descriptor.layer_count(), "Tab opened");

        self.tabs.push(Tab {
            id,
            state: TabState::Created,
            destination,
            display_name,
            descriptor,
        });
        self.activate(id);
        id
    }

    /// Ferme un onglet. Id inconnu → `None`, sans effet.
    ///
    /// Si l'onglet fermé était actif, le premier onglet restant devient
    /// actif. Si plus aucun onglet ne reste, un nouvel onglet est ouvert.
    pub fn close(&mut self, id: TabId) -> Option<ClosedTab> {
        let index = self.position(id)?;
        let closed = self.tabs.remove(index).close();
        info!(tab = %id, destination = %closed.destination, "Tab closed");

        if self.active == Some(id) {
            self.active = None;
            if let Some(first) = self.tabs.first().map(Tab::id) {
                self.activate(first);
            }
        }

        if self.tabs.is_empty() {
            debug!("Last tab closed, opening a replacement");
            self.open(None);
        }

        Some(closed)
    }

    /// Navigue l'onglet `id` vers la saisie brute. Ne change pas l'onglet
    /// actif. Retourne `false` (sans effet) pour une saisie vide ou un id
    /// inconnu.
    pub fn navigate(&mut self, id: TabId, raw: &str) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let Some(destination) = self.resolver.resolve(raw) else {
            return false;
        };

        let descriptor = self.builder.build(&destination, &self.policy);
        let display_name = destination.display_name();
        info!(tab = %id, %destination, layers = descriptor.layer_count(), "Tab navigated");

        let tab = &mut self.tabs[index];
        // L'ancien descripteur est libéré ici.
        tab.descriptor = descriptor;
        tab.display_name = display_name.clone();
        tab.destination = destination.clone();

        self.history.record(destination, display_name);
        true
    }

    /// Navigue l'onglet actif, ou ouvre un onglet s'il n'y en a aucun.
    pub fn navigate_active(&mut self, raw: &str) -> bool {
        match self.active {
            Some(id) => self.navigate(id, raw),
            None if self.resolver.resolve(raw).is_some() => {
                self.open(Some(raw));
                true
            }
            None => false,
        }
    }

    /// Rend `id` actif. Id inconnu → `false`, sans effet.
    pub fn select(&mut self, id: TabId) -> bool {
        if self.position(id).is_none() {
            return false;
        }
        self.activate(id);
        true
    }

    /// Remplace la politique d'isolation. S'applique aux prochaines
    /// navigations, les descripteurs existants ne sont pas reconstruits.
    pub fn set_policy(&mut self, policy: IsolationPolicy) {
        self.policy = policy;
    }

    pub fn set_home(&mut self, home: Destination) {
        self.home = home;
    }

    pub fn set_resolver(&mut self, resolver: AddressResolver) {
        self.resolver = resolver;
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    // ── Lecture ────────────────────────────────────────────────────────

    /// Onglets dans l'ordre d'affichage.
    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn get(&self, id: TabId) -> Option<&Tab> {
        self.tabs.iter().find(|tab| tab.id == id)
    }

    pub fn active_id(&self) -> Option<TabId> {
        self.active
    }

    pub fn active(&self) -> Option<&Tab> {
        self.active.and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn resolver(&self) -> &AddressResolver {
        &self.resolver
    }

    pub fn policy(&self) -> &IsolationPolicy {
        &self.policy
    }

    pub fn home(&self) -> &Destination {
        &self.home
    }

    pub fn builder(&self) -> &IsolationLayerBuilder {
        &self.builder
    }

    // ── Interne ────────────────────────────────────────────────────────

    fn position(&self, id: TabId) -> Option<usize> {
        self.tabs.iter().position(|tab| tab.id == id)
    }

    /// Démote l'onglet actif courant et promeut `id`. `id` doit exister.
    fn activate(&mut self, id: TabId) {
        for tab in &mut self.tabs {
            tab.state = if tab.id == id {
                TabState::Active
            } else if tab.state == TabState::Active {
                TabState::Background
            } else {
                tab.state
            };
        }
        if self.active != Some(id) {
            debug!(tab = %id, previous = ?self.active, "Active tab changed");
        }
        self.active = Some(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::InternalPage;
    use proptest::prelude::*;

    fn store() -> TabStore {
        TabStore::init(
            AddressResolver::default(),
            IsolationLayerBuilder::default(),
            IsolationPolicy::standard(),
        )
    }

    fn nested_store() -> TabStore {
        TabStore::init(
            AddressResolver::default(),
            IsolationLayerBuilder::default(),
            IsolationPolicy::nested(),
        )
    }

    fn assert_invariants(store: &TabStore) {
        assert!(!store.is_empty(), "store must never be left empty");
        let active: Vec<_> = store.tabs().iter().filter(|t| t.is_active()).collect();
        assert_eq!(active.len(), 1, "exactly one active tab");
        assert_eq!(store.active_id(), Some(active[0].id()));
        assert!(store.tabs().iter().all(|t| t.state() != TabState::Created));
    }

    #[test]
    fn test_init_opens_new_tab_page() {
        let store = store();
        assert_eq!(store.len(), 1);
        let tab = store.active().unwrap();
        assert_eq!(tab.destination(), &Destination::new_tab());
        assert_eq!(tab.display_name(), "New Tab");
        assert!(matches!(
            tab.descriptor(),
            ContentDescriptor::Internal(InternalPage::NewTab)
        ));
        assert!(store.history().is_empty());
        assert_invariants(&store);
    }

    #[test]
    fn test_open_demotes_previous_active() {
        let mut store = store();
        let first = store.active_id().unwrap();
        let second = store.open(Some("example.com"));

        assert_eq!(store.active_id(), Some(second));
        assert_eq!(store.get(first).unwrap().state(), TabState::Background);
        assert_eq!(store.get(second).unwrap().display_name(), "example.com");
        assert_invariants(&store);
    }

    #[test]
    fn test_open_with_blank_input_uses_home() {
        let mut store = store().with_home(Destination::Internal(InternalPage::Bookmarks));
        let id = store.open(Some("   "));
        assert_eq!(
            store.get(id).unwrap().destination(),
            &Destination::Internal(InternalPage::Bookmarks)
        );
    }

    #[test]
    fn test_close_active_first_promotes_next_first() {
        let mut store = store();
        let a = store.active_id().unwrap();
        let b = store.open(Some("b.com"));
        let c = store.open(Some("c.com"));
        store.select(a);

        let closed = store.close(a).unwrap();
        assert_eq!(closed.state(), TabState::Closed);
        assert_eq!(store.active_id(), Some(b));
        assert_eq!(store.tabs().iter().map(Tab::id).collect::<Vec<_>>(), vec![b, c]);
        assert_invariants(&store);
    }

    #[test]
    fn test_close_active_last_promotes_first_not_adjacent() {
        let mut store = store();
        let a = store.active_id().unwrap();
        store.open(Some("b.com"));
        let c = store.open(Some("c.com"));

        store.close(c);
        assert_eq!(store.active_id(), Some(a));
        assert_invariants(&store);
    }

    #[test]
    fn test_close_background_keeps_active() {
        let mut store = store();
        let a = store.active_id().unwrap();
        let b = store.open(Some("b.com"));
        store.close(a);
        assert_eq!(store.active_id(), Some(b));
        assert_invariants(&store);
    }

    #[test]
    fn test_close_last_tab_opens_replacement() {
        let mut store = store();
        let a = store.active_id().unwrap();
        store.navigate(a, "example.com");

        store.close(a);
        assert_eq!(store.len(), 1);
        let tab = store.active().unwrap();
        assert_ne!(tab.id(), a);
        assert_eq!(tab.destination(), &Destination::new_tab());
        assert_invariants(&store);
    }

    #[test]
    fn test_close_unknown_or_closed_is_noop() {
        let mut store = store();
        let a = store.active_id().unwrap();
        store.open(Some("b.com"));
        assert!(store.close(a).is_some());
        assert!(store.close(a).is_none());
        assert!(store.close(TabId(999)).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut store = store();
        let mut seen = vec![store.active_id().unwrap()];
        for _ in 0..5 {
            let id = store.active_id().unwrap();
            store.close(id);
            let new_id = store.active_id().unwrap();
            assert!(!seen.contains(&new_id));
            seen.push(new_id);
        }
    }

    #[test]
    fn test_navigate_background_tab_keeps_active() {
        let mut store = store();
        let a = store.active_id().unwrap();
        let b = store.open(None);

        assert!(store.navigate(a, "rust-lang.org"));
        assert_eq!(store.active_id(), Some(b));
        assert_eq!(store.get(a).unwrap().display_name(), "rust-lang.org");
        assert_eq!(store.get(a).unwrap().state(), TabState::Background);
    }

    #[test]
    fn test_navigate_appends_exactly_one_history_entry() {
        let mut store = store();
        let a = store.active_id().unwrap();
        store.navigate(a, "example.com");
        store.navigate(a, "pizza");
        store.navigate(a, "chrome://settings");

        let names: Vec<_> = store
            .history()
            .recent()
            .map(|e| e.display_name.clone())
            .collect();
        assert_eq!(names, ["Settings", "google.com", "example.com"]);
    }

    #[test]
    fn test_navigate_empty_or_unknown_is_noop() {
        let mut store = store();
        let a = store.active_id().unwrap();
        assert!(!store.navigate(a, "  "));
        assert!(!store.navigate(TabId(42), "example.com"));
        assert!(store.history().is_empty());
        assert_eq!(store.get(a).unwrap().destination(), &Destination::new_tab());
    }

    #[test]
    fn test_navigate_releases_previous_layers() {
        let mut store = nested_store();
        let a = store.active_id().unwrap();
        let documents = store.builder().store().clone();

        store.navigate(a, "example.com");
        assert_eq!(documents.live_count(), 3);
        let old_entry = store
            .get(a)
            .unwrap()
            .descriptor()
            .as_isolated()
            .unwrap()
            .entry_reference()
            .to_string();

        store.navigate(a, "rust-lang.org");
        assert_eq!(documents.live_count(), 3);
        assert!(documents.get(&old_entry).is_none());

        store.navigate(a, "chrome://history");
        assert_eq!(documents.live_count(), 0);
    }

    #[test]
    fn test_close_releases_layers() {
        let mut store = nested_store();
        let documents = store.builder().store().clone();
        let b = store.open(Some("example.com"));
        assert_eq!(documents.live_count(), 3);

        store.close(b);
        assert_eq!(documents.live_count(), 0);
    }

    #[test]
    fn test_select() {
        let mut store = store();
        let a = store.active_id().unwrap();
        let b = store.open(None);
        assert!(store.select(a));
        assert_eq!(store.get(b).unwrap().state(), TabState::Background);
        assert!(!store.select(TabId(77)));
        assert_eq!(store.active_id(), Some(a));
        assert_invariants(&store);
    }

    #[test]
    fn test_navigate_active_on_empty_store_opens() {
        let mut store = TabStore::new(
            AddressResolver::default(),
            IsolationLayerBuilder::default(),
            IsolationPolicy::standard(),
        );
        assert!(!store.navigate_active(""));
        assert!(store.is_empty());
        assert!(store.navigate_active("example.com"));
        assert_eq!(store.active().unwrap().display_name(), "example.com");
    }

    #[test]
    fn test_policy_change_applies_to_next_navigation() {
        let mut store = store();
        let a = store.active_id().unwrap();
        store.navigate(a, "example.com");
        assert_eq!(store.active().unwrap().descriptor().layer_count(), 1);

        store.set_policy(IsolationPolicy::nested());
        assert_eq!(store.active().unwrap().descriptor().layer_count(), 1);
        store.navigate(a, "example.org");
        assert_eq!(store.active().unwrap().descriptor().layer_count(), 3);
    }

    #[test]
    fn test_tab_id_parse() {
        assert_eq!("12".parse::<TabId>(), Ok(TabId(12)));
        assert!("x".parse::<TabId>().is_err());
        assert_eq!(TabId(3).to_string(), "3");
    }

    #[derive(Debug, Clone)]
    enum Op {
        Open(bool),
        CloseActive,
        CloseNth(usize),
        CloseStale(u64),
        Select(usize),
        Navigate(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<bool>().prop_map(Op::Open),
            Just(Op::CloseActive),
            (0usize..8).prop_map(Op::CloseNth),
            (0u64..64).prop_map(Op::CloseStale),
            (0usize..8).prop_map(Op::Select),
            (0usize..8).prop_map(Op::Navigate),
        ]
    }

    proptest! {
        #[test]
        fn test_open_close_from_empty_store(
            closes in prop::collection::vec(any::<Option<usize>>(), 1..30),
        ) {
            let mut store = TabStore::new(
                AddressResolver::default(),
                IsolationLayerBuilder::default(),
                IsolationPolicy::standard(),
            );
            prop_assert!(store.active_id().is_none());

            for close in closes {
                match close {
                    None => {
                        store.open(None);
                    }
                    Some(n) if !store.is_empty() => {
                        let id = store.tabs()[n % store.len()].id();
                        store.close(id);
                    }
                    Some(_) => {
                        store.open(Some("example.com"));
                    }
                }
                prop_assert!(!store.is_empty());
                prop_assert_eq!(store.tabs().iter().filter(|t| t.is_active()).count(), 1);
            }
        }

        #[test]
        fn test_invariants_hold_for_any_sequence(ops in prop::collection::vec(op(), 1..40)) {
            let mut store = store();
            let documents = store.builder().store().clone();
            let mut history_len = 0;

            for op in ops {
                let nth = |store: &TabStore, n: usize| store.tabs()[n % store.len()].id();
                match op {
                    Op::Open(remote) => {
                        store.open(remote.then_some("example.com"));
                    }
                    Op::CloseActive => {
                        let id = store.active_id().unwrap();
                        store.close(id);
                    }
                    Op::CloseNth(n) => {
                        let id = nth(&store, n);
                        store.close(id);
                    }
                    Op::CloseStale(raw) => {
                        store.close(TabId(raw));
                    }
                    Op::Select(n) => {
                        let id = nth(&store, n);
                        store.select(id);
                    }
                    Op::Navigate(n) => {
                        let id = nth(&store, n);
                        prop_assert!(store.navigate(id, "rust-lang.org"));
                        history_len += 1;
                    }
                }

                prop_assert!(!store.is_empty());
                prop_assert_eq!(store.tabs().iter().filter(|t| t.is_active()).count(), 1);
                prop_assert_eq!(store.history().len(), history_len);
                let remote_tabs = store
                    .tabs()
                    .iter()
                    .filter(|t| !t.destination().is_internal())
                    .count();
                prop_assert_eq!(documents.live_count(), remote_tabs);
            }
        }
    }
}
