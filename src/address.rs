//! Résolution de la barre d'adresse.
//!
//! Transforme le texte saisi par l'utilisateur en [`Destination`] : page
//! interne, URL absolue, ou URL de recherche. Aucune erreur n'est jamais
//! remontée : une URL invalide est détectée plus tard, à la construction
//! des couches d'isolation.

use std::fmt;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use url::Url;

/// Préfixe des pages internes (`chrome://settings`, `chrome://history`, ...).
pub const INTERNAL_SCHEME: &str = "chrome://";

/// Modèle de recherche par défaut. `{query}` est remplacé par la saisie encodée.
pub const DEFAULT_SEARCH_TEMPLATE: &str = "https://www.google.com/search?q={query}&igu=1";

const QUERY_PLACEHOLDER: &str = "{query}";

/// Schémas reconnus tels quels dans la barre d'adresse.
const RECOGNIZED_SCHEMES: [&str; 2] = ["http://", "https://"];

/// Schéma ajouté aux domaines nus (`example.com`).
const DEFAULT_SCHEME: &str = "https://";

/// Nom affiché quand l'URL n'a pas de hostname exploitable.
const FALLBACK_NAME: &str = "Site";

// ─────────────────────────────────────────────────────────────────────────────
// Pages internes
// ─────────────────────────────────────────────────────────────────────────────

/// Pages virtuelles rendues nativement (jamais chargées depuis le réseau).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InternalPage {
    NewTab,
    Settings,
    Extensions,
    Bookmarks,
    History,
}

impl InternalPage {
    pub const ALL: [InternalPage; 5] = [
        InternalPage::NewTab,
        InternalPage::Settings,
        InternalPage::Extensions,
        InternalPage::Bookmarks,
        InternalPage::History,
    ];

    /// Identifiant stable (`new-tab`, `settings`, ...).
    pub fn id(self) -> &'static str {
        match self {
            InternalPage::NewTab => "new-tab",
            InternalPage::Settings => "settings",
            InternalPage::Extensions => "extensions",
            InternalPage::Bookmarks => "bookmarks",
            InternalPage::History => "history",
        }
    }

    /// Titre fixe affiché dans l'onglet.
    pub fn title(self) -> &'static str {
        match self {
            InternalPage::NewTab => "New Tab",
            InternalPage::Settings => "Settings",
            InternalPage::Extensions => "Extensions",
            InternalPage::Bookmarks => "Bookmarks",
            InternalPage::History => "History",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|page| page.id().eq_ignore_ascii_case(id))
    }

    /// Adresse complète telle qu'affichée dans la barre (`chrome://settings`).
    pub fn address(self) -> String {
        format!("{INTERNAL_SCHEME}{}", self.id())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Destination
// ─────────────────────────────────────────────────────────────────────────────

/// Cible de navigation résolue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Page interne, rendue nativement et de confiance.
    Internal(InternalPage),
    /// URL absolue. Conservée telle que résolue : la validation a lieu
    /// au moment de construire les couches d'isolation.
    Url(String),
}

impl Destination {
    /// Destination par défaut d'un nouvel onglet.
    pub fn new_tab() -> Self {
        Destination::Internal(InternalPage::NewTab)
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Destination::Internal(_))
    }

    pub fn internal_page(&self) -> Option<InternalPage> {
        match self {
            Destination::Internal(page) => Some(*page),
            Destination::Url(_) => None,
        }
    }

    /// Libellé dérivé : titre fixe pour les pages internes, hostname sans
    /// `www.` pour les URL, `Site` si l'URL ne se parse pas.
    pub fn display_name(&self) -> String {
        match self {
            Destination::Internal(page) => page.title().to_string(),
            Destination::Url(raw) => host_label(raw),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Internal(page) => write!(f, "{INTERNAL_SCHEME}{}", page.id()),
            Destination::Url(url) => f.write_str(url),
        }
    }
}

fn host_label(raw: &str) -> String {
    let Ok(url) = Url::parse(raw) else {
        return FALLBACK_NAME.to_string();
    };
    let Some(host) = url.host_str() else {
        return FALLBACK_NAME.to_string();
    };
    // Le mapping IDNA de `Url` a déjà retiré les caractères invisibles.
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        host.to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AddressResolver
// ─────────────────────────────────────────────────────────────────────────────

/// Résolveur pur : texte brut → [`Destination`].
#[derive(Debug, Clone)]
pub struct AddressResolver {
    search_template: String,
}

impl AddressResolver {
    /// Crée un résolveur avec un modèle de recherche. Un modèle sans
    /// `{query}` reçoit la requête en suffixe.
    pub fn new(search_template: impl Into<String>) -> Self {
        let mut search_template = search_template.into();
        if !search_template.contains(QUERY_PLACEHOLDER) {
            tracing::warn!(
                template = %search_template,
                "Search template has no {{query}} placeholder, appending query"
            );
            search_template.push_str(QUERY_PLACEHOLDER);
        }
        Self { search_template }
    }

    /// Résolution de la saisie, première règle qui correspond :
    ///
    /// 1. vide / espaces → `None` (l'appelant ignore)
    /// 2. `chrome://<page>` connue → page interne
    /// 3. pas de `.` et pas de schéma reconnu → recherche
    /// 4. schéma reconnu → utilisé tel quel
    /// 5. sinon (domaine nu) → préfixé par `https://`
    pub fn resolve(&self, raw: &str) -> Option<Destination> {
        let input = raw.trim();
        if input.is_empty() {
            return None;
        }

        if let Some(page) = parse_internal(input) {
            return Some(Destination::Internal(page));
        }

        let has_scheme = starts_with_scheme(input);
        if !input.contains('.') && !has_scheme {
            return Some(Destination::Url(self.search_url(input)));
        }

        if has_scheme {
            return Some(Destination::Url(input.to_string()));
        }

        Some(Destination::Url(format!("{DEFAULT_SCHEME}{input}")))
    }

    /// URL de recherche pour une requête libre.
    pub fn search_url(&self, query: &str) -> String {
        self.search_template
            .replace(QUERY_PLACEHOLDER, &encode_component(query))
    }

    pub fn search_template(&self) -> &str {
        &self.search_template
    }
}

impl Default for AddressResolver {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_TEMPLATE)
    }
}

fn parse_internal(input: &str) -> Option<InternalPage> {
    let prefix = input.get(..INTERNAL_SCHEME.len())?;
    if !prefix.eq_ignore_ascii_case(INTERNAL_SCHEME) {
        return None;
    }
    let id = input[INTERNAL_SCHEME.len()..].trim_end_matches('/');
    InternalPage::from_id(id)
}

fn starts_with_scheme(input: &str) -> bool {
    RECOGNIZED_SCHEMES.iter().any(|scheme| {
        input
            .get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

/// Caractères laissés intacts par `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encoding équivalent à `encodeURIComponent`.
pub fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT).to_string()
}
