//! Isolation layering for remote content.
//!
//! A remote destination is never embedded directly. The builder synthesizes
//! `N` nested documents, each one an embedding boundary with a fixed
//! capability set, and the innermost one embeds the real URL:
//!
//! ```text
//! shell ──▶ layer 1 (blob:tabshell/7)
//!             └─▶ layer 2 (blob:tabshell/6)
//!                   └─▶ layer 3 (blob:tabshell/5)
//!                         └─▶ https://example.com
//! ```
//!
//! Every layer is a standalone document registered in a [`DocumentStore`]
//! and addressed through a [`DocumentHandle`]. Freshly synthesized documents
//! carry no origin identity of their own, which lets some pages that refuse
//! to be framed by a given parent render anyway. This is best-effort only:
//! it is NOT a security boundary and is not guaranteed to succeed.
//!
//! ## Resource discipline
//!
//! Handles are owned by the [`ContentDescriptor`] that created them (and so
//! by the tab holding that descriptor). Dropping the descriptor revokes every
//! layer document immediately.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use url::Url;

use crate::address::{Destination, InternalPage};
use crate::html;

/// Upper bound on configured nesting depth.
pub const MAX_LAYERS: u8 = 8;

/// Reference prefix for synthesized documents.
const BLOB_PREFIX: &str = "blob:tabshell/";

/// Features delegated to the innermost embed through the `allow` attribute.
const DELEGATED_FEATURES: &str =
    "autoplay; clipboard-write; encrypted-media; picture-in-picture; web-share";

// ─────────────────────────────────────────────────────────────────────────────
// Capabilities
// ─────────────────────────────────────────────────────────────────────────────

/// A permission granted to embedded content. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Scripts,
    Forms,
    SameOrigin,
    Popups,
    Modals,
    Presentation,
    Fullscreen,
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Capability::Scripts,
        Capability::Forms,
        Capability::SameOrigin,
        Capability::Popups,
        Capability::Modals,
        Capability::Presentation,
        Capability::Fullscreen,
    ];

    const fn bit(self) -> u8 {
        1 << self as u8
    }

    /// `sandbox` token for this capability. Fullscreen is not a sandbox
    /// token, it is granted through `allowfullscreen`.
    pub fn sandbox_token(self) -> Option<&'static str> {
        match self {
            Capability::Scripts => Some("allow-scripts"),
            Capability::Forms => Some("allow-forms"),
            Capability::SameOrigin => Some("allow-same-origin"),
            Capability::Popups => Some("allow-popups"),
            Capability::Modals => Some("allow-modals"),
            Capability::Presentation => Some("allow-presentation"),
            Capability::Fullscreen => None,
        }
    }
}

/// Set of [`Capability`] values, chosen once by policy.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    /// Nothing granted. Used when a destination fails validation.
    pub const NONE: CapabilitySet = CapabilitySet(0);

    /// Scripts, forms, same-origin, popups, modals, presentation.
    pub const STANDARD: CapabilitySet = CapabilitySet::NONE
        .with(Capability::Scripts)
        .with(Capability::Forms)
        .with(Capability::SameOrigin)
        .with(Capability::Popups)
        .with(Capability::Modals)
        .with(Capability::Presentation);

    /// [`CapabilitySet::STANDARD`] plus fullscreen.
    pub const EXTENDED: CapabilitySet = CapabilitySet::STANDARD.with(Capability::Fullscreen);

    pub const fn with(self, capability: Capability) -> Self {
        CapabilitySet(self.0 | capability.bit())
    }

    pub const fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Value of the `sandbox` attribute (space-separated tokens).
    pub fn sandbox_attribute(self) -> String {
        self.iter()
            .filter_map(Capability::sandbox_token)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(CapabilitySet::NONE, CapabilitySet::with)
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Policy
// ─────────────────────────────────────────────────────────────────────────────

/// Named policy configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationPreset {
    /// One layer, [`CapabilitySet::STANDARD`].
    #[default]
    Standard,
    /// Three layers, [`CapabilitySet::EXTENDED`].
    Nested,
}

/// How many boundaries to build and what each one grants.
///
/// Layering is a configuration knob: it never depends on the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsolationPolicy {
    layers: u8,
    capabilities: CapabilitySet,
}

impl IsolationPolicy {
    /// Builds a policy, clamping `layers` into `1..=MAX_LAYERS`.
    pub fn new(layers: u8, capabilities: CapabilitySet) -> Self {
        let clamped = layers.clamp(1, MAX_LAYERS);
        if clamped != layers {
            warn!(requested = layers, used = clamped, "Isolation layer count clamped");
        }
        Self {
            layers: clamped,
            capabilities,
        }
    }

    pub fn standard() -> Self {
        Self::new(1, CapabilitySet::STANDARD)
    }

    pub fn nested() -> Self {
        Self::new(3, CapabilitySet::EXTENDED)
    }

    /// Most restrictive policy: one layer, no capabilities.
    pub fn restrictive() -> Self {
        Self::new(1, CapabilitySet::NONE)
    }

    pub fn from_preset(preset: IsolationPreset) -> Self {
        match preset {
            IsolationPreset::Standard => Self::standard(),
            IsolationPreset::Nested => Self::nested(),
        }
    }

    pub fn layers(&self) -> u8 {
        self.layers
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }
}

impl Default for IsolationPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Document store
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct StoreInner {
    next_id: u64,
    documents: HashMap<u64, Rc<str>>,
}

/// In-memory registry of synthesized documents, addressed by
/// `blob:tabshell/<n>` references.
///
/// Cloning yields another view on the same registry.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    inner: Rc<RefCell<StoreInner>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a document and returns the handle owning it.
    pub fn allocate(&self, contents: String) -> DocumentHandle {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.documents.insert(id, Rc::from(contents));
        trace!(id, "Document allocated");
        DocumentHandle {
            id,
            reference: format!("{BLOB_PREFIX}{id}"),
            store: Rc::downgrade(&self.inner),
        }
    }

    /// Looks a document up by reference. `None` once revoked.
    pub fn get(&self, reference: &str) -> Option<Rc<str>> {
        let id: u64 = reference.strip_prefix(BLOB_PREFIX)?.parse().ok()?;
        self.inner.borrow().documents.get(&id).cloned()
    }

    /// Number of documents currently alive.
    pub fn live_count(&self) -> usize {
        self.inner.borrow().documents.len()
    }
}

/// Exclusive handle on a synthesized document. Dropping it revokes the
/// document.
pub struct DocumentHandle {
    id: u64,
    reference: String,
    store: Weak<RefCell<StoreInner>>,
}

impl DocumentHandle {
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Document contents, `None` if the store itself is gone.
    pub fn contents(&self) -> Option<Rc<str>> {
        let store = self.store.upgrade()?;
        store.borrow().documents.get(&self.id).cloned()
    }
}

impl Drop for DocumentHandle {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.borrow_mut().documents.remove(&self.id);
            trace!(id = self.id, "Document revoked");
        }
    }
}

impl fmt::Debug for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DocumentHandle").field(&self.reference).finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Descriptors
// ─────────────────────────────────────────────────────────────────────────────

/// One isolation boundary. Owns the next (inner) boundary.
#[derive(Debug)]
pub struct IsolationLayer {
    depth: u8,
    capabilities: CapabilitySet,
    /// What this layer's document embeds: the inner layer's reference, or
    /// the remote URL for the innermost layer.
    embeds: String,
    handle: DocumentHandle,
    inner: Option<Box<IsolationLayer>>,
}

impl IsolationLayer {
    /// 1 for the outermost layer.
    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    pub fn embeds(&self) -> &str {
        &self.embeds
    }

    pub fn handle(&self) -> &DocumentHandle {
        &self.handle
    }

    pub fn inner(&self) -> Option<&IsolationLayer> {
        self.inner.as_deref()
    }
}

/// Remote content wrapped in at least one isolation layer.
#[derive(Debug)]
pub struct IsolatedContent {
    final_url: String,
    capabilities: CapabilitySet,
    outermost: IsolationLayer,
    degraded: bool,
}

impl IsolatedContent {
    pub fn final_url(&self) -> &str {
        &self.final_url
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    /// Always at least 1.
    pub fn layer_count(&self) -> usize {
        self.layers().count()
    }

    /// Layers from outermost to innermost.
    pub fn layers(&self) -> impl Iterator<Item = &IsolationLayer> {
        std::iter::successors(Some(&self.outermost), |layer| layer.inner())
    }

    /// Reference the shell embeds to display this content.
    pub fn entry_reference(&self) -> &str {
        self.outermost.handle.reference()
    }

    /// `true` when the destination failed validation and the most
    /// restrictive policy was applied instead.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

/// Rendering instructions for a tab's current destination.
#[derive(Debug)]
pub enum ContentDescriptor {
    /// Rendered natively, trusted, no layering.
    Internal(InternalPage),
    Isolated(IsolatedContent),
}

impl ContentDescriptor {
    /// 0 for internal pages.
    pub fn layer_count(&self) -> usize {
        match self {
            ContentDescriptor::Internal(_) => 0,
            ContentDescriptor::Isolated(content) => content.layer_count(),
        }
    }

    pub fn capabilities(&self) -> Option<CapabilitySet> {
        match self {
            ContentDescriptor::Internal(_) => None,
            ContentDescriptor::Isolated(content) => Some(content.capabilities()),
        }
    }

    pub fn as_isolated(&self) -> Option<&IsolatedContent> {
        match self {
            ContentDescriptor::Internal(_) => None,
            ContentDescriptor::Isolated(content) => Some(content),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
enum InvalidDestination {
    #[error("unparseable URL: {0}")]
    Parse(#[from] url::ParseError),
    #[error("unsupported scheme `{0}`")]
    Scheme(String),
    #[error("URL has no host")]
    NoHost,
}

fn validate(raw: &str) -> Result<Url, InvalidDestination> {
    let url = Url::parse(raw)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(InvalidDestination::Scheme(url.scheme().to_string()));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(InvalidDestination::NoHost);
    }
    Ok(url)
}

/// Builds [`ContentDescriptor`]s, allocating layer documents in its store.
#[derive(Debug, Clone, Default)]
pub struct IsolationLayerBuilder {
    store: DocumentStore,
}

impl IsolationLayerBuilder {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Never fails: an invalid destination degrades to a single layer with
    /// no capabilities.
    pub fn build(&self, destination: &Destination, policy: &IsolationPolicy) -> ContentDescriptor {
        let raw = match destination {
            Destination::Internal(page) => return ContentDescriptor::Internal(*page),
            Destination::Url(raw) => raw,
        };

        let (final_url, policy, degraded) = match validate(raw) {
            Ok(url) => (url.to_string(), *policy, false),
            Err(error) => {
                warn!(
                    url = %raw,
                    %error,
                    "Destination failed validation, using restrictive isolation"
                );
                (raw.clone(), IsolationPolicy::restrictive(), true)
            }
        };

        let title = destination.display_name();
        let outermost = self.build_chain(&title, &final_url, &policy);

        debug!(
            url = %final_url,
            layers = policy.layers(),
            capabilities = ?policy.capabilities(),
            entry = %outermost.handle.reference(),
            "Isolation layers built"
        );

        ContentDescriptor::Isolated(IsolatedContent {
            final_url,
            capabilities: policy.capabilities(),
            outermost,
            degraded,
        })
    }

    /// Builds innermost first, so each layer can embed the reference of
    /// the one it wraps.
    fn build_chain(
        &self,
        title: &str,
        final_url: &str,
        policy: &IsolationPolicy,
    ) -> IsolationLayer {
        let capabilities = policy.capabilities();
        let innermost_depth = policy.layers();

        let mut layer = IsolationLayer {
            depth: innermost_depth,
            capabilities,
            embeds: final_url.to_string(),
            handle: self
                .store
                .allocate(layer_document(title, final_url, capabilities, true)),
            inner: None,
        };

        for depth in (1..innermost_depth).rev() {
            let target = layer.handle.reference().to_string();
            let handle = self
                .store
                .allocate(layer_document(title, &target, capabilities, false));
            layer = IsolationLayer {
                depth,
                capabilities,
                embeds: target,
                handle,
                inner: Some(Box::new(layer)),
            };
        }

        layer
    }
}

fn layer_document(title: &str, src: &str, capabilities: CapabilitySet, innermost: bool) -> String {
    let fullscreen = if capabilities.contains(Capability::Fullscreen) {
        " allowfullscreen"
    } else {
        ""
    };
    let allow = if innermost {
        format!(r#" allow="{DELEGATED_FEATURES}""#)
    } else {
        String::new()
    };
    format!(
        r#"<!DOCTYPE html>
<html style="height:100%;margin:0;padding:0">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
html, body {{ margin: 0; padding: 0; width: 100%; height: 100%; overflow: hidden; background: #fff; }}
iframe {{ width: 100%; height: 100%; border: none; }}
</style>
</head>
<body>
<iframe src="{src}" sandbox="{sandbox}"{fullscreen}{allow}></iframe>
</body>
</html>"#,
        title = html::escape(title),
        src = html::escape(src),
        sandbox = capabilities.sandbox_attribute(),
    )
}
