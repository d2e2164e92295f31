//! # TabShell — cœur d'un navigateur à onglets
//!
//! Résolution d'adresses, isolation du contenu distant dans des couches
//! emboîtées, gestion des onglets, favoris et historique. Aucun moteur de
//! rendu ici : le contenu distant est décrit par des documents d'isolation
//! que l'hôte affiche.
//!
//! ## Architecture des modules
//!
//! - [`address`] : Saisie de la barre d'adresse → [`address::Destination`]
//!   (page interne `chrome://`, URL, ou recherche).
//!
//! - [`isolation`] : Politique d'isolation et construction de la chaîne de
//!   couches sandboxées. Les documents de chaque couche vivent dans un
//!   [`isolation::DocumentStore`] et sont révoqués quand leur onglet les lâche.
//!
//! - [`tabs`] : Onglets, machine à états et invariant « exactement un actif ».
//!
//! - [`bookmarks`], [`history`] : Stores en mémoire, sans persistance.
//!
//! - [`internal_pages`] : HTML des pages `chrome://` et de leurs actions.
//!
//! - [`export`] : Instantanés « hors ligne » de l'onglet actif.
//!
//! - [`config`] : Configuration TOML (recherche, isolation, page d'accueil).
//!
//! - [`browser`] : Session complète, point d'entrée de la barre d'adresse.

pub mod address;
pub mod bookmarks;
pub mod browser;
pub mod config;
pub mod export;
pub mod history;
pub mod html;
pub mod internal_pages;
pub mod isolation;
pub mod tabs;
