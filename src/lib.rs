//! # BlurGuard — flou de confidentialité des écrans sensibles
//!
//! Quand l'application passe en arrière-plan, l'écran qui affiche des
//! données sensibles (identifiants enregistrés, mots de passe) est recouvert
//! d'une capture floutée. Au retour, l'overlay n'est retiré qu'après une
//! authentification réussie, si les métadonnées enregistrées l'exigent.
//!
//! ## Architecture des modules
//!
//! - [`guard`] : Machine à états [`BlurGuard`](guard::BlurGuard) — possède l'écran,
//!   ses abonnements de cycle de vie et le challenge en cours.
//!
//! - [`screen`] : Trait [`GuardedScreen`](screen::GuardedScreen), capacité minimale
//!   qu'un écran doit offrir (overlay, retour à la racine).
//!
//! - [`lifecycle`] : Événements de cycle de vie, abonnements typés annulables et
//!   correspondance avec les événements fenêtre Winit.
//!
//! - [`auth`] : Challenge d'authentification asynchrone (tickets, responder,
//!   réveil de l'hôte).
//!
//! - [`keychain`] : Métadonnées d'authentification enregistrées (code, biométrie,
//!   intervalle de revalidation).
//!
//! - [`capture`] / [`blur`] : Snapshot RGBA d'un écran et filtre de flou boîte.
//!
//! - [`config`] : Configuration TOML (paramètres du flou, authentification).
//!
//! Hors périmètre : moteur de rendu, réseau, stockage des favoris, vérification
//! réelle des empreintes ou du code — ce sont des collaborateurs externes.

pub mod auth;
pub mod blur;
pub mod capture;
pub mod config;
pub mod error;
pub mod guard;
pub mod keychain;
pub mod lifecycle;
pub mod screen;

#[cfg(test)]
mod testing;

pub use error::{GuardError, Result};
pub use guard::{BlurGuard, Collaborators, Phase};
