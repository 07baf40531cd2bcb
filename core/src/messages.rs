//! User-facing text for pipeline errors.
//!
//! Rendering is a pure function of the error. Only the two fixed messages
//! are translated here; `Domain` errors already carry text written by the
//! API and are passed through untouched.

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ErrorKind, NETWORK_MESSAGE, SERVER_MESSAGE};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Fr,
    Rw,
}

impl Locale {
    /// Parse a language tag such as `fr` or `fr-FR`. Unknown tags fall
    /// back to English.
    pub fn from_tag(tag: &str) -> Self {
        let primary = tag.split(['-', '_']).next().unwrap_or_default();
        match primary.to_ascii_lowercase().as_str() {
            "fr" => Locale::Fr,
            "rw" => Locale::Rw,
            _ => Locale::En,
        }
    }

    pub fn message(self, error: &ApiError) -> String {
        match error.kind() {
            ErrorKind::Network => self.network().to_string(),
            ErrorKind::Server => self.server().to_string(),
            ErrorKind::Domain | ErrorKind::Codec => error.to_string(),
        }
    }

    fn network(self) -> &'static str {
        match self {
            Locale::En => NETWORK_MESSAGE,
            Locale::Fr => "Vérifiez votre connection internet.",
            Locale::Rw => "Murebe ko mufite internet.",
        }
    }

    fn server(self) -> &'static str {
        match self {
            Locale::En => SERVER_MESSAGE,
            Locale::Fr => "Quelque chose s'est mal passé. Veuillez contacter l'assistance.",
            Locale::Rw => "Hari ibitagenze neza. Hamagara customer support.",
        }
    }
}
