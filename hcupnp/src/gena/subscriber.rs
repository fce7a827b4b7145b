//! Abonnés aux événements et analyse des en-têtes SUBSCRIBE.

use super::EventSeq;
use std::time::{Duration, Instant};
use url::Url;

/// Durée de vie par défaut d'une souscription (5 minutes).
///
/// Appliquée quand l'en-tête TIMEOUT est absent, vaut `Second-infinite`,
/// ou ne peut pas être analysé.
pub const DEFAULT_SUBSCRIPTION_TIMEOUT: Duration = Duration::from_secs(300);

/// Un abonné aux événements du service.
#[derive(Debug, Clone)]
pub struct Subscriber {
    /// Identifiant de souscription (SID), opaque et unique
    pub sid: String,

    /// URLs de callback, dans l'ordre donné par l'en-tête CALLBACK
    pub callbacks: Vec<Url>,

    /// Expiration absolue de la souscription
    pub expires_at: Instant,

    /// Compteur SEQ de l'abonné
    pub(crate) seq: EventSeq,
}

impl Subscriber {
    pub fn new(sid: String, callbacks: Vec<Url>, lifetime: Duration) -> Self {
        Self {
            sid,
            callbacks,
            expires_at: Instant::now() + lifetime,
            seq: EventSeq::new(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Prolonge la souscription, sans toucher au compteur SEQ.
    pub fn renew(&mut self, lifetime: Duration) {
        self.expires_at = Instant::now() + lifetime;
    }
}

/// Analyse un en-tête CALLBACK : un ou plusieurs tokens `<url>`.
///
/// Seules les URLs http(s) valides sont retenues, dans l'ordre.
pub fn parse_callback_header(raw: &str) -> Vec<Url> {
    let mut urls = Vec::new();
    let mut rest = raw;

    while let Some(start) = rest.find('<') {
        let Some(end) = rest[start..].find('>') else {
            break;
        };
        let token = &rest[start + 1..start + end];
        if let Ok(url) = Url::parse(token.trim()) {
            if url.scheme() == "http" || url.scheme() == "https" {
                urls.push(url);
            }
        }
        rest = &rest[start + end + 1..];
    }

    urls
}

/// Analyse un en-tête TIMEOUT au format `Second-<n>`.
///
/// Absent, `Second-infinite` ou inanalysable ⇒ durée par défaut.
pub fn parse_timeout_header(raw: &str) -> Duration {
    let raw = raw.trim();
    let Some(value) = raw
        .strip_prefix("Second-")
        .or_else(|| raw.strip_prefix("second-"))
    else {
        return DEFAULT_SUBSCRIPTION_TIMEOUT;
    };

    match value.parse::<u64>() {
        Ok(seconds) => Duration::from_secs(seconds),
        Err(_) => DEFAULT_SUBSCRIPTION_TIMEOUT,
    }
}

/// Formate la durée de vie restante pour l'en-tête TIMEOUT de la réponse.
pub fn format_timeout(lifetime: Duration) -> String {
    format!("Second-{}", lifetime.as_secs())
}
