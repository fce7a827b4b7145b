//! Livraison des notifications d'événements GENA.
//!
//! La livraison est "fire-and-forget" : un échec (timeout, connexion,
//! statut non-2xx) est journalisé par URL et n'est jamais réessayé ni
//! remonté à l'appelant.

use quick_xml::escape::escape;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Timeout des requêtes NOTIFY sortantes.
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Expéditeur des requêtes NOTIFY vers les callbacks des abonnés.
#[derive(Clone)]
pub struct EventNotifier {
    client: reqwest::Client,
}

impl EventNotifier {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(NOTIFY_TIMEOUT)
            .build()
            .expect("HTTP client construction cannot fail with these options");
        Self { client }
    }

    /// Livre un payload à toutes les URLs de callback d'un abonné.
    ///
    /// Chaque URL est tentée indépendamment ; les échecs sont journalisés
    /// et n'affectent pas les autres URLs.
    pub async fn deliver(&self, sid: &str, seq: u32, callbacks: &[Url], body: &str) {
        for url in callbacks {
            let request = self
                .client
                .request(reqwest::Method::from_bytes(b"NOTIFY").unwrap(), url.clone())
                .header("CONTENT-TYPE", "text/xml; charset=\"utf-8\"")
                .header("NT", "upnp:event")
                .header("NTS", "upnp:propchange")
                .header("SID", sid)
                .header("SEQ", seq.to_string())
                .body(body.to_string());

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("✅ NOTIFY SEQ={} delivered to {}", seq, url);
                }
                Ok(response) => {
                    warn!(
                        "⚠️ NOTIFY SEQ={} to {} answered {}",
                        seq,
                        url,
                        response.status()
                    );
                }
                Err(e) => {
                    warn!("❌ Failed to notify {}: {}", url, e);
                }
            }
        }
    }
}

impl Default for EventNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Sérialise un lot de variables changées en property set GENA.
///
/// Format : `<e:propertyset>` avec une `<e:property>` par variable, les
/// valeurs échappées XML.
pub fn property_set(variables: &HashMap<String, String>) -> String {
    let mut body = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">"#.to_string();
    for (name, value) in variables {
        body.push_str(&format!(
            "<e:property><{0}>{1}</{0}></e:property>",
            name,
            escape(value.as_str())
        ));
    }
    body.push_str("</e:propertyset>");
    body
}
