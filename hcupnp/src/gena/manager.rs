//! Gestion des souscriptions aux événements.
//!
//! La table des abonnés est une [`DashMap`] : les mises à jour d'un même
//! SID (incrément de SEQ, prolongation) sont atomiques entre elles sans
//! verrou global, et les opérations sur des SIDs différents ne se gênent
//! pas. Le gestionnaire est une instance injectée, pas un singleton : les
//! tests peuvent en créer plusieurs indépendants.

use super::notifier::{EventNotifier, property_set};
use super::subscriber::{Subscriber, format_timeout, parse_callback_header, parse_timeout_header};
use super::{GenaStatus, NT_EVENT};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Une souscription sur N est l'occasion d'un balayage des expirées.
const CLEANUP_EVERY: u64 = 500;

/// Délai avant l'envoi de l'état initial à un nouvel abonné.
///
/// Laisse à la réponse SUBSCRIBE le temps d'atteindre le client avant le
/// premier NOTIFY, conformément à la règle des 30 secondes de la spec GENA.
const INITIAL_NOTIFY_DELAY: Duration = Duration::from_secs(2);

/// Source de l'état complet des variables événementielles du service.
///
/// Implémentée par la logique ContentDirectory (collaborateur externe) ;
/// interrogée pour construire l'événement initial d'un nouvel abonné.
pub trait EventedState: Send + Sync {
    /// Instantané complet `nom → valeur` des variables notifiées.
    fn snapshot(&self) -> HashMap<String, String>;
}

/// Résultat d'un SUBSCRIBE, prêt à être transposé en réponse HTTP par la
/// couche de routage externe.
#[derive(Debug, Clone)]
pub struct SubscribeResult {
    pub success: bool,
    pub status: GenaStatus,
    /// SID émis (nouvelle souscription) ou confirmé (renouvellement)
    pub sid: String,
    /// Durée de vie restante, au format `Second-<n>`
    pub timeout: String,
    /// Vrai pour une nouvelle souscription (déclenche l'état initial)
    pub is_new: bool,
}

impl SubscribeResult {
    fn failure(status: GenaStatus, sid: &str) -> Self {
        Self {
            success: false,
            status,
            sid: sid.to_string(),
            timeout: String::new(),
            is_new: false,
        }
    }
}

/// Gestionnaire des souscriptions GENA d'un service.
pub struct SubscriptionManager {
    subscribers: Arc<DashMap<String, Subscriber>>,
    state: Arc<dyn EventedState>,
    notifier: EventNotifier,
    op_count: AtomicU64,
}

impl SubscriptionManager {
    pub fn new(state: Arc<dyn EventedState>) -> Self {
        Self {
            subscribers: Arc::new(DashMap::new()),
            state,
            notifier: EventNotifier::new(),
            op_count: AtomicU64::new(0),
        }
    }

    /// Nombre d'abonnés actuellement en table (expirés compris).
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Traite un SUBSCRIBE (nouvelle souscription ou renouvellement).
    ///
    /// Nouvelle souscription (`sid` vide) : `nt` doit valoir `upnp:event`
    /// et `callback` fournir au moins une URL, sinon 412. Renouvellement
    /// (`sid` non vide) : `nt` et `callback` doivent être vides (400),
    /// le SID doit être connu (412) ; le compteur SEQ n'est pas touché.
    pub fn subscribe(
        &self,
        sid: &str,
        nt: &str,
        callback: &str,
        timeout_header: &str,
    ) -> SubscribeResult {
        self.maybe_cleanup();

        if sid.is_empty() {
            self.subscribe_new(nt, callback, timeout_header)
        } else {
            self.renew(sid, nt, callback, timeout_header)
        }
    }

    fn subscribe_new(&self, nt: &str, callback: &str, timeout_header: &str) -> SubscribeResult {
        if nt != NT_EVENT {
            warn!("❌ SUBSCRIBE rejected: bad NT '{}'", nt);
            return SubscribeResult::failure(GenaStatus::PreconditionFailed, "");
        }

        let callbacks = parse_callback_header(callback);
        if callbacks.is_empty() {
            warn!("❌ SUBSCRIBE rejected: no usable callback in '{}'", callback);
            return SubscribeResult::failure(GenaStatus::PreconditionFailed, "");
        }

        let new_sid = format!("uuid:{}", Uuid::new_v4());
        if self.subscribers.contains_key(&new_sid) {
            // Collision d'identifiant : hautement improbable
            return SubscribeResult::failure(GenaStatus::InternalServerError, "");
        }

        let lifetime = parse_timeout_header(timeout_header);
        let subscriber = Subscriber::new(new_sid.clone(), callbacks, lifetime);
        self.subscribers.insert(new_sid.clone(), subscriber);

        info!(
            "🔒 New subscription: SID={}, Timeout={}",
            new_sid,
            format_timeout(lifetime)
        );

        self.schedule_initial_event(new_sid.clone());

        SubscribeResult {
            success: true,
            status: GenaStatus::Ok,
            sid: new_sid,
            timeout: format_timeout(lifetime),
            is_new: true,
        }
    }

    fn renew(&self, sid: &str, nt: &str, callback: &str, timeout_header: &str) -> SubscribeResult {
        if !nt.is_empty() || !callback.is_empty() {
            return SubscribeResult::failure(GenaStatus::BadRequest, sid);
        }

        let Some(mut subscriber) = self.subscribers.get_mut(sid) else {
            warn!("❌ Renewal rejected: unknown SID {}", sid);
            return SubscribeResult::failure(GenaStatus::PreconditionFailed, sid);
        };

        let lifetime = parse_timeout_header(timeout_header);
        subscriber.renew(lifetime);

        info!(
            "♻️ Renewed subscription: SID={}, Timeout={}",
            sid,
            format_timeout(lifetime)
        );

        SubscribeResult {
            success: true,
            status: GenaStatus::Ok,
            sid: sid.to_string(),
            timeout: format_timeout(lifetime),
            is_new: false,
        }
    }

    /// Traite un UNSUBSCRIBE.
    pub fn unsubscribe(&self, sid: &str, nt: &str, callback: &str) -> GenaStatus {
        if !nt.is_empty() || !callback.is_empty() {
            return GenaStatus::BadRequest;
        }
        if sid.is_empty() {
            return GenaStatus::PreconditionFailed;
        }

        if self.subscribers.remove(sid).is_some() {
            info!("🗑️ Unsubscribed SID={}", sid);
            GenaStatus::Ok
        } else {
            GenaStatus::PreconditionFailed
        }
    }

    /// Notifie tous les abonnés d'un lot de variables changées.
    ///
    /// Le lot complet part vers *chaque* abonné : les souscriptions GENA
    /// couvrent le service entier, pas une variable. Les abonnés trouvés
    /// expirés sont supprimés au passage. La livraison part en tâche de
    /// fond, l'appelant n'attend pas les callbacks.
    pub fn notify_all(&self, changed: &HashMap<String, String>) {
        if changed.is_empty() {
            return;
        }

        let body = property_set(changed);
        let sids: Vec<String> = self.subscribers.iter().map(|e| e.key().clone()).collect();

        for sid in sids {
            let (seq, callbacks) = match self.subscribers.get_mut(&sid) {
                Some(mut entry) if !entry.is_expired() => {
                    (entry.seq.next(), entry.callbacks.clone())
                }
                Some(entry) => {
                    drop(entry);
                    self.subscribers.remove(&sid);
                    debug!("🧹 Dropped expired subscriber {}", sid);
                    continue;
                }
                None => continue,
            };

            let notifier = self.notifier.clone();
            let body = body.clone();
            tokio::spawn(async move {
                notifier.deliver(&sid, seq, &callbacks, &body).await;
            });
        }
    }

    /// Programme l'envoi de l'état complet (SEQ=0) à un nouvel abonné.
    ///
    /// L'événement part même si l'état est vide : l'abonné reçoit alors un
    /// property set sans propriété.
    fn schedule_initial_event(&self, sid: String) {
        let subscribers = Arc::clone(&self.subscribers);
        let state = Arc::clone(&self.state);
        let notifier = self.notifier.clone();

        tokio::spawn(async move {
            tokio::time::sleep(INITIAL_NOTIFY_DELAY).await;

            let callbacks = match subscribers.get(&sid) {
                Some(subscriber) if !subscriber.is_expired() => subscriber.callbacks.clone(),
                _ => return,
            };

            let variables = state.snapshot();
            let body = property_set(&variables);
            debug!("📤 Sending initial event to {}", sid);
            notifier.deliver(&sid, 0, &callbacks, &body).await;
        });
    }

    /// Balayage opportuniste : une opération sur [`CLEANUP_EVERY`] purge
    /// les souscriptions expirées.
    fn maybe_cleanup(&self) {
        let count = self.op_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count % CLEANUP_EVERY != 0 {
            return;
        }

        let before = self.subscribers.len();
        self.subscribers.retain(|_, subscriber| !subscriber.is_expired());
        let removed = before - self.subscribers.len();
        if removed > 0 {
            debug!("🧹 Cleanup removed {} expired subscription(s)", removed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::EventSeq;
    use super::*;

    struct FixedState;

    impl EventedState for FixedState {
        fn snapshot(&self) -> HashMap<String, String> {
            let mut vars = HashMap::new();
            vars.insert("SystemUpdateID".to_string(), "1".to_string());
            vars
        }
    }

    fn manager() -> SubscriptionManager {
        SubscriptionManager::new(Arc::new(FixedState))
    }

    // Port 9 (discard) : la livraison échoue, ce qui est sans effet sur
    // l'état de l'abonné.
    const CALLBACK: &str = "<http://127.0.0.1:9/cb>";

    #[tokio::test]
    async fn test_subscribe_new_ok() {
        let manager = manager();
        let result = manager.subscribe("", "upnp:event", CALLBACK, "Second-180");

        assert!(result.success);
        assert_eq!(result.status, GenaStatus::Ok);
        assert!(result.sid.starts_with("uuid:"));
        assert_eq!(result.timeout, "Second-180");
        assert!(result.is_new);
        assert_eq!(manager.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_bad_nt() {
        let manager = manager();
        let result = manager.subscribe("", "notify:event-wrong", "<http://x>", "");

        assert!(!result.success);
        assert_eq!(result.status, GenaStatus::PreconditionFailed);
        assert_eq!(manager.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_without_callback() {
        let manager = manager();
        let result = manager.subscribe("", "upnp:event", "", "Second-60");
        assert_eq!(result.status, GenaStatus::PreconditionFailed);
    }

    #[tokio::test]
    async fn test_subscribe_default_timeout() {
        let manager = manager();
        let result = manager.subscribe("", "upnp:event", CALLBACK, "Second-infinite");
        assert_eq!(result.timeout, "Second-300");
    }

    #[tokio::test]
    async fn test_renew_unknown_sid() {
        let manager = manager();
        let result = manager.subscribe("uuid:unknown", "", "", "Second-60");

        assert!(!result.success);
        assert_eq!(result.status, GenaStatus::PreconditionFailed);
    }

    #[tokio::test]
    async fn test_renew_with_headers_is_bad_request() {
        let manager = manager();
        let sid = manager
            .subscribe("", "upnp:event", CALLBACK, "Second-60")
            .sid;

        let result = manager.subscribe(&sid, "upnp:event", CALLBACK, "Second-60");
        assert_eq!(result.status, GenaStatus::BadRequest);
    }

    #[tokio::test]
    async fn test_renew_extends_and_keeps_sid_and_seq() {
        let manager = manager();
        let sid = manager
            .subscribe("", "upnp:event", CALLBACK, "Second-60")
            .sid;

        let before = manager.subscribers.get(&sid).unwrap().expires_at;
        let result = manager.subscribe(&sid, "", "", "Second-600");

        assert!(result.success);
        assert!(!result.is_new);
        assert_eq!(result.sid, sid);
        assert_eq!(result.timeout, "Second-600");

        let subscriber = manager.subscribers.get(&sid).unwrap();
        assert!(subscriber.expires_at > before);
        assert_eq!(subscriber.seq.current(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_twice() {
        let manager = manager();
        let sid = manager
            .subscribe("", "upnp:event", CALLBACK, "Second-60")
            .sid;

        assert_eq!(manager.unsubscribe(&sid, "", ""), GenaStatus::Ok);
        assert_eq!(
            manager.unsubscribe(&sid, "", ""),
            GenaStatus::PreconditionFailed
        );
    }

    #[tokio::test]
    async fn test_unsubscribe_with_headers_is_bad_request() {
        let manager = manager();
        assert_eq!(
            manager.unsubscribe("uuid:x", "upnp:event", ""),
            GenaStatus::BadRequest
        );
    }

    #[tokio::test]
    async fn test_notify_all_increments_sequence() {
        let manager = manager();
        let sid = manager
            .subscribe("", "upnp:event", CALLBACK, "Second-60")
            .sid;

        let mut changed = HashMap::new();
        changed.insert("SystemUpdateID".to_string(), "2".to_string());

        manager.notify_all(&changed);
        manager.notify_all(&changed);
        manager.notify_all(&changed);

        assert_eq!(manager.subscribers.get(&sid).unwrap().seq.current(), 3);
    }

    #[tokio::test]
    async fn test_notify_all_empty_is_noop() {
        let manager = manager();
        let sid = manager
            .subscribe("", "upnp:event", CALLBACK, "Second-60")
            .sid;

        manager.notify_all(&HashMap::new());
        assert_eq!(manager.subscribers.get(&sid).unwrap().seq.current(), 0);
    }

    #[tokio::test]
    async fn test_notify_all_sequence_wraparound_skips_zero() {
        let manager = manager();
        let sid = manager
            .subscribe("", "upnp:event", CALLBACK, "Second-60")
            .sid;

        manager.subscribers.get_mut(&sid).unwrap().seq = EventSeq(u32::MAX);

        let mut changed = HashMap::new();
        changed.insert("SystemUpdateID".to_string(), "3".to_string());
        manager.notify_all(&changed);

        assert_eq!(manager.subscribers.get(&sid).unwrap().seq.current(), 1);
    }

    #[tokio::test]
    async fn test_notify_all_drops_expired() {
        let manager = manager();
        manager.subscribe("", "upnp:event", CALLBACK, "Second-0");
        assert_eq!(manager.subscriber_count(), 1);

        let mut changed = HashMap::new();
        changed.insert("SystemUpdateID".to_string(), "4".to_string());
        manager.notify_all(&changed);

        assert_eq!(manager.subscriber_count(), 0);
    }
}
