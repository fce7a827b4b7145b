//! # Module GENA - General Event Notification Architecture
//!
//! Le protocole d'événements UPnP : souscriptions SUBSCRIBE/UNSUBSCRIBE et
//! notifications NOTIFY vers les control points abonnés.
//!
//! ## Fonctionnalités
//!
//! - ✅ Souscriptions, renouvellements et désabonnements avec statuts HTTP
//! - ✅ Envoi de l'état initial (SEQ=0) aux nouveaux abonnés
//! - ✅ Notifications de changement d'état séquencées par abonné
//! - ✅ Éviction paresseuse et périodique des souscriptions expirées
//!
//! ## Architecture
//!
//! - [`SubscriptionManager`] : table des abonnés et cycle de vie des
//!   souscriptions ; la couche HTTP externe lui transmet les en-têtes
//!   SUBSCRIBE/UNSUBSCRIBE en paramètres bruts
//! - [`EventNotifier`] : fabrication du property set et livraison NOTIFY
//! - [`EventSeq`] : compteur SEQ avec la règle de débordement (0 réservé
//!   à l'événement initial)

mod manager;
mod notifier;
mod seq;
mod subscriber;

pub use manager::{EventedState, SubscribeResult, SubscriptionManager};
pub use notifier::{EventNotifier, NOTIFY_TIMEOUT, property_set};
pub use seq::EventSeq;
pub use subscriber::{
    DEFAULT_SUBSCRIPTION_TIMEOUT, Subscriber, format_timeout, parse_callback_header,
    parse_timeout_header,
};

/// Type de notification exigé pour une nouvelle souscription.
pub const NT_EVENT: &str = "upnp:event";

/// Statuts HTTP retournés à la couche de routage pour SUBSCRIBE/UNSUBSCRIBE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenaStatus {
    Ok,
    BadRequest,
    PreconditionFailed,
    InternalServerError,
}

impl GenaStatus {
    /// Code HTTP correspondant.
    pub fn code(&self) -> u16 {
        match self {
            GenaStatus::Ok => 200,
            GenaStatus::BadRequest => 400,
            GenaStatus::PreconditionFailed => 412,
            GenaStatus::InternalServerError => 500,
        }
    }
}
