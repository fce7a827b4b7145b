//! # HomeCast UPnP - découverte SSDP et événements GENA
//!
//! Cœur réseau UPnP du media server HomeCast : annonce de présence sur le
//! réseau local et notifications d'état vers les control points abonnés.
//!
//! ## Composants
//!
//! - [`ssdp`] : serveur de découverte (NOTIFY alive/byebye en multicast,
//!   réponses M-SEARCH en unicast), construit sur l'ensemble des
//!   [`ssdp::NotificationTarget`] dérivé de la configuration
//! - [`gena`] : gestionnaire de souscriptions et notifier d'événements
//! - [`config`] : configuration de la découverte, validée au démarrage
//!
//! Les couches voisines (routage HTTP, SOAP/ContentDirectory, scanner de
//! médias, description XML du device) restent extérieures : elles
//! consomment ces composants par leurs interfaces (`Discovery`,
//! `SubscriptionManager::subscribe`/`unsubscribe`, `notify_all`).
//!
//! ## Exemple
//!
//! ```rust,no_run
//! use hcupnp::config::DiscoveryConfig;
//! use hcupnp::ssdp::{Discovery, SsdpServer};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DiscoveryConfig::new(
//!     "http://192.168.1.42:8200/rootDesc.xml",
//!     "urn:schemas-upnp-org:device:MediaServer:1",
//!     "uuid:4d696e69-444c-164e-9d41-b827eb96dcba",
//!     "eth0",
//! )
//! .with_service_types(vec![
//!     "urn:schemas-upnp-org:service:ContentDirectory:1".to_string(),
//! ]);
//!
//! let server = SsdpServer::new(config);
//! server.start().await?;
//! // ... le serveur annonce et répond jusqu'à l'arrêt
//! server.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod gena;
pub mod ssdp;

pub use crate::config::{DiscoveryBackend, DiscoveryConfig};
pub use crate::gena::{EventedState, GenaStatus, SubscribeResult, SubscriptionManager};
pub use crate::ssdp::{Discovery, DiscoveryError, NotificationTarget, SsdpServer, discovery_for};
