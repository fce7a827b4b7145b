//! # Module SSDP - Simple Service Discovery Protocol
//!
//! Ce module implémente le côté *device* du protocole SSDP pour UPnP :
//! le serveur annonce la présence du media server sur le réseau et répond
//! aux recherches des control points.
//!
//! ## Fonctionnalités
//!
//! - ✅ Envoi de NOTIFY alive/byebye en multicast
//! - ✅ Réponse aux M-SEARCH en unicast, étalée sur la fenêtre MX
//! - ✅ Annonces périodiques automatiques (rafraîchissement avant max-age)
//! - ✅ Arrêt propre : byebye est le dernier usage du socket
//! - ✅ Backend alternatif délégant les M-SEARCH à un démon local
//!
//! ## Architecture
//!
//! - [`SsdpServer`] : serveur SSDP autonome (multicast), backend de référence
//! - [`DaemonDiscovery`] : variante qui enregistre les targets auprès d'un
//!   démon de découverte externe et ne fait que les annonces
//! - [`NotificationTarget`] : paire (NT, USN) annoncée par le device
//!
//! Les deux backends partagent la capacité [`Discovery`] (`start`/`stop`) et
//! sont sélectionnés par la configuration via [`discovery_for`].

mod errors;
mod message;
mod server;
mod target;

#[cfg(unix)]
mod daemon;

pub use errors::DiscoveryError;
pub use message::{MSearch, parse_msearch};
pub use server::SsdpServer;
pub use target::NotificationTarget;

#[cfg(unix)]
pub use daemon::DaemonDiscovery;

use crate::config::{DiscoveryBackend, DiscoveryConfig};
use async_trait::async_trait;
use std::sync::Arc;

/// Adresse multicast SSDP
pub const SSDP_MULTICAST_ADDR: &str = "239.255.255.250";

/// Port SSDP
pub const SSDP_PORT: u16 = 1900;

/// Fenêtre de jitter des annonces initiales (en millisecondes).
///
/// Chaque target part avec un délai aléatoire indépendant dans `[0, 100ms)`
/// pour éviter les rafales d'annonces au démarrage.
pub const STARTUP_JITTER_MS: u64 = 100;

/// Capacité d'annonce SSDP, implémentée par les deux backends.
///
/// `start` est fatal en cas d'erreur de configuration ou de socket ;
/// `stop` envoie les byebye puis libère le socket.
#[async_trait]
pub trait Discovery: Send + Sync {
    async fn start(&self) -> Result<(), DiscoveryError>;
    async fn stop(&self);
}

/// Construit le backend de découverte choisi par la configuration.
pub fn discovery_for(config: DiscoveryConfig) -> Result<Arc<dyn Discovery>, DiscoveryError> {
    match config.backend.clone() {
        DiscoveryBackend::Multicast => Ok(Arc::new(SsdpServer::new(config))),
        #[cfg(unix)]
        DiscoveryBackend::Daemon { socket_path } => {
            Ok(Arc::new(DaemonDiscovery::new(config, socket_path)))
        }
        #[cfg(not(unix))]
        DiscoveryBackend::Daemon { .. } => Err(DiscoveryError::Config(
            "daemon discovery backend requires unix sockets".to_string(),
        )),
    }
}
