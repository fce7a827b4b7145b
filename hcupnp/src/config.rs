//! Configuration du serveur de découverte.
//!
//! La configuration est validée une seule fois au démarrage ; une
//! configuration incomplète (location, type de device, UDN ou interface
//! manquants) est fatale et empêche `start()`.

use crate::ssdp::DiscoveryError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Durée de validité des annonces par défaut (30 minutes).
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(1800);

/// Intervalle de rafraîchissement par défaut : 2/5 de max-age, pour
/// réannoncer bien avant l'expiration du cache des control points.
pub const DEFAULT_NOTIFY_INTERVAL: Duration = Duration::from_secs(1800 * 2 / 5);

/// TTL multicast par défaut.
pub const DEFAULT_MULTICAST_TTL: u32 = 4;

/// Backend d'annonce SSDP sélectionné par la configuration.
///
/// Le backend multicast autonome est le backend de référence ; le backend
/// démon délègue les réponses M-SEARCH à un démon de découverte local
/// (style minissdpd) et ne fait que les annonces alive/byebye.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DiscoveryBackend {
    #[default]
    Multicast,
    Daemon {
        socket_path: PathBuf,
    },
}

/// Configuration du serveur de découverte SSDP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// URL de la description du device (rootDesc.xml), servie par la couche HTTP
    pub location: String,

    /// Valeur de l'en-tête SERVER (ex: "Linux/6.5 UPnP/1.0 HomeCast/0.1.0")
    pub server_header: String,

    /// Durée de validité des annonces
    pub max_age: Duration,

    /// Période des annonces périodiques
    pub notify_interval: Duration,

    /// TTL des datagrammes multicast sortants
    pub multicast_ttl: u32,

    /// Type du device (ex: "urn:schemas-upnp-org:device:MediaServer:1")
    pub device_type: String,

    /// UDN du device (ex: "uuid:4d696e69-...")
    pub device_udn: String,

    /// Types des services annoncés en plus du device
    pub service_types: Vec<String>,

    /// Nom de l'interface réseau utilisée (ex: "eth0")
    pub interface: String,

    /// Backend d'annonce
    pub backend: DiscoveryBackend,
}

impl DiscoveryConfig {
    /// Crée une configuration avec les champs obligatoires et les défauts
    /// de la spec UPnP pour le reste.
    pub fn new(location: &str, device_type: &str, device_udn: &str, interface: &str) -> Self {
        Self {
            location: location.to_string(),
            server_header: default_server_header(),
            max_age: DEFAULT_MAX_AGE,
            notify_interval: DEFAULT_NOTIFY_INTERVAL,
            multicast_ttl: DEFAULT_MULTICAST_TTL,
            device_type: device_type.to_string(),
            device_udn: device_udn.to_string(),
            service_types: Vec::new(),
            interface: interface.to_string(),
            backend: DiscoveryBackend::default(),
        }
    }

    /// Remplace la liste des services annoncés.
    pub fn with_service_types(mut self, service_types: Vec<String>) -> Self {
        self.service_types = service_types;
        self
    }

    /// Change max-age et recale l'intervalle d'annonce sur 2/5 de max-age.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self.notify_interval = max_age * 2 / 5;
        self
    }

    pub fn with_notify_interval(mut self, notify_interval: Duration) -> Self {
        self.notify_interval = notify_interval;
        self
    }

    pub fn with_multicast_ttl(mut self, ttl: u32) -> Self {
        self.multicast_ttl = ttl;
        self
    }

    pub fn with_server_header(mut self, server_header: &str) -> Self {
        self.server_header = server_header.to_string();
        self
    }

    pub fn with_backend(mut self, backend: DiscoveryBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Valide la configuration.
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::Config`] si location, device_type, device_udn ou
    /// interface est manquant, si location n'est pas une URL, ou si les
    /// durées sont nulles.
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        if self.location.is_empty() {
            return Err(DiscoveryError::Config("missing location URL".to_string()));
        }
        if url::Url::parse(&self.location).is_err() {
            return Err(DiscoveryError::Config(format!(
                "location is not a valid URL: {}",
                self.location
            )));
        }
        if self.device_type.is_empty() {
            return Err(DiscoveryError::Config("missing device type".to_string()));
        }
        if self.device_udn.is_empty() {
            return Err(DiscoveryError::Config("missing device UDN".to_string()));
        }
        if self.interface.is_empty() {
            return Err(DiscoveryError::Config(
                "missing network interface".to_string(),
            ));
        }
        if self.max_age.is_zero() || self.notify_interval.is_zero() {
            return Err(DiscoveryError::Config(
                "max-age and notify interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// En-tête SERVER par défaut : `"<OS>/<version> UPnP/1.0 HomeCast/<version>"`.
fn default_server_header() -> String {
    format!(
        "{} UPnP/1.0 HomeCast/{}",
        hcutils::get_os_string(),
        env!("CARGO_PKG_VERSION")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> DiscoveryConfig {
        DiscoveryConfig::new(
            "http://192.168.1.42:8200/rootDesc.xml",
            "urn:schemas-upnp-org:device:MediaServer:1",
            "uuid:test-device",
            "eth0",
        )
    }

    #[test]
    fn test_defaults() {
        let config = valid();
        assert_eq!(config.max_age, Duration::from_secs(1800));
        assert_eq!(config.notify_interval, Duration::from_secs(720));
        assert_eq!(config.multicast_ttl, 4);
        assert!(config.server_header.contains("UPnP/1.0"));
        assert!(config.server_header.contains("HomeCast/"));
        assert_eq!(config.backend, DiscoveryBackend::Multicast);
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_missing_fields_are_fatal() {
        let mut config = valid();
        config.location = String::new();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.device_type = String::new();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.device_udn = String::new();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.interface = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_location_url() {
        let mut config = valid();
        config.location = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_with_max_age_recomputes_interval() {
        let config = valid().with_max_age(Duration::from_secs(100));
        assert_eq!(config.notify_interval, Duration::from_secs(40));
    }
}
