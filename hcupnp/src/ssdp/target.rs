//! Targets d'annonce SSDP : les paires (NT, USN) annoncées par le device.

/// Une cible d'annonce SSDP.
///
/// Chaque target correspond à une ligne `NT`/`USN` dans les NOTIFY et les
/// réponses M-SEARCH. L'ensemble est construit une fois au démarrage et
/// appartient exclusivement au serveur de découverte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTarget {
    /// Type de notification (ex: "upnp:rootdevice",
    /// "urn:schemas-upnp-org:device:MediaServer:1")
    pub notification_type: String,

    /// Unique Service Name : l'UDN seul quand le target *est* l'UDN,
    /// sinon `"{udn}::{nt}"`.
    pub unique_service_name: String,
}

impl NotificationTarget {
    /// Crée le target pour un type de notification donné.
    pub fn new(device_udn: &str, notification_type: &str) -> Self {
        let unique_service_name = if notification_type == device_udn {
            device_udn.to_string()
        } else {
            format!("{}::{}", device_udn, notification_type)
        };

        Self {
            notification_type: notification_type.to_string(),
            unique_service_name,
        }
    }

    /// Construit l'ensemble des targets d'un device.
    ///
    /// L'ensemble est `{udn, "upnp:rootdevice", device_type}` suivi des types
    /// de services configurés, dans cet ordre.
    ///
    /// # Examples
    ///
    /// ```
    /// use hcupnp::ssdp::NotificationTarget;
    ///
    /// let targets = NotificationTarget::build_set(
    ///     "uuid:1234",
    ///     "urn:schemas-upnp-org:device:MediaServer:1",
    ///     &["urn:schemas-upnp-org:service:ContentDirectory:1".to_string()],
    /// );
    /// assert_eq!(targets.len(), 4);
    /// assert_eq!(targets[0].unique_service_name, "uuid:1234");
    /// ```
    pub fn build_set(
        device_udn: &str,
        device_type: &str,
        service_types: &[String],
    ) -> Vec<NotificationTarget> {
        let mut targets = vec![
            NotificationTarget::new(device_udn, device_udn),
            NotificationTarget::new(device_udn, "upnp:rootdevice"),
            NotificationTarget::new(device_udn, device_type),
        ];
        for service_type in service_types {
            targets.push(NotificationTarget::new(device_udn, service_type));
        }
        targets
    }
}
