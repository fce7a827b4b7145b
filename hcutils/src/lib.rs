//! Utilitaires réseau partagés par les crates HomeCast.
//!
//! # Fonctions principales
//!
//! - [`guess_local_ip`] : devine l'adresse IP locale utilisée pour les connexions sortantes
//! - [`interface_ipv4`] : résout l'adresse IPv4 d'une interface réseau par son nom
//! - [`get_os_string`] : chaîne `OS/version` pour les en-têtes SERVER UPnP

mod ip_utils;

pub use ip_utils::{guess_local_ip, interface_ipv4};

/// Retourne une chaîne décrivant le système d'exploitation et sa version.
///
/// Utilise la crate `os_info` pour obtenir de manière portable les informations
/// sur le système courant.
///
/// # Format
/// - Linux: "Linux/6.5.0" ou "Ubuntu/22.04"
/// - macOS: "Mac OS/10.15.7"
/// - Autre: "{OS}/Unknown"
///
/// # Exemples
///
/// ```
/// use hcutils::get_os_string;
///
/// let os = get_os_string();
/// println!("OS: {}", os); // Ex: "Linux/6.5.0"
/// ```
pub fn get_os_string() -> String {
    let info = os_info::get();
    let os_type = format!("{:?}", info.os_type());

    let version = info.version();
    if version != &os_info::Version::Unknown {
        format!("{}/{}", os_type, version)
    } else {
        format!("{}/Unknown", os_type)
    }
}
