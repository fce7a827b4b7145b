//! Formats des messages SSDP.
//!
//! Les messages sont des requêtes HTTP multi-lignes terminées par `\r\n`.
//! Ce module fabrique les NOTIFY (alive/byebye) et les réponses M-SEARCH,
//! et analyse strictement les M-SEARCH entrants. Toute violation de format
//! entraîne l'abandon silencieux du datagramme, jamais une erreur.

use super::{NotificationTarget, SSDP_MULTICAST_ADDR, SSDP_PORT};
use crate::config::DiscoveryConfig;
use std::collections::HashMap;

/// Borne supérieure du champ MX (secondes), imposée par la spec UPnP.
pub const MX_MAX: u64 = 120;

/// Requête M-SEARCH validée.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MSearch {
    /// Search Target demandé ("ssdp:all" ou un type exact)
    pub st: String,

    /// Fenêtre de réponse en secondes, ramenée dans `[1, 120]`
    pub mx: u64,
}

/// Fabrique un NOTIFY ssdp:alive pour un target.
pub fn alive(config: &DiscoveryConfig, target: &NotificationTarget) -> String {
    format!(
        "NOTIFY * HTTP/1.1\r\n\
         HOST: {}:{}\r\n\
         CACHE-CONTROL: max-age={}\r\n\
         LOCATION: {}\r\n\
         SERVER: {}\r\n\
         NT: {}\r\n\
         USN: {}\r\n\
         NTS: ssdp:alive\r\n\
         \r\n",
        SSDP_MULTICAST_ADDR,
        SSDP_PORT,
        config.max_age.as_secs(),
        config.location,
        config.server_header,
        target.notification_type,
        target.unique_service_name,
    )
}

/// Fabrique un NOTIFY ssdp:byebye pour un target.
///
/// Pas de cache-control/location/server : le device s'en va.
pub fn byebye(target: &NotificationTarget) -> String {
    format!(
        "NOTIFY * HTTP/1.1\r\n\
         HOST: {}:{}\r\n\
         NT: {}\r\n\
         USN: {}\r\n\
         NTS: ssdp:byebye\r\n\
         \r\n",
        SSDP_MULTICAST_ADDR, SSDP_PORT, target.notification_type, target.unique_service_name,
    )
}

/// Fabrique la réponse unicast 200 OK à un M-SEARCH pour un target.
pub fn search_response(config: &DiscoveryConfig, target: &NotificationTarget) -> String {
    let date = chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT");

    format!(
        "HTTP/1.1 200 OK\r\n\
         CACHE-CONTROL: max-age={}\r\n\
         DATE: {}\r\n\
         ST: {}\r\n\
         USN: {}\r\n\
         EXT:\r\n\
         SERVER: {}\r\n\
         LOCATION: {}\r\n\
         Content-Length: 0\r\n\
         \r\n",
        config.max_age.as_secs(),
        date,
        target.notification_type,
        target.unique_service_name,
        config.server_header,
        config.location,
    )
}

/// Analyse un datagramme M-SEARCH.
///
/// Règles d'acceptation (tout écart ⇒ `None`) :
/// - première ligne exactement `M-SEARCH * HTTP/1.1`
/// - `HOST` est le groupe multicast, avec ou sans `:1900`
/// - `MAN` vaut `"ssdp:discover"` (guillemets retirés)
/// - `MX` est un entier strictement positif, ramené à 120 au plus
/// - `ST` est présent et non vide
pub fn parse_msearch(data: &str) -> Option<MSearch> {
    let mut lines = data.lines();
    let first_line = lines.next()?.trim();
    if first_line != "M-SEARCH * HTTP/1.1" {
        return None;
    }

    let headers = parse_headers(lines);

    let host = headers.get("HOST")?;
    let with_port = format!("{}:{}", SSDP_MULTICAST_ADDR, SSDP_PORT);
    if host != SSDP_MULTICAST_ADDR && host != &with_port {
        return None;
    }

    let man = headers.get("MAN")?.trim_matches('"');
    if man != "ssdp:discover" {
        return None;
    }

    let mx: u64 = headers.get("MX")?.parse().ok()?;
    if mx == 0 {
        return None;
    }
    let mx = mx.min(MX_MAX);

    let st = headers.get("ST")?.clone();

    Some(MSearch { st, mx })
}

/// Résout les targets concernés par un M-SEARCH.
///
/// `ssdp:all` matche tous les targets ; sinon comparaison exacte avec le
/// type de notification. Aucun match ⇒ aucune réponse.
pub fn matching_targets<'a>(
    targets: &'a [NotificationTarget],
    st: &str,
) -> Vec<&'a NotificationTarget> {
    if st == "ssdp:all" {
        targets.iter().collect()
    } else {
        targets
            .iter()
            .filter(|t| t.notification_type == st)
            .collect()
    }
}

fn parse_headers<'a, I>(lines: I) -> HashMap<String, String>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers = HashMap::new();
    for line in lines {
        let line = line.trim();

        // Empty line marks end of headers
        if line.is_empty() {
            break;
        }

        // Split on first ':' only (values may contain ':')
        if let Some(colon_pos) = line.find(':') {
            let (name, value_with_colon) = line.split_at(colon_pos);
            let value = &value_with_colon[1..];

            let name = name.trim().to_ascii_uppercase();
            let value = value.trim().to_string();

            if !name.is_empty() && !value.is_empty() {
                headers.insert(name, value);
            }
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscoveryConfig;

    fn config() -> DiscoveryConfig {
        DiscoveryConfig::new(
            "http://192.168.1.42:8200/rootDesc.xml",
            "urn:schemas-upnp-org:device:MediaServer:1",
            "uuid:test-device",
            "eth0",
        )
    }

    fn msearch(host: &str, man: &str, mx: &str, st: &str) -> String {
        format!(
            "M-SEARCH * HTTP/1.1\r\nHOST: {}\r\nMAN: {}\r\nMX: {}\r\nST: {}\r\n\r\n",
            host, man, mx, st
        )
    }

    #[test]
    fn test_alive_format() {
        let target = NotificationTarget::new("uuid:test-device", "upnp:rootdevice");
        let msg = alive(&config(), &target);

        assert!(msg.starts_with("NOTIFY * HTTP/1.1\r\n"));
        assert!(msg.contains("HOST: 239.255.255.250:1900\r\n"));
        assert!(msg.contains("CACHE-CONTROL: max-age=1800\r\n"));
        assert!(msg.contains("LOCATION: http://192.168.1.42:8200/rootDesc.xml\r\n"));
        assert!(msg.contains("NT: upnp:rootdevice\r\n"));
        assert!(msg.contains("USN: uuid:test-device::upnp:rootdevice\r\n"));
        assert!(msg.contains("NTS: ssdp:alive\r\n"));
        assert!(msg.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_byebye_format() {
        let target = NotificationTarget::new("uuid:test-device", "upnp:rootdevice");
        let msg = byebye(&target);

        assert!(msg.contains("NTS: ssdp:byebye\r\n"));
        assert!(!msg.contains("CACHE-CONTROL"));
        assert!(!msg.contains("LOCATION"));
        assert!(!msg.contains("SERVER"));
    }

    #[test]
    fn test_search_response_format() {
        let target = NotificationTarget::new("uuid:test-device", "upnp:rootdevice");
        let msg = search_response(&config(), &target);

        assert!(msg.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(msg.contains("ST: upnp:rootdevice\r\n"));
        assert!(msg.contains("USN: uuid:test-device::upnp:rootdevice\r\n"));
        assert!(msg.contains("EXT:\r\n"));
        assert!(msg.contains("DATE: "));
        assert!(msg.contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn test_parse_msearch_valid() {
        let data = msearch(
            "239.255.255.250:1900",
            "\"ssdp:discover\"",
            "3",
            "ssdp:all",
        );
        let parsed = parse_msearch(&data).unwrap();
        assert_eq!(parsed.st, "ssdp:all");
        assert_eq!(parsed.mx, 3);
    }

    #[test]
    fn test_parse_msearch_host_without_port() {
        let data = msearch("239.255.255.250", "\"ssdp:discover\"", "2", "upnp:rootdevice");
        assert!(parse_msearch(&data).is_some());
    }

    #[test]
    fn test_parse_msearch_wrong_host() {
        let data = msearch("192.168.1.1:1900", "\"ssdp:discover\"", "2", "ssdp:all");
        assert!(parse_msearch(&data).is_none());
    }

    #[test]
    fn test_parse_msearch_wrong_first_line() {
        let data = "NOTIFY * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\n\r\n";
        assert!(parse_msearch(data).is_none());
    }

    #[test]
    fn test_parse_msearch_bad_man() {
        let data = msearch("239.255.255.250:1900", "\"ssdp:find\"", "2", "ssdp:all");
        assert!(parse_msearch(&data).is_none());
    }

    #[test]
    fn test_parse_msearch_man_unquoted() {
        // Certains control points omettent les guillemets : accepté
        let data = msearch("239.255.255.250:1900", "ssdp:discover", "2", "ssdp:all");
        assert!(parse_msearch(&data).is_some());
    }

    #[test]
    fn test_parse_msearch_missing_mx() {
        let data =
            "M-SEARCH * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nMAN: \"ssdp:discover\"\r\nST: ssdp:all\r\n\r\n";
        assert!(parse_msearch(data).is_none());
    }

    #[test]
    fn test_parse_msearch_non_numeric_mx() {
        let data = msearch("239.255.255.250:1900", "\"ssdp:discover\"", "abc", "ssdp:all");
        assert!(parse_msearch(&data).is_none());
    }

    #[test]
    fn test_parse_msearch_zero_mx() {
        let data = msearch("239.255.255.250:1900", "\"ssdp:discover\"", "0", "ssdp:all");
        assert!(parse_msearch(&data).is_none());
    }

    #[test]
    fn test_parse_msearch_mx_clamped() {
        let data = msearch("239.255.255.250:1900", "\"ssdp:discover\"", "600", "ssdp:all");
        assert_eq!(parse_msearch(&data).unwrap().mx, MX_MAX);
    }

    #[test]
    fn test_parse_msearch_missing_st() {
        let data =
            "M-SEARCH * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nMAN: \"ssdp:discover\"\r\nMX: 2\r\n\r\n";
        assert!(parse_msearch(data).is_none());
    }

    #[test]
    fn test_matching_targets() {
        let targets = NotificationTarget::build_set(
            "uuid:test-device",
            "urn:schemas-upnp-org:device:MediaServer:1",
            &["urn:schemas-upnp-org:service:ContentDirectory:1".to_string()],
        );

        assert_eq!(matching_targets(&targets, "ssdp:all").len(), 4);
        assert_eq!(matching_targets(&targets, "upnp:rootdevice").len(), 1);
        assert_eq!(matching_targets(&targets, "urn:unknown:service:1").len(), 0);
    }
}
