use get_if_addrs::get_if_addrs;
use std::net::{Ipv4Addr, UdpSocket};

/// Devine l'adresse IP locale de la machine.
///
/// Crée un socket UDP lié à `0.0.0.0:0` et tente une connexion (non effective
/// pour UDP) vers un serveur DNS public. Le système d'exploitation choisit
/// alors l'interface qui serait utilisée pour joindre Internet, et on lit
/// l'adresse locale du socket. En cas d'échec, retourne `127.0.0.1`.
///
/// # Examples
///
/// ```
/// use hcutils::guess_local_ip;
///
/// let ip = guess_local_ip();
/// println!("IP locale détectée: {}", ip);
/// ```
pub fn guess_local_ip() -> String {
    match UdpSocket::bind("0.0.0.0:0") {
        Ok(socket) => {
            if socket.connect("8.8.8.8:80").is_ok() {
                if let Ok(local_addr) = socket.local_addr() {
                    return local_addr.ip().to_string();
                }
            }
            "127.0.0.1".to_string()
        }
        Err(_) => "127.0.0.1".to_string(),
    }
}

/// Résout l'adresse IPv4 d'une interface réseau par son nom.
///
/// Parcourt les interfaces de la machine et retourne la première adresse IPv4
/// portée par l'interface demandée (ex: `"eth0"`, `"wlan0"`, `"en0"`).
///
/// # Returns
///
/// `Some(Ipv4Addr)` si l'interface existe et porte une adresse IPv4,
/// `None` sinon.
///
/// # Examples
///
/// ```
/// use hcutils::interface_ipv4;
///
/// if let Some(ip) = interface_ipv4("lo") {
///     assert!(ip.is_loopback());
/// }
/// ```
pub fn interface_ipv4(name: &str) -> Option<Ipv4Addr> {
    let interfaces = get_if_addrs().ok()?;
    for iface in interfaces {
        if iface.name != name {
            continue;
        }
        if let std::net::IpAddr::V4(ipv4) = iface.ip() {
            return Some(ipv4);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    #[test]
    fn test_guess_local_ip_returns_valid_ip() {
        let ip = guess_local_ip();

        // Vérifie que le résultat est parsable comme une IP
        assert!(
            ip.parse::<IpAddr>().is_ok(),
            "Should return a valid IP address"
        );
    }

    #[test]
    fn test_guess_local_ip_not_empty() {
        let ip = guess_local_ip();

        assert!(!ip.is_empty(), "IP should not be empty");
    }

    #[test]
    fn test_interface_ipv4_unknown_interface() {
        assert!(interface_ipv4("no-such-interface-0").is_none());
    }

    #[test]
    fn test_interface_ipv4_loopback() {
        // "lo" n'existe pas partout (macOS: "lo0"), on teste donc les deux
        let lo = interface_ipv4("lo").or_else(|| interface_ipv4("lo0"));
        if let Some(ip) = lo {
            assert!(ip.is_loopback());
        }
    }
}
