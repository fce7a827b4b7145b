//! Serveur SSDP autonome (backend multicast de référence).
//!
//! Trois activités concurrentes partagent un socket UDP unique :
//!
//! 1. l'annonceur : alive initial jitté par target, puis réannonces
//!    périodiques toutes les `notify_interval` ;
//! 2. l'écouteur : réception des M-SEARCH, réponses unicast étalées sur
//!    la fenêtre MX ;
//! 3. une tâche éphémère par envoi différé.
//!
//! Toutes observent le même [`CancellationToken`]. À l'arrêt, le token est
//! annulé et les tâches attendues via un [`TaskTracker`] *avant* l'envoi
//! des byebye : le byebye est le dernier usage du socket.

use super::{Discovery, DiscoveryError, NotificationTarget, SSDP_MULTICAST_ADDR, SSDP_PORT,
            STARTUP_JITTER_MS, message};
use crate::config::DiscoveryConfig;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

/// Serveur SSDP gérant les annonces et les réponses aux découvertes.
pub struct SsdpServer {
    config: DiscoveryConfig,
    targets: Vec<NotificationTarget>,

    /// Destination des NOTIFY (le groupe multicast en production)
    group: SocketAddr,

    /// Adresse locale du socket
    bind_addr: SocketAddr,

    state: Mutex<Option<Running>>,
}

struct Running {
    socket: Arc<UdpSocket>,
    token: CancellationToken,
    tracker: TaskTracker,
}

impl SsdpServer {
    /// Crée un serveur SSDP pour le groupe multicast standard.
    pub fn new(config: DiscoveryConfig) -> Self {
        let group: SocketAddr = format!("{}:{}", SSDP_MULTICAST_ADDR, SSDP_PORT)
            .parse()
            .expect("valid SSDP group address");
        let bind_addr: SocketAddr = format!("0.0.0.0:{}", SSDP_PORT)
            .parse()
            .expect("valid SSDP bind address");
        Self::with_group(config, group, bind_addr)
    }

    /// Variante paramétrable, utilisée par les tests avec un groupe local.
    pub(crate) fn with_group(
        config: DiscoveryConfig,
        group: SocketAddr,
        bind_addr: SocketAddr,
    ) -> Self {
        let targets = NotificationTarget::build_set(
            &config.device_udn,
            &config.device_type,
            &config.service_types,
        );
        Self {
            config,
            targets,
            group,
            bind_addr,
            state: Mutex::new(None),
        }
    }

    /// L'ensemble des targets annoncés par ce serveur.
    pub fn targets(&self) -> &[NotificationTarget] {
        &self.targets
    }

    /// Adresse locale du socket, disponible après `start()`.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        let state = self.state.lock();
        state.as_ref().and_then(|r| r.socket.local_addr().ok())
    }

    fn spawn_listener(
        &self,
        socket: Arc<UdpSocket>,
        token: CancellationToken,
        tracker: &TaskTracker,
    ) {
        let targets = self.targets.clone();
        let config = self.config.clone();
        let tracker_sends = tracker.clone();

        tracker.spawn(async move {
            let mut buf = [0u8; 2048];
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    result = socket.recv_from(&mut buf) => {
                        match result {
                            Ok((n, src)) => {
                                let data = String::from_utf8_lossy(&buf[..n]);
                                handle_datagram(
                                    &data,
                                    src,
                                    &targets,
                                    &config,
                                    &socket,
                                    &token,
                                    &tracker_sends,
                                );
                            }
                            Err(e) => {
                                warn!("❌ SSDP read error: {}", e);
                            }
                        }
                    }
                }
            }
            debug!("SSDP listener stopped");
        });
    }
}

#[async_trait]
impl Discovery for SsdpServer {
    /// Démarre le serveur : validation, socket multicast, annonceur et écouteur.
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::Config`] pour une configuration invalide,
    /// [`DiscoveryError::Transport`] si le bind ou le join échoue.
    async fn start(&self) -> Result<(), DiscoveryError> {
        self.config.validate()?;

        let mut state = self.state.lock();
        if state.is_some() {
            return Ok(());
        }

        let socket = open_announce_socket(&self.config, self.group, self.bind_addr)?;
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();

        spawn_announcer(
            &tracker,
            socket.clone(),
            self.group,
            self.config.clone(),
            self.targets.clone(),
            token.clone(),
        );
        self.spawn_listener(socket.clone(), token.clone(), &tracker);

        *state = Some(Running {
            socket,
            token,
            tracker,
        });

        info!(
            "✅ SSDP server started on {} ({} targets)",
            self.group,
            self.targets.len()
        );
        Ok(())
    }

    /// Arrête le serveur.
    ///
    /// Ordre imposé : annulation du token, attente de toutes les tâches
    /// (annonceur, écouteur, envois différés en attente), byebye pour chaque
    /// target, puis libération du socket.
    async fn stop(&self) {
        let running = self.state.lock().take();
        let Some(Running {
            socket,
            token,
            tracker,
        }) = running
        else {
            return;
        };

        token.cancel();
        tracker.close();
        tracker.wait().await;

        info!("👋 Shutting down SSDP server, sending byebye for all targets");
        send_byebye_all(&socket, self.group, &self.targets).await;
    }
}

/// Traite un datagramme entrant. Les violations de format sont abandonnées
/// en silence ; chaque target qui matche reçoit une réponse différée
/// indépendante dans `[0, MX secondes)`.
fn handle_datagram(
    data: &str,
    src: SocketAddr,
    targets: &[NotificationTarget],
    config: &DiscoveryConfig,
    socket: &Arc<UdpSocket>,
    token: &CancellationToken,
    tracker: &TaskTracker,
) {
    let Some(search) = message::parse_msearch(data) else {
        trace!("Ignoring datagram from {}", src);
        return;
    };

    let matches = message::matching_targets(targets, &search.st);
    if matches.is_empty() {
        return;
    }

    debug!(
        "📥 M-SEARCH from {} (ST={}, MX={}) matches {} target(s)",
        src,
        search.st,
        search.mx,
        matches.len()
    );

    for target in matches {
        let response = message::search_response(config, target);
        let delay = Duration::from_millis(rand::rng().random_range(0..search.mx * 1000));
        spawn_delayed_send(
            tracker,
            socket.clone(),
            src,
            response,
            delay,
            token.clone(),
            "M-SEARCH response",
        );
    }
}

/// Ouvre le socket UDP d'annonce : bind avec SO_REUSEADDR, puis join du
/// groupe multicast sur l'interface configurée et réglage du TTL.
pub(crate) fn open_announce_socket(
    config: &DiscoveryConfig,
    group: SocketAddr,
    bind_addr: SocketAddr,
) -> Result<Arc<UdpSocket>, DiscoveryError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&bind_addr.into())?;
    socket.set_nonblocking(true)?;

    let socket = UdpSocket::from_std(socket.into())?;

    if let SocketAddr::V4(group) = group {
        if group.ip().is_multicast() {
            let iface = announce_interface(config)?;
            socket.join_multicast_v4(*group.ip(), iface)?;
            socket.set_multicast_ttl_v4(config.multicast_ttl)?;
            socket.set_multicast_loop_v4(false)?;
            debug!("SSDP: joined {} on {}", group.ip(), iface);
        }
    }

    Ok(Arc::new(socket))
}

/// Résout l'adresse IPv4 du join multicast : celle de l'interface
/// configurée, ou à défaut l'adresse de sortie par défaut de la machine.
pub(crate) fn announce_interface(config: &DiscoveryConfig) -> Result<Ipv4Addr, DiscoveryError> {
    if let Some(ip) = hcutils::interface_ipv4(&config.interface) {
        return Ok(ip);
    }

    warn!(
        "⚠️ Interface '{}' has no IPv4 address, using the default route address",
        config.interface
    );
    hcutils::guess_local_ip().parse().map_err(|_| {
        DiscoveryError::Config(format!(
            "interface '{}' has no IPv4 address and the default route has no IPv4 either",
            config.interface
        ))
    })
}

/// Lance la tâche d'annonce : alive initial jitté par target, puis
/// réannonces périodiques jusqu'à annulation.
pub(crate) fn spawn_announcer(
    tracker: &TaskTracker,
    socket: Arc<UdpSocket>,
    group: SocketAddr,
    config: DiscoveryConfig,
    targets: Vec<NotificationTarget>,
    token: CancellationToken,
) {
    let tracker_sends = tracker.clone();

    tracker.spawn(async move {
        // Annonce initiale : chaque target part avec son propre jitter
        // dans [0, 100ms) pour éviter une rafale au démarrage.
        for target in &targets {
            let payload = message::alive(&config, target);
            let delay = Duration::from_millis(rand::rng().random_range(0..STARTUP_JITTER_MS));
            spawn_delayed_send(
                &tracker_sends,
                socket.clone(),
                group,
                payload,
                delay,
                token.clone(),
                "NOTIFY alive",
            );
        }

        let mut ticker = tokio::time::interval(config.notify_interval);
        // Le premier tick est immédiat : l'annonce initiale vient de partir
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    debug!("🔄 Periodic SSDP announcement ({} targets)", targets.len());
                    for target in &targets {
                        let payload = message::alive(&config, target);
                        send_datagram(&socket, group, &payload, "NOTIFY alive").await;
                    }
                }
            }
        }
        debug!("SSDP announcer stopped");
    });
}

/// Programme un envoi différé annulable. Le token partagé abandonne les
/// envois en attente dès que l'arrêt est demandé.
pub(crate) fn spawn_delayed_send(
    tracker: &TaskTracker,
    socket: Arc<UdpSocket>,
    dest: SocketAddr,
    payload: String,
    delay: Duration,
    token: CancellationToken,
    what: &'static str,
) {
    tracker.spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(delay) => {
                send_datagram(&socket, dest, &payload, what).await;
            }
        }
    });
}

/// Envoie un datagramme. Les échecs d'envoi sont journalisés et n'arrêtent
/// jamais les boucles.
pub(crate) async fn send_datagram(socket: &UdpSocket, dest: SocketAddr, payload: &str, what: &str) {
    match socket.send_to(payload.as_bytes(), dest).await {
        Ok(_) => debug!("📤 {} sent to {}", what, dest),
        Err(e) => warn!("❌ Failed to send {} to {}: {}", what, dest, e),
    }
}

/// Envoie un NOTIFY byebye pour chaque target.
pub(crate) async fn send_byebye_all(
    socket: &UdpSocket,
    group: SocketAddr,
    targets: &[NotificationTarget],
) {
    for target in targets {
        let payload = message::byebye(target);
        send_datagram(socket, group, &payload, "NOTIFY byebye").await;
    }
}
