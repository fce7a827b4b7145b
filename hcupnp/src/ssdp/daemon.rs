//! Backend d'annonce délégant les M-SEARCH à un démon de découverte local.
//!
//! Sur certaines installations, un démon système (style minissdpd) possède
//! déjà le port 1900 et répond aux M-SEARCH pour tous les services de la
//! machine. Ce backend enregistre chaque target auprès du démon via son
//! socket unix, puis n'assure lui-même que les annonces alive/byebye en
//! multicast. Interface identique au serveur autonome : [`Discovery`].

use super::server::{open_announce_socket, send_byebye_all, spawn_announcer};
use super::{Discovery, DiscoveryError, NotificationTarget, SSDP_MULTICAST_ADDR, SSDP_PORT};
use crate::config::DiscoveryConfig;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{UdpSocket, UnixStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

/// Type de requête "submit service" du protocole du démon.
const SUBMIT_REQUEST: u8 = 4;

/// Backend d'annonce s'appuyant sur un démon de découverte externe.
pub struct DaemonDiscovery {
    config: DiscoveryConfig,
    targets: Vec<NotificationTarget>,
    socket_path: PathBuf,
    group: SocketAddr,
    state: Mutex<Option<Running>>,
}

struct Running {
    socket: Arc<UdpSocket>,
    token: CancellationToken,
    tracker: TaskTracker,
}

impl DaemonDiscovery {
    pub fn new(config: DiscoveryConfig, socket_path: PathBuf) -> Self {
        let group: SocketAddr = format!("{}:{}", SSDP_MULTICAST_ADDR, SSDP_PORT)
            .parse()
            .expect("valid SSDP group address");
        Self::with_group(config, socket_path, group)
    }

    /// Variante paramétrable, utilisée par les tests avec un groupe local.
    pub(crate) fn with_group(
        config: DiscoveryConfig,
        socket_path: PathBuf,
        group: SocketAddr,
    ) -> Self {
        let targets = NotificationTarget::build_set(
            &config.device_udn,
            &config.device_type,
            &config.service_types,
        );
        Self {
            config,
            targets,
            socket_path,
            group,
            state: Mutex::new(None),
        }
    }

    /// Enregistre tous les targets auprès du démon.
    async fn register_targets(&self) -> Result<(), DiscoveryError> {
        let mut stream = UnixStream::connect(&self.socket_path).await?;
        for target in &self.targets {
            let frame = submit_frame(
                &target.notification_type,
                &target.unique_service_name,
                &self.config.server_header,
                &self.config.location,
            );
            stream.write_all(&frame).await?;
            debug!(
                "📝 Registered {} with discovery daemon",
                target.unique_service_name
            );
        }
        stream.shutdown().await?;
        Ok(())
    }
}

#[async_trait]
impl Discovery for DaemonDiscovery {
    /// Démarre le backend : enregistrement auprès du démon, puis annonces
    /// alive périodiques. Pas d'écouteur M-SEARCH : le démon s'en charge.
    async fn start(&self) -> Result<(), DiscoveryError> {
        self.config.validate()?;

        {
            let state = self.state.lock();
            if state.is_some() {
                return Ok(());
            }
        }

        self.register_targets().await?;

        // Port éphémère : le démon détient 1900, on n'écoute pas.
        let bind_addr: SocketAddr = "0.0.0.0:0".parse().expect("valid bind address");
        let socket = open_announce_socket(&self.config, self.group, bind_addr)?;
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

        {
            let mut state = self.state.lock();
            if state.is_none() {
                *state = Some(Running {
                    socket,
                    token,
                    tracker,
                });
                info!(
                    "✅ SSDP announcements delegated to daemon at {} ({} targets)",
                    self.socket_path.display(),
                    self.targets.len()
                );
                return Ok(());
            }
        }

        // Un start concurrent a gagné la course pendant l'enregistrement :
        // on démonte l'annonceur qui vient d'être lancé.
        token.cancel();
        tracker.close();
        tracker.wait().await;
        Ok(())
    }

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

        info!("👋 Stopping daemon-backed announcements, sending byebye");
        send_byebye_all(&socket, self.group, &self.targets).await;
    }
}

/// Fabrique une trame "submit service" : type de requête puis les quatre
/// chaînes (ST, USN, SERVER, LOCATION), chacune préfixée de sa longueur.
fn submit_frame(st: &str, usn: &str, server: &str, location: &str) -> Vec<u8> {
    let mut frame = vec![SUBMIT_REQUEST];
    for value in [st, usn, server, location] {
        encode_string(&mut frame, value);
    }
    frame
}

/// Encode une chaîne préfixée de sa longueur en base 128 : 7 bits utiles
/// par octet, bit de poids fort levé sur tous les octets sauf le dernier.
fn encode_string(buf: &mut Vec<u8>, value: &str) {
    let mut len = value.len();
    let mut prefix = Vec::new();
    loop {
        prefix.push((len & 0x7f) as u8);
        len >>= 7;
        if len == 0 {
            break;
        }
    }
    prefix.reverse();
    let last = prefix.len() - 1;
    for (i, byte) in prefix.iter().enumerate() {
        buf.push(if i == last { *byte } else { *byte | 0x80 });
    }
    buf.extend_from_slice(value.as_bytes());
}
