use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Configuration invalide : empêche le démarrage du serveur.
    #[error("Invalid discovery configuration: {0}")]
    Config(String),

    /// Échec du socket (bind, join multicast) au démarrage.
    ///
    /// Les échecs d'envoi après le démarrage sont journalisés, jamais
    /// propagés : les boucles d'annonce et d'écoute continuent.
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),
}
