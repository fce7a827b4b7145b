//! Compteur de séquence des notifications GENA.

/// Compteur SEQ d'un abonné.
///
/// La valeur 0 est réservée à l'événement initial envoyé juste après la
/// souscription. Après débordement du compteur 32 bits, la valeur reprend
/// donc à 1, jamais à 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventSeq(pub(crate) u32);

impl EventSeq {
    /// Compteur neuf, positionné sur 0 (événement initial).
    pub fn new() -> Self {
        Self(0)
    }

    /// Valeur courante, sans incrément.
    pub fn current(&self) -> u32 {
        self.0
    }

    /// Incrémente et retourne la nouvelle valeur, en sautant 0 au débordement.
    pub fn next(&mut self) -> u32 {
        self.0 = self.0.wrapping_add(1);
        if self.0 == 0 {
            self.0 = 1;
        }
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_zero() {
        assert_eq!(EventSeq::new().current(), 0);
    }

    #[test]
    fn test_increments() {
        let mut seq = EventSeq::new();
        assert_eq!(seq.next(), 1);
        assert_eq!(seq.next(), 2);
        assert_eq!(seq.next(), 3);
        assert_eq!(seq.current(), 3);
    }

    #[test]
    fn test_wraparound_skips_zero() {
        let mut seq = EventSeq(u32::MAX);
        assert_eq!(seq.next(), 1);
        assert_eq!(seq.next(), 2);
    }
}
