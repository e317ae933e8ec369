//! Fixed-size ring of signed attempts indexed by `sequence % limit`.

use crate::pipeline::types::SignedAttempt;

/// Tracks at most `limit` signed-but-unconfirmed attempts.
///
/// A slot is only valid for the sequence it was stored under. Looking up a
/// slot with a different sequence clears it.
#[derive(Debug)]
pub struct InFlightWindow {
    slots: Vec<Option<SignedAttempt>>,
    occupied: usize,
}

impl InFlightWindow {
    pub fn new(limit: u64) -> Self {
        let capacity = usize::try_from(limit.max(1)).unwrap_or(usize::MAX);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            occupied: 0,
        }
    }

    fn index(&self, sequence: u64) -> usize {
        (sequence % self.slots.len() as u64) as usize
    }

    /// Store `attempt` in its slot. Returns whatever the slot held before.
    pub fn insert(&mut self, attempt: SignedAttempt) -> Option<SignedAttempt> {
        let index = self.index(attempt.sequence);
        let sequence = attempt.sequence;
        let previous = self.slots[index].replace(attempt);
        match &previous {
            Some(old) if old.sequence != sequence => {
                tracing::warn!(
                    sequence = sequence,
                    displaced = old.sequence,
                    "In-flight slot overwritten"
                );
            }
            Some(_) => {}
            None => self.occupied += 1,
        }
        previous
    }

    /// Remove and return the attempt for `sequence`, if the slot holds it.
    pub fn take(&mut self, sequence: u64) -> Option<SignedAttempt> {
        let index = self.index(sequence);
        let attempt = self.slots[index].take()?;
        self.occupied -= 1;
        if attempt.sequence != sequence {
            tracing::warn!(
                sequence = sequence,
                stale = attempt.sequence,
                "Discarding stale in-flight entry"
            );
            return None;
        }
        Some(attempt)
    }

    pub fn contains(&self, sequence: u64) -> bool {
        matches!(&self.slots[self.index(sequence)], Some(a) if a.sequence == sequence)
    }

    pub fn len(&self) -> usize {
        self.occupied
    }

    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
