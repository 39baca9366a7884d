// SPDX-License-Identifier: MIT
// Copyright(c) 2023 Darek Stojaczyk

//! This speaker's Generation ID: a value chosen once at startup and
//! carried in every Hello, so neighbors can tell a restart apart from a
//! still-running speaker and re-synchronize their Join/Prune state.

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationId(u32);

impl GenerationId {
    /// Draws a fresh, uniformly random generation ID. RFC 7761 only
    /// requires that it change across restarts; this speaker draws one
    /// per process rather than persisting it, trading a vanishingly
    /// small chance of an unchanged value for not needing any state file.
    pub fn generate() -> Self {
        GenerationId(rand::thread_rng().gen())
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successive_ids_are_unlikely_to_collide() {
        let a = GenerationId::generate();
        let b = GenerationId::generate();
        assert_ne!(a.get(), b.get());
    }
}
