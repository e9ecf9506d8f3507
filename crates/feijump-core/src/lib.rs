pub mod effect;
pub mod host;
pub mod scene;
pub mod scheduler;
pub mod storage;
pub mod time;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use rand::RngCore;

    use crate::host::{EntityId, HostCommand};
    use crate::storage::{KeyValueStore, StorageError};

    /// Deterministic RNG that replays a fixed sequence of words, cycling forever.
    #[derive(Debug, Clone)]
    pub struct SequenceRng {
        words: Vec<u64>,
        cursor: usize,
    }

    impl SequenceRng {
        /// `words` must be non-empty; an empty slice behaves like `[0]`.
        pub fn new(words: &[u64]) -> Self {
            let words = if words.is_empty() {
                vec![0]
            } else {
                words.to_vec()
            };
            Self { words, cursor: 0 }
        }
    }

    impl RngCore for SequenceRng {
        fn next_u32(&mut self) -> u32 {
            (self.next_u64() >> 32) as u32
        }

        fn next_u64(&mut self) -> u64 {
            let word = self.words[self.cursor % self.words.len()];
            self.cursor += 1;
            word
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            for chunk in dst.chunks_mut(8) {
                let bytes = self.next_u64().to_le_bytes();
                chunk.copy_from_slice(&bytes[..chunk.len()]);
            }
        }
    }

    /// Store whose every operation fails, for exercising persistence fallbacks.
    #[derive(Debug, Clone, Default)]
    pub struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("test store always fails".to_string()))
        }

        fn set_item(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Io("disk full".to_string()))
        }
    }

    /// Entities destroyed by a batch of commands, in order.
    pub fn destroyed_entities(commands: &[HostCommand]) -> Vec<EntityId> {
        commands
            .iter()
            .filter_map(|c| match c {
                HostCommand::Destroy { entity } => Some(*entity),
                _ => None,
            })
            .collect()
    }

    /// Last vertical velocity set on `entity` by a batch of commands.
    pub fn last_velocity_y(commands: &[HostCommand], entity: EntityId) -> Option<f32> {
        commands.iter().rev().find_map(|c| match c {
            HostCommand::SetVelocityY { entity: e, vy } if *e == entity => Some(*vy),
            _ => None,
        })
    }

    /// Last gravity set on `entity` by a batch of commands.
    pub fn last_gravity(commands: &[HostCommand], entity: EntityId) -> Option<f32> {
        commands.iter().rev().find_map(|c| match c {
            HostCommand::SetGravity { entity: e, gravity } if *e == entity => Some(*gravity),
            HostCommand::SpawnPlayer {
                entity: e, gravity, ..
            } if *e == entity => Some(*gravity),
            _ => None,
        })
    }
}
