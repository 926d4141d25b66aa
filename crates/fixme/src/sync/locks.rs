use std::collections::BTreeSet;

use tokio::sync::{Mutex, MutexGuard};

use super::types::ISSUE_LOCK_SHARDS;

/// Sharded mutexes serializing read-modify-write cycles per remote issue id.
///
/// The reconciler and the sweeper both write issue rows. Each locks the
/// shards covering its whole batch before reading, and releases them after
/// writing. Shards are always taken in ascending index order, so two
/// batches can never deadlock on each other.
#[derive(Debug)]
pub struct IssueLocks {
    shards: Box<[Mutex<()>]>,
}

impl Default for IssueLocks {
    fn default() -> Self {
        Self::new(ISSUE_LOCK_SHARDS)
    }
}

impl IssueLocks {
    pub fn new(shards: usize) -> Self {
        let shards = (0..shards.max(1)).map(|_| Mutex::new(())).collect();
        Self { shards }
    }

    fn shard_of(&self, remote_id: i64) -> usize {
        (remote_id.unsigned_abs() % self.shards.len() as u64) as usize
    }

    /// Lock every shard covering `remote_ids`. Guards release on drop.
    pub async fn lock_many(
        &self,
        remote_ids: impl IntoIterator<Item = i64>,
    ) -> Vec<MutexGuard<'_, ()>> {
        let indices: BTreeSet<usize> = remote_ids
            .into_iter()
            .map(|id| self.shard_of(id))
            .collect();

        let mut guards = Vec::with_capacity(indices.len());
        for index in indices {
            guards.push(self.shards[index].lock().await);
        }
        guards
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn shard_of_wraps_and_handles_negatives() {
        let locks = IssueLocks::new(4);
        assert_eq!(locks.shard_of(5), 1);
        assert_eq!(locks.shard_of(-5), 1);
        assert_eq!(locks.shard_of(0), 0);
    }

    #[tokio::test]
    async fn lock_many_dedupes_shards() {
        let locks = IssueLocks::new(4);
        let guards = locks.lock_many([1, 5, 9, 2]).await;
        assert_eq!(guards.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_batches_serialize() {
        let locks = Arc::new(IssueLocks::default());

        let first = locks.lock_many([42, 7]).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guards = locks.lock_many([7]).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!contender.is_finished());

        drop(first);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn disjoint_batches_do_not_block() {
        let locks = IssueLocks::default();
        let _a = locks.lock_many([1]).await;
        let _b = locks.lock_many([2]).await;
    }
}
