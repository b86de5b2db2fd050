use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;

use nemea_wire::AdaptiveEntity;
use tokio::sync::Mutex;

use crate::stats::Stats;

/// C6: maintains the union of every live scenario instance's adaptive
/// entities and mirrors it to the on-disk watchlist file whenever it
/// changes (§4.6).
pub struct WatchlistPublisher {
    path: PathBuf,
    current_union: Mutex<HashSet<AdaptiveEntity>>,
}

impl WatchlistPublisher {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            current_union: Mutex::new(HashSet::new()),
        }
    }

    /// Compares `new_union` against the last-published set; if different,
    /// writes the sorted file atomically and adopts the new set. On
    /// filesystem failure `current_union` is left untouched so the next
    /// tick retries the write (§7).
    pub async fn publish_if_changed(&self, new_union: HashSet<AdaptiveEntity>, stats: &Stats) -> bool {
        let mut current = self.current_union.lock().await;
        if *current == new_union {
            return false;
        }

        let mut sorted: Vec<AdaptiveEntity> = new_union.iter().copied().collect();
        sorted.sort();

        match self.write_atomic(&sorted) {
            Ok(()) => {
                *current = new_union;
                true
            }
            Err(error) => {
                tracing::warn!(path = %self.path.display(), %error, "watchlist write failed, retaining previous file");
                Stats::incr(&stats.watchlist_write_failures);
                false
            }
        }
    }

    fn write_atomic(&self, entities: &[AdaptiveEntity]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut tmp = std::fs::File::create(&tmp_path)?;
            for entity in entities {
                writeln!(tmp, "{entity}")?;
            }
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nemea_wire::BlacklistId;
    use std::net::Ipv4Addr;
    use uuid::Uuid;

    #[tokio::test]
    async fn writes_sorted_numerically_and_skips_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("watchlist.txt");
        let publisher = WatchlistPublisher::new(path.clone());
        let stats = Stats::default();

        let mut set = HashSet::new();
        set.insert(AdaptiveEntity::new(
            Ipv4Addr::new(10, 0, 0, 1),
            BlacklistId(1),
            Uuid::nil(),
        ));
        set.insert(AdaptiveEntity::new(
            Ipv4Addr::new(9, 0, 0, 1),
            BlacklistId(1),
            Uuid::nil(),
        ));

        assert!(publisher.publish_if_changed(set.clone(), &stats).await);
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("9.0.0.1"));
        assert!(lines[1].starts_with("10.0.0.1"));

        assert!(!publisher.publish_if_changed(set, &stats).await);
    }
}
