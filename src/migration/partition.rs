use std::collections::HashMap;

use crate::storage::Entity;

/// Entities grouped by partition key
///
/// Partitions iterate in the order their key was first seen; entities keep
/// their input order within a partition.
#[derive(Debug, Default)]
pub struct PartitionGroups {
    groups: Vec<(String, Vec<Entity>)>,
    index: HashMap<String, usize>,
}

impl PartitionGroups {
    pub fn push(&mut self, entity: Entity) {
        match self.index.get(entity.partition_key()) {
            Some(&slot) => self.groups[slot].1.push(entity),
            None => {
                let key = entity.partition_key().to_string();
                self.index.insert(key.clone(), self.groups.len());
                self.groups.push((key, vec![entity]));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, partition_key: &str) -> Option<&[Entity]> {
        self.index
            .get(partition_key)
            .map(|&slot| self.groups[slot].1.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Entity])> {
        self.groups
            .iter()
            .map(|(key, entities)| (key.as_str(), entities.as_slice()))
    }
}

pub fn group_by_partition(entities: Vec<Entity>) -> PartitionGroups {
    let mut groups = PartitionGroups::default();
    for entity in entities {
        groups.push(entity);
    }
    groups
}

/// Lazily split `items` into chunks of at most `size` (a size of 0 counts as 1)
pub fn batched<T>(items: &[T], size: usize) -> impl Iterator<Item = &[T]> {
    items.chunks(size.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entities(keys: &[(&str, &str)]) -> Vec<Entity> {
        keys.iter().map(|(pk, rk)| Entity::new(*pk, *rk)).collect()
    }

    #[test]
    fn test_group_preserves_order() {
        let groups = group_by_partition(entities(&[
            ("b", "1"),
            ("a", "2"),
            ("b", "3"),
            ("c", "4"),
            ("a", "5"),
        ]));

        let keys: Vec<&str> = groups.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);

        let rows: Vec<&str> = groups.get("a").unwrap().iter().map(Entity::row_key).collect();
        assert_eq!(rows, vec!["2", "5"]);
    }

    #[test]
    fn test_every_row_in_exactly_one_homogeneous_group() {
        let input = entities(&[("x", "1"), ("y", "2"), ("x", "3"), ("z", "4"), ("y", "5")]);
        let total = input.len();
        let groups = group_by_partition(input);

        let mut seen = 0;
        for (key, rows) in groups.iter() {
            assert!(rows.iter().all(|e| e.partition_key() == key));
            seen += rows.len();
        }
        assert_eq!(seen, total);
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn test_group_empty() {
        let groups = group_by_partition(Vec::new());
        assert!(groups.is_empty());
        assert_eq!(groups.iter().count(), 0);
    }

    #[test]
    fn test_batched_sizes_and_order() {
        let rows: Vec<u32> = (0..250).collect();
        let chunks: Vec<&[u32]> = batched(&rows, 100).collect();

        assert_eq!(chunks.iter().map(|c| c.len()).collect::<Vec<_>>(), vec![100, 100, 50]);
        assert_eq!(chunks.concat(), rows);
    }

    #[test]
    fn test_batched_exact_multiple_and_empty() {
        let rows: Vec<u32> = (0..200).collect();
        assert_eq!(batched(&rows, 100).count(), 2);

        let empty: Vec<u32> = Vec::new();
        assert_eq!(batched(&empty, 100).count(), 0);
    }

    #[test]
    fn test_batched_zero_size() {
        let rows = [1, 2, 3];
        assert!(batched(&rows, 0).all(|chunk| chunk.len() == 1));
    }
}
