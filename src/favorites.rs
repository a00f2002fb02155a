//! Favorite teachers.
//!
//! A purely local set of teacher ids. Never synced; survives restarts via
//! [`LocalStorage`].

use crate::error::StorageResult;
use crate::storage::LocalStorage;

const FAVORITES_KEY: &str = "dc_favorites";

#[derive(Debug, Clone)]
pub struct Favorites {
    storage: LocalStorage,
}

impl Favorites {
    pub fn new(storage: LocalStorage) -> Self {
        Self { storage }
    }

    /// Favorite teacher ids, oldest first.
    pub fn all(&self) -> StorageResult<Vec<i64>> {
        Ok(self.storage.get(FAVORITES_KEY)?.unwrap_or_default())
    }

    pub fn is_favorite(&self, teacher_id: i64) -> StorageResult<bool> {
        Ok(self.all()?.contains(&teacher_id))
    }

    /// Flips a teacher in or out of the set and returns the new membership.
    pub fn toggle(&self, teacher_id: i64) -> StorageResult<bool> {
        let mut ids = self.all()?;
        let added = match ids.iter().position(|&id| id == teacher_id) {
            Some(index) => {
                ids.remove(index);
                false
            }
            None => {
                ids.push(teacher_id);
                true
            }
        };
        self.storage.set(FAVORITES_KEY, &ids)?;
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (Favorites, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        (Favorites::new(LocalStorage::new(temp_dir.path())), temp_dir)
    }

    #[test]
    fn test_empty_by_default() {
        let (favorites, _temp) = setup();
        assert!(favorites.all().unwrap().is_empty());
        assert!(!favorites.is_favorite(1).unwrap());
    }

    #[test]
    fn test_toggle_is_self_inverse() {
        let (favorites, _temp) = setup();

        assert!(favorites.toggle(3).unwrap());
        assert!(favorites.is_favorite(3).unwrap());

        assert!(!favorites.toggle(3).unwrap());
        assert!(!favorites.is_favorite(3).unwrap());
        assert!(favorites.all().unwrap().is_empty());
    }

    #[test]
    fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();

        let favorites = Favorites::new(LocalStorage::new(temp_dir.path()));
        favorites.toggle(1).unwrap();
        favorites.toggle(4).unwrap();

        let reopened = Favorites::new(LocalStorage::new(temp_dir.path()));
        assert_eq!(reopened.all().unwrap(), vec![1, 4]);
    }

    #[test]
    fn test_keeps_insertion_order() {
        let (favorites, _temp) = setup();
        favorites.toggle(4).unwrap();
        favorites.toggle(1).unwrap();
        favorites.toggle(2).unwrap();
        favorites.toggle(1).unwrap();
        assert_eq!(favorites.all().unwrap(), vec![4, 2]);
    }
}
