//! Per-account "selected" / "later" sets backed by selection rows.
//!
//! Every mutation writes to the database first and only then touches the
//! in-memory sets, so a failed write leaves the tracker exactly as it was.

use crate::db;
use crate::error::{Error, Result};
use crate::models::{Account, ActivityEntry, SelectionCategory};
use rusqlite::{Connection, Transaction};
use serde::Serialize;
use std::collections::HashSet;

/// What a toggle ended up doing.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    Added,
    Removed,
}

#[derive(Debug, Clone)]
pub struct SelectionTracker {
    account_id: String,
    folder: Option<String>,
    quota: usize,
    finalized: bool,
    selected: HashSet<String>,
    later: HashSet<String>,
}

/// Serializable view of a tracker, ids sorted for stable output.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SelectionState {
    pub selected: Vec<String>,
    pub later: Vec<String>,
    pub selection_limit: usize,
    pub remaining: usize,
    pub is_finalized: bool,
}

impl SelectionTracker {
    /// Partitions the account's stored rows into the two sets.
    pub fn load(conn: &Connection, account: &Account) -> Result<Self> {
        let mut tracker = Self {
            account_id: account.id.clone(),
            folder: account.folder_path.clone(),
            quota: account.quota(),
            finalized: account.is_finalized,
            selected: HashSet::new(),
            later: HashSet::new(),
        };
        for row in db::list_selections(conn, &account.id)? {
            match row.category {
                SelectionCategory::Selected => tracker.selected.insert(row.photo_id),
                SelectionCategory::Later => tracker.later.insert(row.photo_id),
            };
        }
        Ok(tracker)
    }

    pub fn state(&self) -> SelectionState {
        let mut selected: Vec<String> = self.selected.iter().cloned().collect();
        let mut later: Vec<String> = self.later.iter().cloned().collect();
        selected.sort();
        later.sort();
        SelectionState {
            remaining: self.quota.saturating_sub(selected.len()),
            selected,
            later,
            selection_limit: self.quota,
            is_finalized: self.finalized,
        }
    }

    /// Takes the write lock and re-reads the stored finalization flag under it.
    fn begin<'c>(&self, conn: &'c Connection) -> Result<Transaction<'c>> {
        if self.finalized {
            return Err(Error::Finalized);
        }
        let tx = db::begin_immediate(conn)?;
        if db::is_finalized(&tx, &self.account_id)? {
            return Err(Error::Finalized);
        }
        Ok(tx)
    }

    /// Accounts bound to a folder only see the photos in it.
    fn ensure_photo(&self, conn: &Connection, photo_id: &str) -> Result<()> {
        if !db::photo_visible(conn, photo_id, self.folder.as_deref())? {
            return Err(Error::NotFound(format!("Photo {photo_id}")));
        }
        Ok(())
    }

    // Counted from storage: other requests may have selected since this tracker loaded.
    fn ensure_room(&self, conn: &Connection, photo_id: &str) -> Result<()> {
        let taken = db::count_selected_except(conn, &self.account_id, photo_id)?;
        if taken >= self.quota as i64 {
            return Err(Error::QuotaExceeded { limit: self.quota });
        }
        Ok(())
    }

    /// Removes a selected photo, or selects it when there is room under the quota.
    pub fn toggle_selected(
        &mut self,
        conn: &Connection,
        photo_id: &str,
        origin: Option<String>,
    ) -> Result<Toggle> {
        let tx = self.begin(conn)?;
        if self.selected.contains(photo_id) {
            db::delete_selection(&tx, &self.account_id, photo_id)?;
            tx.commit()?;
            self.selected.remove(photo_id);
            return Ok(Toggle::Removed);
        }

        self.ensure_room(&tx, photo_id)?;
        self.ensure_photo(&tx, photo_id)?;
        db::upsert_selection(&tx, &self.account_id, photo_id, SelectionCategory::Selected)?;
        db::insert_activity(
            &tx,
            &ActivityEntry::new("photo_selected")
                .user(&self.account_id)
                .details(serde_json::json!({ "photo_id": photo_id }))
                .origin(origin),
        )?;
        tx.commit()?;
        self.later.remove(photo_id);
        self.selected.insert(photo_id.to_string());
        Ok(Toggle::Added)
    }

    /// Same as [`toggle_selected`](Self::toggle_selected) for the "later" set; no quota applies.
    pub fn toggle_later(&mut self, conn: &Connection, photo_id: &str) -> Result<Toggle> {
        let tx = self.begin(conn)?;
        if self.later.contains(photo_id) {
            db::delete_selection(&tx, &self.account_id, photo_id)?;
            tx.commit()?;
            self.later.remove(photo_id);
            return Ok(Toggle::Removed);
        }

        self.ensure_photo(&tx, photo_id)?;
        db::upsert_selection(&tx, &self.account_id, photo_id, SelectionCategory::Later)?;
        tx.commit()?;
        self.selected.remove(photo_id);
        self.later.insert(photo_id.to_string());
        Ok(Toggle::Added)
    }

    /// Review-page promotion: replaces the photo's row with a fresh "selected" one.
    /// The quota applies here as well; a photo that is already selected is left alone.
    pub fn move_to_selected(&mut self, conn: &Connection, photo_id: &str) -> Result<()> {
        let tx = self.begin(conn)?;
        if self.selected.contains(photo_id) {
            return Ok(());
        }
        self.ensure_room(&tx, photo_id)?;
        self.ensure_photo(&tx, photo_id)?;

        db::delete_selection(&tx, &self.account_id, photo_id)?;
        db::upsert_selection(&tx, &self.account_id, photo_id, SelectionCategory::Selected)?;
        tx.commit()?;

        self.later.remove(photo_id);
        self.selected.insert(photo_id.to_string());
        Ok(())
    }

    /// Drops the photo from both sets. Removing an absent photo is a no-op.
    pub fn remove_selection(&mut self, conn: &Connection, photo_id: &str) -> Result<()> {
        let tx = self.begin(conn)?;
        db::delete_selection(&tx, &self.account_id, photo_id)?;
        tx.commit()?;
        self.selected.remove(photo_id);
        self.later.remove(photo_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{fixtures, memory_pool};

    fn stored_categories(conn: &Connection, account: &Account) -> Vec<(String, SelectionCategory)> {
        db::list_selections(conn, &account.id)
            .unwrap()
            .into_iter()
            .map(|s| (s.photo_id, s.category))
            .collect()
    }

    #[test]
    fn toggling_selected_adds_then_removes() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();
        let account = fixtures::account(&conn, "ava", 3);
        let photos = fixtures::photos(&conn, "/ava", 2);
        let mut tracker = SelectionTracker::load(&conn, &account).unwrap();

        assert_eq!(tracker.toggle_selected(&conn, &photos[0].id, None).unwrap(), Toggle::Added);
        assert!(tracker.selected.contains(&photos[0].id));
        assert_eq!(db::count_selections(&conn, &account.id, SelectionCategory::Selected).unwrap(), 1);

        assert_eq!(tracker.toggle_selected(&conn, &photos[0].id, None).unwrap(), Toggle::Removed);
        assert!(tracker.selected.is_empty());
        assert!(stored_categories(&conn, &account).is_empty());
    }

    #[test]
    fn quota_blocks_the_next_selection_and_leaves_state_alone() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();
        let account = fixtures::account(&conn, "bo", 150);
        let photos = fixtures::photos(&conn, "/bo", 151);
        let mut tracker = SelectionTracker::load(&conn, &account).unwrap();

        for photo in &photos[..150] {
            tracker.toggle_selected(&conn, &photo.id, None).unwrap();
        }
        let err = tracker.toggle_selected(&conn, &photos[150].id, None).unwrap_err();

        assert!(matches!(err, Error::QuotaExceeded { limit: 150 }));
        assert_eq!(tracker.selected.len(), 150);
        assert_eq!(
            db::count_selections(&conn, &account.id, SelectionCategory::Selected).unwrap(),
            150
        );
        // deselecting still works at the limit
        tracker.toggle_selected(&conn, &photos[0].id, None).unwrap();
        tracker.toggle_selected(&conn, &photos[150].id, None).unwrap();
        assert_eq!(tracker.selected.len(), 150);
    }

    #[test]
    fn a_photo_lives_in_one_category_at_a_time() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();
        let account = fixtures::account(&conn, "cy", 5);
        let photo = fixtures::photos(&conn, "/cy", 1).remove(0);
        let mut tracker = SelectionTracker::load(&conn, &account).unwrap();

        tracker.toggle_later(&conn, &photo.id).unwrap();
        assert!(tracker.later.contains(&photo.id));

        tracker.toggle_selected(&conn, &photo.id, None).unwrap();
        assert!(tracker.selected.contains(&photo.id));
        assert!(!tracker.later.contains(&photo.id));
        assert_eq!(
            stored_categories(&conn, &account),
            vec![(photo.id.clone(), SelectionCategory::Selected)]
        );

        tracker.toggle_later(&conn, &photo.id).unwrap();
        assert!(!tracker.selected.contains(&photo.id));
        assert_eq!(
            stored_categories(&conn, &account),
            vec![(photo.id.clone(), SelectionCategory::Later)]
        );
    }

    #[test]
    fn later_ignores_the_quota() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();
        let account = fixtures::account(&conn, "dee", 1);
        let photos = fixtures::photos(&conn, "/dee", 4);
        let mut tracker = SelectionTracker::load(&conn, &account).unwrap();

        tracker.toggle_selected(&conn, &photos[0].id, None).unwrap();
        for photo in &photos[1..] {
            tracker.toggle_later(&conn, &photo.id).unwrap();
        }
        assert_eq!(tracker.later.len(), 3);
    }

    #[test]
    fn only_additions_to_selected_are_logged() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();
        let account = fixtures::account(&conn, "eve", 5);
        let photos = fixtures::photos(&conn, "/eve", 2);
        let mut tracker = SelectionTracker::load(&conn, &account).unwrap();

        tracker.toggle_selected(&conn, &photos[0].id, Some("1.2.3.4".into())).unwrap();
        tracker.toggle_selected(&conn, &photos[0].id, None).unwrap();
        tracker.toggle_later(&conn, &photos[1].id).unwrap();

        let logs = db::list_activity(&conn).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, "photo_selected");
        assert_eq!(logs[0].ip_address.as_deref(), Some("1.2.3.4"));
        assert_eq!(logs[0].details.as_ref().unwrap()["photo_id"], photos[0].id.as_str());
    }

    #[test]
    fn reload_reconciles_with_storage() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();
        let account = fixtures::account(&conn, "fin", 5);
        let photos = fixtures::photos(&conn, "/fin", 3);
        let mut tracker = SelectionTracker::load(&conn, &account).unwrap();
        tracker.toggle_selected(&conn, &photos[0].id, None).unwrap();
        tracker.toggle_later(&conn, &photos[1].id).unwrap();

        let reloaded = SelectionTracker::load(&conn, &account).unwrap();
        assert_eq!(reloaded.state(), tracker.state());
        assert_eq!(reloaded.state().remaining, 4);
    }

    #[test]
    fn move_to_selected_replaces_the_later_row_within_the_quota() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();
        let account = fixtures::account(&conn, "gus", 1);
        let photos = fixtures::photos(&conn, "/gus", 2);
        let mut tracker = SelectionTracker::load(&conn, &account).unwrap();
        tracker.toggle_later(&conn, &photos[0].id).unwrap();
        tracker.toggle_later(&conn, &photos[1].id).unwrap();

        tracker.move_to_selected(&conn, &photos[0].id).unwrap();
        assert!(tracker.selected.contains(&photos[0].id));
        assert!(!tracker.later.contains(&photos[0].id));

        let err = tracker.move_to_selected(&conn, &photos[1].id).unwrap_err();
        assert!(matches!(err, Error::QuotaExceeded { limit: 1 }));
        assert!(tracker.later.contains(&photos[1].id));
        assert_eq!(
            db::count_selections(&conn, &account.id, SelectionCategory::Selected).unwrap(),
            1
        );

        // already selected: nothing to do, even at the limit
        tracker.move_to_selected(&conn, &photos[0].id).unwrap();
    }

    #[test]
    fn remove_selection_is_idempotent() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();
        let account = fixtures::account(&conn, "hal", 5);
        let photo = fixtures::photos(&conn, "/hal", 1).remove(0);
        let mut tracker = SelectionTracker::load(&conn, &account).unwrap();
        tracker.toggle_later(&conn, &photo.id).unwrap();

        tracker.remove_selection(&conn, &photo.id).unwrap();
        tracker.remove_selection(&conn, &photo.id).unwrap();
        tracker.remove_selection(&conn, "never-existed").unwrap();

        assert!(tracker.later.is_empty());
        assert!(stored_categories(&conn, &account).is_empty());
    }

    #[test]
    fn unknown_photos_are_not_found() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();
        let account = fixtures::account(&conn, "ida", 5);
        let mut tracker = SelectionTracker::load(&conn, &account).unwrap();

        assert!(matches!(
            tracker.toggle_selected(&conn, "missing", None),
            Err(Error::NotFound(_))
        ));
        assert!(tracker.selected.is_empty());
    }

    #[test]
    fn trackers_loaded_side_by_side_share_one_quota() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();
        let account = fixtures::account(&conn, "kai", 1);
        let photos = fixtures::photos(&conn, "/kai", 3);
        let mut first = SelectionTracker::load(&conn, &account).unwrap();
        let mut second = SelectionTracker::load(&conn, &account).unwrap();

        first.toggle_selected(&conn, &photos[0].id, None).unwrap();
        assert!(matches!(
            second.toggle_selected(&conn, &photos[1].id, None),
            Err(Error::QuotaExceeded { limit: 1 })
        ));

        second.toggle_later(&conn, &photos[2].id).unwrap();
        assert!(matches!(
            second.move_to_selected(&conn, &photos[2].id),
            Err(Error::QuotaExceeded { limit: 1 })
        ));
        assert_eq!(
            db::count_selections(&conn, &account.id, SelectionCategory::Selected).unwrap(),
            1
        );

        // reselecting a photo another tracker already stored does not count it twice
        assert_eq!(
            second.toggle_selected(&conn, &photos[0].id, None).unwrap(),
            Toggle::Added
        );
    }

    #[test]
    fn photos_outside_the_account_folder_are_not_found() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();
        let account = fixtures::account(&conn, "own", 5);
        let own = fixtures::photos(&conn, "/own", 1).remove(0);
        let foreign = fixtures::photos(&conn, "/someone-else", 1).remove(0);
        let mut tracker = SelectionTracker::load(&conn, &account).unwrap();

        assert!(matches!(
            tracker.toggle_selected(&conn, &foreign.id, None),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(tracker.toggle_later(&conn, &foreign.id), Err(Error::NotFound(_))));
        assert!(matches!(
            tracker.move_to_selected(&conn, &foreign.id),
            Err(Error::NotFound(_))
        ));
        assert!(stored_categories(&conn, &account).is_empty());

        tracker.toggle_selected(&conn, &own.id, None).unwrap();
        assert_eq!(tracker.state().selected, vec![own.id.clone()]);
    }

    #[test]
    fn a_tracker_loaded_before_finalizing_cannot_write() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();
        let account = fixtures::account(&conn, "lev", 5);
        let photo = fixtures::photos(&conn, "/lev", 1).remove(0);
        let mut tracker = SelectionTracker::load(&conn, &account).unwrap();
        db::set_finalized(&conn, &account.id, true).unwrap();

        assert!(matches!(
            tracker.toggle_selected(&conn, &photo.id, None),
            Err(Error::Finalized)
        ));
        assert!(stored_categories(&conn, &account).is_empty());
    }

    #[test]
    fn finalized_accounts_cannot_change_their_selection() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();
        let account = fixtures::account(&conn, "jo", 5);
        let photo = fixtures::photos(&conn, "/jo", 1).remove(0);
        db::set_finalized(&conn, &account.id, true).unwrap();
        let account = db::get_account(&conn, &account.id).unwrap().unwrap();
        let mut tracker = SelectionTracker::load(&conn, &account).unwrap();

        assert!(matches!(
            tracker.toggle_selected(&conn, &photo.id, None),
            Err(Error::Finalized)
        ));
        assert!(matches!(tracker.toggle_later(&conn, &photo.id), Err(Error::Finalized)));
        assert!(tracker.state().is_finalized);
    }
}
