//! Closing the selection phase: feedback goes in, the account is locked.

use crate::db;
use crate::error::{Error, Result};
use crate::models::{Account, ActivityEntry, Feedback, SelectionCategory};
use crate::settings;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

const MAX_RATING: i64 = 5;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedbackForm {
    #[serde(default)]
    pub overall_rating: i64,
    #[serde(default)]
    pub selection_experience: i64,
    #[serde(default)]
    pub photo_quality: i64,
    #[serde(default)]
    pub comments: Option<String>,
}

impl FeedbackForm {
    /// All three ratings must be set, each between 1 and 5.
    pub fn ratings(&self) -> Result<[u8; 3]> {
        let fields = [
            ("overall_rating", self.overall_rating),
            ("selection_experience", self.selection_experience),
            ("photo_quality", self.photo_quality),
        ];
        let mut ratings = [0u8; 3];
        for (slot, (name, value)) in ratings.iter_mut().zip(fields) {
            if !(1..=MAX_RATING).contains(&value) {
                return Err(Error::Validation(format!(
                    "{name} must be between 1 and {MAX_RATING}"
                )));
            }
            *slot = value as u8;
        }
        Ok(ratings)
    }

    fn comments(&self) -> Option<&str> {
        self.comments
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Top marks across the board earn the public review prompt.
    pub fn is_perfect(&self) -> bool {
        [self.overall_rating, self.selection_experience, self.photo_quality]
            .iter()
            .all(|&r| r == MAX_RATING)
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct FinalizeOutcome {
    pub feedback: Feedback,
    pub selected_count: i64,
    /// Photos parked in "later" that did not make the final cut.
    pub later_skipped: i64,
    pub request_review: bool,
    pub review_url: Option<String>,
}

/// Stores the feedback and locks the account's selection in one transaction.
pub fn finalize(
    conn: &Connection,
    account: &Account,
    form: &FeedbackForm,
    fallback_review_url: Option<&str>,
    origin: Option<String>,
) -> Result<FinalizeOutcome> {
    let ratings = form.ratings()?;
    if account.is_finalized {
        return Err(Error::Finalized);
    }

    // The account may have been finalized since it was loaded; the flag is
    // claimed under the write lock before any feedback is stored.
    let tx = db::begin_immediate(conn)?;
    let selected_count = db::count_selections(&tx, &account.id, SelectionCategory::Selected)?;
    if selected_count == 0 {
        return Err(Error::NothingSelected);
    }
    let later_skipped = db::count_selections(&tx, &account.id, SelectionCategory::Later)?;
    if !db::claim_finalization(&tx, &account.id)? {
        return Err(Error::Finalized);
    }
    let feedback = db::insert_feedback(&tx, &account.id, ratings, form.comments())?;
    db::insert_activity(
        &tx,
        &ActivityEntry::new("selection_finalized")
            .user(&account.id)
            .details(serde_json::json!({
                "selected": selected_count,
                "later_skipped": later_skipped,
                "feedback_id": feedback.id,
            }))
            .origin(origin),
    )?;
    tx.commit()?;
    log::info!(
        "{} finalized {} photos ({} left in later)",
        account.username,
        selected_count,
        later_skipped
    );

    let request_review = form.is_perfect();
    let review_url = if request_review {
        settings::review_url(conn, fallback_review_url)?
    } else {
        None
    };

    Ok(FinalizeOutcome {
        feedback,
        selected_count,
        later_skipped,
        request_review,
        review_url,
    })
}
