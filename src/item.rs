use std::thread;

use tracing::debug;

use crate::error::{DeleteError, FeedError};
use crate::feed::{
    auth_error, mutation_error, Feed, MutationKind, MutationOutcome, Notification, PendingDelete,
    Response,
};
use crate::model::{can_delete, FeedEntry, Viewer};

pub const DELETED_MESSAGE: &str = "Comment deleted successfully";

/// One row of the feed as the viewer sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentItem {
    pub entry: FeedEntry,
    /// Whether the delete control is offered.
    pub deletable: bool,
    /// A delete for this comment is in flight.
    pub deleting: bool,
}

impl CommentItem {
    pub fn new(entry: FeedEntry, viewer: Option<&Viewer>, deleting: bool) -> Self {
        let deletable = match &entry {
            FeedEntry::Server(comment) => can_delete(viewer, comment),
            FeedEntry::Pending(_) => false,
        };
        Self {
            entry,
            deletable,
            deleting,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.entry.id()
    }
}

impl Feed {
    /// The rendered list with per-item delete rights for the current viewer.
    pub fn items(&self) -> Vec<CommentItem> {
        let viewer = self.viewer();
        self.entries()
            .into_iter()
            .map(|entry| {
                let deleting = entry
                    .id()
                    .is_some_and(|id| self.deleting.contains_key(id));
                CommentItem::new(entry, viewer.as_ref(), deleting)
            })
            .collect()
    }

    pub fn is_deleting(&self, comment_id: &str) -> bool {
        self.deleting.contains_key(comment_id)
    }

    /// Deletes a comment the viewer owns or administers. The comment stays
    /// in the list until a re-fetch no longer returns it.
    pub fn delete_comment(&mut self, comment_id: &str) -> Result<(), DeleteError> {
        let comment = self
            .entries()
            .into_iter()
            .find_map(|entry| match entry {
                FeedEntry::Server(comment) if comment.id == comment_id => Some(comment),
                _ => None,
            })
            .ok_or_else(|| DeleteError::UnknownComment(comment_id.to_string()))?;
        if !can_delete(self.viewer().as_ref(), &comment) {
            return Err(DeleteError::Forbidden(comment_id.to_string()));
        }
        if self.deleting.contains_key(comment_id) {
            return Err(DeleteError::InProgress(comment_id.to_string()));
        }

        let request_id = self.next_request_id();
        let post_id = self.post_id.clone();
        let comment_id = comment.id;
        self.deleting.insert(
            comment_id.clone(),
            PendingDelete {
                request_id,
                post_id: post_id.clone(),
            },
        );
        debug!(request_id, %post_id, %comment_id, "delete comment");

        let tx = self.response_tx.clone();
        let service = self.service.clone();
        let identity = self.identity.clone();
        thread::spawn(move || {
            let result = identity
                .token()
                .map_err(auth_error)
                .and_then(|token| {
                    service
                        .delete_comment(&comment_id, &token)
                        .map_err(mutation_error)
                });
            let _ = tx.send(Response::Deleted {
                request_id,
                post_id,
                comment_id,
                result,
            });
        });
        Ok(())
    }

    pub(crate) fn handle_deleted(
        &mut self,
        request_id: u64,
        post_id: String,
        comment_id: String,
        result: Result<(), FeedError>,
    ) {
        let Some(pending) = self.deleting.get(&comment_id) else {
            debug!(request_id, %comment_id, "discard unexpected delete response");
            return;
        };
        if pending.request_id != request_id
            || pending.post_id != post_id
            || post_id != self.post_id
        {
            debug!(request_id, %comment_id, "discard stale delete response");
            return;
        }
        self.deleting.remove(&comment_id);

        let kind = MutationKind::Delete {
            comment_id: comment_id.clone(),
        };
        match result {
            Ok(()) => {
                self.notify(Notification::success(DELETED_MESSAGE));
                self.settle(kind, MutationOutcome::Succeeded);
                self.start_load();
            }
            Err(err) => {
                debug!(%post_id, %comment_id, error = %err, "failed to delete comment");
                let message = err.message().to_string();
                self.notify(Notification::error(message.clone()));
                self.settle(kind, MutationOutcome::Failed(message));
            }
        }
    }
}
