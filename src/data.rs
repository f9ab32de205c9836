use std::sync::Arc;

use crate::api::{self, ApiError};
use crate::identity::Token;
use crate::model::Comment;

/// Network side of the feed. Calls block; the feed runs them on worker
/// threads.
pub trait CommentService: Send + Sync {
    fn load_comments(&self, post_id: &str) -> Result<Vec<Comment>, ApiError>;
    fn create_comment(&self, post_id: &str, body: &str, token: &Token) -> Result<(), ApiError>;
    fn delete_comment(&self, comment_id: &str, token: &Token) -> Result<(), ApiError>;
}

pub struct ApiCommentService {
    client: Arc<api::Client>,
}

impl ApiCommentService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl CommentService for ApiCommentService {
    fn load_comments(&self, post_id: &str) -> Result<Vec<Comment>, ApiError> {
        self.client.list_comments(post_id)
    }

    fn create_comment(&self, post_id: &str, body: &str, token: &Token) -> Result<(), ApiError> {
        self.client.create_comment(post_id, body, token)
    }

    fn delete_comment(&self, comment_id: &str, token: &Token) -> Result<(), ApiError> {
        self.client.delete_comment(comment_id, token)
    }
}
