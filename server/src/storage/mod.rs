pub mod data_url;
pub mod local;

use async_trait::async_trait;
use thiserror::Error;

/// Content types accepted for post images.
pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage path: {0}")]
    InvalidPath(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decoded image bytes plus their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Object storage for uploaded images.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store `image` at `path` and return a URL it can be fetched from.
    async fn put(&self, path: &str, image: &ImageData) -> Result<String, StorageError>;

    /// Remove the object at `path`. Removing a missing object is not an error.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// Map a URL previously returned by `put` back to its storage path.
    fn path_for_url(&self, url: &str) -> Option<String>;
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// Storage path for a post's image, derived from the post ID.
pub fn post_image_path(post_id: &str, content_type: &str) -> String {
    format!("posts/{post_id}/image.{}", extension_for(content_type))
}

/// Storage path for a community's image.
pub fn community_image_path(community_id: &str, content_type: &str) -> String {
    format!("communities/{community_id}/image.{}", extension_for(content_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_image_path() {
        assert_eq!(post_image_path("p1", "image/png"), "posts/p1/image.png");
        assert_eq!(post_image_path("p1", "image/jpeg"), "posts/p1/image.jpg");
        assert_eq!(
            post_image_path("p1", "application/x-unknown"),
            "posts/p1/image.bin"
        );
    }

    #[test]
    fn test_community_image_path() {
        assert_eq!(
            community_image_path("art", "image/webp"),
            "communities/art/image.webp"
        );
    }
}
