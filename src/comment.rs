use serde::{Deserialize, Serialize};

/// One harvested comment.
///
/// `user` and `text` are always non-empty. The avatar fields are empty when
/// the image was missing or, for the path, when the download failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub user: String,
    pub text: String,
    #[serde(rename = "profilePictureURL")]
    pub profile_picture_url: String,
    #[serde(rename = "profilePicturePath")]
    pub profile_picture_path: String,
}
