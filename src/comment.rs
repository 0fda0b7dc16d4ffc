use crate::resolve::DetectionMethod;
use serde::{Deserialize, Serialize};

/// One captured comment or reply
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    /// Session-stable identity
    pub id: String,
    pub parent_id: Option<String>,
    pub author: String,
    pub author_name: String,
    pub profile_url: String,
    pub profile_image: String,
    pub text: String,
    /// Relative timestamp as displayed by the host, in its locale
    pub timestamp: String,
    pub likes: u32,
    /// 0 for top-level comments
    pub depth: u32,
    pub is_reply: bool,
    /// The host shows more nested replies than were loaded
    #[serde(rename = "hasUnloadedReplies")]
    pub has_unresolved_replies: bool,
    #[serde(rename = "replyToAuthor")]
    pub reply_target_author: Option<String>,
    pub detection_method: DetectionMethod,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_field_names() {
        let comment = CommentNode {
            id: "comment_2_1700000000000".to_string(),
            parent_id: Some("comment_1_1700000000000".to_string()),
            author: "Bob".to_string(),
            author_name: "Bob".to_string(),
            profile_url: "https://www.facebook.com/bob".to_string(),
            profile_image: String::new(),
            text: "Agreed".to_string(),
            timestamp: "2 h".to_string(),
            likes: 3,
            depth: 1,
            is_reply: true,
            has_unresolved_replies: false,
            reply_target_author: Some("Ann".to_string()),
            detection_method: DetectionMethod::NestedDomStructure,
        };

        let json = serde_json::to_value(&comment).unwrap();
        assert_eq!(json["parentId"], "comment_1_1700000000000");
        assert_eq!(json["isReply"], true);
        assert_eq!(json["hasUnloadedReplies"], false);
        assert_eq!(json["replyToAuthor"], "Ann");
        assert_eq!(json["detectionMethod"], "nested-dom-structure");
    }
}
