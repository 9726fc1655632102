//! Wire types of the review server
//!
//! Optional members are populated according to the [`ChangeField`]
//! annotations of the request that produced them.
//!
//! [`ChangeField`]: super::query::ChangeField

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Server timestamp, UTC, formatted `yyyy-mm-dd hh:mm:ss.fffffffff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub NaiveDateTime);

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        Self(chrono::Utc::now().naive_utc())
    }

    /// Parse the server's text form.
    pub fn parse(text: &str) -> Result<Self, chrono::ParseError> {
        NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f").map(Self)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Timestamp::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Account as returned by `accounts/` endpoints and embedded in changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Numeric account id
    #[serde(rename = "_account_id")]
    pub account_id: u64,
    /// Full name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Preferred email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Login name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Display name, when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Commit metadata of a revision (`CURRENT_COMMIT`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Commit sha, absent when the commit is the map key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    /// Parent commits
    #[serde(default)]
    pub parents: Vec<ParentCommit>,
    /// Subject line
    #[serde(default)]
    pub subject: String,
    /// Full message
    #[serde(default)]
    pub message: String,
}

/// Parent reference in [`CommitInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentCommit {
    /// Parent sha
    pub commit: String,
    /// Parent subject
    #[serde(default)]
    pub subject: String,
}

/// File entry of a revision (`CURRENT_FILES`, `revisions/{rev}/files`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// `A`, `D`, `R`, `C`, `W`; absent means modified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Previous path for renames and copies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    /// Inserted lines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines_inserted: Option<u64>,
    /// Deleted lines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines_deleted: Option<u64>,
    /// Whether the file is binary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<bool>,
}

/// One patch set of a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionInfo {
    /// Patch set number
    #[serde(rename = "_number")]
    pub number: u32,
    /// Git ref of the patch set
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,
    /// Upload time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<Timestamp>,
    /// Uploader
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploader: Option<AccountInfo>,
    /// Commit (`CURRENT_COMMIT`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitInfo>,
    /// Files (`CURRENT_FILES`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<BTreeMap<String, FileInfo>>,
}

/// A change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeInfo {
    /// `project~branch~Change-Id` or `project~number`
    pub id: String,
    /// Change-Id footer value
    pub change_id: String,
    /// Project name
    #[serde(default)]
    pub project: String,
    /// Target branch
    #[serde(default)]
    pub branch: String,
    /// Topic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Subject of the current patch set
    #[serde(default)]
    pub subject: String,
    /// `NEW`, `MERGED` or `ABANDONED`
    #[serde(default)]
    pub status: String,
    /// Numeric id
    #[serde(rename = "_number", default)]
    pub number: u64,
    /// Creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<Timestamp>,
    /// Last update time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<Timestamp>,
    /// Owner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<AccountInfo>,
    /// Label summaries (`LABELS`, `DETAILED_LABELS`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, serde_json::Value>>,
    /// Sha of the current revision (`CURRENT_REVISION`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_revision: Option<String>,
    /// Revisions by sha (`CURRENT_REVISION`, `ALL_REVISIONS`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revisions: Option<BTreeMap<String, RevisionInfo>>,
    /// Change messages (`MESSAGES`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<serde_json::Value>>,
    /// Submittability (`SUBMITTABLE`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submittable: Option<bool>,
    /// Set on the last change of a truncated listing
    #[serde(rename = "_more_changes", default, skip_serializing_if = "Option::is_none")]
    pub more_changes: Option<bool>,
}

impl ChangeInfo {
    /// The current revision, when it was requested.
    pub fn current_revision_info(&self) -> Option<&RevisionInfo> {
        let sha = self.current_revision.as_ref()?;
        self.revisions.as_ref()?.get(sha)
    }
}

/// Line range of a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRange {
    /// First line (1-based)
    pub start_line: u32,
    /// Column on the first line
    pub start_character: u32,
    /// Last line
    pub end_line: u32,
    /// Column on the last line
    pub end_character: u32,
}

/// Which side of the diff a comment is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommentSide {
    /// The parent commit
    Parent,
    /// The revision itself
    Revision,
}

/// Comment record as sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentInfo {
    /// Comment id
    pub id: String,
    /// File path; omitted by the server when the path is the map key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Diff side
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<CommentSide>,
    /// Line; absent for file comments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Range; takes precedence over `line`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<CommentRange>,
    /// Parent comment in a thread
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    /// Text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Last modification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<Timestamp>,
    /// Author; absent on drafts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<AccountInfo>,
    /// Patch set the comment belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_set: Option<u32>,
    /// Commit sha the comment belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
    /// Whether the thread is unresolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unresolved: Option<bool>,
}

/// Published comment or draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommentKind {
    /// Visible to everyone
    Published,
    /// Only visible to its owner
    Draft,
}

impl CommentKind {
    /// Collection segment in revision and change paths.
    pub fn collection(&self) -> &'static str {
        match self {
            CommentKind::Published => "comments",
            CommentKind::Draft => "drafts",
        }
    }
}

/// A comment bound to its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// Published or draft
    pub kind: CommentKind,
    /// File the comment belongs to
    pub path: String,
    /// Server record
    pub info: CommentInfo,
}

impl Comment {
    /// Bind `info` to `path`, filling in the path the server left out.
    pub fn new(kind: CommentKind, path: impl Into<String>, mut info: CommentInfo) -> Self {
        let path = path.into();
        if info.path.is_none() {
            info.path = Some(path.clone());
        }
        Self { kind, path, info }
    }

    /// Comment id.
    pub fn id(&self) -> &str {
        &self.info.id
    }
}

/// Comments of a change, grouped by file, each list in server order.
pub type CommentMap = BTreeMap<String, Vec<Comment>>;

/// Body of a draft create or update.
///
/// Updates send every field so the server replaces the draft wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftInput {
    /// Draft id; required for updates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// File path
    pub path: String,
    /// Diff side
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<CommentSide>,
    /// Line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<CommentRange>,
    /// Thread parent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    /// Text
    pub message: String,
    /// Unresolved flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unresolved: Option<bool>,
    /// Patch set number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_set: Option<u32>,
    /// Client-side modification time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<Timestamp>,
}

impl DraftInput {
    /// Draft on `path` with `message`, stamped with the current time.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: None,
            path: path.into(),
            side: None,
            line: None,
            range: None,
            in_reply_to: None,
            message: message.into(),
            unresolved: None,
            patch_set: None,
            updated: Some(Timestamp::now()),
        }
    }

    /// Full-replace payload for an existing draft.
    pub fn from_comment(comment: &Comment) -> Self {
        let info = &comment.info;
        Self {
            id: Some(info.id.clone()),
            path: comment.path.clone(),
            side: info.side,
            line: info.line,
            range: info.range,
            in_reply_to: info.in_reply_to.clone(),
            message: info.message.clone().unwrap_or_default(),
            unresolved: info.unresolved,
            patch_set: info.patch_set,
            updated: Some(Timestamp::now()),
        }
    }
}

/// Decoded content of a file at a given commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    /// Project the file belongs to
    pub project: String,
    /// Commit the content was read at
    pub commit: String,
    /// File path
    pub path: String,
    /// UTF-8 text
    pub text: String,
}
