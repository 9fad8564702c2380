//! The slice of the workspace the stage reads.

use serde::{Deserialize, Serialize};

use crate::types::NodeUid;

/// A file in the workspace tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub uid: NodeUid,
    pub parent_uid: Option<NodeUid>,
    pub name: String,
    pub is_folder: bool,
    /// Unsaved edits exist.
    pub changed: bool,
    /// Rendered markup of the file, stage identifiers included.
    pub content_in_app: String,
}

impl FileNode {
    /// Extension of the file name, without the dot. Empty if there is none.
    pub fn extension(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext,
            _ => "",
        }
    }
}

/// Read access to the workspace's files.
pub trait WorkspaceFiles {
    fn file(&self, uid: &str) -> Option<&FileNode>;

    /// Uid of the file whose tree is rendered on the stage.
    fn renderable_file_uid(&self) -> Option<&NodeUid>;

    /// Every file, in the order the file tree displays them.
    fn files(&self) -> Box<dyn Iterator<Item = &FileNode> + '_>;

    fn renderable_file(&self) -> Option<&FileNode> {
        self.renderable_file_uid().and_then(|uid| self.file(uid))
    }

    /// Uids from `from` to `to` inclusive, in display order. Empty when
    /// either end is missing.
    fn range(&self, from: &str, to: &str) -> Vec<NodeUid> {
        let mut range = Vec::new();
        let mut ends = 0;
        for file in self.files() {
            let is_end = file.uid == from || file.uid == to;
            if is_end {
                ends += 1;
            }
            if ends > 0 {
                range.push(file.uid.clone());
            }
            if is_end && (ends == 2 || from == to) {
                return range;
            }
        }
        Vec::new()
    }
}

/// A flat workspace listing, already in display order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub files: Vec<FileNode>,
    pub renderable: Option<NodeUid>,
}

impl Workspace {
    pub fn new(files: Vec<FileNode>, renderable: Option<NodeUid>) -> Self {
        Self { files, renderable }
    }

    pub fn file_mut(&mut self, uid: &str) -> Option<&mut FileNode> {
        self.files.iter_mut().find(|file| file.uid == uid)
    }
}

impl WorkspaceFiles for Workspace {
    fn file(&self, uid: &str) -> Option<&FileNode> {
        self.files.iter().find(|file| file.uid == uid)
    }

    fn renderable_file_uid(&self) -> Option<&NodeUid> {
        self.renderable.as_ref()
    }

    fn files(&self) -> Box<dyn Iterator<Item = &FileNode> + '_> {
        Box::new(self.files.iter())
    }
}

/// Whether any file has unsaved edits; callers confirm before discarding.
pub fn has_unsaved_changes<'a>(files: impl IntoIterator<Item = &'a FileNode>) -> bool {
    files.into_iter().any(|file| file.changed)
}

/// Code editor language id for a file extension.
///
/// The extension is the id; a file without one is plain text.
pub fn language_from_extension(extension: &str) -> &str {
    if extension.is_empty() {
        "plaintext"
    } else {
        extension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(uid: &str, name: &str, changed: bool) -> FileNode {
        FileNode {
            uid: uid.into(),
            name: name.into(),
            changed,
            ..Default::default()
        }
    }

    #[test]
    fn test_unsaved_changes() {
        let files = [file("1", "index.html", false), file("2", "about.html", true)];
        assert!(has_unsaved_changes(&files));
        assert!(!has_unsaved_changes(&files[..1]));
        assert!(!has_unsaved_changes(std::iter::empty()));
    }

    #[test]
    fn test_range_follows_display_order() {
        let workspace = Workspace::new(
            vec![
                file("a", "a.html", false),
                file("b", "b.css", false),
                file("c", "c.js", false),
                file("d", "d.md", false),
            ],
            Some("a".into()),
        );
        assert_eq!(workspace.range("b", "d"), ["b", "c", "d"].map(NodeUid::from));
        assert_eq!(workspace.range("c", "a"), ["a", "b", "c"].map(NodeUid::from));
        assert_eq!(workspace.range("b", "b"), ["b"].map(NodeUid::from));
        assert!(workspace.range("b", "zz").is_empty());
        assert_eq!(workspace.renderable_file().map(|f| f.name.as_str()), Some("a.html"));
    }

    #[test]
    fn test_language_from_extension() {
        assert_eq!(language_from_extension("html"), "html");
        assert_eq!(language_from_extension(""), "plaintext");
        let readme = file("1", "README", false);
        assert_eq!(language_from_extension(readme.extension()), "plaintext");
        assert_eq!(file("1", ".env", false).extension(), "");
        assert_eq!(file("1", "a.tar.gz", false).extension(), "gz");
    }
}
