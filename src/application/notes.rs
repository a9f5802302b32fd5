use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{NOTES_PREVIEW_LINES, Workspace};

const NOTES_TEMPLATE: &str = "# Notes\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotesLayout {
    /// One `<project>.md` beside the main project directory.
    #[default]
    Project,
    /// One `<project>-<branch>.md` per branch.
    Branch,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NotesPreview {
    pub exists: bool,
    pub lines: Vec<String>,
}

impl NotesPreview {
    pub fn apply_to(self, mut workspace: Workspace) -> Workspace {
        workspace.notes_exists = self.exists;
        workspace.notes_preview = self.lines;
        workspace
    }
}

pub fn notes_path(
    project_path: &Path,
    project_name: &str,
    branch: Option<&str>,
    layout: NotesLayout,
) -> PathBuf {
    let parent = project_path.parent().unwrap_or(project_path);
    let file_name = match (layout, branch.map(str::trim)) {
        (NotesLayout::Branch, Some(branch)) if !branch.is_empty() => {
            format!("{project_name}-{}.md", branch.replace('/', "-"))
        }
        _ => format!("{project_name}.md"),
    };
    parent.join(file_name)
}

/// The per-branch notes file, regardless of layout; removed when its workspace is deleted.
pub fn branch_notes_path(project_path: &Path, project_name: &str, branch: &str) -> PathBuf {
    notes_path(project_path, project_name, Some(branch), NotesLayout::Branch)
}

pub fn read_notes_preview(path: &Path) -> NotesPreview {
    let Ok(file) = fs::File::open(path) else {
        return NotesPreview::default();
    };

    let lines = BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .take(NOTES_PREVIEW_LINES)
        .collect();
    NotesPreview {
        exists: true,
        lines,
    }
}

pub fn ensure_notes_file(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, NOTES_TEMPLATE)?;
    Ok(true)
}

pub fn delete_notes_file(path: &Path) -> Result<(), String> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(format!("notes delete failed: {error}")),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        NotesLayout, branch_notes_path, delete_notes_file, ensure_notes_file, notes_path,
        read_notes_preview,
    };
    use crate::application::test_support::TestDir;
    use std::fs;
    use std::path::{Path, PathBuf};

    #[test]
    fn project_layout_ignores_branch() {
        assert_eq!(
            notes_path(
                Path::new("/p/myapp"),
                "myapp",
                Some("feature"),
                NotesLayout::Project
            ),
            PathBuf::from("/p/myapp.md")
        );
    }

    #[test]
    fn branch_layout_flattens_slashes() {
        assert_eq!(
            branch_notes_path(Path::new("/p/myapp"), "myapp", "feat/login"),
            PathBuf::from("/p/myapp-feat-login.md")
        );
        assert_eq!(
            notes_path(Path::new("/p/myapp"), "myapp", Some(" "), NotesLayout::Branch),
            PathBuf::from("/p/myapp.md")
        );
    }

    #[test]
    fn preview_reads_at_most_ten_lines() {
        let temp = TestDir::new("notes-preview");
        let path = temp.path.join("myapp.md");
        let body: String = (1..=15).map(|index| format!("line {index}\n")).collect();
        fs::write(&path, body).expect("notes should be written");

        let preview = read_notes_preview(&path);

        assert!(preview.exists);
        assert_eq!(preview.lines.len(), 10);
        assert_eq!(preview.lines[0], "line 1");
        assert_eq!(preview.lines[9], "line 10");
    }

    #[test]
    fn missing_notes_preview_is_empty() {
        let preview = read_notes_preview(Path::new("/definitely/missing/notes.md"));
        assert!(!preview.exists);
        assert!(preview.lines.is_empty());
    }

    #[test]
    fn ensure_creates_template_once_and_delete_tolerates_missing() {
        let temp = TestDir::new("notes-ensure");
        let path = temp.path.join("nested").join("myapp.md");

        assert!(ensure_notes_file(&path).expect("notes should be created"));
        assert!(!ensure_notes_file(&path).expect("second ensure should be a no-op"));
        assert_eq!(
            fs::read_to_string(&path).expect("notes should be readable"),
            "# Notes\n\n"
        );

        assert_eq!(delete_notes_file(&path), Ok(()));
        assert_eq!(delete_notes_file(&path), Ok(()));
        assert!(!path.exists());
    }
}
