//! Artifact naming convention inside a user workspace.

use std::path::{Path, PathBuf};

/// Subdirectories created for every workspace.
pub const WORKSPACE_DIRS: [&str; 3] = ["data", "crew", "blogs"];

/// Every artifact the pipeline reads or writes, at its fixed relative path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactPath {
    UserRankings,
    Competitors,
    CompetitorRankings,
    SelectedKeywordDetails,
    Analysis,
    AdCopies,
    BlogPostOutlines,
    CrewBlogPost,
    SearchLogs,
    BlogLogs,
    BlogPost,
}

impl ArtifactPath {
    pub const ALL: [ArtifactPath; 11] = [
        Self::UserRankings,
        Self::Competitors,
        Self::CompetitorRankings,
        Self::SelectedKeywordDetails,
        Self::Analysis,
        Self::AdCopies,
        Self::BlogPostOutlines,
        Self::CrewBlogPost,
        Self::SearchLogs,
        Self::BlogLogs,
        Self::BlogPost,
    ];

    /// Path relative to the workspace root, `/`-separated.
    pub fn relative(&self) -> &'static str {
        match self {
            Self::UserRankings => "data/user_rankings.json",
            Self::Competitors => "data/competitors.json",
            Self::CompetitorRankings => "data/competitor_rankings.json",
            Self::SelectedKeywordDetails => "data/selected_keywords_details.json",
            Self::Analysis => "crew/1_analysis.md",
            Self::AdCopies => "crew/2_ad_copies.md",
            Self::BlogPostOutlines => "crew/3_blog_post_outlines.md",
            Self::CrewBlogPost => "crew/4_blog_post.md",
            Self::SearchLogs => "blogs/search_logs.md",
            Self::BlogLogs => "blogs/blog_logs.md",
            Self::BlogPost => "blogs/blog_post.md",
        }
    }

    pub fn file_name(&self) -> &'static str {
        self.relative()
            .rsplit_once('/')
            .map(|(_, name)| name)
            .unwrap_or(self.relative())
    }

    /// Resolve under a workspace root.
    pub fn under(&self, root: &Path) -> PathBuf {
        self.relative().split('/').fold(root.to_path_buf(), |p, seg| p.join(seg))
    }

    /// Look an artifact up by bare file name (`blog_post.md`) or relative path
    /// (`crew/4_blog_post.md`).
    pub fn from_file_name(name: &str) -> Option<Self> {
        let name = name.trim().trim_start_matches("./");
        Self::ALL
            .into_iter()
            .find(|a| a.relative() == name || a.file_name() == name)
    }
}

impl std::fmt::Display for ArtifactPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.relative())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_artifact_lives_in_a_workspace_dir() {
        for artifact in ArtifactPath::ALL {
            let dir = artifact.relative().split('/').next().unwrap();
            assert!(WORKSPACE_DIRS.contains(&dir), "{artifact} outside workspace dirs");
        }
    }

    #[test]
    fn file_names_are_unique() {
        let mut names: Vec<_> = ArtifactPath::ALL.iter().map(|a| a.file_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ArtifactPath::ALL.len());
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(
            ArtifactPath::from_file_name("blog_post.md"),
            Some(ArtifactPath::BlogPost)
        );
        assert_eq!(
            ArtifactPath::from_file_name("crew/4_blog_post.md"),
            Some(ArtifactPath::CrewBlogPost)
        );
        assert_eq!(ArtifactPath::from_file_name("secrets.env"), None);
    }
}
