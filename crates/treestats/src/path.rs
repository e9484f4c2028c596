// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Resource paths
//!
//! Every node is identified by a slash-delimited path:
//!
//! ```text
//! /                               root
//! /projects/                      projects root
//! /<lang>/                        language
//! /projects/<proj>/               project
//! /<lang>/<proj>/                 translation project
//! /<lang>/<proj>/<dir>/           directory
//! /<lang>/<proj>/<dir>/<file>     store
//! ```
//!
//! Directories end with a slash, stores do not. Project aggregates live
//! under `/projects/` rather than under a language, which is why the
//! ancestor chain used for dirty registration jumps from the translation
//! project straight to `/projects/<proj>/`.

pub const ROOT_PATH: &str = "/";
pub const PROJECTS_ROOT_PATH: &str = "/projects/";

/// Structural kind of a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Root,
    ProjectsRoot,
    Language,
    Project,
    TranslationProject,
    Directory,
    Store,
}

/// Components of a path: language code, project code, directory below the
/// translation project (with trailing slash) and file name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PootlePath {
    pub language: Option<String>,
    pub project: Option<String>,
    pub dir: String,
    pub filename: String,
}

/// Paths whose dirty counters move together when `pootle_path` is
/// registered for a refresh: the path itself, its literal ancestors down to
/// the translation project, then the project aggregate in place of the
/// language root.
pub fn all_pootle_paths(pootle_path: &str) -> Vec<String> {
    let mut paths = vec![pootle_path.to_string()];

    let mut current = if pootle_path.ends_with('/') {
        pootle_path.to_string()
    } else {
        format!("{}/", pootle_path)
    };

    loop {
        let trimmed = &current[..current.len() - 1];
        let Some(idx) = trimmed.rfind('/') else {
            break;
        };
        let parent = &trimmed[..idx];
        let last = &trimmed[idx + 1..];
        let parent_path = format!("{}/", parent);

        match parent.matches('/').count() {
            n if n > 1 => {
                paths.push(parent_path.clone());
                current = parent_path;
            }
            1 => {
                if parent_path != PROJECTS_ROOT_PATH {
                    paths.push(format!("{}{}/", PROJECTS_ROOT_PATH, last));
                }
                break;
            }
            _ => break,
        }
    }

    paths
}

pub fn split_pootle_path(pootle_path: &str) -> PootlePath {
    let slash_count = pootle_path.matches('/').count();
    let parts: Vec<&str> = pootle_path.splitn(4, '/').skip(1).collect();
    let part = |i: usize| parts.get(i).copied().unwrap_or_default().to_string();

    let mut result = PootlePath::default();
    let mut ctx = String::new();

    if slash_count != 0 && pootle_path != PROJECTS_ROOT_PATH {
        if slash_count == 2 {
            result.language = Some(part(0));
        } else if pootle_path.starts_with(PROJECTS_ROOT_PATH) {
            result.project = Some(part(1));
            ctx = part(2);
        } else if slash_count != 1 {
            result.language = Some(part(0));
            result.project = Some(part(1));
            ctx = part(2);
        }
    }

    match ctx.rfind('/') {
        Some(idx) => {
            result.dir = format!("{}/", &ctx[..idx]);
            result.filename = ctx[idx + 1..].to_string();
        }
        None => result.filename = ctx,
    }

    result
}

pub fn path_kind(pootle_path: &str) -> PathKind {
    if pootle_path == ROOT_PATH {
        return PathKind::Root;
    }
    if pootle_path == PROJECTS_ROOT_PATH {
        return PathKind::ProjectsRoot;
    }
    if !pootle_path.ends_with('/') {
        return PathKind::Store;
    }
    let slashes = pootle_path.matches('/').count();
    if pootle_path.starts_with(PROJECTS_ROOT_PATH) {
        return PathKind::Project;
    }
    match slashes {
        2 => PathKind::Language,
        3 => PathKind::TranslationProject,
        _ => PathKind::Directory,
    }
}

/// Literal parent path, `None` for the root
pub fn parent_path(pootle_path: &str) -> Option<String> {
    let trimmed = pootle_path.strip_suffix('/').unwrap_or(pootle_path);
    let idx = trimmed.rfind('/')?;
    Some(trimmed[..=idx].to_string())
}

/// Last path segment, without trailing slash
pub fn code(pootle_path: &str) -> String {
    let trimmed = pootle_path.strip_suffix('/').unwrap_or(pootle_path);
    trimmed
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Code keying a node among its siblings. Translation projects are
/// `<language>-<project>`: all of a project's translation projects end in
/// the same segment.
pub fn node_code(pootle_path: &str) -> String {
    if path_kind(pootle_path) == PathKind::TranslationProject {
        let split = split_pootle_path(pootle_path);
        if let (Some(language), Some(project)) = (split.language, split.project) {
            return format!("{}-{}", language, project);
        }
    }
    code(pootle_path)
}

pub fn language_path(language: &str) -> String {
    format!("/{}/", language)
}

pub fn project_path(project: &str) -> String {
    format!("{}{}/", PROJECTS_ROOT_PATH, project)
}

pub fn translation_project_path(language: &str, project: &str) -> String {
    format!("/{}/{}/", language, project)
}

/// Whether a refresh running under `marker` makes `key` unreliable
pub fn marker_overlaps(marker: &str, key: &str) -> bool {
    if marker == ROOT_PATH {
        return true;
    }
    if key.starts_with(marker) || marker.starts_with(key) {
        return true;
    }
    match split_pootle_path(marker).project {
        Some(project) if !project.is_empty() => {
            let project_aggregate = project_path(&project);
            key.starts_with(&project_aggregate) || project_aggregate.starts_with(key)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_pootle_paths_store() {
        assert_eq!(
            all_pootle_paths("/af/tutorial/sub/foo.po"),
            vec![
                "/af/tutorial/sub/foo.po",
                "/af/tutorial/sub/",
                "/af/tutorial/",
                "/projects/tutorial/",
            ]
        );
    }

    #[test]
    fn test_all_pootle_paths_upper_levels() {
        assert_eq!(
            all_pootle_paths("/af/tutorial/"),
            vec!["/af/tutorial/", "/projects/tutorial/"]
        );
        assert_eq!(
            all_pootle_paths("/projects/tutorial/"),
            vec!["/projects/tutorial/"]
        );
        assert_eq!(all_pootle_paths("/af/"), vec!["/af/"]);
        assert_eq!(all_pootle_paths("/projects/"), vec!["/projects/"]);
        assert_eq!(all_pootle_paths("/"), vec!["/"]);
    }

    #[test]
    fn test_split_pootle_path() {
        assert_eq!(
            split_pootle_path("/af/tutorial/sub/foo.po"),
            PootlePath {
                language: Some("af".into()),
                project: Some("tutorial".into()),
                dir: "sub/".into(),
                filename: "foo.po".into(),
            }
        );
        assert_eq!(
            split_pootle_path("/projects/tutorial/"),
            PootlePath {
                language: None,
                project: Some("tutorial".into()),
                dir: String::new(),
                filename: String::new(),
            }
        );
        assert_eq!(split_pootle_path("/af/").language, Some("af".into()));
        assert_eq!(split_pootle_path("/projects/"), PootlePath::default());
        assert_eq!(split_pootle_path("/"), PootlePath::default());
    }

    #[test]
    fn test_path_kind() {
        assert_eq!(path_kind("/"), PathKind::Root);
        assert_eq!(path_kind("/projects/"), PathKind::ProjectsRoot);
        assert_eq!(path_kind("/af/"), PathKind::Language);
        assert_eq!(path_kind("/projects/tutorial/"), PathKind::Project);
        assert_eq!(path_kind("/af/tutorial/"), PathKind::TranslationProject);
        assert_eq!(path_kind("/af/tutorial/sub/"), PathKind::Directory);
        assert_eq!(path_kind("/af/tutorial/foo.po"), PathKind::Store);
    }

    #[test]
    fn test_parent_and_code() {
        assert_eq!(parent_path("/af/tutorial/foo.po"), Some("/af/tutorial/".into()));
        assert_eq!(parent_path("/af/tutorial/"), Some("/af/".into()));
        assert_eq!(parent_path("/af/"), Some("/".into()));
        assert_eq!(parent_path("/"), None);
        assert_eq!(code("/af/tutorial/"), "tutorial");
        assert_eq!(code("/af/tutorial/foo.po"), "foo.po");
    }

    #[test]
    fn test_node_code() {
        assert_eq!(node_code("/af/tutorial/"), "af-tutorial");
        assert_eq!(node_code("/de/tutorial/"), "de-tutorial");
        assert_eq!(node_code("/af/tutorial/sub/"), "sub");
        assert_eq!(node_code("/af/tutorial/foo.po"), "foo.po");
        assert_eq!(node_code("/projects/tutorial/"), "tutorial");
        assert_eq!(node_code("/af/"), "af");
    }

    #[test]
    fn test_marker_overlaps() {
        assert!(marker_overlaps("/", "/af/tutorial/foo.po"));
        assert!(marker_overlaps("/af/tutorial/", "/af/tutorial/foo.po"));
        assert!(marker_overlaps("/af/tutorial/", "/af/"));
        assert!(marker_overlaps("/af/tutorial/", "/projects/tutorial/"));
        assert!(marker_overlaps("/af/tutorial/", "/projects/"));
        assert!(!marker_overlaps("/af/tutorial/", "/de/tutorial/"));
        assert!(!marker_overlaps("/af/tutorial/", "/projects/other/"));
        assert!(!marker_overlaps("/af/", "/de/"));
    }
}
