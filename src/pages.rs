use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    time::SystemTime,
};

use axum::response::Html;
use minijinja::Environment;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

pub const INDEX: &str = "index.html";
pub const REGISTER: &str = "register.html";
pub const SUCCESS: &str = "success.html";
pub const UPDATE: &str = "update.html";
pub const DELETE: &str = "delete.html";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template `{0}` not found")]
    NotFound(String),
    #[error("reading template `{name}`: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("template: {0}")]
    Template(#[from] minijinja::Error),
}

/// Renders HTML templates that live as plain files in one directory.
///
/// Without a cache every call reads and parses the file again. With the cache
/// enabled, parsed templates are kept per name and reloaded when the file's
/// modification time changes.
pub struct PageRenderer {
    dir: PathBuf,
    cache: Option<RwLock<TemplateCache>>,
}

struct TemplateCache {
    env: Environment<'static>,
    loaded: HashMap<String, SystemTime>,
}

impl PageRenderer {
    pub fn new(dir: impl Into<PathBuf>, cached: bool) -> Self {
        let cache = cached.then(|| {
            RwLock::new(TemplateCache {
                env: Environment::new(),
                loaded: HashMap::new(),
            })
        });
        Self {
            dir: dir.into(),
            cache,
        }
    }

    pub async fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<Html<String>, RenderError> {
        let path = self.dir.join(name);
        let html = match &self.cache {
            None => {
                let source = read_template(&path, name).await?;
                let env = Environment::new();
                let tmpl = env.template_from_named_str(name, &source)?;
                tmpl.render(ctx)?
            }
            Some(cache) => render_cached(cache, &path, name, ctx).await?,
        };
        Ok(Html(html))
    }
}

async fn render_cached<S: Serialize>(
    cache: &RwLock<TemplateCache>,
    path: &Path,
    name: &str,
    ctx: S,
) -> Result<String, RenderError> {
    let modified = tokio::fs::metadata(path)
        .await
        .and_then(|m| m.modified())
        .map_err(|e| io_error(name, e))?;

    {
        let cache = cache.read().await;
        if cache.loaded.get(name) == Some(&modified) {
            return Ok(cache.env.get_template(name)?.render(&ctx)?);
        }
    }

    let source = read_template(path, name).await?;
    let mut guard = cache.write().await;
    guard.env.add_template_owned(name.to_owned(), source)?;
    guard.loaded.insert(name.to_owned(), modified);
    debug!(template = name, "template (re)loaded into cache");

    let cache = guard.downgrade();
    Ok(cache.env.get_template(name)?.render(&ctx)?)
}

async fn read_template(path: &Path, name: &str) -> Result<String, RenderError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| io_error(name, e))
}

fn io_error(name: &str, e: io::Error) -> RenderError {
    if e.kind() == io::ErrorKind::NotFound {
        RenderError::NotFound(name.to_owned())
    } else {
        RenderError::Io {
            name: name.to_owned(),
            source: e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;
    use std::{fs, time::Duration};

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).expect("write template");
    }

    #[tokio::test]
    async fn renders_static_and_templated_pages() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), INDEX, "<h1>Home</h1>");
        write(dir.path(), SUCCESS, "<p>Welcome, {{ name }}!</p>");

        let pages = PageRenderer::new(dir.path(), false);
        let Html(home) = pages.render(INDEX, context! {}).await.unwrap();
        assert_eq!(home, "<h1>Home</h1>");

        let Html(ok) = pages
            .render(SUCCESS, context! { name => "Alice" })
            .await
            .unwrap();
        assert_eq!(ok, "<p>Welcome, Alice!</p>");
    }

    #[tokio::test]
    async fn html_templates_escape_values() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), SUCCESS, "{{ name }}");
        let pages = PageRenderer::new(dir.path(), false);
        let Html(out) = pages
            .render(SUCCESS, context! { name => "<script>" })
            .await
            .unwrap();
        assert_eq!(out, "&lt;script&gt;");
    }

    #[tokio::test]
    async fn missing_template_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        for cached in [false, true] {
            let pages = PageRenderer::new(dir.path(), cached);
            let err = pages.render(UPDATE, context! {}).await.unwrap_err();
            assert!(matches!(err, RenderError::NotFound(ref n) if n == UPDATE));
        }
    }

    #[tokio::test]
    async fn malformed_template_is_a_template_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), DELETE, "<p>{{ name </p>");
        for cached in [false, true] {
            let pages = PageRenderer::new(dir.path(), cached);
            let err = pages.render(DELETE, context! {}).await.unwrap_err();
            assert!(matches!(err, RenderError::Template(_)));
        }
    }

    #[tokio::test]
    async fn uncached_renderer_sees_every_edit() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), INDEX, "one");
        let pages = PageRenderer::new(dir.path(), false);
        assert_eq!(pages.render(INDEX, context! {}).await.unwrap().0, "one");
        write(dir.path(), INDEX, "two");
        assert_eq!(pages.render(INDEX, context! {}).await.unwrap().0, "two");
    }

    #[tokio::test]
    async fn cache_reloads_only_when_mtime_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(INDEX);
        write(dir.path(), INDEX, "one");
        let original = fs::metadata(&path).unwrap().modified().unwrap();

        let pages = PageRenderer::new(dir.path(), true);
        assert_eq!(pages.render(INDEX, context! {}).await.unwrap().0, "one");

        // Same mtime: the cached parse is served.
        write(dir.path(), INDEX, "two");
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(original)
            .unwrap();
        assert_eq!(pages.render(INDEX, context! {}).await.unwrap().0, "one");

        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(original + Duration::from_secs(5))
            .unwrap();
        assert_eq!(pages.render(INDEX, context! {}).await.unwrap().0, "two");
    }
}
